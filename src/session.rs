//! The signed-in user's session, passed explicitly to every operation
//!
//! A [`UserSession`] is created by [`crate::Nss::sign_in`] and destroyed by
//! [`crate::Nss::sign_out`], which takes it by value.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use nss_auth::Session;
use serde::Deserialize;
use serde_json::Value;

use crate::role::{Identity, Role};

#[derive(Debug, Clone)]
pub struct UserSession {
    auth: Session,
    identity: Identity,
}

impl UserSession {
    pub fn new(auth: Session, identity: Identity) -> Self {
        Self { auth, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn unit_id(&self) -> Option<&str> {
        self.identity.unit_id.as_deref()
    }

    /// The backend session, for calls made on the user's behalf.
    pub fn auth(&self) -> &Session {
        &self.auth
    }

    pub fn is_expired(&self) -> bool {
        self.auth.is_expired()
    }

    pub(crate) fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub(crate) fn with_auth(mut self, auth: Session) -> Self {
        self.auth = auth;
        self
    }

    pub(crate) fn into_auth(self) -> Session {
        self.auth
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    app_metadata: Value,
}

/// Role claim cached inside the access token (`app_metadata.role`).
///
/// The token is only inspected, not verified: the backend verifies it on
/// every request, and the claim is compared against the profile record
/// anyway. Returns `None` when the token is unreadable or carries no
/// recognised role.
pub fn claimed_role(access_token: &str) -> Option<Role> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(access_token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    data.claims
        .app_metadata
        .get("role")
        .and_then(Value::as_str)
        .and_then(|r| r.parse().ok())
}
