//! Role resolution and access gating
//!
//! Every decision that depends on who the user is goes through the closed
//! [`Role`] enum and is matched exhaustively, so adding a role forces each
//! decision point to be revisited.

use std::fmt;
use std::str::FromStr;

use nss_auth::Session;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::session::UserSession;
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Unit,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Unit, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Unit => "unit",
            Role::Admin => "admin",
        }
    }

    /// The dashboard a user lands on after sign in.
    pub fn home_view(&self) -> View {
        match self {
            Role::Student => View::StudentDashboard,
            Role::Unit => View::UnitDashboard,
            Role::Admin => View::AdminDashboard,
        }
    }

    /// Whether a profile with this role must carry a unit affiliation.
    pub fn requires_unit(&self) -> bool {
        match self {
            Role::Student | Role::Unit => true,
            Role::Admin => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role strings are rejected rather than defaulted.
impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "unit" => Ok(Role::Unit),
            "admin" => Ok(Role::Admin),
            other => Err(Error::validation("role", format!("unknown role `{}`", other))),
        }
    }
}

/// Who the caller is, as far as permissions go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub unit_id: Option<String>,
}

impl Identity {
    /// Fails with `Unauthorized` unless the role is one of `allowed`.
    pub fn require(&self, allowed: &[Role], action: &str) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::unauthorized(format!(
                "role `{}` may not {}",
                self.role, action
            )))
        }
    }

    /// Unit actors act on their own unit only; admins act on any unit.
    pub fn can_act_on_unit(&self, unit_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Unit => self.unit_id.as_deref() == Some(unit_id),
            Role::Student => false,
        }
    }

    /// Gate for review actions (approve / reject) on a record of `unit_id`.
    pub fn require_reviewer_for(&self, unit_id: &str, action: &str) -> Result<()> {
        self.require(&[Role::Unit, Role::Admin], action)?;
        if self.can_act_on_unit(unit_id) {
            Ok(())
        } else {
            Err(Error::unauthorized(format!(
                "unit `{}` may not {} records of unit `{}`",
                self.unit_id.as_deref().unwrap_or("none"),
                action,
                unit_id
            )))
        }
    }

    /// The unit a listing is restricted to: a unit actor sees only its own,
    /// an admin sees `requested` (or everything when `None`).
    pub fn listing_scope(&self, requested: Option<&str>, action: &str) -> Result<Option<String>> {
        match self.role {
            Role::Admin => Ok(requested.map(str::to_string)),
            Role::Unit => {
                let own = self.unit_id.clone().ok_or_else(|| {
                    Error::unauthorized("unit account has no unit affiliation")
                })?;
                match requested {
                    Some(other) if other != own => Err(Error::unauthorized(format!(
                        "unit `{}` may not {} for unit `{}`",
                        own, action, other
                    ))),
                    _ => Ok(Some(own)),
                }
            }
            Role::Student => Err(Error::unauthorized(format!(
                "role `student` may not {}",
                action
            ))),
        }
    }
}

/// Protected screens of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    StudentDashboard,
    VolunteerRegistration,
    BloodDonationForm,
    TreeTaggingForm,
    UnitDashboard,
    UnitReviewQueue,
    AdminDashboard,
    AdminUsers,
    AdminCertificationQueue,
}

impl View {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            View::StudentDashboard
            | View::VolunteerRegistration
            | View::BloodDonationForm
            | View::TreeTaggingForm => &[Role::Student],
            View::UnitDashboard => &[Role::Unit],
            View::UnitReviewQueue => &[Role::Unit, Role::Admin],
            View::AdminDashboard | View::AdminUsers | View::AdminCertificationQueue => {
                &[Role::Admin]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Render,
    RedirectToLogin,
    RedirectToUnauthorized,
}

/// Route guard: decide whether `view` may be rendered for `session`.
pub fn guard(session: Option<&UserSession>, view: View) -> GateDecision {
    match session {
        None => GateDecision::RedirectToLogin,
        Some(s) if s.is_expired() => GateDecision::RedirectToLogin,
        Some(s) if view.allowed_roles().contains(&s.role()) => GateDecision::Render,
        Some(_) => GateDecision::RedirectToUnauthorized,
    }
}

/// Maps an authenticated identity to its role and unit.
///
/// The role is read from the profile record, which is authoritative; the
/// claim inside the access token is only a cache of it.
#[derive(Clone)]
pub struct RoleResolver {
    store: SharedStore,
}

impl RoleResolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, session: Option<&Session>) -> Result<Identity> {
        let session = session.ok_or_else(|| Error::not_authenticated("no active session"))?;
        if session.is_expired() {
            return Err(Error::not_authenticated("session expired"));
        }

        let profile = self
            .store
            .user_profile(session, &session.user.id)
            .await?
            .ok_or_else(|| {
                Error::not_authenticated(format!("no profile for user {}", session.user.id))
            })?;

        debug!(user_id = %profile.id, role = %profile.role, "resolved identity");

        Ok(Identity {
            user_id: profile.id,
            role: profile.role,
            unit_id: profile.unit_id,
        })
    }
}
