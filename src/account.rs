//! Account creation

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::{Error, Result};
use crate::role::Role;
use crate::session::UserSession;

/// Sign-up form. The role is chosen once, here, and fixed afterwards.
/// Only student and unit accounts can be created this way; admins are
/// promoted through [`crate::admin::AdminService::reassign_role`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SignUpForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,

    pub role: Role,

    pub unit_id: Option<String>,
}

impl SignUpForm {
    /// Field checks, then the role: student and unit accounts only, each
    /// with a unit.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        let has_unit = self.unit_id.as_deref().map_or(false, |u| !u.trim().is_empty());
        match self.role {
            Role::Admin => Err(Error::validation(
                "role",
                "Admin accounts cannot be created by sign-up",
            )),
            Role::Student | Role::Unit if !has_unit => Err(Error::validation(
                "unit_id",
                format!("A {} account needs a unit", self.role),
            )),
            Role::Student | Role::Unit => Ok(()),
        }
    }

    /// Stored as the auth user's metadata.
    pub(crate) fn metadata(&self) -> Value {
        json!({
            "full_name": self.full_name,
            "role": self.role,
            "unit_id": self.unit_id,
        })
    }
}

#[derive(Debug)]
pub enum SignUpResult {
    SignedIn(UserSession),
    /// The backend sent a confirmation email; sign in once it is confirmed.
    ConfirmationRequired { user_id: String },
}
