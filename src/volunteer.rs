//! Volunteer application lifecycle
//!
//! ```text
//! pending ──approve──▶ approved ──certify──▶ certified
//!    │                    │
//!    └──────reject────────┴──▶ rejected
//! ```
//!
//! `certified` and `rejected` have no outgoing edges.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};
use crate::models::{NewVolunteerProfile, VolunteerProfile, VolunteerStatus};
use crate::role::Role;
use crate::session::UserSession;
use crate::store::{SharedStore, VolunteerFilter};

pub const KNOWN_LANGUAGES: &[&str] = &[
    "english",
    "hindi",
    "tamil",
    "telugu",
    "kannada",
    "malayalam",
    "marathi",
    "bengali",
    "gujarati",
    "punjabi",
    "odia",
    "urdu",
    "assamese",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolunteerAction {
    Approve,
    Reject,
    Certify,
}

impl VolunteerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolunteerAction::Approve => "approve",
            VolunteerAction::Reject => "reject",
            VolunteerAction::Certify => "certify",
        }
    }

    /// Roles that may perform the action at all. Unit scoping is checked
    /// separately.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            VolunteerAction::Approve | VolunteerAction::Reject => &[Role::Unit, Role::Admin],
            VolunteerAction::Certify => &[Role::Admin],
        }
    }
}

impl fmt::Display for VolunteerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table.
pub fn next_status(from: VolunteerStatus, action: VolunteerAction) -> Result<VolunteerStatus> {
    use VolunteerAction::*;
    use VolunteerStatus::*;

    match (from, action) {
        (Pending, Approve) => Ok(Approved),
        (Pending, Reject) | (Approved, Reject) => Ok(Rejected),
        (Approved, Certify) => Ok(Certified),
        (Pending, Certify)
        | (Approved, Approve)
        | (Rejected, _)
        | (Certified, _) => Err(Error::invalid_transition(from, action)),
    }
}

fn digits_only(value: &str) -> std::result::Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("digits").with_message("must contain digits only".into()))
    }
}

#[allow(clippy::ptr_arg)]
fn known_languages(languages: &Vec<String>) -> std::result::Result<(), ValidationError> {
    match languages
        .iter()
        .find(|l| !KNOWN_LANGUAGES.contains(&l.trim().to_ascii_lowercase().as_str()))
    {
        Some(unknown) => Err(ValidationError::new("language")
            .with_message(format!("`{}` is not a known language", unknown).into())),
        None => Ok(()),
    }
}

/// Volunteer registration form, validated before anything is sent.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct VolunteerRegistration {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,

    #[validate(length(min = 1, message = "Gender is required"))]
    pub gender: String,

    #[validate(required(message = "Date of birth is required"))]
    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(min = 1, message = "Blood group is required"))]
    pub blood_group: String,

    #[validate(range(min = 50.0, max = 250.0, message = "Height must be between 50 and 250 cm"))]
    pub height_cm: f32,

    #[validate(range(min = 20.0, max = 300.0, message = "Weight must be between 20 and 300 kg"))]
    pub weight_kg: f32,

    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,

    #[validate(length(min = 1, message = "District is required"))]
    pub district: String,

    #[validate(
        length(equal = 6, message = "Pincode must be 6 digits"),
        custom(function = "digits_only")
    )]
    pub pincode: String,

    #[validate(
        length(min = 1, message = "Select at least one language"),
        custom(function = "known_languages")
    )]
    pub languages_known: Vec<String>,

    #[validate(
        length(equal = 10, message = "Phone number must be 10 digits"),
        custom(function = "digits_only")
    )]
    pub phone: String,
}

impl VolunteerRegistration {
    /// Validates the form and turns it into a pending profile row.
    pub fn into_new_profile(self, user_id: &str, unit_id: &str) -> Result<NewVolunteerProfile> {
        self.validate()?;
        let date_of_birth = self
            .date_of_birth
            .ok_or_else(|| Error::validation("date_of_birth", "Date of birth is required"))?;

        Ok(NewVolunteerProfile {
            user_id: user_id.to_string(),
            unit_id: unit_id.to_string(),
            full_name: self.full_name.trim().to_string(),
            gender: self.gender,
            date_of_birth,
            blood_group: self.blood_group,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            address: self.address,
            district: self.district,
            pincode: self.pincode,
            languages_known: self.languages_known,
            phone: self.phone,
            status: VolunteerStatus::Pending,
        })
    }
}

/// Registration and review of volunteer profiles.
#[derive(Clone)]
pub struct VolunteerService {
    store: SharedStore,
}

impl VolunteerService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Creates the caller's volunteer profile in `pending`.
    pub async fn register(
        &self,
        session: &UserSession,
        form: VolunteerRegistration,
    ) -> Result<VolunteerProfile> {
        let identity = session.identity();
        identity.require(&[Role::Student], "register as a volunteer")?;
        let unit_id = identity
            .unit_id
            .as_deref()
            .ok_or_else(|| Error::unauthorized("student has no unit affiliation"))?;

        let row = form.into_new_profile(&identity.user_id, unit_id)?;

        if self
            .store
            .volunteer_profile_for_user(session.auth(), &identity.user_id)
            .await?
            .is_some()
        {
            return Err(Error::conflict("volunteer profile already submitted"));
        }

        let profile = self
            .store
            .insert_volunteer_profile(session.auth(), &row)
            .await?;
        info!(user_id = %identity.user_id, profile_id = %profile.id, "volunteer registered");
        Ok(profile)
    }

    /// The caller's own volunteer profile, if they registered.
    pub async fn mine(&self, session: &UserSession) -> Result<Option<VolunteerProfile>> {
        self.store
            .volunteer_profile_for_user(session.auth(), session.user_id())
            .await
    }

    /// Whether the caller may submit activities.
    pub async fn is_eligible(&self, session: &UserSession) -> Result<bool> {
        Ok(self
            .mine(session)
            .await?
            .map_or(false, |p| p.status.can_submit_activities()))
    }

    /// Volunteer profiles visible to a reviewer: own unit for unit accounts,
    /// any unit for admins.
    pub async fn list_for_review(
        &self,
        session: &UserSession,
        unit_id: Option<&str>,
        status: Option<VolunteerStatus>,
    ) -> Result<Vec<VolunteerProfile>> {
        let unit_id = session
            .identity()
            .listing_scope(unit_id, "list volunteer profiles")?;
        self.store
            .list_volunteer_profiles(session.auth(), &VolunteerFilter { unit_id, status })
            .await
    }

    pub async fn approve(
        &self,
        session: &UserSession,
        profile: &VolunteerProfile,
    ) -> Result<VolunteerProfile> {
        self.apply(session, profile, VolunteerAction::Approve).await
    }

    pub async fn reject(
        &self,
        session: &UserSession,
        profile: &VolunteerProfile,
    ) -> Result<VolunteerProfile> {
        self.apply(session, profile, VolunteerAction::Reject).await
    }

    pub async fn certify(
        &self,
        session: &UserSession,
        profile: &VolunteerProfile,
    ) -> Result<VolunteerProfile> {
        self.apply(session, profile, VolunteerAction::Certify).await
    }

    /// Role gate, then the stored record's unit and status, then the
    /// conditional write.
    ///
    /// Only `profile.id` is taken from the caller. Unit and status are read
    /// back from the store, and the write expects the status it read.
    async fn apply(
        &self,
        session: &UserSession,
        profile: &VolunteerProfile,
        action: VolunteerAction,
    ) -> Result<VolunteerProfile> {
        let identity = session.identity();
        identity.require(action.allowed_roles(), action.as_str())?;

        let stored = self
            .store
            .volunteer_profile(session.auth(), &profile.id)
            .await?
            .ok_or_else(|| Error::not_found(format!("volunteer profile {}", profile.id)))?;
        identity.require_reviewer_for(&stored.unit_id, action.as_str())?;

        let next = next_status(stored.status, action)?;
        let updated = self
            .store
            .transition_volunteer(session.auth(), &stored.id, stored.status, next)
            .await?;

        info!(
            profile_id = %updated.id,
            actor = %identity.user_id,
            from = %stored.status,
            to = %updated.status,
            "volunteer transition"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> VolunteerRegistration {
        VolunteerRegistration {
            full_name: "Asha Patil".to_string(),
            gender: "female".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2004, 3, 14),
            blood_group: "B+".to_string(),
            height_cm: 162.0,
            weight_kg: 55.0,
            address: "12 MG Road".to_string(),
            district: "Pune".to_string(),
            pincode: "411001".to_string(),
            languages_known: vec!["Marathi".to_string(), "English".to_string()],
            phone: "9876543210".to_string(),
        }
    }

    fn field_of(err: Error) -> String {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn transition_table() {
        use VolunteerAction::*;
        use VolunteerStatus::*;

        assert_eq!(next_status(Pending, Approve).unwrap(), Approved);
        assert_eq!(next_status(Pending, Reject).unwrap(), Rejected);
        assert_eq!(next_status(Approved, Reject).unwrap(), Rejected);
        assert_eq!(next_status(Approved, Certify).unwrap(), Certified);
    }

    #[test]
    fn certify_requires_prior_approval() {
        assert!(matches!(
            next_status(VolunteerStatus::Pending, VolunteerAction::Certify),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn certified_is_terminal() {
        for action in [
            VolunteerAction::Approve,
            VolunteerAction::Reject,
            VolunteerAction::Certify,
        ] {
            assert!(matches!(
                next_status(VolunteerStatus::Certified, action),
                Err(Error::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn valid_form_passes() {
        let row = valid_form().into_new_profile("user-1", "unit-1").unwrap();
        assert_eq!(row.status, VolunteerStatus::Pending);
        assert_eq!(row.unit_id, "unit-1");
    }

    #[test]
    fn short_pincode_cites_pincode() {
        let mut form = valid_form();
        form.pincode = "41100".to_string();
        assert_eq!(field_of(form.into_new_profile("u", "x").unwrap_err()), "pincode");
    }

    #[test]
    fn non_numeric_pincode_cites_pincode() {
        let mut form = valid_form();
        form.pincode = "41100A".to_string();
        assert_eq!(field_of(form.into_new_profile("u", "x").unwrap_err()), "pincode");
    }

    #[test]
    fn empty_languages_cites_languages() {
        let mut form = valid_form();
        form.languages_known.clear();
        assert_eq!(
            field_of(form.into_new_profile("u", "x").unwrap_err()),
            "languages_known"
        );
    }

    #[test]
    fn unknown_language_is_rejected() {
        let mut form = valid_form();
        form.languages_known = vec!["Klingon".to_string()];
        assert_eq!(
            field_of(form.into_new_profile("u", "x").unwrap_err()),
            "languages_known"
        );
    }

    #[test]
    fn missing_birth_date_and_bounds() {
        let mut form = valid_form();
        form.date_of_birth = None;
        assert_eq!(
            field_of(form.into_new_profile("u", "x").unwrap_err()),
            "date_of_birth"
        );

        let mut form = valid_form();
        form.height_cm = 400.0;
        assert_eq!(field_of(form.into_new_profile("u", "x").unwrap_err()), "height_cm");

        let mut form = valid_form();
        form.weight_kg = 5.0;
        assert_eq!(field_of(form.into_new_profile("u", "x").unwrap_err()), "weight_kg");
    }
}
