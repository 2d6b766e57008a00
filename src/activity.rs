//! Activity submission and review
//!
//! ```text
//! pending ──approve(points)──▶ approved
//!    │  ◀──change_to_pending──┘
//!    └──reject──▶ rejected
//! ```

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::{
    ActivityDetails, ActivityKind, ActivitySubmission, BloodDonation, NewActivitySubmission,
    SubmissionReview, SubmissionStatus, TreeTagging,
};
use crate::role::Role;
use crate::session::UserSession;
use crate::store::{SharedStore, SubmissionFilter};

pub const MIN_POINTS: u32 = 1;
pub const MAX_POINTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
    ChangeToPending,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::ChangeToPending => "change to pending",
        }
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            ReviewAction::Approve | ReviewAction::Reject => &[Role::Unit, Role::Admin],
            ReviewAction::ChangeToPending => &[Role::Admin],
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn next_status(from: SubmissionStatus, action: ReviewAction) -> Result<SubmissionStatus> {
    use ReviewAction::*;
    use SubmissionStatus::*;

    match (from, action) {
        (Pending, Approve) => Ok(Approved),
        (Pending, Reject) => Ok(Rejected),
        (Approved, ChangeToPending) => Ok(Pending),
        (Pending, ChangeToPending)
        | (Approved, Approve)
        | (Approved, Reject)
        | (Rejected, _) => Err(Error::invalid_transition(from, action)),
    }
}

fn check_points(points: u32) -> Result<()> {
    if (MIN_POINTS..=MAX_POINTS).contains(&points) {
        Ok(())
    } else {
        Err(Error::validation(
            "points",
            format!("Points must be between {} and {}", MIN_POINTS, MAX_POINTS),
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BloodDonationForm {
    #[validate(required(message = "Donation date is required"))]
    pub donated_on: Option<NaiveDate>,

    #[validate(length(min = 1, message = "Blood group is required"))]
    pub blood_group: String,

    #[validate(length(min = 1, message = "Venue is required"))]
    pub venue: String,

    #[validate(range(min = 1, max = 2, message = "Units donated must be 1 or 2"))]
    pub units: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TreeTaggingForm {
    #[validate(length(min = 1, message = "Species is required"))]
    pub species: String,

    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,

    #[validate(required(message = "Tagging date is required"))]
    pub tagged_on: Option<NaiveDate>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude is out of range"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude is out of range"))]
    pub longitude: Option<f64>,

    #[validate(url(message = "Photo URL is not a valid URL"))]
    pub photo_url: Option<String>,
}

/// A filled-in activity form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityForm {
    BloodDonation(BloodDonationForm),
    TreeTagging(TreeTaggingForm),
}

impl ActivityForm {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityForm::BloodDonation(_) => ActivityKind::BloodDonation,
            ActivityForm::TreeTagging(_) => ActivityKind::TreeTagging,
        }
    }

    /// Validates the form and produces the stored payload.
    pub fn into_details(self) -> Result<ActivityDetails> {
        match self {
            ActivityForm::BloodDonation(form) => {
                form.validate()?;
                Ok(ActivityDetails::BloodDonation(BloodDonation {
                    donated_on: form.donated_on.ok_or_else(|| {
                        Error::validation("donated_on", "Donation date is required")
                    })?,
                    blood_group: form.blood_group,
                    venue: form.venue.trim().to_string(),
                    units: form.units,
                }))
            }
            ActivityForm::TreeTagging(form) => {
                form.validate()?;
                Ok(ActivityDetails::TreeTagging(TreeTagging {
                    tagged_on: form.tagged_on.ok_or_else(|| {
                        Error::validation("tagged_on", "Tagging date is required")
                    })?,
                    species: form.species.trim().to_string(),
                    location: form.location.trim().to_string(),
                    latitude: form.latitude,
                    longitude: form.longitude,
                    photo_url: form.photo_url.filter(|u| !u.is_empty()),
                }))
            }
        }
    }
}

/// Submission by students, review by units and admins.
#[derive(Clone)]
pub struct ActivityService {
    store: SharedStore,
}

impl ActivityService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Creates a pending submission in the student's unit. Only approved or
    /// certified volunteers may submit.
    pub async fn submit(
        &self,
        session: &UserSession,
        form: ActivityForm,
    ) -> Result<ActivitySubmission> {
        let identity = session.identity();
        identity.require(&[Role::Student], "submit activities")?;
        let unit_id = identity
            .unit_id
            .clone()
            .ok_or_else(|| Error::unauthorized("student has no unit affiliation"))?;
        let details = form.into_details()?;

        let eligible = self
            .store
            .volunteer_profile_for_user(session.auth(), &identity.user_id)
            .await?
            .map_or(false, |p| p.status.can_submit_activities());
        if !eligible {
            return Err(Error::unauthorized(
                "only approved volunteers may submit activities",
            ));
        }

        let row = NewActivitySubmission {
            student_id: identity.user_id.clone(),
            unit_id,
            kind: details.kind(),
            details,
            status: SubmissionStatus::Pending,
        };

        let submission = self.store.insert_submission(session.auth(), &row).await?;
        info!(
            submission_id = %submission.id,
            student_id = %submission.student_id,
            kind = %submission.kind,
            "activity submitted"
        );
        Ok(submission)
    }

    pub async fn approve(
        &self,
        session: &UserSession,
        submission: &ActivitySubmission,
        points: u32,
    ) -> Result<ActivitySubmission> {
        self.review(session, submission, ReviewAction::Approve, Some(points))
            .await
    }

    pub async fn reject(
        &self,
        session: &UserSession,
        submission: &ActivitySubmission,
    ) -> Result<ActivitySubmission> {
        self.review(session, submission, ReviewAction::Reject, None)
            .await
    }

    /// Admin correction of an approval; the awarded points are withdrawn.
    pub async fn change_to_pending(
        &self,
        session: &UserSession,
        submission: &ActivitySubmission,
    ) -> Result<ActivitySubmission> {
        self.review(session, submission, ReviewAction::ChangeToPending, None)
            .await
    }

    /// Submissions awaiting or past review: a unit sees its own unit, an
    /// admin sees every unit.
    pub async fn list_for_review(
        &self,
        session: &UserSession,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<ActivitySubmission>> {
        let unit_id = session
            .identity()
            .listing_scope(None, "review submissions")?;
        self.store
            .list_submissions(
                session.auth(),
                &SubmissionFilter {
                    unit_id,
                    status,
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn list_mine(&self, session: &UserSession) -> Result<Vec<ActivitySubmission>> {
        session
            .identity()
            .require(&[Role::Student], "list own submissions")?;
        self.store
            .list_submissions(
                session.auth(),
                &SubmissionFilter {
                    student_id: Some(session.user_id().to_string()),
                    ..Default::default()
                },
            )
            .await
    }

    /// Unit and status come from the stored row, not from `submission`.
    async fn review(
        &self,
        session: &UserSession,
        submission: &ActivitySubmission,
        action: ReviewAction,
        points: Option<u32>,
    ) -> Result<ActivitySubmission> {
        let identity = session.identity();
        identity.require(action.allowed_roles(), action.as_str())?;

        let stored = self
            .store
            .submission(session.auth(), &submission.id)
            .await?
            .ok_or_else(|| Error::not_found(format!("submission {}", submission.id)))?;
        identity.require_reviewer_for(&stored.unit_id, action.as_str())?;

        let next = next_status(stored.status, action)?;
        if let Some(points) = points {
            check_points(points)?;
        }

        let review = SubmissionReview {
            status: next,
            points,
            reviewed_by: identity.user_id.clone(),
            updated_at: Utc::now(),
        };
        let updated = self
            .store
            .review_submission(session.auth(), &stored.id, stored.status, &review)
            .await?;

        info!(
            submission_id = %updated.id,
            actor = %identity.user_id,
            from = %stored.status,
            to = %updated.status,
            points = ?updated.points,
            "submission reviewed"
        );
        Ok(updated)
    }
}
