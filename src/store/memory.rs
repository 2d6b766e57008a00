use async_trait::async_trait;
use chrono::Utc;
use nss_auth::Session;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ProfileFilter, RecordStore, SubmissionFilter, VolunteerFilter};
use crate::error::{Error, Result};
use crate::models::{
    ActivitySubmission, NewActivitySubmission, NewVolunteerProfile, SubmissionReview,
    SubmissionStatus, UnitProfile, UserProfile, VolunteerProfile, VolunteerStatus,
};
use crate::role::Role;

#[derive(Default)]
struct Tables {
    profiles: Vec<UserProfile>,
    volunteers: Vec<VolunteerProfile>,
    submissions: Vec<ActivitySubmission>,
    units: Vec<UnitProfile>,
}

/// In-process store. Rows are kept in insertion order; listings reverse it.
///
/// Conditional writes check and update under one write lock, so concurrent
/// transitions of the same record serialize and the loser sees `Conflict`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units are reference data with no insert operation on the platform.
    pub async fn add_unit(&self, unit: UnitProfile) {
        self.tables.write().await.units.push(unit);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn user_profile(&self, _auth: &Session, id: &str) -> Result<Option<UserProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn list_user_profiles(
        &self,
        _auth: &Session,
        filter: &ProfileFilter,
    ) -> Result<Vec<UserProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .iter()
            .rev()
            .filter(|p| filter.role.map_or(true, |r| p.role == r))
            .filter(|p| {
                filter
                    .unit_id
                    .as_deref()
                    .map_or(true, |u| p.unit_id.as_deref() == Some(u))
            })
            .cloned()
            .collect())
    }

    async fn insert_user_profile(
        &self,
        _auth: &Session,
        profile: &UserProfile,
    ) -> Result<UserProfile> {
        let mut tables = self.tables.write().await;
        if tables.profiles.iter().any(|p| p.id == profile.id) {
            return Err(Error::conflict(format!("profile {} already exists", profile.id)));
        }
        tables.profiles.push(profile.clone());
        Ok(profile.clone())
    }

    async fn update_user_role(
        &self,
        _auth: &Session,
        id: &str,
        role: Role,
        unit_id: Option<&str>,
    ) -> Result<UserProfile> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::not_found(format!("profile {}", id)))?;
        profile.role = role;
        profile.unit_id = unit_id.map(str::to_string);
        Ok(profile.clone())
    }

    async fn volunteer_profile_for_user(
        &self,
        _auth: &Session,
        user_id: &str,
    ) -> Result<Option<VolunteerProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .volunteers
            .iter()
            .find(|v| v.user_id == user_id)
            .cloned())
    }

    async fn volunteer_profile(
        &self,
        _auth: &Session,
        id: &str,
    ) -> Result<Option<VolunteerProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.volunteers.iter().find(|v| v.id == id).cloned())
    }

    async fn list_volunteer_profiles(
        &self,
        _auth: &Session,
        filter: &VolunteerFilter,
    ) -> Result<Vec<VolunteerProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .volunteers
            .iter()
            .rev()
            .filter(|v| filter.unit_id.as_deref().map_or(true, |u| v.unit_id == u))
            .filter(|v| filter.status.map_or(true, |s| v.status == s))
            .cloned()
            .collect())
    }

    async fn insert_volunteer_profile(
        &self,
        _auth: &Session,
        profile: &NewVolunteerProfile,
    ) -> Result<VolunteerProfile> {
        let mut tables = self.tables.write().await;
        if tables.volunteers.iter().any(|v| v.user_id == profile.user_id) {
            return Err(Error::conflict(format!(
                "user {} already has a volunteer profile",
                profile.user_id
            )));
        }

        let now = Utc::now();
        let stored = VolunteerProfile {
            id: new_id(),
            user_id: profile.user_id.clone(),
            unit_id: profile.unit_id.clone(),
            full_name: profile.full_name.clone(),
            gender: profile.gender.clone(),
            date_of_birth: profile.date_of_birth,
            blood_group: profile.blood_group.clone(),
            height_cm: profile.height_cm,
            weight_kg: profile.weight_kg,
            address: profile.address.clone(),
            district: profile.district.clone(),
            pincode: profile.pincode.clone(),
            languages_known: profile.languages_known.clone(),
            phone: profile.phone.clone(),
            status: profile.status,
            created_at: now,
            updated_at: now,
        };
        tables.volunteers.push(stored.clone());
        debug!(id = %stored.id, "stored volunteer profile");
        Ok(stored)
    }

    async fn transition_volunteer(
        &self,
        _auth: &Session,
        id: &str,
        expected: VolunteerStatus,
        next: VolunteerStatus,
    ) -> Result<VolunteerProfile> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .volunteers
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| Error::not_found(format!("volunteer profile {}", id)))?;

        if profile.status != expected {
            warn!(id, %expected, actual = %profile.status, "volunteer profile moved");
            return Err(Error::conflict(format!(
                "volunteer profile {} is {} (expected {})",
                id, profile.status, expected
            )));
        }

        profile.status = next;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn submission(&self, _auth: &Session, id: &str) -> Result<Option<ActivitySubmission>> {
        let tables = self.tables.read().await;
        Ok(tables.submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_submissions(
        &self,
        _auth: &Session,
        filter: &SubmissionFilter,
    ) -> Result<Vec<ActivitySubmission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .iter()
            .rev()
            .filter(|s| {
                filter
                    .student_id
                    .as_deref()
                    .map_or(true, |id| s.student_id == id)
            })
            .filter(|s| filter.unit_id.as_deref().map_or(true, |u| s.unit_id == u))
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .filter(|s| filter.kind.map_or(true, |k| s.kind == k))
            .cloned()
            .collect())
    }

    async fn insert_submission(
        &self,
        _auth: &Session,
        submission: &NewActivitySubmission,
    ) -> Result<ActivitySubmission> {
        let now = Utc::now();
        let stored = ActivitySubmission {
            id: new_id(),
            student_id: submission.student_id.clone(),
            unit_id: submission.unit_id.clone(),
            kind: submission.kind,
            details: submission.details.clone(),
            status: submission.status,
            points: None,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.submissions.push(stored.clone());
        Ok(stored)
    }

    async fn review_submission(
        &self,
        _auth: &Session,
        id: &str,
        expected: SubmissionStatus,
        review: &SubmissionReview,
    ) -> Result<ActivitySubmission> {
        let mut tables = self.tables.write().await;
        let submission = tables
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::not_found(format!("submission {}", id)))?;

        if submission.status != expected {
            warn!(id, %expected, actual = %submission.status, "submission moved");
            return Err(Error::conflict(format!(
                "submission {} is {} (expected {})",
                id, submission.status, expected
            )));
        }

        submission.status = review.status;
        submission.points = review.points;
        submission.reviewed_by = Some(review.reviewed_by.clone());
        submission.updated_at = review.updated_at;
        Ok(submission.clone())
    }

    async fn list_units(&self, _auth: &Session) -> Result<Vec<UnitProfile>> {
        let tables = self.tables.read().await;
        let mut units = tables.units.clone();
        units.sort_by(|a, b| a.unit_number.cmp(&b.unit_number));
        Ok(units)
    }

    async fn unit(&self, _auth: &Session, id: &str) -> Result<Option<UnitProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.units.iter().find(|u| u.id == id).cloned())
    }
}
