//! The backend boundary
//!
//! [`RecordStore`] is the set of record operations the platform performs.
//! [`SupabaseStore`] speaks PostgREST; [`MemoryStore`] keeps everything in
//! process and backs the tests and offline tooling.
//!
//! Status changes are conditional writes: the caller names the status it
//! expects the record to still have, and the store answers `Conflict` when
//! it has moved.

mod memory;
mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use nss_auth::Session;

use crate::error::Result;
use crate::models::{
    ActivityKind, ActivitySubmission, NewActivitySubmission, NewVolunteerProfile,
    SubmissionReview, SubmissionStatus, UnitProfile, UserProfile, VolunteerProfile,
    VolunteerStatus,
};
use crate::role::Role;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

pub type SharedStore = Arc<dyn RecordStore>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFilter {
    pub role: Option<Role>,
    pub unit_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolunteerFilter {
    pub unit_id: Option<String>,
    pub status: Option<VolunteerStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionFilter {
    pub student_id: Option<String>,
    pub unit_id: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub kind: Option<ActivityKind>,
}

/// Record operations, each made on behalf of the holder of `auth`.
///
/// Profile, volunteer and submission listings come back newest first;
/// units come back ordered by unit number.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn user_profile(&self, auth: &Session, id: &str) -> Result<Option<UserProfile>>;

    async fn list_user_profiles(
        &self,
        auth: &Session,
        filter: &ProfileFilter,
    ) -> Result<Vec<UserProfile>>;

    async fn insert_user_profile(&self, auth: &Session, profile: &UserProfile)
        -> Result<UserProfile>;

    async fn update_user_role(
        &self,
        auth: &Session,
        id: &str,
        role: Role,
        unit_id: Option<&str>,
    ) -> Result<UserProfile>;

    async fn volunteer_profile_for_user(
        &self,
        auth: &Session,
        user_id: &str,
    ) -> Result<Option<VolunteerProfile>>;

    async fn volunteer_profile(&self, auth: &Session, id: &str)
        -> Result<Option<VolunteerProfile>>;

    async fn list_volunteer_profiles(
        &self,
        auth: &Session,
        filter: &VolunteerFilter,
    ) -> Result<Vec<VolunteerProfile>>;

    /// Fails with `Conflict` when the user already has a volunteer profile.
    async fn insert_volunteer_profile(
        &self,
        auth: &Session,
        profile: &NewVolunteerProfile,
    ) -> Result<VolunteerProfile>;

    /// Moves `id` from `expected` to `next`, or fails with `Conflict`.
    async fn transition_volunteer(
        &self,
        auth: &Session,
        id: &str,
        expected: VolunteerStatus,
        next: VolunteerStatus,
    ) -> Result<VolunteerProfile>;

    async fn submission(&self, auth: &Session, id: &str) -> Result<Option<ActivitySubmission>>;

    async fn list_submissions(
        &self,
        auth: &Session,
        filter: &SubmissionFilter,
    ) -> Result<Vec<ActivitySubmission>>;

    async fn insert_submission(
        &self,
        auth: &Session,
        submission: &NewActivitySubmission,
    ) -> Result<ActivitySubmission>;

    /// Applies `review` to `id` if it is still `expected`, or fails with `Conflict`.
    async fn review_submission(
        &self,
        auth: &Session,
        id: &str,
        expected: SubmissionStatus,
        review: &SubmissionReview,
    ) -> Result<ActivitySubmission>;

    async fn list_units(&self, auth: &Session) -> Result<Vec<UnitProfile>>;

    async fn unit(&self, auth: &Session, id: &str) -> Result<Option<UnitProfile>>;
}
