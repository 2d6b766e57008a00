use async_trait::async_trait;
use chrono::Utc;
use nss_auth::Session;
use nss_postgrest::{PostgrestClient, SortOrder};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::{ProfileFilter, RecordStore, SubmissionFilter, VolunteerFilter};
use crate::config::NssConfig;
use crate::error::{Error, Result};
use crate::models::{
    ActivitySubmission, NewActivitySubmission, NewVolunteerProfile, SubmissionReview,
    SubmissionStatus, UnitProfile, UserProfile, VolunteerProfile, VolunteerStatus,
    ACTIVITY_SUBMISSIONS_TABLE, PROFILES_TABLE, UNITS_TABLE, VOLUNTEER_PROFILES_TABLE,
};
use crate::role::Role;

/// Store backed by the project's PostgREST endpoint.
///
/// Requests carry the user's access token, so row level security applies
/// on top of the checks made in this crate.
#[derive(Clone)]
pub struct SupabaseStore {
    base_url: String,
    anon_key: String,
    db_schema: String,
    http_client: Client,
}

fn first_row<T>(rows: Vec<T>, what: impl FnOnce() -> Error) -> Result<T> {
    rows.into_iter().next().ok_or_else(what)
}

impl SupabaseStore {
    pub fn new(config: &NssConfig, http_client: Client) -> Self {
        Self {
            base_url: config.base_url(),
            anon_key: config.anon_key.clone(),
            db_schema: config.options.db_schema.clone(),
            http_client,
        }
    }

    fn from(&self, auth: &Session, table: &str) -> Result<PostgrestClient> {
        Ok(PostgrestClient::new(
            &self.base_url,
            &self.anon_key,
            table,
            self.http_client.clone(),
        )?
        .with_schema(&self.db_schema)?
        .with_auth(&auth.access_token)?)
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn user_profile(&self, auth: &Session, id: &str) -> Result<Option<UserProfile>> {
        debug!(id, "fetching profile");
        Ok(self
            .from(auth, PROFILES_TABLE)?
            .select("*")
            .eq("id", id)
            .execute_one()
            .await?)
    }

    async fn list_user_profiles(
        &self,
        auth: &Session,
        filter: &ProfileFilter,
    ) -> Result<Vec<UserProfile>> {
        let mut query = self.from(auth, PROFILES_TABLE)?.select("*");
        if let Some(role) = filter.role {
            query = query.eq("role", role.as_str());
        }
        if let Some(unit_id) = &filter.unit_id {
            query = query.eq("unit_id", unit_id);
        }
        Ok(query
            .order("created_at", SortOrder::Descending)
            .execute()
            .await?)
    }

    async fn insert_user_profile(
        &self,
        auth: &Session,
        profile: &UserProfile,
    ) -> Result<UserProfile> {
        let rows = self.from(auth, PROFILES_TABLE)?.insert(profile).await?;
        first_row(rows, || {
            Error::network("no profile returned after insert")
        })
    }

    async fn update_user_role(
        &self,
        auth: &Session,
        id: &str,
        role: Role,
        unit_id: Option<&str>,
    ) -> Result<UserProfile> {
        let rows = self
            .from(auth, PROFILES_TABLE)?
            .eq("id", id)
            .update(&json!({ "role": role, "unit_id": unit_id }))
            .await?;
        first_row(rows, || Error::not_found(format!("profile {}", id)))
    }

    async fn volunteer_profile_for_user(
        &self,
        auth: &Session,
        user_id: &str,
    ) -> Result<Option<VolunteerProfile>> {
        Ok(self
            .from(auth, VOLUNTEER_PROFILES_TABLE)?
            .select("*")
            .eq("user_id", user_id)
            .execute_one()
            .await?)
    }

    async fn volunteer_profile(
        &self,
        auth: &Session,
        id: &str,
    ) -> Result<Option<VolunteerProfile>> {
        Ok(self
            .from(auth, VOLUNTEER_PROFILES_TABLE)?
            .select("*")
            .eq("id", id)
            .execute_one()
            .await?)
    }

    async fn list_volunteer_profiles(
        &self,
        auth: &Session,
        filter: &VolunteerFilter,
    ) -> Result<Vec<VolunteerProfile>> {
        let mut query = self.from(auth, VOLUNTEER_PROFILES_TABLE)?.select("*");
        if let Some(unit_id) = &filter.unit_id {
            query = query.eq("unit_id", unit_id);
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        Ok(query
            .order("created_at", SortOrder::Descending)
            .execute()
            .await?)
    }

    async fn insert_volunteer_profile(
        &self,
        auth: &Session,
        profile: &NewVolunteerProfile,
    ) -> Result<VolunteerProfile> {
        // a unique index on user_id turns a second registration into a 409
        let rows = self
            .from(auth, VOLUNTEER_PROFILES_TABLE)?
            .insert(profile)
            .await?;
        first_row(rows, || {
            Error::network("no volunteer profile returned after insert")
        })
    }

    async fn transition_volunteer(
        &self,
        auth: &Session,
        id: &str,
        expected: VolunteerStatus,
        next: VolunteerStatus,
    ) -> Result<VolunteerProfile> {
        let rows: Vec<VolunteerProfile> = self
            .from(auth, VOLUNTEER_PROFILES_TABLE)?
            .eq("id", id)
            .eq("status", expected.as_str())
            .update(&json!({ "status": next, "updated_at": Utc::now() }))
            .await?;

        first_row(rows, || {
            warn!(id, %expected, "conditional volunteer update matched no row");
            Error::conflict(format!(
                "volunteer profile {} is no longer {}",
                id, expected
            ))
        })
    }

    async fn submission(&self, auth: &Session, id: &str) -> Result<Option<ActivitySubmission>> {
        Ok(self
            .from(auth, ACTIVITY_SUBMISSIONS_TABLE)?
            .select("*")
            .eq("id", id)
            .execute_one()
            .await?)
    }

    async fn list_submissions(
        &self,
        auth: &Session,
        filter: &SubmissionFilter,
    ) -> Result<Vec<ActivitySubmission>> {
        let mut query = self.from(auth, ACTIVITY_SUBMISSIONS_TABLE)?.select("*");
        if let Some(student_id) = &filter.student_id {
            query = query.eq("student_id", student_id);
        }
        if let Some(unit_id) = &filter.unit_id {
            query = query.eq("unit_id", unit_id);
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(kind) = filter.kind {
            query = query.eq("kind", kind.as_str());
        }
        Ok(query
            .order("created_at", SortOrder::Descending)
            .execute()
            .await?)
    }

    async fn insert_submission(
        &self,
        auth: &Session,
        submission: &NewActivitySubmission,
    ) -> Result<ActivitySubmission> {
        let rows = self
            .from(auth, ACTIVITY_SUBMISSIONS_TABLE)?
            .insert(submission)
            .await?;
        first_row(rows, || Error::network("no submission returned after insert"))
    }

    async fn review_submission(
        &self,
        auth: &Session,
        id: &str,
        expected: SubmissionStatus,
        review: &SubmissionReview,
    ) -> Result<ActivitySubmission> {
        let rows: Vec<ActivitySubmission> = self
            .from(auth, ACTIVITY_SUBMISSIONS_TABLE)?
            .eq("id", id)
            .eq("status", expected.as_str())
            .update(review)
            .await?;

        first_row(rows, || {
            warn!(id, %expected, "conditional submission update matched no row");
            Error::conflict(format!("submission {} is no longer {}", id, expected))
        })
    }

    async fn list_units(&self, auth: &Session) -> Result<Vec<UnitProfile>> {
        Ok(self
            .from(auth, UNITS_TABLE)?
            .select("*")
            .order("unit_number", SortOrder::Ascending)
            .execute()
            .await?)
    }

    async fn unit(&self, auth: &Session, id: &str) -> Result<Option<UnitProfile>> {
        Ok(self
            .from(auth, UNITS_TABLE)?
            .select("*")
            .eq("id", id)
            .execute_one()
            .await?)
    }
}
