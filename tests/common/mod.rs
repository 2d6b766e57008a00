#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use nss_auth::{Session, User};
use serde_json::{json, Value};
use tokio::sync::Barrier;

use nss_platform::activity::{ActivityForm, ActivityService, TreeTaggingForm};
use nss_platform::admin::AdminService;
use nss_platform::dashboard::DashboardService;
use nss_platform::prelude::*;
use nss_platform::role::RoleResolver;
use nss_platform::store::{ProfileFilter, SubmissionFilter, VolunteerFilter};
use nss_platform::volunteer::VolunteerService;

pub const UNIT_A: &str = "unit-a";
pub const UNIT_B: &str = "unit-b";

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: Some(format!("{}@college.edu", id)),
        phone: None,
        app_metadata: Value::Null,
        user_metadata: Value::Null,
        created_at: None,
        updated_at: None,
    }
}

/// A backend session that does not expire.
pub fn auth_session(user_id: &str) -> Session {
    Session {
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_in: 3600,
        expires_at: None,
        token_type: "bearer".to_string(),
        user: user(user_id),
    }
}

pub fn session_json(access_token: &str, user_id: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-token",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": user_id, "email": format!("{}@college.edu", user_id) }
    })
}

pub fn unit(id: &str, number: &str) -> UnitProfile {
    UnitProfile {
        id: id.to_string(),
        unit_number: number.to_string(),
        college: format!("College of {}", number),
        district: "Pune".to_string(),
        program_officer: "Dr. Kulkarni".to_string(),
        program_officer_email: format!("po-{}@college.edu", id),
        program_officer_phone: None,
    }
}

pub fn profile(id: &str, role: Role, unit_id: Option<&str>) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        email: format!("{}@college.edu", id),
        full_name: format!("User {}", id),
        role,
        unit_id: unit_id.map(str::to_string),
        phone: None,
        college: None,
        district: None,
        created_at: Utc::now(),
    }
}

pub fn registration() -> VolunteerRegistration {
    VolunteerRegistration {
        full_name: "Kiran Desai".to_string(),
        gender: "male".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2003, 8, 21),
        blood_group: "A+".to_string(),
        height_cm: 172.0,
        weight_kg: 64.5,
        address: "Hostel B, Room 14".to_string(),
        district: "Pune".to_string(),
        pincode: "411007".to_string(),
        languages_known: vec!["Marathi".to_string(), "hindi".to_string()],
        phone: "9123456780".to_string(),
    }
}

pub fn tree_form() -> ActivityForm {
    ActivityForm::TreeTagging(TreeTaggingForm {
        species: "Banyan".to_string(),
        location: "North lawn".to_string(),
        tagged_on: NaiveDate::from_ymd_opt(2024, 8, 15),
        latitude: None,
        longitude: None,
        photo_url: None,
    })
}

/// A [`MemoryStore`] whose submission reads wait until two readers have
/// arrived, so both reviewers see the same status before either writes.
pub struct RacingStore {
    inner: MemoryStore,
    readers: Barrier,
}

impl RacingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            readers: Barrier::new(2),
        }
    }
}

#[async_trait]
impl RecordStore for RacingStore {
    async fn user_profile(&self, auth: &Session, id: &str) -> Result<Option<UserProfile>> {
        self.inner.user_profile(auth, id).await
    }

    async fn list_user_profiles(
        &self,
        auth: &Session,
        filter: &ProfileFilter,
    ) -> Result<Vec<UserProfile>> {
        self.inner.list_user_profiles(auth, filter).await
    }

    async fn insert_user_profile(
        &self,
        auth: &Session,
        profile: &UserProfile,
    ) -> Result<UserProfile> {
        self.inner.insert_user_profile(auth, profile).await
    }

    async fn update_user_role(
        &self,
        auth: &Session,
        id: &str,
        role: Role,
        unit_id: Option<&str>,
    ) -> Result<UserProfile> {
        self.inner.update_user_role(auth, id, role, unit_id).await
    }

    async fn volunteer_profile_for_user(
        &self,
        auth: &Session,
        user_id: &str,
    ) -> Result<Option<VolunteerProfile>> {
        self.inner.volunteer_profile_for_user(auth, user_id).await
    }

    async fn volunteer_profile(
        &self,
        auth: &Session,
        id: &str,
    ) -> Result<Option<VolunteerProfile>> {
        self.inner.volunteer_profile(auth, id).await
    }

    async fn list_volunteer_profiles(
        &self,
        auth: &Session,
        filter: &VolunteerFilter,
    ) -> Result<Vec<VolunteerProfile>> {
        self.inner.list_volunteer_profiles(auth, filter).await
    }

    async fn insert_volunteer_profile(
        &self,
        auth: &Session,
        profile: &NewVolunteerProfile,
    ) -> Result<VolunteerProfile> {
        self.inner.insert_volunteer_profile(auth, profile).await
    }

    async fn transition_volunteer(
        &self,
        auth: &Session,
        id: &str,
        expected: VolunteerStatus,
        next: VolunteerStatus,
    ) -> Result<VolunteerProfile> {
        self.inner.transition_volunteer(auth, id, expected, next).await
    }

    async fn submission(&self, auth: &Session, id: &str) -> Result<Option<ActivitySubmission>> {
        let read = self.inner.submission(auth, id).await;
        self.readers.wait().await;
        read
    }

    async fn list_submissions(
        &self,
        auth: &Session,
        filter: &SubmissionFilter,
    ) -> Result<Vec<ActivitySubmission>> {
        self.inner.list_submissions(auth, filter).await
    }

    async fn insert_submission(
        &self,
        auth: &Session,
        submission: &NewActivitySubmission,
    ) -> Result<ActivitySubmission> {
        self.inner.insert_submission(auth, submission).await
    }

    async fn review_submission(
        &self,
        auth: &Session,
        id: &str,
        expected: SubmissionStatus,
        review: &SubmissionReview,
    ) -> Result<ActivitySubmission> {
        self.inner.review_submission(auth, id, expected, review).await
    }

    async fn list_units(&self, auth: &Session) -> Result<Vec<UnitProfile>> {
        self.inner.list_units(auth).await
    }

    async fn unit(&self, auth: &Session, id: &str) -> Result<Option<UnitProfile>> {
        self.inner.unit(auth, id).await
    }
}

async fn seeded_memory() -> MemoryStore {
    let memory = MemoryStore::new();
    memory.add_unit(unit(UNIT_A, "NSS-101")).await;
    memory.add_unit(unit(UNIT_B, "NSS-202")).await;
    memory
}

/// An in-memory backend with two units and no users.
pub struct World {
    pub store: SharedStore,
}

impl World {
    pub async fn new() -> Self {
        Self {
            store: Arc::new(seeded_memory().await),
        }
    }

    /// Like [`World::new`], but every submission read blocks until a second
    /// one arrives. Only concurrent reviews make progress.
    pub async fn racing() -> Self {
        Self {
            store: Arc::new(RacingStore::new(seeded_memory().await)),
        }
    }

    /// Creates the profile and resolves a session for it.
    pub async fn sign_in(&self, id: &str, role: Role, unit_id: Option<&str>) -> UserSession {
        self.sign_in_profile(profile(id, role, unit_id)).await
    }

    pub async fn sign_in_profile(&self, profile: UserProfile) -> UserSession {
        let auth = auth_session(&profile.id);
        self.store
            .insert_user_profile(&auth, &profile)
            .await
            .unwrap();
        let identity = RoleResolver::new(self.store.clone())
            .resolve(Some(&auth))
            .await
            .unwrap();
        UserSession::new(auth, identity)
    }

    pub fn volunteers(&self) -> VolunteerService {
        VolunteerService::new(self.store.clone())
    }

    pub fn activities(&self) -> ActivityService {
        ActivityService::new(self.store.clone())
    }

    pub fn dashboards(&self) -> DashboardService {
        DashboardService::new(self.store.clone())
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(self.store.clone())
    }

    /// A student whose volunteer profile has been approved by their unit.
    pub async fn approved_student(
        &self,
        id: &str,
        unit_id: &str,
        reviewer: &UserSession,
    ) -> UserSession {
        let student = self.sign_in(id, Role::Student, Some(unit_id)).await;
        let pending = self
            .volunteers()
            .register(&student, registration())
            .await
            .unwrap();
        self.volunteers().approve(reviewer, &pending).await.unwrap();
        student
    }
}
