//! NSS Platform client library
//!
//! Volunteer management for National Service Scheme units on top of a
//! Supabase backend: registration, volunteer review and certification,
//! activity submission and review, role dashboards and CSV exports.
//!
//! ```no_run
//! use nss_platform::prelude::*;
//!
//! # async fn run() -> nss_platform::error::Result<()> {
//! let nss = Nss::new(NssConfig::from_env()?)?;
//! let session = nss.sign_in("po@college.edu", "secret-password").await?;
//! let dashboard = nss.dashboards().load(&session).await?;
//! println!("{:?}", dashboard);
//! nss.sign_out(session).await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod activity;
pub mod admin;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod models;
pub mod role;
pub mod session;
pub mod store;
pub mod units;
pub mod volunteer;

use std::sync::Arc;

use chrono::Utc;
use nss_auth::{Auth, AuthOptions, Session, SignUpOutcome, User};
use nss_postgrest::PostgrestClient;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::account::{SignUpForm, SignUpResult};
use crate::activity::ActivityService;
use crate::admin::AdminService;
use crate::config::NssConfig;
use crate::dashboard::DashboardService;
use crate::error::{Error, Result};
use crate::models::UserProfile;
use crate::role::RoleResolver;
use crate::session::{claimed_role, UserSession};
use crate::store::{SharedStore, SupabaseStore};
use crate::units::UnitService;
use crate::volunteer::VolunteerService;

/// SQL function that copies a user's profile role into their token claims.
pub const SYNC_ROLE_CLAIM_FN: &str = "sync_role_claim";

/// The main entry point
pub struct Nss {
    config: NssConfig,
    http_client: Client,
    auth: Auth,
    store: SharedStore,
}

impl Nss {
    /// Creates a client backed by the configured Supabase project.
    pub fn new(config: NssConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        let store: SharedStore = Arc::new(SupabaseStore::new(&config, http_client.clone()));
        Ok(Self::with_parts(config, http_client, store))
    }

    /// Creates a client whose records live in `store` instead of the
    /// project's database. Authentication still goes to the configured URL.
    pub fn with_store(config: NssConfig, store: SharedStore) -> Self {
        Self::with_parts(config, Client::new(), store)
    }

    pub fn from_env() -> Result<Self> {
        Self::new(NssConfig::from_env()?)
    }

    fn with_parts(config: NssConfig, http_client: Client, store: SharedStore) -> Self {
        let auth = Auth::new(
            &config.base_url(),
            &config.anon_key,
            http_client.clone(),
            AuthOptions {
                client_info: config.options.client_info.clone(),
            },
        );
        Self {
            config,
            http_client,
            auth,
            store,
        }
    }

    pub fn config(&self) -> &NssConfig {
        &self.config
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn resolver(&self) -> RoleResolver {
        RoleResolver::new(self.store.clone())
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

    pub fn units(&self) -> UnitService {
        UnitService::new(self.store.clone())
    }

    /// Registers an account and its profile.
    ///
    /// When the backend requires email confirmation no session exists yet;
    /// the profile is then created from the metadata on the backend side.
    pub async fn sign_up(&self, form: SignUpForm) -> Result<SignUpResult> {
        form.check()?;

        let outcome = self
            .auth
            .sign_up(&form.email, &form.password, form.metadata())
            .await?;

        let auth = match outcome {
            SignUpOutcome::SignedIn(session) => session,
            SignUpOutcome::ConfirmationRequired(user) => {
                info!(user_id = %user.id, "sign up awaits email confirmation");
                return Ok(SignUpResult::ConfirmationRequired { user_id: user.id });
            }
        };

        if self.store.user_profile(&auth, &auth.user.id).await?.is_none() {
            let profile = UserProfile {
                id: auth.user.id.clone(),
                email: form.email.clone(),
                full_name: form.full_name.trim().to_string(),
                role: form.role,
                unit_id: form.unit_id.clone(),
                phone: None,
                college: None,
                district: None,
                created_at: Utc::now(),
            };
            self.store.insert_user_profile(&auth, &profile).await?;
        }

        self.establish(auth).await.map(SignUpResult::SignedIn)
    }

    /// Signs in and resolves the caller's role.
    ///
    /// The role claim cached in the access token is compared with the
    /// profile once per sign-in and re-synchronized when they differ.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserSession> {
        let auth = self.auth.sign_in_with_password(email, password).await?;
        self.establish(auth).await
    }

    /// Ends the session on the backend. The session is consumed either way.
    pub async fn sign_out(&self, session: UserSession) -> Result<()> {
        let user_id = session.user_id().to_string();
        self.auth.sign_out(session.into_auth()).await?;
        info!(user_id = %user_id, "signed out");
        Ok(())
    }

    /// Exchanges the refresh token for a new access token.
    pub async fn refresh_session(&self, session: UserSession) -> Result<UserSession> {
        let auth = self.auth.refresh_session(session.auth()).await?;
        Ok(session.with_auth(auth))
    }

    /// Re-reads the caller's role and unit from the profile.
    pub async fn refresh_identity(&self, session: UserSession) -> Result<UserSession> {
        let identity = self.resolver().resolve(Some(session.auth())).await?;
        Ok(session.with_identity(identity))
    }

    /// The auth user behind the session, as the backend sees it.
    pub async fn current_user(&self, session: &UserSession) -> Result<User> {
        Ok(self.auth.get_user(session.auth()).await?)
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        Ok(self.auth.reset_password_for_email(email).await?)
    }

    async fn establish(&self, auth: Session) -> Result<UserSession> {
        let identity = self.resolver().resolve(Some(&auth)).await?;

        let auth = match claimed_role(&auth.access_token) {
            Some(claimed) if claimed == identity.role => auth,
            claimed => {
                warn!(
                    user_id = %identity.user_id,
                    claimed = ?claimed,
                    role = %identity.role,
                    "role claim out of date, synchronizing"
                );
                self.sync_role_claim(&auth, &identity.user_id).await?;
                self.auth.refresh_session(&auth).await?
            }
        };

        info!(user_id = %identity.user_id, role = %identity.role, "signed in");
        Ok(UserSession::new(auth, identity))
    }

    async fn sync_role_claim(&self, auth: &Session, user_id: &str) -> Result<()> {
        PostgrestClient::rpc(
            &self.config.base_url(),
            &self.config.anon_key,
            SYNC_ROLE_CLAIM_FN,
            json!({ "user_id": user_id }),
            self.http_client.clone(),
        )?
        .with_schema(&self.config.options.db_schema)?
        .with_auth(&auth.access_token)?
        .call_rpc::<Value>()
        .await?;
        Ok(())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::account::{SignUpForm, SignUpResult};
    pub use crate::activity::{ActivityForm, BloodDonationForm, TreeTaggingForm};
    pub use crate::config::{ClientOptions, NssConfig};
    pub use crate::dashboard::Dashboard;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::role::{guard, GateDecision, Identity, Role, View};
    pub use crate::session::UserSession;
    pub use crate::store::{MemoryStore, RecordStore, SharedStore, SupabaseStore};
    pub use crate::volunteer::VolunteerRegistration;
    pub use crate::Nss;
}
