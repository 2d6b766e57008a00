//! Admin-only operations: user listing, role override and CSV exports

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::export;
use crate::models::UserProfile;
use crate::role::Role;
use crate::session::UserSession;
use crate::store::{ProfileFilter, SharedStore, SubmissionFilter, VolunteerFilter};

#[derive(Clone)]
pub struct AdminService {
    store: SharedStore,
}

impl AdminService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list_users(
        &self,
        session: &UserSession,
        role: Option<Role>,
    ) -> Result<Vec<UserProfile>> {
        session.identity().require(&[Role::Admin], "list users")?;
        self.store
            .list_user_profiles(
                session.auth(),
                &ProfileFilter {
                    role,
                    unit_id: None,
                },
            )
            .await
    }

    /// Overrides the role fixed at sign-up.
    ///
    /// Student and unit accounts need a unit that exists; admin accounts
    /// carry none. The affected user picks the change up at their next
    /// sign-in, when the role claim is synchronized.
    pub async fn reassign_role(
        &self,
        session: &UserSession,
        user_id: &str,
        role: Role,
        unit_id: Option<&str>,
    ) -> Result<UserProfile> {
        let identity = session.identity();
        identity.require(&[Role::Admin], "reassign roles")?;
        if user_id == identity.user_id {
            return Err(Error::unauthorized("admins may not change their own role"));
        }

        let unit_id = match (role.requires_unit(), unit_id) {
            (true, Some(id)) => {
                self.store
                    .unit(session.auth(), id)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("unit {}", id)))?;
                Some(id)
            }
            (true, None) => {
                return Err(Error::validation(
                    "unit_id",
                    format!("A {} account needs a unit", role),
                ))
            }
            (false, _) => None,
        };

        let updated = self
            .store
            .update_user_role(session.auth(), user_id, role, unit_id)
            .await?;
        warn!(
            user_id,
            actor = %identity.user_id,
            role = %updated.role,
            "role reassigned"
        );
        Ok(updated)
    }

    /// Every user as CSV.
    pub async fn export_users(&self, session: &UserSession) -> Result<String> {
        session.identity().require(&[Role::Admin], "export users")?;
        let auth = session.auth();

        let users = self
            .store
            .list_user_profiles(auth, &ProfileFilter::default())
            .await?;
        let units = self.store.list_units(auth).await?;
        let submissions = self
            .store
            .list_submissions(auth, &SubmissionFilter::default())
            .await?;

        info!(rows = users.len(), "exporting users");
        Ok(export::users_csv(&users, &units, &submissions))
    }

    /// Volunteer profiles as CSV. Unit accounts export their own unit;
    /// admins export `unit_id`, or every unit when `None`.
    pub async fn export_volunteers(
        &self,
        session: &UserSession,
        unit_id: Option<&str>,
    ) -> Result<String> {
        let unit_id = session
            .identity()
            .listing_scope(unit_id, "export volunteers")?;
        let auth = session.auth();

        let volunteers = self
            .store
            .list_volunteer_profiles(
                auth,
                &VolunteerFilter {
                    unit_id: unit_id.clone(),
                    status: None,
                },
            )
            .await?;
        let users = self
            .store
            .list_user_profiles(
                auth,
                &ProfileFilter {
                    role: Some(Role::Student),
                    unit_id,
                },
            )
            .await?;
        let units = self.store.list_units(auth).await?;

        info!(rows = volunteers.len(), "exporting volunteers");
        Ok(export::volunteers_csv(&volunteers, &users, &units))
    }
}
