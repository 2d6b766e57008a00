//! Unit reference data

use crate::error::{Error, Result};
use crate::models::UnitProfile;
use crate::session::UserSession;
use crate::store::SharedStore;

/// Read access to units and their Program Officers. Any signed-in role may
/// read them.
#[derive(Clone)]
pub struct UnitService {
    store: SharedStore,
}

impl UnitService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// All units, ordered by unit number.
    pub async fn list(&self, session: &UserSession) -> Result<Vec<UnitProfile>> {
        self.store.list_units(session.auth()).await
    }

    pub async fn get(&self, session: &UserSession, id: &str) -> Result<UnitProfile> {
        self.store
            .unit(session.auth(), id)
            .await?
            .ok_or_else(|| Error::not_found(format!("unit {}", id)))
    }

    /// The caller's own unit, if the account has one.
    pub async fn mine(&self, session: &UserSession) -> Result<Option<UnitProfile>> {
        match session.unit_id() {
            Some(id) => self.store.unit(session.auth(), id).await,
            None => Ok(None),
        }
    }
}
