//! Storage for learned profile attributes.
//!
//! A learn step is a read-modify-write on one `(user, key)` row. Stores run
//! the whole step under their lock so concurrent updates cannot lose writes.

use crate::models::UserProfileAttribute;
use crate::state::{StateManager, StoreError};
use log::debug;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Update applied inside [`ProfileStore::modify`]. Returning `None` leaves
/// the row untouched.
pub type AttributeUpdate<'a> =
    &'a mut (dyn FnMut(Option<&UserProfileAttribute>) -> Option<UserProfileAttribute> + Send);

pub trait ProfileStore: Send + Sync {
    fn get(&self, user_id: i64, key: &str) -> Result<Option<UserProfileAttribute>, StoreError>;

    fn upsert(&self, attribute: UserProfileAttribute) -> Result<(), StoreError>;

    /// All attributes for a user, ordered by key.
    fn list(&self, user_id: i64) -> Result<Vec<UserProfileAttribute>, StoreError>;

    /// Atomically read, transform and write one row.
    fn modify(
        &self,
        user_id: i64,
        key: &str,
        update: AttributeUpdate<'_>,
    ) -> Result<Option<UserProfileAttribute>, StoreError>;
}

type Rows = BTreeMap<(i64, String), UserProfileAttribute>;

fn apply(rows: &mut Rows, user_id: i64, key: &str, update: AttributeUpdate<'_>) -> Option<UserProfileAttribute> {
    let row_key = (user_id, key.to_string());
    let next = update(rows.get(&row_key))?;
    rows.insert(row_key, next.clone());
    Some(next)
}

fn rows_for(rows: &Rows, user_id: i64) -> Vec<UserProfileAttribute> {
    rows.range((user_id, String::new())..)
        .take_while(|((uid, _), _)| *uid == user_id)
        .map(|(_, attr)| attr.clone())
        .collect()
}

/// Process-local store, used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryProfileStore {
    rows: Mutex<Rows>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, user_id: i64, key: &str) -> Result<Option<UserProfileAttribute>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(&(user_id, key.to_string())).cloned())
    }

    fn upsert(&self, attribute: UserProfileAttribute) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        rows.insert((attribute.user_id, attribute.key.clone()), attribute);
        Ok(())
    }

    fn list(&self, user_id: i64) -> Result<Vec<UserProfileAttribute>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows_for(&rows, user_id))
    }

    fn modify(
        &self,
        user_id: i64,
        key: &str,
        update: AttributeUpdate<'_>,
    ) -> Result<Option<UserProfileAttribute>, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(apply(&mut rows, user_id, key, update))
    }
}

/// File-backed store. The lock is held across load and save.
pub struct JsonProfileStore {
    state: StateManager,
    lock: Mutex<()>,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { state: StateManager::new(path), lock: Mutex::new(()) }
    }

    fn load_rows(&self) -> Result<Rows, StoreError> {
        let items: Vec<UserProfileAttribute> = self.state.load()?;
        Ok(items.into_iter().map(|a| ((a.user_id, a.key.clone()), a)).collect())
    }

    fn save_rows(&self, rows: &Rows) -> Result<(), StoreError> {
        let items: Vec<&UserProfileAttribute> = rows.values().collect();
        debug!("Saving {} profile attributes to {:?}", items.len(), self.state.path());
        self.state.save(&items)
    }
}

impl ProfileStore for JsonProfileStore {
    fn get(&self, user_id: i64, key: &str) -> Result<Option<UserProfileAttribute>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load_rows()?.remove(&(user_id, key.to_string())))
    }

    fn upsert(&self, attribute: UserProfileAttribute) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut rows = self.load_rows()?;
        rows.insert((attribute.user_id, attribute.key.clone()), attribute);
        self.save_rows(&rows)
    }

    fn list(&self, user_id: i64) -> Result<Vec<UserProfileAttribute>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows_for(&self.load_rows()?, user_id))
    }

    fn modify(
        &self,
        user_id: i64,
        key: &str,
        update: AttributeUpdate<'_>,
    ) -> Result<Option<UserProfileAttribute>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut rows = self.load_rows()?;
        let updated = apply(&mut rows, user_id, key, update);
        if updated.is_some() {
            self.save_rows(&rows)?;
        }
        Ok(updated)
    }
}
