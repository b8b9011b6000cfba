use std::fmt;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use super::errors::{AccountError, Result};
use super::validators::{ensure_email_available, validate_required};
use crate::modules::storage::{decode_value, DurableStore, StoreError};
use crate::modules::utils::logging::log_data_operation;
use crate::modules::utils::time::get_current_timestamp_millis;
use crate::USERS_KEY;

/// Identifier assigned to a user at registration; never changes afterwards
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single registered account as persisted in the store
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password: String, // Stored verbatim
}

/// Owns the ordered collection of user records kept under one store key.
///
/// Every read loads the full collection and every write replaces it, so the store
/// never holds a half-updated directory.
pub struct UserDirectory {
    store: Arc<dyn DurableStore>,
    users_key: String,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_key(store, USERS_KEY)
    }

    pub fn with_key(store: Arc<dyn DurableStore>, users_key: impl Into<String>) -> Self {
        Self {
            store,
            users_key: users_key.into(),
        }
    }

    /// All records in insertion order
    pub fn records(&self) -> Result<Vec<UserRecord>> {
        let Some(value) = self.store.get(&self.users_key)? else {
            return Ok(Vec::new());
        };

        match decode_value(&self.users_key, value) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("{}; treating directory as empty", e);
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, records: &[UserRecord]) -> Result<()> {
        let value = serde_json::to_value(records).map_err(|source| StoreError::Serialize {
            key: self.users_key.clone(),
            source,
        })?;
        self.store.set(&self.users_key, value)?;
        Ok(())
    }

    /// Function to add a new user to the directory
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<UserRecord> {
        validate_required(&[("name", name), ("email", email), ("password", password)])?;

        let mut records = self.records()?;
        if let Err(e) = ensure_email_available(&records, email, None) {
            log_data_operation("register", email, "user_directory", false, Some("duplicate email"));
            return Err(e);
        }

        let record = UserRecord {
            id: next_id(&records)?,
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        records.push(record.clone());
        self.persist(&records)?;

        log_data_operation("register", email, "user_directory", true, None);
        Ok(record)
    }

    /// First record matching both fields exactly, in insertion order
    pub fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .find(|record| record.email == email && record.password == password))
    }

    pub fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.records()?.into_iter().find(|record| record.id == id))
    }

    /// Replace the name and email of the record with `target_id`.
    ///
    /// The record keeps its id and password. Moving to an email another record holds is
    /// rejected; keeping one's own email is not.
    pub fn update_profile(
        &self,
        target_id: UserId,
        new_name: &str,
        new_email: &str,
    ) -> Result<UserRecord> {
        validate_required(&[("name", new_name), ("email", new_email)])?;

        let mut records = self.records()?;
        ensure_email_available(&records, new_email, Some(target_id))?;

        let Some(record) = records.iter_mut().find(|record| record.id == target_id) else {
            return Err(AccountError::NotFound { id: target_id });
        };
        record.name = new_name.to_string();
        record.email = new_email.to_string();
        let updated = record.clone();

        self.persist(&records)?;
        log_data_operation("update_profile", new_email, "user_directory", true, None);
        Ok(updated)
    }
}

/// Millisecond timestamp, bumped past the largest existing id so ids stay unique
fn next_id(records: &[UserRecord]) -> Result<UserId> {
    let now = get_current_timestamp_millis();
    let Some(last) = records.iter().map(|record| record.id).max() else {
        return Ok(UserId(now));
    };
    let floor = last
        .0
        .checked_add(1)
        .ok_or(AccountError::IdExhausted { last })?;
    Ok(UserId(now.max(floor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::MemoryStore;
    use serde_json::json;

    fn setup_test_directory() -> (UserDirectory, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let directory = UserDirectory::new(store.clone());
        (directory, store)
    }

    #[test]
    fn test_register_persists_record() {
        let (directory, store) = setup_test_directory();

        let ann = directory.register("Ann", "a@x.com", "pw1").unwrap();
        assert_eq!(ann.name, "Ann");
        assert_eq!(ann.email, "a@x.com");
        assert_eq!(ann.password, "pw1");

        let stored = store.get(USERS_KEY).unwrap().unwrap();
        let records: Vec<UserRecord> = serde_json::from_value(stored).unwrap();
        assert_eq!(records, vec![ann]);
    }

    #[test]
    fn test_register_rejects_duplicate_email() {
        let (directory, _store) = setup_test_directory();
        directory.register("Ann", "a@x.com", "pw1").unwrap();

        let result = directory.register("Bob", "a@x.com", "pw2");
        assert!(matches!(result, Err(AccountError::DuplicateEmail { .. })));

        // Directory unchanged
        let records = directory.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Ann");
    }

    #[test]
    fn test_register_requires_all_fields() {
        let (directory, _store) = setup_test_directory();

        for (name, email, password, field) in [
            ("", "a@x.com", "pw", "name"),
            ("Ann", "   ", "pw", "email"),
            ("Ann", "a@x.com", "", "password"),
        ] {
            let result = directory.register(name, email, password);
            assert!(
                matches!(result, Err(AccountError::ValidationFailed { field: f }) if f == field),
                "expected {} to be reported",
                field
            );
        }
        assert!(directory.records().unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let (directory, _store) = setup_test_directory();

        let ids: Vec<UserId> = (0..5)
            .map(|i| {
                directory
                    .register("User", &format!("u{}@x.com", i), "pw")
                    .unwrap()
                    .id
            })
            .collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_register_refuses_to_reuse_max_id() {
        let (directory, store) = setup_test_directory();
        store
            .set(
                USERS_KEY,
                json!([{"id": u64::MAX, "name": "Max", "email": "m@x.com", "password": "pw"}]),
            )
            .unwrap();

        assert!(matches!(
            directory.register("Ann", "a@x.com", "pw1"),
            Err(AccountError::IdExhausted { last: UserId(u64::MAX) })
        ));
        assert_eq!(directory.records().unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_credentials() {
        let (directory, _store) = setup_test_directory();
        let ann = directory.register("Ann", "a@x.com", "pw1").unwrap();
        directory.register("Bob", "b@x.com", "pw2").unwrap();

        assert_eq!(
            directory.find_by_credentials("a@x.com", "pw1").unwrap(),
            Some(ann)
        );
        assert!(directory
            .find_by_credentials("a@x.com", "pw2")
            .unwrap()
            .is_none());
        assert!(directory
            .find_by_credentials("A@x.com", "pw1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_update_profile_in_place() {
        let (directory, _store) = setup_test_directory();
        let ann = directory.register("Ann", "a@x.com", "pw1").unwrap();
        let bob = directory.register("Bob", "b@x.com", "pw2").unwrap();

        let updated = directory
            .update_profile(ann.id, "Annie", "annie@x.com")
            .unwrap();
        assert_eq!(updated.id, ann.id);
        assert_eq!(updated.password, "pw1");
        assert_eq!(updated.name, "Annie");

        // Order and the other record are untouched
        let records = directory.records().unwrap();
        assert_eq!(records[0], updated);
        assert_eq!(records[1], bob);
    }

    #[test]
    fn test_update_profile_self_collision_allowed() {
        let (directory, _store) = setup_test_directory();
        let ann = directory.register("Ann", "a@x.com", "pw1").unwrap();

        assert!(directory.update_profile(ann.id, "Ann", "a@x.com").is_ok());
        assert!(directory.update_profile(ann.id, "Annie", "a@x.com").is_ok());
    }

    #[test]
    fn test_update_profile_errors() {
        let (directory, _store) = setup_test_directory();
        let ann = directory.register("Ann", "a@x.com", "pw1").unwrap();
        directory.register("Bob", "b@x.com", "pw2").unwrap();

        assert!(matches!(
            directory.update_profile(ann.id, "Ann", "b@x.com"),
            Err(AccountError::DuplicateEmail { .. })
        ));
        assert!(matches!(
            directory.update_profile(ann.id, " ", "a@x.com"),
            Err(AccountError::ValidationFailed { field: "name" })
        ));
        assert!(matches!(
            directory.update_profile(UserId(1), "Ghost", "ghost@x.com"),
            Err(AccountError::NotFound { id: UserId(1) })
        ));

        // Failed updates leave the record alone
        assert_eq!(directory.find_by_id(ann.id).unwrap().unwrap().email, "a@x.com");
    }

    #[test]
    fn test_unreadable_collection_is_empty() {
        let (directory, store) = setup_test_directory();
        store.set(USERS_KEY, json!({"not": "an array"})).unwrap();

        assert!(directory.records().unwrap().is_empty());
        assert!(directory.register("Ann", "a@x.com", "pw1").is_ok());
        assert_eq!(directory.records().unwrap().len(), 1);
    }

    #[test]
    fn test_reads_plain_json_records() {
        let (directory, store) = setup_test_directory();
        store
            .set(
                USERS_KEY,
                json!([{"name": "Ann", "email": "a@x.com", "password": "pw1", "id": 1700000000000u64}]),
            )
            .unwrap();

        let found = directory.find_by_credentials("a@x.com", "pw1").unwrap().unwrap();
        assert_eq!(found.id, UserId(1_700_000_000_000));
    }
}
