use std::sync::Arc;

use log::{debug, warn};

use crate::modules::auth::validators::{
    ensure_email_available, validate_login_fields, validate_required,
};
use crate::modules::auth::{AccountError, Result, UserDirectory, UserId, UserRecord};
use crate::modules::storage::{decode_value, DurableStore, StoreError};
use crate::modules::utils::logging::{log_auth_event, log_data_operation};
use crate::{SESSION_KEY, USERS_KEY};

/// Value copy of the logged-in user's record, held apart from the directory entry
pub type SessionSnapshot = UserRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn(SessionSnapshot),
}

/// Owns the single "current session" slot and keeps it in step with the directory.
///
/// The snapshot is persisted under its own store key so a restarted process picks up
/// where the last one left off.
pub struct SessionManager {
    directory: UserDirectory,
    store: Arc<dyn DurableStore>,
    session_key: String,
    state: SessionState,
}

impl SessionManager {
    /// Open a manager over `store` using the default keys
    pub fn open(store: Arc<dyn DurableStore>) -> Result<Self> {
        Self::open_with_keys(store, USERS_KEY, SESSION_KEY)
    }

    pub fn open_with_keys(
        store: Arc<dyn DurableStore>,
        users_key: &str,
        session_key: &str,
    ) -> Result<Self> {
        let mut manager = Self {
            directory: UserDirectory::with_key(store.clone(), users_key),
            store,
            session_key: session_key.to_string(),
            state: SessionState::LoggedOut,
        };
        manager.state = manager.restore()?;
        Ok(manager)
    }

    /// Work out the starting state from whatever snapshot the last run persisted
    fn restore(&self) -> Result<SessionState> {
        let Some(value) = self.store.get(&self.session_key)? else {
            return Ok(SessionState::LoggedOut);
        };

        let snapshot: SessionSnapshot = match decode_value(&self.session_key, value) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{}; discarding session", e);
                self.store.remove(&self.session_key)?;
                return Ok(SessionState::LoggedOut);
            }
        };

        // A session must always point at a live directory record
        if self.directory.find_by_id(snapshot.id)?.is_none() {
            warn!(
                "Discarding session for user {} which is no longer in the directory",
                snapshot.id
            );
            self.store.remove(&self.session_key)?;
            return Ok(SessionState::LoggedOut);
        }

        debug!("Restored session for user {}", snapshot.id);
        Ok(SessionState::LoggedIn(snapshot))
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_session(&self) -> Option<&SessionSnapshot> {
        match &self.state {
            SessionState::LoggedIn(snapshot) => Some(snapshot),
            SessionState::LoggedOut => None,
        }
    }

    /// Create an account; the caller still has to log in afterwards
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<UserRecord> {
        self.directory.register(name, email, password)
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<SessionSnapshot> {
        validate_login_fields(email, password)?;

        let Some(record) = self.directory.find_by_credentials(email, password)? else {
            log_auth_event("login", email, false, Some("invalid credentials"));
            return Err(AccountError::InvalidCredentials);
        };

        self.persist_snapshot(&record)?;
        self.state = SessionState::LoggedIn(record.clone());
        log_auth_event("login", email, true, None);
        Ok(record)
    }

    /// Clear the session; safe to call when nobody is logged in
    pub fn logout(&mut self) -> Result<()> {
        if let SessionState::LoggedIn(snapshot) = &self.state {
            log_auth_event("logout", &snapshot.email, true, None);
        }
        self.state = SessionState::LoggedOut;
        self.store.remove(&self.session_key)?;
        Ok(())
    }

    /// Check a profile change against the directory without writing anything
    pub fn validate_profile_update(&self, name: &str, email: &str) -> Result<UserId> {
        let session = self
            .current_session()
            .ok_or(AccountError::NoActiveSession)?;

        validate_required(&[("name", name), ("email", email)])?;
        ensure_email_available(&self.directory.records()?, email, Some(session.id))?;
        Ok(session.id)
    }

    /// Write a profile change to the directory and refresh the snapshot from the result.
    ///
    /// This is the only place the session is reconciled with its directory entry. The
    /// update is refused if the session no longer belongs to `session_id`.
    pub fn apply_profile_update(
        &mut self,
        session_id: UserId,
        name: &str,
        email: &str,
    ) -> Result<SessionSnapshot> {
        match self.current_session() {
            Some(session) if session.id == session_id => {}
            _ => return Err(AccountError::NoActiveSession),
        }

        let record = self.directory.update_profile(session_id, name, email)?;
        self.persist_snapshot(&record)?;
        self.state = SessionState::LoggedIn(record.clone());
        log_data_operation("refresh_session", email, "session", true, None);
        Ok(record)
    }

    fn persist_snapshot(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let value = serde_json::to_value(snapshot).map_err(|source| StoreError::Serialize {
            key: self.session_key.clone(),
            source,
        })?;
        self.store.set(&self.session_key, value)?;
        Ok(())
    }
}
