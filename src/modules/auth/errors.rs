//! Error types for the account directory and session slot
use thiserror::Error;

use super::directory::UserId;
use crate::modules::storage::StoreError;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{field} is required")]
    ValidationFailed { field: &'static str },

    #[error("A user with email '{email}' already exists")]
    DuplicateEmail { email: String },

    #[error("Email and password are both required")]
    MissingFields,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found: {id}")]
    NotFound { id: UserId },

    #[error("No user id is left after {last}")]
    IdExhausted { last: UserId },

    #[error("No active session")]
    NoActiveSession,

    #[error("A profile save is already in progress")]
    SaveInProgress,

    #[error("Profile save did not complete: {reason}")]
    SaveInterrupted { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccountError {
    /// True for errors the caller can fix by changing its input
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AccountError::ValidationFailed { .. }
                | AccountError::DuplicateEmail { .. }
                | AccountError::MissingFields
                | AccountError::InvalidCredentials
        )
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AccountError::ValidationFailed { field: "name" };
        assert_eq!(err.to_string(), "name is required");

        let err = AccountError::DuplicateEmail {
            email: "a@x.com".to_string(),
        };
        assert_eq!(err.to_string(), "A user with email 'a@x.com' already exists");

        let err = AccountError::NotFound { id: UserId(42) };
        assert_eq!(err.to_string(), "User not found: 42");
    }

    #[test]
    fn test_user_error_classification() {
        assert!(AccountError::InvalidCredentials.is_user_error());
        assert!(AccountError::MissingFields.is_user_error());
        assert!(!AccountError::SaveInProgress.is_user_error());
        assert!(!AccountError::NoActiveSession.is_user_error());
    }
}
