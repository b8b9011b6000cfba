use super::directory::{UserId, UserRecord};
use super::errors::{AccountError, Result};

/// True when the value is empty or only whitespace
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Function to check that every named field carries a non-blank value.
///
/// Fields are checked in order and the first blank one is reported.
pub fn validate_required(fields: &[(&'static str, &str)]) -> Result<()> {
    match fields.iter().find(|(_, value)| is_blank(value)) {
        Some((field, _)) => Err(AccountError::ValidationFailed { field: *field }),
        None => Ok(()),
    }
}

/// Login only rejects truly empty input; whitespace is left to the credential match
pub fn validate_login_fields(email: &str, password: &str) -> Result<()> {
    if email.is_empty() || password.is_empty() {
        return Err(AccountError::MissingFields);
    }
    Ok(())
}

/// Function to check that no record other than `exclude` already uses `email`.
///
/// Comparison is exact and case-sensitive.
pub fn ensure_email_available(
    records: &[UserRecord],
    email: &str,
    exclude: Option<UserId>,
) -> Result<()> {
    let taken = records
        .iter()
        .any(|record| record.email == email && Some(record.id) != exclude);

    if taken {
        return Err(AccountError::DuplicateEmail {
            email: email.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, email: &str) -> UserRecord {
        UserRecord {
            id: UserId(id),
            name: "Test".to_string(),
            email: email.to_string(),
            password: "pw".to_string(),
        }
    }

    #[test]
    fn test_required_fields() {
        assert!(validate_required(&[("name", "Ann"), ("email", "a@x.com")]).is_ok());

        assert!(matches!(
            validate_required(&[("name", ""), ("email", "a@x.com")]),
            Err(AccountError::ValidationFailed { field: "name" })
        ));

        // Whitespace-only counts as missing
        assert!(matches!(
            validate_required(&[("name", "Ann"), ("email", "  \t")]),
            Err(AccountError::ValidationFailed { field: "email" })
        ));
    }

    #[test]
    fn test_login_fields() {
        assert!(validate_login_fields("a@x.com", "pw").is_ok());
        assert!(matches!(
            validate_login_fields("", "pw"),
            Err(AccountError::MissingFields)
        ));
        assert!(matches!(
            validate_login_fields("a@x.com", ""),
            Err(AccountError::MissingFields)
        ));
    }

    #[test]
    fn test_email_availability() {
        let records = vec![record(1, "a@x.com"), record(2, "b@x.com")];

        assert!(ensure_email_available(&records, "c@x.com", None).is_ok());
        assert!(matches!(
            ensure_email_available(&records, "a@x.com", None),
            Err(AccountError::DuplicateEmail { .. })
        ));

        // A record never collides with itself
        assert!(ensure_email_available(&records, "a@x.com", Some(UserId(1))).is_ok());
        assert!(ensure_email_available(&records, "b@x.com", Some(UserId(1))).is_err());

        // Case-sensitive exact match
        assert!(ensure_email_available(&records, "A@x.com", None).is_ok());
    }
}
