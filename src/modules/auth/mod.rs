pub mod directory;
pub mod errors;
pub mod validators;

// Re-export the main types and functions
pub use directory::{UserDirectory, UserId, UserRecord};
pub use errors::{AccountError, Result};
pub use validators::{ensure_email_available, validate_login_fields, validate_required};
