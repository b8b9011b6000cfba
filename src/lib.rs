// First, declare the modules folder itself
mod modules;

// Re-export everything from modules for easier access
pub use modules::{auth, config, session, storage, utils};

// Re-export commonly used types
pub use modules::auth::{AccountError, Result, UserDirectory, UserId, UserRecord};
pub use modules::config::AppConfig;
pub use modules::session::{
    EditDraft, EditPhase, PendingSave, ProfileEditor, SessionManager, SessionSnapshot,
    SessionState, SharedSession,
};
pub use modules::storage::{DurableStore, JsonFileStore, MemoryStore, StoreError};

// Constants
pub const USERS_KEY: &str = "users";
pub const SESSION_KEY: &str = "currentUser";
pub const DEFAULT_STORE_FILE: &str = "accounts.json";
pub const DEFAULT_CONFIG_FILE: &str = "one-do-account.json";
pub const DEFAULT_SAVE_LATENCY_MS: u64 = 800;
