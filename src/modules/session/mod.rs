pub mod editor;
pub mod manager;

pub use editor::{EditDraft, EditPhase, PendingSave, ProfileEditor, SharedSession};
pub use manager::{SessionManager, SessionSnapshot, SessionState};
