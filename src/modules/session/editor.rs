use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::manager::{SessionManager, SessionSnapshot};
use crate::modules::auth::{AccountError, Result, UserId};

/// Session manager shared between the caller and in-flight profile saves
pub type SharedSession = Arc<Mutex<SessionManager>>;

/// Editable copy of the profile fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub name: String,
    pub email: String,
}

impl EditDraft {
    fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            email: snapshot.email.clone(),
        }
    }
}

/// Observable phase of the profile editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Viewing,
    Editing,
    Saving,
}

#[derive(Debug)]
enum EditState {
    Viewing,
    Editing(EditDraft),
    Saving(EditDraft),
}

struct EditorInner {
    session: SharedSession,
    state: Mutex<EditState>,
    save_latency: Duration,
}

/// Session-bound profile editing with a single in-flight save.
///
/// Cloning gives another handle to the same editor.
#[derive(Clone)]
pub struct ProfileEditor {
    inner: Arc<EditorInner>,
}

/// Handle to a save running in the background.
///
/// Dropping it does not abort the save.
#[derive(Debug)]
pub struct PendingSave {
    handle: JoinHandle<Result<SessionSnapshot>>,
}

impl PendingSave {
    pub async fn wait(self) -> Result<SessionSnapshot> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(AccountError::SaveInterrupted {
                reason: e.to_string(),
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProfileEditor {
    pub fn new(session: SharedSession, save_latency: Duration) -> Self {
        Self {
            inner: Arc::new(EditorInner {
                session,
                state: Mutex::new(EditState::Viewing),
                save_latency,
            }),
        }
    }

    pub fn phase(&self) -> EditPhase {
        match *lock(&self.inner.state) {
            EditState::Viewing => EditPhase::Viewing,
            EditState::Editing(_) => EditPhase::Editing,
            EditState::Saving(_) => EditPhase::Saving,
        }
    }

    /// Draft currently being edited or saved, if any
    pub fn draft(&self) -> Option<EditDraft> {
        match &*lock(&self.inner.state) {
            EditState::Viewing => None,
            EditState::Editing(draft) | EditState::Saving(draft) => Some(draft.clone()),
        }
    }

    fn active_session(&self) -> Result<SessionSnapshot> {
        lock(&self.inner.session)
            .current_session()
            .cloned()
            .ok_or(AccountError::NoActiveSession)
    }

    /// Start editing with a draft seeded from the session snapshot
    pub fn begin_edit(&self) -> Result<EditDraft> {
        let mut state = lock(&self.inner.state);
        if matches!(*state, EditState::Saving(_)) {
            return Err(AccountError::SaveInProgress);
        }

        let draft = EditDraft::from_snapshot(&self.active_session()?);
        *state = EditState::Editing(draft.clone());
        Ok(draft)
    }

    /// Throw away the draft and return one re-seeded from the untouched snapshot.
    ///
    /// Rejected with `SaveInProgress` while a save is running.
    pub fn cancel_edit(&self) -> Result<EditDraft> {
        let mut state = lock(&self.inner.state);
        if matches!(*state, EditState::Saving(_)) {
            return Err(AccountError::SaveInProgress);
        }

        let draft = EditDraft::from_snapshot(&self.active_session()?);
        *state = EditState::Viewing;
        Ok(draft)
    }

    /// Validate `draft` and start saving it.
    ///
    /// Validation happens now; the directory write happens after the save latency on a
    /// background task. A failed validation leaves the editor in `Editing` with the
    /// draft kept for correction. Must be called from within a tokio runtime.
    pub fn submit(&self, draft: EditDraft) -> Result<PendingSave> {
        let mut state = lock(&self.inner.state);
        if matches!(*state, EditState::Saving(_)) {
            return Err(AccountError::SaveInProgress);
        }

        let checked = lock(&self.inner.session).validate_profile_update(&draft.name, &draft.email);
        let session_id = match checked {
            Ok(id) => id,
            Err(AccountError::NoActiveSession) => {
                *state = EditState::Viewing;
                return Err(AccountError::NoActiveSession);
            }
            Err(e) => {
                *state = EditState::Editing(draft);
                return Err(e);
            }
        };

        let runtime = Handle::try_current().map_err(|e| AccountError::SaveInterrupted {
            reason: e.to_string(),
        })?;

        *state = EditState::Saving(draft.clone());
        drop(state);

        debug!("Profile save for user {} scheduled", session_id);
        // Built before spawning so a task dropped before its first poll still resets the state
        let guard = SavingGuard {
            inner: Arc::clone(&self.inner),
            draft,
            settled: false,
        };
        let handle = runtime.spawn(complete_save(guard, session_id));
        Ok(PendingSave { handle })
    }

    /// Submit and wait for the save to finish
    pub async fn save(&self, draft: EditDraft) -> Result<SessionSnapshot> {
        self.submit(draft)?.wait().await
    }
}

/// Owns the `Saving` phase of one save.
///
/// `settle` records the outcome under the state lock. A guard dropped unsettled puts
/// the editor back into `Editing` with its draft.
struct SavingGuard {
    inner: Arc<EditorInner>,
    draft: EditDraft,
    settled: bool,
}

impl SavingGuard {
    fn settle(&mut self, result: &Result<SessionSnapshot>) {
        let mut state = lock(&self.inner.state);
        *state = match result {
            Ok(_) | Err(AccountError::NoActiveSession) => EditState::Viewing,
            Err(_) => EditState::Editing(self.draft.clone()),
        };
        // Disarmed before the lock is released so a later save's phase is never touched
        self.settled = true;
    }
}

impl Drop for SavingGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock(&self.inner.state);
        if matches!(*state, EditState::Saving(_)) {
            *state = EditState::Editing(self.draft.clone());
        }
    }
}

async fn complete_save(mut guard: SavingGuard, session_id: UserId) -> Result<SessionSnapshot> {
    tokio::time::sleep(guard.inner.save_latency).await;

    let result = lock(&guard.inner.session).apply_profile_update(
        session_id,
        &guard.draft.name,
        &guard.draft.email,
    );
    guard.settle(&result);

    match &result {
        Ok(snapshot) => debug!("Profile save for user {} completed", snapshot.id),
        Err(e) => debug!("Profile save for user {} failed: {}", session_id, e),
    }
    result
}
