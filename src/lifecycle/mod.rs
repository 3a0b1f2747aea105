//! Session lifecycle management
//!
//! Owns the in-memory session list (global mode) or the single tab-bound
//! session (copilot mode) and reconciles it across user-driven changes.
//! The two modes are separate types behind one capability surface:
//! [`GlobalSessionLifecycle`] carries the list plus create/rename/delete;
//! [`CopilotSessionLifecycle`] carries only tab resolution, so illegal
//! operations do not exist on it. [`SessionController`] selects the variant
//! once per instance by mode and is the only place a copilot-mode
//! create/rename/delete is turned into a user-visible "unsupported" notice.
//!
//! Concurrency discipline: state lives behind a mutex that is never held
//! across an await. Every async operation captures its intended target
//! (selected session id, tab id) and the edit epoch before suspending, and
//! re-checks under the lock before applying results, so a completion that
//! arrives after the state moved on is discarded rather than applied.
//!
//! Rename UI contract: blur and Enter both call `submit_rename`, Escape
//! calls `cancel_rename`.

pub mod copilot;
pub mod global;

use async_trait::async_trait;
use std::sync::Arc;

use crate::envelope::CopilotEnvelope;
use crate::error::{CopilotError, Localize, Notice, Notify};
use crate::ids::{SessionId, TabId};
use crate::store::SessionStore;
use crate::types::{ChatMessage, ChatMode, ChatSession};

pub use copilot::CopilotSessionLifecycle;
pub use global::GlobalSessionLifecycle;

// ============================================================================
// State
// ============================================================================

/// In-flight rename edit buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct RenameEdit {
    pub session_id: SessionId,
    pub value: String,
    /// Guards against duplicate submits; reset whenever the edited session
    /// changes or a submit fails.
    pub(crate) submitted: bool,
}

/// Snapshot of lifecycle state, cloned out for observers.
#[derive(Clone, Debug, Default)]
pub struct LifecycleState {
    pub sessions: Vec<ChatSession>,
    pub selected: Option<SessionId>,
    pub initial_messages: Vec<ChatMessage>,
    pub loading_sessions: bool,
    pub loading_messages: bool,
    pub creating_session: bool,
    pub editing: Option<RenameEdit>,
    pub rename_submitting: Option<SessionId>,
    pub delete_target: Option<SessionId>,
    pub deleting: bool,
    /// Bumped by every optimistic local edit and rollback; a list refresh
    /// that observed an older epoch is stale and must be discarded.
    pub(crate) edit_epoch: u64,
    /// Copilot mode only: the tab the state belongs to.
    pub(crate) tab: Option<TabId>,
}

/// Which session a list refresh should try to select afterwards.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SelectPreference {
    /// Keep the currently selected id when still present
    Keep,
    /// Bias toward a specific id (e.g. just created)
    Prefer(SessionId),
    /// Drop the previous selection entirely (e.g. it was just deleted)
    Clear,
}

// ============================================================================
// Capability trait
// ============================================================================

/// Operations both lifecycle variants share.
#[async_trait]
pub trait SessionLifecycle: Send + Sync {
    /// Clone out the current state.
    fn snapshot(&self) -> LifecycleState;

    /// Re-run the mode's reconciliation: a list fetch in global mode, tab
    /// resolution in copilot mode.
    async fn refresh(&self) -> Result<(), CopilotError>;
}

// ============================================================================
// Controller
// ============================================================================

/// Mode-selected lifecycle, chosen once at construction.
pub enum SessionController {
    Global(GlobalSessionLifecycle),
    Copilot(CopilotSessionLifecycle),
}

impl SessionController {
    pub fn new(
        mode: ChatMode,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notify>,
        locale: Arc<dyn Localize>,
    ) -> Self {
        match mode {
            ChatMode::Global => {
                Self::Global(GlobalSessionLifecycle::new(store, notifier, locale))
            }
            ChatMode::Copilot => {
                Self::Copilot(CopilotSessionLifecycle::new(store, notifier, locale))
            }
        }
    }

    pub fn mode(&self) -> ChatMode {
        match self {
            Self::Global(_) => ChatMode::Global,
            Self::Copilot(_) => ChatMode::Copilot,
        }
    }

    pub fn snapshot(&self) -> LifecycleState {
        match self {
            Self::Global(g) => g.snapshot(),
            Self::Copilot(c) => c.snapshot(),
        }
    }

    pub async fn refresh(&self) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.refresh().await,
            Self::Copilot(c) => c.refresh().await,
        }
    }

    /// Select a session by id. Copilot mode has no list; selection there is
    /// driven by tab resolution, so this is a no-op.
    pub async fn select(&self, id: SessionId) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.select(id).await,
            Self::Copilot(_) => Ok(()),
        }
    }

    pub async fn create_session(&self) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.create().await,
            Self::Copilot(c) => Err(c.unsupported_operation()),
        }
    }

    pub fn begin_rename(&self, id: SessionId) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.begin_rename(id),
            Self::Copilot(c) => Err(c.unsupported_operation()),
        }
    }

    pub fn set_rename_value(&self, value: impl Into<String>) {
        if let Self::Global(g) = self {
            g.set_rename_value(value);
        }
    }

    pub fn cancel_rename(&self) {
        if let Self::Global(g) = self {
            g.cancel_rename();
        }
    }

    pub async fn submit_rename(&self) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.submit_rename().await,
            Self::Copilot(c) => Err(c.unsupported_operation()),
        }
    }

    pub fn request_delete(&self, id: SessionId) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.request_delete(id),
            Self::Copilot(c) => Err(c.unsupported_operation()),
        }
    }

    /// Dismiss the delete confirmation dialog. Returns false when a delete
    /// is in flight and `force` was not set.
    pub fn dismiss_delete(&self, force: bool) -> bool {
        match self {
            Self::Global(g) => g.dismiss_delete(force),
            Self::Copilot(_) => true,
        }
    }

    pub async fn confirm_delete(&self) -> Result<(), CopilotError> {
        match self {
            Self::Global(g) => g.confirm_delete().await,
            Self::Copilot(c) => Err(c.unsupported_operation()),
        }
    }

    /// Feed the current envelope into copilot tab resolution. Global mode
    /// ignores envelopes entirely.
    pub async fn observe_envelope(
        &self,
        envelope: Option<&CopilotEnvelope>,
    ) -> Result<(), CopilotError> {
        match self {
            Self::Global(_) => Ok(()),
            Self::Copilot(c) => c.observe_envelope(envelope).await,
        }
    }

    /// Bind a server-assigned copilot session id (from the `x-chat-id`
    /// response header of a first send).
    pub async fn adopt_session(&self, id: SessionId) -> Result<(), CopilotError> {
        match self {
            Self::Global(_) => Ok(()),
            Self::Copilot(c) => c.adopt_session(id).await,
        }
    }
}

// ============================================================================
// Shared internals
// ============================================================================

/// Report a recoverable failure through the notification sink, exactly once
/// at the point it is raised. Cancellation is silently absorbed.
pub(crate) fn report(notifier: &dyn Notify, locale: &dyn Localize, error: &CopilotError) {
    match error {
        CopilotError::Validation(notice) => notifier.error(&locale.text(*notice)),
        CopilotError::NotFound(_) => notifier.error(&locale.text(Notice::SessionNotFound)),
        CopilotError::Transport(message) | CopilotError::Configuration(message) => {
            notifier.error(message)
        }
        CopilotError::Cancelled => {}
    }
}
