//! Session store client
//!
//! The sole I/O boundary for session CRUD. `SessionStore` is the capability
//! trait the lifecycle manager consumes; `HttpSessionStore` is the
//! production implementation over the backend's HTTP/JSON API. The client
//! carries no retry or caching logic of its own and surfaces typed
//! failures.

pub mod http;

use async_trait::async_trait;

use crate::envelope::CopilotEnvelope;
use crate::error::CopilotError;
use crate::ids::{SessionId, TabId};
use crate::types::{ChatMessage, ChatMode, ChatSession};

pub use http::HttpSessionStore;

/// A session plus its full message history, as returned by the detail
/// endpoint. Message order is the authoritative conversation order.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionDetail {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Request/response operations against the external session API.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// List sessions of the given type.
    async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<ChatSession>, CopilotError>;

    /// Fetch one session with its message history.
    async fn session_detail(&self, id: &SessionId) -> Result<SessionDetail, CopilotError>;

    /// Create a new global session. Copilot sessions are never created
    /// through this path.
    async fn create_global(&self) -> Result<ChatSession, CopilotError>;

    /// Rename a session.
    async fn rename_session(&self, id: &SessionId, title: &str) -> Result<(), CopilotError>;

    /// Archive (soft-delete) a session.
    async fn delete_session(&self, id: &SessionId) -> Result<(), CopilotError>;

    /// Look up the copilot session bound to a tab, if one exists.
    async fn copilot_session_by_tab(
        &self,
        tab: &TabId,
    ) -> Result<Option<ChatSession>, CopilotError>;

    /// Get or create the copilot session for the tab embedded in the
    /// envelope's metadata.
    ///
    /// The lifecycle itself never creates copilot sessions (the backend
    /// does, lazily, on the first send); this path exists for hosts that
    /// must materialize the tab's session ahead of any message, e.g. to
    /// attach server-side context before the user types.
    async fn get_or_create_copilot(
        &self,
        envelope: &CopilotEnvelope,
    ) -> Result<ChatSession, CopilotError>;
}
