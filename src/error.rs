//! Error taxonomy and user-facing notice plumbing
//!
//! Five failure classes cross this engine:
//!
//! - validation: rejected before any network call, always user-facing
//! - not-found: operating on a session absent from the local cache
//! - transport: non-2xx / malformed response, surfaced verbatim with a
//!   fallback message when the body carries none
//! - configuration: missing environment, rethrown unchanged (fatal)
//! - cancellation: not an error, silently absorbed
//!
//! Advisory failures (SQL parse during inference) never reach this type;
//! they degrade to a low-confidence result inside the inferencer.

use thiserror::Error;

/// Keys for localized user-facing strings.
///
/// The engine never hardcodes display text; the host supplies a [`Localize`]
/// implementation and a notification sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Rename submitted with an empty trimmed title
    TitleRequired,
    /// Session id not present in the local list
    SessionNotFound,
    /// Create/rename/delete attempted in copilot mode
    UnsupportedInCopilot,
    /// Placeholder seeded into the rename buffer for untitled sessions
    DefaultSessionTitle,
    /// Quick action that requires an error was run without one
    ErrorContextRequired,
    /// Quick action run against blank SQL
    EmptySqlDraft,
    /// Fallback when a transport error body carries no message
    RequestFailed,
}

/// Resolves a [`Notice`] key to display text.
pub trait Localize: Send + Sync {
    fn text(&self, notice: Notice) -> String;
}

/// Built-in English strings, used when the host supplies no translation.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnglishLocale;

impl Localize for EnglishLocale {
    fn text(&self, notice: Notice) -> String {
        match notice {
            Notice::TitleRequired => "Session title is required",
            Notice::SessionNotFound => "Session not found",
            Notice::UnsupportedInCopilot => "Not supported in copilot chat",
            Notice::DefaultSessionTitle => "New chat",
            Notice::ErrorContextRequired => "This action needs a failed execution",
            Notice::EmptySqlDraft => "The editor is empty",
            Notice::RequestFailed => "Request failed",
        }
        .to_string()
    }
}

/// Sink for user-visible error notifications (a toast layer in practice).
///
/// Every recoverable failure is reported exactly once, at the point it is
/// raised; cancellation and advisory failures are never reported.
pub trait Notify: Send + Sync {
    fn error(&self, message: &str);
}

/// Notifier that drops everything; useful for headless callers and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl Notify for NullNotifier {
    fn error(&self, _message: &str) {}
}

/// Engine-wide error type.
#[derive(Debug, Error)]
pub enum CopilotError {
    /// Rejected before any network call; carries the notice key so callers
    /// can re-localize if they need to.
    #[error("validation failed: {0:?}")]
    Validation(Notice),

    /// The target session is not in the local cache.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Transport-level failure from the session store or chat endpoint.
    #[error("{0}")]
    Transport(String),

    /// Missing environment or configuration; never swallowed or degraded.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Explicit cancellation; expected, never surfaced to the user.
    #[error("cancelled")]
    Cancelled,
}

impl CopilotError {
    /// Whether this error is a silently absorbed cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CopilotError::Cancelled)
    }
}
