//! Copilot context and chat session engine for a browser SQL workbench
//!
//! This crate provides:
//! - **Inference**: `SqlInferencer` derives referenced tables and the likely
//!   database from a SQL draft, with a confidence grade
//! - **Envelopes**: `EnvelopeBuilder` assembles immutable, versioned context
//!   envelopes and reduces them to bounded prompt contexts
//! - **Store**: `SessionStore` trait with the `HttpSessionStore` backend
//! - **Lifecycle**: `SessionController` reconciles the session list (global
//!   mode) or the tab-bound session (copilot mode)
//! - **Thread**: `ThreadController` runs the optimistic send / stream-drain /
//!   authoritative-reload protocol
//! - **Quick actions**: `QuickActionExecutor` resolves transform intents
//!   heuristic-first with a model-backed fallback
//!
//! # Example
//!
//! ```ignore
//! use copilot_core::{EnvelopeBuilder, SqlDraftInput};
//!
//! let builder = EnvelopeBuilder::default();
//! let envelope = builder.build_sql_envelope(SqlDraftInput {
//!     editor_text: "SELECT * FROM orders",
//!     baseline_database: Some("shop"),
//!     dialect: Some("clickhouse"),
//!     ..Default::default()
//! });
//! ```
pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod infer;
pub mod lifecycle;
pub mod quick_action;
pub mod store;
pub mod thread;
pub mod types;

pub use config::EngineConfig;
pub use envelope::{
    CopilotEnvelope, CopilotFixInput, EnvelopeBuilder, EnvelopeMeta, EnvelopeSurface,
    LastExecution, PromptContext, PromptLimits, Selection, SqlBaseline, SqlDraft, SqlDraftInput,
    TableFacts, ENVELOPE_VERSION,
};
pub use error::{CopilotError, EnglishLocale, Localize, Notice, Notify, NullNotifier};
pub use ids::{ConnectionId, MessageId, SessionId, TabId};
pub use infer::{Confidence, DialectCache, InferredSqlContext, SqlDialect, SqlInferencer, TableRef};
pub use lifecycle::{
    CopilotSessionLifecycle, GlobalSessionLifecycle, LifecycleState, RenameEdit,
    SessionController, SessionLifecycle,
};
pub use quick_action::{
    ActionBackend, ActionContext, ActionIntent, ActionResult, ActionRisk, HttpActionBackend,
    QuickActionExecutor,
};
pub use store::{HttpSessionStore, SessionDetail, SessionStore};
pub use thread::{
    ChatRequest, ChatStream, ChatTransport, HttpChatTransport, SendOptions, ThreadController,
    ThreadIdentity, ThreadState,
};
pub use types::{ChatMessage, ChatMode, ChatSession, MessagePart, MessageRole};
