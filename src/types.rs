//! Chat session and message types
//!
//! This module defines the data model shared across the engine:
//!
//! - `ChatMode` - global (many named sessions) vs copilot (one per tab)
//! - `ChatSession` - session metadata as held by the session store
//! - `ChatMessage` / `MessagePart` - conversation content
//!
//! Message order within a session is authoritative on the server; local
//! copies converge to server order after any reload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, SessionId, TabId};

// ============================================================================
// Chat Mode
// ============================================================================

/// Which kind of conversation a session belongs to.
///
/// Global: many sessions per user, user-named, persisted until archived.
/// Copilot: exactly one session per (team, user, tab), auto-named, created
/// lazily on first message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Global,
    Copilot,
}

impl ChatMode {
    /// Get static string representation (zero allocation)
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Global => "global",
            ChatMode::Copilot => "copilot",
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(ChatMode::Global),
            "copilot" => Ok(ChatMode::Copilot),
            _ => Err(()),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A chat session as known to the session store.
///
/// A copilot-type session is always addressable by its owning tab id; a
/// global-type session only by id. Sessions are archived (soft-deleted) on
/// user delete and never hard-deleted from the client's perspective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChatMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ChatSession {
    /// Display title: trimmed title when present and non-empty, else `None`.
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Tab id a copilot session is bound to, read from session metadata.
    pub fn tab_id(&self) -> Option<TabId> {
        self.metadata
            .get("tab_id")
            .and_then(|v| v.as_str())
            .map(TabId::from)
    }
}

// ============================================================================
// Message Role
// ============================================================================

/// Role for individual messages within a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    /// Get static string representation (zero allocation)
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            "tool" => Ok(MessageRole::Tool),
            _ => Err(()),
        }
    }
}

// ============================================================================
// Message Parts
// ============================================================================

/// One typed content fragment within a message.
///
/// The engine treats parts as opaque payload; interpretation belongs to the
/// rendering layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        output: serde_json::Value,
    },
    Reasoning {
        text: String,
    },
    SourceRef {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A message within a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ChatMessage {
    /// Locally synthesized user message (optimistic append before the server
    /// confirms it).
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::User,
            parts: vec![MessagePart::text(text)],
            metadata: None,
        }
    }

    /// Concatenated text content of all text parts.
    pub fn get_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
