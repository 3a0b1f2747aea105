//! Context envelopes
//!
//! An envelope is an immutable, versioned snapshot of editor or table
//! context plus derived inference. A new envelope is built on every relevant
//! editor change; envelopes are never mutated in place. `to_prompt_context`
//! reduces an envelope to the summary actually submitted to the assistant,
//! applying the configured truncation limit to draft text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::ids::{ConnectionId, TabId};
use crate::infer::{InferredSqlContext, SqlDialect, SqlInferencer};

/// Envelope schema version carried on every envelope.
pub const ENVELOPE_VERSION: u32 = 1;

// ============================================================================
// Envelope types
// ============================================================================

/// Editor state the draft was written against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SqlBaseline {
    pub database: Option<String>,
    pub dialect: SqlDialect,
}

/// Byte-offset selection into the current draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

/// The draft itself plus what we inferred from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SqlDraft {
    pub editor_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    pub inferred: InferredSqlContext,
}

/// Facts about a table selected in the table browser. All fields are
/// serialized explicitly (null when missing), never omitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct TableFacts {
    pub schema: Option<String>,
    pub name: String,
    pub selected_column: Option<String>,
    pub row_count: Option<u64>,
    pub engine: Option<String>,
    pub partition_key: Option<String>,
    pub primary_key: Option<String>,
}

/// Optional caller-supplied metadata carried on either surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct EnvelopeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

/// The kind of context an envelope carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "surface", rename_all = "lowercase")]
pub enum EnvelopeSurface {
    Sql {
        baseline: SqlBaseline,
        draft: SqlDraft,
    },
    Table {
        database: Option<String>,
        table: TableFacts,
    },
}

/// Immutable snapshot of editor/table context handed to the assistant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopilotEnvelope {
    pub version: u32,
    #[serde(flatten)]
    pub surface: EnvelopeSurface,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EnvelopeMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CopilotEnvelope {
    /// Tab id from the envelope metadata, if bound.
    pub fn tab_id(&self) -> Option<&TabId> {
        self.meta.as_ref().and_then(|m| m.tab_id.as_ref())
    }

    /// Database a send request should carry: the baseline database for the
    /// sql surface, nothing for the table surface.
    pub fn request_database(&self) -> Option<&str> {
        match &self.surface {
            EnvelopeSurface::Sql { baseline, .. } => baseline.database.as_deref(),
            EnvelopeSurface::Table { .. } => None,
        }
    }

    /// Table name a send request should carry (table surface only).
    pub fn request_table(&self) -> Option<&str> {
        match &self.surface {
            EnvelopeSurface::Table { table, .. } => Some(table.name.as_str()),
            EnvelopeSurface::Sql { .. } => None,
        }
    }
}

// ============================================================================
// Fix input (quick actions)
// ============================================================================

/// The last execution a quick action operates on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastExecution {
    pub sql: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub dialect: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: Option<EnvelopeMeta>,
}

/// Normalized quick-action input submitted to the action endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopilotFixInput {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub dialect: SqlDialect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EnvelopeMeta>,
}

// ============================================================================
// Prompt context
// ============================================================================

/// Draft summary carried in a prompt context; text is bounded by the
/// configured truncation limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptDraft {
    pub editor_text: String,
    pub inferred: InferredSqlContext,
}

/// Reduced envelope summary submitted to the assistant. For the table
/// surface, absent optional top-level fields are omitted while `table.*`
/// fields always appear (explicit null for missing values).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "surface", rename_all = "lowercase")]
pub enum PromptContext {
    Sql {
        baseline: SqlBaseline,
        draft: PromptDraft,
    },
    Table {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
        table: TableFacts,
    },
}

// ============================================================================
// Builder
// ============================================================================

/// Truncation settings for prompt contexts.
#[derive(Clone, Debug)]
pub struct PromptLimits {
    pub max_draft_chars: usize,
    pub marker: String,
}

impl PromptLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_draft_chars: config.prompt_truncation_limit,
            marker: config.truncation_marker.clone(),
        }
    }
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Inputs for building an sql-surface envelope.
#[derive(Clone, Debug, Default)]
pub struct SqlDraftInput<'a> {
    pub editor_text: &'a str,
    pub selection: Option<Selection>,
    pub baseline_database: Option<&'a str>,
    pub dialect: Option<&'a str>,
    pub meta: Option<EnvelopeMeta>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Assembles immutable envelopes from editor state and inference.
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    inferencer: SqlInferencer,
    limits: PromptLimits,
}

impl EnvelopeBuilder {
    pub fn new(inferencer: SqlInferencer, limits: PromptLimits) -> Self {
        Self { inferencer, limits }
    }

    /// Build an sql-surface envelope. Runs inference over the draft text;
    /// an unrecognized or absent dialect normalizes to `unknown`.
    pub fn build_sql_envelope(&self, input: SqlDraftInput<'_>) -> CopilotEnvelope {
        let dialect = SqlDialect::normalize(input.dialect);
        let inferred = self
            .inferencer
            .infer(dialect, input.editor_text, input.baseline_database);

        CopilotEnvelope {
            version: ENVELOPE_VERSION,
            surface: EnvelopeSurface::Sql {
                baseline: SqlBaseline {
                    database: input.baseline_database.map(str::to_string),
                    dialect,
                },
                draft: SqlDraft {
                    editor_text: input.editor_text.to_string(),
                    selection: input.selection,
                    inferred,
                },
            },
            meta: input.meta,
            updated_at: input.updated_at,
        }
    }

    /// Build a table-surface envelope from a table browser selection.
    pub fn build_table_envelope(
        &self,
        database: Option<String>,
        table: TableFacts,
        meta: Option<EnvelopeMeta>,
        updated_at: Option<DateTime<Utc>>,
    ) -> CopilotEnvelope {
        CopilotEnvelope {
            version: ENVELOPE_VERSION,
            surface: EnvelopeSurface::Table { database, table },
            meta,
            updated_at,
        }
    }

    /// Map a finished execution to quick-action input. The error is carried
    /// only when a non-empty message is present.
    pub fn build_fix_input(&self, execution: &LastExecution) -> CopilotFixInput {
        CopilotFixInput {
            sql: execution.sql.clone(),
            error: execution
                .error
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            database: execution.database.clone(),
            dialect: SqlDialect::normalize(execution.dialect.as_deref()),
            occurred_at: execution.occurred_at,
            meta: execution.meta.clone(),
        }
    }

    /// Reduce an envelope to the summary submitted with a message.
    pub fn to_prompt_context(&self, envelope: &CopilotEnvelope) -> PromptContext {
        match &envelope.surface {
            EnvelopeSurface::Sql { baseline, draft } => PromptContext::Sql {
                baseline: baseline.clone(),
                draft: PromptDraft {
                    editor_text: truncate_chars(
                        &draft.editor_text,
                        self.limits.max_draft_chars,
                        &self.limits.marker,
                    ),
                    inferred: draft.inferred.clone(),
                },
            },
            EnvelopeSurface::Table { database, table } => PromptContext::Table {
                database: database.clone(),
                table: table.clone(),
            },
        }
    }
}

/// Bound `text` to at most `limit` chars, appending `marker` when anything
/// was cut. The limit is counted in chars so a multibyte scalar is never
/// split; the length bound always wins over the marker if the two conflict.
fn truncate_chars(text: &str, limit: usize, marker: &str) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker_len = marker.chars().count();
    if limit <= marker_len {
        return marker.chars().take(limit).collect();
    }
    let mut out: String = text.chars().take(limit - marker_len).collect();
    out.push_str(marker);
    out
}
