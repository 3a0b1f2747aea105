//! Quick actions over the last executed statement
//!
//! Each intent is resolved heuristic-first: a cheap pattern-matched rewrite
//! handles the common breakages locally, and only when nothing matches does
//! the executor fall through to the model-backed transform. Validation
//! failures are raised before either path runs and are distinct from
//! transform failures, which degrade to an untouched-SQL result rather than
//! erroring out of the action entirely.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::envelope::CopilotFixInput;
use crate::error::{CopilotError, EnglishLocale, Localize, Notice};
use crate::infer::SqlDialect;

// ============================================================================
// Model
// ============================================================================

/// The four supported transform intents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionIntent {
    FixError,
    Optimize,
    Simplify,
    Format,
}

impl ActionIntent {
    /// Whether the intent only makes sense against a failed execution.
    pub const fn requires_error(&self) -> bool {
        matches!(self, ActionIntent::FixError)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ActionIntent::FixError => "fix_error",
            ActionIntent::Optimize => "optimize",
            ActionIntent::Simplify => "simplify",
            ActionIntent::Format => "format",
        }
    }
}

impl std::fmt::Display for ActionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed context a quick action runs against.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionContext {
    pub dialect: SqlDialect,
    pub sql: String,
    pub database: Option<String>,
    pub error: Option<String>,
}

impl ActionContext {
    fn has_error(&self) -> bool {
        self.error
            .as_deref()
            .map(str::trim)
            .is_some_and(|e| !e.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionRisk {
    Low,
    Medium,
    High,
}

/// Outcome of a transform, ready for the host to preview and apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub title: String,
    pub explanation: String,
    pub fixed_sql: String,
    pub risk: ActionRisk,
}

// ============================================================================
// Backend
// ============================================================================

/// Model-backed transform path, invoked only when no heuristic matched.
#[async_trait]
pub trait ActionBackend: Send + Sync {
    async fn transform(
        &self,
        intent: ActionIntent,
        context: &ActionContext,
    ) -> Result<ActionResult, CopilotError>;
}

/// Production backend over the action endpoint.
pub struct HttpActionBackend {
    client: reqwest::Client,
    base_url: String,
    locale: Arc<dyn Localize>,
}

impl HttpActionBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_locale(config, Arc::new(EnglishLocale))
    }

    pub fn with_locale(config: &EngineConfig, locale: Arc<dyn Localize>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            locale,
        }
    }
}

#[derive(Serialize)]
struct ActionRequest {
    intent: ActionIntent,
    input: CopilotFixInput,
}

#[derive(Deserialize)]
struct ActionFailure {
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl ActionBackend for HttpActionBackend {
    #[instrument(level = "debug", skip(self, context), fields(intent = %intent))]
    async fn transform(
        &self,
        intent: ActionIntent,
        context: &ActionContext,
    ) -> Result<ActionResult, CopilotError> {
        let body = ActionRequest {
            intent,
            input: CopilotFixInput {
                sql: context.sql.clone(),
                error: context
                    .error
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string),
                database: context.database.clone(),
                dialect: context.dialect,
                occurred_at: None,
                meta: None,
            },
        };
        let response = self
            .client
            .post(format!("{}/action", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let fallback = self.locale.text(Notice::RequestFailed);
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ActionFailure>(&text)
                .ok()
                .and_then(|f| f.message)
                .unwrap_or_else(|| if text.trim().is_empty() { fallback } else { text });
            return Err(CopilotError::Transport(message));
        }

        response
            .json::<ActionResult>()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Resolves an intent against a context, heuristics before the backend.
pub struct QuickActionExecutor {
    backend: Arc<dyn ActionBackend>,
}

impl QuickActionExecutor {
    pub fn new(backend: Arc<dyn ActionBackend>) -> Self {
        Self { backend }
    }

    /// Run one intent to completion.
    ///
    /// Validation failures (error-requiring intent without an error, blank
    /// SQL) are raised before any transform. A configuration failure from
    /// the backend is fatal and rethrown unchanged; any other backend
    /// failure degrades to a result carrying the original SQL at high risk.
    pub async fn run(
        &self,
        intent: ActionIntent,
        context: &ActionContext,
    ) -> Result<ActionResult, CopilotError> {
        if intent.requires_error() && !context.has_error() {
            return Err(CopilotError::Validation(Notice::ErrorContextRequired));
        }
        if context.sql.trim().is_empty() {
            return Err(CopilotError::Validation(Notice::EmptySqlDraft));
        }

        if let Some(result) = heuristic_fix(intent, context) {
            debug!(intent = %intent, "resolved by heuristic");
            return Ok(classify(context, result));
        }

        match self.backend.transform(intent, context).await {
            Ok(result) => Ok(classify(context, result)),
            Err(e @ CopilotError::Configuration(_)) => Err(e),
            Err(e) => {
                warn!(intent = %intent, error = %e, "transform failed, returning original");
                Ok(ActionResult {
                    title: default_title(intent).to_string(),
                    explanation: e.to_string(),
                    fixed_sql: context.sql.clone(),
                    risk: ActionRisk::High,
                })
            }
        }
    }
}

fn default_title(intent: ActionIntent) -> &'static str {
    match intent {
        ActionIntent::FixError => "Fix error",
        ActionIntent::Optimize => "Optimize query",
        ActionIntent::Simplify => "Simplify query",
        ActionIntent::Format => "Format query",
    }
}

/// A proposed rewrite that is not a real change is never low-risk.
fn classify(context: &ActionContext, mut result: ActionResult) -> ActionResult {
    if normalize_ws(&result.fixed_sql) == normalize_ws(&context.sql) {
        result.risk = ActionRisk::High;
    }
    result
}

fn normalize_ws(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Heuristics
// ============================================================================

/// Deterministic rewrites for breakages a parser reports constantly.
/// Only the fix-error intent has pattern fixes; everything else needs the
/// model.
fn heuristic_fix(intent: ActionIntent, context: &ActionContext) -> Option<ActionResult> {
    if intent != ActionIntent::FixError {
        return None;
    }
    let mut sql = context.sql.clone();
    let mut applied = Vec::new();
    if let Some(fixed) = strip_trailing_commas(&sql) {
        sql = fixed;
        applied.push("removed a trailing comma before a clause keyword");
    }
    if let Some(fixed) = collapse_terminators(&sql) {
        sql = fixed;
        applied.push("collapsed duplicated statement terminators");
    }
    if applied.is_empty() {
        return None;
    }
    Some(ActionResult {
        title: default_title(intent).to_string(),
        explanation: applied.join("; "),
        fixed_sql: sql,
        risk: ActionRisk::Low,
    })
}

const CLAUSE_KEYWORDS: &[&str] = &["FROM", "WHERE", "GROUP BY", "ORDER BY", "HAVING", "LIMIT"];

/// Drop a comma left dangling immediately before a clause keyword, as in
/// `SELECT a, b, FROM t`.
fn strip_trailing_commas(sql: &str) -> Option<String> {
    // ascii-only uppercasing keeps byte offsets aligned with the input
    let upper = sql.to_ascii_uppercase();
    let bytes = sql.as_bytes();
    let mut commas = Vec::new();

    for keyword in CLAUSE_KEYWORDS {
        let mut from = 0;
        while let Some(found) = upper[from..].find(keyword) {
            let at = from + found;
            from = at + keyword.len();
            let before_ok = at == 0 || !upper.as_bytes()[at - 1].is_ascii_alphanumeric();
            let after = at + keyword.len();
            let after_ok = after >= upper.len() || !upper.as_bytes()[after].is_ascii_alphanumeric();
            if !before_ok || !after_ok {
                continue;
            }
            let mut i = at;
            while i > 0 && bytes[i - 1].is_ascii_whitespace() {
                i -= 1;
            }
            if i > 0 && bytes[i - 1] == b',' {
                commas.push(i - 1);
            }
        }
    }

    if commas.is_empty() {
        return None;
    }
    commas.sort_unstable();
    commas.dedup();

    let mut out = String::with_capacity(sql.len());
    let mut skip = commas.iter().peekable();
    for (i, ch) in sql.char_indices() {
        if skip.peek() == Some(&&i) {
            skip.next();
            continue;
        }
        out.push(ch);
    }
    Some(out)
}

/// Collapse runs of `;` left by a doubled terminator.
fn collapse_terminators(sql: &str) -> Option<String> {
    if !sql.contains(";;") {
        return None;
    }
    let mut out = sql.to_string();
    while out.contains(";;") {
        out = out.replace(";;", ";");
    }
    Some(out)
}
