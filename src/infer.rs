//! SQL context inference
//!
//! Given a raw editor draft and a dialect, extract the tables/views it
//! references and infer the target database. Inference is advisory: it is a
//! pure function of (dialect, text, baseline) with no I/O, and a parse
//! failure degrades to a neutral low-confidence result instead of an error.

use serde::{Deserialize, Serialize};
use sqlparser::ast::{ObjectName, visit_relations};
use sqlparser::dialect::{
    ClickHouseDialect, Dialect, DuckDbDialect, GenericDialect, MySqlDialect, PostgreSqlDialect,
};
use sqlparser::parser::Parser;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ============================================================================
// Dialect
// ============================================================================

/// SQL dialect the editor draft is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Clickhouse,
    DuckDb,
    MySql,
    Postgres,
    #[default]
    Unknown,
}

impl SqlDialect {
    /// Normalize a caller-supplied dialect name. A small fixed set of
    /// case-insensitive aliases maps to canonical values; anything else
    /// (including absence) is `Unknown`.
    pub fn normalize(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("clickhouse") => SqlDialect::Clickhouse,
            Some("duckdb") => SqlDialect::DuckDb,
            Some("mysql") => SqlDialect::MySql,
            Some("postgres") | Some("postgresql") => SqlDialect::Postgres,
            _ => SqlDialect::Unknown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Clickhouse => "clickhouse",
            SqlDialect::DuckDb => "duckdb",
            SqlDialect::MySql => "mysql",
            SqlDialect::Postgres => "postgres",
            SqlDialect::Unknown => "unknown",
        }
    }

    fn new_parser_dialect(&self) -> Arc<dyn Dialect + Send + Sync> {
        match self {
            SqlDialect::Clickhouse => Arc::new(ClickHouseDialect {}),
            SqlDialect::DuckDb => Arc::new(DuckDbDialect {}),
            SqlDialect::MySql => Arc::new(MySqlDialect {}),
            SqlDialect::Postgres => Arc::new(PostgreSqlDialect {}),
            SqlDialect::Unknown => Arc::new(GenericDialect {}),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parser dialect instances, created lazily and reused for repeated calls
/// with the same dialect. Created once per process, never evicted; tests
/// construct a fresh cache per case.
#[derive(Debug, Default)]
pub struct DialectCache {
    inner: Mutex<HashMap<SqlDialect, Arc<dyn Dialect + Send + Sync>>>,
}

impl DialectCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, dialect: SqlDialect) -> Arc<dyn Dialect + Send + Sync> {
        let mut inner = self.inner.lock().expect("dialect cache poisoned");
        Arc::clone(
            inner
                .entry(dialect)
                .or_insert_with(|| dialect.new_parser_dialect()),
        )
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

// ============================================================================
// Inference result
// ============================================================================

/// Qualitative reliability of an inference result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Mid,
    Low,
}

/// A table or view reference extracted from the draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Qualifying database/schema segment, when written
    pub database: Option<String>,
    /// Final identifier segment
    pub name: String,
    /// The identifier exactly as written, quoting preserved
    pub raw: String,
}

/// Derived context for an SQL draft. Never persisted; recomputed from the
/// current draft text each time an envelope is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InferredSqlContext {
    pub tables: Vec<TableRef>,
    pub database: Option<String>,
    pub confidence: Confidence,
}

impl InferredSqlContext {
    fn neutral(database: Option<String>, confidence: Confidence) -> Self {
        Self {
            tables: Vec::new(),
            database,
            confidence,
        }
    }
}

// ============================================================================
// Inferencer
// ============================================================================

/// Infers referenced tables and the target database from a raw SQL draft.
#[derive(Debug, Default)]
pub struct SqlInferencer {
    dialects: DialectCache,
}

impl SqlInferencer {
    pub fn new(dialects: DialectCache) -> Self {
        Self { dialects }
    }

    /// Infer context for `text` written in `dialect`, against the editor's
    /// baseline database.
    ///
    /// - Blank text is a neutral baseline, not a failure: no tables, `Mid`
    ///   confidence, baseline database.
    /// - A parse failure is swallowed and yields `Low` confidence.
    /// - On success, confidence is `High` iff at least one table was found.
    pub fn infer(
        &self,
        dialect: SqlDialect,
        text: &str,
        baseline_database: Option<&str>,
    ) -> InferredSqlContext {
        let baseline = baseline_database.map(str::to_string);
        if text.trim().is_empty() {
            return InferredSqlContext::neutral(baseline, Confidence::Mid);
        }

        let parser_dialect = self.dialects.get(dialect);
        let statements = match Parser::parse_sql(parser_dialect.as_ref(), text) {
            Ok(statements) => statements,
            Err(e) => {
                debug!(dialect = %dialect, error = %e, "draft did not parse, degrading to low confidence");
                return InferredSqlContext::neutral(baseline, Confidence::Low);
            }
        };

        let mut tables: Vec<TableRef> = Vec::new();
        let mut seen: HashSet<(Option<String>, String)> = HashSet::new();
        for statement in &statements {
            let _ = visit_relations(statement, |name: &ObjectName| {
                if let Some(table) = table_ref_from(name) {
                    let key = (table.database.clone(), table.name.clone());
                    if seen.insert(key) {
                        tables.push(table);
                    }
                }
                ControlFlow::<()>::Continue(())
            });
        }

        let database = resolve_database(&tables, baseline);
        let confidence = if tables.is_empty() {
            Confidence::Mid
        } else {
            Confidence::High
        };

        InferredSqlContext {
            tables,
            database,
            confidence,
        }
    }
}

/// Last segment is the table name, second-to-last (when present) the
/// database. Segments arrive unquoted from the parser; `strip_wrapping`
/// additionally guards against symmetric wrapping surviving in raw idents.
fn table_ref_from(name: &ObjectName) -> Option<TableRef> {
    let raw = name.to_string();
    let segments: Vec<String> = name
        .0
        .iter()
        .map(|ident| strip_wrapping(&ident.value).to_string())
        .collect();

    let table = segments.last()?.clone();
    if table.is_empty() {
        return None;
    }
    let database = (segments.len() >= 2)
        .then(|| segments[segments.len() - 2].clone())
        .filter(|db| !db.is_empty());

    Some(TableRef {
        database,
        name: table,
        raw,
    })
}

/// Strip one layer of symmetric quoting/bracket wrapping from a segment.
fn strip_wrapping(segment: &str) -> &str {
    let pairs = [('"', '"'), ('`', '`'), ('\'', '\''), ('[', ']')];
    for (open, close) in pairs {
        if segment.len() >= 2 && segment.starts_with(open) && segment.ends_with(close) {
            return &segment[1..segment.len() - 1];
        }
    }
    segment
}

/// If exactly one distinct non-empty database appears across extracted
/// tables, it wins; otherwise the baseline stands.
fn resolve_database(tables: &[TableRef], baseline: Option<String>) -> Option<String> {
    let distinct: HashSet<&String> = tables.iter().filter_map(|t| t.database.as_ref()).collect();
    if distinct.len() == 1 {
        distinct.into_iter().next().cloned()
    } else {
        baseline
    }
}
