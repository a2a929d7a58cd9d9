//! SQLite store for structural records and alert history.
//!
//! The store is the source of truth; the vector index only carries weak
//! back-references into it. Upserts are single statements, atomic per
//! `file_path`. Alerts are append-only.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::{CodeScopeError, Result};
use crate::model::{AlertRecord, Language, Metrics, Severity, StructuralRecord};

/// Filter for `search_analysis`. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub language: Option<Language>,
    pub path_contains: Option<String>,
    pub min_average_complexity: Option<f64>,
    pub max_average_complexity: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub analysis_count: u64,
    pub alert_count: u64,
    pub per_language: HashMap<String, u64>,
}

pub struct AnalysisDatabase {
    conn: Connection,
}

impl AnalysisDatabase {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("opening analysis database at {}", db_path.display());
        let conn = Connection::open(db_path)?;
        Self::setup(conn)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self> {
        Self::setup(Connection::open_in_memory()?)
    }

    fn setup(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        // journal_mode returns the new mode as a row, so query it.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;

        let db = Self { conn };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                id INTEGER PRIMARY KEY,
                file_path TEXT UNIQUE NOT NULL,
                language TEXT NOT NULL,
                functions TEXT NOT NULL,
                classes TEXT NOT NULL,
                imports TEXT NOT NULL,
                metrics TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_analysis_results_language
                ON analysis_results(language);

            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY,
                alert_type TEXT NOT NULL,
                alert_message TEXT NOT NULL,
                file_path TEXT,
                line_number INTEGER,
                severity TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_created_at
                ON alerts(created_at);",
        )?;
        Ok(())
    }

    /// Liveness probe for health reporting.
    pub fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Insert or update the record for its `file_path`, atomically. The
    /// original `created_at` is preserved on update.
    pub fn upsert_analysis(&self, record: &StructuralRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO analysis_results
                (file_path, language, functions, classes, imports, metrics,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(file_path) DO UPDATE SET
                language = excluded.language,
                functions = excluded.functions,
                classes = excluded.classes,
                imports = excluded.imports,
                metrics = excluded.metrics,
                updated_at = excluded.updated_at",
            params![
                record.file_path,
                record.language.as_str(),
                serde_json::to_string(&record.functions)?,
                serde_json::to_string(&record.classes)?,
                serde_json::to_string(&record.imports)?,
                serde_json::to_string(&record.metrics)?,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        debug!("stored analysis for {}", record.file_path);
        Ok(())
    }

    pub fn get_analysis(&self, file_path: &str) -> Result<Option<StructuralRecord>> {
        self.conn
            .query_row(
                "SELECT file_path, language, functions, classes, imports, metrics,
                        created_at, updated_at
                 FROM analysis_results WHERE file_path = ?1",
                params![file_path],
                row_to_record,
            )
            .optional()?
            .transpose()
    }

    /// Filtered scan ordered by file path for deterministic output.
    pub fn search_analysis(&self, filter: &AnalysisFilter) -> Result<Vec<StructuralRecord>> {
        let mut sql = String::from(
            "SELECT file_path, language, functions, classes, imports, metrics,
                    created_at, updated_at
             FROM analysis_results WHERE 1=1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(language) = filter.language {
            sql.push_str(&format!(" AND language = ?{}", values.len() + 1));
            values.push(Value::Text(language.as_str().to_string()));
        }
        if let Some(fragment) = &filter.path_contains {
            sql.push_str(&format!(" AND file_path LIKE ?{}", values.len() + 1));
            values.push(Value::Text(format!("%{fragment}%")));
        }
        if let Some(min) = filter.min_average_complexity {
            sql.push_str(&format!(
                " AND json_extract(metrics, '$.average_complexity') >= ?{}",
                values.len() + 1
            ));
            values.push(Value::Real(min));
        }
        if let Some(max) = filter.max_average_complexity {
            sql.push_str(&format!(
                " AND json_extract(metrics, '$.average_complexity') <= ?{}",
                values.len() + 1
            ));
            values.push(Value::Real(max));
        }
        sql.push_str(" ORDER BY file_path");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", values.len() + 1));
            values.push(Value::Integer(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    /// Append one alert; returns its row id.
    pub fn store_alert(&self, alert: &AlertRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO alerts
                (alert_type, alert_message, file_path, line_number, severity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alert.alert_type,
                alert.alert_message,
                alert.file_path,
                alert.line_number,
                alert.severity.as_str(),
                alert.created_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent alerts first.
    pub fn alert_history(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT alert_type, alert_message, file_path, line_number, severity, created_at
             FROM alerts ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<u32>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            let (alert_type, alert_message, file_path, line_number, severity, created_at) = row?;
            alerts.push(AlertRecord {
                alert_type,
                alert_message,
                file_path,
                line_number,
                severity: severity.parse::<Severity>()?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(alerts)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let analysis_count: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM analysis_results", [], |r| r.get(0))?;
        let alert_count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM alerts", [], |r| r.get(0))?;

        let mut stmt = self
            .conn
            .prepare("SELECT language, COUNT(*) FROM analysis_results GROUP BY language")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        let mut per_language = HashMap::new();
        for row in rows {
            let (language, count) = row?;
            per_language.insert(language, count);
        }

        Ok(StoreStats {
            analysis_count,
            alert_count,
            per_language,
        })
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<Result<StructuralRecord>> {
    let file_path: String = row.get(0)?;
    let language: String = row.get(1)?;
    let functions: String = row.get(2)?;
    let classes: String = row.get(3)?;
    let imports: String = row.get(4)?;
    let metrics: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(build_record(
        file_path, language, functions, classes, imports, metrics, created_at, updated_at,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    file_path: String,
    language: String,
    functions: String,
    classes: String,
    imports: String,
    metrics: String,
    created_at: String,
    updated_at: String,
) -> Result<StructuralRecord> {
    Ok(StructuralRecord {
        file_path,
        language: language.parse::<Language>()?,
        functions: serde_json::from_str(&functions)?,
        classes: serde_json::from_str(&classes)?,
        imports: serde_json::from_str(&imports)?,
        metrics: serde_json::from_str::<Metrics>(&metrics)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CodeScopeError::Parse(format!("bad timestamp {raw}: {e}")))
}
