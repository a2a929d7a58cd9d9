//! Alert correlation.
//!
//! An incoming alert is stored first (history is append-only, even when
//! correlation finds nothing), then matched against the analyzed corpus by
//! semantic search over its type and message text, and finally summarized
//! into a handful of human-readable insights.

use std::sync::{Arc, Mutex, MutexGuard};
use chrono::Utc;
use tracing::{info, warn};

use crate::database::AnalysisDatabase;
use crate::errors::Result;
use crate::model::{AlertAnalysisResult, AlertRecord, SearchResult, Severity};
use crate::search::{SearchFilters, SearchOrchestrator, SearchType};

/// How many related files to pull in per alert.
const RELATED_CODE_LIMIT: usize = 5;

/// Average complexity above which a related file earns a refactoring note.
const COMPLEXITY_REFACTOR_THRESHOLD: f64 = 10.0;

pub struct AlertCorrelator {
    db: Arc<Mutex<AnalysisDatabase>>,
    orchestrator: Arc<SearchOrchestrator>,
}

impl AlertCorrelator {
    pub fn new(db: Arc<Mutex<AnalysisDatabase>>, orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self { db, orchestrator }
    }

    pub fn analyze_alert(&self, alert: AlertRecord) -> Result<AlertAnalysisResult> {
        let alert_id = self.lock_db().store_alert(&alert)?;
        info!(
            "correlating alert {alert_id} ({} / {})",
            alert.alert_type, alert.severity
        );

        let related_code = self.find_related_code(&alert)?;
        let insights = build_insights(&alert, &related_code);

        Ok(AlertAnalysisResult {
            alert_id,
            alert,
            related_code,
            insights,
            created_at: Utc::now(),
        })
    }

    fn find_related_code(&self, alert: &AlertRecord) -> Result<Vec<SearchResult>> {
        let mut query = format!("{} {}", alert.alert_type, alert.alert_message);
        if let Some(path) = &alert.file_path {
            query.push_str(&format!(" file: {path}"));
        }
        self.orchestrator.search(
            &query,
            SearchType::Semantic,
            RELATED_CODE_LIMIT,
            &SearchFilters::default(),
        )
    }

    fn lock_db(&self) -> MutexGuard<'_, AnalysisDatabase> {
        self.db.lock().unwrap_or_else(|poisoned| {
            warn!("database lock poisoned; continuing with inner value");
            poisoned.into_inner()
        })
    }
}

fn build_insights(alert: &AlertRecord, related_code: &[SearchResult]) -> Vec<String> {
    let mut insights = Vec::new();

    if alert.severity >= Severity::High {
        insights.push(format!(
            "{} severity alert: prioritize investigation of the related code below",
            alert.severity
        ));
    }

    if related_code.is_empty() {
        insights.push(
            "no analyzed code correlates with this alert; the affected area may not be indexed yet"
                .to_string(),
        );
        return insights;
    }

    if let Some(path) = &alert.file_path {
        if related_code.iter().any(|r| r.file_path == *path) {
            insights.push(format!(
                "the alert's own file {path} is among the top matches; start there"
            ));
        }
    }

    let complex: Vec<&SearchResult> = related_code
        .iter()
        .filter(|r| r.record.metrics.average_complexity > COMPLEXITY_REFACTOR_THRESHOLD)
        .collect();
    if !complex.is_empty() {
        let paths: Vec<&str> = complex.iter().map(|r| r.file_path.as_str()).collect();
        insights.push(format!(
            "high average complexity in related code ({}); consider refactoring to reduce failure surface",
            paths.join(", ")
        ));
    } else {
        insights.push(
            "related code has moderate complexity; review error handling and input validation first"
                .to_string(),
        );
    }

    insights
}
