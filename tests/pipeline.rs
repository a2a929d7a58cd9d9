//! End-to-end pipeline tests: parse real source trees, search the corpus
//! through every strategy, and correlate alerts, all through the public
//! engine surface.

use std::path::Path;
use tempfile::tempdir;

use codescope::{
    AlertRecord, CodeScopeEngine, Config, Language, SearchFilters, Severity,
};

fn engine_in(dir: &Path) -> CodeScopeEngine {
    let config = Config {
        database_path: dir.join("analysis.db"),
        index_path: dir.join("index.json"),
        ..Default::default()
    };
    CodeScopeEngine::new(config).unwrap()
}

fn write_sample_repo(root: &Path) {
    std::fs::create_dir_all(root.join("pkg")).unwrap();

    std::fs::write(
        root.join("database.py"),
        r#"import os
from contextlib import contextmanager

def connect_to_database(host, port):
    if host is None:
        raise ValueError("host required")
    for attempt in range(3):
        try:
            return open_connection(host, port)
        except ConnectionError:
            continue
    return None

def open_connection(host, port):
    return (host, port)
"#,
    )
    .unwrap();

    std::fs::write(
        root.join("templates.py"),
        r#"class TemplateRenderer:
    def render_html_template(self, page):
        return "<html>" + page + "</html>"
"#,
    )
    .unwrap();

    std::fs::write(
        root.join("pkg").join("worker.go"),
        r#"package pkg

import (
	"fmt"
	"sync"
)

type Worker struct {
	mu sync.Mutex
}

func (w *Worker) Process(items []string) int {
	count := 0
	for _, item := range items {
		if item != "" && len(item) > 2 {
			count++
		}
	}
	fmt.Println(count)
	return count
}
"#,
    )
    .unwrap();

    std::fs::write(
        root.join("Service.java"),
        r#"import java.util.List;

public class Service {
    public int route(List<String> requests) {
        int handled = 0;
        for (String request : requests) {
            if (request != null && !request.isEmpty()) {
                handled++;
            } else {
                continue;
            }
        }
        return handled;
    }
}
"#,
    )
    .unwrap();
}

#[test]
fn repository_analysis_covers_all_three_languages() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    write_sample_repo(&repo);

    let engine = engine_in(dir.path());
    let analysis = engine.analyze_repository(&repo, None, true).unwrap();

    assert_eq!(analysis.summary.total_files, 4);
    assert!(analysis.failures.is_empty());

    let languages: Vec<Language> = analysis.records.iter().map(|r| r.language).collect();
    assert!(languages.contains(&Language::Python));
    assert!(languages.contains(&Language::Go));
    assert!(languages.contains(&Language::Java));

    let db_record = analysis
        .records
        .iter()
        .find(|r| r.file_path.ends_with("database.py"))
        .unwrap();
    let connect = db_record
        .functions
        .iter()
        .find(|f| f.name == "connect_to_database")
        .unwrap();
    // if + for + except = 3 decision points.
    assert_eq!(connect.cyclomatic_complexity, 4);
    assert_eq!(
        db_record.metrics.total_lines,
        db_record.metrics.code_lines
            + db_record.metrics.comment_lines
            + db_record.metrics.blank_lines
    );
}

#[test]
fn semantic_search_finds_code_for_natural_language_query() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    write_sample_repo(&repo);

    let engine = engine_in(dir.path());
    engine.analyze_repository(&repo, None, true).unwrap();

    let results = engine
        .search(
            "database connection failed",
            "semantic",
            3,
            &SearchFilters::default(),
        )
        .unwrap();
    assert!(!results.is_empty());
    assert!(results[0].file_path.ends_with("database.py"));
}

#[test]
fn function_name_search_matches_across_languages() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    write_sample_repo(&repo);

    let engine = engine_in(dir.path());
    engine.analyze_repository(&repo, None, true).unwrap();

    let results = engine
        .search("process", "function_name", 5, &SearchFilters::default())
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].file_path.ends_with("worker.go"));
    assert_eq!(results[0].matched_function.as_ref().unwrap().name, "Process");
}

#[test]
fn complexity_search_with_language_filter() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    write_sample_repo(&repo);

    let engine = engine_in(dir.path());
    engine.analyze_repository(&repo, None, true).unwrap();

    let results = engine
        .search(
            "",
            "complexity",
            10,
            &SearchFilters {
                language: Some(Language::Python),
                min_complexity: Some(2.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.language == Language::Python));
    assert!(results[0].file_path.ends_with("database.py"));
    assert!(results[0].complexity.unwrap() >= 2.0);
}

#[test]
fn identical_content_at_two_paths_stays_two_records() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(repo.join("a")).unwrap();
    std::fs::create_dir_all(repo.join("b")).unwrap();
    let source = "def compute_checksum(payload):\n    return sum(payload)\n";
    std::fs::write(repo.join("a").join("util.py"), source).unwrap();
    std::fs::write(repo.join("b").join("util.py"), source).unwrap();

    let engine = engine_in(dir.path());
    engine.analyze_repository(&repo, None, true).unwrap();

    let stats = engine.stats().unwrap();
    assert_eq!(stats.store.analysis_count, 2);
    assert_eq!(stats.index_size, 2);

    // Content is never deduplicated across paths: both files answer the
    // same query, at effectively the same score.
    let results = engine
        .search(
            "compute checksum of payload",
            "semantic",
            2,
            &SearchFilters::default(),
        )
        .unwrap();
    assert_eq!(results.len(), 2);
    let paths: Vec<&str> = results.iter().map(|r| r.file_path.as_str()).collect();
    assert!(paths.iter().any(|p| p.contains("/a/")));
    assert!(paths.iter().any(|p| p.contains("/b/")));
    assert!((results[0].score - results[1].score).abs() < 0.05);
}

#[test]
fn invalid_search_type_is_rejected_without_corpus_access() {
    let dir = tempdir().unwrap();
    let engine = engine_in(dir.path());
    let err = engine
        .search("anything", "regex", 5, &SearchFilters::default())
        .unwrap_err();
    assert!(err.to_string().contains("regex"));
}

#[test]
fn alert_correlation_connects_alert_text_to_code() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    write_sample_repo(&repo);

    let engine = engine_in(dir.path());
    engine.analyze_repository(&repo, None, true).unwrap();

    let result = engine
        .analyze_alert(AlertRecord::new(
            "error",
            "database connection timeout on startup",
            Severity::High,
        ))
        .unwrap();

    assert!(result.alert_id > 0);
    assert!(!result.related_code.is_empty());
    assert!(result.related_code[0].file_path.ends_with("database.py"));
    assert!(result.insights.iter().any(|i| i.contains("high severity")));

    let history = engine.alert_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].severity, Severity::High);
}

#[test]
fn reanalysis_upserts_store_and_index_together() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    let file = repo.join("svc.py");

    let engine = engine_in(dir.path());
    std::fs::write(&file, "def parse_config(path):\n    pass\n").unwrap();
    engine.analyze_repository(&repo, None, true).unwrap();
    std::fs::write(&file, "def send_notification(user):\n    pass\n").unwrap();
    engine.analyze_repository(&repo, None, true).unwrap();

    let stats = engine.stats().unwrap();
    assert_eq!(stats.store.analysis_count, 1);
    assert_eq!(stats.index_size, 1);

    // The stale vector must be superseded: searching for the old name no
    // longer matches, the new name does.
    let results = engine
        .search("send_notification", "function_name", 5, &SearchFilters::default())
        .unwrap();
    assert_eq!(results.len(), 1);
    let gone = engine
        .search("parse_config", "function_name", 5, &SearchFilters::default())
        .unwrap();
    assert!(gone.is_empty());
}

#[test]
fn index_survives_restart() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    write_sample_repo(&repo);

    {
        let engine = engine_in(dir.path());
        engine.analyze_repository(&repo, None, true).unwrap();
    }

    let engine = engine_in(dir.path());
    let health = engine.health();
    assert!(health.index_loaded);
    assert_eq!(health.index_size, 4);

    let results = engine
        .search(
            "database connection failed",
            "semantic",
            2,
            &SearchFilters::default(),
        )
        .unwrap();
    assert!(results[0].file_path.ends_with("database.py"));
}
