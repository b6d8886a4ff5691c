// Tests for statistics report generation

use philhop_core::record::TraversalRow;
use philhop_core::report::{
    ReportFormat, StatsReport, generate_json_report, generate_text_report, save_report, summarize,
};
use tempfile::TempDir;

fn row(strategy: &str, reason: &str, hops: usize) -> TraversalRow {
    TraversalRow {
        id: format!("{}-{}-{}", strategy, reason, hops),
        start_id: "/wiki/Cat".to_string(),
        start_title: "Cat".to_string(),
        end_id: Some("/wiki/Philosophy".to_string()),
        strategy: strategy.to_string(),
        reason: reason.to_string(),
        hops,
        cycle_eliminated: false,
        error: None,
        started_at: 0,
        finished_at: 0,
    }
}

fn sample_rows() -> Vec<TraversalRow> {
    let mut eliminated = row("WORDNET", "reached_target", 12);
    eliminated.cycle_eliminated = true;
    vec![
        row("WORDNET", "reached_target", 10),
        eliminated,
        row("WORDNET", "cycle_terminated", 4),
        row("WORDNET", "extraction_failed", 0),
        row("RANDOM", "hop_limit_exceeded", 100),
        row("RANDOM", "hop_limit_exceeded", 100),
    ]
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("html"), None);
}

// ============================================================================
// Summary Tests
// ============================================================================

#[test]
fn test_summarize_groups_by_strategy() {
    let stats = summarize(&sample_rows());

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].strategy, "RANDOM");
    assert_eq!(stats[1].strategy, "WORDNET");
}

#[test]
fn test_summarize_convergence() {
    let stats = summarize(&sample_rows());
    let wordnet = &stats[1];

    assert_eq!(wordnet.attempts, 4);
    assert_eq!(wordnet.reached, 2);
    assert_eq!(wordnet.convergence_rate, 0.5);
    assert_eq!(wordnet.mean_hops, Some(11.0));
    assert_eq!(wordnet.min_hops, Some(10));
    assert_eq!(wordnet.max_hops, Some(12));
    assert_eq!(wordnet.cycle_eliminations, 1);
    assert_eq!(wordnet.failures.get("cycle_terminated"), Some(&1));
    assert_eq!(wordnet.failures.get("extraction_failed"), Some(&1));
    assert!(!wordnet.failures.contains_key("reached_target"));
}

#[test]
fn test_summarize_without_success() {
    let stats = summarize(&sample_rows());
    let random = &stats[0];

    assert_eq!(random.reached, 0);
    assert_eq!(random.convergence_rate, 0.0);
    assert_eq!(random.mean_hops, None);
    assert_eq!(random.min_hops, None);
    assert_eq!(random.failures.get("hop_limit_exceeded"), Some(&2));
}

#[test]
fn test_summarize_empty() {
    assert!(summarize(&[]).is_empty());
}

// ============================================================================
// Rendering Tests
// ============================================================================

fn sample_report() -> StatsReport {
    let rows = sample_rows();
    StatsReport {
        total_traversals: rows.len(),
        total_pages: 7,
        strategies: summarize(&rows),
    }
}

#[test]
fn test_text_report_contents() {
    let text = generate_text_report(&sample_report());

    assert!(text.contains("PHILHOP TRAVERSAL STATISTICS"));
    assert!(text.contains("Traversals:   6"));
    assert!(text.contains("WORDNET"));
    assert!(text.contains("Reached:      2 (50.0%)"));
    assert!(text.contains("mean 11.00, min 10, max 12"));
    assert!(text.contains("hop_limit_exceeded"));
    assert!(text.contains("End of Report"));
}

#[test]
fn test_text_report_empty() {
    let report = StatsReport {
        total_traversals: 0,
        total_pages: 1,
        strategies: Vec::new(),
    };
    assert!(generate_text_report(&report).contains("No traversals recorded yet."));
}

#[test]
fn test_json_report_structure() {
    let json = generate_json_report(&sample_report()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["report"]["metadata"]["generator"], "philhop");
    assert_eq!(value["report"]["summary"]["total_traversals"], 6);
    assert_eq!(value["report"]["strategies"][1]["strategy"], "WORDNET");
    assert_eq!(value["report"]["strategies"][1]["reached"], 2);
    assert_eq!(value["report"]["strategies"][0]["mean_hops"], serde_json::Value::Null);
}

#[test]
fn test_save_report() {
    let temp_dir = TempDir::new().unwrap();
    let report_path = temp_dir.path().join("stats.txt");

    save_report("hello", &report_path).unwrap();
    assert_eq!(std::fs::read_to_string(&report_path).unwrap(), "hello");
}
