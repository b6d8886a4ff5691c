// Statistics reports over recorded traversals

use crate::engine::TerminalReason;
use crate::record::{Database, TraversalRow};
use rusqlite::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Convergence statistics for one strategy tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: String,
    pub attempts: usize,
    pub reached: usize,
    pub convergence_rate: f64,
    /// Hop counts are taken over traversals that reached the target.
    pub mean_hops: Option<f64>,
    pub min_hops: Option<usize>,
    pub max_hops: Option<usize>,
    pub cycle_eliminations: usize,
    pub failures: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_traversals: usize,
    pub total_pages: usize,
    pub strategies: Vec<StrategyStats>,
}

/// Group rows by strategy tag, in tag order.
pub fn summarize(rows: &[TraversalRow]) -> Vec<StrategyStats> {
    let mut grouped: BTreeMap<&str, Vec<&TraversalRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.strategy.as_str()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(strategy, rows)| {
            let reached: Vec<usize> = rows
                .iter()
                .filter(|r| r.reason() == Some(TerminalReason::ReachedTarget))
                .map(|r| r.hops)
                .collect();

            let mut failures = BTreeMap::new();
            for row in rows.iter().filter(|r| r.reason() != Some(TerminalReason::ReachedTarget)) {
                *failures.entry(row.reason.clone()).or_insert(0) += 1;
            }

            let attempts = rows.len();
            StrategyStats {
                strategy: strategy.to_string(),
                attempts,
                reached: reached.len(),
                convergence_rate: reached.len() as f64 / attempts as f64,
                mean_hops: (!reached.is_empty())
                    .then(|| reached.iter().sum::<usize>() as f64 / reached.len() as f64),
                min_hops: reached.iter().min().copied(),
                max_hops: reached.iter().max().copied(),
                cycle_eliminations: rows.iter().filter(|r| r.cycle_eliminated).count(),
                failures,
            }
        })
        .collect()
}

pub fn gather_stats(db: &Database, strategy: Option<&str>) -> Result<StatsReport> {
    let rows = db.get_traversals(strategy)?;
    Ok(StatsReport {
        total_traversals: rows.len(),
        total_pages: db.count_pages()?,
        strategies: summarize(&rows),
    })
}

pub fn generate_text_report(data: &StatsReport) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                        PHILHOP TRAVERSAL STATISTICS\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Generated:    {}\n", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
    report.push_str(&format!("Traversals:   {}\n", data.total_traversals));
    report.push_str(&format!("Tree pages:   {}\n\n", data.total_pages));

    if data.strategies.is_empty() {
        report.push_str("No traversals recorded yet.\n\n");
    }

    for stats in &data.strategies {
        report.push_str(HEAVY_RULE);
        report.push_str(&format!("{}\n", stats.strategy));
        report.push_str(HEAVY_RULE);
        report.push('\n');

        report.push_str(&format!("Attempts:     {}\n", stats.attempts));
        report.push_str(&format!(
            "Reached:      {} ({:.1}%)\n",
            stats.reached,
            stats.convergence_rate * 100.0
        ));

        match (stats.mean_hops, stats.min_hops, stats.max_hops) {
            (Some(mean), Some(min), Some(max)) => {
                report.push_str(&format!("Hops:         mean {:.2}, min {}, max {}\n", mean, min, max));
            }
            _ => report.push_str("Hops:         n/a\n"),
        }
        report.push_str(&format!("Eliminations: {}\n", stats.cycle_eliminations));

        if !stats.failures.is_empty() {
            report.push_str("\nFailures:\n");
            for (reason, count) in &stats.failures {
                report.push_str(&format!("  {:<22}{}\n", reason, count));
            }
        }
        report.push('\n');
        report.push_str(LIGHT_RULE);
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("                          End of Report\n");
    report.push_str(HEAVY_RULE);

    report
}

pub fn generate_json_report(data: &StatsReport) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "philhop",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "summary": {
                "total_traversals": data.total_traversals,
                "total_pages": data.total_pages
            },
            "strategies": data.strategies
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
