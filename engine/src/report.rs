//! Plain-text rendering of comparisons, result listings and leaderboards

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricKind;
use crate::model::BenchmarkResult;
use crate::runner::Comparison;

/// Aggregate standing of one (model, version) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub model_name: String,
    pub model_version: String,
    pub best_value: f64,
    pub avg_runtime_ms: f64,
    pub runs: usize,
    pub last_run: DateTime<Utc>,
}

/// Group results by (model, version) and rank the groups by their best
/// score.
///
/// "Best" follows the direction of the metric: the lowest value for error
/// metrics such as mse, the highest otherwise. The direction is taken from
/// the first result, so callers rank one metric at a time.
pub fn leaderboard(results: &[BenchmarkResult], limit: usize) -> Vec<LeaderboardEntry> {
    let Some(first) = results.first() else {
        return Vec::new();
    };
    let higher_is_better = first
        .metric
        .parse::<MetricKind>()
        .map_or(true, |metric| metric.higher_is_better());

    let mut groups: HashMap<(&str, &str), (LeaderboardEntry, f64)> = HashMap::new();
    for result in results {
        let (entry, runtime_total) = groups
            .entry((result.model_name.as_str(), result.model_version.as_str()))
            .or_insert_with(|| {
                (
                    LeaderboardEntry {
                        model_name: result.model_name.clone(),
                        model_version: result.model_version.clone(),
                        best_value: result.value,
                        avg_runtime_ms: 0.0,
                        runs: 0,
                        last_run: result.timestamp,
                    },
                    0.0,
                )
            });

        let better = if higher_is_better {
            result.value > entry.best_value
        } else {
            result.value < entry.best_value
        };
        if better {
            entry.best_value = result.value;
        }
        entry.last_run = entry.last_run.max(result.timestamp);
        entry.runs += 1;
        *runtime_total += result.runtime_ms;
    }

    let mut entries: Vec<LeaderboardEntry> = groups
        .into_values()
        .map(|(mut entry, runtime_total)| {
            entry.avg_runtime_ms = runtime_total / entry.runs as f64;
            entry
        })
        .collect();

    entries.sort_by(|a, b| {
        let by_value = if higher_is_better {
            b.best_value.total_cmp(&a.best_value)
        } else {
            a.best_value.total_cmp(&b.best_value)
        };
        by_value
            .then_with(|| a.avg_runtime_ms.total_cmp(&b.avg_runtime_ms))
            .then_with(|| a.model_name.cmp(&b.model_name))
            .then_with(|| a.model_version.cmp(&b.model_version))
    });
    entries.truncate(limit);
    entries
}

/// Render both ranked views of a comparison
pub fn format_comparison(comparison: &Comparison) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ranked by score");
    write_ranked(&mut out, &comparison.by_score);
    let _ = writeln!(out);
    let _ = writeln!(out, "Ranked by runtime");
    write_ranked(&mut out, &comparison.by_runtime);
    out
}

/// Render stored results, one row each, in the order given
pub fn format_results(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    if results.is_empty() {
        let _ = writeln!(out, "No results found");
        return out;
    }

    let model = column_width("Model", results.iter().map(|r| r.model_name.len()));
    let version = column_width("Version", results.iter().map(|r| r.model_version.len()));
    let dataset = column_width("Dataset", results.iter().map(|r| r.dataset.len()));
    let metric = column_width("Metric", results.iter().map(|r| r.metric.len()));

    let _ = writeln!(
        out,
        "{:<20}  {:<model$}  {:<version$}  {:<dataset$}  {:<metric$}  {:>10}  {:>12}  {:>10}",
        "Timestamp", "Model", "Version", "Dataset", "Metric", "Value", "Runtime (ms)", "Memory"
    );
    for r in results {
        let _ = writeln!(
            out,
            "{:<20}  {:<model$}  {:<version$}  {:<dataset$}  {:<metric$}  {:>10.4}  {:>12.3}  {:>10}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.model_name,
            r.model_version,
            r.dataset,
            r.metric,
            r.value,
            r.runtime_ms,
            format_bytes(r.memory_bytes),
        );
    }
    let _ = writeln!(out, "\n{} result(s)", results.len());
    out
}

/// Render a leaderboard
pub fn format_leaderboard(entries: &[LeaderboardEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        let _ = writeln!(out, "No results found");
        return out;
    }

    let model = column_width("Model", entries.iter().map(|e| e.model_name.len()));
    let version = column_width("Version", entries.iter().map(|e| e.model_version.len()));

    let _ = writeln!(
        out,
        "{:>3}  {:<model$}  {:<version$}  {:>10}  {:>16}  {:>5}  {:<20}",
        "#", "Model", "Version", "Best", "Avg runtime (ms)", "Runs", "Last run"
    );
    for (rank, e) in entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<model$}  {:<version$}  {:>10.4}  {:>16.3}  {:>5}  {:<20}",
            rank + 1,
            e.model_name,
            e.model_version,
            e.best_value,
            e.avg_runtime_ms,
            e.runs,
            e.last_run.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    out
}

fn write_ranked(out: &mut String, results: &[BenchmarkResult]) {
    let model = column_width("Model", results.iter().map(|r| r.model_name.len()));
    let version = column_width("Version", results.iter().map(|r| r.model_version.len()));
    let metric = column_width("Metric", results.iter().map(|r| r.metric.len()));

    let _ = writeln!(
        out,
        "{:>3}  {:<model$}  {:<version$}  {:<metric$}  {:>10}  {:>12}  {:>10}",
        "#", "Model", "Version", "Metric", "Value", "Runtime (ms)", "Memory"
    );
    for (rank, r) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<model$}  {:<version$}  {:<metric$}  {:>10.4}  {:>12.3}  {:>10}",
            rank + 1,
            r.model_name,
            r.model_version,
            r.metric,
            r.value,
            r.runtime_ms,
            format_bytes(r.memory_bytes),
        );
    }
}

fn column_width(header: &str, values: impl Iterator<Item = usize>) -> usize {
    values.fold(header.len(), usize::max)
}

/// Format bytes into a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    fn scored(model: &str, version: &str, value: f64, runtime_ms: f64, micros: i64) -> BenchmarkResult {
        let mut result = fixtures::result(model, micros);
        result.model_version = version.to_string();
        result.value = value;
        result.runtime_ms = runtime_ms;
        result
    }

    #[test]
    fn test_format_comparison_lists_both_views() {
        let comparison = Comparison::rank(vec![
            scored("model-a", "1", 0.9, 50.0, 1),
            scored("model-b", "1", 0.8, 20.0, 2),
        ]);
        let text = format_comparison(&comparison);

        let score_section = text.split("Ranked by runtime").next().unwrap();
        let runtime_section = text.split("Ranked by runtime").nth(1).unwrap();
        assert!(score_section.find("model-a").unwrap() < score_section.find("model-b").unwrap());
        assert!(runtime_section.find("model-b").unwrap() < runtime_section.find("model-a").unwrap());
        assert!(text.contains("0.9000"));
    }

    #[test]
    fn test_format_results_empty_and_filled() {
        assert_eq!(format_results(&[]), "No results found\n");

        let text = format_results(&[fixtures::result("resnet-50", 1_700_000_000_000_000)]);
        assert!(text.contains("resnet-50"));
        assert!(text.contains("2023-11-14 22:13:20"));
        assert!(text.contains("4.0 KB"));
        assert!(text.ends_with("1 result(s)\n"));
    }

    #[test]
    fn test_leaderboard_groups_and_ranks() {
        let results = vec![
            scored("a", "1", 0.70, 10.0, 1),
            scored("a", "1", 0.90, 30.0, 5),
            scored("b", "1", 0.85, 5.0, 3),
            scored("a", "2", 0.90, 8.0, 2),
        ];

        let board = leaderboard(&results, 10);
        assert_eq!(board.len(), 3);

        // equal best score, faster average first
        assert_eq!((board[0].model_name.as_str(), board[0].model_version.as_str()), ("a", "2"));
        assert_eq!((board[1].model_name.as_str(), board[1].model_version.as_str()), ("a", "1"));
        assert_eq!(board[1].runs, 2);
        assert_eq!(board[1].avg_runtime_ms, 20.0);
        assert_eq!(board[1].last_run, fixtures::result("a", 5).timestamp);
        assert_eq!(board[2].model_name, "b");

        assert_eq!(leaderboard(&results, 1).len(), 1);
        assert!(leaderboard(&[], 5).is_empty());
    }

    #[test]
    fn test_leaderboard_prefers_lower_error() {
        let mut low = scored("low", "1", 0.1, 10.0, 1);
        low.metric = "mse".to_string();
        let mut high = scored("high", "1", 2.5, 10.0, 2);
        high.metric = "mse".to_string();

        let board = leaderboard(&[high, low], 5);
        assert_eq!(board[0].model_name, "low");
        assert!(format_leaderboard(&board).contains("  1  low"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
