//! Result filters and the ordering every backend returns

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::BenchmarkResult;

/// Half-open interval `[start, end)` over result timestamps; a missing bound
/// is unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self::new(Some(start), None)
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self::new(None, Some(end))
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| timestamp >= start) && self.end.map_or(true, |end| timestamp < end)
    }

    /// Whether no timestamp can satisfy the range
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start >= end)
    }

    /// Bounds in microseconds since the epoch
    pub(crate) fn as_micros(&self) -> (Option<i64>, Option<i64>) {
        (
            self.start.map(|t| t.timestamp_micros()),
            self.end.map(|t| t.timestamp_micros()),
        )
    }
}

/// Options recognised by `query_results`; unset options impose no constraint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub task_type: Option<String>,
    pub dataset: Option<String>,
    pub metric: Option<String>,
    pub time_range: Option<TimeRange>,
    /// Maximum number of rows, applied after ordering
    pub limit: Option<usize>,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `result` satisfies every set option except `limit`
    pub fn matches(&self, result: &BenchmarkResult) -> bool {
        fn field(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |wanted| wanted == value)
        }

        field(&self.model_name, &result.model_name)
            && field(&self.model_version, &result.model_version)
            && field(&self.task_type, &result.task_type)
            && field(&self.dataset, &result.dataset)
            && field(&self.metric, &result.metric)
            && self.time_range.map_or(true, |range| range.contains(result.timestamp))
    }

    /// Whether the filters can never match anything
    pub(crate) fn is_unsatisfiable(&self) -> bool {
        self.limit == Some(0) || self.time_range.is_some_and(|range| range.is_empty())
    }
}

/// Total order shared by every backend: newest first, then the descriptive
/// key ascending
pub fn result_order(a: &BenchmarkResult, b: &BenchmarkResult) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.model_name.cmp(&b.model_name))
        .then_with(|| a.model_version.cmp(&b.model_version))
        .then_with(|| a.task_type.cmp(&b.task_type))
        .then_with(|| a.dataset.cmp(&b.dataset))
        .then_with(|| a.metric.cmp(&b.metric))
}

/// Sort into the shared order and apply the row limit
pub(crate) fn finish(mut results: Vec<BenchmarkResult>, filters: &QueryFilters) -> Vec<BenchmarkResult> {
    results.sort_by(result_order);
    if let Some(limit) = filters.limit {
        results.truncate(limit);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;
    use chrono::TimeZone;

    fn at(micros: i64) -> DateTime<Utc> {
        Utc.timestamp_micros(micros).unwrap()
    }

    #[test]
    fn test_time_range_is_half_open() {
        let range = TimeRange::new(Some(at(10)), Some(at(20)));
        assert!(!range.contains(at(9)));
        assert!(range.contains(at(10)));
        assert!(range.contains(at(19)));
        assert!(!range.contains(at(20)));

        assert!(TimeRange::since(at(10)).contains(at(1_700_000_000_000_000)));
        assert!(TimeRange::until(at(10)).contains(at(-5)));
        assert!(TimeRange::new(Some(at(5)), Some(at(5))).is_empty());
    }

    #[test]
    fn test_matches_respects_every_field() {
        let result = fixtures::result("bert", 1_000);
        assert!(QueryFilters::new().matches(&result));
        assert!(QueryFilters::new().model_name("bert").metric("accuracy").matches(&result));
        assert!(!QueryFilters::new().model_name("gpt").matches(&result));
        assert!(!QueryFilters::new().model_version("2.0.0").matches(&result));
        assert!(!QueryFilters::new().task_type("regression").matches(&result));
        assert!(!QueryFilters::new().dataset("mnist").matches(&result));
        assert!(!QueryFilters::new().time_range(TimeRange::since(at(1_001))).matches(&result));
        // limit is not a row predicate
        assert!(QueryFilters::new().limit(0).matches(&result));
    }

    #[test]
    fn test_finish_orders_newest_first_with_ties_by_name() {
        let results = vec![
            fixtures::result("b", 1),
            fixtures::result("c", 3),
            fixtures::result("a", 3),
            fixtures::result("d", 2),
        ];

        let ordered = finish(results, &QueryFilters::new());
        let names: Vec<_> = ordered.iter().map(|r| r.model_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "d", "b"]);

        let limited = finish(ordered, &QueryFilters::new().limit(2));
        assert_eq!(limited.len(), 2);
    }
}
