use crate::error::{CliError, Result};
use crate::output::OutputManager;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use modelbench::{open_backend, BenchConfig, QueryFilters, TimeRange};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Only results of this model
    #[arg(long, short)]
    pub model: Option<String>,

    /// Only results of this model version
    #[arg(long = "model-version")]
    pub model_version: Option<String>,

    /// Only results for this task type
    #[arg(long, short)]
    pub task: Option<String>,

    /// Only results on this dataset
    #[arg(long, short)]
    pub dataset: Option<String>,

    /// Only results for this metric
    #[arg(long)]
    pub metric: Option<String>,

    /// Results recorded at or after this time
    #[arg(long)]
    pub since: Option<String>,

    /// Results recorded before this time
    #[arg(long)]
    pub until: Option<String>,

    /// Maximum number of results
    #[arg(long, short)]
    pub limit: Option<usize>,
}

impl QueryArgs {
    fn filters(&self) -> Result<QueryFilters> {
        let mut filters = QueryFilters::new();
        if let Some(model) = &self.model {
            filters = filters.model_name(model);
        }
        if let Some(version) = &self.model_version {
            filters = filters.model_version(version);
        }
        if let Some(task) = &self.task {
            filters = filters.task_type(task);
        }
        if let Some(dataset) = &self.dataset {
            filters = filters.dataset(dataset);
        }
        if let Some(metric) = &self.metric {
            filters = filters.metric(metric);
        }

        let start = self.since.as_deref().map(parse_time).transpose()?;
        let end = self.until.as_deref().map(parse_time).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(CliError::InvalidTimeRange(format!(
                    "--since {} is after --until {}",
                    start, end
                )));
            }
        }
        if start.is_some() || end.is_some() {
            filters = filters.time_range(TimeRange::new(start, end));
        }

        if let Some(limit) = self.limit {
            filters = filters.limit(limit);
        }
        Ok(filters)
    }
}

/// Parse an RFC 3339 instant or a bare date (midnight UTC)
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| CliError::InvalidTimeRange(format!("cannot parse '{}'", value)))
}

pub fn run(args: QueryArgs, config: &BenchConfig, output: &OutputManager) -> Result<()> {
    let filters = args.filters()?;
    tracing::debug!(?filters, "Querying results");

    let mut backend = open_backend(&config.storage)?;
    let results = backend.query_results(&filters)?;
    backend.close()?;

    output.print_results(&results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args() -> QueryArgs {
        QueryArgs {
            model: None,
            model_version: None,
            task: None,
            dataset: None,
            metric: None,
            since: None,
            until: None,
            limit: None,
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("2024-01-02").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("2024-01-02T10:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap()
        );
        assert!(matches!(parse_time("yesterday"), Err(CliError::InvalidTimeRange(_))));
    }

    #[test]
    fn test_filters_from_args() {
        let mut query = args();
        query.model = Some("resnet-50".to_string());
        query.since = Some("2024-01-01".to_string());
        query.limit = Some(3);

        let filters = query.filters().unwrap();
        assert_eq!(filters.model_name.as_deref(), Some("resnet-50"));
        assert_eq!(filters.limit, Some(3));
        let range = filters.time_range.unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(range.end, None);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let mut query = args();
        query.since = Some("2024-02-01".to_string());
        query.until = Some("2024-01-01".to_string());
        assert!(matches!(query.filters(), Err(CliError::InvalidTimeRange(_))));
    }
}
