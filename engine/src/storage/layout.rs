//! Day-partitioned directory layout for columnar segments

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::StorageResult;

/// Segments for one UTC day live under `base/YYYY/MM/DD/`
#[derive(Debug, Clone)]
pub struct PartitionLayout {
    pub base_path: PathBuf,
}

impl PartitionLayout {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn partition_dir(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.base_path
            .join(format!("{:04}", timestamp.year()))
            .join(format!("{:02}", timestamp.month()))
            .join(format!("{:02}", timestamp.day()))
    }

    /// Every partition directory whose day can overlap `[start, end)`,
    /// oldest first. Directories not shaped like a date are skipped.
    pub fn partitions_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<(NaiveDate, PathBuf)>> {
        let first_day = start.map(|t| t.date_naive());
        let last_day = end.map(|t| t.date_naive());

        let mut partitions = Vec::new();
        for year in numbered_children(&self.base_path)? {
            for month in numbered_children(&year.1)? {
                for day in numbered_children(&month.1)? {
                    let Some(date) = NaiveDate::from_ymd_opt(year.0 as i32, month.0, day.0) else {
                        tracing::warn!("Skipping partition with invalid date: {}", day.1.display());
                        continue;
                    };

                    if first_day.is_some_and(|first| date < first) || last_day.is_some_and(|last| date > last) {
                        continue;
                    }
                    partitions.push((date, day.1));
                }
            }
        }

        partitions.sort_by_key(|(date, _)| *date);
        Ok(partitions)
    }

    /// Files with the given extension inside one partition, sorted by name
    pub fn segment_files(partition: &Path, extension: &str) -> StorageResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(partition)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn numbered_children(dir: &Path) -> StorageResult<Vec<(u32, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(number) = name.to_str().and_then(|n| n.parse::<u32>().ok()) {
            children.push((number, entry.path()));
        }
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_partition_dir_format() {
        let layout = PartitionLayout::new(PathBuf::from("/data/benchmarks"));
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 59).unwrap();
        assert_eq!(layout.partition_dir(ts), PathBuf::from("/data/benchmarks/2024/03/07"));
    }

    #[test]
    fn test_partitions_between_prunes_days() {
        let temp_dir = TempDir::new().unwrap();
        let layout = PartitionLayout::new(temp_dir.path().to_path_buf());

        for day in [1, 2, 3, 10] {
            let ts = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
            fs::create_dir_all(layout.partition_dir(ts)).unwrap();
        }
        fs::create_dir_all(temp_dir.path().join("2024").join("notes")).unwrap();

        let all = layout.partitions_between(None, None).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));

        let start = Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap();
        let pruned = layout.partitions_between(Some(start), Some(end)).unwrap();
        let days: Vec<_> = pruned.iter().map(|(d, _)| d.day()).collect();
        // the end day is kept; rows are filtered exactly later
        assert_eq!(days, vec![2, 3]);
    }

    #[test]
    fn test_missing_base_has_no_partitions() {
        let layout = PartitionLayout::new(PathBuf::from("/nonexistent/modelbench"));
        assert!(layout.partitions_between(None, None).unwrap().is_empty());
    }
}
