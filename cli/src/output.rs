use crate::error::Result;
use console::style;
use modelbench::report::{self, LeaderboardEntry};
use modelbench::{BenchmarkResult, Comparison};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn print_results(&self, results: &[BenchmarkResult]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&results),
            OutputFormat::Table => {
                print!("{}", report::format_results(results));
                Ok(())
            }
        }
    }

    pub fn print_comparison(&self, comparison: &Comparison) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(comparison),
            OutputFormat::Table => {
                self.print_heading("Comparison");
                print!("{}", report::format_comparison(comparison));
                Ok(())
            }
        }
    }

    pub fn print_leaderboard(&self, title: &str, entries: &[LeaderboardEntry]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&entries),
            OutputFormat::Table => {
                self.print_heading(title);
                print!("{}", report::format_leaderboard(entries));
                Ok(())
            }
        }
    }

    pub fn print_key_values(&self, pairs: &[(&str, String)]) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let map: BTreeMap<&str, &str> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
                self.print_json(&map)
            }
            OutputFormat::Table => {
                for (key, value) in pairs {
                    if self.colored {
                        println!("{}: {}", style(key).bold().blue(), style(value).green());
                    } else {
                        println!("{}: {}", key, value);
                    }
                }
                Ok(())
            }
        }
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn print_success(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("✓").green().bold(), message);
        } else {
            println!("✓ {}", message);
        }
        Ok(())
    }

    pub fn print_info(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("ℹ").blue().bold(), message);
        } else {
            println!("ℹ {}", message);
        }
        Ok(())
    }

    fn print_heading(&self, title: &str) {
        if self.colored {
            println!("\n{}", style(title).bold().underlined());
        } else {
            println!("\n{}", title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TABLE".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_is_json() {
        assert!(OutputManager::new(OutputFormat::Json, false).is_json());
        assert!(!OutputManager::new(OutputFormat::Table, true).is_json());
    }
}
