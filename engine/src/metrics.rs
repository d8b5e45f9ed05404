//! Scoring functions turning (predictions, expected) pairs into a scalar

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, MetricResult};

/// A single model output that metrics can be computed over.
///
/// Classification metrics treat labels as class ids where `1` (or `true`)
/// is the positive class. Regression metrics use the numeric value.
pub trait Outcome: PartialEq {
    /// Whether this label is the positive class
    fn is_positive(&self) -> bool;

    /// Numeric value used by regression metrics
    fn to_f64(&self) -> f64;
}

impl Outcome for bool {
    fn is_positive(&self) -> bool {
        *self
    }

    fn to_f64(&self) -> f64 {
        if *self { 1.0 } else { 0.0 }
    }
}

macro_rules! impl_integer_outcome {
    ($($ty:ty),*) => {
        $(
            impl Outcome for $ty {
                fn is_positive(&self) -> bool {
                    *self == 1
                }

                fn to_f64(&self) -> f64 {
                    *self as f64
                }
            }
        )*
    };
}

macro_rules! impl_float_outcome {
    ($($ty:ty),*) => {
        $(
            impl Outcome for $ty {
                fn is_positive(&self) -> bool {
                    *self == 1.0
                }

                fn to_f64(&self) -> f64 {
                    *self as f64
                }
            }
        )*
    };
}

impl_integer_outcome!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
impl_float_outcome!(f32, f64);

/// The closed set of supported metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Accuracy,
    Precision,
    Recall,
    F1,
    Mse,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Accuracy,
        MetricKind::Precision,
        MetricKind::Recall,
        MetricKind::F1,
        MetricKind::Mse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::Precision => "precision",
            MetricKind::Recall => "recall",
            MetricKind::F1 => "f1",
            MetricKind::Mse => "mse",
        }
    }

    /// Whether higher values are better for this metric
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, MetricKind::Mse)
    }

    /// Reject length mismatches and empty input
    pub fn check_shape(predictions: usize, expected: usize) -> MetricResult<()> {
        if predictions != expected {
            return Err(MetricError::ShapeMismatch { predictions, expected });
        }
        if expected == 0 {
            return Err(MetricError::EmptyInput);
        }
        Ok(())
    }

    /// Score `predictions` against `expected`
    pub fn compute<T: Outcome>(&self, predictions: &[T], expected: &[T]) -> MetricResult<f64> {
        Self::check_shape(predictions.len(), expected.len())?;

        let score = match self {
            MetricKind::Accuracy => accuracy(predictions, expected),
            MetricKind::Precision => ConfusionCounts::tally(predictions, expected).precision(),
            MetricKind::Recall => ConfusionCounts::tally(predictions, expected).recall(),
            MetricKind::F1 => ConfusionCounts::tally(predictions, expected).f1(),
            MetricKind::Mse => mean_squared_error(predictions, expected),
        };

        Ok(score)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accuracy" => Ok(MetricKind::Accuracy),
            "precision" => Ok(MetricKind::Precision),
            "recall" => Ok(MetricKind::Recall),
            "f1" => Ok(MetricKind::F1),
            "mse" | "mean_squared_error" => Ok(MetricKind::Mse),
            _ => Err(MetricError::UnsupportedMetric { name: s.to_string() }),
        }
    }
}

/// Compute a metric selected by name
pub fn compute<T: Outcome>(metric_name: &str, predictions: &[T], expected: &[T]) -> MetricResult<f64> {
    metric_name.parse::<MetricKind>()?.compute(predictions, expected)
}

fn accuracy<T: Outcome>(predictions: &[T], expected: &[T]) -> f64 {
    let correct = predictions
        .iter()
        .zip(expected)
        .filter(|(p, e)| p == e)
        .count();
    correct as f64 / expected.len() as f64
}

fn mean_squared_error<T: Outcome>(predictions: &[T], expected: &[T]) -> f64 {
    let total: f64 = predictions
        .iter()
        .zip(expected)
        .map(|(p, e)| (p.to_f64() - e.to_f64()).powi(2))
        .sum();
    total / expected.len() as f64
}

/// Positive-class confusion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConfusionCounts {
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl ConfusionCounts {
    fn tally<T: Outcome>(predictions: &[T], expected: &[T]) -> Self {
        let mut counts = Self::default();
        for (p, e) in predictions.iter().zip(expected) {
            match (p.is_positive(), e.is_positive()) {
                (true, true) => counts.true_positives += 1,
                (true, false) => counts.false_positives += 1,
                (false, true) => counts.false_negatives += 1,
                (false, false) => {}
            }
        }
        counts
    }

    fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / (precision + recall)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
