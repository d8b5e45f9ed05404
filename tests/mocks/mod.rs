//! Stand-ins for the process memory probe and for real models

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use modelbench::MemoryProbe;

/// Memory probe returning pre-recorded readings in order.
///
/// Once the script runs out the last reading repeats. The handle returned by
/// [`ScriptedProbe::reads`] counts how many readings were taken.
pub struct ScriptedProbe {
    readings: VecDeque<u64>,
    last: u64,
    reads: Arc<Mutex<usize>>,
}

impl ScriptedProbe {
    pub fn new(readings: impl IntoIterator<Item = u64>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last: 0,
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// Readings as (before, after) pairs, one pair per invocation
    pub fn deltas(pairs: &[(u64, u64)]) -> Self {
        Self::new(pairs.iter().flat_map(|&(before, after)| [before, after]))
    }

    pub fn reads(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.reads)
    }
}

impl MemoryProbe for ScriptedProbe {
    fn resident_bytes(&mut self) -> u64 {
        *self.reads.lock().unwrap() += 1;
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.last
    }
}

pub mod toy_models {
    use std::thread;
    use std::time::Duration;

    /// Returns fixed predictions after sleeping
    pub fn constant(predictions: Vec<u8>, delay: Duration) -> impl FnMut(&[u8]) -> anyhow::Result<Vec<u8>> {
        move |_inputs: &[u8]| {
            thread::sleep(delay);
            Ok(predictions.clone())
        }
    }

    /// Echoes its inputs
    pub fn identity(inputs: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(inputs.to_vec())
    }

    /// Always fails
    pub fn broken(_inputs: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("model weights not loaded")
    }
}
