//! Resource sampling around a single model invocation
//!
//! Timing uses the monotonic clock. Memory is the resident set size of the
//! current process read before and after the call; the signed difference is
//! returned untouched so callers decide how to report negative growth.

use std::time::{Duration, Instant};

use sysinfo::{Pid, System};

use crate::model::HardwareProfile;

/// Source of resident-memory readings
pub trait MemoryProbe {
    /// Current resident set size in bytes
    fn resident_bytes(&mut self) -> u64;
}

/// Reads the resident set of the current process through sysinfo
pub struct ProcessMemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Unable to resolve current pid, memory deltas will read as zero: {}", e);
                None
            }
        };

        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_bytes(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };

        if !self.system.refresh_process(pid) {
            tracing::warn!("Process {} not found while sampling memory", pid);
            return 0;
        }

        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

/// Measurements taken around one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// Whatever the invocation returned
    pub output: T,
    /// Wall-clock duration of the invocation
    pub elapsed: Duration,
    /// Resident set after minus resident set before, in bytes
    pub memory_delta: i64,
}

/// Instrumentation held open for the duration of one invocation.
///
/// Dropping the scope releases it, so early returns and unwinding panics
/// close it the same way a completed call does.
struct MeasurementScope<'a> {
    probe: &'a mut dyn MemoryProbe,
    started: Instant,
    rss_before: u64,
    _span: tracing::span::EnteredSpan,
    finished: bool,
}

impl<'a> MeasurementScope<'a> {
    fn open(probe: &'a mut dyn MemoryProbe) -> Self {
        let span = tracing::debug_span!("measurement_scope").entered();
        let rss_before = probe.resident_bytes();
        Self {
            probe,
            started: Instant::now(),
            rss_before,
            _span: span,
            finished: false,
        }
    }

    fn finish(mut self) -> (Duration, i64) {
        let elapsed = self.started.elapsed();
        let rss_after = self.probe.resident_bytes();
        self.finished = true;
        (elapsed, rss_after as i64 - self.rss_before as i64)
    }
}

impl Drop for MeasurementScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0,
                "Measurement scope released without a completed invocation"
            );
        }
    }
}

/// Captures elapsed time and memory growth around single invocations
pub struct ResourceSampler {
    probe: Box<dyn MemoryProbe>,
}

impl ResourceSampler {
    /// Sampler reading the resident set of the current process
    pub fn new() -> Self {
        Self::with_probe(Box::new(ProcessMemoryProbe::new()))
    }

    /// Sampler reading memory from a custom probe
    pub fn with_probe(probe: Box<dyn MemoryProbe>) -> Self {
        Self { probe }
    }

    /// Run `invocation` inside a measurement scope.
    ///
    /// Errors returned by the invocation are passed through unchanged and no
    /// sample is produced for them.
    pub fn sample<T, E, F>(&mut self, invocation: F) -> Result<Sample<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let scope = MeasurementScope::open(self.probe.as_mut());
        let output = invocation()?;
        let (elapsed, memory_delta) = scope.finish();

        Ok(Sample {
            output,
            elapsed,
            memory_delta,
        })
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareProfile {
    /// Read CPU model, logical core count, physical memory and OS.
    ///
    /// The values do not change while the process runs; callers capture the
    /// profile once and reuse it.
    pub fn capture() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let cpu = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        let cores = match system.cpus().len() {
            0 => num_cpus::get(),
            n => n,
        };

        let os = System::long_os_version()
            .or_else(System::name)
            .unwrap_or_else(|| std::env::consts::OS.to_string());

        Self {
            cpu,
            cores: u32::try_from(cores).unwrap_or(u32::MAX),
            ram_bytes: system.total_memory(),
            os,
        }
    }
}
