//! Delta-based CPU utilisation sampling.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::CpuConfig;

/// Path of the kernel's cumulative per-core tick counters.
const PROC_STAT: &str = "/proc/stat";

/// Cumulative busy/total tick counters for one logical core.
///
/// The counters are monotonically increasing; only deltas between two
/// consecutive samples are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreTicks {
    /// Ticks spent busy since boot.
    pub busy: u64,
    /// All ticks since boot.
    pub total: u64,
}

#[derive(Debug, Default)]
struct CpuState {
    previous: Vec<CoreTicks>,
    cpu_usage: f64,
    idle_cpu_count: usize,
}

/// Periodic CPU usage tracker.
///
/// Every sample interval the per-core counters are read and compared
/// against the previous sample; the deltas yield an aggregate usage
/// fraction and the number of cores that stayed mostly idle. Used as a
/// capacity signal for scheduling decisions.
#[derive(Debug)]
pub struct CpuTracker {
    config: CpuConfig,
    state: Mutex<CpuState>,
    cancel: CancellationToken,
}

impl CpuTracker {
    /// Creates a tracker; call [`start`](Self::start) to begin sampling.
    #[must_use]
    pub fn new(config: CpuConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CpuState::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Aggregate usage fraction over the last interval, in `[0, 1]`.
    #[must_use]
    pub fn cpu_usage(&self) -> f64 {
        self.state.lock().cpu_usage
    }

    /// Number of cores whose usage stayed below the idle threshold over
    /// the last interval.
    #[must_use]
    pub fn idle_cpu_count(&self) -> usize {
        self.state.lock().idle_cpu_count
    }

    /// Starts the sampling loop.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let interval = self.config.sample_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.sample().await,
                    () = cancel.cancelled() => break,
                }
            }
            debug!("CPU tracker stopped");
        });
    }

    /// Stops sampling; the last computed values remain readable.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    async fn sample(&self) {
        match tokio::fs::read_to_string(PROC_STAT).await {
            Ok(contents) => {
                let cores = parse_proc_stat(&contents);
                self.apply_sample(&cores);
            }
            Err(e) => warn!(error = %e, "Failed to read CPU counters"),
        }
    }

    /// Folds a new sample into the state, computing usage from the deltas
    /// against the previous sample.
    fn apply_sample(&self, cores: &[CoreTicks]) {
        let mut state = self.state.lock();

        if state.previous.len() == cores.len() {
            let mut busy_delta = 0u64;
            let mut total_delta = 0u64;
            let mut idle_cores = 0usize;

            for (previous, current) in state.previous.iter().zip(cores) {
                let busy = current.busy.saturating_sub(previous.busy);
                let total = current.total.saturating_sub(previous.total);
                busy_delta += busy;
                total_delta += total;

                #[allow(clippy::cast_precision_loss)]
                let core_usage = if total == 0 {
                    0.0
                } else {
                    busy as f64 / total as f64
                };
                if core_usage < self.config.idle_threshold {
                    idle_cores += 1;
                }
            }

            #[allow(clippy::cast_precision_loss)]
            if total_delta > 0 {
                state.cpu_usage = busy_delta as f64 / total_delta as f64;
            }
            state.idle_cpu_count = idle_cores;
        }

        state.previous = cores.to_vec();
    }
}

/// Parses per-core cumulative tick counters out of `/proc/stat` contents.
///
/// Only the `cpuN` lines are considered; the aggregate `cpu` line is
/// skipped. Busy time is everything except idle and iowait.
fn parse_proc_stat(contents: &str) -> Vec<CoreTicks> {
    let mut cores = Vec::new();

    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else { continue };
        if !label.starts_with("cpu") || label == "cpu" {
            continue;
        }

        let ticks: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
        if ticks.len() < 5 {
            continue;
        }

        let total: u64 = ticks.iter().sum();
        // Fields: user nice system idle iowait irq softirq steal ...
        let idle = ticks[3] + ticks[4];
        cores.push(CoreTicks {
            busy: total - idle,
            total,
        });
    }

    cores
}
