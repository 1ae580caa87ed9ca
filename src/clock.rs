//! Instruction pacing and cancellation.
//!
//! The real machine ran at roughly 60 instructions per second. The
//! throttle paces execution to a configured rate by keeping a deadline
//! for the next cycle and sleeping in short slices until it arrives, so
//! that a cancellation request is noticed promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Default rate, close to the original hardware.
pub const DEFAULT_IPS: u32 = 60;

/// Highest rate the throttle accepts.
pub const MAX_IPS: u32 = 1_000_000;

/// Longest single sleep while waiting for a deadline.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// A shared stop request.
///
/// Clones refer to the same flag, so a signal handler can hold one while
/// the monitor polls another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Paces instruction retirement.
#[derive(Debug, Clone)]
pub struct Throttle {
    ips: u32,
    period: Option<Duration>,
    deadline: Option<Instant>,
    started: Option<Instant>,
    cycles: u64,
    last_rate: Option<f64>,
}

impl Throttle {
    /// A throttle at `ips` instructions per second (0 = unthrottled).
    pub fn new(ips: u32) -> Result<Self, ThrottleError> {
        let mut throttle = Self {
            ips: 0,
            period: None,
            deadline: None,
            started: None,
            cycles: 0,
            last_rate: None,
        };
        throttle.configure(ips)?;
        Ok(throttle)
    }

    /// Change the rate. 0 disables throttling.
    pub fn configure(&mut self, ips: u32) -> Result<(), ThrottleError> {
        if ips > MAX_IPS {
            return Err(ThrottleError::RateTooHigh(ips));
        }
        self.ips = ips;
        self.period = (ips > 0).then(|| Duration::from_secs(1) / ips);
        self.deadline = None;
        debug!(ips, "throttle configured");
        Ok(())
    }

    /// The configured rate (0 = unthrottled).
    pub fn ips(&self) -> u32 {
        self.ips
    }

    /// Start timing a run.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.started = Some(now);
        self.deadline = Some(now);
        self.cycles = 0;
    }

    /// Wait until the next cycle may begin.
    ///
    /// Returns `false` if `cancel` was raised while waiting.
    pub fn await_next_cycle(&mut self, cancel: &CancelToken) -> bool {
        let Some(period) = self.period else {
            return !cancel.is_cancelled();
        };

        let now = Instant::now();
        let deadline = match self.deadline {
            // Fell more than a period behind: re-base rather than burst.
            Some(d) if now.saturating_duration_since(d) <= period => d,
            _ => now,
        };

        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }

        self.deadline = Some(deadline + period);
        true
    }

    /// Count an instruction that ran. Only counted cycles feed the
    /// achieved rate.
    pub fn cycle_completed(&mut self) {
        self.cycles += 1;
    }

    /// Stop timing and record the achieved rate.
    pub fn finish(&mut self) -> Option<f64> {
        let started = self.started.take()?;
        let elapsed = started.elapsed().as_secs_f64();
        if self.cycles > 0 && elapsed > 0.0 {
            self.last_rate = Some(self.cycles as f64 / elapsed);
        }
        self.last_rate
    }

    /// Instructions per second achieved by the last timed run.
    pub fn effective_ips(&self) -> Option<f64> {
        self.last_rate
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            ips: DEFAULT_IPS,
            period: Some(Duration::from_secs(1) / DEFAULT_IPS),
            deadline: None,
            started: None,
            cycles: 0,
            last_rate: None,
        }
    }
}

/// Errors from configuring the throttle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThrottleError {
    #[error("throttle rate {0} exceeds the maximum of 1000000 instructions per second")]
    RateTooHigh(u32),
}
