//! The Digiac monitor.
//!
//! The monitor owns a session: the CPU, its devices, the throttle, and the
//! debugging state layered on top (breakpoints, address compare stops,
//! tracing). Runs are driven from here, one instruction cycle at a time,
//! and always stop with a distinct [`StopReason`].

pub mod command;
mod dispatch;
pub mod trace;

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{CancelToken, Throttle, ThrottleError};
use crate::config::{Config, ConfigError};
use crate::cpu::{Cpu, CpuState, Effect, ExecFault, MemoryError, MEMORY_SIZE};
use crate::device::{DeviceError, DeviceManager, Endpoint};
use crate::tape::{self, TapeError};
use crate::word::{charset, Word};

pub use command::{Command, CommandError, Target};
pub use dispatch::Reply;
pub use trace::{LogSink, TraceBuffer, TraceRecord, TraceSink, WriterSink};

/// Why a run stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The program executed HLT; `at` is the address after it.
    Halted { at: u16 },
    /// PC reached a breakpoint. The instruction there has not run.
    Breakpoint { at: u16 },
    /// An instruction touched a compare-stop address.
    CompareStop { addr: u16 },
    /// An instruction faulted. PC still points at it.
    Faulted(ExecFault),
    /// The operator cancelled the run.
    Interrupted,
    /// The requested number of instructions ran.
    StepLimit(u64),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Halted { at } => write!(f, "HALTED at {:04o}", at),
            StopReason::Breakpoint { at } => write!(f, "Breakpoint at {:04o}", at),
            StopReason::CompareStop { addr } => write!(f, "Address Compare Stop @ {:04o}", addr),
            StopReason::Faulted(fault) => write!(f, "{}", fault),
            StopReason::Interrupted => f.write_str("Interrupted"),
            StopReason::StepLimit(n) => write!(f, "Instruction count {} reached", n),
        }
    }
}

/// The outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    pub stop: StopReason,
    /// Instructions completed by this run.
    pub executed: u64,
    /// The last instruction completed.
    pub last: Option<TraceRecord>,
}

impl RunReport {
    /// Text for the operator. When tracing, the last record was already
    /// shown and is left out.
    pub fn render(&self, traced: bool) -> String {
        let last = if traced { None } else { self.last.as_ref() };
        match (&self.stop, last) {
            // The record's effect already says HALTED.
            (StopReason::Halted { .. }, Some(last)) => last.to_string(),
            (StopReason::StepLimit(1), Some(last)) => last.to_string(),
            (StopReason::StepLimit(1), None) => String::new(),
            (stop, Some(last)) => format!("{}\n{}", last, stop),
            (stop, None) => stop.to_string(),
        }
    }
}

/// A snapshot of the machine for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub state: CpuState,
    pub pc: u16,
    /// The word at PC, about to be fetched.
    pub next: Word,
    /// The word fetched by the last instruction cycle.
    pub last_fetch: Option<Word>,
    pub a: Word,
    pub b: Word,
    pub instruction_count: u64,
    /// Configured rate; 0 is unthrottled.
    pub ips: u32,
    /// Rate achieved by the last run.
    pub effective_ips: Option<f64>,
    pub breakpoints: Vec<u16>,
    pub compare_stops: Vec<u16>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digiac< PC: {:04o}->{:08o} IR: {} A: {} B: {} Icnt: {} IPS: {}",
            self.pc,
            self.next.magnitude(),
            self.last_fetch
                .map_or_else(|| "--------".to_string(), |word| format!("{:08o}", word.magnitude())),
            self.a,
            self.b,
            self.instruction_count,
            self.ips
        )?;
        if !self.breakpoints.is_empty() {
            f.write_str(" bpt")?;
            for addr in &self.breakpoints {
                write!(f, ":{:04o}", addr)?;
            }
        }
        if !self.compare_stops.is_empty() {
            f.write_str(" acs")?;
            for addr in &self.compare_stops {
                write!(f, ":{:04o}", addr)?;
            }
        }
        f.write_str(">")
    }
}

/// An emulation session.
pub struct Monitor {
    cpu: Cpu,
    devices: DeviceManager,
    throttle: Throttle,
    breakpoints: BTreeSet<u16>,
    compare_stops: BTreeSet<u16>,
    trace: bool,
    sink: Box<dyn TraceSink>,
    cancel: CancelToken,
}

impl Monitor {
    /// A session with zeroed memory, no devices, and the default throttle.
    pub fn new() -> Self {
        Self::with_cpu(Cpu::new())
    }

    pub fn with_cpu(cpu: Cpu) -> Self {
        Self {
            cpu,
            devices: DeviceManager::new(),
            throttle: Throttle::default(),
            breakpoints: BTreeSet::new(),
            compare_stops: BTreeSet::new(),
            trace: false,
            sink: Box::new(LogSink),
            cancel: CancelToken::new(),
        }
    }

    /// A session set up as `config` describes, devices attached.
    pub fn from_config(config: &Config) -> Result<Self, MonitorError> {
        let mut monitor = Self::with_cpu(Cpu::with_memory(config.initial_memory()));
        monitor.throttle = Throttle::new(config.ips)?;
        monitor.trace = config.trace;
        monitor.breakpoints.extend(config.breakpoint_addresses()?);
        for (&slot, endpoint) in &config.attach {
            monitor.devices.attach(slot, Endpoint::parse(endpoint))?;
        }
        Ok(monitor)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut DeviceManager {
        &mut self.devices
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// A handle that stops the current or next run when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ==================== Memory and registers ====================

    /// Store a value in memory or a register.
    ///
    /// PC only takes non-negative values that fit in 12 bits.
    pub fn deposit(&mut self, target: Target, value: Word) -> Result<(), MonitorError> {
        match target {
            Target::Memory(addr) => self.cpu.mem.write(addr, value)?,
            Target::A => self.cpu.regs.a = value,
            Target::B => self.cpu.regs.b = value,
            Target::Pc => {
                if value.is_negative() || value.magnitude() >= MEMORY_SIZE as u32 {
                    return Err(MonitorError::InvalidPc(value));
                }
                self.cpu.regs.pc = value.magnitude() as u16;
            }
        }
        Ok(())
    }

    /// Show memory or a register the way the operator's console did.
    pub fn examine(&self, target: Target) -> Result<String, MonitorError> {
        let text = match target {
            Target::Memory(addr) => {
                let word = self.cpu.mem.read(addr)?;
                format!("{:04o}: {} {}", addr, word, charset::word_chars(word))
            }
            Target::A => format!("A: {} {}", self.cpu.regs.a, charset::word_chars(self.cpu.regs.a)),
            Target::B => format!("B: {} {}", self.cpu.regs.b, charset::word_chars(self.cpu.regs.b)),
            Target::Pc => format!("PC: {:04o}", self.cpu.regs.pc),
        };
        Ok(text)
    }

    // ==================== Breakpoints ====================

    pub fn set_break(&mut self, addr: usize) -> Result<(), MonitorError> {
        let addr = check_address(addr)?;
        self.breakpoints.insert(addr);
        debug!(addr = %format!("{:04o}", addr), "breakpoint set");
        Ok(())
    }

    /// Returns whether a breakpoint was set there.
    pub fn clear_break(&mut self, addr: usize) -> Result<bool, MonitorError> {
        Ok(self.breakpoints.remove(&check_address(addr)?))
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    pub fn set_compare_stop(&mut self, addr: usize) -> Result<(), MonitorError> {
        let addr = check_address(addr)?;
        self.compare_stops.insert(addr);
        debug!(addr = %format!("{:04o}", addr), "compare stop set");
        Ok(())
    }

    pub fn clear_compare_stop(&mut self, addr: usize) -> Result<bool, MonitorError> {
        Ok(self.compare_stops.remove(&check_address(addr)?))
    }

    pub fn compare_stops(&self) -> impl Iterator<Item = u16> + '_ {
        self.compare_stops.iter().copied()
    }

    // ==================== Tracing and pacing ====================

    pub fn enable_trace(&mut self) {
        self.trace = true;
    }

    pub fn disable_trace(&mut self) {
        self.trace = false;
    }

    pub fn is_tracing(&self) -> bool {
        self.trace
    }

    /// Where trace records go while tracing is enabled.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sink = sink;
    }

    pub fn configure_throttle(&mut self, ips: u32) -> Result<(), MonitorError> {
        Ok(self.throttle.configure(ips)?)
    }

    // ==================== Execution ====================

    /// Execute exactly one instruction, ignoring breakpoints and the throttle.
    pub fn step(&mut self) -> Result<TraceRecord, ExecFault> {
        let result = self.cpu.step(&mut self.devices);
        self.settle();
        let executed = result?;
        let record = TraceRecord::new(&executed, &self.cpu.regs);
        if self.trace {
            self.sink.record(&record);
        }
        Ok(record)
    }

    /// Execute up to `n` instructions from PC.
    pub fn step_n(&mut self, n: u64) -> RunReport {
        self.run_loop(Some(n))
    }

    /// Set PC to `from` and run until something stops the machine.
    pub fn run(&mut self, from: usize) -> Result<RunReport, MonitorError> {
        self.cpu.regs.pc = check_address(from)?;
        Ok(self.run_loop(None))
    }

    /// Continue from PC.
    pub fn resume(&mut self) -> RunReport {
        self.run_loop(None)
    }

    fn run_loop(&mut self, limit: Option<u64>) -> RunReport {
        self.cancel.reset();
        self.throttle.start();
        info!(pc = %format!("{:04o}", self.cpu.regs.pc), "run started");

        let mut executed = 0u64;
        let mut last = None;

        let stop = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Interrupted;
            }

            // A run that starts on a breakpoint executes it first.
            let pc = self.cpu.regs.pc;
            if executed > 0 && self.breakpoints.contains(&pc) {
                break StopReason::Breakpoint { at: pc };
            }

            if !self.throttle.await_next_cycle(&self.cancel) {
                break StopReason::Interrupted;
            }

            let done = match self.cpu.step(&mut self.devices) {
                Ok(done) => done,
                Err(fault) if fault.error.is_interrupt() => break StopReason::Interrupted,
                Err(fault) => break StopReason::Faulted(fault),
            };
            self.throttle.cycle_completed();
            executed += 1;

            let record = TraceRecord::new(&done, &self.cpu.regs);
            if self.trace {
                self.sink.record(&record);
            }
            last = Some(record);

            if let Effect::Halted { at } = done.effect {
                break StopReason::Halted { at };
            }
            if let Some(addr) = self.compare_hit() {
                break StopReason::CompareStop { addr };
            }
            if limit.is_some_and(|n| executed >= n) {
                break StopReason::StepLimit(executed);
            }
        };

        let rate = self.throttle.finish();
        self.settle();
        info!(
            stop = %stop,
            executed,
            ips = rate.unwrap_or_default(),
            "run stopped"
        );

        RunReport { stop, executed, last }
    }

    /// First compare-stop address the last cycle touched.
    fn compare_hit(&self) -> Option<u16> {
        self.cpu
            .accesses()
            .iter()
            .map(|access| access.addr)
            .find(|addr| self.compare_stops.contains(addr))
    }

    /// Leave the running state and flush output devices.
    fn settle(&mut self) {
        if self.cpu.state == CpuState::Running {
            self.cpu.state = CpuState::Ready;
        }
        if let Err(e) = self.devices.flush_all() {
            warn!(error = %e, "failed to flush devices");
        }
    }

    // ==================== Status ====================

    pub fn status(&self) -> Status {
        let pc = self.cpu.regs.pc;
        Status {
            state: self.cpu.state,
            pc,
            next: self.cpu.mem.read(usize::from(pc)).unwrap_or_default(),
            last_fetch: self.cpu.last_fetch(),
            a: self.cpu.regs.a,
            b: self.cpu.regs.b,
            instruction_count: self.cpu.regs.instruction_count,
            ips: self.throttle.ips(),
            effective_ips: self.throttle.effective_ips(),
            breakpoints: self.breakpoints().collect(),
            compare_stops: self.compare_stops().collect(),
        }
    }

    // ==================== Tape images ====================

    /// Load a tape file into memory at `addr`. Returns the word count.
    pub fn load_tape(&mut self, path: &Path, addr: usize) -> Result<usize, MonitorError> {
        let bytes = fs::read(path).map_err(|source| MonitorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let words = tape::load(&bytes)?;
        self.load_image(addr, &words)?;
        info!(path = %path.display(), words = words.len(), "tape loaded");
        Ok(words.len())
    }

    /// Copy words into memory at `addr`.
    pub fn load_image(&mut self, addr: usize, words: &[Word]) -> Result<(), MonitorError> {
        Ok(self.cpu.mem.load(addr, words)?)
    }

    /// Punch `count` words starting at `addr` to a tape file.
    pub fn punch_tape(&self, path: &Path, addr: usize, count: usize) -> Result<(), MonitorError> {
        let words = self.cpu.mem.dump(addr, count)?;
        fs::write(path, tape::dump(&words)).map_err(|source| MonitorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), words = count, "tape punched");
        Ok(())
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("cpu", &self.cpu)
            .field("devices", &self.devices)
            .field("throttle", &self.throttle)
            .field("breakpoints", &self.breakpoints)
            .field("compare_stops", &self.compare_stops)
            .field("trace", &self.trace)
            .finish()
    }
}

fn check_address(addr: usize) -> Result<u16, MemoryError> {
    if addr < MEMORY_SIZE {
        Ok(addr as u16)
    } else {
        Err(MemoryError::AddressOutOfRange(addr))
    }
}

/// Errors from monitor operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Tape(#[from] TapeError),

    #[error(transparent)]
    Throttle(#[from] ThrottleError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid PC value {0} (0000-7777)")]
    InvalidPc(Word),
}
