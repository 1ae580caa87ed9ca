//! # Digiac Emulator
//!
//! An instruction-level emulator of the Digiac-3080, a paper-tape
//! computer with 4096 words of sign-magnitude core memory.
//!
//! Programs reach the machine on punched tape images (`.ptp` files) or by
//! depositing words from the monitor, which also provides breakpoints,
//! address compare stops, tracing and a throttle that paces execution
//! close to the speed of the real machine.

pub mod word;
pub mod cpu;
pub mod tape;
pub mod device;
pub mod clock;
pub mod asm;
pub mod monitor;
pub mod config;

// Re-export commonly used types
pub use word::Word;
pub use cpu::{Cpu, CpuError, CpuState, ExecFault, Instruction, Memory, Registers};
pub use device::{DeviceManager, Endpoint, Slot};
pub use clock::{CancelToken, Throttle};
pub use monitor::{Command, Monitor, MonitorError, Reply, RunReport, Status, StopReason};
pub use config::Config;
