//! Command dispatch.

use crate::cpu::Effect;
use crate::device::Endpoint;
use crate::monitor::{Command, Monitor, MonitorError, RunReport, StopReason};

/// What a command produced.
#[derive(Debug)]
pub enum Reply {
    None,
    Text(String),
    Run(RunReport),
    Quit,
}

impl Monitor {
    /// Carry out one operator command.
    ///
    /// Errors leave the session as it was; the operator can correct the
    /// command and try again.
    pub fn execute(&mut self, command: Command) -> Result<Reply, MonitorError> {
        let reply = match command {
            Command::Deposit { target, value } => {
                self.deposit(target, value)?;
                Reply::None
            }
            Command::Examine(target) => Reply::Text(self.examine(target)?),

            Command::Go(Some(addr)) => Reply::Run(self.run(addr)?),
            Command::Go(None) => Reply::Run(self.resume()),
            Command::Step(1) => Reply::Run(self.single_step()),
            Command::Step(n) => Reply::Run(self.step_n(n)),

            Command::Break(Some(addr)) => {
                self.set_break(addr)?;
                Reply::None
            }
            Command::Break(None) => Reply::Text(format!("Breakpoints: {}", address_list(self.breakpoints()))),
            Command::Clear(addr) => {
                self.clear_break(addr)?;
                Reply::None
            }
            Command::AcStop(Some(addr)) => {
                self.set_compare_stop(addr)?;
                Reply::None
            }
            Command::AcStop(None) => {
                Reply::Text(format!("Address Compare Stops: {}", address_list(self.compare_stops())))
            }
            Command::AcClear(addr) => {
                self.clear_compare_stop(addr)?;
                Reply::None
            }

            Command::Trace(Some(true)) => {
                self.enable_trace();
                Reply::None
            }
            Command::Trace(Some(false)) => {
                self.disable_trace();
                Reply::None
            }
            Command::Trace(None) => {
                Reply::Text(format!("trace {}", if self.is_tracing() { "on" } else { "off" }))
            }

            Command::Throttle(Some(ips)) => {
                self.configure_throttle(ips)?;
                Reply::None
            }
            Command::Throttle(None) => Reply::Text(match self.throttle().ips() {
                0 => "not throttled".to_string(),
                ips => format!("{} Instr/sec", ips),
            }),

            Command::Attach { slot, endpoint } => {
                self.devices_mut().attach(slot, Endpoint::parse(&endpoint))?;
                Reply::None
            }
            Command::Detach(slot) => {
                self.devices_mut().detach(slot)?;
                Reply::None
            }

            Command::Load { path, addr } => {
                let count = self.load_tape(&path, addr)?;
                Reply::Text(format!("{} words loaded at {:04o}", count, addr))
            }
            Command::Punch { path, addr, count } => {
                self.punch_tape(&path, addr, count)?;
                Reply::Text(format!("{} words punched to {}", count, path.display()))
            }

            Command::Status => Reply::Text(self.status().to_string()),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }
}

impl Monitor {
    /// One bare cycle, reported like a run of one.
    fn single_step(&mut self) -> RunReport {
        match self.step() {
            Ok(record) => {
                let stop = match record.effect {
                    Effect::Halted { at } => StopReason::Halted { at },
                    _ => StopReason::StepLimit(1),
                };
                RunReport { stop, executed: 1, last: Some(record) }
            }
            Err(fault) if fault.error.is_interrupt() => {
                RunReport { stop: StopReason::Interrupted, executed: 0, last: None }
            }
            Err(fault) => RunReport { stop: StopReason::Faulted(fault), executed: 0, last: None },
        }
    }
}

fn address_list(addrs: impl Iterator<Item = u16>) -> String {
    let list: Vec<String> = addrs.map(|addr| format!("{:04o}", addr)).collect();
    if list.is_empty() {
        "none".to_string()
    } else {
        list.join(" ")
    }
}
