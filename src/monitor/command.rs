//! Operator commands.
//!
//! A command line is parsed once into a [`Command`]; the monitor never
//! looks at command text. Addresses and values are octal; counts and rates
//! are decimal.

use std::path::PathBuf;

use crate::device::Slot;
use crate::word::{ParseError, Word};
use thiserror::Error;

/// What `deposit` and `examine` refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A memory address. Not range-checked until used.
    Memory(usize),
    A,
    B,
    Pc,
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ==================== Memory and registers ====================

    /// `deposit|d <addr|a|b|pc> <value>`
    Deposit { target: Target, value: Word },

    /// `examine|e <addr|a|b|pc>`
    Examine(Target),

    // ==================== Execution ====================

    /// `go|g [addr]`: run from `addr`, or resume at PC.
    Go(Option<usize>),

    /// `step|s [n]`
    Step(u64),

    // ==================== Breakpoints ====================

    /// `break [addr]`: set a breakpoint, or list them.
    Break(Option<usize>),

    /// `clear <addr>`
    Clear(usize),

    /// `acstop [addr]`: set an address compare stop, or list them.
    AcStop(Option<usize>),

    /// `aclear <addr>`
    AcClear(usize),

    // ==================== Session ====================

    /// `trace [on|off|1|0]`
    Trace(Option<bool>),

    /// `throttle [ips]`
    Throttle(Option<u32>),

    /// `attach <slot> <path|->`
    Attach { slot: Slot, endpoint: String },

    /// `detach <slot>`
    Detach(Slot),

    /// `load <path> [addr]`
    Load { path: PathBuf, addr: usize },

    /// `punch <path> <addr> <count>`
    Punch { path: PathBuf, addr: usize, count: usize },

    /// `status`
    Status,

    /// `quit|q|exit`
    Quit,
}

impl Command {
    /// Parse one command line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.split('#').next().unwrap_or("").trim();
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();
        let name = name.to_ascii_lowercase();

        let command = match name.as_str() {
            "deposit" | "d" => {
                let [target, value] = exactly::<2>(&name, &args)?;
                Command::Deposit {
                    target: parse_target(target)?,
                    value: Word::parse_octal(value).map_err(|source| CommandError::InvalidValue {
                        value: value.to_string(),
                        source,
                    })?,
                }
            }
            "examine" | "e" => {
                let [target] = exactly::<1>(&name, &args)?;
                Command::Examine(parse_target(target)?)
            }
            "go" | "g" => Command::Go(optional(&name, &args)?.map(parse_address).transpose()?),
            "step" | "s" => {
                let steps = match optional(&name, &args)? {
                    None => 1,
                    Some(arg) => match arg.parse::<u64>() {
                        Ok(n) if n > 0 => n,
                        _ => return Err(CommandError::InvalidCount(arg.to_string())),
                    },
                };
                Command::Step(steps)
            }
            "break" | "b" => Command::Break(optional(&name, &args)?.map(parse_address).transpose()?),
            "clear" => {
                let [addr] = exactly::<1>(&name, &args)?;
                Command::Clear(parse_address(addr)?)
            }
            "acstop" => Command::AcStop(optional(&name, &args)?.map(parse_address).transpose()?),
            "aclear" => {
                let [addr] = exactly::<1>(&name, &args)?;
                Command::AcClear(parse_address(addr)?)
            }
            "trace" => {
                let flag = match optional(&name, &args)? {
                    None => None,
                    Some(arg) => Some(match arg.to_ascii_lowercase().as_str() {
                        "on" | "1" => true,
                        "off" | "0" => false,
                        _ => return Err(CommandError::InvalidFlag(arg.to_string())),
                    }),
                };
                Command::Trace(flag)
            }
            "throttle" => {
                let rate = optional(&name, &args)?
                    .map(|arg| {
                        arg.parse::<u32>()
                            .map_err(|_| CommandError::InvalidCount(arg.to_string()))
                    })
                    .transpose()?;
                Command::Throttle(rate)
            }
            "attach" => {
                let [slot, endpoint] = exactly::<2>(&name, &args)?;
                Command::Attach { slot: parse_slot(slot)?, endpoint: endpoint.to_string() }
            }
            "detach" => {
                let [slot] = exactly::<1>(&name, &args)?;
                Command::Detach(parse_slot(slot)?)
            }
            "load" => match args.as_slice() {
                [path] => Command::Load { path: PathBuf::from(path), addr: 0 },
                [path, addr] => Command::Load { path: PathBuf::from(path), addr: parse_address(addr)? },
                [] => return Err(CommandError::MissingArgument(name.clone())),
                _ => return Err(CommandError::TooManyArguments(name.clone())),
            },
            "punch" => {
                let [path, addr, count] = exactly::<3>(&name, &args)?;
                Command::Punch {
                    path: PathBuf::from(path),
                    addr: parse_address(addr)?,
                    count: count
                        .parse::<usize>()
                        .map_err(|_| CommandError::InvalidCount(count.to_string()))?,
                }
            }
            "status" => {
                exactly::<0>(&name, &args)?;
                Command::Status
            }
            "quit" | "q" | "exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(name.clone())),
        };

        Ok(Some(command))
    }
}

impl std::str::FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)?.ok_or(CommandError::Empty)
    }
}

fn exactly<'a, const N: usize>(name: &str, args: &[&'a str]) -> Result<[&'a str; N], CommandError> {
    if args.len() < N {
        return Err(CommandError::MissingArgument(name.to_string()));
    }
    args.try_into()
        .map_err(|_| CommandError::TooManyArguments(name.to_string()))
}

fn optional<'a>(name: &str, args: &[&'a str]) -> Result<Option<&'a str>, CommandError> {
    match args {
        [] => Ok(None),
        [arg] => Ok(Some(arg)),
        _ => Err(CommandError::TooManyArguments(name.to_string())),
    }
}

/// Parse an octal address. Range is checked by whoever uses it.
pub fn parse_address(s: &str) -> Result<usize, CommandError> {
    if s.is_empty() || !s.chars().all(|c| matches!(c, '0'..='7')) {
        return Err(CommandError::InvalidAddress(s.to_string()));
    }
    usize::from_str_radix(s, 8).map_err(|_| CommandError::InvalidAddress(s.to_string()))
}

fn parse_target(s: &str) -> Result<Target, CommandError> {
    match s.to_ascii_lowercase().as_str() {
        "a" => Ok(Target::A),
        "b" => Ok(Target::B),
        "pc" => Ok(Target::Pc),
        _ => parse_address(s).map(Target::Memory),
    }
}

fn parse_slot(s: &str) -> Result<Slot, CommandError> {
    s.parse().map_err(|_| CommandError::InvalidSlot(s.to_string()))
}

/// Errors from parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("{0}: missing argument")]
    MissingArgument(String),

    #[error("{0}: too many arguments")]
    TooManyArguments(String),

    #[error("invalid address \"{0}\"")]
    InvalidAddress(String),

    #[error("invalid data value \"{value}\": {source}")]
    InvalidValue { value: String, source: ParseError },

    #[error("invalid number \"{0}\"")]
    InvalidCount(String),

    #[error("invalid flag \"{0}\" (expected on, off, 1 or 0)")]
    InvalidFlag(String),

    #[error("unknown device \"{0}\" (expected tty, ptr or ptp)")]
    InvalidSlot(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        line.parse().unwrap()
    }

    #[test]
    fn test_deposit_and_examine() {
        assert_eq!(
            parse("deposit 0 54750002"),
            Command::Deposit { target: Target::Memory(0), value: Word::parse_octal("54750002").unwrap() }
        );
        assert_eq!(
            parse("d a -12345670"),
            Command::Deposit { target: Target::A, value: Word::parse_octal("-12345670").unwrap() }
        );
        assert_eq!(parse("E PC"), Command::Examine(Target::Pc));
        assert_eq!(parse("e 10000"), Command::Examine(Target::Memory(0o10000)));
    }

    #[test]
    fn test_execution_commands() {
        assert_eq!(parse("go"), Command::Go(None));
        assert_eq!(parse("g 17"), Command::Go(Some(0o17)));
        assert_eq!(parse("s"), Command::Step(1));
        assert_eq!(parse("step 10"), Command::Step(10));
        assert_eq!("step 0".parse::<Command>(), Err(CommandError::InvalidCount("0".into())));
    }

    #[test]
    fn test_breakpoint_commands() {
        assert_eq!(parse("break"), Command::Break(None));
        assert_eq!(parse("break 5"), Command::Break(Some(5)));
        assert_eq!(parse("clear 5"), Command::Clear(5));
        assert_eq!(parse("acstop 12"), Command::AcStop(Some(0o12)));
        assert_eq!(parse("aclear 12"), Command::AcClear(0o12));
        assert_eq!("clear".parse::<Command>(), Err(CommandError::MissingArgument("clear".into())));
    }

    #[test]
    fn test_session_commands() {
        assert_eq!(parse("trace on"), Command::Trace(Some(true)));
        assert_eq!(parse("trace 0"), Command::Trace(Some(false)));
        assert_eq!(parse("trace"), Command::Trace(None));
        assert_eq!(parse("throttle 0"), Command::Throttle(Some(0)));
        assert_eq!(parse("throttle"), Command::Throttle(None));
        assert_eq!(
            parse("attach ptr hello.ptp"),
            Command::Attach { slot: Slot::TapeReader, endpoint: "hello.ptp".into() }
        );
        assert_eq!(parse("detach tty"), Command::Detach(Slot::Console));
        assert_eq!(
            parse("load prog.ptp 100"),
            Command::Load { path: "prog.ptp".into(), addr: 0o100 }
        );
        assert_eq!(
            parse("punch out.ptp 100 10"),
            Command::Punch { path: "out.ptp".into(), addr: 0o100, count: 10 }
        );
        assert_eq!(parse("q"), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("frob".parse::<Command>(), Err(CommandError::Unknown("frob".into())));
        assert_eq!("e 8".parse::<Command>(), Err(CommandError::InvalidAddress("8".into())));
        assert!(matches!(
            "d 0 99".parse::<Command>(),
            Err(CommandError::InvalidValue { .. })
        ));
        assert_eq!(
            "attach lpt x".parse::<Command>(),
            Err(CommandError::InvalidSlot("lpt".into()))
        );
        assert_eq!(
            "punch out.ptp 0 0x5".parse::<Command>(),
            Err(CommandError::InvalidCount("0x5".into()))
        );
        assert_eq!("trace maybe".parse::<Command>(), Err(CommandError::InvalidFlag("maybe".into())));
        assert_eq!("status now".parse::<Command>(), Err(CommandError::TooManyArguments("status".into())));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   # just a note").unwrap(), None);
        assert_eq!(Command::parse("status # show").unwrap(), Some(Command::Status));
    }
}
