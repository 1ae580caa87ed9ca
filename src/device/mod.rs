//! Peripheral devices.
//!
//! The Digiac had three peripherals, each reached through a fixed slot:
//! - Console: the typewriter (Type Alpha, Type In)
//! - TapeReader: the paper tape reader (Read Tape)
//! - TapePunch: the paper tape punch (Punch Tape)
//!
//! A slot is either unbound or bound to an [`Endpoint`]. I/O on an unbound
//! slot is a fault.

mod buffer;
mod console;
mod tape;

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::tape::TapeError;
use crate::word::{charset, Word};

pub use buffer::SharedBuffer;
use console::{Console, ConsoleInput};
use tape::{Punch, Reader};

/// A device slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    #[serde(alias = "tty")]
    Console,
    #[serde(rename = "reader", alias = "ptr")]
    TapeReader,
    #[serde(rename = "punch", alias = "ptp")]
    TapePunch,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Console, Slot::TapeReader, Slot::TapePunch];

    /// Short device name.
    pub fn name(self) -> &'static str {
        match self {
            Slot::Console => "tty",
            Slot::TapeReader => "ptr",
            Slot::TapePunch => "ptp",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tty" | "console" => Ok(Slot::Console),
            "ptr" | "reader" => Ok(Slot::TapeReader),
            "ptp" | "punch" => Ok(Slot::TapePunch),
            _ => Err(DeviceError::UnknownSlot(s.to_string())),
        }
    }
}

/// What a slot can be bound to.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// A file: read for the tape reader, created for the punch and console.
    File(PathBuf),
    /// The process's standard streams.
    Stdio,
    /// An in-memory buffer.
    Memory(SharedBuffer),
}

impl Endpoint {
    /// Parse an operator argument: `-` is stdio, anything else a path.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Endpoint::Stdio
        } else {
            Endpoint::File(PathBuf::from(arg))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::File(path) => write!(f, "{}", path.display()),
            Endpoint::Stdio => f.write_str("stdio"),
            Endpoint::Memory(_) => f.write_str("buffer"),
        }
    }
}

struct Bound<T> {
    device: T,
    endpoint: String,
}

/// The set of device slots and what they are bound to.
#[derive(Default)]
pub struct DeviceManager {
    console: Option<Bound<Console>>,
    reader: Option<Bound<Reader>>,
    punch: Option<Bound<Punch>>,
}

impl DeviceManager {
    /// All slots unbound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a slot.
    ///
    /// Fails if the slot is already bound or the endpoint cannot be opened.
    pub fn attach(&mut self, slot: Slot, endpoint: Endpoint) -> Result<(), DeviceError> {
        if self.is_bound(slot) {
            return Err(DeviceError::AlreadyBound(slot));
        }
        let name = endpoint.to_string();

        match slot {
            Slot::Console => {
                let device = match endpoint {
                    Endpoint::File(path) => {
                        let file = File::create(&path)?;
                        Console::new(Box::new(BufWriter::new(file)), ConsoleInput::None, false)
                    }
                    Endpoint::Stdio => Console::stdio(),
                    Endpoint::Memory(buffer) => Console::new(
                        Box::new(buffer.clone()),
                        ConsoleInput::Stream(Box::new(buffer)),
                        false,
                    ),
                };
                self.console = Some(Bound { device, endpoint: name.clone() });
            }
            Slot::TapeReader => {
                let device = match endpoint {
                    Endpoint::File(path) => Reader::new(Box::new(BufReader::new(File::open(&path)?))),
                    Endpoint::Memory(buffer) => Reader::new(Box::new(buffer)),
                    Endpoint::Stdio => return Err(DeviceError::Unsupported { slot, endpoint: name }),
                };
                self.reader = Some(Bound { device, endpoint: name.clone() });
            }
            Slot::TapePunch => {
                let device = match endpoint {
                    Endpoint::File(path) => Punch::new(Box::new(BufWriter::new(File::create(&path)?)))?,
                    Endpoint::Memory(buffer) => Punch::new(Box::new(buffer))?,
                    Endpoint::Stdio => return Err(DeviceError::Unsupported { slot, endpoint: name }),
                };
                self.punch = Some(Bound { device, endpoint: name.clone() });
            }
        }

        debug!(%slot, endpoint = %name, "attached");
        Ok(())
    }

    /// Flush and release a slot. The punch runs out a trailer first.
    pub fn detach(&mut self, slot: Slot) -> Result<(), DeviceError> {
        match slot {
            Slot::Console => {
                let mut bound = self.console.take().ok_or(DeviceError::Unbound(slot))?;
                bound.device.flush()?;
            }
            Slot::TapeReader => {
                let bound = self.reader.take().ok_or(DeviceError::Unbound(slot))?;
                debug!(words = bound.device.words_read(), "reader released");
            }
            Slot::TapePunch => {
                let mut bound = self.punch.take().ok_or(DeviceError::Unbound(slot))?;
                let punched = bound.device.finish()?;
                debug!(words = punched, "punch released");
            }
        }
        debug!(%slot, "detached");
        Ok(())
    }

    pub fn is_bound(&self, slot: Slot) -> bool {
        self.endpoint(slot).is_some()
    }

    /// Description of what a slot is bound to.
    pub fn endpoint(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Console => self.console.as_ref().map(|b| b.endpoint.as_str()),
            Slot::TapeReader => self.reader.as_ref().map(|b| b.endpoint.as_str()),
            Slot::TapePunch => self.punch.as_ref().map(|b| b.endpoint.as_str()),
        }
    }

    /// Read one word from a slot.
    ///
    /// The console packs four typed characters into a word. The tape reader
    /// returns `None` at the end of the tape and releases itself.
    pub fn read(&mut self, slot: Slot) -> Result<Option<Word>, DeviceError> {
        match slot {
            Slot::Console => {
                let mut codes = [0u8; 4];
                for code in &mut codes {
                    *code = self.read_char()?;
                }
                Ok(Some(Word::from_char_codes(codes)))
            }
            Slot::TapeReader => {
                let bound = self.reader.as_mut().ok_or(DeviceError::Unbound(slot))?;
                let word = bound.device.next_word()?;
                if word.is_none() {
                    info!(words = bound.device.words_read(), "end of tape");
                    self.reader = None;
                }
                Ok(word)
            }
            Slot::TapePunch => Err(DeviceError::WrongDirection(slot)),
        }
    }

    /// Write one word to a slot. The console types its four characters.
    pub fn write(&mut self, slot: Slot, word: Word) -> Result<(), DeviceError> {
        match slot {
            Slot::Console => {
                let mut text = String::with_capacity(4);
                charset::type_word(word, &mut text);
                self.type_text(&text)
            }
            Slot::TapePunch => {
                let bound = self.punch.as_mut().ok_or(DeviceError::Unbound(slot))?;
                bound.device.punch(word)?;
                Ok(())
            }
            Slot::TapeReader => Err(DeviceError::WrongDirection(slot)),
        }
    }

    /// Type text on the console.
    pub fn type_text(&mut self, text: &str) -> Result<(), DeviceError> {
        let bound = self.console.as_mut().ok_or(DeviceError::Unbound(Slot::Console))?;
        bound.device.type_text(text)?;
        Ok(())
    }

    /// Read one character code from the console keyboard.
    pub fn read_char(&mut self) -> Result<u8, DeviceError> {
        let bound = self.console.as_mut().ok_or(DeviceError::Unbound(Slot::Console))?;
        bound.device.read_code()?.ok_or(DeviceError::EndOfInput(Slot::Console))
    }

    /// Flush every bound output device.
    pub fn flush_all(&mut self) -> Result<(), DeviceError> {
        if let Some(bound) = self.console.as_mut() {
            bound.device.flush()?;
        }
        if let Some(bound) = self.punch.as_mut() {
            bound.device.flush()?;
        }
        Ok(())
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        for slot in Slot::ALL {
            if self.is_bound(slot) {
                if let Err(e) = self.detach(slot) {
                    warn!(%slot, error = %e, "failed to release device");
                }
            }
        }
    }
}

impl fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceManager")
            .field("console", &self.endpoint(Slot::Console))
            .field("reader", &self.endpoint(Slot::TapeReader))
            .field("punch", &self.endpoint(Slot::TapePunch))
            .finish()
    }
}

/// Errors that can occur during device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no device attached to {0}")]
    Unbound(Slot),

    #[error("{0} is already attached")]
    AlreadyBound(Slot),

    #[error("{slot} cannot be attached to {endpoint}")]
    Unsupported { slot: Slot, endpoint: String },

    #[error("{0} does not support that transfer direction")]
    WrongDirection(Slot),

    #[error("unknown device '{0}' (expected tty, ptr or ptp)")]
    UnknownSlot(String),

    #[error("{0}: end of input")]
    EndOfInput(Slot),

    #[error("console has no keyboard")]
    NoKeyboard,

    #[error("interrupted at the keyboard")]
    Interrupted,

    #[error("tape format error: {0}")]
    Tape(#[from] TapeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::codec;

    fn memory_console() -> (DeviceManager, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let mut devices = DeviceManager::new();
        devices.attach(Slot::Console, Endpoint::Memory(buffer.clone())).unwrap();
        (devices, buffer)
    }

    #[test]
    fn test_slot_names() {
        assert_eq!("tty".parse::<Slot>().unwrap(), Slot::Console);
        assert_eq!("Reader".parse::<Slot>().unwrap(), Slot::TapeReader);
        assert_eq!("ptp".parse::<Slot>().unwrap(), Slot::TapePunch);
        assert!("lpt".parse::<Slot>().is_err());
    }

    #[test]
    fn test_unbound_slot_faults() {
        let mut devices = DeviceManager::new();
        assert!(matches!(
            devices.write(Slot::Console, Word::zero()),
            Err(DeviceError::Unbound(Slot::Console))
        ));
        assert!(matches!(
            devices.read(Slot::TapeReader),
            Err(DeviceError::Unbound(Slot::TapeReader))
        ));
        assert!(matches!(devices.detach(Slot::TapePunch), Err(DeviceError::Unbound(_))));
    }

    #[test]
    fn test_attach_twice() {
        let (mut devices, _) = memory_console();
        let err = devices
            .attach(Slot::Console, Endpoint::Memory(SharedBuffer::new()))
            .unwrap_err();
        assert!(matches!(err, DeviceError::AlreadyBound(Slot::Console)));

        devices.detach(Slot::Console).unwrap();
        assert!(!devices.is_bound(Slot::Console));
        devices.attach(Slot::Console, Endpoint::Memory(SharedBuffer::new())).unwrap();
    }

    #[test]
    fn test_console_types_word() {
        let (mut devices, buffer) = memory_console();
        devices.write(Slot::Console, Word::parse_octal("30253434").unwrap()).unwrap();
        assert_eq!(buffer.output_string(), "HELL");
    }

    #[test]
    fn test_console_reads_word() {
        let (mut devices, buffer) = memory_console();
        buffer.push_input("ok!?");
        let word = devices.read(Slot::Console).unwrap().unwrap();
        assert_eq!(charset::word_chars(word), "OK!?");
        assert!(matches!(
            devices.read(Slot::Console),
            Err(DeviceError::EndOfInput(Slot::Console))
        ));
    }

    #[test]
    fn test_reader_releases_at_end_of_tape() {
        let tape = codec::dump(&[Word::positive(1), Word::new(true, 2)]);
        let mut devices = DeviceManager::new();
        devices
            .attach(Slot::TapeReader, Endpoint::Memory(SharedBuffer::with_input(tape)))
            .unwrap();

        assert_eq!(devices.read(Slot::TapeReader).unwrap(), Some(Word::positive(1)));
        assert_eq!(devices.read(Slot::TapeReader).unwrap(), Some(Word::new(true, 2)));
        assert_eq!(devices.read(Slot::TapeReader).unwrap(), None);
        assert!(!devices.is_bound(Slot::TapeReader));
    }

    #[test]
    fn test_reader_rejects_stdio() {
        let mut devices = DeviceManager::new();
        assert!(matches!(
            devices.attach(Slot::TapeReader, Endpoint::Stdio),
            Err(DeviceError::Unsupported { slot: Slot::TapeReader, .. })
        ));
    }

    #[test]
    fn test_punch_writes_leader_and_trailer() {
        let buffer = SharedBuffer::new();
        let mut devices = DeviceManager::new();
        devices.attach(Slot::TapePunch, Endpoint::Memory(buffer.clone())).unwrap();
        devices.write(Slot::TapePunch, Word::positive(0o1234)).unwrap();
        devices.detach(Slot::TapePunch).unwrap();

        assert_eq!(buffer.output(), codec::dump(&[Word::positive(0o1234)]));
    }

    #[test]
    fn test_drop_releases_punch() {
        let buffer = SharedBuffer::new();
        {
            let mut devices = DeviceManager::new();
            devices.attach(Slot::TapePunch, Endpoint::Memory(buffer.clone())).unwrap();
            devices.write(Slot::TapePunch, Word::positive(7)).unwrap();
        }
        assert_eq!(codec::load(&buffer.output()).unwrap(), vec![Word::positive(7)]);
        assert_eq!(buffer.output().len(), codec::dump(&[Word::positive(7)]).len());
    }

    #[test]
    fn test_wrong_direction() {
        let (mut devices, _) = memory_console();
        devices.attach(Slot::TapePunch, Endpoint::Memory(SharedBuffer::new())).unwrap();
        assert!(matches!(
            devices.read(Slot::TapePunch),
            Err(DeviceError::WrongDirection(Slot::TapePunch))
        ));
    }

    #[test]
    fn test_file_endpoints() {
        let dir = std::env::temp_dir().join(format!("digiac-dev-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.ptp");

        let mut devices = DeviceManager::new();
        devices.attach(Slot::TapePunch, Endpoint::File(path.clone())).unwrap();
        devices.write(Slot::TapePunch, Word::positive(5)).unwrap();
        devices.detach(Slot::TapePunch).unwrap();

        devices.attach(Slot::TapeReader, Endpoint::File(path.clone())).unwrap();
        assert_eq!(devices.read(Slot::TapeReader).unwrap(), Some(Word::positive(5)));

        let missing = dir.join("missing.ptp");
        devices.detach(Slot::TapeReader).unwrap();
        assert!(matches!(
            devices.attach(Slot::TapeReader, Endpoint::File(missing)),
            Err(DeviceError::Io(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
