//! The console typewriter.
//!
//! Output is the text of Type Alpha. Input is Type In: one character
//! code per key, echoed as it is accepted. On an interactive terminal
//! keys are read in raw mode with crossterm; otherwise characters come
//! from the input stream and anything the typewriter lacks is skipped.

use std::io::{self, IsTerminal, Read, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::debug;

use crate::device::DeviceError;
use crate::word::charset;

const BELL: &[u8] = b"\x07";

/// Where Type In characters come from.
pub(crate) enum ConsoleInput {
    /// Raw-mode keyboard.
    Keyboard,
    /// Any byte stream, decoded as UTF-8.
    Stream(Box<dyn Read>),
    /// Output-only endpoint.
    None,
}

pub(crate) struct Console {
    output: Box<dyn Write>,
    input: ConsoleInput,
    /// Flush after every write (terminal output).
    autoflush: bool,
}

impl Console {
    pub(crate) fn new(output: Box<dyn Write>, input: ConsoleInput, autoflush: bool) -> Self {
        Self { output, input, autoflush }
    }

    /// Console on the process's own terminal.
    pub(crate) fn stdio() -> Self {
        let input = if io::stdin().is_terminal() {
            ConsoleInput::Keyboard
        } else {
            ConsoleInput::Stream(Box::new(io::stdin()))
        };
        Self::new(Box::new(io::stdout()), input, true)
    }

    pub(crate) fn type_text(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        if self.autoflush {
            self.output.flush()?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    /// Read one character code.
    ///
    /// Returns `Ok(None)` at the end of a non-interactive input stream.
    pub(crate) fn read_code(&mut self) -> Result<Option<u8>, DeviceError> {
        loop {
            let c = match &mut self.input {
                ConsoleInput::Keyboard => read_key()?,
                ConsoleInput::Stream(stream) => match read_utf8_char(stream.as_mut())? {
                    Some(c) => c,
                    None => return Ok(None),
                },
                ConsoleInput::None => return Err(DeviceError::NoKeyboard),
            };

            match charset::encode(c) {
                Some(code) => {
                    if let Some(echo) = charset::typed(code) {
                        self.type_text(echo.encode_utf8(&mut [0u8; 4]))?;
                    }
                    return Ok(Some(code));
                }
                None if matches!(self.input, ConsoleInput::Keyboard) => {
                    self.output.write_all(BELL)?;
                    self.output.flush()?;
                }
                None => debug!(character = ?c, "skipping character outside the typewriter set"),
            }
        }
    }
}

/// Restores cooked mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Wait for one key press. Ctrl-C interrupts.
fn read_key() -> Result<char, DeviceError> {
    let _raw = RawMode::enable()?;
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(DeviceError::Interrupted);
            }
            KeyCode::Char(c) => return Ok(c),
            KeyCode::Enter => return Ok('\r'),
            KeyCode::Tab => return Ok('\t'),
            _ => continue,
        }
    }
}

/// Decode one UTF-8 character from a byte stream.
///
/// Malformed sequences decode as U+FFFD, which no typewriter key matches.
fn read_utf8_char(stream: &mut dyn Read) -> io::Result<Option<char>> {
    let mut buf = [0u8; 4];
    if stream.read(&mut buf[..1])? == 0 {
        return Ok(None);
    }
    let len = match buf[0] {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
    };
    if len > 1 {
        stream.read_exact(&mut buf[1..len])?;
    }
    Ok(Some(
        std::str::from_utf8(&buf[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SharedBuffer;

    fn buffered(input: &str) -> (Console, SharedBuffer) {
        let buffer = SharedBuffer::with_input(input);
        let console = Console::new(
            Box::new(buffer.clone()),
            ConsoleInput::Stream(Box::new(buffer.clone())),
            false,
        );
        (console, buffer)
    }

    #[test]
    fn test_read_code_echoes() {
        let (mut console, buffer) = buffered("hi");
        assert_eq!(console.read_code().unwrap(), Some(0o30));
        assert_eq!(console.read_code().unwrap(), Some(0o31));
        assert_eq!(console.read_code().unwrap(), None);
        assert_eq!(buffer.output_string(), "HI");
    }

    #[test]
    fn test_stream_skips_unknown_characters() {
        let (mut console, buffer) = buffered("~{A");
        assert_eq!(console.read_code().unwrap(), Some(0o21));
        assert_eq!(buffer.output_string(), "A");
    }

    #[test]
    fn test_multibyte_characters() {
        let (mut console, _) = buffered("¢°");
        assert_eq!(console.read_code().unwrap(), Some(charset::BLANK));
        assert_eq!(console.read_code().unwrap(), Some(0o75));
    }

    #[test]
    fn test_output_only_console() {
        let buffer = SharedBuffer::new();
        let mut console = Console::new(Box::new(buffer.clone()), ConsoleInput::None, false);
        console.type_text("HELLO").unwrap();
        assert_eq!(buffer.output_string(), "HELLO");
        assert!(matches!(console.read_code(), Err(DeviceError::NoKeyboard)));
    }
}
