//! In-memory device endpoint.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

#[derive(Debug, Default)]
struct Inner {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// A byte buffer shared between a device and its owner.
///
/// The device reads from the input queue and appends to the output; the
/// owner keeps a clone to feed input and inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Rc<RefCell<Inner>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer whose input queue starts with `bytes`.
    pub fn with_input(bytes: impl AsRef<[u8]>) -> Self {
        let buffer = Self::new();
        buffer.push_input(bytes);
        buffer
    }

    pub fn push_input(&self, bytes: impl AsRef<[u8]>) {
        self.inner.borrow_mut().input.extend(bytes.as_ref());
    }

    /// Bytes still waiting to be read.
    pub fn pending_input(&self) -> usize {
        self.inner.borrow().input.len()
    }

    /// A copy of everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.inner.borrow().output.clone()
    }

    /// Everything written so far, as text.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow().output).into_owned()
    }

    /// Take and clear the output.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().output)
    }
}

impl Read for SharedBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let n = buf.len().min(inner.input.len());
        for (slot, byte) in buf.iter_mut().zip(inner.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.borrow_mut().output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
