//! Minimal in-memory `Source`/`Sink` pair shared by the codec unit tests.

#![cfg(test)]

use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use super::{Sink, Source};

pub struct VecSource(Cursor<Vec<u8>>);

impl VecSource {
    pub fn new(data: Vec<u8>) -> Self {
        VecSource(Cursor::new(data))
    }
}

impl Read for VecSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Source for VecSource {}

/// A `Sink` that appends to a shared buffer, so the test can inspect what
/// was written after the sink itself has been moved into a `CodecWriter`.
pub struct VecSink(Arc<Mutex<Vec<u8>>>);

#[derive(Clone)]
pub struct VecSinkHandle(Arc<Mutex<Vec<u8>>>);

impl VecSinkHandle {
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl VecSink {
    pub fn new() -> Self {
        VecSink(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn handle(&self) -> VecSinkHandle {
        VecSinkHandle(self.0.clone())
    }
}

impl Write for VecSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for VecSink {}
