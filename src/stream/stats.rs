//! Byte-count stats wrapper (spec section 2, `stats` config token): wraps
//! the outermost stage so `close()` logs the total bytes moved through it.
//! Counting bytes is deliberately all this does -- per-codec timing or
//! other diagnostics are out of scope (spec section 1).

use std::io::{self, Read, Write};

use super::{Sink, Source, Whence};

pub struct StatsSource {
    child: Box<dyn Source>,
    name: String,
    count: u64,
}

impl StatsSource {
    pub fn new(child: Box<dyn Source>, name: String) -> Self {
        StatsSource { child, name, count: 0 }
    }
}

impl Read for StatsSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.child.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

impl Source for StatsSource {
    fn peek(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.child.peek(buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.child.tell()
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> io::Result<u64> {
        self.child.seek(offset, whence)
    }

    fn close(&mut self) -> io::Result<()> {
        log::info!("wandio: read {} bytes from {}", self.count, self.name);
        self.child.close()
    }
}

pub struct StatsSink {
    child: Box<dyn Sink>,
    name: String,
    count: u64,
}

impl StatsSink {
    pub fn new(child: Box<dyn Sink>, name: String) -> Self {
        StatsSink { child, name, count: 0 }
    }
}

impl Write for StatsSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.child.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.child.flush()
    }
}

impl Sink for StatsSink {
    fn close(&mut self) -> io::Result<()> {
        log::info!("wandio: wrote {} bytes to {}", self.count, self.name);
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::test_support::{VecSink, VecSource};

    #[test]
    fn source_counts_every_byte_read() {
        let mut src = StatsSource::new(Box::new(VecSource::new(b"hello world".to_vec())), "t".into());
        let mut got = Vec::new();
        src.read_to_end(&mut got).unwrap();
        assert_eq!(src.count, 11);
    }

    #[test]
    fn sink_counts_every_byte_written() {
        let sink = VecSink::new();
        let handle = sink.handle();
        let mut dst = StatsSink::new(Box::new(sink), "t".into());
        dst.write_all(b"hello").unwrap();
        dst.close().unwrap();
        assert_eq!(dst.count, 5);
        assert_eq!(handle.take(), b"hello");
    }
}
