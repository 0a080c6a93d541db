//! Non-consuming look-ahead over any [`Source`] (spec section 4.3).
//!
//! Shaped after the teacher's `zio::Reader`: a stage owns a child and a
//! private buffer, and drains the buffer before ever touching the child
//! again. Unlike the codec `zio::Reader`, this stage also exposes `peek`
//! itself, and forwards `tell`/`seek` straight through (it owns no read
//! offset of its own -- the child's cursor is the truth).

use std::io::{self, Read};

use super::{Source, Whence};

const DEFAULT_PEEK_SIZE: usize = 1024 * 1024;
const BLOCK_SIZE: usize = 4096;

/// Rounds `n` up to the next multiple of `BLOCK_SIZE`, with a floor of
/// `BLOCK_SIZE` (spec: "max(requested, 32 KiB) rounded to 4 KiB" is the
/// *general* peek-buffer sizing rule; our default peek size of 1 MiB
/// already satisfies that floor for the common case).
fn round_up_block(n: usize) -> usize {
    ((n + BLOCK_SIZE - 1) / BLOCK_SIZE).max(1) * BLOCK_SIZE
}

/// A peek-capable wrapper around any [`Source`].
pub struct PeekReader {
    child: Box<dyn Source>,
    buf: Vec<u8>,
    offset: usize,
    length: usize,
    peek_size: usize,
    child_eof: bool,
}

impl PeekReader {
    pub fn new(child: Box<dyn Source>) -> Self {
        Self::with_peek_size(child, DEFAULT_PEEK_SIZE)
    }

    pub fn with_peek_size(child: Box<dyn Source>, peek_size: usize) -> Self {
        PeekReader {
            child,
            buf: Vec::new(),
            offset: 0,
            length: 0,
            peek_size: round_up_block(peek_size).max(BLOCK_SIZE),
            child_eof: false,
        }
    }

    fn residue(&self) -> usize {
        self.length - self.offset
    }

    /// Extends the internal buffer by reading from the child, growing it to
    /// hold at least `want` residual bytes (rounded up to a peek-size
    /// multiple). Grow-only during a session; shrinks only when the buffer
    /// is released entirely (spec section 4.3 "allocation discipline").
    fn refill(&mut self, want: usize) -> io::Result<()> {
        if self.child_eof || self.residue() >= want {
            return Ok(());
        }

        // Compact: move any residue to the front before growing/reading.
        if self.offset > 0 {
            self.buf.copy_within(self.offset..self.length, 0);
            self.length -= self.offset;
            self.offset = 0;
        }

        let target = round_up_block(want.max(self.peek_size));
        if self.buf.len() < target {
            self.buf.resize(target, 0);
        }

        while self.length < want && !self.child_eof {
            let n = self.child.read(&mut self.buf[self.length..])?;
            if n == 0 {
                self.child_eof = true;
                break;
            }
            self.length += n;
        }
        Ok(())
    }

    fn release_if_drained(&mut self) {
        if self.offset == self.length {
            self.offset = 0;
            self.length = 0;
            self.buf.clear();
            self.buf.shrink_to_fit();
        }
    }
}

impl Read for PeekReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Drain buffered bytes first.
        if self.residue() > 0 {
            let n = self.residue().min(buf.len());
            buf[..n].copy_from_slice(&self.buf[self.offset..self.offset + n]);
            self.offset += n;
            self.release_if_drained();
            return Ok(n);
        }

        if self.child_eof {
            return Ok(0);
        }

        // Zero-copy fast path: aligned whole-block request with nothing
        // buffered delegates straight to the child.
        if buf.len() % BLOCK_SIZE == 0 && !buf.is_empty() {
            return self.child.read(buf);
        }

        self.refill(buf.len().max(1))?;
        if self.residue() == 0 {
            return Ok(0);
        }
        let n = self.residue().min(buf.len());
        buf[..n].copy_from_slice(&self.buf[self.offset..self.offset + n]);
        self.offset += n;
        self.release_if_drained();
        Ok(n)
    }
}

impl Source for PeekReader {
    fn peek(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.refill(buf.len())?;
        let n = self.residue().min(buf.len());
        buf[..n].copy_from_slice(&self.buf[self.offset..self.offset + n]);
        Ok(n)
    }

    fn tell(&mut self) -> io::Result<u64> {
        // The child's cursor is the truth for tell -- no adjustment for
        // buffered residue (spec section 4.3).
        self.child.tell()
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> io::Result<u64> {
        // A seek invalidates the peek buffer (spec section 4.3); the
        // buffer drop is what keeps this consistent, not an offset
        // correction, so `offset`/`whence` pass straight through.
        self.offset = 0;
        self.length = 0;
        self.child.seek(offset, whence)
    }

    fn close(&mut self) -> io::Result<()> {
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct CursorSource(Cursor<Vec<u8>>);
    impl Read for CursorSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }
    impl Source for CursorSource {}

    fn peek_reader(data: &[u8]) -> PeekReader {
        PeekReader::with_peek_size(
            Box::new(CursorSource(Cursor::new(data.to_vec()))),
            16,
        )
    }

    #[test]
    fn peek_does_not_advance() {
        let mut r = peek_reader(b"hello world");
        let mut a = [0u8; 5];
        let mut b = [0u8; 5];
        assert_eq!(r.peek(&mut a).unwrap(), 5);
        assert_eq!(r.peek(&mut b).unwrap(), 5);
        assert_eq!(&a, &b);
        assert_eq!(&a, b"hello");
    }

    #[test]
    fn read_after_peek_returns_same_prefix_and_advances() {
        let mut r = peek_reader(b"hello world");
        let mut peeked = [0u8; 5];
        r.peek(&mut peeked).unwrap();

        let mut got = [0u8; 5];
        r.read_exact(&mut got).unwrap();
        assert_eq!(peeked, got);

        let mut rest = Vec::new();
        r.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b" world");
    }

    #[test]
    fn short_peek_at_eof_is_not_an_error() {
        let mut r = peek_reader(b"hi");
        let mut buf = [0u8; 10];
        let n = r.peek(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn read_drains_then_releases_buffer() {
        let mut r = peek_reader(b"abcdef");
        let mut peeked = [0u8; 3];
        r.peek(&mut peeked).unwrap();
        let mut all = Vec::new();
        r.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"abcdef");
        assert_eq!(r.offset, 0);
        assert_eq!(r.length, 0);
    }
}
