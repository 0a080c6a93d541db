//! The polymorphic source/sink abstraction (spec section 4.1) that every
//! pipeline stage implements, plus the sticky OK/EOF/ERR status shared by
//! all of them (spec section 3).
//!
//! A stage that does not support an operation returns
//! [`crate::error::WandioError::Unsupported`] and leaves no side effect,
//! rather than the trait method being absent -- this mirrors how the
//! teacher's `stream::raw::Operation` gives every method a default no-op,
//! except here "no-op" is "fail cleanly".

pub mod dispatch;
pub mod file;
pub mod http;
pub mod peek;
pub mod stats;
#[cfg(test)]
pub mod test_support;
pub mod thread;

use std::io;

/// Where a `seek` measures its offset from (spec section 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// Read side of a pipeline stage.
///
/// `read`/`close` are mandatory. `peek`/`tell`/`seek` default to
/// `Unsupported` so a stage only needs to override the capabilities it
/// actually has (file and HTTP readers get tell/seek; the peek reader and
/// file reader get peek; codec readers get neither -- spec section 3).
pub trait Source: io::Read + Send {
    /// Non-consuming look-ahead. A short peek (fewer bytes than `len`)
    /// means EOF was reached and is not an error.
    fn peek(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(crate::error::WandioError::Unsupported(
            "peek not supported by this stage".into(),
        )
        .into())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Err(crate::error::WandioError::Unsupported(
            "tell not supported by this stage".into(),
        )
        .into())
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> io::Result<u64> {
        Err(crate::error::WandioError::Unsupported(
            "seek not supported by this stage".into(),
        )
        .into())
    }

    /// Releases this stage and recursively its child. Always permitted;
    /// must run to completion even if earlier reads had latched an error
    /// (spec section 5, "close is always permitted").
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write side of a pipeline stage. `write`/`flush` follow `std::io::Write`
/// exactly (partial writes are only legal on a fatal-error path, spec
/// section 4.1); `close` finalizes the codec (if any) and recursively
/// closes the child sink.
pub trait Sink: io::Write + Send {
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Sticky per-stage status (spec section 3): `Ok` never returns once a
/// stage has reported `Eof` or `Err`.
#[derive(Clone)]
pub enum Status {
    Ok,
    Eof,
    Err(crate::error::StickyError),
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Ok)
    }

    /// Latches `err` if not already terminal; terminal status is sticky and
    /// must not be overwritten (spec section 3 invariant).
    pub fn latch_err(&mut self, err: io::Error) -> io::Error {
        if !self.is_terminal() {
            *self = Status::Err(crate::error::StickyError::new(err));
        }
        self.as_result().unwrap_err()
    }

    pub fn latch_eof(&mut self) {
        if !self.is_terminal() {
            *self = Status::Eof;
        }
    }

    /// Returns `Ok(0)` for EOF, `Err(..)` for ERR, or `Ok(usize::MAX)` as a
    /// sentinel meaning "not terminal, caller should keep going".
    pub fn as_result(&self) -> io::Result<usize> {
        match self {
            Status::Ok => Ok(usize::MAX),
            Status::Eof => Ok(0),
            Status::Err(e) => Err(e.as_io_error()),
        }
    }
}
