//! The error taxonomy shared by every stage in a pipeline.
//!
//! Every `Source`/`Sink` method returns a plain [`std::io::Result`] so the
//! traits stay idiomatic `Read`/`Write`-shaped, but the `io::Error` always
//! carries a [`WandioError`] as its inner error so callers that care about
//! the taxonomy (tests, the CLI driver) can recover it with
//! [`WandioError::downcast`].

use std::fmt;
use std::io;
use std::sync::Arc;

/// Abstract error kinds from the design (kept distinct from `io::ErrorKind`
/// because several of these -- `Truncated`, `UnknownCodec`, `InvalidUrl` --
/// have no good stdlib equivalent).
#[derive(Debug, Clone, thiserror::Error)]
pub enum WandioError {
    /// Compressed stream ended in the middle of a member/frame.
    #[error("truncated compressed stream: {0}")]
    Truncated(String),

    /// Codec reported malformed input.
    #[error("corrupt compressed data: {0}")]
    Corrupt(String),

    /// The file/HTTP transport reported a hard failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The stage does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Magic bytes matched a codec that was not compiled in.
    #[error("codec not available: {0}")]
    UnknownCodec(String),

    /// A `swift://` URL could not be parsed or resolved.
    #[error("invalid swift url: {0}")]
    InvalidUrl(String),

    /// Allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Caller precondition violated (e.g. a compression level outside 0..9).
    #[error("bad argument: {0}")]
    BadArgument(String),
}

impl WandioError {
    /// Maps this taxonomy to the nearest `io::ErrorKind`.
    fn io_kind(&self) -> io::ErrorKind {
        match self {
            WandioError::Truncated(_) => io::ErrorKind::UnexpectedEof,
            WandioError::Corrupt(_) => io::ErrorKind::InvalidData,
            WandioError::Transport(_) => io::ErrorKind::Other,
            WandioError::Unsupported(_) => io::ErrorKind::Unsupported,
            WandioError::UnknownCodec(_) => io::ErrorKind::Unsupported,
            WandioError::InvalidUrl(_) => io::ErrorKind::InvalidInput,
            WandioError::OutOfMemory(_) => io::ErrorKind::OutOfMemory,
            WandioError::BadArgument(_) => io::ErrorKind::InvalidInput,
        }
    }

    /// Recovers a `WandioError` from an `io::Error` produced by this crate,
    /// if any. Errors from elsewhere (the underlying file, a foreign codec
    /// crate surfacing a raw `io::Error`) simply return `None`.
    pub fn downcast(err: &io::Error) -> Option<&WandioError> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<WandioError>())
    }
}

impl From<WandioError> for io::Error {
    fn from(err: WandioError) -> io::Error {
        io::Error::new(err.io_kind(), err)
    }
}

/// A `Status::Err` needs to be returned verbatim on every subsequent read
/// (section 3, "sticky status"); `Arc` lets every stage hand back the exact
/// same error cheaply without re-allocating a message each time.
#[derive(Clone)]
pub struct StickyError(pub Arc<io::Error>);

impl StickyError {
    pub fn new(err: io::Error) -> Self {
        StickyError(Arc::new(err))
    }

    /// Builds a fresh `io::Error` carrying the same taxonomy/message as the
    /// latched error, since `io::Error` itself is not `Clone`.
    pub fn as_io_error(&self) -> io::Error {
        let kind = self.0.kind();
        match WandioError::downcast(&self.0) {
            Some(tax) => io::Error::new(kind, tax.clone()),
            None => io::Error::new(kind, self.0.to_string()),
        }
    }
}

impl fmt::Debug for StickyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

pub type Result<T> = std::result::Result<T, io::Error>;

pub(crate) fn err<T>(e: WandioError) -> Result<T> {
    Err(e.into())
}
