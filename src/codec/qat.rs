//! Hardware-offload (QAT) codec path, compiled only with the `qat` feature.
//!
//! No accelerator binding is vendored here. `try_init` always fails, which
//! is the whole point: the dispatcher (spec section 4.6, "qat, falling
//! back to zlib on init failure") tries this first and silently falls
//! through to the software zlib backend whenever it does.

use std::io;

use crate::error::WandioError;

/// Always fails. Returns the reason so the dispatcher can log it at debug
/// level before falling back.
pub fn try_init() -> io::Result<()> {
    Err(WandioError::Unsupported("qat accelerator not available in this build".into()).into())
}
