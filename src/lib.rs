//! `wandio`: a uniform byte-stream abstraction over files, HTTP, and Swift
//! objects, transparently wrapped in whichever compression codec the data
//! is found in.
//!
//! The crate's hard, interesting part is the pipeline composition engine
//! ([`stream::dispatch`]): a polymorphic [`stream::Source`]/[`stream::Sink`]
//! abstraction, a magic-byte format-autodetection pass, the incremental
//! codec decode/encode loops in [`codec`], and the HTTP range-based reader
//! in [`stream::http`] that simulates `tell`/`seek` on a one-way body with
//! retry-on-stall.
//!
//! ```no_run
//! use std::io::Read;
//!
//! let mut reader = wandio::open_read("trace.pcap.gz")?;
//! let mut buf = Vec::new();
//! reader.read_to_end(&mut buf)?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod stream;
pub mod transport;

pub use codec::Codec;
pub use config::Config;
pub use error::WandioError;
pub use stream::{Sink, Source, Whence};

use std::io;

/// Opens `name` for reading, auto-detecting compression and transport from
/// the name and the process-wide [`Config`] (spec section 4.2).
///
/// `name` may be a local path, `"-"` for standard input, or a
/// `scheme://...` URL (`swift://` resolved via [`transport::swift`],
/// anything else treated as plain HTTP).
pub fn open_read(name: &str) -> io::Result<Box<dyn Source>> {
    stream::dispatch::open_read(name)
}

/// Opens `name` for writing with the given `codec` and compression `level`
/// (`0..=9`, `0` meaning "no compression"). `append` mirrors the POSIX
/// `O_APPEND` flag; `name == "-"` writes to standard output.
pub fn open_write(name: &str, codec: Codec, level: u32, append: bool) -> io::Result<Box<dyn Sink>> {
    stream::dispatch::open_write(name, codec, level, append)
}

/// Picks a codec from a filename's extension (spec section 6): `.gz` ->
/// zlib, `.bz2` -> bzip2, `.xz` -> lzma, `.lzo` -> lzo, `.lz4` -> lz4,
/// `.zst` -> zstd, anything else -> none.
pub fn codec_for_extension(filename: &str) -> Codec {
    Codec::from_extension(filename)
}
