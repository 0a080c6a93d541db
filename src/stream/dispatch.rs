//! Pipeline composition (spec section 4.2): turns a name and a codec/level
//! request into the layered `Source`/`Sink` chain, following the exact
//! stage order the spec lays out for reads and writes.

use std::io;

use super::file::{FileSink, FileSource};
use super::http::HttpSource;
use super::peek::PeekReader;
use super::stats::{StatsSink, StatsSource};
use super::thread::{ThreadedSink, ThreadedSource, DEFAULT_CHUNK};
use super::{Sink, Source};
use crate::codec::bzip2::{Bzip2DecodeOp, Bzip2EncodeOp};
use crate::codec::lzma::{LzmaDecodeOp, LzmaEncodeOp};
use crate::codec::zlib::{ZlibDecodeOp, ZlibEncodeOp};
use crate::codec::zstdlz4::{Lz4FrameSink, ZstdEncodeOp, ZstdLz4DecodeSource};
use crate::codec::{detect_codec, CodecReader, CodecWriter};
use crate::codec::Codec;
use crate::config::Config;
use crate::error::WandioError;
use crate::transport::swift::{self, NullSwiftResolver, SwiftResolver};

const PEEK_PROBE_SIZE: usize = 1024;

/// Returns the scheme (`"swift"`, `"http"`, ...) if `name` has one, per the
/// `alnum+://` grammar from spec section 4.2.
fn scheme_of(name: &str) -> Option<&str> {
    let idx = name.find("://")?;
    let prefix = &name[..idx];
    if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(prefix)
    } else {
        None
    }
}

fn open_base_source(name: &str, resolver: &dyn SwiftResolver) -> io::Result<Box<dyn Source>> {
    match scheme_of(name) {
        None => Ok(Box::new(FileSource::open(name)?)),
        Some("file") => {
            let path = name.strip_prefix("file://").unwrap();
            Ok(Box::new(FileSource::open(path)?))
        }
        Some("swift") => {
            let (container, object) = swift::parse_swift_url(name)?;
            let location = resolver.resolve(&container, &object)?;
            Ok(Box::new(HttpSource::open_with_headers(
                &location.url,
                location.headers,
            )?))
        }
        Some(_) => Ok(Box::new(HttpSource::open(name)?)),
    }
}

/// Wraps `child` in the codec reader matching `codec`. `qat` is tried
/// first for `Codec::Zlib` and falls back to the software zlib path on
/// init failure (spec section 4.6); see [`crate::codec::qat`].
fn wrap_codec_reader(child: Box<dyn Source>, codec: Codec, is_gzip: bool) -> io::Result<Box<dyn Source>> {
    match codec {
        Codec::None => Ok(child),
        Codec::Zlib => {
            #[cfg(feature = "qat")]
            if crate::codec::qat::try_init().is_ok() {
                log::debug!("wandio: using qat acceleration for zlib decode");
            }
            Ok(Box::new(CodecReader::new(child, ZlibDecodeOp::new(is_gzip), true)))
        }
        Codec::Bzip2 => Ok(Box::new(
            CodecReader::new(child, Bzip2DecodeOp::new(), false).single_unit(true),
        )),
        Codec::Lzma => Ok(Box::new(CodecReader::new(child, LzmaDecodeOp::new()?, false))),
        Codec::Zstd => Ok(Box::new(ZstdLz4DecodeSource::new_zstd(child))),
        Codec::Lz4 => Ok(Box::new(ZstdLz4DecodeSource::new_lz4(child))),
        Codec::Lzo => Err(WandioError::UnknownCodec("lzo is not compiled into this build".into()).into()),
        Codec::LegacyCompress => Err(WandioError::UnknownCodec(
            "legacy compress(1) (.Z) is LZW, not supported by this build".into(),
        )
        .into()),
    }
}

/// Opens `name` for reading, composing the stage chain per spec section
/// 4.2 steps 1-6.
pub fn open_read(name: &str) -> io::Result<Box<dyn Source>> {
    open_read_with(name, &NullSwiftResolver, Config::from_env())
}

pub fn open_read_with(
    name: &str,
    resolver: &dyn SwiftResolver,
    config: &Config,
) -> io::Result<Box<dyn Source>> {
    let base = open_base_source(name, resolver)?;
    let mut stage: Box<dyn Source> = Box::new(PeekReader::new(base));

    if config.autodetect {
        let mut probe = vec![0u8; PEEK_PROBE_SIZE];
        let n = stage.peek(&mut probe)?;
        probe.truncate(n);
        if let Some(codec) = detect_codec(&probe) {
            let is_gzip = probe.starts_with(&[0x1F, 0x8B]);
            stage = wrap_codec_reader(stage, codec, is_gzip)?;
        }
    }

    if config.use_threads > 0 {
        stage = Box::new(ThreadedSource::with_sizing(
            stage,
            DEFAULT_CHUNK,
            config.max_buffers as usize,
        ));
    }

    stage = Box::new(PeekReader::new(stage));
    if config.keep_stats {
        stage = Box::new(StatsSource::new(stage, name.to_string()));
    }
    Ok(stage)
}

fn wrap_codec_writer(
    child: Box<dyn Sink>,
    codec: Codec,
    level: u32,
) -> io::Result<Box<dyn Sink>> {
    if level > 9 {
        return Err(WandioError::BadArgument("compression level must be 0..=9".into()).into());
    }
    match codec {
        Codec::None => Ok(child),
        Codec::Zlib => Ok(Box::new(CodecWriter::new(child, ZlibEncodeOp::new(level, true)))),
        Codec::Bzip2 => Ok(Box::new(CodecWriter::new(child, Bzip2EncodeOp::new(level)))),
        Codec::Lzma => Ok(Box::new(CodecWriter::new(child, LzmaEncodeOp::new(level)?))),
        Codec::Zstd => Ok(Box::new(CodecWriter::new(child, ZstdEncodeOp::new(level as i32)))),
        Codec::Lz4 => Ok(Box::new(Lz4FrameSink::new(child))),
        Codec::Lzo => {
            log::warn!("wandio: lzo was requested but is not compiled in; writing uncompressed");
            Ok(child)
        }
        Codec::LegacyCompress => Err(WandioError::UnknownCodec(
            "legacy compress(1) (.Z) is not a supported write codec".into(),
        )
        .into()),
    }
}

/// Opens `name` for writing with the given `codec` and `level` (spec
/// section 4.2: "Opening a writer by name takes (codec, level, open-
/// flags)"). `level == 0` or `codec == None` skips the codec wrapper
/// entirely.
pub fn open_write(name: &str, codec: Codec, level: u32, append: bool) -> io::Result<Box<dyn Sink>> {
    open_write_with(name, codec, level, append, Config::from_env())
}

pub fn open_write_with(
    name: &str,
    codec: Codec,
    level: u32,
    append: bool,
    config: &Config,
) -> io::Result<Box<dyn Sink>> {
    let base: Box<dyn Sink> = Box::new(FileSink::create(name, append)?);
    let mut stage = if level == 0 {
        base
    } else {
        wrap_codec_writer(base, codec, level)?
    };

    if config.use_threads > 0 {
        stage = Box::new(ThreadedSink::with_queue_depth(stage, config.max_buffers as usize));
    }

    if config.keep_stats {
        stage = Box::new(StatsSink::new(stage, name.to_string()));
    }
    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn scheme_detection() {
        assert_eq!(scheme_of("swift://c/o"), Some("swift"));
        assert_eq!(scheme_of("http://host/obj"), Some("http"));
        assert_eq!(scheme_of("/local/path.gz"), None);
        assert_eq!(scheme_of("relative/path"), None);
    }

    #[test]
    fn file_round_trip_with_gzip_autodetect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gz");
        let path = path.to_str().unwrap();

        let cfg = Config {
            use_threads: 0,
            ..Config::default()
        };
        let mut w = open_write_with(path, Codec::Zlib, 6, false, &cfg).unwrap();
        w.write_all(b"hello wandio").unwrap();
        w.close().unwrap();

        let mut r = open_read_with(path, &NullSwiftResolver, &cfg).unwrap();
        let mut got = Vec::new();
        r.read_to_end(&mut got).unwrap();
        assert_eq!(got, b"hello wandio");
    }

    #[test]
    fn autodetect_disabled_reads_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gz");
        let path = path.to_str().unwrap();

        let cfg = Config {
            use_threads: 0,
            ..Config::default()
        };
        let mut w = open_write_with(path, Codec::Zlib, 6, false, &cfg).unwrap();
        w.write_all(b"hello wandio").unwrap();
        w.close().unwrap();

        let raw_bytes = std::fs::read(path).unwrap();

        let no_autodetect = Config {
            autodetect: false,
            use_threads: 0,
            ..Config::default()
        };
        let mut r = open_read_with(path, &NullSwiftResolver, &no_autodetect).unwrap();
        let mut got = Vec::new();
        r.read_to_end(&mut got).unwrap();
        assert_eq!(got, raw_bytes);
    }
}
