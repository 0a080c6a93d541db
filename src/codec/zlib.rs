//! zlib/gzip backend (spec section 4.6): auto-gzip-or-zlib decode mode.
//!
//! `flate2::{Decompress, Compress}` already validate a *zlib*-wrapped
//! deflate stream's own header and Adler-32 trailer internally, so the
//! zlib half of this module is a thin `Operation` shim. The gzip container
//! is different: deflate carries no framing of its own there, so this
//! module parses the 10+-byte gzip member header and the 8-byte CRC32+
//! ISIZE trailer by hand (mirroring what `flate2`'s own `gz` module does
//! internally), tracking the running CRC32 with `crc32fast` -- the same
//! crate `flate2` itself uses for this.
//!
//! Concatenated gzip members are transparent: each trailer validated
//! cleanly reports `unit_end`, and `reinit` rearms the header parser for
//! the next member (spec section 4.6, `sinceLastEnd`).

use std::io;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status as FlateStatus};

use super::{Operation, StepOutcome};
use crate::error::WandioError;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

fn corrupt(msg: impl Into<String>) -> io::Error {
    WandioError::Corrupt(msg.into()).into()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HeaderStage {
    Fixed,
    Extra,
    Name,
    Comment,
    Hcrc,
}

struct HeaderParser {
    stage: HeaderStage,
    fixed: Vec<u8>,
    flg: u8,
    extra_remaining: u16,
    hcrc_remaining: u8,
}

impl HeaderParser {
    fn new() -> Self {
        HeaderParser {
            stage: HeaderStage::Fixed,
            fixed: Vec::with_capacity(10),
            flg: 0,
            extra_remaining: 0,
            hcrc_remaining: 0,
        }
    }

    /// Consumes as much of `input` as it needs, returning the number of
    /// bytes consumed and whether the header is now fully parsed.
    fn step(&mut self, input: &[u8]) -> io::Result<(usize, bool)> {
        let mut pos = 0;
        loop {
            match self.stage {
                HeaderStage::Fixed => {
                    while self.fixed.len() < 10 && pos < input.len() {
                        self.fixed.push(input[pos]);
                        pos += 1;
                    }
                    if self.fixed.len() < 10 {
                        return Ok((pos, false));
                    }
                    if self.fixed[0..2] != GZIP_MAGIC {
                        return Err(corrupt("not a gzip member (bad magic)"));
                    }
                    if self.fixed[2] != 8 {
                        return Err(corrupt("unsupported gzip compression method"));
                    }
                    self.flg = self.fixed[3];
                    self.stage = if self.flg & 0x04 != 0 {
                        HeaderStage::Extra
                    } else if self.flg & 0x08 != 0 {
                        HeaderStage::Name
                    } else if self.flg & 0x10 != 0 {
                        HeaderStage::Comment
                    } else if self.flg & 0x02 != 0 {
                        HeaderStage::Hcrc
                    } else {
                        return Ok((pos, true));
                    };
                    if self.stage == HeaderStage::Extra && self.extra_remaining == 0 {
                        // XLEN not yet read; borrow two bytes for it below.
                        self.extra_remaining = u16::MAX;
                    }
                }
                HeaderStage::Extra => {
                    if self.extra_remaining == u16::MAX {
                        if input.len() - pos < 2 {
                            return Ok((pos, false));
                        }
                        self.extra_remaining =
                            u16::from_le_bytes([input[pos], input[pos + 1]]);
                        pos += 2;
                    }
                    let take = (self.extra_remaining as usize).min(input.len() - pos);
                    pos += take;
                    self.extra_remaining -= take as u16;
                    if self.extra_remaining != 0 {
                        return Ok((pos, false));
                    }
                    self.stage = if self.flg & 0x08 != 0 {
                        HeaderStage::Name
                    } else if self.flg & 0x10 != 0 {
                        HeaderStage::Comment
                    } else if self.flg & 0x02 != 0 {
                        HeaderStage::Hcrc
                    } else {
                        return Ok((pos, true));
                    };
                }
                HeaderStage::Name => {
                    while pos < input.len() {
                        let b = input[pos];
                        pos += 1;
                        if b == 0 {
                            self.stage = if self.flg & 0x10 != 0 {
                                HeaderStage::Comment
                            } else if self.flg & 0x02 != 0 {
                                HeaderStage::Hcrc
                            } else {
                                return Ok((pos, true));
                            };
                            break;
                        }
                    }
                    if self.stage == HeaderStage::Name {
                        return Ok((pos, false));
                    }
                }
                HeaderStage::Comment => {
                    while pos < input.len() {
                        let b = input[pos];
                        pos += 1;
                        if b == 0 {
                            self.stage = if self.flg & 0x02 != 0 {
                                HeaderStage::Hcrc
                            } else {
                                return Ok((pos, true));
                            };
                            break;
                        }
                    }
                    if self.stage == HeaderStage::Comment {
                        return Ok((pos, false));
                    }
                }
                HeaderStage::Hcrc => {
                    if self.hcrc_remaining == 0 {
                        self.hcrc_remaining = 2;
                    }
                    let take = (self.hcrc_remaining as usize).min(input.len() - pos);
                    pos += take;
                    self.hcrc_remaining -= take as u8;
                    if self.hcrc_remaining != 0 {
                        return Ok((pos, false));
                    }
                    return Ok((pos, true));
                }
            }
        }
    }
}

enum Phase {
    Header(HeaderParser),
    Body,
    Trailer(Vec<u8>),
}

pub struct ZlibDecodeOp {
    is_gzip: bool,
    phase: Phase,
    inflate: Decompress,
    crc: crc32fast::Hasher,
    member_out_len: u32,
}

impl ZlibDecodeOp {
    pub fn new(is_gzip: bool) -> Self {
        ZlibDecodeOp {
            is_gzip,
            phase: if is_gzip {
                Phase::Header(HeaderParser::new())
            } else {
                Phase::Body
            },
            inflate: Decompress::new(!is_gzip),
            crc: crc32fast::Hasher::new(),
            member_out_len: 0,
        }
    }
}

impl Operation for ZlibDecodeOp {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<StepOutcome> {
        // Looped internally (bounded: Header -> Body -> Trailer, at most two
        // phase transitions per call) so a stream-end that lands exactly on
        // a buffer boundary still reports real forward progress to the
        // caller instead of a spurious zero-consumed/zero-produced step.
        let mut consumed = 0usize;
        let mut produced = 0usize;
        loop {
            match &mut self.phase {
                Phase::Header(parser) => {
                    let (c, done) = parser.step(&input[consumed..])?;
                    consumed += c;
                    if !done {
                        return Ok(StepOutcome {
                            consumed,
                            produced,
                            unit_end: false,
                        });
                    }
                    self.inflate.reset(false);
                    self.crc = crc32fast::Hasher::new();
                    self.member_out_len = 0;
                    self.phase = Phase::Body;
                }
                Phase::Body => {
                    let before_in = self.inflate.total_in();
                    let before_out = self.inflate.total_out();
                    let status = self
                        .inflate
                        .decompress(&input[consumed..], &mut output[produced..], FlushDecompress::None)
                        .map_err(|e| corrupt(format!("inflate: {e}")))?;
                    let c = (self.inflate.total_in() - before_in) as usize;
                    let p = (self.inflate.total_out() - before_out) as usize;
                    consumed += c;
                    if p > 0 {
                        if self.is_gzip {
                            self.crc.update(&output[produced..produced + p]);
                            self.member_out_len = self.member_out_len.wrapping_add(p as u32);
                        }
                        produced += p;
                    }
                    if !matches!(status, FlateStatus::StreamEnd) {
                        return Ok(StepOutcome {
                            consumed,
                            produced,
                            unit_end: false,
                        });
                    }
                    if !self.is_gzip {
                        return Ok(StepOutcome {
                            consumed,
                            produced,
                            unit_end: true,
                        });
                    }
                    self.phase = Phase::Trailer(Vec::with_capacity(8));
                }
                Phase::Trailer(buf) => {
                    let take = (8 - buf.len()).min(input.len() - consumed);
                    buf.extend_from_slice(&input[consumed..consumed + take]);
                    consumed += take;
                    if buf.len() < 8 {
                        return Ok(StepOutcome {
                            consumed,
                            produced,
                            unit_end: false,
                        });
                    }
                    let want_crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                    let want_isize = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
                    let got_crc =
                        std::mem::replace(&mut self.crc, crc32fast::Hasher::new()).finalize();
                    if got_crc != want_crc {
                        return Err(corrupt("gzip trailer CRC32 mismatch"));
                    }
                    if self.member_out_len != want_isize {
                        return Err(corrupt("gzip trailer ISIZE mismatch"));
                    }
                    return Ok(StepOutcome {
                        consumed,
                        produced,
                        unit_end: true,
                    });
                }
            }
        }
    }

    fn reinit(&mut self) -> io::Result<()> {
        if self.is_gzip {
            self.phase = Phase::Header(HeaderParser::new());
        } else {
            self.inflate.reset(true);
            self.phase = Phase::Body;
        }
        Ok(())
    }
}

pub struct ZlibEncodeOp {
    deflate: Compress,
    is_gzip: bool,
    crc: crc32fast::Hasher,
    member_out_len: u32,
    wrote_header: bool,
    wrote_trailer: bool,
}

impl ZlibEncodeOp {
    pub fn new(level: u32, is_gzip: bool) -> Self {
        ZlibEncodeOp {
            deflate: Compress::new(Compression::new(level), !is_gzip),
            is_gzip,
            crc: crc32fast::Hasher::new(),
            member_out_len: 0,
            wrote_header: !is_gzip,
            wrote_trailer: true,
        }
    }

    fn gzip_header(&self) -> [u8; 10] {
        [0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF]
    }
}

impl Operation for ZlibEncodeOp {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<StepOutcome> {
        let mut out_pos = 0;
        if !self.wrote_header {
            let header = self.gzip_header();
            if output.len() < header.len() {
                return Ok(StepOutcome {
                    consumed: 0,
                    produced: 0,
                    unit_end: false,
                });
            }
            output[..header.len()].copy_from_slice(&header);
            out_pos += header.len();
            self.wrote_header = true;
            self.wrote_trailer = false;
            self.member_out_len = 0;
            self.crc = crc32fast::Hasher::new();
        }

        let before_in = self.deflate.total_in();
        let before_out = self.deflate.total_out();
        self.deflate
            .compress(input, &mut output[out_pos..], FlushCompress::None)
            .map_err(|e| corrupt(format!("deflate: {e}")))?;
        let consumed = (self.deflate.total_in() - before_in) as usize;
        let produced_body = (self.deflate.total_out() - before_out) as usize;
        if self.is_gzip && consumed > 0 {
            self.crc.update(&input[..consumed]);
            self.member_out_len = self.member_out_len.wrapping_add(consumed as u32);
        }
        Ok(StepOutcome {
            consumed,
            produced: out_pos + produced_body,
            unit_end: false,
        })
    }

    fn flush(&mut self, output: &mut [u8]) -> io::Result<usize> {
        let before_out = self.deflate.total_out();
        self.deflate
            .compress(&[], output, FlushCompress::Sync)
            .map_err(|e| corrupt(format!("deflate: {e}")))?;
        Ok((self.deflate.total_out() - before_out) as usize)
    }

    fn finish(&mut self, output: &mut [u8]) -> io::Result<usize> {
        if self.wrote_trailer {
            return Ok(0);
        }
        let before_out = self.deflate.total_out();
        let status = self
            .deflate
            .compress(&[], output, FlushCompress::Finish)
            .map_err(|e| corrupt(format!("deflate: {e}")))?;
        let mut produced = (self.deflate.total_out() - before_out) as usize;

        if matches!(status, FlateStatus::StreamEnd) && self.is_gzip {
            let crc = self.crc.clone().finalize();
            let trailer = [
                crc.to_le_bytes(),
                self.member_out_len.to_le_bytes(),
            ]
            .concat();
            if output.len() - produced >= trailer.len() {
                output[produced..produced + trailer.len()].copy_from_slice(&trailer);
                produced += trailer.len();
                self.wrote_trailer = true;
            }
        } else if matches!(status, FlateStatus::StreamEnd) {
            self.wrote_trailer = true;
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    use crate::codec::{CodecReader, CodecWriter};
    use crate::stream::test_support::{VecSink, VecSource};
    use crate::stream::Sink;

    #[test]
    fn round_trips_through_gzip() {
        let payload = b"one two three four five six seven eight nine ten ".repeat(100);

        let sink = VecSink::new();
        let handle = sink.handle();
        let mut writer = CodecWriter::new(Box::new(sink), ZlibEncodeOp::new(6, true));
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        let compressed = handle.take();
        assert_eq!(&compressed[..2], &GZIP_MAGIC);

        let src = Box::new(VecSource::new(compressed));
        let mut reader = CodecReader::new(src, ZlibDecodeOp::new(true), true);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).unwrap();
        assert_eq!(got, payload);
    }

    #[test]
    fn concatenated_gzip_members_decode_transparently() {
        let a = b"first member payload".to_vec();
        let b = b"second member payload, a bit longer".to_vec();

        let mut combined = Vec::new();
        for part in [&a, &b] {
            let sink = VecSink::new();
            let handle = sink.handle();
            let mut writer = CodecWriter::new(Box::new(sink), ZlibEncodeOp::new(6, true));
            writer.write_all(part).unwrap();
            writer.close().unwrap();
            combined.extend(handle.take());
        }

        let src = Box::new(VecSource::new(combined));
        let mut reader = CodecReader::new(src, ZlibDecodeOp::new(true), true);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).unwrap();
        let mut expected = a;
        expected.extend(b);
        assert_eq!(got, expected);
    }

    #[test]
    fn truncated_member_reports_truncated_error() {
        let payload = b"data that will be cut off before the trailer".repeat(20);
        let sink = VecSink::new();
        let handle = sink.handle();
        let mut writer = CodecWriter::new(Box::new(sink), ZlibEncodeOp::new(6, true));
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        let mut compressed = handle.take();
        compressed.truncate(compressed.len() / 2);

        let src = Box::new(VecSource::new(compressed));
        let mut reader = CodecReader::new(src, ZlibDecodeOp::new(true), true);
        let mut got = Vec::new();
        let err = reader.read_to_end(&mut got).unwrap_err();
        assert!(crate::error::WandioError::downcast(&err).is_some());
    }

    #[test]
    fn round_trips_through_zlib_header() {
        let payload = b"zlib-wrapped payload, no gzip container here".to_vec();
        let sink = VecSink::new();
        let handle = sink.handle();
        let mut writer = CodecWriter::new(Box::new(sink), ZlibEncodeOp::new(6, false));
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        let compressed = handle.take();
        let src = Box::new(VecSource::new(compressed));
        let mut reader = CodecReader::new(src, ZlibDecodeOp::new(false), false);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).unwrap();
        assert_eq!(got, payload);
    }
}
