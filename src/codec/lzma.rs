//! xz/lzma backend (spec section 4.6): wraps `xz2::stream::Stream` (liblzma)
//! as an [`Operation`]. The decoder is built with `new_auto_decoder` and the
//! `LZMA_CONCATENATED` flag, so liblzma itself treats back-to-back `.xz`
//! streams as one logical stream -- no manual `reinit` loop needed here,
//! unlike the zlib backend.

use std::io;

use xz2::stream::{Action, Check, Status, Stream, LZMA_CONCATENATED};

use super::{Operation, StepOutcome};
use crate::error::WandioError;

const MEM_UNLIMITED: u64 = u64::MAX;

pub struct LzmaDecodeOp {
    inner: Stream,
}

impl LzmaDecodeOp {
    pub fn new() -> io::Result<Self> {
        let inner = Stream::new_auto_decoder(MEM_UNLIMITED, LZMA_CONCATENATED)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("xz: {e}"))))?;
        Ok(LzmaDecodeOp { inner })
    }
}

impl Operation for LzmaDecodeOp {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<StepOutcome> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .process(input, output, Action::Run)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("xz: {e}"))))?;
        Ok(StepOutcome {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            unit_end: matches!(status, Status::StreamEnd),
        })
    }
}

pub struct LzmaEncodeOp {
    inner: Stream,
}

impl LzmaEncodeOp {
    pub fn new(level: u32) -> io::Result<Self> {
        let inner = Stream::new_easy_encoder(level, Check::Crc64)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("xz: {e}"))))?;
        Ok(LzmaEncodeOp { inner })
    }
}

impl Operation for LzmaEncodeOp {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<StepOutcome> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .process(input, output, Action::Run)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("xz: {e}"))))?;
        Ok(StepOutcome {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            unit_end: matches!(status, Status::StreamEnd),
        })
    }

    fn flush(&mut self, output: &mut [u8]) -> io::Result<usize> {
        let before_out = self.inner.total_out();
        self.inner
            .process(&[], output, Action::SyncFlush)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("xz: {e}"))))?;
        Ok((self.inner.total_out() - before_out) as usize)
    }

    fn finish(&mut self, output: &mut [u8]) -> io::Result<usize> {
        let before_out = self.inner.total_out();
        self.inner
            .process(&[], output, Action::Finish)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("xz: {e}"))))?;
        Ok((self.inner.total_out() - before_out) as usize)
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
    fn round_trips_through_xz() {
        let payload = b"lorem ipsum dolor sit amet ".repeat(200);

        let sink = VecSink::new();
        let handle = sink.handle();
        let mut writer = CodecWriter::new(Box::new(sink), LzmaEncodeOp::new(6).unwrap());
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        let compressed = handle.take();
        assert_eq!(&compressed[..5], &[0xFD, b'7', b'z', b'X', b'Z']);

        let src = Box::new(VecSource::new(compressed));
        let mut reader = CodecReader::new(src, LzmaDecodeOp::new().unwrap(), false);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).unwrap();
        assert_eq!(got, payload);
    }
}
