//! bzip2 backend (spec section 4.6): wraps the crate's raw `Compress`/
//! `Decompress` session types as an [`Operation`]. Single-member only -- a
//! bzip2 stream-end always latches a clean EOF, never `reinit`s.

use std::io;

use bzip2::raw::{Action, Compress, Decompress, Status};
use bzip2::Compression;

use super::{Operation, StepOutcome};
use crate::error::WandioError;

pub struct Bzip2DecodeOp {
    inner: Decompress,
}

impl Bzip2DecodeOp {
    pub fn new() -> Self {
        Bzip2DecodeOp {
            inner: Decompress::new(false),
        }
    }
}

impl Operation for Bzip2DecodeOp {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<StepOutcome> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, output)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("bzip2: {e}"))))?;
        Ok(StepOutcome {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            unit_end: matches!(status, Status::StreamEnd),
        })
    }
}

pub struct Bzip2EncodeOp {
    inner: Compress,
}

impl Bzip2EncodeOp {
    pub fn new(level: u32) -> Self {
        Bzip2EncodeOp {
            inner: Compress::new(Compression::new(level), 0),
        }
    }
}

impl Operation for Bzip2EncodeOp {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<StepOutcome> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .compress(input, output, Action::Run)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("bzip2: {e}"))))?;
        Ok(StepOutcome {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            unit_end: matches!(status, Status::StreamEnd),
        })
    }

    fn flush(&mut self, output: &mut [u8]) -> io::Result<usize> {
        let before_out = self.inner.total_out();
        self.inner
            .compress(&[], output, Action::Flush)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("bzip2: {e}"))))?;
        Ok((self.inner.total_out() - before_out) as usize)
    }

    fn finish(&mut self, output: &mut [u8]) -> io::Result<usize> {
        let before_out = self.inner.total_out();
        self.inner
            .compress(&[], output, Action::Finish)
            .map_err(|e| io::Error::from(WandioError::Corrupt(format!("bzip2: {e}"))))?;
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
    fn round_trips_through_bzip2() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(50);

        let sink = VecSink::new();
        let handle = sink.handle();
        let mut writer = CodecWriter::new(Box::new(sink), Bzip2EncodeOp::new(6));
        writer.write_all(&payload).unwrap();
        writer.close().unwrap();

        let compressed = handle.take();
        let src = Box::new(VecSource::new(compressed));
        let mut reader = CodecReader::new(src, Bzip2DecodeOp::new(), false);
        let mut got = Vec::new();
        reader.read_to_end(&mut got).unwrap();
        assert_eq!(got, payload);
    }
}
