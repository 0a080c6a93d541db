//! Descriptor-backed byte I/O (spec section 4.4): a thin wrapper over an OS
//! file, or over stdin/stdout when the filename is `"-"`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{Sink, Source, Whence};

fn to_seek_from(offset: i64, whence: Whence) -> SeekFrom {
    match whence {
        Whence::Start => SeekFrom::Start(offset as u64),
        Whence::Current => SeekFrom::Current(offset),
        Whence::End => SeekFrom::End(offset),
    }
}

/// The read-only file source, or standard input.
pub enum FileSource {
    File(File),
    Stdin(io::Stdin),
}

impl FileSource {
    pub fn open(path: &str) -> io::Result<Self> {
        if path == "-" {
            return Ok(FileSource::Stdin(io::stdin()));
        }
        Ok(FileSource::File(File::open(path)?))
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileSource::File(f) => f.read(buf),
            FileSource::Stdin(s) => s.lock().read(buf),
        }
    }
}

impl Source for FileSource {
    fn tell(&mut self) -> io::Result<u64> {
        match self {
            FileSource::File(f) => f.stream_position(),
            FileSource::Stdin(_) => Err(crate::error::WandioError::Unsupported(
                "stdin is not seekable".into(),
            )
            .into()),
        }
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> io::Result<u64> {
        match self {
            FileSource::File(f) => f.seek(to_seek_from(offset, whence)),
            FileSource::Stdin(_) => Err(crate::error::WandioError::Unsupported(
                "stdin is not seekable".into(),
            )
            .into()),
        }
    }
}

/// The write-side counterpart, or standard output.
pub enum FileSink {
    File(File),
    Stdout(io::Stdout),
}

impl FileSink {
    pub fn create(path: &str, append: bool) -> io::Result<Self> {
        if path == "-" {
            return Ok(FileSink::Stdout(io::stdout()));
        }
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(FileSink::File(file))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::File(f) => f.write(buf),
            FileSink::Stdout(s) => s.lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::File(f) => f.flush(),
            FileSink::Stdout(s) => s.lock().flush(),
        }
    }
}

impl Sink for FileSink {
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn round_trips_through_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let path = path.to_str().unwrap();

        let mut sink = FileSink::create(path, false).unwrap();
        sink.write_all(b"hello").unwrap();
        sink.close().unwrap();

        let mut src = FileSource::open(path).unwrap();
        let mut got = Vec::new();
        src.read_to_end(&mut got).unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn tell_and_seek_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let path = path.to_str().unwrap();
        std::fs::write(path, b"0123456789").unwrap();

        let mut src = FileSource::open(path).unwrap();
        let mut buf = [0u8; 4];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(src.tell().unwrap(), 4);

        src.seek(2, Whence::Start).unwrap();
        let mut buf = [0u8; 2];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"23");
    }
}
