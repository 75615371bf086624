use std::fs;
use std::io::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::pipe::PipeWriteEnd;

/// The synchronous file-backed sink: bytes are appended as they drain
/// and `flush`/`close` forward to the OS.
#[derive(Debug)]
pub(crate) struct FileSink {
    file: fs::File,
}

impl FileSink {
    pub(crate) fn create(path: &Path) -> Result<FileSink> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        Ok(FileSink { file })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// The sink a draining `OutputStream` writes completed pages into. Only
/// `Sink::None` (a stream with no sink at all — a pure in-memory
/// stream, or the fixed "unsafe-memory" mode, distinguished by whether
/// the stream has buffers at all) is not represented here: callers
/// never construct a `Sink` for those modes in the first place.
///
/// Each variant supports exactly one of the sync/async operation
/// pairs; calling the unsupported half is a programming defect and
/// panics — a correctly written caller never invokes an unsupported
/// operation on a given sink in the first place.
#[derive(Debug)]
pub(crate) enum Sink {
    File(FileSink),
    Pipe(PipeWriteEnd),
}

impl Sink {
    pub(crate) fn file(path: &Path) -> Result<Sink> {
        Ok(Sink::File(FileSink::create(path)?))
    }

    pub(crate) fn write_sync(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Sink::File(f) => f.write(bytes),
            Sink::Pipe(_) => unreachable!("a pipe sink only supports async writes"),
        }
    }

    pub(crate) fn flush_sync(&mut self) -> Result<()> {
        match self {
            Sink::File(f) => f.flush(),
            Sink::Pipe(_) => unreachable!("a pipe sink only supports async flush"),
        }
    }

    pub(crate) fn close_sync(&mut self) -> Result<()> {
        match self {
            Sink::File(f) => f.close(),
            Sink::Pipe(_) => unreachable!("a pipe sink only supports async close"),
        }
    }

    pub(crate) async fn write_async(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Sink::File(_) => unreachable!("a file sink only supports sync writes"),
            Sink::Pipe(p) => p.write(bytes).await,
        }
    }

    pub(crate) async fn flush_async(&mut self) -> Result<()> {
        match self {
            Sink::File(_) => unreachable!("a file sink only supports sync flush"),
            Sink::Pipe(_) => Ok(()),
        }
    }

    pub(crate) async fn close_async(&mut self) -> Result<()> {
        match self {
            Sink::File(_) => unreachable!("a file sink only supports sync close"),
            Sink::Pipe(p) => {
                p.close();
                Ok(())
            }
        }
    }

    pub(crate) fn is_async(&self) -> bool {
        matches!(self, Sink::Pipe(_))
    }
}
