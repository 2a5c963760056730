//! Sinks that receive the engine's output.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Where pumped bytes end up.
///
/// `write` follows [`io::Write::write`] semantics: it may accept fewer bytes
/// than offered, and [`io::ErrorKind::WouldBlock`] means "try again later".
pub trait Destination {
    /// Writes a prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Bytes accepted so far.
    fn len(&self) -> u64;

    /// Returns `true` when nothing has been written yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: Destination + ?Sized> Destination for &mut D {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

impl<D: Destination + ?Sized> Destination for Box<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

/// In-memory destination that grows as needed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Ramfile {
    bytes: Vec<u8>,
}

impl Ramfile {
    /// An empty ramfile.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Contents written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the ramfile, returning its contents.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Destination for Ramfile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// How [`FileDestination::open`] treats an existing file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriteMode {
    /// Create the file, truncating any previous contents.
    #[default]
    Truncate,
    /// Create the file if missing and append to it otherwise.
    Append,
}

/// A destination backed by a file on disk.
#[derive(Debug)]
pub struct FileDestination {
    file: Option<File>,
    path: PathBuf,
    written: u64,
}

impl FileDestination {
    /// Opens `path` for writing in the given mode.
    pub fn open(path: &Path, mode: WriteMode) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Truncate => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };
        let file = options.open(path)?;
        debug!(path = %path.display(), ?mode, "opened destination");
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Creates `path`, truncating any previous contents.
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::open(path, WriteMode::Truncate)
    }

    /// Path the destination writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes written data to stable storage.
    pub fn sync(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }

    /// Closes and deletes the file.
    pub fn discard(mut self) -> io::Result<()> {
        drop(self.file.take());
        debug!(path = %self.path.display(), "discarding destination");
        fs::remove_file(&self.path)
    }
}

impl Destination for FileDestination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.written
    }
}
