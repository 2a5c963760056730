//! Non-blocking byte channels.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;

/// A non-blocking byte-stream endpoint.
///
/// `Err` with [`io::ErrorKind::WouldBlock`] means "nothing right now, try
/// again later". `Ok(0)` from [`try_read`](Self::try_read) with a non-empty
/// buffer is end of stream. Neither method may block the caller.
pub trait ByteChannel {
    /// Reads whatever is available into `buf`.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes as much of `buf` as the channel accepts right now.
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Releases the endpoint. Further I/O is undefined but must not panic.
    fn close(&mut self) {}

    /// Returns `true` when the endpoint is on the local disk rather than
    /// behind a connection.
    fn is_local(&self) -> bool {
        false
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).try_read(buf)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).try_write(buf)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn is_local(&self) -> bool {
        (**self).is_local()
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).try_read(buf)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).try_write(buf)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn is_local(&self) -> bool {
        (**self).is_local()
    }
}

/// Signals interrupted system calls as `WouldBlock` so the poll loop retries.
fn retryable(result: io::Result<usize>) -> io::Result<usize> {
    match result {
        Err(error) if error.kind() == io::ErrorKind::Interrupted => {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
        other => other,
    }
}

/// [`ByteChannel`] over a non-blocking [`TcpStream`].
#[derive(Debug)]
pub struct TcpChannel {
    stream: Option<TcpStream>,
}

impl TcpChannel {
    /// Wraps `stream`, switching it to non-blocking mode.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl ByteChannel for TcpChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self.stream()?;
        retryable(stream.read(buf))
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stream = self.stream()?;
        retryable(stream.write(buf))
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// [`ByteChannel`] over a local file.
///
/// Regular files never report `WouldBlock`; a read at the end of the file is
/// end of stream.
#[derive(Debug)]
pub struct FileChannel {
    file: Option<File>,
    len: Option<u64>,
}

impl FileChannel {
    /// Opens `path` for reading.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            ));
        }
        let len = metadata.is_file().then(|| metadata.len());
        Ok(Self::from_parts(file, len))
    }

    /// Wraps an already open file with an optional known length.
    #[must_use]
    pub fn from_parts(file: File, len: Option<u64>) -> Self {
        Self {
            file: Some(file),
            len,
        }
    }

    /// Length reported by the file's metadata when it was opened.
    ///
    /// `None` for pipes and other special files.
    #[must_use]
    pub const fn known_len(&self) -> Option<u64> {
        self.len
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl ByteChannel for FileChannel {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file()?;
        retryable(file.read(buf))
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self.file()?;
        retryable(file.write(buf))
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn is_local(&self) -> bool {
        true
    }
}
