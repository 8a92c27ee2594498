//! Session operations abstraction
//!
//! The responder never touches a `TcpStream` directly. Reads and writes go
//! through [`SessionOps`], which lets tests substitute a scripted transport,
//! and [`Connection`] layers the line and partial reads the HTTP handler
//! needs on top of it.

use super::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Size of a single read from the underlying transport
const READ_BUF_SIZE: usize = 4096;

/// Session operations trait
///
/// This trait defines the operations that can be performed on an accepted
/// connection.
pub trait SessionOps {
    /// Poll the session for events
    ///
    /// Returns true if the session is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session, returning 0 at end of stream
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// Buffered byte stream handed to connection handlers
///
/// Offers the three operations handlers rely on: [`read_line`],
/// [`read_partial`] and [`write_all`]. End of stream is reported as
/// [`Error::ConnectionClosed`].
///
/// [`read_line`]: Connection::read_line
/// [`read_partial`]: Connection::read_partial
/// [`write_all`]: Connection::write_all
pub struct Connection<S: SessionOps = FdSessionOps> {
    session: S,
    buffer: BytesMut,
    peer: Option<SocketAddr>,
    timeout: Option<Duration>,
}

impl<S: SessionOps> Connection<S> {
    /// Wrap a session
    pub fn new(session: S) -> Self {
        Connection {
            session,
            buffer: BytesMut::with_capacity(READ_BUF_SIZE),
            peer: None,
            timeout: None,
        }
    }

    /// Record the remote address for diagnostics
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Remote address, when known
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Set the idle timeout for reads; `None` blocks indefinitely
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Get the timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Read one line, including its `\n` terminator
    ///
    /// A stream that ends in the middle of a line yields
    /// [`Error::ConnectionClosed`]; the partial line is discarded.
    pub fn read_line(&mut self) -> Result<Bytes> {
        let mut scanned = 0;

        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|&b| b == b'\n') {
                return Ok(self.buffer.split_to(scanned + pos + 1).freeze());
            }
            scanned = self.buffer.len();

            if self.fill()? == 0 {
                if !self.buffer.is_empty() {
                    tracing::trace!(bytes = self.buffer.len(), "discarding partial line at end of stream");
                    self.buffer.clear();
                }
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Read between 1 and `max` bytes
    ///
    /// Buffered bytes left over from line reads are returned first.
    pub fn read_partial(&mut self, max: usize) -> Result<Bytes> {
        if max == 0 {
            return Ok(Bytes::new());
        }

        if self.buffer.is_empty() && self.fill()? == 0 {
            return Err(Error::ConnectionClosed);
        }

        let n = max.min(self.buffer.len());
        Ok(self.buffer.split_to(n).freeze())
    }

    /// Write the whole buffer
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;

        while written < data.len() {
            if let Some(timeout) = self.timeout {
                if !self.session.poll(PollEvents::Write, Some(timeout))? {
                    return Err(Error::Timeout);
                }
            }

            let n = self.session.write(&data[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }

        Ok(())
    }

    /// Close the session
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    /// Get a reference to the underlying session
    pub fn get_ref(&self) -> &S {
        &self.session
    }

    fn fill(&mut self) -> Result<usize> {
        if let Some(timeout) = self.timeout {
            if !self.session.poll(PollEvents::Read, Some(timeout))? {
                return Err(Error::Timeout);
            }
        }

        let mut chunk = [0u8; READ_BUF_SIZE];
        let n = self.session.read(&mut chunk)?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

/// Plain file descriptor session operations
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    /// Create a new FD session operations from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1); // -1 = infinite

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // The peer may already be gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}
