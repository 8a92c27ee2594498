//! Single-connection TCP responder
//!
//! A [`TcpResponder`] binds a listening socket, accepts exactly one
//! connection on a background thread, runs the handler on it and closes it.
//! The shared value given to [`TcpResponder::start`] travels into the worker
//! and comes back out when the worker finishes.

use super::{listener, Config, Connection, Error, FdSessionOps, Result};
use socket2::SockRef;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Connection handler
///
/// Receives the accepted connection and the shared value. Returning
/// [`Error::ConnectionClosed`] marks a normal client disconnect.
pub type Handler<T> = dyn Fn(&mut Connection, &mut T) -> Result<()> + Send + Sync;

/// In-flight connection, kept so `stop()` can tear it down
///
/// `stopped` is set under the same lock, so a connection accepted after
/// `stop()` is never handed to the handler.
#[derive(Default)]
struct Active {
    stream: Option<TcpStream>,
    stopped: bool,
}

type ActiveSlot = Arc<Mutex<Active>>;

/// Responder that serves exactly one connection per start
pub struct TcpResponder<T> {
    config: Config,
    handler: Arc<Handler<T>>,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    active: ActiveSlot,
    worker: Option<JoinHandle<Result<T>>>,
}

impl<T: Send + 'static> TcpResponder<T> {
    /// Create a responder; nothing is bound until [`start`](Self::start)
    pub fn new<F>(config: Config, handler: F) -> Self
    where
        F: Fn(&mut Connection, &mut T) -> Result<()> + Send + Sync + 'static,
    {
        TcpResponder {
            config,
            handler: Arc::new(handler),
            listener: None,
            local_addr: None,
            active: ActiveSlot::default(),
            worker: None,
        }
    }

    /// Bind, serve one connection in the background, and wait for it
    ///
    /// `on_ready` runs on the calling thread once the socket is bound and the
    /// worker is launched; it is where the client side gets triggered. The
    /// value the handler mutated is returned after the worker finishes.
    pub fn start<F>(&mut self, shared: T, on_ready: F) -> Result<T>
    where
        F: FnOnce(SocketAddr),
    {
        let addr = self.spawn(shared)?;
        on_ready(addr);
        self.join()
    }

    /// Bind and launch the worker without waiting for it
    pub fn spawn(&mut self, shared: T) -> Result<SocketAddr> {
        if self.worker.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let listener = listener::bind(&self.config)?;
        let addr = listener.local_addr()?;
        let control = listener.try_clone()?;

        // Fresh slot per run; a detached worker keeps its own
        self.active = ActiveSlot::default();

        let handler = Arc::clone(&self.handler);
        let active = Arc::clone(&self.active);
        let timeout = self.config.read_timeout();

        let worker = thread::Builder::new()
            .name(format!("nanoserve-{}", addr.port()))
            .spawn(move || serve_once(listener, &*handler, &active, timeout, shared))?;

        debug!(%addr, "listening");

        self.listener = Some(control);
        self.local_addr = Some(addr);
        self.worker = Some(worker);

        Ok(addr)
    }

    /// Wait for the worker launched by [`spawn`](Self::spawn)
    ///
    /// The listening socket is closed once the worker is done.
    pub fn join(&mut self) -> Result<T> {
        let worker = self.worker.take().ok_or(Error::NotStarted)?;
        let result = worker.join().map_err(|_| Error::WorkerPanicked);

        self.listener = None;
        self.local_addr = None;

        result?
    }
}

impl<T> TcpResponder<T> {
    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bound address, while the listening socket is open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Close the listening socket and any in-flight connection
    ///
    /// Does not wait for the worker: reads and writes in progress are
    /// abandoned and the worker is detached.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            // Wakes a worker still blocked in accept()
            if let Err(e) = SockRef::from(&listener).shutdown(Shutdown::Both) {
                trace!(error = %e, "listener shutdown");
            }
        }

        {
            let mut active = lock(&*self.active);
            active.stopped = true;
            if let Some(stream) = active.stream.take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }

        if self.worker.take().is_some() {
            debug!(addr = ?self.local_addr, "worker detached");
        }

        self.local_addr = None;
    }
}

impl<T> Drop for TcpResponder<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shuts the in-flight connection down on every exit from the handler
struct ActiveGuard<'a> {
    slot: &'a Mutex<Active>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Some(stream) = lock(self.slot).stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn serve_once<T>(
    listener: TcpListener,
    handler: &Handler<T>,
    active: &Mutex<Active>,
    timeout: Option<Duration>,
    mut shared: T,
) -> Result<T> {
    let (stream, peer) = listener.accept().map_err(|e| {
        debug!(error = %e, "accept aborted");
        Error::Io(e)
    })?;
    drop(listener);

    debug!(client = %peer, "connected");

    {
        let mut slot = lock(active);
        if slot.stopped {
            debug!(client = %peer, "stopped before serving");
            let _ = stream.shutdown(Shutdown::Both);
            return Err(Error::Io(io::ErrorKind::ConnectionAborted.into()));
        }
        slot.stream = Some(stream.try_clone()?);
    }
    let _guard = ActiveGuard { slot: active };

    let mut conn = Connection::new(FdSessionOps::new(stream)).with_peer(peer);
    conn.set_timeout(timeout);

    let outcome = handler(&mut conn, &mut shared);

    if let Err(e) = conn.close() {
        trace!(client = %peer, error = %e, "close");
    }

    match outcome {
        Ok(()) => {
            debug!(client = %peer, "closed");
            Ok(shared)
        }
        Err(Error::ConnectionClosed) => {
            debug!(client = %peer, "disconnected");
            Ok(shared)
        }
        Err(e) => {
            warn!(client = %peer, error = %e, "handler failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;

    fn config() -> Config {
        Config::new("127.0.0.1", 0)
    }

    #[test]
    fn test_collects_raw_bytes() {
        let mut responder = TcpResponder::new(config(), |conn, buf: &mut Vec<u8>| {
            buf.extend_from_slice(&conn.read_partial(1024)?);
            Ok(())
        });

        let buf = responder
            .start(Vec::new(), |addr| {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(b"4f1c2e9a-raw-payload").unwrap();
            })
            .unwrap();
        responder.stop();

        assert_eq!(buf, b"4f1c2e9a-raw-payload");
    }

    #[test]
    fn test_disconnect_is_not_an_error() {
        let mut responder = TcpResponder::new(config(), |conn, lines: &mut u32| {
            loop {
                conn.read_line()?;
                *lines += 1;
            }
        });

        let lines = responder
            .start(0, |addr| {
                let mut stream = TcpStream::connect(addr).unwrap();
                stream.write_all(b"one\ntwo\n").unwrap();
            })
            .unwrap();

        assert_eq!(lines, 2);
    }

    #[test]
    fn test_handler_error_is_fatal() {
        let mut responder = TcpResponder::new(config(), |_conn, _: &mut ()| {
            Err(Error::Http(crate::http::Error::Request("boom".to_string())))
        });

        let result = responder.start((), |addr| {
            let _stream = TcpStream::connect(addr).unwrap();
        });

        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[test]
    fn test_peer_is_recorded() {
        let mut responder = TcpResponder::new(config(), |conn, peer: &mut Option<SocketAddr>| {
            *peer = conn.peer();
            Ok(())
        });

        let (tx, rx) = mpsc::channel();
        let peer = responder
            .start(None, |addr| {
                let stream = TcpStream::connect(addr).unwrap();
                tx.send(stream.local_addr().unwrap()).unwrap();
            })
            .unwrap();

        assert_eq!(peer, Some(rx.recv().unwrap()));
    }

    #[test]
    fn test_join_without_start() {
        let mut responder = TcpResponder::new(config(), |_conn, _: &mut ()| Ok(()));
        assert!(matches!(responder.join(), Err(Error::NotStarted)));
    }

    #[test]
    fn test_spawn_twice() {
        let mut responder = TcpResponder::new(config(), |_conn, _: &mut ()| Ok(()));
        let addr = responder.spawn(()).unwrap();
        assert_eq!(responder.local_addr(), Some(addr));
        assert!(matches!(responder.spawn(()), Err(Error::AlreadyStarted)));

        responder.stop();
        assert_eq!(responder.local_addr(), None);
    }

    #[test]
    fn test_connection_accepted_after_stop_is_not_served() {
        let listener = listener::bind(&config()).unwrap();
        let addr = listener.local_addr().unwrap();
        let active = Mutex::new(Active {
            stream: None,
            stopped: true,
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"late request\r\n").unwrap();

        fn mark_called(_conn: &mut Connection, called: &mut bool) -> Result<()> {
            *called = true;
            Ok(())
        }
        let result = serve_once::<bool>(listener, &mark_called, &active, None, false);

        assert!(matches!(result, Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::ConnectionAborted));
        assert!(lock(&active).stream.is_none());

        let mut buf = Vec::new();
        let _ = std::io::Read::read_to_end(&mut client, &mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_join_closes_listener() {
        let mut responder = TcpResponder::new(config(), |_conn, _: &mut ()| Ok(()));

        let (tx, rx) = mpsc::channel();
        responder
            .start((), |addr| {
                tx.send(addr).unwrap();
                let _stream = TcpStream::connect(addr).unwrap();
            })
            .unwrap();

        assert_eq!(responder.local_addr(), None);
        assert!(TcpStream::connect(rx.recv().unwrap()).is_err());
    }
}
