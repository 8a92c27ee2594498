//! Listening socket setup

use super::{Config, Error, Result, LISTEN_BACKLOG};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Resolve the configured host and port to the first usable address
pub fn resolve(config: &Config) -> Result<SocketAddr> {
    (config.host(), config.port())
        .to_socket_addrs()
        .map_err(|e| Error::Resolve(format!("{}:{}: {}", config.host(), config.port(), e)))?
        .next()
        .ok_or_else(|| Error::Resolve(format!("{}:{}: no addresses", config.host(), config.port())))
}

/// Bind a listening socket for `config`
///
/// `SO_REUSEADDR` is set so a responder can rebind the port its predecessor
/// just released while that connection sits in `TIME_WAIT`.
pub fn bind(config: &Config) -> Result<TcpListener> {
    let addr = resolve(config)?;
    let bind_err = |source| Error::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;

    #[test]
    fn test_bind_ephemeral_port() {
        let listener = bind(&Config::new("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let _client = TcpStream::connect(addr).unwrap();
        let (_stream, peer) = listener.accept().unwrap();
        assert!(peer.ip().is_loopback());
    }

    #[test]
    fn test_bind_conflict() {
        let first = bind(&Config::new("127.0.0.1", 0)).unwrap();
        let port = first.local_addr().unwrap().port();

        // SO_REUSEADDR does not allow two live listeners on one port
        let result = bind(&Config::new("127.0.0.1", port));
        assert!(matches!(result, Err(Error::Bind { .. })));
    }

    #[test]
    fn test_resolve_failure() {
        let result = resolve(&Config::new("no such host.invalid", 80));
        assert!(matches!(result, Err(Error::Resolve(_))));
    }
}
