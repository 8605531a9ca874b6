//! Non-blocking transport seam between the tick driver and the operating
//! system: accept, receive and send never block, reporting "nothing right
//! now" instead so the single control thread keeps ticking.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

/// One client connection with non-blocking reads and writes.
///
/// `try_recv` returns `Ok(None)` when no bytes are available yet,
/// `Ok(Some(0))` when the peer closed the connection, and `Ok(Some(n))`
/// for `n` received bytes. `try_send` returns `Ok(None)` when the
/// transport accepted nothing, otherwise the number of bytes taken, which
/// may be fewer than offered.
pub trait Connection {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
    fn try_send(&mut self, bytes: &[u8]) -> io::Result<Option<usize>>;
    fn close(&mut self) -> io::Result<()>;
}

/// Accepts at most one pending connection per call without blocking.
pub trait Listener {
    type Conn: Connection;

    fn accept_one(&mut self) -> io::Result<Option<(Self::Conn, SocketAddr)>>;
}

/// TCP listener in non-blocking mode.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Listener for TcpAcceptor {
    type Conn = TcpConnection;

    fn accept_one(&mut self) -> io::Result<Option<(TcpConnection, SocketAddr)>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(true)?;
                Ok(Some((TcpConnection { stream }, addr)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// TCP stream in non-blocking mode.
pub struct TcpConnection {
    stream: TcpStream,
}

impl Connection for TcpConnection {
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.stream.read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn try_send(&mut self, bytes: &[u8]) -> io::Result<Option<usize>> {
        match self.stream.write(bytes) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }
}
