use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::Arc,
};

use tracing::debug;

/// Shared handle to one client's byte stream.
///
/// The worker reads through it while the coordinator writes and closes through it,
/// so every operation takes `&self`.
pub type ConnectionHandle = Arc<dyn Connection>;

pub trait Connection: Send + Sync + 'static {
    /// Remote endpoint address, used as the client's identity.
    fn peer(&self) -> &str;

    /// Blocking read of at most `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes the whole chunk.
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Shuts the stream down in both directions. Safe to call more than once.
    fn close(&self);
}

pub struct TcpConnection {
    stream: TcpStream,
    peer: String,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer: peer.to_string(),
        }
    }
}

impl Connection for TcpConnection {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        (&self.stream).write_all(bytes)
    }

    fn close(&self) {
        // NotConnected is expected when the peer or another thread got there first.
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            debug!(peer = %self.peer, error = ?err, "shutdown on closed connection");
        }
    }
}
