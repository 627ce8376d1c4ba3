use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    num::NonZeroUsize,
    sync::Arc,
    thread::JoinHandle,
};

use anyhow::{Context, Result};
use tracing::warn;

use crate::{
    connection::{ConnectionHandle, TcpConnection},
    coordinator::{CoordinatorHandle, spawn_coordinator},
    worker::spawn_worker,
};

/// Accepts TCP clients and hands each one to the coordinator and a fresh worker.
pub struct Relay {
    listener: TcpListener,
    read_buffer: NonZeroUsize,
}

impl Relay {
    pub fn bind(addr: SocketAddr, read_buffer: NonZeroUsize) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self::new(listener, read_buffer))
    }

    pub fn new(listener: TcpListener, read_buffer: NonZeroUsize) -> Self {
        Self {
            listener,
            read_buffer,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts the coordinator and runs the accept loop on the calling thread.
    ///
    /// Only returns if the coordinator stops accepting events.
    pub fn run(self) -> Result<()> {
        let (coordinator, _coordinator_thread) = spawn_coordinator()?;
        loop {
            handle_accept_result(self.listener.accept(), &coordinator, self.read_buffer)?;
        }
    }
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    coordinator: &CoordinatorHandle,
    read_buffer: NonZeroUsize,
) -> Result<()> {
    match result {
        Ok((stream, peer)) => {
            let connection: ConnectionHandle = Arc::new(TcpConnection::new(stream, peer));
            on_accept(connection, coordinator, read_buffer)
        }
        Err(err) => {
            warn!(error = ?err, "failed to accept connection");
            Ok(())
        }
    }
}

/// Registers a new connection, then starts its worker.
///
/// `Connected` is enqueued before the worker exists, so the coordinator always sees it
/// ahead of anything the worker reads.
///
/// If the worker thread cannot be started the connection is closed and `Disconnected`
/// is enqueued here instead.
pub fn on_accept(
    connection: ConnectionHandle,
    coordinator: &CoordinatorHandle,
    read_buffer: NonZeroUsize,
) -> Result<()> {
    register_and_spawn(connection, coordinator, |connection, coordinator| {
        spawn_worker(connection, coordinator, read_buffer)
    })
}

fn register_and_spawn<S>(
    connection: ConnectionHandle,
    coordinator: &CoordinatorHandle,
    spawn: S,
) -> Result<()>
where
    S: FnOnce(ConnectionHandle, CoordinatorHandle) -> Result<JoinHandle<()>>,
{
    coordinator
        .connected(connection.clone())
        .context("cannot register new connection")?;

    if let Err(err) = spawn(connection.clone(), coordinator.clone()) {
        warn!(peer = %connection.peer(), error = ?err, "closing connection without a worker");
        connection.close();
        coordinator.disconnected(connection)?;
    }
    Ok(())
}
