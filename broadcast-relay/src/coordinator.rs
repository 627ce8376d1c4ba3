//! Single owner of the client registry.
//!
//! Every registry mutation and every broadcast happens on the coordinator thread,
//! one [`Event`] at a time, in the order events were enqueued. Workers and the
//! listener only ever hold a [`CoordinatorHandle`], which can enqueue but never
//! read the registry, so no locks are needed.

use std::{
    collections::HashMap,
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};

use crate::{connection::ConnectionHandle, event::Event};

/// Cloneable enqueue side of the coordinator's event queue.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events: Sender<Event>,
}

impl CoordinatorHandle {
    pub fn new(events: Sender<Event>) -> Self {
        Self { events }
    }

    pub fn connected(&self, connection: ConnectionHandle) -> Result<()> {
        self.send(Event::Connected(connection))
    }

    pub fn disconnected(&self, connection: ConnectionHandle) -> Result<()> {
        self.send(Event::Disconnected(connection))
    }

    pub fn message_received(&self, connection: ConnectionHandle, payload: Vec<u8>) -> Result<()> {
        self.send(Event::MessageReceived {
            connection,
            payload,
        })
    }

    fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|err| anyhow!("coordinator stopped, dropped {:?}", err.into_inner()))
    }
}

/// Spawns the coordinator thread and returns the handle used to feed it.
///
/// The thread exits once every clone of the returned handle has been dropped.
pub fn spawn_coordinator() -> Result<(CoordinatorHandle, JoinHandle<()>)> {
    let (events_tx, events_rx) = unbounded();
    let join = thread::Builder::new()
        .name("relay-coordinator".to_string())
        .spawn(move || Coordinator::new().run(events_rx))
        .context("failed to spawn coordinator thread")?;
    Ok((CoordinatorHandle::new(events_tx), join))
}

struct ClientRecord {
    connection: ConnectionHandle,
    /// Refreshed on every relayed message. Nothing evicts on it yet.
    last_activity: Instant,
}

#[derive(Default)]
pub struct Coordinator {
    clients: HashMap<String, ClientRecord>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes events until the queue is closed.
    pub fn run(mut self, events: Receiver<Event>) {
        for event in events.iter() {
            self.handle_event(event);
        }
        info!(clients = self.clients.len(), "event queue closed, coordinator stopping");
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Connected(connection) => self.register(connection),
            Event::Disconnected(connection) => self.unregister(&connection),
            Event::MessageReceived {
                connection,
                payload,
            } => self.relay(connection, &payload),
        }
    }

    fn register(&mut self, connection: ConnectionHandle) {
        let peer = connection.peer().to_string();
        info!(%peer, "client connected");
        self.clients.insert(
            peer,
            ClientRecord {
                connection,
                last_activity: Instant::now(),
            },
        );
    }

    fn unregister(&mut self, connection: &ConnectionHandle) {
        if self.clients.remove(connection.peer()).is_some() {
            info!(peer = %connection.peer(), "client disconnected");
        }
    }

    fn relay(&mut self, sender: ConnectionHandle, payload: &[u8]) {
        let peer = sender.peer();
        let Some(author) = self.clients.get_mut(peer) else {
            warn!(%peer, "message from unregistered client, closing connection");
            sender.close();
            return;
        };

        if std::str::from_utf8(payload).is_err() {
            debug!(%peer, len = payload.len(), "dropping message that is not valid UTF-8");
            return;
        }

        author.last_activity = Instant::now();
        debug!(%peer, len = payload.len(), recipients = self.clients.len() - 1, "relaying message");

        for (recipient, client) in &self.clients {
            if recipient == peer {
                continue;
            }
            // Failed recipients stay registered; their worker reports the disconnect.
            if let Err(err) = client.connection.write(payload) {
                debug!(peer = %recipient, error = ?err, "failed to deliver message");
            }
        }
    }
}
