use std::{
    io,
    num::NonZeroUsize,
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{connection::ConnectionHandle, coordinator::CoordinatorHandle};

/// Spawns a thread that runs [`run_worker`] for one accepted connection.
pub fn spawn_worker(
    connection: ConnectionHandle,
    coordinator: CoordinatorHandle,
    read_buffer: NonZeroUsize,
) -> Result<JoinHandle<()>> {
    let name = format!("relay-worker-{}", connection.peer());
    thread::Builder::new()
        .name(name)
        .spawn(move || run_worker(connection, coordinator, read_buffer))
        .context("failed to spawn connection worker")
}

/// Reads the connection until it fails or the peer closes it.
///
/// Each successful read becomes one `MessageReceived` carrying exactly the bytes read,
/// so a message longer than `read_buffer` is relayed as several independent chunks.
/// On the way out the connection is closed and a single `Disconnected` is enqueued.
pub fn run_worker(
    connection: ConnectionHandle,
    coordinator: CoordinatorHandle,
    read_buffer: NonZeroUsize,
) {
    let mut buffer = vec![0u8; read_buffer.get()];
    loop {
        match connection.read(&mut buffer) {
            Ok(0) => {
                debug!(peer = %connection.peer(), "peer closed the connection");
                break;
            }
            Ok(n) => {
                let payload = buffer[..n].to_vec();
                if let Err(err) = coordinator.message_received(connection.clone(), payload) {
                    warn!(peer = %connection.peer(), error = %err, "dropping message");
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(peer = %connection.peer(), error = ?err, "read failed");
                break;
            }
        }
    }

    connection.close();
    if let Err(err) = coordinator.disconnected(connection.clone()) {
        warn!(peer = %connection.peer(), error = %err, "could not report disconnect");
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::*;
    use crate::{connection::fake::FakeConnection, event::Event};

    fn buffer(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).expect("non-zero buffer")
    }

    #[test]
    fn emits_one_message_per_read_then_a_single_disconnect() {
        let (events_tx, events_rx) = unbounded();
        let connection = FakeConnection::with_reads(
            "a:1",
            vec![Ok(b"hello".to_vec()), Ok(b"world".to_vec())],
        );

        run_worker(connection.clone(), CoordinatorHandle::new(events_tx), buffer(64));

        let events: Vec<Event> = events_rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            Event::MessageReceived { payload, .. } if payload == b"hello"
        ));
        assert!(matches!(
            &events[1],
            Event::MessageReceived { payload, .. } if payload == b"world"
        ));
        assert!(matches!(&events[2], Event::Disconnected(c) if c.peer() == "a:1"));
        assert!(connection.is_closed());
        assert!(connection.written().is_empty());
    }

    #[test]
    fn read_error_closes_and_reports_disconnect() {
        let (events_tx, events_rx) = unbounded();
        let connection = FakeConnection::with_reads(
            "a:1",
            vec![
                Ok(b"x".to_vec()),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
                Ok(b"never read".to_vec()),
            ],
        );

        run_worker(connection.clone(), CoordinatorHandle::new(events_tx), buffer(64));

        let events: Vec<Event> = events_rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Event::Disconnected(_)));
        assert!(connection.is_closed());
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let (events_tx, events_rx) = unbounded();
        let connection = FakeConnection::with_reads(
            "a:1",
            vec![
                Err(io::Error::from(io::ErrorKind::Interrupted)),
                Ok(b"after signal".to_vec()),
            ],
        );

        run_worker(connection, CoordinatorHandle::new(events_tx), buffer(64));

        let events: Vec<Event> = events_rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Event::MessageReceived { payload, .. } if payload == b"after signal"
        ));
        assert!(matches!(&events[1], Event::Disconnected(_)));
    }

    #[test]
    fn chunks_are_never_larger_than_the_read_buffer() {
        let (events_tx, events_rx) = unbounded();
        let connection = FakeConnection::with_reads(
            "a:1",
            vec![Ok(b"abcd".to_vec()), Ok(b"efgh".to_vec()), Ok(b"ij".to_vec())],
        );

        run_worker(connection, CoordinatorHandle::new(events_tx), buffer(4));

        let payloads: Vec<Vec<u8>> = events_rx
            .try_iter()
            .filter_map(|event| match event {
                Event::MessageReceived { payload, .. } => Some(payload),
                _ => None,
            })
            .collect();
        assert_eq!(
            payloads,
            vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]
        );
    }

    #[test]
    fn stops_reading_once_the_coordinator_is_gone() {
        let (events_tx, events_rx) = unbounded();
        drop(events_rx);
        let connection = FakeConnection::with_reads("a:1", vec![Ok(b"x".to_vec())]);

        run_worker(connection.clone(), CoordinatorHandle::new(events_tx), buffer(8));

        assert!(connection.is_closed());
    }
}
