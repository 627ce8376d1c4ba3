use std::fmt;

use crate::connection::ConnectionHandle;

/// Occurrences reported to the coordinator by the listener and connection workers.
///
/// Every variant carries the handle it originated from; the coordinator derives the
/// client's identity from [`Connection::peer`](crate::connection::Connection::peer).
pub enum Event {
    /// A connection was accepted and should be registered.
    Connected(ConnectionHandle),
    /// The worker for this connection stopped reading and closed it.
    Disconnected(ConnectionHandle),
    /// One chunk of bytes read from the connection, exactly as received.
    MessageReceived {
        connection: ConnectionHandle,
        payload: Vec<u8>,
    },
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Connected(connection) => f
                .debug_tuple("Connected")
                .field(&connection.peer())
                .finish(),
            Event::Disconnected(connection) => f
                .debug_tuple("Disconnected")
                .field(&connection.peer())
                .finish(),
            Event::MessageReceived {
                connection,
                payload,
            } => f
                .debug_struct("MessageReceived")
                .field("peer", &connection.peer())
                .field("len", &payload.len())
                .finish(),
        }
    }
}
