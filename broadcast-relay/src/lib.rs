//! TCP broadcast relay: whatever one client sends is written to every other client.
//!
//! See `README.md` for usage. The threading model follows a single-owner design:
//!
//! - [`relay`] binds the listening socket and runs the accept loop. For each
//!   connection it enqueues a `Connected` event and spawns a worker thread.
//! - [`worker`] blocks on one connection's reads and turns every chunk into a
//!   `MessageReceived` event, finishing with exactly one `Disconnected`.
//! - [`coordinator`] is the only code that touches the client registry. It runs on
//!   its own thread, draining a crossbeam channel in arrival order and writing each
//!   valid message to every client except its sender.
//! - [`event`] and [`connection`] define what travels over the queue and the shared
//!   handle to a client's stream.
//! - [`cli`] parses the process-wide configuration.

pub mod cli;
pub mod connection;
pub mod coordinator;
pub mod event;
pub mod relay;
pub mod worker;
