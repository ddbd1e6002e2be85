//! Application layer for the client.
//!
//! # What lives here?
//!
//! - **`connection`** – [`ServiceConnection`](connection::ServiceConnection),
//!   the bridge between a transport that binds to the remote service and the
//!   application code that wants to call it.  It owns the binding state,
//!   enforces the "must be bound" precondition on every operation and turns
//!   the callback-style asynchronous operation into an `async fn`.
//!
//! The transport itself is *not* here: it is reached through the
//! [`Unbind`](connection::Unbind) trait and calls back in through
//! [`ConnectionListener`](connection::ConnectionListener).

pub mod connection;
