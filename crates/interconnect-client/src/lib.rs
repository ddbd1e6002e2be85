//! interconnect-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the client do? (for beginners)
//!
//! The domain-selection service lives in another process.  The only way to
//! reach it is to *bind* to it through a transport, which later tells us
//! (from its own thread) that the binding is up or that it was lost.
//!
//! [`ServiceConnection`] turns that into something application code can call
//! like a local object:
//!
//! 1. The transport calls `on_service_connected` / `on_service_disconnected`.
//! 2. Application code calls `get_selected_domains`, `select_domains`, …
//! 3. Each call checks that a handle is held (or fails with
//!    [`ConnectionError::NotConnected`]) and forwards to the remote side.
//! 4. `get_selected_domains_async` hands the remote side a one-shot callback
//!    and awaits it, so the caller just writes `.await`.
//!
//! # Layers
//!
//! ```text
//! [interconnect-client]
//!   ├── application/     ServiceConnection: state machine + call forwarding
//!   └── infrastructure/
//!         ├── binder/          In-process transport (LocalBinder)
//!         ├── memory_service/  In-memory RemoteService implementation
//!         └── config/          TOML configuration
//! ```

/// Application layer: the connection bridge.
pub mod application;

/// Infrastructure layer: transport, service implementation and configuration.
pub mod infrastructure;

pub use application::connection::{
    ConnectionError, ConnectionListener, ConnectionState, SelectedDomainsFuture, ServiceConnection,
    Unbind,
};
