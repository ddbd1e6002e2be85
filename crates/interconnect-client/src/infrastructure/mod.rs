//! Infrastructure layer for the client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `interconnect_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`binder`** – [`LocalBinder`](binder::LocalBinder), an in-process
//!   transport.  It keeps a registry of services by component name, delivers
//!   connect/disconnect notifications to bound connections and implements the
//!   [`Unbind`](crate::application::connection::Unbind) teardown hook.
//!
//! - **`memory_service`** – [`InMemoryDomainService`](memory_service::InMemoryDomainService),
//!   a `RemoteService` that keeps selections in memory and records every call.
//!   Used by the CLI and by tests in place of a real out-of-process service.
//!
//! - **`config`** – TOML configuration for the CLI: which component to bind,
//!   how long to wait for the binding, the default log level.

pub mod binder;
pub mod config;
pub mod memory_service;
