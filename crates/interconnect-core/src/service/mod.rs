//! The remote service surface.
//!
//! [`RemoteService`] is what a bound channel looks like from the client
//! side: the domain operations plus an identity accessor.  The transport
//! hands out `Arc<dyn RemoteService>` handles; the client bridge holds at
//! most one of them at a time.
//!
//! # Synchronous vs asynchronous operations
//!
//! - `get_selected_domains` and `select_domains` return once the remote side
//!   has answered (or failed).
//! - `get_selected_domains_async` returns as soon as the request is accepted.
//!   The result arrives later, possibly from another thread, through the
//!   [`SelectedDomainsCallback`] passed in.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{component::ComponentName, domains::DomainList};

/// One-shot callback channel for asynchronous results.
pub mod callback;

pub use callback::SelectedDomainsCallback;

/// Errors reported by the remote side of a call.
///
/// The client bridge passes these through unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The process hosting the service has died.
    #[error("remote service process has died")]
    DeadObject,

    /// The service rejected or failed the call.
    #[error("remote call failed: {0}")]
    Failed(String),

    /// The service cannot accept calls right now.
    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

/// Identity of a bound service channel.
///
/// Two handles refer to the same underlying channel iff their `BinderId`s
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinderId(Uuid);

impl BinderId {
    /// Generates a fresh, random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BinderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BinderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binder:{}", self.0)
    }
}

/// The domain-selection service as seen through a bound channel.
///
/// Implementations must be shareable across threads: the client bridge calls
/// into a handle from whatever task invoked the operation, while the
/// transport may drop its own reference concurrently.
pub trait RemoteService: Send + Sync {
    /// Returns the domains currently selected for `package_name`.
    fn get_selected_domains(&self, package_name: &str) -> Result<DomainList, RemoteError>;

    /// Starts an asynchronous lookup of the domains selected for
    /// `package_name`.
    ///
    /// Returning `Ok(())` means the request was accepted and `callback` will
    /// be resolved exactly once.
    fn get_selected_domains_async(
        &self,
        package_name: &str,
        callback: SelectedDomainsCallback,
    ) -> Result<(), RemoteError>;

    /// Records `domains` as selected for `package_name`, on behalf of
    /// `component`.
    fn select_domains(
        &self,
        package_name: &str,
        domains: &DomainList,
        component: &ComponentName,
    ) -> Result<(), RemoteError>;

    /// Identity of the channel this handle talks through.
    ///
    /// Must be answered locally, without a round trip to the service
    /// process: transports call it from inside connect notifications while
    /// holding their own locks.
    fn as_binder(&self) -> BinderId;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
