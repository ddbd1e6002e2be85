//! # interconnect-core
//!
//! Shared interface definition for Interconnect: the types and traits that
//! both the client bridge and any service implementation agree on.
//!
//! This crate has no I/O, no transport and no runtime requirements.  It
//! defines:
//!
//! - **`domain`** – Plain value types that cross the process boundary:
//!   [`ComponentName`] (which service component to address) and
//!   [`DomainList`] (the ordered list of domains selected for a package).
//!
//! - **`service`** – The remote service surface ([`RemoteService`]), the
//!   identity of a bound channel ([`BinderId`]), the remote-side error type
//!   ([`RemoteError`]) and the one-shot callback channel used to return the
//!   result of an asynchronous call ([`SelectedDomainsCallback`]).
//!
//! # How an asynchronous call travels (for beginners)
//!
//! ```text
//! caller                      callback channel                remote side
//! ──────                      ────────────────                ───────────
//! SelectedDomainsCallback::channel()
//!   → (callback, pending)
//! service.get_selected_domains_async(pkg, callback) ───────>  keeps callback
//! pending.await          (suspended)
//!                                          <──────  callback.on_selected_domains_retrieved(list)
//!   → Ok(list)
//! ```

pub mod domain;
pub mod service;

// Re-export the most-used types at the crate root so callers can write
// `interconnect_core::DomainList` instead of the longer module path.
pub use domain::component::{ComponentName, ComponentNameError};
pub use domain::domains::DomainList;
pub use service::callback::{CallbackError, PendingDomains, SelectedDomainsCallback};
pub use service::{BinderId, RemoteError, RemoteService};
