//! Domain value types for Interconnect.
//!
//! Nothing in here knows about connections, threads or callbacks.  These are
//! the payloads the service operations take and return.

/// Service component identifiers (`package/class`).
pub mod component;

/// Ordered list of selected domains.
pub mod domains;
