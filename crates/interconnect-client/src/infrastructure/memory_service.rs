//! In-memory implementation of the domain-selection service.
//!
//! # Why an in-memory service?
//!
//! The real service lives in another process behind a platform transport.
//! `InMemoryDomainService` stands in for it so the bridge can be driven end
//! to end without one:
//!
//! - Selections are kept in a `HashMap<package, DomainList>`.
//! - Every call is counted, and every `select_domains` call is recorded, so
//!   tests can assert exactly what reached the remote side.
//! - Asynchronous results are delivered according to a [`DeliveryMode`]:
//!   immediately, after a delay on a tokio task, or only when the test calls
//!   [`InMemoryDomainService::deliver_pending`].
//!
//! # Injected failures
//!
//! [`InMemoryDomainService::fail_with`] makes every domain call return the
//! given [`RemoteError`], to exercise pass-through of remote failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use interconnect_core::{
    BinderId, ComponentName, DomainList, RemoteError, RemoteService, SelectedDomainsCallback,
};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// How asynchronous lookups are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Deliver on the calling thread before `get_selected_domains_async` returns.
    #[default]
    Immediate,
    /// Deliver from a tokio task after the given delay.
    Delayed(Duration),
    /// Park the callback until `deliver_pending` / `deliver_pending_for`.
    Manual,
}

/// One recorded `select_domains` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectCall {
    pub package_name: String,
    pub domains: DomainList,
    pub component: ComponentName,
}

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub get_async: usize,
    pub select: usize,
}

impl CallCounts {
    /// Sum of all domain calls.
    pub fn total(&self) -> usize {
        self.get + self.get_async + self.select
    }
}

/// A [`RemoteService`] backed by process memory.
pub struct InMemoryDomainService {
    binder: BinderId,
    mode: DeliveryMode,
    selections: Mutex<HashMap<String, DomainList>>,
    pending: Mutex<Vec<(String, SelectedDomainsCallback)>>,
    writes: Mutex<Vec<SelectCall>>,
    failure: Mutex<Option<RemoteError>>,
    get_calls: AtomicUsize,
    async_calls: AtomicUsize,
    select_calls: AtomicUsize,
}

impl InMemoryDomainService {
    /// Creates an empty service that answers asynchronous lookups immediately.
    pub fn new() -> Self {
        Self::with_delivery(DeliveryMode::default())
    }

    /// Creates an empty service with the given delivery mode.
    pub fn with_delivery(mode: DeliveryMode) -> Self {
        Self {
            binder: BinderId::new(),
            mode,
            selections: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            get_calls: AtomicUsize::new(0),
            async_calls: AtomicUsize::new(0),
            select_calls: AtomicUsize::new(0),
        }
    }

    /// Sets the selections for `package_name` directly, without counting a call.
    pub fn seed(&self, package_name: impl Into<String>, domains: DomainList) {
        lock(&self.selections).insert(package_name.into(), domains);
    }

    /// Current selections for `package_name` (empty if none).
    pub fn selections_for(&self, package_name: &str) -> DomainList {
        lock(&self.selections)
            .get(package_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every domain call fail with `error`, or clears the failure with `None`.
    pub fn fail_with(&self, error: Option<RemoteError>) {
        *lock(&self.failure) = error;
    }

    /// All `select_domains` calls received so far, in order.
    pub fn writes(&self) -> Vec<SelectCall> {
        lock(&self.writes).clone()
    }

    /// Snapshot of the per-operation call counters.
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            get: self.get_calls.load(Ordering::SeqCst),
            get_async: self.async_calls.load(Ordering::SeqCst),
            select: self.select_calls.load(Ordering::SeqCst),
        }
    }

    /// Number of parked callbacks (manual delivery mode).
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Resolves every parked callback with the current selections for its
    /// package.  Returns how many were resolved.
    pub fn deliver_pending(&self) -> usize {
        let parked = std::mem::take(&mut *lock(&self.pending));
        self.resolve(parked)
    }

    /// Resolves only the parked callbacks for `package_name`.
    pub fn deliver_pending_for(&self, package_name: &str) -> usize {
        let parked = {
            let mut pending = lock(&self.pending);
            let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut *pending)
                .into_iter()
                .partition(|(package, _)| package == package_name);
            *pending = rest;
            matching
        };
        self.resolve(parked)
    }

    /// Removes the parked callbacks without resolving them and hands them to
    /// the caller.
    pub fn take_pending(&self) -> Vec<(String, SelectedDomainsCallback)> {
        std::mem::take(&mut *lock(&self.pending))
    }

    fn resolve(&self, parked: Vec<(String, SelectedDomainsCallback)>) -> usize {
        let count = parked.len();
        for (package_name, callback) in parked {
            let domains = self.selections_for(&package_name);
            if let Err(e) = callback.on_selected_domains_retrieved(domains) {
                warn!("parked callback for {package_name}: {e}");
            }
        }
        count
    }

    fn check_failure(&self) -> Result<(), RemoteError> {
        match lock(&self.failure).as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryDomainService {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteService for InMemoryDomainService {
    fn get_selected_domains(&self, package_name: &str) -> Result<DomainList, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.selections_for(package_name))
    }

    fn get_selected_domains_async(
        &self,
        package_name: &str,
        callback: SelectedDomainsCallback,
    ) -> Result<(), RemoteError> {
        self.async_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        match self.mode {
            DeliveryMode::Immediate => {
                let domains = self.selections_for(package_name);
                if let Err(e) = callback.on_selected_domains_retrieved(domains) {
                    warn!("immediate delivery for {package_name}: {e}");
                }
            }
            DeliveryMode::Delayed(delay) => {
                let runtime = Handle::try_current()
                    .map_err(|_| RemoteError::Unavailable("no async runtime for delivery".into()))?;
                let domains = self.selections_for(package_name);
                let package_name = package_name.to_string();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = callback.on_selected_domains_retrieved(domains) {
                        warn!("delayed delivery for {package_name}: {e}");
                    }
                });
            }
            DeliveryMode::Manual => {
                debug!(callback_id = %callback.id(), package_name, "parking callback");
                lock(&self.pending).push((package_name.to_string(), callback));
            }
        }
        Ok(())
    }

    fn select_domains(
        &self,
        package_name: &str,
        domains: &DomainList,
        component: &ComponentName,
    ) -> Result<(), RemoteError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        lock(&self.writes).push(SelectCall {
            package_name: package_name.to_string(),
            domains: domains.clone(),
            component: component.clone(),
        });
        lock(&self.selections).insert(package_name.to_string(), domains.clone());
        Ok(())
    }

    fn as_binder(&self) -> BinderId {
        self.binder
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
