//! ServiceConnection: binding state machine and call forwarding for the remote service.
//!
//! # State machine
//!
//! ```text
//!                 on_service_connected(h)
//!   ┌─────────┐ ─────────────────────────> ┌───────────┐
//!   │ Unbound │                            │ Bound(h)  │ ──┐ on_service_connected(h2)
//!   └─────────┘ <───────────────────────── └───────────┘ <─┘ (overwrite)
//!        ↑       on_service_disconnected()
//!        └────── disconnect()
//! ```
//!
//! There is no terminal state: a connection may be bound again after any
//! number of disconnects.
//!
//! # Locking discipline
//!
//! The current handle lives in a single `std::sync::Mutex<Option<Arc<..>>>`.
//! Every operation clones the `Arc` out under the lock, releases the lock,
//! and only then calls the remote side.  A long remote call therefore never
//! blocks the transport from delivering `on_service_disconnected`, and a call
//! racing a disconnect either runs against the handle it snapshotted or fails
//! with [`ConnectionError::NotConnected`].
//!
//! # Asynchronous calls
//!
//! [`ServiceConnection::get_selected_domains_async`] checks the binding,
//! creates a fresh one-shot callback and passes it to the remote side, all
//! before returning.  The returned [`SelectedDomainsFuture`] awaits it.  The call
//! is *not* tied to the binding: if the connection drops while the result is
//! outstanding, the caller still receives it when the remote side delivers.
//! No timeout is applied here; wrap the future in `tokio::time::timeout` if
//! the caller needs one.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use interconnect_core::{
    BinderId, CallbackError, ComponentName, DomainList, PendingDomains, RemoteError,
    RemoteService, SelectedDomainsCallback,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors returned by [`ServiceConnection`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No service handle is held.  Bind (again) and retry.
    #[error("service not bound")]
    NotConnected,

    /// The remote side failed the call; passed through unchanged.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The remote side broke the callback contract.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] CallbackError),
}

/// Observable binding state of a [`ServiceConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle held; every operation fails with `NotConnected`.
    Unbound,
    /// A handle for the given channel is held.
    Bound(BinderId),
}

impl ConnectionState {
    /// `true` for [`ConnectionState::Bound`].
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// The bound channel's identity, if any.
    pub fn binder(&self) -> Option<BinderId> {
        match self {
            Self::Bound(id) => Some(*id),
            Self::Unbound => None,
        }
    }
}

/// Transport-side teardown hook invoked by [`ServiceConnection::disconnect`].
///
/// Each transport implements this to release whatever it holds for the
/// binding identified by `connection_id`.  It must tolerate being called for
/// a connection that is not (or no longer) bound, and must not deliver
/// `on_service_connected` for that connection once it has returned.
pub trait Unbind: Send + Sync {
    /// Releases the transport's binding for `connection_id`.
    fn unbind(&self, connection_id: Uuid);
}

impl<F> Unbind for F
where
    F: Fn(Uuid) + Send + Sync,
{
    fn unbind(&self, connection_id: Uuid) {
        self(connection_id)
    }
}

/// Notifications a transport delivers about a binding.
///
/// Both methods may be called from any thread, at any time, concurrently
/// with application calls into the same connection.
pub trait ConnectionListener: Send + Sync {
    /// Stable identifier the transport uses to track this listener.
    fn connection_id(&self) -> Uuid;

    /// The binding to `name` is up and `service` may be called.
    ///
    /// Implementations may read `service.as_binder()` (a local accessor) but
    /// must not make domain calls from here.
    fn on_service_connected(&self, name: &ComponentName, service: Arc<dyn RemoteService>);

    /// The binding to `name` was lost (service process died or was stopped).
    fn on_service_disconnected(&self, name: &ComponentName);
}

/// Client-side bridge to the remote domain-selection service.
///
/// The forwarding methods are fixed; the only per-transport piece is the
/// teardown hook `U`.
pub struct ServiceConnection<U> {
    id: Uuid,
    service: Mutex<Option<Arc<dyn RemoteService>>>,
    state_tx: watch::Sender<ConnectionState>,
    unbinder: U,
}

impl<U: Unbind> ServiceConnection<U> {
    /// Creates an unbound connection that releases bindings through `unbinder`.
    pub fn new(unbinder: U) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Unbound);
        Self {
            id: Uuid::new_v4(),
            service: Mutex::new(None),
            state_tx,
            unbinder,
        }
    }

    /// Identifier of this connection, as passed to [`Unbind::unbind`].
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current binding state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// `true` while a service handle is held.
    pub fn is_bound(&self) -> bool {
        self.state().is_bound()
    }

    /// Subscribes to binding state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Waits until the connection is bound and returns the channel identity.
    ///
    /// Returns immediately if already bound.
    pub async fn wait_until_bound(&self) -> Result<BinderId, ConnectionError> {
        let mut rx = self.state_tx.subscribe();
        let state = rx
            .wait_for(ConnectionState::is_bound)
            .await
            .map_err(|_| ConnectionError::NotConnected)?;
        state.binder().ok_or(ConnectionError::NotConnected)
    }

    /// Releases the binding.
    ///
    /// The transport is told to forget the binding first, so it cannot
    /// deliver another `on_service_connected` afterwards; then the handle is
    /// cleared.  Once this returns every operation fails with
    /// [`ConnectionError::NotConnected`].  It does not wait for the transport
    /// to finish tearing the channel down, and asynchronous calls already in
    /// flight are not cancelled.
    pub fn disconnect(&self) {
        self.unbinder.unbind(self.id);
        match self.store(None) {
            Some(previous) => info!(
                connection_id = %self.id,
                binder = %previous.as_binder(),
                "disconnected from service"
            ),
            None => debug!(connection_id = %self.id, "disconnect requested while unbound"),
        }
    }

    /// Returns the domains selected for `package_name`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConnected`] when unbound; remote failures as
    /// [`ConnectionError::Remote`].
    pub fn get_selected_domains(&self, package_name: &str) -> Result<DomainList, ConnectionError> {
        let service = self.snapshot()?;
        debug!(connection_id = %self.id, package_name, "forwarding get_selected_domains");
        Ok(service.get_selected_domains(package_name)?)
    }

    /// Returns the domains selected for `package_name`, through the remote
    /// side's callback-based asynchronous operation.
    ///
    /// The binding check and the remote request happen here, when the method
    /// is called.  The returned future only waits for the delivery, so its
    /// outcome does not depend on binding changes between this call and the
    /// first poll.
    ///
    /// # Errors (resolved by the returned future)
    ///
    /// - [`ConnectionError::NotConnected`] when unbound at call time.
    /// - [`ConnectionError::Remote`] if the remote side refuses the request.
    /// - [`ConnectionError::ProtocolViolation`] if the remote side drops the
    ///   callback without delivering.
    pub fn get_selected_domains_async(&self, package_name: &str) -> SelectedDomainsFuture {
        let state = match self.request_selected_domains(package_name) {
            Ok(pending) => FutureState::Waiting(pending),
            Err(error) => FutureState::Failed(error),
        };
        SelectedDomainsFuture { state }
    }

    /// Forwards a caller-supplied callback to the remote asynchronous
    /// operation without waiting for it.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConnected`] when unbound; remote failures as
    /// [`ConnectionError::Remote`].
    pub fn get_selected_domains_with_callback(
        &self,
        package_name: &str,
        callback: SelectedDomainsCallback,
    ) -> Result<(), ConnectionError> {
        let service = self.snapshot()?;
        debug!(
            connection_id = %self.id,
            callback_id = %callback.id(),
            package_name,
            "forwarding caller callback"
        );
        Ok(service.get_selected_domains_async(package_name, callback)?)
    }

    /// Records `domains` as selected for `package_name` on behalf of `component`.
    ///
    /// Like every other operation this fails when unbound; a write is never
    /// dropped silently.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConnected`] when unbound; remote failures as
    /// [`ConnectionError::Remote`].
    pub fn select_domains(
        &self,
        package_name: &str,
        domains: &DomainList,
        component: &ComponentName,
    ) -> Result<(), ConnectionError> {
        let service = self.snapshot()?;
        debug!(
            connection_id = %self.id,
            package_name,
            component = %component,
            count = domains.len(),
            "forwarding select_domains"
        );
        Ok(service.select_domains(package_name, domains, component)?)
    }

    /// Identity of the bound channel.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConnected`] when unbound.
    pub fn as_binder(&self) -> Result<BinderId, ConnectionError> {
        Ok(self.snapshot()?.as_binder())
    }

    fn lock_service(&self) -> MutexGuard<'_, Option<Arc<dyn RemoteService>>> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clones the current handle out of the lock.
    fn snapshot(&self) -> Result<Arc<dyn RemoteService>, ConnectionError> {
        self.lock_service()
            .clone()
            .ok_or(ConnectionError::NotConnected)
    }

    /// Creates a callback channel and hands it to the current handle.  The
    /// handle is released before the caller starts waiting.
    fn request_selected_domains(&self, package_name: &str) -> Result<PendingDomains, ConnectionError> {
        let service = self.snapshot()?;
        let (callback, pending) = SelectedDomainsCallback::channel();
        debug!(
            connection_id = %self.id,
            callback_id = %callback.id(),
            package_name,
            "forwarding get_selected_domains_async"
        );
        service.get_selected_domains_async(package_name, callback)?;
        Ok(pending)
    }

    /// Replaces the held handle and publishes the matching state.
    ///
    /// The state is published while the handle lock is held so observers
    /// never see a state that disagrees with the handle.
    fn store(
        &self,
        bound: Option<(Arc<dyn RemoteService>, BinderId)>,
    ) -> Option<Arc<dyn RemoteService>> {
        let (service, state) = match bound {
            Some((service, binder)) => (Some(service), ConnectionState::Bound(binder)),
            None => (None, ConnectionState::Unbound),
        };
        let mut guard = self.lock_service();
        let previous = std::mem::replace(&mut *guard, service);
        self.state_tx.send_replace(state);
        previous
    }
}

/// Future returned by [`ServiceConnection::get_selected_domains_async`].
///
/// Resolves to the delivered domains, or to the error fixed when the call
/// was made.
#[derive(Debug)]
#[must_use = "the result of the lookup is only observed by awaiting it"]
pub struct SelectedDomainsFuture {
    state: FutureState,
}

#[derive(Debug)]
enum FutureState {
    Failed(ConnectionError),
    Waiting(PendingDomains),
}

impl Future for SelectedDomainsFuture {
    type Output = Result<DomainList, ConnectionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            FutureState::Failed(error) => Poll::Ready(Err(error.clone())),
            FutureState::Waiting(pending) => Pin::new(pending)
                .poll(cx)
                .map_err(ConnectionError::from),
        }
    }
}

impl<U: Unbind> ConnectionListener for ServiceConnection<U> {
    fn connection_id(&self) -> Uuid {
        self.id
    }

    fn on_service_connected(&self, name: &ComponentName, service: Arc<dyn RemoteService>) {
        let binder = service.as_binder();
        let replaced = self.store(Some((service, binder))).is_some();
        info!(
            connection_id = %self.id,
            component = %name,
            %binder,
            replaced,
            "service connected"
        );
    }

    fn on_service_disconnected(&self, name: &ComponentName) {
        if self.store(None).is_some() {
            info!(connection_id = %self.id, component = %name, "service disconnected");
        } else {
            debug!(connection_id = %self.id, component = %name, "disconnect notice while unbound");
        }
    }
}

impl<U> fmt::Debug for ServiceConnection<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnection")
            .field("id", &self.id)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
