//! LocalBinder: an in-process transport for binding connections to services.
//!
//! Services are registered under a [`ComponentName`].  A connection binds to
//! a component with [`LocalBinder::bind_service`]; the binder then delivers
//! `on_service_connected` from a tokio task, the way an out-of-process
//! transport would deliver it from its own thread some time after the bind
//! request.
//!
//! # Lifecycle events
//!
//! | Call                      | Notification delivered to matching bindings |
//! |---------------------------|---------------------------------------------|
//! | `bind_service`            | `on_service_connected` (later, on a task)   |
//! | `kill_service`            | `on_service_disconnected`                   |
//! | `register_service` again  | `on_service_connected` (reconnect)          |
//! | `unbind` (via `Unbind`)   | none; the binding is simply forgotten       |
//!
//! # Ordering guarantee
//!
//! Notifications are delivered while the registry lock is held.  Once
//! [`Unbind::unbind`] returns for a connection, no further notification for
//! that connection can be delivered.  Listeners must therefore not call back
//! into the binder from inside a notification.
//!
//! Each bind request is tagged with its own id.  The delayed connect for a
//! request is delivered only if that request is still the live binding and
//! the listener has not been connected in the meantime, so every bind yields
//! at most one `on_service_connected` until the next `kill_service`.
//!
//! # Lifetime
//!
//! The registry holds listeners weakly.  A connection dropped without
//! `disconnect()` is freed normally; its binding is pruned the next time the
//! registry is walked.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use interconnect_core::{ComponentName, RemoteService};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::connection::{ConnectionListener, ServiceConnection, Unbind};

/// Errors returned when a bind request cannot be accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// Nothing is registered under the requested component.
    #[error("no service registered for {0}")]
    ServiceNotFound(ComponentName),

    /// The listener already holds a binding; unbind it first.
    #[error("connection {0} is already bound")]
    AlreadyBound(Uuid),

    /// `bind_service` was called outside a tokio runtime, so the connect
    /// notification could not be scheduled.
    #[error("bind requires a running tokio runtime")]
    NoRuntime,
}

struct Binding {
    request_id: u64,
    connection_id: Uuid,
    component: ComponentName,
    /// `true` between a delivered `on_service_connected` and the next
    /// `on_service_disconnected`.
    connected: bool,
    listener: Weak<dyn ConnectionListener>,
}

#[derive(Default)]
struct Registry {
    services: HashMap<ComponentName, Arc<dyn RemoteService>>,
    bindings: Vec<Binding>,
    next_request_id: u64,
}

impl Registry {
    /// Drops bindings whose listener no longer exists.
    fn prune(&mut self) {
        self.bindings.retain(|b| {
            let alive = b.listener.strong_count() > 0;
            if !alive {
                debug!(connection_id = %b.connection_id, "pruning binding of dropped connection");
            }
            alive
        });
    }
}

/// In-process service registry and transport.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone, Default)]
pub struct LocalBinder {
    registry: Arc<Mutex<Registry>>,
}

impl LocalBinder {
    /// Creates an empty binder with no services registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the service hosted under `component`.
    ///
    /// Connections already bound to `component` are notified with
    /// `on_service_connected`, which is how they recover after
    /// [`kill_service`](Self::kill_service).  Returns how many were notified.
    pub fn register_service(&self, component: ComponentName, service: Arc<dyn RemoteService>) -> usize {
        let mut guard = self.lock();
        let registry = &mut *guard;
        registry.prune();
        registry
            .services
            .insert(component.clone(), Arc::clone(&service));

        let mut notified = 0;
        for binding in registry.bindings.iter_mut().filter(|b| b.component == component) {
            if let Some(listener) = binding.listener.upgrade() {
                listener.on_service_connected(&component, Arc::clone(&service));
                binding.connected = true;
                notified += 1;
            }
        }
        info!(
            component = %component,
            binder = %service.as_binder(),
            reconnected = notified,
            "service registered"
        );
        notified
    }

    /// Simulates the death of the process hosting `component`.
    ///
    /// The service is removed from the registry and every connection bound
    /// to it receives `on_service_disconnected`.  The bindings themselves are
    /// kept, so registering the service again reconnects them.  Returns how
    /// many connections were notified.
    pub fn kill_service(&self, component: &ComponentName) -> usize {
        let mut guard = self.lock();
        let registry = &mut *guard;
        if registry.services.remove(component).is_none() {
            debug!(component = %component, "kill requested for unknown service");
            return 0;
        }
        registry.prune();

        let mut notified = 0;
        for binding in registry.bindings.iter_mut().filter(|b| &b.component == component) {
            if let Some(listener) = binding.listener.upgrade() {
                listener.on_service_disconnected(component);
                notified += 1;
            }
            binding.connected = false;
        }
        warn!(component = %component, bound = notified, "service killed");
        notified
    }

    /// Requests a binding between `listener` and the service at `component`.
    ///
    /// On success `on_service_connected` is delivered later from a tokio task,
    /// unless the connection is unbound (or already connected by a
    /// re-registration) before the task runs.  The binder keeps only a weak
    /// reference to `listener`.
    ///
    /// # Errors
    ///
    /// - [`BindError::NoRuntime`] outside a tokio runtime.
    /// - [`BindError::ServiceNotFound`] if nothing is registered at `component`.
    /// - [`BindError::AlreadyBound`] if `listener` already holds a binding.
    pub fn bind_service(
        &self,
        component: &ComponentName,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<(), BindError> {
        let runtime = Handle::try_current().map_err(|_| BindError::NoRuntime)?;
        let connection_id = listener.connection_id();

        let request_id = {
            let mut registry = self.lock();
            registry.prune();
            if !registry.services.contains_key(component) {
                return Err(BindError::ServiceNotFound(component.clone()));
            }
            if registry
                .bindings
                .iter()
                .any(|b| b.connection_id == connection_id)
            {
                return Err(BindError::AlreadyBound(connection_id));
            }
            registry.next_request_id += 1;
            let request_id = registry.next_request_id;
            registry.bindings.push(Binding {
                request_id,
                connection_id,
                component: component.clone(),
                connected: false,
                listener: Arc::downgrade(&listener),
            });
            request_id
        };
        info!(component = %component, %connection_id, request_id, "bind requested");

        let binder = self.clone();
        runtime.spawn(async move {
            binder.deliver_connected(request_id);
        });
        Ok(())
    }

    /// Creates a [`ServiceConnection`] and binds it to `component`.
    ///
    /// # Errors
    ///
    /// See [`bind_service`](Self::bind_service).
    pub fn connect(
        &self,
        component: &ComponentName,
    ) -> Result<Arc<ServiceConnection<LocalBinder>>, BindError> {
        let connection = Arc::new(ServiceConnection::new(self.clone()));
        self.bind_service(component, connection.clone())?;
        Ok(connection)
    }

    /// Number of live connections currently bound to `component`.
    pub fn binding_count(&self, component: &ComponentName) -> usize {
        let mut registry = self.lock();
        registry.prune();
        registry
            .bindings
            .iter()
            .filter(|b| &b.component == component)
            .count()
    }

    /// `true` if a service is registered under `component`.
    pub fn is_registered(&self, component: &ComponentName) -> bool {
        self.lock().services.contains_key(component)
    }

    fn deliver_connected(&self, request_id: u64) {
        let mut guard = self.lock();
        let registry = &mut *guard;
        let Some(binding) = registry
            .bindings
            .iter_mut()
            .find(|b| b.request_id == request_id)
        else {
            debug!(request_id, "unbound before connect was delivered");
            return;
        };
        if binding.connected {
            debug!(connection_id = %binding.connection_id, "already connected by re-registration");
            return;
        }
        let Some(service) = registry.services.get(&binding.component) else {
            // Killed in the meantime; re-registering will connect it.
            debug!(connection_id = %binding.connection_id, "service gone before connect");
            return;
        };
        let Some(listener) = binding.listener.upgrade() else {
            debug!(connection_id = %binding.connection_id, "connection dropped before connect");
            return;
        };
        listener.on_service_connected(&binding.component, Arc::clone(service));
        binding.connected = true;
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Unbind for LocalBinder {
    fn unbind(&self, connection_id: Uuid) {
        let mut registry = self.lock();
        let before = registry.bindings.len();
        registry
            .bindings
            .retain(|b| b.connection_id != connection_id);
        let removed = before - registry.bindings.len();
        if removed > 0 {
            info!(%connection_id, "unbound");
        } else {
            debug!(%connection_id, "unbind for unknown connection");
        }
    }
}

impl fmt::Debug for LocalBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("LocalBinder")
            .field("services", &registry.services.keys().collect::<Vec<_>>())
            .field("bindings", &registry.bindings.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
