//! One-shot callback channel used to return the result of an asynchronous call.
//!
//! [`SelectedDomainsCallback::channel`] creates two linked halves:
//!
//! - [`SelectedDomainsCallback`] – handed to the remote side.  It may be
//!   cloned and moved to any thread; whichever copy delivers first wins.
//! - [`PendingDomains`] – kept by the caller.  It is a future that resolves
//!   with the delivered [`DomainList`].
//!
//! # Delivery rules
//!
//! - The first call to `on_selected_domains_retrieved` resolves the channel.
//! - Every later call is a protocol violation: it is logged and reported back
//!   to the delivering side as [`CallbackError::AlreadyResolved`].  The waiting
//!   caller only ever sees the first result.
//! - If every copy of the callback is dropped without a delivery, the waiting
//!   caller gets [`CallbackError::Abandoned`] instead of hanging.
//! - If the caller stopped waiting (dropped its [`PendingDomains`]), a
//!   delivery still succeeds and the result is discarded.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::domains::DomainList;

/// Violations of the one-shot delivery contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The remote side delivered a second result to an already-resolved channel.
    #[error("callback {callback_id} was already resolved; duplicate delivery ignored")]
    AlreadyResolved { callback_id: Uuid },

    /// The remote side dropped the channel without ever delivering a result.
    #[error("callback {callback_id} was dropped without a delivery")]
    Abandoned { callback_id: Uuid },
}

struct Shared {
    id: Uuid,
    sender: Mutex<Option<oneshot::Sender<DomainList>>>,
}

/// Delivery half of the channel, handed to the remote side.
#[derive(Clone)]
pub struct SelectedDomainsCallback {
    shared: Arc<Shared>,
}

impl SelectedDomainsCallback {
    /// Creates a fresh, unresolved channel.
    pub fn channel() -> (Self, PendingDomains) {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let callback = Self {
            shared: Arc::new(Shared {
                id,
                sender: Mutex::new(Some(tx)),
            }),
        };
        (callback, PendingDomains { id, rx })
    }

    /// Identifier shared by both halves of the channel.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// `true` once a result has been delivered.
    pub fn is_resolved(&self) -> bool {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Delivers the result of the asynchronous call.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::AlreadyResolved`] if a result was delivered
    /// before.  The earlier result stands.
    pub fn on_selected_domains_retrieved(&self, domains: DomainList) -> Result<(), CallbackError> {
        // Take the sender under the lock so concurrent deliveries race on a
        // single `Option::take`; exactly one of them sees `Some`.
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(sender) = sender else {
            warn!(
                callback_id = %self.shared.id,
                "duplicate delivery on resolved callback (protocol violation)"
            );
            return Err(CallbackError::AlreadyResolved {
                callback_id: self.shared.id,
            });
        };

        let count = domains.len();
        if sender.send(domains).is_err() {
            debug!(
                callback_id = %self.shared.id,
                "caller stopped waiting; discarding {count} domain(s)"
            );
        } else {
            debug!(callback_id = %self.shared.id, "delivered {count} domain(s)");
        }
        Ok(())
    }
}

impl fmt::Debug for SelectedDomainsCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedDomainsCallback")
            .field("id", &self.shared.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Receiving half of the channel.  Await it to get the delivered result.
#[derive(Debug)]
pub struct PendingDomains {
    id: Uuid,
    rx: oneshot::Receiver<DomainList>,
}

impl PendingDomains {
    /// Identifier shared by both halves of the channel.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for PendingDomains {
    type Output = Result<DomainList, CallbackError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map_err(|_| CallbackError::Abandoned { callback_id: id })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
