//! Integration tests: ServiceConnection bound through LocalBinder to an
//! InMemoryDomainService.
//!
//! These drive the bridge the way an application would, with the binder
//! delivering lifecycle notifications and the in-memory service answering
//! (or withholding) asynchronous results.

use std::sync::Arc;
use std::time::Duration;

use interconnect_client::infrastructure::{
    binder::LocalBinder,
    memory_service::{CallCounts, DeliveryMode, InMemoryDomainService, SelectCall},
};
use interconnect_client::{ConnectionError, ConnectionState, ServiceConnection};
use interconnect_core::{
    CallbackError, ComponentName, DomainList, RemoteError, RemoteService, SelectedDomainsCallback,
};
use tokio_test::{assert_pending, assert_ready_eq, task};

type Connection = Arc<ServiceConnection<LocalBinder>>;

fn component() -> ComponentName {
    ComponentName::parse("app.linkhub/.interconnect.InterconnectService").unwrap()
}

fn receiver() -> ComponentName {
    ComponentName::parse("com.example/.LinkReceiver").unwrap()
}

fn domains(items: &[&str]) -> DomainList {
    items.iter().copied().collect()
}

/// Registers a service with the given delivery mode and returns a bound connection.
async fn bound(mode: DeliveryMode) -> (LocalBinder, Arc<InMemoryDomainService>, Connection) {
    let binder = LocalBinder::new();
    let service = Arc::new(InMemoryDomainService::with_delivery(mode));
    binder.register_service(component(), service.clone());

    let connection = binder.connect(&component()).expect("bind request accepted");
    connection.wait_until_bound().await.expect("bound");
    (binder, service, connection)
}

// ── Basic scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_connection_is_not_connected() {
    let connection = ServiceConnection::new(LocalBinder::new());

    assert_eq!(connection.state(), ConnectionState::Unbound);
    assert_eq!(
        connection.get_selected_domains("com.example"),
        Err(ConnectionError::NotConnected)
    );
}

#[tokio::test]
async fn test_bound_get_returns_remote_selection() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Immediate).await;
    service.seed("com.example", domains(&["a.com", "b.com"]));

    // Act
    let result = connection.get_selected_domains("com.example");

    // Assert
    assert_eq!(result, Ok(domains(&["a.com", "b.com"])));
    assert_eq!(service.call_counts().get, 1);
}

#[tokio::test]
async fn test_async_get_resumes_after_delayed_delivery() {
    // Arrange
    let (_binder, service, connection) =
        bound(DeliveryMode::Delayed(Duration::from_millis(20))).await;
    service.seed("com.example", domains(&["x.com"]));

    // Act
    let result = connection.get_selected_domains_async("com.example").await;

    // Assert
    assert_eq!(result, Ok(domains(&["x.com"])));
    assert_eq!(service.call_counts().get_async, 1);
}

#[tokio::test]
async fn test_select_forwards_exactly_one_write() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Immediate).await;

    // Act
    let result = connection.select_domains("com.example", &domains(&["a.com"]), &receiver());

    // Assert
    assert_eq!(result, Ok(()));
    assert_eq!(
        service.writes(),
        vec![SelectCall {
            package_name: "com.example".to_string(),
            domains: domains(&["a.com"]),
            component: receiver(),
        }]
    );
    assert_eq!(connection.get_selected_domains("com.example"), Ok(domains(&["a.com"])));
}

// ── Not-connected behaviour ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unbound_operations_never_reach_the_service() {
    // Arrange – bound, then the service process dies.
    let (binder, service, connection) = bound(DeliveryMode::Immediate).await;
    binder.kill_service(&component());
    let (callback, _pending) = SelectedDomainsCallback::channel();

    // Act + Assert
    assert_eq!(
        connection.get_selected_domains("p"),
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(
        connection.get_selected_domains_async("p").await,
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(
        connection.get_selected_domains_with_callback("p", callback.clone()),
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(
        connection.select_domains("p", &domains(&["a.com"]), &receiver()),
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(connection.as_binder(), Err(ConnectionError::NotConnected));

    assert_eq!(service.call_counts(), CallCounts::default());
    assert!(!callback.is_resolved());
}

#[tokio::test]
async fn test_disconnect_makes_every_operation_fail() {
    // Arrange
    let (binder, service, connection) = bound(DeliveryMode::Immediate).await;

    // Act
    connection.disconnect();

    // Assert
    assert_eq!(connection.state(), ConnectionState::Unbound);
    assert_eq!(binder.binding_count(&component()), 0);
    assert_eq!(
        connection.get_selected_domains("p"),
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(
        connection.get_selected_domains_async("p").await,
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(
        connection.select_domains("p", &domains(&[]), &receiver()),
        Err(ConnectionError::NotConnected)
    );
    assert_eq!(service.call_counts().total(), 0);
}

#[tokio::test]
async fn test_disconnect_while_unbound_is_harmless() {
    let connection = ServiceConnection::new(LocalBinder::new());

    connection.disconnect();
    connection.disconnect();

    assert_eq!(
        connection.get_selected_domains("p"),
        Err(ConnectionError::NotConnected)
    );
}

#[tokio::test]
async fn test_disconnected_connection_ignores_service_reregistration() {
    // Arrange
    let (binder, service, connection) = bound(DeliveryMode::Immediate).await;
    connection.disconnect();

    // Act
    let notified = binder.register_service(component(), service);

    // Assert
    assert_eq!(notified, 0);
    assert!(!connection.is_bound());
}

// ── Remote failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_failure_passes_through_unchanged() {
    let (_binder, service, connection) = bound(DeliveryMode::Immediate).await;
    service.fail_with(Some(RemoteError::DeadObject));

    assert_eq!(
        connection.get_selected_domains("p"),
        Err(ConnectionError::Remote(RemoteError::DeadObject))
    );
    assert_eq!(
        connection.get_selected_domains_async("p").await,
        Err(ConnectionError::Remote(RemoteError::DeadObject))
    );
    // The bridge does not react to remote failures; it is still bound.
    assert!(connection.is_bound());
}

#[tokio::test]
async fn test_kill_and_reregister_rebinds_connection() {
    // Arrange
    let (binder, service, connection) = bound(DeliveryMode::Immediate).await;
    service.seed("com.example", domains(&["a.com"]));
    binder.kill_service(&component());
    assert!(!connection.is_bound());

    // Act – a replacement process comes up under the same component.
    let replacement = Arc::new(InMemoryDomainService::new());
    replacement.seed("com.example", domains(&["b.com"]));
    binder.register_service(component(), replacement.clone());

    // Assert
    assert_eq!(connection.as_binder(), Ok(replacement.as_binder()));
    assert_eq!(
        connection.get_selected_domains("com.example"),
        Ok(domains(&["b.com"]))
    );
    assert_eq!(service.call_counts().total(), 0);
}

// ── In-flight asynchronous calls ──────────────────────────────────────────────

#[tokio::test]
async fn test_in_flight_call_survives_disconnect() {
    // Arrange
    let (binder, service, connection) = bound(DeliveryMode::Manual).await;
    service.seed("com.example", domains(&["late.com"]));
    let mut call = task::spawn(connection.get_selected_domains_async("com.example"));
    assert_pending!(call.poll());
    assert_eq!(service.pending_count(), 1);

    // Act – the binding goes away before the service answers.
    binder.kill_service(&component());
    connection.disconnect();
    assert_eq!(service.deliver_pending(), 1);

    // Assert
    assert!(call.is_woken());
    assert_ready_eq!(call.poll(), Ok(domains(&["late.com"])));
}

#[tokio::test]
async fn test_concurrent_calls_resolve_independently() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Manual).await;
    service.seed("a", domains(&["a.com"]));
    service.seed("b", domains(&["b.com"]));
    let mut call_a = task::spawn(connection.get_selected_domains_async("a"));
    let mut call_b = task::spawn(connection.get_selected_domains_async("b"));
    assert_pending!(call_a.poll());
    assert_pending!(call_b.poll());

    // Act
    service.deliver_pending_for("b");

    // Assert
    assert_ready_eq!(call_b.poll(), Ok(domains(&["b.com"])));
    assert!(!call_a.is_woken());
    assert_pending!(call_a.poll());

    service.deliver_pending_for("a");
    assert_ready_eq!(call_a.poll(), Ok(domains(&["a.com"])));
}

#[tokio::test]
async fn test_second_delivery_is_rejected_and_first_result_wins() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Manual).await;
    let mut call = task::spawn(connection.get_selected_domains_async("com.example"));
    assert_pending!(call.poll());
    let (_, callback) = service.take_pending().pop().expect("one parked callback");

    // Act
    let first = callback.on_selected_domains_retrieved(domains(&["first.com"]));
    let second = callback.on_selected_domains_retrieved(domains(&["second.com"]));

    // Assert
    assert_eq!(first, Ok(()));
    assert_eq!(
        second,
        Err(CallbackError::AlreadyResolved {
            callback_id: callback.id()
        })
    );
    assert_ready_eq!(call.poll(), Ok(domains(&["first.com"])));
}

#[tokio::test]
async fn test_dropped_callback_is_a_protocol_violation() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Manual).await;
    let mut call = task::spawn(connection.get_selected_domains_async("com.example"));
    assert_pending!(call.poll());

    // Act – the service loses the callback without answering.
    let parked = service.take_pending();
    let callback_id = parked[0].1.id();
    drop(parked);

    // Assert
    assert_ready_eq!(
        call.poll(),
        Err(ConnectionError::ProtocolViolation(CallbackError::Abandoned {
            callback_id
        }))
    );
}

#[tokio::test]
async fn test_cancelled_call_discards_late_delivery() {
    let (_binder, service, connection) = bound(DeliveryMode::Manual).await;
    let mut call = task::spawn(connection.get_selected_domains_async("com.example"));
    assert_pending!(call.poll());

    drop(call);

    // Delivery to a caller that stopped waiting is accepted and discarded.
    assert_eq!(service.deliver_pending(), 1);
    assert!(connection.is_bound());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_tasks_share_one_connection() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Immediate).await;
    for i in 0..16 {
        let domain = format!("d{i}.com");
        service.seed(format!("pkg{i}"), domains(&[domain.as_str()]));
    }

    // Act
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                let package = format!("pkg{i}");
                connection.get_selected_domains_async(&package).await
            })
        })
        .collect();

    // Assert
    for (i, handle) in handles.into_iter().enumerate() {
        let expected = format!("d{i}.com");
        let result = handle.await.expect("task panicked");
        assert_eq!(result, Ok(domains(&[expected.as_str()])));
    }
    assert_eq!(service.call_counts().get_async, 16);
}

#[tokio::test]
async fn test_async_lookup_is_sent_when_called_not_when_awaited() {
    // Arrange
    let (_binder, service, connection) = bound(DeliveryMode::Manual).await;
    service.seed("com.example", domains(&["a.com"]));

    // Act – not polled yet
    let call = connection.get_selected_domains_async("com.example");

    // Assert
    assert_eq!(service.pending_count(), 1);
    service.deliver_pending();
    assert_eq!(call.await, Ok(domains(&["a.com"])));
}

#[tokio::test]
async fn test_async_lookup_made_while_unbound_fails_after_rebind() {
    // Arrange – the service died, so the call is made while unbound
    let (binder, service, connection) = bound(DeliveryMode::Immediate).await;
    binder.kill_service(&component());
    let call = connection.get_selected_domains_async("com.example");

    // Act – the service comes back before the caller awaits
    binder.register_service(component(), service.clone());
    assert!(connection.is_bound());

    // Assert
    assert_eq!(call.await, Err(ConnectionError::NotConnected));
    assert_eq!(service.call_counts().get_async, 0);
}

// ── Calls racing binding changes ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_calls_racing_binding_changes_succeed_or_fail_not_connected() {
    // Arrange
    let (binder, service, connection) = bound(DeliveryMode::Immediate).await;
    service.seed("com.example", domains(&["a.com"]));

    // Act – one task keeps dropping and restoring the binding, alternating
    // between service death and a caller-side disconnect.
    let toggler = {
        let binder = binder.clone();
        let service = Arc::clone(&service);
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            for round in 0..100 {
                if round % 2 == 0 {
                    binder.kill_service(&component());
                    tokio::task::yield_now().await;
                    binder.register_service(component(), service.clone());
                } else {
                    connection.disconnect();
                    tokio::task::yield_now().await;
                    binder
                        .bind_service(&component(), connection.clone())
                        .expect("rebind accepted");
                    connection.wait_until_bound().await.expect("rebound");
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let callers: Vec<_> = (0..4)
        .map(|worker| {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                let mut outcomes = Vec::new();
                for i in 0..200 {
                    let selection = format!("w{worker}-{i}.com");
                    outcomes.push(connection.get_selected_domains("com.example").map(|_| ()));
                    outcomes.push(connection.select_domains(
                        "com.example",
                        &domains(&[selection.as_str()]),
                        &receiver(),
                    ));
                    outcomes.push(
                        connection
                            .get_selected_domains_async("com.example")
                            .await
                            .map(|_| ()),
                    );
                    tokio::task::yield_now().await;
                }
                outcomes
            })
        })
        .collect();

    // Assert – no panics, and every call either ran or reported NotConnected
    toggler.await.expect("toggler panicked");
    for caller in callers {
        for outcome in caller.await.expect("caller panicked") {
            assert!(
                matches!(outcome, Ok(()) | Err(ConnectionError::NotConnected)),
                "unexpected outcome {outcome:?}"
            );
        }
    }
    // The last round rebinds through bind_service.
    assert!(connection.is_bound());
    assert_eq!(binder.binding_count(&component()), 1);
}
