//! Integration tests for the one-shot callback channel.
//!
//! These tests exercise [`SelectedDomainsCallback`] and [`PendingDomains`]
//! the way a remote service and a waiting caller use them:
//!
//! - The caller's future stays pending until the remote side delivers.
//! - Delivery may happen on another OS thread.
//! - Many channels can be outstanding at once and resolve independently.
//! - A misbehaving remote that delivers twice cannot crash the caller or
//!   change the result it already received.

use std::thread;
use std::time::Duration;

use interconnect_core::{CallbackError, DomainList, SelectedDomainsCallback};
use tokio_test::{assert_pending, assert_ready_eq, task};

fn domains(items: &[&str]) -> DomainList {
    items.iter().copied().collect()
}

/// The pending half does not resolve until a delivery happens, and wakes the
/// waiting task when it does.
#[test]
fn test_pending_stays_suspended_until_delivery() {
    // Arrange
    let (callback, pending) = SelectedDomainsCallback::channel();
    let mut waiter = task::spawn(pending);

    // Act / Assert – nothing delivered yet
    assert_pending!(waiter.poll());

    callback
        .on_selected_domains_retrieved(domains(&["x.com"]))
        .unwrap();

    // Assert – the delivery woke the task and the result is ready
    assert!(waiter.is_woken());
    assert_ready_eq!(waiter.poll(), Ok(domains(&["x.com"])));
}

/// The remote side may resolve the channel from a thread it owns.
#[tokio::test]
async fn test_delivery_from_foreign_thread() {
    let (callback, pending) = SelectedDomainsCallback::channel();

    let remote = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        callback.on_selected_domains_retrieved(domains(&["a.com", "b.com"]))
    });

    assert_eq!(pending.await, Ok(domains(&["a.com", "b.com"])));
    assert_eq!(remote.join().unwrap(), Ok(()));
}

/// Two outstanding channels resolve independently, in whatever order the
/// remote side chooses.
#[test]
fn test_outstanding_channels_are_independent() {
    // Arrange
    let (first_cb, first_pending) = SelectedDomainsCallback::channel();
    let (second_cb, second_pending) = SelectedDomainsCallback::channel();
    let mut first = task::spawn(first_pending);
    let mut second = task::spawn(second_pending);
    assert_pending!(first.poll());
    assert_pending!(second.poll());

    // Act – resolve only the second one
    second_cb
        .on_selected_domains_retrieved(domains(&["second.com"]))
        .unwrap();

    // Assert – the first is untouched
    assert!(!first.is_woken());
    assert_pending!(first.poll());
    assert_ready_eq!(second.poll(), Ok(domains(&["second.com"])));

    // Now resolve the first one
    first_cb
        .on_selected_domains_retrieved(domains(&["first.com"]))
        .unwrap();
    assert_ready_eq!(first.poll(), Ok(domains(&["first.com"])));
}

/// Racing deliveries from several threads: exactly one succeeds and the
/// caller receives that one.
#[tokio::test]
async fn test_concurrent_deliveries_exactly_one_wins() {
    let (callback, pending) = SelectedDomainsCallback::channel();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cb = callback.clone();
            thread::spawn(move || {
                let domain = format!("{i}.com");
                cb.on_selected_domains_retrieved(domains(&[domain.as_str()]))
            })
        })
        .collect();
    drop(callback);

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let violations = results
        .iter()
        .filter(|r| matches!(r, Err(CallbackError::AlreadyResolved { .. })))
        .count();

    assert_eq!(successes, 1, "exactly one delivery must win");
    assert_eq!(violations, 7, "every other delivery is a protocol violation");

    let delivered = pending.await.unwrap();
    assert_eq!(delivered.len(), 1);
}
