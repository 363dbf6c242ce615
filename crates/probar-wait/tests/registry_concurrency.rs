//! Registry behavior under concurrent access.

use probar_wait::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_first_access_shares_one_store() {
    let registry = Arc::new(SessionRegistry::default());
    let session: Arc<dyn Session> = Arc::new(MockSession::new());
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let session = Arc::clone(&session);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create(&session).unwrap()
            })
        })
        .collect();

    let managers: Vec<Arc<WaitManager>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = &managers[0];
    assert!(managers
        .iter()
        .all(|m| Arc::ptr_eq(m, first) && Arc::ptr_eq(m.metrics(), first.metrics())));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_sessions_are_isolated() {
    let registry = SessionRegistry::default();
    let a = Arc::new(MockSession::new());
    let b = Arc::new(MockSession::new());
    a.set_element("#x", MockElement::new("div"));
    let a: Arc<dyn Session> = a;
    let b: Arc<dyn Session> = b;

    let manager_a = registry.get_or_create(&a).unwrap();
    let manager_b = registry.get_or_create(&b).unwrap();
    manager_a.wait_for("#x").unwrap().to_be_visible().unwrap();
    let _ = manager_b
        .wait_for("#x")
        .unwrap()
        .ignoring([ErrorKind::NoSuchElement])
        .with_timeout(Duration::ZERO)
        .to_be_visible();

    assert_eq!(manager_a.metrics().total_successful(), 1);
    assert_eq!(manager_a.metrics().total_failed(), 0);
    assert_eq!(manager_b.metrics().total_successful(), 0);
    assert_eq!(manager_b.metrics().total_failed(), 1);
}

#[test]
fn test_concurrent_waits_on_one_session() {
    let registry = Arc::new(SessionRegistry::default());
    let session = Arc::new(MockSession::new());
    session.set_element("#ok", MockElement::new("button"));
    let session: Arc<dyn Session> = session;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let manager = registry.get_or_create(&session).unwrap();
                for _ in 0..25 {
                    manager.wait_for("#ok").unwrap().to_be_clickable().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let manager = registry.get(session.id()).unwrap();
    let stats = manager.metrics().stats_for("element to be clickable");
    assert_eq!(stats.successes, 200);
    assert_eq!(manager.metrics().total_attempted(), 200);
    assert_eq!(manager.metrics().history().len(), 200);
}

#[test]
fn test_teardown_then_recreate() {
    let registry = SessionRegistry::default();
    let session: Arc<dyn Session> = Arc::new(MockSession::new());
    let manager = registry.get_or_create(&session).unwrap();
    manager
        .wait()
        .with_timeout(Duration::ZERO)
        .until_fn("ready", |_| Ok(true))
        .unwrap();

    let reports = registry.summary_reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].1.contains("Total waits attempted: 1"));

    registry.remove(session.id());
    assert!(registry.is_empty());
    let recreated = registry.get_or_create(&session).unwrap();
    assert_eq!(recreated.metrics().total_attempted(), 0);
}
