use super::*;
use kubert::index::IndexNamespacedResource;
use tokio_test::{assert_pending, assert_ready_eq, task};

#[test]
fn subscribe_returns_notifier_for_unobserved() {
    let mut test = TestConfig::default();

    let rsp = test
        .index
        .read()
        .get(&Request::new("ns-0", "sa-0").with_notification());
    assert!(!rsp.found_in_cache);
    let notifier = rsp.notifier.expect("unobserved service account must subscribe");
    assert!(!notifier.is_fired());
    assert_eq!(test.index.read().pending_notifications(), 1);

    // The first subscription requests a refresh.
    let refresh = test.refresh_rx.try_recv().expect("refresh must be requested");
    assert_eq!(refresh, Request::new("ns-0", "sa-0"));
}

#[test]
fn no_notifier_without_opt_in() {
    let mut test = TestConfig::default();

    let rsp = test.index.read().get(&Request::new("ns-0", "sa-0"));
    assert!(rsp.notifier.is_none());
    assert_eq!(test.index.read().pending_notifications(), 0);
    assert!(test.refresh_rx.try_recv().is_err());
}

#[test]
fn concurrent_subscribers_share_signal() {
    let mut test = TestConfig::default();

    let req = Request::new("ns-0", "sa-0").with_notification();
    let first = test.index.read().get(&req).notifier.unwrap();
    let second = test.index.read().get(&req).notifier.unwrap();
    assert!(first.same_signal(&second));
    assert_eq!(test.index.read().pending_notifications(), 1);

    // Only one refresh is requested for the key.
    assert!(test.refresh_rx.try_recv().is_ok());
    assert!(test.refresh_rx.try_recv().is_err());

    let mut a = task::spawn(first.fired());
    let mut b = task::spawn(second.fired());
    assert_pending!(a.poll());
    assert_pending!(b.poll());

    test.index.write().apply(mk_service_account(
        "ns-0",
        "sa-0",
        [(ROLE_ARN, "arn:aws:iam::111122223333:role/r1")],
    ));

    assert!(a.is_woken());
    assert!(b.is_woken());
    assert_ready_eq!(a.poll(), true);
    assert_ready_eq!(b.poll(), true);
    assert_eq!(test.index.read().pending_notifications(), 0);
}

#[test]
fn released_waiter_observes_entry() {
    let test = TestConfig::default();

    let req = Request::new("ns-0", "sa-0").with_notification();
    let notifier = test.index.read().get(&req).notifier.unwrap();

    test.index.write().apply(mk_service_account(
        "ns-0",
        "sa-0",
        [(ROLE_ARN, "arn:aws:iam::111122223333:role/r1")],
    ));
    assert!(notifier.is_fired());

    let rsp = test.index.read().get(&req);
    assert!(rsp.found_in_cache);
    assert!(rsp.notifier.is_none());
    assert_eq!(rsp.role_arn, "arn:aws:iam::111122223333:role/r1");
}

#[test]
fn observing_without_role_releases_waiters() {
    let test = TestConfig::default();

    let notifier = test
        .index
        .read()
        .get(&Request::new("ns-0", "sa-0").with_notification())
        .notifier
        .unwrap();

    test.index
        .write()
        .apply(mk_service_account("ns-0", "sa-0", None));
    assert!(notifier.is_fired());
    assert_eq!(test.index.read().pending_notifications(), 0);
}

#[test]
fn writes_for_other_keys_do_not_release() {
    let test = TestConfig::default();

    let notifier = test
        .index
        .read()
        .get(&Request::new("ns-0", "sa-0").with_notification())
        .notifier
        .unwrap();

    test.index.write().apply(mk_service_account(
        "ns-1",
        "sa-0",
        [(ROLE_ARN, "arn:aws:iam::111122223333:role/r1")],
    ));
    test.index.write().apply(mk_config_map(
        WEBHOOK_CM,
        r#"{"ns-0/sa-0": {"RoleARN": "arn:aws:iam::111122223333:role/r1"}}"#,
    ));
    assert!(!notifier.is_fired());
    assert_eq!(test.index.read().pending_notifications(), 1);
}

#[test]
fn new_window_after_release() {
    let mut test = TestConfig::default();

    let req = Request::new("ns-0", "sa-0").with_notification();
    let first = test.index.read().get(&req).notifier.unwrap();
    test.index.write().apply(mk_service_account(
        "ns-0",
        "sa-0",
        [(ROLE_ARN, "arn:aws:iam::111122223333:role/r1")],
    ));
    <Index as IndexNamespacedResource<ServiceAccount>>::delete(
        &mut test.index.write(),
        "ns-0".to_string(),
        "sa-0".to_string(),
    );

    let second = test.index.read().get(&req).notifier.unwrap();
    assert!(first.is_fired());
    assert!(!second.is_fired());
    assert!(!first.same_signal(&second));

    assert!(test.refresh_rx.try_recv().is_ok());
    assert!(test.refresh_rx.try_recv().is_ok());
}

#[test]
fn delete_leaves_pending_waiters() {
    let test = TestConfig::default();

    let notifier = test
        .index
        .read()
        .get(&Request::new("ns-0", "sa-0").with_notification())
        .notifier
        .unwrap();
    <Index as IndexNamespacedResource<ServiceAccount>>::delete(
        &mut test.index.write(),
        "ns-0".to_string(),
        "sa-0".to_string(),
    );

    assert!(!notifier.is_fired());
    assert_eq!(test.index.read().pending_notifications(), 1);
}

#[test]
fn full_refresh_queue_still_subscribes() {
    let _tracing = TestConfig::init_tracing();
    let (refresh_tx, mut refresh_rx) = mpsc::channel(1);
    let index = Index::shared(CacheConfig::default(), None, Some(refresh_tx));

    let a = index
        .read()
        .get(&Request::new("ns-0", "sa-0").with_notification());
    let b = index
        .read()
        .get(&Request::new("ns-0", "sa-1").with_notification());
    assert!(a.notifier.is_some());
    assert!(b.notifier.is_some());
    assert_eq!(index.read().pending_notifications(), 2);

    assert_eq!(refresh_rx.try_recv().unwrap(), Request::new("ns-0", "sa-0"));
    assert!(refresh_rx.try_recv().is_err());
}

#[test]
fn subscribe_without_refresh_channel() {
    let _tracing = TestConfig::init_tracing();
    let index = Index::shared(CacheConfig::default(), None, None);

    let rsp = index
        .read()
        .get(&Request::new("ns-0", "sa-0").with_notification());
    assert!(rsp.notifier.is_some());
}

#[test]
fn concurrent_readers_and_writers() {
    let test = TestConfig::default();

    let readers = (0..4)
        .map(|i| {
            let index = test.index.clone();
            std::thread::spawn(move || {
                (0..100)
                    .filter_map(|n| {
                        let req = Request::new("ns-0", format!("sa-{}", (n + i) % 10))
                            .with_notification();
                        index.read().get(&req).notifier
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let writer = {
        let index = test.index.clone();
        std::thread::spawn(move || {
            for n in 0..10 {
                index.write().apply(mk_service_account(
                    "ns-0",
                    format!("sa-{n}"),
                    [(ROLE_ARN, "arn:aws:iam::111122223333:role/r1")],
                ));
            }
        })
    };

    writer.join().expect("writer must not panic");
    let notifiers = readers
        .into_iter()
        .flat_map(|r| r.join().expect("reader must not panic"))
        .collect::<Vec<_>>();

    // Every service account was written, so every waiter has been released.
    assert!(notifiers.iter().all(|n| n.is_fired()));
    assert_eq!(test.index.read().pending_notifications(), 0);
}
