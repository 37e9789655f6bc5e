//! End-to-end scenarios across the store, handlers and binding

use std::sync::Arc;

use parking_lot::Mutex;

use verstore_core::{Contents, Read, Snapshot, StoreError, StoreState};
use verstore_state::{create_store, Store, StoreBinding, StoreConfig};

use crate::{gated_setter, init_test_logging, SnapshotRecorder};

fn counter() -> Store<i32, String> {
    create_store(StoreConfig::new(0).with_label("counter"))
}

#[test]
fn test_stores_initial_value() {
    let store = counter();

    assert_eq!(store.state(), StoreState::HasValue);
    assert_eq!(store.get_value().ready(), Some(0));
    assert_eq!(store.value_maybe(), Some(0));
}

#[test]
fn test_setters_and_updaters() {
    let store = counter();
    let set_to_three = store.create_setter(|| 3);
    let set_to = store.create_setter_with(|n: i32| n);
    let increase = store.create_updater(|c: &i32| c + 1);
    let increase_by = store.create_updater_with(|c: &i32, n: i32| c + n);

    set_to_three.invoke().unwrap();
    assert_eq!(store.value_maybe(), Some(3));

    set_to.call(12).unwrap();
    assert_eq!(store.value_maybe(), Some(12));

    increase.invoke().unwrap();
    increase_by.call(10).unwrap();
    assert_eq!(store.value_maybe(), Some(23));
    assert_eq!(store.revision(), 4);
}

#[tokio::test]
async fn test_async_setter_resolves() {
    init_test_logging();
    let store = counter();
    let (set_later, gates) = gated_setter(&store);

    let finished = set_later.invoke().unwrap();
    assert_eq!(store.state(), StoreState::Loading);
    let store_changed = match store.get_value() {
        Read::Pending(pending) => pending,
        other => panic!("expected pending read, got {:?}", other),
    };
    assert!(store_changed.same_as(&finished));

    gates.next().unwrap().resolve(5).unwrap();
    assert_eq!(finished.await, Ok(5));
    assert_eq!(store_changed.await, Ok(5));

    assert_eq!(store.state(), StoreState::HasValue);
    assert_eq!(store.get_value().ready(), Some(5));
}

#[tokio::test]
async fn test_async_setter_rejects() {
    let store = counter();
    let (set_later, gates) = gated_setter(&store);

    let finished = set_later.invoke().unwrap();
    gates.next().unwrap().reject("whoops".to_string()).unwrap();

    let err = finished.await.unwrap_err();
    assert_eq!(err.into_upstream().as_deref(), Some("whoops"));
    assert_eq!(store.state(), StoreState::HasError);
    assert_eq!(store.error_maybe().as_deref(), Some("whoops"));
}

#[tokio::test]
async fn test_race_newer_resolves_first() {
    let store: Store<String, String> = Store::with_initial("initial".to_string());
    let (set_later, gates) = gated_setter(&store);

    let to_cancel = set_later.invoke().unwrap();
    let winner = set_later.invoke().unwrap();
    let stale = gates.next().unwrap();

    gates.next().unwrap().resolve("override".to_string()).unwrap();
    assert_eq!(winner.await, Ok("override".to_string()));

    stale.resolve("toBeCanceled".to_string()).unwrap();
    assert_eq!(to_cancel.await, Err(StoreError::Canceled));
    assert_eq!(store.value_maybe().as_deref(), Some("override"));
}

#[tokio::test]
async fn test_race_newer_resolves_last() {
    let store: Store<String, String> = Store::with_initial("initial".to_string());
    let (set_later, gates) = gated_setter(&store);

    let to_cancel = set_later.invoke().unwrap();
    let winner = set_later.invoke().unwrap();

    gates.next().unwrap().resolve("toBeCanceled".to_string()).unwrap();
    assert_eq!(to_cancel.await, Err(StoreError::Canceled));
    assert_eq!(store.state(), StoreState::Loading);

    gates.next().unwrap().resolve("override".to_string()).unwrap();
    assert_eq!(winner.await, Ok("override".to_string()));
    assert_eq!(store.value_maybe().as_deref(), Some("override"));
}

#[tokio::test]
async fn test_updater_rejected_while_loading() {
    let store = counter();
    let (set_later, gates) = gated_setter(&store);
    let increase = store.create_updater(|c: &i32| c + 1);

    let pending = set_later.invoke().unwrap();

    let err = increase.invoke().unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
    assert_eq!(store.revision(), 1);

    gates.next().unwrap().resolve(1).unwrap();
    assert_eq!(pending.await, Ok(1));
    increase.invoke().unwrap();
    assert_eq!(store.value_maybe(), Some(2));
}

#[tokio::test]
async fn test_subscriber_sees_every_transition() {
    let store = counter();
    let (set_later, gates) = gated_setter(&store);
    let set_to = store.create_setter_with(|n: i32| n);
    let recorder = SnapshotRecorder::attach(&store);

    set_to.call(1).unwrap();
    let pending = set_later.invoke().unwrap();
    gates.next().unwrap().resolve(2).unwrap();
    pending.await.unwrap();

    assert_eq!(
        recorder.snapshots(),
        vec![
            Snapshot::HasValue(1),
            Snapshot::Loading,
            Snapshot::HasValue(2)
        ]
    );
}

#[tokio::test]
async fn test_unsubscribe_mid_sequence() {
    let store = counter();
    let (set_later, gates) = gated_setter(&store);
    let set_to = store.create_setter_with(|n: i32| n);
    let recorder = SnapshotRecorder::attach(&store);

    set_to.call(1).unwrap();
    let pending = set_later.invoke().unwrap();
    assert!(recorder.detach());
    gates.next().unwrap().resolve(2).unwrap();
    pending.await.unwrap();

    assert_eq!(recorder.len(), 2);
    assert_eq!(recorder.states(), vec![StoreState::HasValue, StoreState::Loading]);
    assert_eq!(store.value_maybe(), Some(2));
}

#[tokio::test]
async fn test_async_updater_chain() {
    let store = counter();
    let double_later = store.create_updater(|c: &i32| {
        let next = c * 2;
        Contents::deferred(async move { Ok::<_, String>(next) })
    });
    let increase = store.create_updater(|c: &i32| c + 1);

    increase.invoke().unwrap();
    double_later.invoke().unwrap().await.unwrap();
    double_later.invoke().unwrap().await.unwrap();

    assert_eq!(store.value_maybe(), Some(4));
    assert_eq!(store.revision(), 3);
}

#[tokio::test]
async fn test_binding_follows_writes() {
    let store = counter();
    let (set_later, gates) = gated_setter(&store);
    let mut binding = StoreBinding::new(&store);

    let pending = set_later.invoke().unwrap();
    assert!(binding.changed().await);
    assert_eq!(binding.state(), StoreState::Loading);

    gates.next().unwrap().resolve(8).unwrap();
    pending.await.unwrap();
    assert!(binding.changed().await);
    assert_eq!(binding.current().ready(), Some(8));

    drop(binding);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_error_recovers_by_set() {
    let store = counter();
    let (set_later, gates) = gated_setter(&store);
    let seen: Arc<Mutex<Vec<StoreState>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = store.subscribe(move |loadable| sink.lock().push(loadable.state()));

    let failed = set_later.invoke().unwrap();
    gates.next().unwrap().reject("offline".to_string()).unwrap();
    assert!(failed.await.is_err());

    store.set(3);

    assert_eq!(
        *seen.lock(),
        vec![StoreState::Loading, StoreState::HasError, StoreState::HasValue]
    );
    assert_eq!(store.value_maybe(), Some(3));
}
