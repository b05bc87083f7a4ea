// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use furiko_core::id::SequentialIdGen;

#[derive(Debug, Clone, PartialEq)]
struct Doc {
    metadata: ObjectMeta,
    payload: String,
}

impl Doc {
    fn new(name: &str) -> Self {
        Self {
            metadata: ObjectMeta::new("test", name),
            payload: String::new(),
        }
    }

    fn with_payload(mut self, payload: &str) -> Self {
        self.payload = payload.to_string();
        self
    }
}

impl StoreObject for Doc {
    const KIND: &'static str = "Doc";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

fn make_store() -> (ObjectStore<Doc, FakeClock, SequentialIdGen>, FakeClock) {
    let clock = FakeClock::at("2021-02-09T04:06:00Z");
    let store = ObjectStore::with_id_gen(clock.clone(), SequentialIdGen::new("doc"));
    (store, clock)
}

fn drain<T>(rx: &mut tokio::sync::mpsc::UnboundedReceiver<StoreEvent<T>>) -> Vec<StoreEvent<T>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn create_stamps_identity() {
    let (store, clock) = make_store();
    let created = store.create(Doc::new("a")).unwrap();

    assert_eq!(created.metadata.uid, "doc-1");
    assert_eq!(created.metadata.resource_version, 1);
    assert_eq!(created.metadata.creation_timestamp, clock.now());
    assert_eq!(store.get("test/a").unwrap(), created);
}

#[test]
fn create_duplicate_name_rejected() {
    let (store, _) = make_store();
    store.create(Doc::new("a")).unwrap();
    let err = store.create(Doc::new("a")).unwrap_err();
    assert!(err.is_already_exists());
}

#[test]
fn list_is_sorted_by_key() {
    let (store, _) = make_store();
    store.create(Doc::new("b")).unwrap();
    store.create(Doc::new("a")).unwrap();
    let names: Vec<String> = store.list().iter().map(|d| d.metadata.name.clone()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn update_bumps_version() {
    let (store, _) = make_store();
    let created = store.create(Doc::new("a")).unwrap();
    let updated = store.update(created.clone().with_payload("v2")).unwrap();
    assert_eq!(updated.metadata.resource_version, 2);
    assert_eq!(store.get("test/a").unwrap().payload, "v2");
}

#[test]
fn update_stale_version_conflicts() {
    let (store, _) = make_store();
    let created = store.create(Doc::new("a")).unwrap();
    store.update(created.clone().with_payload("v2")).unwrap();

    // A writer still holding the original version loses.
    let err = store.update(created.with_payload("v2-conflict")).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(store.get("test/a").unwrap().payload, "v2");
}

#[test]
fn update_missing_object_not_found() {
    let (store, _) = make_store();
    assert!(store.update(Doc::new("ghost")).unwrap_err().is_not_found());
}

#[test]
fn update_cannot_clear_deletion_timestamp() {
    let (store, _) = make_store();
    let mut doc = Doc::new("a");
    doc.metadata.add_finalizer("keep");
    store.create(doc).unwrap();

    let deleting = store.delete("test/a").unwrap();
    assert!(deleting.metadata.is_deleting());

    let mut tampered = deleting.clone();
    tampered.metadata.deletion_timestamp = None;
    let updated = store.update(tampered).unwrap();
    assert!(updated.metadata.is_deleting());
}

#[test]
fn delete_without_finalizers_removes() {
    let (store, _) = make_store();
    store.create(Doc::new("a")).unwrap();
    store.delete("test/a").unwrap();
    assert!(store.get("test/a").is_none());
}

#[test]
fn delete_with_finalizer_stamps_timestamp() {
    let (store, clock) = make_store();
    let mut doc = Doc::new("a");
    doc.metadata.add_finalizer("cleanup");
    store.create(doc).unwrap();

    let deleting = store.delete("test/a").unwrap();
    assert_eq!(deleting.metadata.deletion_timestamp, Some(clock.now()));
    assert!(store.get("test/a").is_some());

    // Deleting again is a no-op.
    let again = store.delete("test/a").unwrap();
    assert_eq!(again.metadata.resource_version, deleting.metadata.resource_version);
}

#[test]
fn removing_last_finalizer_completes_deletion() {
    let (store, _) = make_store();
    let mut doc = Doc::new("a");
    doc.metadata.add_finalizer("cleanup");
    store.create(doc).unwrap();

    let mut deleting = store.delete("test/a").unwrap();
    deleting.metadata.remove_finalizer("cleanup");
    store.update(deleting).unwrap();

    assert!(store.get("test/a").is_none());
}

#[test]
fn force_delete_bypasses_finalizers() {
    let (store, _) = make_store();
    let mut doc = Doc::new("a");
    doc.metadata.add_finalizer("cleanup");
    store.create(doc).unwrap();

    store.force_delete("test/a").unwrap();
    assert!(store.get("test/a").is_none());
}

#[test]
fn watch_observes_events_in_apply_order() {
    let (store, _) = make_store();
    let mut rx = store.watch();

    let created = store.create(Doc::new("a")).unwrap();
    store.update(created.with_payload("v2")).unwrap();
    store.delete("test/a").unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], StoreEvent::Added(d) if d.metadata.name == "a"));
    assert!(matches!(&events[1], StoreEvent::Updated { new, .. } if new.payload == "v2"));
    assert!(matches!(&events[2], StoreEvent::Deleted(_)));
}

#[test]
fn watch_with_initial_replays_existing() {
    let (store, _) = make_store();
    store.create(Doc::new("b")).unwrap();
    store.create(Doc::new("a")).unwrap();

    let mut rx = store.watch_with_initial();
    store.create(Doc::new("c")).unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], StoreEvent::Added(d) if d.metadata.name == "a"));
    assert!(matches!(&events[1], StoreEvent::Added(d) if d.metadata.name == "b"));
    assert!(matches!(&events[2], StoreEvent::Added(d) if d.metadata.name == "c"));
}

#[test]
fn finalizer_removal_emits_update_then_delete() {
    let (store, _) = make_store();
    let mut doc = Doc::new("a");
    doc.metadata.add_finalizer("cleanup");
    store.create(doc).unwrap();
    let mut deleting = store.delete("test/a").unwrap();

    let mut rx = store.watch();
    deleting.metadata.remove_finalizer("cleanup");
    store.update(deleting).unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], StoreEvent::Updated { .. }));
    assert!(matches!(&events[1], StoreEvent::Deleted(_)));
}

#[test]
fn dropped_subscriber_is_pruned() {
    let (store, _) = make_store();
    let rx = store.watch();
    drop(rx);
    // The next emit notices the closed channel and prunes it.
    store.create(Doc::new("a")).unwrap();
    store.create(Doc::new("b")).unwrap();
}
