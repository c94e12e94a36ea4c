use super::*;
use crate::{
    error::{ErrorClass, TransactionReason},
    store::ArrayStore,
};
use jcmem_primitives::{ElementKind, PersistenceClass};

fn manager(capacity: u32) -> TransactionManager {
    TransactionManager::new(&CardConfig {
        commit_capacity: capacity,
        commit_entry_overhead: 4,
        ..CardConfig::default()
    })
}

#[test]
fn begin_twice_is_rejected_without_state_change() {
    let mut txn = manager(64);
    txn.begin().expect("first begin should succeed");

    let err = txn.begin().expect_err("nested begin should fail");

    assert_eq!(err.class, ErrorClass::Transaction);
    assert_eq!(err.reason_code(), TransactionReason::InProgress as u16);
    assert_eq!(txn.state(), TxnState::Explicit);
    assert_eq!(txn.depth(), 1);
}

#[test]
fn commit_and_abort_require_an_open_transaction() {
    let mut txn = manager(64);

    let err = txn.commit().expect_err("commit while idle should fail");
    assert_eq!(err.reason_code(), TransactionReason::NotInProgress as u16);

    let err = txn.abort().expect_err("abort while idle should fail");
    assert_eq!(err.reason_code(), TransactionReason::NotInProgress as u16);
    assert_eq!(txn.depth(), 0);
}

#[test]
fn log_charges_overhead_per_entry_and_commit_releases_it() {
    let mut txn = manager(64);
    txn.begin().expect("begin should succeed");

    let cost = txn
        .log_before_image(ArrayRef::NULL, 0, vec![0; 10])
        .expect("entry should fit");

    assert_eq!(cost, 14);
    assert_eq!(txn.unused_capacity(), 50);

    let summary = txn.commit().expect("commit should succeed");
    assert_eq!(summary, CommitSummary { entries: 1, bytes: 14 });
    assert_eq!(txn.unused_capacity(), 64);
    assert!(txn.is_idle());
}

#[test]
fn rejected_entry_leaves_the_log_untouched() {
    let mut txn = manager(32);
    txn.begin().expect("begin should succeed");
    txn.log_before_image(ArrayRef::NULL, 0, vec![1; 20])
        .expect("first entry should fit");

    let err = txn
        .log_before_image(ArrayRef::NULL, 20, vec![2; 5])
        .expect_err("second entry should overflow");

    assert!(err.is_buffer_full());
    assert_eq!(txn.log().len(), 1);
    assert_eq!(txn.unused_capacity(), 8);
}

#[test]
fn abort_returns_entries_in_log_order() {
    let mut txn = manager(64);
    txn.begin().expect("begin should succeed");
    txn.log_before_image(ArrayRef::NULL, 0, vec![1])
        .expect("entry should fit");
    txn.log_before_image(ArrayRef::NULL, 1, vec![2])
        .expect("entry should fit");

    let entries = txn.abort().expect("abort should succeed");

    let offsets: Vec<usize> = entries.iter().map(|entry| entry.offset).collect();
    assert_eq!(offsets, vec![0, 1]);
    assert!(txn.is_idle());
    assert_eq!(txn.unused_capacity(), 64);
}

#[test]
fn rollback_restores_overlapping_before_images_newest_first() {
    let mut store = ArrayStore::new(&CardConfig::default());
    let array = store
        .allocate(ElementKind::Byte, 3, PersistenceClass::Persistent, false)
        .expect("allocation should succeed");
    store.write(array, 0, &[1, 2, 3]).expect("seed write should succeed");

    // Phase 1: two overlapping writes, each preceded by its before-image.
    let first = UndoEntry {
        array,
        offset: 0,
        before: vec![1, 2],
    };
    store.write(array, 0, &[8, 8]).expect("write should succeed");
    let second = UndoEntry {
        array,
        offset: 1,
        before: vec![8, 3],
    };
    store.write(array, 1, &[9, 9]).expect("write should succeed");

    // Phase 2: reverse rollback lands on the original bytes.
    rollback_reverse(&mut store, vec![first, second]).expect("rollback should succeed");

    assert_eq!(store.read(array, 0, 3).expect("read"), vec![1, 2, 3]);
}
