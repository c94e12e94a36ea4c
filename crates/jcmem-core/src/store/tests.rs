use super::*;
use crate::error::ErrorClass;

fn store() -> ArrayStore {
    ArrayStore::new(&CardConfig::default())
}

#[test]
fn allocation_zero_fills_and_charges_payload_bytes() {
    let mut store = store();
    let before = store.pool(PersistenceClass::Persistent).available();

    let array = store
        .allocate(ElementKind::Int, 3, PersistenceClass::Persistent, false)
        .expect("allocation should succeed");

    assert!(!array.is_null());
    assert_eq!(store.read(array, 0, 12).expect("read should succeed"), vec![0; 12]);
    assert_eq!(
        store.pool(PersistenceClass::Persistent).available(),
        before - 12
    );
}

#[test]
fn allocation_rejects_lengths_beyond_short_range() {
    let mut store = store();

    let err = store
        .allocate(
            ElementKind::Byte,
            MAX_ARRAY_LENGTH + 1,
            PersistenceClass::Persistent,
            false,
        )
        .expect_err("oversized array should be rejected");

    assert_eq!(err.class, ErrorClass::System);
    assert_eq!(err.reason_code(), SystemReason::IllegalValue as u16);
}

#[test]
fn exhausted_pools_report_class_specific_reasons() {
    let config = CardConfig {
        persistent_capacity: 4,
        transient_reset_capacity: 4,
        ..CardConfig::default()
    };
    let mut store = ArrayStore::new(&config);

    let err = store
        .allocate(ElementKind::Short, 3, PersistenceClass::Persistent, false)
        .expect_err("persistent pool should be exhausted");
    assert_eq!(err.reason_code(), SystemReason::NoResource as u16);

    let err = store
        .allocate(ElementKind::Int, 2, PersistenceClass::TransientReset, false)
        .expect_err("transient pool should be exhausted");
    assert_eq!(err.reason_code(), SystemReason::NoTransientSpace as u16);

    // A failed allocation charges nothing.
    assert_eq!(store.pool(PersistenceClass::Persistent).available(), 4);
}

#[test]
fn null_and_unknown_references_are_distinguished() {
    let store = store();

    let err = store
        .descriptor(ArrayRef::NULL, ErrorOrigin::Store)
        .expect_err("null should be rejected");
    assert_eq!(err.class, ErrorClass::NullPointer);

    let err = store
        .descriptor(ArrayRef(99), ErrorOrigin::Store)
        .expect_err("unknown handle should be rejected");
    assert_eq!(err.class, ErrorClass::Util);
    assert_eq!(err.reason_code(), UtilReason::IllegalValue as u16);
}

#[test]
fn out_of_range_byte_access_is_rejected() {
    let mut store = store();
    let array = store
        .allocate(ElementKind::Byte, 4, PersistenceClass::Persistent, false)
        .expect("allocation should succeed");

    let err = store.read(array, 2, 3).expect_err("read past end should fail");
    assert_eq!(err.class, ErrorClass::ArrayIndexOutOfBounds);

    let err = store
        .write(array, 4, &[1])
        .expect_err("write past end should fail");
    assert_eq!(err.class, ErrorClass::ArrayIndexOutOfBounds);
}

#[test]
fn armed_tear_applies_only_the_budgeted_prefix() {
    let mut store = store();
    let array = store
        .allocate(ElementKind::Byte, 4, PersistenceClass::Persistent, false)
        .expect("allocation should succeed");

    store.arm_tear(2);
    let err = store
        .write(array, 0, &[9, 9, 9, 9])
        .expect_err("tear should interrupt the write");

    assert_eq!(err.class, ErrorClass::PowerLoss);
    assert_eq!(store.read(array, 0, 4).expect("read should succeed"), vec![9, 9, 0, 0]);

    // The tear fires once, then the store is disarmed.
    store
        .write(array, 0, &[1, 2, 3, 4])
        .expect("write after tear should succeed");
    assert_eq!(store.read(array, 0, 4).expect("read should succeed"), vec![1, 2, 3, 4]);
}

#[test]
fn clear_transients_respects_the_selected_classes() {
    let mut store = store();
    let persistent = store
        .allocate(ElementKind::Byte, 2, PersistenceClass::Persistent, false)
        .expect("allocation should succeed");
    let on_reset = store
        .allocate(ElementKind::Byte, 2, PersistenceClass::TransientReset, false)
        .expect("allocation should succeed");
    let on_deselect = store
        .allocate(ElementKind::Byte, 2, PersistenceClass::TransientDeselect, false)
        .expect("allocation should succeed");
    for array in [persistent, on_reset, on_deselect] {
        store.write(array, 0, &[7, 7]).expect("write should succeed");
    }

    let cleared = store.clear_transients(|class| class == PersistenceClass::TransientDeselect);

    assert_eq!(cleared, 1);
    assert_eq!(store.read(persistent, 0, 2).expect("read"), vec![7, 7]);
    assert_eq!(store.read(on_reset, 0, 2).expect("read"), vec![7, 7]);
    assert_eq!(store.read(on_deselect, 0, 2).expect("read"), vec![0, 0]);
}

#[test]
fn bit_flips_break_integrity_but_writes_restore_it() {
    let mut store = store();
    let array = store
        .allocate(ElementKind::Short, 2, PersistenceClass::Persistent, true)
        .expect("allocation should succeed");

    store.flip_bits(array, 1, 0x80).expect("flip should succeed");
    assert!(!store.cell(array, ErrorOrigin::Store).expect("cell").integrity_intact());

    store.write(array, 0, &[0, 0, 0, 0]).expect("write should succeed");
    assert!(store.cell(array, ErrorOrigin::Store).expect("cell").integrity_intact());
}

#[test]
fn adopt_rejects_duplicate_references_and_advances_ids() {
    let mut store = store();
    let descriptor = ArrayDescriptor {
        kind: ElementKind::Byte,
        length: 1,
        persistence: PersistenceClass::Persistent,
        integrity_sensitive: false,
    };

    store
        .adopt(ArrayRef(5), ArrayCell::zeroed(descriptor))
        .expect("adopt should succeed");
    store
        .adopt(ArrayRef(5), ArrayCell::zeroed(descriptor))
        .expect_err("duplicate reference should be rejected");

    let next = store
        .allocate(ElementKind::Byte, 1, PersistenceClass::Persistent, false)
        .expect("allocation should succeed");
    assert_eq!(next, ArrayRef(6));
}

#[test]
fn allocation_never_reuses_the_last_adopted_reference() {
    let mut store = store();
    let descriptor = ArrayDescriptor {
        kind: ElementKind::Byte,
        length: 1,
        persistence: PersistenceClass::Persistent,
        integrity_sensitive: false,
    };
    let last = ArrayRef(u32::MAX);

    store
        .adopt(last, ArrayCell::zeroed(descriptor))
        .expect("adopt should succeed");
    store.write(last, 0, &[0x7A]).expect("write should succeed");
    let used = store.pool(PersistenceClass::Persistent).used;

    let err = store
        .allocate(ElementKind::Short, 4, PersistenceClass::Persistent, false)
        .expect_err("reference space should be exhausted");

    assert_eq!(err.class, ErrorClass::System);
    assert_eq!(err.reason_code(), SystemReason::NoResource as u16);
    assert_eq!(store.read(last, 0, 1).expect("read should succeed"), vec![0x7A]);
    assert_eq!(store.pool(PersistenceClass::Persistent).used, used);
}
