use jcmem_core::prelude::*;
use proptest::prelude::*;

fn byte_array(card: &mut CardRuntime, bytes: &[u8]) -> ArrayRef {
    let array = card
        .make_persistent_array(ElementKind::Byte, bytes.len() as i16)
        .expect("allocation should succeed");
    let values: Vec<i32> = bytes.iter().map(|b| i32::from(*b as i8)).collect();
    card.load_elements(array, &values).expect("load should succeed");

    array
}

fn arb_even_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32).prop_map(|mut bytes| {
        bytes.truncate(bytes.len() & !1);
        bytes
    })
}

fn arb_kind() -> impl Strategy<Value = ElementKind> {
    prop_oneof![
        Just(ElementKind::Byte),
        Just(ElementKind::Short),
        Just(ElementKind::Int),
    ]
}

proptest! {
    #[test]
    fn byte_short_byte_repack_round_trips(bytes in arb_even_bytes()) {
        let mut card = CardRuntime::default();
        let src = byte_array(&mut card, &bytes);
        let shorts = card
            .make_persistent_array(ElementKind::Short, (bytes.len() / 2) as i16)
            .expect("allocation should succeed");
        let back = byte_array(&mut card, &vec![0; bytes.len()]);

        let len = bytes.len() as i16;
        prop_assert_eq!(card.array_copy_repack(src, 0, len, shorts, 0).expect("copy"), len / 2);
        prop_assert_eq!(card.array_copy_repack(shorts, 0, len / 2, back, 0).expect("copy"), len);
        prop_assert_eq!(card.raw_bytes(back).expect("bytes"), bytes);
    }

    #[test]
    fn overlapping_copy_matches_a_buffered_copy(
        bytes in prop::collection::vec(any::<u8>(), 1..48),
        seed in any::<(u16, u16, u16)>(),
    ) {
        let total = bytes.len();
        let src_off = usize::from(seed.0) % total;
        let len = usize::from(seed.1) % (total - src_off + 1);
        let dest_off = usize::from(seed.2) % (total - len + 1);

        let mut expected = bytes.clone();
        let staged = bytes[src_off..src_off + len].to_vec();
        expected[dest_off..dest_off + len].copy_from_slice(&staged);

        let mut card = CardRuntime::default();
        let array = byte_array(&mut card, &bytes);
        card.array_copy_repack(array, src_off as i16, len as i16, array, dest_off as i16)
            .expect("copy should succeed");

        prop_assert_eq!(card.raw_bytes(array).expect("bytes"), expected);
    }

    #[test]
    fn compare_is_reflexive_and_antisymmetric(
        kind in arb_kind(),
        left in prop::collection::vec(any::<i32>(), 1..8),
        right in prop::collection::vec(any::<i32>(), 1..8),
    ) {
        let len = left.len().min(right.len()) as i16;
        let mut card = CardRuntime::default();
        let a = card.make_persistent_array(kind, left.len() as i16).expect("allocation");
        let b = card.make_persistent_array(kind, right.len() as i16).expect("allocation");
        card.load_elements(a, &left).expect("load");
        card.load_elements(b, &right).expect("load");

        prop_assert_eq!(card.array_compare_generic(a, 0, a, 0, left.len() as i16).expect("compare"), 0);

        let ab = card.array_compare_generic(a, 0, b, 0, len).expect("compare");
        let ba = card.array_compare_generic(b, 0, a, 0, len).expect("compare");
        prop_assert_eq!(ab, -ba);
    }

    #[test]
    fn overflowing_transaction_leaves_store_untouched(
        sizes in prop::collection::vec(1i16..40, 1..6),
        capacity in 16u32..96,
    ) {
        let config = CardConfig::default().with_commit_capacity(capacity);
        let mut card = CardRuntime::new(config).expect("config should be valid");
        let fill = byte_array(&mut card, &[0xAA]);
        let targets: Vec<ArrayRef> = sizes
            .iter()
            .map(|size| byte_array(&mut card, &vec![0x11; *size as usize]))
            .collect();
        let before: Vec<Vec<u8>> = targets
            .iter()
            .map(|array| card.raw_bytes(*array).expect("bytes"))
            .collect();

        card.begin_transaction().expect("begin should succeed");
        let mut overflowed = false;
        for (array, size) in targets.iter().zip(&sizes) {
            match card.array_fill_generic(*array, 0, *size, fill, 0) {
                Ok(_) => {}
                Err(err) => {
                    prop_assert!(err.is_buffer_full());
                    overflowed = true;
                    break;
                }
            }
        }

        if overflowed {
            prop_assert_eq!(card.transaction_depth(), 0);
            let after: Vec<Vec<u8>> = targets
                .iter()
                .map(|array| card.raw_bytes(*array).expect("bytes"))
                .collect();
            prop_assert_eq!(after, before);
        } else {
            card.commit_transaction().expect("commit should succeed");
        }
    }

    #[test]
    fn power_loss_inside_transaction_rolls_back_every_write(
        writes in prop::collection::vec((0i16..8, any::<u8>()), 1..10),
        tear_at in 0u64..12,
    ) {
        let mut card = CardRuntime::default();
        let array = byte_array(&mut card, &[0x55; 8]);
        let values = byte_array(&mut card, &[0; 1]);
        let before = card.raw_bytes(array).expect("bytes");

        card.begin_transaction().expect("begin should succeed");
        card.inject_power_loss_after(tear_at);

        let mut torn = false;
        for (index, value) in &writes {
            // Staging the value is itself a logged write and can tear too.
            if let Err(err) = card.set_element(values, 0, i32::from(*value)) {
                prop_assert_eq!(err.class, ErrorClass::PowerLoss);
                torn = true;
                break;
            }
            if let Err(err) = card.array_fill_generic(array, *index, 1, values, 0) {
                prop_assert_eq!(err.class, ErrorClass::PowerLoss);
                torn = true;
                break;
            }
        }

        if torn {
            prop_assert_eq!(card.raw_bytes(array).expect("bytes"), before);
            prop_assert_eq!(card.transaction_depth(), 0);
        }
    }
}
