//! Copy planning for `arrayCopyRepack`.
//!
//! Elements are stored big-endian, so concatenating N narrow elements
//! most-significant first into one wide element (and splitting the other
//! way) leaves the byte sequence unchanged. A repacking copy is therefore a
//! byte copy whose extent is measured in source elements and whose result is
//! measured in destination elements.

use crate::{
    array::validate::{Operand, check_range},
    error::{CardError, ErrorOrigin, UtilReason},
};

///
/// RepackPlan
///
/// Byte-level extent of one validated repacking copy.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) struct RepackPlan {
    pub(super) src_byte_off: usize,
    pub(super) dest_byte_off: usize,
    pub(super) byte_len: usize,
    pub(super) dest_elements: usize,
}

impl RepackPlan {
    /// Validate ranges and the width ratio, producing the byte extent.
    pub(super) fn new(
        src: &Operand,
        src_off: usize,
        src_len: usize,
        dest: &Operand,
        dest_off: usize,
    ) -> Result<Self, CardError> {
        check_range(src, src_off, src_len, "source")?;

        let (src_kind, dest_kind) = (src.descriptor.kind, dest.descriptor.kind);
        let dest_elements = if let Some(ratio) = dest_kind.width_ratio(src_kind) {
            // `ratio` source elements are concatenated into each destination element.
            if !src_len.is_multiple_of(ratio) {
                return Err(CardError::util(
                    ErrorOrigin::Array,
                    UtilReason::TypeMismatched,
                    format!(
                        "{src_len} {src_kind:?} elements do not fill a whole number of {dest_kind:?} elements"
                    ),
                ));
            }
            src_len / ratio
        } else {
            let ratio = src_kind.width_ratio(dest_kind).ok_or_else(|| {
                CardError::util(
                    ErrorOrigin::Array,
                    UtilReason::TypeMismatched,
                    format!("{src_kind:?} cannot be repacked into {dest_kind:?}"),
                )
            })?;
            src_len * ratio
        };
        let byte_len = src_len * src.width();

        check_range(dest, dest_off, dest_elements, "destination")?;

        Ok(Self {
            src_byte_off: src_off * src.width(),
            dest_byte_off: dest_off * dest.width(),
            byte_len,
            dest_elements,
        })
    }
}

/// Assemble up to four big-endian bytes into an unsigned value.
pub(crate) fn assemble_be(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

/// Split the low `width` bytes of `value` most-significant first.
pub(crate) fn split_be(value: u32, width: usize) -> Vec<u8> {
    let bytes = value.to_be_bytes();

    bytes[bytes.len() - width..].to_vec()
}
