use crate::{
    error::{CardError, ErrorOrigin, UtilReason},
    store::{ArrayDescriptor, ArrayRef, ArrayStore},
};

///
/// Operand
///
/// An array reference resolved and checked for generic-engine eligibility.
///

#[derive(Clone, Copy, Debug)]
pub(super) struct Operand {
    pub(super) array: ArrayRef,
    pub(super) descriptor: ArrayDescriptor,
}

impl Operand {
    pub(super) const fn width(&self) -> usize {
        self.descriptor.kind.width()
    }

    pub(super) const fn length(&self) -> usize {
        self.descriptor.length
    }
}

/// Resolve every operand, then check element kinds.
///
/// Null references are reported before kind errors regardless of argument
/// position, so a null destination wins over a boolean source.
pub(super) fn resolve_generic<const N: usize>(
    store: &ArrayStore,
    arrays: [ArrayRef; N],
) -> Result<[Operand; N], CardError> {
    if let Some(null_at) = arrays.iter().position(|array| array.is_null()) {
        return Err(CardError::null_pointer(
            ErrorOrigin::Array,
            format!("null array reference (operand {null_at})"),
        ));
    }

    let mut operands = Vec::with_capacity(N);
    for array in arrays {
        let descriptor = store.descriptor(array, ErrorOrigin::Array)?;
        if !descriptor.kind.supports_generic_ops() {
            return Err(CardError::util(
                ErrorOrigin::Array,
                UtilReason::IllegalValue,
                format!(
                    "{array} holds {:?} elements; byte, short or int required",
                    descriptor.kind
                ),
            ));
        }
        operands.push(Operand { array, descriptor });
    }

    operands.try_into().map_err(|_| {
        CardError::util(ErrorOrigin::Array, UtilReason::IllegalValue, "operand arity mismatch")
    })
}

/// Convert a card `short` offset or length, rejecting negatives.
pub(super) fn non_negative(value: i16, what: &str) -> Result<usize, CardError> {
    usize::try_from(value).map_err(|_| {
        CardError::index_out_of_bounds(ErrorOrigin::Array, format!("negative {what}: {value}"))
    })
}

/// Check that `[offset, offset + len)` lies within `operand`, in elements.
pub(super) fn check_range(
    operand: &Operand,
    offset: usize,
    len: usize,
    what: &str,
) -> Result<(), CardError> {
    let end = offset.checked_add(len);
    match end {
        Some(end) if end <= operand.length() => Ok(()),
        _ => Err(CardError::index_out_of_bounds(
            ErrorOrigin::Array,
            format!(
                "{what} range {offset}+{len} outside {} of length {}",
                operand.array,
                operand.length()
            ),
        )),
    }
}

/// Require identical element kinds.
pub(super) fn same_kind(left: &Operand, right: &Operand) -> Result<(), CardError> {
    if left.descriptor.kind == right.descriptor.kind {
        return Ok(());
    }

    Err(CardError::util(
        ErrorOrigin::Array,
        UtilReason::TypeMismatched,
        format!(
            "element kinds differ: {} is {:?}, {} is {:?}",
            left.array, left.descriptor.kind, right.array, right.descriptor.kind
        ),
    ))
}
