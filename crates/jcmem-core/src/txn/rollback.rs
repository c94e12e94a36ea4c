use crate::{error::CardError, store::ArrayStore, txn::UndoEntry};

/// Restore before-images in reverse write order.
///
/// Shared by abort, overflow, power-loss recovery and image restore so the
/// ordering stays identical on every path. Restores bypass the tear budget.
pub(crate) fn rollback_reverse(store: &mut ArrayStore, entries: Vec<UndoEntry>) -> Result<(), CardError> {
    for entry in entries.into_iter().rev() {
        store.write_untorn(entry.array, entry.offset, &entry.before)?;
    }

    Ok(())
}
