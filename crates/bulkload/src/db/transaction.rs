//! Scoped transactions.
//!
//! The transaction is acquired once and released exactly once: committed when
//! the body returns `Ok`, rolled back when it returns `Err`, and rolled back by
//! the guard's `Drop` when the body unwinds.

use rusqlite::{Connection, DropBehavior, Transaction, TransactionBehavior};

use crate::error::Result;

/// Runs `f` inside one immediate (write-locking) transaction.
///
/// A failed rollback is logged and the body's error is returned unchanged.
pub fn with_transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.set_drop_behavior(DropBehavior::Rollback);

    match f(&tx) {
        Ok(value) => {
            // On commit failure the guard is dropped with the transaction still
            // open, which rolls it back.
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                log::warn!("Rollback failed after error '{}': {}", e, rollback_err);
            }
            Err(e)
        }
    }
}
