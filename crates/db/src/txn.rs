//! Transaction helpers.

use sea_orm::DatabaseTransaction;
use tracing::warn;

/// Rolls back the transaction of a failed item.
///
/// The item's own error is what gets reported, so a failing rollback is
/// only logged.
pub(crate) async fn abort(txn: DatabaseTransaction, item: &str) {
    if let Err(e) = txn.rollback().await {
        warn!(item, error = %e, "Failed to roll back transaction");
    }
}
