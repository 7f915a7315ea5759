//! Transaction helpers: the [`transaction!`] and [`savepoint!`] macros.
//!
//! Pass the transaction into code that accepts a
//! [`GenericClient`](crate::GenericClient); the same statements then run with
//! or without a transaction.
//!
//! # Example
//!
//! ```ignore
//! use mydml::{column, update, DmlResult};
//!
//! # async fn demo(pool: &mydml::ConnPool) -> DmlResult<()> {
//! mydml::transaction!(pool, tx, {
//!     update("cataloginventory_stock_item")
//!         .set_expr("qty", "`qty`-?")
//!         .filter(column("product_id").equal().placeholder())
//!         .with_dbr(&tx)
//!         .args([mydml::Value::Int(1), mydml::Value::Int(42)])
//!         .exec()
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for anonymous savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$pool.begin().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the block's error.
///
/// The block must evaluate to `mydml::DmlResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($pool:expr, $tx:ident, $body:block) => {{
        let $tx = ($pool).begin().await?;

        let __mydml_tx_body_result: $crate::DmlResult<_> = async { $body }.await;
        match __mydml_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok::<_, $crate::DmlError>(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DmlError::client(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the given block inside a savepoint of an open transaction.
///
/// - Creates the savepoint on `$tx`.
/// - Releases it on `Ok(_)`.
/// - Rolls back to it on `Err(_)`; the transaction itself stays open.
///
/// ```ignore
/// mydml::transaction!(pool, tx, {
///     create_order(&tx).await?;
///     // a failed notification does not undo the order
///     let notified = mydml::savepoint!(tx, {
///         insert_notification(&tx).await?;
///         Ok(())
///     });
///     if notified.is_err() {
///         schedule_retry().await;
///     }
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! savepoint {
    // Named savepoint
    ($tx:expr, $name:expr, $body:block) => {{
        let __mydml_sp_name: &str = $name;
        ($tx).savepoint(__mydml_sp_name).await?;

        let __mydml_sp_body_result: $crate::DmlResult<_> = async { $body }.await;
        match __mydml_sp_body_result {
            Ok(value) => {
                ($tx).release_savepoint(__mydml_sp_name).await?;
                Ok::<_, $crate::DmlError>(value)
            }
            Err(error) => match ($tx).rollback_to_savepoint(__mydml_sp_name).await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DmlError::client(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
    // Anonymous savepoint
    ($tx:expr, $body:block) => {{
        let __mydml_sp_name = $crate::__next_savepoint_name();
        $crate::savepoint!($tx, &__mydml_sp_name, $body)
    }};
}

/// Generate a unique anonymous savepoint name.
///
/// Used by the `savepoint!` macro. Not intended for direct use.
#[doc(hidden)]
pub fn __next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("mydml_sp_{n}")
}
