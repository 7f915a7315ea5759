//! `transaction!` and `savepoint!` against a scripted pool.

use mydml::{DmlError, DmlResult, ExecResult, GenericClient, Row, ScopeInfo, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct ScriptedPool {
    log: Log,
    fail_rollback: bool,
}

impl ScriptedPool {
    async fn begin(&self) -> DmlResult<ScriptedTx> {
        self.log.lock().unwrap().push("BEGIN".to_string());
        Ok(ScriptedTx {
            log: self.log.clone(),
            fail_rollback: self.fail_rollback,
            scope: ScopeInfo::pool().tx(),
        })
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

struct ScriptedTx {
    log: Log,
    fail_rollback: bool,
    scope: ScopeInfo,
}

impl ScriptedTx {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    async fn commit(&self) -> DmlResult<()> {
        self.push("COMMIT");
        Ok(())
    }

    async fn rollback(&self) -> DmlResult<()> {
        self.push("ROLLBACK");
        if self.fail_rollback {
            return Err(DmlError::client("connection reset"));
        }
        Ok(())
    }

    async fn savepoint(&self, name: &str) -> DmlResult<()> {
        self.push(format!("SAVEPOINT {name}"));
        Ok(())
    }

    async fn release_savepoint(&self, name: &str) -> DmlResult<()> {
        self.push(format!("RELEASE {name}"));
        Ok(())
    }

    async fn rollback_to_savepoint(&self, name: &str) -> DmlResult<()> {
        self.push(format!("ROLLBACK TO {name}"));
        Ok(())
    }
}

impl GenericClient for ScriptedTx {
    fn query(&self, sql: &str, _args: &[Value]) -> impl Future<Output = DmlResult<Vec<Row>>> + Send {
        self.push(sql);
        async { Ok(Vec::new()) }
    }

    fn execute(
        &self,
        sql: &str,
        _args: &[Value],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        self.push(sql);
        async {
            Ok(ExecResult {
                rows_affected: 1,
                last_insert_id: 0,
            })
        }
    }

    fn scope(&self) -> &ScopeInfo {
        &self.scope
    }
}

async fn delete_and_return(pool: &ScriptedPool) -> DmlResult<u64> {
    mydml::transaction!(pool, tx, {
        let res = mydml::delete("quote").with_dbr(&tx).exec().await?;
        Ok::<_, DmlError>(res.rows_affected)
    })
}

async fn delete_then_fail(pool: &ScriptedPool) -> DmlResult<()> {
    mydml::transaction!(pool, tx, {
        mydml::delete("quote").with_dbr(&tx).exec().await?;
        Err::<(), _>(DmlError::not_valid("quote is locked"))
    })
}

#[tokio::test]
async fn commits_on_success() {
    let pool = ScriptedPool::default();
    assert_eq!(delete_and_return(&pool).await.unwrap(), 1);
    // transactions never carry correlation comments
    assert_eq!(pool.entries(), vec!["BEGIN", "DELETE FROM `quote`", "COMMIT"]);
}

#[tokio::test]
async fn rolls_back_on_error() {
    let pool = ScriptedPool::default();
    let err = delete_then_fail(&pool).await.unwrap_err();
    assert!(err.is_not_valid());
    assert_eq!(pool.entries(), vec!["BEGIN", "DELETE FROM `quote`", "ROLLBACK"]);
}

#[tokio::test]
async fn failed_rollback_reports_both_errors() {
    let pool = ScriptedPool {
        fail_rollback: true,
        ..ScriptedPool::default()
    };
    let err = delete_then_fail(&pool).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("quote is locked"));
    assert!(message.contains("rollback failed"));
    assert!(message.contains("connection reset"));
}

async fn nested(pool: &ScriptedPool) -> DmlResult<bool> {
    mydml::transaction!(pool, tx, {
        mydml::savepoint!(tx, "before_items", {
            mydml::delete("quote_item").with_dbr(&tx).exec().await?;
            Ok::<_, DmlError>(())
        })?;
        let notified = mydml::savepoint!(tx, {
            mydml::delete("quote_notification").with_dbr(&tx).exec().await?;
            Err::<(), _>(DmlError::not_found("mail queue"))
        });
        Ok::<_, DmlError>(notified.is_err())
    })
}

#[tokio::test]
async fn savepoints_release_or_roll_back_without_ending_the_transaction() {
    let pool = ScriptedPool::default();
    assert!(nested(&pool).await.unwrap());

    let entries = pool.entries();
    assert_eq!(
        &entries[..4],
        &[
            "BEGIN",
            "SAVEPOINT before_items",
            "DELETE FROM `quote_item`",
            "RELEASE before_items",
        ]
    );
    let anonymous = entries[4].strip_prefix("SAVEPOINT ").unwrap().to_string();
    assert!(anonymous.starts_with("mydml_sp_"));
    assert_eq!(entries[5], "DELETE FROM `quote_notification`");
    assert_eq!(entries[6], format!("ROLLBACK TO {anonymous}"));
    assert_eq!(entries[7], "COMMIT");
    assert_eq!(entries.len(), 8);
}

#[cfg(feature = "mysql")]
#[allow(dead_code)]
async fn _pool_transaction_compiles(pool: &mydml::ConnPool) -> DmlResult<()> {
    mydml::transaction!(pool, tx, {
        mydml::update("cataloginventory_stock_item")
            .set_expr("qty", "`qty`-?")
            .filter(mydml::column("product_id").placeholder())
            .with_dbr(&tx)
            .args([Value::Int(1), Value::Int(42)])
            .exec()
            .await?;
        mydml::savepoint!(tx, {
            mydml::delete("quote").with_dbr(&tx).exec().await?;
            Ok::<_, DmlError>(())
        })
    })
}
