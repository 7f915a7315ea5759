//! Prepared statements.

use crate::builder::{Built, RawSql};
use crate::client::GenericClient;
use crate::dbr::Dbr;
use std::fmt;
use std::sync::Arc;

/// A statement rendered once and validated by [`Dbr::prepare`].
///
/// `Stmt` is immutable and cheap to clone; arguments never live on it. Each
/// task takes its own runner with [`Stmt::with_dbr`]:
///
/// ```ignore
/// let stmt = mydml::select(["value"])
///     .from("core_config_data")
///     .filter(column("path").equal().placeholder())
///     .with_dbr(&pool)
///     .prepare()
///     .await?;
///
/// let (a, b) = tokio::join!(
///     stmt.with_dbr().arg("web/secure/url").load_strings(),
///     stmt.with_dbr().arg("web/unsecure/url").load_strings(),
/// );
/// ```
pub struct Stmt<'c, C> {
    client: &'c C,
    raw: Arc<RawSql>,
}

impl<C> Clone for Stmt<'_, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            raw: Arc::clone(&self.raw),
        }
    }
}

impl<C> fmt::Debug for Stmt<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stmt").field("raw", &self.raw).finish_non_exhaustive()
    }
}

impl<'c, C: GenericClient> Stmt<'c, C> {
    pub(crate) fn new(client: &'c C, table: &str, built: Arc<Built>) -> Self {
        Self {
            client,
            raw: Arc::new(RawSql::from_built(table, built)),
        }
    }

    /// A fresh runner with an empty argument list and its own statement id.
    pub fn with_dbr(&self) -> Dbr<'c, C> {
        Dbr::new(self.client, self.raw.clone())
    }

    pub fn sql(&self) -> &str {
        self.raw.sql()
    }
}
