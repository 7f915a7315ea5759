use super::cache::BuildCache;
use super::writer::{Built, SqlWriter};
use crate::condition::{self, Conditions};
use crate::error::{DmlError, DmlResult};
use crate::ident::Ident;
use std::sync::Arc;

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderBy {
    pub(crate) column: String,
    pub(crate) descending: bool,
}

/// State shared by all statement builders.
#[derive(Debug, Clone, Default)]
pub(crate) struct BuilderBase {
    pub(crate) table: Ident,
    pub(crate) wheres: Conditions,
    pub(crate) order_bys: Vec<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) is_unsafe: bool,
    pub(crate) cache_disabled: bool,
    pub(crate) cache_key: String,
    /// Shared with clones and runner snapshots until either side changes a clause.
    pub(crate) cache: Arc<BuildCache>,
    has_clauses: bool,
    error: Option<Arc<DmlError>>,
}

impl BuilderBase {
    pub(crate) fn new(table: Ident) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    /// Record a clause change: drops the cached text of the current key.
    pub(crate) fn touch(&mut self) {
        self.has_clauses = true;
        self.invalidate();
    }

    /// Drop the cached text of the current key without counting as a clause.
    pub(crate) fn invalidate(&mut self) {
        let key = self.cache_key.clone();
        self.cache_mut().remove_variants(&key);
    }

    /// The cache of this builder alone, detached from clones first.
    pub(crate) fn cache_mut(&mut self) -> &mut BuildCache {
        Arc::make_mut(&mut self.cache)
    }

    pub(crate) fn set_unsafe(&mut self) {
        if self.has_clauses && !self.is_unsafe {
            self.fail(DmlError::not_valid(
                "unsafe_mode() must be called before any clause is added",
            ));
        }
        self.is_unsafe = true;
    }

    /// Keep the first construction error; it is returned by every build.
    pub(crate) fn fail(&mut self, err: DmlError) {
        self.invalidate();
        if self.error.is_none() {
            self.error = Some(Arc::new(err));
        }
    }

    pub(crate) fn check(&self) -> DmlResult<()> {
        match &self.error {
            Some(err) => Err(err.replicate()),
            None => Ok(()),
        }
    }

    /// Return the cached rendering for `key`, rendering and storing it on a miss.
    ///
    /// Render errors are never cached.
    pub(crate) fn cached(
        &self,
        key: &str,
        render: impl FnOnce() -> DmlResult<Built>,
    ) -> DmlResult<Arc<Built>> {
        self.check()?;
        if self.cache_disabled {
            return render().map(Arc::new);
        }
        if let Some(built) = self.cache.get(key) {
            return Ok(built);
        }
        let built = Arc::new(render()?);
        Ok(self.cache.insert(key, built))
    }

    /// Drop clause state; cached renderings stay readable.
    pub(crate) fn compact(&mut self) {
        self.wheres = Vec::new();
        self.order_bys = Vec::new();
    }

    pub(crate) fn writer(&self) -> SqlWriter {
        SqlWriter::new(self.is_unsafe)
    }

    pub(crate) fn write_where(&self, w: &mut SqlWriter) -> DmlResult<()> {
        if self.wheres.is_empty() {
            return Ok(());
        }
        w.push_str(" WHERE ");
        condition::write_conditions(w, &self.wheres)
    }

    pub(crate) fn write_order_by(&self, w: &mut SqlWriter) {
        write_order_by(w, &self.order_bys);
    }

    pub(crate) fn write_limit(&self, w: &mut SqlWriter) {
        write_limit(w, self.limit, self.offset);
    }
}

pub(crate) fn write_order_by(w: &mut SqlWriter, order_bys: &[OrderBy]) {
    if order_bys.is_empty() {
        return;
    }
    w.push_str(" ORDER BY ");
    for (i, order) in order_bys.iter().enumerate() {
        if i > 0 {
            w.push_str(", ");
        }
        w.name(&order.column);
        if order.descending {
            w.push_str(" DESC");
        }
    }
}

pub(crate) fn write_limit(w: &mut SqlWriter, limit: Option<u64>, offset: Option<u64>) {
    match (limit, offset) {
        (Some(limit), None) => w.push_str(&format!(" LIMIT {limit}")),
        (Some(limit), Some(offset)) => w.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        // MySQL has no OFFSET without LIMIT.
        (None, Some(offset)) => w.push_str(&format!(" LIMIT {} OFFSET {offset}", u64::MAX)),
        (None, None) => {}
    }
}
