/// Generate WHERE / ORDER BY / LIMIT methods.
///
/// The type must have a `base: BuilderBase` field.
macro_rules! impl_clause_methods {
    ($ty:ty) => {
        impl $ty {
            /// Add a WHERE condition.
            pub fn filter(mut self, condition: $crate::condition::Condition) -> Self {
                self.base.touch();
                self.base.wheres.push(condition);
                self
            }

            /// Add several WHERE conditions.
            pub fn filters(
                mut self,
                conditions: impl IntoIterator<Item = $crate::condition::Condition>,
            ) -> Self {
                self.base.touch();
                self.base.wheres.extend(conditions);
                self
            }

            /// Add an ascending ORDER BY column.
            pub fn order_by(mut self, column: impl Into<String>) -> Self {
                self.base.touch();
                self.base.order_bys.push($crate::builder::base::OrderBy {
                    column: column.into(),
                    descending: false,
                });
                self
            }

            /// Add a descending ORDER BY column.
            pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
                self.base.touch();
                self.base.order_bys.push($crate::builder::base::OrderBy {
                    column: column.into(),
                    descending: true,
                });
                self
            }

            pub fn limit(mut self, limit: u64) -> Self {
                self.base.touch();
                self.base.limit = Some(limit);
                self
            }
        }
    };
}

/// Generate the cache, rendering and execution methods every builder shares.
///
/// The type must have a `base: BuilderBase` field and a private
/// `compact_clauses(&mut self)` method.
macro_rules! impl_common_methods {
    ($ty:ty) => {
        impl $ty {
            /// Relax identifier quoting so expressions can be used as names.
            ///
            /// One-way switch; must be called before any clause is added,
            /// otherwise the statement fails to build.
            pub fn unsafe_mode(mut self) -> Self {
                self.base.set_unsafe();
                self
            }

            /// Select the build cache slot used by the next render.
            ///
            /// Entries of earlier keys survive later mutations.
            pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
                self.base.cache_key = key.into();
                self
            }

            /// Enable or disable caching of the rendered SQL.
            pub fn build_cache(mut self, enabled: bool) -> Self {
                self.base.cache_disabled = !enabled;
                if !enabled {
                    self.base.cache_mut().clear();
                }
                self
            }

            /// Release clause state after rendering; the cached SQL stays available.
            pub fn compact(&mut self) {
                self.compact_clauses();
                self.base.compact();
            }

            /// Whether the current cache key holds a rendering.
            pub fn is_cached(&self) -> bool {
                self.base.cache.contains(&self.base.cache_key)
            }

            /// Render and return the SQL and the statement-owned arguments.
            pub fn to_sql(&self) -> $crate::error::DmlResult<(String, Vec<$crate::value::Value>)> {
                $crate::builder::QueryBuilder::to_sql(self)
            }

            /// Bind this statement to a connection scope for execution.
            pub fn with_dbr<'c, C: $crate::client::GenericClient>(
                &self,
                client: &'c C,
            ) -> $crate::dbr::Dbr<'c, C> {
                $crate::dbr::Dbr::new(client, std::sync::Arc::new(self.clone()))
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match $crate::builder::QueryBuilder::build(self) {
                    Ok(built) => f.write_str(built.sql()),
                    Err(e) => write!(f, "[mydml] ToSQL error: {e}"),
                }
            }
        }
    };
}

pub(crate) use {impl_clause_methods, impl_common_methods};
