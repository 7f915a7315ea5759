//! WITH (common table expression) statement builder.

use super::QueryBuilder;
use super::base::BuilderBase;
use super::delete::Delete;
use super::macros::impl_common_methods;
use super::select::Select;
use super::union::Union;
use super::update::Update;
use super::writer::Built;
use crate::error::{DmlError, DmlResult};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum CteBody {
    Select(Box<Select>),
    Union(Box<Union>),
}

impl CteBody {
    fn build(&self) -> DmlResult<Arc<Built>> {
        match self {
            CteBody::Select(s) => s.build(),
            CteBody::Union(u) => u.build(),
        }
    }
}

/// One named common table expression.
#[derive(Debug, Clone)]
pub struct Cte {
    name: String,
    columns: Vec<String>,
    body: CteBody,
}

impl Cte {
    pub fn select(name: impl Into<String>, select: Select) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            body: CteBody::Select(Box::new(select)),
        }
    }

    pub fn union(name: impl Into<String>, union: Union) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            body: CteBody::Union(Box::new(union)),
        }
    }

    /// Explicit column list: `name (`a`,`b`) AS (..)`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
enum Terminal {
    Select(Box<Select>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    Union(Box<Union>),
}

impl Terminal {
    fn build(&self) -> DmlResult<Arc<Built>> {
        match self {
            Terminal::Select(s) => s.build(),
            Terminal::Update(u) => u.build(),
            Terminal::Delete(d) => d.build(),
            Terminal::Union(u) => u.build(),
        }
    }

    fn table_name(&self) -> &str {
        match self {
            Terminal::Select(s) => s.table_name(),
            Terminal::Update(u) => u.table_name(),
            Terminal::Delete(d) => d.table_name(),
            Terminal::Union(u) => u.table_name(),
        }
    }
}

/// `WITH [RECURSIVE] cte AS (..), .. <statement>`
///
/// ```ignore
/// let w = With::new()
///     .recursive()
///     .cte(Cte::union("cte", Union::new([
///         Select::new([]).add_column_expr("1", Some("n")),
///         Select::new([]).add_column_expr("n+1", None).from("cte")
///             .filter(column("n").less().int64(5)),
///     ])
///     .all()).columns(["n"]))
///     .select(Select::new(["n"]).from("cte"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct With {
    pub(crate) base: BuilderBase,
    ctes: Vec<Cte>,
    recursive: bool,
    terminal: Option<Terminal>,
}

impl_common_methods!(With);

impl With {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cte(mut self, cte: Cte) -> Self {
        self.base.touch();
        self.ctes.push(cte);
        self
    }

    pub fn recursive(mut self) -> Self {
        self.base.touch();
        self.recursive = true;
        self
    }

    fn terminal(mut self, terminal: Terminal) -> Self {
        self.base.touch();
        self.terminal = Some(terminal);
        self
    }

    pub fn select(self, select: Select) -> Self {
        self.terminal(Terminal::Select(Box::new(select)))
    }

    pub fn update(self, update: Update) -> Self {
        self.terminal(Terminal::Update(Box::new(update)))
    }

    pub fn delete(self, delete: Delete) -> Self {
        self.terminal(Terminal::Delete(Box::new(delete)))
    }

    pub fn union(self, union: Union) -> Self {
        self.terminal(Terminal::Union(Box::new(union)))
    }

    fn compact_clauses(&mut self) {
        self.ctes = Vec::new();
        self.terminal = None;
    }

    fn render(&self) -> DmlResult<Built> {
        if self.ctes.is_empty() {
            return Err(DmlError::empty("WITH without common table expressions"));
        }
        let Some(terminal) = &self.terminal else {
            return Err(DmlError::empty("WITH without a terminal statement"));
        };

        let mut w = self.base.writer();
        w.push_str("WITH ");
        if self.recursive {
            w.push_str("RECURSIVE ");
        }
        for (i, cte) in self.ctes.iter().enumerate() {
            if cte.name.is_empty() {
                return Err(DmlError::empty("common table expression without a name"));
            }
            if i > 0 {
                w.push_str(", ");
            }
            w.quoted(&cte.name);
            if !cte.columns.is_empty() {
                w.push_str(" (");
                w.name_list(&cte.columns);
                w.push(')');
            }
            w.push_str(" AS (");
            let body = cte.body.build()?;
            w.append(&body);
            w.push(')');
        }
        w.push(' ');
        let terminal = terminal.build()?;
        w.append(&terminal);
        Ok(w.finish())
    }
}

impl QueryBuilder for With {
    fn is_build_cached(&self) -> bool {
        self.is_cached()
    }

    fn build(&self) -> DmlResult<Arc<Built>> {
        self.base.cached(&self.base.cache_key, || self.render())
    }

    fn table_name(&self) -> &str {
        self.terminal.as_ref().map_or("", Terminal::table_name)
    }
}
