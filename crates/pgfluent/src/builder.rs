//! Fluent statement state.
//!
//! [`QueryBuilder`] accumulates clause fragments through chained mutator
//! calls and hands them to the [`crate::query::Query`] view for rendering and
//! execution. Mutators store their inputs as-is; clause validity is a render
//! concern, not a mutation concern.

use crate::param::{Param, ParamList};
use crate::query::Query;
use crate::record::Record;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Statement kind selected by the fluent API. Last set wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Statement {
    /// Read rows (the zero value).
    #[default]
    Select,
    /// Count rows.
    Count,
    /// Insert or update the stored payload, per record.
    Save,
    /// Delete rows.
    Delete,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Statement::Select => "select",
            Statement::Count => "count",
            Statement::Save => "save",
            Statement::Delete => "delete",
        })
    }
}

/// Mutable statement state for one logical query against `R`'s relation.
///
/// Every mutator returns `&mut Self` for chaining and accepts its input
/// unconditionally. The ordering map sits behind its own read/write lock;
/// all other fields rely on `&mut self` for exclusive access.
#[derive(Debug)]
pub struct QueryBuilder<R: Record> {
    pub(crate) statement: Statement,
    pub(crate) payload: Vec<R>,
    pub(crate) columns: Vec<String>,
    pub(crate) count_column: String,
    pub(crate) distinct: bool,
    pub(crate) from: String,
    pub(crate) filter: String,
    pub(crate) and_filters: Vec<String>,
    pub(crate) or_filters: Vec<String>,
    pub(crate) having: String,
    pub(crate) and_having: Vec<String>,
    pub(crate) or_having: Vec<String>,
    pub(crate) order: RwLock<Vec<(String, String)>>,
    pub(crate) group_columns: Vec<String>,
    pub(crate) limit: i64,
    pub(crate) offset: i64,
    pub(crate) parameters: ParamList,
}

impl<R: Record> Default for QueryBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> QueryBuilder<R> {
    /// Create an empty builder bound to `R`.
    pub fn new() -> Self {
        Self {
            statement: Statement::default(),
            payload: Vec::new(),
            columns: Vec::new(),
            count_column: String::new(),
            distinct: false,
            from: String::new(),
            filter: String::new(),
            and_filters: Vec::new(),
            or_filters: Vec::new(),
            having: String::new(),
            and_having: Vec::new(),
            or_having: Vec::new(),
            order: RwLock::new(Vec::new()),
            group_columns: Vec::new(),
            limit: 0,
            offset: 0,
            parameters: ParamList::new(),
        }
    }

    /// Select the given columns; an empty slice means all mapped columns.
    ///
    /// Replaces any previously selected columns wholesale. Only names that
    /// are mapped on `R` are emitted at render time, in field declaration
    /// order.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.statement = Statement::Select;
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Count rows over the given column; `""` normalizes to `*`.
    pub fn count(&mut self, column: &str) -> &mut Self {
        self.statement = Statement::Count;
        self.count_column = if column.is_empty() {
            "*".to_string()
        } else {
            column.to_string()
        };
        self
    }

    /// Store records to insert or update on [`Query::execute`].
    ///
    /// Records with a zero identity are inserted, the rest updated. The
    /// payload is held untouched until execution; a successful
    /// [`Query::execute`] hands it back inside [`crate::Executed::Saved`] and
    /// returns the builder to its default select kind, so re-executing
    /// requires a fresh `save` call.
    pub fn save(&mut self, records: Vec<R>) -> &mut Self {
        self.statement = Statement::Save;
        self.payload = records;
        self
    }

    /// Delete rows matching the current filters on [`Query::execute`].
    pub fn delete(&mut self) -> &mut Self {
        self.statement = Statement::Delete;
        self
    }

    /// Set or clear the DISTINCT flag, independent of statement kind.
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Override the source relation for select and count statements.
    ///
    /// Write statements always target the relation derived from `R`.
    pub fn from(&mut self, from: &str) -> &mut Self {
        self.from = from.to_string();
        self
    }

    /// Set the primary WHERE expression.
    ///
    /// Clears any fragments accumulated via [`Self::and_where`] and
    /// [`Self::or_where`]; the primary expression and the incremental lists
    /// are mutually exclusive accumulation modes.
    pub fn where_expr(&mut self, expr: &str) -> &mut Self {
        self.and_filters.clear();
        self.or_filters.clear();
        self.filter = expr.to_string();
        self
    }

    /// Append a conjunctive WHERE fragment.
    pub fn and_where(&mut self, expr: &str) -> &mut Self {
        self.and_filters.push(expr.to_string());
        self
    }

    /// Append a disjunctive WHERE fragment.
    pub fn or_where(&mut self, expr: &str) -> &mut Self {
        self.or_filters.push(expr.to_string());
        self
    }

    /// Set the primary HAVING expression, clearing the and/or lists.
    pub fn having(&mut self, expr: &str) -> &mut Self {
        self.and_having.clear();
        self.or_having.clear();
        self.having = expr.to_string();
        self
    }

    /// Append a conjunctive HAVING fragment.
    pub fn and_having(&mut self, expr: &str) -> &mut Self {
        self.and_having.push(expr.to_string());
        self
    }

    /// Append a disjunctive HAVING fragment.
    pub fn or_having(&mut self, expr: &str) -> &mut Self {
        self.or_having.push(expr.to_string());
        self
    }

    /// Discard the whole ordering map and start over with one entry.
    pub fn order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);
        *order = vec![(column.to_string(), direction.to_string())];
        drop(order);
        self
    }

    /// Insert one ordering entry, keeping the rest.
    ///
    /// Re-inserting an existing column overwrites its direction in place;
    /// the entry keeps its original position.
    pub fn add_order_by(&mut self, column: &str, direction: &str) -> &mut Self {
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);
        match order.iter_mut().find(|(c, _)| c == column) {
            Some(entry) => entry.1 = direction.to_string(),
            None => order.push((column.to_string(), direction.to_string())),
        }
        drop(order);
        self
    }

    /// Replace the grouping column list wholesale.
    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.group_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Append grouping columns.
    pub fn add_group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.group_columns
            .extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Set the row limit; values ≤ 0 render no clause.
    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Set the row offset; values ≤ 0 render no clause.
    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Replace the bind parameter list wholesale.
    pub fn set_parameters(&mut self, params: impl IntoIterator<Item = Param>) -> &mut Self {
        self.parameters.clear();
        self.parameters.extend_params(params);
        self
    }

    /// Append bind parameters in order.
    pub fn add_parameters(&mut self, params: impl IntoIterator<Item = Param>) -> &mut Self {
        self.parameters.extend_params(params);
        self
    }

    /// Append a single bind parameter.
    pub fn bind<T: tokio_postgres::types::ToSql + Send + Sync + 'static>(
        &mut self,
        value: T,
    ) -> &mut Self {
        self.parameters.push(value);
        self
    }

    /// Restore every field to its zero value.
    ///
    /// The ordering map is swapped for a fresh empty one under the write
    /// lock, so a concurrent reader never observes a partially-cleared map.
    pub fn reset(&mut self) -> &mut Self {
        self.statement = Statement::default();
        self.payload = Vec::new();
        self.columns = Vec::new();
        self.count_column = String::new();
        self.distinct = false;
        self.from = String::new();
        self.filter = String::new();
        self.and_filters = Vec::new();
        self.or_filters = Vec::new();
        self.having = String::new();
        self.and_having = Vec::new();
        self.or_having = Vec::new();
        *self.order.write().unwrap_or_else(PoisonError::into_inner) = Vec::new();
        self.group_columns = Vec::new();
        self.limit = 0;
        self.offset = 0;
        self.parameters = ParamList::new();
        self
    }

    /// Obtain the rendering/execution view over the current state.
    pub fn query(&mut self) -> Query<'_, R> {
        Query::new(self)
    }
}
