//! Statement rendering and execution.
//!
//! [`Query`] is a view over a [`QueryBuilder`]: it renders the accumulated
//! state into SQL text and runs the result against a connection. Rendering is
//! pure and reproducible byte-for-byte for identical state; every execution
//! call prepares a fresh statement, nothing is cached.

use crate::builder::{QueryBuilder, Statement};
use crate::client::GenericClient;
use crate::error::{QueryError, QueryResult};
use crate::param::Param;
use crate::record::Record;
use std::sync::PoisonError;
use tokio_postgres::types::ToSql;
use tracing::debug;

/// Internal rendering dispatch. `Save` is not a render kind: execution
/// re-dispatches it per record to `Insert` or `Update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RenderKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

/// Outcome of [`Query::execute`].
#[derive(Debug)]
pub enum Executed<R> {
    /// The saved payload, with database-generated identities assigned.
    Saved(Vec<R>),
    /// Number of rows removed.
    Deleted(u64),
}

/// A bulk-read failure carrying the records decoded before the error.
///
/// [`Query::get_results`] decodes rows in order; when one row fails, the
/// records decoded so far are handed back together with the error instead of
/// being dropped. Converts into a plain [`QueryError`] via `?` for callers
/// that have no use for the partial set.
#[derive(Debug)]
pub struct PartialResults<R> {
    /// Records decoded before the failure, in row order.
    pub records: Vec<R>,
    /// The error that stopped decoding.
    pub error: QueryError,
}

impl<R> PartialResults<R> {
    fn bare(error: QueryError) -> Self {
        Self {
            records: Vec::new(),
            error,
        }
    }
}

impl<R> From<PartialResults<R>> for QueryError {
    fn from(partial: PartialResults<R>) -> Self {
        partial.error
    }
}

/// Rendering and execution view over a [`QueryBuilder`].
pub struct Query<'a, R: Record> {
    builder: &'a mut QueryBuilder<R>,
}

impl<'a, R: Record> Query<'a, R> {
    pub(crate) fn new(builder: &'a mut QueryBuilder<R>) -> Self {
        Self { builder }
    }

    /// Render the current statement kind without executing.
    ///
    /// A `Save` builder renders its insert form; the update form is an
    /// execution detail of [`Query::execute`].
    pub fn get_sql(&self) -> String {
        let kind = match self.builder.statement {
            Statement::Select => RenderKind::Select,
            Statement::Count => RenderKind::Count,
            Statement::Save => RenderKind::Insert,
            Statement::Delete => RenderKind::Delete,
        };
        render(self.builder, kind)
    }

    /// Fetch all matching rows as records.
    ///
    /// Always renders a fresh select regardless of the stored statement
    /// kind, reusing the current column/filter/order/group/limit/offset
    /// state. Rows are decoded in order; on a decode failure the records
    /// decoded so far come back inside the [`PartialResults`] error.
    pub async fn get_results(
        &self,
        conn: &impl GenericClient,
    ) -> Result<Vec<R>, PartialResults<R>> {
        let sql = render(self.builder, RenderKind::Select);
        debug!(sql = %sql, "fetching rows");
        let stmt = conn
            .prepare_statement(&sql)
            .await
            .map_err(PartialResults::bare)?;
        let rows = conn
            .query_prepared(&stmt, &self.builder.parameters.as_refs())
            .await
            .map_err(PartialResults::bare)?;
        collect_decoded(rows.iter().map(R::from_row))
    }

    /// Fetch the first matching row as a record.
    ///
    /// Renders a fresh select like [`Query::get_results`]. Returns
    /// `QueryError::NotFound` when no row matches.
    pub async fn get_result(&self, conn: &impl GenericClient) -> QueryResult<R> {
        let sql = render(self.builder, RenderKind::Select);
        debug!(sql = %sql, "fetching row");
        let stmt = conn.prepare_statement(&sql).await?;
        let row = conn
            .query_one_prepared(&stmt, &self.builder.parameters.as_refs())
            .await?;
        R::from_row(&row)
    }

    /// Count matching rows.
    ///
    /// Always renders a fresh count head; the count column defaults to `*`
    /// unless [`QueryBuilder::count`] set one.
    pub async fn get_count(&self, conn: &impl GenericClient) -> QueryResult<i64> {
        let sql = render(self.builder, RenderKind::Count);
        debug!(sql = %sql, "counting rows");
        let stmt = conn.prepare_statement(&sql).await?;
        let row = conn
            .query_one_prepared(&stmt, &self.builder.parameters.as_refs())
            .await?;
        row.try_get(0)
            .map_err(|e| QueryError::decode("count", e.to_string()))
    }

    /// Check that the stored statement kind is executable.
    ///
    /// Only `Save` and `Delete` builders can be executed; anything else gets
    /// `QueryError::InvalidStatement`. [`Query::execute`] runs this check
    /// before touching the connection.
    pub fn validate(&self) -> QueryResult<()> {
        match self.builder.statement {
            Statement::Save | Statement::Delete => Ok(()),
            other => Err(QueryError::InvalidStatement(other)),
        }
    }

    /// Execute a `Save` or `Delete` statement.
    ///
    /// Any other statement kind fails [`Query::validate`] before touching the
    /// connection. Takes the client by mutable reference because `Save` runs
    /// inside a transaction of its own.
    pub async fn execute(self, client: &mut tokio_postgres::Client) -> QueryResult<Executed<R>> {
        self.validate()?;
        if self.builder.statement == Statement::Save {
            save(self.builder, client).await.map(Executed::Saved)
        } else {
            delete(self.builder, client).await.map(Executed::Deleted)
        }
    }
}

/// Decode row results in order, keeping everything decoded before a failure.
pub(crate) fn collect_decoded<R>(
    results: impl IntoIterator<Item = QueryResult<R>>,
) -> Result<Vec<R>, PartialResults<R>> {
    let mut records = Vec::new();
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(error) => return Err(PartialResults { records, error }),
        }
    }
    Ok(records)
}

async fn delete<R: Record>(
    builder: &QueryBuilder<R>,
    client: &tokio_postgres::Client,
) -> QueryResult<u64> {
    let sql = render(builder, RenderKind::Delete);
    debug!(sql = %sql, "deleting rows");
    let stmt = client.prepare_statement(&sql).await?;
    client
        .execute_prepared(&stmt, &builder.parameters.as_refs())
        .await
}

/// Insert-or-update the payload inside one transaction.
///
/// Records with a zero identity are inserted and their generated identity
/// read back via `RETURNING`; the rest are updated keyed on the identity
/// column. The first failure aborts the whole batch (the transaction guard
/// rolls back on drop). Generated identities are assigned onto the in-memory
/// records only after a successful commit, so memory never disagrees with
/// the store.
async fn save<R: Record>(
    builder: &mut QueryBuilder<R>,
    client: &mut tokio_postgres::Client,
) -> QueryResult<Vec<R>> {
    let insert_sql = render(builder, RenderKind::Insert);
    let update_sql = render(builder, RenderKind::Update);
    debug!(insert = %insert_sql, update = %update_sql, records = builder.payload.len(), "saving records");

    let tx = client
        .transaction()
        .await
        .map_err(QueryError::from_db_error)?;
    let insert_stmt = tx.prepare_statement(&insert_sql).await?;
    let update_stmt = tx.prepare_statement(&update_sql).await?;

    let mut generated: Vec<(usize, i64)> = Vec::new();
    for (idx, record) in builder.payload.iter().enumerate() {
        let mut params = record.values();
        if record.identity() == 0 {
            let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
            let row = tx.query_one_prepared(&insert_stmt, &refs).await?;
            let id: i64 = row
                .try_get(0)
                .map_err(|e| QueryError::decode(R::identity_column(), e.to_string()))?;
            generated.push((idx, id));
        } else {
            params.push(Param::new(record.identity()));
            let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
            tx.execute_prepared(&update_stmt, &refs).await?;
        }
    }

    tx.commit().await.map_err(QueryError::from_db_error)?;
    Ok(finish_save(builder, generated))
}

/// Post-commit bookkeeping for a save: assign generated identities, hand the
/// payload back, and return the builder to its default select kind so a
/// repeat `execute` fails validation instead of committing an empty batch.
pub(crate) fn finish_save<R: Record>(
    builder: &mut QueryBuilder<R>,
    generated: Vec<(usize, i64)>,
) -> Vec<R> {
    for (idx, id) in generated {
        builder.payload[idx].set_identity(id);
    }
    builder.statement = Statement::default();
    std::mem::take(&mut builder.payload)
}

/// Render the given kind from the builder state.
///
/// Select and count heads resolve columns against `R`'s mapped set; insert
/// and update heads are derived entirely from `R`'s column layout and render
/// without tail clauses. Select, count and delete share the tail assembly:
/// WHERE, ORDER BY, GROUP BY, HAVING, LIMIT, OFFSET, each omitted when its
/// inputs are empty.
pub(crate) fn render<R: Record>(builder: &QueryBuilder<R>, kind: RenderKind) -> String {
    // Write heads always target the derived relation; the `from` override
    // only feeds the select/count FROM clause.
    let mut sql = match kind {
        RenderKind::Select => select_head::<R>(builder),
        RenderKind::Count => count_head(builder),
        RenderKind::Insert => return insert_head::<R>(&R::relation()),
        RenderKind::Update => return update_head::<R>(&R::relation()),
        RenderKind::Delete => format!("DELETE FROM {}", R::relation()),
    };

    if matches!(kind, RenderKind::Select | RenderKind::Count) {
        sql.push_str(" FROM ");
        if builder.from.is_empty() {
            sql.push_str(&R::relation());
        } else {
            sql.push_str(&builder.from);
        }
    }

    push_predicates(
        &mut sql,
        "WHERE",
        &builder.filter,
        &builder.and_filters,
        &builder.or_filters,
    );

    {
        let order = builder
            .order
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (i, (column, direction)) in order.iter().enumerate() {
            sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(direction);
        }
    }

    for (i, column) in builder.group_columns.iter().enumerate() {
        sql.push_str(if i == 0 { " GROUP BY " } else { ", " });
        sql.push_str(column);
    }

    push_predicates(
        &mut sql,
        "HAVING",
        &builder.having,
        &builder.and_having,
        &builder.or_having,
    );

    if builder.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", builder.limit));
    }
    if builder.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", builder.offset));
    }

    sql
}

fn select_head<R: Record>(builder: &QueryBuilder<R>) -> String {
    let mut sql = String::from("SELECT ");
    if builder.distinct {
        sql.push_str("DISTINCT ");
    }
    let mut first = true;
    for column in R::COLUMNS {
        if !builder.columns.is_empty() && !builder.columns.iter().any(|c| c == column) {
            continue;
        }
        if !first {
            sql.push_str(", ");
        }
        sql.push_str(column);
        first = false;
    }
    sql
}

fn count_head<R: Record>(builder: &QueryBuilder<R>) -> String {
    let mut sql = String::from("SELECT COUNT(");
    if builder.distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(if builder.count_column.is_empty() {
        "*"
    } else {
        &builder.count_column
    });
    sql.push(')');
    sql
}

fn insert_head<R: Record>(table: &str) -> String {
    let mut sql = format!("INSERT INTO {table} (");
    for (i, column) in R::COLUMNS[1..].iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column);
    }
    sql.push_str(") VALUES (");
    for i in 1..R::COLUMNS.len() {
        if i > 1 {
            sql.push_str(", ");
        }
        sql.push_str(&format!("${i}"));
    }
    sql.push(')');
    sql.push_str(&format!(" RETURNING {}", R::COLUMNS[0]));
    sql
}

fn update_head<R: Record>(table: &str) -> String {
    let mut sql = format!("UPDATE {table} SET ");
    for (i, column) in R::COLUMNS[1..].iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&format!("{} = ${}", column, i + 1));
    }
    sql.push_str(&format!(
        " WHERE {} = ${}",
        R::COLUMNS[0],
        R::COLUMNS.len()
    ));
    sql
}

/// Assemble one predicate clause from a primary expression plus conjunctive
/// and disjunctive fragment lists.
///
/// The primary expression seeds the clause when set; otherwise the first
/// fragment does. Conjunctive fragments always join (and emit) before
/// disjunctive ones, regardless of original call interleaving.
fn push_predicates(
    sql: &mut String,
    keyword: &str,
    primary: &str,
    and_list: &[String],
    or_list: &[String],
) {
    let mut seeded = false;
    if !primary.is_empty() {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(primary);
        seeded = true;
    }
    for expr in and_list {
        if seeded {
            sql.push_str(" AND ");
        } else {
            sql.push(' ');
            sql.push_str(keyword);
            sql.push(' ');
            seeded = true;
        }
        sql.push_str(expr);
    }
    for expr in or_list {
        if seeded {
            sql.push_str(" OR ");
        } else {
            sql.push(' ');
            sql.push_str(keyword);
            sql.push(' ');
            seeded = true;
        }
        sql.push_str(expr);
    }
}
