//! Generic client trait for unified database access.

use crate::error::{QueryError, QueryResult};
use tokio_postgres::Row;
use tokio_postgres::Statement;
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
///
/// Execution always goes through a freshly prepared statement, so this seam
/// covers exactly that surface. Read paths accept either a direct client
/// connection or a caller-managed transaction.
pub trait GenericClient: Send + Sync {
    /// Prepare a statement on this connection.
    ///
    /// Prepared statements are per-connection and must not be used across
    /// connections.
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = QueryResult<Statement>> + Send;

    /// Execute a prepared statement and return all rows.
    fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = QueryResult<Vec<Row>>> + Send;

    /// Execute a prepared statement and return the first row.
    ///
    /// Returns `QueryError::NotFound` if no rows are returned.
    fn query_one_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = QueryResult<Row>> + Send {
        async move {
            let rows = self.query_prepared(stmt, params).await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| QueryError::not_found("Expected one row, got none"))
        }
    }

    /// Execute a prepared statement and return affected row count.
    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn prepare_statement(&self, sql: &str) -> QueryResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(QueryError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> QueryResult<Vec<Row>> {
        tokio_postgres::Client::query(self, stmt, params)
            .await
            .map_err(QueryError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> QueryResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(QueryError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn prepare_statement(&self, sql: &str) -> QueryResult<Statement> {
        tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(QueryError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> QueryResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, stmt, params)
            .await
            .map_err(QueryError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> QueryResult<u64> {
        tokio_postgres::Transaction::execute(self, stmt, params)
            .await
            .map_err(QueryError::from_db_error)
    }
}
