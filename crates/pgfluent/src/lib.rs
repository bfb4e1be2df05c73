//! # pgfluent
//!
//! A fluent, record-bound SQL statement builder for PostgreSQL.
//!
//! A [`QueryBuilder`] accumulates clause fragments through chained mutator
//! calls, renders them into deterministic SQL text with an ordered bind
//! parameter list, and executes the result against a `tokio_postgres`
//! connection, mapping rows back into typed records via the [`Record`]
//! trait.
//!
//! ## Example
//!
//! ```ignore
//! use pgfluent::{builder, Param, Record};
//!
//! let mut users = pgfluent::builder::<User>();
//!
//! // SELECT id, email FROM users WHERE id = $1
//! let user = users
//!     .select(&["id", "email"])
//!     .where_expr("id = $1")
//!     .bind(42_i64)
//!     .query()
//!     .get_result(&client)
//!     .await?;
//!
//! // Insert new records and update existing ones in one transaction.
//! users.reset();
//! let saved = users
//!     .save(vec![User { id: 0, email: "new@example.com".into() }])
//!     .query()
//!     .execute(&mut client)
//!     .await?;
//! ```
//!
//! The builder renders select, count and delete statements directly; a
//! `save` payload is split per record into inserts (zero identity) and
//! updates (non-zero identity) inside a single transaction.

pub mod builder;
pub mod client;
pub mod error;
pub mod param;
pub mod query;
pub mod record;

pub use builder::{QueryBuilder, Statement};
pub use client::GenericClient;
pub use error::{QueryError, QueryResult};
pub use param::{Param, ParamList};
pub use query::{Executed, PartialResults, Query};
pub use record::{Record, RowExt, pluralize};

/// Create an empty builder bound to the record type `R`.
///
/// # Example
/// ```ignore
/// let mut qb = pgfluent::builder::<User>();
/// qb.select(&[]).limit(10);
/// ```
pub fn builder<R: Record>() -> QueryBuilder<R> {
    QueryBuilder::new()
}
