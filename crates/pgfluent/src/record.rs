//! Record introspection contract and row decoding helpers.

use crate::error::QueryResult;
use crate::param::Param;
use tokio_postgres::Row;

/// A typed value whose fields map to database columns.
///
/// Implementations enumerate their mapped columns in field declaration order.
/// The first column is the identity (primary key); an identity of `0` marks a
/// record that has not been persisted yet.
pub trait Record: Sized + Send + Sync {
    /// Bare type name, used to derive the relation name.
    const NAME: &'static str;

    /// Mapped column names in field declaration order, identity first.
    ///
    /// Must be non-empty. Fields without a column mapping are simply not
    /// listed here.
    const COLUMNS: &'static [&'static str];

    /// Relation name: the lower-cased, pluralized type name.
    fn relation() -> String {
        pluralize(&Self::NAME.to_lowercase())
    }

    /// Name of the identity column.
    fn identity_column() -> &'static str {
        Self::COLUMNS[0]
    }

    /// Current identity value; `0` means not yet persisted.
    fn identity(&self) -> i64;

    /// Assign a database-generated identity.
    fn set_identity(&mut self, id: i64);

    /// Non-identity column values, in declaration order.
    fn values(&self) -> Vec<Param>;

    /// Decode a result row into a record.
    ///
    /// Rows from a narrowed column list may not carry every mapped column;
    /// use [`RowExt::get_or_default`] so absent columns fall back to the
    /// field's default value.
    fn from_row(row: &Row) -> QueryResult<Self>;
}

/// Row access helpers with column-level decode errors.
pub trait RowExt {
    /// Get a column value, returning `QueryError::Decode` on failure.
    fn try_get_column<T>(&self, column: &str) -> QueryResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;

    /// Get a column value, or the type's default when the column is not part
    /// of the row at all.
    fn get_or_default<T>(&self, column: &str) -> QueryResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a> + Default;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> QueryResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| crate::error::QueryError::decode(column, e.to_string()))
    }

    fn get_or_default<T>(&self, column: &str) -> QueryResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a> + Default,
    {
        if self.columns().iter().any(|c| c.name() == column) {
            self.try_get_column(column)
        } else {
            Ok(T::default())
        }
    }
}

/// Naive English pluralization for relation names.
pub fn pluralize(base: &str) -> String {
    if base.ends_with('y')
        && base.len() > 1
        && !matches!(
            base.chars().nth(base.len() - 2),
            Some('a' | 'e' | 'i' | 'o' | 'u')
        )
    {
        format!("{}ies", &base[..base.len() - 1])
    } else if base.ends_with('s')
        || base.ends_with('x')
        || base.ends_with('z')
        || base.ends_with("ch")
        || base.ends_with("sh")
    {
        format!("{base}es")
    } else {
        format!("{base}s")
    }
}

#[cfg(test)]
mod tests {
    use super::pluralize;

    #[test]
    fn pluralize_regular_noun() {
        assert_eq!(pluralize("user"), "users");
    }

    #[test]
    fn pluralize_consonant_y() {
        assert_eq!(pluralize("category"), "categories");
    }

    #[test]
    fn pluralize_vowel_y() {
        assert_eq!(pluralize("day"), "days");
    }

    #[test]
    fn pluralize_sibilant_endings() {
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("batch"), "batches");
    }
}
