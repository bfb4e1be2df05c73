//! Ordered parameter storage for rendered statements.

use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A clone-friendly bind parameter wrapper using Arc.
///
/// Builders hold parameters by value so a statement can be rendered and
/// executed any number of times without re-binding.
#[derive(Clone)]
pub struct Param(Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Create a new parameter from any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Get a reference to the inner value as a ToSql trait object.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        // Arc<dyn ToSql + Send + Sync> -> &(dyn ToSql + Sync), only drops Send
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Param").field(&"<dyn ToSql>").finish()
    }
}

/// An ordered list of bind parameters.
///
/// Order is significant: entry `i` binds to the `i + 1`-th placeholder of the
/// rendered statement.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Append a value, returning its 1-based placeholder index.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> usize {
        self.params.push(Param::new(value));
        self.params.len()
    }

    /// Current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get all parameters as references for tokio-postgres.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Append pre-wrapped parameters in order.
    pub fn extend_params(&mut self, params: impl IntoIterator<Item = Param>) {
        self.params.extend(params);
    }

    /// Clear all parameters.
    pub fn clear(&mut self) {
        self.params.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_returns_placeholder_index() {
        let mut params = ParamList::new();
        assert_eq!(params.push(1_i64), 1);
        assert_eq!(params.push("two"), 2);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn as_refs_preserves_order() {
        let mut params = ParamList::new();
        params.push(10_i64);
        params.push("a");
        params.push(false);
        assert_eq!(params.as_refs().len(), 3);
    }

    #[test]
    fn clear_empties_the_list() {
        let mut params = ParamList::new();
        params.push(1_i32);
        params.clear();
        assert!(params.is_empty());
    }
}
