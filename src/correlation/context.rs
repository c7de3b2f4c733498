use std::collections::HashMap;

/// Value reported for a key that is not present.
pub const ABSENT_VALUE: &str = "null";

/// Per-operation correlation values, such as the pet a publish call is about.
///
/// A context belongs to exactly one operation. It is created by (or for) that
/// operation and passed down explicitly; it is never shared between
/// concurrent operations, so one publish can never read another's values.
#[derive(Debug, Clone, Default)]
pub struct CorrelationContext {
    entries: HashMap<String, String>,
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_str())
    }

    /// Like [`get`](Self::get), but an absent key reads as `"null"`.
    pub fn get_or_null(&self, key: &str) -> &str {
        self.get(key).unwrap_or(ABSENT_VALUE)
    }

    pub fn clear(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set `key` for the lifetime of the returned scope.
    ///
    /// The entry is cleared when the scope is dropped, whichever way the
    /// enclosing code exits.
    pub fn scope(&mut self, key: impl Into<String>, value: impl Into<String>) -> CorrelationScope<'_> {
        let key = key.into();
        self.set(key.clone(), value);
        CorrelationScope { context: self, key }
    }
}

/// An entry in a [`CorrelationContext`] that is removed on drop.
pub struct CorrelationScope<'a> {
    context: &'a mut CorrelationContext,
    key: String,
}

impl CorrelationScope<'_> {
    /// The scoped value, or `"null"` if something cleared it early.
    pub fn value(&self) -> &str {
        self.context.get_or_null(&self.key)
    }

    pub fn context(&self) -> &CorrelationContext {
        self.context
    }
}

impl Drop for CorrelationScope<'_> {
    fn drop(&mut self) {
        self.context.clear(&self.key);
    }
}
