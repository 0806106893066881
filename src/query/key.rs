//! Query keys
//!
//! A [`QueryKey`] is an ordered sequence of tokens, e.g.
//! `["environments", "5", "dashboard"]`. Equal keys address the same cache
//! entry and invalidation works on key prefixes.

use std::fmt;

/// Ordered token sequence identifying a cached query
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Build a key from its tokens
    ///
    /// Tokens are compared as strings, so `5` and `"5"` are the same token.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self(parts.into_iter().map(|p| p.to_string()).collect())
    }

    /// Key with a single token
    pub fn root(part: impl ToString) -> Self {
        Self(vec![part.to_string()])
    }

    /// Extend the key with one more token
    pub fn with(mut self, part: impl ToString) -> Self {
        self.0.push(part.to_string());
        self
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `prefix` matches the leading tokens of this key
    ///
    /// The empty key is a prefix of every key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: ToString> FromIterator<S> for QueryKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Build a [`QueryKey`] from heterogeneous tokens
///
/// ```ignore
/// let key = query_key!["environments", environment_id, "dashboard"];
/// ```
#[macro_export]
macro_rules! query_key {
    () => {
        $crate::query::QueryKey::default()
    };
    ($($part:expr),+ $(,)?) => {
        $crate::query::QueryKey::new([$(::std::string::ToString::to_string(&$part)),+])
    };
}
