//! Entry Key Module
//!
//! Composite identity of one cached entry.

use std::fmt;

use serde::Serialize;

// == Entry Key ==
/// The (region, key) pair addressing a single entry.
///
/// Kept as two fields so a region or key containing any separator character
/// can never collide with another pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryKey {
    region: String,
    key: String,
}

impl EntryKey {
    pub fn new(region: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            key: key.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_separator_in_names_does_not_collide() {
        let a = EntryKey::new("a_b", "c");
        let b = EntryKey::new("a", "b_c");
        assert_ne!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_accessors() {
        let k = EntryKey::new("region", "key");
        assert_eq!(k.region(), "region");
        assert_eq!(k.key(), "key");
        assert_eq!(k.to_string(), "region/key");
    }
}
