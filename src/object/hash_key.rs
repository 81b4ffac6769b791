use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A canonical `(type-tag, 64-bit value)` pair used to key a language-level
/// hash. Only `Integer`, `Boolean`, and `Str` values produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    Str(u64),
}

impl HashKey {
    /// `DefaultHasher` is deterministic across runs (unlike `HashMap`'s
    /// randomized `RandomState`), so equal strings always produce equal
    /// keys, which is all the language guarantees.
    pub fn from_str(value: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        HashKey::Str(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_hash_equal() {
        assert_eq!(HashKey::from_str("abc"), HashKey::from_str("abc"));
        assert_ne!(HashKey::from_str("abc"), HashKey::from_str("abd"));
    }
}
