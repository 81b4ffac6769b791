use std::fmt;

use super::Expression;

/// `{ k1: v1, k2: v2, ... }` — pairs are kept in source order; the language
/// itself has no observable iteration order, but parsing preserves it so a
/// deterministic downstream pass (the compiler) can choose its own order.
#[derive(Debug, Clone, PartialEq)]
pub struct HashLiteral {
    pub pairs: Vec<(Expression, Expression)>,
}

impl fmt::Display for HashLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}
