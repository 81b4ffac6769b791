use std::fmt;

use crate::ast::BlockStatement;

use super::Identifier;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    /// Populated when the literal is the right-hand side of `let name = fn
    /// ...`, so recursive self-reference can be resolved without the name
    /// having to be looked up through the enclosing scope.
    pub name: Option<String>,
}

impl fmt::Display for FunctionLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        write!(f, "fn")?;
        if let Some(name) = &self.name {
            write!(f, "<{name}>")?;
        }
        write!(f, "({}) {{ {} }}", params.join(", "), self.body)
    }
}
