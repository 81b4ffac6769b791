use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError(String);

impl CompileError {
    pub(crate) fn unknown_identifier(name: &str) -> Self {
        Self(format!("undefined variable {name}"))
    }

    pub(crate) fn unknown_operator(operator: &str) -> Self {
        Self(format!("unknown operator: {operator}"))
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CompileError {}
