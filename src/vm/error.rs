use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError(String);

impl VmError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub(crate) fn type_mismatch(operator: &str, left: &str, right: &str) -> Self {
        Self(format!(
            "type mismatch: {left} {operator} {right}"
        ))
    }

    pub(crate) fn unknown_operator(operator: &str, operand: &str) -> Self {
        Self(format!("unknown operator: {operator}{operand}"))
    }

    pub(crate) fn unknown_infix_operator(operator: &str, left: &str, right: &str) -> Self {
        Self(format!("unknown operator: {left} {operator} {right}"))
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for VmError {}
