//! Tagged tree of statements and expressions for M.
//!
//! Mirrors the teacher's one-struct-per-file layout; each node knows how to
//! render its own canonical, fully-parenthesised form so precedence can be
//! asserted on by `Display`/`to_string` alone.

mod expression;
mod program;
mod statement;

pub use expression::*;
pub use program::*;
pub use statement::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_to_string_concatenates_statements() {
        let program = Program {
            statements: vec![Statement::Let(LetStatement {
                name: Identifier {
                    value: "myVar".into(),
                },
                value: Expression::Identifier(Identifier {
                    value: "anotherVar".into(),
                }),
            })],
        };
        assert_eq!(program.to_string(), "let myVar = anotherVar;");
    }
}
