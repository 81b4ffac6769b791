mod array_literal;
mod call_expression;
mod function_literal;
mod hash_literal;
mod identifier;
mod if_expression;
mod index_expression;
mod infix_expression;
mod literal;
mod prefix_expression;

pub use array_literal::*;
pub use call_expression::*;
pub use function_literal::*;
pub use hash_literal::*;
pub use identifier::*;
pub use if_expression::*;
pub use index_expression::*;
pub use infix_expression::*;
pub use literal::*;
pub use prefix_expression::*;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    IntegerLiteral(IntegerLiteral),
    StringLiteral(StringLiteral),
    BooleanLiteral(BooleanLiteral),
    ArrayLiteral(ArrayLiteral),
    HashLiteral(HashLiteral),
    Prefix(PrefixExpression),
    Infix(InfixExpression),
    If(IfExpression),
    FunctionLiteral(FunctionLiteral),
    Call(CallExpression),
    Index(IndexExpression),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(e) => write!(f, "{e}"),
            Expression::IntegerLiteral(e) => write!(f, "{e}"),
            Expression::StringLiteral(e) => write!(f, "{e}"),
            Expression::BooleanLiteral(e) => write!(f, "{e}"),
            Expression::ArrayLiteral(e) => write!(f, "{e}"),
            Expression::HashLiteral(e) => write!(f, "{e}"),
            Expression::Prefix(e) => write!(f, "{e}"),
            Expression::Infix(e) => write!(f, "{e}"),
            Expression::If(e) => write!(f, "{e}"),
            Expression::FunctionLiteral(e) => write!(f, "{e}"),
            Expression::Call(e) => write!(f, "{e}"),
            Expression::Index(e) => write!(f, "{e}"),
        }
    }
}
