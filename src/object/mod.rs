//! Runtime values shared by both back ends, plus hashable keys, the
//! evaluator's lexical environment, and the built-in function surface.

mod builtins;
mod environment;
mod hash_key;

pub use builtins::{lookup_builtin, Builtin, BUILTINS};
pub use environment::Environment;
pub use hash_key::HashKey;

use std::fmt;
use std::rc::Rc;

use crate::ast::{BlockStatement, Identifier};
use crate::code::Instructions;

/// A compiled function body: an immutable instruction buffer plus the frame
/// shape the VM needs to set up locals at call time. Stored in the
/// constant pool; closures wrap one of these with captured values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A `CompiledFunction` plus whatever free variables were captured at the
/// `Closure` opcode's emission site.
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

/// The evaluator's notion of a function value: parameters, a body, and the
/// environment it closes over. Distinct from `CompiledFunction`/`Closure`,
/// which is the VM's representation of the same language-level concept.
#[derive(Debug, Clone)]
pub struct FunctionObject {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub env: Environment,
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    Null,
    Array(Rc<Vec<Object>>),
    Hash(Rc<std::collections::HashMap<HashKey, HashPair>>),
    Function(Rc<FunctionObject>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(Rc<Builtin>),
    Error(Rc<str>),
    ReturnValue(Box<Object>),
}

/// Function/Closure/Function-object values compare by identity (they have
/// no meaningful structural equality); everything else compares by value.
/// Mostly exercised by compiler/VM tests asserting on constant pools.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        use Object::*;
        match (self, other) {
            (Integer(a), Integer(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Null, Null) => true,
            (Array(a), Array(b)) => a == b,
            (Hash(a), Hash(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, pair)| {
                        b.get(key)
                            .is_some_and(|other_pair| pair.key == other_pair.key && pair.value == other_pair.value)
                    })
            }
            (CompiledFunction(a), CompiledFunction(b)) => a == b,
            (Closure(a), Closure(b)) => Rc::ptr_eq(a, b),
            (Builtin(a), Builtin(b)) => Rc::ptr_eq(a, b) || a.name == b.name,
            (Error(a), Error(b)) => a == b,
            (ReturnValue(a), ReturnValue(b)) => a == b,
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::Str(_) => "STRING",
            Object::Null => "NULL",
            Object::Array(_) => "ARRAY",
            Object::Hash(_) => "HASH",
            Object::Function(_) => "FUNCTION",
            Object::CompiledFunction(_) => "COMPILED_FUNCTION",
            Object::Closure(_) => "CLOSURE",
            Object::Builtin(_) => "BUILTIN",
            Object::Error(_) => "ERROR",
            Object::ReturnValue(_) => "RETURN_VALUE",
        }
    }

    /// `false` and `NULL` are falsy; everything else, including `0` and
    /// `""`, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    pub fn error(message: impl Into<String>) -> Object {
        Object::Error(Rc::from(message.into()))
    }

    /// Only `INTEGER`, `BOOLEAN`, and `STRING` are hashable.
    pub fn hash_key(&self) -> Result<HashKey, String> {
        match self {
            Object::Integer(value) => Ok(HashKey::Integer(*value)),
            Object::Boolean(value) => Ok(HashKey::Boolean(*value)),
            Object::Str(value) => Ok(HashKey::from_str(value)),
            other => Err(format!("unhashable as hash key: {}", other.type_name())),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{value}"),
            Object::Boolean(value) => write!(f, "{value}"),
            Object::Str(value) => write!(f, "{value}"),
            Object::Null => write!(f, "null"),
            Object::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Object::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Object::Function(func) => {
                let params: Vec<String> = func.parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) {{\n{}\n}}", params.join(", "), func.body)
            }
            Object::CompiledFunction(_) => write!(f, "CompiledFunction[{:p}]", self),
            Object::Closure(closure) => write!(f, "Closure[{:p}]", closure.as_ref()),
            Object::Builtin(builtin) => write!(f, "builtin function: {}", builtin.name),
            Object::Error(message) => write!(f, "ERROR: {message}"),
            Object::ReturnValue(value) => write!(f, "{value}"),
        }
    }
}
