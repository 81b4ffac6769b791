//! The fixed built-in surface: `len`, `type`, `puts`, `first`, `last`,
//! `rest`, `push`. Both back ends share this table — the evaluator looks it
//! up by name, the compiler pre-populates the symbol table with it in this
//! exact order so `GetBuiltin(index)` lines up on both sides.

use std::rc::Rc;

use once_cell::sync::Lazy;

use super::Object;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: fn(&[Object]) -> Object,
}

pub static BUILTINS: Lazy<Vec<Builtin>> = Lazy::new(|| {
    vec![
        Builtin {
            name: "len",
            func: builtin_len,
        },
        Builtin {
            name: "type",
            func: builtin_type,
        },
        Builtin {
            name: "puts",
            func: builtin_puts,
        },
        Builtin {
            name: "first",
            func: builtin_first,
        },
        Builtin {
            name: "last",
            func: builtin_last,
        },
        Builtin {
            name: "rest",
            func: builtin_rest,
        },
        Builtin {
            name: "push",
            func: builtin_push,
        },
    ]
});

/// Look up a built-in by name, returning its catalog index alongside it so
/// callers can emit `GetBuiltin(index)`.
pub fn lookup_builtin(name: &str) -> Option<(usize, &'static Builtin)> {
    BUILTINS
        .iter()
        .enumerate()
        .find(|(_, b)| b.name == name)
        .map(|(i, b)| (i, b))
}

fn wrong_arity(got: usize, want: usize) -> Object {
    Object::error(format!("wrong number of arguments. got={got}, want={want}"))
}

fn builtin_len(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Object::Str(s) => Object::Integer(s.chars().count() as i64),
        Object::Array(elements) => Object::Integer(elements.len() as i64),
        other => Object::error(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

fn builtin_type(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    Object::Str(Rc::from(args[0].type_name()))
}

fn builtin_puts(args: &[Object]) -> Object {
    for arg in args {
        println!("{arg}");
    }
    Object::Null
}

fn builtin_first(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Object::Array(elements) => elements.first().cloned().unwrap_or(Object::Null),
        other => Object::error(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Object::Array(elements) => elements.last().cloned().unwrap_or(Object::Null),
        other => Object::error(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Object::Array(elements) => {
            if elements.is_empty() {
                Object::Null
            } else {
                Object::Array(Rc::new(elements[1..].to_vec()))
            }
        }
        other => Object::error(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: &[Object]) -> Object {
    if args.len() != 2 {
        return wrong_arity(args.len(), 2);
    }
    match &args[0] {
        Object::Array(elements) => {
            let mut new_elements = elements.as_ref().clone();
            new_elements.push(args[1].clone());
            Object::Array(Rc::new(new_elements))
        }
        other => Object::error(format!(
            "`push` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_on_string_and_array() {
        assert!(matches!(
            builtin_len(&[Object::Str(Rc::from("four"))]),
            Object::Integer(4)
        ));
        assert!(matches!(
            builtin_len(&[Object::Array(Rc::new(vec![
                Object::Integer(1),
                Object::Integer(2)
            ]))]),
            Object::Integer(2)
        ));
    }

    #[test]
    fn len_rejects_unsupported_type() {
        let result = builtin_len(&[Object::Integer(1)]);
        match result {
            Object::Error(msg) => assert_eq!(&*msg, "argument to `len` not supported, got INTEGER"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn len_rejects_wrong_arity() {
        let result = builtin_len(&[Object::Integer(1), Object::Integer(2)]);
        match result {
            Object::Error(msg) => assert_eq!(&*msg, "wrong number of arguments. got=2, want=1"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn push_does_not_mutate_original_array() {
        let original = Rc::new(vec![Object::Integer(1)]);
        let pushed = builtin_push(&[Object::Array(original.clone()), Object::Integer(2)]);
        assert_eq!(original.len(), 1);
        match pushed {
            Object::Array(elements) => assert_eq!(elements.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn lookup_builtin_returns_stable_order() {
        let (idx, builtin) = lookup_builtin("len").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(builtin.name, "len");
        let (idx, builtin) = lookup_builtin("push").unwrap();
        assert_eq!(idx, 6);
        assert_eq!(builtin.name, "push");
        assert!(lookup_builtin("nope").is_none());
    }
}
