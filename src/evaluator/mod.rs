//! Tree-walking evaluator. Shares the same AST and `Object` runtime values
//! as the compiler/VM pair; this back end just interprets directly instead
//! of compiling first. `Object::ReturnValue`/`Object::Error` double as
//! control-flow carriers that unwind through nested blocks.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    BlockStatement, CallExpression, Expression, Identifier, IfExpression, Program, Statement,
};
use crate::object::{lookup_builtin, Environment, FunctionObject, HashPair, Object};

pub fn eval_program(program: &Program, env: &Environment) -> Object {
    let mut result = Object::Null;
    for statement in &program.statements {
        result = eval_statement(statement, env);
        match result {
            Object::ReturnValue(value) => return *value,
            Object::Error(_) => return result,
            _ => {}
        }
    }
    result
}

fn eval_block_statement(block: &BlockStatement, env: &Environment) -> Object {
    let mut result = Object::Null;
    for statement in &block.statements {
        result = eval_statement(statement, env);
        if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(statement: &Statement, env: &Environment) -> Object {
    match statement {
        Statement::Expression(stmt) => eval_expression(&stmt.expression, env),
        Statement::Return(stmt) => {
            let value = eval_expression(&stmt.value, env);
            if value.is_error() {
                return value;
            }
            Object::ReturnValue(Box::new(value))
        }
        Statement::Let(stmt) => {
            let value = eval_expression(&stmt.value, env);
            if value.is_error() {
                return value;
            }
            env.set(&stmt.name.value, value);
            Object::Null
        }
        Statement::Block(block) => eval_block_statement(block, env),
    }
}

fn eval_expression(expression: &Expression, env: &Environment) -> Object {
    match expression {
        Expression::IntegerLiteral(lit) => Object::Integer(lit.value),
        Expression::StringLiteral(lit) => Object::Str(Rc::from(lit.value.as_str())),
        Expression::BooleanLiteral(lit) => Object::Boolean(lit.value),
        Expression::Identifier(ident) => eval_identifier(ident, env),
        Expression::Prefix(expr) => {
            let right = eval_expression(&expr.right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix_expression(&expr.operator, right)
        }
        Expression::Infix(expr) => {
            let left = eval_expression(&expr.left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(&expr.right, env);
            if right.is_error() {
                return right;
            }
            eval_infix_expression(&expr.operator, left, right)
        }
        Expression::If(expr) => eval_if_expression(expr, env),
        Expression::FunctionLiteral(lit) => Object::Function(Rc::new(FunctionObject {
            parameters: lit.parameters.clone(),
            body: lit.body.clone(),
            env: env.clone(),
        })),
        Expression::Call(expr) => eval_call_expression(expr, env),
        Expression::ArrayLiteral(lit) => match eval_expressions(&lit.elements, env) {
            Ok(elements) => Object::Array(Rc::new(elements)),
            Err(err) => err,
        },
        Expression::HashLiteral(lit) => eval_hash_literal(&lit.pairs, env),
        Expression::Index(expr) => {
            let left = eval_expression(&expr.left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(&expr.index, env);
            if index.is_error() {
                return index;
            }
            eval_index_expression(left, index)
        }
    }
}

fn eval_identifier(ident: &Identifier, env: &Environment) -> Object {
    if let Some(value) = env.get(&ident.value) {
        return value;
    }
    if let Some((_, builtin)) = lookup_builtin(&ident.value) {
        return Object::Builtin(Rc::new(*builtin));
    }
    Object::error(format!("identifier not found: {}", ident.value))
}

fn eval_prefix_expression(operator: &str, right: Object) -> Object {
    match operator {
        "!" => Object::Boolean(!right.is_truthy()),
        "-" => match right {
            Object::Integer(value) => Object::Integer(-value),
            other => Object::error(format!("unknown operator: -{}", other.type_name())),
        },
        other => Object::error(format!("unknown operator: {other}{}", right.type_name())),
    }
}

fn eval_infix_expression(operator: &str, left: Object, right: Object) -> Object {
    match (&left, &right) {
        (Object::Integer(l), Object::Integer(r)) => eval_integer_infix_expression(operator, *l, *r),
        (Object::Str(l), Object::Str(r)) if operator == "+" => {
            Object::Str(Rc::from(format!("{l}{r}")))
        }
        _ if operator == "==" => Object::Boolean(left == right),
        _ if operator == "!=" => Object::Boolean(left != right),
        _ if left.type_name() != right.type_name() => Object::error(format!(
            "type mismatch: {} {operator} {}",
            left.type_name(),
            right.type_name()
        )),
        _ => Object::error(format!(
            "unknown operator: {} {operator} {}",
            left.type_name(),
            right.type_name()
        )),
    }
}

fn eval_integer_infix_expression(operator: &str, left: i64, right: i64) -> Object {
    match operator {
        "+" => Object::Integer(left + right),
        "-" => Object::Integer(left - right),
        "*" => Object::Integer(left * right),
        "/" => Object::Integer(left / right),
        "<" => Object::Boolean(left < right),
        ">" => Object::Boolean(left > right),
        "==" => Object::Boolean(left == right),
        "!=" => Object::Boolean(left != right),
        other => Object::error(format!("unknown operator: INTEGER {other} INTEGER")),
    }
}

fn eval_if_expression(expr: &IfExpression, env: &Environment) -> Object {
    let condition = eval_expression(&expr.condition, env);
    if condition.is_error() {
        return condition;
    }
    if condition.is_truthy() {
        eval_block_statement(&expr.consequence, env)
    } else if let Some(alternative) = &expr.alternative {
        eval_block_statement(alternative, env)
    } else {
        Object::Null
    }
}

fn eval_expressions(expressions: &[Expression], env: &Environment) -> Result<Vec<Object>, Object> {
    let mut result = Vec::with_capacity(expressions.len());
    for expression in expressions {
        let evaluated = eval_expression(expression, env);
        if evaluated.is_error() {
            return Err(evaluated);
        }
        result.push(evaluated);
    }
    Ok(result)
}

fn eval_call_expression(expr: &CallExpression, env: &Environment) -> Object {
    let function = eval_expression(&expr.function, env);
    if function.is_error() {
        return function;
    }
    let args = match eval_expressions(&expr.arguments, env) {
        Ok(args) => args,
        Err(err) => return err,
    };
    apply_function(function, args)
}

fn apply_function(function: Object, args: Vec<Object>) -> Object {
    match function {
        Object::Function(func) => {
            if args.len() != func.parameters.len() {
                return Object::error(format!(
                    "wrong number of arguments: want={}, got={}",
                    func.parameters.len(),
                    args.len()
                ));
            }
            let extended_env = Environment::enclosed(&func.env);
            for (param, arg) in func.parameters.iter().zip(args) {
                extended_env.set(&param.value, arg);
            }
            match eval_block_statement(&func.body, &extended_env) {
                Object::ReturnValue(value) => *value,
                other => other,
            }
        }
        Object::Builtin(builtin) => (builtin.func)(&args),
        other => Object::error(format!("not a function: {}", other.type_name())),
    }
}

fn eval_index_expression(left: Object, index: Object) -> Object {
    match (&left, &index) {
        (Object::Array(elements), Object::Integer(i)) => {
            if *i < 0 || *i as usize >= elements.len() {
                Object::Null
            } else {
                elements[*i as usize].clone()
            }
        }
        (Object::Hash(_), _) => eval_hash_index_expression(left, index),
        _ => Object::error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

fn eval_hash_index_expression(left: Object, index: Object) -> Object {
    let Object::Hash(pairs) = &left else {
        unreachable!("caller already matched on Object::Hash")
    };
    match index.hash_key() {
        Ok(key) => pairs.get(&key).map(|pair| pair.value.clone()).unwrap_or(Object::Null),
        Err(message) => Object::error(message),
    }
}

fn eval_hash_literal(pairs: &[(Expression, Expression)], env: &Environment) -> Object {
    let mut map = HashMap::with_capacity(pairs.len());
    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env);
        if key.is_error() {
            return key;
        }
        let value = eval_expression(value_expr, env);
        if value.is_error() {
            return value;
        }
        match key.hash_key() {
            Ok(hash_key) => {
                map.insert(hash_key, HashPair { key, value });
            }
            Err(message) => return Object::error(message),
        }
    }
    Object::Hash(Rc::new(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(source: &str) -> Object {
        let program = Parser::from_source(source).parse_program();
        let env = Environment::new();
        eval_program(&program, &env)
    }

    #[test]
    fn integer_and_boolean_expressions() {
        assert!(matches!(run("5 + 5 + 5 + 5 - 10"), Object::Integer(10)));
        assert!(matches!(run("2 * 2 * 2 * 2 * 2"), Object::Integer(32)));
        assert!(matches!(run("1 < 2 == true"), Object::Boolean(true)));
        assert!(matches!(run("!!5"), Object::Boolean(true)));
    }

    #[test]
    fn if_else_expressions() {
        assert!(matches!(run("if (true) { 10 }"), Object::Integer(10)));
        assert!(matches!(run("if (false) { 10 }"), Object::Null));
        assert!(matches!(run("if (1 > 2) { 10 } else { 20 }"), Object::Integer(20)));
    }

    #[test]
    fn return_statements_stop_execution_early() {
        let result = run(
            r#"
            if (10 > 1) {
                if (10 > 1) {
                    return 10;
                }
                return 1;
            }
            "#,
        );
        assert!(matches!(result, Object::Integer(10)));
    }

    #[test]
    fn error_handling_matches_expected_wording() {
        let cases = [
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            (
                "if (10 > 1) { true + false; }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            ("foobar", "identifier not found: foobar"),
        ];
        for (source, expected) in cases {
            match run(source) {
                Object::Error(message) => assert_eq!(&*message, expected),
                other => panic!("expected error for {source:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn let_statements_bind_values() {
        assert!(matches!(run("let a = 5; a;"), Object::Integer(5)));
        assert!(matches!(run("let a = 5 * 5; a;"), Object::Integer(25)));
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let result = run(
            r#"
            let newAdder = fn(x) {
                fn(y) { x + y };
            };
            let addTwo = newAdder(2);
            addTwo(3);
            "#,
        );
        assert!(matches!(result, Object::Integer(5)));
    }

    #[test]
    fn recursion_works_through_the_defining_environment() {
        let result = run(
            r#"
            let factorial = fn(n) {
                if (n == 0) { 1 } else { n * factorial(n - 1) }
            };
            factorial(5);
            "#,
        );
        assert!(matches!(result, Object::Integer(120)));
    }

    #[test]
    fn string_concatenation_and_len_builtin() {
        match run(r#""Hello" + " " + "World!""#) {
            Object::Str(s) => assert_eq!(&*s, "Hello World!"),
            other => panic!("expected string, got {other:?}"),
        }
        assert!(matches!(run(r#"len("hello")"#), Object::Integer(5)));
        match run("len(1)") {
            Object::Error(message) => {
                assert_eq!(&*message, "argument to `len` not supported, got INTEGER")
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn array_literals_and_indexing() {
        assert!(matches!(run("[1, 2 * 2, 3 + 3][1]"), Object::Integer(4)));
        assert!(matches!(run("[1, 2, 3][3]"), Object::Null));
    }

    #[test]
    fn hash_literals_and_indexing() {
        assert!(matches!(run(r#"{"one": 10 - 9}["one"]"#), Object::Integer(1)));
        match run("{1: 2}[fn(x) { x }]") {
            Object::Error(message) => assert_eq!(&*message, "unhashable as hash key: FUNCTION"),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
