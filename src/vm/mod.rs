//! The stack machine that executes `compiler::Bytecode`. Shares the same
//! `Object` runtime values and built-in surface as the tree-walking
//! evaluator; only the execution strategy differs.

mod error;
mod frame;

pub use error::VmError;
pub use frame::Frame;

use std::rc::Rc;

use log::debug;

use crate::code::{read_u16, Opcode};
use crate::compiler::Bytecode;
use crate::object::{Builtin, Closure, CompiledFunction, HashPair, Object, BUILTINS};

const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
const MAX_FRAMES: usize = 1024;

pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_global_store(bytecode, vec![Object::Null; GLOBALS_SIZE])
    }

    /// Used by the REPL: each line compiles into its own `Bytecode`, but the
    /// global slots persist across lines.
    pub fn with_global_store(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_fn,
            free: Vec::new(),
        });
        let main_frame = Frame::new(main_closure, 0);

        Self {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![main_frame],
        }
    }

    pub fn globals(&self) -> &[Object] {
        &self.globals
    }

    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    pub fn last_popped_stack_element(&self) -> Object {
        self.stack[self.sp].clone()
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            let exhausted = {
                let frame = self.current_frame();
                (frame.ip + 1) as usize >= frame.instructions().len()
            };
            if exhausted {
                break;
            }
            self.advance_ip(1);

            let op_byte = {
                let frame = self.current_frame();
                frame.instructions().0[frame.ip as usize]
            };
            let op = Opcode::from_byte(op_byte)
                .ok_or_else(|| VmError::new(format!("unknown opcode {op_byte}")))?;

            match op {
                Opcode::Constant => {
                    let idx = self.read_operand_u16() as usize;
                    self.advance_ip(2);
                    self.push(self.constants[idx].clone())?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }
                Opcode::Bang => self.execute_bang()?,
                Opcode::Minus => self.execute_minus()?,
                Opcode::True => self.push(Object::Boolean(true))?,
                Opcode::False => self.push(Object::Boolean(false))?,
                Opcode::Null => self.push(Object::Null)?,
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::JumpNotTruthy => {
                    let pos = self.read_operand_u16() as usize;
                    self.advance_ip(2);
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.set_ip(pos as isize - 1);
                    }
                }
                Opcode::Jump => {
                    let pos = self.read_operand_u16() as usize;
                    self.set_ip(pos as isize - 1);
                }
                Opcode::SetGlobal => {
                    let idx = self.read_operand_u16() as usize;
                    self.advance_ip(2);
                    let value = self.pop()?;
                    self.globals[idx] = value;
                }
                Opcode::GetGlobal => {
                    let idx = self.read_operand_u16() as usize;
                    self.advance_ip(2);
                    self.push(self.globals[idx].clone())?;
                }
                Opcode::SetLocal => {
                    let idx = self.read_operand_u8() as usize;
                    self.advance_ip(1);
                    let base = self.current_frame().base_pointer;
                    let value = self.pop()?;
                    self.stack[base + idx] = value;
                }
                Opcode::GetLocal => {
                    let idx = self.read_operand_u8() as usize;
                    self.advance_ip(1);
                    let base = self.current_frame().base_pointer;
                    self.push(self.stack[base + idx].clone())?;
                }
                Opcode::GetBuiltin => {
                    let idx = self.read_operand_u8() as usize;
                    self.advance_ip(1);
                    let builtin = BUILTINS[idx];
                    self.push(Object::Builtin(Rc::new(builtin)))?;
                }
                Opcode::GetFree => {
                    let idx = self.read_operand_u8() as usize;
                    self.advance_ip(1);
                    let value = self.current_frame().closure.free[idx].clone();
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = self.current_frame().closure.clone();
                    self.push(Object::Closure(closure))?;
                }
                Opcode::Array => {
                    let n = self.read_operand_u16() as usize;
                    self.advance_ip(2);
                    let elements = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    self.push(Object::Array(Rc::new(elements)))?;
                }
                Opcode::Hash => {
                    let n = self.read_operand_u16() as usize;
                    self.advance_ip(2);
                    self.build_hash(n)?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index(left, index)?;
                }
                Opcode::Call => {
                    let num_args = self.read_operand_u8() as usize;
                    self.advance_ip(1);
                    self.execute_call(num_args)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop()?;
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(Object::Null)?;
                }
                Opcode::Closure => {
                    let (const_index, num_free) = {
                        let frame = self.current_frame();
                        let ip = frame.ip as usize;
                        let ins = &frame.instructions().0;
                        (
                            read_u16(&ins[ip + 1..ip + 3]) as usize,
                            ins[ip + 3] as usize,
                        )
                    };
                    self.advance_ip(3);
                    self.push_closure(const_index, num_free)?;
                }
            }
        }

        Ok(())
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<(), VmError> {
        let func = match &self.constants[const_index] {
            Object::CompiledFunction(func) => func.clone(),
            other => {
                return Err(VmError::new(format!(
                    "not a function: {}",
                    other.type_name()
                )))
            }
        };
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Object::Closure(Rc::new(Closure { func, free })))
    }

    fn build_hash(&mut self, n: usize) -> Result<(), VmError> {
        let mut pairs = std::collections::HashMap::new();
        let mut i = self.sp - n;
        while i < self.sp {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key.hash_key().map_err(VmError::new)?;
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }
        self.sp -= n;
        self.push(Object::Hash(Rc::new(pairs)))
    }

    fn execute_index(&mut self, left: Object, index: Object) -> Result<(), VmError> {
        match (&left, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    self.push(Object::Null)
                } else {
                    self.push(elements[*i as usize].clone())
                }
            }
            (Object::Hash(pairs), _) => {
                let key = index.hash_key().map_err(VmError::new)?;
                match pairs.get(&key) {
                    Some(pair) => self.push(pair.value.clone()),
                    None => self.push(Object::Null),
                }
            }
            _ => Err(VmError::new(format!(
                "index operator not supported: {}",
                left.type_name()
            ))),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), VmError> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::Builtin(builtin) => self.call_builtin(builtin, num_args),
            other => Err(VmError::new(format!(
                "calling non-function and non-built-in: {}",
                other.type_name()
            ))),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> Result<(), VmError> {
        if num_args != closure.func.num_parameters {
            return Err(VmError::new(format!(
                "wrong number of arguments: want={}, got={num_args}",
                closure.func.num_parameters
            )));
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::new("stack overflow"));
        }

        let num_locals = closure.func.num_locals;
        let base_pointer = self.sp - num_args;
        self.sp = base_pointer + num_locals;
        debug!("entering frame {} at base pointer {base_pointer}", self.frames.len());
        self.push_frame(Frame::new(closure, base_pointer));
        Ok(())
    }

    fn call_builtin(&mut self, builtin: Rc<Builtin>, num_args: usize) -> Result<(), VmError> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args);
        self.sp = self.sp - num_args - 1;
        self.push(result)
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop()?;
        let left = self.pop()?;
        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let result = match op {
                    Opcode::Add => l + r,
                    Opcode::Sub => l - r,
                    Opcode::Mul => l * r,
                    Opcode::Div => l / r,
                    _ => unreachable!("execute_binary_operation only handles arithmetic opcodes"),
                };
                self.push(Object::Integer(result))
            }
            (Object::Str(l), Object::Str(r)) if op == Opcode::Add => {
                self.push(Object::Str(Rc::from(format!("{l}{r}"))))
            }
            _ => Err(VmError::type_mismatch(
                opcode_symbol(op),
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop()?;
        let left = self.pop()?;
        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let result = match op {
                    Opcode::Equal => l == r,
                    Opcode::NotEqual => l != r,
                    Opcode::GreaterThan => l > r,
                    _ => unreachable!("execute_comparison only handles comparison opcodes"),
                };
                self.push(Object::Boolean(result))
            }
            _ => match op {
                Opcode::Equal => self.push(Object::Boolean(left == right)),
                Opcode::NotEqual => self.push(Object::Boolean(left != right)),
                _ => Err(VmError::unknown_infix_operator(
                    opcode_symbol(op),
                    left.type_name(),
                    right.type_name(),
                )),
            },
        }
    }

    fn execute_bang(&mut self) -> Result<(), VmError> {
        let operand = self.pop()?;
        self.push(Object::Boolean(!operand.is_truthy()))
    }

    fn execute_minus(&mut self) -> Result<(), VmError> {
        let operand = self.pop()?;
        match operand {
            Object::Integer(value) => self.push(Object::Integer(-value)),
            other => Err(VmError::unknown_operator("-", other.type_name())),
        }
    }

    fn push(&mut self, object: Object) -> Result<(), VmError> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::new("stack overflow"));
        }
        self.stack[self.sp] = object;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Object, VmError> {
        if self.sp == 0 {
            return Err(VmError::new("stack underflow"));
        }
        self.sp -= 1;
        Ok(std::mem::replace(&mut self.stack[self.sp], Object::Null))
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("cannot pop the last frame")
    }

    fn advance_ip(&mut self, n: isize) {
        self.frames.last_mut().expect("frame stack is never empty").ip += n;
    }

    fn set_ip(&mut self, ip: isize) {
        self.frames.last_mut().expect("frame stack is never empty").ip = ip;
    }

    fn read_operand_u16(&self) -> u16 {
        let frame = self.current_frame();
        let ip = frame.ip as usize;
        read_u16(&frame.instructions().0[ip + 1..ip + 3])
    }

    fn read_operand_u8(&self) -> u8 {
        let frame = self.current_frame();
        let ip = frame.ip as usize;
        frame.instructions().0[ip + 1]
    }
}

fn opcode_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::parser::Parser;

    fn run_vm(source: &str) -> Object {
        let program = Parser::from_source(source).parse_program();
        let mut compiler = Compiler::new();
        compiler.compile_program(&program).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("vm error");
        vm.last_popped_stack_element()
    }

    fn run_vm_err(source: &str) -> VmError {
        let program = Parser::from_source(source).parse_program();
        let mut compiler = Compiler::new();
        compiler.compile_program(&program).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect_err("expected a vm error")
    }

    #[test]
    fn integer_arithmetic() {
        assert!(matches!(run_vm("1 + 2"), Object::Integer(3)));
        assert!(matches!(run_vm("50 / 2 * 2 + 10 - 5"), Object::Integer(55)));
        assert!(matches!(run_vm("5 * (2 + 10)"), Object::Integer(60)));
    }

    #[test]
    fn boolean_and_comparison_expressions() {
        assert!(matches!(run_vm("1 < 2"), Object::Boolean(true)));
        assert!(matches!(run_vm("1 > 2"), Object::Boolean(false)));
        assert!(matches!(run_vm("(1 < 2) == true"), Object::Boolean(true)));
    }

    #[test]
    fn conditionals_without_else_yield_null() {
        assert!(matches!(run_vm("if (false) { 10 }"), Object::Null));
        assert!(matches!(run_vm("if (1 > 2) { 10 } else { 20 }"), Object::Integer(20)));
    }

    #[test]
    fn global_let_statements_round_trip() {
        assert!(matches!(run_vm("let one = 1; let two = one + one; one + two"), Object::Integer(3)));
    }

    #[test]
    fn string_concatenation() {
        match run_vm(r#""mon" + "key" + "banana""#) {
            Object::Str(s) => assert_eq!(&*s, "monkeybanana"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn array_and_index_expressions() {
        assert!(matches!(run_vm("[1, 2, 3][1]"), Object::Integer(2)));
        assert!(matches!(run_vm("[1, 2, 3][99]"), Object::Null));
    }

    #[test]
    fn hash_literal_and_index_expressions() {
        assert!(matches!(run_vm("{1: 2, 2: 3}[2]"), Object::Integer(3)));
        assert!(matches!(run_vm("{1: 2}[5]"), Object::Null));
    }

    #[test]
    fn calling_functions_with_locals_and_return() {
        let result = run_vm(
            r#"
            let fivePlusTen = fn() { 5 + 10; };
            fivePlusTen();
            "#,
        );
        assert!(matches!(result, Object::Integer(15)));

        let no_return = run_vm("let noop = fn() { }; noop();");
        assert!(matches!(no_return, Object::Null));
    }

    #[test]
    fn first_class_functions_and_arguments() {
        let result = run_vm(
            r#"
            let identity = fn(a) { a; };
            identity(4);
            "#,
        );
        assert!(matches!(result, Object::Integer(4)));

        let sum = run_vm(
            r#"
            let sum = fn(a, b) {
                let c = a + b;
                c;
            };
            sum(1, 2);
            "#,
        );
        assert!(matches!(sum, Object::Integer(3)));
    }

    #[test]
    fn closures_capture_free_variables() {
        let result = run_vm(
            r#"
            let newAdder = fn(a) {
                fn(b) { a + b; };
            };
            let addTwo = newAdder(2);
            addTwo(3);
            "#,
        );
        assert!(matches!(result, Object::Integer(5)));
    }

    #[test]
    fn recursive_functions_terminate() {
        let result = run_vm(
            r#"
            let countdown = fn(x) {
                if (x == 0) {
                    0
                } else {
                    countdown(x - 1);
                }
            };
            countdown(3);
            "#,
        );
        assert!(matches!(result, Object::Integer(0)));
    }

    #[test]
    fn builtin_len_and_array_helpers() {
        assert!(matches!(run_vm(r#"len("four")"#), Object::Integer(4)));
        assert!(matches!(run_vm("len([1, 2, 3])"), Object::Integer(3)));

        let rest = run_vm("len(rest([1, 2, 3]))");
        assert!(matches!(rest, Object::Integer(2)));
    }

    #[test]
    fn wrong_number_of_arguments_is_a_runtime_error() {
        let err = run_vm_err("let f = fn(a, b) { a + b; }; f(1);");
        assert_eq!(err.to_string(), "wrong number of arguments: want=2, got=1");
    }

    #[test]
    fn indexing_with_an_unhashable_key_is_a_runtime_error() {
        let err = run_vm_err("{1: 2}[fn(x) { x }]");
        assert_eq!(err.to_string(), "unhashable as hash key: CLOSURE");
    }
}
