//! Walks the AST once and emits bytecode plus a constant pool. Mirrors the
//! tree-walking evaluator's semantics exactly, just compiled ahead of time
//! instead of interpreted on the fly.

mod error;
mod scope;

pub use error::CompileError;
pub use scope::{CompilationScope, EmittedInstruction};

use std::rc::Rc;

use log::debug;

use crate::ast::{Expression, Program, Statement};
use crate::code::{make, Instructions, Opcode};
use crate::object::{CompiledFunction, Object, BUILTINS};
use crate::symbol_table::{SymbolScope, SymbolTable};

#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }

        Self {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::new()],
            scope_index: 0,
        }
    }

    /// Resume compiling into an existing constant pool and symbol table,
    /// so a REPL can compile one line at a time without losing previously
    /// defined globals.
    pub fn with_state(constants: Vec<Object>, symbol_table: SymbolTable) -> Self {
        Self {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::new()],
            scope_index: 0,
        }
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn constants(&self) -> &[Object] {
        &self.constants
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn compile_program(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(stmt) => {
                self.compile_expression(&stmt.expression)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let(stmt) => {
                let symbol = self.symbol_table.define(&stmt.name.value);
                self.compile_expression(&stmt.value)?;
                match symbol.scope {
                    SymbolScope::Global => {
                        self.emit(Opcode::SetGlobal, &[symbol.index]);
                    }
                    _ => {
                        self.emit(Opcode::SetLocal, &[symbol.index]);
                    }
                }
            }
            Statement::Return(stmt) => {
                self.compile_expression(&stmt.value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
            Statement::Block(block) => {
                for statement in &block.statements {
                    self.compile_statement(statement)?;
                }
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::IntegerLiteral(lit) => {
                let constant = self.add_constant(Object::Integer(lit.value));
                self.emit(Opcode::Constant, &[constant]);
            }
            Expression::StringLiteral(lit) => {
                let constant = self.add_constant(Object::Str(Rc::from(lit.value.as_str())));
                self.emit(Opcode::Constant, &[constant]);
            }
            Expression::BooleanLiteral(lit) => {
                if lit.value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }
            Expression::ArrayLiteral(lit) => {
                for element in &lit.elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[lit.elements.len()]);
            }
            Expression::HashLiteral(lit) => {
                let mut pairs = lit.pairs.clone();
                pairs.sort_by(|(a, _), (b, _)| a.to_string().cmp(&b.to_string()));
                for (key, value) in &pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expression::Prefix(expr) => {
                self.compile_expression(&expr.right)?;
                match expr.operator.as_str() {
                    "!" => {
                        self.emit(Opcode::Bang, &[]);
                    }
                    "-" => {
                        self.emit(Opcode::Minus, &[]);
                    }
                    other => return Err(CompileError::unknown_operator(other)),
                }
            }
            Expression::Infix(expr) => {
                if expr.operator == "<" {
                    self.compile_expression(&expr.right)?;
                    self.compile_expression(&expr.left)?;
                    self.emit(Opcode::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(&expr.left)?;
                self.compile_expression(&expr.right)?;
                match expr.operator.as_str() {
                    "+" => {
                        self.emit(Opcode::Add, &[]);
                    }
                    "-" => {
                        self.emit(Opcode::Sub, &[]);
                    }
                    "*" => {
                        self.emit(Opcode::Mul, &[]);
                    }
                    "/" => {
                        self.emit(Opcode::Div, &[]);
                    }
                    ">" => {
                        self.emit(Opcode::GreaterThan, &[]);
                    }
                    "==" => {
                        self.emit(Opcode::Equal, &[]);
                    }
                    "!=" => {
                        self.emit(Opcode::NotEqual, &[]);
                    }
                    other => return Err(CompileError::unknown_operator(other)),
                }
            }
            Expression::If(expr) => {
                self.compile_expression(&expr.condition)?;

                let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[9999]);
                self.compile_statement(&Statement::Block(expr.consequence.clone()))?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }

                let jump_pos = self.emit(Opcode::Jump, &[9999]);
                let after_consequence_pos = self.current_instructions().len();
                self.change_operand(jump_not_truthy_pos, after_consequence_pos);

                match &expr.alternative {
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                    Some(alternative) => {
                        self.compile_statement(&Statement::Block(alternative.clone()))?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_pop();
                        }
                    }
                }

                let after_alternative_pos = self.current_instructions().len();
                self.change_operand(jump_pos, after_alternative_pos);
            }
            Expression::Identifier(ident) => {
                let symbol = self
                    .symbol_table
                    .resolve(&ident.value)
                    .ok_or_else(|| CompileError::unknown_identifier(&ident.value))?;
                self.load_symbol(&symbol);
            }
            Expression::FunctionLiteral(lit) => {
                self.enter_scope();

                if let Some(name) = &lit.name {
                    self.symbol_table.define_function_name(name);
                }
                for param in &lit.parameters {
                    self.symbol_table.define(&param.value);
                }

                self.compile_statement(&Statement::Block(lit.body.clone()))?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }

                let free_symbols = self.symbol_table.free_symbols.clone();
                let num_locals = self.symbol_table.num_definitions();
                let instructions = self.leave_scope();

                for symbol in &free_symbols {
                    self.load_symbol(symbol);
                }

                let compiled = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: lit.parameters.len(),
                };
                let constant = self.add_constant(Object::CompiledFunction(Rc::new(compiled)));
                self.emit(Opcode::Closure, &[constant, free_symbols.len()]);
            }
            Expression::Call(expr) => {
                self.compile_expression(&expr.function)?;
                for arg in &expr.arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(Opcode::Call, &[expr.arguments.len()]);
            }
            Expression::Index(expr) => {
                self.compile_expression(&expr.left)?;
                self.compile_expression(&expr.index)?;
                self.emit(Opcode::Index, &[]);
            }
        }
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &crate::symbol_table::Symbol) {
        match symbol.scope {
            SymbolScope::Global => {
                self.emit(Opcode::GetGlobal, &[symbol.index]);
            }
            SymbolScope::Local => {
                self.emit(Opcode::GetLocal, &[symbol.index]);
            }
            SymbolScope::Builtin => {
                self.emit(Opcode::GetBuiltin, &[symbol.index]);
            }
            SymbolScope::Free => {
                self.emit(Opcode::GetFree, &[symbol.index]);
            }
            SymbolScope::Function => {
                self.emit(Opcode::CurrentClosure, &[]);
            }
        }
    }

    fn add_constant(&mut self, object: Object) -> usize {
        self.constants.push(object);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(instruction);

        let previous = self.scopes[self.scope_index].last_instruction;
        self.scopes[self.scope_index].previous_instruction = previous;
        self.scopes[self.scope_index].last_instruction = Some(EmittedInstruction {
            opcode: op,
            position,
        });

        position
    }

    fn add_instruction(&mut self, instruction: Vec<u8>) -> usize {
        let scope = &mut self.scopes[self.scope_index];
        let position = scope.instructions.len();
        scope.instructions.extend(instruction);
        position
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.scope_index].instructions
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        match self.scopes[self.scope_index].last_instruction {
            Some(emitted) => emitted.opcode == opcode,
            None => false,
        }
    }

    fn remove_last_pop(&mut self) {
        let scope = &mut self.scopes[self.scope_index];
        if let Some(last) = scope.last_instruction {
            scope.instructions.0.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        let scope = &self.scopes[self.scope_index];
        let Some(last) = scope.last_instruction else {
            return;
        };
        let new_instruction = make(Opcode::ReturnValue, &[]);
        self.replace_instruction(last.position, new_instruction);
        self.scopes[self.scope_index].last_instruction = Some(EmittedInstruction {
            opcode: Opcode::ReturnValue,
            position: last.position,
        });
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: Vec<u8>) {
        let scope = &mut self.scopes[self.scope_index];
        for (offset, byte) in new_instruction.into_iter().enumerate() {
            scope.instructions.0[position + offset] = byte;
        }
    }

    fn change_operand(&mut self, op_position: usize, operand: usize) {
        let op = self.scopes[self.scope_index].instructions.0[op_position];
        let opcode = Opcode::from_byte(op).expect("position does not point at an opcode byte");
        let new_instruction = make(opcode, &[operand]);
        self.replace_instruction(op_position, new_instruction);
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        self.scope_index += 1;
        debug!("entered compilation scope {}", self.scope_index);
        let outer = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("scope stack underflow");
        debug!("left compilation scope {}", self.scope_index);
        self.scope_index -= 1;
        let outer = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = outer.into_outer().expect("left the global scope");
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Opcode;
    use crate::parser::Parser;

    fn compile(source: &str) -> Bytecode {
        let program = Parser::from_source(source).parse_program();
        let mut compiler = Compiler::new();
        compiler.compile_program(&program).expect("compile error");
        compiler.bytecode()
    }

    fn concat(chunks: Vec<Vec<u8>>) -> Vec<u8> {
        chunks.into_iter().flatten().collect()
    }

    #[test]
    fn integer_arithmetic_emits_constants_and_add() {
        let bytecode = compile("1 + 2");
        assert_eq!(
            bytecode.constants,
            vec![Object::Integer(1), Object::Integer(2)]
        );
        let expected = concat(vec![
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn less_than_is_compiled_as_swapped_greater_than() {
        let bytecode = compile("1 < 2");
        let expected = concat(vec![
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::GreaterThan, &[]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn if_without_else_injects_null_branch() {
        let bytecode = compile("if (true) { 10 }; 3333;");
        let expected = concat(vec![
            make(Opcode::True, &[]),
            make(Opcode::JumpNotTruthy, &[10]),
            make(Opcode::Constant, &[0]),
            make(Opcode::Jump, &[11]),
            make(Opcode::Null, &[]),
            make(Opcode::Pop, &[]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn global_let_statements_use_global_opcodes() {
        let bytecode = compile("let one = 1; let two = 2;");
        let expected = concat(vec![
            make(Opcode::Constant, &[0]),
            make(Opcode::SetGlobal, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::SetGlobal, &[1]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn string_concatenation_reuses_constant_opcode() {
        let bytecode = compile(r#""mon" + "key""#);
        assert_eq!(
            bytecode.constants,
            vec![
                Object::Str(Rc::from("mon")),
                Object::Str(Rc::from("key"))
            ]
        );
    }

    #[test]
    fn hash_literal_keys_compile_in_sorted_order() {
        let bytecode = compile("{1: 2, 3: 4}");
        let expected = concat(vec![
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Constant, &[3]),
            make(Opcode::Hash, &[4]),
            make(Opcode::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions.0, expected);
    }

    #[test]
    fn compiled_function_emits_return_value_for_trailing_expression() {
        let bytecode = compile("fn() { 5 + 10 }");
        let Object::CompiledFunction(func) = &bytecode.constants[2] else {
            panic!("expected a compiled function constant");
        };
        let expected = concat(vec![
            make(Opcode::Constant, &[0]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ]);
        assert_eq!(func.instructions.0, expected);
    }

    #[test]
    fn closures_capture_free_variables_from_enclosing_scope() {
        let bytecode = compile(
            r#"
            fn(a) {
                fn(b) {
                    a + b
                }
            }
            "#,
        );
        let Object::CompiledFunction(inner) = &bytecode.constants[0] else {
            panic!("expected inner function constant");
        };
        let expected_inner = concat(vec![
            make(Opcode::GetFree, &[0]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Add, &[]),
            make(Opcode::ReturnValue, &[]),
        ]);
        assert_eq!(inner.instructions.0, expected_inner);
    }

    #[test]
    fn recursive_function_uses_current_closure() {
        let bytecode = compile(
            r#"
            let countdown = fn(x) { countdown(x - 1) };
            countdown(1);
            "#,
        );
        let Object::CompiledFunction(func) = &bytecode.constants[1] else {
            panic!("expected compiled function constant");
        };
        let expected = concat(vec![
            make(Opcode::CurrentClosure, &[]),
            make(Opcode::GetLocal, &[0]),
            make(Opcode::Constant, &[0]),
            make(Opcode::Sub, &[]),
            make(Opcode::Call, &[1]),
            make(Opcode::ReturnValue, &[]),
        ]);
        assert_eq!(func.instructions.0, expected);
    }
}
