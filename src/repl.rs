//! A line-buffered REPL. Each line is parsed, compiled, and run against a
//! VM whose globals and constant pool persist across lines, so `let`
//! bindings from one line are visible to the next. Parse errors are
//! reported with a small banner instead of aborting the session.

use std::io::{self, BufRead, Write};

use crate::compiler::Compiler;
use crate::object::Environment;
use crate::parser::Parser;
use crate::symbol_table::SymbolTable;
use crate::vm::{Vm, GLOBALS_SIZE};

const PROMPT: &str = ">> ";

/// Runs an interactive session against stdin/stdout until EOF or `exit`.
/// `--eval` selects the tree-walking evaluator instead of the VM.
pub fn start(eval: bool) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let mut constants = Vec::new();
    let mut symbol_table = SymbolTable::new();
    for (index, builtin) in crate::object::BUILTINS.iter().enumerate() {
        symbol_table.define_builtin(index, builtin.name);
    }
    let mut globals = vec![crate::object::Object::Null; GLOBALS_SIZE];
    let env = Environment::new();

    loop {
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            return Ok(());
        }

        let mut parser = Parser::from_source(line);
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            print_parse_errors(&mut stdout, parser.errors())?;
            continue;
        }

        if eval {
            let result = crate::evaluator::eval_program(&program, &env);
            writeln!(stdout, "{result}")?;
            continue;
        }

        let mut compiler = Compiler::with_state(constants, symbol_table);
        if let Err(err) = compiler.compile_program(&program) {
            writeln!(stdout, "compilation failed:\n {err}")?;
            constants = compiler.constants().to_vec();
            symbol_table = compiler.symbol_table().clone();
            continue;
        }
        let bytecode = compiler.bytecode();
        constants = compiler.constants().to_vec();
        symbol_table = compiler.symbol_table().clone();

        let mut vm = Vm::with_global_store(bytecode, globals);
        if let Err(err) = vm.run() {
            globals = vm.into_globals();
            writeln!(stdout, "executing bytecode failed:\n {err}")?;
            continue;
        }
        let last = vm.last_popped_stack_element();
        globals = vm.into_globals();
        writeln!(stdout, "{last}")?;
    }
}

fn print_parse_errors(out: &mut impl Write, errors: &[crate::parser::ParseError]) -> io::Result<()> {
    writeln!(out, "parser errors:")?;
    for error in errors {
        writeln!(out, "\t{error}")?;
    }
    Ok(())
}
