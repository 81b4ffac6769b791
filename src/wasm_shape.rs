//! A timing-instrumented compile-and-run entry point, shaped to be easy to
//! serialize across an FFI/WASM boundary: every field is owned data, and
//! failure is reported in-band (`Result`/`ErrorString`) rather than via a
//! trap, since panicking across that boundary is undefined behavior.

use std::time::Instant;

use serde::Serialize;

use crate::compiler::Compiler;
use crate::object::Object;
use crate::parser::Parser;
use crate::vm::Vm;

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub result: String,
    pub error_string: String,
    pub instructions: String,
    pub constants: Vec<String>,
    pub elapsed_time_compilation: u128,
    pub elapsed_time_vm_init: u128,
    pub elapsed_time_runtime: u128,
}

/// Parse, compile, and run `source`, capturing wall-clock time spent in
/// each phase. Never panics: parser/compiler/VM failures are folded into
/// `error_string` with `result` left empty.
pub fn compile_and_run(source: &str) -> RunOutcome {
    let mut parser = Parser::from_source(source);
    let program = parser.parse_program();

    if !parser.errors().is_empty() {
        let error_string = parser
            .errors()
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return RunOutcome {
            result: String::new(),
            error_string,
            instructions: String::new(),
            constants: Vec::new(),
            elapsed_time_compilation: 0,
            elapsed_time_vm_init: 0,
            elapsed_time_runtime: 0,
        };
    }

    let compile_start = Instant::now();
    let mut compiler = Compiler::new();
    let compile_result = compiler.compile_program(&program);
    let elapsed_time_compilation = compile_start.elapsed().as_micros();

    let compile_error = match compile_result {
        Ok(()) => None,
        Err(err) => Some(err.to_string()),
    };

    let bytecode = compiler.bytecode();
    let instructions = bytecode.instructions.to_string();
    let constants: Vec<String> = bytecode.constants.iter().map(|c| c.to_string()).collect();

    if let Some(error_string) = compile_error {
        return RunOutcome {
            result: String::new(),
            error_string,
            instructions,
            constants,
            elapsed_time_compilation,
            elapsed_time_vm_init: 0,
            elapsed_time_runtime: 0,
        };
    }

    let vm_init_start = Instant::now();
    let mut vm = Vm::new(bytecode);
    let elapsed_time_vm_init = vm_init_start.elapsed().as_micros();

    let runtime_start = Instant::now();
    let run_result = vm.run();
    let elapsed_time_runtime = runtime_start.elapsed().as_micros();

    match run_result {
        Ok(()) => {
            let result = match vm.last_popped_stack_element() {
                Object::Null => String::new(),
                other => other.to_string(),
            };
            RunOutcome {
                result,
                error_string: String::new(),
                instructions,
                constants,
                elapsed_time_compilation,
                elapsed_time_vm_init,
                elapsed_time_runtime,
            }
        }
        Err(err) => RunOutcome {
            result: String::new(),
            error_string: err.to_string(),
            instructions,
            constants,
            elapsed_time_compilation,
            elapsed_time_vm_init,
            elapsed_time_runtime,
        },
    }
}
