use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use log::{debug, error, info};

use m_lang::compiler::Compiler;
use m_lang::evaluator;
use m_lang::object::Environment;
use m_lang::parser::Parser;
use m_lang::repl;
use m_lang::vm::Vm;
use m_lang::wasm_shape::compile_and_run;

/// M: lexer, Pratt parser, bytecode compiler/VM and tree-walking evaluator
/// in one binary. With no file, drops into a REPL.
#[derive(Debug, ClapParser)]
#[command(name = "m", version, about)]
struct Cli {
    /// Source file to run. Omit to start a REPL.
    file: Option<PathBuf>,

    /// Use the tree-walking evaluator instead of the bytecode VM.
    #[arg(long)]
    eval: bool,

    /// Print the compiled bytecode instead of running it.
    #[arg(long)]
    disassemble: bool,

    /// Print compilation/runtime timing and the final value as JSON.
    #[arg(long)]
    json: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    if let Err(err) = simple_logger::init_with_level(log_level) {
        eprintln!("failed to initialise logger: {err}");
    }

    let Some(file) = cli.file.clone() else {
        info!("no source file given, starting REPL");
        if let Err(err) = repl::start(cli.eval) {
            error!("REPL exited with an error: {err}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    run_file(&cli, &file)
}

fn run_file(cli: &Cli, file: &PathBuf) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            error!("could not read {}: {err}", file.display());
            return ExitCode::FAILURE;
        }
    };
    debug!("read {} bytes from {}", source.len(), file.display());

    if cli.json {
        let outcome = compile_and_run(&source);
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(err) => error!("failed to serialise run outcome: {err}"),
        }
        return if outcome.error_string.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let mut parser = Parser::from_source(&source);
    let program = parser.parse_program();
    if !parser.errors().is_empty() {
        for err in parser.errors() {
            error!("parse error: {err}");
        }
        return ExitCode::FAILURE;
    }

    if cli.eval {
        let env = Environment::new();
        let result = evaluator::eval_program(&program, &env);
        if result.is_error() {
            error!("{result}");
            return ExitCode::FAILURE;
        }
        println!("{result}");
        return ExitCode::SUCCESS;
    }

    let mut compiler = Compiler::new();
    if let Err(err) = compiler.compile_program(&program) {
        error!("compile error: {err}");
        return ExitCode::FAILURE;
    }
    let bytecode = compiler.bytecode();

    if cli.disassemble {
        print!("{}", bytecode.instructions);
        return ExitCode::SUCCESS;
    }

    let mut vm = Vm::new(bytecode);
    if let Err(err) = vm.run() {
        error!("runtime error: {err}");
        return ExitCode::FAILURE;
    }

    let result = vm.last_popped_stack_element();
    println!("{result}");
    ExitCode::SUCCESS
}
