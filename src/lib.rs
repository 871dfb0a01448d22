//! Runa: a small dynamically-typed scripting language.
//!
//! Source text is lexed into tokens, parsed into an AST and then either
//! compiled to bytecode and run on a stack VM (the default) or evaluated
//! directly by a tree-walking interpreter:
//!
//! ```text
//! source text -> tokens -> syntax tree -> bytecode -> stack VM
//! ```

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod repl;
pub mod span;

use bytecode::{Bytecode, Compiler, SymbolTable, Vm, GLOBALS_MAX};
use error::{ParserError, RunaError};
use interpreter::Interpreter;
use object::builtins::BUILTINS;
use object::Value;

/// Execution mode for running Runa programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Tree-walking interpreter (predates the compiler)
    TreeWalk,
    /// Bytecode virtual machine
    #[default]
    Bytecode,
}

/// Run a program and return the value of its final expression statement.
pub fn run(source: &str) -> Result<Value, RunaError> {
    run_with_options(source, ExecutionMode::default(), false)
}

/// Run a program with full control over execution options.
pub fn run_with_options(
    source: &str,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<Value, RunaError> {
    let program = parse(source).map_err(first_error)?;

    match mode {
        ExecutionMode::TreeWalk => {
            let mut interpreter = Interpreter::new();
            Ok(interpreter.interpret(&program)?)
        }
        ExecutionMode::Bytecode => {
            let (mut symbols, mut globals) = (SymbolTable::new(), vec![Value::Null; GLOBALS_MAX]);
            install_builtins(&mut symbols, &mut globals);

            let mut compiler = Compiler::with_state(symbols, Vec::new());
            compiler.compile(&program)?;
            let bytecode = compiler.bytecode();

            if disassemble {
                print!("{}", bytecode::disassemble_bytecode(&bytecode));
                println!("---");
            }

            let mut vm = Vm::with_globals(bytecode, globals);
            vm.run()?;
            Ok(vm.last_popped().clone())
        }
    }
}

/// Parse source code into an AST without executing. Returns every parse
/// error encountered, in source order.
pub fn parse(source: &str) -> Result<ast::Program, Vec<ParserError>> {
    let tokens = lexer::Scanner::new(source)
        .scan_tokens()
        .map_err(|err| vec![ParserError::from(err)])?;

    let mut parser = parser::Parser::new(tokens);
    let program = parser.parse();
    if parser.errors().is_empty() {
        Ok(program)
    } else {
        Err(parser.into_errors())
    }
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<Bytecode, RunaError> {
    let program = parse(source).map_err(first_error)?;

    let mut symbols = SymbolTable::new();
    let mut globals = vec![Value::Null; GLOBALS_MAX];
    install_builtins(&mut symbols, &mut globals);

    let mut compiler = Compiler::with_state(symbols, Vec::new());
    compiler.compile(&program)?;
    Ok(compiler.bytecode())
}

/// Disassemble compiled bytecode to a string.
pub fn disassemble(bytecode: &Bytecode) -> String {
    bytecode::disassemble_bytecode(bytecode)
}

/// Define every builtin in the outermost symbol table and store its value
/// in the matching global slot.
pub fn install_builtins(symbols: &mut SymbolTable, globals: &mut [Value]) {
    for builtin in BUILTINS {
        let symbol = symbols.define(builtin.name);
        globals[symbol.index as usize] = Value::Builtin(*builtin);
    }
}

fn first_error(mut errors: Vec<ParserError>) -> RunaError {
    if errors.is_empty() {
        RunaError::Parse(ParserError::general(
            "Unknown parse error",
            span::Span::default(),
        ))
    } else {
        RunaError::Parse(errors.remove(0))
    }
}
