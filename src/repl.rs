//! Interactive read-eval-print loop.
//!
//! The symbol table, constant pool and globals array survive across inputs,
//! so a binding made on one line is visible on the next.

use std::path::PathBuf;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::{Compiler, SymbolTable, Vm, GLOBALS_MAX};
use crate::install_builtins;
use crate::lexer::Scanner;
use crate::object::Value;
use crate::parser::Parser;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".runa_history";

pub struct Repl {
    symbols: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
}

impl Repl {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let mut globals = vec![Value::Null; GLOBALS_MAX];
        install_builtins(&mut symbols, &mut globals);

        Self {
            symbols,
            constants: Vec::new(),
            globals,
        }
    }

    pub fn run(&mut self) -> rustyline::Result<()> {
        println!("Runa {}", env!("CARGO_PKG_VERSION"));
        println!("Type 'exit' or 'quit' to leave.\n");

        let mut editor = DefaultEditor::new()?;
        let history_file = Self::history_path();
        let _ = editor.load_history(&history_file);

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line);

                    if line == "quit" || line == "exit" {
                        break;
                    }

                    self.execute(line);
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C clears the line, keeps the session.
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}", format!("Read error: {}", err).red());
                    break;
                }
            }
        }

        let _ = editor.save_history(&history_file);
        println!("Goodbye!");
        Ok(())
    }

    /// Lex, parse, compile and run one input line, printing the result of
    /// its final expression statement. All errors leave the session state
    /// intact.
    fn execute(&mut self, line: &str) {
        let tokens = match Scanner::new(line).scan_tokens() {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("{}", err.to_string().red());
                return;
            }
        };

        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        if !parser.errors().is_empty() {
            for err in parser.errors() {
                eprintln!("{}", err.to_string().red());
            }
            return;
        }

        let symbols = std::mem::take(&mut self.symbols);
        let constants = std::mem::take(&mut self.constants);

        let mut compiler = Compiler::with_state(symbols, constants);
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        let (symbols, constants) = compiler.into_state();
        self.symbols = symbols;
        self.constants = constants;

        if let Err(err) = compiled {
            eprintln!("{}", err.to_string().red());
            return;
        }

        let globals = std::mem::take(&mut self.globals);
        let mut vm = Vm::with_globals(bytecode, globals);
        let outcome = vm.run();
        let result = vm.last_popped().clone();
        self.globals = vm.into_globals();

        match outcome {
            Ok(()) => println!("{}", result),
            Err(err) => eprintln!("{}", err.to_string().red()),
        }
    }

    fn history_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
