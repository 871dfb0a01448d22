//! Runa CLI: execute files, evaluate strings, or start the REPL.

use std::env;
use std::fs;
use std::process;

use colored::Colorize;

use runa::repl::Repl;
use runa::{run_with_options, ExecutionMode};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    mode: ExecutionMode,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Runa {} - a small scripting language", VERSION);
    eprintln!();
    eprintln!("Usage: runa [options] [script.rn]");
    eprintln!("       runa -e '<code>'");
    eprintln!();
    eprintln!("With no script, starts the REPL.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e, --eval <code>   Evaluate a string and print its value");
    eprintln!("      --treewalk      Use the tree-walking interpreter");
    eprintln!("      --disassemble   Print bytecode before running");
    eprintln!("  -v, --version       Print version");
    eprintln!("  -h, --help          Show this help");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut command = None;
    let mut mode = ExecutionMode::default();
    let mut disassemble = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                println!("runa {}", VERSION);
                process::exit(0);
            }
            "-e" | "--eval" => {
                let code = iter
                    .next()
                    .ok_or_else(|| format!("{} requires an argument", arg))?;
                command = Some(Command::Eval { code: code.clone() });
            }
            "--treewalk" => mode = ExecutionMode::TreeWalk,
            "--disassemble" => disassemble = true,
            other if other.starts_with('-') => {
                return Err(format!("Unknown option '{}'", other));
            }
            file => {
                if command.is_some() {
                    return Err(format!("Unexpected argument '{}'", file));
                }
                command = Some(Command::Run {
                    file: file.to_string(),
                });
            }
        }
    }

    Ok(Options {
        command: command.unwrap_or(Command::Repl),
        mode,
        disassemble,
    })
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message.red());
            eprintln!();
            print_usage();
            process::exit(2);
        }
    };

    match options.command {
        Command::Repl => {
            let mut repl = Repl::new();
            if let Err(err) = repl.run() {
                eprintln!("{}", err.to_string().red());
                process::exit(1);
            }
        }
        Command::Eval { code } => evaluate(&code, options.mode, options.disassemble),
        Command::Run { file } => {
            let source = match fs::read_to_string(&file) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("{}", format!("Failed to read '{}': {}", file, err).red());
                    process::exit(1);
                }
            };
            evaluate(&source, options.mode, options.disassemble);
        }
    }
}

/// Run a program and print the value of its final expression statement.
fn evaluate(source: &str, mode: ExecutionMode, disassemble: bool) {
    match run_with_options(source, mode, disassemble) {
        Ok(value) => println!("{}", value),
        Err(err) => {
            eprintln!("{}", err.to_string().red());
            process::exit(1);
        }
    }
}
