//! Bytecode compilation and execution.

pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod symbol_table;
pub mod vm;

pub use chunk::{Bytecode, CompiledFunction, Instructions};
pub use compiler::Compiler;
pub use disassembler::{disassemble, disassemble_bytecode};
pub use instruction::{make, OpCode};
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};
pub use vm::{Vm, GLOBALS_MAX};
