//! Stack-based virtual machine for executing bytecode.

use std::rc::Rc;

use crate::bytecode::chunk::{Bytecode, CompiledFunction};
use crate::bytecode::instruction::OpCode;
use crate::error::RuntimeError;
use crate::object::{BuiltinFunction, Value};

/// Maximum operand stack size (shared with the locals regions).
pub const STACK_MAX: usize = 2048;
/// Number of global variable slots.
pub const GLOBALS_MAX: usize = 65536;
/// Maximum call depth.
pub const FRAMES_MAX: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// A call frame: the function being executed, its instruction pointer, and
/// where its locals region starts on the shared stack.
#[derive(Debug)]
struct Frame {
    function: Rc<CompiledFunction>,
    /// Offset of the next byte to read.
    ip: usize,
    /// Locals live at `stack[base_pointer..base_pointer + num_locals]`; the
    /// operand region starts immediately above.
    base_pointer: usize,
}

/// The virtual machine.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// Index of the next free stack slot.
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
    last_popped: Value,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_MAX])
    }

    /// Create a VM reusing a globals array from a previous run, so bindings
    /// survive across REPL inputs.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main = CompiledFunction::new(bytecode.instructions, 0, 0);
        let main_frame = Frame {
            function: Rc::new(main),
            ip: 0,
            base_pointer: 0,
        };

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_MAX],
            sp: 0,
            globals,
            frames: vec![main_frame],
            last_popped: Value::Null,
        }
    }

    /// Hand the globals array back for the next run.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The most recently popped stack value: the result of the final
    /// expression statement after a successful run.
    pub fn last_popped(&self) -> &Value {
        &self.last_popped
    }

    /// Execute until the outermost frame runs off the end of its
    /// instruction stream.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().function.instructions.len() {
            let byte = self.read_byte();
            let Some(op) = OpCode::from_u8(byte) else {
                return Err(RuntimeError::UnknownOpcode(byte));
            };

            match op {
                OpCode::Constant => {
                    let index = self.read_u16() as usize;
                    let value = self
                        .constants
                        .get(index)
                        .cloned()
                        .ok_or_else(|| RuntimeError::general("Constant index out of range"))?;
                    self.push(value)?;
                }

                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Null => self.push(Value::Null)?,

                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::Add => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_add(r))),
                    (Value::String(l), Value::String(r)) => {
                        Ok(Value::string(format!("{}{}", l, r)))
                    }
                    (left, right) => Err(binary_type_error(&left, "+", &right)),
                })?,

                OpCode::Sub => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_sub(r))),
                    (left, right) => Err(binary_type_error(&left, "-", &right)),
                })?,

                OpCode::Mul => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_mul(r))),
                    (left, right) => Err(binary_type_error(&left, "*", &right)),
                })?,

                OpCode::Div => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_div(r))),
                    (left, right) => Err(binary_type_error(&left, "/", &right)),
                })?,

                OpCode::Equal => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l == r)),
                    (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l == r)),
                    (left, right) => Err(binary_type_error(&left, "==", &right)),
                })?,

                OpCode::NotEqual => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l != r)),
                    (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l != r)),
                    (left, right) => Err(binary_type_error(&left, "!=", &right)),
                })?,

                OpCode::GreaterThan => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l > r)),
                    (left, right) => Err(binary_type_error(&left, ">", &right)),
                })?,

                OpCode::LessThan => self.binary_op(|left, right| match (left, right) {
                    (Value::Int(l), Value::Int(r)) => Ok(Value::Bool(l < r)),
                    (left, right) => Err(binary_type_error(&left, "<", &right)),
                })?,

                OpCode::Bang => {
                    let value = self.pop()?;
                    self.push(Value::Bool(!value.is_truthy()))?;
                }

                OpCode::Minus => {
                    let value = self.pop()?;
                    match value {
                        Value::Int(n) => self.push(Value::Int(n.wrapping_neg()))?,
                        other => {
                            return Err(RuntimeError::type_error(format!(
                                "Cannot negate {}",
                                other.type_name()
                            )))
                        }
                    }
                }

                OpCode::Jump => {
                    let target = self.read_u16() as usize;
                    self.current_frame_mut().ip = target;
                }

                OpCode::JumpNotTruthy => {
                    let target = self.read_u16() as usize;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }

                OpCode::SetGlobal => {
                    let index = self.read_u16() as usize;
                    self.globals[index] = self.pop()?;
                }

                OpCode::GetGlobal => {
                    let index = self.read_u16() as usize;
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                OpCode::SetLocal => {
                    let index = self.read_byte() as usize;
                    let base_pointer = self.current_frame().base_pointer;
                    self.stack[base_pointer + index] = self.pop()?;
                }

                OpCode::GetLocal => {
                    let index = self.read_byte() as usize;
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }

                OpCode::Array => {
                    let count = self.read_u16() as usize;
                    let start = self
                        .sp
                        .checked_sub(count)
                        .ok_or_else(|| RuntimeError::general("Stack underflow"))?;

                    // The elements sit on the stack in source order already.
                    let elements: Vec<Value> = self.stack[start..self.sp].to_vec();
                    for slot in &mut self.stack[start..self.sp] {
                        *slot = Value::Null;
                    }
                    self.sp = start;

                    self.push(Value::Array(Rc::new(elements)))?;
                }

                OpCode::Index => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let value = self.index_value(object, index)?;
                    self.push(value)?;
                }

                OpCode::Call => {
                    let num_args = self.read_byte() as usize;
                    self.call_value(num_args)?;
                }

                OpCode::ReturnValue => {
                    let value = self.pop()?;
                    if self.return_from_frame()? {
                        // Top-level return ends the program.
                        return Ok(());
                    }
                    self.push(value)?;
                }

                OpCode::Return => {
                    if self.return_from_frame()? {
                        return Ok(());
                    }
                    self.push(Value::Null)?;
                }
            }
        }

        Ok(())
    }

    /// Pop the current frame and restore `sp` to just below the callee,
    /// discarding the callee and its arguments. Returns true if the popped
    /// frame was the outermost one.
    fn return_from_frame(&mut self) -> VmResult<bool> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| RuntimeError::general("No call frame"))?;
        if self.frames.is_empty() {
            return Ok(true);
        }

        let new_sp = frame.base_pointer - 1;
        for slot in &mut self.stack[new_sp..self.sp] {
            *slot = Value::Null;
        }
        self.sp = new_sp;
        Ok(false)
    }

    fn call_value(&mut self, num_args: usize) -> VmResult<()> {
        let callee_slot = self
            .sp
            .checked_sub(1 + num_args)
            .ok_or_else(|| RuntimeError::general("Stack underflow"))?;

        match self.stack[callee_slot].clone() {
            Value::CompiledFunction(function) => self.call_function(function, num_args),
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_function(&mut self, function: Rc<CompiledFunction>, num_args: usize) -> VmResult<()> {
        if num_args != function.num_parameters as usize {
            return Err(RuntimeError::WrongArity {
                expected: function.num_parameters as usize,
                got: num_args,
            });
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(RuntimeError::FrameOverflow);
        }

        // Arguments already occupy the first local slots; reserve the rest.
        let base_pointer = self.sp - num_args;
        let new_sp = base_pointer + function.num_locals as usize;
        if new_sp > STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.sp = new_sp;

        self.frames.push(Frame {
            function,
            ip: 0,
            base_pointer,
        });
        Ok(())
    }

    fn call_builtin(&mut self, builtin: BuiltinFunction, num_args: usize) -> VmResult<()> {
        let start = self.sp - num_args;
        let result = (builtin.func)(&self.stack[start..self.sp]);

        // Discard the arguments and the callee.
        for slot in &mut self.stack[start - 1..self.sp] {
            *slot = Value::Null;
        }
        self.sp = start - 1;

        match result {
            Value::Error(message) => Err(RuntimeError::general(message)),
            value => self.push(value),
        }
    }

    fn index_value(&self, object: Value, index: Value) -> VmResult<Value> {
        let Value::Array(elements) = &object else {
            return Err(RuntimeError::type_error(format!(
                "Cannot index {}",
                object.type_name()
            )));
        };
        let Value::Int(i) = index else {
            return Err(RuntimeError::type_error(format!(
                "Array index must be Int, got {}",
                index.type_name()
            )));
        };
        if i < 0 || i as usize >= elements.len() {
            return Err(RuntimeError::IndexOutOfBounds {
                index: i,
                length: elements.len(),
            });
        }
        Ok(elements[i as usize].clone())
    }

    fn binary_op<F>(&mut self, op: F) -> VmResult<()>
    where
        F: FnOnce(Value, Value) -> VmResult<Value>,
    {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = op(left, right)?;
        self.push(result)
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("no call frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no call frame")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.current_frame_mut();
        let byte = frame.function.instructions.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.current_frame_mut();
        let value = frame.function.instructions.read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp == STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        if self.sp == 0 {
            return Err(RuntimeError::general("Stack underflow"));
        }
        self.sp -= 1;
        let value = std::mem::replace(&mut self.stack[self.sp], Value::Null);
        self.last_popped = value.clone();
        Ok(value)
    }
}

fn binary_type_error(left: &Value, operator: &str, right: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "Unsupported types for binary operation: {} {} {}",
        left.type_name(),
        operator,
        right.type_name()
    ))
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("sp", &self.sp)
            .field("frames", &self.frames.len())
            .field("last_popped", &self.last_popped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::bytecode::symbol_table::SymbolTable;
    use crate::lexer::Scanner;
    use crate::object::builtins::BUILTINS;
    use crate::parser::Parser;

    /// Full pipeline with builtins installed, mirroring the library driver.
    fn run_source(source: &str) -> VmResult<Value> {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        assert!(
            parser.errors().is_empty(),
            "parse errors: {:?}",
            parser.errors()
        );

        let mut symbols = SymbolTable::new();
        let mut globals = vec![Value::Null; GLOBALS_MAX];
        for builtin in BUILTINS {
            let symbol = symbols.define(builtin.name);
            globals[symbol.index as usize] = Value::Builtin(*builtin);
        }

        let mut compiler = Compiler::with_state(symbols, Vec::new());
        compiler
            .compile(&program)
            .unwrap_or_else(|e| panic!("compile error: {}", e));

        let mut vm = Vm::with_globals(compiler.bytecode(), globals);
        vm.run()?;
        assert_eq!(vm.sp, 0, "temporaries left on the stack");
        Ok(vm.last_popped().clone())
    }

    fn run(source: &str) -> Value {
        run_source(source).unwrap_or_else(|e| panic!("runtime error: {}", e))
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(run("1 + 2 * 3;"), Value::Int(7));
        assert_eq!(run("(1 + 2) * 3;"), Value::Int(9));
        assert_eq!(run("50 / 2 * 2 + 10 - 5;"), Value::Int(55));
        assert_eq!(run("-5 + 10;"), Value::Int(5));
        assert_eq!(run("-(5 + 5);"), Value::Int(-10));
    }

    #[test]
    fn test_arithmetic_wraps_at_i64_boundaries() {
        assert_eq!(
            run("9223372036854775807 + 1;"),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            run("0 - 9223372036854775807 - 2;"),
            Value::Int(i64::MAX)
        );
    }

    #[test]
    fn test_boolean_expressions() {
        assert_eq!(run("true;"), Value::Bool(true));
        assert_eq!(run("1 < 2;"), Value::Bool(true));
        assert_eq!(run("1 > 2;"), Value::Bool(false));
        assert_eq!(run("1 == 1;"), Value::Bool(true));
        assert_eq!(run("1 != 1;"), Value::Bool(false));
        assert_eq!(run("true == true;"), Value::Bool(true));
        assert_eq!(run("true != false;"), Value::Bool(true));
        assert_eq!(run("!true;"), Value::Bool(false));
        assert_eq!(run("!!5;"), Value::Bool(true));
        assert_eq!(run("!0;"), Value::Bool(false));
    }

    #[test]
    fn test_global_let_bindings() {
        assert_eq!(run("let a = 5; let b = a + 10; b;"), Value::Int(15));
        assert_eq!(run("let one = 1; let two = one + one; one + two;"), Value::Int(3));
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(run("if (1 < 2) { 10 } else { 20 };"), Value::Int(10));
        assert_eq!(run("if (1 > 2) { 10 } else { 20 };"), Value::Int(20));
        assert_eq!(run("if (false) { 10 };"), Value::Null);
        assert_eq!(run("if (true) { 10 };"), Value::Int(10));
        // 0 and "" are truthy; only null and false are not.
        assert_eq!(run("if (0) { 10 } else { 20 };"), Value::Int(10));
        assert_eq!(run("if (\"\") { 10 } else { 20 };"), Value::Int(10));
    }

    #[test]
    fn test_conditional_value_feeds_surrounding_expression() {
        assert_eq!(run("let x = if (1 < 2) { 5 } else { 6 }; x * 2;"), Value::Int(10));
        assert_eq!(run("!(if (false) { 5 });"), Value::Bool(true));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run("\"mon\" + \"key\";"), Value::string("monkey"));
        assert_eq!(run("\"a\" + \"b\" + \"c\";"), Value::string("abc"));
    }

    #[test]
    fn test_array_literals_preserve_order() {
        let Value::Array(elements) = run("[1 + 1, 2 * 2, 3 + 3];") else {
            panic!("expected array");
        };
        assert_eq!(
            *elements,
            vec![Value::Int(2), Value::Int(4), Value::Int(6)]
        );
    }

    #[test]
    fn test_index_expressions() {
        assert_eq!(run("[1, 2, 3][1];"), Value::Int(2));
        assert_eq!(run("[1, 2, 3][0 + 2];"), Value::Int(3));
        assert_eq!(run("let i = 0; [10][i];"), Value::Int(10));
        assert_eq!(run("[[1, 1], [2, 2]][1][0];"), Value::Int(2));
    }

    #[test]
    fn test_index_errors() {
        assert!(matches!(
            run_source("[1, 2, 3][3];"),
            Err(RuntimeError::IndexOutOfBounds { index: 3, length: 3 })
        ));
        assert!(matches!(
            run_source("[1][0 - 1];"),
            Err(RuntimeError::IndexOutOfBounds { index: -1, .. })
        ));
        assert!(matches!(
            run_source("5[0];"),
            Err(RuntimeError::TypeError(_))
        ));
        assert!(matches!(
            run_source("[1][true];"),
            Err(RuntimeError::TypeError(_))
        ));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(run("let add = fn(a, b) { a + b }; add(3, 4);"), Value::Int(7));
        assert_eq!(run("let f = fn() { return 99; 100 }; f();"), Value::Int(99));
        assert_eq!(run("let f = fn() { }; f();"), Value::Null);
        assert_eq!(run("let identity = fn(x) { x }; identity(42);"), Value::Int(42));
    }

    #[test]
    fn test_first_class_functions() {
        assert_eq!(
            run("let one = fn() { 1 }; let two = fn() { one() + one() }; two();"),
            Value::Int(2)
        );
        assert_eq!(
            run("let apply = fn(f, x) { f(x) }; let double = fn(n) { n * 2 }; apply(double, 21);"),
            Value::Int(42)
        );
    }

    #[test]
    fn test_local_bindings() {
        assert_eq!(run("let f = fn() { let x = 55; x }; f();"), Value::Int(55));
        assert_eq!(
            run("let f = fn() { let a = 1; let b = 2; a + b }; f();"),
            Value::Int(3)
        );
        // Each call gets fresh local slots.
        assert_eq!(
            run("let f = fn(a) { let b = a + 1; b }; f(1) + f(10);"),
            Value::Int(13)
        );
        // Globals stay visible inside function bodies.
        assert_eq!(
            run("let g = 10; let f = fn(a) { let b = a + g; b }; f(5);"),
            Value::Int(15)
        );
    }

    #[test]
    fn test_calls_with_wrong_arity() {
        assert!(matches!(
            run_source("let f = fn(a) { a }; f();"),
            Err(RuntimeError::WrongArity { expected: 1, got: 0 })
        ));
        assert!(matches!(
            run_source("let f = fn() { 1 }; f(1);"),
            Err(RuntimeError::WrongArity { expected: 0, got: 1 })
        ));
    }

    #[test]
    fn test_calling_non_function() {
        assert!(matches!(
            run_source("5(1);"),
            Err(RuntimeError::NotCallable("Int"))
        ));
        assert!(matches!(
            run_source("\"f\"();"),
            Err(RuntimeError::NotCallable("String"))
        ));
    }

    #[test]
    fn test_len_builtin() {
        assert_eq!(run("len(\"hello\");"), Value::Int(5));
        assert_eq!(run("len(\"\");"), Value::Int(0));
        assert_eq!(run("len([1, 2, 3, 4]);"), Value::Int(4));
        assert_eq!(run("len([]);"), Value::Int(0));

        assert!(matches!(run_source("len(7);"), Err(RuntimeError::General(_))));
        assert!(matches!(
            run_source("len(\"a\", \"b\");"),
            Err(RuntimeError::General(_))
        ));
    }

    #[test]
    fn test_type_mismatches() {
        assert!(matches!(run_source("1 + true;"), Err(RuntimeError::TypeError(_))));
        assert!(matches!(run_source("1 == true;"), Err(RuntimeError::TypeError(_))));
        assert!(matches!(run_source("true > false;"), Err(RuntimeError::TypeError(_))));
        assert!(matches!(
            run_source("\"a\" == \"a\";"),
            Err(RuntimeError::TypeError(_))
        ));
        assert!(matches!(run_source("-true;"), Err(RuntimeError::TypeError(_))));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(run_source("1 / 0;"), Err(RuntimeError::DivisionByZero)));
    }

    #[test]
    fn test_stack_overflow() {
        let elements = vec!["1"; STACK_MAX + 2].join(", ");
        let source = format!("[{}];", elements);
        assert!(matches!(
            run_source(&source),
            Err(RuntimeError::StackOverflow)
        ));
    }

    #[test]
    fn test_frame_overflow() {
        // A chain of functions each calling the previous one, deeper than
        // the frame limit.
        let mut source = String::from("let f0 = fn() { 0 };\n");
        for i in 1..=FRAMES_MAX {
            source.push_str(&format!("let f{} = fn() {{ f{}() }};\n", i, i - 1));
        }
        source.push_str(&format!("f{}();", FRAMES_MAX));
        assert!(matches!(
            run_source(&source),
            Err(RuntimeError::FrameOverflow)
        ));
    }

    #[test]
    fn test_last_popped_after_each_statement() {
        assert_eq!(run("1; 2; 3;"), Value::Int(3));
        assert_eq!(run("let a = 1; a; let b = 2;"), Value::Int(1));
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let pipeline = |symbols, constants, globals, source: &str| {
            let tokens = Scanner::new(source).scan_tokens().unwrap();
            let mut parser = Parser::new(tokens);
            let program = parser.parse();
            let mut compiler = Compiler::with_state(symbols, constants);
            compiler.compile(&program).unwrap();
            let mut vm = Vm::with_globals(compiler.bytecode(), globals);
            vm.run().unwrap();
            let result = vm.last_popped().clone();
            let (symbols, constants) = compiler.into_state();
            (symbols, constants, vm.into_globals(), result)
        };

        let globals = vec![Value::Null; GLOBALS_MAX];
        let (symbols, constants, globals, _) =
            pipeline(SymbolTable::new(), Vec::new(), globals, "let x = 40;");
        let (_, _, _, result) = pipeline(symbols, constants, globals, "x + 2;");
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn test_top_level_return_ends_program() {
        assert_eq!(run("return 5; 10;"), Value::Int(5));
    }
}
