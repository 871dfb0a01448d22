//! Bytecode compiler: transforms the AST into bytecode.

use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::bytecode::chunk::{Bytecode, CompiledFunction, Instructions};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::symbol_table::{SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::object::Value;
use crate::span::Span;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Operand placeholder for jumps whose target is not yet known.
const JUMP_PLACEHOLDER: u16 = 0xffff;

/// A record of an emitted instruction, kept for backpatching and the
/// `OpPop` peephole.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// The instruction buffer of one function body (or the top level), with the
/// two-instruction history the peephole needs.
#[derive(Debug, Default)]
struct CompilationUnit {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// The bytecode compiler.
///
/// One compiler object; entering a function body pushes a fresh compilation
/// unit and an inner symbol table frame, leaving pops them and packages the
/// emitted bytes into a `CompiledFunction` constant. The constant pool and
/// the outer symbol table survive the push/pop.
pub struct Compiler {
    unit: CompilationUnit,
    enclosing: Vec<CompilationUnit>,
    constants: Vec<Value>,
    symbols: SymbolTable,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_state(SymbolTable::new(), Vec::new())
    }

    /// Resume compilation with a symbol table and constant pool from a
    /// previous run. The REPL threads these through so bindings from one
    /// input stay visible in the next.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            unit: CompilationUnit::default(),
            enclosing: Vec::new(),
            constants,
            symbols,
        }
    }

    /// Hand the symbol table and constant pool back for the next run.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    /// Compile a program into the current unit.
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// The finished top-level instruction stream and constant pool.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.unit.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(OpCode::Pop);
            }

            StmtKind::Let { name, value } => {
                self.compile_expression(value)?;
                self.define_variable(name, stmt.span)?;
            }

            StmtKind::Return(expr) => {
                self.compile_expression(expr)?;
                self.emit(OpCode::ReturnValue);
            }

            StmtKind::Block(statements) => {
                for stmt in statements {
                    self.compile_statement(stmt)?;
                }
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => {
                let index = self.add_constant(Value::Int(*n), expr.span)?;
                self.emit_u16(OpCode::Constant, index);
            }

            ExprKind::StringLiteral(s) => {
                let index = self.add_constant(Value::string(s.clone()), expr.span)?;
                self.emit_u16(OpCode::Constant, index);
            }

            ExprKind::BoolLiteral(true) => {
                self.emit(OpCode::True);
            }
            ExprKind::BoolLiteral(false) => {
                self.emit(OpCode::False);
            }

            ExprKind::Identifier(name) => {
                let Some(symbol) = self.symbols.resolve(name) else {
                    return Err(CompileError::undefined_variable(name, expr.span));
                };
                match symbol.scope {
                    SymbolScope::Global => {
                        let index = symbol.index;
                        self.emit_u16(OpCode::GetGlobal, index);
                    }
                    SymbolScope::Local => {
                        let index = symbol.index as u8;
                        self.emit_u8(OpCode::GetLocal, index);
                    }
                }
            }

            ExprKind::Array(elements) => {
                if elements.len() > u16::MAX as usize {
                    return Err(CompileError::general(
                        "Array literal has too many elements",
                        expr.span,
                    ));
                }
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit_u16(OpCode::Array, elements.len() as u16);
            }

            ExprKind::Unary { operator, operand } => {
                self.compile_expression(operand)?;
                match operator {
                    UnaryOp::Not => self.emit(OpCode::Bang),
                    UnaryOp::Negate => self.emit(OpCode::Minus),
                };
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let op = match operator {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Subtract => OpCode::Sub,
                    BinaryOp::Multiply => OpCode::Mul,
                    BinaryOp::Divide => OpCode::Div,
                    BinaryOp::Equal => OpCode::Equal,
                    BinaryOp::NotEqual => OpCode::NotEqual,
                    BinaryOp::Greater => OpCode::GreaterThan,
                    BinaryOp::Less => OpCode::LessThan,
                };
                self.emit(op);
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_deref())?,

            ExprKind::Function { parameters, body } => {
                self.compile_function(parameters, body, expr.span)?;
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                if arguments.len() > u8::MAX as usize {
                    return Err(CompileError::general("Too many call arguments", expr.span));
                }
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit_u8(OpCode::Call, arguments.len() as u8);
            }

            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.emit(OpCode::Index);
            }
        }
        Ok(())
    }

    /// Lower an `if` expression. Either branch leaves exactly one value on
    /// the stack; a missing (or empty) branch contributes `null`.
    fn compile_if(
        &mut self,
        condition: &Expr,
        consequence: &Stmt,
        alternative: Option<&Stmt>,
    ) -> CompileResult<()> {
        self.compile_expression(condition)?;
        let jump_not_truthy = self.emit_jump(OpCode::JumpNotTruthy);

        let before_consequence = self.unit.instructions.len();
        self.compile_statement(consequence)?;
        self.end_branch(before_consequence);

        let jump_over_alternative = self.emit_jump(OpCode::Jump);
        self.change_operand(jump_not_truthy, self.unit.instructions.len() as u16);

        match alternative {
            Some(alternative) => {
                let before_alternative = self.unit.instructions.len();
                self.compile_statement(alternative)?;
                self.end_branch(before_alternative);
            }
            None => {
                self.emit(OpCode::Null);
            }
        }

        self.change_operand(jump_over_alternative, self.unit.instructions.len() as u16);
        Ok(())
    }

    /// Close off an if-branch: drop the trailing `OpPop` so the branch value
    /// stays on the stack for the surrounding expression statement, or push
    /// `null` if the branch emitted nothing at all.
    fn end_branch(&mut self, branch_start: usize) {
        if self.last_is(OpCode::Pop) {
            self.remove_last();
        } else if self.unit.instructions.len() == branch_start {
            self.emit(OpCode::Null);
        }
    }

    fn compile_function(
        &mut self,
        parameters: &[String],
        body: &[Stmt],
        span: Span,
    ) -> CompileResult<()> {
        if parameters.len() > u8::MAX as usize {
            return Err(CompileError::general("Too many parameters", span));
        }

        self.enter_unit();
        for parameter in parameters {
            if self.symbols.resolve_local(parameter).is_some() {
                self.leave_unit();
                return Err(CompileError::redefinition(parameter, span));
            }
            self.symbols.define(parameter);
        }

        for stmt in body {
            // Unwind the unit stack on failure so a REPL can keep compiling
            // into the outer scope afterwards.
            if let Err(err) = self.compile_statement(stmt) {
                self.leave_unit();
                return Err(err);
            }
        }

        // The body's trailing expression becomes its return value; a body
        // that ends any other way returns null.
        if self.last_is(OpCode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_is(OpCode::ReturnValue) {
            self.emit(OpCode::Return);
        }

        let num_locals = self.symbols.num_definitions();
        let instructions = self.leave_unit();

        let function = CompiledFunction::new(instructions, num_locals as u8, parameters.len() as u8);
        let index = self.add_constant(Value::CompiledFunction(Rc::new(function)), span)?;
        self.emit_u16(OpCode::Constant, index);
        Ok(())
    }

    /// Bind a freshly-compiled value to `name` in the current scope.
    fn define_variable(&mut self, name: &str, span: Span) -> CompileResult<()> {
        if self.symbols.resolve_local(name).is_some() {
            return Err(CompileError::redefinition(name, span));
        }
        if self.symbols.num_definitions() == u16::MAX {
            return Err(CompileError::general("Too many variables in scope", span));
        }

        let symbol = self.symbols.define(name);
        match symbol.scope {
            SymbolScope::Global => {
                let index = symbol.index;
                self.emit_u16(OpCode::SetGlobal, index);
            }
            SymbolScope::Local => {
                // Local slots are u8-addressed and the slot count itself must
                // fit in a u8.
                if symbol.index >= u8::MAX as u16 {
                    return Err(CompileError::general("Too many locals in function", span));
                }
                let index = symbol.index as u8;
                self.emit_u8(OpCode::SetLocal, index);
            }
        }
        Ok(())
    }

    // ===== Compilation unit stack =====

    fn enter_unit(&mut self) {
        let outer_unit = std::mem::take(&mut self.unit);
        self.enclosing.push(outer_unit);

        let outer_symbols = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer_symbols);
    }

    fn leave_unit(&mut self) -> Instructions {
        let outer_unit = self.enclosing.pop().unwrap_or_default();
        let unit = std::mem::replace(&mut self.unit, outer_unit);

        let symbols = std::mem::take(&mut self.symbols);
        self.symbols = symbols.into_outer().unwrap_or_default();

        unit.instructions
    }

    // ===== Constants =====

    fn add_constant(&mut self, value: Value, span: Span) -> CompileResult<u16> {
        // Equal literals share one pool slot. Value equality is identity for
        // functions and arrays, so only Int/String constants ever merge.
        if let Some(index) = self.constants.iter().position(|c| c == &value) {
            return Ok(index as u16);
        }
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::general("Too many constants", span));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u16)
    }

    // ===== Emission =====

    fn emit(&mut self, op: OpCode) -> usize {
        let position = self.unit.instructions.write_op(op);
        self.set_last(op, position);
        position
    }

    fn emit_u16(&mut self, op: OpCode, operand: u16) -> usize {
        let position = self.unit.instructions.write_op(op);
        self.unit.instructions.write_u16(operand);
        self.set_last(op, position);
        position
    }

    fn emit_u8(&mut self, op: OpCode, operand: u8) -> usize {
        let position = self.unit.instructions.write_op(op);
        self.unit.instructions.write_byte(operand);
        self.set_last(op, position);
        position
    }

    /// Emit a jump with a placeholder operand; returns the opcode position
    /// for later backpatching.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_u16(op, JUMP_PLACEHOLDER)
    }

    /// Re-encode the operand of the instruction at `op_position` in place.
    fn change_operand(&mut self, op_position: usize, operand: u16) {
        self.unit.instructions.patch_u16(op_position + 1, operand);
    }

    fn set_last(&mut self, opcode: OpCode, position: usize) {
        self.unit.previous = self.unit.last;
        self.unit.last = Some(EmittedInstruction { opcode, position });
    }

    fn last_is(&self, op: OpCode) -> bool {
        matches!(self.unit.last, Some(last) if last.opcode == op)
    }

    fn remove_last(&mut self) {
        if let Some(last) = self.unit.last {
            self.unit.instructions.code.truncate(last.position);
            self.unit.last = self.unit.previous.take();
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = &mut self.unit.last {
            self.unit.instructions.code[last.position] = OpCode::ReturnValue as u8;
            last.opcode = OpCode::ReturnValue;
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
