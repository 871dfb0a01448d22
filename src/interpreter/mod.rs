//! Tree-walking interpreter: direct AST evaluation.
//!
//! Predates the bytecode VM and is kept as a second execution mode. Operator
//! and builtin semantics match the VM so both modes agree on every program
//! both can run.

pub mod environment;

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::error::RuntimeError;
use crate::object::builtins::BUILTINS;
use crate::object::{FunctionValue, Value};

pub use environment::Environment;

/// The tree-walking interpreter.
pub struct Interpreter {
    env: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for builtin in BUILTINS {
            env.define(builtin.name, Value::Builtin(*builtin));
        }
        Self {
            env: Rc::new(RefCell::new(env)),
        }
    }

    /// Evaluate a program, returning the value of its final statement.
    ///
    /// Bindings persist across calls, so a REPL can feed inputs one by one.
    pub fn interpret(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let mut result = Value::Null;
        let env = self.env.clone();

        for stmt in &program.statements {
            result = self.eval_statement(stmt, &env);
            match result {
                Value::Return(value) => return Ok(*value),
                Value::Error(message) => return Err(RuntimeError::general(message)),
                _ => {}
            }
        }

        Ok(result)
    }

    fn eval_statement(&mut self, stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> Value {
        match &stmt.kind {
            StmtKind::Expression(expr) => self.eval_expression(expr, env),

            StmtKind::Let { name, value } => {
                if env.borrow().contains_local(name) {
                    return Value::error(format!(
                        "Variable '{}' is already defined in this scope",
                        name
                    ));
                }
                let value = self.eval_expression(value, env);
                if value.is_error() {
                    return value;
                }
                env.borrow_mut().define(name.clone(), value);
                Value::Null
            }

            StmtKind::Return(expr) => {
                let value = self.eval_expression(expr, env);
                if value.is_error() {
                    return value;
                }
                Value::Return(Box::new(value))
            }

            StmtKind::Block(statements) => self.eval_block(statements, env),
        }
    }

    /// Evaluate a block, propagating `Return` and `Error` unwrapped so the
    /// nearest function boundary (or the top level) can handle them.
    fn eval_block(&mut self, statements: &[Stmt], env: &Rc<RefCell<Environment>>) -> Value {
        let mut result = Value::Null;

        for stmt in statements {
            result = self.eval_statement(stmt, env);
            if matches!(result, Value::Return(_) | Value::Error(_)) {
                return result;
            }
        }

        result
    }

    fn eval_expression(&mut self, expr: &Expr, env: &Rc<RefCell<Environment>>) -> Value {
        match &expr.kind {
            ExprKind::IntLiteral(n) => Value::Int(*n),
            ExprKind::StringLiteral(s) => Value::string(s.clone()),
            ExprKind::BoolLiteral(b) => Value::Bool(*b),

            ExprKind::Identifier(name) => match env.borrow().get(name) {
                Some(value) => value,
                None => Value::error(format!("Identifier not found: {}", name)),
            },

            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.eval_expression(element, env);
                    if value.is_error() {
                        return value;
                    }
                    values.push(value);
                }
                Value::Array(Rc::new(values))
            }

            ExprKind::Unary { operator, operand } => {
                let value = self.eval_expression(operand, env);
                if value.is_error() {
                    return value;
                }
                self.eval_unary(*operator, value)
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, env);
                if left.is_error() {
                    return left;
                }
                let right = self.eval_expression(right, env);
                if right.is_error() {
                    return right;
                }
                self.eval_binary(*operator, left, right)
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, env);
                if condition.is_error() {
                    return condition;
                }
                if condition.is_truthy() {
                    self.eval_statement(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_statement(alternative, env)
                } else {
                    Value::Null
                }
            }

            ExprKind::Function { parameters, body } => Value::Function(Rc::new(FunctionValue {
                parameters: parameters.clone(),
                body: body.clone(),
                env: env.clone(),
            })),

            ExprKind::Call { callee, arguments } => {
                let callee = self.eval_expression(callee, env);
                if callee.is_error() {
                    return callee;
                }
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let value = self.eval_expression(argument, env);
                    if value.is_error() {
                        return value;
                    }
                    args.push(value);
                }
                self.apply(callee, args)
            }

            ExprKind::Index { object, index } => {
                let object = self.eval_expression(object, env);
                if object.is_error() {
                    return object;
                }
                let index = self.eval_expression(index, env);
                if index.is_error() {
                    return index;
                }
                self.eval_index(object, index)
            }
        }
    }

    fn eval_unary(&self, operator: UnaryOp, value: Value) -> Value {
        match operator {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Negate => match value {
                Value::Int(n) => Value::Int(n.wrapping_neg()),
                other => Value::error(format!("Cannot negate {}", other.type_name())),
            },
        }
    }

    fn eval_binary(&self, operator: BinaryOp, left: Value, right: Value) -> Value {
        match (&left, &right) {
            (Value::Int(l), Value::Int(r)) => {
                let (l, r) = (*l, *r);
                match operator {
                    BinaryOp::Add => Value::Int(l.wrapping_add(r)),
                    BinaryOp::Subtract => Value::Int(l.wrapping_sub(r)),
                    BinaryOp::Multiply => Value::Int(l.wrapping_mul(r)),
                    BinaryOp::Divide => {
                        if r == 0 {
                            Value::error("Division by zero")
                        } else {
                            Value::Int(l.wrapping_div(r))
                        }
                    }
                    BinaryOp::Equal => Value::Bool(l == r),
                    BinaryOp::NotEqual => Value::Bool(l != r),
                    BinaryOp::Less => Value::Bool(l < r),
                    BinaryOp::Greater => Value::Bool(l > r),
                }
            }

            (Value::Bool(l), Value::Bool(r)) => match operator {
                BinaryOp::Equal => Value::Bool(l == r),
                BinaryOp::NotEqual => Value::Bool(l != r),
                _ => Value::error(format!(
                    "Unsupported types for binary operation: Bool {} Bool",
                    operator
                )),
            },

            (Value::String(l), Value::String(r)) => match operator {
                BinaryOp::Add => Value::string(format!("{}{}", l, r)),
                _ => Value::error(format!(
                    "Unsupported types for binary operation: String {} String",
                    operator
                )),
            },

            _ => Value::error(format!(
                "Unsupported types for binary operation: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        }
    }

    fn eval_index(&self, object: Value, index: Value) -> Value {
        let Value::Array(elements) = &object else {
            return Value::error(format!("Cannot index {}", object.type_name()));
        };
        let Value::Int(i) = index else {
            return Value::error(format!(
                "Array index must be Int, got {}",
                index.type_name()
            ));
        };
        if i < 0 || i as usize >= elements.len() {
            return Value::error(format!(
                "Index {} out of bounds for array of length {}",
                i,
                elements.len()
            ));
        }
        elements[i as usize].clone()
    }

    fn apply(&mut self, callee: Value, args: Vec<Value>) -> Value {
        match callee {
            Value::Function(func) => {
                if args.len() != func.parameters.len() {
                    return Value::error(format!(
                        "Wrong number of arguments: expected {}, got {}",
                        func.parameters.len(),
                        args.len()
                    ));
                }
                let mut call_env = Environment::with_enclosing(func.env.clone());
                for (param, arg) in func.parameters.iter().zip(args) {
                    call_env.define(param.clone(), arg);
                }
                let call_env = Rc::new(RefCell::new(call_env));
                match self.eval_block(&func.body, &call_env) {
                    Value::Return(value) => *value,
                    other => other,
                }
            }
            Value::Builtin(builtin) => (builtin.func)(&args),
            other => Value::error(format!("Cannot call value of type {}", other.type_name())),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn eval(source: &str) -> Value {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        assert!(parser.errors().is_empty(), "parse errors: {:?}", parser.errors());
        Interpreter::new().interpret(&program).unwrap()
    }

    fn eval_err(source: &str) -> RuntimeError {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        Interpreter::new().interpret(&program).unwrap_err()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3;"), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3;"), Value::Int(9));
        assert_eq!(eval("10 / 2 - 3;"), Value::Int(2));
        assert_eq!(eval("-5 + 5;"), Value::Int(0));
    }

    #[test]
    fn test_let_bindings() {
        assert_eq!(eval("let a = 5; let b = a + 10; b;"), Value::Int(15));
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(eval("if (1 < 2) { 10 } else { 20 };"), Value::Int(10));
        assert_eq!(eval("if (1 > 2) { 10 } else { 20 };"), Value::Int(20));
        assert_eq!(eval("if (false) { 10 };"), Value::Null);
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(eval("\"mon\" + \"key\";"), Value::string("monkey"));
    }

    #[test]
    fn test_array_index() {
        assert_eq!(eval("[1, 2, 3][1];"), Value::Int(2));
        assert_eq!(eval("let i = 2; [1, 2, 3][i];"), Value::Int(3));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(eval("let add = fn(a, b) { a + b }; add(3, 4);"), Value::Int(7));
        assert_eq!(eval("let f = fn() { return 99; 100 }; f();"), Value::Int(99));
    }

    #[test]
    fn test_closures() {
        assert_eq!(
            eval("let adder = fn(x) { fn(y) { x + y } }; let add2 = adder(2); add2(5);"),
            Value::Int(7)
        );
    }

    #[test]
    fn test_recursion() {
        assert_eq!(
            eval("let fib = fn(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } }; fib(10);"),
            Value::Int(55)
        );
    }

    #[test]
    fn test_len_builtin() {
        assert_eq!(eval("len(\"hello\");"), Value::Int(5));
        assert_eq!(eval("len([1, 2, 3, 4]);"), Value::Int(4));
    }

    #[test]
    fn test_bang_and_truthiness() {
        assert_eq!(eval("!false;"), Value::Bool(true));
        assert_eq!(eval("!0;"), Value::Bool(false));
        assert_eq!(eval("!!\"\";"), Value::Bool(true));
    }

    #[test]
    fn test_error_propagation() {
        let err = eval_err("1 + true;");
        assert!(err.to_string().contains("Unsupported types"));

        let err = eval_err("missing;");
        assert!(err.to_string().contains("Identifier not found"));

        let err = eval_err("[1, 2][5];");
        assert!(err.to_string().contains("out of bounds"));

        let err = eval_err("len(7);");
        assert!(err.to_string().contains("unsupported argument"));
    }

    #[test]
    fn test_redefinition_is_an_error() {
        let err = eval_err("let x = 1; let x = 2;");
        assert!(err.to_string().contains("already defined"));
    }

    #[test]
    fn test_state_persists_across_interpret_calls() {
        let mut interpreter = Interpreter::new();
        let run = |interp: &mut Interpreter, src: &str| {
            let tokens = Scanner::new(src).scan_tokens().unwrap();
            let mut parser = Parser::new(tokens);
            let program = parser.parse();
            interp.interpret(&program).unwrap()
        };
        run(&mut interpreter, "let x = 40;");
        assert_eq!(run(&mut interpreter, "x + 2;"), Value::Int(42));
    }
}
