//! Built-in functions available to every program.

use super::{BuiltinFunction, Value};

/// The default builtin population. The driver defines each name in the
/// outermost symbol table and stores the value in the matching global slot.
pub const BUILTINS: &[BuiltinFunction] = &[BuiltinFunction {
    name: "len",
    func: builtin_len,
}];

fn builtin_len(args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::error(format!("len: expected 1 argument, got {}", args.len()));
    }
    match &args[0] {
        Value::String(s) => Value::Int(s.len() as i64),
        Value::Array(elements) => Value::Int(elements.len() as i64),
        other => Value::error(format!("len: unsupported argument of type {}", other.type_name())),
    }
}
