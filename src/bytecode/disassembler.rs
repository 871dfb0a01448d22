//! Bytecode disassembler for debugging.
//!
//! One line per instruction: `<offset:%04x> <mnemonic> <operand> ...`

use std::fmt::Write;

use crate::bytecode::chunk::{Bytecode, Instructions};
use crate::bytecode::instruction::OpCode;
use crate::object::Value;

/// Disassemble a single instruction stream.
pub fn disassemble(instructions: &Instructions) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset < instructions.len() {
        offset = disassemble_instruction(instructions, offset, &mut output);
    }

    output
}

/// Disassemble a whole program: the top-level stream followed by a section
/// for every function in the constant pool.
pub fn disassemble_bytecode(bytecode: &Bytecode) -> String {
    let mut output = String::from("== main ==\n");
    output.push_str(&disassemble(&bytecode.instructions));

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Value::CompiledFunction(func) = constant {
            let _ = writeln!(
                &mut output,
                "\n== fn {} (locals: {}, parameters: {}) ==",
                index, func.num_locals, func.num_parameters
            );
            output.push_str(&disassemble(&func.instructions));
        }
    }

    output
}

/// Disassemble the instruction at `offset`; returns the next offset.
pub fn disassemble_instruction(
    instructions: &Instructions,
    offset: usize,
    output: &mut String,
) -> usize {
    let byte = instructions.code[offset];
    let Some(opcode) = OpCode::from_u8(byte) else {
        let _ = writeln!(output, "{:04x} <unknown opcode {}>", offset, byte);
        return offset + 1;
    };

    match opcode.operand_width() {
        2 => {
            let operand = instructions.read_u16(offset + 1);
            let _ = writeln!(output, "{:04x} {} {}", offset, opcode.mnemonic(), operand);
            offset + 3
        }
        1 => {
            let operand = instructions.code[offset + 1];
            let _ = writeln!(output, "{:04x} {} {}", offset, opcode.mnemonic(), operand);
            offset + 2
        }
        _ => {
            let _ = writeln!(output, "{:04x} {}", offset, opcode.mnemonic());
            offset + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::make;

    fn instructions_from(parts: &[Vec<u8>]) -> Instructions {
        Instructions {
            code: parts.concat(),
        }
    }

    #[test]
    fn test_disassemble_format() {
        let instructions = instructions_from(&[
            make(OpCode::Constant, &[1]),
            make(OpCode::Constant, &[2]),
            make(OpCode::Add, &[]),
            make(OpCode::GetLocal, &[1]),
            make(OpCode::Pop, &[]),
        ]);

        let expected = "\
0000 OpConstant 1
0003 OpConstant 2
0006 OpAdd
0007 OpGetLocal 1
0009 OpPop
";
        assert_eq!(disassemble(&instructions), expected);
    }

    #[test]
    fn test_offsets_are_hex() {
        let parts: Vec<Vec<u8>> = (0..6).map(|i| make(OpCode::Constant, &[i])).collect();
        let instructions = instructions_from(&parts);
        let output = disassemble(&instructions);
        // Sixth instruction starts at byte 15 = 0x0f.
        assert!(output.contains("000f OpConstant 5"));
    }

    #[test]
    fn test_make_roundtrip() {
        // Encoding an instruction and disassembling it reproduces the
        // mnemonic and operand values.
        let cases: Vec<(OpCode, Vec<usize>)> = vec![
            (OpCode::Constant, vec![65534]),
            (OpCode::Jump, vec![258]),
            (OpCode::JumpNotTruthy, vec![3]),
            (OpCode::SetGlobal, vec![7]),
            (OpCode::GetLocal, vec![255]),
            (OpCode::Call, vec![2]),
            (OpCode::Array, vec![12]),
            (OpCode::Add, vec![]),
            (OpCode::ReturnValue, vec![]),
        ];

        for (op, operands) in cases {
            let instructions = Instructions {
                code: make(op, &operands),
            };
            let line = disassemble(&instructions);
            let mut parts = line.trim_end().split(' ');

            assert_eq!(parts.next(), Some("0000"));
            assert_eq!(parts.next(), Some(op.mnemonic()));
            let decoded: Vec<usize> = parts.map(|p| p.parse().unwrap()).collect();
            assert_eq!(decoded, operands);
        }
    }

    #[test]
    fn test_unknown_opcode() {
        let instructions = Instructions { code: vec![0xfe] };
        assert!(disassemble(&instructions).contains("unknown opcode 254"));
    }
}
