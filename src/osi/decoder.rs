//! OSI decoding.
//!
//! [`decode_stream`] turns the raw code bytes of one subroutine into [`Instruction`]s,
//! [`Module::parse`] reads a complete OSI file and decodes every subroutine in it.
//!
//! # Module layout
//!
//! ```text
//! 0x00  [u8; 4]  magic "OSI\0"
//! 0x04  u32      subroutine count
//! 0x08  entries  count * { u32 name offset, u32 code offset, u32 code size }
//! ....  names    NUL terminated, referenced by the entries
//! ....  code     per subroutine, referenced by the entries
//! ```
//!
//! All offsets are absolute file offsets.

use crate::{
    file::io::read_le_at,
    lss::{UnaryOp, Variable},
    osi::instruction::{Instruction, Opcode, Operation},
    Result,
};

/// Magic bytes at the start of every OSI module.
pub const OSI_MAGIC: [u8; 4] = *b"OSI\0";

/// One decoded subroutine.
#[derive(Debug, Clone, PartialEq)]
pub struct Subroutine {
    /// Subroutine name from the module name table
    pub name: String,
    /// Absolute offset of the first instruction
    pub base_offset: u64,
    /// Size of the code in bytes
    pub code_size: u64,
    /// Decoded instructions in file order
    pub instructions: Vec<Instruction>,
}

impl Subroutine {
    /// Decodes `code`, which starts at absolute offset `base_offset`.
    ///
    /// # Errors
    /// See [`decode_stream`].
    pub fn decode(name: impl Into<String>, code: &[u8], base_offset: u64) -> Result<Subroutine> {
        Ok(Subroutine {
            name: name.into(),
            base_offset,
            code_size: code.len() as u64,
            instructions: decode_stream(code, base_offset)?,
        })
    }

    /// Offset one past the last code byte.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.base_offset + self.code_size
    }
}

/// A decoded OSI module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Subroutines in table order; `call` operands index into this list
    pub subroutines: Vec<Subroutine>,
}

impl Module {
    /// Parses and decodes a complete OSI module.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadMagic`] if the file does not start with [`OSI_MAGIC`],
    /// [`crate::Error::OutOfBounds`] if a table entry points outside the file and
    /// [`crate::Error::Malformed`] for undecodable code.
    pub fn parse(data: &[u8]) -> Result<Module> {
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        let mut offset = 0;
        let mut found = [0u8; 4];
        for byte in &mut found {
            *byte = read_le_at(data, &mut offset)?;
        }
        if found != OSI_MAGIC {
            return Err(crate::Error::BadMagic {
                expected: OSI_MAGIC,
                found,
            });
        }

        let count = read_le_at::<u32>(data, &mut offset)?;
        let mut subroutines = Vec::new();
        for _ in 0..count {
            let name_offset = read_le_at::<u32>(data, &mut offset)? as usize;
            let code_offset = read_le_at::<u32>(data, &mut offset)? as usize;
            let code_size = read_le_at::<u32>(data, &mut offset)? as usize;

            let name = read_name(data, name_offset)?;
            let Some(code_end) = code_offset.checked_add(code_size) else {
                return Err(out_of_bounds_error!());
            };
            let Some(code) = data.get(code_offset..code_end) else {
                return Err(out_of_bounds_error!());
            };

            log::trace!(
                "subroutine '{}' at 0x{:X}, {} bytes",
                name,
                code_offset,
                code_size
            );
            subroutines.push(Subroutine::decode(name, code, code_offset as u64)?);
        }

        Ok(Module { subroutines })
    }
}

fn read_name(data: &[u8], offset: usize) -> Result<String> {
    let Some(tail) = data.get(offset..) else {
        return Err(out_of_bounds_error!());
    };
    let Some(len) = tail.iter().position(|&b| b == 0) else {
        return Err(out_of_bounds_error!());
    };

    String::from_utf8(tail[..len].to_vec())
        .map_err(|error| malformed_error!("Invalid subroutine name - {}", error))
}

/// Decodes a linear instruction stream.
///
/// `base_offset` is the absolute offset of `code[0]`; instruction offsets and branch
/// targets are absolute.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown opcodes and invalid string constants,
/// and [`crate::Error::OutOfBounds`] for truncated operands.
pub fn decode_stream(code: &[u8], base_offset: u64) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0_usize;

    while offset < code.len() {
        let start = offset;
        let operation = decode_operation(code, &mut offset, base_offset)?;

        instructions.push(Instruction {
            offset: base_offset + start as u64,
            size: u32::try_from(offset - start)
                .map_err(|_| malformed_error!("Instruction at 0x{:X} too large", start))?,
            operation,
        });
    }

    Ok(instructions)
}

fn decode_operation(code: &[u8], offset: &mut usize, base_offset: u64) -> Result<Operation> {
    let at = base_offset + *offset as u64;
    let byte = read_le_at::<u8>(code, offset)?;
    let Some(opcode) = Opcode::from_repr(byte) else {
        return Err(malformed_error!("Unknown opcode 0x{:02X} at 0x{:X}", byte, at));
    };

    if let Some(op) = opcode.binary_op() {
        return Ok(Operation::Binary(op));
    }

    Ok(match opcode {
        Opcode::Nop => Operation::Nop,
        Opcode::PushInt => Operation::PushInt(read_le_at(code, offset)?),
        Opcode::PushFloat => Operation::PushFloat(read_le_at(code, offset)?),
        Opcode::PushString => {
            let len = read_le_at::<u16>(code, offset)? as usize;
            let Some(bytes) = code.get(*offset..*offset + len) else {
                return Err(out_of_bounds_error!());
            };
            *offset += len;
            let value = String::from_utf8(bytes.to_vec()).map_err(|error| {
                malformed_error!("Invalid string constant at 0x{:X} - {}", at, error)
            })?;
            Operation::PushString(value)
        }
        Opcode::LoadLocal => Operation::Load(Variable::Local(read_le_at(code, offset)?)),
        Opcode::LoadGlobal => Operation::Load(Variable::Global(read_le_at(code, offset)?)),
        Opcode::StoreLocal => Operation::Store(Variable::Local(read_le_at(code, offset)?)),
        Opcode::StoreGlobal => Operation::Store(Variable::Global(read_le_at(code, offset)?)),
        Opcode::Pop => Operation::Pop,
        Opcode::Neg => Operation::Unary(UnaryOp::Neg),
        Opcode::Not => Operation::Unary(UnaryOp::Not),
        Opcode::Call => {
            let target = read_le_at(code, offset)?;
            let argc = read_le_at(code, offset)?;
            Operation::Call { target, argc }
        }
        Opcode::Jump => Operation::Jump(read_le_at(code, offset)?),
        Opcode::JumpIfFalse => Operation::JumpIfFalse(read_le_at(code, offset)?),
        Opcode::Return => Operation::Return,
        Opcode::ReturnValue => Operation::ReturnValue,
        // Binary operators are handled above.
        _ => return Err(malformed_error!("Unhandled opcode {:?} at 0x{:X}", opcode, at)),
    })
}

/// Encodes `operations` back to bytes.
///
/// # Errors
/// See [`Operation::encode`].
pub fn encode_stream(operations: &[Operation]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for operation in operations {
        operation.encode(&mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lss::BinaryOp, Error};

    #[test]
    fn decode_simple_stream() {
        #[rustfmt::skip]
        let code = vec![
            0x04, 0x00, 0x00,             // ld.loc 0
            0x01, 0x0A, 0x00, 0x00, 0x00, // push.i 10
            0x17,                         // lt
            0x41, 0x02, 0x00,             // jmp.f +2
            0x08,                         // pop
            0x00,                         // nop
            0x50,                         // ret
        ];

        let instructions = decode_stream(&code, 0x100).unwrap();
        assert_eq!(instructions.len(), 7);
        assert_eq!(instructions[0].operation, Operation::Load(Variable::Local(0)));
        assert_eq!(instructions[1].operation, Operation::PushInt(10));
        assert_eq!(instructions[2].operation, Operation::Binary(BinaryOp::Lt));
        assert_eq!(instructions[3].offset, 0x109);
        assert_eq!(instructions[3].size, 3);
        assert_eq!(instructions[3].branch_target(), Some(0x10E));
        assert_eq!(instructions[6].offset, 0x10E);
    }

    #[test]
    fn unknown_opcode() {
        assert!(matches!(
            decode_stream(&[0x00, 0xEE], 0),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn truncated_operand() {
        assert!(matches!(
            decode_stream(&[0x01, 0x00, 0x00], 0),
            Err(Error::OutOfBounds)
        ));
        assert!(matches!(
            decode_stream(&[0x03, 0x05, 0x00, b'a'], 0),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn encode_decode_agree() {
        let operations = vec![
            Operation::PushString("idle".into()),
            Operation::PushFloat(0.5),
            Operation::Call { target: 7, argc: 2 },
            Operation::Pop,
            Operation::Jump(-12),
            Operation::ReturnValue,
        ];
        let code = encode_stream(&operations).unwrap();
        let decoded: Vec<Operation> = decode_stream(&code, 0)
            .unwrap()
            .into_iter()
            .map(|i| i.operation)
            .collect();
        assert_eq!(decoded, operations);
    }

    #[test]
    fn parse_module() {
        #[rustfmt::skip]
        let data = vec![
            b'O', b'S', b'I', 0x00,     // magic
            0x02, 0x00, 0x00, 0x00,     // subroutine count
            0x20, 0x00, 0x00, 0x00,     // [0] name offset
            0x2A, 0x00, 0x00, 0x00,     // [0] code offset
            0x01, 0x00, 0x00, 0x00,     // [0] code size
            0x25, 0x00, 0x00, 0x00,     // [1] name offset
            0x2B, 0x00, 0x00, 0x00,     // [1] code offset
            0x02, 0x00, 0x00, 0x00,     // [1] code size
            b'm', b'a', b'i', b'n', 0x00, // 0x20 "main"
            b'i', b'd', b'l', b'e', 0x00, // 0x25 "idle"
            0x50,                       // 0x2A ret
            0x00, 0x50,                 // 0x2B nop, ret
        ];

        let module = Module::parse(&data).unwrap();
        assert_eq!(module.subroutines.len(), 2);
        assert_eq!(module.subroutines[0].name, "main");
        assert_eq!(module.subroutines[0].base_offset, 0x2A);
        assert_eq!(module.subroutines[1].name, "idle");
        assert_eq!(module.subroutines[1].instructions.len(), 2);
        assert_eq!(module.subroutines[1].instructions[1].offset, 0x2C);
        assert_eq!(module.subroutines[1].end_offset(), 0x2D);
    }

    #[test]
    fn parse_bad_magic() {
        let data = vec![b'S', b'L', b'B', 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Module::parse(&data),
            Err(Error::BadMagic { found, .. }) if found == *b"SLB\0"
        ));
    }

    #[test]
    fn parse_code_out_of_bounds() {
        #[rustfmt::skip]
        let data = vec![
            b'O', b'S', b'I', 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x14, 0x00, 0x00, 0x00,     // name offset
            0x16, 0x00, 0x00, 0x00,     // code offset
            0x10, 0x00, 0x00, 0x00,     // code size, past the end
            b'x', 0x00,
        ];
        assert!(matches!(Module::parse(&data), Err(Error::OutOfBounds)));
    }
}
