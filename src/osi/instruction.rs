//! OSI instruction set.
//!
//! Every instruction is a one byte opcode followed by its little-endian operands:
//!
//! | Opcode        | Mnemonic        | Operands                   | Stack            |
//! |---------------|-----------------|----------------------------|------------------|
//! | `0x00`        | `nop`           |                            |                  |
//! | `0x01`        | `push.i`        | `i32` value                | `-> v`           |
//! | `0x02`        | `push.f`        | `f32` value                | `-> v`           |
//! | `0x03`        | `push.s`        | `u16` length, UTF-8 bytes  | `-> v`           |
//! | `0x04`/`0x05` | `ld.loc`/`ld.glb` | `u16` slot               | `-> v`           |
//! | `0x06`/`0x07` | `st.loc`/`st.glb` | `u16` slot               | `v ->`           |
//! | `0x08`        | `pop`           |                            | `v ->`           |
//! | `0x10..=0x1C` | binary operators |                           | `a, b -> r`      |
//! | `0x20`/`0x21` | `neg`/`not`     |                            | `v -> r`         |
//! | `0x30`        | `call`          | `u16` subroutine, `u8` argc | `args.. -> r`   |
//! | `0x40`        | `jmp`           | `i16` delta                |                  |
//! | `0x41`        | `jmp.f`         | `i16` delta                | `c ->`           |
//! | `0x50`        | `ret`           |                            |                  |
//! | `0x51`        | `ret.v`         |                            | `v ->`           |
//!
//! Branch deltas are relative to the end of the branch instruction. `jmp.f` pops its
//! condition and branches when it is false, falling through otherwise.

use std::fmt;

use strum::FromRepr;

use crate::lss::{BinaryOp, UnaryOp, Variable};

/// Raw opcode byte values.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    PushInt = 0x01,
    PushFloat = 0x02,
    PushString = 0x03,
    LoadLocal = 0x04,
    LoadGlobal = 0x05,
    StoreLocal = 0x06,
    StoreGlobal = 0x07,
    Pop = 0x08,
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,
    Eq = 0x15,
    Ne = 0x16,
    Lt = 0x17,
    Le = 0x18,
    Gt = 0x19,
    Ge = 0x1A,
    And = 0x1B,
    Or = 0x1C,
    Neg = 0x20,
    Not = 0x21,
    Call = 0x30,
    Jump = 0x40,
    JumpIfFalse = 0x41,
    Return = 0x50,
    ReturnValue = 0x51,
}

impl Opcode {
    pub(crate) const fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            Opcode::Add => BinaryOp::Add,
            Opcode::Sub => BinaryOp::Sub,
            Opcode::Mul => BinaryOp::Mul,
            Opcode::Div => BinaryOp::Div,
            Opcode::Mod => BinaryOp::Mod,
            Opcode::Eq => BinaryOp::Eq,
            Opcode::Ne => BinaryOp::Ne,
            Opcode::Lt => BinaryOp::Lt,
            Opcode::Le => BinaryOp::Le,
            Opcode::Gt => BinaryOp::Gt,
            Opcode::Ge => BinaryOp::Ge,
            Opcode::And => BinaryOp::And,
            Opcode::Or => BinaryOp::Or,
            _ => return None,
        })
    }

    const fn from_binary_op(op: BinaryOp) -> Opcode {
        match op {
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Sub => Opcode::Sub,
            BinaryOp::Mul => Opcode::Mul,
            BinaryOp::Div => Opcode::Div,
            BinaryOp::Mod => Opcode::Mod,
            BinaryOp::Eq => Opcode::Eq,
            BinaryOp::Ne => Opcode::Ne,
            BinaryOp::Lt => Opcode::Lt,
            BinaryOp::Le => Opcode::Le,
            BinaryOp::Gt => Opcode::Gt,
            BinaryOp::Ge => Opcode::Ge,
            BinaryOp::And => Opcode::And,
            BinaryOp::Or => Opcode::Or,
        }
    }
}

/// A decoded operation with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// No operation
    Nop,
    /// Push an integer constant
    PushInt(i32),
    /// Push a float constant
    PushFloat(f32),
    /// Push a string constant
    PushString(String),
    /// Push the value of a variable
    Load(Variable),
    /// Pop a value into a variable
    Store(Variable),
    /// Pop and discard a value
    Pop,
    /// Pop two operands and push the result
    Binary(BinaryOp),
    /// Pop one operand and push the result
    Unary(UnaryOp),
    /// Pop `argc` arguments, call subroutine `target` and push its result
    Call {
        /// Subroutine index within the module
        target: u16,
        /// Number of arguments taken from the stack
        argc: u8,
    },
    /// Unconditional relative branch
    Jump(i16),
    /// Pop a condition and branch if it is false
    JumpIfFalse(i16),
    /// Return without a value
    Return,
    /// Pop a value and return it
    ReturnValue,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Execution continues with the next instruction
    Sequential,
    /// Unconditional branch
    Branch,
    /// Two-way conditional branch
    ConditionalBranch,
    /// Leaves the subroutine
    Return,
}

impl Operation {
    /// Control flow category of the operation.
    #[must_use]
    pub const fn flow_type(&self) -> FlowType {
        match self {
            Operation::Jump(_) => FlowType::Branch,
            Operation::JumpIfFalse(_) => FlowType::ConditionalBranch,
            Operation::Return | Operation::ReturnValue => FlowType::Return,
            _ => FlowType::Sequential,
        }
    }

    /// Appends the encoded form of the operation to `out`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for string constants longer than `u16::MAX` bytes.
    pub fn encode(&self, out: &mut Vec<u8>) -> crate::Result<()> {
        match self {
            Operation::Nop => out.push(Opcode::Nop as u8),
            Operation::PushInt(value) => {
                out.push(Opcode::PushInt as u8);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Operation::PushFloat(value) => {
                out.push(Opcode::PushFloat as u8);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Operation::PushString(value) => {
                let len = u16::try_from(value.len())
                    .map_err(|_| malformed_error!("String constant of {} bytes", value.len()))?;
                out.push(Opcode::PushString as u8);
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(value.as_bytes());
            }
            Operation::Load(variable) | Operation::Store(variable) => {
                let store = matches!(self, Operation::Store(_));
                let (opcode, slot) = match (variable, store) {
                    (Variable::Local(slot), false) => (Opcode::LoadLocal, slot),
                    (Variable::Global(slot), false) => (Opcode::LoadGlobal, slot),
                    (Variable::Local(slot), true) => (Opcode::StoreLocal, slot),
                    (Variable::Global(slot), true) => (Opcode::StoreGlobal, slot),
                };
                out.push(opcode as u8);
                out.extend_from_slice(&slot.to_le_bytes());
            }
            Operation::Pop => out.push(Opcode::Pop as u8),
            Operation::Binary(op) => out.push(Opcode::from_binary_op(*op) as u8),
            Operation::Unary(UnaryOp::Neg) => out.push(Opcode::Neg as u8),
            Operation::Unary(UnaryOp::Not) => out.push(Opcode::Not as u8),
            Operation::Call { target, argc } => {
                out.push(Opcode::Call as u8);
                out.extend_from_slice(&target.to_le_bytes());
                out.push(*argc);
            }
            Operation::Jump(delta) => {
                out.push(Opcode::Jump as u8);
                out.extend_from_slice(&delta.to_le_bytes());
            }
            Operation::JumpIfFalse(delta) => {
                out.push(Opcode::JumpIfFalse as u8);
                out.extend_from_slice(&delta.to_le_bytes());
            }
            Operation::Return => out.push(Opcode::Return as u8),
            Operation::ReturnValue => out.push(Opcode::ReturnValue as u8),
        }
        Ok(())
    }
}

/// A decoded instruction at a known position.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Absolute byte offset of the opcode
    pub offset: u64,
    /// Encoded size in bytes, opcode included
    pub size: u32,
    /// The operation
    pub operation: Operation,
}

impl Instruction {
    /// Offset of the following instruction.
    #[must_use]
    pub const fn next_offset(&self) -> u64 {
        self.offset + self.size as u64
    }

    /// Control flow category of the instruction.
    #[must_use]
    pub const fn flow_type(&self) -> FlowType {
        self.operation.flow_type()
    }

    /// Absolute branch target.
    ///
    /// Returns `None` for non-branch instructions and for targets before offset 0.
    #[must_use]
    pub fn branch_target(&self) -> Option<u64> {
        match self.operation {
            Operation::Jump(delta) | Operation::JumpIfFalse(delta) => self
                .next_offset()
                .checked_add_signed(i64::from(delta)),
            _ => None,
        }
    }

    /// The raw branch displacement, or `None` for non-branch instructions.
    #[must_use]
    pub const fn branch_delta(&self) -> Option<i16> {
        match self.operation {
            Operation::Jump(delta) | Operation::JumpIfFalse(delta) => Some(delta),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}: ", self.offset)?;
        match &self.operation {
            Operation::Nop => f.write_str("nop"),
            Operation::PushInt(value) => write!(f, "push.i {value}"),
            Operation::PushFloat(value) => write!(f, "push.f {value:?}"),
            Operation::PushString(value) => write!(f, "push.s \"{}\"", value.escape_default()),
            Operation::Load(variable) => write!(f, "ld {variable}"),
            Operation::Store(variable) => write!(f, "st {variable}"),
            Operation::Pop => f.write_str("pop"),
            Operation::Binary(op) => write!(f, "{}", op.symbol()),
            Operation::Unary(UnaryOp::Neg) => f.write_str("neg"),
            Operation::Unary(UnaryOp::Not) => f.write_str("not"),
            Operation::Call { target, argc } => write!(f, "call sub_{target}, {argc}"),
            Operation::Jump(_) | Operation::JumpIfFalse(_) => {
                let mnemonic = if matches!(self.operation, Operation::Jump(_)) {
                    "jmp"
                } else {
                    "jmp.f"
                };
                match (self.branch_target(), self.branch_delta()) {
                    (Some(target), _) => write!(f, "{mnemonic} {target:04X}"),
                    (None, Some(delta)) => write!(f, "{mnemonic} {delta:+}"),
                    (None, None) => f.write_str(mnemonic),
                }
            }
            Operation::Return => f.write_str("ret"),
            Operation::ReturnValue => f.write_str("ret.v"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_operands() {
        let mut out = Vec::new();
        Operation::PushInt(-2).encode(&mut out).unwrap();
        Operation::Store(Variable::Global(3)).encode(&mut out).unwrap();
        Operation::Call { target: 0x0102, argc: 2 }.encode(&mut out).unwrap();
        Operation::JumpIfFalse(-4).encode(&mut out).unwrap();
        Operation::PushString("ok".into()).encode(&mut out).unwrap();

        assert_eq!(
            out,
            vec![
                0x01, 0xFE, 0xFF, 0xFF, 0xFF, // push.i -2
                0x07, 0x03, 0x00, // st.glb 3
                0x30, 0x02, 0x01, 0x02, // call 0x102, 2
                0x41, 0xFC, 0xFF, // jmp.f -4
                0x03, 0x02, 0x00, b'o', b'k', // push.s "ok"
            ]
        );
    }

    #[test]
    fn opcode_lookup() {
        assert_eq!(Opcode::from_repr(0x41), Some(Opcode::JumpIfFalse));
        assert_eq!(Opcode::from_repr(0x17).and_then(Opcode::binary_op), Some(BinaryOp::Lt));
        assert_eq!(Opcode::from_repr(0x09), None);
    }

    #[test]
    fn branch_targets_are_relative_to_next() {
        let jump = Instruction {
            offset: 0x10,
            size: 3,
            operation: Operation::Jump(-0x13),
        };
        assert_eq!(jump.flow_type(), FlowType::Branch);
        assert_eq!(jump.branch_target(), Some(0));
        assert_eq!(jump.to_string(), "0010: jmp 0000");

        let forward = Instruction {
            offset: 0x10,
            size: 3,
            operation: Operation::JumpIfFalse(5),
        };
        assert_eq!(forward.branch_target(), Some(0x18));
        assert_eq!(forward.flow_type(), FlowType::ConditionalBranch);

        let before_start = Instruction {
            offset: 0x10,
            size: 3,
            operation: Operation::Jump(-0x14),
        };
        assert_eq!(before_start.branch_target(), None);
        assert_eq!(before_start.to_string(), "0010: jmp -20");
    }

    #[test]
    fn flow_categories() {
        assert_eq!(Operation::ReturnValue.flow_type(), FlowType::Return);
        assert_eq!(Operation::Pop.flow_type(), FlowType::Sequential);
        assert_eq!(Instruction { offset: 0, size: 1, operation: Operation::Return }.branch_target(), None);
    }
}
