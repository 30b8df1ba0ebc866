//! Bit-level encoding and decoding of the seven instruction shapes.

use arbitrary_int::u7;
use thiserror::Error;

use super::{AddressingMode, Mnemonic, Register};
use crate::word::Word;

/// A field could not be packed into its instruction slot, or a word does not
/// decode to a known instruction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// A signed or unsigned field value does not fit in its bit slot.
    #[error("value {value} does not fit in the {bits}-bit {field} field")]
    FieldOutOfRange {
        /// Name of the offending field, for diagnostics.
        field: &'static str,
        /// The value that was rejected.
        value: i64,
        /// Width of the field's slot, in bits.
        bits: u32,
    },
    /// The low 7 bits of a word do not name any instruction.
    #[error("opcode {0:#09b} does not name an instruction")]
    UnknownOpcode(u8),
}

fn encode_unsigned(value: u32, bits: u32, field: &'static str) -> Result<u32, EncodingError> {
    if bits < 32 && value >= (1 << bits) {
        return Err(EncodingError::FieldOutOfRange {
            field,
            value: i64::from(value),
            bits,
        });
    }
    Ok(value)
}

fn encode_signed(value: i32, bits: u32, field: &'static str) -> Result<u32, EncodingError> {
    let lo = -(1i64 << (bits - 1));
    let hi = (1i64 << (bits - 1)) - 1;
    let value64 = i64::from(value);
    if value64 < lo || value64 > hi {
        return Err(EncodingError::FieldOutOfRange {
            field,
            value: value64,
            bits,
        });
    }
    let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
    Ok((value as u32) & mask)
}

fn decode_signed(bits_value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((bits_value << shift) as i32) >> shift
}

fn extract(raw: u32, shift: u32, width: u32) -> u32 {
    let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
    (raw >> shift) & mask
}

/// A fully-resolved instruction, one variant per addressing shape. Each
/// variant owns the fields its shape names; translation never holds a
/// half-resolved instruction of this type (that's what `LazyInstruction` is
/// for).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Instruction {
    Absolute { op: Mnemonic, reg: Register, addr: u32 },
    Relative { op: Mnemonic, offset: i32 },
    NoAddress { op: Mnemonic },
    Register1 { op: Mnemonic, reg: Register },
    Register2 { op: Mnemonic, rd: Register, rs: Register },
    Register3 { op: Mnemonic, rd: Register, rs1: Register, rs2: Register },
    DirectLoad { op: Mnemonic, reg: Register, imm: i32 },
}

impl Instruction {
    /// This instruction's mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> Mnemonic {
        match self {
            Self::Absolute { op, .. }
            | Self::Relative { op, .. }
            | Self::NoAddress { op }
            | Self::Register1 { op, .. }
            | Self::Register2 { op, .. }
            | Self::Register3 { op, .. }
            | Self::DirectLoad { op, .. } => op,
        }
    }

    /// Encode this instruction into its 32-bit big-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::FieldOutOfRange`] if an address, offset, or
    /// immediate field does not fit in its shape's bit slot.
    pub fn bits(self) -> Result<Word, EncodingError> {
        let raw = match self {
            Self::Absolute { op, reg, addr } => {
                let addr20 = encode_unsigned(addr, 20, "addr")?;
                u32::from(op.opcode().value()) | (u32::from(reg.code().value()) << 7) | (addr20 << 12)
            }
            Self::Relative { op, offset } => {
                let offset25 = encode_signed(offset, 25, "offset")?;
                u32::from(op.opcode().value()) | (offset25 << 7)
            }
            Self::NoAddress { op } => u32::from(op.opcode().value()),
            Self::Register1 { op, reg } => {
                u32::from(op.opcode().value()) | (u32::from(reg.code().value()) << 7)
            }
            Self::Register2 { op, rd, rs } => {
                u32::from(op.opcode().value())
                    | (u32::from(rd.code().value()) << 7)
                    | (u32::from(rs.code().value()) << 12)
            }
            Self::Register3 { op, rd, rs1, rs2 } => {
                u32::from(op.opcode().value())
                    | (u32::from(rd.code().value()) << 7)
                    | (u32::from(rs1.code().value()) << 12)
                    | (u32::from(rs2.code().value()) << 17)
            }
            Self::DirectLoad { op, reg, imm } => {
                let imm20 = encode_signed(imm, 20, "imm")?;
                u32::from(op.opcode().value()) | (u32::from(reg.code().value()) << 7) | (imm20 << 12)
            }
        };
        Ok(Word::from_bits(raw))
    }

    /// Decode a word into the instruction it names.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::UnknownOpcode`] if the low 7 bits do not name
    /// a real instruction.
    pub fn decode(word: Word) -> Result<Self, EncodingError> {
        let raw = word.as_u32();
        let opcode_bits = extract(raw, 0, 7) as u8;
        let opcode = u7::new(opcode_bits);
        let op = Mnemonic::from_opcode(opcode).ok_or(EncodingError::UnknownOpcode(opcode_bits))?;
        let mode = AddressingMode::of(op);

        Ok(match mode {
            AddressingMode::Absolute => Self::Absolute {
                op,
                reg: Register::from_code(arbitrary_int::u5::new(extract(raw, 7, 5) as u8)),
                addr: extract(raw, 12, 20),
            },
            AddressingMode::Relative => Self::Relative {
                op,
                offset: decode_signed(extract(raw, 7, 25), 25),
            },
            AddressingMode::NoAddress => Self::NoAddress { op },
            AddressingMode::Register1 => Self::Register1 {
                op,
                reg: Register::from_code(arbitrary_int::u5::new(extract(raw, 7, 5) as u8)),
            },
            AddressingMode::Register2 => Self::Register2 {
                op,
                rd: Register::from_code(arbitrary_int::u5::new(extract(raw, 7, 5) as u8)),
                rs: Register::from_code(arbitrary_int::u5::new(extract(raw, 12, 5) as u8)),
            },
            AddressingMode::Register3 => Self::Register3 {
                op,
                rd: Register::from_code(arbitrary_int::u5::new(extract(raw, 7, 5) as u8)),
                rs1: Register::from_code(arbitrary_int::u5::new(extract(raw, 12, 5) as u8)),
                rs2: Register::from_code(arbitrary_int::u5::new(extract(raw, 17, 5) as u8)),
            },
            AddressingMode::DirectLoad => Self::DirectLoad {
                op,
                reg: Register::from_code(arbitrary_int::u5::new(extract(raw, 7, 5) as u8)),
                imm: decode_signed(extract(raw, 12, 20), 20),
            },
        })
    }

    /// Render this instruction the way it appears in a disassembly listing.
    #[must_use]
    pub fn disassemble(self) -> String {
        match self {
            Self::Absolute { op, reg, addr } => format!("{} {}, [{addr}]", op.name(), reg),
            Self::Relative { op, offset } => format!("{} {offset:+}", op.name()),
            Self::NoAddress { op } => op.name().to_string(),
            Self::Register1 { op, reg } => format!("{} {}", op.name(), reg),
            Self::Register2 { op, rd, rs } => format!("{} {}, {}", op.name(), rd, rs),
            Self::Register3 { op, rd, rs1, rs2 } => format!("{} {}, {}, {}", op.name(), rd, rs1, rs2),
            Self::DirectLoad { op, reg, imm } => format!("{} {}, {imm}", op.name(), reg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_round_trips() {
        let i = Instruction::Absolute {
            op: Mnemonic::Lw,
            reg: Register::T1,
            addr: 0x1234,
        };
        let w = i.bits().unwrap();
        assert_eq!(Instruction::decode(w).unwrap(), i);
    }

    #[test]
    fn relative_round_trips_negative_offset() {
        let i = Instruction::Relative {
            op: Mnemonic::Jo,
            offset: -5,
        };
        let w = i.bits().unwrap();
        assert_eq!(Instruction::decode(w).unwrap(), i);
    }

    #[test]
    fn direct_load_round_trips_negative_immediate() {
        let i = Instruction::DirectLoad {
            op: Mnemonic::Addi,
            reg: Register::T2,
            imm: -100,
        };
        let w = i.bits().unwrap();
        assert_eq!(Instruction::decode(w).unwrap(), i);
    }

    #[test]
    fn register3_round_trips() {
        let i = Instruction::Register3 {
            op: Mnemonic::Add,
            rd: Register::T1,
            rs1: Register::T2,
            rs2: Register::T3,
        };
        let w = i.bits().unwrap();
        assert_eq!(Instruction::decode(w).unwrap(), i);
    }

    #[test]
    fn oversized_address_is_rejected() {
        let i = Instruction::Absolute {
            op: Mnemonic::Lw,
            reg: Register::T1,
            addr: 1 << 21,
        };
        assert!(matches!(i.bits(), Err(EncodingError::FieldOutOfRange { .. })));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let w = Word::from_bits(0b111_1111);
        assert!(matches!(Instruction::decode(w), Err(EncodingError::UnknownOpcode(_))));
    }
}
