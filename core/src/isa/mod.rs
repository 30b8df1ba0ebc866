//! ISA definitions: register codes, opcode bit patterns, and addressing
//! modes shared by the translator's encoder and the simulator's decoder.

mod encoding;
mod opcode;
pub mod registers;

pub use encoding::{EncodingError, Instruction};
pub use opcode::Mnemonic;
pub use registers::Register;

/// The top-3-bit prefix of an opcode, selecting the instruction's operand
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// `opcode . reg5 . addr20` — LW, SW, JAL.
    Absolute,
    /// `opcode . offset25` — JO, JZ, JNZ.
    Relative,
    /// `opcode . zero25` — RETI, HALT.
    NoAddress,
    /// `opcode . reg5 . zero20` — JR, SETEQ..SETSL.
    Register1,
    /// `opcode . rd5 . rs5 . zero15` — LWR, SWR, MV, NEG, NOT, CMP.
    Register2,
    /// `opcode . rd5 . rs1_5 . rs2_5 . zero10` — ADD..SHR.
    Register3,
    /// `opcode . reg5 . imm20` (signed) — LUI, LLI, ADDI.
    DirectLoad,
}

impl AddressingMode {
    /// Classify the addressing mode from the top 3 bits of a 7-bit opcode.
    #[must_use]
    pub fn from_opcode_bits(top3: u8) -> Option<Self> {
        match top3 & 0b111 {
            0b000 => Some(Self::Absolute),
            0b001 => Some(Self::Relative),
            0b011 => Some(Self::NoAddress),
            0b100 => Some(Self::Register1),
            0b101 => Some(Self::Register2),
            0b110 => Some(Self::Register3),
            0b111 => Some(Self::DirectLoad),
            _ => None,
        }
    }

    /// The addressing mode that a mnemonic's fixed opcode selects.
    #[must_use]
    pub fn of(mnemonic: Mnemonic) -> Self {
        let top3 = mnemonic.opcode().value() >> 4;
        Self::from_opcode_bits(top3).expect("every table opcode has a valid top-3-bit prefix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lw_is_absolute() {
        assert_eq!(AddressingMode::of(Mnemonic::Lw), AddressingMode::Absolute);
    }

    #[test]
    fn addi_is_direct_load() {
        assert_eq!(AddressingMode::of(Mnemonic::Addi), AddressingMode::DirectLoad);
    }

    #[test]
    fn add_is_register3() {
        assert_eq!(AddressingMode::of(Mnemonic::Add), AddressingMode::Register3);
    }
}
