//! The 32 named registers and their 5-bit codes.

use arbitrary_int::u5;
use std::fmt;

/// One of the 32 architectural registers.
///
/// Declaration order fixes the register code: `SP, RA, S1..S12, I1, I2,
/// T1..T8, A1..A8`, numbered `0..=31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Register {
    Sp,
    Ra,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    S8,
    S9,
    S10,
    S11,
    S12,
    I1,
    I2,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    A8,
}

/// The full, code-ordered register table. Index `n` is the register whose
/// 5-bit code is `n`.
pub const ALL: [Register; 32] = [
    Register::Sp,
    Register::Ra,
    Register::S1,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::S8,
    Register::S9,
    Register::S10,
    Register::S11,
    Register::S12,
    Register::I1,
    Register::I2,
    Register::T1,
    Register::T2,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
    Register::T7,
    Register::T8,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
    Register::A8,
];

/// Registers reserved by the translator as load-scratch when expression
/// lowering runs out of free temporaries.
pub const LOAD_TEMP_1: Register = Register::T7;
pub const LOAD_TEMP_2: Register = Register::T8;

/// Registers reserved for interrupt-service routine bookkeeping.
pub const INTERRUPT_TEMP_1: Register = Register::I1;
pub const INTERRUPT_TEMP_2: Register = Register::I2;

/// Temporary registers available to expression lowering, in allocation order.
pub const TEMPORARIES: [Register; 6] = [
    Register::T1,
    Register::T2,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
];

/// Saved registers available to variable binding, in allocation order.
pub const SAVED: [Register; 12] = [
    Register::S1,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::S8,
    Register::S9,
    Register::S10,
    Register::S11,
    Register::S12,
];

impl Register {
    /// This register's 5-bit code.
    #[must_use]
    pub fn code(self) -> u5 {
        u5::new(ALL.iter().position(|r| *r == self).expect("exhaustive table") as u8)
    }

    /// Look up the register with the given 5-bit code.
    #[must_use]
    pub fn from_code(code: u5) -> Self {
        ALL[code.value() as usize]
    }

    /// The register's mnemonic, as it appears in disassembly.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Sp => "SP",
            Self::Ra => "RA",
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
            Self::S4 => "S4",
            Self::S5 => "S5",
            Self::S6 => "S6",
            Self::S7 => "S7",
            Self::S8 => "S8",
            Self::S9 => "S9",
            Self::S10 => "S10",
            Self::S11 => "S11",
            Self::S12 => "S12",
            Self::I1 => "I1",
            Self::I2 => "I2",
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::T3 => "T3",
            Self::T4 => "T4",
            Self::T5 => "T5",
            Self::T6 => "T6",
            Self::T7 => "T7",
            Self::T8 => "T8",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::A6 => "A6",
            Self::A7 => "A7",
            Self::A8 => "A8",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips() {
        for r in ALL {
            assert_eq!(Register::from_code(r.code()), r);
        }
    }

    #[test]
    fn sp_is_register_zero() {
        assert_eq!(Register::Sp.code().value(), 0);
    }

    #[test]
    fn a8_is_last_register() {
        assert_eq!(Register::A8.code().value(), 31);
    }
}
