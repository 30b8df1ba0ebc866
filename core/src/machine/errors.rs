//! Error types raised while loading or stepping the simulated machine.

use thiserror::Error;

/// A memory access fell outside the machine's address space, or the image
/// supplied at construction did not fit.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MachineMemoryError {
    /// The image supplied at construction did not fit in the configured size.
    #[error("image is too large for memory (max {max}, got {got})")]
    ImageTooLarge {
        /// Configured memory size, in bytes.
        max: usize,
        /// Size of the supplied image, in bytes.
        got: usize,
    },
    /// A word read or write touched bytes outside memory, or straddled its
    /// end.
    #[error("unable to access 4 bytes at address {addr:#x} (memory size {size})")]
    OutOfRange {
        /// Byte address the access started at.
        addr: u32,
        /// Configured memory size, in bytes.
        size: usize,
    },
}

/// How a simulation run ended. Reaching either of these is expected
/// behaviour, not a fault, so [`crate::machine::drive`] returns it rather
/// than raising it as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `HALT` executed.
    Halted,
    /// The configured tick ceiling was reached before `HALT`.
    TickLimit,
}
