//! Loads a translated image into memory and drives the control unit tick by
//! tick until `HALT` or the configured tick ceiling.

pub mod config;
pub mod control_unit;
pub mod datapath;
mod errors;
pub mod logging;
mod memory;

pub use config::{ConfigError, JournalField, JournalNumberFormat, OutputFormat, SimConfig};
pub use control_unit::{ControlUnit, StepError, StepEvent};
pub use datapath::{Alu, AluOp, AluOutcome, Flags, RegisterFile};
pub use errors::{MachineMemoryError, StopReason};
pub use logging::ExecutionJournal;
pub use memory::MemoryUnit;

use thiserror::Error;

use crate::translate::{INPUT_ADDR, PROGRAM_START_ADDR};
use crate::word::Word;

use control_unit::VECTOR_INPUT_DATA;

/// Any error [`drive`] can raise, as distinct from the ordinary ways a run
/// can end (see [`StopReason`]).
#[derive(Debug, Error)]
pub enum DriveError {
    /// Loading the image into memory failed.
    #[error(transparent)]
    Memory(#[from] MachineMemoryError),
    /// Stepping the control unit failed.
    #[error(transparent)]
    Step(#[from] StepError),
}

/// Everything a completed run produced, ready for the three log renderers in
/// [`logging`].
#[derive(Debug)]
pub struct RunReport {
    /// How the run ended.
    pub stop: StopReason,
    /// The final memory state, for `memory.txt`.
    pub memory: MemoryUnit,
    /// One line per committed instruction, for `execution.txt`.
    pub journal: ExecutionJournal,
    /// Every word written to `OUTPUT_ADDR`, in the order it was written, for
    /// `output.txt`.
    pub output_writes: Vec<Word>,
}

/// Load `image` into a memory of `config.memory_size` bytes and run the
/// control unit from [`PROGRAM_START_ADDR`] until `HALT` or
/// `config.ticks_limit` ticks elapse, whichever comes first.
///
/// Input characters in `config.tokens` are written to `INPUT_ADDR` and the
/// `INPUT_DATA` interrupt is raised on the tick they're keyed to, before that
/// tick's stage runs — so a token due on the tick a fetch is pending is
/// visible to that very fetch.
///
/// # Errors
///
/// Returns [`DriveError`] if `image` does not fit in the configured memory,
/// or if a fetch, load, or store goes out of range, or a fetched word fails
/// to decode.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn drive(image: &[u8], config: &SimConfig) -> Result<RunReport, DriveError> {
    let mut memory = MemoryUnit::new(image, config.memory_size)?;
    let mut cu = ControlUnit::new(PROGRAM_START_ADDR);
    let mut journal = ExecutionJournal::new();
    let mut output_writes = Vec::new();

    let mut tick = 0u64;
    let stop = loop {
        if tick >= config.ticks_limit {
            break StopReason::TickLimit;
        }
        if let Some(ch) = config.tokens.get(&tick) {
            memory.write(INPUT_ADDR, Word::from_char(*ch as u8))?;
            cu.interrupts.raise(VECTOR_INPUT_DATA);
        }

        match cu.tick(&mut memory)? {
            StepEvent::Ticked | StepEvent::InterruptAccepted { .. } => {}
            StepEvent::Committed { halted, output_write } => {
                if let Some(instr) = cu.current_instruction() {
                    journal.record(&cu, instr, &config.journal_fmt);
                }
                output_writes.extend(output_write);
                if halted {
                    tick += 1;
                    break StopReason::Halted;
                }
            }
        }
        tick += 1;
    };

    Ok(RunReport { stop, memory, journal, output_writes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::registers::Register;
    use crate::isa::{Instruction, Mnemonic};

    fn assemble(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(|i| i.bits().unwrap().to_be_bytes()).collect()
    }

    fn config(memory_size: usize, ticks_limit: u64) -> SimConfig {
        SimConfig {
            memory_size,
            ticks_limit,
            tokens: std::collections::HashMap::new(),
            output_fmt: OutputFormat::Num,
            journal_fmt: Vec::new(),
        }
    }

    #[test]
    fn halts_cleanly_on_a_bare_halt_program() {
        let mut image = vec![0u8; PROGRAM_START_ADDR as usize];
        image.extend(assemble(&[Instruction::NoAddress { op: Mnemonic::Halt }]));
        let report = drive(&image, &config(image.len() + 16, 1000)).unwrap();
        assert_eq!(report.stop, StopReason::Halted);
    }

    #[test]
    fn print_one_plus_two_writes_three_to_output() {
        let mut image = vec![0u8; PROGRAM_START_ADDR as usize];
        image.extend(assemble(&[
            Instruction::DirectLoad { op: Mnemonic::Lli, reg: Register::T1, imm: 3 },
            Instruction::DirectLoad { op: Mnemonic::Lui, reg: Register::T1, imm: 0 },
            Instruction::Absolute { op: Mnemonic::Sw, reg: Register::T1, addr: crate::translate::OUTPUT_ADDR },
            Instruction::NoAddress { op: Mnemonic::Halt },
        ]));
        let report = drive(&image, &config(image.len() + 16, 1000)).unwrap();
        assert_eq!(report.stop, StopReason::Halted);
        assert_eq!(report.output_writes, vec![Word::from_integer(3)]);
    }

    #[test]
    fn tick_limit_stops_an_infinite_loop() {
        let mut image = vec![0u8; PROGRAM_START_ADDR as usize];
        // offset -4 lands back on this same instruction: PC is already past
        // it by the time the offset is added, so a true self-loop needs to
        // subtract that increment back off.
        image.extend(assemble(&[Instruction::Relative { op: Mnemonic::Jo, offset: -4 }]));
        let report = drive(&image, &config(image.len() + 16, 40)).unwrap();
        assert_eq!(report.stop, StopReason::TickLimit);
    }

    #[test]
    fn division_by_zero_raises_the_handler_and_keeps_running() {
        let mut image = vec![0u8; PROGRAM_START_ADDR as usize];
        // Vector 0 (ZERO_DIVISION) points at an empty RETI handler placed
        // just past the 16-entry vector table.
        let handler_addr: u32 = 0x40;
        image[0..4].copy_from_slice(&Word::from_bits(handler_addr).to_be_bytes());
        image[handler_addr as usize..handler_addr as usize + 4]
            .copy_from_slice(&Instruction::NoAddress { op: Mnemonic::Reti }.bits().unwrap().to_be_bytes());
        image.extend(assemble(&[
            Instruction::Register3 {
                op: Mnemonic::Div,
                rd: Register::T1,
                rs1: Register::T2,
                rs2: Register::T3,
            },
            Instruction::NoAddress { op: Mnemonic::Halt },
        ]));
        let report = drive(&image, &config(image.len() + 16, 1000)).unwrap();
        assert_eq!(report.stop, StopReason::Halted);
    }
}
