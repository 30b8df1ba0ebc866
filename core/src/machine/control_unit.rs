//! The control unit: PC/JPC/IPC latches, the interrupt controller, and the
//! fetch-decode-execute-writeback micro-sequencer.
//!
//! Every opcode's real micro-sequence in the source machine costs a
//! different number of ticks (a conditional jump alone ranges from two to
//! six). This unit coarsens that down to the uniform four-stage pattern the
//! instruction set itself documents: one tick apiece for IF, ID, EX, WB.
//! The sole exception is an interrupt accepted during IF, which consumes
//! exactly one tick and aborts the remaining three stages for that
//! instruction slot, mirroring the source machine's own short-circuit.

use crate::isa::registers::Register;
use crate::isa::{EncodingError, Instruction, Mnemonic};
use crate::translate::OUTPUT_ADDR;
use crate::word::Word;

use super::datapath::{Alu, AluOp, AluOutcome, RegisterFile};
use super::errors::MachineMemoryError;
use super::memory::MemoryUnit;

/// Interrupt vector reserved for `DIV` by zero.
pub const VECTOR_ZERO_DIVISION: u8 = 0;
/// Interrupt vector reserved for a freshly delivered input character.
pub const VECTOR_INPUT_DATA: u8 = 15;

/// 16-bit IRQ latch, 1-bit IE latch, and the vector-priority policy that
/// reads them.
#[derive(Debug, Clone, Copy)]
pub struct InterruptController {
    irq: u16,
    ie: bool,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self { irq: 0, ie: true }
    }
}

impl InterruptController {
    /// A controller with no pending interrupts and `IE=1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the IRQ bit for `vector`.
    pub fn raise(&mut self, vector: u8) {
        self.irq |= 1 << vector;
    }

    /// Whether interrupts are currently enabled.
    #[must_use]
    pub fn ie(&self) -> bool {
        self.ie
    }

    /// Directly set the IE latch. `RETI` is the only instruction that does
    /// this in practice (to 1); exposed so the control unit can call it
    /// uniformly.
    pub fn set_ie(&mut self, ie: bool) {
        self.ie = ie;
    }

    /// If `IE=1` and a vector is pending, clear its bit, disable further
    /// interrupts, and return it (lowest-numbered bit wins). Otherwise
    /// `None`, leaving any pending bits latched for a later check.
    pub fn check_and_accept(&mut self) -> Option<u8> {
        if !self.ie || self.irq == 0 {
            return None;
        }
        let vector = self.irq.trailing_zeros() as u8;
        self.irq &= !(1 << vector);
        self.ie = false;
        Some(vector)
    }
}

/// The four pipeline stages a single instruction's ticks step through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetch,
    Decode,
    Execute,
    WriteBack,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Fetch
    }
}

/// What the write-back stage commits to architectural state.
#[derive(Debug, Clone, Copy)]
enum Commit {
    /// `CMP` and a not-taken conditional jump commit nothing.
    None,
    Register { reg: Register, value: Word },
    Memory { addr: u32, value: Word },
    Jump { target: u32 },
    JumpAndLink { reg: Register, value: Word, target: u32 },
    Reti,
    Halt,
}

/// What happened on one [`ControlUnit::tick`] call, for the drive loop and
/// the execution log to react to.
#[derive(Debug, Clone, Copy)]
pub enum StepEvent {
    /// A mid-instruction tick (IF without interrupt, ID, or EX); nothing
    /// observable committed yet.
    Ticked,
    /// An interrupt was accepted during IF; the instruction slot was
    /// aborted and control transferred to its vector.
    InterruptAccepted {
        /// The vector index that was serviced.
        vector: u8,
    },
    /// The write-back stage committed an instruction's result. `HALT`
    /// reports `halted = true`; a `Sw`/`Swr` that targeted `OUTPUT_ADDR`
    /// reports the written word, since [`MemoryUnit`] has no special
    /// knowledge of that address itself.
    Committed {
        /// Set when the committing instruction was `HALT`.
        halted: bool,
        /// Set when the committing instruction wrote to `OUTPUT_ADDR`.
        output_write: Option<Word>,
    },
}

/// PC/IPC/JPC latches, the interrupt controller, the register file, the
/// ALU, and the current in-flight instruction.
#[derive(Debug, Clone)]
pub struct ControlUnit {
    pc: u32,
    ipc: u32,
    stage: Stage,
    raw_word: Option<Word>,
    fetched_addr: u32,
    decoded: Option<Instruction>,
    commit: Commit,
    /// The architectural register file.
    pub registers: RegisterFile,
    /// The ALU and its four condition-flag latches.
    pub alu: Alu,
    /// The interrupt controller.
    pub interrupts: InterruptController,
}

impl ControlUnit {
    /// A control unit with PC at `reset_pc`, an empty register file, clear
    /// flags, and interrupts enabled with nothing pending.
    #[must_use]
    pub fn new(reset_pc: u32) -> Self {
        Self {
            pc: reset_pc,
            ipc: 0,
            stage: Stage::Fetch,
            raw_word: None,
            fetched_addr: 0,
            decoded: None,
            commit: Commit::None,
            registers: RegisterFile::new(),
            alu: Alu::new(),
            interrupts: InterruptController::new(),
        }
    }

    /// The program counter.
    #[must_use]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// The instruction currently decoded (or mid-execution), if any has been
    /// fetched since the last reset.
    #[must_use]
    pub fn current_instruction(&self) -> Option<Instruction> {
        self.decoded
    }

    /// The address the in-flight instruction was fetched from. Distinct from
    /// [`Self::pc`], which by write-back time already points past it (or at
    /// whatever it jumped to).
    #[must_use]
    pub fn instruction_addr(&self) -> u32 {
        self.fetched_addr
    }

    /// Advance by exactly one tick, running whichever stage is next.
    ///
    /// # Errors
    ///
    /// Returns [`MachineMemoryError`] if a fetch, load, or store touches an
    /// out-of-range address, or [`EncodingError`] if a fetched word does not
    /// decode to a known instruction.
    pub fn tick(&mut self, memory: &mut MemoryUnit) -> Result<StepEvent, StepError> {
        match self.stage {
            Stage::Fetch => self.stage_fetch(memory),
            Stage::Decode => self.stage_decode(),
            Stage::Execute => self.stage_execute(memory),
            Stage::WriteBack => self.stage_write_back(memory),
        }
    }

    fn stage_fetch(&mut self, memory: &mut MemoryUnit) -> Result<StepEvent, StepError> {
        if let Some(vector) = self.interrupts.check_and_accept() {
            // Latch the return address only now, at the instant the
            // interrupt preempts this fetch — not on every ordinary fetch,
            // or the handler's own first instruction would clobber it
            // before RETI ever reads it back.
            self.ipc = self.pc;
            let target = memory.read(u32::from(vector) * 4)?;
            self.pc = target.as_u32();
            return Ok(StepEvent::InterruptAccepted { vector });
        }
        let word = memory.read(self.pc)?;
        self.fetched_addr = self.pc;
        self.raw_word = Some(word);
        self.pc = self.pc.wrapping_add(4);
        self.stage = Stage::Decode;
        Ok(StepEvent::Ticked)
    }

    fn stage_decode(&mut self) -> Result<StepEvent, StepError> {
        let word = self.raw_word.take().expect("fetch always latches raw_word before decode");
        self.decoded = Some(Instruction::decode(word)?);
        self.stage = Stage::Execute;
        Ok(StepEvent::Ticked)
    }

    fn stage_execute(&mut self, memory: &MemoryUnit) -> Result<StepEvent, StepError> {
        let instr = self.decoded.expect("decode always latches an instruction before execute");
        self.commit = self.execute(instr, memory)?;
        self.stage = Stage::WriteBack;
        Ok(StepEvent::Ticked)
    }

    fn stage_write_back(&mut self, memory: &mut MemoryUnit) -> Result<StepEvent, StepError> {
        self.stage = Stage::Fetch;
        let mut halted = false;
        let mut output_write = None;
        match self.commit {
            Commit::None => {}
            Commit::Register { reg, value } => self.registers.write(reg, value),
            Commit::Memory { addr, value } => {
                memory.write(addr, value)?;
                if addr == OUTPUT_ADDR {
                    output_write = Some(value);
                }
            }
            Commit::Jump { target } => self.pc = target,
            Commit::JumpAndLink { reg, value, target } => {
                self.registers.write(reg, value);
                self.pc = target;
            }
            Commit::Reti => {
                self.pc = self.ipc;
                self.interrupts.set_ie(true);
            }
            Commit::Halt => halted = true,
        }
        Ok(StepEvent::Committed { halted, output_write })
    }

    /// The decoder's 12-input flag-combination mux, indices 6..11, as a pure
    /// function of the retained condition flags. Indices below 6 select raw
    /// field data rather than a flag combination and never reach here.
    fn cond_result(mux_index: u8, flags: super::datapath::Flags) -> bool {
        match mux_index {
            6 => flags.z,
            7 => !flags.z,
            8 => flags.n == flags.v,
            9 => flags.n != flags.v || flags.z,
            10 => !flags.z && flags.n == flags.v,
            11 => flags.n != flags.v,
            _ => unreachable!("conditional SET only ever selects indices 6..11"),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, instr: Instruction, memory: &MemoryUnit) -> Result<Commit, StepError> {
        Ok(match instr {
            Instruction::Absolute { op: Mnemonic::Lw, reg, addr } => {
                Commit::Register { reg, value: memory.read(addr)? }
            }
            Instruction::Absolute { op: Mnemonic::Sw, reg, addr } => {
                Commit::Memory { addr, value: self.registers.read(reg) }
            }
            Instruction::Absolute { op: Mnemonic::Jal, reg, addr } => Commit::JumpAndLink {
                reg,
                value: Word::from_bits(self.pc),
                target: addr,
            },
            Instruction::Absolute { .. } => unreachable!("no other mnemonic uses Absolute"),

            Instruction::Relative { op, offset } => self.execute_relative(op, offset),

            Instruction::NoAddress { op: Mnemonic::Reti } => Commit::Reti,
            Instruction::NoAddress { op: Mnemonic::Halt } => Commit::Halt,
            Instruction::NoAddress { .. } => unreachable!("no other mnemonic uses NoAddress"),

            Instruction::Register1 { op: Mnemonic::Jr, reg } => {
                Commit::Jump { target: self.registers.read(reg).as_u32() }
            }
            Instruction::Register1 { op, reg } => {
                let mux_index = conditional_set_mux_index(op);
                let bit = i32::from(Self::cond_result(mux_index, self.alu.flags));
                let AluOutcome::Value(value) = self.alu.execute(AluOp::FetchBSetZ, 0, bit) else {
                    unreachable!("FETCH_B_SET_Z never reports divide-by-zero")
                };
                Commit::Register { reg, value }
            }

            Instruction::Register2 { op: Mnemonic::Cmp, rd, rs } => {
                let a = self.registers.read(rd).as_i32();
                let b = self.registers.read(rs).as_i32();
                self.alu.execute(AluOp::Sub, a, b);
                Commit::None
            }
            Instruction::Register2 { op: Mnemonic::Mv, rd, rs } => {
                let value = self.registers.read(rs);
                Commit::Register { reg: rd, value }
            }
            Instruction::Register2 { op: Mnemonic::Neg, rd, rs } => {
                self.unary_arith(AluOp::Neg, rd, rs)
            }
            Instruction::Register2 { op: Mnemonic::Not, rd, rs } => {
                self.unary_arith(AluOp::Not, rd, rs)
            }
            Instruction::Register2 { op: Mnemonic::Lwr, rd, rs } => {
                let addr = self.registers.read(rs).as_u32();
                Commit::Register { reg: rd, value: memory.read(addr)? }
            }
            Instruction::Register2 { op: Mnemonic::Swr, rd, rs } => {
                let addr = self.registers.read(rs).as_u32();
                Commit::Memory { addr, value: self.registers.read(rd) }
            }
            Instruction::Register2 { .. } => unreachable!("no other mnemonic uses Register2"),

            Instruction::Register3 { op, rd, rs1, rs2 } => {
                let a = self.registers.read(rs1).as_i32();
                let b = self.registers.read(rs2).as_i32();
                let alu_op = binary_alu_op(op);
                match self.alu.execute(alu_op, a, b) {
                    AluOutcome::Value(value) => Commit::Register { reg: rd, value },
                    AluOutcome::DivideByZero => {
                        self.interrupts.raise(VECTOR_ZERO_DIVISION);
                        Commit::None
                    }
                }
            }

            Instruction::DirectLoad { op: Mnemonic::Lli, reg, imm } => {
                let AluOutcome::Value(value) = self.alu.execute(AluOp::FetchBLower, 0, imm) else {
                    unreachable!("FETCH_B_LOWER never reports divide-by-zero")
                };
                Commit::Register { reg, value }
            }
            Instruction::DirectLoad { op: Mnemonic::Lui, reg, imm } => {
                let AluOutcome::Value(shifted) = self.alu.execute(AluOp::FetchBShift16, 0, imm) else {
                    unreachable!("FETCH_B_SHIFT_16 never reports divide-by-zero")
                };
                let old = self.registers.read(reg).as_i32();
                let AluOutcome::Value(value) = self.alu.execute(AluOp::Add, old, shifted.as_i32()) else {
                    unreachable!("plain ADD never reports divide-by-zero")
                };
                Commit::Register { reg, value }
            }
            Instruction::DirectLoad { op: Mnemonic::Addi, reg, imm } => {
                let old = self.registers.read(reg).as_i32();
                let AluOutcome::Value(value) = self.alu.execute(AluOp::Add, old, imm) else {
                    unreachable!("plain ADD never reports divide-by-zero")
                };
                Commit::Register { reg, value }
            }
            Instruction::DirectLoad { .. } => unreachable!("no other mnemonic uses DirectLoad"),
        })
    }

    fn unary_arith(&mut self, op: AluOp, rd: Register, rs: Register) -> Commit {
        let a = self.registers.read(rs).as_i32();
        let AluOutcome::Value(value) = self.alu.execute(op, a, 0) else {
            unreachable!("NEG/NOT never report divide-by-zero")
        };
        Commit::Register { reg: rd, value }
    }

    fn execute_relative(&mut self, op: Mnemonic, offset: i32) -> Commit {
        let taken = match op {
            Mnemonic::Jo => true,
            Mnemonic::Jz => self.alu.flags.z,
            Mnemonic::Jnz => !self.alu.flags.z,
            _ => unreachable!("no other mnemonic uses Relative"),
        };
        if taken {
            let target = (i64::from(self.pc) + i64::from(offset)) as u32;
            Commit::Jump { target }
        } else {
            Commit::None
        }
    }
}

/// Maps a conditional-`SET` mnemonic to the decoder output-mux index that
/// exposes its condition.
fn conditional_set_mux_index(op: Mnemonic) -> u8 {
    match op {
        Mnemonic::Seteq => 6,
        Mnemonic::Setne => 7,
        Mnemonic::Setge => 8,
        Mnemonic::Setle => 9,
        Mnemonic::Setsg => 10,
        Mnemonic::Setsl => 11,
        _ => unreachable!("conditional_set_mux_index is only called for SET* mnemonics"),
    }
}

/// Maps a `Register3`-shaped mnemonic to its ALU operation.
fn binary_alu_op(op: Mnemonic) -> AluOp {
    match op {
        Mnemonic::Add => AluOp::Add,
        Mnemonic::Sub => AluOp::Sub,
        Mnemonic::Mul => AluOp::Mul,
        Mnemonic::Div => AluOp::Div,
        Mnemonic::Rem => AluOp::Rem,
        Mnemonic::And => AluOp::And,
        Mnemonic::Or => AluOp::Or,
        Mnemonic::Xor => AluOp::Xor,
        Mnemonic::Shl => AluOp::Shl,
        Mnemonic::Shr => AluOp::Shr,
        _ => unreachable!("binary_alu_op is only called for Register3-shaped mnemonics"),
    }
}

/// An error surfaced while stepping the control unit.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// A fetch, load, or store touched an out-of-range address.
    #[error(transparent)]
    Memory(#[from] MachineMemoryError),
    /// A fetched word did not decode to a known instruction.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
