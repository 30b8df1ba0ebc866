//! Renders the three run artifacts (`memory.txt`, `execution.txt`,
//! `output.txt`) and emits tick-level `tracing` events as the simulator runs.

use tracing::trace;

use crate::isa::registers;
use crate::word::Word;

use super::config::{JournalField, JournalNumberFormat, OutputFormat};
use super::control_unit::ControlUnit;
use super::memory::MemoryUnit;

/// Render every word in `memory` as `<addr_hex>: <word_hex> - <word_bin>`,
/// one line per word, in ascending address order.
#[must_use]
pub fn render_memory_dump(memory: &MemoryUnit) -> String {
    let mut out = String::new();
    for (addr, word) in memory.words() {
        out.push_str(&format!("{addr:08X}: {word:08X} - {word:032b}\n"));
    }
    out
}

fn resolve_field(cu: &ControlUnit, name: &str) -> i64 {
    match name {
        "PC" => i64::from(cu.instruction_addr()),
        "N" => i64::from(cu.alu.flags.n),
        "Z" => i64::from(cu.alu.flags.z),
        "V" => i64::from(cu.alu.flags.v),
        "C" => i64::from(cu.alu.flags.c),
        _ => registers::ALL
            .iter()
            .find(|r| r.mnemonic() == name)
            .map_or(0, |r| i64::from(cu.registers.read(*r).as_i32())),
    }
}

#[allow(clippy::cast_sign_loss)]
fn render_field(cu: &ControlUnit, field: &JournalField) -> String {
    let value = resolve_field(cu, &field.name);
    match field.format {
        JournalNumberFormat::Dec => value.to_string(),
        JournalNumberFormat::Hex | JournalNumberFormat::Bin => {
            let bits = field.bits.min(64);
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            let masked = (value as u64) & mask;
            if field.format == JournalNumberFormat::Hex {
                format!("{masked:0width$X}", width = ((field.bits + 3) / 4) as usize)
            } else {
                format!("{masked:0width$b}", width = field.bits as usize)
            }
        }
    }
}

/// Accumulates one `execution.txt` line per tick a write-back commits.
#[derive(Debug, Default)]
pub struct ExecutionJournal {
    lines: Vec<String>,
}

impl ExecutionJournal {
    /// An empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of `cu` just after it committed `instruction`,
    /// formatted per `fields`.
    pub fn record(&mut self, cu: &ControlUnit, instruction: crate::isa::Instruction, fields: &[JournalField]) {
        let registers = fields.iter().map(|f| render_field(cu, f)).collect::<Vec<_>>().join(" ");
        let line = if registers.is_empty() {
            instruction.disassemble()
        } else {
            format!("{registers} {}", instruction.disassemble())
        };
        trace!(pc = cu.instruction_addr(), %line, "committed instruction");
        self.lines.push(line);
    }

    /// Render the accumulated journal as `execution.txt`'s contents.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Render the sequence of words written to `OUTPUT_ADDR` per `fmt`.
#[must_use]
pub fn render_output(writes: &[Word], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Num => {
            let values: Vec<String> = writes.iter().map(|w| w.as_i32().to_string()).collect();
            format!("[{}]", values.join(", "))
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        OutputFormat::Str => writes.iter().map(|w| (w.as_i32() as u8) as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::config::{JournalField, JournalNumberFormat};
    use crate::machine::control_unit::ControlUnit;
    use crate::isa::Instruction;
    use crate::isa::Mnemonic;
    use crate::isa::registers::Register;

    #[test]
    fn memory_dump_renders_hex_and_binary() {
        let mem = MemoryUnit::new(&[0, 0, 0, 5], 4).unwrap();
        let dump = render_memory_dump(&mem);
        assert_eq!(dump, "00000000: 00000005 - 00000000000000000000000000000101\n");
    }

    #[test]
    fn output_num_format_matches_python_style_list() {
        let writes = vec![Word::from_integer(3), Word::from_integer(36)];
        assert_eq!(render_output(&writes, OutputFormat::Num), "[3, 36]");
    }

    #[test]
    fn output_str_format_concatenates_characters() {
        let writes = vec![Word::from_char(b'h'), Word::from_char(b'i')];
        assert_eq!(render_output(&writes, OutputFormat::Str), "hi");
    }

    #[test]
    fn journal_records_one_line_with_requested_fields() {
        let mut cu = ControlUnit::new(0);
        cu.registers.write(Register::T1, Word::from_integer(7));
        let fields = vec![JournalField { name: "T1".into(), format: JournalNumberFormat::Dec, bits: 32 }];
        let mut journal = ExecutionJournal::new();
        journal.record(&cu, Instruction::NoAddress { op: Mnemonic::Halt }, &fields);
        assert_eq!(journal.render(), "7 HALT\n");
    }
}
