//! The simulator's YAML configuration: memory size, tick ceiling, the input
//! token timeline, and the journal's register-formatting directives.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// A malformed configuration file, or a `journal_fmt`/token entry that does
/// not parse.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document itself did not parse.
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A `journal_fmt` entry was not `NAME:fmt:bitsize`.
    #[error("malformed journal_fmt entry `{0}`")]
    MalformedJournalField(String),
    /// A `journal_fmt` entry named a format other than `bin`/`dec`/`hex`.
    #[error("unknown journal format `{0}` (expected bin, dec, or hex)")]
    UnknownJournalFormat(String),
    /// A `memio.tokens` entry's character was not exactly one character.
    #[error("token `{0}` at tick {1} is not a single character")]
    MalformedToken(String, u64),
}

/// How a `journal_fmt` entry renders a register's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalNumberFormat {
    /// Binary, zero-padded to `bits`.
    Bin,
    /// Plain decimal.
    Dec,
    /// Upper-case hexadecimal, zero-padded.
    Hex,
}

/// One parsed `NAME:fmt:bitsize` entry from `journal_fmt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalField {
    /// The register (or pseudo-register, e.g. `PC`) this entry formats.
    pub name: String,
    /// How to render its value.
    pub format: JournalNumberFormat,
    /// Field width, in bits, used for zero-padding `Bin`/`Hex`.
    pub bits: u32,
}

fn parse_journal_fmt(raw: &str) -> Result<Vec<JournalField>, ConfigError> {
    raw.split_whitespace()
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (Some(name), Some(fmt), Some(bits)) = (parts.next(), parts.next(), parts.next()) else {
                return Err(ConfigError::MalformedJournalField(entry.to_string()));
            };
            let format = match fmt {
                "bin" => JournalNumberFormat::Bin,
                "dec" => JournalNumberFormat::Dec,
                "hex" => JournalNumberFormat::Hex,
                other => return Err(ConfigError::UnknownJournalFormat(other.to_string())),
            };
            let bits: u32 = bits
                .parse()
                .map_err(|_| ConfigError::MalformedJournalField(entry.to_string()))?;
            Ok(JournalField { name: name.to_string(), format, bits })
        })
        .collect()
}

/// `memio.output_fmt`: how `output.txt` renders the bytes written to
/// `OUTPUT_ADDR`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A Python-style decimal list, e.g. `[3, 36]`.
    #[default]
    Num,
    /// Concatenated characters, each value taken as a byte.
    Str,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMachineConfig {
    memory_size: usize,
    ticks_limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawMemIoConfig {
    #[serde(default)]
    tokens: Vec<(u64, String)>,
    #[serde(default)]
    output_fmt: OutputFormat,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    machine: RawMachineConfig,
    #[serde(default)]
    memio: RawMemIoConfig,
    #[serde(default)]
    journal_fmt: String,
}

/// A fully parsed, validated simulator configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Total memory size, in bytes.
    pub memory_size: usize,
    /// The hard tick ceiling.
    pub ticks_limit: u64,
    /// Tick-indexed input characters, keyed by the tick they arrive on.
    pub tokens: HashMap<u64, char>,
    /// How to render the output stream.
    pub output_fmt: OutputFormat,
    /// Parsed register-formatting directives for `execution.txt`.
    pub journal_fmt: Vec<JournalField>,
}

impl SimConfig {
    /// Parse and validate a YAML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document does not parse, a token's
    /// character is not exactly one character, or a `journal_fmt` entry is
    /// malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;

        let mut tokens = HashMap::with_capacity(raw.memio.tokens.len());
        for (tick, text) in raw.memio.tokens {
            let mut chars = text.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(ConfigError::MalformedToken(text, tick));
            };
            tokens.insert(tick, c);
        }

        Ok(Self {
            memory_size: raw.machine.memory_size,
            ticks_limit: raw.machine.ticks_limit,
            tokens,
            output_fmt: raw.memio.output_fmt,
            journal_fmt: parse_journal_fmt(&raw.journal_fmt)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_document() {
        let cfg = SimConfig::from_yaml(
            "machine:\n  memory_size: 4096\n  ticks_limit: 10000\n\
             memio:\n  tokens:\n    - [0, \"a\"]\n    - [3, \"b\"]\n  output_fmt: str\n\
             journal_fmt: \"PC:hex:32 N:bin:1\"\n",
        )
        .unwrap();

        assert_eq!(cfg.memory_size, 4096);
        assert_eq!(cfg.ticks_limit, 10000);
        assert_eq!(cfg.tokens.get(&0), Some(&'a'));
        assert_eq!(cfg.tokens.get(&3), Some(&'b'));
        assert_eq!(cfg.output_fmt, OutputFormat::Str);
        assert_eq!(
            cfg.journal_fmt,
            vec![
                JournalField { name: "PC".into(), format: JournalNumberFormat::Hex, bits: 32 },
                JournalField { name: "N".into(), format: JournalNumberFormat::Bin, bits: 1 },
            ]
        );
    }

    #[test]
    fn defaults_output_fmt_to_num_and_allows_empty_tokens() {
        let cfg = SimConfig::from_yaml("machine:\n  memory_size: 256\n  ticks_limit: 100\n").unwrap();
        assert!(cfg.tokens.is_empty());
        assert_eq!(cfg.output_fmt, OutputFormat::Num);
        assert!(cfg.journal_fmt.is_empty());
    }

    #[test]
    fn rejects_a_multi_character_token() {
        let err = SimConfig::from_yaml(
            "machine:\n  memory_size: 256\n  ticks_limit: 100\n\
             memio:\n  tokens:\n    - [0, \"ab\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedToken(_, 0)));
    }
}
