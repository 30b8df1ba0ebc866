//! Command-line frontend: `compile` lowers source to a memory image,
//! `run` drives that image through the simulator.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nanoarch_core::machine::{self, SimConfig};
use nanoarch_core::{lexer, parser, translate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nanoarch", about = "Translator and simulator for the nanoarch toy architecture")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a source file into a memory image.
    Compile {
        /// Path to the source program.
        source: PathBuf,
        /// Path the raw memory image is written to. A sibling disassembly
        /// listing is written alongside it at `<output>.txt`.
        output: PathBuf,
    },
    /// Run a memory image under the simulator.
    Run {
        /// Path to a memory image produced by `compile`.
        memory: PathBuf,
        /// Path to the YAML simulator configuration.
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Compile { source, output } => compile(&source, &output),
        Command::Run { memory, config } => run(&memory, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn compile(source: &Path, output: &Path) -> Result<()> {
    let text = fs::read_to_string(source).with_context(|| format!("reading {}", source.display()))?;
    let tokens = lexer::lex(&text).context("lexing source")?;
    let program = parser::parse(&tokens).context("parsing source")?;
    let image = translate::translate(&program).context("translating program")?;

    fs::write(output, image.to_bytes()).with_context(|| format!("writing {}", output.display()))?;

    let disasm_path = output.with_extension("txt");
    fs::write(&disasm_path, image.disassembly())
        .with_context(|| format!("writing {}", disasm_path.display()))?;

    Ok(())
}

fn run(memory_path: &Path, config_path: &Path) -> Result<()> {
    let image = fs::read(memory_path).with_context(|| format!("reading {}", memory_path.display()))?;
    let config_text =
        fs::read_to_string(config_path).with_context(|| format!("reading {}", config_path.display()))?;
    let config = SimConfig::from_yaml(&config_text).context("parsing simulator config")?;

    let report = machine::drive(&image, &config).context("running simulator")?;

    fs::write("memory.txt", machine::logging::render_memory_dump(&report.memory))
        .context("writing memory.txt")?;
    fs::write("execution.txt", report.journal.render()).context("writing execution.txt")?;
    fs::write("output.txt", machine::logging::render_output(&report.output_writes, config.output_fmt))
        .context("writing output.txt")?;

    match report.stop {
        machine::StopReason::Halted => Ok(()),
        machine::StopReason::TickLimit => {
            anyhow::bail!("tick limit reached ({} ticks)", config.ticks_limit)
        }
    }
}
