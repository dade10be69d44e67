// serialfmt - Freestanding Formatted Output Runtime
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod debugger;
mod harness;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serialfmt_config::{MachineManifest, StopReason, TestScript};
use serialfmt_sim::bus::SystemBus;
use serialfmt_sim::cpu::RiscV;
use serialfmt_sim::decoder::decode_rv32;
use serialfmt_sim::metrics::PerformanceMetrics;
use serialfmt_sim::{Bus, Machine, SimulationObserver};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

/// Refuse step limits that would keep CI busy for minutes.
const MAX_ALLOWED_STEPS: u64 = 50_000_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "serialfmt RV32I simulator", long_about = None)]
struct Cli {
    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an image and run it until the guest exits
    Run {
        /// Path to the firmware image (ELF or raw binary)
        #[arg(short, long)]
        firmware: PathBuf,

        /// Path to the machine manifest (YAML)
        #[arg(short, long)]
        system: Option<PathBuf>,

        /// Maximum number of steps to execute
        #[arg(long, default_value = "20000000")]
        max_steps: u64,

        /// Do not echo serial output to stdout
        #[arg(long)]
        no_serial_stdout: bool,
    },
    /// Run a YAML test script and evaluate its assertions
    Test {
        #[arg(long)]
        script: PathBuf,

        /// Directory receiving result.json
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        no_serial_stdout: bool,
    },
    /// Step through an image interactively (commands on stdin)
    Debug {
        #[arg(short, long)]
        firmware: PathBuf,

        #[arg(short, long)]
        system: Option<PathBuf>,
    },
    /// Disassemble instructions from the entry point
    Disasm {
        #[arg(short, long)]
        firmware: PathBuf,

        /// Number of instructions
        #[arg(short = 'n', long, default_value = "16")]
        count: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // stdout carries the guest's serial output
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Run {
            firmware,
            system,
            max_steps,
            no_serial_stdout,
        } => cmd_run(&firmware, system.as_deref(), max_steps, !no_serial_stdout),
        Command::Test {
            script,
            output_dir,
            no_serial_stdout,
        } => cmd_test(&script, output_dir.as_deref(), !no_serial_stdout),
        Command::Debug { firmware, system } => cmd_debug(&firmware, system.as_deref()),
        Command::Disasm { firmware, count } => cmd_disasm(&firmware, count),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn check_step_limit(max_steps: u64) -> Result<()> {
    if max_steps > MAX_ALLOWED_STEPS {
        anyhow::bail!(
            "max_steps {} exceeds the allowed maximum of {}",
            max_steps,
            MAX_ALLOWED_STEPS
        );
    }
    Ok(())
}

/// Observers are attached before the image is loaded so they see the simulation start.
fn build_machine(
    firmware: &Path,
    system: Option<&Path>,
    echo: bool,
    observers: Vec<Arc<dyn SimulationObserver>>,
) -> Result<Machine<RiscV>> {
    let manifest = match system {
        Some(path) => {
            info!("Loading machine manifest: {:?}", path);
            MachineManifest::from_file(path)?
        }
        None => {
            info!("Using default machine configuration");
            MachineManifest::default()
        }
    };
    let mut bus = SystemBus::from_manifest(&manifest)?;
    bus.set_serial_echo(echo);

    info!("Loading firmware: {:?}", firmware);
    let program = serialfmt_loader::load_program(firmware, manifest.ram_base)?;
    info!(
        "Entry Point: {:#x}, {} bytes in {} segment(s)",
        program.entry_point,
        program.size(),
        program.segments.len()
    );

    let mut machine = Machine::<RiscV>::with_bus(bus);
    machine.observers = observers;
    machine
        .load_program(&program)
        .context("Failed to load firmware into memory")?;
    Ok(machine)
}

fn cmd_run(firmware: &Path, system: Option<&Path>, max_steps: u64, echo: bool) -> Result<u8> {
    check_step_limit(max_steps)?;
    let metrics = Arc::new(PerformanceMetrics::new());
    let mut machine = build_machine(firmware, system, echo, vec![metrics.clone()])?;

    info!("Running for at most {} steps...", max_steps);
    let run = harness::execute(&mut machine, max_steps, None);
    let _ = std::io::stdout().flush();

    info!(
        "Executed {} instructions ({:.0} IPS)",
        metrics.get_instructions(),
        metrics.get_ips()
    );

    match (run.stop_reason, run.exit_code) {
        (StopReason::Exit, Some(code)) => {
            info!("Guest exited with status {}", code);
            Ok(code)
        }
        (reason, _) => {
            error!("Guest did not exit: {:?}", reason);
            Ok(EXIT_ASSERT_FAIL)
        }
    }
}

fn cmd_test(script_path: &Path, output_dir: Option<&Path>, echo: bool) -> Result<u8> {
    let script = TestScript::from_file(script_path)?;
    check_step_limit(script.limits.max_steps)?;

    let firmware = script.firmware_path(script_path);
    let system = script.system_path(script_path);
    let firmware_bytes =
        std::fs::read(&firmware).with_context(|| format!("Failed to read {:?}", firmware))?;

    let mut machine = build_machine(&firmware, system.as_deref(), echo, Vec::new())?;
    let run = harness::execute(
        &mut machine,
        script.limits.max_steps,
        script.limits.wall_time_ms.map(Duration::from_millis),
    );
    let _ = std::io::stdout().flush();

    let results = harness::evaluate(&script.assertions, &run);
    let report = harness::TestReport::new(
        &run,
        results,
        harness::sha256_hex(&firmware_bytes),
        harness::TestConfigSummary {
            firmware: firmware.display().to_string(),
            system: system.map(|p| p.display().to_string()),
            max_steps: script.limits.max_steps,
            wall_time_ms: script.limits.wall_time_ms,
        },
    );

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
        let result_path = dir.join("result.json");
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&result_path, json)
            .with_context(|| format!("Failed to write {:?}", result_path))?;
        info!("Wrote {:?}", result_path);
    }

    info!(
        "Test {}: {:?} after {} steps",
        report.status, report.stop_reason, report.steps
    );
    Ok(if report.passed() {
        EXIT_PASS
    } else {
        EXIT_ASSERT_FAIL
    })
}

fn cmd_debug(firmware: &Path, system: Option<&Path>) -> Result<u8> {
    let machine = build_machine(firmware, system, true, Vec::new())?;
    let mut dbg = debugger::Debugger::new(machine);
    let stdin = std::io::stdin();
    let mut stderr = std::io::stderr();
    let status = dbg.run_session(stdin.lock(), &mut stderr)?;
    Ok(status.unwrap_or(EXIT_PASS))
}

fn cmd_disasm(firmware: &Path, count: u32) -> Result<u8> {
    let machine = build_machine(firmware, None, false, Vec::new())?;
    let entry = machine.cpu.pc;
    let mut stdout = std::io::stdout().lock();
    for i in 0..count {
        let addr = entry.wrapping_add(i * 4);
        match machine.bus.read_u32(addr as u64) {
            Ok(word) => writeln!(stdout, "{:08x}: {:08x}  {}", addr, word, decode_rv32(word))?,
            Err(e) => {
                writeln!(stdout, "{:08x}: <{}>", addr, e)?;
                break;
            }
        }
    }
    Ok(EXIT_PASS)
}
