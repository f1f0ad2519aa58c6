mod config;

use std::{fs, path::Path, process::ExitCode};

use clap::Parser;
use emu::cpu::arm7tdmi::{Arm7tdmi, CpuSnapshot};
use emu::cpu::psr::CpuState;
use emu::memory::FlatMemory;
use serde::Serialize;
use tracing::{error, info};

use crate::config::Arguments;

/// What `--state-out` writes.
#[derive(Serialize)]
struct RunReport {
    steps: u64,
    error: Option<String>,
    state: CpuSnapshot,
    history: Vec<String>,
}

fn main() -> ExitCode {
    let args = Arguments::parse();

    let _guard = match logger::init_logger(args.log.into()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("can't open log file: {e}");
            return ExitCode::from(2);
        }
    };

    info!("tdmi v{}", env!("CARGO_PKG_VERSION"));

    let bios = match fs::read(&args.bios_path) {
        Ok(data) => data,
        Err(e) => {
            error!("can't read {}: {e}", args.bios_path.display());
            return ExitCode::from(2);
        }
    };

    let mut memory = FlatMemory::new();
    memory.load_bios(&bios);
    let mut cpu = Arm7tdmi::new(memory);

    if let Some(entry) = args.entry {
        if args.thumb {
            cpu.cpsr.state = CpuState::Thumb;
        }
        cpu.set_program_counter(entry);
        info!("starting at 0x{entry:08X} in {} state", cpu.cpsr.state);
    }

    let mut executed = 0;
    let mut failure = None;
    while executed < args.steps {
        if let Err(e) = cpu.step() {
            error!("step {executed} failed: {e}");
            error!("last instructions:\n{}", cpu.history().join("\n"));
            failure = Some(e.to_string());
            break;
        }
        executed += 1;
    }

    info!(
        "executed {executed} instructions, PC = 0x{:08X}, CPSR = {}",
        cpu.program_counter(),
        cpu.cpsr
    );

    if let Some(path) = &args.state_out {
        let report = RunReport {
            steps: executed,
            error: failure.clone(),
            state: cpu.save_state(),
            history: cpu.history().iter().map(ToString::to_string).collect(),
        };
        if let Err(e) = write_report(path, &report) {
            error!("can't write {}: {e}", path.display());
            return ExitCode::from(2);
        }
        info!("state written to {}", path.display());
    }

    if failure.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}
