use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use logger::LogKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Stdout,
    File,
}

impl From<LogTarget> for LogKind {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Stdout => Self::STDOUT,
            LogTarget::File => Self::FILE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Runs an ARM7TDMI program image headless")]
pub struct Arguments {
    /// Path to the BIOS/ROM image, loaded at address 0
    pub bios_path: PathBuf,

    /// Number of instructions to execute
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub steps: u64,

    /// Where log lines go. `RUST_LOG` sets the level
    #[arg(short, long, value_enum, default_value_t = LogTarget::Stdout)]
    pub log: LogTarget,

    /// (Optional) Start address instead of the reset vector, e.g. 0x100
    #[arg(short, long, value_parser = parse_address)]
    pub entry: Option<u32>,

    /// Start in Thumb state (needs --entry)
    #[arg(short, long, requires = "entry")]
    pub thumb: bool,

    /// (Optional) Write the final CPU state and history as JSON
    #[arg(short, long)]
    pub state_out: Option<PathBuf>,
}

/// Accepts decimal or `0x`-prefixed hexadecimal.
fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{s}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x100"), Ok(0x100));
        assert_eq!(parse_address("256"), Ok(256));
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn thumb_requires_entry() {
        assert!(Arguments::try_parse_from(["tdmi", "bios.bin", "--thumb"]).is_err());

        let args =
            Arguments::try_parse_from(["tdmi", "bios.bin", "-e", "0x200", "-t", "-n", "5"]).unwrap();
        assert_eq!(args.entry, Some(0x200));
        assert!(args.thumb);
        assert_eq!(args.steps, 5);
        assert_eq!(args.log, LogTarget::Stdout);
    }
}
