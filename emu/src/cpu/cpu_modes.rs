//! # Processor Modes
//!
//! The ARM7TDMI runs in one of seven modes, encoded in bits 4-0 of the CPSR.
//! Every mode except User and System owns a saved status register (SPSR) and
//! its own copies of some general registers:
//!
//! | Mode       | Bits    | Banked registers | SPSR |
//! |------------|---------|------------------|------|
//! | User       | `10000` | -                | no   |
//! | FIQ        | `10001` | R8-R14           | yes  |
//! | IRQ        | `10010` | R13-R14          | yes  |
//! | Supervisor | `10011` | R13-R14          | yes  |
//! | Abort      | `10111` | R13-R14          | yes  |
//! | Undefined  | `11011` | R13-R14          | yes  |
//! | System     | `11111` | - (shares User)  | no   |
//!
//! See [`register_bank`](super::register_bank) for the physical layout.

use serde::{Deserialize, Serialize};

use crate::error::CpuError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

impl Mode {
    pub const ALL: [Self; 7] = [
        Self::User,
        Self::Fiq,
        Self::Irq,
        Self::Supervisor,
        Self::Abort,
        Self::Undefined,
        Self::System,
    ];

    /// Exception modes own an SPSR; User and System do not.
    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }

    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = CpuError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(CpuError::InvalidMode(n)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("USR"),
            Self::Fiq => f.write_str("FIQ"),
            Self::Irq => f.write_str("IRQ"),
            Self::Supervisor => f.write_str("SVC"),
            Self::Abort => f.write_str("ABT"),
            Self::Undefined => f.write_str("UND"),
            Self::System => f.write_str("SYS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mode_bits_round_trip() {
        for mode in Mode::ALL {
            let bits: u32 = mode.into();
            assert_eq!(Mode::try_from(bits), Ok(mode));
        }
    }

    #[test]
    fn unknown_mode_bits() {
        assert_eq!(Mode::try_from(0), Err(CpuError::InvalidMode(0)));
        assert_eq!(Mode::try_from(0b10100), Err(CpuError::InvalidMode(0b10100)));
    }

    #[test]
    fn spsr_ownership() {
        assert!(!Mode::User.has_spsr());
        assert!(!Mode::System.has_spsr());
        assert!(Mode::Supervisor.has_spsr());
        assert!(Mode::Fiq.has_spsr());
        assert!(Mode::System.is_privileged());
        assert!(!Mode::User.is_privileged());
    }
}
