use thiserror::Error;

use crate::cpu::arm::instructions::ArmInstructionKind;
use crate::cpu::cpu_modes::Mode;

/// Reasons a single `step` can stop without completing.
///
/// A failed step leaves the program counter on the offending instruction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// The low 5 bits of a status register do not name a processor mode.
    #[error("invalid mode bits 0b{0:05b}")]
    InvalidMode(u32),

    /// Condition field `1111` (NV) is reserved on ARMv4T. `field` is the
    /// 4-bit condition, never the whole instruction word.
    #[error("reserved condition field 0b{field:04b}")]
    ReservedCondition { field: u32 },

    #[error("invalid shift kind {0}")]
    InvalidShiftKind(u32),

    /// Coprocessor instructions and the undefined-instruction trap.
    #[error("{kind} is not implemented (0x{raw:08X})")]
    UnimplementedArm { kind: ArmInstructionKind, raw: u32 },

    #[error("undefined thumb instruction 0x{raw:04X}")]
    UndefinedThumb { raw: u16 },

    /// User and System mode have no saved status register.
    #[error("{0} mode has no SPSR")]
    MissingSpsr(Mode),
}
