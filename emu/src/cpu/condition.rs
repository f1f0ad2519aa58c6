//! # ARM Conditional Execution
//!
//! One of ARM's most distinctive features is **conditional execution**: almost every
//! instruction can be conditionally executed based on the CPU flags. This is encoded
//! in the top 4 bits (31-28) of every ARM instruction.
//!
//! ## The CPU Flags (CPSR bits 28-31)
//!
//! Conditions are based on four flags in the CPSR:
//!
//! | Flag | Bit | Name     | Set When                                    |
//! |------|-----|----------|---------------------------------------------|
//! | N    | 31  | Negative | Result has bit 31 set (is negative)         |
//! | Z    | 30  | Zero     | Result is zero                              |
//! | C    | 29  | Carry    | Addition overflowed, or subtraction didn't  |
//! | V    | 28  | Overflow | Signed arithmetic overflowed                |
//!
//! ## Condition Codes
//!
//! The 4-bit condition field encodes 16 conditions (though one is reserved):
//!
//! ```text
//! ┌───────┬────────┬─────────────────────┬─────────────────────────────────┐
//! │ Code  │ Suffix │     Meaning         │          Flags Tested           │
//! ├───────┼────────┼─────────────────────┼─────────────────────────────────┤
//! │ 0000  │   EQ   │ Equal               │ Z=1                             │
//! │ 0001  │   NE   │ Not equal           │ Z=0                             │
//! │ 0010  │   CS   │ Carry set / ≥ (uns) │ C=1                             │
//! │ 0011  │   CC   │ Carry clear / < (u) │ C=0                             │
//! │ 0100  │   MI   │ Minus / negative    │ N=1                             │
//! │ 0101  │   PL   │ Plus / non-negative │ N=0                             │
//! │ 0110  │   VS   │ Overflow set        │ V=1                             │
//! │ 0111  │   VC   │ Overflow clear      │ V=0                             │
//! │ 1000  │   HI   │ Higher (unsigned)   │ C=1 AND Z=0                     │
//! │ 1001  │   LS   │ Lower/same (unsig)  │ C=0 OR Z=1                      │
//! │ 1010  │   GE   │ ≥ (signed)          │ N=V                             │
//! │ 1011  │   LT   │ < (signed)          │ N≠V                             │
//! │ 1100  │   GT   │ > (signed)          │ Z=0 AND N=V                     │
//! │ 1101  │   LE   │ ≤ (signed)          │ Z=1 OR N≠V                      │
//! │ 1110  │   AL   │ Always              │ (unconditional)                 │
//! │ 1111  │   NV   │ Reserved            │ decode error                    │
//! └───────┴────────┴─────────────────────┴─────────────────────────────────┘
//! ```
//!
//! ## Instruction Encoding Example
//!
//! ```text
//! Instruction: MOVEQ R0, #1    (Move 1 to R0 if equal)
//!
//! Binary: 0000 00 1 1101 0 0000 0000 000000000001
//!         ↑         ↑         ↑
//!         │         │         └─ Immediate value: 1
//!         │         └─ MOV opcode
//!         └─ Condition: 0000 = EQ (execute if Z=1)
//! ```
//!
//! ## Thumb State
//!
//! Only the conditional branch (format 16) carries a condition; every other
//! Thumb instruction is translated with `AL`. Condition `1110` in that format
//! is undefined and `1111` is the SWI encoding.

use serde::{Deserialize, Serialize};

use crate::error::CpuError;

/// Condition codes for ARM conditional execution.
///
/// `NV` (`1111`) has no variant: it is rejected when the instruction is
/// decoded, so it can never be silently skipped or executed.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// Equal (Z=1)
    EQ = 0x0,

    /// Not equal (Z=0)
    NE = 0x1,

    /// Carry set / unsigned higher or same (C=1)
    CS = 0x2,

    /// Carry clear / unsigned lower (C=0)
    CC = 0x3,

    /// Minus / negative (N=1)
    MI = 0x4,

    /// Plus / positive or zero (N=0)
    PL = 0x5,

    /// Overflow set (V=1)
    VS = 0x6,

    /// Overflow clear (V=0)
    VC = 0x7,

    /// Unsigned higher (C=1 AND Z=0)
    HI = 0x8,

    /// Unsigned lower or same (C=0 OR Z=1)
    LS = 0x9,

    /// Signed greater or equal (N=V)
    GE = 0xA,

    /// Signed less than (N≠V)
    LT = 0xB,

    /// Signed greater than (Z=0 AND N=V)
    GT = 0xC,

    /// Signed less than or equal (Z=1 OR N≠V)
    LE = 0xD,

    /// Always (unconditional)
    AL = 0xE,
}

impl Condition {
    pub const ALL: [Self; 15] = [
        Self::EQ,
        Self::NE,
        Self::CS,
        Self::CC,
        Self::MI,
        Self::PL,
        Self::VS,
        Self::VC,
        Self::HI,
        Self::LS,
        Self::GE,
        Self::LT,
        Self::GT,
        Self::LE,
        Self::AL,
    ];
}

impl TryFrom<u32> for Condition {
    type Error = CpuError;

    /// `field` is the 4-bit condition; the error reports it as `raw`.
    fn try_from(field: u32) -> Result<Self, Self::Error> {
        match field {
            0x0 => Ok(Self::EQ),
            0x1 => Ok(Self::NE),
            0x2 => Ok(Self::CS),
            0x3 => Ok(Self::CC),
            0x4 => Ok(Self::MI),
            0x5 => Ok(Self::PL),
            0x6 => Ok(Self::VS),
            0x7 => Ok(Self::VC),
            0x8 => Ok(Self::HI),
            0x9 => Ok(Self::LS),
            0xA => Ok(Self::GE),
            0xB => Ok(Self::LT),
            0xC => Ok(Self::GT),
            0xD => Ok(Self::LE),
            0xE => Ok(Self::AL),
            _ => Err(CpuError::ReservedCondition { field }),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EQ => f.write_str("EQ"),
            Self::NE => f.write_str("NE"),
            Self::CS => f.write_str("CS"),
            Self::CC => f.write_str("CC"),
            Self::MI => f.write_str("MI"),
            Self::PL => f.write_str("PL"),
            Self::VS => f.write_str("VS"),
            Self::VC => f.write_str("VC"),
            Self::HI => f.write_str("HI"),
            Self::LS => f.write_str("LS"),
            Self::GE => f.write_str("GE"),
            Self::LT => f.write_str("LT"),
            Self::GT => f.write_str("GT"),
            Self::LE => f.write_str("LE"),
            Self::AL => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_values() {
        for (field, condition) in (0_u32..).zip(Condition::ALL) {
            assert_eq!(Condition::try_from(field), Ok(condition));
            assert_eq!(condition as u32, field);
        }
    }

    #[test]
    fn nv_is_reserved() {
        assert_eq!(
            Condition::try_from(0xF),
            Err(CpuError::ReservedCondition { field: 0xF })
        );
    }

    #[test]
    fn always_has_no_suffix() {
        assert_eq!(Condition::AL.to_string(), "");
        assert_eq!(Condition::GE.to_string(), "GE");
    }
}
