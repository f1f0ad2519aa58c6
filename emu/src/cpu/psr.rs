//! # Program Status Registers (CPSR and SPSR)
//!
//! The PSR contains condition flags (N, Z, C, V) and control bits (mode, state, interrupts).
//!
//! ```text
//! 31 30 29 28 27            8 7 6 5 4   0
//! ┌──┬──┬──┬──┬──────────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │   Reserved   │I│F│T│Mode │
//! └──┴──┴──┴──┴──────────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (28-31)**: See [`condition`](super::condition) for how these are tested
//! - **Mode (0-4)**: See [`cpu_modes`](super::cpu_modes) for operating modes
//! - **T bit (5)**: ARM (0) or Thumb (1) state
//! - **I/F bits (6-7)**: IRQ/FIQ disable
//!
//! [`Psr`] keeps each field as a typed value and converts to and from the raw
//! word only at the edges (MRS/MSR, snapshots). The reserved bits are carried
//! through untouched.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};
use crate::error::CpuError;

const RESERVED_MASK: u32 = 0x0FFF_FF00;

/// Program Status Register (CPSR or SPSR).
///
/// # Example
///
/// ```
/// use emu::cpu::psr::Psr;
///
/// let cpsr = Psr::try_from(0x6000_00D3).unwrap();
/// assert!(cpsr.zero);
/// assert!(cpsr.carry);
/// assert!(cpsr.irq_disable);
/// assert_eq!(u32::from(cpsr), 0x6000_00D3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr {
    /// N => Bit 31, (0=Not Signed, 1=Signed)
    pub sign: bool,
    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    pub zero: bool,
    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    pub carry: bool,
    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    pub overflow: bool,
    /// I => Bit 7, (0=Enable, 1=Disable)
    pub irq_disable: bool,
    /// F => Bit 6, (0=Enable, 1=Disable)
    pub fiq_disable: bool,
    /// T => Bit 5
    pub state: CpuState,
    /// M4-M0 => Bits 4-0
    pub mode: Mode,
    reserved: u32,
}

impl Default for Psr {
    fn default() -> Self {
        Self::from(Mode::User)
    }
}

impl Psr {
    pub(crate) const fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, PL, VC, VS};
        match cond {
            EQ => self.zero,
            NE => !self.zero,
            CS => self.carry,
            CC => !self.carry,
            MI => self.sign,
            PL => !self.sign,
            VS => self.overflow,
            VC => !self.overflow,
            HI => self.carry && !self.zero,
            LS => !self.carry || self.zero,
            GE => self.sign == self.overflow,
            LT => self.sign != self.overflow,
            GT => !self.zero && (self.sign == self.overflow),
            LE => self.zero || (self.sign != self.overflow),
            AL => true,
        }
    }

    /// Evaluates a raw 4-bit condition field against the current flags.
    ///
    /// # Errors
    ///
    /// `NV` (`0b1111`) is reserved and reported as [`CpuError::ReservedCondition`].
    pub fn check_condition(self, field: u32) -> Result<bool, CpuError> {
        Ok(self.can_execute(Condition::try_from(field)?))
    }

    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.carry = op_result.carry;
        self.zero = op_result.zero;
        self.sign = op_result.sign;
        self.overflow = op_result.overflow;
    }

    /// N and Z from `result`, C from the shifter. V is left alone.
    pub fn set_logical_flags(&mut self, result: u32, carry: bool) {
        self.sign = result.get_bit(31);
        self.zero = result == 0;
        self.carry = carry;
    }

    /// Only bits 31-28 of `value` are used.
    pub fn set_flags_from_raw(&mut self, value: u32) {
        self.sign = value.get_bit(31);
        self.zero = value.get_bit(30);
        self.carry = value.get_bit(29);
        self.overflow = value.get_bit(28);
    }

}

impl From<Mode> for Psr {
    fn from(mode: Mode) -> Self {
        Self {
            sign: false,
            zero: false,
            carry: false,
            overflow: false,
            irq_disable: false,
            fiq_disable: false,
            state: CpuState::Arm,
            mode,
            reserved: 0,
        }
    }
}

impl TryFrom<u32> for Psr {
    type Error = CpuError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Ok(Self {
            sign: raw.get_bit(31),
            zero: raw.get_bit(30),
            carry: raw.get_bit(29),
            overflow: raw.get_bit(28),
            irq_disable: raw.get_bit(7),
            fiq_disable: raw.get_bit(6),
            state: raw.get_bit(5).into(),
            mode: Mode::try_from(raw.get_bits(0..=4))?,
            reserved: raw & RESERVED_MASK,
        })
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        let mut raw = p.reserved | u32::from(p.mode);
        raw.set_bit(31, p.sign);
        raw.set_bit(30, p.zero);
        raw.set_bit(29, p.carry);
        raw.set_bit(28, p.overflow);
        raw.set_bit(7, p.irq_disable);
        raw.set_bit(6, p.fiq_disable);
        raw.set_bit(5, p.state.into());
        raw
    }
}

impl std::fmt::Display for Psr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |on: bool, name: char| if on { name } else { '-' };
        write!(
            f,
            "{}{}{}{} {}{}{} {}",
            flag(self.sign, 'N'),
            flag(self.zero, 'Z'),
            flag(self.carry, 'C'),
            flag(self.overflow, 'V'),
            flag(self.irq_disable, 'I'),
            flag(self.fiq_disable, 'F'),
            flag(self.state == CpuState::Thumb, 'T'),
            self.mode
        )
    }
}

/// The CPU execution state (ARM or Thumb).
///
/// Controlled by the T bit (bit 5) in CPSR. Switch via `BX Rn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Thumb: 16-bit instructions. See `thumb` module.
    Thumb,
    /// ARM: 32-bit instructions. See `arm` module.
    Arm,
}

impl CpuState {
    /// Bytes between two consecutive instructions.
    #[must_use]
    pub const fn instruction_size(self) -> u32 {
        match self {
            Self::Arm => 4,
            Self::Thumb => 2,
        }
    }

    /// How far ahead of the executing instruction R15 reads, because of
    /// the three-stage pipeline.
    #[must_use]
    pub const fn pipeline_offset(self) -> u32 {
        self.instruction_size() * 2
    }
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}

impl std::fmt::Display for CpuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm => f.write_str("ARM"),
            Self::Thumb => f.write_str("THUMB"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_unpack() {
        let psr = Psr::try_from(0b1010_0000_0000_0000_0000_0000_1011_0011).unwrap();
        assert!(psr.sign);
        assert!(!psr.zero);
        assert!(psr.carry);
        assert!(!psr.overflow);
        assert!(psr.irq_disable);
        assert!(!psr.fiq_disable);
        assert_eq!(psr.state, CpuState::Thumb);
        assert_eq!(psr.mode, Mode::Supervisor);
    }

    #[test]
    fn check_pack() {
        let mut psr = Psr::from(Mode::Irq);
        psr.overflow = true;
        psr.fiq_disable = true;
        assert_eq!(u32::from(psr), 0x1000_0052);
    }

    #[test]
    fn check_reserved_bits_preserved() {
        let raw = 0x0123_4513;
        let psr = Psr::try_from(raw).unwrap();
        assert_eq!(u32::from(psr), raw);
    }

    #[test]
    fn check_random_round_trip() {
        for _ in 0..1000 {
            let raw: u32 = rand::random();
            let raw = (raw & !0b11111) | u32::from(Mode::Abort);
            assert_eq!(u32::from(Psr::try_from(raw).unwrap()), raw);
        }
    }

    #[test]
    fn check_invalid_mode() {
        assert_eq!(Psr::try_from(0x0000_0000), Err(CpuError::InvalidMode(0)));
    }

    #[test]
    fn check_reset_value() {
        let psr = Psr::try_from(0xD3).unwrap();
        assert_eq!(psr.mode, Mode::Supervisor);
        assert!(psr.irq_disable);
        assert!(psr.fiq_disable);
        assert_eq!(psr.state, CpuState::Arm);
    }

    #[test]
    fn check_condition_table() {
        // Every combination of N Z C V against every valid condition.
        for flags in 0_u32..16 {
            let psr = Psr::try_from((flags << 28) | u32::from(Mode::User)).unwrap();
            let (n, z, c, v) = (psr.sign, psr.zero, psr.carry, psr.overflow);
            let expected = [
                z,
                !z,
                c,
                !c,
                n,
                !n,
                v,
                !v,
                c && !z,
                !c || z,
                n == v,
                n != v,
                !z && n == v,
                z || n != v,
                true,
            ];

            for (field, expected) in (0_u32..).zip(expected) {
                assert_eq!(psr.check_condition(field), Ok(expected), "{field:X} {psr}");
            }
        }
    }

    #[test]
    fn check_condition_nv() {
        let psr = Psr::default();
        assert_eq!(
            psr.check_condition(0xF),
            Err(CpuError::ReservedCondition { field: 0xF })
        );
    }

    #[test]
    fn check_logical_flags_keep_overflow() {
        let mut psr = Psr::default();
        psr.overflow = true;
        psr.set_logical_flags(0x8000_0000, true);
        assert!(psr.sign);
        assert!(!psr.zero);
        assert!(psr.carry);
        assert!(psr.overflow);
    }

    #[test]
    fn check_display() {
        let psr = Psr::try_from(0x6000_00F3).unwrap();
        assert_eq!(psr.to_string(), "-ZC- IFT SVC");
    }
}
