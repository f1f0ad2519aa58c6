use std::fmt::Display;

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl Display for ArmModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only produce flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    /// Only the low 4 bits are looked at.
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// Where the shift amount of a register operand comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShiftOperator {
    Immediate(u32),
    Register(usize),
}

impl std::fmt::Display for ShiftOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "#{value}"),
            Self::Register(register) => write!(f, "R{register}"),
        }
    }
}

/// Operand 2 of a data processing (or MSR) instruction.
///
/// `Immediate` is `base` rotated right by `shift`. The ARM encoding only
/// produces an 8-bit `base` and an even `shift`; Thumb translations use any
/// 32-bit `base` with `shift == 0`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: usize,
    },
    Immediate {
        base: u32,
        shift: u32,
    },
}

impl AluSecondOperandInfo {
    /// Plain register, no shift.
    #[must_use]
    pub const fn register(register: usize) -> Self {
        Self::Register {
            shift_op: ShiftOperator::Immediate(0),
            shift_kind: ShiftKind::Lsl,
            register,
        }
    }

    #[must_use]
    pub const fn immediate(value: u32) -> Self {
        Self::Immediate {
            base: value,
            shift: 0,
        }
    }

    /// Register-specified shifts take an extra cycle, so R15 reads 4 bytes further.
    #[must_use]
    pub const fn is_shift_by_register(self) -> bool {
        matches!(
            self,
            Self::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        )
    }
}

impl std::fmt::Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Register {
                shift_op,
                shift_kind,
                register,
            } => {
                if let ShiftOperator::Immediate(0) = shift_op {
                    return match shift_kind {
                        ShiftKind::Lsl => write!(f, "R{register}"),
                        ShiftKind::Ror => write!(f, "R{register}, RRX"),
                        _ => write!(f, "R{register}, {shift_kind} #32"),
                    };
                }

                write!(f, "R{register}, {shift_kind} {shift_op}")
            }
            Self::Immediate { base, shift } => {
                write!(f, "#{}", base.rotate_right(shift))
            }
        }
    }
}

/// Which status register an MRS/MSR talks to (bit 22).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(b: bool) -> Self {
        if b { Self::Spsr } else { Self::Cpsr }
    }
}

impl std::fmt::Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => f.write_str("CPSR"),
            Self::Spsr => f.write_str("SPSR"),
        }
    }
}

/// Barrel shifter: returns the shifted value and the shifter carry-out.
///
/// An `amount` of 0 leaves `value` and `carry` unchanged. Amounts of 32 and
/// above are only reachable through register-specified shifts; the
/// immediate encodings LSR #0, ASR #0 and ROR #0 must be resolved by the
/// caller (see [`shift_by_immediate`]).
#[must_use]
pub fn calculate_operand2(value: u32, amount: u32, kind: ShiftKind, carry: bool) -> (u32, bool) {
    if amount == 0 {
        return (value, carry);
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => (value << amount, value.get_bit((32 - amount) as u8)),
            32 => (0, value.get_bit(0)),
            _ => (0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => (value >> amount, value.get_bit((amount - 1) as u8)),
            32 => (0, value.get_bit(31)),
            _ => (0, false),
        },
        ShiftKind::Asr => match amount {
            1..=31 => (
                ((value as i32) >> amount) as u32,
                value.get_bit((amount - 1) as u8),
            ),
            _ => (((value as i32) >> 31) as u32, value.get_bit(31)),
        },
        ShiftKind::Ror => {
            // ROR by n >= 32 behaves like ROR by n - 32; a multiple of 32 is ROR #32.
            let result = value.rotate_right(amount % 32);
            (result, result.get_bit(31))
        }
    }
}

/// Rotate right by one through carry.
#[must_use]
pub fn rrx(value: u32, carry: bool) -> (u32, bool) {
    ((u32::from(carry) << 31) | (value >> 1), value.get_bit(0))
}

/// Shift encoded in the instruction itself (5-bit amount).
///
/// LSR #0 and ASR #0 encode a shift by 32, ROR #0 encodes RRX.
#[must_use]
pub fn shift_by_immediate(value: u32, amount: u32, kind: ShiftKind, carry: bool) -> (u32, bool) {
    match (kind, amount) {
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => calculate_operand2(value, 32, kind, carry),
        (ShiftKind::Ror, 0) => rrx(value, carry),
        _ => calculate_operand2(value, amount, kind, carry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KINDS: [ShiftKind; 4] = [ShiftKind::Lsl, ShiftKind::Lsr, ShiftKind::Asr, ShiftKind::Ror];

    #[test]
    fn test_ops_only_set_flags() {
        for alu_op_code in 0..16 {
            let instruction = ArmModeAluInstruction::from(alu_op_code);
            assert_eq!(instruction.is_test(), (8..=11).contains(&alu_op_code), "{instruction}");
        }
    }

    #[test]
    fn zero_shift_is_identity() {
        for _ in 0..1000 {
            let value: u32 = rand::random();
            let carry: bool = rand::random();
            for kind in KINDS {
                assert_eq!(calculate_operand2(value, 0, kind, carry), (value, carry));
            }
        }
    }

    #[test]
    fn lsl() {
        assert_eq!(
            calculate_operand2(0x8000_0001, 1, ShiftKind::Lsl, false),
            (0x2, true)
        );
        assert_eq!(calculate_operand2(0x3, 32, ShiftKind::Lsl, false), (0, true));
        assert_eq!(calculate_operand2(0xFFFF_FFFF, 33, ShiftKind::Lsl, true), (0, false));
    }

    #[test]
    fn lsr() {
        assert_eq!(calculate_operand2(0b110, 2, ShiftKind::Lsr, false), (0b1, true));
        assert_eq!(calculate_operand2(0x8000_0000, 32, ShiftKind::Lsr, false), (0, true));
        assert_eq!(calculate_operand2(0x8000_0000, 40, ShiftKind::Lsr, true), (0, false));
    }

    #[test]
    fn asr() {
        assert_eq!(
            calculate_operand2(0x8000_0000, 4, ShiftKind::Asr, false),
            (0xF800_0000, false)
        );
        assert_eq!(
            calculate_operand2(0x8000_0000, 32, ShiftKind::Asr, false),
            (0xFFFF_FFFF, true)
        );
        assert_eq!(calculate_operand2(0x7FFF_FFFF, 100, ShiftKind::Asr, true), (0, false));
    }

    #[test]
    fn ror() {
        assert_eq!(
            calculate_operand2(0x0000_0003, 1, ShiftKind::Ror, false),
            (0x8000_0001, true)
        );
        assert_eq!(
            calculate_operand2(0x8000_0001, 32, ShiftKind::Ror, false),
            (0x8000_0001, true)
        );
        assert_eq!(
            calculate_operand2(0x0000_0010, 68, ShiftKind::Ror, true),
            (0x0000_0001, false)
        );
    }

    #[test]
    fn immediate_encodings() {
        assert_eq!(
            shift_by_immediate(0x8000_0000, 0, ShiftKind::Lsr, false),
            (0, true)
        );
        assert_eq!(
            shift_by_immediate(0x8000_0000, 0, ShiftKind::Asr, false),
            (0xFFFF_FFFF, true)
        );
        assert_eq!(
            shift_by_immediate(0x0000_0003, 0, ShiftKind::Ror, true),
            (0x8000_0001, true)
        );
        assert_eq!(
            shift_by_immediate(0x0000_0002, 0, ShiftKind::Ror, false),
            (0x0000_0001, false)
        );
        assert_eq!(shift_by_immediate(0x5, 0, ShiftKind::Lsl, true), (0x5, true));
    }

    #[test]
    fn operand_display() {
        let op = AluSecondOperandInfo::Register {
            shift_op: ShiftOperator::Register(3),
            shift_kind: ShiftKind::Asr,
            register: 2,
        };
        assert_eq!(op.to_string(), "R2, ASR R3");
        assert_eq!(AluSecondOperandInfo::register(4).to_string(), "R4");
        assert_eq!(
            AluSecondOperandInfo::Immediate { base: 0xFF, shift: 8 }.to_string(),
            "#4278190080"
        );
    }
}
