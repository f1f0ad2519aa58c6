//! # ARM Instruction Decoding
//!
//! Decoding happens in two passes, both pure:
//!
//! 1. [`ArmInstructionKind::from`] classifies a 32-bit word into one of 17
//!    categories by looking at fixed bit patterns. The condition field is
//!    ignored.
//! 2. [`ArmModeInstruction::decode`] extracts the fields of that category into
//!    a flat value that the matching handler in
//!    [`operations`](super::operations) consumes.
//!
//! ## Decoding Priority
//!
//! Several encodings overlap, so the first matching rule wins:
//!
//! ```text
//!  1. Branch and Exchange      xxxx 0001 0010 1111 1111 1111 0001 xxxx
//!  2. Block Data Transfer      xxxx 100x xxxx xxxx xxxx xxxx xxxx xxxx
//!  3. Branch                   xxxx 101x xxxx xxxx xxxx xxxx xxxx xxxx
//!  4. Software Interrupt       xxxx 1111 xxxx xxxx xxxx xxxx xxxx xxxx
//!  5. Undefined                xxxx 011x xxxx xxxx xxxx xxxx xxx1 xxxx
//!  6. Single Data Transfer     xxxx 01xx xxxx xxxx xxxx xxxx xxxx xxxx
//!  7. Single Data Swap         xxxx 0001 0x00 xxxx xxxx xxxx 1001 xxxx
//!  8. Multiply                 xxxx 0000 00xx xxxx xxxx xxxx 1001 xxxx
//!  9. Multiply Long            xxxx 0000 1xxx xxxx xxxx xxxx 1001 xxxx
//! 10. Halfword (register)      xxxx 000x x0xx xxxx xxxx 0000 1xx1 xxxx
//!     Halfword (immediate)     xxxx 000x x1xx xxxx xxxx xxxx 1xx1 xxxx
//! 11. MRS                      xxxx 0001 0x00 1111 xxxx 0000 0000 0000
//!     MSR                      xxxx 00x1 0x10 xxxx 1111 xxxx xxxx xxxx
//! 12. Data Processing          xxxx 00xx xxxx xxxx xxxx xxxx xxxx xxxx
//! 13. Coprocessor Data Transfer      110x, Data Operation 1110 + bit 4 = 0,
//!     Coprocessor Register Transfer  1110 + bit 4 = 1
//! ```
//!
//! The halfword register form requires bits 11-8 to be zero, so MSR words
//! with a non-zero operand field fall through to the PSR rules. MSR accepts
//! any field mask; only the `f` and `c` bits are acted on.
//!
//! TST, TEQ, CMP and CMN without the S bit are the PSR transfer space. Words
//! there that match neither MRS nor MSR decode as unimplemented instead of
//! running as a test op.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, PsrKind, ShiftOperator,
};
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    ReadWriteKind, ShiftKind,
};
use crate::error::CpuError;

/// The 17 ARM instruction categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmInstructionKind {
    DataProcessing,
    ProgramStatusRegisterTransferOut,
    ProgramStatusRegisterTransferIn,
    Multiply,
    MultiplyLong,
    SingleDataSwap,
    BranchAndExchange,
    HalfwordDataTransferRegister,
    HalfwordDataTransferImmediate,
    SingleDataTransfer,
    BlockDataTransfer,
    Branch,
    CoprocessorDataTransfer,
    CoprocessorDataOperation,
    CoprocessorRegisterTransfer,
    SoftwareInterrupt,
    Undefined,
}

impl std::fmt::Display for ArmInstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl From<u32> for ArmInstructionKind {
    fn from(op_code: u32) -> Self {
        let low_nibble = op_code.get_bits(4..=7);

        if op_code & 0x0FFF_FFF0 == 0x012F_FF10 {
            Self::BranchAndExchange
        } else if op_code.get_bits(25..=27) == 0b100 {
            Self::BlockDataTransfer
        } else if op_code.get_bits(25..=27) == 0b101 {
            Self::Branch
        } else if op_code.get_bits(24..=27) == 0b1111 {
            Self::SoftwareInterrupt
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.get_bit(4) {
            Self::Undefined
        } else if op_code.get_bits(26..=27) == 0b01 {
            Self::SingleDataTransfer
        } else if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(20..=21) == 0b00
            && low_nibble == 0b1001
        {
            Self::SingleDataSwap
        } else if op_code.get_bits(22..=27) == 0 && low_nibble == 0b1001 {
            Self::Multiply
        } else if op_code.get_bits(23..=27) == 0b00001 && low_nibble == 0b1001 {
            Self::MultiplyLong
        } else if op_code.get_bits(25..=27) == 0
            && op_code.get_bit(7)
            && op_code.get_bit(4)
            && (op_code.get_bit(22) || op_code.get_bits(8..=11) == 0)
        {
            if op_code.get_bit(22) {
                Self::HalfwordDataTransferImmediate
            } else {
                Self::HalfwordDataTransferRegister
            }
        } else if op_code & 0x0FBF_0FFF == 0x010F_0000 {
            Self::ProgramStatusRegisterTransferOut
        } else if op_code & 0x0DB0_F000 == 0x0120_F000 {
            Self::ProgramStatusRegisterTransferIn
        } else if op_code.get_bits(26..=27) == 0 {
            Self::DataProcessing
        } else if op_code.get_bits(25..=27) == 0b110 {
            Self::CoprocessorDataTransfer
        } else if op_code.get_bits(24..=27) == 0b1110 {
            if op_code.get_bit(4) {
                Self::CoprocessorRegisterTransfer
            } else {
                Self::CoprocessorDataOperation
            }
        } else {
            Self::Undefined
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataProcessingArgs {
    pub alu_instruction: ArmModeAluInstruction,
    pub set_conditions: bool,
    pub rn: usize,
    pub destination: usize,
    pub op2: AluSecondOperandInfo,
}

/// MSR field mask (bits 19 and 16): which parts of the PSR get written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsrFieldMask {
    /// Bits 31-28.
    pub flags: bool,
    /// Bits 7-0.
    pub control: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: usize,
    },
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { offset } => write!(f, "#{offset}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => write!(f, "R{reg_offset}, {shift_kind} #{shift_amount}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl std::fmt::Display for ArmModeMultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umull => f.write_str("UMULL"),
            Self::Umlal => f.write_str("UMLAL"),
            Self::Smull => f.write_str("SMULL"),
            Self::Smlal => f.write_str("SMLAL"),
        }
    }
}

impl From<u32> for ArmModeMultiplyVariant {
    /// A bit (21).
    fn from(op_code: u32) -> Self {
        if op_code.get_bit(21) { Self::Mla } else { Self::Mul }
    }
}

impl From<u32> for ArmModeMultiplyLongVariant {
    /// U (22) and A (21) bits.
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=22) {
            0b00 => Self::Umull,
            0b01 => Self::Umlal,
            0b10 => Self::Smull,
            _ => Self::Smlal,
        }
    }
}

/// Where a branch adds its offset to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchBase {
    /// The pipelined PC (`B`, `BL`, Thumb `B`).
    ProgramCounter,
    /// LR, set up by the first half of a Thumb long branch with link.
    LinkRegister,
}

/// A decoded ARM instruction (or the ARM form of a Thumb instruction).
///
/// | Variant                 | Example Instructions | Description                 |
/// |-------------------------|----------------------|-----------------------------|
/// | `DataProcessing`        | AND, ADD, CMP, MOV   | ALU operations              |
/// | `PsrTransferOut`        | MRS                  | Read CPSR/SPSR              |
/// | `PsrTransferIn`         | MSR                  | Write CPSR/SPSR             |
/// | `Multiply`              | MUL, MLA             | 32-bit multiply             |
/// | `MultiplyLong`          | UMULL, SMLAL         | 64-bit multiply             |
/// | `SingleDataSwap`        | SWP, SWPB            | Atomic memory swap          |
/// | `BranchAndExchange`     | BX                   | Branch + ARM/Thumb switch   |
/// | `HalfwordDataTransfer`  | LDRH, STRH, LDRSB    | 16-bit and signed loads     |
/// | `SingleDataTransfer`    | LDR, STR, LDRB       | 32-bit and byte loads/stores|
/// | `BlockDataTransfer`     | LDM, STM             | Multiple register transfer  |
/// | `Branch`                | B, BL                | Branch (and link)           |
/// | `SoftwareInterrupt`     | SWI                  | Supervisor call             |
/// | `Unimplemented`         | coprocessor, UND     | Fails the step              |
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ArmModeInstruction {
    DataProcessing(DataProcessingArgs),
    PsrTransferOut {
        psr_kind: PsrKind,
        destination: usize,
    },
    PsrTransferIn {
        psr_kind: PsrKind,
        field_mask: PsrFieldMask,
        operand: AluSecondOperandInfo,
    },
    Multiply {
        variant: ArmModeMultiplyVariant,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        set_conditions: bool,
        rdhi: usize,
        rdlo: usize,
        rs: usize,
        rm: usize,
    },
    SingleDataSwap {
        quantity: ReadWriteKind,
        rn: usize,
        rd: usize,
        rm: usize,
    },
    BranchAndExchange {
        register: usize,
    },
    HalfwordDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: usize,
        source_destination_register: usize,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: usize,
        base_register: usize,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    },
    Branch {
        link: bool,
        /// Byte offset, already sign-extended and scaled.
        offset: i32,
        base: BranchBase,
    },
    SoftwareInterrupt,
    Unimplemented(ArmInstructionKind),
}

fn register_at(op_code: u32, lsb: u8) -> usize {
    op_code.get_bits(lsb..=lsb + 3) as usize
}

impl ArmModeInstruction {
    /// Extracts the fields of `kind` from `op_code`.
    ///
    /// # Errors
    ///
    /// Only fails on a shift kind outside `0..=3`, which two bits can't
    /// produce; the check keeps decode total over its input type.
    #[allow(clippy::too_many_lines)]
    pub fn decode(kind: ArmInstructionKind, op_code: u32) -> Result<Self, CpuError> {
        use ArmInstructionKind as K;

        Ok(match kind {
            K::DataProcessing
                if ArmModeAluInstruction::from(op_code.get_bits(21..=24)).is_test()
                    && !op_code.get_bit(20) =>
            {
                Self::Unimplemented(K::DataProcessing)
            }
            K::DataProcessing => Self::DataProcessing(DataProcessingArgs {
                alu_instruction: op_code.get_bits(21..=24).into(),
                set_conditions: op_code.get_bit(20),
                rn: register_at(op_code, 16),
                destination: register_at(op_code, 12),
                op2: Self::decode_operand2(op_code)?,
            }),
            K::ProgramStatusRegisterTransferOut => Self::PsrTransferOut {
                psr_kind: op_code.get_bit(22).into(),
                destination: register_at(op_code, 12),
            },
            K::ProgramStatusRegisterTransferIn => Self::PsrTransferIn {
                psr_kind: op_code.get_bit(22).into(),
                field_mask: PsrFieldMask {
                    flags: op_code.get_bit(19),
                    control: op_code.get_bit(16),
                },
                operand: Self::decode_operand2(op_code)?,
            },
            K::Multiply => Self::Multiply {
                variant: op_code.into(),
                set_conditions: op_code.get_bit(20),
                rd: register_at(op_code, 16),
                rn: register_at(op_code, 12),
                rs: register_at(op_code, 8),
                rm: register_at(op_code, 0),
            },
            K::MultiplyLong => Self::MultiplyLong {
                variant: op_code.into(),
                set_conditions: op_code.get_bit(20),
                rdhi: register_at(op_code, 16),
                rdlo: register_at(op_code, 12),
                rs: register_at(op_code, 8),
                rm: register_at(op_code, 0),
            },
            K::SingleDataSwap => Self::SingleDataSwap {
                quantity: op_code.get_bit(22).into(),
                rn: register_at(op_code, 16),
                rd: register_at(op_code, 12),
                rm: register_at(op_code, 0),
            },
            K::BranchAndExchange => Self::BranchAndExchange {
                register: register_at(op_code, 0),
            },
            K::HalfwordDataTransferRegister | K::HalfwordDataTransferImmediate => {
                let Some(transfer_kind) = HalfwordTransferKind::from_sh(op_code.get_bits(5..=6))
                else {
                    return Ok(Self::Unimplemented(K::Undefined));
                };

                let offset_kind = if kind == K::HalfwordDataTransferImmediate {
                    HalfwordDataTransferOffsetKind::Immediate {
                        offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                    }
                } else {
                    HalfwordDataTransferOffsetKind::Register {
                        register: register_at(op_code, 0),
                    }
                };

                Self::HalfwordDataTransfer {
                    indexing: op_code.get_bit(24).into(),
                    offsetting: op_code.get_bit(23).into(),
                    write_back: op_code.get_bit(21),
                    load_store: op_code.get_bit(20).into(),
                    offset_kind,
                    base_register: register_at(op_code, 16),
                    source_destination_register: register_at(op_code, 12),
                    transfer_kind,
                }
            }
            K::SingleDataTransfer => {
                // I bit set means register offset here, the opposite of data processing.
                let offset_info = if op_code.get_bit(25) {
                    SingleDataTransferOffsetInfo::RegisterImmediate {
                        shift_amount: op_code.get_bits(7..=11),
                        shift_kind: ShiftKind::try_from(op_code.get_bits(5..=6))?,
                        reg_offset: register_at(op_code, 0),
                    }
                } else {
                    SingleDataTransferOffsetInfo::Immediate {
                        offset: op_code.get_bits(0..=11),
                    }
                };

                Self::SingleDataTransfer {
                    load_store: op_code.get_bit(20).into(),
                    quantity: op_code.get_bit(22).into(),
                    write_back: op_code.get_bit(21),
                    indexing: op_code.get_bit(24).into(),
                    rd: register_at(op_code, 12),
                    base_register: register_at(op_code, 16),
                    offset_info,
                    offsetting: op_code.get_bit(23).into(),
                }
            }
            K::BlockDataTransfer => Self::BlockDataTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: register_at(op_code, 16),
                register_list: op_code.get_bits(0..=15) as u16,
            },
            K::Branch => Self::Branch {
                link: op_code.get_bit(24),
                offset: (op_code.get_bits(0..=23) << 2).sign_extended(26) as i32,
                base: BranchBase::ProgramCounter,
            },
            K::SoftwareInterrupt => Self::SoftwareInterrupt,
            K::CoprocessorDataTransfer
            | K::CoprocessorDataOperation
            | K::CoprocessorRegisterTransfer
            | K::Undefined => Self::Unimplemented(kind),
        })
    }

    /// Bits 11-0 with the I flag at bit 25.
    fn decode_operand2(op_code: u32) -> Result<AluSecondOperandInfo, CpuError> {
        if op_code.get_bit(25) {
            return Ok(AluSecondOperandInfo::Immediate {
                base: op_code.get_bits(0..=7),
                shift: op_code.get_bits(8..=11) * 2,
            });
        }

        let shift_op = if op_code.get_bit(4) {
            ShiftOperator::Register(register_at(op_code, 8))
        } else {
            ShiftOperator::Immediate(op_code.get_bits(7..=11))
        };

        Ok(AluSecondOperandInfo::Register {
            shift_op,
            shift_kind: ShiftKind::try_from(op_code.get_bits(5..=6))?,
            register: register_at(op_code, 0),
        })
    }
}

impl std::fmt::Display for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProcessing(DataProcessingArgs {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            }) => {
                let s = if *set_conditions { "S" } else { "" };
                if alu_instruction.is_test() {
                    write!(f, "{alu_instruction} R{rn}, {op2}")
                } else if matches!(
                    alu_instruction,
                    ArmModeAluInstruction::Mov | ArmModeAluInstruction::Mvn
                ) {
                    write!(f, "{alu_instruction}{s} R{destination}, {op2}")
                } else {
                    write!(f, "{alu_instruction}{s} R{destination}, R{rn}, {op2}")
                }
            }
            Self::PsrTransferOut {
                psr_kind,
                destination,
            } => write!(f, "MRS R{destination}, {psr_kind}"),
            Self::PsrTransferIn {
                psr_kind,
                field_mask,
                operand,
            } => {
                let fields = match (field_mask.flags, field_mask.control) {
                    (true, true) => "_fc",
                    (true, false) => "_f",
                    (false, true) => "_c",
                    (false, false) => "",
                };
                write!(f, "MSR {psr_kind}{fields}, {operand}")
            }
            Self::Multiply {
                variant,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => {
                let s = if *set_conditions { "S" } else { "" };
                match variant {
                    ArmModeMultiplyVariant::Mul => write!(f, "MUL{s} R{rd}, R{rm}, R{rs}"),
                    ArmModeMultiplyVariant::Mla => {
                        write!(f, "MLA{s} R{rd}, R{rm}, R{rs}, R{rn}")
                    }
                }
            }
            Self::MultiplyLong {
                variant,
                set_conditions,
                rdhi,
                rdlo,
                rs,
                rm,
            } => {
                let s = if *set_conditions { "S" } else { "" };
                write!(f, "{variant}{s} R{rdlo}, R{rdhi}, R{rm}, R{rs}")
            }
            Self::SingleDataSwap {
                quantity,
                rn,
                rd,
                rm,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                write!(f, "SWP{b} R{rd}, R{rm}, [R{rn}]")
            }
            Self::BranchAndExchange { register } => write!(f, "BX R{register}"),
            Self::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => {
                let op = match (load_store, transfer_kind) {
                    (LoadStoreKind::Store, _) => "STRH",
                    (LoadStoreKind::Load, HalfwordTransferKind::UnsignedHalfwords) => "LDRH",
                    (LoadStoreKind::Load, HalfwordTransferKind::SignedByte) => "LDRSB",
                    (LoadStoreKind::Load, HalfwordTransferKind::SignedHalfwords) => "LDRSH",
                };
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                let offset = match offset_kind {
                    HalfwordDataTransferOffsetKind::Immediate { offset } => format!("#{sign}{offset}"),
                    HalfwordDataTransferOffsetKind::Register { register } => {
                        format!("{sign}R{register}")
                    }
                };
                write_address(
                    f,
                    &format!("{op} R{source_destination_register}"),
                    *base_register,
                    &offset,
                    *indexing,
                    *write_back,
                )
            }
            Self::SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => {
                let op = if *load_store == LoadStoreKind::Load { "LDR" } else { "STR" };
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                write_address(
                    f,
                    &format!("{op}{b} R{rd}"),
                    *base_register,
                    &format!("{sign}{offset_info}"),
                    *indexing,
                    *write_back,
                )
            }
            Self::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => {
                let op = if *load_store == LoadStoreKind::Load { "LDM" } else { "STM" };
                let mode = match (offsetting, indexing) {
                    (Offsetting::Up, Indexing::Post) => "IA",
                    (Offsetting::Up, Indexing::Pre) => "IB",
                    (Offsetting::Down, Indexing::Post) => "DA",
                    (Offsetting::Down, Indexing::Pre) => "DB",
                };
                let w = if *write_back { "!" } else { "" };
                let user = if *load_psr { "^" } else { "" };
                let registers = (0..16_u8)
                    .filter(|r| register_list.get_bit(*r))
                    .map(|r| format!("R{r}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{op}{mode} R{rn}{w}, {{{registers}}}{user}")
            }
            Self::Branch { link, offset, base } => {
                let l = if *link { "L" } else { "" };
                match base {
                    BranchBase::ProgramCounter => write!(f, "B{l} PC{offset:+}"),
                    BranchBase::LinkRegister => write!(f, "B{l} LR{offset:+}"),
                }
            }
            Self::SoftwareInterrupt => f.write_str("SWI"),
            Self::Unimplemented(kind) => write!(f, "<{kind}>"),
        }
    }
}

fn write_address(
    f: &mut std::fmt::Formatter<'_>,
    prefix: &str,
    base: usize,
    offset: &str,
    indexing: Indexing,
    write_back: bool,
) -> std::fmt::Result {
    match indexing {
        Indexing::Pre => {
            let w = if write_back { "!" } else { "" };
            write!(f, "{prefix}, [R{base}, {offset}]{w}")
        }
        Indexing::Post => write!(f, "{prefix}, [R{base}], {offset}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(kind: ArmInstructionKind, words: &[u32]) {
        for word in words {
            assert_eq!(ArmInstructionKind::from(*word), kind, "0x{word:08X}");
        }
    }

    #[test]
    fn decode_data_processing() {
        check(ArmInstructionKind::DataProcessing, &[0x0000_0000, 0xF3FF_FFFF]);
    }

    #[test]
    fn decode_psr_transfer_out() {
        check(
            ArmInstructionKind::ProgramStatusRegisterTransferOut,
            &[
                0x010F_0000,
                0x014F_0000,
                0xF10F_0000,
                0xF10F_F000,
                0xF14F_0000,
                0xF14F_F000,
            ],
        );
    }

    #[test]
    fn decode_psr_transfer_in() {
        check(
            ArmInstructionKind::ProgramStatusRegisterTransferIn,
            &[
                0x0129_F000,
                0x0129_F00F,
                0x0169_F000,
                0x0169_F00F,
                0xF129_F000,
                0xF129_F00F,
                0xF169_F000,
                0xF169_F00F,
                0x0128_F000,
                0x0128_FFFF,
                0x0168_F000,
                0x0328_F000,
                0x0328_FFFF,
                0x0368_F000,
                0x0368_FFFF,
                // Control only, and flags plus control from an immediate.
                0xE121_F000,
                0xE329_F01F,
                0xE361_F010,
            ],
        );
    }

    #[test]
    fn decode_test_op_without_s_is_unimplemented() {
        // TEQ R1, R0 with S clear, with a field that is neither MRS nor MSR.
        let word = 0xE121_0000;
        assert_eq!(ArmInstructionKind::from(word), ArmInstructionKind::DataProcessing);
        assert_eq!(
            ArmModeInstruction::decode(ArmInstructionKind::DataProcessing, word),
            Ok(ArmModeInstruction::Unimplemented(ArmInstructionKind::DataProcessing))
        );
    }

    #[test]
    fn decode_msr_control_only() {
        let instruction = ArmModeInstruction::decode(
            ArmInstructionKind::ProgramStatusRegisterTransferIn,
            0xE121_F000,
        )
        .unwrap();
        assert_eq!(
            instruction,
            ArmModeInstruction::PsrTransferIn {
                psr_kind: PsrKind::Cpsr,
                field_mask: PsrFieldMask {
                    flags: false,
                    control: true,
                },
                operand: AluSecondOperandInfo::register(0),
            }
        );
    }

    #[test]
    fn decode_multiply() {
        check(ArmInstructionKind::Multiply, &[0x0000_0090, 0xF03F_FF9F]);
        check(ArmInstructionKind::MultiplyLong, &[0x0080_0090, 0xF0FF_FF9F]);
    }

    #[test]
    fn decode_swap_and_branch_exchange() {
        check(ArmInstructionKind::SingleDataSwap, &[0x0100_0090, 0xF14F_F09F]);
        check(ArmInstructionKind::BranchAndExchange, &[0x012F_FF10, 0xF12F_FF1F]);
    }

    #[test]
    fn decode_halfword() {
        check(
            ArmInstructionKind::HalfwordDataTransferRegister,
            &[
                0x0000_00B0,
                0x0000_00D0,
                0x0000_00F0,
                0xF1BF_F0BF,
                0xF1BF_F0DF,
                0xF1BF_F0FF,
            ],
        );
        check(
            ArmInstructionKind::HalfwordDataTransferImmediate,
            &[
                0x0040_00B0,
                0x0040_00D0,
                0x0040_00F0,
                0xF1FF_FFBF,
                0xF1FF_FFDF,
                0xF1FF_FFFF,
            ],
        );
    }

    #[test]
    fn decode_transfers_and_branches() {
        check(
            ArmInstructionKind::SingleDataTransfer,
            &[
                0x0400_0000,
                0x0400_0010,
                0x0500_0000,
                0x0500_0010,
                0x0600_0000,
                0x0700_0000,
                0xF7FF_FFEF,
            ],
        );
        check(ArmInstructionKind::BlockDataTransfer, &[0x0800_0000, 0xF9FF_FFFF]);
        check(ArmInstructionKind::Branch, &[0x0A00_0000, 0xFBFF_FFFF]);
    }

    #[test]
    fn decode_coprocessor_swi_undefined() {
        check(ArmInstructionKind::CoprocessorDataTransfer, &[0x0C00_0000, 0xFDFF_FFFF]);
        check(ArmInstructionKind::CoprocessorDataOperation, &[0x0E00_0000, 0xFEFF_FFEF]);
        check(ArmInstructionKind::CoprocessorRegisterTransfer, &[0x0E00_0010, 0xFEFF_FFFF]);
        check(ArmInstructionKind::SoftwareInterrupt, &[0x0F00_0000, 0xFFFF_FFFF]);
        check(ArmInstructionKind::Undefined, &[0x0600_0010, 0xF7FF_FFFF]);
    }

    #[test]
    fn decode_add_with_shifted_register() {
        // ADD R0, R1, R2, LSL #3
        let op_code = 0b1110_00_0_0100_0_0001_0000_00011_00_0_0010;
        let instruction =
            ArmModeInstruction::decode(ArmInstructionKind::from(op_code), op_code).unwrap();

        assert_eq!(
            instruction,
            ArmModeInstruction::DataProcessing(DataProcessingArgs {
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: false,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(3),
                    shift_kind: ShiftKind::Lsl,
                    register: 2,
                },
            })
        );
        assert_eq!(instruction.to_string(), "ADD R0, R1, R2, LSL #3");
    }

    #[test]
    fn decode_branch_offset() {
        // B -8 (branch to self)
        let instruction = ArmModeInstruction::decode(ArmInstructionKind::Branch, 0xEAFF_FFFE).unwrap();
        assert_eq!(
            instruction,
            ArmModeInstruction::Branch {
                link: false,
                offset: -8,
                base: BranchBase::ProgramCounter,
            }
        );

        let instruction = ArmModeInstruction::decode(ArmInstructionKind::Branch, 0xEB00_0010).unwrap();
        assert_eq!(
            instruction,
            ArmModeInstruction::Branch {
                link: true,
                offset: 0x40,
                base: BranchBase::ProgramCounter,
            }
        );
    }

    #[test]
    fn decode_msr_fields() {
        let instruction = ArmModeInstruction::decode(
            ArmInstructionKind::ProgramStatusRegisterTransferIn,
            0xE329_F01F,
        )
        .unwrap();
        assert_eq!(
            instruction,
            ArmModeInstruction::PsrTransferIn {
                psr_kind: PsrKind::Cpsr,
                field_mask: PsrFieldMask {
                    flags: true,
                    control: true,
                },
                operand: AluSecondOperandInfo::Immediate { base: 0x1F, shift: 0 },
            }
        );
        assert_eq!(instruction.to_string(), "MSR CPSR_fc, #31");
    }

    #[test]
    fn decode_block_transfer_display() {
        let instruction =
            ArmModeInstruction::decode(ArmInstructionKind::BlockDataTransfer, 0xE92D_4025).unwrap();
        assert_eq!(instruction.to_string(), "STMDB R13!, {R0, R2, R5, R14}");
    }

    #[test]
    fn coprocessor_is_unimplemented() {
        let instruction =
            ArmModeInstruction::decode(ArmInstructionKind::CoprocessorDataOperation, 0xEE00_0000)
                .unwrap();
        assert_eq!(
            instruction,
            ArmModeInstruction::Unimplemented(ArmInstructionKind::CoprocessorDataOperation)
        );
    }
}
