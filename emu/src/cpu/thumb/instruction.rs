//! # Thumb Instruction Decoding
//!
//! Thumb instructions are grouped into 19 formats, identified by their high bits:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Thumb Instruction Formats                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Format 1:  000 xx          Move shifted register                       │
//! │  Format 2:  00011           Add/subtract                                │
//! │  Format 3:  001 xx          Move/compare/add/subtract immediate         │
//! │  Format 4:  010000          ALU operations                              │
//! │  Format 5:  010001          Hi register operations / BX                 │
//! │  Format 6:  01001           PC-relative load                            │
//! │  Format 7:  0101 xx0        Load/store with register offset             │
//! │  Format 8:  0101 xx1        Load/store sign-extended byte/halfword      │
//! │  Format 9:  011 xx          Load/store with immediate offset            │
//! │  Format 10: 1000 x          Load/store halfword                         │
//! │  Format 11: 1001 x          SP-relative load/store                      │
//! │  Format 12: 1010 x          Load address                                │
//! │  Format 13: 10110000        Add offset to stack pointer                 │
//! │  Format 14: 1011 x10x       Push/pop registers                          │
//! │  Format 15: 1100 x          Multiple load/store                         │
//! │  Format 16: 1101 xxxx       Conditional branch                          │
//! │  Format 17: 11011111        Software interrupt                          │
//! │  Format 18: 11100           Unconditional branch                        │
//! │  Format 19: 1111 x          Long branch with link                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Format 2 sits inside format 1's space and format 17 inside format 16's,
//! so both are tested first. A conditional branch with condition `1110` and
//! anything matching no format is undefined.
//!
//! ## Long Branch (BL)
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{
    Operation, ThumbHighRegisterOperation, ThumbModeAluInstruction,
};
use crate::error::CpuError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThumbInstructionKind {
    MoveShiftedRegister,
    AddSubtract,
    MoveCompareAddSubtractImm,
    AluOp,
    HiRegisterOpBX,
    PCRelativeLoad,
    LoadStoreRegisterOffset,
    LoadStoreSignExtByteHalfword,
    LoadStoreImmOffset,
    LoadStoreHalfword,
    SPRelativeLoadStore,
    LoadAddress,
    AddOffsetSP,
    PushPopReg,
    MultipleLoadStore,
    CondBranch,
    Swi,
    UncondBranch,
    LongBranchLink,
    Undefined,
}

impl std::fmt::Display for ThumbInstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl From<u16> for ThumbInstructionKind {
    fn from(op_code: u16) -> Self {
        const TABLE: [(u16, u16, ThumbInstructionKind); 19] = [
            (0xF800, 0x1800, ThumbInstructionKind::AddSubtract),
            (0xE000, 0x0000, ThumbInstructionKind::MoveShiftedRegister),
            (0xE000, 0x2000, ThumbInstructionKind::MoveCompareAddSubtractImm),
            (0xFC00, 0x4000, ThumbInstructionKind::AluOp),
            (0xFC00, 0x4400, ThumbInstructionKind::HiRegisterOpBX),
            (0xF800, 0x4800, ThumbInstructionKind::PCRelativeLoad),
            (0xF200, 0x5000, ThumbInstructionKind::LoadStoreRegisterOffset),
            (0xF200, 0x5200, ThumbInstructionKind::LoadStoreSignExtByteHalfword),
            (0xE000, 0x6000, ThumbInstructionKind::LoadStoreImmOffset),
            (0xF000, 0x8000, ThumbInstructionKind::LoadStoreHalfword),
            (0xF000, 0x9000, ThumbInstructionKind::SPRelativeLoadStore),
            (0xF000, 0xA000, ThumbInstructionKind::LoadAddress),
            (0xFF00, 0xB000, ThumbInstructionKind::AddOffsetSP),
            (0xF600, 0xB400, ThumbInstructionKind::PushPopReg),
            (0xF000, 0xC000, ThumbInstructionKind::MultipleLoadStore),
            (0xFF00, 0xDF00, ThumbInstructionKind::Swi),
            (0xF000, 0xD000, ThumbInstructionKind::CondBranch),
            (0xF800, 0xE000, ThumbInstructionKind::UncondBranch),
            (0xF000, 0xF000, ThumbInstructionKind::LongBranchLink),
        ];

        let kind = TABLE
            .iter()
            .find(|(mask, value, _)| op_code & mask == *value)
            .map_or(Self::Undefined, |(_, _, kind)| *kind);

        // Condition AL has no meaning for a Thumb conditional branch.
        if kind == Self::CondBranch && op_code.get_bits(8..=11) == 0b1110 {
            return Self::Undefined;
        }

        kind
    }
}

/// The fields of a decoded Thumb instruction. Register fields are indices.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ThumbModeInstruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u32,
        source_register: usize,
        destination_register: usize,
    },
    AddSubtract {
        operand_kind: OperandKind,
        subtract: bool,
        rn_offset3: u32,
        source_register: usize,
        destination_register: usize,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: usize,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
        source_register: usize,
        destination_register: usize,
    },
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        source_register: usize,
        destination_register: usize,
    },
    PCRelativeLoad {
        destination_register: usize,
        word8: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset_register: usize,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreSignExtByteHalfword {
        h: bool,
        sign_extend: bool,
        offset_register: usize,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset5: u32,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset5: u32,
        base_register: usize,
        source_destination_register: usize,
    },
    SPRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: usize,
        word8: u32,
    },
    LoadAddress {
        sp: bool,
        destination_register: usize,
        word8: u32,
    },
    AddOffsetSP {
        negative: bool,
        word7: u32,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: usize,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        /// Byte offset, sign-extended and doubled.
        offset: i32,
    },
    Swi {
        comment: u8,
    },
    UncondBranch {
        /// Byte offset, sign-extended and doubled.
        offset: i32,
    },
    LongBranchLink {
        /// `false` for the first half (high offset bits).
        h: bool,
        offset11: u32,
    },
}

fn low_register(op_code: u16, lsb: u8) -> usize {
    op_code.get_bits(lsb..=lsb + 2) as usize
}

impl ThumbModeInstruction {
    /// # Errors
    ///
    /// [`CpuError::UndefinedThumb`] for [`ThumbInstructionKind::Undefined`].
    #[allow(clippy::too_many_lines)]
    pub fn decode(kind: ThumbInstructionKind, op_code: u16) -> Result<Self, CpuError> {
        use ThumbInstructionKind as K;

        let raw = u32::from(op_code);

        Ok(match kind {
            K::MoveShiftedRegister => Self::MoveShiftedRegister {
                shift_operation: ShiftKind::try_from(raw.get_bits(11..=12))?,
                offset5: raw.get_bits(6..=10),
                source_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            K::AddSubtract => Self::AddSubtract {
                operand_kind: op_code.get_bit(10).into(),
                subtract: op_code.get_bit(9),
                rn_offset3: raw.get_bits(6..=8),
                source_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            K::MoveCompareAddSubtractImm => Self::MoveCompareAddSubtractImm {
                operation: op_code.get_bits(11..=12).into(),
                destination_register: low_register(op_code, 8),
                offset: raw.get_bits(0..=7),
            },
            K::AluOp => Self::AluOp {
                alu_operation: op_code.get_bits(6..=9).into(),
                source_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            K::HiRegisterOpBX => {
                let h1 = usize::from(op_code.get_bit(7)) << 3;
                Self::HiRegisterOpBX {
                    register_operation: op_code.get_bits(8..=9).into(),
                    source_register: op_code.get_bits(3..=6) as usize,
                    destination_register: low_register(op_code, 0) | h1,
                }
            }
            K::PCRelativeLoad => Self::PCRelativeLoad {
                destination_register: low_register(op_code, 8),
                word8: raw.get_bits(0..=7),
            },
            K::LoadStoreRegisterOffset => Self::LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(10).into(),
                offset_register: low_register(op_code, 6),
                base_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            K::LoadStoreSignExtByteHalfword => Self::LoadStoreSignExtByteHalfword {
                h: op_code.get_bit(11),
                sign_extend: op_code.get_bit(10),
                offset_register: low_register(op_code, 6),
                base_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            K::LoadStoreImmOffset => Self::LoadStoreImmOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(12).into(),
                offset5: raw.get_bits(6..=10),
                base_register: low_register(op_code, 3),
                destination_register: low_register(op_code, 0),
            },
            K::LoadStoreHalfword => Self::LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset5: raw.get_bits(6..=10),
                base_register: low_register(op_code, 3),
                source_destination_register: low_register(op_code, 0),
            },
            K::SPRelativeLoadStore => Self::SPRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                destination_register: low_register(op_code, 8),
                word8: raw.get_bits(0..=7),
            },
            K::LoadAddress => Self::LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: low_register(op_code, 8),
                word8: raw.get_bits(0..=7),
            },
            K::AddOffsetSP => Self::AddOffsetSP {
                negative: op_code.get_bit(7),
                word7: raw.get_bits(0..=6),
            },
            K::PushPopReg => Self::PushPopReg {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            },
            K::MultipleLoadStore => Self::MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                base_register: low_register(op_code, 8),
                register_list: op_code.get_bits(0..=7),
            },
            K::CondBranch => Self::CondBranch {
                condition: Condition::try_from(raw.get_bits(8..=11))?,
                offset: (raw.get_bits(0..=7) << 1).sign_extended(9) as i32,
            },
            K::Swi => Self::Swi {
                comment: op_code.get_bits(0..=7) as u8,
            },
            K::UncondBranch => Self::UncondBranch {
                offset: (raw.get_bits(0..=10) << 1).sign_extended(12) as i32,
            },
            K::LongBranchLink => Self::LongBranchLink {
                h: op_code.get_bit(11),
                offset11: raw.get_bits(0..=10),
            },
            K::Undefined => return Err(CpuError::UndefinedThumb { raw: op_code }),
        })
    }
}

fn register_list_to_string(register_list: u16) -> String {
    (0..16_u8)
        .filter(|r| register_list.get_bit(*r))
        .map(|r| match r {
            14 => "LR".to_string(),
            15 => "PC".to_string(),
            _ => format!("R{r}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for ThumbModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => write!(
                f,
                "{shift_operation} R{destination_register}, R{source_register}, #{offset5}"
            ),
            Self::AddSubtract {
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                let op = if subtract { "SUB" } else { "ADD" };
                match operand_kind {
                    OperandKind::Immediate => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, #{rn_offset3}"
                    ),
                    OperandKind::Register => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, R{rn_offset3}"
                    ),
                }
            }
            Self::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => write!(f, "{operation} R{destination_register}, #{offset}"),
            Self::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => write!(f, "{alu_operation} R{destination_register}, R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => match register_operation {
                ThumbHighRegisterOperation::Bx => write!(f, "BX R{source_register}"),
                _ => write!(
                    f,
                    "{register_operation} R{destination_register}, R{source_register}"
                ),
            },
            Self::PCRelativeLoad {
                destination_register,
                word8,
            } => write!(f, "LDR R{destination_register}, [PC, #{}]", word8 << 2),
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                destination_register,
            } => {
                let op = if load_store == LoadStoreKind::Load { "LDR" } else { "STR" };
                let b = if byte_word == ReadWriteKind::Byte { "B" } else { "" };
                write!(
                    f,
                    "{op}{b} R{destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreSignExtByteHalfword {
                h,
                sign_extend,
                offset_register,
                base_register,
                destination_register,
            } => {
                let op = match (sign_extend, h) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                };
                write!(
                    f,
                    "{op} R{destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset5,
                base_register,
                destination_register,
            } => {
                let op = if load_store == LoadStoreKind::Load { "LDR" } else { "STR" };
                let (b, offset) = match byte_word {
                    ReadWriteKind::Byte => ("B", offset5),
                    ReadWriteKind::Word => ("", offset5 << 2),
                };
                write!(
                    f,
                    "{op}{b} R{destination_register}, [R{base_register}, #{offset}]"
                )
            }
            Self::LoadStoreHalfword {
                load_store,
                offset5,
                base_register,
                source_destination_register,
            } => {
                let op = if load_store == LoadStoreKind::Load { "LDRH" } else { "STRH" };
                write!(
                    f,
                    "{op} R{source_destination_register}, [R{base_register}, #{}]",
                    offset5 << 1
                )
            }
            Self::SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => {
                let op = if load_store == LoadStoreKind::Load { "LDR" } else { "STR" };
                write!(f, "{op} R{destination_register}, [SP, #{}]", word8 << 2)
            }
            Self::LoadAddress {
                sp,
                destination_register,
                word8,
            } => {
                let base = if sp { "SP" } else { "PC" };
                write!(f, "ADD R{destination_register}, {base}, #{}", word8 << 2)
            }
            Self::AddOffsetSP { negative, word7 } => {
                let sign = if negative { "-" } else { "" };
                write!(f, "ADD SP, #{sign}{}", word7 << 2)
            }
            Self::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => match load_store {
                LoadStoreKind::Store => {
                    let list = register_list | (u16::from(pc_lr) << 14);
                    write!(f, "PUSH {{{}}}", register_list_to_string(list))
                }
                LoadStoreKind::Load => {
                    let list = register_list | (u16::from(pc_lr) << 15);
                    write!(f, "POP {{{}}}", register_list_to_string(list))
                }
            },
            Self::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => {
                let op = if load_store == LoadStoreKind::Load { "LDMIA" } else { "STMIA" };
                write!(
                    f,
                    "{op} R{base_register}!, {{{}}}",
                    register_list_to_string(register_list)
                )
            }
            Self::CondBranch { condition, offset } => write!(f, "B{condition} PC{offset:+}"),
            Self::Swi { comment } => write!(f, "SWI #{comment}"),
            Self::UncondBranch { offset } => write!(f, "B PC{offset:+}"),
            Self::LongBranchLink { h, offset11 } => {
                if h {
                    write!(f, "BL LR+{}", offset11 << 1)
                } else {
                    write!(f, "BL PC{:+}", (offset11 << 12).sign_extended(23) as i32)
                }
            }
        }
    }
}
