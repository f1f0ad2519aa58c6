//! Thumb instructions run as their ARM equivalents.
//!
//! Every format has a 32-bit counterpart with the same register and flag
//! behaviour, so [`ThumbModeOpcode::translate`] rewrites the decoded fields
//! into an [`ArmModeOpcode`] and the ARM handlers do the work. The few Thumb
//! specific details (PC word alignment in format 6 and 12, the split BL) are
//! folded into the operands here.

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, ShiftOperator,
};
use crate::cpu::arm::instructions::{
    ArmModeInstruction, ArmModeMultiplyVariant, BranchBase, DataProcessingArgs,
    SingleDataTransferOffsetInfo,
};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, OperandKind,
    Offsetting, ReadWriteKind, ShiftKind,
};
use crate::cpu::register_bank::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{
    Operation, ThumbHighRegisterOperation, ThumbModeAluInstruction,
};
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::cpu::thumb::mode::ThumbModeOpcode;

const fn data_processing(
    alu_instruction: ArmModeAluInstruction,
    set_conditions: bool,
    rn: usize,
    destination: usize,
    op2: AluSecondOperandInfo,
) -> ArmModeInstruction {
    ArmModeInstruction::DataProcessing(DataProcessingArgs {
        alu_instruction,
        set_conditions,
        rn,
        destination,
        op2,
    })
}

const fn word_transfer(
    load_store: LoadStoreKind,
    quantity: ReadWriteKind,
    rd: usize,
    base_register: usize,
    offset_info: SingleDataTransferOffsetInfo,
    offsetting: Offsetting,
) -> ArmModeInstruction {
    ArmModeInstruction::SingleDataTransfer {
        load_store,
        quantity,
        write_back: false,
        indexing: Indexing::Pre,
        rd,
        base_register,
        offset_info,
        offsetting,
    }
}

const fn halfword_transfer(
    load_store: LoadStoreKind,
    transfer_kind: HalfwordTransferKind,
    offset_kind: HalfwordDataTransferOffsetKind,
    base_register: usize,
    source_destination_register: usize,
) -> ArmModeInstruction {
    ArmModeInstruction::HalfwordDataTransfer {
        indexing: Indexing::Pre,
        offsetting: Offsetting::Up,
        write_back: false,
        load_store,
        offset_kind,
        base_register,
        source_destination_register,
        transfer_kind,
    }
}

impl ThumbModeOpcode {
    /// Rewrites this instruction as the ARM instruction with the same effect.
    ///
    /// `pc` is the address of this instruction; formats that read a
    /// word-aligned PC need bit 1 of it.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn translate(&self, pc: u32) -> ArmModeOpcode {
        use ThumbModeInstruction as T;

        let raw = u32::from(self.raw);

        let instruction = match self.instruction {
            T::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => data_processing(
                ArmModeAluInstruction::Mov,
                true,
                0,
                destination_register,
                AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(offset5),
                    shift_kind: shift_operation,
                    register: source_register,
                },
            ),
            T::AddSubtract {
                operand_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                let op2 = match operand_kind {
                    OperandKind::Immediate => AluSecondOperandInfo::immediate(rn_offset3),
                    OperandKind::Register => AluSecondOperandInfo::register(rn_offset3 as usize),
                };
                let alu = if subtract {
                    ArmModeAluInstruction::Sub
                } else {
                    ArmModeAluInstruction::Add
                };
                data_processing(alu, true, source_register, destination_register, op2)
            }
            T::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => {
                let alu = match operation {
                    Operation::Mov => ArmModeAluInstruction::Mov,
                    Operation::Cmp => ArmModeAluInstruction::Cmp,
                    Operation::Add => ArmModeAluInstruction::Add,
                    Operation::Sub => ArmModeAluInstruction::Sub,
                };
                data_processing(
                    alu,
                    true,
                    destination_register,
                    destination_register,
                    AluSecondOperandInfo::immediate(offset),
                )
            }
            T::AluOp {
                alu_operation,
                source_register: rs,
                destination_register: rd,
            } => Self::translate_alu(alu_operation, rs, rd),
            T::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => {
                let op2 = AluSecondOperandInfo::register(source_register);
                match register_operation {
                    ThumbHighRegisterOperation::Add => data_processing(
                        ArmModeAluInstruction::Add,
                        false,
                        destination_register,
                        destination_register,
                        op2,
                    ),
                    ThumbHighRegisterOperation::Cmp => data_processing(
                        ArmModeAluInstruction::Cmp,
                        true,
                        destination_register,
                        destination_register,
                        op2,
                    ),
                    ThumbHighRegisterOperation::Mov => data_processing(
                        ArmModeAluInstruction::Mov,
                        false,
                        0,
                        destination_register,
                        op2,
                    ),
                    ThumbHighRegisterOperation::Bx => ArmModeInstruction::BranchAndExchange {
                        register: source_register,
                    },
                }
            }
            T::PCRelativeLoad {
                destination_register,
                word8,
            } => {
                // Address is ((PC + 4) & !2) + word8 * 4.
                let offset = word8 << 2;
                let align = pc & 2;
                let (offsetting, amount) = if offset >= align {
                    (Offsetting::Up, offset - align)
                } else {
                    (Offsetting::Down, align - offset)
                };
                word_transfer(
                    LoadStoreKind::Load,
                    ReadWriteKind::Word,
                    destination_register,
                    REG_PROGRAM_COUNTER,
                    SingleDataTransferOffsetInfo::Immediate { offset: amount },
                    offsetting,
                )
            }
            T::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                destination_register,
            } => word_transfer(
                load_store,
                byte_word,
                destination_register,
                base_register,
                SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: 0,
                    shift_kind: ShiftKind::Lsl,
                    reg_offset: offset_register,
                },
                Offsetting::Up,
            ),
            T::LoadStoreSignExtByteHalfword {
                h,
                sign_extend,
                offset_register,
                base_register,
                destination_register,
            } => {
                let (load_store, transfer_kind) = match (sign_extend, h) {
                    (false, false) => (LoadStoreKind::Store, HalfwordTransferKind::UnsignedHalfwords),
                    (false, true) => (LoadStoreKind::Load, HalfwordTransferKind::UnsignedHalfwords),
                    (true, false) => (LoadStoreKind::Load, HalfwordTransferKind::SignedByte),
                    (true, true) => (LoadStoreKind::Load, HalfwordTransferKind::SignedHalfwords),
                };
                halfword_transfer(
                    load_store,
                    transfer_kind,
                    HalfwordDataTransferOffsetKind::Register {
                        register: offset_register,
                    },
                    base_register,
                    destination_register,
                )
            }
            T::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset5,
                base_register,
                destination_register,
            } => {
                let offset = match byte_word {
                    ReadWriteKind::Word => offset5 << 2,
                    ReadWriteKind::Byte => offset5,
                };
                word_transfer(
                    load_store,
                    byte_word,
                    destination_register,
                    base_register,
                    SingleDataTransferOffsetInfo::Immediate { offset },
                    Offsetting::Up,
                )
            }
            T::LoadStoreHalfword {
                load_store,
                offset5,
                base_register,
                source_destination_register,
            } => halfword_transfer(
                load_store,
                HalfwordTransferKind::UnsignedHalfwords,
                HalfwordDataTransferOffsetKind::Immediate {
                    offset: offset5 << 1,
                },
                base_register,
                source_destination_register,
            ),
            T::SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => word_transfer(
                load_store,
                ReadWriteKind::Word,
                destination_register,
                REG_SP,
                SingleDataTransferOffsetInfo::Immediate { offset: word8 << 2 },
                Offsetting::Up,
            ),
            T::LoadAddress {
                sp,
                destination_register,
                word8,
            } => {
                let (rn, offset) = if sp {
                    (REG_SP, word8 << 2)
                } else {
                    // PC reads as PC + 4 here and bit 1 is forced to 0.
                    (REG_PROGRAM_COUNTER, (word8 << 2).wrapping_sub(pc & 2))
                };
                data_processing(
                    ArmModeAluInstruction::Add,
                    false,
                    rn,
                    destination_register,
                    AluSecondOperandInfo::immediate(offset),
                )
            }
            T::AddOffsetSP { negative, word7 } => {
                let alu = if negative {
                    ArmModeAluInstruction::Sub
                } else {
                    ArmModeAluInstruction::Add
                };
                data_processing(
                    alu,
                    false,
                    REG_SP,
                    REG_SP,
                    AluSecondOperandInfo::immediate(word7 << 2),
                )
            }
            T::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => match load_store {
                LoadStoreKind::Store => ArmModeInstruction::BlockDataTransfer {
                    indexing: Indexing::Pre,
                    offsetting: Offsetting::Down,
                    load_psr: false,
                    write_back: true,
                    load_store,
                    rn: REG_SP,
                    register_list: register_list | (u16::from(pc_lr) << REG_LR),
                },
                LoadStoreKind::Load => ArmModeInstruction::BlockDataTransfer {
                    indexing: Indexing::Post,
                    offsetting: Offsetting::Up,
                    load_psr: false,
                    write_back: true,
                    load_store,
                    rn: REG_SP,
                    register_list: register_list | (u16::from(pc_lr) << REG_PROGRAM_COUNTER),
                },
            },
            T::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => ArmModeInstruction::BlockDataTransfer {
                indexing: Indexing::Post,
                offsetting: Offsetting::Up,
                load_psr: false,
                write_back: true,
                load_store,
                rn: base_register,
                register_list,
            },
            T::CondBranch { condition, offset } => {
                return ArmModeOpcode {
                    instruction: ArmModeInstruction::Branch {
                        link: false,
                        offset,
                        base: BranchBase::ProgramCounter,
                    },
                    condition,
                    raw,
                };
            }
            T::Swi { .. } => ArmModeInstruction::SoftwareInterrupt,
            T::UncondBranch { offset } => ArmModeInstruction::Branch {
                link: false,
                offset,
                base: BranchBase::ProgramCounter,
            },
            T::LongBranchLink { h: false, offset11 } => data_processing(
                ArmModeAluInstruction::Add,
                false,
                REG_PROGRAM_COUNTER,
                REG_LR,
                AluSecondOperandInfo::immediate((offset11 << 12).sign_extended(23)),
            ),
            T::LongBranchLink { h: true, offset11 } => ArmModeInstruction::Branch {
                link: true,
                offset: (offset11 << 1) as i32,
                base: BranchBase::LinkRegister,
            },
        };

        ArmModeOpcode::always(instruction, raw)
    }

    fn translate_alu(alu_operation: ThumbModeAluInstruction, rs: usize, rd: usize) -> ArmModeInstruction {
        use ThumbModeAluInstruction as A;

        let shift_by_rs = |shift_kind| {
            data_processing(
                ArmModeAluInstruction::Mov,
                true,
                0,
                rd,
                AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Register(rs),
                    shift_kind,
                    register: rd,
                },
            )
        };
        let with_rs = |alu| data_processing(alu, true, rd, rd, AluSecondOperandInfo::register(rs));

        match alu_operation {
            A::Lsl => shift_by_rs(ShiftKind::Lsl),
            A::Lsr => shift_by_rs(ShiftKind::Lsr),
            A::Asr => shift_by_rs(ShiftKind::Asr),
            A::Ror => shift_by_rs(ShiftKind::Ror),
            A::Neg => data_processing(
                ArmModeAluInstruction::Rsb,
                true,
                rs,
                rd,
                AluSecondOperandInfo::immediate(0),
            ),
            A::Mul => ArmModeInstruction::Multiply {
                variant: ArmModeMultiplyVariant::Mul,
                set_conditions: true,
                rd,
                rn: 0,
                rs: rd,
                rm: rs,
            },
            A::And => with_rs(ArmModeAluInstruction::And),
            A::Eor => with_rs(ArmModeAluInstruction::Eor),
            A::Adc => with_rs(ArmModeAluInstruction::Adc),
            A::Sbc => with_rs(ArmModeAluInstruction::Sbc),
            A::Tst => with_rs(ArmModeAluInstruction::Tst),
            A::Cmp => with_rs(ArmModeAluInstruction::Cmp),
            A::Cmn => with_rs(ArmModeAluInstruction::Cmn),
            A::Orr => with_rs(ArmModeAluInstruction::Orr),
            A::Bic => with_rs(ArmModeAluInstruction::Bic),
            A::Mvn => with_rs(ArmModeAluInstruction::Mvn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::condition::Condition;
    use pretty_assertions::assert_eq;

    fn translate(op_code: u16, pc: u32) -> ArmModeOpcode {
        ThumbModeOpcode::try_from(op_code).unwrap().translate(pc)
    }

    #[test]
    fn add_immediate_sets_flags() {
        // ADD R0, R1, #3
        let op_code = translate(0b00011_1_0_011_001_000, 0);
        assert_eq!(op_code.condition, Condition::AL);
        assert_eq!(
            op_code.instruction,
            data_processing(
                ArmModeAluInstruction::Add,
                true,
                1,
                0,
                AluSecondOperandInfo::immediate(3)
            )
        );
    }

    #[test]
    fn alu_shift_uses_register_amount() {
        // LSL R2, R5
        let op_code = translate(0b010000_0010_101_010, 0);
        assert_eq!(op_code.instruction.to_string(), "MOVS R2, R2, LSL R5");
    }

    #[test]
    fn neg_is_reverse_subtract_from_zero() {
        // NEG R0, R1
        let op_code = translate(0b010000_1001_001_000, 0);
        assert_eq!(op_code.instruction.to_string(), "RSBS R0, R1, #0");
    }

    #[test]
    fn mul_multiplies_into_rd() {
        // MUL R3, R4
        let op_code = translate(0b010000_1101_100_011, 0);
        assert_eq!(
            op_code.instruction,
            ArmModeInstruction::Multiply {
                variant: ArmModeMultiplyVariant::Mul,
                set_conditions: true,
                rd: 3,
                rn: 0,
                rs: 3,
                rm: 4,
            }
        );
    }

    #[test]
    fn pc_relative_load_aligns_pc() {
        // LDR R0, [PC, #4]
        let aligned = translate(0x4801, 0x100);
        let misaligned = translate(0x4801, 0x102);
        let offset_of = |op_code: ArmModeOpcode| match op_code.instruction {
            ArmModeInstruction::SingleDataTransfer {
                offset_info: SingleDataTransferOffsetInfo::Immediate { offset },
                offsetting,
                base_register: 15,
                ..
            } => (offsetting, offset),
            other => panic!("unexpected {other:?}"),
        };

        assert_eq!(offset_of(aligned), (Offsetting::Up, 4));
        assert_eq!(offset_of(misaligned), (Offsetting::Up, 2));
        // LDR R0, [PC, #0] at a misaligned PC reads PC + 2.
        assert_eq!(offset_of(translate(0x4800, 0x102)), (Offsetting::Down, 2));
    }

    #[test]
    fn push_and_pop_use_stack_pointer() {
        let push = translate(0xB510, 0);
        assert_eq!(push.instruction.to_string(), "STMDB R13!, {R4, R14}");

        let pop = translate(0xBD10, 0);
        assert_eq!(pop.instruction.to_string(), "LDMIA R13!, {R4, R15}");
    }

    #[test]
    fn conditional_branch_keeps_condition() {
        let op_code = translate(0xD0FE, 0);
        assert_eq!(op_code.condition, Condition::EQ);
        assert_eq!(
            op_code.instruction,
            ArmModeInstruction::Branch {
                link: false,
                offset: -4,
                base: BranchBase::ProgramCounter,
            }
        );
    }

    #[test]
    fn long_branch_halves() {
        // First half with offset -1 (all ones).
        let high = translate(0xF7FF, 0);
        assert_eq!(
            high.instruction,
            data_processing(
                ArmModeAluInstruction::Add,
                false,
                REG_PROGRAM_COUNTER,
                REG_LR,
                AluSecondOperandInfo::immediate(0xFFFF_F000)
            )
        );

        let low = translate(0xF804, 0);
        assert_eq!(
            low.instruction,
            ArmModeInstruction::Branch {
                link: true,
                offset: 8,
                base: BranchBase::LinkRegister,
            }
        );
    }

    #[test]
    fn swi_and_bx() {
        assert_eq!(translate(0xDF00, 0).instruction, ArmModeInstruction::SoftwareInterrupt);
        assert_eq!(
            translate(0x4708, 0).instruction,
            ArmModeInstruction::BranchAndExchange { register: 1 }
        );
    }
}
