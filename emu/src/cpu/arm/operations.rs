use tracing::{debug, warn};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction, PsrKind, ShiftOperator,
    calculate_operand2, shift_by_immediate,
};
use crate::cpu::arm::instructions::{
    ArmModeMultiplyLongVariant, ArmModeMultiplyVariant, BranchBase, DataProcessingArgs,
    PsrFieldMask, SingleDataTransferOffsetInfo,
};
use crate::cpu::arm7tdmi::{Arm7tdmi, SWI_VECTOR};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    ReadWriteKind,
};
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::{REG_LR, REG_PROGRAM_COUNTER};
use crate::error::CpuError;
use crate::memory::IoDevice;

/// A stored R15 reads 12 bytes past the instruction (ARM state only).
const STORED_PC_OFFSET: u32 = 12;

impl<M: IoDevice> Arm7tdmi<M> {
    /// # Errors
    ///
    /// Only when an S-suffixed write to R15 fails to restore the CPSR.
    pub fn data_processing(&mut self, args: DataProcessingArgs) -> Result<(), CpuError> {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };

        let DataProcessingArgs {
            alu_instruction,
            set_conditions: s,
            rn,
            destination: rd,
            op2,
        } = args;

        let op1 = self.alu_operand(rn, op2.is_shift_by_register());
        let (op2, shifter_carry) = self.get_operand(op2);

        match alu_instruction {
            And => self.logical(rd, op1 & op2, shifter_carry, s),
            Eor => self.logical(rd, op1 ^ op2, shifter_carry, s),
            Orr => self.logical(rd, op1 | op2, shifter_carry, s),
            Bic => self.logical(rd, op1 & !op2, shifter_carry, s),
            Mov => self.logical(rd, op2, shifter_carry, s),
            Mvn => self.logical(rd, !op2, shifter_carry, s),
            Sub => self.arithmetic(rd, Self::sub_inner_op(op1, op2), s),
            Rsb => self.arithmetic(rd, Self::sub_inner_op(op2, op1), s),
            Add => self.arithmetic(rd, Self::add_inner_op(op1, op2), s),
            Adc => {
                let result = Self::adc_inner_op(op1, op2, self.cpsr.carry);
                self.arithmetic(rd, result, s);
            }
            Sbc => {
                let result = Self::sbc_inner_op(op1, op2, self.cpsr.carry);
                self.arithmetic(rd, result, s);
            }
            Rsc => {
                let result = Self::sbc_inner_op(op2, op1, self.cpsr.carry);
                self.arithmetic(rd, result, s);
            }
            Tst => self.cpsr.set_logical_flags(op1 & op2, shifter_carry),
            Teq => self.cpsr.set_logical_flags(op1 ^ op2, shifter_carry),
            Cmp => self.cpsr.set_flags(&Self::sub_inner_op(op1, op2)),
            Cmn => self.cpsr.set_flags(&Self::add_inner_op(op1, op2)),
        }

        // Rd = R15 with S set returns from an exception.
        if s
            && rd == REG_PROGRAM_COUNTER
            && !alu_instruction.is_test()
            && self.current_mode().has_spsr()
        {
            self.restore_cpsr()?;
        }

        Ok(())
    }

    /// Rn as an ALU operand. A register-specified shift delays the read of
    /// R15 by one more word.
    fn alu_operand(&self, index: usize, shift_by_register: bool) -> u32 {
        let value = self.operand_register(index);
        if index == REG_PROGRAM_COUNTER && shift_by_register && self.cpsr.state == CpuState::Arm {
            value.wrapping_add(4)
        } else {
            value
        }
    }

    /// Operand 2 and the shifter carry-out.
    pub fn get_operand(&self, op2: AluSecondOperandInfo) -> (u32, bool) {
        match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                let value = base.rotate_right(shift);
                let carry = if shift == 0 {
                    self.cpsr.carry
                } else {
                    value.get_bit(31)
                };
                (value, carry)
            }
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => match shift_op {
                ShiftOperator::Immediate(amount) => shift_by_immediate(
                    self.alu_operand(register, false),
                    amount,
                    shift_kind,
                    self.cpsr.carry,
                ),
                ShiftOperator::Register(rs) => {
                    let amount = self.operand_register(rs) & 0xFF;
                    calculate_operand2(
                        self.alu_operand(register, true),
                        amount,
                        shift_kind,
                        self.cpsr.carry,
                    )
                }
            },
        }
    }

    fn logical(&mut self, rd: usize, result: u32, carry: bool, s: bool) {
        self.write_register(rd, result);
        self.set_logical_flags(s, rd, result, carry);
    }

    fn arithmetic(&mut self, rd: usize, result: ArithmeticOpResult, s: bool) {
        self.write_register(rd, result.result);
        self.set_arithmetic_flags(s, rd, &result);
    }

    /// N, Z, C when `s` is set. Writes to R15 never touch the flags.
    pub fn set_logical_flags(&mut self, s: bool, rd: usize, result: u32, carry: bool) {
        if s && rd != REG_PROGRAM_COUNTER {
            self.cpsr.set_logical_flags(result, carry);
        }
    }

    /// N, Z, C, V when `s` is set. Writes to R15 never touch the flags.
    pub fn set_arithmetic_flags(&mut self, s: bool, rd: usize, result: &ArithmeticOpResult) {
        if s && rd != REG_PROGRAM_COUNTER {
            self.cpsr.set_flags(result);
        }
    }

    #[must_use]
    pub fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let (result, carry) = first_op.overflowing_add(second_op);

        let sign_op1 = first_op.get_bit(31);
        let sign_op2 = second_op.get_bit(31);
        let sign_r = result.get_bit(31);

        // overflow only occurs when operands have the same sign and result has the opposite one
        ArithmeticOpResult {
            result,
            carry,
            overflow: sign_op1 == sign_op2 && sign_op1 != sign_r,
            sign: sign_r,
            zero: result == 0,
        }
    }

    /// Carry follows the borrow convention: set when `first_op < second_op`.
    #[must_use]
    pub fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let result = first_op.wrapping_sub(second_op);

        let sign_op1 = first_op.get_bit(31);
        let sign_op2 = second_op.get_bit(31);
        let sign_r = result.get_bit(31);

        ArithmeticOpResult {
            result,
            carry: first_op < second_op,
            overflow: sign_op1 != sign_op2 && sign_op2 == sign_r,
            sign: sign_r,
            zero: result == 0,
        }
    }

    /// `first_op + second_op + carry` in one pass, so the flags describe the
    /// whole sum.
    #[must_use]
    pub fn adc_inner_op(first_op: u32, second_op: u32, carry: bool) -> ArithmeticOpResult {
        let wide = u64::from(first_op) + u64::from(second_op) + u64::from(carry);
        let result = wide as u32;

        let sign_op1 = first_op.get_bit(31);
        let sign_op2 = second_op.get_bit(31);
        let sign_r = result.get_bit(31);

        ArithmeticOpResult {
            result,
            carry: wide > u64::from(u32::MAX),
            overflow: sign_op1 == sign_op2 && sign_op1 != sign_r,
            sign: sign_r,
            zero: result == 0,
        }
    }

    /// `first_op - second_op - !carry` in one pass. The carry out follows the
    /// borrow convention of [`Self::sub_inner_op`]: set when the subtraction
    /// borrowed.
    #[must_use]
    pub fn sbc_inner_op(first_op: u32, second_op: u32, carry: bool) -> ArithmeticOpResult {
        let borrow = u32::from(!carry);
        let result = first_op.wrapping_sub(second_op).wrapping_sub(borrow);

        let sign_op1 = first_op.get_bit(31);
        let sign_op2 = second_op.get_bit(31);
        let sign_r = result.get_bit(31);

        ArithmeticOpResult {
            result,
            carry: u64::from(first_op) < u64::from(second_op) + u64::from(borrow),
            overflow: sign_op1 != sign_op2 && sign_op1 != sign_r,
            sign: sign_r,
            zero: result == 0,
        }
    }

    /// MRS
    ///
    /// # Errors
    ///
    /// [`CpuError::MissingSpsr`] when reading the SPSR in User or System mode.
    pub fn psr_transfer_out(&mut self, psr_kind: PsrKind, destination: usize) -> Result<(), CpuError> {
        let psr = match psr_kind {
            PsrKind::Cpsr => self.cpsr,
            PsrKind::Spsr => self.registers.spsr(self.current_mode())?,
        };

        if destination == REG_PROGRAM_COUNTER {
            warn!("MRS with R15 as destination");
        }
        self.write_register(destination, psr.into());

        Ok(())
    }

    /// MSR. The flag field is always writable, the control field only in a
    /// privileged mode.
    ///
    /// # Errors
    ///
    /// [`CpuError::MissingSpsr`] for the SPSR of User or System, and
    /// [`CpuError::InvalidMode`] when the new mode bits are not a mode. The
    /// PSR is left untouched on error.
    pub fn psr_transfer_in(
        &mut self,
        psr_kind: PsrKind,
        field_mask: PsrFieldMask,
        operand: AluSecondOperandInfo,
    ) -> Result<(), CpuError> {
        let value = match operand {
            AluSecondOperandInfo::Immediate { base, shift } => base.rotate_right(shift),
            AluSecondOperandInfo::Register { register, .. } => {
                if register == REG_PROGRAM_COUNTER {
                    warn!("MSR with R15 as source");
                }
                self.read_register(register)
            }
        };

        let privileged = self.current_mode().is_privileged();

        match psr_kind {
            PsrKind::Cpsr => {
                let psr = Self::apply_psr_fields(self.cpsr, value, field_mask, privileged)?;
                self.set_mode(psr.mode);
                self.cpsr = psr;
            }
            PsrKind::Spsr => {
                let mode = self.current_mode();
                let spsr = self.registers.spsr(mode)?;
                let spsr = Self::apply_psr_fields(spsr, value, field_mask, privileged)?;
                self.registers.set_spsr(mode, spsr)?;
            }
        }

        Ok(())
    }

    fn apply_psr_fields(
        mut psr: Psr,
        value: u32,
        field_mask: PsrFieldMask,
        privileged: bool,
    ) -> Result<Psr, CpuError> {
        if field_mask.flags {
            psr.set_flags_from_raw(value);
        }

        if field_mask.control && privileged {
            let mode = Mode::try_from(value.get_bits(0..=4))?;
            let state = CpuState::from(value.get_bit(5));
            if state != psr.state {
                warn!("MSR changes the T bit to {state}");
            }

            psr.irq_disable = value.get_bit(7);
            psr.fiq_disable = value.get_bit(6);
            psr.state = state;
            psr.mode = mode;
        }

        Ok(psr)
    }

    pub fn multiply(
        &mut self,
        variant: ArmModeMultiplyVariant,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) {
        let mut result = self.read_register(rm).wrapping_mul(self.read_register(rs));
        if variant == ArmModeMultiplyVariant::Mla {
            result = result.wrapping_add(self.read_register(rn));
        }

        self.write_register(rd, result);

        if set_conditions && rd != REG_PROGRAM_COUNTER {
            self.cpsr.sign = result.get_bit(31);
            self.cpsr.zero = result == 0;
            self.cpsr.carry = false;
        }
    }

    pub fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        set_conditions: bool,
        rdhi: usize,
        rdlo: usize,
        rs: usize,
        rm: usize,
    ) {
        use ArmModeMultiplyLongVariant::{Smlal, Smull, Umlal, Umull};

        let rm_value = self.read_register(rm);
        let rs_value = self.read_register(rs);
        let accumulator =
            (u64::from(self.read_register(rdhi)) << 32) | u64::from(self.read_register(rdlo));

        let result = match variant {
            Umull => u64::from(rm_value).wrapping_mul(u64::from(rs_value)),
            Umlal => u64::from(rm_value)
                .wrapping_mul(u64::from(rs_value))
                .wrapping_add(accumulator),
            Smull => (i64::from(rm_value as i32)).wrapping_mul(i64::from(rs_value as i32)) as u64,
            Smlal => (i64::from(rm_value as i32))
                .wrapping_mul(i64::from(rs_value as i32))
                .wrapping_add(accumulator as i64) as u64,
        };

        self.write_register(rdlo, result as u32);
        self.write_register(rdhi, (result >> 32) as u32);

        if set_conditions && rdhi != REG_PROGRAM_COUNTER && rdlo != REG_PROGRAM_COUNTER {
            self.cpsr.sign = result.get_bit(63);
            self.cpsr.zero = result == 0;
            self.cpsr.carry = false;
            self.cpsr.overflow = false;
        }
    }

    /// SWP/SWPB: read the old value, store Rm, then Rd gets the old value.
    pub fn single_data_swap(&mut self, quantity: ReadWriteKind, rn: usize, rd: usize, rm: usize) {
        let address = self.read_register(rn);
        let source = self.read_register(rm);

        let old = match quantity {
            ReadWriteKind::Byte => {
                let old = u32::from(self.memory.read_at(address));
                self.memory.write_at(address, source as u8);
                old
            }
            ReadWriteKind::Word => {
                let old = self.read_word_rotated(address);
                self.memory.write_word(address & !3, source);
                old
            }
        };

        self.write_register(rd, old);
    }

    pub fn branch_and_exchange(&mut self, register: usize) {
        let value = self.operand_register(register);
        let state = CpuState::from(value.get_bit(0));
        if state != self.cpsr.state {
            debug!("BX switches to {state}");
        }

        self.cpsr.state = state;
        self.write_register(REG_PROGRAM_COUNTER, value & !1);
    }

    /// B, BL and both halves of a Thumb BL. The link value is the address of
    /// the next instruction, with bit 0 set in Thumb state.
    pub fn branch(&mut self, link: bool, offset: i32, base: BranchBase) {
        let pc = self.program_counter();
        let base_value = match base {
            BranchBase::ProgramCounter => self.operand_register(REG_PROGRAM_COUNTER),
            BranchBase::LinkRegister => self.read_register(REG_LR),
        };

        if link {
            let next = pc.wrapping_add(self.cpsr.state.instruction_size());
            let link_value = match self.cpsr.state {
                CpuState::Arm => next,
                CpuState::Thumb => next | 1,
            };
            self.write_register(REG_LR, link_value);
        }

        self.write_register(REG_PROGRAM_COUNTER, base_value.wrapping_add_signed(offset));
    }

    /// Word load from a possibly misaligned address: the aligned word is
    /// rotated so the addressed byte ends up in bits 7-0.
    fn read_word_rotated(&self, address: u32) -> u32 {
        self.memory
            .read_word(address & !3)
            .rotate_right(8 * (address & 3))
    }

    /// Value written to memory by a store of `register`.
    fn stored_value(&self, register: usize) -> u32 {
        if register == REG_PROGRAM_COUNTER {
            self.program_counter().wrapping_add(STORED_PC_OFFSET)
        } else {
            self.read_register(register)
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn single_data_transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: usize,
        base_register: usize,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) {
        let amount = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                shift_by_immediate(
                    self.read_register(reg_offset),
                    shift_amount,
                    shift_kind,
                    self.cpsr.carry,
                )
                .0
            }
        };

        let base = self.operand_register(base_register);
        let offset_address = offsetting.apply(base, amount);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };

        let loaded = match load_store {
            LoadStoreKind::Load => Some(match quantity {
                ReadWriteKind::Word => self.read_word_rotated(address),
                ReadWriteKind::Byte => u32::from(self.memory.read_at(address)),
            }),
            LoadStoreKind::Store => {
                let value = self.stored_value(rd);
                match quantity {
                    ReadWriteKind::Word => self.memory.write_word(address & !3, value),
                    ReadWriteKind::Byte => self.memory.write_at(address, value as u8),
                }
                None
            }
        };

        // Post-indexing always writes back.
        if indexing == Indexing::Post || write_back {
            self.write_back(base_register, offset_address, loaded.is_some() && rd == base_register);
        }

        if let Some(value) = loaded {
            self.write_register(rd, value);
        }
    }

    fn write_back(&mut self, base_register: usize, value: u32, base_loaded: bool) {
        if base_loaded {
            return;
        }

        if base_register == REG_PROGRAM_COUNTER {
            warn!("write-back to R15 ignored");
            return;
        }

        self.write_register(base_register, value);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: usize,
        source_destination_register: usize,
        transfer_kind: HalfwordTransferKind,
    ) {
        let amount = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => self.read_register(register),
        };

        let base = self.operand_register(base_register);
        let offset_address = offsetting.apply(base, amount);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };

        let loaded = match load_store {
            LoadStoreKind::Load => Some(match transfer_kind {
                HalfwordTransferKind::UnsignedHalfwords => {
                    u32::from(self.memory.read_half_word(address & !1))
                        .rotate_right(8 * (address & 1))
                }
                HalfwordTransferKind::SignedByte => self.memory.read_at(address) as i8 as u32,
                HalfwordTransferKind::SignedHalfwords => {
                    if address & 1 == 1 {
                        self.memory.read_at(address) as i8 as u32
                    } else {
                        self.memory.read_half_word(address) as i16 as u32
                    }
                }
            }),
            LoadStoreKind::Store => {
                if transfer_kind != HalfwordTransferKind::UnsignedHalfwords {
                    warn!("signed halfword store treated as STRH");
                }
                let value = self.stored_value(source_destination_register);
                self.memory.write_half_word(address & !1, value as u16);
                None
            }
        };

        if indexing == Indexing::Post || write_back {
            self.write_back(
                base_register,
                offset_address,
                loaded.is_some() && source_destination_register == base_register,
            );
        }

        if let Some(value) = loaded {
            self.write_register(source_destination_register, value);
        }
    }

    /// LDM/STM. Registers always go lowest first to the lowest address.
    ///
    /// With the S bit, an LDM that includes R15 also restores the CPSR; every
    /// other form transfers the User bank registers.
    ///
    /// # Errors
    ///
    /// Propagates a failed CPSR restore.
    #[allow(clippy::too_many_arguments)]
    pub fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    ) -> Result<(), CpuError> {
        if register_list == 0 {
            warn!("block transfer with an empty register list");
            return Ok(());
        }

        let count = register_list.count_ones();
        let base = self.read_register(rn);
        let total = count * 4;

        let (start, final_base) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(total)),
            (Offsetting::Up, Indexing::Pre) => (base.wrapping_add(4), base.wrapping_add(total)),
            (Offsetting::Down, Indexing::Post) => {
                (base.wrapping_sub(total).wrapping_add(4), base.wrapping_sub(total))
            }
            (Offsetting::Down, Indexing::Pre) => (base.wrapping_sub(total), base.wrapping_sub(total)),
        };

        let includes_pc = register_list.get_bit(15);
        let restores_cpsr = load_psr && load_store == LoadStoreKind::Load && includes_pc;
        let bank = if load_psr && !restores_cpsr {
            Mode::User
        } else {
            self.current_mode()
        };

        let mut address = start;
        for register in (0..16_u8).filter(|r| register_list.get_bit(*r)) {
            let register = usize::from(register);
            match load_store {
                LoadStoreKind::Store => {
                    let value = if register == REG_PROGRAM_COUNTER {
                        self.stored_value(register)
                    } else {
                        self.read_banked(bank, register)
                    };
                    self.memory.write_word(address & !3, value);
                }
                LoadStoreKind::Load => {
                    let value = self.memory.read_word(address & !3);
                    self.write_banked(bank, register, value);
                }
            }
            address = address.wrapping_add(4);
        }

        let base_loaded = load_store == LoadStoreKind::Load && register_list.get_bit(rn as u8);
        if write_back {
            self.write_back(rn, final_base, base_loaded);
        }

        if restores_cpsr && self.current_mode().has_spsr() {
            self.restore_cpsr()?;
        }

        Ok(())
    }

    /// Supervisor call: save the return address and CPSR in the Supervisor
    /// bank, then jump to the SWI vector in ARM state with IRQ masked.
    ///
    /// # Errors
    ///
    /// Never in practice: Supervisor always has an SPSR.
    pub fn software_interrupt(&mut self) -> Result<(), CpuError> {
        let return_address = self
            .program_counter()
            .wrapping_add(self.cpsr.state.instruction_size());
        let old_cpsr = self.cpsr;

        self.registers
            .write(Mode::Supervisor, REG_LR, return_address);
        self.registers.set_spsr(Mode::Supervisor, old_cpsr)?;

        debug!("SWI from {} at 0x{:08X}", old_cpsr.mode, self.program_counter());

        self.set_mode(Mode::Supervisor);
        self.cpsr.state = CpuState::Arm;
        self.cpsr.irq_disable = true;
        self.write_register(REG_PROGRAM_COUNTER, SWI_VECTOR);

        Ok(())
    }
}
