//! # ARM7TDMI Core
//!
//! [`Arm7tdmi`] owns the status register, the banked register file and the
//! memory it runs against. [`Arm7tdmi::step`] runs exactly one instruction:
//!
//! ```text
//! align PC ─► fetch ─► record in history ─► decode ─► condition ─► handler ─► advance PC
//! ```
//!
//! ## Program counter
//!
//! The R15 slot always holds the address of the instruction being executed.
//! When an instruction reads R15 as an operand it sees the address plus the
//! pipeline offset (8 in ARM state, 4 in Thumb state). A handler that writes
//! R15 marks the pipeline as flushed and `step` leaves the PC alone;
//! otherwise the PC moves to the next instruction.
//!
//! ## Failure
//!
//! A step that returns an error leaves the PC on the failing instruction.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vecfixed::VecFixed;

use crate::cpu::arm::instructions::{ArmInstructionKind, ArmModeInstruction};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::{REG_LR, REG_PROGRAM_COUNTER, RegisterBank};
use crate::cpu::thumb::instruction::ThumbInstructionKind;
use crate::cpu::thumb::mode::ThumbModeOpcode;
use crate::error::CpuError;
use crate::memory::IoDevice;

/// How many executed instructions are remembered for diagnostics.
pub const HISTORY_SIZE: usize = 64;

/// Address of the SWI exception vector.
pub const SWI_VECTOR: u32 = 0x08;

/// CPSR value after reset: Supervisor, IRQ and FIQ masked, ARM state.
pub const RESET_CPSR: u32 = 0xD3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    Arm(ArmInstructionKind),
    Thumb(ThumbInstructionKind),
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm(kind) => write!(f, "{kind}"),
            Self::Thumb(kind) => write!(f, "{kind}"),
        }
    }
}

/// One entry of the execution history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedInstruction {
    pub address: u32,
    pub raw: u32,
    pub state: CpuState,
    pub kind: InstructionKind,
}

impl std::fmt::Display for ExecutedInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            CpuState::Arm => write!(f, "0x{:08X}: 0x{:08X} {}", self.address, self.raw, self.kind),
            CpuState::Thumb => write!(f, "0x{:08X}: 0x{:04X}     {}", self.address, self.raw, self.kind),
        }
    }
}

/// Architectural state of the core, without memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub cpsr: Psr,
    pub registers: RegisterBank,
}

pub struct Arm7tdmi<M: IoDevice> {
    pub memory: M,

    pub cpsr: Psr,
    pub registers: RegisterBank,

    /// Set by every write to R15 during the current step.
    pipeline_flushed: bool,

    history: VecFixed<HISTORY_SIZE, ExecutedInstruction>,
}

impl<M: IoDevice + Default> Default for Arm7tdmi<M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M: IoDevice> Arm7tdmi<M> {
    /// Builds a core around `memory` and resets it.
    pub fn new(memory: M) -> Self {
        let mut cpu = Self {
            memory,
            cpsr: Psr::default(),
            registers: RegisterBank::default(),
            pipeline_flushed: false,
            history: VecFixed::new(),
        };
        cpu.reset();
        cpu
    }

    /// Enters the reset exception: the old PC and CPSR are saved in the
    /// Supervisor bank, then the core starts at address 0 in ARM state.
    pub fn reset(&mut self) {
        let pc = self.program_counter();
        self.registers.write(Mode::Supervisor, REG_LR, pc);
        // Supervisor always has an SPSR.
        let _ = self.registers.set_spsr(Mode::Supervisor, self.cpsr);

        self.cpsr = Psr::from(Mode::Supervisor);
        self.cpsr.irq_disable = true;
        self.cpsr.fiq_disable = true;
        self.registers.write(Mode::Supervisor, REG_PROGRAM_COUNTER, 0);
        self.pipeline_flushed = false;

        debug!("reset, CPSR = {}", self.cpsr);
    }

    /// Fetches, decodes and executes the instruction at the PC.
    ///
    /// # Errors
    ///
    /// Decoding and execution errors are returned as is; the PC is left on
    /// the failing instruction.
    pub fn step(&mut self) -> Result<(), CpuError> {
        let state = self.cpsr.state;
        let pc = match state {
            CpuState::Arm => self.program_counter() & !3,
            CpuState::Thumb => self.program_counter() & !1,
        };
        self.registers.write(self.current_mode(), REG_PROGRAM_COUNTER, pc);
        self.pipeline_flushed = false;

        let op_code = match state {
            CpuState::Arm => {
                let raw = self.memory.read_word(pc);
                let kind = ArmInstructionKind::from(raw);
                self.history.push(ExecutedInstruction {
                    address: pc,
                    raw,
                    state,
                    kind: InstructionKind::Arm(kind),
                });
                ArmModeOpcode::decode(kind, raw)?
            }
            CpuState::Thumb => {
                let raw = self.memory.read_half_word(pc);
                let kind = ThumbInstructionKind::from(raw);
                self.history.push(ExecutedInstruction {
                    address: pc,
                    raw: u32::from(raw),
                    state,
                    kind: InstructionKind::Thumb(kind),
                });
                let thumb = ThumbModeOpcode::decode(kind, raw)?;
                trace!("0x{pc:08X}: {}", thumb.instruction);
                thumb.translate(pc)
            }
        };

        self.execute_arm(op_code)?;

        if !self.pipeline_flushed {
            self.registers.write(
                self.current_mode(),
                REG_PROGRAM_COUNTER,
                pc.wrapping_add(state.instruction_size()),
            );
        }

        Ok(())
    }

    /// Runs one decoded instruction if its condition holds.
    ///
    /// # Errors
    ///
    /// Whatever the handler reports; coprocessor and undefined instructions
    /// always fail.
    pub fn execute_arm(&mut self, op_code: ArmModeOpcode) -> Result<(), CpuError> {
        use ArmModeInstruction::{
            BlockDataTransfer, Branch, BranchAndExchange, DataProcessing, HalfwordDataTransfer,
            Multiply, MultiplyLong, PsrTransferIn, PsrTransferOut, SingleDataSwap,
            SingleDataTransfer, SoftwareInterrupt, Unimplemented,
        };

        if self.cpsr.state == CpuState::Arm {
            trace!("0x{:08X}: {}", self.program_counter(), op_code.instruction);
        }

        if !self.cpsr.can_execute(op_code.condition) {
            debug!("condition {} failed, skipping", op_code.condition);
            return Ok(());
        }

        match op_code.instruction {
            DataProcessing(args) => self.data_processing(args),
            PsrTransferOut {
                psr_kind,
                destination,
            } => self.psr_transfer_out(psr_kind, destination),
            PsrTransferIn {
                psr_kind,
                field_mask,
                operand,
            } => self.psr_transfer_in(psr_kind, field_mask, operand),
            Multiply {
                variant,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => {
                self.multiply(variant, set_conditions, rd, rn, rs, rm);
                Ok(())
            }
            MultiplyLong {
                variant,
                set_conditions,
                rdhi,
                rdlo,
                rs,
                rm,
            } => {
                self.multiply_long(variant, set_conditions, rdhi, rdlo, rs, rm);
                Ok(())
            }
            SingleDataSwap {
                quantity,
                rn,
                rd,
                rm,
            } => {
                self.single_data_swap(quantity, rn, rd, rm);
                Ok(())
            }
            BranchAndExchange { register } => {
                self.branch_and_exchange(register);
                Ok(())
            }
            HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => {
                self.half_word_data_transfer(
                    indexing,
                    offsetting,
                    write_back,
                    load_store,
                    offset_kind,
                    base_register,
                    source_destination_register,
                    transfer_kind,
                );
                Ok(())
            }
            SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => {
                self.single_data_transfer(
                    load_store,
                    quantity,
                    write_back,
                    indexing,
                    rd,
                    base_register,
                    offset_info,
                    offsetting,
                );
                Ok(())
            }
            BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            Branch { link, offset, base } => {
                self.branch(link, offset, base);
                Ok(())
            }
            SoftwareInterrupt => self.software_interrupt(),
            Unimplemented(kind) => Err(CpuError::UnimplementedArm {
                kind,
                raw: op_code.raw,
            }),
        }
    }

    #[must_use]
    pub const fn current_mode(&self) -> Mode {
        self.cpsr.mode
    }

    /// Switches mode without touching anything else in the CPSR.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.cpsr.mode != mode {
            debug!("mode {} -> {mode}", self.cpsr.mode);
            self.cpsr.mode = mode;
        }
    }

    /// Address of the instruction being executed (or about to be).
    #[must_use]
    pub fn program_counter(&self) -> u32 {
        self.registers.read(self.current_mode(), REG_PROGRAM_COUNTER)
    }

    /// Moves the PC without flushing; the next `step` fetches from there.
    pub fn set_program_counter(&mut self, value: u32) {
        self.registers
            .write(self.current_mode(), REG_PROGRAM_COUNTER, value);
    }

    /// Raw value of `index` in the current mode. R15 reads as the
    /// instruction address.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not in `0..=15`.
    #[must_use]
    pub fn read_register(&self, index: usize) -> u32 {
        self.registers.read(self.current_mode(), index)
    }

    /// Writes `index` in the current mode. Writing R15 flushes the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not in `0..=15`.
    pub fn write_register(&mut self, index: usize, value: u32) {
        if index == REG_PROGRAM_COUNTER {
            self.pipeline_flushed = true;
        }
        self.registers.write(self.current_mode(), index, value);
    }

    /// Value of `index` as seen by an instruction operand: R15 includes the
    /// pipeline offset.
    #[must_use]
    pub fn operand_register(&self, index: usize) -> u32 {
        let value = self.read_register(index);
        if index == REG_PROGRAM_COUNTER {
            value.wrapping_add(self.cpsr.state.pipeline_offset())
        } else {
            value
        }
    }

    #[must_use]
    pub fn read_banked(&self, mode: Mode, index: usize) -> u32 {
        self.registers.read(mode, index)
    }

    pub fn write_banked(&mut self, mode: Mode, index: usize, value: u32) {
        if index == REG_PROGRAM_COUNTER {
            self.pipeline_flushed = true;
        }
        self.registers.write(mode, index, value);
    }

    /// Copies the current mode's SPSR into the CPSR.
    ///
    /// # Errors
    ///
    /// [`CpuError::MissingSpsr`] in User and System mode.
    pub fn restore_cpsr(&mut self) -> Result<(), CpuError> {
        let spsr = self.registers.spsr(self.current_mode())?;
        debug!("CPSR <- SPSR_{}: {spsr}", self.current_mode());
        self.cpsr = spsr;
        Ok(())
    }

    /// Oldest to newest, at most [`HISTORY_SIZE`] entries.
    #[must_use]
    pub const fn history(&self) -> &VecFixed<HISTORY_SIZE, ExecutedInstruction> {
        &self.history
    }

    #[must_use]
    pub fn save_state(&self) -> CpuSnapshot {
        CpuSnapshot {
            cpsr: self.cpsr,
            registers: self.registers.clone(),
        }
    }

    pub fn load_state(&mut self, snapshot: CpuSnapshot) {
        self.cpsr = snapshot.cpsr;
        self.registers = snapshot.registers;
        self.pipeline_flushed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::register_bank::REG_SP;
    use crate::memory::FlatMemory;
    use pretty_assertions::assert_eq;

    fn cpu_with_program(address: u32, words: &[u32]) -> Arm7tdmi<FlatMemory> {
        let mut memory = FlatMemory::new();
        for (i, word) in (0..).zip(words) {
            memory.write_word(address + i * 4, *word);
        }
        let mut cpu = Arm7tdmi::new(memory);
        cpu.set_program_counter(address);
        cpu
    }

    fn cpu_with_thumb(address: u32, half_words: &[u16]) -> Arm7tdmi<FlatMemory> {
        let mut memory = FlatMemory::new();
        for (i, half_word) in (0..).zip(half_words) {
            memory.write_half_word(address + i * 2, *half_word);
        }
        let mut cpu = Arm7tdmi::new(memory);
        cpu.cpsr.state = CpuState::Thumb;
        cpu.set_program_counter(address);
        cpu
    }

    #[test]
    fn reset_state() {
        let cpu = Arm7tdmi::new(FlatMemory::new());
        assert_eq!(u32::from(cpu.cpsr), RESET_CPSR);
        assert_eq!(cpu.program_counter(), 0);
        assert_eq!(cpu.current_mode(), Mode::Supervisor);
        assert!(cpu.history().is_empty());
    }

    #[test]
    fn reset_saves_pc_and_cpsr() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new());
        cpu.set_mode(Mode::System);
        cpu.cpsr.zero = true;
        cpu.set_program_counter(0x1234);
        let before = cpu.cpsr;

        cpu.reset();

        assert_eq!(cpu.read_banked(Mode::Supervisor, REG_LR), 0x1234);
        assert_eq!(cpu.registers.spsr(Mode::Supervisor), Ok(before));
        assert_eq!(u32::from(cpu.cpsr), RESET_CPSR);
        assert_eq!(cpu.program_counter(), 0);
    }

    #[test]
    fn swi_and_return() {
        let mut memory = FlatMemory::new();
        // SWI #0 at 0, MOVS PC, LR at the vector.
        memory.write_word(0x00, 0xEF00_0000);
        memory.write_word(SWI_VECTOR, 0xE1B0_F00E);
        let mut cpu = Arm7tdmi::new(memory);
        cpu.cpsr = Psr::try_from(0x6000_001F).unwrap();
        let before = cpu.cpsr;

        cpu.step().unwrap();
        assert_eq!(cpu.program_counter(), SWI_VECTOR);
        assert_eq!(cpu.current_mode(), Mode::Supervisor);
        assert!(cpu.cpsr.irq_disable);
        assert_eq!(cpu.read_register(REG_LR), 0x04);
        assert_eq!(cpu.registers.spsr(Mode::Supervisor), Ok(before));

        cpu.step().unwrap();
        assert_eq!(cpu.program_counter(), 0x04);
        assert_eq!(cpu.cpsr, before);
    }

    #[test]
    fn store_and_load_multiple() {
        let mut cpu = cpu_with_program(
            0x100,
            &[
                0xE8A1_0025, // STMIA R1!, {R0, R2, R5}
                0xE891_0025, // LDMIA R1, {R0, R2, R5}
            ],
        );
        cpu.write_register(0, 0xAAAA_AAAA);
        cpu.write_register(2, 0xBBBB_BBBB);
        cpu.write_register(5, 0xCCCC_CCCC);
        cpu.write_register(1, 0x1000);

        cpu.step().unwrap();
        assert_eq!(cpu.read_register(1), 0x100C);
        assert_eq!(cpu.memory.read_word(0x1000), 0xAAAA_AAAA);
        assert_eq!(cpu.memory.read_word(0x1004), 0xBBBB_BBBB);
        assert_eq!(cpu.memory.read_word(0x1008), 0xCCCC_CCCC);

        cpu.write_register(1, 0x1000);
        cpu.write_register(0, 0);
        cpu.write_register(2, 0);
        cpu.write_register(5, 0);
        cpu.step().unwrap();

        assert_eq!(cpu.read_register(0), 0xAAAA_AAAA);
        assert_eq!(cpu.read_register(2), 0xBBBB_BBBB);
        assert_eq!(cpu.read_register(5), 0xCCCC_CCCC);
        assert_eq!(cpu.read_register(1), 0x1000);
        assert_eq!(cpu.program_counter(), 0x108);
    }

    #[test]
    fn banked_stack_pointers() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new());
        cpu.write_register(REG_SP, 0x0300_7FE0);
        cpu.set_mode(Mode::Irq);
        cpu.write_register(REG_SP, 0x0300_7FA0);
        cpu.set_mode(Mode::System);
        cpu.write_register(REG_SP, 0x0300_7F00);

        assert_eq!(cpu.read_banked(Mode::Supervisor, REG_SP), 0x0300_7FE0);
        assert_eq!(cpu.read_banked(Mode::Irq, REG_SP), 0x0300_7FA0);
        assert_eq!(cpu.read_banked(Mode::User, REG_SP), 0x0300_7F00);
    }

    #[test]
    fn condition_failed_advances() {
        // MOVEQ R0, #1 with Z clear.
        let mut cpu = cpu_with_program(0, &[0x03A0_0001]);
        cpu.step().unwrap();
        assert_eq!(cpu.read_register(0), 0);
        assert_eq!(cpu.program_counter(), 4);
    }

    #[test]
    fn reserved_condition_keeps_pc() {
        let mut cpu = cpu_with_program(0x20, &[0xF3A0_0001]);
        assert_eq!(
            cpu.step(),
            Err(CpuError::ReservedCondition { field: 0xF })
        );
        assert_eq!(cpu.program_counter(), 0x20);
        assert_eq!(cpu.history().len(), 1);
        assert_eq!(cpu.history().last().map(|e| e.raw), Some(0xF3A0_0001));
    }

    #[test]
    fn undefined_arm_fails() {
        let mut cpu = cpu_with_program(0x40, &[0x0600_0010]);
        assert_eq!(
            cpu.step(),
            Err(CpuError::UnimplementedArm {
                kind: ArmInstructionKind::Undefined,
                raw: 0x0600_0010,
            })
        );
        assert_eq!(cpu.program_counter(), 0x40);
        assert_eq!(
            cpu.history().last().map(|e| e.kind),
            Some(InstructionKind::Arm(ArmInstructionKind::Undefined))
        );
    }

    #[test]
    fn coprocessor_fails() {
        let mut cpu = cpu_with_program(0, &[0xEE00_0000]);
        assert_eq!(
            cpu.step(),
            Err(CpuError::UnimplementedArm {
                kind: ArmInstructionKind::CoprocessorDataOperation,
                raw: 0xEE00_0000,
            })
        );
        assert_eq!(cpu.program_counter(), 0);
    }

    #[test]
    fn undefined_thumb_fails() {
        let mut cpu = cpu_with_thumb(0x10, &[0xE800]);
        assert_eq!(cpu.step(), Err(CpuError::UndefinedThumb { raw: 0xE800 }));
        assert_eq!(cpu.program_counter(), 0x10);
    }

    #[test]
    fn branch_and_link() {
        // BL +0x10 at 0x100: target is 0x100 + 8 + 0x10.
        let mut cpu = cpu_with_program(0x100, &[0xEB00_0004]);
        cpu.step().unwrap();
        assert_eq!(cpu.program_counter(), 0x118);
        assert_eq!(cpu.read_register(REG_LR), 0x104);
    }

    #[test]
    fn enter_thumb_and_run() {
        let mut memory = FlatMemory::new();
        // ADD R0, PC, #1 ; BX R0
        memory.write_word(0x00, 0xE28F_0001);
        memory.write_word(0x04, 0xE12F_FF10);
        // Thumb at 0x09 & !1 = 0x08
        memory.write_half_word(0x08, 0x2105); // MOV R1, #5
        memory.write_half_word(0x0A, 0x1849); // ADD R1, R1, R1
        memory.write_half_word(0x0C, 0xF000); // BL (high) +0
        memory.write_half_word(0x0E, 0xF802); // BL (low) +4
        memory.write_half_word(0x14, 0x4770); // BX LR

        let mut cpu = Arm7tdmi::new(memory);
        cpu.step().unwrap();
        assert_eq!(cpu.read_register(0), 0x09);
        cpu.step().unwrap();
        assert_eq!(cpu.cpsr.state, CpuState::Thumb);
        assert_eq!(cpu.program_counter(), 0x08);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.read_register(1), 10);
        assert_eq!(cpu.program_counter(), 0x0C);

        // LR = 0x0C + 4 after the first half.
        cpu.step().unwrap();
        assert_eq!(cpu.read_register(REG_LR), 0x10);
        assert_eq!(cpu.program_counter(), 0x0E);

        cpu.step().unwrap();
        assert_eq!(cpu.program_counter(), 0x14);
        assert_eq!(cpu.read_register(REG_LR), 0x11);

        // BX LR stays in Thumb and returns after the BL.
        cpu.step().unwrap();
        assert_eq!(cpu.cpsr.state, CpuState::Thumb);
        assert_eq!(cpu.program_counter(), 0x10);

        assert_eq!(cpu.history().len(), 7);
        assert_eq!(
            cpu.history().last().map(|e| e.kind),
            Some(InstructionKind::Thumb(ThumbInstructionKind::HiRegisterOpBX))
        );
    }

    #[test]
    fn thumb_swi_returns_to_next_half_word() {
        let mut cpu = cpu_with_thumb(0x200, &[0xDF01]);
        let before = cpu.cpsr;
        cpu.step().unwrap();
        assert_eq!(cpu.read_register(REG_LR), 0x202);
        assert_eq!(cpu.cpsr.state, CpuState::Arm);
        assert_eq!(cpu.program_counter(), SWI_VECTOR);
        assert_eq!(cpu.registers.spsr(Mode::Supervisor), Ok(before));
    }

    #[test]
    fn history_is_bounded() {
        // MOV R0, R0 everywhere.
        let mut cpu = cpu_with_program(0, &[0xE1A0_0000; 100]);
        for _ in 0..100 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.history().len(), HISTORY_SIZE);
        assert_eq!(cpu.history().iter().next().map(|e| e.address), Some(36 * 4));
        assert_eq!(
            cpu.history().last().map(ToString::to_string),
            Some("0x0000018C: 0xE1A00000 DataProcessing".to_string())
        );
    }

    #[test]
    fn snapshot_round_trip() {
        let mut cpu = Arm7tdmi::new(FlatMemory::new());
        for index in 0..15 {
            cpu.write_register(index, rand::random());
        }
        cpu.set_mode(Mode::Fiq);
        cpu.write_register(8, 0x88);
        let snapshot = cpu.save_state();

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: CpuSnapshot = serde_json::from_str(&json).unwrap();

        let mut other = Arm7tdmi::new(FlatMemory::new());
        other.load_state(restored);
        assert_eq!(other.save_state(), snapshot);
        assert_eq!(other.read_register(8), 0x88);
        assert_eq!(other.current_mode(), Mode::Fiq);
    }

    #[test]
    fn history_serializes() {
        let mut cpu = cpu_with_program(0, &[0xE1A0_0000, 0xEE00_0000]);
        cpu.step().unwrap();
        assert!(cpu.step().is_err());

        let json = serde_json::to_string(cpu.history()).unwrap();
        let entries: Vec<ExecutedInstruction> = serde_json::from_str(&json).unwrap();
        assert_eq!(
            entries.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![
                InstructionKind::Arm(ArmInstructionKind::DataProcessing),
                InstructionKind::Arm(ArmInstructionKind::CoprocessorDataOperation),
            ]
        );
    }
}
