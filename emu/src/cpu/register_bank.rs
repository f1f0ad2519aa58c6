//! # Banked Register File
//!
//! The ARM7TDMI has 31 general-purpose physical registers. At any time 16 of
//! them are visible; which ones depends on the current mode:
//!
//! ```text
//! slot  0-7   R0-R7            shared by every mode
//! slot  8-14  R8-R14           User/System (and every mode but FIQ for R8-R12)
//! slot  15    R15 (PC)         shared
//! slot 16-22  R8_fiq-R14_fiq
//! slot 23-24  R13_svc, R14_svc
//! slot 25-26  R13_abt, R14_abt
//! slot 27-28  R13_irq, R14_irq
//! slot 29-30  R13_und, R14_und
//! ```
//!
//! The `(mode, index) -> slot` mapping is a table computed at compile time,
//! so every access is a single lookup. The five SPSRs live next to the slots.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;
use crate::error::CpuError;

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: usize = 0xF;

const PHYSICAL_REGISTERS: usize = 31;
const BANKS: usize = 6;

const SLOT_TABLE: [[usize; 16]; BANKS] = build_slot_table();

const fn build_slot_table() -> [[usize; 16]; BANKS] {
    let mut table = [[0; 16]; BANKS];

    let mut bank = 0;
    while bank < BANKS {
        let mut index = 0;
        while index < 16 {
            table[bank][index] = index;
            index += 1;
        }
        bank += 1;
    }

    // FIQ owns R8-R14.
    let mut index = 8;
    while index <= 14 {
        table[1][index] = 16 + index - 8;
        index += 1;
    }

    // SVC, ABT, IRQ, UND own R13-R14.
    let mut bank = 2;
    while bank < BANKS {
        table[bank][REG_SP] = 23 + (bank - 2) * 2;
        table[bank][REG_LR] = 24 + (bank - 2) * 2;
        bank += 1;
    }

    table
}

const fn bank_of(mode: Mode) -> usize {
    match mode {
        Mode::User | Mode::System => 0,
        Mode::Fiq => 1,
        Mode::Supervisor => 2,
        Mode::Abort => 3,
        Mode::Irq => 4,
        Mode::Undefined => 5,
    }
}

/// Physical storage for every general register and every SPSR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    slots: [u32; PHYSICAL_REGISTERS],
    spsrs: [Psr; BANKS - 1],
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self {
            slots: [0; PHYSICAL_REGISTERS],
            spsrs: [Psr::default(); BANKS - 1],
        }
    }
}

impl RegisterBank {
    /// # Panics
    ///
    /// Panics if `index` is not in `0..=15`.
    #[must_use]
    pub fn read(&self, mode: Mode, index: usize) -> u32 {
        self.slots[Self::slot(mode, index)]
    }

    /// # Panics
    ///
    /// Panics if `index` is not in `0..=15`.
    pub fn write(&mut self, mode: Mode, index: usize, value: u32) {
        self.slots[Self::slot(mode, index)] = value;
    }

    /// # Errors
    ///
    /// User and System have no SPSR.
    pub fn spsr(&self, mode: Mode) -> Result<Psr, CpuError> {
        Self::spsr_index(mode).map(|i| self.spsrs[i])
    }

    /// # Errors
    ///
    /// User and System have no SPSR.
    pub fn set_spsr(&mut self, mode: Mode, psr: Psr) -> Result<(), CpuError> {
        let i = Self::spsr_index(mode)?;
        self.spsrs[i] = psr;
        Ok(())
    }

    fn slot(mode: Mode, index: usize) -> usize {
        assert!(index <= 15, "Invalid register index: {index} (0x{index:X})");
        SLOT_TABLE[bank_of(mode)][index]
    }

    fn spsr_index(mode: Mode) -> Result<usize, CpuError> {
        match bank_of(mode) {
            0 => Err(CpuError::MissingSpsr(mode)),
            bank => Ok(bank - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_slot_is_reachable() {
        let mut seen = [false; PHYSICAL_REGISTERS];
        for mode in Mode::ALL {
            for index in 0..16 {
                seen[RegisterBank::slot(mode, index)] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn user_and_system_share_registers() {
        let mut bank = RegisterBank::default();
        for index in 0..16 {
            bank.write(Mode::User, index, index as u32 + 100);
        }
        for index in 0..16 {
            assert_eq!(bank.read(Mode::System, index), index as u32 + 100);
        }
    }

    #[test]
    fn banked_registers_are_isolated() {
        let mut bank = RegisterBank::default();
        let mut expected = [[0_u32; 16]; 7];

        for _ in 0..500 {
            let mode_index = rand::random::<u32>() as usize % Mode::ALL.len();
            let index = rand::random::<u32>() as usize % 16;
            let value: u32 = rand::random();
            let mode = Mode::ALL[mode_index];

            bank.write(mode, index, value);

            // Every mode that maps the same logical register onto the same
            // physical slot sees the write.
            for (m, other) in Mode::ALL.into_iter().enumerate() {
                if RegisterBank::slot(other, index) == RegisterBank::slot(mode, index) {
                    expected[m][index] = value;
                }
            }

            for (m, other) in Mode::ALL.into_iter().enumerate() {
                for i in 0..16 {
                    assert_eq!(bank.read(other, i), expected[m][i], "{other} R{i}");
                }
            }
        }
    }

    #[test]
    fn fiq_banks_r8_to_r14() {
        let mut bank = RegisterBank::default();
        for index in 8..=14 {
            bank.write(Mode::User, index, 1);
            bank.write(Mode::Fiq, index, 2);
            assert_eq!(bank.read(Mode::User, index), 1);
            assert_eq!(bank.read(Mode::Irq, index), if index < 13 { 1 } else { 0 });
        }
        bank.write(Mode::Fiq, 7, 7);
        assert_eq!(bank.read(Mode::User, 7), 7);
        bank.write(Mode::Supervisor, REG_PROGRAM_COUNTER, 0x100);
        assert_eq!(bank.read(Mode::Fiq, REG_PROGRAM_COUNTER), 0x100);
    }

    #[test]
    fn banked_slot_count() {
        let banked = (0..PHYSICAL_REGISTERS)
            .filter(|slot| {
                (0..16).all(|index| RegisterBank::slot(Mode::User, index) != *slot)
            })
            .count();
        assert_eq!(banked, 15);
    }

    #[test]
    fn spsr_per_exception_mode() {
        let mut bank = RegisterBank::default();
        let svc = Psr::try_from(0x6000_0013).unwrap();
        let irq = Psr::try_from(0x9000_0092).unwrap();

        bank.set_spsr(Mode::Supervisor, svc).unwrap();
        bank.set_spsr(Mode::Irq, irq).unwrap();

        assert_eq!(bank.spsr(Mode::Supervisor), Ok(svc));
        assert_eq!(bank.spsr(Mode::Irq), Ok(irq));
        assert_eq!(bank.spsr(Mode::Fiq), Ok(Psr::default()));
        assert_eq!(bank.spsr(Mode::User), Err(CpuError::MissingSpsr(Mode::User)));
        assert_eq!(
            bank.set_spsr(Mode::System, svc),
            Err(CpuError::MissingSpsr(Mode::System))
        );
    }

    #[test]
    #[should_panic(expected = "Invalid register index: 16")]
    fn index_out_of_range() {
        let bank = RegisterBank::default();
        let _ = bank.read(Mode::User, 16);
    }
}
