use crate::bitwise::Bits;
use crate::cpu::arm::instructions::{ArmInstructionKind, ArmModeInstruction};
use crate::cpu::condition::Condition;
use crate::error::CpuError;

/// A fully decoded ARM word: what to do, when to do it, and the raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmModeOpcode {
    pub instruction: ArmModeInstruction,
    pub condition: Condition,
    pub raw: u32,
}

impl ArmModeOpcode {
    /// Builds an opcode that always executes. Thumb instructions translate
    /// into these.
    #[must_use]
    pub const fn always(instruction: ArmModeInstruction, raw: u32) -> Self {
        Self {
            instruction,
            condition: Condition::AL,
            raw,
        }
    }
}

impl TryFrom<u32> for ArmModeOpcode {
    type Error = CpuError;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        Self::decode(ArmInstructionKind::from(op_code), op_code)
    }
}

impl ArmModeOpcode {
    /// Decodes a word whose category is already known.
    ///
    /// # Errors
    ///
    /// [`CpuError::ReservedCondition`] for the `NV` field, or whatever the
    /// category's field extraction reports.
    pub fn decode(kind: ArmInstructionKind, op_code: u32) -> Result<Self, CpuError> {
        Ok(Self {
            condition: Condition::try_from(op_code.get_bits(28..=31))?,
            instruction: ArmModeInstruction::decode(kind, op_code)?,
            raw: op_code,
        })
    }
}

impl std::ops::Deref for ArmModeOpcode {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl std::fmt::Display for ArmModeOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = format!("INS: {}\n", self.instruction);

        let bytes_pos1 = "POS: |..3 ..................2 ..................1 ..................0|\n";
        let bytes_pos2 = "     |1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0|\n";

        let op_code_format = match &self.instruction {
            ArmModeInstruction::DataProcessing(_) => {
                "FMT: |_Cond__|0_0|I|_code__|S|__Rn___|__Rd___|_______operand2________|"
            }
            ArmModeInstruction::PsrTransferOut { .. } => {
                "FMT: |_Cond__|0_0_0_1_0|P|0_0_1_1_1_1|__Rd___|0_0_0_0_0_0_0_0_0_0_0_0|"
            }
            ArmModeInstruction::PsrTransferIn { .. } => {
                "FMT: |_Cond__|0_0|I|1_0|P|1_0|f|0_0|c|1_1_1_1|_______operand2________|"
            }
            ArmModeInstruction::Multiply { .. } => {
                "FMT: |_Cond__|0_0_0_0_0_0|A|S|__Rd___|__Rn___|__Rs___|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::MultiplyLong { .. } => {
                "FMT: |_Cond__|0_0_0_0_1|U|A|S|_RdHi__|_RdLo__|__Rs___|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::SingleDataSwap { .. } => {
                "FMT: |_Cond__|0_0_0_1_0|B|0_0|__Rn___|__Rd___|0_0_0_0|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::BranchAndExchange { .. } => {
                "FMT: |_Cond__|0_0_0_1|0_0_1_0|1_1_1_1|1_1_1_1|1_1_1_1|0_0_0_1|__Rn___|"
            }
            ArmModeInstruction::HalfwordDataTransfer { .. } => {
                "FMT: |_Cond__|0_0_0|P|U|I|W|L|__Rn___|__Rd___|_Offset|1|S|H|1|_Offset|"
            }
            ArmModeInstruction::SingleDataTransfer { .. } => {
                "FMT: |_Cond__|0_1|I|P|U|B|W|L|__Rn___|__Rd___|________Offset_________|"
            }
            ArmModeInstruction::BlockDataTransfer { .. } => {
                "FMT: |_Cond__|1_0_0|P|U|S|W|L|__Rn___|_____________Reg_List__________|"
            }
            ArmModeInstruction::Branch { .. } => {
                "FMT: |_Cond__|1_0_1|L|___________________Offset______________________|"
            }
            ArmModeInstruction::SoftwareInterrupt => {
                "FMT: |_Cond__|1_1_1_1|_____________Ignored by processor______________|"
            }
            ArmModeInstruction::Unimplemented(_) => "FMT: |_Cond__|",
        };

        let mut raw_bits = String::new();
        for i in (0..32).rev() {
            raw_bits.push_str(if self.raw.get_bit(i) { "1" } else { "0" });
            if i > 0 {
                raw_bits.push('_');
            }
        }

        write!(
            f,
            "{instruction}{bytes_pos1}{bytes_pos2}{op_code_format}\nBIN: |{raw_bits}|"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nv_condition_is_reserved() {
        assert_eq!(
            ArmModeOpcode::try_from(0xF000_0000),
            Err(CpuError::ReservedCondition { field: 0xF })
        );
    }

    #[test]
    fn decode_with_known_kind() {
        let word = 0xE3A0_0001;
        assert_eq!(
            ArmModeOpcode::decode(ArmInstructionKind::from(word), word),
            ArmModeOpcode::try_from(word)
        );
        assert_eq!(
            ArmModeOpcode::decode(ArmInstructionKind::DataProcessing, 0xF3A0_0001),
            Err(CpuError::ReservedCondition { field: 0xF })
        );
    }

    #[test]
    fn condition_is_split_from_instruction() {
        let op_code = ArmModeOpcode::try_from(0x0A00_0000).unwrap();
        assert_eq!(op_code.condition, Condition::EQ);
        assert_eq!(*op_code, 0x0A00_0000);
        assert!(matches!(
            op_code.instruction,
            ArmModeInstruction::Branch { link: false, offset: 0, .. }
        ));
    }

    #[test]
    fn display_shows_format_and_bits() {
        let op_code = ArmModeOpcode::try_from(0xEF00_0000).unwrap();
        let text = op_code.to_string();
        assert!(text.starts_with("INS: SWI\n"));
        assert!(text.contains("Ignored by processor"));
        assert!(text.ends_with("|1_1_1_0_1_1_1_1_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0_0|"));
    }
}
