//! # Thumb Instruction Set (16-bit)
//!
//! Thumb is decoded into its own formats and then executed through the ARM
//! handlers.
//!
//! - [`instruction`] - Classification and field decoding
//! - [`mode`] - Opcode wrapper
//! - [`operations`] - Translation to ARM
//! - [`alu_instructions`] - Format 3, 4 and 5 opcodes

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod instruction;
pub mod mode;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod operations;
