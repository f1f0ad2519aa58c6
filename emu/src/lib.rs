#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

pub mod cpu;
pub mod error;

#[allow(clippy::cast_possible_truncation)]
pub mod memory;

pub use error::CpuError;
