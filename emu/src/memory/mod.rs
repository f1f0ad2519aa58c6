//! # Memory Contract
//!
//! The core only needs a byte-addressable store. Everything wider than a byte
//! is synthesized little-endian on top of [`IoDevice::read_at`] and
//! [`IoDevice::write_at`], so any backing (flat array, paged, memory-mapped)
//! works as long as it implements those two methods.
//!
//! [`FlatMemory`] is the paged store used by the runner and the tests.

mod flat_memory;
mod io_device;

pub use flat_memory::{DISPLAY_BUFFER_ADDRESS, DISPLAY_BUFFER_SIZE, FlatMemory};
pub use io_device::IoDevice;
