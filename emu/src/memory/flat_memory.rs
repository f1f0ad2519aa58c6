use std::collections::HashMap;

use crate::memory::IoDevice;

/// Start of the 240x160 RGBA8888 frame written by guest code.
pub const DISPLAY_BUFFER_ADDRESS: u32 = 0x4000_0000;

/// 240 * 160 pixels, 4 bytes each.
pub const DISPLAY_BUFFER_SIZE: usize = 240 * 160 * 4;

const PAGE_BITS: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_BITS;
const PAGE_MASK: u32 = (1 << PAGE_BITS) - 1;

type Page = Box<[u8; PAGE_SIZE]>;

/// A 4 GiB address space backed by pages allocated on first write.
///
/// Reads from a page that was never written return 0.
#[derive(Default)]
pub struct FlatMemory {
    pages: HashMap<u32, Page>,
}

impl FlatMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies a BIOS/ROM image at address 0. Done once before the first step.
    pub fn load_bios(&mut self, bios: &[u8]) {
        tracing::info!("loading {} bytes of BIOS at 0x00000000", bios.len());
        self.load_at(0, bios);
    }

    /// Bulk write of `data` starting at `address`, wrapping at the top of
    /// the address space.
    pub fn load_at(&mut self, address: u32, data: &[u8]) {
        for (offset, byte) in (0_u32..).zip(data) {
            self.write_at(address.wrapping_add(offset), *byte);
        }
    }

    /// Copy of the RGBA8888 frame region.
    #[must_use]
    pub fn display_buffer(&self) -> Vec<u8> {
        (0..DISPLAY_BUFFER_SIZE as u32)
            .map(|offset| self.read_at(DISPLAY_BUFFER_ADDRESS + offset))
            .collect()
    }

    fn page_mut(&mut self, address: u32) -> &mut Page {
        self.pages
            .entry(address >> PAGE_BITS)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]))
    }
}

impl IoDevice for FlatMemory {
    fn read_at(&self, address: u32) -> u8 {
        self.pages
            .get(&(address >> PAGE_BITS))
            .map_or(0, |page| page[(address & PAGE_MASK) as usize])
    }

    fn write_at(&mut self, address: u32, value: u8) {
        self.page_mut(address)[(address & PAGE_MASK) as usize] = value;
    }
}
