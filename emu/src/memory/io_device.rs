/// Byte-addressable store the CPU reads from and writes to.
///
/// Accesses never fail: unmapped addresses are the implementor's business.
pub trait IoDevice {
    fn read_at(&self, address: u32) -> u8;

    fn write_at(&mut self, address: u32, value: u8);

    fn read_half_word(&self, address: u32) -> u16 {
        let low = self.read_at(address);
        let high = self.read_at(address.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    fn read_word(&self, address: u32) -> u32 {
        let mut bytes = [0; 4];
        for (offset, byte) in (0..).zip(bytes.iter_mut()) {
            *byte = self.read_at(address.wrapping_add(offset));
        }
        u32::from_le_bytes(bytes)
    }

    fn write_half_word(&mut self, address: u32, value: u16) {
        for (offset, byte) in (0..).zip(value.to_le_bytes()) {
            self.write_at(address.wrapping_add(offset), byte);
        }
    }

    fn write_word(&mut self, address: u32, value: u32) {
        for (offset, byte) in (0..).zip(value.to_le_bytes()) {
            self.write_at(address.wrapping_add(offset), byte);
        }
    }
}

impl<T: IoDevice + ?Sized> IoDevice for &mut T {
    fn read_at(&self, address: u32) -> u8 {
        (**self).read_at(address)
    }

    fn write_at(&mut self, address: u32, value: u8) {
        (**self).write_at(address, value);
    }
}

impl<T: IoDevice + ?Sized> IoDevice for Box<T> {
    fn read_at(&self, address: u32) -> u8 {
        (**self).read_at(address)
    }

    fn write_at(&mut self, address: u32, value: u8) {
        (**self).write_at(address, value);
    }
}
