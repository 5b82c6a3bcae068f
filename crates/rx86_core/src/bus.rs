/*
    rx86
    Copyright 2025 The rx86 Authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    bus.rs

    Implements the flat memory array the CPU reads and writes.

    All addressable locations (code, data and stack) alias into one byte array,
    allocated once at construction. Every access is bounds-checked; multi-byte
    accesses are little-endian and fail as a whole if any byte falls outside memory.

*/

use crate::memerror::MemError;

pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self { data: vec![0; size] }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Return the byte range for an access of `len` bytes at `address`, or an error if any
    /// part of it lies past the end of memory.
    #[inline]
    fn range(&self, address: u32, len: usize) -> Result<std::ops::Range<usize>, MemError> {
        let start = address as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(MemError::OutOfBounds {
                address,
                len,
                size: self.data.len(),
            }),
        }
    }

    #[inline]
    pub fn read_u8(&self, address: u32) -> Result<u8, MemError> {
        let r = self.range(address, 1)?;
        Ok(self.data[r.start])
    }

    #[inline]
    pub fn read_u16(&self, address: u32) -> Result<u16, MemError> {
        let r = self.range(address, 2)?;
        Ok(u16::from_le_bytes([self.data[r.start], self.data[r.start + 1]]))
    }

    /// Read three bytes as the low 24 bits of a u32.
    #[inline]
    pub fn read_u24(&self, address: u32) -> Result<u32, MemError> {
        let r = self.range(address, 3)?;
        Ok(u32::from_le_bytes([
            self.data[r.start],
            self.data[r.start + 1],
            self.data[r.start + 2],
            0,
        ]))
    }

    #[inline]
    pub fn read_u32(&self, address: u32) -> Result<u32, MemError> {
        let r = self.range(address, 4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[r]);
        Ok(u32::from_le_bytes(bytes))
    }

    #[inline]
    pub fn read_u64(&self, address: u32) -> Result<u64, MemError> {
        let r = self.range(address, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[r]);
        Ok(u64::from_le_bytes(bytes))
    }

    #[inline]
    pub fn write_u8(&mut self, address: u32, data: u8) -> Result<(), MemError> {
        let r = self.range(address, 1)?;
        self.data[r.start] = data;
        Ok(())
    }

    #[inline]
    pub fn write_u16(&mut self, address: u32, data: u16) -> Result<(), MemError> {
        let r = self.range(address, 2)?;
        self.data[r].copy_from_slice(&data.to_le_bytes());
        Ok(())
    }

    #[inline]
    pub fn write_u32(&mut self, address: u32, data: u32) -> Result<(), MemError> {
        let r = self.range(address, 4)?;
        self.data[r].copy_from_slice(&data.to_le_bytes());
        Ok(())
    }

    /// Copy `bytes` into memory starting at `address`. Nothing is written unless the whole
    /// slice fits.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<usize, MemError> {
        let r = self.range(address, bytes.len())?;
        self.data[r].copy_from_slice(bytes);
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_access() {
        let mut mem = Memory::new(16);
        mem.write_u32(0, 0x12345678).unwrap();
        assert_eq!(mem.read_u8(0).unwrap(), 0x78);
        assert_eq!(mem.read_u16(0).unwrap(), 0x5678);
        assert_eq!(mem.read_u24(0).unwrap(), 0x345678);
        assert_eq!(mem.read_u32(0).unwrap(), 0x12345678);

        mem.write_u16(8, 0xBEEF).unwrap();
        assert_eq!(mem.read_u8(8).unwrap(), 0xEF);
        assert_eq!(mem.read_u8(9).unwrap(), 0xBE);
    }

    #[test]
    fn test_bounds() {
        let mut mem = Memory::new(16);
        assert!(mem.read_u8(15).is_ok());
        assert_eq!(
            mem.read_u8(16),
            Err(MemError::OutOfBounds {
                address: 16,
                len: 1,
                size: 16
            })
        );
        // A dword straddling the end fails as a whole.
        assert!(mem.read_u32(13).is_err());
        assert!(mem.write_u32(13, 0xFFFF_FFFF).is_err());
        assert_eq!(mem.read_u8(13).unwrap(), 0);
        // No wraparound at the top of the address space.
        assert!(mem.read_u16(u32::MAX).is_err());
    }

    #[test]
    fn test_load_is_all_or_nothing() {
        let mut mem = Memory::new(8);
        assert_eq!(mem.load(4, &[1, 2, 3, 4]).unwrap(), 4);
        assert!(mem.load(6, &[9, 9, 9]).is_err());
        assert_eq!(mem.read_u32(4).unwrap(), 0x0403_0201);
    }
}
