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

    cpu_x86::fetch.rs

    Memory access and instruction fetch.

    The fetch_* routines are the only way instruction bytes are consumed: each
    reads at eip and advances eip by the width read. eip is left unchanged if
    the read faults.

*/

use std::io::Read;

use crate::{cpu_common::error::CpuError, cpu_x86::CpuX86};

impl CpuX86 {
    #[inline]
    pub fn load_byte_at(&self, addr: u32) -> Result<u8, CpuError> {
        Ok(self.mem.read_u8(addr)?)
    }

    #[inline]
    pub fn load_word_at(&self, addr: u32) -> Result<u16, CpuError> {
        Ok(self.mem.read_u16(addr)?)
    }

    /// Three bytes, little-endian, in the low 24 bits.
    #[inline]
    pub fn load_24_at(&self, addr: u32) -> Result<u32, CpuError> {
        Ok(self.mem.read_u24(addr)?)
    }

    #[inline]
    pub fn load_dword_at(&self, addr: u32) -> Result<u32, CpuError> {
        Ok(self.mem.read_u32(addr)?)
    }

    #[inline]
    pub fn fetch_u8(&mut self) -> Result<u8, CpuError> {
        let byte = self.load_byte_at(self.eip)?;
        self.eip = self.eip.wrapping_add(1);
        Ok(byte)
    }

    #[inline]
    pub fn fetch_i8(&mut self) -> Result<i8, CpuError> {
        Ok(self.fetch_u8()? as i8)
    }

    #[inline]
    pub fn fetch_u16(&mut self) -> Result<u16, CpuError> {
        let word = self.load_word_at(self.eip)?;
        self.eip = self.eip.wrapping_add(2);
        Ok(word)
    }

    #[inline]
    pub fn fetch_u24(&mut self) -> Result<u32, CpuError> {
        let value = self.load_24_at(self.eip)?;
        self.eip = self.eip.wrapping_add(3);
        Ok(value)
    }

    #[inline]
    pub fn fetch_u32(&mut self) -> Result<u32, CpuError> {
        let dword = self.load_dword_at(self.eip)?;
        self.eip = self.eip.wrapping_add(4);
        Ok(dword)
    }

    /// Store a single byte. Used by image loading, not by instruction execution.
    #[inline]
    pub fn store_byte(&mut self, addr: u32, value: u8) -> Result<(), CpuError> {
        Ok(self.mem.write_u8(addr, value)?)
    }

    /// Copy an already-read image into memory at `addr`. Returns the number of bytes
    /// written. An image that does not fit is rejected whole with a MemoryFault.
    pub fn load_program(&mut self, addr: u32, bytes: &[u8]) -> Result<usize, CpuError> {
        let written = self.mem.load(addr, bytes)?;
        log::debug!("Loaded {} bytes at {:08X}", written, addr);
        Ok(written)
    }

    /// Stream an image from `reader` into memory at `addr`. Read failures surface as
    /// CpuError::IoError.
    pub fn load_program_from_reader(&mut self, addr: u32, mut reader: impl Read) -> Result<usize, CpuError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.load_program(addr, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
        }
    }

    #[test]
    fn test_fetch_advances_eip() {
        let mut cpu = CpuX86::new(0x100);
        cpu.load_program(0x10, &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A])
            .unwrap();
        cpu.set_eip(0x10);
        assert_eq!(cpu.fetch_u8().unwrap(), 0x01);
        assert_eq!(cpu.eip(), 0x11);
        assert_eq!(cpu.fetch_u16().unwrap(), 0x0302);
        assert_eq!(cpu.eip(), 0x13);
        assert_eq!(cpu.fetch_u24().unwrap(), 0x060504);
        assert_eq!(cpu.eip(), 0x16);
        assert_eq!(cpu.fetch_u32().unwrap(), 0x0A090807);
        assert_eq!(cpu.eip(), 0x1A);
    }

    #[test]
    fn test_fetch_fault_leaves_eip() {
        let mut cpu = CpuX86::new(0x10);
        cpu.set_eip(0x0E);
        assert!(matches!(cpu.fetch_u32(), Err(CpuError::MemoryFault { address: 0x0E, size: 0x10 })));
        assert_eq!(cpu.eip(), 0x0E);
        assert_eq!(cpu.fetch_u16().unwrap(), 0);
        assert!(matches!(cpu.fetch_u8(), Err(CpuError::MemoryFault { address: 0x10, .. })));
    }

    #[test]
    fn test_load_program() {
        let mut cpu = CpuX86::new(0x10);
        assert_eq!(cpu.load_program(0x0C, &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap(), 4);
        assert_eq!(cpu.load_dword_at(0x0C).unwrap(), 0xDDCC_BBAA);
        assert!(matches!(cpu.load_program(0x0D, &[0; 4]), Err(CpuError::MemoryFault { .. })));

        cpu.store_byte(0, 0x90).unwrap();
        assert_eq!(cpu.load_byte_at(0).unwrap(), 0x90);
        assert!(cpu.store_byte(0x10, 0x90).is_err());
    }

    #[test]
    fn test_load_program_from_reader() {
        let mut cpu = CpuX86::new(0x10);
        let written = cpu.load_program_from_reader(4, &[0xB8, 0x01, 0x00][..]).unwrap();
        assert_eq!(written, 3);
        assert_eq!(cpu.load_24_at(4).unwrap(), 0x0001B8);

        assert!(matches!(
            cpu.load_program_from_reader(0, FailingReader),
            Err(CpuError::IoError(_))
        ));
    }
}
