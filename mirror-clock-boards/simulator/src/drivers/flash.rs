use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use mirror_clock_common::*;

const ERASED: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashError(NorFlashErrorKind);

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        self.0
    }
}

/// NOR flash kept in memory, optionally mirrored into a host file.
pub struct SimulatedFlash {
    data: Vec<u8>,
    mirror: Option<File>,
}

impl SimulatedFlash {
    pub fn new(size: u32) -> Self {
        Self {
            data: vec![ERASED; size as usize],
            mirror: None,
        }
    }

    /// Mirrors every program and erase into `path`.
    pub fn with_mirror(size: u32, path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        file.set_len(u64::from(size))?;
        let mut flash = Self::new(size);
        flash.mirror = Some(file);
        flash.sync(0, size)?;
        Ok(flash)
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, offset: u32, len: usize, align: usize) -> Result<core::ops::Range<usize>, FlashError> {
        let start = offset as usize;
        if start % align != 0 || len % align != 0 {
            return Err(FlashError(NorFlashErrorKind::NotAligned));
        }
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(FlashError(NorFlashErrorKind::OutOfBounds))?;
        Ok(start..end)
    }

    fn sync(&mut self, from: u32, to: u32) -> std::io::Result<()> {
        let Some(file) = self.mirror.as_mut() else {
            return Ok(());
        };
        file.seek(SeekFrom::Start(u64::from(from)))?;
        file.write_all(&self.data[from as usize..to as usize])
    }

    fn mirror_range(&mut self, from: u32, to: u32) {
        if let Err(e) = self.sync(from, to) {
            warn!("[Simulator Flash] Mirror write failed: {}", e);
        }
    }
}

impl ErrorType for SimulatedFlash {
    type Error = FlashError;
}

impl ReadNorFlash for SimulatedFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len(), Self::READ_SIZE)?;
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for SimulatedFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 4096;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let len = (to as usize)
            .checked_sub(from as usize)
            .ok_or(FlashError(NorFlashErrorKind::OutOfBounds))?;
        let range = self.range(from, len, Self::ERASE_SIZE)?;
        self.data[range].fill(ERASED);
        self.mirror_range(from, to);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len(), Self::WRITE_SIZE)?;
        // NOR programming only clears bits.
        for (cell, byte) in self.data[range].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        self.mirror_range(offset, offset + bytes.len() as u32);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_clears_bits_until_erased() {
        let mut flash = SimulatedFlash::new(8192);
        flash.write(0, &[0x0F, 0xF0, 0x00, 0xFF]).unwrap();
        flash.write(0, &[0xF0, 0xF0, 0xFF, 0xFF]).unwrap();
        assert_eq!(&flash.contents()[..4], &[0x00, 0xF0, 0x00, 0xFF]);

        flash.erase(0, 4096).unwrap();
        assert_eq!(&flash.contents()[..4], &[ERASED; 4]);
    }

    #[test]
    fn rejects_unaligned_and_out_of_range_access() {
        let mut flash = SimulatedFlash::new(4096);
        assert_eq!(
            flash.write(2, &[0; 4]).unwrap_err().kind(),
            NorFlashErrorKind::NotAligned
        );
        assert_eq!(
            flash.write(4096, &[0; 4]).unwrap_err().kind(),
            NorFlashErrorKind::OutOfBounds
        );
        assert_eq!(
            flash.erase(0, 8192).unwrap_err().kind(),
            NorFlashErrorKind::OutOfBounds
        );
    }
}
