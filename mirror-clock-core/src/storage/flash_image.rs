use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;
use mirror_clock_common::*;

/// Bytes collected before each program operation.
pub const STAGE_LEN: usize = 256;

const ERASED: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashOp {
    Erase,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashImageError {
    #[error("image region holds {available} bytes, {requested} requested")]
    CapacityExceeded { requested: u32, available: u32 },
    #[error("flash geometry does not fit the image region")]
    UnsupportedGeometry,
    #[error("no image is open")]
    NotOpen,
    #[error("declared size {declared} does not match {written} bytes written")]
    SizeMismatch { declared: u32, written: u32 },
    #[error("flash {0:?} failed")]
    Flash(FlashOp),
}

/// Streams an image into a NOR flash region.
///
/// Sectors are erased lazily just ahead of the write position and data is
/// programmed in `STAGE_LEN` blocks; the tail block is padded with the
/// erased value.
pub struct FlashImageWriter<F: NorFlash> {
    flash: F,
    base: u32,
    region_len: u32,
    capacity: u32,
    written: u32,
    flushed: u32,
    erased_until: u32,
    stage: Vec<u8, STAGE_LEN>,
    open: bool,
    failed: bool,
    image_len: Option<u32>,
}

impl<F: NorFlash> FlashImageWriter<F> {
    /// `base` and `region_len` describe the slot reserved for the next image.
    pub fn new(flash: F, base: u32, region_len: u32) -> Self {
        Self {
            flash,
            base,
            region_len,
            capacity: 0,
            written: 0,
            flushed: 0,
            erased_until: base,
            stage: Vec::new(),
            open: false,
            failed: false,
            image_len: None,
        }
    }

    /// Length of the last sealed image.
    pub fn image_len(&self) -> Option<u32> {
        self.image_len
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    fn open(&mut self, capacity: u32) -> Result<(), FlashImageError> {
        let sector = F::ERASE_SIZE as u32;
        if STAGE_LEN % F::WRITE_SIZE != 0
            || self.base % sector != 0
            || self.region_len % sector != 0
        {
            return Err(FlashImageError::UnsupportedGeometry);
        }
        if capacity > self.region_len {
            return Err(FlashImageError::CapacityExceeded {
                requested: capacity,
                available: self.region_len,
            });
        }

        self.capacity = capacity;
        self.written = 0;
        self.flushed = 0;
        self.erased_until = self.base;
        self.stage.clear();
        self.open = true;
        self.failed = false;
        self.image_len = None;
        Ok(())
    }

    fn flush_stage(&mut self) -> Result<(), FlashImageError> {
        if self.stage.is_empty() {
            return Ok(());
        }

        while self.stage.len() % F::WRITE_SIZE != 0 {
            self.stage.push(ERASED).ok();
        }

        let offset = self.base + self.flushed;
        self.erase_through(offset + self.stage.len() as u32)?;
        self.flash
            .write(offset, &self.stage)
            .map_err(|_| FlashImageError::Flash(FlashOp::Write))?;

        self.flushed += self.stage.len() as u32;
        self.stage.clear();
        Ok(())
    }

    /// Erases whole sectors up to `end`, never past the slot.
    fn erase_through(&mut self, end: u32) -> Result<(), FlashImageError> {
        let slot_end = self.base + self.region_len;
        while self.erased_until < end {
            let from = self.erased_until;
            let to = from + F::ERASE_SIZE as u32;
            if to > slot_end {
                return Err(FlashImageError::UnsupportedGeometry);
            }
            self.flash
                .erase(from, to)
                .map_err(|_| FlashImageError::Flash(FlashOp::Erase))?;
            trace!("Erased sector {:#x}..{:#x}", from, to);
            self.erased_until = to;
        }
        Ok(())
    }
}

impl<F: NorFlash> FirmwareWriter for FlashImageWriter<F> {
    type Error = FlashImageError;

    fn free_space(&self) -> u32 {
        self.region_len
    }

    fn begin(&mut self, capacity: u32) -> Result<(), Self::Error> {
        self.open(capacity)?;
        debug!("Image slot at {:#x} opened for {} bytes", self.base, capacity);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        if !self.open || self.failed {
            return 0;
        }

        let room = (self.capacity - self.written) as usize;
        let mut input = &chunk[..chunk.len().min(room)];
        let mut accepted = 0;

        while !input.is_empty() {
            let take = (STAGE_LEN - self.stage.len()).min(input.len());
            self.stage.extend_from_slice(&input[..take]).ok();
            input = &input[take..];

            if self.stage.is_full() && self.flush_stage().is_err() {
                warn!("Flash write failed at offset {}", self.flushed);
                self.failed = true;
                break;
            }
            accepted += take;
        }

        self.written += accepted as u32;
        accepted
    }

    fn finish(&mut self, declared_size: u32) -> Result<(), Self::Error> {
        if !self.open || self.failed {
            return Err(FlashImageError::NotOpen);
        }
        if declared_size != self.written {
            self.abort();
            return Err(FlashImageError::SizeMismatch {
                declared: declared_size,
                written: self.written,
            });
        }

        self.flush_stage()?;
        self.open = false;
        self.image_len = Some(self.written);
        info!("Image of {} bytes sealed", self.written);
        Ok(())
    }

    fn abort(&mut self) {
        if self.open {
            debug!("Image discarded after {} bytes", self.written);
        }
        self.open = false;
        self.stage.clear();
        self.image_len = None;
    }
}
