/// Target storage for an incoming firmware image.
///
/// Owned exclusively by the update pipeline; nothing else writes to it while
/// an image is open.
pub trait FirmwareWriter {
    type Error: core::fmt::Debug;

    /// Bytes available for a new image before any margin is applied.
    fn free_space(&self) -> u32;

    /// Opens the target for an image of at most `capacity` bytes.
    fn begin(&mut self, capacity: u32) -> Result<(), Self::Error>;

    /// Appends `chunk` and returns how many bytes were accepted. A count
    /// below `chunk.len()` means the target failed or is full.
    fn write(&mut self, chunk: &[u8]) -> usize;

    /// Validates the image against `declared_size` and marks it bootable.
    fn finish(&mut self, declared_size: u32) -> Result<(), Self::Error>;

    /// Drops the partially written image.
    fn abort(&mut self);
}
