mod flash_image;

pub use flash_image::{FlashImageError, FlashImageWriter, FlashOp, STAGE_LEN};
