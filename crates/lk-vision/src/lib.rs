//! QR imaging for student stickers: rendering codes and finding them in photos.
//!
//! Everything here is synchronous and CPU-bound. Async callers should run
//! [`scanner::QrScanner`] on a blocking thread.

pub mod decoder;
pub mod encoder;
pub mod preprocess;
pub mod region;
pub mod scanner;
