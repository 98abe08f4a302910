//! Host-side stand-ins for the device's storage and flash
//!
//! A directory plays the removable storage and a file plays the flash, so
//! the device side can be run and inspected on a development machine.

mod dir_storage;
mod image_flash;

pub use dir_storage::{DirFile, DirStorage};
pub use image_flash::ImageFlash;

use flashloader_core::Error;

/// Log an I/O error and collapse it to the core taxonomy
pub(crate) fn io_failed(context: &str, err: std::io::Error) -> Error {
    log::error!("{}: {}", context, err);
    Error::IoFailed
}
