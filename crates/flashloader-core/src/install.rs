//! Local flash installer
//!
//! Copies a whole image file from removable storage into flash. Unlike the
//! streamed path this erases the sectors it needs before writing.
//!
//! There is no rollback: if a read or write fails the flash is left
//! partially erased or written and its contents are undefined.

use crate::backend::{FlashMemory, OpenFlags, Storage, StorageFile};
use crate::error::{Error, Result};
use crate::flash;
use crate::progress::ProgressReporter;

/// Bytes read from storage per copy step
pub const COPY_CHUNK_SIZE: usize = 4 * 1024;

/// Options for [`install_from_storage`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Read back every chunk after writing it
    pub verify: bool,
}

/// Summary of a completed install
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallStats {
    /// Number of sectors erased
    pub sectors_erased: u32,
    /// Number of image bytes written
    pub bytes_written: u32,
}

/// Install the image `name` from `storage` into `flash`
///
/// # Errors
/// * `NotFound` / `OpenFailed` - If the file cannot be opened
/// * `TooLarge` - If the image does not fit into flash
/// * `IoFailed` - If an erase, read or write fails
/// * `VerifyFailed` - If verification is enabled and a chunk reads back wrong
pub fn install_from_storage<S, M>(
    storage: &mut S,
    flash: &mut M,
    name: &str,
    progress: &mut dyn ProgressReporter,
    options: InstallOptions,
) -> Result<InstallStats>
where
    S: Storage + ?Sized,
    M: FlashMemory + ?Sized,
{
    let mut file = storage.open(name, OpenFlags::READ).map_err(|e| {
        log::error!("Failed to open {}: {}", name, e);
        e
    })?;

    let total = file.size();
    log::info!("Installing {} ({} bytes)", name, total);

    let sectors_erased = flash::erase_for_image(flash, total, progress)?;

    progress.show("Copying from SD card to flash...", total);

    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut flashed: u32 = 0;
    while flashed < total {
        let n = file.read(&mut buf).map_err(|e| {
            log::error!("Read failed at offset {}: {}", flashed, e);
            Error::IoFailed
        })?;
        if n == 0 {
            log::error!("Unexpected end of {} at {} of {} bytes", name, flashed, total);
            return Err(Error::IoFailed);
        }

        // Never write past the size the erase was planned for
        let n = n.min((total - flashed) as usize);
        let chunk = &buf[..n];
        flash::write_chunked(flash, flashed, chunk)?;
        if options.verify {
            flash::verify(flash, flashed, chunk)?;
        }

        flashed += n as u32;
        progress.update(flashed);
    }

    file.close().map_err(|_| Error::IoFailed)?;
    progress.hide();

    log::info!("Installed {} bytes, {} sectors erased", flashed, sectors_erased);
    Ok(InstallStats {
        sectors_erased,
        bytes_written: flashed,
    })
}
