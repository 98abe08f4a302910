//! Shared flash programming primitives
//!
//! Erase sizing and chunked writes used by both the streamed transfer path
//! and the local installer.

use crate::backend::FlashMemory;
use crate::error::{Error, Result};
use crate::progress::ProgressReporter;

/// Erase granule of the flash in bytes
pub const SECTOR_SIZE: u32 = 64 * 1024;

/// Largest single verify read
const VERIFY_CHUNK_SIZE: usize = 256;

/// Number of sectors erased before writing an image of `image_size` bytes
///
/// This is always one more than the number of whole sectors in the image,
/// so an image that is an exact multiple of the sector size still erases
/// one trailing sector.
pub fn sector_count(image_size: u32) -> u32 {
    image_size / SECTOR_SIZE + 1
}

/// Erase the sectors needed for an image of `image_size` bytes
///
/// Sectors `0..sector_count(image_size)` are erased in order. Progress is
/// reported per sector against the sector count.
///
/// # Errors
/// * `TooLarge` - If the erase would extend beyond the flash
/// * `IoFailed` - If a sector erase fails
pub fn erase_for_image<M: FlashMemory + ?Sized>(
    flash: &mut M,
    image_size: u32,
    progress: &mut dyn ProgressReporter,
) -> Result<u32> {
    if image_size > flash.size() {
        return Err(Error::TooLarge);
    }
    let count = sector_count(image_size);

    progress.show("Erasing flash sectors...", count);

    for sector in 0..count {
        let addr = sector * SECTOR_SIZE;
        // The trailing sector may not exist on a full-size image
        if addr >= flash.size() {
            log::debug!("Skipping sector 0x{:08X} beyond end of flash", addr);
        } else {
            flash.erase_sector(addr).map_err(|e| {
                log::error!("Erase failed at 0x{:08X}: {}", addr, e);
                Error::IoFailed
            })?;
        }
        progress.update(sector + 1);
    }

    log::debug!("Erased {} sectors", count);
    Ok(count)
}

/// Write `data` at `addr`, split into chunks the backend accepts
///
/// # Errors
/// * `IoFailed` - If any chunk write fails
pub fn write_chunked<M: FlashMemory + ?Sized>(flash: &mut M, addr: u32, data: &[u8]) -> Result<()> {
    let max = flash.max_write_len().max(1);
    let mut offset = addr;
    for chunk in data.chunks(max) {
        flash.write_chunk(offset, chunk).map_err(|e| {
            log::error!("Write failed at 0x{:08X}: {}", offset, e);
            Error::IoFailed
        })?;
        offset += chunk.len() as u32;
    }
    Ok(())
}

/// Read back `expected.len()` bytes at `addr` and compare
///
/// # Errors
/// * `IoFailed` - If the read fails
/// * `VerifyFailed` - If the contents differ, carrying the mismatching address
pub fn verify<M: FlashMemory + ?Sized>(flash: &mut M, addr: u32, expected: &[u8]) -> Result<()> {
    let mut buf = [0u8; VERIFY_CHUNK_SIZE];
    let mut offset = addr;
    for want in expected.chunks(VERIFY_CHUNK_SIZE) {
        let have = &mut buf[..want.len()];
        flash.read(offset, have).map_err(|_| Error::IoFailed)?;
        if let Some(i) = have.iter().zip(want).position(|(h, w)| h != w) {
            let addr = offset + i as u32;
            log::error!(
                "Verify mismatch at 0x{:08X}: expected 0x{:02X}, found 0x{:02X}",
                addr,
                want[i],
                have[i]
            );
            return Err(Error::VerifyFailed { addr });
        }
        offset += want.len() as u32;
    }
    Ok(())
}
