//! File-backed flash image

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flashloader_core::backend::FlashMemory;
use flashloader_core::flash::SECTOR_SIZE;
use flashloader_core::{Error, Result};

use super::io_failed;

const ERASED: u8 = 0xFF;

/// Flash emulated by a file on disk
///
/// Follows NOR semantics like the real part: erase sets a sector to 0xFF and
/// programming can only clear bits.
pub struct ImageFlash {
    file: File,
    path: PathBuf,
    size: u32,
    max_write_len: usize,
}

impl ImageFlash {
    /// Open or create the image at `path`
    ///
    /// A new or short image is padded with erased bytes up to `size`.
    pub fn open(path: &Path, size: u32, max_write_len: usize) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len < u64::from(size) {
            log::debug!(
                "Padding {} from {} to {} bytes",
                path.display(),
                len,
                size
            );
            file.seek(SeekFrom::Start(len))?;
            let pad = vec![ERASED; (u64::from(size) - len) as usize];
            file.write_all(&pad)?;
            file.flush()?;
        } else if len > u64::from(size) {
            log::warn!(
                "{} is {} bytes, only the first {} are used",
                path.display(),
                len,
                size
            );
        }

        log::info!(
            "Using {} as {} KiB flash",
            path.display(),
            size / 1024
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
            max_write_len,
        })
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        let end = u64::from(addr) + len as u64;
        if end > u64::from(self.size) {
            log::error!(
                "Access 0x{:08X}..0x{:08X} beyond {} byte flash",
                addr,
                end,
                self.size
            );
            return Err(Error::TooLarge);
        }
        Ok(())
    }

    fn read_at(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(u64::from(addr)))?;
        self.file.read_exact(buf)
    }

    fn write_at(&mut self, addr: u32, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(u64::from(addr)))?;
        self.file.write_all(data)
    }
}

impl FlashMemory for ImageFlash {
    fn size(&self) -> u32 {
        self.size
    }

    fn max_write_len(&self) -> usize {
        self.max_write_len
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        let start = addr & !(SECTOR_SIZE - 1);
        let len = SECTOR_SIZE.min(self.size.saturating_sub(start)) as usize;
        self.check_range(start, len)?;
        log::trace!("Erasing sector at 0x{:08X}", start);
        self.write_at(start, &vec![ERASED; len])
            .map_err(|e| io_failed(&format!("Erase in {}", self.path.display()), e))
    }

    fn write_chunk(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.len() > self.max_write_len {
            log::error!(
                "Chunk of {} bytes exceeds write limit {}",
                data.len(),
                self.max_write_len
            );
            return Err(Error::IoFailed);
        }
        self.check_range(addr, data.len())?;

        let mut cells = vec![0u8; data.len()];
        let programmed = self.read_at(addr, &mut cells).and_then(|()| {
            for (cell, &byte) in cells.iter_mut().zip(data) {
                *cell &= byte;
            }
            self.write_at(addr, &cells)
        });
        programmed.map_err(|e| io_failed(&format!("Write to {}", self.path.display()), e))
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        self.read_at(addr, buf)
            .map_err(|e| io_failed(&format!("Read from {}", self.path.display()), e))
    }
}
