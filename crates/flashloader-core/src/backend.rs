//! Storage and flash backend traits
//!
//! The transfer engine and the installer never touch hardware directly.
//! Removable storage is reached through [`Storage`] and its file handles,
//! execute-in-place flash through [`FlashMemory`].

use crate::error::Result;
use bitflags::bitflags;

bitflags! {
    /// Mode flags for [`Storage::open`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        /// Open for reading
        const READ = 1 << 0;
        /// Open for writing
        const WRITE = 1 << 1;
        /// Create the file, truncating it if it exists
        const CREATE_ALWAYS = 1 << 2;
    }
}

impl OpenFlags {
    /// Flags used to create a destination file
    pub const CREATE_TRUNCATE: Self = Self::CREATE_ALWAYS.union(Self::WRITE);
}

/// Removable-media filesystem
pub trait Storage {
    /// Open file handle type
    type File: StorageFile;

    /// Open the file at `path`
    ///
    /// # Errors
    /// * `NotFound` - If the file does not exist and `CREATE_ALWAYS` is not set
    /// * `OpenFailed` - If the file cannot be opened or created
    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Self::File>;
}

/// Open file on a [`Storage`] backend
pub trait StorageFile {
    /// Current size of the file in bytes
    fn size(&self) -> u32;

    /// Read up to `buf.len()` bytes, returning the number read (0 at end of file)
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `data`, returning the number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush and close the file
    fn close(self) -> Result<()>;
}

/// Execute-in-place flash memory
///
/// Flash bytes can only be programmed after their containing sector has
/// been erased. Sectors are [`SECTOR_SIZE`](crate::flash::SECTOR_SIZE) bytes.
pub trait FlashMemory {
    /// Total flash size in bytes
    fn size(&self) -> u32;

    /// Largest chunk accepted by a single [`write_chunk`](Self::write_chunk)
    fn max_write_len(&self) -> usize;

    /// Erase the sector starting at `addr`
    fn erase_sector(&mut self, addr: u32) -> Result<()>;

    /// Program `data` at `addr`, `data.len()` must not exceed `max_write_len()`
    fn write_chunk(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Read flash contents into `buf`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;
}
