//! In-memory removable storage

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use flashloader_core::backend::{OpenFlags, Storage, StorageFile};
use flashloader_core::error::{Error, Result};

type Files = Rc<RefCell<BTreeMap<String, Vec<u8>>>>;

/// Dummy storage holding files in a shared map
///
/// Open handles write straight into the map, so contents are visible to
/// the test while a handle is still open.
#[derive(Default)]
pub struct MemStorage {
    files: Files,
    read_only: bool,
    fail_write_after: Option<usize>,
    fail_read_after: Option<usize>,
}

impl MemStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, name: &str, data: &[u8]) {
        self.files.borrow_mut().insert(name.to_string(), data.to_vec());
    }

    /// Contents of a file, if it exists
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }

    /// Names of all files, in sorted order
    pub fn names(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    /// Refuse to create files
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Fail writes once a handle has written `bytes` bytes
    pub fn fail_write_after(&mut self, bytes: usize) {
        self.fail_write_after = Some(bytes);
    }

    /// Fail reads once a handle has read `bytes` bytes
    pub fn fail_read_after(&mut self, bytes: usize) {
        self.fail_read_after = Some(bytes);
    }
}

impl Storage for MemStorage {
    type File = MemFile;

    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<MemFile> {
        let mut files = self.files.borrow_mut();
        if flags.contains(OpenFlags::CREATE_ALWAYS) {
            if self.read_only {
                return Err(Error::OpenFailed);
            }
            files.insert(path.to_string(), Vec::new());
        } else if !files.contains_key(path) {
            return Err(Error::NotFound);
        }

        Ok(MemFile {
            files: Rc::clone(&self.files),
            name: path.to_string(),
            pos: 0,
            written: 0,
            fail_write_after: self.fail_write_after,
            fail_read_after: self.fail_read_after,
        })
    }
}

/// Handle to a file in a [`MemStorage`]
pub struct MemFile {
    files: Files,
    name: String,
    pos: usize,
    written: usize,
    fail_write_after: Option<usize>,
    fail_read_after: Option<usize>,
}

impl StorageFile for MemFile {
    fn size(&self) -> u32 {
        self.files
            .borrow()
            .get(&self.name)
            .map_or(0, |data| data.len() as u32)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.fail_read_after.is_some_and(|limit| self.pos >= limit) {
            return Err(Error::IoFailed);
        }
        let files = self.files.borrow();
        let data = files.get(&self.name).ok_or(Error::IoFailed)?;
        let n = buf.len().min(data.len().saturating_sub(self.pos));
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.fail_write_after.is_some_and(|limit| self.written >= limit) {
            return Err(Error::IoFailed);
        }
        let mut files = self.files.borrow_mut();
        let file = files.get_mut(&self.name).ok_or(Error::IoFailed)?;
        file.extend_from_slice(data);
        self.written += data.len();
        Ok(data.len())
    }

    fn close(self) -> Result<()> {
        log::trace!("dummy: closed {}", self.name);
        Ok(())
    }
}
