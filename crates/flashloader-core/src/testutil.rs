//! Mock backends and collaborators shared by the unit tests

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec;
use std::vec::Vec;

use crate::backend::{FlashMemory, OpenFlags, Storage, StorageFile};
use crate::error::{Error, Result};
use crate::flash::SECTOR_SIZE;
use crate::host::LoaderHost;
use crate::progress::ProgressReporter;

pub struct MockFlash {
    pub memory: Vec<u8>,
    pub max_write: usize,
    pub erases: Vec<u32>,
    pub writes: Vec<(u32, usize)>,
    /// Fail the write that starts at this address
    pub fail_write_at: Option<u32>,
    /// Flip the low bit of this byte whenever it is programmed
    pub corrupt_at: Option<u32>,
}

impl MockFlash {
    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![0xFF; size],
            max_write: 256,
            erases: Vec::new(),
            writes: Vec::new(),
            fail_write_at: None,
            corrupt_at: None,
        }
    }
}

impl FlashMemory for MockFlash {
    fn size(&self) -> u32 {
        self.memory.len() as u32
    }

    fn max_write_len(&self) -> usize {
        self.max_write
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        let start = addr as usize;
        let end = (start + SECTOR_SIZE as usize).min(self.memory.len());
        self.memory[start..end].fill(0xFF);
        self.erases.push(addr);
        Ok(())
    }

    fn write_chunk(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        assert!(data.len() <= self.max_write, "chunk too large");
        if self.fail_write_at == Some(addr) {
            return Err(Error::IoFailed);
        }
        let start = addr as usize;
        if start + data.len() > self.memory.len() {
            return Err(Error::IoFailed);
        }
        for (i, &b) in data.iter().enumerate() {
            self.memory[start + i] &= b;
        }
        if let Some(bad) = self.corrupt_at {
            if bad >= addr && ((bad - addr) as usize) < data.len() {
                self.memory[bad as usize] ^= 0x01;
            }
        }
        self.writes.push((addr, data.len()));
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let start = addr as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        Ok(())
    }
}

type Files = Rc<RefCell<BTreeMap<String, Vec<u8>>>>;

#[derive(Default)]
pub struct MockStorage {
    pub files: Files,
    /// Refuse to create files
    pub read_only: bool,
    /// Fail writes once a file holds this many bytes
    pub fail_write_after: Option<usize>,
    /// Fail reads after this many bytes have been read from a file
    pub fail_read_after: Option<usize>,
    /// Number of handles closed through `close`
    pub closed: Rc<RefCell<usize>>,
}

impl MockStorage {
    pub fn with_file(name: &str, data: &[u8]) -> Self {
        let storage = Self::default();
        storage
            .files
            .borrow_mut()
            .insert(name.to_string(), data.to_vec());
        storage
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }
}

pub struct MockFile {
    files: Files,
    name: String,
    pos: usize,
    fail_write_after: Option<usize>,
    fail_read_after: Option<usize>,
    closed: Rc<RefCell<usize>>,
}

impl Storage for MockStorage {
    type File = MockFile;

    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<MockFile> {
        let mut files = self.files.borrow_mut();
        if flags.contains(OpenFlags::CREATE_ALWAYS) {
            if self.read_only || path.is_empty() {
                return Err(Error::OpenFailed);
            }
            files.insert(path.to_string(), Vec::new());
        } else if !files.contains_key(path) {
            return Err(Error::NotFound);
        }
        Ok(MockFile {
            files: self.files.clone(),
            name: path.to_string(),
            pos: 0,
            fail_write_after: self.fail_write_after,
            fail_read_after: self.fail_read_after,
            closed: self.closed.clone(),
        })
    }
}

impl StorageFile for MockFile {
    fn size(&self) -> u32 {
        self.files.borrow()[&self.name].len() as u32
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.fail_read_after.is_some_and(|limit| self.pos >= limit) {
            return Err(Error::IoFailed);
        }
        let files = self.files.borrow();
        let data = &files[&self.name];
        let n = buf.len().min(data.len() - self.pos);
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut files = self.files.borrow_mut();
        let file = files.get_mut(&self.name).ok_or(Error::IoFailed)?;
        if self
            .fail_write_after
            .is_some_and(|limit| file.len() + data.len() > limit)
        {
            return Err(Error::IoFailed);
        }
        file.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(self) -> Result<()> {
        *self.closed.borrow_mut() += 1;
        Ok(())
    }
}

/// Everything the engine told its collaborators, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Show(String, u32),
    Update(u32),
    Hide,
    Error(Error),
    Refresh,
    Select(String),
    Switch,
}

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn updates(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Update(n) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for Recorder {
    fn show(&mut self, label: &str, total: u32) {
        self.events.push(Event::Show(label.to_string(), total));
    }

    fn update(&mut self, current: u32) {
        self.events.push(Event::Update(current));
    }

    fn hide(&mut self) {
        self.events.push(Event::Hide);
    }

    fn error(&mut self, error: &Error) {
        self.events.push(Event::Error(*error));
    }
}

#[derive(Default)]
pub struct HostLog {
    pub events: Vec<Event>,
}

impl LoaderHost for HostLog {
    fn refresh_file_listing(&mut self) {
        self.events.push(Event::Refresh);
    }

    fn select_entry(&mut self, name: &str) {
        self.events.push(Event::Select(name.to_string()));
    }

    fn switch_execution(&mut self) {
        self.events.push(Event::Switch);
    }
}

/// Build a stream record the way the host tooling does
pub fn record(name: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    out
}
