//! Directory-backed removable storage

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flashloader_core::backend::{OpenFlags, Storage, StorageFile};
use flashloader_core::{Error, Result};

use super::io_failed;

/// Storage rooted at a directory
///
/// Names are single path components; the loader has no subdirectories.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Use `root` as the storage, creating it if needed
    pub fn new(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        log::info!("Using {} as storage", root.display());
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regular files on the storage, sorted by name
    pub fn list(&self) -> io::Result<Vec<(String, u64)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                entries.push((name, meta.len()));
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            log::error!("Refusing file name {:?}", name);
            return Err(Error::OpenFailed);
        }
        Ok(self.root.join(name))
    }
}

impl Storage for DirStorage {
    type File = DirFile;

    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<DirFile> {
        let full = self.resolve(path)?;

        let mut options = OpenOptions::new();
        options.read(flags.contains(OpenFlags::READ));
        if flags.contains(OpenFlags::CREATE_ALWAYS) {
            options.write(true).create(true).truncate(true);
        } else if flags.contains(OpenFlags::WRITE) {
            options.write(true);
        }

        let file = options.open(&full).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                log::debug!("{} not found", full.display());
                Error::NotFound
            } else {
                log::error!("Failed to open {}: {}", full.display(), e);
                Error::OpenFailed
            }
        })?;
        log::debug!("Opened {} ({:?})", full.display(), flags);

        Ok(DirFile { file, path: full })
    }
}

/// Open file in a [`DirStorage`]
pub struct DirFile {
    file: File,
    path: PathBuf,
}

impl StorageFile for DirFile {
    fn size(&self) -> u32 {
        match self.file.metadata() {
            Ok(meta) => u32::try_from(meta.len()).unwrap_or(u32::MAX),
            Err(e) => {
                log::warn!("Cannot stat {}: {}", self.path.display(), e);
                0
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file
            .read(buf)
            .map_err(|e| io_failed(&format!("Read from {}", self.path.display()), e))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.file
            .write_all(data)
            .map_err(|e| io_failed(&format!("Write to {}", self.path.display()), e))?;
        Ok(data.len())
    }

    fn close(mut self) -> Result<()> {
        self.file
            .flush()
            .and_then(|()| self.file.sync_all())
            .map_err(|e| io_failed(&format!("Close {}", self.path.display()), e))
    }
}
