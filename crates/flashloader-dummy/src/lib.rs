//! flashloader-dummy - In-memory flash and storage emulators for testing
//!
//! This crate provides a dummy execute-in-place flash and a dummy removable
//! storage that live entirely in memory. They are useful for testing and
//! development without real hardware, and can be told to fail at chosen
//! points to exercise error paths.

mod recorder;
mod storage;

pub use recorder::{Event, Recorder};
pub use storage::{MemFile, MemStorage};

use flashloader_core::backend::FlashMemory;
use flashloader_core::error::{Error, Result};
use flashloader_core::flash::SECTOR_SIZE;

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Largest chunk accepted by one write
    pub max_write_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 32 * 1024 * 1024,
            max_write_len: 256,
        }
    }
}

/// Dummy flash
///
/// Emulates NOR flash semantics: erase sets a sector to 0xFF, programming
/// can only clear bits.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    erases: Vec<u32>,
    writes: Vec<(u32, usize)>,
    fail_erase_at: Option<u32>,
    fail_write_at: Option<u32>,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            erases: Vec::new(),
            writes: Vec::new(),
            fail_erase_at: None,
            fail_write_at: None,
        }
    }

    /// Create a new dummy flash with default configuration (32 MiB)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Sector addresses erased so far, in order
    pub fn erases(&self) -> &[u32] {
        &self.erases
    }

    /// `(address, length)` of every chunk written so far, in order
    pub fn writes(&self) -> &[(u32, usize)] {
        &self.writes
    }

    /// Make the erase of the sector at `addr` fail
    pub fn fail_erase_at(&mut self, addr: u32) {
        self.fail_erase_at = Some(addr);
    }

    /// Make any write that touches `addr` fail
    pub fn fail_write_at(&mut self, addr: u32) {
        self.fail_write_at = Some(addr);
    }
}

impl FlashMemory for DummyFlash {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn max_write_len(&self) -> usize {
        self.config.max_write_len
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        if self.fail_erase_at == Some(addr) {
            return Err(Error::IoFailed);
        }

        // Align address to erase boundary
        let aligned = (addr & !(SECTOR_SIZE - 1)) as usize;
        if aligned >= self.data.len() {
            return Err(Error::TooLarge);
        }
        let end = core::cmp::min(aligned + SECTOR_SIZE as usize, self.data.len());

        // Erase sets all bytes to 0xFF
        self.data[aligned..end].fill(0xFF);
        self.erases.push(addr);
        log::trace!("dummy: erased sector 0x{:08X}", aligned);
        Ok(())
    }

    fn write_chunk(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.len() > self.config.max_write_len {
            return Err(Error::IoFailed);
        }
        if let Some(bad) = self.fail_write_at {
            if bad >= addr && ((bad - addr) as usize) < data.len().max(1) {
                return Err(Error::IoFailed);
            }
        }

        let start = addr as usize;
        if start + data.len() > self.data.len() {
            return Err(Error::TooLarge);
        }

        // Flash programming: can only change 1 -> 0
        for (cell, &byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }

        self.writes.push((addr, data.len()));
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let start = addr as usize;
        if start + buf.len() > self.data.len() {
            return Err(Error::TooLarge);
        }
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashloader_core::command::{CommandCode, SessionKind};
    use flashloader_core::dispatch::{DispatchStatus, Dispatcher};
    use flashloader_core::install::{install_from_storage, InstallOptions};
    use flashloader_core::record::{encode_command, encode_record};
    use flashloader_core::transfer::{Backends, SessionOptions, StreamStatus, TransferSession};

    fn small() -> DummyConfig {
        DummyConfig {
            size: 1024 * 1024,
            max_write_len: 256,
        }
    }

    fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u32).wrapping_mul(2654435761) as u8).collect()
    }

    #[test]
    fn test_write_only_clears_bits() {
        let mut flash = DummyFlash::new(small());
        flash.write_chunk(0, &[0xF0]).unwrap();
        flash.write_chunk(0, &[0x0F]).unwrap();
        assert_eq!(flash.data()[0], 0x00);

        flash.erase_sector(0x100).unwrap();
        assert_eq!(flash.data()[0], 0xFF);
    }

    #[test]
    fn test_rejects_oversized_chunk() {
        let mut flash = DummyFlash::new(small());
        assert_eq!(flash.write_chunk(0, &[0u8; 257]), Err(Error::IoFailed));
    }

    #[test]
    fn test_save_scenario() {
        let mut storage = MemStorage::new();
        let mut flash = DummyFlash::new(small());
        let mut recorder = Recorder::default();
        let mut host = Recorder::default();
        let mut session = TransferSession::new(SessionOptions::default());

        assert!(session.begin_session(CommandCode::SAVE).unwrap());
        let record = encode_record("photo.bin", b"ABCDE").unwrap();
        let mut src: &[u8] = &record;
        let status = session
            .feed(
                &mut src,
                &mut Backends {
                    storage: &mut storage,
                    flash: &mut flash,
                    progress: &mut recorder,
                    host: &mut host,
                },
            )
            .unwrap();

        assert_eq!(status, StreamStatus::Finished(SessionKind::SaveToStorage));
        assert_eq!(storage.contents("photo.bin").unwrap(), b"ABCDE");
        assert!(flash.writes().is_empty());
        assert_eq!(
            host.events(),
            [Event::Refresh, Event::Select("photo.bin".into())]
        );
    }

    #[test]
    fn test_streamed_program_matches_for_any_split() {
        for len in [0usize, 1, 256, 4097, 70_000] {
            let data = image(len);
            let stream = encode_command(CommandCode::PROG, "fw.bin", &data).unwrap();
            for split in [1usize, 255, 4096, stream.len()] {
                let mut storage = MemStorage::new();
                let mut flash = DummyFlash::new(small());
                let mut progress = Recorder::default();
                let mut host = Recorder::default();
                let mut dispatcher = Dispatcher::new(SessionOptions {
                    erase_before_program: true,
                    verify_writes: true,
                });

                let mut completed = Vec::new();
                for piece in stream.chunks(split.max(1)) {
                    let mut src: &[u8] = piece;
                    loop {
                        let status = dispatcher
                            .poll(
                                &mut src,
                                &mut Backends {
                                    storage: &mut storage,
                                    flash: &mut flash,
                                    progress: &mut progress,
                                    host: &mut host,
                                },
                            )
                            .unwrap();
                        if status == DispatchStatus::Pending {
                            break;
                        }
                        completed.push(status);
                    }
                }

                assert_eq!(completed, [DispatchStatus::Completed(CommandCode::PROG)]);
                assert_eq!(&flash.data()[..len], &data[..], "len {} split {}", len, split);
                assert_eq!(flash.erases().len() as u32, len as u32 / SECTOR_SIZE + 1);
                assert_eq!(host.events().last(), Some(&Event::Switch));
            }
        }
    }

    #[test]
    fn test_streamed_program_erases_four_sectors_for_200000() {
        let mut storage = MemStorage::new();
        let mut flash = DummyFlash::new(small());
        let mut progress = Recorder::default();
        let mut host = Recorder::default();
        let mut session = TransferSession::new(SessionOptions {
            erase_before_program: true,
            ..Default::default()
        });
        session.begin_session(CommandCode::PROG).unwrap();

        let mut src: &[u8] = b"game.bin\x00200000\x00";
        session
            .feed(
                &mut src,
                &mut Backends {
                    storage: &mut storage,
                    flash: &mut flash,
                    progress: &mut progress,
                    host: &mut host,
                },
            )
            .unwrap();
        assert_eq!(flash.erases(), [0, 0x10000, 0x20000, 0x30000]);
    }

    #[test]
    fn test_install_from_mem_storage() {
        for len in [1usize, SECTOR_SIZE as usize, 3 * SECTOR_SIZE as usize + 17] {
            let data = image(len);
            let mut storage = MemStorage::new();
            storage.insert("game.bin", &data);
            let mut flash = DummyFlash::with_data(small(), &vec![0u8; 1024 * 1024]);
            let mut progress = Recorder::default();

            let stats = install_from_storage(
                &mut storage,
                &mut flash,
                "game.bin",
                &mut progress,
                InstallOptions { verify: true },
            )
            .unwrap();

            let expected_sectors = len as u32 / SECTOR_SIZE + 1;
            assert_eq!(stats.sectors_erased, expected_sectors);
            assert_eq!(flash.erases().len() as u32, expected_sectors);
            assert_eq!(&flash.data()[..len], &data[..]);
            assert_eq!(progress.events().last(), Some(&Event::Hide));
        }
    }

    #[test]
    fn test_install_erase_failure() {
        let mut storage = MemStorage::new();
        storage.insert("a.bin", &image(200_000));
        let mut flash = DummyFlash::new(small());
        flash.fail_erase_at(0x20000);
        let mut progress = Recorder::default();

        let err = install_from_storage(
            &mut storage,
            &mut flash,
            "a.bin",
            &mut progress,
            InstallOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, Error::IoFailed);
        assert_eq!(flash.erases(), [0, 0x10000]);
        assert!(flash.writes().is_empty());
    }

    #[test]
    fn test_streamed_write_failure_then_reset() {
        let mut storage = MemStorage::new();
        let mut flash = DummyFlash::new(small());
        flash.fail_write_at(1000);
        let mut progress = Recorder::default();
        let mut host = Recorder::default();
        let mut dispatcher = Dispatcher::new(SessionOptions::default());

        let stream = encode_command(CommandCode::PROG, "fw", &image(2000)).unwrap();
        let mut src: &[u8] = &stream;
        let mut backends = Backends {
            storage: &mut storage,
            flash: &mut flash,
            progress: &mut progress,
            host: &mut host,
        };
        assert_eq!(dispatcher.poll(&mut src, &mut backends), Err(Error::IoFailed));
        dispatcher.reset();

        let stream = encode_command(CommandCode::SAVE, "ok.txt", b"fine").unwrap();
        let mut src: &[u8] = &stream;
        assert_eq!(
            dispatcher.poll(&mut src, &mut backends),
            Ok(DispatchStatus::Completed(CommandCode::SAVE))
        );
        drop(backends);

        assert_eq!(storage.contents("ok.txt").unwrap(), b"fine");
        assert_eq!(progress.updates(), [256, 512, 768, 4]);
        assert!(!host.events().contains(&Event::Switch));
    }
}
