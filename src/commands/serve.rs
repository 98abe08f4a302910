//! Serve command: run the device side of the link

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use flashloader_core::backend::{FlashMemory, Storage};
use flashloader_core::dispatch::{DispatchStatus, Dispatcher};
use flashloader_core::host::LoaderHost;
use flashloader_core::transfer::Backends;

use crate::cli::{DeviceArgs, SerialArgs};
use crate::config::Config;
use crate::device::{DirStorage, ImageFlash};
use crate::progress::IndicatifProgress;
use crate::transport::SerialTransport;

/// Bytes pulled from the link per read
const READ_CHUNK_SIZE: usize = 4096;

/// Serial read timeout; reads that time out are retried
const SERIAL_POLL: Duration = Duration::from_millis(100);

/// Counts of what happened while serving
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub completed: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Loader host for the terminal: prints the listing and logs the rest
pub struct CliHost {
    storage: DirStorage,
}

impl CliHost {
    pub fn new(storage: DirStorage) -> Self {
        Self { storage }
    }
}

impl LoaderHost for CliHost {
    fn refresh_file_listing(&mut self) {
        match self.storage.list() {
            Ok(entries) => {
                println!("Files on {}:", self.storage.root().display());
                for (name, size) in entries {
                    println!("  {:>10}  {}", size, name);
                }
            }
            Err(e) => log::error!("Failed to list {}: {}", self.storage.root().display(), e),
        }
    }

    fn select_entry(&mut self, name: &str) {
        log::info!("Selected {}", name);
    }

    fn switch_execution(&mut self) {
        log::info!("Image programmed, switching execution to flash");
    }
}

/// Feed everything `reader` yields through the dispatcher
///
/// A failed command is logged, the dispatcher is reset and serving
/// continues with the next command. Returns when the reader reaches end of
/// input.
pub fn serve_stream<R, S, M>(
    reader: &mut R,
    dispatcher: &mut Dispatcher<S::File>,
    backends: &mut Backends<'_, S, M>,
) -> io::Result<ServeStats>
where
    R: Read + ?Sized,
    S: Storage,
    M: FlashMemory,
{
    let mut stats = ServeStats::default();
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                continue
            }
            Err(e) => return Err(e),
        };
        log::trace!("Received {} bytes", n);

        let mut src: &[u8] = &buf[..n];
        loop {
            match dispatcher.poll(&mut src, backends) {
                Ok(DispatchStatus::Pending) => break,
                Ok(DispatchStatus::Completed(code)) => {
                    stats.completed += 1;
                    log::info!("{} done", code);
                }
                Ok(DispatchStatus::Ignored(_)) => stats.ignored += 1,
                Err(e) => {
                    stats.failed += 1;
                    log::error!("Command failed: {} (error {})", e, e.code());
                    dispatcher.reset();
                }
            }
        }
    }

    if let Some(code) = dispatcher.active() {
        log::warn!(
            "Input ended during {} after {} bytes",
            code,
            dispatcher.session().bytes_consumed()
        );
    }
    Ok(stats)
}

/// Run the serve command
pub fn run(
    config: &Config,
    device: &DeviceArgs,
    serial: &SerialArgs,
    input: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = DirStorage::new(&device.storage)?;
    let mut flash = ImageFlash::open(
        &device.image,
        config.flash.size,
        config.flash.max_write_len,
    )?;
    let mut progress = IndicatifProgress::new();
    let mut host = CliHost::new(storage.clone());
    let mut dispatcher = Dispatcher::new(config.session_options());

    let mut reader: Box<dyn Read> = match (input, serial.port.as_deref()) {
        (Some(path), _) => {
            log::info!("Reading commands from {}", path.display());
            Box::new(File::open(path)?)
        }
        (None, Some(port)) => {
            let baud = serial.baud.unwrap_or(config.serial.baud);
            Box::new(SerialTransport::open(port, baud, SERIAL_POLL)?)
        }
        (None, None) => return Err("Either --input or --port is required".into()),
    };

    let mut backends = Backends {
        storage: &mut storage,
        flash: &mut flash,
        progress: &mut progress,
        host: &mut host,
    };
    let stats = serve_stream(&mut *reader, &mut dispatcher, &mut backends)?;

    println!(
        "{} commands completed, {} failed, {} ignored",
        stats.completed, stats.failed, stats.ignored
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SendKind;
    use crate::commands::send::encode;
    use flashloader_core::command::CommandCode;
    use flashloader_core::flash::SECTOR_SIZE;
    use flashloader_core::record::encode_command;
    use flashloader_core::transfer::SessionOptions;
    use flashloader_core::Error;
    use flashloader_dummy::{DummyConfig, DummyFlash, Event, MemStorage, Recorder};
    use std::fs;

    /// Reader that hands out at most `step` bytes per call
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn dummy_flash() -> DummyFlash {
        DummyFlash::new(DummyConfig {
            size: 512 * 1024,
            max_write_len: 256,
        })
    }

    #[test]
    fn test_serve_save_and_program_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("game.bin");
        let image: Vec<u8> = (0..70_000u32).map(|i| (i % 253) as u8).collect();
        fs::write(&src, &image).unwrap();
        fs::write(dir.path().join("photo.bin"), b"ABCDE").unwrap();

        let mut stream = encode(SendKind::Save, Some(&dir.path().join("photo.bin")), None).unwrap();
        stream.extend(encode(SendKind::Prog, Some(&src), None).unwrap());
        stream.extend(encode(SendKind::Ls, None, None).unwrap());

        let sd = dir.path().join("sd");
        let mut storage = DirStorage::new(&sd).unwrap();
        let mut flash = ImageFlash::open(&dir.path().join("flash.img"), 4 * SECTOR_SIZE, 256).unwrap();
        let mut progress = Recorder::default();
        let mut host = Recorder::default();
        let mut dispatcher = Dispatcher::new(SessionOptions {
            erase_before_program: true,
            verify_writes: true,
        });

        let stats = serve_stream(
            &mut Trickle {
                data: &stream,
                step: 1000,
            },
            &mut dispatcher,
            &mut Backends {
                storage: &mut storage,
                flash: &mut flash,
                progress: &mut progress,
                host: &mut host,
            },
        )
        .unwrap();

        assert_eq!(
            stats,
            ServeStats {
                completed: 3,
                ignored: 0,
                failed: 0
            }
        );
        assert_eq!(fs::read(sd.join("photo.bin")).unwrap(), b"ABCDE");
        let flashed = fs::read(dir.path().join("flash.img")).unwrap();
        assert_eq!(&flashed[..image.len()], &image[..]);
        assert_eq!(
            host.events(),
            [
                Event::Refresh,
                Event::Select("photo.bin".into()),
                Event::Refresh,
                Event::Select("game.bin".into()),
                Event::Switch,
                Event::Refresh,
            ]
        );
    }

    #[test]
    fn test_serve_recovers_after_failure() {
        let mut storage = MemStorage::new();
        storage.fail_write_after(0);
        let mut flash = dummy_flash();
        let mut progress = Recorder::default();
        let mut host = Recorder::default();
        let mut dispatcher = Dispatcher::new(SessionOptions::default());

        let mut stream = encode_command(CommandCode::SAVE, "a.txt", b"payload").unwrap();
        stream.extend_from_slice(b"32BLJUNK");
        stream.extend(encode_command(CommandCode::PROG, "fw", &[0x5A; 600]).unwrap());

        let mut input: &[u8] = &stream;
        let stats = serve_stream(
            &mut input,
            &mut dispatcher,
            &mut Backends {
                storage: &mut storage,
                flash: &mut flash,
                progress: &mut progress,
                host: &mut host,
            },
        )
        .unwrap();

        assert_eq!(
            stats,
            ServeStats {
                completed: 1,
                ignored: 1,
                failed: 1
            }
        );
        assert!(progress.events().contains(&Event::Error(Error::IoFailed)));
        assert!(flash.data()[..600].iter().all(|&b| b == 0x5A));
        assert_eq!(host.events().last(), Some(&Event::Switch));
    }

    #[test]
    fn test_serve_truncated_input() {
        let mut storage = MemStorage::new();
        let mut flash = dummy_flash();
        let mut progress = Recorder::default();
        let mut host = Recorder::default();
        let mut dispatcher = Dispatcher::new(SessionOptions::default());

        let stream = encode_command(CommandCode::SAVE, "cut.bin", &[1u8; 100]).unwrap();
        let mut input: &[u8] = &stream[..stream.len() - 10];
        let stats = serve_stream(
            &mut input,
            &mut dispatcher,
            &mut Backends {
                storage: &mut storage,
                flash: &mut flash,
                progress: &mut progress,
                host: &mut host,
            },
        )
        .unwrap();

        assert_eq!(stats, ServeStats::default());
        assert_eq!(dispatcher.active(), Some(CommandCode::SAVE));
        // The partial chunk is still buffered, only the create reached storage
        assert_eq!(storage.contents("cut.bin"), Some(Vec::new()));
        assert_eq!(dispatcher.session().bytes_consumed(), 90);
    }
}
