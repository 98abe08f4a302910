//! Install command: copy an image from storage into flash

use flashloader_core::install::{install_from_storage, InstallOptions};
use flashloader_core::progress::ProgressReporter;

use crate::cli::DeviceArgs;
use crate::config::Config;
use crate::device::{DirStorage, ImageFlash};
use crate::progress::IndicatifProgress;

/// Run the install command
pub fn run(
    config: &Config,
    name: &str,
    device: &DeviceArgs,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = DirStorage::new(&device.storage)?;
    let mut flash = ImageFlash::open(
        &device.image,
        config.flash.size,
        config.flash.max_write_len,
    )?;
    let mut progress = IndicatifProgress::new();

    let options = InstallOptions {
        verify: verify || config.flash.verify,
    };
    let stats = install_from_storage(&mut storage, &mut flash, name, &mut progress, options)
        .map_err(|e| {
            progress.error(&e);
            e
        })?;

    println!(
        "Installed {} ({} bytes, {} sectors erased{})",
        name,
        stats.bytes_written,
        stats.sectors_erased,
        if options.verify { ", verified" } else { "" }
    );
    Ok(())
}
