//! Send command: encode a command and push it to a device

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use flashloader_core::command::CommandCode;
use flashloader_core::record::encode_command;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{SendKind, SerialArgs};
use crate::config::Config;
use crate::transport::SerialTransport;

/// Bytes written to the link per step
const SEND_CHUNK_SIZE: usize = 4096;

fn command_code(kind: SendKind) -> CommandCode {
    match kind {
        SendKind::Prog => CommandCode::PROG,
        SendKind::Save => CommandCode::SAVE,
        SendKind::Ls => CommandCode::LIST,
    }
}

/// Build the bytes for a command
///
/// The record name defaults to the file name of `file`.
pub fn encode(
    kind: SendKind,
    file: Option<&Path>,
    name: Option<&str>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let code = command_code(kind);
    if kind == SendKind::Ls {
        if file.is_some() {
            log::warn!("{} carries no file, ignoring --file", code);
        }
        return Ok(encode_command(code, "", &[])?);
    }

    let path = file.ok_or_else(|| format!("{} needs a file", code))?;
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("Cannot derive a name from {}", path.display()))?
            .to_string(),
    };
    let payload = fs::read(path)?;
    log::info!("Sending {} as {} ({} bytes)", path.display(), name, payload.len());

    Ok(encode_command(code, &name, &payload)?)
}

/// Write `bytes` to `sink`, showing a progress bar
fn write_with_progress(sink: &mut dyn Write, bytes: &[u8]) -> std::io::Result<()> {
    let pb = ProgressBar::new(bytes.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) Sending")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for chunk in bytes.chunks(SEND_CHUNK_SIZE) {
        sink.write_all(chunk)?;
        pb.inc(chunk.len() as u64);
    }
    sink.flush()?;
    pb.finish_and_clear();
    Ok(())
}

/// Run the send command
pub fn run(
    config: &Config,
    kind: SendKind,
    file: Option<&Path>,
    name: Option<&str>,
    serial: &SerialArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = encode(kind, file, name)?;

    let mut sink: Box<dyn Write> = match (output, serial.port.as_deref()) {
        (Some(path), _) => Box::new(File::create(path)?),
        (None, Some(port)) => {
            let baud = serial.baud.unwrap_or(config.serial.baud);
            Box::new(SerialTransport::open(port, baud, Duration::from_secs(5))?)
        }
        (None, None) => return Err("Either --output or --port is required".into()),
    };

    write_with_progress(&mut *sink, &bytes)?;
    println!("Sent {} ({} bytes)", command_code(kind), bytes.len());
    Ok(())
}
