//! Transfer session state machine

use heapless::Vec;

use super::{
    Backends, ByteSource, SessionOptions, StreamStatus, CHUNK_SIZE, LENGTH_CAPACITY, NAME_CAPACITY,
};
use crate::backend::{FlashMemory, OpenFlags, Storage, StorageFile};
use crate::command::{CommandCode, SessionKind};
use crate::error::{Error, Field, Result};
use crate::flash;
use crate::progress::ProgressReporter;

/// Parse stage of a transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No session in progress
    Idle,
    /// Collecting the destination name
    AwaitingName,
    /// Collecting the ASCII payload length
    AwaitingLength,
    /// Collecting payload bytes
    Receiving,
    /// The session failed; `reset` must be called before the next one
    Failed,
}

/// I/O requested by the transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Name and length are known, open the destination
    Open,
    /// Write the buffered payload chunk
    Flush,
}

/// Where payload chunks go
enum Destination<F> {
    File(F),
    Flash { cursor: u32 },
}

/// State of one streamed transfer
///
/// The session is a long-lived object owned by the caller. Only one session
/// may be in progress at a time; [`begin_session`](Self::begin_session)
/// refuses to start a second one.
///
/// `F` is the file handle type of the storage backend.
pub struct TransferSession<F> {
    options: SessionOptions,
    stage: Stage,
    kind: Option<SessionKind>,
    name: Vec<u8, NAME_CAPACITY>,
    length: Vec<u8, LENGTH_CAPACITY>,
    declared_length: u32,
    consumed: u32,
    chunk: Vec<u8, CHUNK_SIZE>,
    destination: Option<Destination<F>>,
}

impl<F: StorageFile> TransferSession<F> {
    /// Create an idle session
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            stage: Stage::Idle,
            kind: None,
            name: Vec::new(),
            length: Vec::new(),
            declared_length: 0,
            consumed: 0,
            chunk: Vec::new(),
            destination: None,
        }
    }

    /// Current parse stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Kind of the session in progress
    pub fn kind(&self) -> Option<SessionKind> {
        self.kind
    }

    /// Whether no session is in progress
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// Destination name, once it has been received completely
    pub fn name(&self) -> Option<&str> {
        match self.stage {
            Stage::Idle | Stage::AwaitingName => None,
            _ => core::str::from_utf8(&self.name).ok(),
        }
    }

    /// Declared payload length, once it has been parsed
    pub fn declared_length(&self) -> Option<u32> {
        match self.stage {
            Stage::Receiving => Some(self.declared_length),
            _ => None,
        }
    }

    /// Payload bytes received so far
    pub fn bytes_consumed(&self) -> u32 {
        self.consumed
    }

    /// Start a session for `code`
    ///
    /// Returns whether a stream record follows. `__LS` and unknown codes
    /// return `false` without starting a session; the file listing itself
    /// is produced by the caller.
    ///
    /// # Errors
    /// * `SessionActive` - If another session is in progress
    /// * `ResetRequired` - If the previous session failed and was not reset
    pub fn begin_session(&mut self, code: CommandCode) -> Result<bool> {
        match self.stage {
            Stage::Idle => {}
            Stage::Failed => return Err(Error::ResetRequired),
            _ => return Err(Error::SessionActive),
        }

        let kind = match code.kind() {
            Some(kind) => kind,
            None => {
                log::warn!("Ignoring unknown command {}", code);
                return Ok(false);
            }
        };

        if !kind.needs_stream() {
            log::debug!("Command {} needs no stream", code);
            return Ok(false);
        }

        self.clear();
        self.kind = Some(kind);
        self.stage = Stage::AwaitingName;
        log::info!("Starting {:?} session", kind);
        Ok(true)
    }

    /// Drop any session state, including a failed session's open destination
    pub fn reset(&mut self) {
        if self.destination.is_some() {
            log::debug!("Discarding open destination of {:?} session", self.kind);
        }
        self.clear();
    }

    /// Consume available bytes from `source`
    ///
    /// Stops at the end of the record, leaving any further bytes in the
    /// source, or when the source runs dry.
    ///
    /// # Errors
    /// * `NoSession` - If no session was started
    /// * `ResetRequired` - If the session already failed
    /// * Any error of the record or the destination; the session is then
    ///   left in [`Stage::Failed`] with the destination still open
    pub fn feed<S, M>(
        &mut self,
        source: &mut impl ByteSource,
        backends: &mut Backends<'_, S, M>,
    ) -> Result<StreamStatus>
    where
        S: Storage<File = F>,
        M: FlashMemory,
    {
        match self.stage {
            Stage::Idle => return Err(Error::NoSession),
            Stage::Failed => return Err(Error::ResetRequired),
            _ => {}
        }

        while let Some(byte) = source.next_byte() {
            let outcome = match self.step(byte) {
                Ok(None) => continue,
                Ok(Some(Action::Open)) => self.open_destination(backends).and_then(|()| {
                    // A zero-length payload is complete as soon as it opens
                    if self.is_complete() {
                        self.flush(backends)
                    } else {
                        Ok(())
                    }
                }),
                Ok(Some(Action::Flush)) => self.flush(backends),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                return Err(self.fail(e, backends.progress));
            }

            if self.is_complete() {
                return match self.finish(backends) {
                    Ok(kind) => Ok(StreamStatus::Finished(kind)),
                    Err(e) => Err(self.fail(e, backends.progress)),
                };
            }
        }

        Ok(StreamStatus::Continue)
    }

    /// Advance the parser by one byte, returning the I/O it requires
    fn step(&mut self, byte: u8) -> Result<Option<Action>> {
        match self.stage {
            Stage::AwaitingName => {
                if byte == 0 {
                    log::debug!("Name field complete ({} bytes)", self.name.len());
                    self.stage = Stage::AwaitingLength;
                } else {
                    push_field(&mut self.name, byte, Field::Name)?;
                }
                Ok(None)
            }
            Stage::AwaitingLength => {
                if byte == 0 {
                    self.declared_length = parse_length(&self.length)?;
                    log::debug!("Declared length {}", self.declared_length);
                    Ok(Some(Action::Open))
                } else {
                    push_field(&mut self.length, byte, Field::Length)?;
                    Ok(None)
                }
            }
            Stage::Receiving => {
                // Never full here: a full chunk is flushed before the next byte
                self.chunk.push(byte).map_err(|_| Error::IoFailed)?;
                self.consumed += 1;
                if self.chunk.is_full() || self.consumed == self.declared_length {
                    Ok(Some(Action::Flush))
                } else {
                    Ok(None)
                }
            }
            Stage::Idle | Stage::Failed => Err(Error::NoSession),
        }
    }

    fn is_complete(&self) -> bool {
        self.stage == Stage::Receiving && self.consumed == self.declared_length
    }

    fn open_destination<S, M>(&mut self, backends: &mut Backends<'_, S, M>) -> Result<()>
    where
        S: Storage<File = F>,
        M: FlashMemory,
    {
        let name = core::str::from_utf8(&self.name).map_err(|_| Error::InvalidName)?;
        let total = self.declared_length;

        match self.kind {
            Some(SessionKind::SaveToStorage) => {
                let file = backends
                    .storage
                    .open(name, OpenFlags::CREATE_TRUNCATE)
                    .map_err(|e| {
                        log::error!("Failed to create file ({}): {}", name, e);
                        Error::OpenFailed
                    })?;
                log::info!("Saving {} bytes to {}", total, name);
                self.destination = Some(Destination::File(file));
                backends.progress.show("Copying to SD card...", total);
            }
            Some(SessionKind::ProgramFlash) => {
                if total > backends.flash.size() {
                    log::error!(
                        "Image of {} bytes exceeds flash size {}",
                        total,
                        backends.flash.size()
                    );
                    return Err(Error::TooLarge);
                }
                if self.options.erase_before_program {
                    flash::erase_for_image(&mut *backends.flash, total, &mut *backends.progress)?;
                }
                log::info!("Programming {} bytes ({}) into flash", total, name);
                self.destination = Some(Destination::Flash { cursor: 0 });
                backends.progress.show("Flashing...", total);
            }
            Some(SessionKind::ListFiles) | None => return Err(Error::NoSession),
        }

        self.stage = Stage::Receiving;
        Ok(())
    }

    /// Write the buffered chunk at the current cursor
    fn flush<S, M>(&mut self, backends: &mut Backends<'_, S, M>) -> Result<()>
    where
        S: Storage<File = F>,
        M: FlashMemory,
    {
        match self.destination.as_mut() {
            Some(Destination::File(file)) => {
                let written = file.write(&self.chunk).map_err(|e| {
                    log::error!("Failed to save to storage: {}", e);
                    Error::IoFailed
                })?;
                if written != self.chunk.len() {
                    log::error!("Short write: {} of {} bytes", written, self.chunk.len());
                    return Err(Error::IoFailed);
                }
            }
            Some(Destination::Flash { cursor }) => {
                flash::write_chunked(&mut *backends.flash, *cursor, &self.chunk)?;
                if self.options.verify_writes {
                    flash::verify(&mut *backends.flash, *cursor, &self.chunk)?;
                }
                *cursor += self.chunk.len() as u32;
            }
            None => return Err(Error::NoSession),
        }

        self.chunk.clear();
        backends.progress.update(self.consumed);
        Ok(())
    }

    fn finish<S, M>(&mut self, backends: &mut Backends<'_, S, M>) -> Result<SessionKind>
    where
        S: Storage<File = F>,
        M: FlashMemory,
    {
        let kind = self.kind.ok_or(Error::NoSession)?;
        if let Some(Destination::File(file)) = self.destination.take() {
            file.close().map_err(|e| {
                log::error!("Failed to close file: {}", e);
                Error::IoFailed
            })?;
        }

        backends.progress.hide();
        backends.host.refresh_file_listing();
        if let Ok(name) = core::str::from_utf8(&self.name) {
            backends.host.select_entry(name);
        }

        log::info!("{:?} session finished ({} bytes)", kind, self.consumed);
        self.clear();
        Ok(kind)
    }

    fn fail(&mut self, error: Error, progress: &mut dyn ProgressReporter) -> Error {
        log::error!(
            "{:?} session failed in {:?} after {} bytes: {}",
            self.kind,
            self.stage,
            self.consumed,
            error
        );
        self.stage = Stage::Failed;
        progress.error(&error);
        error
    }

    fn clear(&mut self) {
        self.stage = Stage::Idle;
        self.kind = None;
        self.name.clear();
        self.length.clear();
        self.declared_length = 0;
        self.consumed = 0;
        self.chunk.clear();
        self.destination = None;
    }
}

/// Append a field byte, keeping one slot for the terminator
fn push_field<const N: usize>(buf: &mut Vec<u8, N>, byte: u8, field: Field) -> Result<()> {
    if buf.len() + 1 >= N {
        return Err(Error::ProtocolOverflow(field));
    }
    buf.push(byte).map_err(|_| Error::ProtocolOverflow(field))
}

/// Parse the ASCII decimal length field
fn parse_length(digits: &[u8]) -> Result<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::InvalidLength);
    }
    digits.iter().try_fold(0u32, |acc, &d| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add((d - b'0') as u32))
            .ok_or(Error::InvalidLength)
    })
}
