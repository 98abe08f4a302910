//! Command dispatcher
//!
//! On the serial link every command is framed as
//!
//! ```text
//! "32BL" <4 byte command code> [stream record]
//! ```
//!
//! The dispatcher finds the header, starts the matching transfer session and
//! hands the following bytes to it. Bytes that do not start with the
//! preamble are skipped until the stream is back in sync.

use heapless::Vec;

use crate::backend::{FlashMemory, Storage, StorageFile};
use crate::command::{CommandCode, SessionKind};
use crate::error::Result;
use crate::transfer::{Backends, ByteSource, SessionOptions, StreamStatus, TransferSession};

/// Magic bytes that start every command
pub const PREAMBLE: [u8; 4] = *b"32BL";

const HEADER_LEN: usize = 8;

/// Outcome of a [`Dispatcher::poll`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The source ran dry before a command completed
    Pending,
    /// A command ran to completion
    Completed(CommandCode),
    /// An unknown command code was skipped
    Ignored(CommandCode),
}

/// Routes framed commands to a [`TransferSession`]
pub struct Dispatcher<F> {
    session: TransferSession<F>,
    header: Vec<u8, HEADER_LEN>,
    active: Option<CommandCode>,
}

impl<F: StorageFile> Dispatcher<F> {
    /// Create a dispatcher with an idle session
    pub fn new(options: SessionOptions) -> Self {
        Self {
            session: TransferSession::new(options),
            header: Vec::new(),
            active: None,
        }
    }

    /// The underlying transfer session
    pub fn session(&self) -> &TransferSession<F> {
        &self.session
    }

    /// Command whose record is currently being received
    pub fn active(&self) -> Option<CommandCode> {
        self.active
    }

    /// Abandon the current command and resynchronise on the next header
    ///
    /// Required after `poll` returned an error.
    pub fn reset(&mut self) {
        self.session.reset();
        self.header.clear();
        self.active = None;
    }

    /// Process bytes until one command completes or the source runs dry
    ///
    /// Call again while the source still holds bytes; each call handles at
    /// most one command.
    ///
    /// # Errors
    /// Any session error. The dispatcher must be [`reset`](Self::reset)
    /// before further commands are accepted.
    pub fn poll<S, M>(
        &mut self,
        source: &mut impl ByteSource,
        backends: &mut Backends<'_, S, M>,
    ) -> Result<DispatchStatus>
    where
        S: Storage<File = F>,
        M: FlashMemory,
    {
        let code = match self.active {
            Some(code) => code,
            None => {
                let Some(code) = self.read_header(source) else {
                    return Ok(DispatchStatus::Pending);
                };
                log::debug!("Received command {}", code);

                if !self.session.begin_session(code)? {
                    return Ok(match code.kind() {
                        Some(SessionKind::ListFiles) => {
                            backends.host.refresh_file_listing();
                            DispatchStatus::Completed(code)
                        }
                        _ => {
                            log::warn!("Ignoring unknown command {}", code);
                            DispatchStatus::Ignored(code)
                        }
                    });
                }
                self.active = Some(code);
                code
            }
        };

        match self.session.feed(source, backends)? {
            StreamStatus::Continue => Ok(DispatchStatus::Pending),
            StreamStatus::Finished(kind) => {
                self.active = None;
                if kind == SessionKind::ProgramFlash {
                    backends.host.switch_execution();
                }
                Ok(DispatchStatus::Completed(code))
            }
        }
    }

    /// Accumulate header bytes, returning the code once all eight arrived
    fn read_header(&mut self, source: &mut impl ByteSource) -> Option<CommandCode> {
        while let Some(byte) = source.next_byte() {
            let pos = self.header.len();
            if pos < PREAMBLE.len() && byte != PREAMBLE[pos] {
                if pos > 0 {
                    log::trace!("Lost preamble after {} bytes", pos);
                }
                self.header.clear();
                if byte != PREAMBLE[0] {
                    continue;
                }
            }
            // Cannot overflow: the header is taken as soon as it is full
            let _ = self.header.push(byte);

            if self.header.is_full() {
                let mut code = [0u8; 4];
                code.copy_from_slice(&self.header[PREAMBLE.len()..]);
                self.header.clear();
                return Some(CommandCode::from_bytes(code));
            }
        }
        None
    }
}
