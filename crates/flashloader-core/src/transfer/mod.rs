//! Streamed transfer engine
//!
//! A transfer is a single self-delimited record on the byte stream:
//!
//! ```text
//! <name bytes> 0x00 <ascii decimal length> 0x00 <payload of that length>
//! ```
//!
//! The record is parsed one byte at a time by a [`TransferSession`]. Bytes
//! may arrive in any split; the session keeps all of its state between
//! calls to [`TransferSession::feed`], so an empty or truncated source is
//! never a problem. Working memory is fixed: the name, length and payload
//! buffers are bounded and the payload is flushed every [`CHUNK_SIZE`]
//! bytes.

mod session;

pub use session::{Stage, TransferSession};

use crate::backend::{FlashMemory, Storage};
use crate::command::SessionKind;
use crate::host::LoaderHost;
use crate::progress::ProgressReporter;

/// Capacity of the name buffer, including the terminator
pub const NAME_CAPACITY: usize = 256;

/// Capacity of the length buffer, including the terminator
pub const LENGTH_CAPACITY: usize = 16;

/// Payload bytes buffered between flushes
pub const CHUNK_SIZE: usize = 256;

/// Incremental source of stream bytes
///
/// Returning `None` means no byte is available right now; more may arrive
/// before the next call to `feed`.
pub trait ByteSource {
    /// Take the next byte, if one is available
    fn next_byte(&mut self) -> Option<u8>;
}

impl ByteSource for &[u8] {
    fn next_byte(&mut self) -> Option<u8> {
        let (&byte, rest) = self.split_first()?;
        *self = rest;
        Some(byte)
    }
}

impl<const N: usize> ByteSource for heapless::Deque<u8, N> {
    fn next_byte(&mut self) -> Option<u8> {
        self.pop_front()
    }
}

/// Outcome of a successful `feed` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// More bytes are needed
    Continue,
    /// The payload has been fully committed
    Finished(SessionKind),
}

/// Tunables for streamed sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Erase the sectors covering a `PROG` payload once its length is known
    pub erase_before_program: bool,
    /// Read back and compare every chunk written to flash
    pub verify_writes: bool,
}

/// Backends and collaborators a session works against
pub struct Backends<'a, S: Storage, M: FlashMemory> {
    /// Removable storage, destination of `SAVE`
    pub storage: &'a mut S,
    /// Execute-in-place flash, destination of `PROG`
    pub flash: &'a mut M,
    /// Progress and error display
    pub progress: &'a mut dyn ProgressReporter,
    /// Loader UI notified on completion
    pub host: &'a mut dyn LoaderHost,
}
