//! Command codes and session kinds
//!
//! Every command on the serial link is identified by a four character code.

use core::fmt;

/// Four character command code
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandCode(pub [u8; 4]);

impl CommandCode {
    /// Program a streamed image into flash
    pub const PROG: Self = Self(*b"PROG");
    /// Save a streamed file to storage
    pub const SAVE: Self = Self(*b"SAVE");
    /// Refresh the file listing (no payload)
    pub const LIST: Self = Self(*b"__LS");

    /// Build a command code from its raw bytes
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the code as sent on the wire
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Session kind selected by this code, `None` for unknown codes
    pub fn kind(&self) -> Option<SessionKind> {
        match *self {
            Self::PROG => Some(SessionKind::ProgramFlash),
            Self::SAVE => Some(SessionKind::SaveToStorage),
            Self::LIST => Some(SessionKind::ListFiles),
            _ => None,
        }
    }
}

impl fmt::Debug for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandCode({})", self)
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// Backend targeted by a transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Stream the payload into execute-in-place flash
    ProgramFlash,
    /// Stream the payload into a file on removable storage
    SaveToStorage,
    /// Refresh the file listing, no payload follows
    ListFiles,
}

impl SessionKind {
    /// Whether a stream record follows the command code
    pub fn needs_stream(&self) -> bool {
        !matches!(self, Self::ListFiles)
    }
}
