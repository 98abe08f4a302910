//! Error types for flashloader-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Stream record field that can overflow its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Destination name (file path or flash target name)
    Name,
    /// ASCII decimal payload length
    Length,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Destination errors
    /// Destination could not be created or opened
    OpenFailed,
    /// Source file does not exist on storage
    NotFound,
    /// Payload does not fit into the flash backend
    TooLarge,

    // I/O errors
    /// Read or write failed mid-transfer
    IoFailed,
    /// Read-back of written flash did not match
    VerifyFailed {
        /// Start address of the mismatching chunk
        addr: u32,
    },

    // Protocol errors
    /// A record field filled its buffer without a terminator
    ProtocolOverflow(Field),
    /// Length field is not a decimal number that fits in 32 bits
    InvalidLength,
    /// Name field is empty or not valid UTF-8
    InvalidName,

    // Session errors
    /// A session is already in progress
    SessionActive,
    /// Previous session failed and has not been reset
    ResetRequired,
    /// Data was fed without a session in progress
    NoSession,
}

impl Error {
    /// Numeric code shown to the user when an error is rendered as a label
    pub fn code(&self) -> u8 {
        match self {
            Self::OpenFailed => 1,
            Self::NotFound => 2,
            Self::TooLarge => 3,
            Self::IoFailed => 4,
            Self::VerifyFailed { .. } => 5,
            Self::ProtocolOverflow(_) => 6,
            Self::InvalidLength => 7,
            Self::InvalidName => 8,
            Self::SessionActive => 9,
            Self::ResetRequired => 10,
            Self::NoSession => 11,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Length => write!(f, "length"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "failed to open destination"),
            Self::NotFound => write!(f, "file not found"),
            Self::TooLarge => write!(f, "payload does not fit into flash"),
            Self::IoFailed => write!(f, "I/O error"),
            Self::VerifyFailed { addr } => {
                write!(f, "verify failed at address 0x{:08X}", addr)
            }
            Self::ProtocolOverflow(field) => {
                write!(f, "{} field exceeds its buffer without a terminator", field)
            }
            Self::InvalidLength => write!(f, "invalid length field"),
            Self::InvalidName => write!(f, "invalid name field"),
            Self::SessionActive => write!(f, "a transfer session is already active"),
            Self::ResetRequired => write!(f, "previous session failed, reset required"),
            Self::NoSession => write!(f, "no transfer session active"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
