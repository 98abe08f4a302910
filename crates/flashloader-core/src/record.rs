//! Host-side command encoding
//!
//! Builds the byte stream a host sends to the device: the framing header
//! followed by a stream record.

use alloc::string::ToString;
use alloc::vec::Vec;

use crate::command::CommandCode;
use crate::dispatch::PREAMBLE;
use crate::error::{Error, Field, Result};
use crate::transfer::NAME_CAPACITY;

/// Encode a stream record: `<name> 0x00 <length> 0x00 <payload>`
///
/// # Errors
/// * `ProtocolOverflow` - If the name does not fit the device's name buffer
/// * `InvalidName` - If the name contains a NUL byte
/// * `TooLarge` - If the payload length does not fit in 32 bits
pub fn encode_record(name: &str, payload: &[u8]) -> Result<Vec<u8>> {
    if name.len() >= NAME_CAPACITY {
        return Err(Error::ProtocolOverflow(Field::Name));
    }
    if name.bytes().any(|b| b == 0) {
        return Err(Error::InvalidName);
    }
    let len = u32::try_from(payload.len()).map_err(|_| Error::TooLarge)?;

    let length = len.to_string();
    let mut out = Vec::with_capacity(name.len() + length.len() + 2 + payload.len());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(length.as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode just the 8-byte command header
pub fn encode_header(code: CommandCode) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&PREAMBLE);
    out[4..].copy_from_slice(code.as_bytes());
    out
}

/// Encode a full command, including a record when the command carries one
///
/// # Errors
/// See [`encode_record`].
pub fn encode_command(code: CommandCode, name: &str, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = encode_header(code).to_vec();
    if code.kind().is_some_and(|k| k.needs_stream()) {
        out.extend_from_slice(&encode_record(name, payload)?);
    }
    Ok(out)
}
