//! flashloader-core - Streamed transfer engine and flash installer
//!
//! This crate receives firmware images and arbitrary files over a byte
//! stream and commits them either to removable storage or to
//! execute-in-place flash. It is designed to be `no_std` compatible and to
//! run with fixed-size working buffers only.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable the host-side record encoder
//!
//! # Example
//!
//! ```ignore
//! use flashloader_core::transfer::{Backends, StreamStatus, TransferSession};
//! use flashloader_core::command::CommandCode;
//!
//! let mut session = TransferSession::new(Default::default());
//! session.begin_session(CommandCode::SAVE)?;
//!
//! let mut bytes: &[u8] = b"photo.bin\x005\x00ABCDE";
//! match session.feed(&mut bytes, &mut backends)? {
//!     StreamStatus::Finished(_) => println!("saved"),
//!     StreamStatus::Continue => println!("waiting for more bytes"),
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod backend;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod flash;
pub mod host;
pub mod install;
pub mod progress;
#[cfg(feature = "alloc")]
pub mod record;
pub mod transfer;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};
