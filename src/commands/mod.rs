//! CLI command implementations
//!
//! `serve` plays the device, `install` runs the local flash installer and
//! `send` plays the host.

pub mod install;
pub mod send;
pub mod serve;
