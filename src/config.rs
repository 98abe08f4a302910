//! Device configuration file
//!
//! The configuration is a TOML file:
//!
//! ```toml
//! [flash]
//! size = "32 MiB"
//! max_write_len = 256
//! erase_before_program = true
//! verify = true
//!
//! [serial]
//! baud = 115200
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flashloader_core::transfer::SessionOptions;
use serde::Deserialize;
use thiserror::Error;

/// Errors loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or has wrong value types
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub flash: FlashConfig,
    pub serial: SerialConfig,
}

/// `[flash]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlashConfig {
    /// Flash size in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub size: u32,
    /// Largest chunk per flash write
    pub max_write_len: usize,
    /// Erase sectors when a PROG record announces its length
    pub erase_before_program: bool,
    /// Read back every write
    pub verify: bool,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            size: 32 * 1024 * 1024,
            max_write_len: 256,
            erase_before_program: false,
            verify: false,
        }
    }
}

/// `[serial]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { baud: 115200 }
    }
}

impl Config {
    /// Load the configuration, falling back to defaults if `path` does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.flash.size == 0 {
            return Err(ConfigError::Invalid {
                key: "flash.size",
                reason: "must be non-zero".into(),
            });
        }
        if self.flash.max_write_len == 0 || self.flash.max_write_len > 256 {
            return Err(ConfigError::Invalid {
                key: "flash.max_write_len",
                reason: format!("{} is not in 1..=256", self.flash.max_write_len),
            });
        }
        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid {
                key: "serial.baud",
                reason: "must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Engine options for streamed sessions
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            erase_before_program: self.flash.erase_before_program,
            verify_writes: self.flash.verify,
        }
    }
}

/// Deserialize a size that can be an integer or a string like "16 MiB"
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrStr {
        Int(u32),
        Str(String),
    }

    match SizeOrStr::deserialize(deserializer)? {
        SizeOrStr::Int(n) => Ok(n),
        SizeOrStr::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a size string like "16 MiB", "0x1000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}
