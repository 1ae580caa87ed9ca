//! Session configuration.
//!
//! A JSON file sets the defaults for a session; command-line flags
//! override individual fields. Every field is optional.
//!
//! ```json
//! {
//!   "ips": 0,
//!   "trace": true,
//!   "memory_init": "random",
//!   "seed": 3080,
//!   "breakpoints": ["0005", "0010"],
//!   "attach": { "ptr": "hello.ptp", "tty": "-" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::DEFAULT_IPS;
use crate::cpu::{Memory, MEMORY_SIZE};
use crate::device::Slot;

/// Power-on memory contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryInit {
    #[default]
    Zero,
    /// Random words, as core memory held after power-up.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Throttle rate; 0 runs unthrottled.
    pub ips: u32,
    pub trace: bool,
    pub memory_init: MemoryInit,
    /// Seed for random memory. Without one each session differs.
    pub seed: Option<u64>,
    /// Breakpoint addresses, in octal.
    pub breakpoints: Vec<String>,
    /// Endpoints to attach at startup; `-` is stdio.
    pub attach: BTreeMap<Slot, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ips: DEFAULT_IPS,
            trace: false,
            memory_init: MemoryInit::Zero,
            seed: None,
            breakpoints: Vec::new(),
            attach: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The breakpoint list as addresses.
    pub fn breakpoint_addresses(&self) -> Result<Vec<u16>, ConfigError> {
        self.breakpoints
            .iter()
            .map(|text| {
                u16::from_str_radix(text, 8)
                    .ok()
                    .filter(|&addr| usize::from(addr) < MEMORY_SIZE)
                    .ok_or_else(|| ConfigError::InvalidBreakpoint(text.clone()))
            })
            .collect()
    }

    /// Memory as it should look at power-on.
    pub fn initial_memory(&self) -> Memory {
        match (self.memory_init, self.seed) {
            (MemoryInit::Zero, _) => Memory::new(),
            (MemoryInit::Random, Some(seed)) => Memory::random(&mut StdRng::seed_from_u64(seed)),
            (MemoryInit::Random, None) => Memory::random(&mut rand::thread_rng()),
        }
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid configuration in {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("invalid breakpoint address \"{0}\"")]
    InvalidBreakpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ips, 60);
        assert!(!config.trace);
        assert_eq!(config.memory_init, MemoryInit::Zero);
        assert!(config.initial_memory().cells().iter().all(|w| w.is_zero()));
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{
                "ips": 0,
                "trace": true,
                "memory_init": "random",
                "seed": 3080,
                "breakpoints": ["0005", "10"],
                "attach": { "ptr": "hello.ptp", "console": "-" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.ips, 0);
        assert!(config.trace);
        assert_eq!(config.breakpoint_addresses().unwrap(), vec![5, 0o10]);
        assert_eq!(config.attach.get(&Slot::TapeReader).map(String::as_str), Some("hello.ptp"));
        assert_eq!(config.attach.get(&Slot::Console).map(String::as_str), Some("-"));
    }

    #[test]
    fn test_seeded_memory_is_repeatable() {
        let config = Config {
            memory_init: MemoryInit::Random,
            seed: Some(7),
            ..Config::default()
        };
        assert_eq!(config.initial_memory().cells(), config.initial_memory().cells());
    }

    #[test]
    fn test_invalid_breakpoint() {
        let config = Config { breakpoints: vec!["10000".into()], ..Config::default() };
        assert!(matches!(
            config.breakpoint_addresses(),
            Err(ConfigError::InvalidBreakpoint(addr)) if addr == "10000"
        ));
        let config = Config { breakpoints: vec!["9".into()], ..Config::default() };
        assert!(config.breakpoint_addresses().is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_json(r#"{"ips": -1}"#).is_err());
        assert!(Config::from_json(r#"{"memory_init": "ones"}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/digiac.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/digiac.json"));
    }
}
