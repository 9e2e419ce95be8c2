//! Runtime configuration
//!
//! Sources, later overrides earlier:
//!
//! | Source | How |
//! |--------|-----|
//! | defaults | [`RuntimeConfig::default`] |
//! | TOML | [`RuntimeConfig::from_toml_str`], [`RuntimeConfig::from_file`] |
//! | environment | [`RuntimeConfig::with_env`] (`AMORPH_THREADS`, `AMORPH_SERIAL`, `AMORPH_CONFLICT_POLICY`) |
//! | code | [`RuntimeBuilder`](crate::RuntimeBuilder) setters |
//!
//! ```toml
//! threads = 8
//! conflict_policy = "younger_aborts"
//! default_chunk_size = 64
//! ```

use amorph_concurrency::ConflictPolicy;
use amorph_core::{ConfigError, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`RuntimeConfig::threads`]
pub const ENV_THREADS: &str = "AMORPH_THREADS";
/// Environment variable overriding [`RuntimeConfig::serial`]
pub const ENV_SERIAL: &str = "AMORPH_SERIAL";
/// Environment variable overriding [`RuntimeConfig::conflict_policy`]
pub const ENV_CONFLICT_POLICY: &str = "AMORPH_CONFLICT_POLICY";

/// Settings of a [`Runtime`](crate::Runtime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Worker threads per invocation
    pub threads: usize,
    /// Which iterations abort on a failed acquire
    pub conflict_policy: ConflictPolicy,
    /// Chunk size of [`Runtime::default_schedule`](crate::Runtime::default_schedule)
    pub default_chunk_size: usize,
    /// Run every invocation on the calling thread with one worker
    pub serial: bool,
    /// Backoff steps an idle worker spins before it starts sleeping
    pub spin_limit: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            threads: default_threads(),
            conflict_policy: ConflictPolicy::default(),
            default_chunk_size: amorph_worklist::DEFAULT_CHUNK_SIZE,
            serial: false,
            spin_limit: 64,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

impl RuntimeConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(text)?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `AMORPH_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `AMORPH_*` overrides read through `lookup`
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_THREADS) {
            self.threads = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_THREADS,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_SERIAL) {
            self.serial = parse_flag(&value).ok_or_else(|| ConfigError::InvalidEnv {
                var: ENV_SERIAL,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_CONFLICT_POLICY) {
            self.conflict_policy = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_CONFLICT_POLICY,
                value: value.clone(),
            })?;
        }
        Ok(self)
    }

    /// Check ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 || self.threads > MAX_WORKERS {
            return Err(ConfigError::InvalidThreads(self.threads));
        }
        if self.default_chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }

    /// Workers an invocation actually uses
    pub fn effective_threads(&self) -> usize {
        if self.serial {
            1
        } else {
            self.threads
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
