// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! YAML configuration parser with strict schema validation.
//!
//! Validates domain configuration at startup. Any invalid field
//! results in an error that prevents the domain from being created.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{OutpostError, OutpostResult, ValidationError};
use crate::types::DomainName;

/// Environment variable carrying the runtime directory to workers.
///
/// The creator passes its runtime directory through the environment
/// so both sides of a rendezvous derive the same socket path.
pub const RUNTIME_DIR_ENV: &str = "OUTPOST_RUNTIME_DIR";

/// Default upper bound on a single frame payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Runtime options for a domain and its channel.
#[derive(Debug, Clone)]
pub struct DomainOptions {
    /// Directory holding rendezvous sockets.
    pub runtime_dir: PathBuf,
    /// How long the creator waits for the worker to attach.
    pub attach_timeout: Duration,
    /// Per-call deadline. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    /// Upper bound on a single frame payload.
    pub max_frame_bytes: usize,
    /// How often a worker probes its parent for liveness.
    pub parent_poll_interval: Duration,
}

impl Default for DomainOptions {
    fn default() -> Self {
        let runtime_dir = std::env::var_os(RUNTIME_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("outpost"));
        Self {
            runtime_dir,
            attach_timeout: Duration::from_millis(default_attach_timeout_ms()),
            call_timeout: Some(Duration::from_millis(default_call_timeout_ms())),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            parent_poll_interval: Duration::from_millis(default_parent_poll_interval_ms()),
        }
    }
}

/// Raw domain section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawDomainSection {
    #[serde(default = "default_domain_name")]
    name: String,
    #[serde(default = "default_attach_timeout_ms")]
    attach_timeout_ms: u64,
    #[serde(default = "default_call_timeout_ms")]
    call_timeout_ms: u64,
    #[serde(default = "default_max_frame_bytes")]
    max_frame_bytes: usize,
    #[serde(default = "default_parent_poll_interval_ms")]
    parent_poll_interval_ms: u64,
    #[serde(default)]
    runtime_dir: Option<String>,
}

fn default_domain_name() -> String {
    "calc".to_string()
}

fn default_attach_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

fn default_call_timeout_ms() -> u64 {
    30_000 // 30 seconds; 0 disables the deadline
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn default_parent_poll_interval_ms() -> u64 {
    200
}

impl Default for RawDomainSection {
    fn default() -> Self {
        Self {
            name: default_domain_name(),
            attach_timeout_ms: default_attach_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            parent_poll_interval_ms: default_parent_poll_interval_ms(),
            runtime_dir: None,
        }
    }
}

/// Raw worker section.
#[derive(Debug, Deserialize)]
struct RawWorkerSection {
    path: String,
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    domain: RawDomainSection,
    #[serde(default)]
    worker: Option<RawWorkerSection>,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: DomainName,
    pub options: DomainOptions,
    pub worker_path: Option<PathBuf>,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> OutpostResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(OutpostError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| OutpostError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> OutpostResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| OutpostError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> OutpostResult<Config> {
        let name = DomainName::new(&raw.domain.name).map_err(OutpostError::Validation)?;

        // Attach timeout bounds (100ms to 10 minutes)
        const MIN_ATTACH_MS: u64 = 100;
        const MAX_ATTACH_MS: u64 = 600_000;

        if raw.domain.attach_timeout_ms < MIN_ATTACH_MS
            || raw.domain.attach_timeout_ms > MAX_ATTACH_MS
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "attach_timeout_ms",
                value: raw.domain.attach_timeout_ms.to_string(),
                reason: format!("Must be between {} and {} ms", MIN_ATTACH_MS, MAX_ATTACH_MS),
            }
            .into());
        }

        // Call timeout: 0 disables the deadline, otherwise 15 minutes max
        const MAX_CALL_MS: u64 = 900_000;

        if raw.domain.call_timeout_ms > MAX_CALL_MS {
            return Err(ValidationError::InvalidFieldValue {
                field: "call_timeout_ms",
                value: raw.domain.call_timeout_ms.to_string(),
                reason: format!("Must not exceed {} ms (0 disables the deadline)", MAX_CALL_MS),
            }
            .into());
        }
        let call_timeout = if raw.domain.call_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(raw.domain.call_timeout_ms))
        };

        // Frame size bounds (4KB to 1GB)
        const MIN_FRAME_BYTES: usize = 4 * 1024;
        const MAX_FRAME_BYTES: usize = 1024 * 1024 * 1024;

        if raw.domain.max_frame_bytes < MIN_FRAME_BYTES
            || raw.domain.max_frame_bytes > MAX_FRAME_BYTES
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_frame_bytes",
                value: raw.domain.max_frame_bytes.to_string(),
                reason: format!(
                    "Must be between {} and {} bytes",
                    MIN_FRAME_BYTES, MAX_FRAME_BYTES
                ),
            }
            .into());
        }

        // Parent poll bounds (10ms to 10s)
        const MIN_POLL_MS: u64 = 10;
        const MAX_POLL_MS: u64 = 10_000;

        if raw.domain.parent_poll_interval_ms < MIN_POLL_MS
            || raw.domain.parent_poll_interval_ms > MAX_POLL_MS
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "parent_poll_interval_ms",
                value: raw.domain.parent_poll_interval_ms.to_string(),
                reason: format!("Must be between {} and {} ms", MIN_POLL_MS, MAX_POLL_MS),
            }
            .into());
        }

        let runtime_dir = match raw.domain.runtime_dir {
            Some(dir) if dir.is_empty() => {
                return Err(ValidationError::InvalidFieldValue {
                    field: "runtime_dir",
                    value: dir,
                    reason: "Must not be empty when present".to_string(),
                }
                .into());
            }
            Some(dir) => PathBuf::from(dir),
            None => DomainOptions::default().runtime_dir,
        };

        // Worker path existence is checked at spawn time, not here
        let worker_path = raw.worker.map(|w| PathBuf::from(w.path));

        Ok(Config {
            name,
            options: DomainOptions {
                runtime_dir,
                attach_timeout: Duration::from_millis(raw.domain.attach_timeout_ms),
                call_timeout,
                max_frame_bytes: raw.domain.max_frame_bytes,
                parent_poll_interval: Duration::from_millis(raw.domain.parent_poll_interval_ms),
            },
            worker_path,
        })
    }
}
