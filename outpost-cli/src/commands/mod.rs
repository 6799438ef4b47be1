// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! CLI command modules.

pub mod call;
pub mod demo;
pub mod validate;

use std::path::PathBuf;

use outpost_core::{ConfigLoader, DomainName, DomainOptions};

/// Resolved settings for commands that spawn a worker domain.
pub struct DomainSetup {
    pub name: DomainName,
    pub options: DomainOptions,
    pub worker: PathBuf,
}

/// Combine an optional config file with command-line overrides.
///
/// Flags beat the config file, which beats built-in defaults. The
/// worker binary falls back to `outpost-worker` next to the current
/// executable.
pub fn resolve_setup(
    config_path: Option<&str>,
    name_flag: Option<&str>,
    worker_flag: Option<&str>,
) -> Result<DomainSetup, Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => Some(ConfigLoader::load_file(path)?),
        None => None,
    };

    let name = match name_flag {
        Some(flag) => DomainName::new(flag)?,
        None => match &config {
            Some(c) => c.name.clone(),
            None => DomainName::new("calc")?,
        },
    };

    let options = config
        .as_ref()
        .map(|c| c.options.clone())
        .unwrap_or_default();

    let worker = match worker_flag {
        Some(path) => PathBuf::from(path),
        None => match config.as_ref().and_then(|c| c.worker_path.clone()) {
            Some(path) => path,
            None => default_worker_path()?,
        },
    };

    Ok(DomainSetup {
        name,
        options,
        worker,
    })
}

/// Locate the companion worker binary next to the running executable.
fn default_worker_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut path = std::env::current_exe()?;
    path.set_file_name("outpost-worker");
    Ok(path)
}
