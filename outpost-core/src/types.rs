// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Core domain types with validation.
//!
//! All identifiers that cross a process boundary are newtypes with
//! fail-fast constructors. Invalid values are rejected at the edge so
//! the transport and domain layers never see malformed input.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length for a domain name.
pub const MAX_DOMAIN_NAME_LEN: usize = 64;

/// Name of the reserved root domain every process starts in.
pub const ROOT_DOMAIN_NAME: &str = "root";

// =============================================================================
// DomainName
// =============================================================================

/// Validated name of an isolation domain.
///
/// Names are non-empty, at most 64 bytes, and restricted to
/// alphanumerics plus `.`, `_`, and `-`. The restriction keeps the
/// name safe to embed in a filesystem rendezvous path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "domain_name",
                value: name,
                reason: "must not be empty".to_string(),
            });
        }
        if name.len() > MAX_DOMAIN_NAME_LEN {
            return Err(ValidationError::InvalidFieldValue {
                field: "domain_name",
                value: name,
                reason: format!("exceeds maximum length of {MAX_DOMAIN_NAME_LEN}"),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "domain_name",
                value: name,
                reason: "only alphanumerics, '.', '_', and '-' are allowed".to_string(),
            });
        }
        Ok(Self(name))
    }

    /// The reserved name of the implicit root domain.
    pub fn root() -> Self {
        Self(ROOT_DOMAIN_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DomainName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}

// =============================================================================
// ProcessToken
// =============================================================================

/// Numeric token identifying the creating process in a rendezvous name.
///
/// The token is the process id of the domain creator. Zero is rejected
/// because no userspace process carries pid 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessToken(u32);

impl ProcessToken {
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "process_token",
                value: value.to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Token for the calling process.
    pub fn from_current_process() -> Self {
        Self(std::process::id())
    }

    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let value: u32 = text.parse().map_err(|_| ValidationError::InvalidFieldValue {
            field: "process_token",
            value: text.to_string(),
            reason: "must be a decimal process id".to_string(),
        })?;
        Self::new(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// RendezvousName
// =============================================================================

/// Well-known rendezvous identifier shared by a parent and its child.
///
/// Rendered as `<token>_<domain>`. The first `_` is the separator;
/// domain names may themselves contain underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RendezvousName {
    token: ProcessToken,
    domain: DomainName,
}

impl RendezvousName {
    pub fn new(token: ProcessToken, domain: DomainName) -> Self {
        Self { token, domain }
    }

    /// Rendezvous name for a domain created by the calling process.
    pub fn for_current_process(domain: DomainName) -> Self {
        Self::new(ProcessToken::from_current_process(), domain)
    }

    /// Parse `<token>_<domain>`, splitting at the first underscore only.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let (token_part, domain_part) =
            text.split_once('_')
                .ok_or_else(|| ValidationError::MalformedRendezvousName {
                    name: text.to_string(),
                    reason: "missing '_' separator".to_string(),
                })?;
        let token =
            ProcessToken::parse(token_part).map_err(|_| ValidationError::MalformedRendezvousName {
                name: text.to_string(),
                reason: "token prefix is not a valid process id".to_string(),
            })?;
        let domain =
            DomainName::new(domain_part).map_err(|_| ValidationError::MalformedRendezvousName {
                name: text.to_string(),
                reason: "domain suffix is not a valid domain name".to_string(),
            })?;
        Ok(Self { token, domain })
    }

    pub fn token(&self) -> ProcessToken {
        self.token
    }

    pub fn domain(&self) -> &DomainName {
        &self.domain
    }
}

impl fmt::Display for RendezvousName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.token, self.domain)
    }
}

// =============================================================================
// MessageId
// =============================================================================

/// 128-bit identifier correlating an invocation request with its response.
///
/// Generated fresh per call. Uniqueness within the channel lifetime is
/// what lets responses come back in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// WorkerPath
// =============================================================================

/// Validated path to a worker executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPath(PathBuf);

impl WorkerPath {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        let path = path.into();
        if !path.exists() {
            return Err(ValidationError::WorkerPathNotFound { path });
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let executable = path
                .metadata()
                .map(|m| m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false);
            if !executable {
                return Err(ValidationError::WorkerNotExecutable { path });
            }
        }
        Ok(Self(path))
    }

    /// Skip filesystem checks. For paths already validated elsewhere.
    pub fn new_unchecked(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for WorkerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

// =============================================================================
// MethodPath
// =============================================================================

/// Fully qualified method path, e.g. `calc::add`.
///
/// At least two `::`-separated segments, each a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodPath(String);

impl MethodPath {
    pub fn new(path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = path.into();
        let segments: Vec<&str> = path.split("::").collect();
        if segments.len() < 2 {
            return Err(ValidationError::InvalidFieldValue {
                field: "method_path",
                value: path,
                reason: "must contain at least two '::'-separated segments".to_string(),
            });
        }
        for segment in &segments {
            if !is_valid_identifier(segment) {
                let reason = format!("segment '{segment}' is not a valid identifier");
                return Err(ValidationError::InvalidFieldValue {
                    field: "method_path",
                    value: path,
                    reason,
                });
            }
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split("::")
    }

    /// The final segment, i.e. the bare method name.
    pub fn method_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

fn is_valid_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for MethodPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MethodPath> for String {
    fn from(path: MethodPath) -> Self {
        path.0
    }
}
