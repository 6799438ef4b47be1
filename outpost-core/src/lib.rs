//! Outpost Core Library
//!
//! Core library for the Outpost cross-process invocation subsystem.
//! Provides the method registry, wire protocol, framed Unix-socket
//! transport, domain lifecycle, and worker process supervision.

pub mod config;
pub mod domain;
pub mod error;
pub mod registry;
pub mod supervisor;
pub mod transport;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, DomainOptions, RUNTIME_DIR_ENV};
pub use domain::{DisconnectReason, Domain, DomainRole, DomainState};
pub use error::{EligibilityError, OutpostError, OutpostResult};
pub use registry::{Binding, MethodDecl, MethodRegistry, Visibility};
pub use types::{DomainName, MessageId, MethodPath, ProcessToken, RendezvousName, WorkerPath};
pub use wire::{CallOutcome, MethodFault};
