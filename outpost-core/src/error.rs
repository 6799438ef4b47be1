//! Custom error types for Outpost.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::MethodPath;
use crate::wire::MethodFault;

/// Top-level error type for the Outpost invocation subsystem.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum OutpostError {
    // =========================================================================
    // Validation Errors - Fail-Fast on Invalid Input
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Eligibility Errors - Rejected Before Any I/O
    // =========================================================================
    #[error("Eligibility error: {0}")]
    Eligibility(#[from] EligibilityError),

    #[error("Method already declared: {0}")]
    MethodAlreadyDeclared(MethodPath),

    // =========================================================================
    // Wire Errors - Encoding and Decoding
    // =========================================================================
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    // =========================================================================
    // Transport Errors - Channel Setup and I/O
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // =========================================================================
    // Process Lifecycle Errors
    // =========================================================================
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Current domain is already initialized for this process")]
    CurrentDomainAlreadySet,

    // =========================================================================
    // Call Errors - Surfaced to the Waiting Caller
    // =========================================================================
    #[error("Remote execution failed: {0}")]
    Remote(#[from] MethodFault),

    #[error("Call to {method} timed out after {waited_ms}ms")]
    CallTimeout { method: String, waited_ms: u64 },

    #[error("Domain is closed: {reason}")]
    DomainClosed { reason: String },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Validation errors for names, paths, and options.
/// Produced by newtype constructors and the configuration loader.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Malformed rendezvous name: {name} - {reason}")]
    MalformedRendezvousName { name: String, reason: String },

    #[error("Worker path does not exist: {path}")]
    WorkerPathNotFound { path: PathBuf },

    #[error("Worker path is not executable: {path}")]
    WorkerNotExecutable { path: PathBuf },
}

/// Eligibility errors for remote invocation.
/// A method must be declared, public, static, and concrete before
/// it may be marshaled across the process boundary.
#[derive(Debug, Error)]
pub enum EligibilityError {
    #[error("Method not declared: {path}")]
    UnknownMethod { path: MethodPath },

    #[error("Method {path} is private - only public declarations may be invoked remotely")]
    PrivateMethod { path: MethodPath },

    #[error("Method {path} is instance-bound - only static declarations may be invoked remotely")]
    InstanceMethod { path: MethodPath },

    #[error("Method {path} is abstract - declaration has no handler body")]
    AbstractMethod { path: MethodPath },
}

/// Wire protocol errors - message encoding, decoding, and frame integrity.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("Unknown payload type tag: {tag}")]
    UnknownPayloadType { tag: u32 },

    #[error("Frame payload size exceeds maximum: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Cannot send an empty frame payload")]
    EmptyPayload,
}

/// Transport errors - rendezvous setup and mid-session I/O failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind rendezvous socket {path}: {reason}")]
    BindFailed { path: PathBuf, reason: String },

    #[error("Failed to connect to rendezvous socket {path}: {reason}")]
    ConnectFailed { path: PathBuf, reason: String },

    #[error("Peer did not attach to the rendezvous point within {timeout_ms}ms")]
    AttachTimeout { timeout_ms: u64 },

    #[error("Transport I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Process lifecycle errors - spawning and supervising peer processes.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to spawn worker process {path}: {reason}")]
    SpawnFailed { path: PathBuf, reason: String },

    #[error("Cannot subscribe lifecycle observer: domain is {state}")]
    SubscribeAfterTeardown { state: &'static str },

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Result type alias using OutpostError.
pub type OutpostResult<T> = Result<T, OutpostError>;
