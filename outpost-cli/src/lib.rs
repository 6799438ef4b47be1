//! Shared pieces of the Outpost binaries.
//!
//! The demo method surface lives here so the CLI, the worker binary,
//! and the cross-process tests all declare the same methods.

pub mod demo;
