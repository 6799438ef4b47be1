// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Demo method surface.
//!
//! Both sides of a demo pair declare these methods: the parent needs
//! the declarations to judge eligibility before sending, the worker
//! needs the handlers to execute what arrives.

use serde_json::{json, Value};

use outpost_core::{MethodFault, MethodRegistry, OutpostResult};

/// Declare the demo methods on a registry.
pub fn install(registry: &MethodRegistry) -> OutpostResult<()> {
    registry.register("calc::add", |args| {
        let a = require_i64(&args, 0)?;
        let b = require_i64(&args, 1)?;
        Ok(json!(a + b))
    })?;

    registry.register("calc::div", |args| {
        let a = require_i64(&args, 0)?;
        let b = require_i64(&args, 1)?;
        if b == 0 {
            return Err(MethodFault::invalid_operation("division by zero"));
        }
        Ok(json!(a / b))
    })?;

    registry.register("text::greet", |args| {
        let name = require_str(&args, 0)?;
        Ok(json!(format!("Hello, {name}!")))
    })?;

    // Sleeps on the blocking pool, so a slow call here never holds up
    // a fast one on the same channel.
    registry.register("clock::sleep_ms", |args| {
        let ms = require_i64(&args, 0)?;
        let ms = u64::try_from(ms)
            .map_err(|_| MethodFault::invalid_arguments("sleep duration must be non-negative"))?;
        std::thread::sleep(std::time::Duration::from_millis(ms));
        Ok(json!(ms))
    })?;

    registry.register("env::worker_pid", |_args| Ok(json!(std::process::id())))?;

    registry.register("faulty::boom", |_args| {
        Err(MethodFault::invalid_operation("boom"))
    })?;

    Ok(())
}

fn require_i64(args: &[Value], index: usize) -> Result<i64, MethodFault> {
    args.get(index).and_then(Value::as_i64).ok_or_else(|| {
        MethodFault::invalid_arguments(format!("argument {index} must be an integer"))
    })
}

fn require_str<'a>(args: &'a [Value], index: usize) -> Result<&'a str, MethodFault> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        MethodFault::invalid_arguments(format!("argument {index} must be a string"))
    })
}
