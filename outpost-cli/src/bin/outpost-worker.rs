// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Outpost worker process.
//!
//! Spawned by a creating process with the rendezvous name as its only
//! argument. Attaches to the creator's channel, serves invocations
//! against the demo method surface, and exits when the domain closes,
//! including when the creator dies without saying goodbye.

use std::sync::Arc;

use outpost_core::{Domain, DomainOptions, MethodRegistry, RendezvousName};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = std::env::var("OUTPOST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let Some(rendezvous_arg) = std::env::args().nth(1) else {
        // No rendezvous: nothing to attach to, stay a root domain.
        let domain = Domain::current();
        tracing::info!(domain = %domain.name(), "No rendezvous given; running standalone");
        return Ok(());
    };

    let rendezvous = RendezvousName::parse(&rendezvous_arg)?;

    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry)?;

    // DomainOptions::default() picks up OUTPOST_RUNTIME_DIR from the
    // environment, which the creator set before spawning us.
    let domain = Domain::connect_child(&rendezvous, registry, DomainOptions::default()).await?;
    Domain::init_current(Arc::clone(&domain))?;

    let name = domain.name().clone();
    domain.on_unloading({
        let name = name.clone();
        move || tracing::info!(domain = %name, "Worker unloading")
    })?;
    domain.on_unloaded({
        let name = name.clone();
        move || tracing::info!(domain = %name, "Worker unloaded")
    })?;

    let reason = domain.wait_closed().await;
    tracing::info!(domain = %name, reason = %reason, "Worker exiting");
    Ok(())
}
