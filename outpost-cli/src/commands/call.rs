//! `outpost call` command - Invoke a single method in a worker.

use std::sync::Arc;

use serde_json::Value;

use outpost_core::{Domain, MethodRegistry, WorkerPath};

pub async fn execute(
    config_path: Option<&str>,
    name: Option<&str>,
    worker: Option<&str>,
    method: &str,
    args: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let setup = super::resolve_setup(config_path, name, worker)?;

    let args: Vec<Value> = serde_json::from_str(args)
        .map_err(|e| format!("arguments must be a JSON array: {}", e))?;

    tracing::info!(
        domain = %setup.name,
        method = %method,
        "Invoking method in worker"
    );

    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry)?;

    let worker = WorkerPath::new(&setup.worker)?;
    let domain = Domain::create(setup.name, &worker, Arc::clone(&registry), setup.options).await?;

    let result = domain.execute(method, args).await;
    domain.shutdown();

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Call failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
