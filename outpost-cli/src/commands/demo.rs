//! `outpost demo` command - Spawn a worker and run a scripted tour.
//!
//! Creates a child domain, invokes methods across the process
//! boundary, and shows faults, concurrency, and teardown events.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use outpost_core::{Domain, MethodRegistry, WorkerPath};

pub async fn execute(
    config_path: Option<&str>,
    name: Option<&str>,
    worker: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let setup = super::resolve_setup(config_path, name, worker)?;

    tracing::info!(
        domain = %setup.name,
        worker = %setup.worker.display(),
        "Starting demo"
    );

    // The parent gets the same method surface as the worker, but every
    // call below travels over the channel and runs in the worker.
    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry)?;

    let worker = WorkerPath::new(&setup.worker)?;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      OUTPOST DEMO                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    println!("▶ Creating domain '{}'", setup.name);
    let start = Instant::now();
    let domain = Domain::create(
        setup.name.clone(),
        &worker,
        Arc::clone(&registry),
        setup.options,
    )
    .await?;
    let pid = domain.child_pid().unwrap_or(0);
    println!(
        "  ✓ Worker attached (PID: {}, {}ms)",
        pid,
        start.elapsed().as_millis()
    );

    domain.on_unloading(|| println!("  ◌ Domain is unloading..."))?;
    domain.on_unloaded(|| println!("  ✓ Domain unloaded"))?;

    println!();
    println!("▶ calc::add(2, 3)");
    let sum = domain.execute("calc::add", vec![json!(2), json!(3)]).await?;
    println!("  ✓ {}", sum);

    println!();
    println!("▶ text::greet(\"world\")");
    let greeting = domain.execute("text::greet", vec![json!("world")]).await?;
    println!("  ✓ {}", greeting);

    println!();
    println!("▶ env::worker_pid()");
    let worker_pid = domain.execute("env::worker_pid", vec![]).await?;
    println!(
        "  ✓ worker runs as pid {} (this process is {})",
        worker_pid,
        std::process::id()
    );

    println!();
    println!("▶ calc::div(1, 0) - expected to fault");
    match domain.execute("calc::div", vec![json!(1), json!(0)]).await {
        Ok(value) => println!("  ✗ unexpectedly succeeded: {}", value),
        Err(e) => println!("  ✓ fault came back: {}", e),
    }

    println!();
    println!("▶ concurrent calls: clock::sleep_ms(600) alongside calc::add(20, 22)");
    let slow = {
        let domain = Arc::clone(&domain);
        tokio::spawn(async move { domain.execute("clock::sleep_ms", vec![json!(600)]).await })
    };
    let fast_start = Instant::now();
    let fast = domain
        .execute("calc::add", vec![json!(20), json!(22)])
        .await?;
    println!(
        "  ✓ fast call returned {} after {}ms (slow call finished: {})",
        fast,
        fast_start.elapsed().as_millis(),
        slow.is_finished()
    );
    let slept = slow.await??;
    println!("  ✓ slow call returned after sleeping {}ms", slept);

    println!();
    println!("▶ Shutting down");
    domain.shutdown();

    println!();
    println!("Demo complete.");
    Ok(())
}
