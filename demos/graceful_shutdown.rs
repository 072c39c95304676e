//! # Example: graceful_shutdown
//!
//! Graceful-then-forced shutdown of a small tree, logged through [`LogWriter`].
//!
//! - three `fast` tasks finish on their own after 100ms;
//! - two `hang` tasks only exit when their token is cancelled;
//! - one `stubborn` task ignores its token and is force-removed after the timeout.
//!
//! ## Flow
//! ```text
//! Root::shutdown(true)
//!   └─► AppScope "jobs" ─► LocalScope "workers"
//!         ├─► cancel + drain "fast", "hang"      → CohortDrained
//!         ├─► cancel + drain "stubborn" (1s)     → CohortForced { stuck: 1 }
//!         └─► ShutdownCompleted
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=scopevisor=debug cargo run --example graceful_shutdown --features logging
//! ```

use std::{sync::Arc, time::Duration};

use scopevisor::{Config, LogWriter, Root, SpawnOptions, Subscribe, TaskError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        shutdown_timeout: Duration::from_secs(1),
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let root = Root::builder(cfg).with_subscribers(subs).build();
    let workers = root.app("jobs").local("workers");

    for _ in 0..3 {
        workers.spawn(
            "fast",
            |_ctx: CancellationToken| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            },
            SpawnOptions::new(),
        )?;
    }
    for _ in 0..2 {
        workers.spawn(
            "hang",
            |ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Err(TaskError::Canceled)
            },
            SpawnOptions::new(),
        )?;
    }
    workers.spawn(
        "stubborn",
        |_ctx: CancellationToken| async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        },
        SpawnOptions::new(),
    )?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("live tasks before shutdown: {}", root.task_count());

    match root.shutdown(true).await {
        Ok(()) => println!("drained cleanly"),
        Err(e) if e.is_advisory() => println!("completed with forcing: {e}"),
        Err(e) => return Err(e.into()),
    }
    println!("live tasks after shutdown: {}", root.task_count());
    Ok(())
}
