//! # Example: cohorts
//!
//! Selective shutdown of one function group while the rest of the scope keeps running.
//!
//! Shows how to:
//! - register tasks under a cohort with [`SpawnOptions::with_cohort`];
//! - wait for a cohort with a timeout;
//! - drain a single cohort with [`LocalScope::shutdown_function`](scopevisor::LocalScope::shutdown_function).
//!
//! ## Run
//! ```bash
//! cargo run --example cohorts
//! ```

use std::time::Duration;

use scopevisor::{Config, Root, SpawnOptions, TaskError};
use tokio_util::sync::CancellationToken;

fn until_cancelled(ctx: CancellationToken) -> impl std::future::Future<Output = Result<(), TaskError>> {
    async move {
        ctx.cancelled().await;
        Err(TaskError::Canceled)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let root = Root::new(Config::default());
    let scope = root.app("ingest").local("pipeline");

    for cohort in ["fetch", "parse", "store"] {
        for _ in 0..2 {
            scope.spawn(
                format!("{cohort}-worker"),
                until_cancelled,
                SpawnOptions::new().with_cohort(cohort),
            )?;
        }
    }
    println!("groups: {:?}", scope.list_function_labels());

    let drained = scope
        .wait_for_function_timeout("parse", Duration::from_millis(100))
        .await;
    println!("parse drained on its own: {drained}");

    scope
        .shutdown_function("parse", Duration::from_millis(500))
        .await?;
    tokio::time::sleep(Duration::from_millis(10)).await;

    for task in scope.list_tasks() {
        println!("still running: {} (cohort {:?})", task.label(), task.cohort());
    }

    scope.shutdown(true).await?;
    println!("tasks left: {}", scope.task_count());
    Ok(())
}
