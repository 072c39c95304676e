//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait and filter kinds with `interested`.
//! - Inspect [`Event`] / [`EventKind`] for task lifecycle metrics.
//! - Wire the subscriber into [`Root::builder`] and read its drop counter.
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::{sync::Arc, time::Duration};

use scopevisor::{Config, Event, EventKind, Outcome, Root, SpawnOptions, Subscribe, TaskError};
use tokio_util::sync::CancellationToken;

/// A console subscriber that prints selected events.
/// In real life, you could export metrics, ship logs, or trigger alerts.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let scope = ev.scope.as_deref().unwrap_or("<none>");
        let task = ev.task.as_deref().unwrap_or("<unknown>");

        match ev.kind {
            EventKind::TaskSpawned => println!("[sub] spawned:   {scope} task={task}"),
            EventKind::TaskCompleted => {
                let outcome = ev.outcome.as_ref().map(Outcome::as_label).unwrap_or("?");
                println!(
                    "[sub] completed: {scope} task={task} outcome={outcome} elapsed={}ms",
                    ev.elapsed_ms.unwrap_or(0)
                );
            }
            EventKind::TimeoutHit => println!(
                "[sub] timeout:   {scope} task={task} after {}ms",
                ev.timeout_ms.unwrap_or(0)
            ),
            EventKind::ShutdownCompleted => println!(
                "[sub] shutdown:  {scope} stuck={} elapsed={}ms",
                ev.stuck.unwrap_or(0),
                ev.elapsed_ms.unwrap_or(0)
            ),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }

    fn interested(&self, kind: EventKind) -> bool {
        matches!(
            kind,
            EventKind::TaskSpawned
                | EventKind::TaskCompleted
                | EventKind::TimeoutHit
                | EventKind::ShutdownCompleted
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
    let root = Root::builder(Config::default())
        .with_subscribers(subs)
        .build();
    let scope = root.app("demo").local("main");

    scope.spawn(
        "bounded",
        |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(200),
            })
        },
        SpawnOptions::new().with_timeout(Duration::from_millis(200)),
    )?;
    scope.spawn(
        "boom",
        |_ctx: CancellationToken| async move {
            let batch: Vec<u32> = Vec::new();
            println!("first item: {}", batch[0]);
            Ok(())
        },
        SpawnOptions::new(),
    )?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    root.shutdown(true).await?;
    for (name, dropped) in root.subscriber_drops() {
        println!("[sub] {name} dropped {dropped} events");
    }
    Ok(())
}
