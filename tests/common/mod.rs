#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use scopevisor::{Event, EventKind, Subscribe, TaskError};
use tokio_util::sync::CancellationToken;

/// Work that runs until its token is cancelled.
pub fn until_cancelled(ctx: CancellationToken) -> impl Future<Output = Result<(), TaskError>> {
    async move {
        ctx.cancelled().await;
        Err(TaskError::Canceled)
    }
}

pub type BoxWork = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// Work that sleeps for `d` without looking at its token.
pub fn sleeper(d: Duration) -> impl FnOnce(CancellationToken) -> BoxWork + Send + 'static {
    move |_ctx| {
        Box::pin(async move {
            tokio::time::sleep(d).await;
            Ok(())
        })
    }
}

/// Polls `cond` every 5ms for up to 2s.
pub async fn eventually(cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

/// Subscriber that stores every event it sees.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    pub fn of(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.events.lock().push(ev.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Subscriber whose `on_event` never returns.
pub struct Hanging;

#[async_trait]
impl Subscribe for Hanging {
    async fn on_event(&self, _ev: &Event) {
        std::future::pending::<()>().await;
    }

    fn name(&self) -> &'static str {
        "hanging"
    }

    fn queue_capacity(&self) -> usize {
        1
    }
}
