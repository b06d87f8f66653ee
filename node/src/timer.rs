//! Timer service: posts a typed follow-up event after a delay.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{Event, Request};

/// Deliver `event` to the worker queue after `delay`.
pub fn schedule(events: mpsc::Sender<Request>, event: Event, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if events.send(Request::cast(event)).await.is_err() {
            debug!("worker gone; timer event dropped");
        }
    });
}
