use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Span;

const CHANNEL_CAPACITY: usize = 256;

/// Structured payloads handed to notifiers after a successful persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    Created {
        booking_id: Ulid,
        facility_id: Ulid,
        reference: String,
        span: Span,
        total: Decimal,
        currency: String,
    },
    Cancelled {
        booking_id: Ulid,
        facility_id: Ulid,
        reference: String,
        reason: String,
    },
    /// Staff-facing alert for a freshly booked slot.
    NewBookingAlert {
        booking_id: Ulid,
        facility_id: Ulid,
        reference: String,
        span: Span,
    },
}

impl BookingEvent {
    pub fn facility_id(&self) -> Ulid {
        match self {
            BookingEvent::Created { facility_id, .. }
            | BookingEvent::Cancelled { facility_id, .. }
            | BookingEvent::NewBookingAlert { facility_id, .. } => *facility_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "created",
            BookingEvent::Cancelled { .. } => "cancelled",
            BookingEvent::NewBookingAlert { .. } => "new_booking_alert",
        }
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Out-of-process delivery (email, SMS, webhooks).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, event: &BookingEvent) -> Result<(), NotifyError>;
}

/// Broadcast hub for in-process listeners per facility, plus fire-and-forget
/// dispatch to registered notifiers.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<BookingEvent>>,
    sinks: Vec<Arc<dyn Notifier>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Subscribe to notifications for a facility. Creates the channel if needed.
    pub fn subscribe(&self, facility_id: Ulid) -> broadcast::Receiver<BookingEvent> {
        let sender = self
            .channels
            .entry(facility_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. Never blocks and never fails: listeners that are
    /// gone are ignored, sink errors are logged on their own task.
    pub fn send(&self, event: &BookingEvent) {
        if let Some(sender) = self.channels.get(&event.facility_id()) {
            let _ = sender.send(event.clone());
        }
        if self.sinks.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no runtime available, dropping {} notification", event.label());
            metrics::counter!(crate::observability::NOTIFY_FAILURES_TOTAL).increment(1);
            return;
        };
        for sink in &self.sinks {
            let sink = sink.clone();
            let event = event.clone();
            handle.spawn(async move {
                if let Err(e) = sink.deliver(&event).await {
                    tracing::warn!(
                        "{} notification for {} failed: {e}",
                        event.label(),
                        event.facility_id()
                    );
                    metrics::counter!(crate::observability::NOTIFY_FAILURES_TOTAL).increment(1);
                }
            });
        }
    }
}
