//! Live update subscription and event merge.

use tokio::sync::mpsc;

use tabula_core::{EngineError, LiveEvent, LiveEventKind};

use crate::engine::QueryStateEngine;

impl QueryStateEngine {
    /// Subscribe to live updates for the current object type.
    ///
    /// An existing subscription is released first. Returns the event stream;
    /// pass it to `run_live_events` or feed events to `apply_live_event`.
    pub async fn subscribe_live(&self) -> Result<mpsc::UnboundedReceiver<LiveEvent>, EngineError> {
        let push = self.push.clone().ok_or(EngineError::NoPushService)?;

        self.unsubscribe_live().await?;

        let object_type = self.table.read(|s| s.query.object_type.clone());
        let channel = push.channel_for(object_type).await?;
        let stream = push.subscribe(channel).await?;
        tracing::info!("Subscribed to live updates on '{}'", stream.subscription.channel);

        let replaced = self.subscription.lock().replace(stream.subscription);
        if let Some(old) = replaced {
            // Another subscribe finished while this one was in flight.
            if let Err(e) = push.unsubscribe(old).await {
                tracing::warn!("Failed to release live subscription: {}", e);
            }
        }
        Ok(stream.events)
    }

    /// Release the live subscription. Returns false if there was none.
    ///
    /// A failure to unsubscribe is logged and the handle is dropped anyway.
    pub async fn unsubscribe_live(&self) -> Result<bool, EngineError> {
        let push = self.push.clone().ok_or(EngineError::NoPushService)?;
        let Some(subscription) = self.subscription.lock().take() else {
            return Ok(false);
        };

        let channel = subscription.channel.clone();
        match push.unsubscribe(subscription).await {
            Ok(()) => tracing::debug!("Unsubscribed from '{}'", channel),
            Err(e) => tracing::warn!("Failed to unsubscribe from '{}': {}", channel, e),
        }
        Ok(true)
    }

    pub fn is_live(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Merge one live event. Returns true if the table changed.
    ///
    /// Events that are not newer than the last applied event, or older than
    /// the last full reload, are ignored.
    pub async fn apply_live_event(&self, event: LiveEvent) -> Result<bool, EngineError> {
        if !self.table.update(|s| s.guard.accept(&event)) {
            return Ok(false);
        }

        tracing::debug!(
            "Live event {} {:?} '{}'",
            event.sequence_id,
            event.kind,
            event.record_id
        );
        match event.kind {
            LiveEventKind::Created => self.add_row(&event.record_id).await,
            LiveEventKind::Updated => self.refresh_row(&event.record_id).await,
            LiveEventKind::Deleted => Ok(self.remove_row(&event.record_id)),
        }
    }

    /// Apply events until the stream closes. Failed events are logged.
    pub async fn run_live_events(&self, mut events: mpsc::UnboundedReceiver<LiveEvent>) {
        while let Some(event) = events.recv().await {
            let id = event.record_id.clone();
            if let Err(e) = self.apply_live_event(event).await {
                tracing::warn!("Failed to apply live event for '{}': {}", id, e);
            }
        }
        tracing::debug!("Live event stream closed");
    }
}
