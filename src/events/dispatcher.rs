use tokio::sync::mpsc;
use tracing::{info, warn};

use super::types::OutboundEvent;

/// Hands committed domain events to an asynchronous follow-up path
/// (notifications, marketplace callbacks) outside the locked reconciliation
/// scope. Emission never blocks and never fails the originating operation.
#[derive(Clone)]
pub struct EventDispatcher {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl EventDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: OutboundEvent) {
        if self.tx.send(event).is_err() {
            warn!("event dispatcher has no subscriber; dropping event");
        }
    }
}

/// Default subscriber: drains the channel and logs each event. Deployments
/// with a notification service replace this with their own consumer.
pub fn spawn_event_logger(
    mut rx: mpsc::UnboundedReceiver<OutboundEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!(event = %json, "domain event"),
                Err(e) => warn!("failed to serialize domain event: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{EventEnvelope, EventType, WalletEvent};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_emitted_events_reach_subscriber() {
        let (dispatcher, mut rx) = EventDispatcher::new();

        dispatcher.emit(OutboundEvent::Wallet(EventEnvelope::new(
            EventType::WalletCredited,
            WalletEvent {
                wallet_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                amount: dec!(5000),
                reference: "FND-1".to_string(),
            },
        )));

        let received = rx.recv().await.expect("event should arrive");
        match received {
            OutboundEvent::Wallet(envelope) => {
                assert_eq!(envelope.event_type, EventType::WalletCredited);
                assert_eq!(envelope.payload.amount, dec!(5000));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscriber_does_not_panic() {
        let (dispatcher, rx) = EventDispatcher::new();
        drop(rx);

        dispatcher.emit(OutboundEvent::Wallet(EventEnvelope::new(
            EventType::WalletDebited,
            WalletEvent {
                wallet_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                amount: dec!(100),
                reference: "WTH-1".to_string(),
            },
        )));
    }
}
