//! Domain events.
//!
//! The core emits events after the corresponding transaction commits; an
//! external notifier (email, webhooks) subscribes through [`EventSink`].
//! The core itself never sends anything; the default sink just logs.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPaid {
        order_id: Uuid,
        order_number: String,
        buyer_id: Uuid,
        total: Money,
        provider_transaction_id: String,
    },
    OrderRefunded {
        order_id: Uuid,
        order_number: String,
    },
    WithdrawalCompleted {
        withdrawal_id: Uuid,
        withdrawal_number: String,
        designer_id: Uuid,
        net_amount: Money,
        external_transaction_id: String,
    },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Structured-log sink; the default wiring.
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: DomainEvent) {
        match &event {
            DomainEvent::OrderPaid {
                order_id,
                order_number,
                total,
                provider_transaction_id,
                ..
            } => {
                info!(
                    order_id = %order_id,
                    order_number = %order_number,
                    total = %total,
                    provider_transaction_id = %provider_transaction_id,
                    "event: order paid"
                );
            }
            DomainEvent::OrderRefunded {
                order_id,
                order_number,
            } => {
                info!(
                    order_id = %order_id,
                    order_number = %order_number,
                    "event: order refunded"
                );
            }
            DomainEvent::WithdrawalCompleted {
                withdrawal_id,
                withdrawal_number,
                designer_id,
                net_amount,
                ..
            } => {
                info!(
                    withdrawal_id = %withdrawal_id,
                    withdrawal_number = %withdrawal_number,
                    designer_id = %designer_id,
                    net_amount = %net_amount,
                    "event: withdrawal completed"
                );
            }
        }
    }
}

/// Captures published events for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub events: std::sync::Mutex<Vec<DomainEvent>>,
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn publish(&self, event: DomainEvent) {
        self.events.lock().expect("sink lock").push(event);
    }
}
