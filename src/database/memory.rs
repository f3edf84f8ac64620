//! In-memory settlement store.
//!
//! Backs `STORE_BACKEND=memory` development runs and the service-level
//! test suite. A single mutex around the whole state gives every store
//! operation the same all-or-nothing, serialized semantics the Postgres
//! implementation gets from transactions and guarded updates; mutations
//! are staged on clones and only written back once every step has
//! succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::store::{
    DesignerLedger, LedgerCredit, Order, OrderStatus, PaymentStatus, RefundOutcome, SettleOutcome,
    SettlementStore, StoreError, Withdrawal, WithdrawalStatus, WithdrawalTransition,
};

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    withdrawals: HashMap<Uuid, Withdrawal>,
    ledgers: HashMap<Uuid, DesignerLedger>,
    sequences: HashMap<(String, i32), i64>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a designer's ledger. Development and test hook;
    /// production designers come from the marketplace's user system.
    pub async fn upsert_ledger(&self, ledger: DesignerLedger) {
        let mut inner = self.inner.lock().await;
        inner.ledgers.insert(ledger.designer_id, ledger);
    }
}

fn apply_credits(
    ledgers: &HashMap<Uuid, DesignerLedger>,
    credits: &[LedgerCredit],
) -> Result<Vec<DesignerLedger>, StoreError> {
    let mut staged: HashMap<Uuid, DesignerLedger> = HashMap::new();
    for credit in credits {
        let ledger = match staged.get(&credit.designer_id) {
            Some(l) => l.clone(),
            None => ledgers
                .get(&credit.designer_id)
                .cloned()
                .ok_or_else(|| {
                    StoreError::Invariant(format!(
                        "credit for unknown designer {}",
                        credit.designer_id
                    ))
                })?,
        };
        let mut ledger = ledger;
        ledger
            .credit(credit.amount)
            .map_err(|e| StoreError::Invariant(e.to_string()))?;
        staged.insert(credit.designer_id, ledger);
    }
    Ok(staged.into_values().collect())
}

fn apply_reversals(
    ledgers: &HashMap<Uuid, DesignerLedger>,
    reversals: &[LedgerCredit],
) -> Result<Vec<DesignerLedger>, StoreError> {
    let mut staged: HashMap<Uuid, DesignerLedger> = HashMap::new();
    for reversal in reversals {
        let ledger = match staged.get(&reversal.designer_id) {
            Some(l) => l.clone(),
            None => ledgers
                .get(&reversal.designer_id)
                .cloned()
                .ok_or_else(|| {
                    StoreError::Invariant(format!(
                        "reversal for unknown designer {}",
                        reversal.designer_id
                    ))
                })?,
        };
        let mut ledger = ledger;
        ledger
            .reverse_credit(reversal.amount)
            .map_err(|e| StoreError::Invariant(e.to_string()))?;
        staged.insert(reversal.designer_id, ledger);
    }
    Ok(staged.into_values().collect())
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn next_sequence(&self, kind: &str, year: i32) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .sequences
            .entry((kind.to_string(), year))
            .or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&order_id).cloned())
    }

    async fn record_push_reference(
        &self,
        order_id: Uuid,
        reference: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(order) = inner.orders.get_mut(&order_id) {
            if order.payment_status == PaymentStatus::Pending {
                order.provider_reference = Some(reference.to_string());
                order.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn clear_push_reference(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(order) = inner.orders.get_mut(&order_id) {
            if order.payment_status == PaymentStatus::Pending {
                order.provider_reference = None;
                order.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn settle_order(
        &self,
        order_id: Uuid,
        provider_transaction_id: &str,
        credits: &[LedgerCredit],
        paid_at: DateTime<Utc>,
    ) -> Result<SettleOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(order) = inner.orders.get(&order_id) else {
            return Ok(SettleOutcome::NotFound);
        };
        if order.payment_status != PaymentStatus::Pending {
            return Ok(SettleOutcome::AlreadyPaid);
        }

        // Stage every ledger change before mutating anything, so a bad
        // credit leaves the order untouched.
        let staged = apply_credits(&inner.ledgers, credits)?;
        for ledger in staged {
            inner.ledgers.insert(ledger.designer_id, ledger);
        }

        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::Invariant("order vanished mid-settle".to_string()))?;
        order.payment_status = PaymentStatus::Paid;
        order.status = OrderStatus::Completed;
        order.provider_transaction_id = Some(provider_transaction_id.to_string());
        order.paid_at = Some(paid_at);
        order.updated_at = Utc::now();

        Ok(SettleOutcome::Settled(order.clone()))
    }

    async fn refund_order(
        &self,
        order_id: Uuid,
        reversals: &[LedgerCredit],
    ) -> Result<RefundOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(order) = inner.orders.get(&order_id) else {
            return Ok(RefundOutcome::NotFound);
        };
        if order.payment_status != PaymentStatus::Paid {
            return Ok(RefundOutcome::InvalidState {
                current: order.payment_status,
            });
        }

        let staged = apply_reversals(&inner.ledgers, reversals)?;
        for ledger in staged {
            inner.ledgers.insert(ledger.designer_id, ledger);
        }

        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::Invariant("order vanished mid-refund".to_string()))?;
        order.payment_status = PaymentStatus::Refunded;
        order.status = OrderStatus::Refunded;
        order.updated_at = Utc::now();

        Ok(RefundOutcome::Refunded(order.clone()))
    }

    async fn find_ledger(&self, designer_id: Uuid) -> Result<Option<DesignerLedger>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.ledgers.get(&designer_id).cloned())
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(())
    }

    async fn find_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<Option<Withdrawal>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.withdrawals.get(&withdrawal_id).cloned())
    }

    async fn approve_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<WithdrawalTransition, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(withdrawal) = inner.withdrawals.get(&withdrawal_id) else {
            return Ok(WithdrawalTransition::NotFound);
        };
        if withdrawal.status != WithdrawalStatus::Pending {
            return Ok(WithdrawalTransition::InvalidState {
                current: withdrawal.status,
            });
        }

        let designer_id = withdrawal.designer_id;
        let amount = withdrawal.amount;

        let mut ledger = inner
            .ledgers
            .get(&designer_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Invariant(format!("withdrawal for unknown designer {}", designer_id))
            })?;
        if let Err(e) = ledger.debit(amount) {
            return match e {
                crate::database::store::LedgerError::InsufficientBalance { .. } => {
                    Ok(WithdrawalTransition::InsufficientBalance {
                        available: inner.ledgers[&designer_id].balance,
                    })
                }
                other => Err(StoreError::Invariant(other.to_string())),
            };
        }
        inner.ledgers.insert(designer_id, ledger);

        let withdrawal = inner
            .withdrawals
            .get_mut(&withdrawal_id)
            .ok_or_else(|| StoreError::Invariant("withdrawal vanished mid-approve".to_string()))?;
        withdrawal.status = WithdrawalStatus::Processing;
        withdrawal.updated_at = Utc::now();

        Ok(WithdrawalTransition::Applied(withdrawal.clone()))
    }

    async fn complete_withdrawal(
        &self,
        withdrawal_id: Uuid,
        external_transaction_id: &str,
    ) -> Result<WithdrawalTransition, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(withdrawal) = inner.withdrawals.get_mut(&withdrawal_id) else {
            return Ok(WithdrawalTransition::NotFound);
        };
        if withdrawal.status != WithdrawalStatus::Processing {
            return Ok(WithdrawalTransition::InvalidState {
                current: withdrawal.status,
            });
        }

        withdrawal.status = WithdrawalStatus::Completed;
        withdrawal.external_transaction_id = Some(external_transaction_id.to_string());
        withdrawal.updated_at = Utc::now();

        Ok(WithdrawalTransition::Applied(withdrawal.clone()))
    }

    async fn cancel_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalTransition, StoreError> {
        self.cancel_or_fail(withdrawal_id, reason, WithdrawalStatus::Cancelled)
            .await
    }

    async fn fail_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalTransition, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(withdrawal) = inner.withdrawals.get(&withdrawal_id) else {
            return Ok(WithdrawalTransition::NotFound);
        };
        if withdrawal.status != WithdrawalStatus::Processing {
            return Ok(WithdrawalTransition::InvalidState {
                current: withdrawal.status,
            });
        }

        let designer_id = withdrawal.designer_id;
        let amount = withdrawal.amount;
        refund_into(&mut inner, designer_id, amount)?;

        let withdrawal = inner
            .withdrawals
            .get_mut(&withdrawal_id)
            .ok_or_else(|| StoreError::Invariant("withdrawal vanished mid-fail".to_string()))?;
        withdrawal.status = WithdrawalStatus::Failed;
        withdrawal.status_reason = Some(reason.to_string());
        withdrawal.updated_at = Utc::now();

        Ok(WithdrawalTransition::Applied(withdrawal.clone()))
    }
}

impl InMemoryStore {
    async fn cancel_or_fail(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
        target: WithdrawalStatus,
    ) -> Result<WithdrawalTransition, StoreError> {
        let mut inner = self.inner.lock().await;

        let Some(withdrawal) = inner.withdrawals.get(&withdrawal_id) else {
            return Ok(WithdrawalTransition::NotFound);
        };

        match withdrawal.status {
            // Balance was never touched at request time.
            WithdrawalStatus::Pending => {}
            // The approval debit must be restored.
            WithdrawalStatus::Processing => {
                let designer_id = withdrawal.designer_id;
                let amount = withdrawal.amount;
                refund_into(&mut inner, designer_id, amount)?;
            }
            current => return Ok(WithdrawalTransition::InvalidState { current }),
        }

        let withdrawal = inner
            .withdrawals
            .get_mut(&withdrawal_id)
            .ok_or_else(|| StoreError::Invariant("withdrawal vanished mid-cancel".to_string()))?;
        withdrawal.status = target;
        withdrawal.status_reason = Some(reason.to_string());
        withdrawal.updated_at = Utc::now();

        Ok(WithdrawalTransition::Applied(withdrawal.clone()))
    }
}

fn refund_into(
    inner: &mut Inner,
    designer_id: Uuid,
    amount: crate::money::Money,
) -> Result<(), StoreError> {
    let mut ledger = inner
        .ledgers
        .get(&designer_id)
        .cloned()
        .ok_or_else(|| {
            StoreError::Invariant(format!("refund for unknown designer {}", designer_id))
        })?;
    ledger
        .refund_debit(amount)
        .map_err(|e| StoreError::Invariant(e.to_string()))?;
    inner.ledgers.insert(designer_id, ledger);
    Ok(())
}
