//! Postgres settlement store.
//!
//! Every compound operation runs inside a transaction with a
//! compare-and-set on the current status (`... WHERE payment_status =
//! 'pending'`), and balance math is pushed into guarded `UPDATE`
//! statements (`... AND balance_minor >= $n`), so concurrent callers
//! serialize on the row and the loser of a race observes zero affected
//! rows instead of applying a duplicate effect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::store::{
    BillingAddress, DesignerLedger, LedgerCredit, Order, OrderItem, OrderStatus, PaymentStatus,
    PayoutDetails, RefundOutcome, SettleOutcome, SettlementStore, StoreError, Withdrawal,
    WithdrawalStatus, WithdrawalTransition,
};
use crate::money::{Currency, Money};
use crate::payments::types::PaymentMethod;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    DatabaseError::from_sqlx(err).into()
}

fn corrupted(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupted(format!("{}: {}", what, detail))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    buyer_id: Uuid,
    subtotal_minor: i64,
    tax_minor: i64,
    discount_minor: i64,
    total_minor: i64,
    currency: String,
    billing_address: serde_json::Value,
    status: String,
    payment_status: String,
    payment_method: String,
    provider_transaction_id: Option<String>,
    provider_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    design_id: Uuid,
    designer_id: Uuid,
    title: String,
    unit_price_minor: i64,
    quantity: i32,
    line_total_minor: i64,
    commission_rate_percent: Decimal,
    designer_earnings_minor: i64,
    platform_fee_minor: i64,
}

#[derive(Debug, FromRow)]
struct DesignerRow {
    id: Uuid,
    balance_minor: i64,
    total_earnings_minor: i64,
    total_sales: i64,
    currency: String,
}

#[derive(Debug, FromRow)]
struct WithdrawalRow {
    id: Uuid,
    withdrawal_number: String,
    designer_id: Uuid,
    amount_minor: i64,
    fee_minor: i64,
    net_amount_minor: i64,
    currency: String,
    payout_details: serde_json::Value,
    status: String,
    external_transaction_id: Option<String>,
    status_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, item_rows: Vec<OrderItemRow>) -> Result<Order, StoreError> {
        let currency =
            Currency::from_str(&self.currency).map_err(|e| corrupted("order currency", e))?;
        let money = |minor: i64, what: &str| -> Result<Money, StoreError> {
            Money::from_minor(minor, currency).map_err(|e| corrupted(what, e))
        };

        let mut items = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            items.push(OrderItem {
                id: row.id,
                order_id: row.order_id,
                design_id: row.design_id,
                designer_id: row.designer_id,
                title: row.title,
                unit_price: money(row.unit_price_minor, "item unit price")?,
                quantity: u32::try_from(row.quantity)
                    .map_err(|_| corrupted("item quantity", row.quantity))?,
                line_total: money(row.line_total_minor, "item line total")?,
                commission_rate_percent: row.commission_rate_percent,
                designer_earnings: money(row.designer_earnings_minor, "item earnings")?,
                platform_fee: money(row.platform_fee_minor, "item platform fee")?,
            });
        }

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            buyer_id: self.buyer_id,
            items,
            subtotal: money(self.subtotal_minor, "order subtotal")?,
            tax: money(self.tax_minor, "order tax")?,
            discount: money(self.discount_minor, "order discount")?,
            total: money(self.total_minor, "order total")?,
            billing_address: serde_json::from_value::<BillingAddress>(self.billing_address)
                .map_err(|e| corrupted("billing address", e))?,
            status: OrderStatus::from_db_status(&self.status)
                .ok_or_else(|| corrupted("order status", &self.status))?,
            payment_status: PaymentStatus::from_db_status(&self.payment_status)
                .ok_or_else(|| corrupted("payment status", &self.payment_status))?,
            payment_method: PaymentMethod::from_str(&self.payment_method)
                .map_err(|e| corrupted("payment method", e))?,
            provider_transaction_id: self.provider_transaction_id,
            provider_reference: self.provider_reference,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DesignerRow {
    fn into_ledger(self) -> Result<DesignerLedger, StoreError> {
        let currency =
            Currency::from_str(&self.currency).map_err(|e| corrupted("ledger currency", e))?;
        Ok(DesignerLedger {
            designer_id: self.id,
            balance: Money::from_minor(self.balance_minor, currency)
                .map_err(|e| corrupted("ledger balance", e))?,
            total_earnings: Money::from_minor(self.total_earnings_minor, currency)
                .map_err(|e| corrupted("ledger earnings", e))?,
            total_sales: self.total_sales,
        })
    }
}

impl WithdrawalRow {
    fn into_withdrawal(self) -> Result<Withdrawal, StoreError> {
        let currency =
            Currency::from_str(&self.currency).map_err(|e| corrupted("withdrawal currency", e))?;
        let money = |minor: i64, what: &str| -> Result<Money, StoreError> {
            Money::from_minor(minor, currency).map_err(|e| corrupted(what, e))
        };
        Ok(Withdrawal {
            id: self.id,
            withdrawal_number: self.withdrawal_number,
            designer_id: self.designer_id,
            amount: money(self.amount_minor, "withdrawal amount")?,
            fee: money(self.fee_minor, "withdrawal fee")?,
            net_amount: money(self.net_amount_minor, "withdrawal net amount")?,
            payout: serde_json::from_value::<PayoutDetails>(self.payout_details)
                .map_err(|e| corrupted("payout details", e))?,
            status: WithdrawalStatus::from_db_status(&self.status)
                .ok_or_else(|| corrupted("withdrawal status", &self.status))?,
            external_transaction_id: self.external_transaction_id,
            status_reason: self.status_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, buyer_id, subtotal_minor, tax_minor, \
     discount_minor, total_minor, currency, billing_address, status, payment_status, \
     payment_method, provider_transaction_id, provider_reference, paid_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, design_id, designer_id, title, unit_price_minor, \
     quantity, line_total_minor, commission_rate_percent, designer_earnings_minor, \
     platform_fee_minor";

const WITHDRAWAL_COLUMNS: &str = "id, withdrawal_number, designer_id, amount_minor, fee_minor, \
     net_amount_minor, currency, payout_details, status, external_transaction_id, status_reason, \
     created_at, updated_at";

impl PgStore {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        row.into_order(items).map(Some)
    }

    async fn load_withdrawal(&self, withdrawal_id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawals WHERE id = $1",
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(WithdrawalRow::into_withdrawal).transpose()
    }
}

#[async_trait]
impl SettlementStore for PgStore {
    async fn next_sequence(&self, kind: &str, year: i32) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO number_sequences (kind, year, value) VALUES ($1, $2, 1) \
             ON CONFLICT (kind, year) DO UPDATE SET value = number_sequences.value + 1 \
             RETURNING value",
        )
        .bind(kind)
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let billing = serde_json::to_value(&order.billing_address)
            .map_err(|e| corrupted("billing address", e))?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO orders \
             (id, order_number, buyer_id, subtotal_minor, tax_minor, discount_minor, \
              total_minor, currency, billing_address, status, payment_status, payment_method, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.buyer_id)
        .bind(order.subtotal.minor())
        .bind(order.tax.minor())
        .bind(order.discount.minor())
        .bind(order.total.minor())
        .bind(order.total.currency().code())
        .bind(billing)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, design_id, designer_id, title, unit_price_minor, quantity, \
                  line_total_minor, commission_rate_percent, designer_earnings_minor, \
                  platform_fee_minor, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.design_id)
            .bind(item.designer_id)
            .bind(&item.title)
            .bind(item.unit_price.minor())
            .bind(i32::try_from(item.quantity).map_err(|_| {
                StoreError::Invariant(format!("item quantity {} out of range", item.quantity))
            })?)
            .bind(item.line_total.minor())
            .bind(item.commission_rate_percent)
            .bind(item.designer_earnings.minor())
            .bind(item.platform_fee.minor())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        self.load_order(order_id).await
    }

    async fn record_push_reference(
        &self,
        order_id: Uuid,
        reference: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders SET provider_reference = $2, updated_at = now() \
             WHERE id = $1 AND payment_status = 'pending'",
        )
        .bind(order_id)
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn clear_push_reference(&self, order_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders SET provider_reference = NULL, updated_at = now() \
             WHERE id = $1 AND payment_status = 'pending'",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn settle_order(
        &self,
        order_id: Uuid,
        provider_transaction_id: &str,
        credits: &[LedgerCredit],
        paid_at: DateTime<Utc>,
    ) -> Result<SettleOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The CAS: only the caller that flips pending->paid applies credits.
        let flipped = sqlx::query_scalar::<_, Uuid>(
            "UPDATE orders SET payment_status = 'paid', status = 'completed', \
             provider_transaction_id = $2, paid_at = $3, updated_at = now() \
             WHERE id = $1 AND payment_status = 'pending' \
             RETURNING id",
        )
        .bind(order_id)
        .bind(provider_transaction_id)
        .bind(paid_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if flipped.is_none() {
            tx.rollback().await.map_err(db_err)?;
            let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            return Ok(match exists {
                Some(_) => SettleOutcome::AlreadyPaid,
                None => SettleOutcome::NotFound,
            });
        }

        for credit in credits {
            let applied = sqlx::query(
                "UPDATE designers SET balance_minor = balance_minor + $2, \
                 total_earnings_minor = total_earnings_minor + $2, \
                 total_sales = total_sales + 1, updated_at = now() \
                 WHERE id = $1",
            )
            .bind(credit.designer_id)
            .bind(credit.amount.minor())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if applied.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(StoreError::Invariant(format!(
                    "settlement credit for unknown designer {}",
                    credit.designer_id
                )));
            }
        }

        tx.commit().await.map_err(db_err)?;

        match self.load_order(order_id).await? {
            Some(order) => Ok(SettleOutcome::Settled(order)),
            None => Err(StoreError::Invariant(
                "settled order vanished after commit".to_string(),
            )),
        }
    }

    async fn refund_order(
        &self,
        order_id: Uuid,
        reversals: &[LedgerCredit],
    ) -> Result<RefundOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let flipped = sqlx::query_scalar::<_, Uuid>(
            "UPDATE orders SET payment_status = 'refunded', status = 'refunded', \
             updated_at = now() \
             WHERE id = $1 AND payment_status = 'paid' \
             RETURNING id",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if flipped.is_none() {
            tx.rollback().await.map_err(db_err)?;
            let current = sqlx::query_scalar::<_, String>(
                "SELECT payment_status FROM orders WHERE id = $1",
            )
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            return Ok(match current {
                Some(status) => RefundOutcome::InvalidState {
                    current: PaymentStatus::from_db_status(&status)
                        .ok_or_else(|| corrupted("payment status", &status))?,
                },
                None => RefundOutcome::NotFound,
            });
        }

        for reversal in reversals {
            // Guarded: a reversal that would go negative aborts the refund.
            let applied = sqlx::query(
                "UPDATE designers SET balance_minor = balance_minor - $2, updated_at = now() \
                 WHERE id = $1 AND balance_minor >= $2",
            )
            .bind(reversal.designer_id)
            .bind(reversal.amount.minor())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if applied.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(StoreError::Invariant(format!(
                    "refund reversal would drive designer {} balance negative",
                    reversal.designer_id
                )));
            }
        }

        tx.commit().await.map_err(db_err)?;

        match self.load_order(order_id).await? {
            Some(order) => Ok(RefundOutcome::Refunded(order)),
            None => Err(StoreError::Invariant(
                "refunded order vanished after commit".to_string(),
            )),
        }
    }

    async fn find_ledger(&self, designer_id: Uuid) -> Result<Option<DesignerLedger>, StoreError> {
        let row = sqlx::query_as::<_, DesignerRow>(
            "SELECT id, balance_minor, total_earnings_minor, total_sales, currency \
             FROM designers WHERE id = $1",
        )
        .bind(designer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(DesignerRow::into_ledger).transpose()
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        let payout =
            serde_json::to_value(&withdrawal.payout).map_err(|e| corrupted("payout details", e))?;

        sqlx::query(
            "INSERT INTO withdrawals \
             (id, withdrawal_number, designer_id, amount_minor, fee_minor, net_amount_minor, \
              currency, payout_details, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(withdrawal.id)
        .bind(&withdrawal.withdrawal_number)
        .bind(withdrawal.designer_id)
        .bind(withdrawal.amount.minor())
        .bind(withdrawal.fee.minor())
        .bind(withdrawal.net_amount.minor())
        .bind(withdrawal.amount.currency().code())
        .bind(payout)
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.created_at)
        .bind(withdrawal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<Option<Withdrawal>, StoreError> {
        self.load_withdrawal(withdrawal_id).await
    }

    async fn approve_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<WithdrawalTransition, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let flipped = sqlx::query_as::<_, (Uuid, i64)>(
            "UPDATE withdrawals SET status = 'processing', updated_at = now() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING designer_id, amount_minor",
        )
        .bind(withdrawal_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some((designer_id, amount_minor)) = flipped else {
            tx.rollback().await.map_err(db_err)?;
            return self.withdrawal_conflict(withdrawal_id).await;
        };

        let debited = sqlx::query(
            "UPDATE designers SET balance_minor = balance_minor - $2, updated_at = now() \
             WHERE id = $1 AND balance_minor >= $2",
        )
        .bind(designer_id)
        .bind(amount_minor)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if debited.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            let ledger = self.find_ledger(designer_id).await?.ok_or_else(|| {
                StoreError::Invariant(format!("withdrawal for unknown designer {}", designer_id))
            })?;
            return Ok(WithdrawalTransition::InsufficientBalance {
                available: ledger.balance,
            });
        }

        tx.commit().await.map_err(db_err)?;

        match self.load_withdrawal(withdrawal_id).await? {
            Some(withdrawal) => Ok(WithdrawalTransition::Applied(withdrawal)),
            None => Err(StoreError::Invariant(
                "approved withdrawal vanished after commit".to_string(),
            )),
        }
    }

    async fn complete_withdrawal(
        &self,
        withdrawal_id: Uuid,
        external_transaction_id: &str,
    ) -> Result<WithdrawalTransition, StoreError> {
        let updated = sqlx::query(
            "UPDATE withdrawals SET status = 'completed', external_transaction_id = $2, \
             updated_at = now() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(withdrawal_id)
        .bind(external_transaction_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return self.withdrawal_conflict(withdrawal_id).await;
        }

        match self.load_withdrawal(withdrawal_id).await? {
            Some(withdrawal) => Ok(WithdrawalTransition::Applied(withdrawal)),
            None => Err(StoreError::Invariant(
                "completed withdrawal vanished".to_string(),
            )),
        }
    }

    async fn cancel_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalTransition, StoreError> {
        self.cancel_or_fail(withdrawal_id, reason, "cancelled", true)
            .await
    }

    async fn fail_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalTransition, StoreError> {
        self.cancel_or_fail(withdrawal_id, reason, "failed", false)
            .await
    }
}

impl PgStore {
    /// Distinguish "not found" from "wrong state" after a zero-row CAS.
    async fn withdrawal_conflict(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<WithdrawalTransition, StoreError> {
        let current =
            sqlx::query_scalar::<_, String>("SELECT status FROM withdrawals WHERE id = $1")
                .bind(withdrawal_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(match current {
            Some(status) => WithdrawalTransition::InvalidState {
                current: WithdrawalStatus::from_db_status(&status)
                    .ok_or_else(|| corrupted("withdrawal status", &status))?,
            },
            None => WithdrawalTransition::NotFound,
        })
    }

    async fn cancel_or_fail(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
        target: &str,
        allow_pending: bool,
    ) -> Result<WithdrawalTransition, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query_as::<_, (String, Uuid, i64)>(
            "SELECT status, designer_id, amount_minor FROM withdrawals \
             WHERE id = $1 FOR UPDATE",
        )
        .bind(withdrawal_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some((status, designer_id, amount_minor)) = row else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(WithdrawalTransition::NotFound);
        };

        let current = WithdrawalStatus::from_db_status(&status)
            .ok_or_else(|| corrupted("withdrawal status", &status))?;

        match current {
            WithdrawalStatus::Pending if allow_pending => {
                // Balance was never debited; nothing to restore.
            }
            WithdrawalStatus::Processing => {
                // Compensate the approval debit.
                let refunded = sqlx::query(
                    "UPDATE designers SET balance_minor = balance_minor + $2, \
                     updated_at = now() WHERE id = $1",
                )
                .bind(designer_id)
                .bind(amount_minor)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                if refunded.rows_affected() == 0 {
                    tx.rollback().await.map_err(db_err)?;
                    return Err(StoreError::Invariant(format!(
                        "withdrawal refund for unknown designer {}",
                        designer_id
                    )));
                }
            }
            other => {
                tx.rollback().await.map_err(db_err)?;
                return Ok(WithdrawalTransition::InvalidState { current: other });
            }
        }

        sqlx::query(
            "UPDATE withdrawals SET status = $2, status_reason = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(withdrawal_id)
        .bind(target)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        match self.load_withdrawal(withdrawal_id).await? {
            Some(withdrawal) => Ok(WithdrawalTransition::Applied(withdrawal)),
            None => Err(StoreError::Invariant(
                "withdrawal vanished after cancel".to_string(),
            )),
        }
    }
}
