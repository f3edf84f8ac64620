//! Settlement entities and the storage contract.
//!
//! The store trait exposes the compound operations the orchestrator needs
//! as single atomic units: order-plus-items insertion, the pending→paid
//! settle (status flip and ledger credits commit together), and the
//! withdrawal transitions that move balance. Every guarded transition is a
//! compare-and-set on the current status, so two racing callers cannot
//! both apply the same balance effect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::money::{Money, MoneyError};
use crate::payments::types::PaymentMethod;

// ============================================================================
// Status state machines
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Legal transitions. A decline is not a transition: the order stays
    /// pending and retryable.
    pub fn valid_transitions(&self) -> Vec<PaymentStatus> {
        match self {
            PaymentStatus::Pending => vec![PaymentStatus::Paid, PaymentStatus::Failed],
            PaymentStatus::Paid => vec![PaymentStatus::Refunded],
            PaymentStatus::Failed => vec![],
            PaymentStatus::Refunded => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Cancelled => "cancelled",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(WithdrawalStatus::Pending),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "cancelled" => Some(WithdrawalStatus::Cancelled),
            "failed" => Some(WithdrawalStatus::Failed),
            _ => None,
        }
    }

    pub fn valid_transitions(&self) -> Vec<WithdrawalStatus> {
        match self {
            WithdrawalStatus::Pending => {
                vec![WithdrawalStatus::Processing, WithdrawalStatus::Cancelled]
            }
            WithdrawalStatus::Processing => vec![
                WithdrawalStatus::Completed,
                WithdrawalStatus::Cancelled,
                WithdrawalStatus::Failed,
            ],
            // Terminal states
            WithdrawalStatus::Completed => vec![],
            WithdrawalStatus::Cancelled => vec![],
            WithdrawalStatus::Failed => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Cancelled | WithdrawalStatus::Failed
        )
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Billing address captured at order creation. A copy, never a live
/// reference to the buyer's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingAddress {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub billing_address: BillingAddress,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub provider_transaction_id: Option<String>,
    /// Reference returned by a push provider while the payment is in
    /// flight; cleared when the push fails.
    pub provider_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One purchased design, frozen at creation: the commission split is
/// computed once from the designer's rate at that instant and never
/// recomputed, even if the live rate changes later.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub design_id: Uuid,
    pub designer_id: Uuid,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    pub commission_rate_percent: Decimal,
    pub designer_earnings: Money,
    pub platform_fee: Money,
}

/// Payout destination for a withdrawal, one schema per method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "payout_method", rename_all = "snake_case")]
pub enum PayoutDetails {
    BankTransfer {
        account_holder: String,
        bank_name: String,
        account_number: String,
        routing_number: String,
    },
    Paypal {
        email: String,
    },
}

impl PayoutDetails {
    pub fn method_str(&self) -> &'static str {
        match self {
            PayoutDetails::BankTransfer { .. } => "bank_transfer",
            PayoutDetails::Paypal { .. } => "paypal",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub withdrawal_number: String,
    pub designer_id: Uuid,
    pub amount: Money,
    /// Platform's cut of `amount`, frozen at request time. The designer is
    /// paid `net_amount`; the full `amount` is what leaves the balance.
    pub fee: Money,
    pub net_amount: Money,
    pub payout: PayoutDetails,
    pub status: WithdrawalStatus,
    pub external_transaction_id: Option<String>,
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance: available {available}, attempted {attempted}")]
    InsufficientBalance { available: String, attempted: String },

    #[error("operation would drive balance negative: available {available}, attempted {attempted}")]
    WouldGoNegative { available: String, attempted: String },

    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Accounting state attached to a designer: withdrawable balance, lifetime
/// earnings and sales count. `total_earnings` and `total_sales` never
/// decrease.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DesignerLedger {
    pub designer_id: Uuid,
    pub balance: Money,
    pub total_earnings: Money,
    pub total_sales: i64,
}

impl DesignerLedger {
    pub fn new(designer_id: Uuid, currency: crate::money::Currency) -> Self {
        Self {
            designer_id,
            balance: Money::zero(currency),
            total_earnings: Money::zero(currency),
            total_sales: 0,
        }
    }

    /// Settle one paid order item: balance and lifetime earnings grow by
    /// the item's designer earnings, sales count by one.
    pub fn credit(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.balance = self.balance.checked_add(&amount)?;
        self.total_earnings = self.total_earnings.checked_add(&amount)?;
        self.total_sales += 1;
        Ok(())
    }

    /// Withdrawal approval takes the full requested amount out of the
    /// balance. Fails without touching state when the balance is short.
    pub fn debit(&mut self, amount: Money) -> Result<(), LedgerError> {
        if amount.minor() > self.balance.minor() {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance.to_decimal_string(),
                attempted: amount.to_decimal_string(),
            });
        }
        self.balance = self.balance.checked_sub(&amount)?;
        Ok(())
    }

    /// Reverse a withdrawal debit when a processing withdrawal is
    /// cancelled or fails. Lifetime counters are untouched.
    pub fn refund_debit(&mut self, amount: Money) -> Result<(), LedgerError> {
        self.balance = self.balance.checked_add(&amount)?;
        Ok(())
    }

    /// Reverse an order-item credit on refund. Only the balance moves;
    /// `total_earnings` and `total_sales` are monotonic. If the funds were
    /// already withdrawn this fails, which callers treat as an invariant
    /// violation rather than clamping.
    pub fn reverse_credit(&mut self, amount: Money) -> Result<(), LedgerError> {
        if amount.minor() > self.balance.minor() {
            return Err(LedgerError::WouldGoNegative {
                available: self.balance.to_decimal_string(),
                attempted: amount.to_decimal_string(),
            });
        }
        self.balance = self.balance.checked_sub(&amount)?;
        Ok(())
    }
}

/// One ledger credit, one per order item.
#[derive(Debug, Clone)]
pub struct LedgerCredit {
    pub designer_id: Uuid,
    pub amount: Money,
}

// ============================================================================
// Store contract
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error: {message}")]
    Database { message: String, retryable: bool },

    #[error("corrupted record: {0}")]
    Corrupted(String),

    #[error("store invariant violated: {0}")]
    Invariant(String),
}

impl From<StoreError> for crate::error::AppError {
    fn from(err: StoreError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError, InvariantViolation};
        match err {
            StoreError::Database { message, retryable } => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message,
                    is_retryable: retryable,
                }))
            }
            StoreError::Corrupted(detail) => {
                AppError::invariant(InvariantViolation::PartialWrite { detail })
            }
            StoreError::Invariant(detail) => {
                AppError::invariant(InvariantViolation::LedgerReconciliation { detail })
            }
        }
    }
}

#[derive(Debug)]
pub enum SettleOutcome {
    Settled(Order),
    /// Lost the pending→paid race (or the order was already settled).
    AlreadyPaid,
    NotFound,
}

#[derive(Debug)]
pub enum RefundOutcome {
    Refunded(Order),
    InvalidState { current: PaymentStatus },
    NotFound,
}

#[derive(Debug)]
pub enum WithdrawalTransition {
    Applied(Withdrawal),
    InvalidState { current: WithdrawalStatus },
    InsufficientBalance { available: Money },
    NotFound,
}

/// Persistence contract for the settlement core.
///
/// Each method is a single atomic unit; no intermediate state is
/// observable to other callers. Provider network calls happen before any
/// of these are invoked, so no store operation blocks on external I/O.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Next value of a per-year counter (`kind` is "order" or
    /// "withdrawal"); used for human-readable document numbers.
    async fn next_sequence(&self, kind: &str, year: i32) -> Result<i64, StoreError>;

    /// Persist an order and all of its items, or nothing.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Attach a push provider's reference to a still-pending order.
    async fn record_push_reference(
        &self,
        order_id: Uuid,
        reference: &str,
    ) -> Result<(), StoreError>;

    /// Drop the stored push reference after an observed push failure so a
    /// fresh push can be initiated.
    async fn clear_push_reference(&self, order_id: Uuid) -> Result<(), StoreError>;

    /// The pending→paid edge: flip payment status to paid and order status
    /// to completed, record the provider transaction id, and apply every
    /// ledger credit, all in one transaction, guarded so that exactly one
    /// caller wins.
    async fn settle_order(
        &self,
        order_id: Uuid,
        provider_transaction_id: &str,
        credits: &[LedgerCredit],
        paid_at: DateTime<Utc>,
    ) -> Result<SettleOutcome, StoreError>;

    /// paid→refunded plus reversal of every item credit. A reversal that
    /// would drive a balance negative aborts the whole transaction.
    async fn refund_order(
        &self,
        order_id: Uuid,
        reversals: &[LedgerCredit],
    ) -> Result<RefundOutcome, StoreError>;

    async fn find_ledger(&self, designer_id: Uuid) -> Result<Option<DesignerLedger>, StoreError>;

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError>;

    async fn find_withdrawal(&self, withdrawal_id: Uuid)
        -> Result<Option<Withdrawal>, StoreError>;

    /// pending→processing plus the balance debit, one transaction.
    async fn approve_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<WithdrawalTransition, StoreError>;

    /// processing→completed; terminal, no balance change.
    async fn complete_withdrawal(
        &self,
        withdrawal_id: Uuid,
        external_transaction_id: &str,
    ) -> Result<WithdrawalTransition, StoreError>;

    /// pending→cancelled (no balance effect) or processing→cancelled with
    /// the debited amount restored.
    async fn cancel_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalTransition, StoreError>;

    /// processing→failed with the debited amount restored.
    async fn fail_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalTransition, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::Usd).unwrap()
    }

    fn ledger_with_balance(minor: i64) -> DesignerLedger {
        let mut ledger = DesignerLedger::new(Uuid::new_v4(), Currency::Usd);
        ledger.credit(usd(minor)).unwrap();
        ledger
    }

    #[test]
    fn credit_moves_balance_earnings_and_sales_together() {
        let mut ledger = DesignerLedger::new(Uuid::new_v4(), Currency::Usd);
        ledger.credit(usd(7_000)).unwrap();
        ledger.credit(usd(3_000)).unwrap();
        assert_eq!(ledger.balance, usd(10_000));
        assert_eq!(ledger.total_earnings, usd(10_000));
        assert_eq!(ledger.total_sales, 2);
    }

    #[test]
    fn debit_is_guarded_and_leaves_lifetime_counters_alone() {
        let mut ledger = ledger_with_balance(10_000);
        ledger.debit(usd(4_000)).unwrap();
        assert_eq!(ledger.balance, usd(6_000));
        assert_eq!(ledger.total_earnings, usd(10_000));
        assert_eq!(ledger.total_sales, 1);

        let err = ledger.debit(usd(6_001)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        // failed debit must not touch state
        assert_eq!(ledger.balance, usd(6_000));
    }

    #[test]
    fn refund_debit_restores_balance_exactly() {
        let mut ledger = ledger_with_balance(15_000);
        ledger.debit(usd(10_000)).unwrap();
        ledger.refund_debit(usd(10_000)).unwrap();
        assert_eq!(ledger.balance, usd(15_000));
        assert_eq!(ledger.total_earnings, usd(15_000));
    }

    #[test]
    fn reverse_credit_refuses_to_go_negative() {
        let mut ledger = ledger_with_balance(5_000);
        ledger.debit(usd(4_000)).unwrap();
        let err = ledger.reverse_credit(usd(5_000)).unwrap_err();
        assert!(matches!(err, LedgerError::WouldGoNegative { .. }));
        assert_eq!(ledger.balance, usd(1_000));
    }

    #[test]
    fn payment_status_transition_table() {
        assert!(PaymentStatus::Pending
            .valid_transitions()
            .contains(&PaymentStatus::Paid));
        assert!(PaymentStatus::Paid
            .valid_transitions()
            .contains(&PaymentStatus::Refunded));
        assert!(!PaymentStatus::Paid
            .valid_transitions()
            .contains(&PaymentStatus::Pending));
        assert!(PaymentStatus::Refunded.valid_transitions().is_empty());
        assert!(PaymentStatus::Refunded.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn withdrawal_status_transition_table() {
        assert_eq!(
            WithdrawalStatus::Pending.valid_transitions(),
            vec![WithdrawalStatus::Processing, WithdrawalStatus::Cancelled]
        );
        assert!(WithdrawalStatus::Processing
            .valid_transitions()
            .contains(&WithdrawalStatus::Failed));
        assert!(WithdrawalStatus::Completed.is_terminal());
        assert!(WithdrawalStatus::Completed.valid_transitions().is_empty());
    }

    #[test]
    fn statuses_round_trip_through_db_strings() {
        for status in [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Processing,
            WithdrawalStatus::Completed,
            WithdrawalStatus::Cancelled,
            WithdrawalStatus::Failed,
        ] {
            assert_eq!(WithdrawalStatus::from_db_status(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::from_db_status("mystery"), None);
    }
}
