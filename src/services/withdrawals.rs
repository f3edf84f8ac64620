//! Withdrawal workflow.
//!
//! A designer turns accumulated balance into an external payout through a
//! small state machine: pending at request (balance untouched), the
//! approval debits the full amount, completion is terminal, and a
//! cancellation or failure after approval restores the balance through
//! the store's compensating refund.

use chrono::{Datelike, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::info;
use uuid::Uuid;

use crate::config::SettlementConfig;
use crate::database::store::{
    PayoutDetails, SettlementStore, Withdrawal, WithdrawalStatus, WithdrawalTransition,
};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::money::Money;
use crate::services::notification::{DomainEvent, EventSink};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));
static ACCOUNT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6,20}$").expect("static regex"));
static ROUTING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6,12}$").expect("static regex"));

fn validate_payout(details: &PayoutDetails) -> AppResult<()> {
    let invalid = |field: &str, reason: &str| {
        AppError::validation(ValidationError::InvalidField {
            field: field.to_string(),
            reason: reason.to_string(),
        })
    };
    match details {
        PayoutDetails::BankTransfer {
            account_holder,
            bank_name,
            account_number,
            routing_number,
        } => {
            if account_holder.trim().is_empty() {
                return Err(AppError::validation(ValidationError::MissingField {
                    field: "account_holder".to_string(),
                }));
            }
            if bank_name.trim().is_empty() {
                return Err(AppError::validation(ValidationError::MissingField {
                    field: "bank_name".to_string(),
                }));
            }
            if !ACCOUNT_NUMBER_RE.is_match(account_number.trim()) {
                return Err(invalid("account_number", "must be 6-20 digits"));
            }
            if !ROUTING_NUMBER_RE.is_match(routing_number.trim()) {
                return Err(invalid("routing_number", "must be 6-12 digits"));
            }
            Ok(())
        }
        PayoutDetails::Paypal { email } => {
            if !EMAIL_RE.is_match(email.trim()) {
                return Err(invalid("email", "must be a valid email address"));
            }
            Ok(())
        }
    }
}

#[derive(Clone)]
pub struct WithdrawalService {
    store: Arc<dyn SettlementStore>,
    events: Arc<dyn EventSink>,
    settlement: SettlementConfig,
}

impl WithdrawalService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        events: Arc<dyn EventSink>,
        settlement: SettlementConfig,
    ) -> Self {
        Self {
            store,
            events,
            settlement,
        }
    }

    /// Create a pending withdrawal. The fee (platform's cut of the
    /// requested amount) and the net payout are frozen here; the balance
    /// is not debited until approval.
    pub async fn request_withdrawal(
        &self,
        designer_id: Uuid,
        amount: Money,
        payout: PayoutDetails,
    ) -> AppResult<Withdrawal> {
        if amount.currency() != self.settlement.currency {
            return Err(AppError::validation(ValidationError::InvalidCurrency {
                currency: amount.currency().to_string(),
                reason: format!("withdrawals are settled in {}", self.settlement.currency),
            }));
        }
        if amount.minor() < self.settlement.minimum_withdrawal.minor() {
            return Err(AppError::validation(ValidationError::BelowMinimum {
                field: "amount".to_string(),
                minimum: self.settlement.minimum_withdrawal.to_decimal_string(),
            }));
        }
        validate_payout(&payout)?;

        let ledger = self.store.find_ledger(designer_id).await?.ok_or_else(|| {
            AppError::domain(DomainError::DesignerNotFound {
                designer_id: designer_id.to_string(),
            })
        })?;
        if amount.minor() > ledger.balance.minor() {
            return Err(AppError::domain(DomainError::InsufficientBalance {
                available: ledger.balance.to_decimal_string(),
                requested: amount.to_decimal_string(),
            }));
        }

        let fee = amount.multiply_by_rate(self.settlement.withdrawal_fee_percent)?;
        let net_amount = amount.checked_sub(&fee)?;

        let now = Utc::now();
        let year = now.year();
        let sequence = self.store.next_sequence("withdrawal", year).await?;
        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            withdrawal_number: format!("WD-{}-{:06}", year, sequence),
            designer_id,
            amount,
            fee,
            net_amount,
            payout,
            status: WithdrawalStatus::Pending,
            external_transaction_id: None,
            status_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_withdrawal(&withdrawal).await?;

        info!(
            withdrawal_id = %withdrawal.id,
            withdrawal_number = %withdrawal.withdrawal_number,
            designer_id = %designer_id,
            amount = %withdrawal.amount,
            fee = %withdrawal.fee,
            "withdrawal requested"
        );

        Ok(withdrawal)
    }

    pub async fn get_withdrawal(&self, withdrawal_id: Uuid) -> AppResult<Withdrawal> {
        self.store
            .find_withdrawal(withdrawal_id)
            .await?
            .ok_or_else(|| not_found(withdrawal_id))
    }

    /// Administrative approval: pending→processing, debiting the full
    /// requested amount (the fee is the platform's share of that debit,
    /// not an extra charge).
    pub async fn approve(&self, withdrawal_id: Uuid) -> AppResult<Withdrawal> {
        match self.store.approve_withdrawal(withdrawal_id).await? {
            WithdrawalTransition::Applied(withdrawal) => {
                info!(
                    withdrawal_id = %withdrawal.id,
                    withdrawal_number = %withdrawal.withdrawal_number,
                    amount = %withdrawal.amount,
                    "withdrawal approved, balance debited"
                );
                Ok(withdrawal)
            }
            WithdrawalTransition::InvalidState { current } => Err(invalid_transition(
                current,
                WithdrawalStatus::Processing,
            )),
            WithdrawalTransition::InsufficientBalance { available } => {
                Err(AppError::domain(DomainError::InsufficientBalance {
                    available: available.to_decimal_string(),
                    requested: "withdrawal amount".to_string(),
                }))
            }
            WithdrawalTransition::NotFound => Err(not_found(withdrawal_id)),
        }
    }

    /// processing→completed; records the payout rail's transaction id.
    pub async fn complete(
        &self,
        withdrawal_id: Uuid,
        external_transaction_id: &str,
    ) -> AppResult<Withdrawal> {
        if external_transaction_id.trim().is_empty() {
            return Err(AppError::validation(ValidationError::MissingField {
                field: "external_transaction_id".to_string(),
            }));
        }

        match self
            .store
            .complete_withdrawal(withdrawal_id, external_transaction_id)
            .await?
        {
            WithdrawalTransition::Applied(withdrawal) => {
                self.events.publish(DomainEvent::WithdrawalCompleted {
                    withdrawal_id: withdrawal.id,
                    withdrawal_number: withdrawal.withdrawal_number.clone(),
                    designer_id: withdrawal.designer_id,
                    net_amount: withdrawal.net_amount,
                    external_transaction_id: external_transaction_id.to_string(),
                });
                info!(
                    withdrawal_id = %withdrawal.id,
                    withdrawal_number = %withdrawal.withdrawal_number,
                    net_amount = %withdrawal.net_amount,
                    "withdrawal completed"
                );
                Ok(withdrawal)
            }
            WithdrawalTransition::InvalidState { current } => Err(invalid_transition(
                current,
                WithdrawalStatus::Completed,
            )),
            WithdrawalTransition::InsufficientBalance { .. } => Err(AppError::invariant(
                crate::error::InvariantViolation::LedgerReconciliation {
                    detail: "completion must not touch the balance".to_string(),
                },
            )),
            WithdrawalTransition::NotFound => Err(not_found(withdrawal_id)),
        }
    }

    /// Cancel from pending (no balance effect) or from processing (the
    /// approval debit is restored in the same transaction).
    pub async fn cancel(&self, withdrawal_id: Uuid, reason: &str) -> AppResult<Withdrawal> {
        match self.store.cancel_withdrawal(withdrawal_id, reason).await? {
            WithdrawalTransition::Applied(withdrawal) => {
                info!(
                    withdrawal_id = %withdrawal.id,
                    withdrawal_number = %withdrawal.withdrawal_number,
                    reason = %reason,
                    "withdrawal cancelled"
                );
                Ok(withdrawal)
            }
            WithdrawalTransition::InvalidState { current } => Err(invalid_transition(
                current,
                WithdrawalStatus::Cancelled,
            )),
            WithdrawalTransition::InsufficientBalance { .. } => Err(AppError::invariant(
                crate::error::InvariantViolation::LedgerReconciliation {
                    detail: "cancellation must not debit the balance".to_string(),
                },
            )),
            WithdrawalTransition::NotFound => Err(not_found(withdrawal_id)),
        }
    }

    /// Mark a processing withdrawal failed at the payout rail; the debit
    /// is restored like a cancellation.
    pub async fn fail(&self, withdrawal_id: Uuid, reason: &str) -> AppResult<Withdrawal> {
        match self.store.fail_withdrawal(withdrawal_id, reason).await? {
            WithdrawalTransition::Applied(withdrawal) => {
                info!(
                    withdrawal_id = %withdrawal.id,
                    withdrawal_number = %withdrawal.withdrawal_number,
                    reason = %reason,
                    "withdrawal failed, balance restored"
                );
                Ok(withdrawal)
            }
            WithdrawalTransition::InvalidState { current } => {
                Err(invalid_transition(current, WithdrawalStatus::Failed))
            }
            WithdrawalTransition::InsufficientBalance { .. } => Err(AppError::invariant(
                crate::error::InvariantViolation::LedgerReconciliation {
                    detail: "failure handling must not debit the balance".to_string(),
                },
            )),
            WithdrawalTransition::NotFound => Err(not_found(withdrawal_id)),
        }
    }
}

fn not_found(withdrawal_id: Uuid) -> AppError {
    AppError::domain(DomainError::WithdrawalNotFound {
        withdrawal_id: withdrawal_id.to_string(),
    })
}

fn invalid_transition(current: WithdrawalStatus, requested: WithdrawalStatus) -> AppError {
    AppError::domain(DomainError::InvalidStateTransition {
        entity: "withdrawal",
        current: current.to_string(),
        requested: requested.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryStore;
    use crate::database::store::DesignerLedger;
    use crate::money::Currency;
    use crate::services::notification::RecordingSink;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn usd(s: &str) -> Money {
        Money::parse(s, Currency::Usd).unwrap()
    }

    fn settlement_config() -> SettlementConfig {
        SettlementConfig {
            currency: Currency::Usd,
            tax_rate_percent: Decimal::from(8),
            withdrawal_fee_percent: Decimal::from_str("2.5").unwrap(),
            minimum_withdrawal: usd("25.00"),
            default_commission_percent: Decimal::from(70),
        }
    }

    fn bank_payout() -> PayoutDetails {
        PayoutDetails::BankTransfer {
            account_holder: "Jordan Designer".to_string(),
            bank_name: "First National".to_string(),
            account_number: "001234567890".to_string(),
            routing_number: "110000000".to_string(),
        }
    }

    async fn harness(balance: &str) -> (WithdrawalService, Arc<InMemoryStore>, Arc<RecordingSink>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let designer_id = Uuid::new_v4();

        let mut ledger = DesignerLedger::new(designer_id, Currency::Usd);
        if balance != "0.00" {
            ledger.credit(usd(balance)).unwrap();
        }
        store.upsert_ledger(ledger).await;

        let service = WithdrawalService::new(store.clone(), sink.clone(), settlement_config());
        (service, store, sink, designer_id)
    }

    async fn balance_of(store: &InMemoryStore, designer_id: Uuid) -> Money {
        store
            .find_ledger(designer_id)
            .await
            .unwrap()
            .unwrap()
            .balance
    }

    #[tokio::test]
    async fn request_freezes_fee_and_net_without_debiting() {
        let (service, store, _, designer_id) = harness("150.00").await;

        let withdrawal = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .expect("request should succeed");

        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
        assert_eq!(withdrawal.fee, usd("2.50"));
        assert_eq!(withdrawal.net_amount, usd("97.50"));
        assert!(withdrawal.withdrawal_number.starts_with("WD-"));

        // balance untouched until approval
        assert_eq!(balance_of(&store, designer_id).await, usd("150.00"));
    }

    #[tokio::test]
    async fn approve_then_complete_runs_the_happy_path() {
        let (service, store, sink, designer_id) = harness("150.00").await;
        let withdrawal = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();

        let approved = service.approve(withdrawal.id).await.unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Processing);
        // the full amount leaves the balance, not the net
        assert_eq!(balance_of(&store, designer_id).await, usd("50.00"));

        let completed = service.complete(withdrawal.id, "BANK-TX-991").await.unwrap();
        assert_eq!(completed.status, WithdrawalStatus::Completed);
        assert_eq!(completed.external_transaction_id.as_deref(), Some("BANK-TX-991"));
        assert_eq!(balance_of(&store, designer_id).await, usd("50.00"));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DomainEvent::WithdrawalCompleted { .. }));

        // terminal: nothing else may happen
        drop(events);
        assert_eq!(
            service.cancel(withdrawal.id, "too late").await.unwrap_err().status_code(),
            409
        );
        assert_eq!(
            service.complete(withdrawal.id, "BANK-TX-992").await.unwrap_err().status_code(),
            409
        );
    }

    #[tokio::test]
    async fn boundaries_exact_balance_passes_one_cent_over_fails() {
        let (service, _, _, designer_id) = harness("150.00").await;

        let exact = service
            .request_withdrawal(designer_id, usd("150.00"), bank_payout())
            .await;
        assert!(exact.is_ok());

        let over = service
            .request_withdrawal(designer_id, usd("150.01"), bank_payout())
            .await
            .unwrap_err();
        assert_eq!(over.status_code(), 422);
    }

    #[tokio::test]
    async fn below_minimum_is_a_validation_error() {
        let (service, _, _, designer_id) = harness("150.00").await;
        let err = service
            .request_withdrawal(designer_id, usd("24.99"), bank_payout())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn payout_schemas_fail_fast() {
        let (service, _, _, designer_id) = harness("150.00").await;

        let bad_account = PayoutDetails::BankTransfer {
            account_holder: "Jordan Designer".to_string(),
            bank_name: "First National".to_string(),
            account_number: "12ab".to_string(),
            routing_number: "110000000".to_string(),
        };
        assert_eq!(
            service
                .request_withdrawal(designer_id, usd("100.00"), bad_account)
                .await
                .unwrap_err()
                .status_code(),
            400
        );

        let bad_email = PayoutDetails::Paypal {
            email: "not-an-email".to_string(),
        };
        assert_eq!(
            service
                .request_withdrawal(designer_id, usd("100.00"), bad_email)
                .await
                .unwrap_err()
                .status_code(),
            400
        );

        let good_paypal = PayoutDetails::Paypal {
            email: "designer@example.com".to_string(),
        };
        assert!(service
            .request_withdrawal(designer_id, usd("100.00"), good_paypal)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn cancel_before_approval_never_touches_the_balance() {
        let (service, store, _, designer_id) = harness("150.00").await;
        let withdrawal = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();

        let cancelled = service
            .cancel(withdrawal.id, "designer changed their mind")
            .await
            .unwrap();
        assert_eq!(cancelled.status, WithdrawalStatus::Cancelled);
        assert_eq!(balance_of(&store, designer_id).await, usd("150.00"));
    }

    #[tokio::test]
    async fn request_approve_cancel_restores_the_exact_balance() {
        let (service, store, _, designer_id) = harness("150.00").await;
        let withdrawal = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();

        service.approve(withdrawal.id).await.unwrap();
        assert_eq!(balance_of(&store, designer_id).await, usd("50.00"));

        let cancelled = service
            .cancel(withdrawal.id, "payout rail rejected the account")
            .await
            .unwrap();
        assert_eq!(cancelled.status, WithdrawalStatus::Cancelled);
        // no fee is charged on a cancelled withdrawal
        assert_eq!(balance_of(&store, designer_id).await, usd("150.00"));
    }

    #[tokio::test]
    async fn fail_from_processing_restores_the_balance() {
        let (service, store, _, designer_id) = harness("150.00").await;
        let withdrawal = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();
        service.approve(withdrawal.id).await.unwrap();

        let failed = service
            .fail(withdrawal.id, "account number rejected")
            .await
            .unwrap();
        assert_eq!(failed.status, WithdrawalStatus::Failed);
        assert_eq!(failed.status_reason.as_deref(), Some("account number rejected"));
        assert_eq!(balance_of(&store, designer_id).await, usd("150.00"));

        // failing a pending withdrawal is not a legal transition
        let other = service
            .request_withdrawal(designer_id, usd("50.00"), bank_payout())
            .await
            .unwrap();
        assert_eq!(
            service.fail(other.id, "x").await.unwrap_err().status_code(),
            409
        );
    }

    #[tokio::test]
    async fn double_approval_cannot_double_debit() {
        let (service, store, _, designer_id) = harness("150.00").await;
        let withdrawal = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();

        service.approve(withdrawal.id).await.unwrap();
        let second = service.approve(withdrawal.id).await.unwrap_err();
        assert_eq!(second.status_code(), 409);
        assert_eq!(balance_of(&store, designer_id).await, usd("50.00"));
    }

    #[tokio::test]
    async fn approval_rechecks_the_balance() {
        // Two pending withdrawals can both pass the request-time check;
        // only one approval may win the remaining balance.
        let (service, store, _, designer_id) = harness("150.00").await;
        let first = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();
        let second = service
            .request_withdrawal(designer_id, usd("100.00"), bank_payout())
            .await
            .unwrap();

        service.approve(first.id).await.unwrap();
        let err = service.approve(second.id).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(balance_of(&store, designer_id).await, usd("50.00"));

        // the losing withdrawal is still pending and can be cancelled
        let still_pending = service.get_withdrawal(second.id).await.unwrap();
        assert_eq!(still_pending.status, WithdrawalStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_designer_and_unknown_withdrawal_are_404s() {
        let (service, _, _, _) = harness("150.00").await;

        let err = service
            .request_withdrawal(Uuid::new_v4(), usd("100.00"), bank_payout())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = service.approve(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
