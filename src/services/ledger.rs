//! Ledger queries and credit computation.
//!
//! The mutations themselves (credit at settle, debit at withdrawal
//! approval, compensating refunds) run inside the store's atomic
//! operations; this service is the read side plus the pure function that
//! turns a settled order into its per-item credits.

use std::sync::Arc;

use uuid::Uuid;

use crate::database::store::{DesignerLedger, LedgerCredit, Order, SettlementStore};
use crate::error::{AppError, AppResult, DomainError};

/// One credit per order item: a designer selling two items in one order
/// is credited twice and their sales count grows by two.
pub fn credits_for_order(order: &Order) -> Vec<LedgerCredit> {
    order
        .items
        .iter()
        .map(|item| LedgerCredit {
            designer_id: item.designer_id,
            amount: item.designer_earnings,
        })
        .collect()
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn SettlementStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    pub async fn ledger(&self, designer_id: Uuid) -> AppResult<DesignerLedger> {
        self.store
            .find_ledger(designer_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::DesignerNotFound {
                    designer_id: designer_id.to_string(),
                })
            })
    }
}
