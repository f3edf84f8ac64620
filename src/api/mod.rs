pub mod orders;
pub mod withdrawals;

use crate::health::HealthChecker;
use crate::services::ledger::LedgerService;
use crate::services::orders::OrderService;
use crate::services::withdrawals::WithdrawalService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub withdrawals: WithdrawalService,
    pub ledger: LedgerService,
    pub health: HealthChecker,
}
