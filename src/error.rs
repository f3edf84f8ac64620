//! Unified error handling for the settlement backend.
//!
//! Every failure surfaced to the API layer is an [`AppError`] carrying a
//! kind (domain, validation, external, infrastructure, invariant), an HTTP
//! status, a machine-readable code and a user-facing message. Invariant
//! violations are the one kind that must never be shown verbatim to a
//! client: they indicate the ledger failed to reconcile and require
//! operator intervention.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::MoneyError;

/// Error codes for programmatic client handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "INSUFFICIENT_BALANCE")]
    InsufficientBalance,
    #[serde(rename = "ORDER_ALREADY_PAID")]
    OrderAlreadyPaid,
    #[serde(rename = "PAYMENT_DECLINED")]
    PaymentDeclined,
    #[serde(rename = "INVALID_STATE_TRANSITION")]
    InvalidStateTransition,
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "WITHDRAWAL_NOT_FOUND")]
    WithdrawalNotFound,
    #[serde(rename = "DESIGN_NOT_FOUND")]
    DesignNotFound,
    #[serde(rename = "DESIGNER_NOT_FOUND")]
    DesignerNotFound,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PROVIDER_UNAVAILABLE")]
    ProviderUnavailable,
    #[serde(rename = "PROVIDER_ERROR")]
    ProviderError,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Business-rule failures. Expected, user-facing, never retried blindly.
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Withdrawal amount exceeds the designer's withdrawable balance.
    InsufficientBalance { available: String, requested: String },
    /// Payment attempted on an order that is already paid. Distinct from a
    /// decline: it signals a client logic error, not a payment failure.
    AlreadyPaid { order_number: String },
    /// Provider rejected the payment; the order stays pending and the
    /// buyer may retry with different details.
    PaymentDeclined { reason: String },
    /// The requested transition is not legal from the current state.
    InvalidStateTransition {
        entity: &'static str,
        current: String,
        requested: String,
    },
    OrderNotFound { order_id: String },
    WithdrawalNotFound { withdrawal_id: String },
    DesignNotFound { design_id: String },
    DesignerNotFound { designer_id: String },
}

/// Database, configuration and other operational failures.
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// Failures of external payment providers.
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Transient provider/network failure; the same request may be retried
    /// by the caller. The core never retries a capture on its own.
    ProviderUnavailable { provider: String, message: String },
    /// Provider returned something unexpected (bad payload, hard error).
    Provider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
}

/// Malformed input. Recoverable by the caller correcting the request;
/// never mutates state.
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidAmount { amount: String, reason: String },
    InvalidCurrency { currency: String, reason: String },
    MissingField { field: String },
    InvalidField { field: String, reason: String },
    BelowMinimum { field: String, minimum: String },
    EmptyCart,
    PaymentMethodMismatch { expected: String, got: String },
}

/// Fatal accounting failures: ledger math that does not reconcile, a debit
/// that would drive a balance negative, a partially applied transaction.
/// Never shown to the end user; always logged and escalated.
#[derive(Debug, Clone)]
pub enum InvariantViolation {
    LedgerReconciliation { detail: String },
    PartialWrite { detail: String },
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
    Invariant(InvariantViolation),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn invariant(err: InvariantViolation) -> Self {
        Self::new(AppErrorKind::Invariant(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance { .. } => 422,
                DomainError::AlreadyPaid { .. } => 409,
                DomainError::PaymentDeclined { .. } => 402,
                DomainError::InvalidStateTransition { .. } => 409,
                DomainError::OrderNotFound { .. }
                | DomainError::WithdrawalNotFound { .. }
                | DomainError::DesignNotFound { .. }
                | DomainError::DesignerNotFound { .. } => 404,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderUnavailable { .. } => 503,
                ExternalError::Provider { .. } => 502,
            },
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::Invariant(_) => 500,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
                DomainError::AlreadyPaid { .. } => ErrorCode::OrderAlreadyPaid,
                DomainError::PaymentDeclined { .. } => ErrorCode::PaymentDeclined,
                DomainError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::WithdrawalNotFound { .. } => ErrorCode::WithdrawalNotFound,
                DomainError::DesignNotFound { .. } => ErrorCode::DesignNotFound,
                DomainError::DesignerNotFound { .. } => ErrorCode::DesignerNotFound,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
                ExternalError::Provider { .. } => ErrorCode::ProviderError,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::Invariant(_) => ErrorCode::InternalError,
        }
    }

    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance {
                    available,
                    requested,
                } => format!(
                    "Insufficient balance. Available: {}, requested: {}",
                    available, requested
                ),
                DomainError::AlreadyPaid { order_number } => {
                    format!("Order {} is already paid", order_number)
                }
                DomainError::PaymentDeclined { reason } => {
                    format!("Payment was declined: {}", reason)
                }
                DomainError::InvalidStateTransition {
                    entity,
                    current,
                    requested,
                } => format!(
                    "Cannot move {} from '{}' to '{}'",
                    entity, current, requested
                ),
                DomainError::OrderNotFound { order_id } => {
                    format!("Order '{}' not found", order_id)
                }
                DomainError::WithdrawalNotFound { withdrawal_id } => {
                    format!("Withdrawal '{}' not found", withdrawal_id)
                }
                DomainError::DesignNotFound { design_id } => {
                    format!("Design '{}' not found", design_id)
                }
                DomainError::DesignerNotFound { designer_id } => {
                    format!("Designer '{}' not found", designer_id)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderUnavailable { provider, .. } => format!(
                    "Payment provider ({}) is temporarily unavailable. Please try again",
                    provider
                ),
                ExternalError::Provider { .. } => {
                    "Payment processing failed. Please contact support".to_string()
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidCurrency { currency, reason } => {
                    format!("Invalid currency '{}': {}", currency, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid field '{}': {}", field, reason)
                }
                ValidationError::BelowMinimum { field, minimum } => {
                    format!("Field '{}' must be at least {}", field, minimum)
                }
                ValidationError::EmptyCart => "The cart contains no items".to_string(),
                ValidationError::PaymentMethodMismatch { expected, got } => format!(
                    "Payment details are for '{}' but the order uses '{}'",
                    got, expected
                ),
            },
            AppErrorKind::Invariant(_) => {
                "An internal accounting error occurred. Support has been notified".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProviderUnavailable { .. } => true,
                ExternalError::Provider { is_retryable, .. } => *is_retryable,
            },
            AppErrorKind::Validation(_) => false,
            AppErrorKind::Invariant(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            // Invariant detail is for logs, not for Display-to-client paths.
            AppErrorKind::Invariant(detail) => write!(f, "invariant violation: {:?}", detail),
            _ => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        let kind = match &err {
            MoneyError::NegativeAmount(value) => {
                AppErrorKind::Validation(ValidationError::InvalidAmount {
                    amount: value.clone(),
                    reason: "amount cannot be negative".to_string(),
                })
            }
            MoneyError::InvalidAmount { amount, reason } => {
                AppErrorKind::Validation(ValidationError::InvalidAmount {
                    amount: amount.clone(),
                    reason: reason.clone(),
                })
            }
            MoneyError::InvalidRate(rate) => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: "rate".to_string(),
                    reason: format!("'{}' is not a valid rate", rate),
                })
            }
            MoneyError::CurrencyMismatch { left, right } => {
                AppErrorKind::Validation(ValidationError::InvalidCurrency {
                    currency: right.to_string(),
                    reason: format!("expected {}", left),
                })
            }
            MoneyError::Overflow => AppErrorKind::Invariant(InvariantViolation::LedgerReconciliation {
                detail: "monetary overflow".to_string(),
            }),
        };
        AppError::new(kind)
    }
}

pub type AppResult<T> = Result<T, AppError>;
