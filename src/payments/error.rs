use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    /// The provider looked at the payment and said no. Not retryable with
    /// the same details; the order is left untouched for another attempt.
    #[error("Payment declined: {message}")]
    Declined {
        message: String,
        provider_code: Option<String>,
    },

    /// Transient network or provider outage. The caller may retry the
    /// identical request.
    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("Provider error: provider={provider}, message={message}")]
    Provider {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::Declined { .. } => false,
            PaymentError::Unavailable { .. } => true,
            PaymentError::RateLimited { .. } => true,
            PaymentError::Provider { retryable, .. } => *retryable,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, DomainError, ExternalError, ValidationError};

        let kind = match err {
            PaymentError::ValidationError { message, field } => match field {
                Some(field) => AppErrorKind::Validation(ValidationError::InvalidField {
                    field,
                    reason: message,
                }),
                None => AppErrorKind::Validation(ValidationError::InvalidField {
                    field: "payment_details".to_string(),
                    reason: message,
                }),
            },
            PaymentError::Declined { message, .. } => {
                AppErrorKind::Domain(DomainError::PaymentDeclined { reason: message })
            }
            PaymentError::Unavailable { message } => {
                AppErrorKind::External(ExternalError::ProviderUnavailable {
                    provider: "payments".to_string(),
                    message,
                })
            }
            PaymentError::RateLimited { .. } => {
                AppErrorKind::External(ExternalError::ProviderUnavailable {
                    provider: "payments".to_string(),
                    message: "provider rate limit exceeded".to_string(),
                })
            }
            PaymentError::Provider {
                provider,
                message,
                retryable,
                ..
            } => AppErrorKind::External(ExternalError::Provider {
                provider,
                message,
                is_retryable: retryable,
            }),
        };
        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::Unavailable {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::Declined {
            message: "insufficient funds".to_string(),
            provider_code: None
        }
        .is_retryable());
        assert!(!PaymentError::ValidationError {
            message: "bad".to_string(),
            field: None
        }
        .is_retryable());
    }

    #[test]
    fn decline_maps_to_domain_error() {
        let app: crate::error::AppError = PaymentError::Declined {
            message: "card expired".to_string(),
            provider_code: Some("51".to_string()),
        }
        .into();
        assert_eq!(app.status_code(), 402);
    }

    #[test]
    fn outage_maps_to_retryable_external_error() {
        let app: crate::error::AppError = PaymentError::Unavailable {
            message: "connect timeout".to_string(),
        }
        .into();
        assert_eq!(app.status_code(), 503);
        assert!(app.is_retryable());
    }
}
