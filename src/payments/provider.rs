use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{
    CaptureOutcome, ChargeRequest, PaymentDetails, PaymentFlow, PaymentMethod, PushInitiation,
    PushStatus,
};
use async_trait::async_trait;

/// Capability interface every concrete payment provider implements.
///
/// Synchronous providers (card, PayPal) settle with one
/// `authorize_and_capture` call; push providers (mobile money) return a
/// reference from `initiate_push` that is observed with `poll_status`.
/// An adapter is a pure function of (charge, details) to a result: it
/// never touches the order or the ledger, which is what lets the
/// orchestrator be tested against a fake.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn method(&self) -> PaymentMethod;

    fn flow(&self) -> PaymentFlow;

    async fn authorize_and_capture(
        &self,
        charge: &ChargeRequest,
        details: &PaymentDetails,
    ) -> PaymentResult<CaptureOutcome>;

    async fn initiate_push(
        &self,
        charge: &ChargeRequest,
        details: &PaymentDetails,
    ) -> PaymentResult<PushInitiation>;

    async fn poll_status(&self, provider_reference: &str) -> PaymentResult<PushStatus>;
}

/// Shared rejection for calling an operation the provider's flow does not
/// support.
pub(crate) fn unsupported_operation(method: PaymentMethod, operation: &str) -> PaymentError {
    PaymentError::ValidationError {
        message: format!("{} provider does not support {}", method, operation),
        field: Some("payment_method".to_string()),
    }
}
