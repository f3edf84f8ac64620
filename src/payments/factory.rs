use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::providers::{CardGatewayProvider, MobileMoneyProvider, PaypalProvider};
use crate::payments::types::PaymentMethod;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Registry mapping a payment method to its adapter.
///
/// Built once at startup; the orchestrator looks adapters up by the
/// order's payment method, so a disabled method is rejected before any
/// provider traffic.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        self.providers.insert(provider.method(), provider);
    }

    pub fn for_method(&self, method: PaymentMethod) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.providers
            .get(&method)
            .cloned()
            .ok_or(PaymentError::ValidationError {
                message: format!("payment method '{}' is not enabled", method),
                field: Some("payment_method".to_string()),
            })
    }

    pub fn enabled_methods(&self) -> Vec<PaymentMethod> {
        self.providers.keys().copied().collect()
    }

    /// Build the registry from `ENABLED_PAYMENT_METHODS` (comma separated;
    /// defaults to all three) using each provider's env configuration.
    pub fn from_env() -> PaymentResult<Self> {
        let enabled_raw = std::env::var("ENABLED_PAYMENT_METHODS")
            .unwrap_or_else(|_| "card,paypal,mobile_money".to_string());

        let mut registry = Self::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            match PaymentMethod::from_str(value)? {
                PaymentMethod::Card => {
                    registry.register(Arc::new(CardGatewayProvider::from_env()?))
                }
                PaymentMethod::Paypal => registry.register(Arc::new(PaypalProvider::from_env()?)),
                PaymentMethod::MobileMoney => {
                    registry.register(Arc::new(MobileMoneyProvider::from_env()?))
                }
            }
        }

        if registry.providers.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "at least one payment method must be enabled".to_string(),
                field: Some("ENABLED_PAYMENT_METHODS".to_string()),
            });
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{
        CaptureOutcome, ChargeRequest, PaymentDetails, PaymentFlow, PushInitiation, PushStatus,
    };
    use async_trait::async_trait;

    struct StubProvider(PaymentMethod);

    #[async_trait]
    impl PaymentProvider for StubProvider {
        fn method(&self) -> PaymentMethod {
            self.0
        }

        fn flow(&self) -> PaymentFlow {
            PaymentFlow::Synchronous
        }

        async fn authorize_and_capture(
            &self,
            _charge: &ChargeRequest,
            _details: &PaymentDetails,
        ) -> crate::payments::error::PaymentResult<CaptureOutcome> {
            Ok(CaptureOutcome {
                provider_transaction_id: "stub".to_string(),
            })
        }

        async fn initiate_push(
            &self,
            _charge: &ChargeRequest,
            _details: &PaymentDetails,
        ) -> crate::payments::error::PaymentResult<PushInitiation> {
            unreachable!()
        }

        async fn poll_status(
            &self,
            _provider_reference: &str,
        ) -> crate::payments::error::PaymentResult<PushStatus> {
            unreachable!()
        }
    }

    #[test]
    fn registry_resolves_registered_methods_only() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider(PaymentMethod::Card)));

        assert!(registry.for_method(PaymentMethod::Card).is_ok());
        assert!(registry.for_method(PaymentMethod::MobileMoney).is_err());
        assert_eq!(registry.enabled_methods(), vec![PaymentMethod::Card]);
    }

    #[test]
    fn payment_method_parsing_works() {
        assert!(matches!(
            PaymentMethod::from_str("mobile_money"),
            Ok(PaymentMethod::MobileMoney)
        ));
        assert!(PaymentMethod::from_str("cheque").is_err());
    }
}
