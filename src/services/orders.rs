//! Order orchestration.
//!
//! Coordinates order creation, provider selection, payment confirmation
//! and the ledger credit as one logical unit. Provider network calls
//! always complete before the settlement transaction begins, so no store
//! lock is ever held across external I/O.

use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SettlementConfig;
use crate::database::store::{
    BillingAddress, Order, OrderItem, OrderStatus, PaymentStatus, RefundOutcome, SettleOutcome,
    SettlementStore,
};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::money::Money;
use crate::payments::factory::ProviderRegistry;
use crate::payments::types::{
    ChargeRequest, PaymentDetails, PaymentFlow, PaymentMethod, PushStatus,
};
use crate::services::catalog::Catalog;
use crate::services::ledger::credits_for_order;
use crate::services::notification::{DomainEvent, EventSink};

/// One line of the caller-owned cart. The cart is an explicit value
/// passed in by the API layer; the core holds no session state.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub design_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct NewOrderRequest {
    pub buyer_id: Uuid,
    pub items: Vec<CartLine>,
    pub billing_address: BillingAddress,
    pub payment_method: PaymentMethod,
    pub discount: Option<Money>,
}

/// Result of a payment attempt.
#[derive(Debug)]
pub enum PaymentOutcome {
    /// Synchronous capture succeeded; the order is settled.
    Paid { order: Order },
    /// Push initiated; poll `check_payment_status` with the reference.
    PushPending {
        order_id: Uuid,
        provider_reference: String,
    },
}

/// Result of polling an asynchronous payment.
#[derive(Debug)]
pub enum PaymentStatusView {
    Paid { order: Order },
    Pending,
    /// The push was declined or expired; the reference has been cleared
    /// and a new payment attempt may be made.
    PushFailed { reason: String },
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn SettlementStore>,
    catalog: Arc<dyn Catalog>,
    providers: Arc<ProviderRegistry>,
    events: Arc<dyn EventSink>,
    settlement: SettlementConfig,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        catalog: Arc<dyn Catalog>,
        providers: Arc<ProviderRegistry>,
        events: Arc<dyn EventSink>,
        settlement: SettlementConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            providers,
            events,
            settlement,
        }
    }

    /// Price the cart at current catalog prices and persist the order with
    /// all of its items atomically. Each item's commission split is
    /// computed here, once, from the designer's rate at this instant.
    pub async fn create_order(&self, request: NewOrderRequest) -> AppResult<Order> {
        if request.items.is_empty() {
            return Err(AppError::validation(ValidationError::EmptyCart));
        }

        let currency = self.settlement.currency;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        for line in &request.items {
            if line.quantity == 0 {
                return Err(AppError::validation(ValidationError::InvalidField {
                    field: "quantity".to_string(),
                    reason: "must be at least 1".to_string(),
                }));
            }
        }

        // Current catalog prices, fetched per line; no stale cached prices.
        let listings = futures::future::try_join_all(
            request
                .items
                .iter()
                .map(|line| self.catalog.design_listing(line.design_id)),
        )
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        let mut subtotal = Money::zero(currency);
        for (line, listing) in request.items.iter().zip(listings) {
            if listing.price.currency() != currency {
                return Err(AppError::validation(ValidationError::InvalidCurrency {
                    currency: listing.price.currency().to_string(),
                    reason: format!("orders are settled in {}", currency),
                }));
            }

            let line_total = listing.price.checked_mul(line.quantity)?;
            let designer_earnings =
                line_total.multiply_by_rate(listing.commission_rate_percent)?;
            let platform_fee = line_total.checked_sub(&designer_earnings)?;

            subtotal = subtotal.checked_add(&line_total)?;
            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id,
                design_id: listing.design_id,
                designer_id: listing.designer_id,
                title: listing.title,
                unit_price: listing.price,
                quantity: line.quantity,
                line_total,
                commission_rate_percent: listing.commission_rate_percent,
                designer_earnings,
                platform_fee,
            });
        }

        let tax = subtotal.multiply_by_rate(self.settlement.tax_rate_percent)?;
        let discount = request.discount.unwrap_or_else(|| Money::zero(currency));
        if discount.currency() != currency {
            return Err(AppError::validation(ValidationError::InvalidCurrency {
                currency: discount.currency().to_string(),
                reason: format!("discounts are denominated in {}", currency),
            }));
        }
        let total = subtotal.checked_add(&tax)?.checked_sub(&discount).map_err(|_| {
            AppError::validation(ValidationError::InvalidAmount {
                amount: discount.to_decimal_string(),
                reason: "discount exceeds order total".to_string(),
            })
        })?;

        let year = now.year();
        let sequence = self.store.next_sequence("order", year).await?;
        let order_number = format!("ORD-{}-{:06}", year, sequence);

        let order = Order {
            id: order_id,
            order_number,
            buyer_id: request.buyer_id,
            items,
            subtotal,
            tax,
            discount,
            total,
            billing_address: request.billing_address,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: request.payment_method,
            provider_transaction_id: None,
            provider_reference: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_order(&order).await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            buyer_id = %order.buyer_id,
            total = %order.total,
            items = order.items.len(),
            "order created"
        );

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        self.store.find_order(order_id).await?.ok_or_else(|| {
            AppError::domain(DomainError::OrderNotFound {
                order_id: order_id.to_string(),
            })
        })
    }

    /// Run a payment attempt against the order's provider.
    ///
    /// Re-submission on an already-paid order is a conflict, not a no-op:
    /// the caller is told apart from a decline. A decline leaves the order
    /// pending and retryable with different details.
    pub async fn process_payment(
        &self,
        order_id: Uuid,
        details: PaymentDetails,
    ) -> AppResult<PaymentOutcome> {
        let order = self.get_order(order_id).await?;

        match order.payment_status {
            PaymentStatus::Pending => {}
            PaymentStatus::Paid => {
                return Err(AppError::domain(DomainError::AlreadyPaid {
                    order_number: order.order_number,
                }))
            }
            current => {
                return Err(AppError::domain(DomainError::InvalidStateTransition {
                    entity: "order payment",
                    current: current.to_string(),
                    requested: PaymentStatus::Paid.to_string(),
                }))
            }
        }

        if details.method() != order.payment_method {
            return Err(AppError::validation(ValidationError::PaymentMethodMismatch {
                expected: order.payment_method.to_string(),
                got: details.method().to_string(),
            }));
        }
        details.validate()?;

        let provider = self.providers.for_method(order.payment_method)?;
        let charge = ChargeRequest {
            order_id: order.id,
            order_number: order.order_number.clone(),
            buyer_id: order.buyer_id,
            amount: order.total,
        };

        match provider.flow() {
            PaymentFlow::Synchronous => {
                let capture = provider.authorize_and_capture(&charge, &details).await?;
                self.settle(&order, &capture.provider_transaction_id)
                    .await
                    .map(|order| PaymentOutcome::Paid { order })
            }
            PaymentFlow::AsynchronousPush => {
                let push = provider.initiate_push(&charge, &details).await?;
                self.store
                    .record_push_reference(order.id, &push.provider_reference)
                    .await?;
                info!(
                    order_id = %order.id,
                    provider_reference = %push.provider_reference,
                    "push payment initiated, awaiting confirmation"
                );
                Ok(PaymentOutcome::PushPending {
                    order_id: order.id,
                    provider_reference: push.provider_reference,
                })
            }
        }
    }

    /// Poll an asynchronous payment. Safe to call repeatedly: the ledger
    /// credit fires only on the pending→paid edge, so polls after the
    /// first observed success just report the settled order.
    pub async fn check_payment_status(&self, order_id: Uuid) -> AppResult<PaymentStatusView> {
        let order = self.get_order(order_id).await?;

        match order.payment_status {
            PaymentStatus::Paid => return Ok(PaymentStatusView::Paid { order }),
            PaymentStatus::Pending => {}
            current => {
                return Err(AppError::domain(DomainError::InvalidStateTransition {
                    entity: "order payment",
                    current: current.to_string(),
                    requested: PaymentStatus::Paid.to_string(),
                }))
            }
        }

        let Some(reference) = order.provider_reference.clone() else {
            return Err(AppError::validation(ValidationError::InvalidField {
                field: "provider_reference".to_string(),
                reason: "no push payment is in progress for this order".to_string(),
            }));
        };

        let provider = self.providers.for_method(order.payment_method)?;
        match provider.poll_status(&reference).await? {
            PushStatus::Pending => Ok(PaymentStatusView::Pending),
            PushStatus::Failed { reason } => {
                warn!(
                    order_id = %order.id,
                    provider_reference = %reference,
                    reason = %reason,
                    "push payment failed, clearing reference"
                );
                self.store.clear_push_reference(order.id).await?;
                Ok(PaymentStatusView::PushFailed { reason })
            }
            PushStatus::Succeeded {
                provider_transaction_id,
            } => match self.settle(&order, &provider_transaction_id).await {
                Ok(order) => Ok(PaymentStatusView::Paid { order }),
                // Lost the race against a concurrent poll: the order is
                // paid and credited exactly once, report it as such.
                Err(err)
                    if matches!(
                        &err.kind,
                        crate::error::AppErrorKind::Domain(DomainError::AlreadyPaid { .. })
                    ) =>
                {
                    let order = self.get_order(order_id).await?;
                    Ok(PaymentStatusView::Paid { order })
                }
                Err(err) => Err(err),
            },
        }
    }

    /// Full refund: paid→refunded, reversing every item's ledger credit.
    pub async fn refund_order(&self, order_id: Uuid) -> AppResult<Order> {
        let order = self.get_order(order_id).await?;
        let reversals = credits_for_order(&order);

        match self.store.refund_order(order.id, &reversals).await? {
            RefundOutcome::Refunded(order) => {
                self.events.publish(DomainEvent::OrderRefunded {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                });
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    "order refunded"
                );
                Ok(order)
            }
            RefundOutcome::InvalidState { current } => {
                Err(AppError::domain(DomainError::InvalidStateTransition {
                    entity: "order payment",
                    current: current.to_string(),
                    requested: PaymentStatus::Refunded.to_string(),
                }))
            }
            RefundOutcome::NotFound => Err(AppError::domain(DomainError::OrderNotFound {
                order_id: order_id.to_string(),
            })),
        }
    }

    /// The single pending→paid edge shared by both payment flows.
    async fn settle(&self, order: &Order, provider_transaction_id: &str) -> AppResult<Order> {
        let credits = credits_for_order(order);
        match self
            .store
            .settle_order(order.id, provider_transaction_id, &credits, Utc::now())
            .await?
        {
            SettleOutcome::Settled(order) => {
                self.events.publish(DomainEvent::OrderPaid {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    buyer_id: order.buyer_id,
                    total: order.total,
                    provider_transaction_id: provider_transaction_id.to_string(),
                });
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    provider_transaction_id = %provider_transaction_id,
                    "order settled"
                );
                Ok(order)
            }
            SettleOutcome::AlreadyPaid => Err(AppError::domain(DomainError::AlreadyPaid {
                order_number: order.order_number.clone(),
            })),
            SettleOutcome::NotFound => Err(AppError::domain(DomainError::OrderNotFound {
                order_id: order.id.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryStore;
    use crate::database::store::DesignerLedger;
    use crate::money::Currency;
    use crate::payments::error::{PaymentError, PaymentResult};
    use crate::payments::provider::PaymentProvider;
    use crate::payments::types::{CaptureOutcome, PushInitiation};
    use crate::services::catalog::{DesignListing, InMemoryCatalog};
    use crate::services::notification::RecordingSink;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

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

    fn billing_address() -> BillingAddress {
        BillingAddress {
            name: "Test Buyer".to_string(),
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            region: Some("IL".to_string()),
            postal_code: "62704".to_string(),
            country: "US".to_string(),
        }
    }

    /// Synchronous provider: approves unless told to decline, with an
    /// optional delay to widen race windows.
    struct TestCardProvider {
        decline: AtomicBool,
        delay: Duration,
    }

    impl TestCardProvider {
        fn approving() -> Self {
            Self {
                decline: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                decline: AtomicBool::new(false),
                delay,
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for TestCardProvider {
        fn method(&self) -> PaymentMethod {
            PaymentMethod::Card
        }

        fn flow(&self) -> PaymentFlow {
            PaymentFlow::Synchronous
        }

        async fn authorize_and_capture(
            &self,
            charge: &ChargeRequest,
            _details: &PaymentDetails,
        ) -> PaymentResult<CaptureOutcome> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.decline.load(Ordering::SeqCst) {
                return Err(PaymentError::Declined {
                    message: "insufficient funds".to_string(),
                    provider_code: Some("51".to_string()),
                });
            }
            Ok(CaptureOutcome {
                provider_transaction_id: format!("card_{}", charge.order_number),
            })
        }

        async fn initiate_push(
            &self,
            _charge: &ChargeRequest,
            _details: &PaymentDetails,
        ) -> PaymentResult<PushInitiation> {
            unreachable!("synchronous provider")
        }

        async fn poll_status(&self, _provider_reference: &str) -> PaymentResult<PushStatus> {
            unreachable!("synchronous provider")
        }
    }

    /// Push provider whose observed status is set by the test.
    struct TestPushProvider {
        status: Mutex<PushStatus>,
    }

    impl TestPushProvider {
        fn pending() -> Self {
            Self {
                status: Mutex::new(PushStatus::Pending),
            }
        }

        fn set_status(&self, status: PushStatus) {
            *self.status.lock().unwrap() = status;
        }
    }

    #[async_trait]
    impl PaymentProvider for TestPushProvider {
        fn method(&self) -> PaymentMethod {
            PaymentMethod::MobileMoney
        }

        fn flow(&self) -> PaymentFlow {
            PaymentFlow::AsynchronousPush
        }

        async fn authorize_and_capture(
            &self,
            _charge: &ChargeRequest,
            _details: &PaymentDetails,
        ) -> PaymentResult<CaptureOutcome> {
            unreachable!("push provider")
        }

        async fn initiate_push(
            &self,
            charge: &ChargeRequest,
            _details: &PaymentDetails,
        ) -> PaymentResult<PushInitiation> {
            Ok(PushInitiation {
                provider_reference: format!("push_{}", charge.order_number),
            })
        }

        async fn poll_status(&self, _provider_reference: &str) -> PaymentResult<PushStatus> {
            Ok(self.status.lock().unwrap().clone())
        }
    }

    struct Harness {
        service: OrderService,
        store: Arc<InMemoryStore>,
        sink: Arc<RecordingSink>,
        designer_id: Uuid,
        design_id: Uuid,
    }

    async fn harness(provider: Arc<dyn PaymentProvider>) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let sink = Arc::new(RecordingSink::default());

        let designer_id = Uuid::new_v4();
        store
            .upsert_ledger(DesignerLedger::new(designer_id, Currency::Usd))
            .await;

        let design_id = Uuid::new_v4();
        catalog.insert(DesignListing {
            design_id,
            designer_id,
            title: "Modern Farmhouse 3BR".to_string(),
            price: usd("100.00"),
            commission_rate_percent: Decimal::from(70),
        });

        let mut registry = ProviderRegistry::new();
        registry.register(provider);

        let service = OrderService::new(
            store.clone(),
            catalog.clone(),
            Arc::new(registry),
            sink.clone(),
            settlement_config(),
        );

        Harness {
            service,
            store,
            sink,
            designer_id,
            design_id,
        }
    }

    fn card_details() -> PaymentDetails {
        PaymentDetails::Card {
            card_number: "4242424242424242".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            cvv: "123".to_string(),
            cardholder_name: "Test Buyer".to_string(),
        }
    }

    fn mobile_money_details() -> PaymentDetails {
        PaymentDetails::MobileMoney {
            phone_number: "+254712345678".to_string(),
        }
    }

    async fn create_card_order(h: &Harness) -> Order {
        h.service
            .create_order(NewOrderRequest {
                buyer_id: Uuid::new_v4(),
                items: vec![CartLine {
                    design_id: h.design_id,
                    quantity: 1,
                }],
                billing_address: billing_address(),
                payment_method: PaymentMethod::Card,
                discount: None,
            })
            .await
            .expect("order creation should succeed")
    }

    #[tokio::test]
    async fn order_totals_follow_the_pricing_rules() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;

        assert_eq!(order.subtotal, usd("100.00"));
        assert_eq!(order.tax, usd("8.00"));
        assert_eq!(order.discount, usd("0.00"));
        assert_eq!(order.total, usd("108.00"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.order_number.starts_with("ORD-"));

        let item = &order.items[0];
        assert_eq!(item.designer_earnings, usd("70.00"));
        assert_eq!(item.platform_fee, usd("30.00"));
        // total == subtotal + tax - discount, exactly, in minor units
        assert_eq!(
            order.total.minor(),
            order.subtotal.minor() + order.tax.minor() - order.discount.minor()
        );
    }

    #[tokio::test]
    async fn order_numbers_are_monotonic_within_a_year() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let first = create_card_order(&h).await;
        let second = create_card_order(&h).await;
        assert!(second.order_number > first.order_number);
    }

    #[tokio::test]
    async fn empty_cart_and_zero_quantity_are_rejected() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;

        let empty = h
            .service
            .create_order(NewOrderRequest {
                buyer_id: Uuid::new_v4(),
                items: vec![],
                billing_address: billing_address(),
                payment_method: PaymentMethod::Card,
                discount: None,
            })
            .await;
        assert_eq!(empty.unwrap_err().status_code(), 400);

        let zero_qty = h
            .service
            .create_order(NewOrderRequest {
                buyer_id: Uuid::new_v4(),
                items: vec![CartLine {
                    design_id: h.design_id,
                    quantity: 0,
                }],
                billing_address: billing_address(),
                payment_method: PaymentMethod::Card,
                discount: None,
            })
            .await;
        assert_eq!(zero_qty.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn successful_payment_settles_order_and_credits_designer() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;

        let outcome = h
            .service
            .process_payment(order.id, card_details())
            .await
            .expect("payment should succeed");

        let PaymentOutcome::Paid { order: paid } = outcome else {
            panic!("expected synchronous settlement");
        };
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, OrderStatus::Completed);
        assert!(paid.paid_at.is_some());
        assert_eq!(
            paid.provider_transaction_id.as_deref(),
            Some(format!("card_{}", paid.order_number).as_str())
        );

        // designer gets 70.00; platform retains 38.00 (30.00 cut + 8.00 tax)
        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("70.00"));
        assert_eq!(ledger.total_earnings, usd("70.00"));
        assert_eq!(ledger.total_sales, 1);

        let events = h.sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DomainEvent::OrderPaid { .. }));
    }

    #[tokio::test]
    async fn second_payment_attempt_is_a_conflict_and_credits_once() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;

        h.service
            .process_payment(order.id, card_details())
            .await
            .expect("first payment should succeed");

        let second = h.service.process_payment(order.id, card_details()).await;
        let err = second.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("70.00"));
        assert_eq!(ledger.total_sales, 1);
    }

    #[tokio::test]
    async fn decline_leaves_order_pending_and_retryable() {
        let provider = Arc::new(TestCardProvider::approving());
        let h = harness(provider.clone()).await;
        let order = create_card_order(&h).await;

        provider.decline.store(true, Ordering::SeqCst);
        let declined = h.service.process_payment(order.id, card_details()).await;
        assert_eq!(declined.unwrap_err().status_code(), 402);

        let after = h.service.get_order(order.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Pending);
        assert_eq!(after.order_number, order.order_number);
        assert_eq!(after.total, order.total);

        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("0.00"));

        // retry with the provider approving again
        provider.decline.store(false, Ordering::SeqCst);
        let retried = h
            .service
            .process_payment(order.id, card_details())
            .await
            .expect("retry should succeed");
        assert!(matches!(retried, PaymentOutcome::Paid { .. }));
    }

    #[tokio::test]
    async fn mismatched_details_are_rejected_before_the_provider() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;

        let err = h
            .service
            .process_payment(order.id, mobile_money_details())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let after = h.service.get_order(order.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_payments_settle_exactly_once() {
        let provider = Arc::new(TestCardProvider::with_delay(Duration::from_millis(20)));
        let h = harness(provider).await;
        let order = create_card_order(&h).await;

        let s1 = h.service.clone();
        let s2 = h.service.clone();
        let id = order.id;
        let a = tokio::spawn(async move { s1.process_payment(id, card_details()).await });
        let b = tokio::spawn(async move { s2.process_payment(id, card_details()).await });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.status_code() == 409))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);

        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("70.00"));
        assert_eq!(ledger.total_sales, 1);

        let events = h.sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn push_flow_credits_exactly_once_across_polls() {
        let provider = Arc::new(TestPushProvider::pending());
        let h = harness(provider.clone()).await;

        let order = h
            .service
            .create_order(NewOrderRequest {
                buyer_id: Uuid::new_v4(),
                items: vec![CartLine {
                    design_id: h.design_id,
                    quantity: 1,
                }],
                billing_address: billing_address(),
                payment_method: PaymentMethod::MobileMoney,
                discount: None,
            })
            .await
            .unwrap();

        let outcome = h
            .service
            .process_payment(order.id, mobile_money_details())
            .await
            .expect("push initiation should succeed");
        let PaymentOutcome::PushPending {
            provider_reference, ..
        } = outcome
        else {
            panic!("expected push pending");
        };
        assert_eq!(provider_reference, format!("push_{}", order.order_number));

        // before confirmation: pending, no ledger movement
        let view = h.service.check_payment_status(order.id).await.unwrap();
        assert!(matches!(view, PaymentStatusView::Pending));
        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("0.00"));

        // provider confirms; first poll settles
        provider.set_status(PushStatus::Succeeded {
            provider_transaction_id: "MM12345".to_string(),
        });
        let view = h.service.check_payment_status(order.id).await.unwrap();
        assert!(matches!(view, PaymentStatusView::Paid { .. }));

        // three more polls change nothing
        for _ in 0..3 {
            let view = h.service.check_payment_status(order.id).await.unwrap();
            assert!(matches!(view, PaymentStatusView::Paid { .. }));
        }

        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("70.00"));
        assert_eq!(ledger.total_sales, 1);

        let events = h.sink.events.lock().unwrap();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, DomainEvent::OrderPaid { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failed_push_clears_reference_and_stays_retryable() {
        let provider = Arc::new(TestPushProvider::pending());
        let h = harness(provider.clone()).await;

        let order = h
            .service
            .create_order(NewOrderRequest {
                buyer_id: Uuid::new_v4(),
                items: vec![CartLine {
                    design_id: h.design_id,
                    quantity: 1,
                }],
                billing_address: billing_address(),
                payment_method: PaymentMethod::MobileMoney,
                discount: None,
            })
            .await
            .unwrap();

        h.service
            .process_payment(order.id, mobile_money_details())
            .await
            .unwrap();

        provider.set_status(PushStatus::Failed {
            reason: "request timed out on handset".to_string(),
        });
        let view = h.service.check_payment_status(order.id).await.unwrap();
        assert!(matches!(view, PaymentStatusView::PushFailed { .. }));

        let after = h.service.get_order(order.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Pending);
        assert!(after.provider_reference.is_none());

        // a fresh push can be initiated
        provider.set_status(PushStatus::Pending);
        let retried = h
            .service
            .process_payment(order.id, mobile_money_details())
            .await
            .unwrap();
        assert!(matches!(retried, PaymentOutcome::PushPending { .. }));
    }

    #[tokio::test]
    async fn polling_without_a_push_in_progress_is_a_client_error() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;

        let err = h.service.check_payment_status(order.id).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn refund_reverses_balance_but_not_lifetime_counters() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;
        h.service
            .process_payment(order.id, card_details())
            .await
            .unwrap();

        let refunded = h.service.refund_order(order.id).await.unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
        assert_eq!(refunded.status, OrderStatus::Refunded);

        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("0.00"));
        assert_eq!(ledger.total_earnings, usd("70.00"));
        assert_eq!(ledger.total_sales, 1);

        // refunding again is a state conflict
        let again = h.service.refund_order(order.id).await;
        assert_eq!(again.unwrap_err().status_code(), 409);
    }

    #[tokio::test]
    async fn refund_of_an_unpaid_order_is_rejected() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;

        let err = h.service.refund_order(order.id).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn balance_reconciles_paid_earnings_minus_active_withdrawals() {
        use crate::database::store::PayoutDetails;
        use crate::services::withdrawals::WithdrawalService;

        let h = harness(Arc::new(TestCardProvider::approving())).await;

        // two paid orders, 70.00 earnings each
        for _ in 0..2 {
            let order = create_card_order(&h).await;
            h.service
                .process_payment(order.id, card_details())
                .await
                .unwrap();
        }

        let withdrawals = WithdrawalService::new(
            h.store.clone(),
            Arc::new(RecordingSink::default()),
            settlement_config(),
        );
        let payout = PayoutDetails::Paypal {
            email: "designer@example.com".to_string(),
        };
        let withdrawal = withdrawals
            .request_withdrawal(h.designer_id, usd("50.00"), payout)
            .await
            .unwrap();
        withdrawals.approve(withdrawal.id).await.unwrap();

        // balance == paid item earnings (140.00) - processing/completed
        // withdrawals (50.00)
        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("90.00"));
        assert_eq!(ledger.total_earnings, usd("140.00"));
        assert_eq!(ledger.total_sales, 2);

        // completion keeps the withdrawal in the subtracted set
        withdrawals.complete(withdrawal.id, "PP-77").await.unwrap();
        let ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        assert_eq!(ledger.balance, usd("90.00"));
    }

    #[tokio::test]
    async fn refund_after_funds_left_is_an_invariant_violation() {
        let h = harness(Arc::new(TestCardProvider::approving())).await;
        let order = create_card_order(&h).await;
        h.service
            .process_payment(order.id, card_details())
            .await
            .unwrap();

        // Drain the balance the way a withdrawal approval would.
        let mut ledger = h.store.find_ledger(h.designer_id).await.unwrap().unwrap();
        ledger.debit(usd("60.00")).unwrap();
        h.store.upsert_ledger(ledger).await;

        let err = h.service.refund_order(order.id).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(matches!(
            err.kind,
            crate::error::AppErrorKind::Invariant(_)
        ));
    }
}
