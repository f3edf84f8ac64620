//! Order endpoints: creation, payment, payment-status polling, refund.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::database::store::{BillingAddress, Order};
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::money::Money;
use crate::payments::types::{PaymentDetails, PaymentMethod};
use crate::services::orders::{CartLine, NewOrderRequest, PaymentOutcome, PaymentStatusView};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub buyer_id: Uuid,
    pub items: Vec<CartLineDto>,
    pub billing_address: BillingAddress,
    pub payment_method: PaymentMethod,
    pub discount: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct CartLineDto {
    pub design_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    pub payment_details: PaymentDetails,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcomeResponse {
    Paid {
        order: Order,
    },
    Pending {
        order_id: Uuid,
        provider_reference: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentStatusResponse {
    Paid { order: Order },
    Pending,
    Failed { reason: String },
}

fn tag_request(err: AppError, request_id: Option<String>) -> AppError {
    match request_id {
        Some(id) => err.with_request_id(id),
        None => err,
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    let request = NewOrderRequest {
        buyer_id: payload.buyer_id,
        items: payload
            .items
            .into_iter()
            .map(|line| CartLine {
                design_id: line.design_id,
                quantity: line.quantity,
            })
            .collect(),
        billing_address: payload.billing_address,
        payment_method: payload.payment_method,
        discount: payload.discount,
    };

    state
        .orders
        .create_order(request)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Order>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .orders
        .get_order(order_id)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn process_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ProcessPaymentRequest>,
) -> Result<Json<PaymentOutcomeResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    let outcome = state
        .orders
        .process_payment(order_id, payload.payment_details)
        .await
        .map_err(|e| tag_request(e, request_id))?;

    Ok(Json(match outcome {
        PaymentOutcome::Paid { order } => PaymentOutcomeResponse::Paid { order },
        PaymentOutcome::PushPending {
            order_id,
            provider_reference,
        } => PaymentOutcomeResponse::Pending {
            order_id,
            provider_reference,
        },
    }))
}

pub async fn check_payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    let view = state
        .orders
        .check_payment_status(order_id)
        .await
        .map_err(|e| tag_request(e, request_id))?;

    Ok(Json(match view {
        PaymentStatusView::Paid { order } => PaymentStatusResponse::Paid { order },
        PaymentStatusView::Pending => PaymentStatusResponse::Pending,
        PaymentStatusView::PushFailed { reason } => PaymentStatusResponse::Failed { reason },
    }))
}

pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Order>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .orders
        .refund_order(order_id)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}
