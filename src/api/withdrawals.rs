//! Withdrawal endpoints and the designer ledger read.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::database::store::{DesignerLedger, PayoutDetails, Withdrawal};
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::money::Money;

#[derive(Debug, Deserialize)]
pub struct RequestWithdrawalRequest {
    pub designer_id: Uuid,
    pub amount: Money,
    pub payout: PayoutDetails,
}

#[derive(Debug, Deserialize)]
pub struct CompleteWithdrawalRequest {
    pub external_transaction_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalReasonRequest {
    pub reason: String,
}

fn tag_request(err: AppError, request_id: Option<String>) -> AppError {
    match request_id {
        Some(id) => err.with_request_id(id),
        None => err,
    }
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RequestWithdrawalRequest>,
) -> Result<Json<Withdrawal>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .withdrawals
        .request_withdrawal(payload.designer_id, payload.amount, payload.payout)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Withdrawal>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .withdrawals
        .get_withdrawal(withdrawal_id)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Withdrawal>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .withdrawals
        .approve(withdrawal_id)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn complete_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CompleteWithdrawalRequest>,
) -> Result<Json<Withdrawal>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .withdrawals
        .complete(withdrawal_id, &payload.external_transaction_id)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<WithdrawalReasonRequest>,
) -> Result<Json<Withdrawal>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .withdrawals
        .cancel(withdrawal_id, &payload.reason)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn fail_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<WithdrawalReasonRequest>,
) -> Result<Json<Withdrawal>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .withdrawals
        .fail(withdrawal_id, &payload.reason)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}

pub async fn get_designer_ledger(
    State(state): State<AppState>,
    Path(designer_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DesignerLedger>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    state
        .ledger
        .ledger(designer_id)
        .await
        .map(Json)
        .map_err(|e| tag_request(e, request_id))
}
