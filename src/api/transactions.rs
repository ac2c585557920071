//! Mobile-money deposit, withdrawal, status and callback handlers

use crate::api::{AmountField, ApiState};
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::{ProviderName, TransactionStatus};
use crate::phone::PhoneNumber;
use crate::services::transaction_form::TransactionSubmission;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

fn tagged(err: impl Into<AppError>, headers: &HeaderMap) -> AppError {
    let err = err.into();
    match get_request_id_from_headers(headers) {
        Some(request_id) => err.with_request_id(request_id),
        None => err,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileMoneyRequest {
    pub amount: AmountField,
    pub phone_number: String,
    pub provider: ProviderName,
    /// Account performing the transaction; defaults to the normalized
    /// phone number when the auth layer does not forward an id.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MobileMoneyResponse {
    pub success: bool,
    pub reference: String,
    pub status: TransactionStatus,
    pub message: String,
}

impl MobileMoneyRequest {
    fn into_submission(self) -> Result<TransactionSubmission, AppError> {
        let user_id = match &self.user_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => PhoneNumber::normalize(&self.phone_number)?.to_string(),
        };
        Ok(TransactionSubmission {
            user_id,
            amount: self.amount.into_string(),
            phone_number: self.phone_number,
            provider: self.provider,
        })
    }
}

pub async fn deposit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<MobileMoneyRequest>,
) -> Result<Json<MobileMoneyResponse>, AppError> {
    let submission = payload.into_submission().map_err(|e| tagged(e, &headers))?;
    let outcome = state
        .transactions
        .submit_deposit(submission)
        .await
        .map_err(|e| tagged(e, &headers))?;

    Ok(Json(MobileMoneyResponse {
        success: true,
        reference: outcome.reference,
        status: outcome.status,
        message: outcome
            .message
            .unwrap_or_else(|| "Please check your phone for the payment prompt".to_string()),
    }))
}

pub async fn withdraw(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<MobileMoneyRequest>,
) -> Result<Json<MobileMoneyResponse>, AppError> {
    let submission = payload.into_submission().map_err(|e| tagged(e, &headers))?;
    let outcome = state
        .transactions
        .submit_withdrawal(submission)
        .await
        .map_err(|e| tagged(e, &headers))?;

    Ok(Json(MobileMoneyResponse {
        success: true,
        reference: outcome.reference,
        status: outcome.status,
        message: outcome
            .message
            .unwrap_or_else(|| "Withdrawal request initiated".to_string()),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusApiResponse {
    pub status: TransactionStatus,
    pub message: String,
}

pub async fn status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Json<StatusApiResponse>, AppError> {
    let outcome = state
        .gateway
        .poll_status(&reference)
        .await
        .map_err(|e| tagged(e, &headers))?;

    Ok(Json(StatusApiResponse {
        status: outcome.status,
        message: outcome.message,
    }))
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
}

/// Provider status push. The signature is verified against the provider's
/// callback secret before any state is touched.
pub async fn provider_callback(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<Json<CallbackResponse>, AppError> {
    let provider = ProviderName::from_str(&provider).map_err(|e| tagged(e, &headers))?;
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    state
        .gateway
        .handle_callback(provider, &body, signature)
        .await
        .map_err(|e| tagged(e, &headers))?;

    Ok(Json(CallbackResponse { success: true }))
}
