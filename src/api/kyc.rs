//! KYC submission, status and reminder handlers
//!
//! Document capture and the optical checks happen in an external system;
//! this surface only records submission and serves the policy state.

use crate::api::ApiState;
use crate::error::AppError;
use crate::kyc::KycStatus;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmitRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct KycSubmitResponse {
    pub success: bool,
    pub status: KycStatus,
}

pub async fn submit(
    State(state): State<ApiState>,
    Json(payload): Json<KycSubmitRequest>,
) -> Result<Json<KycSubmitResponse>, AppError> {
    if payload.user_id.trim().is_empty() {
        return Err(AppError::validation("userId is required"));
    }
    let status = state.kyc.mark_submitted(payload.user_id.trim());
    Ok(Json(KycSubmitResponse {
        success: true,
        status,
    }))
}

#[derive(Debug, Serialize)]
pub struct KycStatusResponse {
    pub status: KycStatus,
    pub blocked: bool,
}

pub async fn status(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<KycStatusResponse>, AppError> {
    let status = state.kyc.status_of(&user_id);
    let blocked = state.kyc.is_blocked(&user_id);
    Ok(Json(KycStatusResponse { status, blocked }))
}

#[derive(Debug, Serialize)]
pub struct KycRemindResponse {
    pub reminded: bool,
    pub status: KycStatus,
}

pub async fn remind(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<KycRemindResponse>, AppError> {
    let reminded = state.kyc.remind_if_needed(&user_id, Utc::now());
    Ok(Json(KycRemindResponse {
        reminded,
        status: state.kyc.status_of(&user_id),
    }))
}
