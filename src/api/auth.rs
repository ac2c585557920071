//! Registration and phone-verification handlers

use crate::api::ApiState;
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::phone::PhoneNumber;
use crate::services::registration::ProfileSubmission;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

fn tagged(err: impl Into<AppError>, headers: &HeaderMap) -> AppError {
    let err = err.into();
    match get_request_id_from_headers(headers) {
        Some(request_id) => err.with_request_id(request_id),
        None => err,
    }
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub async fn send_otp(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, AppError> {
    let phone = PhoneNumber::normalize(&payload.phone).map_err(|e| tagged(e, &headers))?;
    let issued = state
        .otp
        .send(&phone)
        .await
        .map_err(|e| tagged(e, &headers))?;

    Ok(Json(SendOtpResponse {
        success: true,
        message: format!(
            "Verification code sent. It expires in {} minute(s).",
            (issued.expires_in_secs / 60).max(1)
        ),
        code: issued.dev_code,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
}

/// Verifies the candidate code. When a registration flow is waiting on this
/// number, a successful verify also completes account creation.
pub async fn verify_otp(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, AppError> {
    let phone = PhoneNumber::normalize(&payload.phone).map_err(|e| tagged(e, &headers))?;

    if state.registration.has_active_flow(&phone) {
        state
            .registration
            .verify(&phone, &payload.code)
            .await
            .map_err(|e| tagged(e, &headers))?;
        return Ok(Json(VerifyOtpResponse {
            success: true,
            message: "Account created successfully!".to_string(),
        }));
    }

    state
        .otp
        .verify(&phone, &payload.code)
        .map_err(|e| tagged(e, &headers))?;
    Ok(Json(VerifyOtpResponse {
        success: true,
        message: "Phone number verified".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    #[serde(default = "default_terms")]
    pub terms_accepted: bool,
}

fn default_terms() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub async fn register(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let (phone, issued) = state
        .registration
        .submit_profile(ProfileSubmission {
            full_name: payload.full_name,
            email: payload.email,
            phone: payload.phone,
            password: payload.password,
            terms_accepted: payload.terms_accepted,
        })
        .await
        .map_err(|e| tagged(e, &headers))?;

    Ok(Json(RegisterResponse {
        success: true,
        message: format!("Verification code sent to {phone}"),
        phone: phone.to_string(),
        code: issued.dev_code,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBackRequest {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterBackResponse {
    pub success: bool,
    pub message: String,
}

/// Abandon a pending registration: the held draft and its OTP context are
/// discarded without resending anything.
pub async fn register_back(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterBackRequest>,
) -> Result<Json<RegisterBackResponse>, AppError> {
    let phone = PhoneNumber::normalize(&payload.phone).map_err(|e| tagged(e, &headers))?;
    state.registration.back(&phone);
    Ok(Json(RegisterBackResponse {
        success: true,
        message: "Registration reset".to_string(),
    }))
}
