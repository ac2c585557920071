//! HTTP surface
//!
//! Routes are grouped per concern and merged under `/api/v1` by `main`.

pub mod auth;
pub mod kyc;
pub mod rates;
pub mod transactions;

use crate::kyc::KycService;
use crate::otp::OtpService;
use crate::payments::gateway::MobileMoneyGateway;
use crate::services::exchange_rate::ExchangeRateService;
use crate::services::registration::RegistrationService;
use crate::services::transaction_form::TransactionFormService;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub registration: Arc<RegistrationService>,
    pub otp: Arc<OtpService>,
    pub transactions: Arc<TransactionFormService>,
    pub gateway: Arc<MobileMoneyGateway>,
    pub kyc: Arc<KycService>,
    pub rates: Arc<ExchangeRateService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/users/register", post(auth::register))
        .route("/users/register/back", post(auth::register_back))
        .route("/deposit/mobile-money", post(transactions::deposit))
        .route("/withdraw/mobile-money", post(transactions::withdraw))
        .route(
            "/mobile-money/status/{reference}",
            get(transactions::status),
        )
        .route(
            "/mobile-money/callbacks/{provider}",
            post(transactions::provider_callback),
        )
        .route("/kyc/submit", post(kyc::submit))
        .route("/kyc/status/{user_id}", get(kyc::status))
        .route("/kyc/reminders/{user_id}", post(kyc::remind))
        .route("/rates", get(rates::get_rates))
        .with_state(state)
}

/// Amounts arrive as JSON numbers from the web client and as strings from
/// integration partners; both normalize to the string form the payment
/// types validate.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(serde_json::Number),
    Text(String),
}

impl AmountField {
    pub fn into_string(self) -> String {
        match self {
            AmountField::Number(n) => n.to_string(),
            AmountField::Text(s) => s,
        }
    }
}
