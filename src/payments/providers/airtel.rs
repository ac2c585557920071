//! Airtel Money adapter
//!
//! Collections use the merchant payments API, withdrawals the standard
//! disbursements API. Airtel wraps every response in a `{data, status}`
//! envelope and reports transaction state with short codes (`TS`, `TF`,
//! `TIP`), which are mapped here to the shared status vocabulary.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::MobileMoneyProvider;
use crate::payments::types::{
    CallbackEvent, CollectionRequest, Direction, DisbursementRequest, InitiationResponse,
    ProviderName, StatusResponse, TransactionStatus,
};
use crate::payments::utils::{verify_hmac_sha256_hex, Auth, PaymentHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct AirtelConfig {
    pub auth_token: String,
    pub api_key: String,
    pub signature: String,
    pub base_url: String,
    pub country: String,
    pub currency: String,
    pub callback_secret: Option<String>,
    pub initiate_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AirtelConfig {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            api_key: String::new(),
            signature: String::new(),
            base_url: "https://openapiuat.airtel.africa".to_string(),
            country: "UG".to_string(),
            currency: "UGX".to_string(),
            callback_secret: None,
            initiate_timeout_secs: 15,
            status_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl AirtelConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let auth_token = std::env::var("AIRTEL_AUTH_TOKEN").unwrap_or_default();
        let api_key = std::env::var("AIRTEL_API_KEY").unwrap_or_default();
        let signature = std::env::var("AIRTEL_SIGNATURE").unwrap_or_default();
        if auth_token.is_empty() || api_key.is_empty() {
            return Err(PaymentError::Validation {
                message: "AIRTEL_AUTH_TOKEN and AIRTEL_API_KEY are required".to_string(),
                field: Some("airtel".to_string()),
            });
        }

        let defaults = Self::default();
        Ok(Self {
            auth_token,
            api_key,
            signature,
            base_url: std::env::var("AIRTEL_BASE_URL").unwrap_or(defaults.base_url),
            country: std::env::var("AIRTEL_COUNTRY").unwrap_or(defaults.country),
            currency: std::env::var("AIRTEL_CURRENCY").unwrap_or(defaults.currency),
            callback_secret: std::env::var("AIRTEL_CALLBACK_SECRET").ok(),
            initiate_timeout_secs: std::env::var("AIRTEL_INITIATE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.initiate_timeout_secs),
            status_timeout_secs: std::env::var("AIRTEL_STATUS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.status_timeout_secs),
            max_retries: std::env::var("AIRTEL_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
        })
    }
}

pub struct AirtelProvider {
    config: AirtelConfig,
    http: PaymentHttpClient,
}

impl AirtelProvider {
    pub fn new(config: AirtelConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(AirtelConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn map_status(raw: &str) -> TransactionStatus {
        match raw {
            "TS" | "SUCCESS" => TransactionStatus::Success,
            "TF" | "FAILED" => TransactionStatus::Failed,
            "TIP" | "TA" | "IN_PROCESS" => TransactionStatus::Pending,
            _ => TransactionStatus::Unknown,
        }
    }

    fn check_envelope(&self, envelope: &AirtelEnvelope, context: &str) -> PaymentResult<()> {
        if envelope.status.success {
            Ok(())
        } else {
            Err(PaymentError::ProviderRejected {
                provider: "airtel".to_string(),
                message: envelope
                    .status
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{context} rejected")),
                provider_code: envelope.status.code.clone(),
            })
        }
    }
}

#[async_trait]
impl MobileMoneyProvider for AirtelProvider {
    async fn request_collection(
        &self,
        request: CollectionRequest,
    ) -> PaymentResult<InitiationResponse> {
        request.amount.validate_positive("amount")?;

        let payload = serde_json::json!({
            "reference": request.reference,
            "subscriber": {
                "country": self.config.country,
                "currency": self.config.currency,
                "msisdn": request.phone.msisdn(),
            },
            "transaction": {
                "amount": request.amount.amount,
                "country": self.config.country,
                "currency": self.config.currency,
                "id": request.reference,
            },
        });

        let raw: AirtelEnvelope = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/merchant/v2/payments/"),
                Auth::Bearer(&self.config.auth_token),
                Some(&payload),
                &[
                    ("Accept", "*/*"),
                    ("X-Country", self.config.country.as_str()),
                    ("X-Currency", self.config.currency.as_str()),
                    ("x-signature", self.config.signature.as_str()),
                    ("x-key", self.config.api_key.as_str()),
                ],
                Duration::from_secs(self.config.initiate_timeout_secs),
            )
            .await?;
        self.check_envelope(&raw, "payment")?;

        let transaction = raw.data.and_then(|d| d.transaction);
        info!(reference = %request.reference, "airtel collection requested");
        Ok(InitiationResponse {
            status: transaction
                .as_ref()
                .and_then(|t| t.status.as_deref())
                .map(Self::map_status)
                .unwrap_or(TransactionStatus::Pending),
            reference: request.reference,
            provider_transaction_id: transaction.and_then(|t| t.id),
            message: Some("Airtel payment prompt sent".to_string()),
        })
    }

    async fn request_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> PaymentResult<InitiationResponse> {
        request.amount.validate_positive("amount")?;

        let payload = serde_json::json!({
            "payee": {
                "msisdn": request.phone.msisdn(),
            },
            "reference": request.reference,
            "transaction": {
                "amount": request.amount.amount,
                "id": request.reference,
            },
        });

        let raw: AirtelEnvelope = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/standard/v2/disbursements/"),
                Auth::Bearer(&self.config.auth_token),
                Some(&payload),
                &[
                    ("Accept", "*/*"),
                    ("X-Country", self.config.country.as_str()),
                    ("X-Currency", self.config.currency.as_str()),
                    ("x-signature", self.config.signature.as_str()),
                    ("x-key", self.config.api_key.as_str()),
                ],
                Duration::from_secs(self.config.initiate_timeout_secs),
            )
            .await?;
        self.check_envelope(&raw, "disbursement")?;

        let transaction = raw.data.and_then(|d| d.transaction);
        info!(reference = %request.reference, "airtel disbursement requested");
        Ok(InitiationResponse {
            status: transaction
                .as_ref()
                .and_then(|t| t.status.as_deref())
                .map(Self::map_status)
                .unwrap_or(TransactionStatus::Pending),
            reference: request.reference,
            provider_transaction_id: transaction.and_then(|t| t.id),
            message: Some("Airtel disbursement initiated".to_string()),
        })
    }

    async fn fetch_status(
        &self,
        reference: &str,
        direction: Direction,
    ) -> PaymentResult<StatusResponse> {
        let path = match direction {
            Direction::Deposit => format!("/standard/v1/payments/{reference}"),
            Direction::Withdrawal => format!("/standard/v1/disbursements/{reference}"),
        };

        let raw: AirtelEnvelope = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&path),
                Auth::Bearer(&self.config.auth_token),
                None,
                &[
                    ("Accept", "*/*"),
                    ("X-Country", self.config.country.as_str()),
                    ("X-Currency", self.config.currency.as_str()),
                ],
                Duration::from_secs(self.config.status_timeout_secs),
            )
            .await?;
        self.check_envelope(&raw, "status")?;

        let transaction = raw.data.and_then(|d| d.transaction);
        Ok(StatusResponse {
            status: transaction
                .as_ref()
                .and_then(|t| t.status.as_deref())
                .map(Self::map_status)
                .unwrap_or(TransactionStatus::Unknown),
            reference: reference.to_string(),
            provider_transaction_id: transaction.and_then(|t| t.id),
            message: raw.status.message,
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Airtel
    }

    fn verify_callback(&self, payload: &[u8], signature: &str) -> PaymentResult<()> {
        let secret =
            self.config
                .callback_secret
                .as_deref()
                .ok_or(PaymentError::CallbackVerification {
                    message: "no Airtel callback secret configured".to_string(),
                })?;
        if verify_hmac_sha256_hex(payload, secret, signature) {
            Ok(())
        } else {
            Err(PaymentError::CallbackVerification {
                message: "invalid Airtel callback signature".to_string(),
            })
        }
    }

    fn parse_callback(&self, payload: &[u8]) -> PaymentResult<CallbackEvent> {
        let parsed: JsonValue =
            serde_json::from_slice(payload).map_err(|e| PaymentError::CallbackVerification {
                message: format!("invalid callback JSON payload: {}", e),
            })?;

        let transaction = parsed.get("transaction");
        let reference = transaction
            .and_then(|t| t.get("id"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let status = transaction
            .and_then(|t| t.get("status_code").or_else(|| t.get("status")))
            .and_then(|v| v.as_str())
            .map(Self::map_status);

        Ok(CallbackEvent {
            provider: ProviderName::Airtel,
            reference,
            status,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AirtelEnvelope {
    #[serde(default)]
    data: Option<AirtelData>,
    status: AirtelStatusBlock,
}

#[derive(Debug, Deserialize)]
struct AirtelData {
    #[serde(default)]
    transaction: Option<AirtelTransaction>,
}

#[derive(Debug, Deserialize)]
struct AirtelTransaction {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtelStatusBlock {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}
