//! MTN MoMo adapter
//!
//! Collections go through the `collection` product (request-to-pay),
//! withdrawals through the `disbursement` product (transfer). Both products
//! issue their own OAuth token; request-to-pay and transfer acknowledge
//! with an empty `202 Accepted`, so the reference we supply in
//! `X-Reference-Id` is the transaction identity from the first byte.

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
pub struct MtnConfig {
    pub subscription_key: String,
    pub api_user: String,
    pub api_key: String,
    pub target_environment: String,
    pub base_url: String,
    pub callback_secret: Option<String>,
    pub initiate_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for MtnConfig {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            api_user: String::new(),
            api_key: String::new(),
            target_environment: "sandbox".to_string(),
            base_url: "https://sandbox.momodeveloper.mtn.com".to_string(),
            callback_secret: None,
            initiate_timeout_secs: 15,
            status_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl MtnConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let subscription_key = std::env::var("MTN_SUBSCRIPTION_KEY").unwrap_or_default();
        let api_user = std::env::var("MTN_API_USER").unwrap_or_default();
        let api_key = std::env::var("MTN_API_KEY").unwrap_or_default();
        if subscription_key.is_empty() || api_user.is_empty() || api_key.is_empty() {
            return Err(PaymentError::Validation {
                message: "MTN_SUBSCRIPTION_KEY, MTN_API_USER and MTN_API_KEY are required"
                    .to_string(),
                field: Some("mtn".to_string()),
            });
        }

        let defaults = Self::default();
        Ok(Self {
            subscription_key,
            api_user,
            api_key,
            target_environment: std::env::var("MTN_TARGET_ENVIRONMENT")
                .unwrap_or(defaults.target_environment),
            base_url: std::env::var("MTN_BASE_URL").unwrap_or(defaults.base_url),
            callback_secret: std::env::var("MTN_CALLBACK_SECRET").ok(),
            initiate_timeout_secs: std::env::var("MTN_INITIATE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.initiate_timeout_secs),
            status_timeout_secs: std::env::var("MTN_STATUS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.status_timeout_secs),
            max_retries: std::env::var("MTN_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
        })
    }
}

pub struct MtnProvider {
    config: MtnConfig,
    http: PaymentHttpClient,
}

impl MtnProvider {
    pub fn new(config: MtnConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(MtnConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn product_for(direction: Direction) -> &'static str {
        match direction {
            Direction::Deposit => "collection",
            Direction::Withdrawal => "disbursement",
        }
    }

    async fn access_token(&self, product: &str) -> PaymentResult<String> {
        let raw: MtnTokenResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/{product}/token/")),
                Auth::Basic {
                    username: &self.config.api_user,
                    password: &self.config.api_key,
                },
                None,
                &[("Ocp-Apim-Subscription-Key", self.config.subscription_key.as_str())],
                Duration::from_secs(self.config.initiate_timeout_secs),
            )
            .await?;
        Ok(raw.access_token)
    }

    fn map_status(raw: &str) -> TransactionStatus {
        match raw {
            "SUCCESSFUL" => TransactionStatus::Success,
            "FAILED" | "REJECTED" | "TIMEOUT" => TransactionStatus::Failed,
            "PENDING" | "ONGOING" | "CREATED" => TransactionStatus::Pending,
            _ => TransactionStatus::Unknown,
        }
    }
}

#[async_trait]
impl MobileMoneyProvider for MtnProvider {
    async fn request_collection(
        &self,
        request: CollectionRequest,
    ) -> PaymentResult<InitiationResponse> {
        request.amount.validate_positive("amount")?;
        let token = self.access_token("collection").await?;

        let payload = serde_json::json!({
            "amount": request.amount.amount,
            "currency": request.amount.currency,
            "externalId": request.reference,
            "payer": {
                "partyIdType": "MSISDN",
                "partyId": request.phone.msisdn(),
            },
            "payerMessage": request.narration,
            "payeeNote": request.narration,
        });

        self.http
            .request_accepted(
                reqwest::Method::POST,
                &self.endpoint("/collection/v1_0/requesttopay"),
                Auth::Bearer(&token),
                Some(&payload),
                &[
                    ("X-Reference-Id", request.reference.as_str()),
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    ("Ocp-Apim-Subscription-Key", self.config.subscription_key.as_str()),
                ],
                Duration::from_secs(self.config.initiate_timeout_secs),
            )
            .await?;

        info!(reference = %request.reference, "mtn collection requested");
        Ok(InitiationResponse {
            status: TransactionStatus::Pending,
            reference: request.reference,
            provider_transaction_id: None,
            message: Some("MTN payment prompt sent".to_string()),
        })
    }

    async fn request_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> PaymentResult<InitiationResponse> {
        request.amount.validate_positive("amount")?;
        let token = self.access_token("disbursement").await?;

        let payload = serde_json::json!({
            "amount": request.amount.amount,
            "currency": request.amount.currency,
            "externalId": request.reference,
            "payee": {
                "partyIdType": "MSISDN",
                "partyId": request.phone.msisdn(),
            },
            "payerMessage": request.narration,
            "payeeNote": request.narration,
        });

        self.http
            .request_accepted(
                reqwest::Method::POST,
                &self.endpoint("/disbursement/v1_0/transfer"),
                Auth::Bearer(&token),
                Some(&payload),
                &[
                    ("X-Reference-Id", request.reference.as_str()),
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    ("Ocp-Apim-Subscription-Key", self.config.subscription_key.as_str()),
                ],
                Duration::from_secs(self.config.initiate_timeout_secs),
            )
            .await?;

        info!(reference = %request.reference, "mtn disbursement requested");
        Ok(InitiationResponse {
            status: TransactionStatus::Pending,
            reference: request.reference,
            provider_transaction_id: None,
            message: Some("MTN transfer initiated".to_string()),
        })
    }

    async fn fetch_status(
        &self,
        reference: &str,
        direction: Direction,
    ) -> PaymentResult<StatusResponse> {
        let product = Self::product_for(direction);
        let token = self.access_token(product).await?;
        let path = match direction {
            Direction::Deposit => format!("/collection/v1_0/requesttopay/{reference}"),
            Direction::Withdrawal => format!("/disbursement/v1_0/transfer/{reference}"),
        };

        let raw: MtnStatusResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&path),
                Auth::Bearer(&token),
                None,
                &[
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    ("Ocp-Apim-Subscription-Key", self.config.subscription_key.as_str()),
                ],
                Duration::from_secs(self.config.status_timeout_secs),
            )
            .await?;

        Ok(StatusResponse {
            status: Self::map_status(&raw.status),
            reference: reference.to_string(),
            message: raw.reason_text(),
            provider_transaction_id: raw.financial_transaction_id,
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Mtn
    }

    fn verify_callback(&self, payload: &[u8], signature: &str) -> PaymentResult<()> {
        let secret =
            self.config
                .callback_secret
                .as_deref()
                .ok_or(PaymentError::CallbackVerification {
                    message: "no MTN callback secret configured".to_string(),
                })?;
        if verify_hmac_sha256_hex(payload, secret, signature) {
            Ok(())
        } else {
            Err(PaymentError::CallbackVerification {
                message: "invalid MTN callback signature".to_string(),
            })
        }
    }

    fn parse_callback(&self, payload: &[u8]) -> PaymentResult<CallbackEvent> {
        let parsed: JsonValue =
            serde_json::from_slice(payload).map_err(|e| PaymentError::CallbackVerification {
                message: format!("invalid callback JSON payload: {}", e),
            })?;

        let reference = parsed
            .get("externalId")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let status = parsed
            .get("status")
            .and_then(|v| v.as_str())
            .map(Self::map_status);

        Ok(CallbackEvent {
            provider: ProviderName::Mtn,
            reference,
            status,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MtnTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MtnStatusResponse {
    status: String,
    #[serde(default)]
    financial_transaction_id: Option<String>,
    // A bare code on success paths, an object on some failure paths.
    #[serde(default)]
    reason: Option<JsonValue>,
}

impl MtnStatusResponse {
    fn reason_text(&self) -> Option<String> {
        match &self.reason {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) if !other.is_null() => Some(other.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MtnProvider {
        MtnProvider::new(MtnConfig {
            subscription_key: "sub_test".to_string(),
            api_user: "user_test".to_string(),
            api_key: "key_test".to_string(),
            callback_secret: Some("cb_secret".to_string()),
            ..MtnConfig::default()
        })
        .expect("provider init should succeed")
    }

    #[test]
    fn status_strings_map_to_shared_vocabulary() {
        assert_eq!(MtnProvider::map_status("SUCCESSFUL"), TransactionStatus::Success);
        assert_eq!(MtnProvider::map_status("FAILED"), TransactionStatus::Failed);
        assert_eq!(MtnProvider::map_status("PENDING"), TransactionStatus::Pending);
        assert_eq!(
            MtnProvider::map_status("SOMETHING_NEW"),
            TransactionStatus::Unknown
        );
    }

    #[test]
    fn callback_with_bad_signature_is_rejected() {
        let provider = provider();
        let payload = br#"{"externalId":"TX1","status":"SUCCESSFUL"}"#;
        assert!(provider.verify_callback(payload, "bogus").is_err());
    }

    #[test]
    fn callback_payload_parses_reference_and_status() {
        let provider = provider();
        let payload = br#"{"externalId":"TX1","status":"SUCCESSFUL"}"#;
        let event = provider.parse_callback(payload).unwrap();
        assert_eq!(event.reference.as_deref(), Some("TX1"));
        assert_eq!(event.status, Some(TransactionStatus::Success));
    }
}
