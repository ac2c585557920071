//! Mobile-money gateway
//!
//! Owns the lifecycle of every deposit and withdrawal: reference generation,
//! throttling, dispatch to the selected provider adapter, bounded retries
//! and status tracking. The reference is generated before the first network
//! call, so every retry — ours or the caller's — runs against the same
//! reference and cannot double-charge.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::MobileMoneyProvider;
use crate::payments::store::{MobileMoneyTransaction, TransactionStore};
use crate::payments::types::{
    CallbackEvent, CollectionRequest, Direction, DisbursementRequest, InitiationResponse, Money,
    ProviderName, TransactionStatus,
};
use crate::phone::PhoneNumber;
use crate::reference::ReferenceGenerator;
use crate::throttle::{RequestThrottle, DEPOSIT_ENDPOINT, WITHDRAWAL_ENDPOINT};
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Retries after a transport failure or timeout, against the same
    /// reference. Provider rejections are never retried.
    pub max_transport_retries: u32,
    pub retry_base_delay: Duration,
    pub min_deposit_ugx: u64,
    pub min_withdrawal_ugx: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_transport_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            min_deposit_ugx: 5_000,
            min_withdrawal_ugx: 10_000,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_transport_retries: std::env::var("GATEWAY_MAX_TRANSPORT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_transport_retries),
            retry_base_delay: Duration::from_secs(
                std::env::var("GATEWAY_RETRY_BASE_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.retry_base_delay.as_secs()),
            ),
            min_deposit_ugx: std::env::var("MIN_DEPOSIT_UGX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_deposit_ugx),
            min_withdrawal_ugx: std::env::var("MIN_WITHDRAWAL_UGX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_withdrawal_ugx),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitiationOutcome {
    pub reference: String,
    pub status: TransactionStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusOutcome {
    pub reference: String,
    pub status: TransactionStatus,
    pub message: String,
}

pub struct MobileMoneyGateway {
    providers: HashMap<ProviderName, Arc<dyn MobileMoneyProvider>>,
    store: Arc<TransactionStore>,
    throttle: Arc<RequestThrottle>,
    references: ReferenceGenerator,
    config: GatewayConfig,
}

impl MobileMoneyGateway {
    pub fn new(
        providers: Vec<Arc<dyn MobileMoneyProvider>>,
        store: Arc<TransactionStore>,
        throttle: Arc<RequestThrottle>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.name(), p)).collect(),
            store,
            throttle,
            references: ReferenceGenerator::new(),
            config,
        }
    }

    fn provider(&self, name: ProviderName) -> PaymentResult<&Arc<dyn MobileMoneyProvider>> {
        self.providers
            .get(&name)
            .ok_or_else(|| PaymentError::Validation {
                message: format!("provider {} is not available", name),
                field: Some("provider".to_string()),
            })
    }

    fn check_minimum(&self, direction: Direction, amount: &BigDecimal) -> PaymentResult<()> {
        let minimum = match direction {
            Direction::Deposit => self.config.min_deposit_ugx,
            Direction::Withdrawal => self.config.min_withdrawal_ugx,
        };
        if *amount < BigDecimal::from(minimum) {
            return Err(PaymentError::Validation {
                message: format!("Minimum {} is {} UGX", direction, minimum),
                field: Some("amount".to_string()),
            });
        }
        Ok(())
    }

    /// Initiate a deposit (collection) or withdrawal (disbursement).
    ///
    /// The generated reference is recorded with a `Pending` transaction
    /// before dispatch. Transport failures and timeouts are retried against
    /// that same reference; a provider rejection marks the transaction
    /// `Failed` and is surfaced without retry. If all retries are spent on
    /// transport failures the transaction stays `Pending` — the provider may
    /// still have received the request, and polling will resolve it.
    pub async fn initiate(
        &self,
        direction: Direction,
        provider_name: ProviderName,
        phone: PhoneNumber,
        amount: Money,
    ) -> PaymentResult<InitiationOutcome> {
        amount.validate_positive("amount")?;
        let decimal = amount.to_decimal()?;
        self.check_minimum(direction, &decimal)?;
        let provider = self.provider(provider_name)?;

        let endpoint = match direction {
            Direction::Deposit => DEPOSIT_ENDPOINT,
            Direction::Withdrawal => WITHDRAWAL_ENDPOINT,
        };
        if !self.throttle.admit(endpoint) {
            let retry_after = self.throttle.retry_after(endpoint);
            return Err(PaymentError::RateLimited {
                message: "too many mobile money requests".to_string(),
                retry_after_secs: Some(retry_after.as_secs().max(1)),
            });
        }

        let reference = self.references.next(direction.reference_prefix());
        let now = Utc::now();
        self.store.insert(MobileMoneyTransaction {
            reference: reference.clone(),
            phone: phone.clone(),
            amount: amount.clone(),
            provider: provider_name,
            direction,
            status: TransactionStatus::Pending,
            provider_transaction_id: None,
            created_at: now,
            updated_at: now,
        });

        info!(
            reference = %reference,
            provider = %provider_name,
            direction = %direction,
            amount = %amount.amount,
            "initiating mobile money transaction"
        );

        match self
            .dispatch_with_retry(provider.as_ref(), direction, &reference, &phone, &amount)
            .await
        {
            Ok(response) => {
                self.store.apply_status(
                    &reference,
                    response.status,
                    response.provider_transaction_id,
                );
                Ok(InitiationOutcome {
                    reference,
                    status: response.status,
                    message: response.message,
                })
            }
            Err(e) => {
                if !e.is_retryable() {
                    self.store
                        .apply_status(&reference, TransactionStatus::Failed, None);
                }
                error!(
                    reference = %reference,
                    provider = %provider_name,
                    error = %e,
                    "mobile money initiation failed"
                );
                Err(e)
            }
        }
    }

    async fn dispatch_with_retry(
        &self,
        provider: &dyn MobileMoneyProvider,
        direction: Direction,
        reference: &str,
        phone: &PhoneNumber,
        amount: &Money,
    ) -> PaymentResult<InitiationResponse> {
        let narration = format!("UGXchange {} of {} UGX", direction, amount.amount);
        let mut attempt = 0;

        loop {
            let result = match direction {
                Direction::Deposit => {
                    provider
                        .request_collection(CollectionRequest {
                            amount: amount.clone(),
                            phone: phone.clone(),
                            reference: reference.to_string(),
                            narration: narration.clone(),
                        })
                        .await
                }
                Direction::Withdrawal => {
                    provider
                        .request_disbursement(DisbursementRequest {
                            amount: amount.clone(),
                            phone: phone.clone(),
                            reference: reference.to_string(),
                            narration: narration.clone(),
                        })
                        .await
                }
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_transport_retries => {
                    attempt += 1;
                    let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        reference = %reference,
                        attempt = attempt,
                        max_attempts = self.config.max_transport_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transport failure, retrying with the same reference"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll the provider for the current status of a transaction.
    ///
    /// A failure of the poll itself yields `Unknown` without touching the
    /// stored transaction; callers must treat `Unknown` as retriable later,
    /// not as an outcome.
    pub async fn poll_status(&self, reference: &str) -> PaymentResult<StatusOutcome> {
        let transaction = self
            .store
            .get(reference)
            .ok_or_else(|| PaymentError::NotFound {
                reference: reference.to_string(),
            })?;

        if transaction.status.is_terminal() {
            return Ok(StatusOutcome {
                reference: reference.to_string(),
                status: transaction.status,
                message: format!("Transaction {}", transaction.status),
            });
        }

        let provider = self.provider(transaction.provider)?;
        match provider.fetch_status(reference, transaction.direction).await {
            Ok(response) => {
                self.store.apply_status(
                    reference,
                    response.status,
                    response.provider_transaction_id,
                );
                Ok(StatusOutcome {
                    reference: reference.to_string(),
                    status: response.status,
                    message: response
                        .message
                        .unwrap_or_else(|| format!("Transaction {}", response.status)),
                })
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "status poll failed");
                Ok(StatusOutcome {
                    reference: reference.to_string(),
                    status: TransactionStatus::Unknown,
                    message: "Failed to retrieve transaction status".to_string(),
                })
            }
        }
    }

    /// Apply a provider-pushed status event after verifying its signature.
    pub async fn handle_callback(
        &self,
        provider_name: ProviderName,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<CallbackEvent> {
        let provider = self.provider(provider_name)?;
        provider.verify_callback(payload, signature)?;
        let event = provider.parse_callback(payload)?;

        let Some(reference) = event.reference.as_deref() else {
            warn!(provider = %provider_name, "callback carried no transaction reference");
            return Ok(event);
        };

        match event.status {
            Some(status) => {
                if self.store.apply_status(reference, status, None).is_none() {
                    warn!(
                        provider = %provider_name,
                        reference = %reference,
                        "callback for unknown reference"
                    );
                    return Err(PaymentError::NotFound {
                        reference: reference.to_string(),
                    });
                }
                info!(
                    provider = %provider_name,
                    reference = %reference,
                    status = %status,
                    "callback applied"
                );
            }
            None => {
                warn!(
                    provider = %provider_name,
                    reference = %reference,
                    "callback carried no status"
                );
            }
        }

        Ok(event)
    }

    pub fn transaction(&self, reference: &str) -> Option<MobileMoneyTransaction> {
        self.store.get(reference)
    }
}
