//! Deposit/withdrawal form orchestration
//!
//! Policy first, network second: the KYC check runs locally and a rejected
//! amount never reaches the gateway. The gateway owns transaction-state
//! truth; nothing here mutates KYC or transaction records on failure.

use crate::kyc::{KycService, PolicyError};
use crate::payments::error::PaymentError;
use crate::payments::gateway::{InitiationOutcome, MobileMoneyGateway};
use crate::payments::types::{Direction, Money, ProviderName};
use crate::phone::{PhoneError, PhoneNumber};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TransactionSubmission {
    pub user_id: String,
    pub amount: String,
    pub phone_number: String,
    pub provider: ProviderName,
}

#[derive(Debug, Clone, Error)]
pub enum TransactionFormError {
    #[error(transparent)]
    Phone(#[from] PhoneError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

pub struct TransactionFormService {
    kyc: Arc<KycService>,
    gateway: Arc<MobileMoneyGateway>,
}

impl TransactionFormService {
    pub fn new(kyc: Arc<KycService>, gateway: Arc<MobileMoneyGateway>) -> Self {
        Self { kyc, gateway }
    }

    pub async fn submit_deposit(
        &self,
        submission: TransactionSubmission,
    ) -> Result<InitiationOutcome, TransactionFormError> {
        self.submit(Direction::Deposit, submission).await
    }

    pub async fn submit_withdrawal(
        &self,
        submission: TransactionSubmission,
    ) -> Result<InitiationOutcome, TransactionFormError> {
        self.submit(Direction::Withdrawal, submission).await
    }

    async fn submit(
        &self,
        direction: Direction,
        submission: TransactionSubmission,
    ) -> Result<InitiationOutcome, TransactionFormError> {
        let phone = PhoneNumber::normalize(&submission.phone_number)?;
        let amount = Money::ugx(submission.amount.clone());
        let decimal = amount.to_decimal()?;

        self.kyc
            .check_transaction(&submission.user_id, &decimal, direction)?;

        let outcome = self
            .gateway
            .initiate(direction, submission.provider, phone, amount)
            .await?;

        info!(
            user_id = %submission.user_id,
            reference = %outcome.reference,
            direction = %direction,
            "transaction submitted"
        );
        Ok(outcome)
    }
}
