use crate::payments::error::PaymentError;
use crate::phone::PhoneNumber;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

pub const UGX: &str = "UGX";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderName {
    Mtn,
    Airtel,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Mtn => "MTN",
            ProviderName::Airtel => "AIRTEL",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mtn" => Ok(ProviderName::Mtn),
            "airtel" => Ok(ProviderName::Airtel),
            _ => Err(PaymentError::Validation {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Deposit,
    Withdrawal,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Deposit => "deposit",
            Direction::Withdrawal => "withdrawal",
        }
    }

    /// Reference prefix used for transactions in this direction.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            Direction::Deposit => "TX",
            Direction::Withdrawal => "WDR",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Unknown => "unknown",
        }
    }

    /// `Unknown` means the last poll failed; it is never terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    pub fn ugx(amount: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: UGX.to_string(),
        }
    }

    pub fn to_decimal(&self) -> Result<BigDecimal, PaymentError> {
        BigDecimal::from_str(self.amount.trim()).map_err(|_| PaymentError::Validation {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some("amount".to_string()),
        })
    }

    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        let parsed = self.to_decimal()?;
        if parsed <= BigDecimal::from(0) {
            return Err(PaymentError::Validation {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::Validation {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

/// A request to pull funds from a subscriber's wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub amount: Money,
    pub phone: PhoneNumber,
    pub reference: String,
    pub narration: String,
}

/// A request to push funds to a subscriber's wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbursementRequest {
    pub amount: Money,
    pub phone: PhoneNumber,
    pub reference: String,
    pub narration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiationResponse {
    pub status: TransactionStatus,
    pub reference: String,
    pub provider_transaction_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TransactionStatus,
    pub reference: String,
    pub provider_transaction_id: Option<String>,
    pub message: Option<String>,
}

/// A status event pushed by a provider to our callback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub provider: ProviderName,
    pub reference: Option<String>,
    pub status: Option<TransactionStatus>,
    pub payload: JsonValue,
    pub received_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_parses_case_insensitively() {
        assert_eq!(ProviderName::from_str("MTN").unwrap(), ProviderName::Mtn);
        assert_eq!(
            ProviderName::from_str("airtel").unwrap(),
            ProviderName::Airtel
        );
        assert!(ProviderName::from_str("mpesa").is_err());
    }

    #[test]
    fn provider_name_round_trips_through_json() {
        let json = serde_json::to_string(&ProviderName::Airtel).unwrap();
        assert_eq!(json, "\"AIRTEL\"");
        let parsed: ProviderName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ProviderName::Airtel);
    }

    #[test]
    fn money_validation_rejects_zero_negative_and_garbage() {
        assert!(Money::ugx("10000").validate_positive("amount").is_ok());
        assert!(Money::ugx("10000.50").validate_positive("amount").is_ok());
        assert!(Money::ugx("0").validate_positive("amount").is_err());
        assert!(Money::ugx("-500").validate_positive("amount").is_err());
        assert!(Money::ugx("ten thousand").validate_positive("amount").is_err());
    }

    #[test]
    fn unknown_is_not_terminal() {
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Unknown.is_terminal());
    }

    #[test]
    fn direction_reference_prefixes() {
        assert_eq!(Direction::Deposit.reference_prefix(), "TX");
        assert_eq!(Direction::Withdrawal.reference_prefix(), "WDR");
    }
}
