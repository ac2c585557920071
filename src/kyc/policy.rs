//! Tier policy decisions
//!
//! Pure functions over an explicit `now`; the service layer owns the clock
//! and the per-user record mutation.

use crate::payments::types::Direction;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ceilings for accounts that have not completed identity verification.
pub const UNVERIFIED_DEPOSIT_CEILING_UGX: u64 = 200_000;
pub const UNVERIFIED_WITHDRAWAL_CEILING_UGX: u64 = 50_000;

/// Days an account may stay unverified after submitting a verification
/// packet before it is restricted.
pub const SUBMISSION_GRACE_DAYS: i64 = 5;

pub const REMINDER_MIN_ACCOUNT_AGE_DAYS: i64 = 1;
pub const MAX_REMINDERS: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KycStatus {
    pub is_verified: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub reminder_count: u32,
}

impl Default for KycStatus {
    fn default() -> Self {
        Self {
            is_verified: false,
            submitted_at: None,
            expiry_date: None,
            reminder_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unverified accounts can only {direction} up to {ceiling_ugx} UGX")]
    LimitExceeded {
        direction: Direction,
        ceiling_ugx: u64,
    },

    #[error("account restricted pending identity verification")]
    AccountBlocked,
}

pub fn ceiling_for(direction: Direction) -> u64 {
    match direction {
        Direction::Deposit => UNVERIFIED_DEPOSIT_CEILING_UGX,
        Direction::Withdrawal => UNVERIFIED_WITHDRAWAL_CEILING_UGX,
    }
}

/// Verified accounts always pass; unverified accounts are held to the
/// per-direction ceiling. The rejection carries the ceiling so the caller
/// can tell the user what the limit actually is.
pub fn can_transact(
    amount: &BigDecimal,
    direction: Direction,
    status: &KycStatus,
) -> Result<(), PolicyError> {
    if status.is_verified {
        return Ok(());
    }

    let ceiling_ugx = ceiling_for(direction);
    if *amount > BigDecimal::from(ceiling_ugx) {
        return Err(PolicyError::LimitExceeded {
            direction,
            ceiling_ugx,
        });
    }
    Ok(())
}

/// An account is blocked only when it submitted a verification packet,
/// was never approved, and the grace period has elapsed. Accounts that
/// never submitted are reminded, not blocked.
pub fn is_blocked(status: &KycStatus, now: DateTime<Utc>) -> bool {
    if status.is_verified {
        return false;
    }
    let Some(submitted_at) = status.submitted_at else {
        return false;
    };
    (now - submitted_at).num_days() > SUBMISSION_GRACE_DAYS
}

pub fn should_remind(status: &KycStatus, account_age_days: i64, now: DateTime<Utc>) -> bool {
    !status.is_verified
        && status.submitted_at.is_none()
        && !is_blocked(status, now)
        && account_age_days >= REMINDER_MIN_ACCOUNT_AGE_DAYS
        && status.reminder_count < MAX_REMINDERS
}
