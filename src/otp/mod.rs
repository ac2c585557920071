//! One-time-passcode issuance and verification
//!
//! Codes are generated and verified server-side only; the client ever holds
//! just the phone number and its own guess.

pub mod sender;
pub mod service;
pub mod store;

pub use sender::{DispatchError, LogOnlySender, OtpSender, SmsGatewaySender, SmsGatewayConfig};
pub use service::{OtpConfig, OtpError, OtpIssued, OtpService};
pub use store::{OtpChallenge, OtpStore};
