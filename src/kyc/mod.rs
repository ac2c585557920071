//! KYC verification status and tiered transaction limits

pub mod policy;
pub mod service;

pub use policy::{KycStatus, PolicyError};
pub use service::{KycService, UserKycRecord};
