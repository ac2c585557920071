//! UGXchange backend: registration/verification and mobile-money
//! transaction orchestration for a UGX↔USDT exchange.

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod kyc;
pub mod logging;
pub mod middleware;
pub mod otp;
pub mod payments;
pub mod phone;
pub mod reference;
pub mod services;
pub mod throttle;
pub mod workers;
