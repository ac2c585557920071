pub mod airtel;
pub mod mtn;

pub use airtel::{AirtelConfig, AirtelProvider};
pub use mtn::{MtnConfig, MtnProvider};
