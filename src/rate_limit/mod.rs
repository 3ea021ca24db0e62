//! Client-side approximations of the exchange's two rate-limit regimes: a
//! weighted bucket shared by every request and a per-address allowance
//! derived from traded volume.

mod address;
mod global;
pub mod weights;

pub use address::{AddressRateLimiter, FixedVolume, L1Limits, VolumeSource};
pub use global::{GlobalRateLimiter, LimiterStats};
