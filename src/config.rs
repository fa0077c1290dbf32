//! # Configuration
//!
//! Runtime tunables for the dispatch core. Every value has a default and can be overridden
//! through the environment. Unparseable or out-of-range values are logged and replaced by the
//! default rather than aborting start-up.

use std::env;
use std::str::FromStr;

use tracing::{info, warn};

use crate::earnings::EarningsPolicy;

pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 20.0;
pub const DEFAULT_DELIVERY_FEE: f64 = 25.0;
pub const DEFAULT_STORE_BUFFER: usize = 64;
pub const DEFAULT_HUB_BUFFER: usize = 256;
pub const DEFAULT_SESSION_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Assumed urban travel speed used for ETA estimates.
    pub average_speed_kmh: f64,
    /// Partner payout rates, shared by offers and delivery credits.
    pub earnings: EarningsPolicy,
    /// Flat delivery fee added to every order total at checkout.
    pub delivery_fee: f64,
    /// Capacity of the order store request channel.
    pub store_buffer: usize,
    /// Capacity of the dispatch hub request channel.
    pub hub_buffer: usize,
    /// Capacity of each client connection's outbound event queue. Events beyond this are dropped.
    pub session_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            earnings: EarningsPolicy::default(),
            delivery_fee: DEFAULT_DELIVERY_FEE,
            store_buffer: DEFAULT_STORE_BUFFER,
            hub_buffer: DEFAULT_HUB_BUFFER,
            session_buffer: DEFAULT_SESSION_BUFFER,
        }
    }
}

impl DispatchConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let earnings = EarningsPolicy {
            base: non_negative("DISPATCH_BASE_EARNING", defaults.earnings.base),
            per_item: non_negative("DISPATCH_PER_ITEM_EARNING", defaults.earnings.per_item),
            distance_bonus: non_negative("DISPATCH_DISTANCE_BONUS", defaults.earnings.distance_bonus),
        };
        let config = Self {
            average_speed_kmh: env_or("DISPATCH_AVERAGE_SPEED_KMH", defaults.average_speed_kmh, |v: &f64| {
                v.is_finite() && *v > 0.0
            }),
            earnings,
            delivery_fee: non_negative("DISPATCH_DELIVERY_FEE", defaults.delivery_fee),
            store_buffer: positive("DISPATCH_STORE_BUFFER", defaults.store_buffer),
            hub_buffer: positive("DISPATCH_HUB_BUFFER", defaults.hub_buffer),
            session_buffer: positive("DISPATCH_SESSION_BUFFER", defaults.session_buffer),
        };
        info!(?config, "Dispatch configuration loaded");
        config
    }
}

fn non_negative(key: &str, default: f64) -> f64 {
    env_or(key, default, |v: &f64| v.is_finite() && *v >= 0.0)
}

fn positive(key: &str, default: usize) -> usize {
    env_or(key, default, |v: &usize| *v > 0)
}

fn env_or<T>(key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            warn!(key, %value, %default, "Value out of range. Using the default instead");
            default
        }
        Err(e) => {
            warn!(key, raw, error = %e, %default, "Value could not be parsed. Using the default instead");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DispatchConfig::default();
        assert_eq!(config.average_speed_kmh, 20.0);
        assert_eq!(config.earnings.base, 30.0);
        assert_eq!(config.earnings.per_item, 5.0);
        assert_eq!(config.earnings.distance_bonus, 10.0);
        assert!(config.session_buffer > 0);
    }

    #[test]
    fn env_overrides_and_fallbacks() {
        // Keys are unique to this test so parallel tests never observe them
        env::set_var("DISPATCH_TEST_SPEED_OK", "35.5");
        env::set_var("DISPATCH_TEST_SPEED_ZERO", "0");
        env::set_var("DISPATCH_TEST_SPEED_JUNK", "fast");
        let speed = |v: &f64| *v > 0.0;
        assert_eq!(env_or("DISPATCH_TEST_SPEED_OK", 20.0, speed), 35.5);
        assert_eq!(env_or("DISPATCH_TEST_SPEED_ZERO", 20.0, speed), 20.0);
        assert_eq!(env_or("DISPATCH_TEST_SPEED_JUNK", 20.0, speed), 20.0);
        assert_eq!(env_or("DISPATCH_TEST_SPEED_UNSET", 20.0, speed), 20.0);
        assert_eq!(positive("DISPATCH_TEST_BUFFER_UNSET", 8), 8);
    }
}
