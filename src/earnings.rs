//! # Earnings Calculator
//!
//! Per-delivery payout for a partner. The figure shown with an offer and the figure
//! credited on delivery come from the same pure function, so they always agree.
//!
//! The distance bonus is a flat amount per delivery. It does not scale with the distance
//! actually travelled; see DESIGN.md for the open question on that.

use serde::{Deserialize, Serialize};

/// Rates used to compute a partner's payout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarningsPolicy {
    pub base: f64,
    pub per_item: f64,
    pub distance_bonus: f64,
}

impl Default for EarningsPolicy {
    fn default() -> Self {
        Self {
            base: 30.0,
            per_item: 5.0,
            distance_bonus: 10.0,
        }
    }
}

/// Breakdown of what a partner earns for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsBreakdown {
    pub base_earning: f64,
    pub item_bonus: f64,
    pub distance_bonus: f64,
    pub total: f64,
}

impl EarningsPolicy {
    pub fn calculate(&self, item_count: usize) -> EarningsBreakdown {
        let item_bonus = item_count as f64 * self.per_item;
        EarningsBreakdown {
            base_earning: self.base,
            item_bonus,
            distance_bonus: self.distance_bonus,
            total: self.base + item_bonus + self.distance_bonus,
        }
    }
}

/// Earnings under the default policy.
pub fn calculate_earnings(item_count: usize) -> EarningsBreakdown {
    EarningsPolicy::default().calculate(item_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_items_earn_fifty_five() {
        let earnings = calculate_earnings(3);
        assert_eq!(earnings.base_earning, 30.0);
        assert_eq!(earnings.item_bonus, 15.0);
        assert_eq!(earnings.distance_bonus, 10.0);
        assert_eq!(earnings.total, 55.0);
    }

    #[test]
    fn deterministic_and_total_is_sum_of_parts() {
        for count in [0, 1, 7, 42] {
            let first = calculate_earnings(count);
            let second = calculate_earnings(count);
            assert_eq!(first, second);
            assert_eq!(first.total, first.base_earning + first.item_bonus + first.distance_bonus);
        }
    }

    #[test]
    fn custom_policy() {
        let policy = EarningsPolicy {
            base: 20.0,
            per_item: 2.5,
            distance_bonus: 0.0,
        };
        assert_eq!(policy.calculate(4).total, 30.0);
    }
}
