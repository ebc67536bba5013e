//! Fee and slippage sensitivity of the forward-return distribution.

use orderflow_validator_core::stats::{mean, sample_std};
use orderflow_validator_core::CostScenario;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub scenario: String,
    pub gross: f64,
    pub net: f64,
    pub hit_rate: f64,
    /// Mean over sample std, 0.0 when the std is zero or undefined.
    pub sharpe: f64,
    pub taker_fee_bps: f64,
    pub maker_fee_bps: f64,
    pub slippage_bps: f64,
}

/// One row per scenario, scenarios in name order.
#[must_use]
pub fn evaluate_costs(
    forward_returns: &[f64],
    scenarios: &BTreeMap<String, CostScenario>,
) -> Vec<CostRow> {
    let gross = mean(forward_returns).unwrap_or(0.0);
    let sharpe = match sample_std(forward_returns) {
        Some(std) if std > 0.0 => gross / std,
        _ => 0.0,
    };
    let hit_rate = if forward_returns.is_empty() {
        0.0
    } else {
        forward_returns.iter().filter(|&&r| r > 0.0).count() as f64 / forward_returns.len() as f64
    };

    scenarios
        .iter()
        .map(|(name, scenario)| CostRow {
            scenario: name.clone(),
            gross,
            net: gross - scenario.total_cost(),
            hit_rate,
            sharpe,
            taker_fee_bps: scenario.taker_fee_bps,
            maker_fee_bps: scenario.maker_fee_bps,
            slippage_bps: scenario.slippage_bps,
        })
        .collect()
}
