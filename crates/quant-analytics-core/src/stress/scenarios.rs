use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Shock key holding the multiplicative volatility shock.
pub const VOLATILITY_KEY: &str = "volatility";

/// A named set of shocks. Keys are asset types, sectors or asset classes
/// (`equities`, `bonds`, ...); values are relative changes, so -0.5 halves
/// the affected expected return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shocks: BTreeMap<String, f64>,
    /// Occurrence probability in [0, 1]
    #[serde(default)]
    pub probability: f64,
}

impl Scenario {
    pub fn new(name: &str, description: &str, probability: f64, shocks: &[(&str, f64)]) -> Self {
        Scenario {
            name: name.to_string(),
            description: description.to_string(),
            shocks: shocks
                .iter()
                .map(|(k, v)| (normalise_key(k), *v))
                .collect(),
            probability,
        }
    }

    pub fn volatility_shock(&self) -> f64 {
        self.shocks.get(VOLATILITY_KEY).copied().unwrap_or(0.0)
    }

    /// Shock registered under `key` after normalisation, ignoring the
    /// reserved volatility key.
    pub fn shock_for(&self, key: &str) -> Option<f64> {
        let key = normalise_key(key);
        if key == VOLATILITY_KEY {
            return None;
        }
        self.shocks
            .iter()
            .find(|(k, _)| normalise_key(k) == key)
            .map(|(_, v)| *v)
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.name.trim().is_empty() {
            return Err(AnalyticsError::invalid(
                "Scenario",
                "name",
                "Scenario name cannot be empty",
            ));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(AnalyticsError::invalid(
                "Scenario",
                &format!("{}.probability", self.name),
                format!("Probability must be in [0, 1], got {}", self.probability),
            ));
        }
        for (k, v) in &self.shocks {
            if !v.is_finite() {
                return Err(AnalyticsError::invalid(
                    "Scenario",
                    &format!("{}.shocks.{k}", self.name),
                    format!("Non-finite shock {v}"),
                ));
            }
        }
        Ok(())
    }
}

/// Lower-case, with spaces and hyphens folded to underscores.
pub fn normalise_key(key: &str) -> String {
    key.trim().to_lowercase().replace([' ', '-'], "_")
}

// ---------------------------------------------------------------------------
// Built-in library
// ---------------------------------------------------------------------------

/// Named historical and hypothetical scenarios.
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "2008 Financial Crisis",
            "Global credit crunch: equities halve, credit spreads blow out, flight to treasuries",
            0.05,
            &[
                ("equities", -0.50),
                ("bonds", 0.05),
                ("corporate_bonds", -0.15),
                ("real_estate", -0.35),
                ("commodities", -0.30),
                ("financials", -0.60),
                ("technology", -0.45),
                (VOLATILITY_KEY, 1.50),
            ],
        ),
        Scenario::new(
            "COVID-19 Crash",
            "Pandemic lockdown sell-off of February-March 2020",
            0.10,
            &[
                ("equities", -0.34),
                ("bonds", 0.03),
                ("commodities", -0.25),
                ("energy", -0.50),
                ("healthcare", -0.10),
                ("technology", -0.20),
                (VOLATILITY_KEY, 2.00),
            ],
        ),
        Scenario::new(
            "Dot-com Bubble",
            "2000-2002 unwind of technology valuations",
            0.05,
            &[
                ("equities", -0.45),
                ("technology", -0.75),
                ("growth_stock", -0.60),
                ("bonds", 0.08),
                (VOLATILITY_KEY, 0.80),
            ],
        ),
        Scenario::new(
            "Interest Rate Shock",
            "Sudden 300bp parallel rise in policy and long rates",
            0.15,
            &[
                ("bonds", -0.15),
                ("long_bond", -0.25),
                ("equities", -0.15),
                ("real_estate", -0.20),
                ("financials", 0.05),
                (VOLATILITY_KEY, 0.50),
            ],
        ),
        Scenario::new(
            "Inflation Surge",
            "Persistent inflation well above target with real-rate repricing",
            0.10,
            &[
                ("equities", -0.20),
                ("bonds", -0.12),
                ("commodities", 0.25),
                ("real_estate", 0.05),
                ("tips", 0.02),
                (VOLATILITY_KEY, 0.60),
            ],
        ),
    ]
}

/// Case-insensitive lookup in the built-in library.
pub fn builtin_scenario(name: &str) -> Option<Scenario> {
    let wanted = name.trim().to_lowercase();
    builtin_scenarios()
        .into_iter()
        .find(|s| s.name.to_lowercase() == wanted)
}
