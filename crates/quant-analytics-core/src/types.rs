use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Periodic returns expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Frequency of the observations in a price or return series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl ReturnFrequency {
    /// Number of periods in a year for annualisation
    pub fn periods_per_year(&self) -> f64 {
        match self {
            ReturnFrequency::Daily => 252.0,
            ReturnFrequency::Weekly => 52.0,
            ReturnFrequency::Monthly => 12.0,
            ReturnFrequency::Quarterly => 4.0,
            ReturnFrequency::Yearly => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnFrequency::Daily => "daily",
            ReturnFrequency::Weekly => "weekly",
            ReturnFrequency::Monthly => "monthly",
            ReturnFrequency::Quarterly => "quarterly",
            ReturnFrequency::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for ReturnFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(ReturnFrequency::Daily),
            "weekly" => Ok(ReturnFrequency::Weekly),
            "monthly" => Ok(ReturnFrequency::Monthly),
            "quarterly" => Ok(ReturnFrequency::Quarterly),
            "yearly" | "annual" | "annually" => Ok(ReturnFrequency::Yearly),
            other => Err(format!(
                "Unknown frequency '{other}'. Use: daily, weekly, monthly, quarterly, yearly"
            )),
        }
    }
}

/// A single holding. Owned by the caller; engines only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub weight: f64,
    /// Annualised expected return
    pub expected_return: Rate,
    /// Annualised volatility
    pub volatility: Rate,
    /// Periodic return history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Vec<f64>>,
    /// Global category used for scenario shocks, e.g. "equities" or "bonds"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    /// Most specific shock key, e.g. "growth_stock" or "treasury"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    /// Risk factor tag used when aggregating risk contributions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<String>,
    /// Pairwise correlation overrides keyed by the other asset's symbol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlations: Option<BTreeMap<String, f64>>,
}

impl Asset {
    pub fn new(symbol: &str, weight: f64, expected_return: Rate, volatility: Rate) -> Self {
        Asset {
            symbol: symbol.to_string(),
            weight,
            expected_return,
            volatility,
            ..Default::default()
        }
    }

    pub fn with_returns(mut self, returns: Vec<f64>) -> Self {
        self.returns = Some(returns);
        self
    }

    pub fn with_sector(mut self, sector: &str) -> Self {
        self.sector = Some(sector.to_string());
        self
    }

    pub fn with_asset_class(mut self, asset_class: &str) -> Self {
        self.asset_class = Some(asset_class.to_string());
        self
    }

    pub fn with_asset_type(mut self, asset_type: &str) -> Self {
        self.asset_type = Some(asset_type.to_string());
        self
    }

    pub fn with_factor(mut self, factor: &str) -> Self {
        self.factor = Some(factor.to_string());
        self
    }

    /// Return history, treating an absent series as empty.
    pub fn return_series(&self) -> &[f64] {
        self.returns.as_deref().unwrap_or(&[])
    }
}

/// Ordered collection of assets. Weights need not sum to one: the engines
/// never normalise them, so leverage and cash residuals are the caller's call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub name: String,
    pub assets: Vec<Asset>,
}

impl Portfolio {
    pub fn new(name: &str, assets: Vec<Asset>) -> Self {
        Portfolio {
            name: name.to_string(),
            assets,
        }
    }

    pub fn weights(&self) -> Vec<f64> {
        self.assets.iter().map(|a| a.weight).collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.assets.iter().map(|a| a.weight).sum()
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
    pub computed_at: DateTime<Utc>,
}

/// Helper to wrap computation results with provenance and metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision_dp: u32,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: format!("ieee754_f64_round_{precision_dp}dp"),
            computed_at: Utc::now(),
        },
    }
}
