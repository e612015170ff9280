use serde::{Deserialize, Serialize};

use super::scenarios::Scenario;
use crate::numerical::descriptive::mean;
use crate::types::{Asset, Portfolio};

/// Asset class assumed when an asset does not name one.
pub const DEFAULT_CATEGORY: &str = "equities";

/// Which asset attribute matched a scenario shock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShockSource {
    AssetType,
    Sector,
    Category,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedShock {
    pub symbol: String,
    pub weight: f64,
    pub shock: f64,
    pub source: ShockSource,
    pub volatility_shock: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockedPortfolio {
    pub portfolio: Portfolio,
    pub applied: Vec<AppliedShock>,
    /// Mark-to-market hit, sum of weight * shock
    pub immediate_loss: f64,
}

/// Resolve the shock for one asset: asset type, then sector, then class.
pub fn resolve_shock(asset: &Asset, scenario: &Scenario) -> (f64, ShockSource) {
    if let Some(s) = asset.asset_type.as_deref().and_then(|t| scenario.shock_for(t)) {
        return (s, ShockSource::AssetType);
    }
    if let Some(s) = asset.sector.as_deref().and_then(|t| scenario.shock_for(t)) {
        return (s, ShockSource::Sector);
    }
    let category = asset.asset_class.as_deref().unwrap_or(DEFAULT_CATEGORY);
    match scenario.shock_for(category) {
        Some(s) => (s, ShockSource::Category),
        None => (0.0, ShockSource::None),
    }
}

/// Stressed copy of one asset.
///
/// Expected return scales by `1 + shock` and volatility by `1 + vol_shock`
/// (floored at zero). A return series gains the shock as its first period and
/// the rest is re-centred on the shocked mean with deviations scaled by the
/// volatility factor.
pub fn shock_asset(asset: &Asset, shock: f64, vol_shock: f64) -> Asset {
    let vol_factor = (1.0 + vol_shock).max(0.0);
    let returns = asset.returns.as_ref().filter(|r| !r.is_empty()).map(|r| {
        let m = mean(r);
        let mut shocked = Vec::with_capacity(r.len() + 1);
        shocked.push(shock);
        shocked.extend(r.iter().map(|x| m * (1.0 + shock) + (x - m) * vol_factor));
        shocked
    });
    Asset {
        expected_return: asset.expected_return * (1.0 + shock),
        volatility: asset.volatility * vol_factor,
        returns: returns.or_else(|| asset.returns.clone()),
        ..asset.clone()
    }
}

pub fn apply_shocks(portfolio: &Portfolio, scenario: &Scenario) -> ShockedPortfolio {
    let vol_shock = scenario.volatility_shock();
    let mut applied = Vec::with_capacity(portfolio.assets.len());
    let mut assets = Vec::with_capacity(portfolio.assets.len());
    let mut immediate_loss = 0.0;

    for asset in &portfolio.assets {
        let (shock, source) = resolve_shock(asset, scenario);
        immediate_loss += asset.weight * shock;
        assets.push(shock_asset(asset, shock, vol_shock));
        applied.push(AppliedShock {
            symbol: asset.symbol.clone(),
            weight: asset.weight,
            shock,
            source,
            volatility_shock: vol_shock,
        });
    }

    ShockedPortfolio {
        portfolio: Portfolio {
            name: format!("{} [{}]", portfolio.name, scenario.name),
            assets,
        },
        applied,
        immediate_loss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scenario() -> Scenario {
        Scenario::new(
            "test",
            "",
            0.1,
            &[
                ("equities", -0.3),
                ("technology", -0.5),
                ("growth_stock", -0.6),
                ("bonds", 0.02),
                ("volatility", 1.0),
            ],
        )
    }

    #[test]
    fn test_priority_type_over_sector_over_category() {
        let s = scenario();
        let typed = Asset::new("T", 0.2, 0.1, 0.2)
            .with_asset_type("growth_stock")
            .with_sector("technology");
        assert_eq!(resolve_shock(&typed, &s), (-0.6, ShockSource::AssetType));

        let sector = Asset::new("S", 0.2, 0.1, 0.2).with_sector("Technology");
        assert_eq!(resolve_shock(&sector, &s), (-0.5, ShockSource::Sector));

        let plain = Asset::new("P", 0.2, 0.1, 0.2);
        assert_eq!(resolve_shock(&plain, &s), (-0.3, ShockSource::Category));

        let bond = Asset::new("B", 0.2, 0.03, 0.05).with_asset_class("bonds");
        assert_eq!(resolve_shock(&bond, &s), (0.02, ShockSource::Category));

        let gold = Asset::new("G", 0.2, 0.03, 0.15).with_asset_class("commodities");
        assert_eq!(resolve_shock(&gold, &s), (0.0, ShockSource::None));
    }

    #[test]
    fn test_shock_asset_scales_moments() {
        let a = Asset::new("A", 0.5, 0.10, 0.20).with_returns(vec![0.01, 0.03]);
        let shocked = shock_asset(&a, -0.3, 1.0);
        assert_abs_diff_eq!(shocked.expected_return, 0.07, epsilon = 1e-12);
        assert_abs_diff_eq!(shocked.volatility, 0.40, epsilon = 1e-12);
        let r = shocked.returns.unwrap();
        assert_eq!(r.len(), 3);
        assert_abs_diff_eq!(r[0], -0.3);
        // mean 0.02 -> 0.014; deviations +-0.01 doubled
        assert_abs_diff_eq!(r[1], 0.014 - 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(r[2], 0.014 + 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_immediate_loss_is_weighted_shock() {
        let p = Portfolio::new(
            "p",
            vec![
                Asset::new("EQ", 0.6, 0.08, 0.18),
                Asset::new("BD", 0.4, 0.03, 0.05).with_asset_class("bonds"),
            ],
        );
        let shocked = apply_shocks(&p, &scenario());
        assert_abs_diff_eq!(shocked.immediate_loss, 0.6 * -0.3 + 0.4 * 0.02, epsilon = 1e-12);
        assert_eq!(shocked.applied.len(), 2);
        assert_eq!(shocked.portfolio.assets[0].weight, 0.6);
    }
}
