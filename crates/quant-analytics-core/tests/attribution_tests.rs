use proptest::prelude::*;
use quant_analytics_core::attribution::{AttributionEngine, BrinsonInput};
use quant_analytics_core::{Asset, EngineConfig, Portfolio};

// ===========================================================================
// Brinson identity and risk decomposition through the attribution engine
// ===========================================================================

fn engine() -> AttributionEngine {
    AttributionEngine::with_config(EngineConfig::default()).unwrap()
}

fn segments() -> impl Strategy<Value = BrinsonInput> {
    (1usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec(0.0f64..1.0, n),
            prop::collection::vec(0.0f64..1.0, n),
            prop::collection::vec(-0.3f64..0.3, n),
            prop::collection::vec(-0.3f64..0.3, n),
        )
            .prop_map(|(wp, wb, rp, rb)| BrinsonInput {
                portfolio_weights: wp,
                benchmark_weights: wb,
                portfolio_returns: rp,
                benchmark_returns: rb,
                labels: None,
                period: None,
            })
    })
}

proptest! {
    #[test]
    fn prop_effects_sum_to_active_return(input in segments()) {
        let r = &engine().brinson(&input).unwrap().result;
        let total = r.total_allocation + r.total_selection + r.total_interaction;
        // Each figure is rounded to 6 dp independently
        prop_assert!((total - r.active_return).abs() < 5e-6);
        prop_assert!((r.total_effect - r.active_return).abs() < 2e-6);
        prop_assert!((r.active_return - (r.portfolio_return - r.benchmark_return)).abs() < 2e-6);
        for s in &r.segments {
            let parts = s.allocation_effect + s.selection_effect + s.interaction_effect;
            prop_assert!((parts - s.total_effect).abs() < 5e-6);
        }
    }
}

#[test]
fn test_mismatched_lengths_rejected() {
    let input = BrinsonInput {
        portfolio_weights: vec![0.5, 0.5],
        benchmark_weights: vec![1.0],
        portfolio_returns: vec![0.1, 0.2],
        benchmark_returns: vec![0.1, 0.2],
        labels: None,
        period: None,
    };
    assert!(engine().brinson(&input).is_err());
}

#[test]
fn test_risk_budgets_sum_to_one_for_long_only_portfolio() {
    let portfolio = Portfolio::new(
        "three",
        vec![
            Asset::new("EQ", 0.5, 0.08, 0.20).with_sector("equity"),
            Asset::new("BD", 0.3, 0.03, 0.05).with_sector("fixed_income"),
            Asset::new("GD", 0.2, 0.04, 0.15).with_factor("commodity"),
        ],
    );
    let r = &engine().risk_attribution(&portfolio).unwrap().result;
    let budget: f64 = r.assets.iter().map(|a| a.risk_budget).sum();
    assert!((budget - 1.0).abs() < 0.01);
    assert_eq!(r.factors.len(), 3);
    assert!(r.portfolio_volatility > 0.0);
}
