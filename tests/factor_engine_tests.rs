use chrono::NaiveDate;
use reversion_quant::error::EngineError;
use reversion_quant::factor::FactorEngine;
use reversion_quant::market_data::InMemoryMarketData;
use reversion_quant::model::cross_section::FactorValue;
use reversion_quant::model::security::{SecurityId, SecurityInfo};
use reversion_quant::model::universe::UniverseSnapshot;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

/// Eleven closes from 100 to `100 * (1 + ret)` with a wiggle in between.
fn closes_for_return(ret: f64, lookback: usize) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..lookback)
        .map(|i| 100.0 + if i % 2 == 0 { 1.5 } else { -0.5 })
        .collect();
    closes[0] = 100.0;
    closes.push(100.0 * (1.0 + ret));
    closes
}

fn feed_with_returns(pairs: &[(&str, f64)], lookback: usize) -> InMemoryMarketData {
    let mut feed = InMemoryMarketData::new();
    for (id, ret) in pairs {
        feed.add_series(
            SecurityInfo::new(*id),
            as_of(),
            &closes_for_return(*ret, lookback),
            100_000.0,
        )
        .unwrap();
    }
    feed
}

fn snapshot(ids: &[&str]) -> UniverseSnapshot {
    UniverseSnapshot::new(as_of(), ids.iter().map(|id| SecurityId::new(*id)))
}

#[test]
/// Verifies the factor is the close-to-close return across exactly the lookback window.
fn compute_returns_matches_window_return() {
    let pairs = [
        ("A", 0.10),
        ("B", 0.08),
        ("C", -0.09),
        ("D", 0.01),
        ("E", -0.11),
    ];
    let feed = feed_with_returns(&pairs, 10);
    let engine = FactorEngine::new(10);

    let factor = engine
        .compute_returns(&snapshot(&["A", "B", "C", "D", "E"]), &feed)
        .expect("returns should compute");

    assert_eq!(factor.len(), 5);
    for (id, ret) in pairs {
        let got = factor.get(&SecurityId::new(id)).unwrap();
        assert!((got - ret).abs() < 1e-12, "{} got {} want {}", id, got, ret);
    }
}

#[test]
/// Verifies securities without lookback + 1 bars are left out rather than scored as zero.
fn short_history_is_excluded_not_zeroed() {
    let mut feed = feed_with_returns(&[("A", 0.05), ("B", -0.02)], 10);
    feed.add_series(SecurityInfo::new("NEW"), as_of(), &[10.0, 11.0, 12.0], 1e5)
        .unwrap();
    let engine = FactorEngine::new(10);

    let factor = engine
        .compute_returns(&snapshot(&["A", "B", "NEW"]), &feed)
        .unwrap();

    assert_eq!(factor.len(), 2);
    assert!(!factor.contains(&SecurityId::new("NEW")));
}

#[test]
/// Verifies only members of the snapshot are scored.
fn factor_is_restricted_to_snapshot() {
    let feed = feed_with_returns(&[("A", 0.05), ("B", -0.02), ("C", 0.01)], 10);
    let factor = FactorEngine::new(10)
        .compute_returns(&snapshot(&["A", "C"]), &feed)
        .unwrap();
    let ids: Vec<&str> = factor.ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["A", "C"]);
}

#[test]
/// Verifies z-scores are standardized: mean ~0 and population std ~1.
fn zscore_has_zero_mean_unit_std() {
    let factor: FactorValue = [0.10, 0.08, -0.09, 0.01, -0.11, 0.03, 0.2]
        .iter()
        .enumerate()
        .map(|(i, r)| (SecurityId::new(format!("S{}", i)), *r))
        .collect();

    let z = FactorEngine::zscore(&factor).expect("zscore should succeed");

    assert_eq!(z.len(), factor.len());
    assert!(z.mean().unwrap().abs() < 1e-12);
    assert!((z.population_std().unwrap() - 1.0).abs() < 1e-12);
}

#[test]
/// Verifies z-scoring preserves the cross-sectional ordering.
fn zscore_preserves_order() {
    let factor: FactorValue = [("A", 0.10), ("B", -0.11), ("C", 0.01)]
        .iter()
        .map(|(id, r)| (SecurityId::new(*id), *r))
        .collect();
    let z = FactorEngine::zscore(&factor).unwrap();
    let a = z.get(&SecurityId::new("A")).unwrap();
    let b = z.get(&SecurityId::new("B")).unwrap();
    let c = z.get(&SecurityId::new("C")).unwrap();
    assert!(a > c && c > b);
}

#[test]
/// Verifies fewer than two valid names is a degenerate cross-section.
fn zscore_rejects_tiny_sample() {
    let single: FactorValue = [(SecurityId::new("A"), 0.1)].into_iter().collect();
    let err = FactorEngine::zscore(&single).unwrap_err();
    assert!(matches!(
        err,
        EngineError::DegenerateCrossSection { valid: 1, .. }
    ));
    assert!(err.is_skippable());

    let empty = FactorValue::new();
    assert!(matches!(
        FactorEngine::zscore(&empty),
        Err(EngineError::DegenerateCrossSection { valid: 0, .. })
    ));
}

#[test]
/// Verifies identical returns (zero dispersion) do not divide by zero.
fn zscore_rejects_flat_cross_section() {
    let flat: FactorValue = ["A", "B", "C"]
        .iter()
        .map(|id| (SecurityId::new(*id), 0.02))
        .collect();
    assert!(matches!(
        FactorEngine::zscore(&flat),
        Err(EngineError::DegenerateCrossSection { valid: 3, .. })
    ));
}

#[test]
/// Verifies the flatness threshold scales with the factor's magnitude, so
/// rounding noise around a large level is not standardized into +/-1 scores.
fn zscore_flat_threshold_is_relative_to_level() {
    let level = 1.0e6_f64;
    let next = f64::from_bits(level.to_bits() + 1);
    let noisy: FactorValue = [("A", level), ("B", next), ("C", level), ("D", next)]
        .iter()
        .map(|(id, v)| (SecurityId::new(*id), *v))
        .collect();
    let std_dev = noisy.population_std().unwrap();
    assert!(std_dev > 1e-12, "noise should exceed an absolute cutoff");
    assert!(matches!(
        FactorEngine::zscore(&noisy),
        Err(EngineError::DegenerateCrossSection { valid: 4, .. })
    ));

    // Genuine dispersion at small magnitudes is still scored.
    let small: FactorValue = [("A", 1e-9), ("B", -1e-9)]
        .iter()
        .map(|(id, v)| (SecurityId::new(*id), *v))
        .collect();
    assert!(FactorEngine::zscore(&small).is_ok());
}
