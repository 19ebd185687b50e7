use reversion_quant::factor::FactorEngine;
use reversion_quant::model::cross_section::{FactorValue, ZScore};
use reversion_quant::model::security::SecurityId;
use reversion_quant::selection::{percentile_between, select, SelectionPolicy};

fn zscores(pairs: &[(&str, f64)]) -> ZScore {
    pairs
        .iter()
        .map(|(id, v)| (SecurityId::new(*id), *v))
        .collect()
}

fn ids(mask: &std::collections::BTreeSet<SecurityId>) -> Vec<&str> {
    mask.iter().map(|id| id.as_str()).collect()
}

#[test]
/// Five-name universe with 10-day returns [0.10, 0.08, -0.09, 0.01, -0.11].
///
/// Linear interpolation puts the 5th percentile at rank 0.05 * 4 = 0.2, i.e.
/// 20% of the way from E (lowest) to C, and the 95th at rank 3.8, 80% of the
/// way from B to A (highest). Only the two extremes fall outside the cuts.
fn small_universe_selects_only_extremes() {
    let factor: FactorValue = [
        ("A", 0.10),
        ("B", 0.08),
        ("C", -0.09),
        ("D", 0.01),
        ("E", -0.11),
    ]
    .iter()
    .map(|(id, r)| (SecurityId::new(*id), *r))
    .collect();
    let z = FactorEngine::zscore(&factor).unwrap();

    let policy = SelectionPolicy::new(5.0, 95.0).unwrap();
    let mask = policy.select(&z);
    assert_eq!(ids(&mask), vec!["A", "E"]);

    // Same inputs, same mask.
    assert_eq!(policy.select(&z), mask);
}

#[test]
/// Verifies the full percentile band [0, 100] admits every valid name (inclusive boundaries).
fn full_band_equals_valid_set() {
    let z = zscores(&[("A", -1.2), ("B", 0.3), ("C", 0.9), ("D", 0.0)]);
    let mask = percentile_between(&z, 0.0, 100.0);
    assert_eq!(mask.len(), z.len());

    // Tails that together cover the whole distribution select everything as well.
    assert_eq!(select(&z, 100.0, 100.0).len(), z.len());
    assert_eq!(select(&z, 0.0, 0.0).len(), z.len());
}

#[test]
/// Verifies degenerate 0/100 tails keep exactly the minimum and maximum.
fn zero_width_tails_keep_min_and_max() {
    let z = zscores(&[("A", -1.2), ("B", 0.3), ("C", 0.9), ("D", 0.0)]);
    assert_eq!(ids(&select(&z, 0.0, 100.0)), vec!["A", "C"]);
}

#[test]
/// Verifies a 100-name cross-section keeps five names in each 5% tail.
fn large_universe_selects_five_percent_tails() {
    let z: ZScore = (0..100)
        .map(|i| (SecurityId::new(format!("S{:03}", i)), i as f64 / 10.0 - 5.0))
        .collect();
    let mask = SelectionPolicy::new(5.0, 95.0).unwrap().select(&z);

    assert_eq!(mask.len(), 10);
    for i in (0..5).chain(95..100) {
        assert!(mask.contains(&SecurityId::new(format!("S{:03}", i))));
    }
}

#[test]
/// Verifies ties on the boundary value are all admitted.
fn boundary_ties_are_inclusive() {
    let z = zscores(&[
        ("A", -2.0),
        ("B", -2.0),
        ("C", -2.0),
        ("D", 0.0),
        ("E", 0.5),
        ("F", 1.0),
    ]);
    let mask = select(&z, 5.0, 95.0);
    assert!(mask.contains(&SecurityId::new("A")));
    assert!(mask.contains(&SecurityId::new("B")));
    assert!(mask.contains(&SecurityId::new("C")));
    assert!(mask.contains(&SecurityId::new("F")));
    assert!(!mask.contains(&SecurityId::new("D")));
}

#[test]
/// Verifies the mask never contains anything outside the scored set.
fn mask_is_subset_of_input() {
    let z = zscores(&[("A", 0.4), ("B", -0.7), ("C", 1.9), ("D", -1.1), ("E", 0.0)]);
    for (lo, hi) in [(5.0, 95.0), (20.0, 80.0), (50.0, 50.0), (0.0, 100.0)] {
        let mask = select(&z, lo, hi);
        assert!(mask.iter().all(|id| z.contains(id)));
    }
}

#[test]
fn empty_input_gives_empty_mask() {
    let mask = select(&ZScore::new(), 5.0, 95.0);
    assert!(mask.is_empty());
}
