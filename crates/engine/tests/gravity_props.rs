//! Property tests for the gravity math.

use chrono::{Duration, Utc};
use nautilus_core::{ChunkKey, GravityConfig, GravityRecord};
use nautilus_engine::{effective_mass, score_modifier};
use proptest::prelude::*;

fn record(
    access_count: u64,
    reference_count: u64,
    explicit_importance: f64,
    days_since_write: i64,
) -> GravityRecord {
    let now = Utc::now();
    let written = now - Duration::days(days_since_write);
    let mut record = GravityRecord::new(ChunkKey::whole_file("p.md"), written);
    record.access_count = access_count;
    record.reference_count = reference_count;
    record.explicit_importance = explicit_importance;
    record.last_written_at = Some(written);
    record
}

proptest! {
    #[test]
    fn mass_stays_within_bounds(
        access in 0u64..10_000,
        reference in 0u64..10_000,
        importance in 0.0f64..1e6,
        days in 0i64..3_650,
    ) {
        let config = GravityConfig::default();
        let mass = effective_mass(&record(access, reference, importance, days), Utc::now(), &config);
        prop_assert!(mass >= 0.0, "mass {} below zero", mass);
        prop_assert!(mass <= config.mass_cap, "mass {} above cap", mass);
    }

    #[test]
    fn modifier_is_monotonic_and_at_least_one(
        a in 0.0f64..1e4,
        b in 0.0f64..1e4,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(score_modifier(lo) >= 1.0);
        prop_assert!(score_modifier(lo) <= score_modifier(hi));
    }

    #[test]
    fn older_writes_never_weigh_more(
        access in 0u64..1_000,
        importance in 0.0f64..100.0,
        younger in 0i64..365,
        older_by in 1i64..365,
    ) {
        // Same counters, strictly older write → no larger mass. Ages start
        // past the authority window so the flat boost cannot flip the
        // comparison.
        let config = GravityConfig::default();
        let now = Utc::now();
        let young = effective_mass(&record(access, 0, importance, younger + 2), now, &config);
        let old = effective_mass(&record(access, 0, importance, younger + 2 + older_by), now, &config);
        prop_assert!(old <= young + 1e-9, "old {} > young {}", old, young);
    }
}

#[test]
fn modifier_matches_formula() {
    for mass in [0.0, 0.5, 1.0, 10.0, 100.0] {
        let expected = 1.0 + 0.1 * (1.0f64 + mass).ln();
        assert!((score_modifier(mass) - expected).abs() < 1e-12);
    }
}
