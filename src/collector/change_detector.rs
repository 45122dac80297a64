use std::collections::HashMap;

use crate::domain::{HeroRate, Snapshot};

/// Why a fresh table was accepted or skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Nothing stored yet for this combination
    FirstSnapshot,
    /// Digest identical to the latest stored snapshot
    Duplicate,
    /// Every per-hero change is below the materiality threshold
    BelowThreshold,
    /// Content differs meaningfully
    Changed,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::FirstSnapshot => "first_snapshot",
            DecisionReason::Duplicate => "duplicate",
            DecisionReason::BelowThreshold => "below_threshold",
            DecisionReason::Changed => "changed",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub persist: bool,
    pub reason: DecisionReason,
}

impl Decision {
    fn persist(reason: DecisionReason) -> Self {
        Self {
            persist: true,
            reason,
        }
    }

    fn skip(reason: DecisionReason) -> Self {
        Self {
            persist: false,
            reason,
        }
    }
}

/// Decides whether a freshly normalized table warrants a new snapshot.
///
/// Exact digest equality is checked first. When a materiality threshold is
/// configured (in rate percentage points), a table whose every per-hero pick
/// and win rate moved by less than the threshold is also skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    materiality_threshold: Option<f64>,
}

impl ChangeDetector {
    pub fn new(materiality_threshold: Option<f64>) -> Self {
        Self {
            materiality_threshold,
        }
    }

    pub fn should_persist(
        &self,
        table: &[HeroRate],
        digest: &str,
        latest: Option<&Snapshot>,
    ) -> Decision {
        let Some(latest) = latest else {
            return Decision::persist(DecisionReason::FirstSnapshot);
        };

        if latest.content_digest == digest {
            return Decision::skip(DecisionReason::Duplicate);
        }

        if let Some(threshold) = self.materiality_threshold {
            if !materially_changed(table, &latest.hero_rates, threshold) {
                return Decision::skip(DecisionReason::BelowThreshold);
            }
        }

        Decision::persist(DecisionReason::Changed)
    }
}

/// A hero appearing or disappearing, a rate switching between reported and
/// unreported, or any absolute move of at least `threshold` is material.
fn materially_changed(new: &[HeroRate], previous: &[HeroRate], threshold: f64) -> bool {
    if new.len() != previous.len() {
        return true;
    }

    let previous: HashMap<&str, &HeroRate> =
        previous.iter().map(|h| (h.hero_id.as_str(), h)).collect();

    new.iter().any(|hero| match previous.get(hero.hero_id.as_str()) {
        None => true,
        Some(prev) => {
            rate_moved(hero.pick_rate, prev.pick_rate, threshold)
                || rate_moved(hero.win_rate, prev.win_rate, threshold)
        }
    })
}

/// Absorbs binary rounding so a move equal to the threshold counts whatever
/// the magnitude of the rates (10.0 -> 10.1 and 50.0 -> 49.9 alike).
const RATE_EPSILON: f64 = 1e-9;

fn rate_moved(new: Option<f64>, old: Option<f64>, threshold: f64) -> bool {
    match (new, old) {
        (Some(a), Some(b)) => (a - b).abs() + RATE_EPSILON >= threshold,
        (None, None) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::normalizer::normalize;
    use crate::domain::{Combination, Input, Mode, Region, Tier};
    use chrono::Utc;

    fn stored(rates: Vec<HeroRate>) -> Snapshot {
        let table = normalize(rates).unwrap();
        Snapshot {
            id: 1,
            timestamp: Utc::now(),
            combination: Combination::all_maps(Mode::Competitive, Input::Pc, Region::Europe, Tier::All),
            content_digest: table.digest,
            hero_rates: table.hero_rates,
        }
    }

    fn rates(pairs: &[(&str, f64, f64)]) -> Vec<HeroRate> {
        pairs
            .iter()
            .map(|(id, p, w)| HeroRate::new(*id, Some(*p), Some(*w)))
            .collect()
    }

    #[test]
    fn test_first_snapshot_persists() {
        let table = normalize(rates(&[("ana", 10.0, 50.0)])).unwrap();
        let decision = ChangeDetector::new(Some(0.1)).should_persist(&table.hero_rates, &table.digest, None);
        assert_eq!(decision, Decision::persist(DecisionReason::FirstSnapshot));
    }

    #[test]
    fn test_duplicate_digest_skips() {
        let latest = stored(rates(&[("ana", 10.0, 50.0)]));
        let table = normalize(rates(&[("Ana", 10.0, 50.0)])).unwrap();
        let decision = ChangeDetector::default().should_persist(&table.hero_rates, &table.digest, Some(&latest));
        assert_eq!(decision, Decision::skip(DecisionReason::Duplicate));
    }

    #[test]
    fn test_jitter_below_threshold_skips() {
        let latest = stored(rates(&[("ana", 10.0, 50.0), ("mercy", 20.0, 49.0)]));
        let table = normalize(rates(&[("ana", 10.04, 50.0), ("mercy", 20.0, 48.95)])).unwrap();

        let with_threshold = ChangeDetector::new(Some(0.1));
        assert_eq!(
            with_threshold.should_persist(&table.hero_rates, &table.digest, Some(&latest)),
            Decision::skip(DecisionReason::BelowThreshold)
        );

        // Hash-only mode persists any digest change
        let hash_only = ChangeDetector::new(None);
        assert_eq!(
            hash_only.should_persist(&table.hero_rates, &table.digest, Some(&latest)),
            Decision::persist(DecisionReason::Changed)
        );
    }

    #[test]
    fn test_real_shift_persists() {
        let latest = stored(rates(&[("ana", 10.0, 50.0), ("mercy", 20.0, 49.0)]));
        let table = normalize(rates(&[("ana", 10.0, 50.0), ("mercy", 20.2, 49.0)])).unwrap();
        let decision = ChangeDetector::new(Some(0.1)).should_persist(&table.hero_rates, &table.digest, Some(&latest));
        assert_eq!(decision, Decision::persist(DecisionReason::Changed));
    }

    #[test]
    fn test_move_equal_to_threshold_persists() {
        let detector = ChangeDetector::new(Some(0.1));

        let latest = stored(rates(&[("ana", 10.0, 50.0)]));
        let table = normalize(rates(&[("ana", 10.1, 50.0)])).unwrap();
        assert_eq!(
            detector.should_persist(&table.hero_rates, &table.digest, Some(&latest)),
            Decision::persist(DecisionReason::Changed)
        );

        let table = normalize(rates(&[("ana", 10.0, 49.9)])).unwrap();
        assert_eq!(
            detector.should_persist(&table.hero_rates, &table.digest, Some(&latest)),
            Decision::persist(DecisionReason::Changed)
        );

        // Just under the threshold is still jitter
        let table = normalize(rates(&[("ana", 10.09, 50.0)])).unwrap();
        assert_eq!(
            detector.should_persist(&table.hero_rates, &table.digest, Some(&latest)),
            Decision::skip(DecisionReason::BelowThreshold)
        );
    }

    #[test]
    fn test_roster_change_is_material() {
        let latest = stored(rates(&[("ana", 10.0, 50.0)]));
        let table = normalize(rates(&[("ana", 10.0, 50.0), ("freja", 3.0, 47.0)])).unwrap();
        let decision = ChangeDetector::new(Some(5.0)).should_persist(&table.hero_rates, &table.digest, Some(&latest));
        assert!(decision.persist);
    }

    #[test]
    fn test_rate_becoming_unreported_is_material() {
        let latest = stored(rates(&[("ana", 10.0, 50.0)]));
        let table = normalize(vec![HeroRate::new("ana", Some(10.0), None)]).unwrap();
        let decision = ChangeDetector::new(Some(5.0)).should_persist(&table.hero_rates, &table.digest, Some(&latest));
        assert!(decision.persist);
    }
}
