//! Daily intake quotas and brand-diversity limits
//!
//! Quota resolution is deterministic: the same `(range, seed)` pair always
//! yields the same daily target, so a retried ingest run never drifts.
//! The brand limit walks candidates in order and caps each brand, with a
//! controlled overflow path that sacrifices diversity only when the daily
//! floor would otherwise be missed.

use ofertafit_common::config::QuotaConfig;
use std::collections::HashMap;

use super::CandidateItem;

/// Normalized daily intake range, `min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRange {
    pub min: u32,
    pub max: u32,
}

/// Normalize a fixed-or-range quota config into a [`QuotaRange`]
///
/// A fixed number collapses to a degenerate range; an inverted range is
/// reordered rather than rejected. Missing config falls back to the given
/// bounds.
pub fn resolve_quota_range(
    config: Option<&QuotaConfig>,
    fallback_min: u32,
    fallback_max: u32,
) -> QuotaRange {
    let (min, max) = match config {
        Some(QuotaConfig::Fixed(n)) => (*n, *n),
        Some(QuotaConfig::Range { min, max }) => (*min, *max),
        None => (fallback_min, fallback_max),
    };

    QuotaRange {
        min: min.min(max),
        max: min.max(max),
    }
}

/// Deterministically map a seed into the range
///
/// Identical `(range, seed)` always returns the identical value, and the
/// value always lies within `[min, max]`.
pub fn resolve_quota_value(range: QuotaRange, seed: u32) -> u32 {
    let span = range.max - range.min + 1;
    range.min + seed % span
}

/// Inputs for the brand-diversity pass
#[derive(Debug, Clone, Default)]
pub struct BrandLimitOpts {
    /// Per-brand admission ceiling
    pub max_per_brand: u32,
    /// Daily floor: overflow past the brand cap is allowed while total
    /// admissions stay below this
    pub min_target: u32,
    /// Admissions already consumed per brand key earlier today
    pub initial_usage: HashMap<String, u32>,
}

/// Result of the brand-diversity pass; order of `selected` follows input
#[derive(Debug, Clone)]
pub struct BrandLimitOutcome {
    pub selected: Vec<CandidateItem>,
    pub rejected: Vec<CandidateItem>,
}

/// Walk candidates in order, admitting up to `max_per_brand` per brand key
///
/// Saturated brands may still overflow while total admissions remain below
/// `min_target`; overflow admissions are still counted against their brand.
/// Candidates without a brand key bypass the cap entirely.
pub fn apply_brand_daily_limit(
    candidates: Vec<CandidateItem>,
    opts: &BrandLimitOpts,
) -> BrandLimitOutcome {
    let mut usage = opts.initial_usage.clone();
    let mut selected = Vec::new();
    let mut rejected = Vec::new();

    for candidate in candidates {
        let Some(brand) = candidate.brand_key() else {
            selected.push(candidate);
            continue;
        };

        let used = usage.entry(brand).or_insert(0);
        let within_cap = *used < opts.max_per_brand;
        let floor_unmet = (selected.len() as u32) < opts.min_target;

        if within_cap || floor_unmet {
            *used += 1;
            selected.push(candidate);
        } else {
            rejected.push(candidate);
        }
    }

    BrandLimitOutcome { selected, rejected }
}

/// Collapse candidates sharing an external id, keeping the first occurrence
pub fn dedupe_by_external_id(candidates: Vec<CandidateItem>) -> Vec<CandidateItem> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.external_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(external_id: &str, brand: Option<&str>) -> CandidateItem {
        CandidateItem {
            external_id: external_id.to_string(),
            title: "Munhequeira elástica".to_string(),
            brand: brand.map(|b| b.to_string()),
            price: 29.9,
            category_id: None,
            attributes: vec![],
            context: None,
        }
    }

    #[test]
    fn test_resolve_range_fixed() {
        let range = resolve_quota_range(Some(&QuotaConfig::Fixed(5)), 3, 6);
        assert_eq!(range, QuotaRange { min: 5, max: 5 });
    }

    #[test]
    fn test_resolve_range_explicit_and_fallback() {
        let range = resolve_quota_range(Some(&QuotaConfig::Range { min: 2, max: 4 }), 3, 6);
        assert_eq!(range, QuotaRange { min: 2, max: 4 });

        let fallback = resolve_quota_range(None, 3, 6);
        assert_eq!(fallback, QuotaRange { min: 3, max: 6 });
    }

    #[test]
    fn test_resolve_range_reorders_inverted_bounds() {
        let range = resolve_quota_range(Some(&QuotaConfig::Range { min: 9, max: 4 }), 0, 0);
        assert_eq!(range, QuotaRange { min: 4, max: 9 });
    }

    #[test]
    fn test_quota_value_deterministic_and_in_range() {
        let range = QuotaRange { min: 3, max: 6 };

        for seed in 0..400 {
            let value = resolve_quota_value(range, seed);
            assert_eq!(value, resolve_quota_value(range, seed));
            assert!((range.min..=range.max).contains(&value));
        }
    }

    #[test]
    fn test_quota_value_degenerate_range() {
        let range = QuotaRange { min: 4, max: 4 };
        assert_eq!(resolve_quota_value(range, 123), 4);
    }

    #[test]
    fn test_brand_cap_rejects_excess_same_brand() {
        let candidates = vec![
            candidate("MLB1", Some("Growth")),
            candidate("MLB2", Some("Growth")),
            candidate("MLB3", Some("Growth")),
            candidate("MLB4", Some("Max Titanium")),
        ];
        let opts = BrandLimitOpts {
            max_per_brand: 2,
            min_target: 0,
            initial_usage: HashMap::new(),
        };

        let outcome = apply_brand_daily_limit(candidates, &opts);

        assert_eq!(outcome.selected.len(), 3);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].external_id, "MLB3");
    }

    #[test]
    fn test_overflow_admits_until_floor_is_met() {
        let candidates = vec![
            candidate("MLB1", Some("Growth")),
            candidate("MLB2", Some("Growth")),
            candidate("MLB3", Some("Growth")),
            candidate("MLB4", Some("Growth")),
        ];
        let opts = BrandLimitOpts {
            max_per_brand: 2,
            min_target: 3,
            initial_usage: HashMap::new(),
        };

        let outcome = apply_brand_daily_limit(candidates, &opts);

        // Two within the cap, one overflow to reach the floor of 3
        assert_eq!(outcome.selected.len(), 3);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_brandless_candidates_bypass_the_cap() {
        let candidates = vec![
            candidate("MLB1", None),
            candidate("MLB2", None),
            candidate("MLB3", None),
        ];
        let opts = BrandLimitOpts {
            max_per_brand: 1,
            min_target: 0,
            initial_usage: HashMap::new(),
        };

        let outcome = apply_brand_daily_limit(candidates, &opts);
        assert_eq!(outcome.selected.len(), 3);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_initial_usage_counts_against_the_cap() {
        let candidates = vec![
            candidate("MLB1", Some("Growth")),
            candidate("MLB2", Some("Growth")),
        ];
        let opts = BrandLimitOpts {
            max_per_brand: 2,
            min_target: 0,
            initial_usage: HashMap::from([("growth".to_string(), 1)]),
        };

        let outcome = apply_brand_daily_limit(candidates, &opts);

        assert_eq!(outcome.selected.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_brand_key_is_case_insensitive() {
        let candidates = vec![
            candidate("MLB1", Some("Growth")),
            candidate("MLB2", Some("GROWTH")),
            candidate("MLB3", Some("growth")),
        ];
        let opts = BrandLimitOpts {
            max_per_brand: 2,
            min_target: 0,
            initial_usage: HashMap::new(),
        };

        let outcome = apply_brand_daily_limit(candidates, &opts);
        assert_eq!(outcome.selected.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let candidates = vec![
            candidate("MLB1", Some("Growth")),
            candidate("MLB2", None),
            candidate("MLB1", Some("Max Titanium")),
        ];

        let deduped = dedupe_by_external_id(candidates);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].external_id, "MLB1");
        assert_eq!(deduped[0].brand.as_deref(), Some("Growth"));
        assert_eq!(deduped[1].external_id, "MLB2");
    }
}
