//! Interval catalog used by the workout builder.
//!
//! Holds the fixed warmup/cooldown distances and the effort/recovery pair
//! for each intensity tier, listed in packing priority order.

use crate::types::{LoadTarget, Segment, Zone};
use once_cell::sync::Lazy;

/// Default warmup distance in km; also the minimum day total for a session
pub const DEFAULT_WARMUP_KM: f64 = 1.5;

/// Default cooldown distance in km
pub const DEFAULT_COOLDOWN_KM: f64 = 1.5;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<IntervalCatalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static IntervalCatalog {
    &DEFAULT_CATALOG
}

/// Which load-target quantity feeds a tier's effort budget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierBudget {
    /// `kmZ5`
    Zone5,
    /// `kmZ3Z4`
    Zone3And4,
    /// Whatever total distance is still unallocated when the tier starts
    Remaining,
}

impl TierBudget {
    pub fn effort_km(self, target: &LoadTarget, remaining_km: f64) -> f64 {
        match self {
            TierBudget::Zone5 => target.km_z5,
            TierBudget::Zone3And4 => target.km_z3_z4,
            TierBudget::Remaining => remaining_km,
        }
    }
}

/// One priority tier: its budget source and the interval pair it emits
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalTier {
    pub name: &'static str,
    pub budget: TierBudget,
    pub effort: Segment,
    pub recovery: Segment,
}

impl IntervalTier {
    pub fn pair_km(&self) -> f64 {
        self.effort.distance_km + self.recovery.distance_km
    }
}

/// Static table of warmup/cooldown distances and interval tiers
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalCatalog {
    pub warmup_km: f64,
    pub cooldown_km: f64,
    /// Tiers in packing priority order
    pub tiers: Vec<IntervalTier>,
}

/// Builds the default catalog: Z5, then Z4, then Z2 intervals of
/// 1 km effort paired with 1 km Z2 recovery
pub fn build_default_catalog() -> IntervalCatalog {
    IntervalCatalog::with_distances(DEFAULT_WARMUP_KM, DEFAULT_COOLDOWN_KM)
}

impl IntervalCatalog {
    /// Default tiers with custom warmup and cooldown distances
    pub fn with_distances(warmup_km: f64, cooldown_km: f64) -> Self {
        let recovery = Segment::new(Zone::Z2, 1.0);
        Self {
            warmup_km,
            cooldown_km,
            tiers: vec![
                IntervalTier {
                    name: "Z5Default",
                    budget: TierBudget::Zone5,
                    effort: Segment::new(Zone::Z5, 1.0),
                    recovery,
                },
                IntervalTier {
                    name: "Z4Default",
                    budget: TierBudget::Zone3And4,
                    effort: Segment::new(Zone::Z4, 1.0),
                    recovery,
                },
                IntervalTier {
                    name: "Z2Default",
                    budget: TierBudget::Remaining,
                    effort: Segment::new(Zone::Z2, 1.0),
                    recovery,
                },
            ],
        }
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.warmup_km.is_finite() && self.warmup_km > 0.0) {
            errors.push(format!("Warmup distance must be positive, got {}", self.warmup_km));
        }
        if !(self.cooldown_km.is_finite() && self.cooldown_km > 0.0) {
            errors.push(format!(
                "Cooldown distance must be positive, got {}",
                self.cooldown_km
            ));
        }
        if self.tiers.is_empty() {
            errors.push("Catalog has no interval tiers".to_string());
        }

        for tier in &self.tiers {
            for (role, segment) in [("effort", tier.effort), ("recovery", tier.recovery)] {
                if !(segment.distance_km.is_finite() && segment.distance_km > 0.0) {
                    errors.push(format!(
                        "Tier '{}': {} distance must be positive, got {}",
                        tier.name, role, segment.distance_km
                    ));
                }
            }
        }

        errors
    }
}
