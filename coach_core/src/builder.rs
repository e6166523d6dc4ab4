//! Workout builder: turns seven days of load targets into structured sessions.
//!
//! For each day:
//! 1. Days whose total does not exceed the warmup distance get no session
//! 2. Warmup, then cooldown (capped by what is left), are allocated at Z2
//! 3. The rest is packed greedily into interval pairs, tier by tier in
//!    catalog priority order (Z5, then Z4, then Z2)

use crate::catalog::{IntervalCatalog, IntervalTier};
use crate::types::{
    DayPlan, IntervalPair, LoadTargets, LoadTarget, MainSet, RunningPlan, RunningSession,
    Segment, TrainingPlan, UserPlan, WeeklyLoadTargets, Zone,
};
use std::collections::HashSet;

/// Slack on tier budgets for decimal km values that do not add up exactly in
/// binary floating point. Never applied to the remaining distance, so packing
/// cannot overshoot the day's total.
const KM_EPSILON: f64 = 1e-9;

/// Packing state threaded through the priority tiers
#[derive(Clone, Debug, PartialEq)]
struct Packing {
    remaining_km: f64,
    intervals: Vec<IntervalPair>,
}

impl Packing {
    fn new(remaining_km: f64) -> Self {
        Self {
            remaining_km,
            intervals: Vec::new(),
        }
    }

    /// Emit pairs from one tier while both its effort budget and the
    /// day's remaining distance can hold another pair.
    fn pack_tier(self, tier: &IntervalTier, target: &LoadTarget) -> Self {
        let Packing {
            mut remaining_km,
            mut intervals,
        } = self;
        let mut budget_km = tier.budget.effort_km(target, remaining_km);
        let effort_km = tier.effort.distance_km;
        let pair_km = tier.pair_km();

        while budget_km + KM_EPSILON >= effort_km && remaining_km >= pair_km {
            intervals.push(IntervalPair {
                effort: tier.effort,
                recovery: tier.recovery,
            });
            remaining_km -= pair_km;
            budget_km -= effort_km;
        }

        tracing::trace!(
            tier = tier.name,
            packed = intervals.len(),
            remaining_km,
            "Packed interval tier"
        );

        Packing {
            remaining_km,
            intervals,
        }
    }
}

/// Build the running part of one day
pub fn build_running(catalog: &IntervalCatalog, target: &LoadTarget) -> RunningPlan {
    if target.km_total <= catalog.warmup_km {
        return RunningPlan::Rest;
    }

    let warmup = Segment::new(Zone::Z2, catalog.warmup_km);
    let remaining_km = target.km_total - warmup.distance_km;

    let (cooldown, remaining_km) = if remaining_km > 0.0 {
        let km = catalog.cooldown_km.min(remaining_km);
        (Some(Segment::new(Zone::Z2, km)), remaining_km - km)
    } else {
        (None, remaining_km)
    };

    let main = if remaining_km > 0.0 {
        let packing = catalog
            .tiers
            .iter()
            .fold(Packing::new(remaining_km), |packing, tier| {
                packing.pack_tier(tier, target)
            });
        Some(MainSet::from(packing.intervals))
    } else {
        None
    };

    RunningPlan::Sessions(vec![RunningSession {
        warmup: Some(warmup),
        cooldown,
        main,
    }])
}

/// Build one day: running sessions plus the strength/alternative values, copied as given
pub fn build_day(catalog: &IntervalCatalog, target: &LoadTarget) -> DayPlan {
    DayPlan {
        running: build_running(catalog, target),
        strength: target.number_strength_sessions,
        alternative: target.hours_alternative,
    }
}

/// Build a seven-day plan for one user
pub fn build_plan(catalog: &IntervalCatalog, week: &WeeklyLoadTargets) -> TrainingPlan {
    let days = week.days();
    TrainingPlan {
        days: std::array::from_fn(|i| build_day(catalog, days[i])),
    }
}

/// Build plans for every active user plus an all-rest plan per inactive user.
///
/// Active users come first in user-id order, followed by inactive users in
/// the order given. A user listed as inactive is never planned as active.
pub fn build_plans(
    catalog: &IntervalCatalog,
    targets: &LoadTargets,
    inactive_user_ids: &[String],
) -> Vec<UserPlan> {
    let inactive: HashSet<&str> = inactive_user_ids.iter().map(String::as_str).collect();

    let mut plans: Vec<UserPlan> = targets
        .iter()
        .filter(|(user_id, _)| {
            let skip = inactive.contains(user_id.as_str());
            if skip {
                tracing::warn!(user_id = %user_id, "User has load targets but is inactive, skipping targets");
            }
            !skip
        })
        .map(|(user_id, week)| UserPlan {
            user_id: user_id.clone(),
            plan: build_plan(catalog, week),
        })
        .collect();

    let active = plans.len();
    let mut seen = HashSet::new();
    for user_id in inactive_user_ids {
        if seen.insert(user_id.as_str()) {
            plans.push(UserPlan {
                user_id: user_id.clone(),
                plan: TrainingPlan::empty(),
            });
        }
    }

    tracing::info!(
        active,
        inactive = seen.len(),
        "Built {} training plans",
        plans.len()
    );

    plans
}
