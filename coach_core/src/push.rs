//! Push built plans to the partner platform.
//!
//! Per user, in order:
//! 1. Look up heart-rate zones (active users only)
//! 2. Delete every workout and schedule tracked from the previous push
//! 3. Create a workout and a schedule per running session, dated from the anchor
//!
//! A zone lookup failure leaves the user's previous week untouched.

use crate::codec::{anchor_date, planned_sessions};
use crate::device::to_device_format;
use crate::partner::PartnerPush;
use crate::tracking::{TrackedWorkout, TrackingLedger};
use crate::types::{UserFailure, UserPlan};
use crate::zones::ZoneProvider;
use crate::{Error, Result};
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;

/// Users pushed at once
const MAX_CONCURRENT_PUSHES: usize = 4;

/// Outcome of one push run
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    /// Users whose new week was pushed, with the number of workouts created
    pub pushed: Vec<(String, usize)>,
    /// Inactive users whose previous workouts were removed
    pub cleared: Vec<String>,
    pub failed: Vec<UserFailure>,
}

impl PushReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn workouts_pushed(&self) -> usize {
        self.pushed.iter().map(|(_, n)| n).sum()
    }
}

struct UserOutcome {
    user_id: String,
    active: bool,
    /// Ids to track after this run
    tracked: Vec<TrackedWorkout>,
    pushed: usize,
    error: Option<Error>,
}

/// Delete previously tracked entries; returns the ones that could not be deleted
async fn clear_tracked<P: PartnerPush + ?Sized>(
    partner: &P,
    user_id: &str,
    previous: Vec<TrackedWorkout>,
) -> Vec<TrackedWorkout> {
    let mut kept = Vec::new();
    for entry in previous {
        let schedule = match &entry.schedule_id {
            Some(schedule_id) => partner.delete_schedule(user_id, schedule_id).await,
            None => Ok(()),
        };
        let workout = partner.delete_workout(user_id, &entry.workout_id).await;
        if let Err(e) = schedule.as_ref().and(workout.as_ref()) {
            tracing::warn!(
                user_id,
                workout_id = %entry.workout_id,
                "Previous workout not deleted, retrying next push: {}",
                e
            );
            kept.push(entry);
        }
    }
    kept
}

async fn push_user<P, Z>(
    partner: &P,
    zones: &Z,
    user: &UserPlan,
    previous: Vec<TrackedWorkout>,
    active: bool,
    anchor: NaiveDate,
) -> UserOutcome
where
    P: PartnerPush + ?Sized,
    Z: ZoneProvider + ?Sized,
{
    let user_id = user.user_id.as_str();
    let mut outcome = UserOutcome {
        user_id: user.user_id.clone(),
        active,
        tracked: Vec::new(),
        pushed: 0,
        error: None,
    };

    let table = if active {
        match zones.zones_for(user_id).await {
            Ok(table) => Some(table),
            Err(e) => {
                outcome.tracked = previous;
                outcome.error = Some(e);
                return outcome;
            }
        }
    } else {
        None
    };

    outcome.tracked = clear_tracked(partner, user_id, previous).await;

    let Some(table) = table else {
        return outcome;
    };

    for (date, session) in planned_sessions(&user.plan, anchor) {
        let workout =
            to_device_format(session, &table).with_provider(partner.workout_provider());

        let workout_id = match partner.create_workout(user_id, &workout).await {
            Ok(id) => id,
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        };
        // A created workout is tracked even if scheduling it fails
        outcome.tracked.push(TrackedWorkout {
            workout_id: workout_id.clone(),
            schedule_id: None,
        });

        match partner.create_schedule(user_id, &workout_id, date).await {
            Ok(schedule_id) => {
                if let Some(entry) = outcome.tracked.last_mut() {
                    entry.schedule_id = Some(schedule_id);
                }
                outcome.pushed += 1;
            }
            Err(e) => {
                outcome.error = Some(e);
                break;
            }
        }
    }

    outcome
}

/// Push every plan to the partner and update the tracking ledger.
///
/// Users listed in `inactive_user_ids` only have their previous workouts
/// deleted. Per-user failures are collected in the report; the ledger keeps
/// whatever was actually created so the next run can clean it up.
pub async fn push_plans<P, Z>(
    partner: &P,
    zones: &Z,
    ledger: &mut TrackingLedger,
    plans: &[UserPlan],
    inactive_user_ids: &[String],
    timestamp: &str,
) -> Result<PushReport>
where
    P: PartnerPush + ?Sized,
    Z: ZoneProvider + ?Sized,
{
    let anchor = anchor_date(timestamp)?;
    let inactive: HashSet<&str> = inactive_user_ids.iter().map(String::as_str).collect();

    let jobs: Vec<(&UserPlan, Vec<TrackedWorkout>, bool)> = plans
        .iter()
        .map(|user| {
            let previous = ledger.tracked(&user.user_id).to_vec();
            let active = !inactive.contains(user.user_id.as_str());
            (user, previous, active)
        })
        .collect();

    let outcomes = stream::iter(jobs)
        .map(|(user, previous, active)| push_user(partner, zones, user, previous, active, anchor))
        .buffer_unordered(MAX_CONCURRENT_PUSHES)
        .collect::<Vec<_>>()
        .await;

    let mut report = PushReport::default();
    for outcome in outcomes {
        ledger.replace(&outcome.user_id, outcome.tracked);
        match outcome.error {
            Some(e) => {
                tracing::error!(user_id = %outcome.user_id, "Partner push failed: {}", e);
                report.failed.push(UserFailure::new(outcome.user_id, e));
            }
            None if outcome.active => report.pushed.push((outcome.user_id, outcome.pushed)),
            None => report.cleared.push(outcome.user_id),
        }
    }
    report.pushed.sort();
    report.cleared.sort();
    report.failed.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    tracing::info!(
        users = report.pushed.len(),
        workouts = report.workouts_pushed(),
        cleared = report.cleared.len(),
        failed = report.failed.len(),
        "Pushed training plans to partner"
    );
    Ok(report)
}
