//! Plan codec: seven-day plans to per-day JSON records and back.
//!
//! Encoding writes each day as an independent JSON text value plus the
//! anchor date of day1. Decoding flattens a record into a schedule keyed
//! `"<date>_<ordinal>"`, skipping days with nothing prescribed.

use crate::store::PlanStore;
use crate::types::{
    DayPlan, PersistedPlanRecord, RunningSession, ScheduledWorkout, TrainingPlan, UserFailure,
    UserPlan, UserSchedule, WorkoutSchedule, DAYS_PER_PLAN,
};
use crate::{Error, Result};
use chrono::{Days, NaiveDate};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

/// Default number of store writes in flight at once
pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 16;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of day1: the ISO date in the first ten characters of `timestamp`
pub fn anchor_date(timestamp: &str) -> Result<NaiveDate> {
    let prefix = timestamp
        .get(..10)
        .ok_or_else(|| Error::InvalidTimestamp(timestamp.to_string()))?;
    NaiveDate::parse_from_str(prefix, DATE_FORMAT)
        .map_err(|_| Error::InvalidTimestamp(timestamp.to_string()))
}

/// Schedule key for the `ordinal`-th entry on `date`
pub fn schedule_key(date: NaiveDate, ordinal: usize) -> String {
    format!("{}_{}", date.format(DATE_FORMAT), ordinal)
}

fn day_date(base: NaiveDate, day_index: usize) -> Option<NaiveDate> {
    base.checked_add_days(Days::new(day_index as u64))
}

/// Encode one user's plan as a full-overwrite store record
pub fn encode_plan(user_id: &str, plan: &TrainingPlan, timestamp: &str) -> Result<PersistedPlanRecord> {
    let date = anchor_date(timestamp)?;

    let mut record = PersistedPlanRecord {
        user_id: user_id.to_string(),
        updated_timestamp: timestamp.to_string(),
        date_day1: date.format(DATE_FORMAT).to_string(),
        ..Default::default()
    };
    for (i, day) in plan.days.iter().enumerate() {
        record.set_day(i + 1, serde_json::to_string(day)?);
    }

    Ok(record)
}

/// Decode a store record into a date-keyed schedule.
///
/// Entries per day: running sessions first, then one strength entry, then
/// one alternative entry, sharing one ordinal sequence.
pub fn decode_plan(record: &PersistedPlanRecord) -> Result<WorkoutSchedule> {
    let user_id = record.user_id.as_str();
    let base = NaiveDate::parse_from_str(&record.date_day1, DATE_FORMAT)
        .map_err(|e| Error::decode(user_id, "dateDay1", e))?;

    let mut schedule = WorkoutSchedule::new();
    for day in 1..=DAYS_PER_PLAN {
        let field = format!("day{}", day);
        let Some(text) = record.day(day) else {
            continue;
        };
        let plan: DayPlan =
            serde_json::from_str(text).map_err(|e| Error::decode(user_id, &field, e))?;
        if plan.is_empty() {
            continue;
        }

        let date = day_date(base, day - 1)
            .ok_or_else(|| Error::decode(user_id, &field, "date out of range"))?;

        let mut entries: Vec<ScheduledWorkout> = plan
            .running
            .sessions()
            .iter()
            .cloned()
            .map(ScheduledWorkout::Running)
            .collect();
        if plan.strength > 0.0 {
            entries.push(ScheduledWorkout::Strength(true));
        }
        if plan.alternative > 0.0 {
            entries.push(ScheduledWorkout::Alternative(true));
        }

        for (i, entry) in entries.into_iter().enumerate() {
            schedule.insert(schedule_key(date, i + 1), entry);
        }
    }

    Ok(schedule)
}

/// Running sessions of a built plan paired with their calendar dates
pub fn planned_sessions(plan: &TrainingPlan, anchor: NaiveDate) -> Vec<(NaiveDate, &RunningSession)> {
    plan.days
        .iter()
        .enumerate()
        .filter_map(|(i, day)| day_date(anchor, i).map(|date| (date, day)))
        .flat_map(|(date, day)| day.running.sessions().iter().map(move |s| (date, s)))
        .collect()
}

/// Outcome of a batch of store writes
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PersistReport {
    /// Users whose record was written
    pub written: Vec<String>,
    /// Users whose write failed
    pub failed: Vec<UserFailure>,
}

impl PersistReport {
    /// Returns true if every write succeeded.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns true if every write failed.
    pub fn is_complete_failure(&self) -> bool {
        self.written.is_empty() && !self.failed.is_empty()
    }

    /// Returns true if some writes succeeded and some failed.
    pub fn is_partial_failure(&self) -> bool {
        !self.written.is_empty() && !self.failed.is_empty()
    }
}

/// Encode and write every plan, at most `max_concurrent` writes at a time.
///
/// Fails up front only when the timestamp is unusable. A failed write is
/// recorded for its user and does not affect the others.
pub async fn persist_plans<S: PlanStore + ?Sized>(
    store: &S,
    plans: &[UserPlan],
    timestamp: &str,
    max_concurrent: usize,
) -> Result<PersistReport> {
    let records = plans
        .iter()
        .map(|p| encode_plan(&p.user_id, &p.plan, timestamp))
        .collect::<Result<Vec<_>>>()?;

    let results = stream::iter(records)
        .map(|record| async move {
            let user_id = record.user_id.clone();
            (user_id, store.put(record).await)
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut report = PersistReport::default();
    for (user_id, result) in results {
        match result {
            Ok(()) => report.written.push(user_id),
            Err(e) => {
                tracing::error!(user_id = %user_id, "Failed to persist plan: {}", e);
                report.failed.push(UserFailure::new(user_id, e));
            }
        }
    }
    report.written.sort();
    report.failed.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    tracing::info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "Persisted training plans"
    );
    Ok(report)
}

/// Decoded schedules for a batch of users
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FetchReport {
    pub schedules: Vec<UserSchedule>,
    /// Users whose stored record could not be read or decoded
    pub failed: Vec<UserFailure>,
}

/// Fetch records for `user_ids` in one batch and decode each independently.
///
/// Users without a stored record are absent from the report. Records the
/// store could not read are reported as failures alongside decode failures.
pub async fn fetch_schedules<S: PlanStore + ?Sized>(
    store: &S,
    user_ids: &[String],
) -> Result<FetchReport> {
    let output = store.get(user_ids).await?;

    let mut report = FetchReport {
        failed: output.unprocessed,
        ..Default::default()
    };
    for record in &output.records {
        match decode_plan(record) {
            Ok(schedule) => report.schedules.push(UserSchedule {
                user_id: record.user_id.clone(),
                schedule,
            }),
            Err(e) => {
                tracing::warn!(user_id = %record.user_id, "Stored plan is unusable: {}", e);
                report.failed.push(UserFailure::new(record.user_id.clone(), e));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_plan, build_plans};
    use crate::catalog::build_default_catalog;
    use crate::store::{BatchGetOutput, MemoryPlanStore};
    use crate::types::{LoadTarget, LoadTargets, RunningPlan, Segment, WeeklyLoadTargets, Zone};
    use async_trait::async_trait;

    const TIMESTAMP: &str = "2024-01-30-06-15-00";

    fn week() -> WeeklyLoadTargets {
        WeeklyLoadTargets {
            day1: LoadTarget {
                km_total: 5.0,
                km_z5: 1.0,
                ..Default::default()
            },
            day3: LoadTarget {
                km_total: 8.0,
                km_z3_z4: 2.0,
                number_strength_sessions: 1.0,
                ..Default::default()
            },
            day5: LoadTarget {
                hours_alternative: 1.5,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn plan() -> TrainingPlan {
        build_plan(&build_default_catalog(), &week())
    }

    #[test]
    fn test_anchor_date() {
        assert_eq!(
            anchor_date(TIMESTAMP).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
        );
        assert!(matches!(anchor_date("2024-01"), Err(Error::InvalidTimestamp(_))));
        assert!(matches!(
            anchor_date("yesterday-morning"),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_encode_record_layout() {
        let record = encode_plan("alice", &plan(), TIMESTAMP).unwrap();

        assert_eq!(record.user_id, "alice");
        assert_eq!(record.updated_timestamp, TIMESTAMP);
        assert_eq!(record.date_day1, "2024-01-30");
        assert_eq!(record.day(2), Some(r#"{"running":0}"#));
        assert!(record.day(1).unwrap().starts_with(r#"{"running":{"session_1":"#));
        assert_eq!(record.day(5), Some(r#"{"running":0,"alternative":1.5}"#));
        assert!((1..=DAYS_PER_PLAN).all(|d| record.day(d).is_some()));
    }

    #[test]
    fn test_round_trip_across_month_end() {
        let plan = plan();
        let record = encode_plan("alice", &plan, TIMESTAMP).unwrap();
        let schedule = decode_plan(&record).unwrap();

        let keys: Vec<&str> = schedule.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["2024-01-30_1", "2024-02-01_1", "2024-02-01_2", "2024-02-03_1"]
        );

        let RunningPlan::Sessions(day1) = &plan.days[0].running else {
            panic!("day1 should have a session");
        };
        assert_eq!(
            schedule["2024-01-30_1"],
            ScheduledWorkout::Running(day1[0].clone())
        );
        assert_eq!(schedule["2024-02-01_2"], ScheduledWorkout::Strength(true));
        assert_eq!(schedule["2024-02-03_1"], ScheduledWorkout::Alternative(true));
    }

    #[test]
    fn test_several_sessions_numbered_before_strength_and_alternative() {
        let record = PersistedPlanRecord {
            user_id: "carol".into(),
            day1: Some(
                r#"{"running":{"session_2":{"warmup":{"Z2":2.0}},"session_1":{"warmup":{"Z2":1.5},"cooldown":{"Z2":1.0}}},"strength":1,"alternative":0.5}"#
                    .into(),
            ),
            date_day1: "2024-05-06".into(),
            ..Default::default()
        };
        let schedule = decode_plan(&record).unwrap();

        let keys: Vec<&str> = schedule.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["2024-05-06_1", "2024-05-06_2", "2024-05-06_3", "2024-05-06_4"]
        );
        match (&schedule["2024-05-06_1"], &schedule["2024-05-06_2"]) {
            (ScheduledWorkout::Running(first), ScheduledWorkout::Running(second)) => {
                assert_eq!(first.cooldown, Some(Segment::new(Zone::Z2, 1.0)));
                assert_eq!(second.warmup, Some(Segment::new(Zone::Z2, 2.0)));
            }
            other => panic!("Expected two running entries, got {:?}", other),
        }
        assert_eq!(schedule["2024-05-06_3"], ScheduledWorkout::Strength(true));
        assert_eq!(schedule["2024-05-06_4"], ScheduledWorkout::Alternative(true));
    }

    #[test]
    fn test_planned_sessions_dates() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let plan = plan();
        let sessions = planned_sessions(&plan, anchor);
        let dates: Vec<String> = sessions.iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-30", "2024-02-01"]);
    }

    #[test]
    fn test_inactive_user_decodes_to_empty_schedule() {
        let plans = build_plans(&build_default_catalog(), &LoadTargets::new(), &["idle".into()]);
        let record = encode_plan("idle", &plans[0].plan, TIMESTAMP).unwrap();
        assert!(decode_plan(&record).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_day_is_a_decode_failure() {
        let mut record = encode_plan("alice", &plan(), TIMESTAMP).unwrap();
        record.set_day(4, "{not json".into());

        match decode_plan(&record) {
            Err(Error::Decode { user_id, field, .. }) => {
                assert_eq!(user_id, "alice");
                assert_eq!(field, "day4");
            }
            other => panic!("Expected decode failure, got {:?}", other),
        }
    }

    #[test]
    fn test_nonzero_sentinel_and_bad_anchor_rejected() {
        let mut record = encode_plan("alice", &plan(), TIMESTAMP).unwrap();
        record.set_day(2, r#"{"running":3}"#.into());
        assert!(matches!(decode_plan(&record), Err(Error::Decode { .. })));

        let mut record = encode_plan("alice", &plan(), TIMESTAMP).unwrap();
        record.date_day1 = "30/01/2024".into();
        assert!(matches!(
            decode_plan(&record),
            Err(Error::Decode { ref field, .. }) if field == "dateDay1"
        ));
    }

    #[test]
    fn test_missing_day_fields_are_skipped() {
        let record = PersistedPlanRecord {
            user_id: "bob".into(),
            day3: Some(r#"{"running":0,"strength":2}"#.into()),
            date_day1: "2024-12-30".into(),
            ..Default::default()
        };
        let schedule = decode_plan(&record).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule["2025-01-01_1"], ScheduledWorkout::Strength(true));
    }

    /// Store that rejects writes for one user
    struct FlakyStore {
        inner: MemoryPlanStore,
        reject: String,
    }

    #[async_trait]
    impl PlanStore for FlakyStore {
        async fn get(&self, user_ids: &[String]) -> Result<BatchGetOutput> {
            self.inner.get(user_ids).await
        }

        async fn put(&self, record: PersistedPlanRecord) -> Result<()> {
            if record.user_id == self.reject {
                return Err(Error::persistence(&record.user_id, "write rejected"));
            }
            self.inner.put(record).await
        }
    }

    fn user_plans(ids: &[&str]) -> Vec<UserPlan> {
        ids.iter()
            .map(|id| UserPlan {
                user_id: id.to_string(),
                plan: plan(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_persist_and_fetch() {
        let store = MemoryPlanStore::new();
        let report = persist_plans(&store, &user_plans(&["b", "a"]), TIMESTAMP, 4)
            .await
            .unwrap();
        assert!(report.is_complete_success());
        assert_eq!(report.written, vec!["a", "b"]);

        let ids = vec!["a".to_string(), "ghost".to_string()];
        let fetched = fetch_schedules(&store, &ids).await.unwrap();
        assert_eq!(fetched.schedules.len(), 1);
        assert_eq!(fetched.schedules[0].user_id, "a");
        assert_eq!(fetched.schedules[0].schedule.len(), 4);
        assert!(fetched.failed.is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_write_does_not_block_others() {
        let store = FlakyStore {
            inner: MemoryPlanStore::new(),
            reject: "b".into(),
        };
        let report = persist_plans(&store, &user_plans(&["a", "b", "c"]), TIMESTAMP, 2)
            .await
            .unwrap();

        assert!(report.is_partial_failure());
        assert_eq!(report.written, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].user_id, "b");
        assert_eq!(store.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_bad_timestamp_writes_nothing() {
        let store = MemoryPlanStore::new();
        let result = persist_plans(&store, &user_plans(&["a"]), "soon", 4).await;
        assert!(matches!(result, Err(Error::InvalidTimestamp(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_reports_corrupt_record_per_user() {
        let store = MemoryPlanStore::new();
        persist_plans(&store, &user_plans(&["a", "b"]), TIMESTAMP, 4)
            .await
            .unwrap();
        let mut broken = encode_plan("b", &plan(), TIMESTAMP).unwrap();
        broken.set_day(1, "[".into());
        store.put(broken).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string()];
        let fetched = fetch_schedules(&store, &ids).await.unwrap();
        assert_eq!(fetched.schedules.len(), 1);
        assert_eq!(fetched.failed.len(), 1);
        assert_eq!(fetched.failed[0].user_id, "b");
    }
}
