//! Core domain types for the training-plan pipeline.
//!
//! This module defines the fundamental types used throughout the system:
//! - Heart-rate zones and distance segments
//! - Interval pairs, main sets and running sessions
//! - Day plans and seven-day training plans
//! - Load targets produced by the external inference service
//! - The persisted per-day record and the decoded workout schedule

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of relative days covered by one training plan
pub const DAYS_PER_PLAN: usize = 7;

// ============================================================================
// Zones and Segments
// ============================================================================

/// One of the five ordered heart-rate intensity bands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    Z1,
    Z2,
    Z3,
    Z4,
    Z5,
}

impl Zone {
    pub const ALL: [Zone; 5] = [Zone::Z1, Zone::Z2, Zone::Z3, Zone::Z4, Zone::Z5];

    /// Zero-based position of the zone in [`Zone::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Zone::Z1 => "Z1",
            Zone::Z2 => "Z2",
            Zone::Z3 => "Z3",
            Zone::Z4 => "Z4",
            Zone::Z5 => "Z5",
        }
    }

    /// Z1 and Z2 are recovery-intensity bands
    pub fn is_easy(self) -> bool {
        matches!(self, Zone::Z1 | Zone::Z2)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Z1" => Ok(Zone::Z1),
            "Z2" => Ok(Zone::Z2),
            "Z3" => Ok(Zone::Z3),
            "Z4" => Ok(Zone::Z4),
            "Z5" => Ok(Zone::Z5),
            other => Err(format!("unknown zone label '{}'", other)),
        }
    }
}

/// A distance to be covered inside one zone; the atomic unit of a session.
///
/// Serialized as a single-entry object, e.g. `{"Z2":1.5}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub zone: Zone,
    pub distance_km: f64,
}

impl Segment {
    pub fn new(zone: Zone, distance_km: f64) -> Self {
        Self { zone, distance_km }
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.zone.label(), &self.distance_km)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = BTreeMap::<String, f64>::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(de::Error::custom(format!(
                "segment must hold exactly one zone entry, found {}",
                entries.len()
            )));
        }
        let (label, distance_km) = entries
            .into_iter()
            .next()
            .ok_or_else(|| de::Error::custom("empty segment"))?;
        let zone = label.parse::<Zone>().map_err(de::Error::custom)?;
        if !distance_km.is_finite() || distance_km <= 0.0 {
            return Err(de::Error::custom(format!(
                "segment distance must be positive, got {}",
                distance_km
            )));
        }
        Ok(Segment { zone, distance_km })
    }
}

/// Effort segment immediately followed by its recovery segment.
///
/// Serialized as the two-element list `[effort, recovery]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalPair {
    pub effort: Segment,
    pub recovery: Segment,
}

impl IntervalPair {
    pub fn distance_km(&self) -> f64 {
        self.effort.distance_km + self.recovery.distance_km
    }

    pub fn segments(&self) -> [Segment; 2] {
        [self.effort, self.recovery]
    }
}

impl Serialize for IntervalPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.effort, self.recovery].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IntervalPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let segments = Vec::<Segment>::deserialize(deserializer)?;
        match segments.as_slice() {
            [effort, recovery] => Ok(IntervalPair {
                effort: *effort,
                recovery: *recovery,
            }),
            other => Err(de::Error::custom(format!(
                "interval must hold an effort and a recovery segment, found {} segments",
                other.len()
            ))),
        }
    }
}

// ============================================================================
// Numbered maps (interval_N, session_N)
// ============================================================================

fn serialize_numbered<S, T>(
    serializer: S,
    prefix: &str,
    items: &[T],
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut map = serializer.serialize_map(Some(items.len()))?;
    for (i, item) in items.iter().enumerate() {
        map.serialize_entry(&format!("{}_{}", prefix, i + 1), item)?;
    }
    map.end()
}

/// Reads `<prefix>_<n>` entries and returns the values ordered by `n`.
///
/// Numbers must run contiguously from 1.
fn deserialize_numbered<'de, A, T>(
    mut map: A,
    prefix: &'static str,
) -> std::result::Result<Vec<T>, A::Error>
where
    A: MapAccess<'de>,
    T: Deserialize<'de>,
{
    let mut entries: Vec<(usize, T)> = Vec::new();
    while let Some((key, value)) = map.next_entry::<String, T>()? {
        let number = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| {
                de::Error::custom(format!("unexpected key '{}', expected {}_<n>", key, prefix))
            })?;
        entries.push((number, value));
    }
    entries.sort_by_key(|(number, _)| *number);
    for (expected, (number, _)) in entries.iter().enumerate() {
        if *number != expected + 1 {
            return Err(de::Error::custom(format!(
                "{} numbering is not contiguous at {}_{}",
                prefix, prefix, number
            )));
        }
    }
    Ok(entries.into_iter().map(|(_, value)| value).collect())
}

/// Ordered main-set intervals, keyed `interval_1..interval_n` on the wire
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MainSet {
    pub intervals: Vec<IntervalPair>,
}

impl MainSet {
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn distance_km(&self) -> f64 {
        self.intervals.iter().map(IntervalPair::distance_km).sum()
    }
}

impl From<Vec<IntervalPair>> for MainSet {
    fn from(intervals: Vec<IntervalPair>) -> Self {
        Self { intervals }
    }
}

impl Serialize for MainSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_numbered(serializer, "interval", &self.intervals)
    }
}

impl<'de> Deserialize<'de> for MainSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MainSetVisitor;

        impl<'de> Visitor<'de> for MainSetVisitor {
            type Value = MainSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of interval_<n> entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<MainSet, A::Error> {
                deserialize_numbered(map, "interval").map(MainSet::from)
            }
        }

        deserializer.deserialize_map(MainSetVisitor)
    }
}

// ============================================================================
// Sessions and Plans
// ============================================================================

/// One structured running session: warmup, main set, cooldown
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<MainSet>,
}

impl RunningSession {
    /// Sum of every segment distance in the session
    pub fn total_km(&self) -> f64 {
        let warmup = self.warmup.map_or(0.0, |s| s.distance_km);
        let cooldown = self.cooldown.map_or(0.0, |s| s.distance_km);
        let main = self.main.as_ref().map_or(0.0, MainSet::distance_km);
        warmup + main + cooldown
    }

    /// Main-set intervals in chronological order (empty when there is no main set)
    pub fn intervals(&self) -> &[IntervalPair] {
        self.main
            .as_ref()
            .map(|m| m.intervals.as_slice())
            .unwrap_or(&[])
    }
}

/// The `running` value of a day: the sentinel `0` or numbered sub-sessions
#[derive(Clone, Debug, PartialEq)]
pub enum RunningPlan {
    /// Sentinel `0`: no running session today
    Rest,
    /// Sub-sessions keyed `session_1..session_n` on the wire
    Sessions(Vec<RunningSession>),
}

impl RunningPlan {
    pub fn is_rest(&self) -> bool {
        matches!(self, RunningPlan::Rest)
    }

    pub fn sessions(&self) -> &[RunningSession] {
        match self {
            RunningPlan::Rest => &[],
            RunningPlan::Sessions(sessions) => sessions,
        }
    }
}

impl Serialize for RunningPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RunningPlan::Rest => serializer.serialize_u8(0),
            RunningPlan::Sessions(sessions) => serialize_numbered(serializer, "session", sessions),
        }
    }
}

impl<'de> Deserialize<'de> for RunningPlan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RunningPlanVisitor;

        impl<'de> Visitor<'de> for RunningPlanVisitor {
            type Value = RunningPlan;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("the sentinel 0 or a map of session_<n> entries")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RunningPlan, E> {
                if v == 0 {
                    Ok(RunningPlan::Rest)
                } else {
                    Err(E::custom(format!("running sentinel must be 0, got {}", v)))
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RunningPlan, E> {
                if v == 0 {
                    Ok(RunningPlan::Rest)
                } else {
                    Err(E::custom(format!("running sentinel must be 0, got {}", v)))
                }
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<RunningPlan, E> {
                if v == 0.0 {
                    Ok(RunningPlan::Rest)
                } else {
                    Err(E::custom(format!("running sentinel must be 0, got {}", v)))
                }
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                map: A,
            ) -> std::result::Result<RunningPlan, A::Error> {
                deserialize_numbered(map, "session").map(RunningPlan::Sessions)
            }
        }

        deserializer.deserialize_any(RunningPlanVisitor)
    }
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// Plan for one calendar day
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub running: RunningPlan,
    /// Number of strength sessions prescribed for the day
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub strength: f64,
    /// Hours of alternative (non-running) training
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub alternative: f64,
}

impl DayPlan {
    /// A day with nothing prescribed
    pub fn rest() -> Self {
        Self {
            running: RunningPlan::Rest,
            strength: 0.0,
            alternative: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_rest() && self.strength == 0.0 && self.alternative == 0.0
    }
}

/// One user's seven-day plan; `days[0]` is day1 (the anchor date)
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingPlan {
    pub days: [DayPlan; DAYS_PER_PLAN],
}

impl TrainingPlan {
    /// All-rest plan used for inactive users
    pub fn empty() -> Self {
        Self {
            days: std::array::from_fn(|_| DayPlan::rest()),
        }
    }
}

/// A training plan paired with the user it belongs to
#[derive(Clone, Debug, PartialEq)]
pub struct UserPlan {
    pub user_id: String,
    pub plan: TrainingPlan,
}

// ============================================================================
// Load Targets
// ============================================================================

/// Accepts numbers, numeric strings and null; anything unusable becomes zero.
fn lenient_non_negative<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Raw::Other(_) => 0.0,
    };
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Ok(0.0)
    }
}

/// Prescribed load for one user on one relative day
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadTarget {
    #[serde(deserialize_with = "lenient_non_negative")]
    pub number_sessions: f64,
    #[serde(deserialize_with = "lenient_non_negative")]
    pub km_total: f64,
    #[serde(rename = "kmZ3Z4", deserialize_with = "lenient_non_negative")]
    pub km_z3_z4: f64,
    #[serde(rename = "kmZ5", deserialize_with = "lenient_non_negative")]
    pub km_z5: f64,
    #[serde(deserialize_with = "lenient_non_negative")]
    pub km_sprint: f64,
    #[serde(deserialize_with = "lenient_non_negative")]
    pub number_strength_sessions: f64,
    #[serde(deserialize_with = "lenient_non_negative")]
    pub hours_alternative: f64,
}

/// Load targets for relative days 1..7; missing days count as zero load
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyLoadTargets {
    pub day1: LoadTarget,
    pub day2: LoadTarget,
    pub day3: LoadTarget,
    pub day4: LoadTarget,
    pub day5: LoadTarget,
    pub day6: LoadTarget,
    pub day7: LoadTarget,
}

impl WeeklyLoadTargets {
    pub fn days(&self) -> [&LoadTarget; DAYS_PER_PLAN] {
        [
            &self.day1, &self.day2, &self.day3, &self.day4, &self.day5, &self.day6, &self.day7,
        ]
    }
}

/// Output of the load-target inference service, keyed by user id
pub type LoadTargets = BTreeMap<String, WeeklyLoadTargets>;

// ============================================================================
// Persisted and Decoded Forms
// ============================================================================

/// Per-user storage record: one JSON text value per day plus anchor metadata
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPlanRecord {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day6: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day7: Option<String>,
    #[serde(default)]
    pub updated_timestamp: String,
    pub date_day1: String,
}

impl PersistedPlanRecord {
    /// JSON text of relative day `day` (1-based)
    pub fn day(&self, day: usize) -> Option<&str> {
        let field = match day {
            1 => &self.day1,
            2 => &self.day2,
            3 => &self.day3,
            4 => &self.day4,
            5 => &self.day5,
            6 => &self.day6,
            7 => &self.day7,
            _ => return None,
        };
        field.as_deref()
    }

    pub fn set_day(&mut self, day: usize, json: String) {
        let field = match day {
            1 => &mut self.day1,
            2 => &mut self.day2,
            3 => &mut self.day3,
            4 => &mut self.day4,
            5 => &mut self.day5,
            6 => &mut self.day6,
            7 => &mut self.day7,
            _ => return,
        };
        *field = Some(json);
    }
}

/// One entry of a decoded schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "workout", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledWorkout {
    Running(RunningSession),
    Strength(bool),
    Alternative(bool),
}

/// Decoded schedule keyed `"<ISO date>_<ordinal>"`
pub type WorkoutSchedule = BTreeMap<String, ScheduledWorkout>;

/// A user's decoded schedule, as returned to callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSchedule {
    pub user_id: String,
    #[serde(rename = "workoutPlan")]
    pub schedule: WorkoutSchedule,
}

/// A per-user failure inside a batch operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFailure {
    pub user_id: String,
    pub message: String,
}

impl UserFailure {
    pub fn new(user_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            user_id: user_id.into(),
            message: error.to_string(),
        }
    }
}
