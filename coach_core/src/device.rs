//! Conversion of a running session into the partner device's step format.
//!
//! Steps are numbered by one counter: warmup first, then the repeat wrapper
//! (in the slot right after warmup) holding one leaf step per interval
//! segment, then cooldown.

use crate::types::{RunningSession, Segment};
use crate::zones::HeartRateZones;
use serde::{Deserialize, Serialize};

pub const WORKOUT_NAME: &str = "Run";
pub const WORKOUT_DESCRIPTION: &str =
    "This is an interval session with short and intense 1 km intervals.";
pub const DEFAULT_WORKOUT_PROVIDER: &str = "Blaze";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sport {
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepIntensity {
    Warmup,
    Cooldown,
    Interval,
    Recovery,
}

impl StepIntensity {
    fn phase_description(self) -> &'static str {
        match self {
            StepIntensity::Warmup => "WARMUP phase",
            StepIntensity::Cooldown => "COOLDOWN phase",
            StepIntensity::Interval | StepIntensity::Recovery => "Interval phase",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurationType {
    Distance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurationValueType {
    Meter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    HeartRate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatType {
    RepeatUntilStepsCmplt,
}

/// A single distance step with a heart-rate target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStep {
    pub step_order: u32,
    pub intensity: StepIntensity,
    pub description: String,
    pub duration_type: DurationType,
    pub duration_value: f64,
    pub duration_value_type: DurationValueType,
    pub target_type: TargetType,
    pub target_value_low: u32,
    pub target_value_high: u32,
}

/// A block of leaf steps run once to completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRepeatStep {
    pub repeat_type: RepeatType,
    pub repeat_value: u32,
    pub step_order: u32,
    pub steps: Vec<DeviceStep>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceStep {
    #[serde(rename = "WorkoutStep")]
    Step(WorkoutStep),
    #[serde(rename = "WorkoutRepeatStep")]
    Repeat(WorkoutRepeatStep),
}

impl DeviceStep {
    pub fn step_order(&self) -> u32 {
        match self {
            DeviceStep::Step(step) => step.step_order,
            DeviceStep::Repeat(repeat) => repeat.step_order,
        }
    }

    pub fn as_leaf(&self) -> Option<&WorkoutStep> {
        match self {
            DeviceStep::Step(step) => Some(step),
            DeviceStep::Repeat(_) => None,
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a WorkoutStep>) {
        match self {
            DeviceStep::Step(step) => out.push(step),
            DeviceStep::Repeat(repeat) => {
                for step in &repeat.steps {
                    step.collect_leaves(out);
                }
            }
        }
    }
}

/// Workout payload accepted by the partner platform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceWorkout {
    pub workout_name: String,
    pub description: String,
    pub sport: Sport,
    pub estimated_distance_in_meters: f64,
    pub workout_provider: String,
    pub steps: Vec<DeviceStep>,
}

impl DeviceWorkout {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.workout_provider = provider.into();
        self
    }

    /// Every leaf step in execution order, flattening repeat blocks
    pub fn leaf_steps(&self) -> Vec<&WorkoutStep> {
        let mut leaves = Vec::new();
        for step in &self.steps {
            step.collect_leaves(&mut leaves);
        }
        leaves
    }
}

/// km to meters, rounded to the millimeter to drop float noise from km sums
fn km_to_meters(km: f64) -> f64 {
    (km * 1_000_000.0).round() / 1000.0
}

fn leaf_step(
    segment: Segment,
    zones: &HeartRateZones,
    phase: Option<StepIntensity>,
    step_order: u32,
) -> WorkoutStep {
    let band = zones.bounds(segment.zone);
    let intensity = phase.unwrap_or(if segment.zone.is_easy() {
        StepIntensity::Recovery
    } else {
        StepIntensity::Interval
    });

    WorkoutStep {
        step_order,
        intensity,
        description: intensity.phase_description().to_string(),
        duration_type: DurationType::Distance,
        duration_value: km_to_meters(segment.distance_km),
        duration_value_type: DurationValueType::Meter,
        target_type: TargetType::HeartRate,
        target_value_low: band.lower,
        target_value_high: band.upper,
    }
}

/// Render one session as a device workout with zone-bound heart-rate targets
pub fn to_device_format(session: &RunningSession, zones: &HeartRateZones) -> DeviceWorkout {
    let mut steps = Vec::new();
    let mut step_order: u32 = 1;
    let mut repeat_slot = None;

    if let Some(warmup) = session.warmup {
        steps.push(DeviceStep::Step(leaf_step(
            warmup,
            zones,
            Some(StepIntensity::Warmup),
            step_order,
        )));
        repeat_slot = Some(step_order + 1);
        step_order += 2;
    }

    let intervals = session.intervals();
    if !intervals.is_empty() {
        let repeat_order = repeat_slot.unwrap_or_else(|| {
            step_order += 1;
            step_order - 1
        });

        let mut leaves = Vec::with_capacity(intervals.len() * 2);
        for segment in intervals.iter().flat_map(|pair| pair.segments()) {
            leaves.push(DeviceStep::Step(leaf_step(segment, zones, None, step_order)));
            step_order += 1;
        }

        steps.push(DeviceStep::Repeat(WorkoutRepeatStep {
            repeat_type: RepeatType::RepeatUntilStepsCmplt,
            repeat_value: 1,
            step_order: repeat_order,
            steps: leaves,
        }));
    }

    if let Some(cooldown) = session.cooldown {
        steps.push(DeviceStep::Step(leaf_step(
            cooldown,
            zones,
            Some(StepIntensity::Cooldown),
            step_order,
        )));
    }

    DeviceWorkout {
        workout_name: WORKOUT_NAME.to_string(),
        description: WORKOUT_DESCRIPTION.to_string(),
        sport: Sport::Running,
        estimated_distance_in_meters: km_to_meters(session.total_km()),
        workout_provider: DEFAULT_WORKOUT_PROVIDER.to_string(),
        steps,
    }
}
