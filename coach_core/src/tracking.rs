//! Ledger of workouts and schedules pushed to the partner per user.
//!
//! The next push deletes everything tracked here before creating the new
//! week, so each user only ever has one week of pushed workouts.

use crate::store::{read_json_locked, write_json_atomic};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Partner ids of one pushed workout and its calendar entry.
///
/// `schedule_id` is absent when the workout was created but scheduling it
/// failed; the workout is still deleted on the next push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedWorkout {
    pub workout_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingLedger {
    #[serde(default)]
    users: BTreeMap<String, Vec<TrackedWorkout>>,
}

impl TrackingLedger {
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("tracked_workouts.json")
    }

    /// Load the ledger with a shared lock
    ///
    /// Returns an empty ledger if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        match read_json_locked::<TrackingLedger>(path) {
            Ok(Some(ledger)) => Ok(ledger),
            Ok(None) => {
                tracing::info!("No tracking ledger found, starting empty");
                Ok(Self::default())
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read tracking ledger {:?}: {}. Previously pushed workouts will not be cleaned up.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save atomically (temp file, sync, rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn tracked(&self, user_id: &str) -> &[TrackedWorkout] {
        self.users.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace everything tracked for `user_id`
    pub fn replace(&mut self, user_id: &str, workouts: Vec<TrackedWorkout>) {
        if workouts.is_empty() {
            self.users.remove(user_id);
        } else {
            self.users.insert(user_id.to_string(), workouts);
        }
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}
