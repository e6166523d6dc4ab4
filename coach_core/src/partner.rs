//! Partner device platform: workout and schedule create/delete.
//!
//! `OutboxPartner` stands in for the network client. It writes every payload
//! it would send under an outbox directory and hands out UUID identifiers,
//! so a separate uploader (or a person) can replay them.

use crate::device::{DeviceWorkout, DEFAULT_WORKOUT_PROVIDER};
use crate::store::write_json_atomic;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Create/delete protocol of the partner platform
#[async_trait]
pub trait PartnerPush: Send + Sync {
    /// Provider name stamped on every workout
    fn workout_provider(&self) -> &str {
        DEFAULT_WORKOUT_PROVIDER
    }

    /// Upload a workout, returning the partner's workout id
    async fn create_workout(&self, user_id: &str, workout: &DeviceWorkout) -> Result<String>;

    /// Place an uploaded workout on the user's calendar, returning the schedule id
    async fn create_schedule(&self, user_id: &str, workout_id: &str, date: NaiveDate)
        -> Result<String>;

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<()>;

    async fn delete_schedule(&self, user_id: &str, schedule_id: &str) -> Result<()>;
}

/// Schedule payload: which workout goes on which date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePayload {
    pub workout_id: String,
    pub date: NaiveDate,
}

/// Partner that writes payloads to `<dir>/<user>/{workouts,schedules}/<id>.json`
#[derive(Clone, Debug)]
pub struct OutboxPartner {
    dir: PathBuf,
    provider: String,
}

impl OutboxPartner {
    pub fn new(dir: impl Into<PathBuf>, provider: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            provider: provider.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn workout_path(&self, user_id: &str, workout_id: &str) -> Result<PathBuf> {
        self.payload_path(user_id, "workouts", workout_id)
    }

    pub fn schedule_path(&self, user_id: &str, schedule_id: &str) -> Result<PathBuf> {
        self.payload_path(user_id, "schedules", schedule_id)
    }

    fn payload_path(&self, user_id: &str, kind: &str, id: &str) -> Result<PathBuf> {
        for part in [user_id, id] {
            if part.is_empty()
                || part == "."
                || part == ".."
                || part.contains(|c| c == '/' || c == '\\')
            {
                return Err(Error::Partner(format!("unusable path component '{}'", part)));
            }
        }
        Ok(self.dir.join(user_id).join(kind).join(format!("{}.json", id)))
    }

    async fn write<T>(&self, path: PathBuf, payload: T) -> Result<()>
    where
        T: Serialize + Send + 'static,
    {
        tokio::task::spawn_blocking(move || write_json_atomic(&path, &payload))
            .await
            .map_err(|e| Error::Partner(format!("outbox task failed: {}", e)))?
    }

    async fn remove(&self, path: PathBuf) -> Result<()> {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Outbox entry {:?} already gone", path);
                Ok(())
            }
            Err(e) => Err(Error::Partner(format!("failed to delete {:?}: {}", path, e))),
        }
    }
}

#[async_trait]
impl PartnerPush for OutboxPartner {
    fn workout_provider(&self) -> &str {
        &self.provider
    }

    async fn create_workout(&self, user_id: &str, workout: &DeviceWorkout) -> Result<String> {
        let workout_id = Uuid::new_v4().to_string();
        let path = self.workout_path(user_id, &workout_id)?;
        self.write(path, workout.clone()).await?;
        tracing::debug!(user_id, workout_id = %workout_id, "Created workout");
        Ok(workout_id)
    }

    async fn create_schedule(
        &self,
        user_id: &str,
        workout_id: &str,
        date: NaiveDate,
    ) -> Result<String> {
        let schedule_id = Uuid::new_v4().to_string();
        let path = self.schedule_path(user_id, &schedule_id)?;
        let payload = SchedulePayload {
            workout_id: workout_id.to_string(),
            date,
        };
        self.write(path, payload).await?;
        tracing::debug!(user_id, schedule_id = %schedule_id, %date, "Created schedule");
        Ok(schedule_id)
    }

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<()> {
        self.remove(self.workout_path(user_id, workout_id)?).await
    }

    async fn delete_schedule(&self, user_id: &str, schedule_id: &str) -> Result<()> {
        self.remove(self.schedule_path(user_id, schedule_id)?).await
    }
}
