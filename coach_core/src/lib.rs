#![forbid(unsafe_code)]

//! Core domain model and business logic for the Coach training-plan pipeline.
//!
//! This crate provides:
//! - Domain types (zones, segments, sessions, day and training plans)
//! - Interval catalog and workout builder
//! - Plan codec (per-day persisted records and decoded schedules)
//! - Device format adapter and partner push
//! - Persistence (plan store, tracking ledger), configuration, logging

pub mod types;
pub mod error;
pub mod catalog;
pub mod builder;
pub mod codec;
pub mod device;
pub mod zones;
pub mod store;
pub mod partner;
pub mod tracking;
pub mod push;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, IntervalCatalog};
pub use builder::{build_plan, build_plans};
pub use codec::{decode_plan, encode_plan, fetch_schedules, persist_plans, FetchReport, PersistReport};
pub use device::{to_device_format, DeviceWorkout};
pub use zones::{HeartRateZones, JsonZoneProvider, ZoneProvider};
pub use store::{JsonFilePlanStore, MemoryPlanStore, PlanStore};
pub use partner::{OutboxPartner, PartnerPush};
pub use tracking::TrackingLedger;
pub use push::{push_plans, PushReport};
pub use config::Config;
