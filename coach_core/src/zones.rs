//! Heart-rate zone tables and the provider that supplies them per user.
//!
//! Tables travel as a flat object `zone1Lower, zone1Upper, ..., zone5Upper`.
//! A table with any bound missing is rejected when it is parsed, so lookups
//! by zone afterwards cannot miss.

use crate::types::Zone;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Lower/upper heart-rate bound of one zone, in beats per minute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneBand {
    pub lower: u32,
    pub upper: u32,
}

/// Five-band heart-rate boundary table for one user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHeartRateZones", into = "RawHeartRateZones")]
pub struct HeartRateZones {
    bands: [ZoneBand; 5],
}

/// Wire form of [`HeartRateZones`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHeartRateZones {
    pub zone1_lower: Option<u32>,
    pub zone1_upper: Option<u32>,
    pub zone2_lower: Option<u32>,
    pub zone2_upper: Option<u32>,
    pub zone3_lower: Option<u32>,
    pub zone3_upper: Option<u32>,
    pub zone4_lower: Option<u32>,
    pub zone4_upper: Option<u32>,
    pub zone5_lower: Option<u32>,
    pub zone5_upper: Option<u32>,
}

impl TryFrom<RawHeartRateZones> for HeartRateZones {
    type Error = Error;

    fn try_from(raw: RawHeartRateZones) -> Result<Self> {
        fn band(lower: Option<u32>, upper: Option<u32>, zone: usize) -> Result<ZoneBand> {
            let lower = lower
                .ok_or_else(|| Error::ZoneLookupMiss(format!("zone{}Lower is missing", zone)))?;
            let upper = upper
                .ok_or_else(|| Error::ZoneLookupMiss(format!("zone{}Upper is missing", zone)))?;
            Ok(ZoneBand { lower, upper })
        }

        Ok(Self {
            bands: [
                band(raw.zone1_lower, raw.zone1_upper, 1)?,
                band(raw.zone2_lower, raw.zone2_upper, 2)?,
                band(raw.zone3_lower, raw.zone3_upper, 3)?,
                band(raw.zone4_lower, raw.zone4_upper, 4)?,
                band(raw.zone5_lower, raw.zone5_upper, 5)?,
            ],
        })
    }
}

impl From<HeartRateZones> for RawHeartRateZones {
    fn from(zones: HeartRateZones) -> Self {
        let [z1, z2, z3, z4, z5] = zones.bands;
        Self {
            zone1_lower: Some(z1.lower),
            zone1_upper: Some(z1.upper),
            zone2_lower: Some(z2.lower),
            zone2_upper: Some(z2.upper),
            zone3_lower: Some(z3.lower),
            zone3_upper: Some(z3.upper),
            zone4_lower: Some(z4.lower),
            zone4_upper: Some(z4.upper),
            zone5_lower: Some(z5.lower),
            zone5_upper: Some(z5.upper),
        }
    }
}

impl HeartRateZones {
    /// Build from `(lower, upper)` pairs for Z1..Z5
    pub fn new(bands: [(u32, u32); 5]) -> Self {
        Self {
            bands: bands.map(|(lower, upper)| ZoneBand { lower, upper }),
        }
    }

    pub fn bounds(&self, zone: Zone) -> ZoneBand {
        self.bands[zone.index()]
    }

    /// Check that bands are well-formed, ascending and non-overlapping
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for zone in Zone::ALL {
            let band = self.bounds(zone);
            if band.lower > band.upper {
                errors.push(format!(
                    "{}: lower bound {} above upper bound {}",
                    zone, band.lower, band.upper
                ));
            }
        }

        for pair in Zone::ALL.windows(2) {
            let (below, above) = (self.bounds(pair[0]), self.bounds(pair[1]));
            if above.lower < below.upper {
                errors.push(format!(
                    "{} starts at {} inside {} (upper {})",
                    pair[1], above.lower, pair[0], below.upper
                ));
            }
        }

        errors
    }
}

/// Supplies heart-rate zone tables per user
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    async fn zones_for(&self, user_id: &str) -> Result<HeartRateZones>;
}

/// Zone tables loaded from a JSON file mapping user id to table
#[derive(Clone, Debug, Default)]
pub struct JsonZoneProvider {
    tables: HashMap<String, RawHeartRateZones>,
}

impl JsonZoneProvider {
    pub fn from_tables(tables: HashMap<String, RawHeartRateZones>) -> Self {
        Self { tables }
    }

    /// Load tables from `path`; a missing file yields an empty provider
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("No zones file found at {:?}", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let tables: HashMap<String, RawHeartRateZones> = serde_json::from_str(&contents)?;
        tracing::info!("Loaded heart rate zones for {} users from {:?}", tables.len(), path);
        Ok(Self { tables })
    }

    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("zones.json")
    }
}

#[async_trait]
impl ZoneProvider for JsonZoneProvider {
    async fn zones_for(&self, user_id: &str) -> Result<HeartRateZones> {
        let raw = self
            .tables
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::MissingZones(user_id.to_string()))?;
        let zones = HeartRateZones::try_from(raw)?;

        let problems = zones.validate();
        if !problems.is_empty() {
            tracing::warn!(user_id, ?problems, "Heart rate zones look inconsistent");
        }
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_zones() -> HeartRateZones {
        HeartRateZones::new([(100, 120), (120, 140), (140, 155), (155, 170), (170, 190)])
    }

    #[test]
    fn test_wire_roundtrip() {
        let zones = sample_zones();
        let json = serde_json::to_value(&zones).unwrap();
        assert_eq!(json["zone3Lower"], 140);
        assert_eq!(json["zone5Upper"], 190);

        let parsed: HeartRateZones = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, zones);
    }

    #[test]
    fn test_missing_bound_fails_fast() {
        let json = serde_json::json!({
            "zone1Lower": 100, "zone1Upper": 120,
            "zone2Lower": 120, "zone2Upper": 140,
            "zone3Lower": 140,
            "zone4Lower": 155, "zone4Upper": 170,
            "zone5Lower": 170, "zone5Upper": 190
        });
        let err = serde_json::from_value::<HeartRateZones>(json).unwrap_err();
        assert!(err.to_string().contains("zone3Upper"));
    }

    #[test]
    fn test_bounds_lookup() {
        let zones = sample_zones();
        assert_eq!(zones.bounds(Zone::Z1), ZoneBand { lower: 100, upper: 120 });
        assert_eq!(zones.bounds(Zone::Z4), ZoneBand { lower: 155, upper: 170 });
    }

    #[test]
    fn test_validate_flags_overlap() {
        let zones =
            HeartRateZones::new([(100, 130), (120, 140), (140, 155), (155, 170), (170, 190)]);
        let errors = zones.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Z2"));
        assert!(sample_zones().validate().is_empty());
    }

    #[tokio::test]
    async fn test_provider_lookup() {
        let mut tables = HashMap::new();
        tables.insert("runner".to_string(), RawHeartRateZones::from(sample_zones()));
        tables.insert(
            "broken".to_string(),
            RawHeartRateZones {
                zone1_lower: Some(90),
                ..Default::default()
            },
        );
        let provider = JsonZoneProvider::from_tables(tables);

        assert_eq!(provider.zones_for("runner").await.unwrap(), sample_zones());
        assert!(matches!(
            provider.zones_for("broken").await,
            Err(Error::ZoneLookupMiss(_))
        ));
        assert!(matches!(
            provider.zones_for("nobody").await,
            Err(Error::MissingZones(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("zones.json");
        let mut tables = HashMap::new();
        tables.insert("runner".to_string(), sample_zones());
        std::fs::write(&path, serde_json::to_string(&tables).unwrap()).unwrap();

        let provider = JsonZoneProvider::load(&path).unwrap();
        assert_eq!(provider.tables.len(), 1);

        let missing = JsonZoneProvider::load(&temp_dir.path().join("none.json")).unwrap();
        assert!(missing.tables.is_empty());
    }
}
