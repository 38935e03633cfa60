//! Scene-name taxonomy check against the target collection.

use crate::taxonomy::{canonical_sensor_code, SatelliteFamily};
use thiserror::Error;

/// Why a scene name does not belong to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("unrecognized satellite family {0:?}")]
    UnknownFamily(String),

    #[error("scene name has no sensor field")]
    MissingSensor,

    #[error("sensor {0:?} is not in the allowed sensor list")]
    SensorNotAllowed(String),

    #[error("collection {0:?} has no canonical sensor code")]
    UnknownCollection(String),

    #[error("scene prefix {found:?} does not match collection code {expected:?}")]
    WrongCollection { expected: String, found: String },
}

#[derive(Debug, Clone)]
pub struct AuthenticityChecker {
    sensors: Vec<String>,
}

impl AuthenticityChecker {
    pub fn new(sensors: Vec<String>) -> Self {
        Self { sensors }
    }

    pub fn is_authentic(&self, scene_name: &str, collection_identifier: &str) -> bool {
        self.check(scene_name, collection_identifier).is_ok()
    }

    /// Scene names are `SATELLITE_MISSION_SENSOR_...`; the first three fields
    /// must equal the canonical code of the collection's `name-version`.
    pub fn check(&self, scene_name: &str, collection_identifier: &str) -> Result<(), Mismatch> {
        let fields: Vec<&str> = scene_name.split('_').collect();

        let family = SatelliteFamily::parse(fields[0])
            .ok_or_else(|| Mismatch::UnknownFamily(fields[0].to_string()))?;

        if family.requires_sensor_check() {
            let sensor = fields.get(2).ok_or(Mismatch::MissingSensor)?;
            if !self.sensors.iter().any(|s| s == sensor) {
                return Err(Mismatch::SensorNotAllowed(sensor.to_string()));
            }
        }

        let expected = canonical_sensor_code(collection_identifier)
            .ok_or_else(|| Mismatch::UnknownCollection(collection_identifier.to_string()))?;
        let found = fields.iter().take(3).copied().collect::<Vec<_>>().join("_");

        if found != expected {
            return Err(Mismatch::WrongCollection {
                expected: expected.to_string(),
                found,
            });
        }

        Ok(())
    }
}
