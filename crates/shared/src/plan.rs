use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        FirmwareClass, GeoCoordinate, GeoFenceSection, MissionItem, PlanCategory, PlanSection,
        RallyPoint, VehicleClass,
    },
    error::PlanError,
};

pub const PLAN_FILE_TYPE: &str = "Plan";
pub const PLAN_FILE_VERSION: u32 = 1;
pub const PLAN_FILE_EXTENSION: &str = "plan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSection {
    pub firmware_class: FirmwareClass,
    pub vehicle_class: VehicleClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_home: Option<GeoCoordinate>,
    pub items: Vec<MissionItem>,
}

impl MissionSection {
    pub fn empty(firmware_class: FirmwareClass, vehicle_class: VehicleClass) -> Self {
        Self {
            firmware_class,
            vehicle_class,
            planned_home: None,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RallySection {
    pub points: Vec<RallyPoint>,
}

/// On-disk plan file. One object per category plus a versioned header, the
/// same shape the ground station writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub file_type: String,
    pub version: u32,
    pub ground_station: String,
    pub saved_at: DateTime<Utc>,
    pub mission: MissionSection,
    pub geo_fence: GeoFenceSection,
    pub rally_points: RallySection,
}

impl PlanDocument {
    pub fn new(firmware_class: FirmwareClass, vehicle_class: VehicleClass) -> Self {
        Self {
            file_type: PLAN_FILE_TYPE.to_string(),
            version: PLAN_FILE_VERSION,
            ground_station: "plan-sync".to_string(),
            saved_at: Utc::now(),
            mission: MissionSection::empty(firmware_class, vehicle_class),
            geo_fence: GeoFenceSection::default(),
            rally_points: RallySection::default(),
        }
    }

    /// Parse and validate the header. Unknown file types and future versions
    /// are rejected rather than best-effort loaded.
    pub fn from_json_str(raw: &str) -> Result<Self, PlanError> {
        let document: PlanDocument = serde_json::from_str(raw)?;
        if document.file_type != PLAN_FILE_TYPE {
            return Err(PlanError::WrongFileType {
                expected: PLAN_FILE_TYPE.to_string(),
                actual: document.file_type,
            });
        }
        if document.version > PLAN_FILE_VERSION {
            return Err(PlanError::UnsupportedVersion {
                actual: document.version,
                supported: PLAN_FILE_VERSION,
            });
        }
        Ok(document)
    }

    pub fn to_json_string(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn section(&self, category: PlanCategory) -> PlanSection {
        match category {
            PlanCategory::Mission => PlanSection::Mission {
                items: self.mission.items.clone(),
            },
            PlanCategory::GeoFence => PlanSection::GeoFence(self.geo_fence.clone()),
            PlanCategory::RallyPoint => PlanSection::RallyPoint {
                points: self.rally_points.points.clone(),
            },
        }
    }

    pub fn set_section(&mut self, section: PlanSection) {
        match section {
            PlanSection::Mission { items } => self.mission.items = items,
            PlanSection::GeoFence(fence) => self.geo_fence = fence,
            PlanSection::RallyPoint { points } => self.rally_points.points = points,
        }
    }
}

#[cfg(test)]
#[path = "tests/plan_tests.rs"]
mod tests;
