use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub Uuid);

impl VehicleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

/// One independently loadable/sendable subset of a vehicle plan.
///
/// Variant order is load-bearing: it encodes the mandatory
/// Mission -> GeoFence -> RallyPoint sequencing dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCategory {
    Mission,
    GeoFence,
    RallyPoint,
}

impl PlanCategory {
    pub const ALL: [PlanCategory; 3] = [
        PlanCategory::Mission,
        PlanCategory::GeoFence,
        PlanCategory::RallyPoint,
    ];

    /// Next category in pipeline order, or `None` for the terminal stage.
    pub fn next(self) -> Option<PlanCategory> {
        match self {
            PlanCategory::Mission => Some(PlanCategory::GeoFence),
            PlanCategory::GeoFence => Some(PlanCategory::RallyPoint),
            PlanCategory::RallyPoint => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlanCategory::Mission => "mission",
            PlanCategory::GeoFence => "geofence",
            PlanCategory::RallyPoint => "rally",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmwareClass {
    Px4,
    ArduPilot,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    FixedWing,
    MultiRotor,
    Vtol,
    RoverBoat,
    Sub,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub sequence: u32,
    pub command: u16,
    pub frame: u8,
    pub params: [f64; 4],
    pub coordinate: GeoCoordinate,
    pub autocontinue: bool,
}

impl MissionItem {
    /// Plain waypoint item, the common case for tests and tooling.
    pub fn waypoint(sequence: u32, coordinate: GeoCoordinate) -> Self {
        Self {
            sequence,
            command: 16,
            frame: 3,
            params: [0.0; 4],
            coordinate,
            autocontinue: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FencePolygon {
    pub vertices: Vec<GeoCoordinate>,
    pub inclusion: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FenceCircle {
    pub center: GeoCoordinate,
    pub radius_m: f64,
    pub inclusion: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoFenceSection {
    pub polygons: Vec<FencePolygon>,
    pub circles: Vec<FenceCircle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breach_return: Option<GeoCoordinate>,
}

impl GeoFenceSection {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty() && self.circles.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.polygons.len() + self.circles.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RallyPoint {
    pub coordinate: GeoCoordinate,
}

/// Wholesale item collection for one category. Controllers replace their
/// section as a unit on load, file import, and remove-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum PlanSection {
    Mission { items: Vec<MissionItem> },
    GeoFence(GeoFenceSection),
    RallyPoint { points: Vec<RallyPoint> },
}

impl PlanSection {
    pub fn empty(category: PlanCategory) -> Self {
        match category {
            PlanCategory::Mission => PlanSection::Mission { items: Vec::new() },
            PlanCategory::GeoFence => PlanSection::GeoFence(GeoFenceSection::default()),
            PlanCategory::RallyPoint => PlanSection::RallyPoint { points: Vec::new() },
        }
    }

    pub fn category(&self) -> PlanCategory {
        match self {
            PlanSection::Mission { .. } => PlanCategory::Mission,
            PlanSection::GeoFence(_) => PlanCategory::GeoFence,
            PlanSection::RallyPoint { .. } => PlanCategory::RallyPoint,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PlanSection::Mission { items } => items.is_empty(),
            PlanSection::GeoFence(fence) => fence.is_empty(),
            PlanSection::RallyPoint { points } => points.is_empty(),
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            PlanSection::Mission { items } => items.len(),
            PlanSection::GeoFence(fence) => fence.item_count(),
            PlanSection::RallyPoint { points } => points.len(),
        }
    }
}
