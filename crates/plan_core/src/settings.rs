use std::sync::Mutex;

use shared::domain::{FirmwareClass, VehicleClass};

/// Offline-editing defaults handed to the orchestrator at construction.
/// Passed explicitly so there is no process-wide mutable settings lookup.
pub trait SettingsRegistry: Send + Sync {
    fn offline_editing_classes(&self) -> (FirmwareClass, VehicleClass);
    fn set_offline_editing_classes(
        &self,
        firmware_class: FirmwareClass,
        vehicle_class: VehicleClass,
    );
}

pub struct InMemorySettingsRegistry {
    classes: Mutex<(FirmwareClass, VehicleClass)>,
}

impl InMemorySettingsRegistry {
    pub fn new(firmware_class: FirmwareClass, vehicle_class: VehicleClass) -> Self {
        Self {
            classes: Mutex::new((firmware_class, vehicle_class)),
        }
    }
}

impl Default for InMemorySettingsRegistry {
    fn default() -> Self {
        Self::new(FirmwareClass::Generic, VehicleClass::Generic)
    }
}

impl SettingsRegistry for InMemorySettingsRegistry {
    fn offline_editing_classes(&self) -> (FirmwareClass, VehicleClass) {
        *self.classes.lock().expect("classes lock poisoned")
    }

    fn set_offline_editing_classes(
        &self,
        firmware_class: FirmwareClass,
        vehicle_class: VehicleClass,
    ) {
        *self.classes.lock().expect("classes lock poisoned") = (firmware_class, vehicle_class);
    }
}
