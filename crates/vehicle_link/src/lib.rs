use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{FirmwareClass, PlanCategory, PlanSection, VehicleClass, VehicleId};
use tokio::sync::broadcast;
use tracing::debug;

const COMPLETION_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    Load,
    Send,
}

/// Completion notification for one category sync operation. Carries no
/// payload beyond "done": success and failure are indistinguishable here,
/// finer-grained error surfacing belongs to the device-communication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCompletion {
    pub category: PlanCategory,
    pub direction: SyncDirection,
}

/// A connected device, or the offline placeholder standing in for one.
///
/// Handles are shared and swappable: multiple orchestrators may reference the
/// same handle, and the orchestrator never mutates it beyond the
/// first-contact recovery call.
#[async_trait]
pub trait VehicleHandle: Send + Sync {
    fn vehicle_id(&self) -> VehicleId;
    fn is_offline(&self) -> bool;
    fn firmware_class(&self) -> FirmwareClass;
    fn vehicle_class(&self) -> VehicleClass;
    fn link_is_high_latency(&self) -> bool;
    fn supports_category(&self, category: PlanCategory) -> bool;
    fn initial_plan_request_complete(&self) -> bool;
    fn force_initial_plan_request_complete(&self);
    /// Plan state the handle already knows for this category, if the device
    /// round-trip has happened. `None` means a fresh load is required.
    fn known_plan(&self, category: PlanCategory) -> Option<PlanSection>;
    async fn start_load(&self, category: PlanCategory) -> Result<()>;
    async fn start_send(&self, category: PlanCategory, section: PlanSection) -> Result<()>;
    async fn remove_all(&self, category: PlanCategory) -> Result<()>;
    fn subscribe_completions(&self) -> broadcast::Receiver<SyncCompletion>;
}

/// Placeholder handle used while no device is connected. Supports local
/// editing only; every device operation refuses.
pub struct OfflineVehicle {
    vehicle_id: VehicleId,
    classes: Mutex<(FirmwareClass, VehicleClass)>,
    completions: broadcast::Sender<SyncCompletion>,
}

impl OfflineVehicle {
    pub fn new(firmware_class: FirmwareClass, vehicle_class: VehicleClass) -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            vehicle_id: VehicleId::new(),
            classes: Mutex::new((firmware_class, vehicle_class)),
            completions,
        }
    }

    /// Track the classification of the last connected vehicle so offline
    /// editing matches it.
    pub fn set_classes(&self, firmware_class: FirmwareClass, vehicle_class: VehicleClass) {
        *self.classes.lock().expect("classes lock poisoned") = (firmware_class, vehicle_class);
    }
}

#[async_trait]
impl VehicleHandle for OfflineVehicle {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }

    fn is_offline(&self) -> bool {
        true
    }

    fn firmware_class(&self) -> FirmwareClass {
        self.classes.lock().expect("classes lock poisoned").0
    }

    fn vehicle_class(&self) -> VehicleClass {
        self.classes.lock().expect("classes lock poisoned").1
    }

    fn link_is_high_latency(&self) -> bool {
        false
    }

    fn supports_category(&self, _category: PlanCategory) -> bool {
        true
    }

    fn initial_plan_request_complete(&self) -> bool {
        true
    }

    fn force_initial_plan_request_complete(&self) {}

    fn known_plan(&self, _category: PlanCategory) -> Option<PlanSection> {
        None
    }

    async fn start_load(&self, category: PlanCategory) -> Result<()> {
        Err(anyhow!(
            "cannot load {} from the offline placeholder vehicle",
            category.label()
        ))
    }

    async fn start_send(&self, category: PlanCategory, _section: PlanSection) -> Result<()> {
        Err(anyhow!(
            "cannot send {} to the offline placeholder vehicle",
            category.label()
        ))
    }

    async fn remove_all(&self, category: PlanCategory) -> Result<()> {
        Err(anyhow!(
            "cannot remove {} on the offline placeholder vehicle",
            category.label()
        ))
    }

    fn subscribe_completions(&self) -> broadcast::Receiver<SyncCompletion> {
        self.completions.subscribe()
    }
}

#[derive(Default)]
struct SimulatedVehicleState {
    plans: HashMap<PlanCategory, PlanSection>,
    load_requests: Vec<PlanCategory>,
    send_requests: Vec<PlanCategory>,
    remove_requests: Vec<PlanCategory>,
}

/// In-memory device double for tests and tooling. Records every request and
/// completes them either automatically or under manual control.
pub struct SimulatedVehicle {
    vehicle_id: VehicleId,
    firmware_class: FirmwareClass,
    vehicle_class: VehicleClass,
    high_latency: bool,
    auto_complete: bool,
    unsupported: Vec<PlanCategory>,
    unknown: Vec<PlanCategory>,
    initial_plan_request_complete: AtomicBool,
    inner: Mutex<SimulatedVehicleState>,
    completions: broadcast::Sender<SyncCompletion>,
}

impl SimulatedVehicle {
    pub fn new(firmware_class: FirmwareClass, vehicle_class: VehicleClass) -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            vehicle_id: VehicleId::new(),
            firmware_class,
            vehicle_class,
            high_latency: false,
            auto_complete: true,
            unsupported: Vec::new(),
            unknown: Vec::new(),
            initial_plan_request_complete: AtomicBool::new(true),
            inner: Mutex::new(SimulatedVehicleState::default()),
            completions,
        }
    }

    pub fn with_unsupported(mut self, category: PlanCategory) -> Self {
        self.unsupported.push(category);
        self
    }

    pub fn with_high_latency_link(mut self) -> Self {
        self.high_latency = true;
        self
    }

    /// Disable automatic completion; tests then drive completions by hand.
    pub fn with_manual_completion(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    /// Mark a category as needing a fresh device round-trip even after the
    /// first-contact fetch, forcing the mirror path through `start_load`.
    pub fn with_plan_unknown(mut self, category: PlanCategory) -> Self {
        self.unknown.push(category);
        self
    }

    pub fn with_initial_plan_request_pending(self) -> Self {
        self.initial_plan_request_complete
            .store(false, Ordering::SeqCst);
        self
    }

    pub fn with_plan(self, section: PlanSection) -> Self {
        self.set_plan(section);
        self
    }

    pub fn set_plan(&self, section: PlanSection) {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        inner.plans.insert(section.category(), section);
    }

    /// Fire one completion event, as the device protocol layer would.
    pub fn complete(&self, category: PlanCategory, direction: SyncDirection) {
        let _ = self.completions.send(SyncCompletion {
            category,
            direction,
        });
    }

    pub fn load_requests(&self) -> Vec<PlanCategory> {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .load_requests
            .clone()
    }

    pub fn send_requests(&self) -> Vec<PlanCategory> {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .send_requests
            .clone()
    }

    pub fn remove_requests(&self) -> Vec<PlanCategory> {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .remove_requests
            .clone()
    }

    pub fn sent_plan(&self, category: PlanCategory) -> Option<PlanSection> {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .plans
            .get(&category)
            .cloned()
    }
}

#[async_trait]
impl VehicleHandle for SimulatedVehicle {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }

    fn is_offline(&self) -> bool {
        false
    }

    fn firmware_class(&self) -> FirmwareClass {
        self.firmware_class
    }

    fn vehicle_class(&self) -> VehicleClass {
        self.vehicle_class
    }

    fn link_is_high_latency(&self) -> bool {
        self.high_latency
    }

    fn supports_category(&self, category: PlanCategory) -> bool {
        !self.unsupported.contains(&category)
    }

    fn initial_plan_request_complete(&self) -> bool {
        self.initial_plan_request_complete.load(Ordering::SeqCst)
    }

    fn force_initial_plan_request_complete(&self) {
        self.initial_plan_request_complete
            .store(true, Ordering::SeqCst);
    }

    fn known_plan(&self, category: PlanCategory) -> Option<PlanSection> {
        if !self.initial_plan_request_complete()
            || !self.supports_category(category)
            || self.unknown.contains(&category)
        {
            return None;
        }
        let inner = self.inner.lock().expect("state lock poisoned");
        Some(
            inner
                .plans
                .get(&category)
                .cloned()
                .unwrap_or_else(|| PlanSection::empty(category)),
        )
    }

    async fn start_load(&self, category: PlanCategory) -> Result<()> {
        debug!(category = category.label(), "simulated vehicle load requested");
        self.inner
            .lock()
            .expect("state lock poisoned")
            .load_requests
            .push(category);
        if self.auto_complete {
            self.complete(category, SyncDirection::Load);
        }
        Ok(())
    }

    async fn start_send(&self, category: PlanCategory, section: PlanSection) -> Result<()> {
        debug!(category = category.label(), "simulated vehicle send requested");
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            inner.send_requests.push(category);
            inner.plans.insert(category, section);
        }
        if self.auto_complete {
            self.complete(category, SyncDirection::Send);
        }
        Ok(())
    }

    async fn remove_all(&self, category: PlanCategory) -> Result<()> {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        inner.remove_requests.push(category);
        inner.plans.insert(category, PlanSection::empty(category));
        Ok(())
    }

    fn subscribe_completions(&self) -> broadcast::Receiver<SyncCompletion> {
        self.completions.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
