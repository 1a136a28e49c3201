use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use shared::{
    domain::{PlanCategory, PlanSection, VehicleClass, VehicleId},
    error::PlanError,
    plan::{PlanDocument, PLAN_FILE_EXTENSION},
};
use thiserror::Error;
use tokio::{
    fs,
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use vehicle_link::{OfflineVehicle, SyncCompletion, SyncDirection, VehicleHandle};

pub mod settings;
mod sub_plan;

pub use settings::{InMemorySettingsRegistry, SettingsRegistry};
pub use sub_plan::{SubPlanController, SyncState};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Interactive is the plan-editing context where stale edits must never be
/// silently lost; Monitor always tracks whatever the current vehicle reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Interactive,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanCreator {
    Blank,
    Survey,
    CorridorScan,
    StructureScan,
}

/// Notifications to the UI layer. Aggregate flags are change-gated except
/// after a vehicle swap, which re-emits all of them unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanEvent {
    OfflineChanged(bool),
    VehicleChanged(VehicleId),
    DirtyChanged(bool),
    ContainsItemsChanged(bool),
    SyncInProgressChanged(bool),
    CurrentPlanFileChanged(Option<PathBuf>),
    /// A dirty in-memory plan collided with a vehicle change. The decision
    /// (discard, keep, merge) belongs to the caller; no automatic action is
    /// taken.
    PromptForPlanUsageOnVehicleChange,
    PlanCreatorsChanged(Vec<PlanCreator>),
    SendToVehicleCompleted,
}

/// Why a load/send request was refused. Refusals are diagnostics, not
/// errors: the operation is a no-op and no state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncRefusal {
    #[error("link is high latency")]
    HighLatencyLink,
    #[error("no vehicle connected")]
    Offline,
    #[error("load is not available in monitor view")]
    MonitorView,
    #[error("another sync is already in progress")]
    SyncInProgress,
}

/// Stage the pipeline is waiting on. One instance per direction; advanced
/// only by the completion dispatch, so a stage can never be skipped or run
/// twice for one pipeline pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineStage {
    Idle,
    AwaitingMission,
    AwaitingGeoFence,
    AwaitingRallyPoint,
}

impl PipelineStage {
    fn awaiting(category: PlanCategory) -> Self {
        match category {
            PlanCategory::Mission => PipelineStage::AwaitingMission,
            PlanCategory::GeoFence => PipelineStage::AwaitingGeoFence,
            PlanCategory::RallyPoint => PipelineStage::AwaitingRallyPoint,
        }
    }

    fn expected(self) -> Option<PlanCategory> {
        match self {
            PipelineStage::Idle => None,
            PipelineStage::AwaitingMission => Some(PlanCategory::Mission),
            PipelineStage::AwaitingGeoFence => Some(PlanCategory::GeoFence),
            PipelineStage::AwaitingRallyPoint => Some(PlanCategory::RallyPoint),
        }
    }
}

struct MasterState {
    controllers: [SubPlanController; 3],
    vehicle: Arc<dyn VehicleHandle>,
    view_mode: ViewMode,
    load_stage: PipelineStage,
    send_stage: PipelineStage,
    /// Category currently being mirror-loaded from the vehicle, if any; its
    /// completion continues the mirror cascade.
    mirror_stage: Option<PlanCategory>,
    last_dirty: bool,
    last_contains_items: bool,
    last_sync_in_progress: bool,
    current_plan_file: Option<PathBuf>,
    dispose_after_send: bool,
    completion_task: Option<JoinHandle<()>>,
    plan_creators: Vec<PlanCreator>,
}

impl MasterState {
    fn controller(&self, category: PlanCategory) -> &SubPlanController {
        &self.controllers[category_index(category)]
    }

    fn controller_mut(&mut self, category: PlanCategory) -> &mut SubPlanController {
        &mut self.controllers[category_index(category)]
    }

    fn dirty(&self) -> bool {
        self.controllers.iter().any(|c| c.dirty())
    }

    fn contains_items(&self) -> bool {
        self.controllers.iter().any(|c| c.contains_items())
    }

    fn sync_in_progress(&self) -> bool {
        self.controllers.iter().any(|c| c.sync_in_progress())
    }

    fn set_all_dirty(&mut self, dirty: bool) {
        for controller in &mut self.controllers {
            controller.set_dirty(dirty);
        }
    }

    fn sync_refusal(&self, direction: SyncDirection) -> Option<SyncRefusal> {
        if self.vehicle.link_is_high_latency() {
            return Some(SyncRefusal::HighLatencyLink);
        }
        if self.vehicle.is_offline() {
            return Some(SyncRefusal::Offline);
        }
        if direction == SyncDirection::Load && self.view_mode == ViewMode::Monitor {
            return Some(SyncRefusal::MonitorView);
        }
        if self.sync_in_progress() {
            return Some(SyncRefusal::SyncInProgress);
        }
        None
    }

    /// Apply a document per category, in pipeline order, reporting the first
    /// error encountered while still attempting the remaining categories.
    fn apply_document(&mut self, document: &PlanDocument) -> Result<(), PlanError> {
        let mut first_error = None;
        for category in PlanCategory::ALL {
            if let Err(err) = self
                .controller_mut(category)
                .load_section(document.section(category))
            {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn category_index(category: PlanCategory) -> usize {
    match category {
        PlanCategory::Mission => 0,
        PlanCategory::GeoFence => 1,
        PlanCategory::RallyPoint => 2,
    }
}

/// Master controller coordinating the three per-category sub-plan
/// controllers against one swappable vehicle handle.
///
/// All state lives behind one mutex; public operations and completion
/// handlers are serialized through it, so handlers never interleave for the
/// same controller instance. Device loads and sends are started here but
/// finish later, when the vehicle's completion event re-enters through the
/// subscription task.
pub struct PlanMasterController {
    settings: Arc<dyn SettingsRegistry>,
    offline_vehicle: Arc<OfflineVehicle>,
    inner: Mutex<MasterState>,
    events: broadcast::Sender<PlanEvent>,
}

impl PlanMasterController {
    pub fn new(view_mode: ViewMode, settings: Arc<dyn SettingsRegistry>) -> Arc<Self> {
        let (firmware_class, vehicle_class) = settings.offline_editing_classes();
        let offline_vehicle = Arc::new(OfflineVehicle::new(firmware_class, vehicle_class));
        let vehicle: Arc<dyn VehicleHandle> = offline_vehicle.clone();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let plan_creators = if view_mode == ViewMode::Interactive {
            creators_for(vehicle_class)
        } else {
            Vec::new()
        };
        Arc::new(Self {
            settings,
            offline_vehicle,
            inner: Mutex::new(MasterState {
                controllers: [
                    SubPlanController::new(PlanCategory::Mission),
                    SubPlanController::new(PlanCategory::GeoFence),
                    SubPlanController::new(PlanCategory::RallyPoint),
                ],
                vehicle,
                view_mode,
                load_stage: PipelineStage::Idle,
                send_stage: PipelineStage::Idle,
                mirror_stage: None,
                last_dirty: false,
                last_contains_items: false,
                last_sync_in_progress: false,
                current_plan_file: None,
                dispose_after_send: false,
                completion_task: None,
                plan_creators,
            }),
            events,
        })
    }

    /// Build a throwaway controller around an already-connected handle, push
    /// one stored plan file to it, and let it dispose itself after the
    /// terminal send completion.
    pub async fn send_plan_file_to_vehicle(
        vehicle: Arc<dyn VehicleHandle>,
        path: impl AsRef<Path>,
        settings: Arc<dyn SettingsRegistry>,
    ) -> Result<Arc<Self>, PlanError> {
        let controller = Self::new(ViewMode::Monitor, settings);
        controller.inner.lock().await.dispose_after_send = true;
        controller.attach_vehicle(Some(vehicle)).await;
        controller.load_from_file(path).await?;
        controller.send_to_vehicle().await;
        Ok(controller)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlanEvent> {
        self.events.subscribe()
    }

    /// Swap the active vehicle. `None` detaches and falls back to the
    /// offline placeholder. No-op when the handle is already current.
    pub async fn attach_vehicle(
        self: &Arc<Self>,
        new_vehicle: Option<Arc<dyn VehicleHandle>>,
    ) {
        let mut state = self.inner.lock().await;
        let new_offline = new_vehicle.is_none();
        let handle: Arc<dyn VehicleHandle> = match new_vehicle {
            Some(handle) => handle,
            None => self.offline_vehicle.clone(),
        };
        if state.vehicle.vehicle_id() == handle.vehicle_id() {
            return;
        }
        debug!(
            vehicle = ?handle.vehicle_id(),
            offline = new_offline,
            "active vehicle changed"
        );

        // Detach from the old handle: stop its completion subscription and
        // reset anything that was in flight. An unanswered completion is
        // permanently pending and safe; it must not survive the swap as a
        // visible syncing state.
        if let Some(task) = state.completion_task.take() {
            task.abort();
        }
        state.load_stage = PipelineStage::Idle;
        state.send_stage = PipelineStage::Idle;
        state.mirror_stage = None;
        for controller in &mut state.controllers {
            controller.complete_sync();
        }

        if !new_offline {
            self.settings
                .set_offline_editing_classes(handle.firmware_class(), handle.vehicle_class());
            self.offline_vehicle
                .set_classes(handle.firmware_class(), handle.vehicle_class());

            let mut completions = handle.subscribe_completions();
            let weak = Arc::downgrade(self);
            state.completion_task = Some(tokio::spawn(async move {
                while let Ok(completion) = completions.recv().await {
                    let Some(controller) = weak.upgrade() else {
                        break;
                    };
                    controller.handle_completion(completion).await;
                }
            }));
        }

        state.vehicle = handle.clone();
        let _ = self.events.send(PlanEvent::OfflineChanged(new_offline));
        let _ = self.events.send(PlanEvent::VehicleChanged(handle.vehicle_id()));

        match state.view_mode {
            ViewMode::Monitor => {
                if new_offline {
                    debug!("monitor view, vehicle went away, clearing stale plan");
                    self.remove_all_locked(&mut state);
                } else {
                    debug!("monitor view, new vehicle, mirroring its plan");
                    self.mirror_vehicle_plan_locked(&mut state).await;
                }
            }
            ViewMode::Interactive => {
                if state.contains_items() {
                    if state.dirty() {
                        // Ambiguous: unsaved edits vs. a new vehicle. Never
                        // silently discard, never silently overwrite.
                        info!("dirty plan held across vehicle change, prompting");
                        let _ = self
                            .events
                            .send(PlanEvent::PromptForPlanUsageOnVehicleChange);
                    } else if new_offline {
                        debug!("clean stale plan, vehicle went away, clearing");
                        self.remove_all_locked(&mut state);
                    } else {
                        debug!("clean stale plan, new vehicle, mirroring its plan");
                        self.mirror_vehicle_plan_locked(&mut state).await;
                    }
                } else if !new_offline {
                    debug!("no previous plan, new vehicle, mirroring its plan");
                    self.mirror_vehicle_plan_locked(&mut state).await;
                }
            }
        }

        // A vehicle swap can change all three aggregates without further
        // action; re-emit them unconditionally.
        self.notify_aggregates(&mut state, true);
        self.refresh_plan_creators(&mut state);
    }

    /// Idempotent detach; equivalent to attaching no vehicle.
    pub async fn detach_vehicle(self: &Arc<Self>) {
        self.attach_vehicle(None).await;
    }

    /// Start the staged load pipeline (Mission, then GeoFence, then
    /// RallyPoint). Returns whether the pipeline started.
    pub async fn load_from_vehicle(&self) -> bool {
        let mut state = self.inner.lock().await;
        if let Some(refusal) = state.sync_refusal(SyncDirection::Load) {
            warn!(%refusal, "load from vehicle refused");
            return false;
        }
        info!("starting plan load from vehicle");
        self.run_pipeline_from(&mut state, SyncDirection::Load, PlanCategory::Mission)
            .await;
        self.notify_aggregates(&mut state, false);
        true
    }

    /// Start the staged send pipeline. Legal from monitor view as well.
    pub async fn send_to_vehicle(&self) -> bool {
        let mut state = self.inner.lock().await;
        if let Some(refusal) = state.sync_refusal(SyncDirection::Send) {
            warn!(%refusal, "send to vehicle refused");
            return false;
        }
        info!("starting plan send to vehicle");
        self.run_pipeline_from(&mut state, SyncDirection::Send, PlanCategory::Mission)
            .await;
        self.notify_aggregates(&mut state, false);
        true
    }

    /// Clear all in-memory items. While offline this also resets the dirty
    /// bits and the current file reference, since discarding a stale plan is
    /// not an edit.
    pub async fn remove_all(&self) {
        let mut state = self.inner.lock().await;
        self.remove_all_locked(&mut state);
        self.notify_aggregates(&mut state, false);
    }

    /// Ask the vehicle to clear its stored plan, category by category.
    /// Refused while offline; no device calls are made in that case.
    pub async fn remove_all_from_vehicle(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.vehicle.is_offline() {
            warn!("remove all from vehicle refused while offline");
            return false;
        }
        let vehicle = state.vehicle.clone();
        for category in PlanCategory::ALL {
            if category != PlanCategory::Mission && !vehicle.supports_category(category) {
                continue;
            }
            if let Err(err) = vehicle.remove_all(category).await {
                warn!(category = category.label(), error = %err, "vehicle remove-all failed");
            }
            state.controller_mut(category).remove_all();
        }
        state.set_all_dirty(false);
        self.notify_aggregates(&mut state, false);
        true
    }

    /// Replace all three categories from a plan document, in pipeline order,
    /// reporting the first per-category error. Does not touch the dirty
    /// flags: a save/load round trip of the same data is not an edit.
    pub async fn load_document(&self, document: &PlanDocument) -> Result<(), PlanError> {
        let mut state = self.inner.lock().await;
        let result = state.apply_document(document);
        self.notify_aggregates(&mut state, false);
        result
    }

    pub async fn save_document(&self) -> PlanDocument {
        let state = self.inner.lock().await;
        let mut document = PlanDocument::new(
            state.vehicle.firmware_class(),
            state.vehicle.vehicle_class(),
        );
        for category in PlanCategory::ALL {
            document.set_section(state.controller(category).save_section());
        }
        document
    }

    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<(), PlanError> {
        let path = path.as_ref();
        let parsed = match fs::read_to_string(path).await {
            Ok(raw) => PlanDocument::from_json_str(&raw),
            Err(err) => Err(PlanError::Io(err)),
        };

        let mut state = self.inner.lock().await;
        match parsed.and_then(|document| state.apply_document(&document)) {
            Ok(()) => {
                let normalized = path.with_extension(PLAN_FILE_EXTENSION);
                self.set_current_plan_file(&mut state, Some(normalized));
                if !state.vehicle.is_offline() {
                    // A freshly imported plan differs from whatever the
                    // vehicle holds until it is sent.
                    state.set_all_dirty(true);
                }
                self.notify_aggregates(&mut state, false);
                Ok(())
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load plan file");
                self.set_current_plan_file(&mut state, None);
                self.notify_aggregates(&mut state, false);
                Err(err)
            }
        }
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), PlanError> {
        let path = path.as_ref();
        let normalized = if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension(PLAN_FILE_EXTENSION)
        };

        let document = self.save_document().await;
        let raw = document.to_json_string()?;

        let mut state = self.inner.lock().await;
        match fs::write(&normalized, raw).await {
            Ok(()) => {
                self.set_current_plan_file(&mut state, Some(normalized));
                // Persisting while connected does not make the in-memory
                // plan match the vehicle; only clear dirty offline.
                if state.vehicle.is_offline() {
                    state.set_all_dirty(false);
                }
                self.notify_aggregates(&mut state, false);
                Ok(())
            }
            Err(err) => {
                warn!(path = %normalized.display(), error = %err, "failed to save plan file");
                self.set_current_plan_file(&mut state, None);
                Err(PlanError::Io(err))
            }
        }
    }

    pub async fn save_to_current(&self) -> Result<(), PlanError> {
        let current = self.inner.lock().await.current_plan_file.clone();
        match current {
            Some(path) => self.save_to_file(path).await,
            None => {
                warn!("save to current requested with no current plan file");
                Ok(())
            }
        }
    }

    /// Mirror whatever the current vehicle reports. Offline this clears any
    /// previous plan instead.
    pub async fn mirror_vehicle_plan(&self) {
        let mut state = self.inner.lock().await;
        if state.vehicle.is_offline() {
            self.remove_all_locked(&mut state);
        } else {
            self.mirror_vehicle_plan_locked(&mut state).await;
        }
        self.notify_aggregates(&mut state, false);
    }

    pub async fn set_dirty(&self, dirty: bool) {
        let mut state = self.inner.lock().await;
        state.set_all_dirty(dirty);
        self.notify_aggregates(&mut state, false);
    }

    pub async fn dirty(&self) -> bool {
        self.inner.lock().await.dirty()
    }

    pub async fn contains_items(&self) -> bool {
        self.inner.lock().await.contains_items()
    }

    pub async fn is_empty(&self) -> bool {
        !self.contains_items().await
    }

    pub async fn sync_in_progress(&self) -> bool {
        self.inner.lock().await.sync_in_progress()
    }

    pub async fn offline(&self) -> bool {
        self.inner.lock().await.vehicle.is_offline()
    }

    pub async fn view_mode(&self) -> ViewMode {
        self.inner.lock().await.view_mode
    }

    pub async fn current_vehicle(&self) -> Arc<dyn VehicleHandle> {
        self.inner.lock().await.vehicle.clone()
    }

    pub async fn current_plan_file(&self) -> Option<PathBuf> {
        self.inner.lock().await.current_plan_file.clone()
    }

    pub async fn plan_creators(&self) -> Vec<PlanCreator> {
        self.inner.lock().await.plan_creators.clone()
    }

    /// Completion dispatch, normally re-entered through the vehicle
    /// subscription task.
    async fn handle_completion(&self, completion: SyncCompletion) {
        let mut state = self.inner.lock().await;
        debug!(
            category = completion.category.label(),
            direction = ?completion.direction,
            "sync completion received"
        );
        match completion.direction {
            SyncDirection::Load => self.on_load_complete(&mut state, completion.category).await,
            SyncDirection::Send => self.on_send_complete(&mut state, completion.category).await,
        }
        self.notify_aggregates(&mut state, false);
    }

    async fn on_load_complete(&self, state: &mut MasterState, category: PlanCategory) {
        // Controller level: adopt what the vehicle now knows and go idle.
        if state.controller(category).sync_state() == SyncState::Loading {
            let section = state
                .vehicle
                .known_plan(category)
                .unwrap_or_else(|| PlanSection::empty(category));
            let controller = state.controller_mut(category);
            controller.complete_sync();
            if let Err(err) = controller.load_section(section) {
                warn!(category = category.label(), error = %err, "loaded section rejected");
            }
            controller.set_dirty(false);
        }

        if state.load_stage.expected() == Some(category) {
            match category.next() {
                Some(next) => {
                    self.run_pipeline_from(state, SyncDirection::Load, next)
                        .await
                }
                None => {
                    state.load_stage = PipelineStage::Idle;
                    info!("plan load pipeline complete");
                }
            }
        } else if state.mirror_stage == Some(category) {
            // The mirror's real load finished; continue the cascade.
            state.mirror_stage = None;
            if let Some(next) = category.next() {
                self.run_mirror_from(state, next).await;
            }
        }
    }

    async fn on_send_complete(&self, state: &mut MasterState, category: PlanCategory) {
        if state.controller(category).sync_state() == SyncState::Sending {
            state.controller_mut(category).complete_sync();
        }

        if state.send_stage.expected() == Some(category) {
            match category.next() {
                Some(next) => {
                    self.run_pipeline_from(state, SyncDirection::Send, next)
                        .await
                }
                None => {
                    state.send_stage = PipelineStage::Idle;
                    self.finish_send_pipeline(state).await;
                }
            }
        }
    }

    /// Advance one pipeline starting at `start`, skipping unsupported
    /// categories by synthesizing their completion in place. At most one
    /// category ends up awaiting a device round-trip.
    async fn run_pipeline_from(
        &self,
        state: &mut MasterState,
        direction: SyncDirection,
        start: PlanCategory,
    ) {
        match direction {
            SyncDirection::Load => state.load_stage = PipelineStage::Idle,
            SyncDirection::Send => state.send_stage = PipelineStage::Idle,
        }

        let mut next = Some(start);
        while let Some(category) = next {
            let vehicle = state.vehicle.clone();
            if vehicle.supports_category(category) {
                let result = match direction {
                    SyncDirection::Load => vehicle.start_load(category).await,
                    SyncDirection::Send => {
                        let section = state.controller(category).save_section();
                        vehicle.start_send(category, section).await
                    }
                };
                match result {
                    Ok(()) => {
                        debug!(category = category.label(), ?direction, "sync stage started");
                        let controller = state.controller_mut(category);
                        match direction {
                            SyncDirection::Load => {
                                controller.begin_load();
                                state.load_stage = PipelineStage::awaiting(category);
                            }
                            SyncDirection::Send => {
                                controller.begin_send();
                                state.send_stage = PipelineStage::awaiting(category);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(
                            category = category.label(),
                            ?direction,
                            error = %err,
                            "sync stage failed to start, halting pipeline"
                        );
                    }
                }
                // Starting a stage establishes a known-clean baseline;
                // loading or sending is not an edit.
                state.set_all_dirty(false);
                return;
            }

            debug!(
                category = category.label(),
                ?direction,
                "category not supported, synthesizing stage completion"
            );
            if direction == SyncDirection::Load {
                let controller = state.controller_mut(category);
                controller.remove_all();
                controller.set_dirty(false);
            }
            state.set_all_dirty(false);
            next = category.next();
        }

        // Every remaining stage was synthesized; the pipeline is done.
        if direction == SyncDirection::Send {
            self.finish_send_pipeline(state).await;
        } else {
            info!("plan load pipeline complete");
        }
    }

    async fn finish_send_pipeline(&self, state: &mut MasterState) {
        info!("plan send pipeline complete");
        let _ = self.events.send(PlanEvent::SendToVehicleCompleted);
        if state.dispose_after_send {
            debug!("transient sender detaching after terminal send completion");
            if let Some(task) = state.completion_task.take() {
                task.abort();
            }
            let offline: Arc<dyn VehicleHandle> = self.offline_vehicle.clone();
            state.vehicle = offline;
            let _ = self.events.send(PlanEvent::OfflineChanged(true));
        }
    }

    fn remove_all_locked(&self, state: &mut MasterState) {
        for controller in &mut state.controllers {
            controller.remove_all();
        }
        if state.vehicle.is_offline() {
            state.set_all_dirty(false);
            self.set_current_plan_file(state, None);
        }
    }

    /// Mirror the current vehicle's plan: recover a handle stuck
    /// mid-startup, then walk the categories in order and stop
    /// at the first one that needs a real device load — its completion
    /// continues the cascade, so categories never load concurrently.
    async fn mirror_vehicle_plan_locked(&self, state: &mut MasterState) {
        if !state.vehicle.initial_plan_request_complete() && !state.sync_in_progress() {
            debug!("vehicle stuck before first-contact fetch, forcing it complete");
            state.vehicle.force_initial_plan_request_complete();
        }
        self.run_mirror_from(state, PlanCategory::Mission).await;
    }

    async fn run_mirror_from(&self, state: &mut MasterState, start: PlanCategory) {
        state.mirror_stage = None;
        let mut next = Some(start);
        while let Some(category) = next {
            if self.mirror_category(state, category).await {
                state.mirror_stage = Some(category);
                return;
            }
            next = category.next();
        }
    }

    /// Mirror one category. Returns true when a real asynchronous load was
    /// started, false when the category was adopted (or cleared) in place.
    async fn mirror_category(&self, state: &mut MasterState, category: PlanCategory) -> bool {
        let vehicle = state.vehicle.clone();
        if !vehicle.supports_category(category) {
            let controller = state.controller_mut(category);
            controller.remove_all();
            controller.set_dirty(false);
            return false;
        }
        if let Some(section) = vehicle.known_plan(category) {
            let controller = state.controller_mut(category);
            if let Err(err) = controller.load_section(section) {
                warn!(category = category.label(), error = %err, "mirrored section rejected");
            }
            controller.set_dirty(false);
            return false;
        }
        match vehicle.start_load(category).await {
            Ok(()) => {
                state.controller_mut(category).begin_load();
                true
            }
            Err(err) => {
                warn!(category = category.label(), error = %err, "mirror load failed to start");
                false
            }
        }
    }

    fn set_current_plan_file(&self, state: &mut MasterState, file: Option<PathBuf>) {
        if state.current_plan_file != file {
            state.current_plan_file = file.clone();
            let _ = self.events.send(PlanEvent::CurrentPlanFileChanged(file));
        }
    }

    /// Fold the per-category flags into the aggregate notifications. Gated
    /// on actual transitions unless `forced` (vehicle swap).
    fn notify_aggregates(&self, state: &mut MasterState, forced: bool) {
        let dirty = state.dirty();
        let contains_items = state.contains_items();
        let sync_in_progress = state.sync_in_progress();

        if forced || dirty != state.last_dirty {
            let _ = self.events.send(PlanEvent::DirtyChanged(dirty));
        }
        if forced || contains_items != state.last_contains_items {
            let _ = self
                .events
                .send(PlanEvent::ContainsItemsChanged(contains_items));
        }
        if forced || sync_in_progress != state.last_sync_in_progress {
            let _ = self
                .events
                .send(PlanEvent::SyncInProgressChanged(sync_in_progress));
        }

        state.last_dirty = dirty;
        state.last_contains_items = contains_items;
        state.last_sync_in_progress = sync_in_progress;
    }

    fn refresh_plan_creators(&self, state: &mut MasterState) {
        if state.view_mode != ViewMode::Interactive {
            return;
        }
        let creators = creators_for(state.vehicle.vehicle_class());
        if creators != state.plan_creators {
            state.plan_creators = creators.clone();
            let _ = self.events.send(PlanEvent::PlanCreatorsChanged(creators));
        }
    }
}

fn creators_for(vehicle_class: VehicleClass) -> Vec<PlanCreator> {
    let mut creators = vec![
        PlanCreator::Blank,
        PlanCreator::Survey,
        PlanCreator::CorridorScan,
    ];
    // Structure scans orbit a vertical surface; fixed wings cannot fly them.
    if vehicle_class != VehicleClass::FixedWing {
        creators.push(PlanCreator::StructureScan);
    }
    creators
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
