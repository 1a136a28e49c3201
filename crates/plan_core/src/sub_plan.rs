use shared::{
    domain::{PlanCategory, PlanSection},
    error::PlanError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Sending,
}

/// Controller for one plan category. Owns the in-memory item collection and
/// the per-category dirty/sync flags; the orchestrator decides when device
/// operations start and which edits count as dirty-producing.
#[derive(Debug)]
pub struct SubPlanController {
    category: PlanCategory,
    state: SyncState,
    dirty: bool,
    section: PlanSection,
}

impl SubPlanController {
    pub fn new(category: PlanCategory) -> Self {
        Self {
            category,
            state: SyncState::Idle,
            dirty: false,
            section: PlanSection::empty(category),
        }
    }

    pub fn category(&self) -> PlanCategory {
        self.category
    }

    pub fn sync_state(&self) -> SyncState {
        self.state
    }

    pub fn sync_in_progress(&self) -> bool {
        self.state != SyncState::Idle
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Dirty is caller-controlled: loading and stale-plan discards are not
    /// edits, so clearing or replacing items never flips this implicitly.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn contains_items(&self) -> bool {
        !self.section.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.section.item_count()
    }

    /// Replace the item collection wholesale.
    pub fn load_section(&mut self, section: PlanSection) -> Result<(), PlanError> {
        if section.category() != self.category {
            return Err(PlanError::CategoryMismatch {
                expected: self.category,
                actual: section.category(),
            });
        }
        self.section = section;
        Ok(())
    }

    pub fn save_section(&self) -> PlanSection {
        self.section.clone()
    }

    /// Clear in-memory items. Does not touch the device or the dirty bit.
    pub fn remove_all(&mut self) {
        self.section = PlanSection::empty(self.category);
    }

    pub fn begin_load(&mut self) {
        self.state = SyncState::Loading;
    }

    pub fn begin_send(&mut self) {
        self.state = SyncState::Sending;
    }

    pub fn complete_sync(&mut self) {
        self.state = SyncState::Idle;
    }
}

#[cfg(test)]
#[path = "tests/sub_plan_tests.rs"]
mod tests;
