use super::*;
use shared::domain::{GeoCoordinate, MissionItem};

fn mission_items(count: usize) -> PlanSection {
    let items = (0..count)
        .map(|i| {
            MissionItem::waypoint(
                i as u32 + 1,
                GeoCoordinate::new(47.397 + i as f64 * 0.001, 8.545, 50.0),
            )
        })
        .collect();
    PlanSection::Mission { items }
}

#[test]
fn starts_idle_clean_and_empty() {
    let controller = SubPlanController::new(PlanCategory::Mission);
    assert_eq!(controller.sync_state(), SyncState::Idle);
    assert!(!controller.sync_in_progress());
    assert!(!controller.dirty());
    assert!(!controller.contains_items());
    assert_eq!(controller.item_count(), 0);
}

#[test]
fn load_section_replaces_items_wholesale() {
    let mut controller = SubPlanController::new(PlanCategory::Mission);
    controller
        .load_section(mission_items(3))
        .expect("matching category");
    assert_eq!(controller.item_count(), 3);

    controller
        .load_section(mission_items(1))
        .expect("matching category");
    assert_eq!(controller.item_count(), 1);
}

#[test]
fn load_section_rejects_category_mismatch() {
    let mut controller = SubPlanController::new(PlanCategory::GeoFence);
    let err = controller
        .load_section(mission_items(2))
        .expect_err("mission items into a fence controller");
    assert!(matches!(
        err,
        PlanError::CategoryMismatch {
            expected: PlanCategory::GeoFence,
            actual: PlanCategory::Mission,
        }
    ));
    assert!(!controller.contains_items());
}

#[test]
fn remove_all_clears_items_but_not_dirty() {
    let mut controller = SubPlanController::new(PlanCategory::Mission);
    controller
        .load_section(mission_items(2))
        .expect("matching category");
    controller.set_dirty(true);

    controller.remove_all();
    assert!(!controller.contains_items());
    assert!(controller.dirty());
}

#[test]
fn dirty_never_flips_implicitly() {
    let mut controller = SubPlanController::new(PlanCategory::Mission);
    controller
        .load_section(mission_items(5))
        .expect("matching category");
    assert!(!controller.dirty());

    controller.set_dirty(true);
    controller
        .load_section(mission_items(1))
        .expect("matching category");
    assert!(controller.dirty());
}

#[test]
fn sync_state_round_trip() {
    let mut controller = SubPlanController::new(PlanCategory::RallyPoint);

    controller.begin_load();
    assert_eq!(controller.sync_state(), SyncState::Loading);
    assert!(controller.sync_in_progress());

    controller.complete_sync();
    assert_eq!(controller.sync_state(), SyncState::Idle);

    controller.begin_send();
    assert_eq!(controller.sync_state(), SyncState::Sending);
    controller.complete_sync();
    assert!(!controller.sync_in_progress());
}
