//! Session store behaviour: constraint precedence, interaction and repair

use aduplan::prelude::*;
use aduplan::config::AduModule;
use aduplan::interaction::DragState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn session() -> Session {
    let table = MunicipalityTable::from_path(&fixture_path("municipalities.json"))
        .expect("Should load municipality fixture");
    Session::with_seed(Arc::new(table), PlannerOptions::default(), 42)
}

fn violation_kinds(session: &Session) -> Vec<String> {
    session
        .validation()
        .violations
        .iter()
        .map(|v| v.kind.clone())
        .collect()
}

#[test]
fn test_initial_state() {
    let session = session();
    let config = session.config();
    assert_eq!((config.lot_width, config.lot_depth), (65.0, 120.0));
    assert_eq!(config.separation_from_main, 16.4);
    assert_eq!(session.adu_position(), Point::new(4.0, 10.0));
    assert!(session.municipality().is_none());
    assert!(session.is_valid());
}

#[test]
fn test_bylaws_take_precedence_until_manual_edit() {
    let mut session = session();
    session
        .dispatch(Action::SelectMunicipality(Some("1".to_string())))
        .expect("Known municipality");
    assert_eq!(session.config().front_setback, 10.0);
    assert!(session.tracking().front);
    assert!(session.is_locked(DimensionField::FrontSetback));
    assert_eq!(session.config().separation_from_main, 12.0);

    session
        .dispatch(Action::SetDimension(DimensionField::FrontSetback, 6.0))
        .unwrap();
    assert_eq!(session.config().front_setback, 6.0);
    assert!(!session.tracking().front);
    assert!(!session.is_locked(DimensionField::FrontSetback));
    assert!(violation_kinds(&session).contains(&"front_setback".to_string()));

    // Re-selecting restores the bylaw value
    session
        .dispatch(Action::SelectMunicipality(Some("1".to_string())))
        .unwrap();
    assert_eq!(session.config().front_setback, 10.0);
    assert!(session.tracking().front);
    assert!(session.validation().is_valid);
}

#[test]
fn test_alley_and_corner_variants() {
    let mut session = session();
    session
        .dispatch(Action::SelectMunicipality(Some("1".to_string())))
        .unwrap();

    session.dispatch(Action::SetAlleyAccess(true)).unwrap();
    assert_eq!(session.config().rear_setback, 3.0);
    session.dispatch(Action::SetAlleyAccess(false)).unwrap();
    assert_eq!(session.config().rear_setback, 5.0);

    session.dispatch(Action::SetCornerLot(true)).unwrap();
    assert_eq!(session.config().side_setback, 8.0);
    assert!(session.tracking().side);
}

#[test]
fn test_clearing_municipality_keeps_values_and_unlocks() {
    let mut session = session();
    session
        .dispatch(Action::SelectMunicipality(Some("1".to_string())))
        .unwrap();
    session.dispatch(Action::SelectMunicipality(None)).unwrap();

    assert_eq!(session.config().front_setback, 10.0);
    let tracking = session.tracking();
    assert!(!tracking.front && !tracking.rear && !tracking.side);
    assert!(!tracking.separation_from_bylaws);
    assert_eq!(session.config().separation_from_main, 16.4);
    assert!(session.validation().violations.is_empty());
}

#[test]
fn test_unknown_municipality_leaves_state_untouched() {
    let mut session = session();
    let before = session.config().clone();
    let result = session.dispatch(Action::SelectMunicipality(Some("atlantis".to_string())));
    assert!(matches!(result, Err(PlannerError::UnknownMunicipality(_))));
    assert_eq!(session.config(), &before);
}

#[test]
fn test_restrictive_municipality_corrects_selection() {
    let mut session = session();
    session.dispatch(Action::SetAduType(AduType::Attached)).unwrap();
    session.dispatch(Action::SetStories(2)).unwrap();
    assert_eq!(session.config().separation_from_main, 24.6);

    session
        .dispatch(Action::SelectMunicipality(Some("2".to_string())))
        .unwrap();
    let config = session.config();
    assert_eq!(config.adu_type, AduType::Detached);
    assert_eq!(config.adu_stories, 1);
    assert_eq!(session.selection().stories, 1);
    assert_eq!(config.separation_from_main, 16.4);
    assert!(config.adu_width * config.adu_depth <= 400.0);
    assert_eq!(session.module().module, AduModule::Custom);
    assert!(!session.last_adjustments().is_empty());
    assert!(session.validation().is_valid, "{:?}", session.validation().violations);
}

#[test]
fn test_front_setback_violation_is_monotonic() {
    let mut session = session();
    session
        .dispatch(Action::SelectMunicipality(Some("1".to_string())))
        .unwrap();

    session
        .dispatch(Action::SetDimension(DimensionField::FrontSetback, 12.0))
        .unwrap();
    assert!(!violation_kinds(&session).contains(&"front_setback".to_string()));

    session
        .dispatch(Action::SetDimension(DimensionField::FrontSetback, 8.0))
        .unwrap();
    assert!(violation_kinds(&session).contains(&"front_setback".to_string()));
}

#[test]
fn test_capped_stories_match_explicit_story_choice() {
    let mut capped = session();
    capped.dispatch(Action::SetStories(2)).unwrap();
    capped
        .dispatch(Action::SelectMunicipality(Some("2".to_string())))
        .unwrap();

    let mut explicit = session();
    explicit
        .dispatch(Action::SelectMunicipality(Some("2".to_string())))
        .unwrap();
    explicit.dispatch(Action::SetStories(1)).unwrap();

    assert_eq!(capped.config().adu_stories, 1);
    assert_eq!(
        capped.config().separation_from_main,
        explicit.config().separation_from_main
    );
    assert_eq!(capped.config().separation_from_main, 16.4);
}

#[test]
fn test_drag_throttles_and_commits_on_release() {
    let mut session = session();
    session
        .dispatch(Action::ContainerResized {
            width_px: 650.0,
            height_px: 1200.0,
        })
        .unwrap();
    assert_eq!(session.scale().pixels_per_foot(), 10.0);

    let t0 = Instant::now();
    session
        .dispatch(Action::PointerDown {
            target: ElementRef::Adu,
            pointer: Point::new(45.0, 105.0),
            now: t0,
        })
        .unwrap();
    assert!(session.drag_state().is_active());
    assert_eq!(session.selected(), Some(&ElementRef::Adu));

    session
        .dispatch(Action::PointerMove {
            pointer: Point::new(205.0, 305.0),
            now: t0,
        })
        .unwrap();
    assert_eq!(session.adu_position(), Point::new(20.0, 30.0));

    session
        .dispatch(Action::PointerMove {
            pointer: Point::new(255.0, 305.0),
            now: t0 + Duration::from_millis(30),
        })
        .unwrap();
    // Overlay moved, committed state throttled
    assert_eq!(session.adu_position(), Point::new(20.0, 30.0));
    assert_eq!(
        session.drag_state().overlay(),
        Some((&ElementRef::Adu, Point::new(25.0, 30.0)))
    );

    session.dispatch(Action::PointerUp).unwrap();
    assert_eq!(session.adu_position(), Point::new(25.0, 30.0));
    assert_eq!(session.drag_state(), &DragState::Idle);
}

#[test]
fn test_drag_outside_buildable_area_flags_placement() {
    let mut session = session();
    session
        .dispatch(Action::ContainerResized {
            width_px: 650.0,
            height_px: 1200.0,
        })
        .unwrap();
    let t0 = Instant::now();
    session
        .dispatch(Action::PointerDown {
            target: ElementRef::Adu,
            pointer: Point::new(40.0, 100.0),
            now: t0,
        })
        .unwrap();
    session
        .dispatch(Action::PointerMove {
            pointer: Point::new(0.0, 0.0),
            now: t0,
        })
        .unwrap();
    session.dispatch(Action::PointerCancel).unwrap();

    // Drag is bounded by the lot only
    assert_eq!(session.adu_position(), Point::new(0.0, 0.0));
    assert!(!session.placement_valid());
    assert!(!session.is_valid());
}

#[test]
fn test_resize_adu_switches_to_custom() {
    let mut session = session();
    session
        .dispatch(Action::ContainerResized {
            width_px: 650.0,
            height_px: 1200.0,
        })
        .unwrap();
    session
        .dispatch(Action::ResizeStart {
            target: ElementRef::Adu,
            pointer: Point::new(0.0, 0.0),
        })
        .unwrap();
    assert!(session.is_resizing());

    session
        .dispatch(Action::PointerMove {
            pointer: Point::new(40.0, -1000.0),
            now: Instant::now(),
        })
        .unwrap();
    // Width 20 + 4, depth floored at 5 then held at the ADU minimum
    assert_eq!(session.config().adu_width, 24.0);
    assert_eq!(session.config().adu_depth, 10.0);
    assert_eq!(session.module().module, AduModule::Custom);

    session.dispatch(Action::PointerUp).unwrap();
    assert!(!session.is_resizing());
}

#[test]
fn test_resize_obstacle_respects_minimum() {
    let mut session = session();
    session.dispatch(Action::AddObstacle(ObstacleKind::Tree)).unwrap();
    let id = session.obstacles()[0].id.clone();
    session
        .dispatch(Action::ContainerResized {
            width_px: 650.0,
            height_px: 1200.0,
        })
        .unwrap();
    session
        .dispatch(Action::ResizeStart {
            target: ElementRef::Obstacle(id),
            pointer: Point::new(100.0, 100.0),
        })
        .unwrap();
    session
        .dispatch(Action::PointerMove {
            pointer: Point::new(0.0, 120.0),
            now: Instant::now(),
        })
        .unwrap();

    let tree = &session.obstacles()[0];
    assert_eq!((tree.width, tree.depth), (5.0, 12.0));
}

#[test]
fn test_containment_repair_after_lot_shrink() {
    let mut session = session();
    session
        .dispatch(Action::MoveAdu(Point::new(41.0, 91.0)))
        .unwrap();
    assert!(session.placement_valid());

    session
        .dispatch(Action::SetDimension(DimensionField::LotWidth, 50.0))
        .unwrap();
    assert_eq!(session.adu_position(), Point::new(26.0, 91.0));
    assert!(session.placement_valid());
}

#[test]
fn test_text_input_parsing_and_rejection() {
    let mut session = session();
    session
        .dispatch(Action::SetDimensionText(
            DimensionField::FrontSetback,
            "12' 6\"".to_string(),
        ))
        .unwrap();
    assert_eq!(session.config().front_setback, 12.5);
    assert!(session.last_input_error().is_none());

    let rejected = session.dispatch(Action::SetDimensionText(
        DimensionField::FrontSetback,
        "abc".to_string(),
    ));
    assert!(matches!(rejected, Err(PlannerError::InvalidInput(_))));
    assert_eq!(session.config().front_setback, 12.5);
    let error = session.last_input_error().expect("Should record the error");
    assert_eq!(error.field, DimensionField::FrontSetback);
    assert_eq!(error.text, "abc");

    session
        .dispatch(Action::SetDimension(DimensionField::FrontSetback, 11.0))
        .unwrap();
    assert!(session.last_input_error().is_none());
}

#[test]
fn test_metric_text_input() {
    let mut session = session();
    session.dispatch(Action::SetUnits(UnitSystem::Metric)).unwrap();
    session
        .dispatch(Action::SetDimensionText(
            DimensionField::LotWidth,
            "30.48".to_string(),
        ))
        .unwrap();
    assert!((session.config().lot_width - 100.0).abs() < 1e-9);
}

#[test]
fn test_module_selection_and_rotation() {
    let mut session = session();
    session
        .dispatch(Action::SelectModule(AduModule::TwoBedroom))
        .unwrap();
    assert_eq!(
        (session.config().adu_width, session.config().adu_depth),
        (24.0, 32.0)
    );

    session.dispatch(Action::ToggleRotation).unwrap();
    assert!(session.module().rotated);
    assert_eq!(
        (session.config().adu_width, session.config().adu_depth),
        (32.0, 24.0)
    );

    session
        .dispatch(Action::SetDimension(DimensionField::AduWidth, 18.0))
        .unwrap();
    assert_eq!(session.module().module, AduModule::Custom);
    session.dispatch(Action::ToggleRotation).unwrap();
    assert_eq!(session.config().adu_width, 18.0);
}

#[test]
fn test_add_and_remove_obstacles() {
    let mut session = session();
    session
        .dispatch(Action::AddObstacle(ObstacleKind::Shed))
        .unwrap();
    assert_eq!(session.obstacles().len(), 1);
    let shed = session.obstacles()[0].clone();
    assert_eq!((shed.width, shed.depth), (10.0, 12.0));
    assert!(shed.x >= 0.0 && shed.x + shed.width <= 65.0);
    assert!(shed.y >= 0.0 && shed.y + shed.depth <= 120.0);

    session
        .dispatch(Action::Select(Some(ElementRef::Obstacle(shed.id.clone()))))
        .unwrap();
    session
        .dispatch(Action::RemoveObstacle(shed.id.clone()))
        .unwrap();
    assert!(session.obstacles().is_empty());
    assert!(session.selected().is_none());

    let missing = session.dispatch(Action::RemoveObstacle(shed.id));
    assert!(matches!(missing, Err(PlannerError::UnknownObstacle(_))));
}

#[test]
fn test_residence_separation_conflict() {
    let mut session = session();
    session
        .dispatch(Action::AddObstacle(ObstacleKind::Residence))
        .unwrap();
    let house = session.obstacles()[0].clone();
    session
        .dispatch(Action::MoveAdu(Point::new(house.x, house.y)))
        .unwrap();
    assert!(!session.placement_valid());
}

#[test]
fn test_container_scale_is_clamped() {
    let mut session = session();
    session
        .dispatch(Action::ContainerResized {
            width_px: 100_000.0,
            height_px: 100_000.0,
        })
        .unwrap();
    assert_eq!(session.scale().pixels_per_foot(), 12.0);

    session
        .dispatch(Action::ContainerResized {
            width_px: 1.0,
            height_px: 1.0,
        })
        .unwrap();
    assert_eq!(session.scale().pixels_per_foot(), 0.2);
}

#[test]
fn test_session_report() {
    use chrono::TimeZone;

    let mut session = session();
    session
        .dispatch(Action::SelectMunicipality(Some("1".to_string())))
        .unwrap();
    let ts = chrono::Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let json = serde_json::to_value(session.report(ts)).unwrap();
    assert_eq!(json["setbacks"]["front"], "10 ft (from bylaws)");
    assert_eq!(json["analysis"]["compliant"], true);
    assert_eq!(json["adu"]["module"], serde_json::json!("one_bedroom"));
}
