//! AduPlan - lot configurator engine for accessory dwelling units
//!
//! This library derives the buildable area of a residential lot from its
//! setbacks, reconciles municipal bylaw constraints with manual edits, and
//! checks an ADU placement against geometry and bylaw rules.
//!
//! # Quick Start
//!
//! ```no_run
//! use aduplan::{MunicipalityTable, PlannerCore, PlannerOptions, Scenario};
//! use std::path::Path;
//!
//! let table = MunicipalityTable::from_path(Path::new("municipalities.json")).unwrap();
//! let scenario = Scenario::from_path(Path::new("lot.json")).unwrap();
//! let evaluation = PlannerCore::evaluate(&scenario, &table, &PlannerOptions::default()).unwrap();
//!
//! for violation in &evaluation.validation.violations {
//!     println!("{}: {}", violation.kind, violation.message);
//! }
//! ```
//!
//! # Features
//!
//! - **Geometry**: buildable area, containment, overlap and lot metrics
//! - **Constraint resolution**: bylaw setbacks with corner/alley variants,
//!   separation defaults, ADU type/size/story caps
//! - **Validation**: structured violations and warnings, never fatal
//! - **Interaction**: throttled drag and resize state machines
//! - **Export**: stable JSON report

pub mod bylaws;
pub mod config;
pub mod core;
pub mod geometry;
pub mod interaction;
pub mod obstacles;
pub mod options;
pub mod report;
pub mod resolver;
pub mod session;
pub mod units;
pub mod validator;

// Re-export main types
pub use bylaws::{AduTypesAllowed, BylawData, Municipality, MunicipalityTable};
pub use config::{
    AduModule, AduType, Config, ModuleSelection, PropertyFlags, Selection, TrackingFlags,
};
pub use crate::core::{Evaluation, PlannerCore, PlannerError, Scenario};
pub use geometry::{buildable_area, metrics, LotMetrics, Point, Rect};
pub use interaction::ElementRef;
pub use obstacles::{Obstacle, ObstacleKind};
pub use options::PlannerOptions;
pub use report::{build_report, Report};
pub use resolver::{resolve, Resolution};
pub use session::{Action, DimensionField, Session};
pub use units::{parse_feet_and_inches, to_display, to_feet_and_inches, UnitError, UnitSystem};
pub use validator::{
    check_placement, placement_conflicts, validate, PlacementConflict, ValidationResult,
    Violation, Warning,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Action, AduType, BylawData, Config, DimensionField, ElementRef, Evaluation,
        MunicipalityTable, Obstacle, ObstacleKind, PlannerCore, PlannerError, PlannerOptions,
        Point, PropertyFlags, Scenario, Session, UnitSystem, ValidationResult,
    };
}
