//! Export artifact builder.
//!
//! The JSON layout `{property, setbacks, adu, obstacles, analysis,
//! timestamp}` is consumed by other tools; keep field names stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bylaws::Municipality;
use crate::config::{AduModule, AduType, Config, ModuleSelection, PropertyFlags, TrackingFlags};
use crate::geometry::{LotMetrics, Point};
use crate::obstacles::Obstacle;
use crate::units::UnitSystem;
use crate::validator::{PlacementConflict, ValidationResult};

const FROM_BYLAWS: &str = "(from bylaws)";
const MANUAL: &str = "(manual)";

/// Everything the report is built from.
pub struct ReportInput<'a> {
    pub config: &'a Config,
    pub metrics: &'a LotMetrics,
    pub adu_position: Point,
    pub obstacles: &'a [Obstacle],
    pub validation: &'a ValidationResult,
    pub conflicts: &'a [PlacementConflict],
    pub municipality: Option<&'a Municipality>,
    pub property: PropertyFlags,
    pub tracking: TrackingFlags,
    pub module: ModuleSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub property: PropertySection,
    pub setbacks: SetbackSection,
    pub adu: AduSection,
    pub obstacles: Vec<Obstacle>,
    pub analysis: AnalysisSection,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySection {
    pub lot_width: f64,
    pub lot_depth: f64,
    pub lot_area: f64,
    pub units: UnitSystem,
    pub municipality: Option<MunicipalityRef>,
    pub is_corner_lot: bool,
    pub has_alley_access: bool,
    pub main_building_width: f64,
    pub main_building_depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityRef {
    pub id: String,
    pub name: String,
}

/// Setback values annotated with where they came from, e.g.
/// `"10 ft (from bylaws)"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetbackSection {
    pub front: String,
    pub rear: String,
    pub side: String,
    pub separation_from_main: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AduSection {
    #[serde(rename = "type")]
    pub adu_type: AduType,
    pub stories: u8,
    pub width: f64,
    pub depth: f64,
    pub area: f64,
    pub position: Point,
    pub module: AduModule,
    pub rotated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSection {
    pub lot_coverage_percent: f64,
    pub buildable_area: f64,
    pub adu_area: f64,
    pub separation_from_main: f64,
    pub placement_valid: bool,
    pub compliant: bool,
    pub placement_conflicts: Vec<PlacementConflict>,
    pub validation: ValidationResult,
}

fn annotated(feet: f64, from_bylaws: bool) -> String {
    format!(
        "{} ft {}",
        (feet * 10.0).round() / 10.0,
        if from_bylaws { FROM_BYLAWS } else { MANUAL }
    )
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Snapshot the current state. `timestamp` is supplied by the caller.
pub fn build_report(input: &ReportInput<'_>, timestamp: DateTime<Utc>) -> Report {
    let config = input.config;
    let placement_valid = input.conflicts.is_empty();
    Report {
        property: PropertySection {
            lot_width: config.lot_width,
            lot_depth: config.lot_depth,
            lot_area: input.metrics.lot_area,
            units: config.units,
            municipality: input.municipality.map(|m| MunicipalityRef {
                id: m.id.clone(),
                name: m.name.clone(),
            }),
            is_corner_lot: input.property.is_corner_lot,
            has_alley_access: input.property.has_alley_access,
            main_building_width: config.main_building_width,
            main_building_depth: config.main_building_depth,
        },
        setbacks: SetbackSection {
            front: annotated(config.front_setback, input.tracking.front),
            rear: annotated(config.rear_setback, input.tracking.rear),
            side: annotated(config.side_setback, input.tracking.side),
            separation_from_main: annotated(
                config.separation_from_main,
                input.tracking.separation_from_bylaws,
            ),
        },
        adu: AduSection {
            adu_type: config.adu_type,
            stories: config.adu_stories,
            width: config.adu_width,
            depth: config.adu_depth,
            area: input.metrics.adu_area,
            position: input.adu_position,
            module: input.module.module,
            rotated: input.module.rotated,
        },
        obstacles: input.obstacles.to_vec(),
        analysis: AnalysisSection {
            lot_coverage_percent: round2(input.metrics.coverage_percent),
            buildable_area: input.metrics.buildable_area_size,
            adu_area: input.metrics.adu_area,
            separation_from_main: config.separation_from_main,
            placement_valid,
            compliant: placement_valid && input.validation.is_valid,
            placement_conflicts: input.conflicts.to_vec(),
            validation: input.validation.clone(),
        },
        timestamp,
    }
}

impl Report {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
