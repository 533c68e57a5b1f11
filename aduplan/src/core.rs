//! Crate error type and the scenario evaluation API shared by the CLI
//! and embedding applications.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bylaws::MunicipalityTable;
use crate::config::{Config, ModuleSelection, PropertyFlags, Selection, TrackingFlags};
use crate::geometry::{buildable_area, metrics, LotMetrics, Point};
use crate::obstacles::Obstacle;
use crate::options::PlannerOptions;
use crate::report::{build_report, Report, ReportInput};
use crate::resolver::{resolve, Adjustment};
use crate::units::UnitError;
use crate::validator::{placement_conflicts, validate, PlacementConflict, ValidationResult};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown municipality: {0}")]
    UnknownMunicipality(String),
    #[error("Unknown obstacle: {0}")]
    UnknownObstacle(String),
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] UnitError),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// A saved lot configuration, evaluated in one shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub property: PropertyFlags,
    #[serde(default)]
    pub municipality_id: Option<String>,
    /// Run the constraint resolver before validating
    #[serde(default = "default_true")]
    pub apply_bylaws: bool,
    /// Bylaw provenance for setbacks when `apply_bylaws` is off
    #[serde(default)]
    pub tracking: TrackingFlags,
    #[serde(default)]
    pub module: ModuleSelection,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Defaults to the buildable area's front-left corner
    #[serde(default)]
    pub adu_position: Option<Point>,
}

fn default_true() -> bool {
    true
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, PlannerError> {
        let mut scenario: Scenario = serde_json::from_str(json)?;
        scenario.config = scenario.config.normalized();
        Ok(scenario)
    }

    pub fn from_path(path: &Path) -> Result<Self, PlannerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Result of evaluating a scenario.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub config: Config,
    pub tracking: TrackingFlags,
    pub adu_position: Point,
    pub metrics: LotMetrics,
    pub validation: ValidationResult,
    pub placement_valid: bool,
    pub conflicts: Vec<PlacementConflict>,
    pub adjustments: Vec<Adjustment>,
}

impl Evaluation {
    /// Placement and bylaw checks both pass
    pub fn is_valid(&self) -> bool {
        self.placement_valid && self.validation.is_valid
    }
}

/// Stateless evaluation API used by the CLI.
pub struct PlannerCore;

impl PlannerCore {
    pub fn evaluate(
        scenario: &Scenario,
        municipalities: &MunicipalityTable,
        options: &PlannerOptions,
    ) -> Result<Evaluation, PlannerError> {
        let municipality = match &scenario.municipality_id {
            Some(id) => Some(
                municipalities
                    .get(id)
                    .ok_or_else(|| PlannerError::UnknownMunicipality(id.clone()))?,
            ),
            None => None,
        };
        let bylaws = municipality.and_then(|m| m.bylaw_data.as_ref());

        let (config, tracking, adjustments) = if scenario.apply_bylaws {
            let selection = Selection::new(scenario.config.adu_type, scenario.config.adu_stories);
            let r = resolve(
                &scenario.config,
                selection,
                scenario.tracking,
                scenario.property,
                bylaws,
                options,
            );
            (r.config, r.tracking, r.adjustments)
        } else {
            (scenario.config.clone(), scenario.tracking, Vec::new())
        };

        let adu_position = scenario
            .adu_position
            .unwrap_or_else(|| buildable_area(&config).origin());
        let conflicts = placement_conflicts(&config, adu_position, &scenario.obstacles);
        let validation = validate(
            &config,
            &scenario.obstacles,
            bylaws,
            tracking,
            scenario.property,
            options,
        );
        tracing::debug!(
            "Evaluated scenario: {} violations, {} warnings, {} placement conflicts",
            validation.violations.len(),
            validation.warnings.len(),
            conflicts.len()
        );

        Ok(Evaluation {
            metrics: metrics(&config),
            placement_valid: conflicts.is_empty(),
            config,
            tracking,
            adu_position,
            validation,
            conflicts,
            adjustments,
        })
    }

    /// Evaluate and build the export artifact.
    pub fn export(
        scenario: &Scenario,
        municipalities: &MunicipalityTable,
        options: &PlannerOptions,
        timestamp: DateTime<Utc>,
    ) -> Result<Report, PlannerError> {
        let evaluation = Self::evaluate(scenario, municipalities, options)?;
        let municipality = scenario
            .municipality_id
            .as_deref()
            .and_then(|id| municipalities.get(id))
            .map(|m| m.as_ref());
        Ok(build_report(
            &ReportInput {
                config: &evaluation.config,
                metrics: &evaluation.metrics,
                adu_position: evaluation.adu_position,
                obstacles: &scenario.obstacles,
                validation: &evaluation.validation,
                conflicts: &evaluation.conflicts,
                municipality,
                property: scenario.property,
                tracking: evaluation.tracking,
                module: scenario.module,
            },
            timestamp,
        ))
    }
}
