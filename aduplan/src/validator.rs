//! Bylaw compliance rules and geometric placement checks.
//!
//! [`validate`] runs every rule of the default [`RulesEngine`] and never
//! stops at the first failure. Each rule only fires when the bylaw field
//! it depends on is present. Warnings never affect validity.
//!
//! [`check_placement`] is independent of bylaws: the ADU must sit inside
//! the buildable area, clear of every obstacle and outside the main
//! residence's separation boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bylaws::BylawData;
use crate::config::{AduType, Config, PropertyFlags, TrackingFlags};
use crate::geometry::{buildable_area, metrics, LotMetrics, Point, Rect};
use crate::obstacles::{main_residence, Obstacle};
use crate::options::PlannerOptions;

/// Either a number (feet, square feet, percent, count) or a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Number(f64),
    Text(String),
}

impl From<f64> for Measure {
    fn from(v: f64) -> Self {
        Measure::Number(v)
    }
}

impl From<&str> for Measure {
    fn from(v: &str) -> Self {
        Measure::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub requirement: String,
    pub current_value: Measure,
    pub required_value: Measure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn from_findings(findings: Findings) -> Self {
        Self {
            is_valid: findings.violations.is_empty(),
            violations: findings.violations,
            warnings: findings.warnings,
        }
    }
}

/// Collector the rules append to.
#[derive(Debug, Default)]
pub struct Findings {
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl Findings {
    pub fn violation(
        &mut self,
        kind: &str,
        message: String,
        requirement: String,
        current_value: impl Into<Measure>,
        required_value: impl Into<Measure>,
    ) {
        self.violations.push(Violation {
            kind: kind.to_string(),
            message,
            requirement,
            current_value: current_value.into(),
            required_value: required_value.into(),
        });
    }

    pub fn warning(&mut self, kind: &str, message: String, details: String) {
        self.warnings.push(Warning {
            kind: kind.to_string(),
            message,
            details,
        });
    }
}

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub config: &'a Config,
    pub obstacles: &'a [Obstacle],
    pub bylaws: &'a BylawData,
    pub tracking: TrackingFlags,
    pub property: PropertyFlags,
    pub metrics: LotMetrics,
    pub options: &'a PlannerOptions,
}

impl RuleContext<'_> {
    /// Footprint of the main building: the first residence obstacle if one
    /// exists, otherwise the configured main-building size.
    pub fn main_building_area(&self) -> f64 {
        match main_residence(self.obstacles) {
            Some(residence) => residence.width * residence.depth,
            None => self.config.main_building_width * self.config.main_building_depth,
        }
    }
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings);
}

pub struct RulesEngine {
    rules: Vec<Arc<dyn Rule>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Arc::new(SetbackRule));
        engine.add_rule(Arc::new(AduTypeRule));
        engine.add_rule(Arc::new(StoryLimitRule));
        engine.add_rule(Arc::new(HeightEstimateRule));
        engine.add_rule(Arc::new(LotDimensionRule));
        engine.add_rule(Arc::new(AduSizeRule));
        engine.add_rule(Arc::new(LotCoverageRule));
        engine.add_rule(Arc::new(ImperviousSurfaceRule));
        engine.add_rule(Arc::new(ParkingRule));
        engine.add_rule(Arc::new(SeparationDisclosureRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter()
    }

    pub fn run(&self, ctx: &RuleContext<'_>) -> ValidationResult {
        let mut findings = Findings::default();
        for rule in &self.rules {
            rule.check(ctx, &mut findings);
        }
        ValidationResult::from_findings(findings)
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// Run the default rule set. Without a bylaw record nothing is checked.
pub fn validate(
    config: &Config,
    obstacles: &[Obstacle],
    bylaws: Option<&BylawData>,
    tracking: TrackingFlags,
    property: PropertyFlags,
    options: &PlannerOptions,
) -> ValidationResult {
    let Some(bylaws) = bylaws else {
        return ValidationResult::default();
    };
    let ctx = RuleContext {
        config,
        obstacles,
        bylaws,
        tracking,
        property,
        metrics: metrics(config),
        options,
    };
    RulesEngine::with_default_rules().run(&ctx)
}

fn fmt_ft(v: f64) -> String {
    format!("{} ft", (v * 10.0).round() / 10.0)
}

// Rule implementations

pub struct SetbackRule;

impl Rule for SetbackRule {
    fn id(&self) -> &str {
        "setbacks"
    }

    fn name(&self) -> &str {
        "Minimum setbacks"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        let b = ctx.bylaws;
        let checks = [
            (
                "front_setback",
                "Front",
                ctx.config.front_setback,
                b.front_setback_min_ft,
                ctx.tracking.front,
            ),
            (
                "rear_setback",
                "Rear",
                ctx.config.rear_setback,
                b.rear_setback_for(ctx.property.has_alley_access),
                ctx.tracking.rear,
            ),
            (
                "side_setback",
                "Side",
                ctx.config.side_setback,
                b.side_setback_for(ctx.property.is_corner_lot),
                ctx.tracking.side,
            ),
        ];
        for (kind, label, current, minimum, from_bylaws) in checks {
            // Values applied from the bylaws are compliant by construction
            if from_bylaws {
                continue;
            }
            if let Some(min) = minimum {
                if current < min {
                    findings.violation(
                        kind,
                        format!(
                            "{} setback of {} is below the required {}",
                            label,
                            fmt_ft(current),
                            fmt_ft(min)
                        ),
                        format!("Minimum {} setback", label.to_lowercase()),
                        current,
                        min,
                    );
                }
            }
        }
    }
}

pub struct AduTypeRule;

impl Rule for AduTypeRule {
    fn id(&self) -> &str {
        "adu_type"
    }

    fn name(&self) -> &str {
        "Permitted ADU type"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        let Some(allowed) = ctx.bylaws.adu_types_allowed.as_ref() else {
            return;
        };
        let adu_type = ctx.config.adu_type;
        if !allowed.permits(adu_type) {
            let permitted: Vec<&str> = [
                AduType::Detached,
                AduType::Attached,
                AduType::GarageConversion,
            ]
            .into_iter()
            .filter(|t| allowed.permits(*t))
            .map(|t| t.key())
            .collect();
            let permitted = if permitted.is_empty() {
                "none".to_string()
            } else {
                permitted.join(", ")
            };
            findings.violation(
                self.id(),
                format!("{} is not permitted in this municipality", adu_type.label()),
                "Permitted ADU types".to_string(),
                adu_type.key(),
                permitted.as_str(),
            );
        }
    }
}

pub struct StoryLimitRule;

impl Rule for StoryLimitRule {
    fn id(&self) -> &str {
        "stories"
    }

    fn name(&self) -> &str {
        "Story limit"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        if let Some(max) = ctx.bylaws.detached_adu_max_stories {
            let stories = u32::from(ctx.config.adu_stories);
            if stories > max {
                findings.violation(
                    self.id(),
                    format!("{} stories exceeds the maximum of {}", stories, max),
                    "Maximum ADU stories".to_string(),
                    f64::from(stories),
                    f64::from(max),
                );
            }
        }
    }
}

pub struct HeightEstimateRule;

impl Rule for HeightEstimateRule {
    fn id(&self) -> &str {
        "height"
    }

    fn name(&self) -> &str {
        "Height estimate"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        if let Some(max) = ctx.bylaws.detached_adu_max_height_ft {
            let estimate = f64::from(ctx.config.adu_stories) * ctx.options.feet_per_story;
            if estimate > max {
                findings.warning(
                    self.id(),
                    format!(
                        "Estimated height of {} may exceed the {} limit",
                        fmt_ft(estimate),
                        fmt_ft(max)
                    ),
                    format!(
                        "Estimate assumes {} per story; confirm with the actual design",
                        fmt_ft(ctx.options.feet_per_story)
                    ),
                );
            }
        }
    }
}

pub struct LotDimensionRule;

impl Rule for LotDimensionRule {
    fn id(&self) -> &str {
        "lot_dimensions"
    }

    fn name(&self) -> &str {
        "Minimum lot size"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        let b = ctx.bylaws;
        if let Some(min) = b.min_lot_size_sqft {
            if ctx.metrics.lot_area < min {
                findings.violation(
                    "lot_size",
                    format!(
                        "Lot area of {} sq ft is below the required {} sq ft",
                        ctx.metrics.lot_area, min
                    ),
                    "Minimum lot size".to_string(),
                    ctx.metrics.lot_area,
                    min,
                );
            }
        }
        if let Some(min) = b.min_lot_width_ft {
            if ctx.config.lot_width < min {
                findings.violation(
                    "lot_width",
                    format!(
                        "Lot width of {} is below the required {}",
                        fmt_ft(ctx.config.lot_width),
                        fmt_ft(min)
                    ),
                    "Minimum lot width".to_string(),
                    ctx.config.lot_width,
                    min,
                );
            }
        }
        if let Some(min) = b.min_lot_depth_ft {
            if ctx.config.lot_depth < min {
                findings.violation(
                    "lot_depth",
                    format!(
                        "Lot depth of {} is below the required {}",
                        fmt_ft(ctx.config.lot_depth),
                        fmt_ft(min)
                    ),
                    "Minimum lot depth".to_string(),
                    ctx.config.lot_depth,
                    min,
                );
            }
        }
    }
}

pub struct AduSizeRule;

impl Rule for AduSizeRule {
    fn id(&self) -> &str {
        "adu_size"
    }

    fn name(&self) -> &str {
        "ADU size bounds"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        let area = ctx.metrics.adu_area;
        if let Some(min) = ctx.bylaws.detached_adu_min_size_sqft {
            if area < min {
                findings.violation(
                    "adu_size_min",
                    format!("ADU area of {} sq ft is below the minimum {} sq ft", area, min),
                    "Minimum ADU size".to_string(),
                    area,
                    min,
                );
            }
        }
        if let Some(max) = ctx.bylaws.detached_adu_max_size_sqft {
            if area > max {
                findings.violation(
                    "adu_size_max",
                    format!("ADU area of {} sq ft exceeds the maximum {} sq ft", area, max),
                    "Maximum ADU size".to_string(),
                    area,
                    max,
                );
            }
        }
    }
}

pub struct LotCoverageRule;

impl Rule for LotCoverageRule {
    fn id(&self) -> &str {
        "lot_coverage"
    }

    fn name(&self) -> &str {
        "Lot coverage"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        if let Some(max) = ctx.bylaws.max_lot_coverage_percent {
            let coverage = ctx.metrics.coverage_percent;
            if coverage > max {
                findings.violation(
                    self.id(),
                    format!("Lot coverage of {:.1}% exceeds the maximum {}%", coverage, max),
                    "Maximum lot coverage".to_string(),
                    coverage,
                    max,
                );
            }
        }
    }
}

pub struct ImperviousSurfaceRule;

impl Rule for ImperviousSurfaceRule {
    fn id(&self) -> &str {
        "impervious_surface"
    }

    fn name(&self) -> &str {
        "Impervious surface"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        let Some(max) = ctx.bylaws.max_impervious_surface_percent else {
            return;
        };
        if ctx.metrics.lot_area <= 0.0 {
            return;
        }
        let total =
            ctx.metrics.adu_area + ctx.main_building_area() + ctx.options.driveway_estimate_sqft;
        let percent = total / ctx.metrics.lot_area * 100.0;
        if percent > max {
            findings.violation(
                self.id(),
                format!(
                    "Estimated impervious surface of {:.1}% exceeds the maximum {}%",
                    percent, max
                ),
                "Maximum impervious surface".to_string(),
                percent,
                max,
            );
        } else if percent >= max * ctx.options.impervious_warning_ratio {
            findings.warning(
                self.id(),
                format!(
                    "Estimated impervious surface of {:.1}% is close to the {}% limit",
                    percent, max
                ),
                format!(
                    "Estimate includes ADU, main building and a {} sq ft driveway",
                    ctx.options.driveway_estimate_sqft
                ),
            );
        }
    }
}

pub struct ParkingRule;

impl Rule for ParkingRule {
    fn id(&self) -> &str {
        "parking"
    }

    fn name(&self) -> &str {
        "Parking requirement"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        if let Some(spaces) = ctx.bylaws.adu_parking_spaces_required {
            if spaces > 0 {
                findings.warning(
                    self.id(),
                    format!(
                        "{} parking space{} required for the ADU",
                        spaces,
                        if spaces == 1 { "" } else { "s" }
                    ),
                    "Parking is not modelled on the lot plan; make sure space is available"
                        .to_string(),
                );
            }
        }
    }
}

pub struct SeparationDisclosureRule;

impl Rule for SeparationDisclosureRule {
    fn id(&self) -> &str {
        "separation_default"
    }

    fn name(&self) -> &str {
        "Separation source"
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        if ctx.bylaws.distance_from_primary_ft.is_none() {
            findings.warning(
                self.id(),
                format!(
                    "Separation of {} from the main dwelling is a default, not a bylaw value",
                    fmt_ft(ctx.config.separation_from_main)
                ),
                "Verify the required separation with the municipality".to_string(),
            );
        }
    }
}

/// Why a placement is geometrically invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementConflict {
    OutsideBuildableArea,
    ObstacleOverlap { obstacle_id: String },
    TooCloseToResidence { obstacle_id: String, separation_ft: f64 },
}

/// Every geometric problem with placing the ADU at `adu_position`.
pub fn placement_conflicts(
    config: &Config,
    adu_position: Point,
    obstacles: &[Obstacle],
) -> Vec<PlacementConflict> {
    let adu = Rect::at(adu_position, config.adu_width, config.adu_depth);
    let mut conflicts = Vec::new();

    if !buildable_area(config).contains(&adu) {
        conflicts.push(PlacementConflict::OutsideBuildableArea);
    }
    for obstacle in obstacles {
        if adu.overlaps(&obstacle.rect()) {
            conflicts.push(PlacementConflict::ObstacleOverlap {
                obstacle_id: obstacle.id.clone(),
            });
        }
    }
    if let Some(residence) = main_residence(obstacles) {
        let boundary = residence.rect().inflate(config.separation_from_main);
        if adu.overlaps(&boundary) {
            conflicts.push(PlacementConflict::TooCloseToResidence {
                obstacle_id: residence.id.clone(),
                separation_ft: config.separation_from_main,
            });
        }
    }
    conflicts
}

pub fn check_placement(config: &Config, adu_position: Point, obstacles: &[Obstacle]) -> bool {
    placement_conflicts(config, adu_position, obstacles).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bylaws::AduTypesAllowed;
    use crate::obstacles::ObstacleKind;

    fn obstacle(id: &str, kind: ObstacleKind, x: f64, y: f64, width: f64, depth: f64) -> Obstacle {
        Obstacle {
            id: id.to_string(),
            kind,
            width,
            depth,
            x,
            y,
        }
    }

    fn run(config: &Config, bylaws: &BylawData, tracking: TrackingFlags) -> ValidationResult {
        validate(
            config,
            &[],
            Some(bylaws),
            tracking,
            PropertyFlags::default(),
            &PlannerOptions::default(),
        )
    }

    fn kinds(result: &ValidationResult) -> Vec<&str> {
        result.violations.iter().map(|v| v.kind.as_str()).collect()
    }

    #[test]
    fn test_no_bylaws_is_valid() {
        let result = validate(
            &Config::default(),
            &[],
            None,
            TrackingFlags::default(),
            PropertyFlags::default(),
            &PlannerOptions::default(),
        );
        assert!(result.is_valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_setback_violation_respects_tracking() {
        let bylaws = BylawData {
            front_setback_min_ft: Some(10.0),
            ..BylawData::default()
        };
        let config = Config::default().with_front_setback(6.0);
        let manual = run(&config, &bylaws, TrackingFlags::default());
        assert!(!manual.is_valid);
        assert_eq!(kinds(&manual), vec!["front_setback"]);

        let tracked = run(
            &config,
            &bylaws,
            TrackingFlags {
                front: true,
                ..TrackingFlags::default()
            },
        );
        assert!(tracked.is_valid);
    }

    #[test]
    fn test_front_setback_monotonic() {
        let bylaws = BylawData {
            front_setback_min_ft: Some(10.0),
            ..BylawData::default()
        };
        let above = run(
            &Config::default().with_front_setback(12.0),
            &bylaws,
            TrackingFlags::default(),
        );
        assert!(!kinds(&above).contains(&"front_setback"));
        let below = run(
            &Config::default().with_front_setback(8.0),
            &bylaws,
            TrackingFlags::default(),
        );
        assert!(kinds(&below).contains(&"front_setback"));
    }

    #[test]
    fn test_all_failures_are_reported() {
        let bylaws = BylawData {
            adu_types_allowed: Some(AduTypesAllowed::from_pairs([("attached", true)])),
            detached_adu_max_stories: Some(1),
            detached_adu_max_size_sqft: Some(400.0),
            min_lot_width_ft: Some(80.0),
            max_lot_coverage_percent: Some(5.0),
            ..BylawData::default()
        };
        let config =
            Config::default().with_selection(crate::config::Selection::new(AduType::Detached, 2));
        let result = run(&config, &bylaws, TrackingFlags::default());
        let kinds = kinds(&result);
        for expected in ["adu_type", "stories", "lot_width", "adu_size_max", "lot_coverage"] {
            assert!(kinds.contains(&expected), "missing {}: {:?}", expected, kinds);
        }
        assert!(!result.is_valid);
    }

    #[test]
    fn test_height_is_a_warning() {
        let bylaws = BylawData {
            detached_adu_max_height_ft: Some(16.0),
            distance_from_primary_ft: Some(10.0),
            ..BylawData::default()
        };
        let config =
            Config::default().with_selection(crate::config::Selection::new(AduType::Detached, 2));
        let result = run(&config, &bylaws, TrackingFlags::default());
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, "height");
    }

    #[test]
    fn test_impervious_surface_thresholds() {
        // Lot 7800, ADU 480, main 1200, driveway 400 -> 2080 = 26.67%
        let over = BylawData {
            max_impervious_surface_percent: Some(25.0),
            ..BylawData::default()
        };
        assert!(kinds(&run(&Config::default(), &over, TrackingFlags::default()))
            .contains(&"impervious_surface"));

        let near = BylawData {
            max_impervious_surface_percent: Some(28.0),
            ..BylawData::default()
        };
        let result = run(&Config::default(), &near, TrackingFlags::default());
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.kind == "impervious_surface"));

        let clear = BylawData {
            max_impervious_surface_percent: Some(50.0),
            ..BylawData::default()
        };
        let result = run(&Config::default(), &clear, TrackingFlags::default());
        assert!(!result.warnings.iter().any(|w| w.kind == "impervious_surface"));
    }

    #[test]
    fn test_parking_and_separation_warnings() {
        let bylaws = BylawData {
            adu_parking_spaces_required: Some(1),
            ..BylawData::default()
        };
        let result = run(&Config::default(), &bylaws, TrackingFlags::default());
        assert!(result.is_valid);
        let kinds: Vec<_> = result.warnings.iter().map(|w| w.kind.as_str()).collect();
        assert!(kinds.contains(&"parking"));
        assert!(kinds.contains(&"separation_default"));
    }

    #[test]
    fn test_violation_serializes_type_field() {
        let bylaws = BylawData {
            min_lot_size_sqft: Some(10000.0),
            ..BylawData::default()
        };
        let result = run(&Config::default(), &bylaws, TrackingFlags::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["violations"][0]["type"], "lot_size");
        assert_eq!(json["violations"][0]["required_value"], 10000.0);
    }

    #[test]
    fn test_placement_inside_buildable_area() {
        let config = Config::default();
        assert!(check_placement(&config, Point::new(4.0, 10.0), &[]));
        // Right edge at 62 > 61
        assert_eq!(
            placement_conflicts(&config, Point::new(42.0, 10.0), &[]),
            vec![PlacementConflict::OutsideBuildableArea]
        );
    }

    #[test]
    fn test_placement_obstacle_collision() {
        let config = Config::default();
        let tree = obstacle("t1", ObstacleKind::Tree, 15.0, 15.0, 10.0, 10.0);
        assert!(!check_placement(&config, Point::new(10.0, 10.0), &[tree]));
    }

    #[test]
    fn test_placement_separation_from_residence() {
        let config = Config::default()
            .with_front_setback(0.0)
            .with_side_setback(0.0)
            .with_separation(16.4);
        let house = obstacle("h1", ObstacleKind::Residence, 0.0, 0.0, 25.0, 20.0);
        let conflicts = placement_conflicts(&config, Point::new(30.0, 0.0), &[house.clone()]);
        assert_eq!(
            conflicts,
            vec![PlacementConflict::TooCloseToResidence {
                obstacle_id: "h1".to_string(),
                separation_ft: 16.4,
            }]
        );
        assert!(check_placement(&config, Point::new(42.0, 0.0), &[house]));
    }

    #[test]
    fn test_only_first_residence_sets_separation() {
        let config = Config::default()
            .with_front_setback(0.0)
            .with_side_setback(0.0);
        let first = obstacle("h1", ObstacleKind::Residence, 0.0, 80.0, 20.0, 20.0);
        let second = obstacle("h2", ObstacleKind::Residence, 0.0, 0.0, 10.0, 10.0);
        let conflicts = placement_conflicts(&config, Point::new(15.0, 0.0), &[first, second]);
        assert!(conflicts.is_empty(), "{:?}", conflicts);
    }
}
