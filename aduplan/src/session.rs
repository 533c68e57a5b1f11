//! Single-owner session store.
//!
//! All state changes go through [`Session::dispatch`]. After each action the
//! store projects the selection onto the config, repairs ADU containment
//! when geometry changed, reruns the resolver when an explicit trigger fired
//! and recomputes validation from scratch.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::bylaws::{BylawData, Municipality, MunicipalityTable};
use crate::config::{
    AduModule, AduType, Config, ModuleSelection, PropertyFlags, Selection, TrackingFlags,
};
use crate::core::PlannerError;
use crate::geometry::{buildable_area, metrics, LotMetrics, Point, Rect};
use crate::interaction::{fit_scale, DragState, ElementRef, RenderScale, ResizeState};
use crate::obstacles::{Obstacle, ObstacleKind};
use crate::options::PlannerOptions;
use crate::report::{build_report, Report, ReportInput};
use crate::resolver::{resolve, Adjustment};
use crate::units::{parse_length, UnitSystem};
use crate::validator::{placement_conflicts, validate, PlacementConflict, ValidationResult};

/// Numeric fields that accept typed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionField {
    LotWidth,
    LotDepth,
    FrontSetback,
    RearSetback,
    SideSetback,
    AduWidth,
    AduDepth,
    Separation,
    MainBuildingWidth,
    MainBuildingDepth,
}

/// A rejected text edit, kept until the next successful edit. The
/// dispatch that rejected it also returns `PlannerError::InvalidInput`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputError {
    pub field: DimensionField,
    pub text: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectMunicipality(Option<String>),
    SetCornerLot(bool),
    SetAlleyAccess(bool),
    SetAduType(AduType),
    SetStories(u8),
    SetUnits(UnitSystem),
    /// Numeric edit, already in feet
    SetDimension(DimensionField, f64),
    /// Text edit in the active display unit
    SetDimensionText(DimensionField, String),
    SelectModule(AduModule),
    ToggleRotation,
    AddObstacle(ObstacleKind),
    RemoveObstacle(String),
    MoveAdu(Point),
    Select(Option<ElementRef>),
    PointerDown { target: ElementRef, pointer: Point, now: Instant },
    PointerMove { pointer: Point, now: Instant },
    PointerUp,
    /// Window lost pointer capture; handled like a release
    PointerCancel,
    ResizeStart { target: ElementRef, pointer: Point },
    ContainerResized { width_px: f64, height_px: f64 },
}

pub struct Session {
    options: PlannerOptions,
    municipalities: Arc<MunicipalityTable>,
    municipality: Option<Arc<Municipality>>,
    config: Config,
    selection: Selection,
    module: ModuleSelection,
    property: PropertyFlags,
    tracking: TrackingFlags,
    obstacles: Vec<Obstacle>,
    adu_position: Point,
    selected: Option<ElementRef>,
    drag: DragState,
    resize: ResizeState,
    container: Option<(f64, f64)>,
    scale: RenderScale,
    last_adjustments: Vec<Adjustment>,
    last_input_error: Option<InputError>,
    validation: ValidationResult,
    conflicts: Vec<PlacementConflict>,
    rng: StdRng,
}

impl Session {
    pub fn new(municipalities: Arc<MunicipalityTable>, options: PlannerOptions) -> Self {
        Self::with_rng(municipalities, options, StdRng::from_entropy())
    }

    /// Deterministic obstacle placement for tests and replays.
    pub fn with_seed(
        municipalities: Arc<MunicipalityTable>,
        options: PlannerOptions,
        seed: u64,
    ) -> Self {
        Self::with_rng(municipalities, options, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        municipalities: Arc<MunicipalityTable>,
        options: PlannerOptions,
        rng: StdRng,
    ) -> Self {
        let config = Config::default();
        let selection = Selection::new(config.adu_type, config.adu_stories);
        let area = buildable_area(&config);
        let scale = RenderScale::new(options.min_scale);
        let mut session = Self {
            options,
            municipalities,
            municipality: None,
            config,
            selection,
            module: ModuleSelection::default(),
            property: PropertyFlags::default(),
            tracking: TrackingFlags::default(),
            obstacles: Vec::new(),
            adu_position: area.origin(),
            selected: None,
            drag: DragState::Idle,
            resize: ResizeState::Idle,
            container: None,
            scale,
            last_adjustments: Vec::new(),
            last_input_error: None,
            validation: ValidationResult::default(),
            conflicts: Vec::new(),
            rng,
        };
        session.reapply_constraints();
        session.refresh();
        session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn module(&self) -> ModuleSelection {
        self.module
    }

    pub fn property(&self) -> PropertyFlags {
        self.property
    }

    pub fn tracking(&self) -> TrackingFlags {
        self.tracking
    }

    pub fn municipality(&self) -> Option<&Municipality> {
        self.municipality.as_deref()
    }

    pub fn bylaws(&self) -> Option<&BylawData> {
        self.municipality.as_ref().and_then(|m| m.bylaw_data.as_ref())
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn adu_position(&self) -> Point {
        self.adu_position
    }

    pub fn adu_rect(&self) -> Rect {
        Rect::at(self.adu_position, self.config.adu_width, self.config.adu_depth)
    }

    pub fn selected(&self) -> Option<&ElementRef> {
        self.selected.as_ref()
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_active()
    }

    pub fn scale(&self) -> RenderScale {
        self.scale
    }

    pub fn metrics(&self) -> LotMetrics {
        metrics(&self.config)
    }

    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    pub fn placement_conflicts(&self) -> &[PlacementConflict] {
        &self.conflicts
    }

    pub fn placement_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Placement and bylaw checks both pass
    pub fn is_valid(&self) -> bool {
        self.placement_valid() && self.validation.is_valid
    }

    /// Setback inputs locked because their value came from the bylaws
    pub fn is_locked(&self, field: DimensionField) -> bool {
        match field {
            DimensionField::FrontSetback => self.tracking.front,
            DimensionField::RearSetback => self.tracking.rear,
            DimensionField::SideSetback => self.tracking.side,
            DimensionField::Separation => self.tracking.separation_from_bylaws,
            _ => false,
        }
    }

    pub fn last_adjustments(&self) -> &[Adjustment] {
        &self.last_adjustments
    }

    pub fn last_input_error(&self) -> Option<&InputError> {
        self.last_input_error.as_ref()
    }

    pub fn report(&self, timestamp: chrono::DateTime<chrono::Utc>) -> Report {
        let metrics = self.metrics();
        build_report(
            &ReportInput {
                config: &self.config,
                metrics: &metrics,
                adu_position: self.adu_position,
                obstacles: &self.obstacles,
                validation: &self.validation,
                conflicts: &self.conflicts,
                municipality: self.municipality(),
                property: self.property,
                tracking: self.tracking,
                module: self.module,
            },
            timestamp,
        )
    }

    pub fn dispatch(&mut self, action: Action) -> Result<(), PlannerError> {
        let geometry_before = self.geometry_key();
        let mut reapply = false;

        match action {
            Action::SelectMunicipality(id) => {
                self.municipality = match id {
                    Some(id) => Some(
                        self.municipalities
                            .get(&id)
                            .cloned()
                            .ok_or(PlannerError::UnknownMunicipality(id))?,
                    ),
                    None => None,
                };
                reapply = true;
            }
            Action::SetCornerLot(on) => {
                self.property.is_corner_lot = on;
                reapply = true;
            }
            Action::SetAlleyAccess(on) => {
                self.property.has_alley_access = on;
                reapply = true;
            }
            Action::SetAduType(adu_type) => {
                self.selection.adu_type = adu_type;
            }
            Action::SetStories(stories) => {
                self.selection = Selection::new(self.selection.adu_type, stories);
                reapply = true;
            }
            Action::SetUnits(units) => {
                self.config = self.config.clone().with_units(units);
            }
            Action::SetDimension(field, feet) => {
                self.apply_dimension(field, feet);
                self.last_input_error = None;
            }
            Action::SetDimensionText(field, text) => match parse_length(&text, self.config.units) {
                Ok(feet) => {
                    self.apply_dimension(field, feet);
                    self.last_input_error = None;
                }
                Err(e) => {
                    tracing::warn!("Rejected {:?} input {:?}: {}", field, text, e);
                    self.last_input_error = Some(InputError {
                        field,
                        text,
                        message: e.to_string(),
                    });
                    return Err(e.into());
                }
            },
            Action::SelectModule(module) => {
                self.module.module = module;
                self.apply_module_footprint();
            }
            Action::ToggleRotation => {
                if self.module.module != AduModule::Custom {
                    self.module.rotated = !self.module.rotated;
                    self.apply_module_footprint();
                }
            }
            Action::AddObstacle(kind) => {
                let obstacle = Obstacle::spawn(
                    kind,
                    self.config.lot_width,
                    self.config.lot_depth,
                    &mut self.rng,
                );
                tracing::debug!("Added {:?} obstacle {}", kind, obstacle.id);
                self.obstacles.push(obstacle);
            }
            Action::RemoveObstacle(id) => {
                let index = self
                    .obstacles
                    .iter()
                    .position(|o| o.id == id)
                    .ok_or_else(|| PlannerError::UnknownObstacle(id.clone()))?;
                self.obstacles.remove(index);
                if self.selected == Some(ElementRef::Obstacle(id)) {
                    self.selected = None;
                }
            }
            Action::MoveAdu(position) => {
                self.adu_position = position;
            }
            Action::Select(target) => {
                if let Some(ElementRef::Obstacle(id)) = &target {
                    self.find_obstacle(id)?;
                }
                self.selected = target;
            }
            Action::PointerDown {
                target,
                pointer,
                now: _,
            } => {
                let (origin, size) = self.element_geometry(&target)?;
                self.drag.begin(
                    target.clone(),
                    pointer,
                    origin,
                    size,
                    (self.config.lot_width, self.config.lot_depth),
                    self.scale,
                );
                self.selected = Some(target);
            }
            Action::PointerMove { pointer, now } => {
                if let Some((target, width, depth)) =
                    self.resize.update(pointer, self.scale, self.options.min_resize_ft)
                {
                    self.apply_size(&target, width, depth);
                } else if let Some(update) = self.drag.update(
                    pointer,
                    self.scale,
                    now,
                    self.options.commit_interval(),
                ) {
                    if let Some(position) = update.commit {
                        if let Some(target) = self.drag.target().cloned() {
                            self.commit_position(&target, position);
                        }
                    }
                }
            }
            Action::PointerUp | Action::PointerCancel => {
                if let Some((target, position)) = self.drag.finish() {
                    self.commit_position(&target, position);
                }
                self.resize.finish();
            }
            Action::ResizeStart { target, pointer } => {
                let (_, (width, depth)) = self.element_geometry(&target)?;
                self.resize.begin(target.clone(), pointer, width, depth);
                self.selected = Some(target);
            }
            Action::ContainerResized {
                width_px,
                height_px,
            } => {
                self.container = Some((width_px, height_px));
            }
        }

        if reapply {
            self.reapply_constraints();
        } else {
            self.config = self.config.clone().with_selection(self.selection);
        }
        if self.geometry_key() != geometry_before {
            self.repair_containment();
        }
        self.refresh();
        Ok(())
    }

    fn apply_dimension(&mut self, field: DimensionField, feet: f64) {
        let c = self.config.clone();
        self.config = match field {
            DimensionField::LotWidth => c.with_lot_width(feet),
            DimensionField::LotDepth => c.with_lot_depth(feet),
            DimensionField::FrontSetback => {
                self.tracking.front = false;
                c.with_front_setback(feet)
            }
            DimensionField::RearSetback => {
                self.tracking.rear = false;
                c.with_rear_setback(feet)
            }
            DimensionField::SideSetback => {
                self.tracking.side = false;
                c.with_side_setback(feet)
            }
            DimensionField::Separation => {
                self.tracking.separation_from_bylaws = false;
                c.with_separation(feet)
            }
            DimensionField::AduWidth => {
                self.module.module = AduModule::Custom;
                c.with_adu_width(feet)
            }
            DimensionField::AduDepth => {
                self.module.module = AduModule::Custom;
                c.with_adu_depth(feet)
            }
            DimensionField::MainBuildingWidth => {
                let depth = c.main_building_depth;
                c.with_main_building(feet, depth)
            }
            DimensionField::MainBuildingDepth => {
                let width = c.main_building_width;
                c.with_main_building(width, feet)
            }
        };
    }

    fn apply_module_footprint(&mut self) {
        if let Some((width, depth)) = self.module.footprint() {
            self.config = self.config.clone().with_adu_width(width).with_adu_depth(depth);
        }
    }

    fn apply_size(&mut self, target: &ElementRef, width: f64, depth: f64) {
        match target {
            ElementRef::Adu => {
                self.module.module = AduModule::Custom;
                self.config = self.config.clone().with_adu_width(width).with_adu_depth(depth);
            }
            ElementRef::Obstacle(id) => {
                if let Some(o) = self.obstacles.iter_mut().find(|o| &o.id == id) {
                    o.width = width;
                    o.depth = depth;
                }
            }
        }
    }

    fn commit_position(&mut self, target: &ElementRef, position: Point) {
        match target {
            ElementRef::Adu => self.adu_position = position,
            ElementRef::Obstacle(id) => {
                if let Some(o) = self.obstacles.iter_mut().find(|o| &o.id == id) {
                    o.x = position.x;
                    o.y = position.y;
                }
            }
        }
    }

    fn find_obstacle(&self, id: &str) -> Result<&Obstacle, PlannerError> {
        self.obstacles
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| PlannerError::UnknownObstacle(id.to_string()))
    }

    fn element_geometry(&self, target: &ElementRef) -> Result<(Point, (f64, f64)), PlannerError> {
        match target {
            ElementRef::Adu => Ok((
                self.adu_position,
                (self.config.adu_width, self.config.adu_depth),
            )),
            ElementRef::Obstacle(id) => {
                let o = self.find_obstacle(id)?;
                Ok((o.position(), (o.width, o.depth)))
            }
        }
    }

    /// Run the resolver against the current selection and adopt its output.
    fn reapply_constraints(&mut self) {
        let resolution = resolve(
            &self.config,
            self.selection,
            self.tracking,
            self.property,
            self.bylaws(),
            &self.options,
        );
        let resized = resolution.config.adu_width != self.config.adu_width
            || resolution.config.adu_depth != self.config.adu_depth;
        if resized {
            self.module.module = AduModule::Custom;
        }
        self.config = resolution.config;
        self.selection = resolution.selection;
        self.tracking = resolution.tracking;
        self.last_adjustments = resolution.adjustments;
    }

    /// Values that change the buildable area or the ADU footprint
    fn geometry_key(&self) -> [u64; 7] {
        let c = &self.config;
        [
            c.lot_width.to_bits(),
            c.lot_depth.to_bits(),
            c.front_setback.to_bits(),
            c.rear_setback.to_bits(),
            c.side_setback.to_bits(),
            c.adu_width.to_bits(),
            c.adu_depth.to_bits(),
        ]
    }

    fn repair_containment(&mut self) {
        let area = buildable_area(&self.config);
        if !area.contains(&self.adu_rect()) {
            let repaired =
                area.clamp_origin(self.adu_position, self.config.adu_width, self.config.adu_depth);
            tracing::debug!(
                "ADU moved from {:?} to {:?} to stay inside the buildable area",
                self.adu_position,
                repaired
            );
            self.adu_position = repaired;
        }
    }

    fn refresh(&mut self) {
        if let Some((w, h)) = self.container {
            self.scale = RenderScale::new(fit_scale(
                w,
                h,
                self.config.lot_width,
                self.config.lot_depth,
                self.options.min_scale,
                self.options.max_scale,
            ));
        }
        self.conflicts = placement_conflicts(&self.config, self.adu_position, &self.obstacles);
        self.validation = validate(
            &self.config,
            &self.obstacles,
            self.bylaws(),
            self.tracking,
            self.property,
            &self.options,
        );
    }
}
