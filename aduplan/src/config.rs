//! Property and ADU configuration.
//!
//! [`Config`] is changed only through `with_*` transitions. Each one
//! clamps its input to the documented range and ignores non-finite
//! values, so a `Config` never holds NaN or out-of-range numbers.

use serde::{Deserialize, Serialize};

use crate::units::UnitSystem;

pub const LOT_WIDTH_RANGE: (f64, f64) = (15.0, 300.0);
pub const LOT_DEPTH_RANGE: (f64, f64) = (50.0, 300.0);
pub const ADU_DIMENSION_RANGE: (f64, f64) = (10.0, 40.0);
pub const MIN_STORIES: u8 = 1;
pub const MAX_STORIES: u8 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AduType {
    #[default]
    Detached,
    Attached,
    GarageConversion,
}

impl AduType {
    /// Key used in bylaw `adu_types_allowed` maps
    pub fn key(&self) -> &'static str {
        match self {
            AduType::Detached => "detached",
            AduType::Attached => "attached",
            AduType::GarageConversion => "garage_conversion",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AduType::Detached => "Detached ADU",
            AduType::Attached => "Attached ADU",
            AduType::GarageConversion => "Garage conversion",
        }
    }
}

/// Authoritative property/ADU configuration. All lengths in feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub lot_width: f64,
    pub lot_depth: f64,
    pub front_setback: f64,
    pub rear_setback: f64,
    pub side_setback: f64,
    pub adu_width: f64,
    pub adu_depth: f64,
    pub adu_stories: u8,
    pub adu_type: AduType,
    pub separation_from_main: f64,
    pub units: UnitSystem,
    pub main_building_width: f64,
    pub main_building_depth: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lot_width: 65.0,
            lot_depth: 120.0,
            front_setback: 10.0,
            rear_setback: 5.0,
            side_setback: 4.0,
            adu_width: 20.0,
            adu_depth: 24.0,
            adu_stories: 1,
            adu_type: AduType::Detached,
            separation_from_main: 16.4,
            units: UnitSystem::Imperial,
            main_building_width: 30.0,
            main_building_depth: 40.0,
        }
    }
}

fn clamp_range(value: f64, (min, max): (f64, f64)) -> f64 {
    value.clamp(min, max)
}

impl Config {
    /// Re-apply every field clamp. Used after deserializing untrusted input.
    #[must_use]
    pub fn normalized(self) -> Self {
        let fallback = Config::default();
        let pick = |v: f64, d: f64| if v.is_finite() { v } else { d };
        Config {
            lot_width: clamp_range(pick(self.lot_width, fallback.lot_width), LOT_WIDTH_RANGE),
            lot_depth: clamp_range(pick(self.lot_depth, fallback.lot_depth), LOT_DEPTH_RANGE),
            front_setback: pick(self.front_setback, fallback.front_setback).max(0.0),
            rear_setback: pick(self.rear_setback, fallback.rear_setback).max(0.0),
            side_setback: pick(self.side_setback, fallback.side_setback).max(0.0),
            adu_width: clamp_range(pick(self.adu_width, fallback.adu_width), ADU_DIMENSION_RANGE),
            adu_depth: clamp_range(pick(self.adu_depth, fallback.adu_depth), ADU_DIMENSION_RANGE),
            adu_stories: self.adu_stories.clamp(MIN_STORIES, MAX_STORIES),
            separation_from_main: pick(self.separation_from_main, fallback.separation_from_main)
                .max(0.0),
            main_building_width: pick(self.main_building_width, 0.0).max(0.0),
            main_building_depth: pick(self.main_building_depth, 0.0).max(0.0),
            ..self
        }
    }

    #[must_use]
    pub fn with_lot_width(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.lot_width = clamp_range(ft, LOT_WIDTH_RANGE);
        }
        self
    }

    #[must_use]
    pub fn with_lot_depth(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.lot_depth = clamp_range(ft, LOT_DEPTH_RANGE);
        }
        self
    }

    #[must_use]
    pub fn with_front_setback(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.front_setback = ft.max(0.0);
        }
        self
    }

    #[must_use]
    pub fn with_rear_setback(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.rear_setback = ft.max(0.0);
        }
        self
    }

    #[must_use]
    pub fn with_side_setback(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.side_setback = ft.max(0.0);
        }
        self
    }

    #[must_use]
    pub fn with_adu_width(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.adu_width = clamp_range(ft, ADU_DIMENSION_RANGE);
        }
        self
    }

    #[must_use]
    pub fn with_adu_depth(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.adu_depth = clamp_range(ft, ADU_DIMENSION_RANGE);
        }
        self
    }

    /// Set ADU dimensions from a bylaw size cap. The cap outranks the
    /// 10 ft input floor, so only non-negativity is enforced here.
    #[must_use]
    pub fn with_capped_adu_size(mut self, width: f64, depth: f64) -> Self {
        if width.is_finite() && depth.is_finite() {
            self.adu_width = width.max(0.0);
            self.adu_depth = depth.max(0.0);
        }
        self
    }

    #[must_use]
    pub fn with_separation(mut self, ft: f64) -> Self {
        if ft.is_finite() {
            self.separation_from_main = ft.max(0.0);
        }
        self
    }

    #[must_use]
    pub fn with_main_building(mut self, width: f64, depth: f64) -> Self {
        if width.is_finite() && depth.is_finite() {
            self.main_building_width = width.max(0.0);
            self.main_building_depth = depth.max(0.0);
        }
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    /// Project the selection state onto the config copy. This is the only
    /// writer of `adu_type` / `adu_stories`.
    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.adu_type = selection.adu_type;
        self.adu_stories = selection.stories.clamp(MIN_STORIES, MAX_STORIES);
        self
    }
}

/// Source of truth for ADU type and story count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub adu_type: AduType,
    pub stories: u8,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(AduType::Detached, MIN_STORIES)
    }
}

impl Selection {
    pub fn new(adu_type: AduType, stories: u8) -> Self {
        Self {
            adu_type,
            stories: stories.clamp(MIN_STORIES, MAX_STORIES),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFlags {
    #[serde(default)]
    pub is_corner_lot: bool,
    #[serde(default)]
    pub has_alley_access: bool,
}

/// Which values currently come from an applied bylaw record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingFlags {
    #[serde(default)]
    pub front: bool,
    #[serde(default)]
    pub rear: bool,
    #[serde(default)]
    pub side: bool,
    #[serde(default)]
    pub separation_from_bylaws: bool,
}

/// Prefabricated ADU module presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AduModule {
    Studio,
    #[default]
    OneBedroom,
    TwoBedroom,
    Custom,
}

impl AduModule {
    pub const ALL: [AduModule; 4] = [
        AduModule::Studio,
        AduModule::OneBedroom,
        AduModule::TwoBedroom,
        AduModule::Custom,
    ];

    /// Width x depth in feet, `None` for custom
    pub fn dimensions(&self) -> Option<(f64, f64)> {
        match self {
            AduModule::Studio => Some((16.0, 20.0)),
            AduModule::OneBedroom => Some((20.0, 24.0)),
            AduModule::TwoBedroom => Some((24.0, 32.0)),
            AduModule::Custom => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AduModule::Studio => "Studio",
            AduModule::OneBedroom => "One bedroom",
            AduModule::TwoBedroom => "Two bedroom",
            AduModule::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSelection {
    pub module: AduModule,
    #[serde(default)]
    pub rotated: bool,
}

impl ModuleSelection {
    /// Footprint for the preset, rotation applied. Custom has none.
    pub fn footprint(&self) -> Option<(f64, f64)> {
        self.module.dimensions().map(|(w, d)| {
            if self.rotated {
                (d, w)
            } else {
                (w, d)
            }
        })
    }
}
