//! Constraint resolver: reconciles manual config with a bylaw record.
//!
//! The resolver runs only on explicit triggers (municipality selection,
//! property flag toggle, story change). It is a fixed pipeline of pure
//! steps, each taking and returning a [`Resolution`]:
//!
//! 1. default separation distance
//! 2. bylaw setbacks
//! 3. bylaw separation override
//! 4. ADU type constraint
//! 5. proportional ADU size cap
//! 6. story cap (re-derives the default separation when it lowers the count)
//!
//! The ADU type and story count are read from the [`Selection`] and the
//! corrected selection is returned; the config's own copies are only ever
//! written by projecting the selection.

use serde::Serialize;

use crate::bylaws::BylawData;
use crate::config::{AduType, Config, PropertyFlags, Selection, TrackingFlags};
use crate::options::PlannerOptions;

/// Output of a resolver run.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub config: Config,
    pub selection: Selection,
    pub tracking: TrackingFlags,
    pub adjustments: Vec<Adjustment>,
}

/// A change the resolver made, kept for logging and UI notices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    DefaultSeparation { feet: f64 },
    Setback { side: SetbackSide, feet: f64 },
    BylawSeparation { feet: f64 },
    AduTypeForced { from: AduType, to: AduType },
    AduShrunk { width: f64, depth: f64, max_sqft: f64 },
    StoriesCapped { from: u8, to: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetbackSide {
    Front,
    Rear,
    Side,
}

/// Run the full pipeline in order.
pub fn resolve(
    config: &Config,
    selection: Selection,
    tracking: TrackingFlags,
    property: PropertyFlags,
    bylaws: Option<&BylawData>,
    options: &PlannerOptions,
) -> Resolution {
    let start = Resolution {
        config: config.clone().with_selection(selection),
        selection,
        tracking,
        adjustments: Vec::new(),
    };

    let resolved = match bylaws {
        Some(b) => {
            let r = apply_default_separation(start, Some(b), options);
            let r = apply_bylaw_setbacks(r, b, property);
            let r = apply_bylaw_separation(r, b);
            let r = apply_type_constraint(r, b);
            let r = apply_size_cap(r, b);
            apply_story_cap(r, b, options)
        }
        None => {
            let r = apply_default_separation(start, None, options);
            clear_setback_tracking(r)
        }
    };

    for adjustment in &resolved.adjustments {
        tracing::debug!("Resolver adjustment: {:?}", adjustment);
    }
    resolved
}

/// Step 1: without a bylaw separation the story-based default applies.
pub fn apply_default_separation(
    mut r: Resolution,
    bylaws: Option<&BylawData>,
    options: &PlannerOptions,
) -> Resolution {
    if bylaws.and_then(|b| b.distance_from_primary_ft).is_none() {
        let feet = options.default_separation(r.selection.stories);
        r.config = r.config.with_separation(feet);
        r.tracking.separation_from_bylaws = false;
        r.adjustments.push(Adjustment::DefaultSeparation { feet });
    }
    r
}

/// Step 2: copy the applicable setbacks. A setback the record does not
/// cover loses its tracking flag, since its value no longer comes from
/// the bylaws being applied.
pub fn apply_bylaw_setbacks(
    mut r: Resolution,
    bylaws: &BylawData,
    property: PropertyFlags,
) -> Resolution {
    match bylaws.front_setback_min_ft {
        Some(feet) => {
            r.config = r.config.with_front_setback(feet);
            r.tracking.front = true;
            r.adjustments.push(Adjustment::Setback {
                side: SetbackSide::Front,
                feet,
            });
        }
        None => r.tracking.front = false,
    }
    match bylaws.rear_setback_for(property.has_alley_access) {
        Some(feet) => {
            r.config = r.config.with_rear_setback(feet);
            r.tracking.rear = true;
            r.adjustments.push(Adjustment::Setback {
                side: SetbackSide::Rear,
                feet,
            });
        }
        None => r.tracking.rear = false,
    }
    match bylaws.side_setback_for(property.is_corner_lot) {
        Some(feet) => {
            r.config = r.config.with_side_setback(feet);
            r.tracking.side = true;
            r.adjustments.push(Adjustment::Setback {
                side: SetbackSide::Side,
                feet,
            });
        }
        None => r.tracking.side = false,
    }
    r
}

fn clear_setback_tracking(mut r: Resolution) -> Resolution {
    r.tracking.front = false;
    r.tracking.rear = false;
    r.tracking.side = false;
    r
}

/// Step 3
pub fn apply_bylaw_separation(mut r: Resolution, bylaws: &BylawData) -> Resolution {
    if let Some(feet) = bylaws.distance_from_primary_ft {
        r.config = r.config.with_separation(feet);
        r.tracking.separation_from_bylaws = true;
        r.adjustments.push(Adjustment::BylawSeparation { feet });
    }
    r
}

/// Step 4: when only one of detached/attached is allowed, switch to it.
pub fn apply_type_constraint(mut r: Resolution, bylaws: &BylawData) -> Resolution {
    let forced = bylaws
        .adu_types_allowed
        .as_ref()
        .and_then(|allowed| allowed.sole_structure_type());
    if let Some(to) = forced {
        if r.selection.adu_type != to {
            let from = r.selection.adu_type;
            r.selection.adu_type = to;
            r.config = r.config.with_selection(r.selection);
            r.adjustments.push(Adjustment::AduTypeForced { from, to });
        }
    }
    r
}

/// Step 5: shrink an oversized detached ADU by `sqrt(max / current)` on
/// both axes, flooring to whole feet so the result never exceeds the cap.
pub fn apply_size_cap(mut r: Resolution, bylaws: &BylawData) -> Resolution {
    let Some(max_sqft) = bylaws.detached_adu_max_size_sqft else {
        return r;
    };
    if r.selection.adu_type != AduType::Detached {
        return r;
    }
    let current = r.config.adu_width * r.config.adu_depth;
    if current > max_sqft && current > 0.0 {
        let scale = (max_sqft / current).sqrt();
        let width = (r.config.adu_width * scale).floor();
        let depth = (r.config.adu_depth * scale).floor();
        r.config = r.config.with_capped_adu_size(width, depth);
        r.adjustments.push(Adjustment::AduShrunk {
            width,
            depth,
            max_sqft,
        });
    }
    r
}

/// Step 6. A capped story count also moves the story-based default
/// separation when the record has no separation of its own.
pub fn apply_story_cap(
    mut r: Resolution,
    bylaws: &BylawData,
    options: &PlannerOptions,
) -> Resolution {
    let Some(cap) = bylaws.detached_adu_max_stories else {
        return r;
    };
    let from = r.selection.stories;
    if cap >= u32::from(from) {
        return r;
    }
    let capped = Selection::new(r.selection.adu_type, cap.min(u32::from(u8::MAX)) as u8);
    if capped.stories == from {
        return r;
    }
    r.selection = capped;
    r.config = r.config.with_selection(r.selection);
    r.adjustments.push(Adjustment::StoriesCapped {
        from,
        to: r.selection.stories,
    });
    if bylaws.distance_from_primary_ft.is_none() {
        let feet = options.default_separation(r.selection.stories);
        r.config = r.config.with_separation(feet);
        r.adjustments.push(Adjustment::DefaultSeparation { feet });
    }
    r
}
