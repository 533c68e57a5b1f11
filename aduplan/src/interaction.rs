//! Pointer interaction: drag and resize state machines.
//!
//! Pointer coordinates are pixels in the lot's drawing space; the render
//! scale (pixels per foot) converts them to feet. Time is passed in by the
//! caller as an [`Instant`], so the commit throttle is a plain comparison
//! and tests can drive it without sleeping.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// The element a gesture acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementRef {
    Adu,
    Obstacle(String),
}

/// Pixels per foot for a container, clamped to `[min_scale, max_scale]`.
pub fn fit_scale(
    container_width_px: f64,
    container_height_px: f64,
    lot_width_ft: f64,
    lot_depth_ft: f64,
    min_scale: f64,
    max_scale: f64,
) -> f64 {
    if lot_width_ft <= 0.0 || lot_depth_ft <= 0.0 {
        return min_scale;
    }
    let fit = (container_width_px / lot_width_ft).min(container_height_px / lot_depth_ft);
    if fit.is_finite() {
        fit.clamp(min_scale, max_scale)
    } else {
        min_scale
    }
}

/// Pixel-to-feet conversion for the current container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderScale(f64);

impl RenderScale {
    pub fn new(pixels_per_foot: f64) -> Self {
        Self(pixels_per_foot)
    }

    pub fn pixels_per_foot(&self) -> f64 {
        self.0
    }

    pub fn to_feet(&self, pixels: f64) -> f64 {
        pixels / self.0
    }

    pub fn point_to_feet(&self, pointer: Point) -> Point {
        Point::new(self.to_feet(pointer.x), self.to_feet(pointer.y))
    }
}

/// Result of a drag move: the overlay always updates, the authoritative
/// position only when the throttle allows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragUpdate {
    pub overlay: Point,
    pub commit: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        target: ElementRef,
        /// Pointer position minus element origin, in feet
        offset: Point,
        size: (f64, f64),
        lot: (f64, f64),
        last_commit_at: Option<Instant>,
        pending: Point,
    },
}

impl DragState {
    pub fn is_active(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }

    pub fn target(&self) -> Option<&ElementRef> {
        match self {
            DragState::Dragging { target, .. } => Some(target),
            DragState::Idle => None,
        }
    }

    /// Ephemeral position shown while dragging
    pub fn overlay(&self) -> Option<(&ElementRef, Point)> {
        match self {
            DragState::Dragging {
                target, pending, ..
            } => Some((target, *pending)),
            DragState::Idle => None,
        }
    }

    /// Pointer-down over an element at `origin` (feet).
    pub fn begin(
        &mut self,
        target: ElementRef,
        pointer: Point,
        origin: Point,
        size: (f64, f64),
        lot: (f64, f64),
        scale: RenderScale,
    ) {
        let at = scale.point_to_feet(pointer);
        *self = DragState::Dragging {
            target,
            offset: Point::new(at.x - origin.x, at.y - origin.y),
            size,
            lot,
            last_commit_at: None,
            pending: origin,
        };
    }

    /// Pointer-move. Returns `None` when no drag is active.
    pub fn update(
        &mut self,
        pointer: Point,
        scale: RenderScale,
        now: Instant,
        commit_interval: Duration,
    ) -> Option<DragUpdate> {
        let DragState::Dragging {
            offset,
            size,
            lot,
            last_commit_at,
            pending,
            ..
        } = self
        else {
            return None;
        };
        let at = scale.point_to_feet(pointer);
        // Bounded by the lot, not the buildable area
        let max_x = (lot.0 - size.0).max(0.0);
        let max_y = (lot.1 - size.1).max(0.0);
        let candidate = Point::new(
            (at.x - offset.x).clamp(0.0, max_x),
            (at.y - offset.y).clamp(0.0, max_y),
        );
        *pending = candidate;

        let due = match last_commit_at {
            Some(last) => now.saturating_duration_since(*last) >= commit_interval,
            None => true,
        };
        let commit = if due {
            *last_commit_at = Some(now);
            Some(candidate)
        } else {
            None
        };
        Some(DragUpdate {
            overlay: candidate,
            commit,
        })
    }

    /// Pointer-up or lost capture. Always yields the latest position so the
    /// committed state matches what was last drawn.
    pub fn finish(&mut self) -> Option<(ElementRef, Point)> {
        match std::mem::take(self) {
            DragState::Dragging {
                target, pending, ..
            } => Some((target, pending)),
            DragState::Idle => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResizeState {
    #[default]
    Idle,
    Resizing {
        target: ElementRef,
        start_pointer: Point,
        start_width: f64,
        start_depth: f64,
    },
}

impl ResizeState {
    pub fn is_active(&self) -> bool {
        matches!(self, ResizeState::Resizing { .. })
    }

    pub fn begin(&mut self, target: ElementRef, pointer: Point, width: f64, depth: f64) {
        *self = ResizeState::Resizing {
            target,
            start_pointer: pointer,
            start_width: width,
            start_depth: depth,
        };
    }

    /// New whole-foot dimensions for the pointer position, never below
    /// `min_dimension`. Applied immediately by the caller.
    pub fn update(
        &self,
        pointer: Point,
        scale: RenderScale,
        min_dimension: f64,
    ) -> Option<(ElementRef, f64, f64)> {
        let ResizeState::Resizing {
            target,
            start_pointer,
            start_width,
            start_depth,
        } = self
        else {
            return None;
        };
        let width = (start_width + scale.to_feet(pointer.x - start_pointer.x))
            .max(min_dimension)
            .round();
        let depth = (start_depth + scale.to_feet(pointer.y - start_pointer.y))
            .max(min_dimension)
            .round();
        Some((target.clone(), width, depth))
    }

    pub fn finish(&mut self) -> bool {
        let was_active = self.is_active();
        *self = ResizeState::Idle;
        was_active
    }
}
