//! Site obstacles: trees, sheds, the main residence and so on.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    Tree,
    Rock,
    Residence,
    Shed,
    Pool,
    Fence,
    Other,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 7] = [
        ObstacleKind::Tree,
        ObstacleKind::Rock,
        ObstacleKind::Residence,
        ObstacleKind::Shed,
        ObstacleKind::Pool,
        ObstacleKind::Fence,
        ObstacleKind::Other,
    ];

    /// Width x depth in feet for a freshly added obstacle
    pub fn default_size(&self) -> (f64, f64) {
        match self {
            ObstacleKind::Tree => (10.0, 10.0),
            ObstacleKind::Rock => (5.0, 5.0),
            ObstacleKind::Residence => (30.0, 40.0),
            ObstacleKind::Shed => (10.0, 12.0),
            ObstacleKind::Pool => (15.0, 30.0),
            ObstacleKind::Fence => (20.0, 5.0),
            ObstacleKind::Other => (8.0, 8.0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObstacleKind::Tree => "Tree",
            ObstacleKind::Rock => "Rock",
            ObstacleKind::Residence => "Main residence",
            ObstacleKind::Shed => "Shed",
            ObstacleKind::Pool => "Pool",
            ObstacleKind::Fence => "Fence",
            ObstacleKind::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub width: f64,
    pub depth: f64,
    pub x: f64,
    pub y: f64,
}

impl Obstacle {
    /// New obstacle with the kind's default size at a random spot inside
    /// a `lot_width` x `lot_depth` lot.
    pub fn spawn<R: Rng + ?Sized>(
        kind: ObstacleKind,
        lot_width: f64,
        lot_depth: f64,
        rng: &mut R,
    ) -> Self {
        let (width, depth) = kind.default_size();
        let x = random_offset(rng, lot_width - width);
        let y = random_offset(rng, lot_depth - depth);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            width,
            depth,
            x,
            y,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.depth)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_residence(&self) -> bool {
        self.kind == ObstacleKind::Residence
    }
}

fn random_offset<R: Rng + ?Sized>(rng: &mut R, span: f64) -> f64 {
    if span > 0.0 {
        rng.gen_range(0.0..span).floor()
    } else {
        0.0
    }
}

/// The residence that defines the separation boundary. With several
/// residence obstacles the earliest one in the list wins; new obstacles
/// are appended, so this is the first one created.
pub fn main_residence(obstacles: &[Obstacle]) -> Option<&Obstacle> {
    obstacles.iter().find(|o| o.is_residence())
}
