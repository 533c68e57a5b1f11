//! Tunable engine constants.
//!
//! Defaults reproduce the standard behaviour; a JSON file can override any
//! subset of them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::PlannerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerOptions {
    /// Minimum time between authoritative drag commits
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
    /// Paved driveway area assumed by the impervious-surface estimate
    #[serde(default = "default_driveway_sqft")]
    pub driveway_estimate_sqft: f64,
    /// Height per story used for the height estimate
    #[serde(default = "default_feet_per_story")]
    pub feet_per_story: f64,
    /// Fraction of the impervious cap at which a warning starts
    #[serde(default = "default_impervious_warning_ratio")]
    pub impervious_warning_ratio: f64,
    #[serde(default = "default_min_scale")]
    pub min_scale: f64,
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,
    /// Smallest width/depth a resize handle can produce
    #[serde(default = "default_min_resize_ft")]
    pub min_resize_ft: f64,
    /// Separation used when no bylaw value exists, one story (~5 m)
    #[serde(default = "default_separation_one_story")]
    pub default_separation_one_story_ft: f64,
    /// Separation used when no bylaw value exists, two stories (~7.5 m)
    #[serde(default = "default_separation_two_story")]
    pub default_separation_two_story_ft: f64,
}

fn default_commit_interval_ms() -> u64 {
    100
}

fn default_driveway_sqft() -> f64 {
    400.0
}

fn default_feet_per_story() -> f64 {
    10.0
}

fn default_impervious_warning_ratio() -> f64 {
    0.9
}

fn default_min_scale() -> f64 {
    0.2
}

fn default_max_scale() -> f64 {
    12.0
}

fn default_min_resize_ft() -> f64 {
    5.0
}

fn default_separation_one_story() -> f64 {
    16.4
}

fn default_separation_two_story() -> f64 {
    24.6
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            commit_interval_ms: default_commit_interval_ms(),
            driveway_estimate_sqft: default_driveway_sqft(),
            feet_per_story: default_feet_per_story(),
            impervious_warning_ratio: default_impervious_warning_ratio(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            min_resize_ft: default_min_resize_ft(),
            default_separation_one_story_ft: default_separation_one_story(),
            default_separation_two_story_ft: default_separation_two_story(),
        }
    }
}

impl PlannerOptions {
    pub fn from_json_str(json: &str) -> Result<Self, PlannerError> {
        let options: PlannerOptions = serde_json::from_str(json)?;
        options.check()?;
        Ok(options)
    }

    pub fn from_path(path: &Path) -> Result<Self, PlannerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// Default separation for the given story count
    pub fn default_separation(&self, stories: u8) -> f64 {
        if stories >= 2 {
            self.default_separation_two_story_ft
        } else {
            self.default_separation_one_story_ft
        }
    }

    fn check(&self) -> Result<(), PlannerError> {
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(PlannerError::InvalidOptions(format!(
                "scale bounds must satisfy 0 < min_scale <= max_scale (got {}..{})",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.min_resize_ft > 0.0) {
            return Err(PlannerError::InvalidOptions(
                "min_resize_ft must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
