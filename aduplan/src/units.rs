//! Unit conversion at the presentation boundary.
//!
//! Everything inside the engine is stored in feet (lengths) and square
//! feet (areas). The helpers here turn those values into display strings
//! for the active [`UnitSystem`] and parse user-entered text back into feet.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Meters per foot
pub const METERS_PER_FOOT: f64 = 0.3048;
/// Square meters per square foot
pub const SQ_METERS_PER_SQ_FOOT: f64 = 0.092903;

/// Display unit system. Storage is always imperial feet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

impl UnitSystem {
    pub fn length_suffix(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "ft",
            UnitSystem::Metric => "m",
        }
    }

    pub fn area_suffix(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "sq ft",
            UnitSystem::Metric => "m²",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("could not read a length from {0:?}")]
    Unparsable(String),
    #[error("length must be positive, got {0}")]
    NotPositive(f64),
}

/// Format a stored value (feet or square feet) for display.
pub fn to_display(value_ft: f64, is_area: bool, units: UnitSystem) -> String {
    match (units, is_area) {
        (UnitSystem::Metric, false) => format!("{:.1}", value_ft * METERS_PER_FOOT),
        (UnitSystem::Metric, true) => format!("{}", (value_ft * SQ_METERS_PER_SQ_FOOT).round()),
        (UnitSystem::Imperial, _) => format_trimmed((value_ft * 10.0).round() / 10.0),
    }
}

/// Format feet as `F' I"`, or `F'` when there are no inches.
pub fn to_feet_and_inches(feet: f64) -> String {
    let rounded = (feet * 10.0).round() / 10.0;
    let mut whole = rounded.floor();
    let mut inches = ((rounded - whole) * 12.0).round();
    if inches >= 12.0 {
        whole += 1.0;
        inches = 0.0;
    }
    if inches == 0.0 {
        format!("{}'", whole)
    } else {
        format!("{}' {}\"", whole, inches)
    }
}

fn feet_inches_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(\d+)'?\s*(\d+)?"?"#).expect("static pattern"))
}

/// Parse `12' 6"`, `12'`, `12 6` or a plain decimal such as `12.5` into feet.
///
/// Returns an error for text with no digits or a result that is not a
/// positive finite number; callers leave the edited field untouched then.
pub fn parse_feet_and_inches(text: &str) -> Result<f64, UnitError> {
    let trimmed = text.trim();
    let value = match trimmed.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            let caps = feet_inches_pattern()
                .captures(trimmed)
                .ok_or_else(|| UnitError::Unparsable(text.to_string()))?;
            let feet: f64 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            let inches: f64 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            feet + inches / 12.0
        }
    };
    ensure_positive(value)
}

/// Parse a length typed in the active display unit and return feet.
/// Metric text is read as decimal meters.
pub fn parse_length(text: &str, units: UnitSystem) -> Result<f64, UnitError> {
    match units {
        UnitSystem::Imperial => parse_feet_and_inches(text),
        UnitSystem::Metric => {
            let meters = text
                .trim()
                .trim_end_matches('m')
                .trim()
                .parse::<f64>()
                .map_err(|_| UnitError::Unparsable(text.to_string()))?;
            ensure_positive(meters / METERS_PER_FOOT)
        }
    }
}

fn ensure_positive(value: f64) -> Result<f64, UnitError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(UnitError::NotPositive(value))
    }
}

/// `12.0` -> `"12"`, `12.5` -> `"12.5"`
fn format_trimmed(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
