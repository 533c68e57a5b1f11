//! Municipal bylaw records and the per-session municipality table.
//!
//! Bylaw data comes from an external collaborator and is read-only here.
//! Every field is optional; a missing field means the bylaw says nothing
//! about that dimension. Malformed values (wrong JSON type, negative or
//! non-finite numbers) are treated the same as missing so one bad field
//! never throws away the rest of the record.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::AduType;
use crate::core::PlannerError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BylawData {
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub front_setback_min_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub rear_setback_standard_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub rear_setback_with_alley_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub side_setback_interior_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub side_setback_corner_street_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub distance_from_primary_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_types", skip_serializing_if = "Option::is_none")]
    pub adu_types_allowed: Option<AduTypesAllowed>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub detached_adu_max_stories: Option<u32>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub detached_adu_max_height_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub detached_adu_max_size_sqft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub detached_adu_min_size_sqft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub min_lot_size_sqft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub min_lot_width_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub min_lot_depth_ft: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub max_lot_coverage_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_feet", skip_serializing_if = "Option::is_none")]
    pub max_impervious_surface_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub adu_parking_spaces_required: Option<u32>,
}

impl BylawData {
    /// Rear setback that applies to this property
    pub fn rear_setback_for(&self, has_alley_access: bool) -> Option<f64> {
        if has_alley_access {
            self.rear_setback_with_alley_ft
                .or(self.rear_setback_standard_ft)
        } else {
            self.rear_setback_standard_ft
        }
    }

    /// Side setback that applies to this property
    pub fn side_setback_for(&self, is_corner_lot: bool) -> Option<f64> {
        if is_corner_lot {
            self.side_setback_corner_street_ft
                .or(self.side_setback_interior_ft)
        } else {
            self.side_setback_interior_ft
        }
    }
}

/// `adu_types_allowed` map. Keys other than the three known ADU types are
/// kept so a record round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AduTypesAllowed(pub BTreeMap<String, bool>);

impl AduTypesAllowed {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Missing keys count as not permitted.
    pub fn permits(&self, adu_type: AduType) -> bool {
        self.0.get(adu_type.key()).copied().unwrap_or(false)
    }

    /// The only permitted type among detached/attached, if exactly one is.
    pub fn sole_structure_type(&self) -> Option<AduType> {
        match (
            self.permits(AduType::Detached),
            self.permits(AduType::Attached),
        ) {
            (true, false) => Some(AduType::Detached),
            (false, true) => Some(AduType::Attached),
            _ => None,
        }
    }
}

fn lenient_feet<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(value_as_measure))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(value_as_measure)
        .map(|v| v.floor().min(u32::MAX as f64) as u32))
}

fn lenient_types<'de, D>(deserializer: D) -> Result<Option<AduTypesAllowed>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Object(map)) => Some(AduTypesAllowed(
            map.iter().map(|(k, v)| (k.clone(), is_truthy(v))).collect(),
        )),
        Some(Value::Null) | None => None,
        Some(other) => {
            tracing::debug!("Ignoring malformed adu_types_allowed: {}", other);
            None
        }
    })
}

/// Non-negative finite number, from a JSON number or numeric string.
fn value_as_measure(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return None,
        _ => None,
    };
    match number {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            tracing::debug!("Ignoring malformed bylaw value: {}", value);
            None
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Municipality {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient_record",
        skip_serializing_if = "Option::is_none"
    )]
    pub bylaw_data: Option<BylawData>,
}

/// A record that is not a JSON object is treated as no record, so one bad
/// entry never fails the whole table.
fn lenient_record<'de, D>(deserializer: D) -> Result<Option<BylawData>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => match BylawData::deserialize(value) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                tracing::debug!("Ignoring malformed bylaw record: {}", e);
                Ok(None)
            }
        },
        Some(Value::Null) | None => Ok(None),
        Some(other) => {
            tracing::debug!("Ignoring malformed bylaw record: {}", other);
            Ok(None)
        }
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "municipality id must be a string or number, got {}",
            other
        ))),
    }
}

/// Immutable lookup table of municipalities, loaded once per session
/// and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct MunicipalityTable {
    entries: Vec<Arc<Municipality>>,
    by_id: HashMap<String, usize>,
}

impl MunicipalityTable {
    pub fn new(municipalities: Vec<Municipality>) -> Self {
        let mut entries = Vec::with_capacity(municipalities.len());
        let mut by_id = HashMap::with_capacity(municipalities.len());
        for m in municipalities {
            if by_id.contains_key(&m.id) {
                tracing::warn!("Duplicate municipality id {}, keeping the first", m.id);
                continue;
            }
            by_id.insert(m.id.clone(), entries.len());
            entries.push(Arc::new(m));
        }
        Self { entries, by_id }
    }

    pub fn from_json_str(json: &str) -> Result<Self, PlannerError> {
        let municipalities: Vec<Municipality> = serde_json::from_str(json)?;
        let table = Self::new(municipalities);
        tracing::info!("Loaded {} municipalities", table.len());
        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self, PlannerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Municipality>> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Municipality>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_none() {
        let data: BylawData = serde_json::from_str("{}").unwrap();
        assert_eq!(data, BylawData::default());
    }

    #[test]
    fn test_malformed_fields_are_dropped_individually() {
        let data: BylawData = serde_json::from_str(
            r#"{
                "front_setback_min_ft": "abc",
                "rear_setback_standard_ft": "7.5",
                "side_setback_interior_ft": -2,
                "distance_from_primary_ft": [1, 2],
                "max_lot_coverage_percent": 40,
                "adu_types_allowed": "detached",
                "detached_adu_max_stories": 1.0
            }"#,
        )
        .unwrap();
        assert_eq!(data.front_setback_min_ft, None);
        assert_eq!(data.rear_setback_standard_ft, Some(7.5));
        assert_eq!(data.side_setback_interior_ft, None);
        assert_eq!(data.distance_from_primary_ft, None);
        assert_eq!(data.max_lot_coverage_percent, Some(40.0));
        assert_eq!(data.adu_types_allowed, None);
        assert_eq!(data.detached_adu_max_stories, Some(1));
    }

    #[test]
    fn test_types_allowed_truthiness() {
        let data: BylawData = serde_json::from_str(
            r#"{"adu_types_allowed": {"detached": true, "attached": 0, "tiny_home": 1}}"#,
        )
        .unwrap();
        let allowed = data.adu_types_allowed.unwrap();
        assert!(allowed.permits(AduType::Detached));
        assert!(!allowed.permits(AduType::Attached));
        assert!(!allowed.permits(AduType::GarageConversion));
        assert_eq!(allowed.sole_structure_type(), Some(AduType::Detached));
    }

    #[test]
    fn test_alley_and_corner_variants() {
        let data = BylawData {
            rear_setback_standard_ft: Some(5.0),
            rear_setback_with_alley_ft: Some(3.0),
            side_setback_interior_ft: Some(4.0),
            ..BylawData::default()
        };
        assert_eq!(data.rear_setback_for(true), Some(3.0));
        assert_eq!(data.rear_setback_for(false), Some(5.0));
        // No corner value: interior applies
        assert_eq!(data.side_setback_for(true), Some(4.0));
    }

    #[test]
    fn test_table_accepts_numeric_ids() {
        let table = MunicipalityTable::from_json_str(
            r#"[
                {"id": 1, "name": "Springfield", "bylaw_data": {"front_setback_min_ft": 10}},
                {"id": "shelby", "name": "Shelbyville"},
                {"id": 1, "name": "Duplicate"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        let springfield = table.get("1").unwrap();
        assert_eq!(springfield.name, "Springfield");
        assert_eq!(
            springfield.bylaw_data.as_ref().and_then(|b| b.front_setback_min_ft),
            Some(10.0)
        );
        assert!(table.get("shelby").unwrap().bylaw_data.is_none());
    }

    #[test]
    fn test_non_object_record_does_not_fail_table() {
        let table = MunicipalityTable::from_json_str(
            r#"[
                {"id": 1, "name": "Springfield", "bylaw_data": {"front_setback_min_ft": 10}},
                {"id": 2, "name": "Pending", "bylaw_data": "pending"},
                {"id": 3, "name": "Listed", "bylaw_data": [1, 2]},
                {"id": 4, "name": "Numbered", "bylaw_data": 7}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.get("1").unwrap().bylaw_data.is_some());
        for id in ["2", "3", "4"] {
            assert!(table.get(id).unwrap().bylaw_data.is_none(), "{}", id);
        }
    }
}
