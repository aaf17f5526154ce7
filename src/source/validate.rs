//! Structural validation of a survey payload and normalization of its records.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::SourceError;
use crate::model::{
    ActivityItem, AmenityDetection, Amenities, AmenityKey, Dataset, Direction, RecordAnomaly, Stop,
    SurveyStatus,
};

/// A payload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    pub dataset: Dataset,
    /// Contract violations that were repaired or tolerated.
    pub anomalies: Vec<RecordAnomaly>,
    /// Records of any kind that could not be read and were left out.
    pub dropped: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStop {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
    direction: Direction,
    #[serde(default)]
    last_surveyed: String,
    status: SurveyStatus,
    #[serde(default)]
    amenities: Option<Map<String, Value>>,
    #[serde(default)]
    image_url: String,
}

/// Checks that `bytes` is a JSON object with array-valued `stops`,
/// `recentActivity` and `routeCoordinates`, then reads each record.
///
/// Only the top-level shape can reject the payload. Unreadable records are
/// dropped, and stop amenities are normalized: missing or unreadable values
/// become `{detected: false, confidence: 0}`, confidences are clamped to
/// `[0, 1]` and unknown keys are ignored whatever their value.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] when the payload is not JSON or the
/// top-level shape is wrong.
pub fn validate_payload(bytes: &[u8]) -> Result<ValidatedPayload, SourceError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| SourceError::Malformed(format!("invalid JSON: {e}")))?;

    let Value::Object(mut root) = value else {
        return Err(SourceError::Malformed(
            "payload is not a JSON object".to_string(),
        ));
    };

    let raw_stops = take_array(&mut root, "stops")?;
    let raw_activity = take_array(&mut root, "recentActivity")?;
    let raw_route = take_array(&mut root, "routeCoordinates")?;

    let mut dropped = 0;
    let mut anomalies = Vec::new();

    let mut stops = Vec::with_capacity(raw_stops.len());
    for (index, item) in raw_stops.into_iter().enumerate() {
        match serde_json::from_value::<RawStop>(item) {
            Ok(raw) => {
                let (stop, found) = normalize_stop(raw);
                anomalies.extend(found);
                stops.push(stop);
            }
            Err(e) => {
                warn!(index, error = %e, "Dropping unreadable stop record");
                dropped += 1;
            }
        }
    }

    let recent_activity = read_records::<ActivityItem>(raw_activity, "activity", &mut dropped);
    let route_coordinates = read_records::<(f64, f64)>(raw_route, "route point", &mut dropped);

    for anomaly in &anomalies {
        warn!(%anomaly, "Stop record anomaly");
    }

    Ok(ValidatedPayload {
        dataset: Dataset {
            stops,
            recent_activity,
            route_coordinates,
        },
        anomalies,
        dropped,
    })
}

fn take_array(root: &mut Map<String, Value>, field: &str) -> Result<Vec<Value>, SourceError> {
    match root.remove(field) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(SourceError::Malformed(format!("`{field}` is not an array"))),
        None => Err(SourceError::Malformed(format!("`{field}` is missing"))),
    }
}

fn read_records<T>(items: Vec<Value>, what: &str, dropped: &mut usize) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %e, "Dropping unreadable {what} record");
                *dropped += 1;
                None
            }
        })
        .collect()
}

fn normalize_stop(raw: RawStop) -> (Stop, Vec<RecordAnomaly>) {
    let mut anomalies = Vec::new();
    let raw_amenities = raw.amenities.unwrap_or_default();

    for key in raw_amenities.keys() {
        if AmenityKey::from_key(key).is_none() {
            debug!(stop_id = %raw.id, key = %key, "Ignoring unknown amenity key");
        }
    }

    let amenities = Amenities::from_fn(|key| match raw_amenities.get(key.as_str()) {
        Some(Value::Object(fields)) => read_detection(&raw.id, key, fields, &mut anomalies),
        Some(_) => {
            anomalies.push(RecordAnomaly::InvalidAmenity {
                stop_id: raw.id.clone(),
                key,
            });
            AmenityDetection::default()
        }
        None => {
            anomalies.push(RecordAnomaly::MissingAmenity {
                stop_id: raw.id.clone(),
                key,
            });
            AmenityDetection::default()
        }
    });

    let stop = Stop {
        id: raw.id,
        name: raw.name,
        lat: raw.lat,
        lon: raw.lon,
        direction: raw.direction,
        last_surveyed: raw.last_surveyed,
        status: raw.status,
        amenities,
        image_url: raw.image_url,
    };
    anomalies.extend(stop.anomalies());

    (stop, anomalies)
}

/// Reads `{detected, confidence}` field by field. Absent fields default
/// silently; present fields of the wrong type default and are flagged.
fn read_detection(
    stop_id: &str,
    key: AmenityKey,
    fields: &Map<String, Value>,
    anomalies: &mut Vec<RecordAnomaly>,
) -> AmenityDetection {
    let detected = fields.get("detected").map(Value::as_bool);
    let confidence = fields.get("confidence").map(Value::as_f64);

    if matches!(detected, Some(None)) || matches!(confidence, Some(None)) {
        anomalies.push(RecordAnomaly::InvalidAmenity {
            stop_id: stop_id.to_string(),
            key,
        });
    }

    let detected = detected.flatten().unwrap_or(false);
    let value = confidence.flatten().unwrap_or(0.0);
    let clamped = if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if clamped != value {
        anomalies.push(RecordAnomaly::ConfidenceOutOfRange {
            stop_id: stop_id.to_string(),
            key,
            value,
        });
    }

    AmenityDetection::new(detected, clamped)
}
