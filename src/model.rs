//! Shared record types: stops, amenity detections and activity events.
//!
//! Field names serialize to the camelCase shape of the survey feed
//! (`stops_output.json`), so a [`Dataset`] read from the feed can be written
//! back out unchanged.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A survey younger than this many days classifies as [`SurveyStatus::Recent`].
pub const STATUS_RECENT_DAYS: i64 = 7;

/// Surveys older than this are still `needs-update`, but count as overdue.
pub const STATUS_NEEDS_UPDATE_DAYS: i64 = 30;

/// One of the six tracked physical features of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AmenityKey {
    Bench,
    Shelter,
    Lighting,
    BikeRack,
    TrashCan,
    RealtimeDisplay,
}

impl AmenityKey {
    /// Canonical order used by distributions, the detail view and CSV columns.
    pub const ALL: [AmenityKey; 6] = [
        AmenityKey::Bench,
        AmenityKey::Shelter,
        AmenityKey::Lighting,
        AmenityKey::BikeRack,
        AmenityKey::TrashCan,
        AmenityKey::RealtimeDisplay,
    ];

    /// Key as it appears in the survey feed.
    pub fn as_str(self) -> &'static str {
        match self {
            AmenityKey::Bench => "bench",
            AmenityKey::Shelter => "shelter",
            AmenityKey::Lighting => "lighting",
            AmenityKey::BikeRack => "bikeRack",
            AmenityKey::TrashCan => "trashCan",
            AmenityKey::RealtimeDisplay => "realtimeDisplay",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            AmenityKey::Bench => "Bench",
            AmenityKey::Shelter => "Shelter",
            AmenityKey::Lighting => "Lighting",
            AmenityKey::BikeRack => "Bike Rack",
            AmenityKey::TrashCan => "Trash Can",
            AmenityKey::RealtimeDisplay => "Real-time Display",
        }
    }

    /// Exact feed-key lookup. Labels and other spellings are not accepted.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for AmenityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown amenity '{0}' (expected one of bench, shelter, lighting, bikeRack, trashCan, realtimeDisplay)")]
pub struct UnknownAmenity(pub String);

impl FromStr for AmenityKey {
    type Err = UnknownAmenity;

    /// Accepts the feed key or the label, ignoring case ("bikeRack", "bike rack").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted) || k.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownAmenity(s.to_string()))
    }
}

/// Presence flag plus confidence score for one amenity at one stop.
///
/// The two fields are supplied independently: a non-detection may still carry
/// a nonzero confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AmenityDetection {
    pub detected: bool,
    pub confidence: f64,
}

impl AmenityDetection {
    pub fn new(detected: bool, confidence: f64) -> Self {
        Self {
            detected,
            confidence,
        }
    }
}

/// Detections for every [`AmenityKey`]; a key can never be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Amenities {
    pub bench: AmenityDetection,
    pub shelter: AmenityDetection,
    pub lighting: AmenityDetection,
    pub bike_rack: AmenityDetection,
    pub trash_can: AmenityDetection,
    pub realtime_display: AmenityDetection,
}

impl Amenities {
    /// Builds the mapping by asking `f` for each key in canonical order.
    pub fn from_fn(mut f: impl FnMut(AmenityKey) -> AmenityDetection) -> Self {
        Self {
            bench: f(AmenityKey::Bench),
            shelter: f(AmenityKey::Shelter),
            lighting: f(AmenityKey::Lighting),
            bike_rack: f(AmenityKey::BikeRack),
            trash_can: f(AmenityKey::TrashCan),
            realtime_display: f(AmenityKey::RealtimeDisplay),
        }
    }

    pub fn get(&self, key: AmenityKey) -> &AmenityDetection {
        match key {
            AmenityKey::Bench => &self.bench,
            AmenityKey::Shelter => &self.shelter,
            AmenityKey::Lighting => &self.lighting,
            AmenityKey::BikeRack => &self.bike_rack,
            AmenityKey::TrashCan => &self.trash_can,
            AmenityKey::RealtimeDisplay => &self.realtime_display,
        }
    }

    pub fn get_mut(&mut self, key: AmenityKey) -> &mut AmenityDetection {
        match key {
            AmenityKey::Bench => &mut self.bench,
            AmenityKey::Shelter => &mut self.shelter,
            AmenityKey::Lighting => &mut self.lighting,
            AmenityKey::BikeRack => &mut self.bike_rack,
            AmenityKey::TrashCan => &mut self.trash_can,
            AmenityKey::RealtimeDisplay => &mut self.realtime_display,
        }
    }

    /// Iterates in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (AmenityKey, &AmenityDetection)> + '_ {
        AmenityKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }

    pub fn detected_count(&self) -> usize {
        self.iter().filter(|(_, a)| a.detected).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Inbound => "Inbound",
            Direction::Outbound => "Outbound",
        })
    }
}

/// Survey freshness of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurveyStatus {
    Recent,
    NeedsUpdate,
    NoData,
}

impl SurveyStatus {
    pub const ALL: [SurveyStatus; 3] = [
        SurveyStatus::Recent,
        SurveyStatus::NeedsUpdate,
        SurveyStatus::NoData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SurveyStatus::Recent => "recent",
            SurveyStatus::NeedsUpdate => "needs-update",
            SurveyStatus::NoData => "no-data",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SurveyStatus::Recent => "Recent",
            SurveyStatus::NeedsUpdate => "Needs Update",
            SurveyStatus::NoData => "No Data",
        }
    }

    /// Classifies a `lastSurveyed` value by its age at `now`.
    ///
    /// Empty or unparseable timestamps are `no-data`; anything up to
    /// [`STATUS_RECENT_DAYS`] old is `recent`; everything older is
    /// `needs-update`.
    pub fn classify(last_surveyed: &str, now: DateTime<Utc>) -> Self {
        match parse_survey_timestamp(last_surveyed) {
            None => SurveyStatus::NoData,
            Some(at) if now - at <= Duration::days(STATUS_RECENT_DAYS) => SurveyStatus::Recent,
            Some(_) => SurveyStatus::NeedsUpdate,
        }
    }

    /// Whether the survey is more than [`STATUS_NEEDS_UPDATE_DAYS`] old.
    /// A stop that was never surveyed is not overdue; it has no data.
    pub fn is_overdue(last_surveyed: &str, now: DateTime<Utc>) -> bool {
        parse_survey_timestamp(last_surveyed)
            .is_some_and(|at| now - at > Duration::days(STATUS_NEEDS_UPDATE_DAYS))
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status '{0}' (expected recent, needs-update or no-data)")]
pub struct UnknownStatus(pub String);

impl FromStr for SurveyStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(wanted) || st.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Parses an ISO-8601 survey timestamp. Values without an offset are read as UTC.
pub fn parse_survey_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A physical transit stop with its latest survey state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub direction: Direction,
    /// ISO-8601 timestamp, or empty when the stop was never surveyed.
    pub last_surveyed: String,
    pub status: SurveyStatus,
    pub amenities: Amenities,
    /// Empty when no image was captured.
    pub image_url: String,
}

impl Stop {
    pub fn surveyed_at(&self) -> Option<DateTime<Utc>> {
        parse_survey_timestamp(&self.last_surveyed)
    }

    pub fn is_detected(&self, key: AmenityKey) -> bool {
        self.amenities.get(key).detected
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }

    /// Contract violations in this record that consumers tolerate but should report.
    pub fn anomalies(&self) -> Vec<RecordAnomaly> {
        let mut found = Vec::new();
        for (key, detection) in self.amenities.iter() {
            if !(0.0..=1.0).contains(&detection.confidence) {
                found.push(RecordAnomaly::ConfidenceOutOfRange {
                    stop_id: self.id.clone(),
                    key,
                    value: detection.confidence,
                });
            }
            if self.status == SurveyStatus::NoData && detection.detected {
                found.push(RecordAnomaly::DetectedWithoutData {
                    stop_id: self.id.clone(),
                    key,
                });
            }
        }
        found
    }
}

/// A stop record that breaks the feed contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordAnomaly {
    #[error("stop {stop_id}: amenity '{key}' missing, treated as not detected")]
    MissingAmenity { stop_id: String, key: AmenityKey },
    #[error("stop {stop_id}: amenity '{key}' has an unreadable value, treated as not detected")]
    InvalidAmenity { stop_id: String, key: AmenityKey },
    #[error("stop {stop_id}: amenity '{key}' confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange {
        stop_id: String,
        key: AmenityKey,
        value: f64,
    },
    #[error("stop {stop_id}: amenity '{key}' detected on a no-data stop")]
    DetectedWithoutData { stop_id: String, key: AmenityKey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    Survey,
    AmenityChange,
    Alert,
}

/// An entry in the recent-activity log.
///
/// `stop_id` is a lookup-only reference and `stop_name` a snapshot taken when
/// the entry was written; neither is checked against the stop list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    pub stop_id: String,
    pub stop_name: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
}

/// Everything one session displays. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub stops: Vec<Stop>,
    pub recent_activity: Vec<ActivityItem>,
    /// Route polyline as `[lat, lon]` pairs.
    pub route_coordinates: Vec<(f64, f64)>,
}

impl Dataset {
    pub fn find_stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == stop_id)
    }

    pub fn anomalies(&self) -> Vec<RecordAnomaly> {
        self.stops.iter().flat_map(Stop::anomalies).collect()
    }
}
