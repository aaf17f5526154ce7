//! Counts, distributions and percentages derived from a stop collection.
//!
//! Every function takes the stops it should summarize and recomputes from
//! scratch; callers pass the filtered subset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Borrow;
use tracing::debug;

use crate::model::{AmenityKey, Stop, SurveyStatus};

/// Headline counts for a stop collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    /// Stops whose status is not `no-data`.
    pub surveyed_count: usize,
    pub recent_count: usize,
    pub needs_update_count: usize,
    /// Detected amenities summed over every stop and key.
    pub amenity_detected_total: usize,
}

impl Stats {
    pub fn from_stops<S: Borrow<Stop>>(stops: &[S]) -> Self {
        let mut s = Stats {
            total: stops.len(),
            ..Default::default()
        };

        for stop in stops {
            let stop = stop.borrow();

            match stop.status {
                SurveyStatus::Recent => s.recent_count += 1,
                SurveyStatus::NeedsUpdate => s.needs_update_count += 1,
                SurveyStatus::NoData => {}
            }

            if stop.status != SurveyStatus::NoData {
                s.surveyed_count += 1;
            }

            s.amenity_detected_total += stop.amenities.detected_count();
        }

        s
    }

    pub fn no_data_count(&self) -> usize {
        self.total - self.surveyed_count
    }
}

pub fn compute_stats<S: Borrow<Stop>>(stops: &[S]) -> Stats {
    Stats::from_stops(stops)
}

/// Percentage of `part` in `total`; 0 when `total` is 0.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// A confidence in `[0, 1]` as a whole percentage, rounded half up.
pub fn confidence_percent(confidence: f64) -> u32 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Number of stops with one amenity detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmenityCount {
    pub key: AmenityKey,
    pub label: &'static str,
    pub detected_count: usize,
}

/// One entry per amenity key, in canonical order.
pub fn amenity_distribution<S: Borrow<Stop>>(stops: &[S]) -> Vec<AmenityCount> {
    AmenityKey::ALL
        .into_iter()
        .map(|key| AmenityCount {
            key,
            label: key.label(),
            detected_count: stops
                .iter()
                .filter(|&s| s.borrow().is_detected(key))
                .count(),
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDistribution {
    pub recent: usize,
    pub needs_update: usize,
    pub no_data: usize,
}

impl StatusDistribution {
    pub fn total(&self) -> usize {
        self.recent + self.needs_update + self.no_data
    }

    pub fn get(&self, status: SurveyStatus) -> usize {
        match status {
            SurveyStatus::Recent => self.recent,
            SurveyStatus::NeedsUpdate => self.needs_update,
            SurveyStatus::NoData => self.no_data,
        }
    }

    /// `(label, count)` pairs in status order, for chart legends.
    pub fn labelled(&self) -> [(&'static str, usize); 3] {
        SurveyStatus::ALL.map(|st| (st.label(), self.get(st)))
    }
}

pub fn status_distribution<S: Borrow<Stop>>(stops: &[S]) -> StatusDistribution {
    let mut d = StatusDistribution::default();
    for stop in stops {
        match stop.borrow().status {
            SurveyStatus::Recent => d.recent += 1,
            SurveyStatus::NeedsUpdate => d.needs_update += 1,
            SurveyStatus::NoData => d.no_data += 1,
        }
    }
    d
}

/// Latest `lastSurveyed` over the stops. Empty values are skipped rather than
/// read as the epoch; `None` when no stop has a usable timestamp.
pub fn most_recent_survey<S: Borrow<Stop>>(stops: &[S]) -> Option<DateTime<Utc>> {
    stops
        .iter()
        .map(|s| s.borrow())
        .filter(|s: &&Stop| !s.last_surveyed.is_empty())
        .filter_map(|s| {
            let parsed = s.surveyed_at();
            if parsed.is_none() {
                debug!(stop_id = %s.id, value = %s.last_surveyed, "Unparseable lastSurveyed");
            }
            parsed
        })
        .max()
}

/// "Feb 10, 2024", or "N/A" when there is no survey date.
pub fn format_survey_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => "N/A".to_string(),
    }
}

/// How many of a stop's amenities were detected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub detected: usize,
    pub total: usize,
    pub percent: f64,
}

impl DetectionSummary {
    pub fn for_stop(stop: &Stop) -> Self {
        let total = stop.amenities.iter().count();
        let detected = stop.amenities.detected_count();
        Self {
            detected,
            total,
            percent: pct(detected, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AmenityDetection, Amenities, Direction};

    fn stop(id: &str, status: SurveyStatus, last_surveyed: &str) -> Stop {
        Stop {
            id: id.to_string(),
            name: format!("Stop {id}"),
            lat: 38.57,
            lon: -121.48,
            direction: Direction::Outbound,
            last_surveyed: last_surveyed.to_string(),
            status,
            amenities: Amenities::default(),
            image_url: String::new(),
        }
    }

    fn sample() -> Vec<Stop> {
        let mut a = stop("1", SurveyStatus::Recent, "2024-02-10T14:30:00Z");
        a.amenities.bench = AmenityDetection::new(true, 0.9);
        a.amenities.shelter = AmenityDetection::new(true, 0.8);
        let mut b = stop("2", SurveyStatus::NeedsUpdate, "2024-01-28T10:00:00Z");
        b.amenities.bench = AmenityDetection::new(true, 0.7);
        b.amenities.lighting = AmenityDetection::new(false, 0.15);
        let c = stop("3", SurveyStatus::NoData, "");
        vec![a, b, c]
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(pct(50, 100), 50.0);
        assert_eq!(pct(3, 6), 50.0);
    }

    #[test]
    fn test_confidence_percent_rounds() {
        assert_eq!(confidence_percent(0.9), 90);
        assert_eq!(confidence_percent(0.876), 88);
        assert_eq!(confidence_percent(0.004), 0);
        assert_eq!(confidence_percent(1.0), 100);
    }

    #[test]
    fn test_stats_empty() {
        let stops: Vec<Stop> = Vec::new();
        assert_eq!(compute_stats(&stops), Stats::default());
        assert_eq!(most_recent_survey(&stops), None);
        assert_eq!(status_distribution(&stops).total(), 0);
        assert!(amenity_distribution(&stops).iter().all(|c| c.detected_count == 0));
    }

    #[test]
    fn test_stats_counts() {
        let stats = compute_stats(&sample());

        assert_eq!(stats.total, 3);
        assert_eq!(stats.surveyed_count, 2);
        assert_eq!(stats.recent_count, 1);
        assert_eq!(stats.needs_update_count, 1);
        assert_eq!(stats.no_data_count(), 1);
        assert_eq!(stats.amenity_detected_total, 3);
        assert_eq!(
            stats.recent_count + stats.needs_update_count + stats.no_data_count(),
            stats.total
        );
    }

    #[test]
    fn test_stats_single_no_data_stop() {
        let stats = compute_stats(&[stop("1", SurveyStatus::NoData, "")]);
        assert_eq!(stats.surveyed_count, 0);
        assert_eq!(stats.amenity_detected_total, 0);
    }

    #[test]
    fn test_stats_over_borrowed_subset() {
        let stops = sample();
        let subset: Vec<&Stop> = stops.iter().filter(|s| s.id != "3").collect();
        assert_eq!(compute_stats(&subset).total, 2);
    }

    #[test]
    fn test_amenity_distribution_in_canonical_order() {
        let dist = amenity_distribution(&sample());

        let keys: Vec<_> = dist.iter().map(|c| c.key).collect();
        assert_eq!(keys, AmenityKey::ALL.to_vec());
        assert_eq!(dist[0].label, "Bench");
        assert_eq!(dist[0].detected_count, 2);
        assert_eq!(dist[1].detected_count, 1);
        assert_eq!(dist[2].detected_count, 0);
    }

    #[test]
    fn test_status_distribution_sums_to_total() {
        let stops = sample();
        let dist = status_distribution(&stops);
        assert_eq!(
            dist,
            StatusDistribution {
                recent: 1,
                needs_update: 1,
                no_data: 1
            }
        );
        assert_eq!(dist.total(), stops.len());
        assert_eq!(dist.labelled()[2], ("No Data", 1));
    }

    #[test]
    fn test_most_recent_survey_skips_empty() {
        let latest = most_recent_survey(&sample()).unwrap();
        assert_eq!(latest.to_rfc3339(), "2024-02-10T14:30:00+00:00");
        assert_eq!(format_survey_date(Some(latest)), "Feb 10, 2024");
    }

    #[test]
    fn test_most_recent_survey_none_when_never_surveyed() {
        let stops = vec![stop("1", SurveyStatus::NoData, ""), stop("2", SurveyStatus::NoData, "")];
        assert_eq!(most_recent_survey(&stops), None);
        assert_eq!(format_survey_date(None), "N/A");
    }

    #[test]
    fn test_detection_summary() {
        let summary = DetectionSummary::for_stop(&sample()[0]);
        assert_eq!(summary.detected, 2);
        assert_eq!(summary.total, 6);
        assert!((summary.percent - 33.333).abs() < 0.01);
    }
}
