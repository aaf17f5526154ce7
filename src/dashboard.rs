//! Session state behind the dashboard: current dataset, filter criteria and
//! selected stop, plus the derived view handed to presentation.
//!
//! All derived data is recomputed from the dataset and criteria on request.
//! [`Dashboard::view`] and [`Dashboard::on_export_request`] both go through
//! [`Dashboard::filtered_stops`], so map, list, charts and export always see
//! the same subset.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::export::{ExportError, ExportFile};
use crate::filter::{FilterChange, FilterCriteria, apply_filters, clear_filters};
use crate::metrics::{
    AmenityCount, DetectionSummary, Stats, StatusDistribution, amenity_distribution,
    compute_stats, confidence_percent, format_survey_date, most_recent_survey,
    status_distribution,
};
use crate::model::{ActivityItem, AmenityKey, Dataset, Direction, Stop};
use crate::source::{Snapshot, SourceKind};

pub struct Dashboard {
    snapshot: Snapshot,
    criteria: FilterCriteria,
    selected: Option<String>,
}

impl Dashboard {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            criteria: FilterCriteria::default(),
            selected: None,
        }
    }

    /// Swaps in a newly resolved dataset. Criteria and selection are kept.
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) {
        debug!(
            source = %snapshot.source,
            loading = snapshot.loading,
            stops = snapshot.dataset.stops.len(),
            "Dataset replaced"
        );
        self.snapshot = snapshot;
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.snapshot.dataset
    }

    pub fn source(&self) -> SourceKind {
        self.snapshot.source
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.loading
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn on_filter_change(&mut self, change: FilterChange) {
        self.criteria.apply(change);
    }

    pub fn clear_filters(&mut self) {
        self.criteria = clear_filters();
    }

    /// Selects `stop_id`, or deselects it when it is already selected.
    /// Map markers and activity entries both report clicks here.
    pub fn on_stop_select(&mut self, stop_id: &str) {
        if self.selected.as_deref() == Some(stop_id) {
            self.selected = None;
        } else {
            self.selected = Some(stop_id.to_string());
        }
    }

    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected stop, looked up in the full dataset so a stop stays
    /// inspectable after it is filtered out.
    pub fn selected_stop(&self) -> Option<&Stop> {
        self.selected
            .as_deref()
            .and_then(|id| self.snapshot.dataset.find_stop(id))
    }

    pub fn filtered_stops(&self) -> Vec<&Stop> {
        apply_filters(&self.snapshot.dataset.stops, &self.criteria)
    }

    pub fn on_export_request(&self) -> Result<ExportFile, ExportError> {
        let stops = self.filtered_stops();
        let export = ExportFile::from_stops(&stops)?;
        info!(rows = stops.len(), filename = export.filename, "Export prepared");
        Ok(export)
    }

    pub fn view(&self) -> DashboardView<'_> {
        let dataset = &self.snapshot.dataset;
        let filtered = self.filtered_stops();

        DashboardView {
            stats: compute_stats(&filtered),
            amenity_distribution: amenity_distribution(&filtered),
            status_distribution: status_distribution(&filtered),
            filtered,
            total_stops: dataset.stops.len(),
            last_survey: most_recent_survey(&dataset.stops),
            selected: self.selected_stop().map(StopDetail::new),
            activity: &dataset.recent_activity,
            route: &dataset.route_coordinates,
            loading: self.snapshot.loading,
            source: self.snapshot.source,
        }
    }
}

/// Everything presentation needs for one render.
#[derive(Debug)]
pub struct DashboardView<'a> {
    pub filtered: Vec<&'a Stop>,
    pub stats: Stats,
    pub amenity_distribution: Vec<AmenityCount>,
    pub status_distribution: StatusDistribution,
    pub total_stops: usize,
    /// Latest survey over the whole dataset, not just the filtered subset.
    pub last_survey: Option<DateTime<Utc>>,
    pub selected: Option<StopDetail>,
    pub activity: &'a [ActivityItem],
    pub route: &'a [(f64, f64)],
    pub loading: bool,
    pub source: SourceKind,
}

impl DashboardView<'_> {
    /// "3 of 7 stops"
    pub fn stop_count_label(&self) -> String {
        format!("{} of {} stops", self.filtered.len(), self.total_stops)
    }

    pub fn last_survey_label(&self) -> String {
        format_survey_date(self.last_survey)
    }
}

/// One amenity line of the detail panel.
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityLine {
    pub key: AmenityKey,
    pub label: &'static str,
    pub detected: bool,
    pub confidence_percent: u32,
}

/// Side-panel content for the selected stop.
#[derive(Debug, Clone, PartialEq)]
pub struct StopDetail {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub status_label: &'static str,
    /// "Feb 10, 2024, 02:30 PM", or "Never".
    pub last_surveyed: String,
    pub summary: DetectionSummary,
    pub amenities: Vec<AmenityLine>,
    pub image_url: Option<String>,
}

impl StopDetail {
    pub fn new(stop: &Stop) -> Self {
        let last_surveyed = match stop.surveyed_at() {
            Some(at) => at.format("%b %-d, %Y, %I:%M %p").to_string(),
            None => "Never".to_string(),
        };

        Self {
            id: stop.id.clone(),
            name: stop.name.clone(),
            direction: stop.direction,
            status_label: stop.status.label(),
            last_surveyed,
            summary: DetectionSummary::for_stop(stop),
            amenities: stop
                .amenities
                .iter()
                .map(|(key, d)| AmenityLine {
                    key,
                    label: key.label(),
                    detected: d.detected,
                    confidence_percent: confidence_percent(d.confidence),
                })
                .collect(),
            image_url: stop.has_image().then(|| stop.image_url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::to_csv;
    use crate::fallback::fallback_dataset;
    use crate::model::SurveyStatus;

    fn dashboard() -> Dashboard {
        Dashboard::new(Snapshot::pending())
    }

    #[test]
    fn test_initial_view_is_unfiltered_fallback() {
        let dash = dashboard();
        let view = dash.view();

        assert!(view.loading);
        assert_eq!(view.source, SourceKind::Fallback);
        assert_eq!(view.filtered.len(), 7);
        assert_eq!(view.stats.total, 7);
        assert_eq!(view.stop_count_label(), "7 of 7 stops");
        assert!(view.selected.is_none());
        assert_eq!(view.activity.len(), 7);
        assert_eq!(view.route.len(), 7);
    }

    #[test]
    fn test_select_toggles() {
        let mut dash = dashboard();

        dash.on_stop_select("1718");
        assert_eq!(dash.selected_stop().unwrap().name, "J ST & 19TH ST (EB)");

        dash.on_stop_select("1718");
        assert!(dash.selected_stop().is_none());

        dash.on_stop_select("1716");
        dash.on_stop_select("1717");
        assert_eq!(dash.selected_id(), Some("1717"));

        dash.close_detail();
        assert_eq!(dash.selected_id(), None);
    }

    #[test]
    fn test_unknown_selection_has_no_detail() {
        let mut dash = dashboard();
        dash.on_stop_select("9999");
        assert_eq!(dash.selected_id(), Some("9999"));
        assert!(dash.view().selected.is_none());
    }

    #[test]
    fn test_views_share_the_filtered_subset() {
        let mut dash = dashboard();
        dash.on_filter_change(FilterChange::Status(Some(SurveyStatus::NeedsUpdate)));

        let view = dash.view();
        let export = dash.on_export_request().unwrap();

        let view_ids: Vec<&str> = view.filtered.iter().map(|s| s.id.as_str()).collect();
        let export_ids: Vec<String> = csv::Reader::from_reader(export.contents.as_bytes())
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();

        assert_eq!(view_ids, export_ids);
        assert_eq!(view.stats.total, view.filtered.len());
        assert_eq!(view.stats.needs_update_count, view.filtered.len());
        assert_eq!(view.status_distribution.total(), view.filtered.len());
        assert_eq!(export.contents, to_csv(&view.filtered).unwrap());
    }

    #[test]
    fn test_no_match_view() {
        let mut dash = dashboard();
        dash.on_filter_change(FilterChange::Search("K ST".to_string()));

        let view = dash.view();
        assert!(view.filtered.is_empty());
        assert_eq!(view.stats, Stats::default());
        assert_eq!(view.stop_count_label(), "0 of 7 stops");

        let export = dash.on_export_request().unwrap();
        assert_eq!(export.row_count(), 0);
    }

    #[test]
    fn test_last_survey_ignores_filters() {
        let mut dash = dashboard();
        let unfiltered = dash.view().last_survey;

        dash.on_filter_change(FilterChange::Status(Some(SurveyStatus::NoData)));
        let view = dash.view();
        assert_eq!(view.last_survey, unfiltered);
        assert_eq!(
            view.last_survey_label(),
            format_survey_date(most_recent_survey(&fallback_dataset().stops))
        );
    }

    #[test]
    fn test_selected_stop_survives_filtering() {
        let mut dash = dashboard();
        dash.on_stop_select("1716");
        dash.on_filter_change(FilterChange::Search("28th".to_string()));

        let view = dash.view();
        assert_eq!(view.filtered.len(), 1);
        assert_eq!(view.selected.unwrap().id, "1716");
    }

    #[test]
    fn test_replace_snapshot_swaps_dataset() {
        let mut dash = dashboard();
        dash.on_filter_change(FilterChange::Search("16th".to_string()));

        let mut data = fallback_dataset();
        data.stops.truncate(1);
        dash.replace_snapshot(Snapshot {
            dataset: Arc::new(data),
            source: SourceKind::Survey,
            loading: false,
        });

        let view = dash.view();
        assert!(!view.loading);
        assert_eq!(view.source, SourceKind::Survey);
        assert_eq!(view.total_stops, 1);
        assert_eq!(view.filtered.len(), 1);
        assert_eq!(dash.criteria().search_query, "16th");
    }

    #[test]
    fn test_stop_detail() {
        let mut stop = fallback_dataset().stops[0].clone();
        stop.last_surveyed = "2024-02-10T14:30:00Z".to_string();
        stop.amenities.bench.confidence = 0.873;

        let detail = StopDetail::new(&stop);
        assert_eq!(detail.last_surveyed, "Feb 10, 2024, 02:30 PM");
        assert_eq!(detail.amenities.len(), 6);
        assert_eq!(detail.amenities[0].label, "Bench");
        assert_eq!(detail.amenities[0].confidence_percent, 87);
        assert_eq!(detail.summary.total, 6);
        assert_eq!(detail.summary.detected, stop.amenities.detected_count());
    }

    #[test]
    fn test_stop_detail_never_surveyed() {
        let mut stop = fallback_dataset().stops[0].clone();
        stop.last_surveyed.clear();
        stop.status = SurveyStatus::NoData;
        stop.image_url.clear();

        let detail = StopDetail::new(&stop);
        assert_eq!(detail.last_surveyed, "Never");
        assert_eq!(detail.status_label, "No Data");
        assert_eq!(detail.image_url, None);
    }
}
