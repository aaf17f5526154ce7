//! Search, amenity and status filtering shared by every stop view.

use serde::Serialize;

use crate::model::{AmenityKey, Stop, SurveyStatus};

/// Conditions a stop must meet to be shown. All set conditions must hold;
/// the default criteria select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the stop name or id. Empty matches all.
    pub search_query: String,
    /// Only stops where this amenity was detected.
    pub amenity: Option<AmenityKey>,
    /// Only stops with exactly this status.
    pub status: Option<SurveyStatus>,
}

/// A partial update coming from the filter toolbar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Search(String),
    Amenity(Option<AmenityKey>),
    Status(Option<SurveyStatus>),
    Clear,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.search_query.is_empty() && self.amenity.is_none() && self.status.is_none()
    }

    pub fn apply(&mut self, change: FilterChange) {
        match change {
            FilterChange::Search(query) => self.search_query = query,
            FilterChange::Amenity(amenity) => self.amenity = amenity,
            FilterChange::Status(status) => self.status = status,
            FilterChange::Clear => *self = clear_filters(),
        }
    }

    pub fn matches(&self, stop: &Stop) -> bool {
        Matcher::new(self).matches(stop)
    }
}

/// Criteria with the search query lowercased once.
struct Matcher<'c> {
    query: String,
    criteria: &'c FilterCriteria,
}

impl<'c> Matcher<'c> {
    fn new(criteria: &'c FilterCriteria) -> Self {
        Self {
            query: criteria.search_query.to_lowercase(),
            criteria,
        }
    }

    fn matches(&self, stop: &Stop) -> bool {
        self.matches_search(stop) && self.matches_amenity(stop) && self.matches_status(stop)
    }

    fn matches_search(&self, stop: &Stop) -> bool {
        self.query.is_empty()
            || stop.name.to_lowercase().contains(&self.query)
            || stop.id.to_lowercase().contains(&self.query)
    }

    fn matches_amenity(&self, stop: &Stop) -> bool {
        self.criteria
            .amenity
            .is_none_or(|key| stop.is_detected(key))
    }

    fn matches_status(&self, stop: &Stop) -> bool {
        self.criteria.status.is_none_or(|status| stop.status == status)
    }
}

/// Stops satisfying `criteria`, in input order.
pub fn apply_filters<'a, I>(stops: I, criteria: &FilterCriteria) -> Vec<&'a Stop>
where
    I: IntoIterator<Item = &'a Stop>,
{
    let matcher = Matcher::new(criteria);
    stops.into_iter().filter(|s| matcher.matches(s)).collect()
}

/// Criteria that select every stop.
pub fn clear_filters() -> FilterCriteria {
    FilterCriteria::default()
}
