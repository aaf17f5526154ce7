//! Resolution of the session dataset: the survey feed when it can be read,
//! the bundled fallback otherwise.
//!
//! Failures never reach the caller. A missing file, a non-success response or
//! a malformed payload all resolve to [`SourceKind::Fallback`].

mod loader;
mod validate;

pub use loader::{Snapshot, SurveyLoader};
pub use validate::{ValidatedPayload, validate_payload};

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::fallback::fallback_dataset;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::model::{Dataset, RecordAnomaly};

/// Well-known location of the survey output.
pub const DEFAULT_SURVEY_SOURCE: &str = "data/stops_output.json";

/// Where the session's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Survey,
    Fallback,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Survey => "survey",
            SourceKind::Fallback => "fallback",
        })
    }
}

/// Why the survey feed was not used.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("survey source unavailable: {0}")]
    Unavailable(String),
    #[error("survey payload malformed: {0}")]
    Malformed(String),
}

/// A survey feed address: an HTTP(S) URL or a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyLocation {
    Remote(String),
    Local(PathBuf),
}

impl SurveyLocation {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            SurveyLocation::Remote(location.to_string())
        } else {
            SurveyLocation::Local(PathBuf::from(location))
        }
    }
}

impl fmt::Display for SurveyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurveyLocation::Remote(url) => f.write_str(url),
            SurveyLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub dataset: Arc<Dataset>,
    pub source: SourceKind,
    pub anomalies: Vec<RecordAnomaly>,
}

impl Resolution {
    pub fn fallback() -> Self {
        Self {
            dataset: Arc::new(fallback_dataset()),
            source: SourceKind::Fallback,
            anomalies: Vec::new(),
        }
    }
}

/// Reads and validates the survey feed at `location`.
///
/// # Errors
///
/// [`SourceError::Unavailable`] when the bytes cannot be obtained,
/// [`SourceError::Malformed`] when they fail validation.
pub async fn load_survey<C: HttpClient>(
    client: &C,
    location: &SurveyLocation,
) -> Result<ValidatedPayload, SourceError> {
    let bytes = match location {
        SurveyLocation::Remote(url) => fetch_bytes(client, url)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{e:#}")))?,
        SurveyLocation::Local(path) => tokio::fs::read(path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?,
    };
    validate_payload(&bytes)
}

/// Makes the single survey attempt of a session and settles on a dataset.
#[tracing::instrument(skip(client, location), fields(location = %location))]
pub async fn resolve<C: HttpClient>(client: &C, location: &SurveyLocation) -> Resolution {
    match load_survey(client, location).await {
        Ok(validated) => {
            info!(
                stops = validated.dataset.stops.len(),
                activity = validated.dataset.recent_activity.len(),
                dropped = validated.dropped,
                anomalies = validated.anomalies.len(),
                "Using survey dataset"
            );
            Resolution {
                dataset: Arc::new(validated.dataset),
                source: SourceKind::Survey,
                anomalies: validated.anomalies,
            }
        }
        Err(e) => {
            warn!(error = %e, "Survey dataset not used, falling back to bundled data");
            Resolution::fallback()
        }
    }
}
