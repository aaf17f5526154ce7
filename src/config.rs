use std::path::PathBuf;

use crate::export::EXPORT_FILENAME;
use crate::source::{DEFAULT_SURVEY_SOURCE, SurveyLocation};

pub const DEFAULT_LOG_FILE_PATH: &str = "logs/stop_amenities.log";

/// Settings read from the environment (after `.env` has been loaded).
///
/// | Variable        | Default                          |
/// |-----------------|----------------------------------|
/// | `SURVEY_SOURCE` | `data/stops_output.json`         |
/// | `EXPORT_PATH`   | `transit-stop-amenities.csv`     |
/// | `LOG_FILE_PATH` | `logs/stop_amenities.log`        |
///
/// Empty values count as unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub survey_source: String,
    pub export_path: PathBuf,
    pub log_file_path: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            survey_source: DEFAULT_SURVEY_SOURCE.to_string(),
            export_path: PathBuf::from(EXPORT_FILENAME),
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            survey_source: var("SURVEY_SOURCE").unwrap_or(defaults.survey_source),
            export_path: var("EXPORT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_path),
            log_file_path: var("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file_path),
        }
    }

    /// The survey location, with `override_source` taking precedence.
    pub fn survey_location(&self, override_source: Option<&str>) -> SurveyLocation {
        SurveyLocation::parse(override_source.unwrap_or(&self.survey_source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = DashboardConfig::from_lookup(lookup(&[]));
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.survey_source, "data/stops_output.json");
        assert_eq!(config.export_path, PathBuf::from("transit-stop-amenities.csv"));
    }

    #[test]
    fn test_values_from_environment() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("SURVEY_SOURCE", "https://example.org/data/stops_output.json"),
            ("EXPORT_PATH", "out/stops.csv"),
            ("LOG_FILE_PATH", "/var/log/stops.log"),
        ]));

        assert_eq!(config.survey_source, "https://example.org/data/stops_output.json");
        assert_eq!(config.export_path, PathBuf::from("out/stops.csv"));
        assert_eq!(config.log_file_path, PathBuf::from("/var/log/stops.log"));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = DashboardConfig::from_lookup(lookup(&[("SURVEY_SOURCE", "  ")]));
        assert_eq!(config.survey_source, DEFAULT_SURVEY_SOURCE);
    }

    #[test]
    fn test_override_source() {
        let config = DashboardConfig::default();

        assert!(matches!(
            config.survey_location(Some("http://localhost/stops.json")),
            SurveyLocation::Remote(_)
        ));
        assert!(matches!(config.survey_location(None), SurveyLocation::Local(_)));
    }
}
