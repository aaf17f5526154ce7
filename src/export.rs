//! CSV export of a stop collection.
//!
//! Column layout: stop fields, then one "Detected" column per amenity, then
//! one "Confidence" column per amenity, both in canonical amenity order.
//! Every field is quoted; embedded quotes are doubled.

use anyhow::Result;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::borrow::Borrow;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::confidence_percent;
use crate::model::{AmenityKey, Stop};

/// Suggested filename for a downloaded export.
pub const EXPORT_FILENAME: &str = "transit-stop-amenities.csv";
pub const EXPORT_MIME_TYPE: &str = "text/csv";

/// Written in place of an empty `lastSurveyed`.
pub const NEVER_SURVEYED: &str = "N/A";

const STOP_COLUMNS: [&str; 7] = [
    "Stop ID",
    "Stop Name",
    "Direction",
    "Latitude",
    "Longitude",
    "Status",
    "Last Surveyed",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV record: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV output: {0}")]
    Io(#[from] io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// A ready-to-save export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: &'static str,
    pub mime_type: &'static str,
    pub contents: String,
    rows: usize,
}

impl ExportFile {
    pub fn from_stops<S: Borrow<Stop>>(stops: &[S]) -> Result<Self, ExportError> {
        Ok(Self {
            filename: EXPORT_FILENAME,
            mime_type: EXPORT_MIME_TYPE,
            contents: to_csv(stops)?,
            rows: stops.len(),
        })
    }

    /// Data records, excluding the header. Quoted fields may span lines, so
    /// this is not the line count of `contents`.
    pub fn row_count(&self) -> usize {
        self.rows
    }
}

pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = STOP_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(AmenityKey::ALL.iter().map(|k| format!("{} Detected", k.label())));
    columns.extend(AmenityKey::ALL.iter().map(|k| format!("{} Confidence", k.label())));
    columns
}

fn row(stop: &Stop) -> Vec<String> {
    let last_surveyed = if stop.last_surveyed.is_empty() {
        NEVER_SURVEYED.to_string()
    } else {
        stop.last_surveyed.clone()
    };

    let mut fields = vec![
        stop.id.clone(),
        stop.name.clone(),
        stop.direction.to_string(),
        stop.lat.to_string(),
        stop.lon.to_string(),
        stop.status.to_string(),
        last_surveyed,
    ];
    fields.extend(
        AmenityKey::ALL
            .iter()
            .map(|&k| (if stop.is_detected(k) { "Yes" } else { "No" }).to_string()),
    );
    fields.extend(
        AmenityKey::ALL
            .iter()
            .map(|&k| format!("{}%", confidence_percent(stop.amenities.get(k).confidence))),
    );
    fields
}

/// Writes the header and one row per stop, each line ending in `\n`.
pub fn write_csv<W, S>(writer: W, stops: &[S]) -> Result<(), ExportError>
where
    W: io::Write,
    S: Borrow<Stop>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    writer.write_record(header())?;
    for stop in stops {
        writer.write_record(row(stop.borrow()))?;
    }
    writer.flush()?;

    Ok(())
}

/// The export as text, without a trailing newline. An empty input yields the
/// header line alone.
pub fn to_csv<S: Borrow<Stop>>(stops: &[S]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, stops)?;

    let mut text = String::from_utf8(buf)?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Writes the export to `path`, replacing any existing file.
pub fn write_export<S: Borrow<Stop>>(path: &Path, stops: &[S]) -> Result<()> {
    debug!(path = %path.display(), rows = stops.len(), "Writing CSV export");

    let file = std::fs::File::create(path)?;
    write_csv(io::BufWriter::new(file), stops)?;

    info!(path = %path.display(), rows = stops.len(), "CSV export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AmenityDetection, Amenities, Direction, SurveyStatus};
    use std::fs;

    fn stop(id: &str, status: SurveyStatus, last_surveyed: &str) -> Stop {
        Stop {
            id: id.to_string(),
            name: format!("J ST & {id}TH ST (EB)"),
            lat: 38.577968,
            lon: -121.484995,
            direction: Direction::Outbound,
            last_surveyed: last_surveyed.to_string(),
            status,
            amenities: Amenities::default(),
            image_url: String::new(),
        }
    }

    fn parse(csv_text: &str) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(csv_text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    fn column(name: &str) -> usize {
        header().iter().position(|h| h == name).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let header = header();
        assert_eq!(header.len(), 7 + 12);
        assert_eq!(header[0], "Stop ID");
        assert_eq!(header[6], "Last Surveyed");
        assert_eq!(header[7], "Bench Detected");
        assert_eq!(header[12], "Real-time Display Detected");
        assert_eq!(header[13], "Bench Confidence");
        assert_eq!(header[18], "Real-time Display Confidence");
    }

    #[test]
    fn test_empty_input_is_header_only() {
        let stops: Vec<Stop> = Vec::new();
        let text = to_csv(&stops).unwrap();

        assert_eq!(text.split('\n').count(), 1);
        assert!(text.starts_with("\"Stop ID\",\"Stop Name\""));
    }

    #[test]
    fn test_bench_scenario() {
        let mut first = stop("16", SurveyStatus::Recent, "2024-02-10T14:30:00Z");
        first.amenities.bench = AmenityDetection::new(true, 0.9);
        let second = stop("18", SurveyStatus::NeedsUpdate, "2024-01-28T10:00:00Z");

        let rows = parse(&to_csv(&[first, second]).unwrap());
        assert_eq!(rows.len(), 3);

        let detected = column("Bench Detected");
        let confidence = column("Bench Confidence");
        assert_eq!(rows[1][detected], "Yes");
        assert_eq!(rows[1][confidence], "90%");
        assert_eq!(rows[2][detected], "No");
        assert_eq!(rows[2][confidence], "0%");
    }

    #[test]
    fn test_row_fields() {
        let rows = parse(&to_csv(&[stop("16", SurveyStatus::NoData, "")]).unwrap());
        let row = &rows[1];

        assert_eq!(row[0], "16");
        assert_eq!(row[1], "J ST & 16TH ST (EB)");
        assert_eq!(row[2], "Outbound");
        assert_eq!(row[3], "38.577968");
        assert_eq!(row[4], "-121.484995");
        assert_eq!(row[5], "no-data");
        assert_eq!(row[6], NEVER_SURVEYED);
    }

    #[test]
    fn test_every_field_quoted() {
        let text = to_csv(&[stop("16", SurveyStatus::Recent, "2024-02-10T14:30:00Z")]).unwrap();
        let data_line = text.lines().nth(1).unwrap();

        assert!(data_line.starts_with("\"16\",\"J ST & 16TH ST (EB)\",\"Outbound\",\"38.577968\""));
        assert_eq!(data_line.matches('"').count(), 19 * 2);
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let mut s = stop("16", SurveyStatus::Recent, "");
        s.name = "Main St \"North\"".to_string();

        let text = to_csv(&[s]).unwrap();
        assert!(text.contains("\"Main St \"\"North\"\"\""));
        assert_eq!(parse(&text)[1][1], "Main St \"North\"");
    }

    #[test]
    fn test_row_order_follows_input() {
        let stops = vec![
            stop("22", SurveyStatus::Recent, ""),
            stop("16", SurveyStatus::Recent, ""),
            stop("19", SurveyStatus::Recent, ""),
        ];
        let rows = parse(&to_csv(&stops).unwrap());
        let ids: Vec<_> = rows[1..].iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["22", "16", "19"]);
    }

    #[test]
    fn test_export_file_metadata() {
        let export = ExportFile::from_stops(&[stop("16", SurveyStatus::Recent, "")]).unwrap();
        assert_eq!(export.filename, "transit-stop-amenities.csv");
        assert_eq!(export.mime_type, "text/csv");
        assert_eq!(export.row_count(), 1);
    }

    #[test]
    fn test_row_count_ignores_embedded_newlines() {
        let mut s = stop("16", SurveyStatus::Recent, "");
        s.name = "J ST &\n16TH ST".to_string();

        let export = ExportFile::from_stops(&[s]).unwrap();
        assert_eq!(export.row_count(), 1);
        assert_eq!(export.contents.lines().count(), 3);
        assert_eq!(parse(&export.contents).len(), 2);
        assert_eq!(parse(&export.contents)[1][1], "J ST &\n16TH ST");
    }

    #[test]
    fn test_write_export_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_FILENAME);

        write_export(&path, &[stop("16", SurveyStatus::Recent, "")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(content.trim_end(), to_csv(&[stop("16", SurveyStatus::Recent, "")]).unwrap());
    }
}
