//! Catalog file loading.
//!
//! Reads delimited event catalogs (the INGV `|`-separated text export, or a
//! plain CSV) into [`EventRecord`]s. Every malformed row is skipped, logged
//! and reported in the [`LoadReport`]; one bad row never aborts a batch.
//!
//! # Format
//!
//! - The first non-empty line is the header. A leading `#` is ignored and
//!   names are matched case-insensitively, ignoring punctuation, so
//!   `#EventID`, `event_id` and `Event ID` all map to the identifier.
//! - The delimiter is `|` when the header contains one, `,` otherwise.
//!   Fields may be wrapped in double quotes (`""` escapes a quote).
//! - Files are decoded as UTF-8 (a BOM is dropped) and fall back to
//!   Windows-1252 when they are not valid UTF-8.
//! - HTML character references in fields (`&amp;`, `&#39;`, `&igrave;`, ...)
//!   are decoded.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use html_escape::decode_html_entities;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{RagError, Result};
use crate::record::{EventRecord, RawEvent, RecordRejection};

/// File extensions treated as catalog files.
pub const CATALOG_EXTENSIONS: [&str; 2] = ["txt", "csv"];

/// A source row that did not become a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// File the row came from.
    pub file: PathBuf,
    /// 1-based line number within the file.
    pub line: usize,
    /// Why the row was skipped.
    pub reason: RecordRejection,
}

/// Outcome of loading one file or a directory of files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Accepted records, in file order then row order.
    pub records: Vec<EventRecord>,
    /// Skipped rows.
    pub rejected: Vec<Rejection>,
    /// Catalog files that were read.
    pub files: Vec<PathBuf>,
    /// Files skipped because their header could not be mapped.
    pub skipped_files: Vec<PathBuf>,
}

impl LoadReport {
    /// Number of skipped rows.
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Column roles a header name can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    EventId,
    Time,
    Latitude,
    Longitude,
    Depth,
    Magnitude,
    MagType,
    Location,
    EventType,
    Author,
    Catalog,
}

impl Column {
    /// Map a header name to a column role.
    fn from_header(name: &str) -> Option<Self> {
        let key: String = name
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        Some(match key.as_str() {
            "eventid" | "id" | "event" => Self::EventId,
            "time" | "datetime" | "date" | "origintime" => Self::Time,
            "latitude" | "lat" => Self::Latitude,
            "longitude" | "lon" | "lng" => Self::Longitude,
            "depthkm" | "depth" => Self::Depth,
            "magnitude" | "mag" => Self::Magnitude,
            "magtype" | "magnitudetype" => Self::MagType,
            "eventlocationname" | "location" | "locationname" | "place" => Self::Location,
            "eventtype" | "type" => Self::EventType,
            "author" => Self::Author,
            "catalog" => Self::Catalog,
            _ => return None,
        })
    }
}

/// Header layout of one file.
#[derive(Debug)]
struct Layout {
    delimiter: char,
    width: usize,
    /// `(column role, field position)`; the first header mapping a role wins.
    columns: Vec<(Column, usize)>,
}

impl Layout {
    fn parse(header: &str) -> std::result::Result<Self, String> {
        let delimiter = if header.contains('|') { '|' } else { ',' };
        let names = split_row(header, delimiter);

        let mut columns: Vec<(Column, usize)> = Vec::new();
        for (position, name) in names.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                if !columns.iter().any(|(c, _)| *c == column) {
                    columns.push((column, position));
                }
            }
        }

        for (required, label) in [(Column::EventId, "event id"), (Column::Time, "time")] {
            if !columns.iter().any(|(c, _)| *c == required) {
                return Err(format!("header has no {label} column"));
            }
        }

        Ok(Self { delimiter, width: names.len(), columns })
    }

    fn raw_event(&self, fields: Vec<String>) -> RawEvent {
        let mut raw = RawEvent::default();
        for &(column, position) in &self.columns {
            let value = decode_html_entities(&fields[position]).into_owned();
            match column {
                Column::EventId => raw.event_id = value,
                Column::Time => raw.time = value,
                Column::Latitude => raw.latitude = value,
                Column::Longitude => raw.longitude = value,
                Column::Depth => raw.depth_km = value,
                Column::Magnitude => raw.magnitude = value,
                Column::MagType => raw.mag_type = value,
                Column::Location => raw.location = value,
                Column::EventType => raw.event_type = value,
                Column::Author => raw.author = Some(value),
                Column::Catalog => raw.catalog = Some(value),
            }
        }
        raw
    }
}

/// Parse catalog `text` read from `file`, appending to `report`.
///
/// `seen` holds identifiers accepted so far; a repeated identifier is
/// rejected so the first occurrence wins.
fn parse_into(
    text: &str,
    file: &Path,
    seen: &mut HashSet<String>,
    report: &mut LoadReport,
) -> Result<()> {
    let mut lines = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| RagError::Ingestion(format!("{}: file has no header row", file.display())))?;
    let layout = Layout::parse(header)
        .map_err(|message| RagError::Ingestion(format!("{}: {message}", file.display())))?;

    for (index, line) in lines {
        let fields = split_row(line, layout.delimiter);
        let outcome = if fields.len() != layout.width {
            Err(RecordRejection::ColumnCount { expected: layout.width, found: fields.len() })
        } else {
            EventRecord::try_from(layout.raw_event(fields)).and_then(|record| {
                if seen.insert(record.event_id.clone()) {
                    Ok(record)
                } else {
                    Err(RecordRejection::DuplicateId(record.event_id))
                }
            })
        };

        match outcome {
            Ok(record) => report.records.push(record),
            Err(reason) => {
                warn!(file = %file.display(), line = index + 1, %reason, "skipping catalog row");
                report.rejected.push(Rejection { file: file.to_path_buf(), line: index + 1, reason });
            }
        }
    }

    Ok(())
}

/// Load a single catalog file.
///
/// A file whose rows are all rejected still loads successfully; check
/// [`LoadReport::records`].
///
/// # Errors
///
/// - [`RagError::Io`] if the file cannot be read
/// - [`RagError::Ingestion`] if the header is missing or lacks an event id
///   or time column
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadReport> {
    let path = path.as_ref();
    let mut report = LoadReport::default();
    let text = read_catalog(path)?;
    parse_into(&text, path, &mut HashSet::new(), &mut report)?;
    report.files.push(path.to_path_buf());

    info!(
        file = %path.display(),
        records = report.records.len(),
        rejected = report.rejected_count(),
        "loaded catalog file"
    );
    Ok(report)
}

/// Load every `.txt` / `.csv` file under `dir`, in file-name order.
///
/// Identifiers are de-duplicated across files. Files whose header cannot be
/// mapped are skipped with a warning and listed in
/// [`LoadReport::skipped_files`].
///
/// # Errors
///
/// - [`RagError::Io`] if `dir` or one of its files cannot be read
/// - [`RagError::NoValidRecords`] if no record survives validation
pub fn load_dir(dir: impl AsRef<Path>) -> Result<LoadReport> {
    let dir = dir.as_ref();
    let metadata = fs::metadata(dir).map_err(|e| RagError::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(RagError::Ingestion(format!("{} is not a directory", dir.display())));
    }

    let files = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_catalog_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    let mut report = LoadReport::default();
    let mut seen = HashSet::new();

    for file in files {
        let text = read_catalog(&file)?;
        match parse_into(&text, &file, &mut seen, &mut report) {
            Ok(()) => report.files.push(file),
            Err(RagError::Ingestion(message)) => {
                warn!(file = %file.display(), %message, "skipping catalog file");
                report.skipped_files.push(file);
            }
            Err(other) => return Err(other),
        }
    }

    info!(
        dir = %dir.display(),
        files = report.files.len(),
        records = report.records.len(),
        rejected = report.rejected_count(),
        "loaded catalog directory"
    );

    if report.records.is_empty() {
        return Err(RagError::NoValidRecords {
            files: report.files.len(),
            rejected: report.rejected_count(),
        });
    }
    Ok(report)
}

fn is_catalog_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CATALOG_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn read_catalog(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| RagError::io(path, e))?;
    Ok(decode(bytes))
}

/// Decode catalog bytes: UTF-8 without BOM, else Windows-1252.
pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        },
        Err(err) => err.as_bytes().iter().map(|&b| decode_cp1252(b)).collect(),
    }
}

/// Windows-1252 differs from ISO-8859-1 only in 0x80..=0x9F; the five
/// undefined positions keep their ISO-8859-1 meaning.
fn decode_cp1252(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20ac}', '\u{81}', '\u{201a}', '\u{192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
        '\u{2c6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8d}', '\u{17d}', '\u{8f}',
        '\u{90}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
        '\u{2dc}', '\u{2122}', '\u{161}', '\u{203a}', '\u{153}', '\u{9d}', '\u{17e}', '\u{178}',
    ];
    match byte {
        0x80..=0x9f => HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

/// Split one row on `delimiter`, honouring double-quoted fields.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' if quoted => quoted = false,
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            c if c == delimiter && !quoted => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}
