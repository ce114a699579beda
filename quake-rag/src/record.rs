//! Typed seismic event records and the reasons a source row can be rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One structured observation from an event catalog.
///
/// Records are created once at load time and never mutated afterwards.
/// Numeric fields are parsed so malformed rows are caught at ingestion,
/// but the canonical text renders the source spelling of every value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    /// Catalog identifier, unique within a loaded corpus.
    pub event_id: String,
    /// Origin time as written in the catalog (ISO-8601 in INGV exports).
    pub time: String,
    /// Latitude in decimal degrees.
    pub latitude: Measurement,
    /// Longitude in decimal degrees.
    pub longitude: Measurement,
    /// Hypocentral depth in kilometres.
    pub depth_km: Measurement,
    /// Magnitude value.
    pub magnitude: Measurement,
    /// Magnitude scale, e.g. `ML`, `Mw`, `Md`.
    pub mag_type: String,
    /// Free-text location label, e.g. `4 km SW Radicofani (SI)`.
    pub location: String,
    /// Event type tag, e.g. `earthquake`.
    pub event_type: String,
    /// Author of the solution, when the catalog provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Source catalog name, when the catalog provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

/// A parsed numeric field that remembers how the source wrote it.
///
/// `0.90` and `0.9` compare equal as numbers but render differently; the
/// canonical text keeps the catalog's spelling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// Parsed value.
    pub value: f64,
    /// Source spelling, trimmed.
    pub raw: String,
}

impl Measurement {
    /// Parse a decimal field, keeping its source spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let value: f64 = trimmed.parse().ok()?;
        value.is_finite().then(|| Self { value, raw: trimmed.to_string() })
    }
}

impl From<f64> for Measurement {
    fn from(value: f64) -> Self {
        Self { value, raw: value.to_string() }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Why a source row did not become an [`EventRecord`].
///
/// Rejections are counted in a [`LoadReport`](crate::LoadReport); they never
/// abort a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordRejection {
    /// A mandatory field (identifier or timestamp) is empty or absent.
    MissingField(&'static str),
    /// A numeric field could not be parsed.
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },
    /// A coordinate lies outside its valid range.
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// The row has a different number of columns than the header.
    ColumnCount {
        /// Columns in the header.
        expected: usize,
        /// Columns in the row.
        found: usize,
    },
    /// The identifier was already loaded; the first occurrence wins.
    DuplicateId(String),
}

impl fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing mandatory field '{field}'"),
            Self::InvalidNumber { field, value } => {
                write!(f, "field '{field}' is not a number: '{value}'")
            }
            Self::OutOfRange { field, value } => write!(f, "field '{field}' out of range: {value}"),
            Self::ColumnCount { expected, found } => {
                write!(f, "expected {expected} columns, found {found}")
            }
            Self::DuplicateId(id) => write!(f, "duplicate event id '{id}'"),
        }
    }
}

/// Raw, still-untyped field values of one catalog row.
///
/// Produced by the loader from a header-mapped row, or by hand in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    /// Catalog event identifier.
    pub event_id: String,
    /// Origin time as written in the source.
    pub time: String,
    /// Latitude in decimal degrees.
    pub latitude: String,
    /// Longitude in decimal degrees.
    pub longitude: String,
    /// Hypocentral depth in kilometres.
    pub depth_km: String,
    /// Magnitude value.
    pub magnitude: String,
    /// Magnitude scale, e.g. `ML` or `Mw`.
    pub mag_type: String,
    /// Free-text location description.
    pub location: String,
    /// Event type, usually `earthquake`.
    pub event_type: String,
    /// Reporting agency, when the source has the column.
    pub author: Option<String>,
    /// Source catalog, when the source has the column.
    pub catalog: Option<String>,
}

impl TryFrom<RawEvent> for EventRecord {
    type Error = RecordRejection;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let event_id = raw.event_id.trim().to_string();
        if event_id.is_empty() {
            return Err(RecordRejection::MissingField("event_id"));
        }
        let time = raw.time.trim().to_string();
        if time.is_empty() {
            return Err(RecordRejection::MissingField("time"));
        }

        let latitude = parse_number("latitude", &raw.latitude)?;
        if !(-90.0..=90.0).contains(&latitude.value) {
            return Err(RecordRejection::OutOfRange { field: "latitude", value: latitude.value });
        }
        let longitude = parse_number("longitude", &raw.longitude)?;
        if !(-180.0..=180.0).contains(&longitude.value) {
            return Err(RecordRejection::OutOfRange { field: "longitude", value: longitude.value });
        }
        let depth_km = parse_number("depth_km", &raw.depth_km)?;
        let magnitude = parse_number("magnitude", &raw.magnitude)?;

        Ok(Self {
            event_id,
            time,
            latitude,
            longitude,
            depth_km,
            magnitude,
            mag_type: raw.mag_type.trim().to_string(),
            location: raw.location.trim().to_string(),
            event_type: raw.event_type.trim().to_string(),
            author: non_empty(raw.author),
            catalog: non_empty(raw.catalog),
        })
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<Measurement, RecordRejection> {
    Measurement::parse(value)
        .ok_or_else(|| RecordRejection::InvalidNumber { field, value: value.trim().to_string() })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
