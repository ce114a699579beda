//! Text normalization shared by the build path and the query path.
//!
//! Both catalog documents and user questions go through [`normalize`]; a
//! query cleaned differently from the corpus silently degrades retrieval.

use crate::document::{Document, Metadata};
use crate::record::EventRecord;

/// Clean `text` into its canonical form.
///
/// - `\r\n` and `\r` count as line breaks; empty lines are dropped, so runs of
///   newlines collapse to one.
/// - Any run of other whitespace (spaces, tabs, NBSP, ...) becomes one ASCII
///   space; whitespace at the start and end of every line is removed.
/// - Control characters and invisible format characters (BOM, zero-width
///   space/joiners) are removed.
/// - Everything else, including punctuation, digits and case, is kept.
///
/// The function is idempotent: `normalize(&normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut pending_newline = false;

    for c in text.chars() {
        if c == '\n' || c == '\r' {
            pending_newline = !out.is_empty();
            pending_space = false;
        } else if c.is_whitespace() {
            pending_space = !out.is_empty() && !pending_newline;
        } else if c.is_control() || is_invisible_format(c) {
            continue;
        } else {
            if pending_newline {
                out.push('\n');
            } else if pending_space {
                out.push(' ');
            }
            pending_newline = false;
            pending_space = false;
            out.push(c);
        }
    }

    out
}

fn is_invisible_format(c: char) -> bool {
    matches!(c, '\u{feff}' | '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' | '\u{00ad}')
}

/// Render an [`EventRecord`] as a canonical [`Document`].
///
/// The text lists every attribute on its own labelled line and is passed
/// through [`normalize`]. The metadata maps each attribute name to its
/// normalized value.
pub fn render_document(record: &EventRecord) -> Document {
    let mut text = format!(
        "Event ID: {}\n\
         Date/Time: {}\n\
         Latitude: {}\n\
         Longitude: {}\n\
         Depth (km): {}\n\
         Magnitude: {} ({})\n\
         Location: {}\n\
         Event Type: {}\n",
        record.event_id,
        record.time,
        record.latitude,
        record.longitude,
        record.depth_km,
        record.magnitude,
        record.mag_type,
        record.location,
        record.event_type,
    );
    if let Some(author) = &record.author {
        text.push_str(&format!("Author: {author}\n"));
    }
    if let Some(catalog) = &record.catalog {
        text.push_str(&format!("Catalog: {catalog}\n"));
    }

    let mut metadata = Metadata::new();
    let mut put = |key: &str, value: &str| {
        metadata.insert(key.to_string(), normalize(value));
    };
    put("event_id", &record.event_id);
    put("time", &record.time);
    put("latitude", &record.latitude.raw);
    put("longitude", &record.longitude.raw);
    put("depth_km", &record.depth_km.raw);
    put("magnitude", &record.magnitude.raw);
    put("mag_type", &record.mag_type);
    put("location", &record.location);
    put("event_type", &record.event_type);
    if let Some(author) = &record.author {
        put("author", author);
    }
    if let Some(catalog) = &record.catalog {
        put("catalog", catalog);
    }

    Document { record_id: record.event_id.clone(), text: normalize(&text), metadata }
}
