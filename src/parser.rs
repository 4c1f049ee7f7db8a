//! Parsers for the two XML documents served by the timedtext endpoint.
//!
//! Everything that depends on the shape of those documents lives here:
//! `<transcript_list>` with its `<track>` children for the language list,
//! and `<transcript>` with its `<text>` children for a caption track.

use crate::error::{DownloadError, Result};
use crate::{LanguageMap, Line, Subtitle, DEFAULT_LANGUAGE_KEY};
use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::time::Duration;

const LANGUAGE_LIST_ROOT: &str = "transcript_list";
const TRANSCRIPT_ROOT: &str = "transcript";

#[derive(Debug, Deserialize)]
struct TrackList {
    #[serde(rename = "track", default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(rename = "@lang_code")]
    lang_code: String,
    #[serde(rename = "@lang_original")]
    lang_original: String,
    #[serde(rename = "@lang_default", default)]
    lang_default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    #[serde(rename = "text", default)]
    entries: Vec<TextEntry>,
}

#[derive(Debug, Deserialize)]
struct TextEntry {
    #[serde(rename = "@start", default)]
    start: Option<String>,
    #[serde(rename = "@dur", default)]
    dur: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

/// Parse a `type=list` response into a language name -> code map.
///
/// The track flagged `lang_default="true"` is additionally stored under
/// [`DEFAULT_LANGUAGE_KEY`]. When no track carries the flag the key is
/// simply absent.
pub fn parse_language_list(xml: &str) -> Result<LanguageMap> {
    ensure_root(xml, LANGUAGE_LIST_ROOT)?;

    let list: TrackList = quick_xml::de::from_str(xml).map_err(|e| {
        DownloadError::MalformedResponse(format!("Failed to parse language list: {}", e))
    })?;

    let mut languages = LanguageMap::new();
    for track in list.tracks {
        if track.lang_default.as_deref() == Some("true") {
            languages.insert(DEFAULT_LANGUAGE_KEY.to_string(), track.lang_code.clone());
        }
        languages.insert(track.lang_original, track.lang_code);
    }

    if !languages.contains_key(DEFAULT_LANGUAGE_KEY) {
        warn!("No caption track is marked as default; the default language will be empty");
    }
    debug!("Parsed {} language entries", languages.len());

    Ok(languages)
}

/// Parse a caption track into a [`Subtitle`], keeping document order.
///
/// Fails as a whole on the first entry with an unusable `start` or `dur`.
pub fn parse_transcript(xml: &str) -> Result<Subtitle> {
    ensure_root(xml, TRANSCRIPT_ROOT)?;

    let transcript: Transcript = quick_xml::de::from_str(xml).map_err(|e| {
        DownloadError::MalformedResponse(format!("Failed to parse transcript: {}", e))
    })?;

    let lines = transcript
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| parse_line(index, entry))
        .collect::<Result<Vec<_>>>()?;

    debug!("Parsed {} caption lines", lines.len());
    Ok(Subtitle { lines })
}

fn parse_line(index: usize, entry: TextEntry) -> Result<Line> {
    let start = parse_seconds("start", entry.start.as_deref())?;
    let dur = parse_seconds("dur", entry.dur.as_deref())?;

    let start_offset = to_duration("start", start, entry.start.as_deref())?;
    let end_offset = to_duration("dur", start + dur, entry.dur.as_deref())?;

    Ok(Line {
        start: start_offset,
        end: end_offset,
        // Entities are already decoded once by the XML layer; the endpoint
        // escapes apostrophes twice.
        text: entry.text.replace("&#39;", "'"),
        index,
    })
}

fn parse_seconds(attribute: &str, value: Option<&str>) -> Result<f64> {
    let raw = value.ok_or_else(|| malformed_timing(attribute, None))?;
    raw.parse::<f64>()
        .map_err(|_| malformed_timing(attribute, Some(raw)))
}

fn to_duration(attribute: &str, seconds: f64, raw: Option<&str>) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|_| malformed_timing(attribute, raw))
}

fn malformed_timing(attribute: &str, value: Option<&str>) -> DownloadError {
    DownloadError::MalformedTiming {
        attribute: attribute.to_string(),
        value: value.unwrap_or_default().to_string(),
    }
}

/// Check that the first element of `xml` is `<expected>`.
fn ensure_root(xml: &str, expected: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                if name.as_ref() == expected.as_bytes() {
                    return Ok(());
                }
                return Err(DownloadError::MalformedResponse(format!(
                    "expected root element <{}>, found <{}>",
                    expected,
                    String::from_utf8_lossy(name.as_ref())
                )));
            }
            Ok(Event::Eof) => {
                return Err(DownloadError::MalformedResponse(format!(
                    "missing root element <{}>",
                    expected
                )));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(DownloadError::MalformedResponse(format!(
                    "invalid XML: {}",
                    e
                )));
            }
        }
    }
}
