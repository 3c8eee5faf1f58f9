//! # Model Response Parsing
//!
//! Pure functions that turn untrusted model text into recommendation data.
//! Nothing in here panics or returns an error: malformed input degrades to
//! "no recommendations" and the caller decides what to log.
//!
//! Three shapes are understood:
//!
//! - a single JSON object `{"track_name": ..., "artist_name": ...}`, possibly
//!   wrapped in prose or a code fence ([`parse_single`])
//! - a numbered list of `N. Title by Artist` lines ([`parse_numbered_list`])
//! - a strict JSON object or array of batch items with an optional `intro`
//!   ([`parse_batch_with_intro`])
//!
//! [`parse_response`] classifies arbitrary text into a [`ParsedResponse`] so
//! callers never assume a shape without checking it.

use crate::track::TrackRef;
use serde_json::Value;

/// Upper bound on options kept from a mystery payload.
pub const MYSTERY_OPTION_LIMIT: usize = 5;

/// Discriminated result of classifying model text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    Track(TrackRef),
    TrackList(Vec<TrackRef>),
    Empty,
}

impl ParsedResponse {
    /// First track in whichever shape was found.
    #[must_use]
    pub fn first(&self) -> Option<&TrackRef> {
        match self {
            Self::Track(track) => Some(track),
            Self::TrackList(tracks) => tracks.first(),
            Self::Empty => None,
        }
    }
}

/// One entry of a batch recommendation.
///
/// Fields that were missing or not strings come back empty (or `None` for the
/// intro) so the queue can reject the one item instead of the whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub track_name: String,
    pub artist_name: String,
    pub intro: Option<String>,
}

impl BatchItem {
    #[must_use]
    pub fn track(&self) -> TrackRef {
        TrackRef::new(self.track_name.clone(), self.artist_name.clone())
    }
}

/// Options and hidden pick of a mystery round, as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MysteryPayload {
    /// Valid options (both fields non-empty), at most [`MYSTERY_OPTION_LIMIT`].
    pub options: Vec<TrackRef>,
    /// Zero-based index of the model's pick, converted from the 1-based wire value.
    pub selected_index: Option<usize>,
}

/// Parse a single recommendation.
///
/// Tries the whole text as JSON first, then the first balanced `{...}`
/// substring, then that substring with single quotes swapped for double
/// quotes. Returns `None` when no attempt yields an object with non-empty
/// `track_name` and `artist_name` strings.
#[must_use]
pub fn parse_single(text: &str) -> Option<TrackRef> {
    let trimmed = text.trim();
    if let Some(track) = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| track_from_value(&v))
    {
        return Some(track);
    }

    let candidate = first_braced(trimmed)?;
    serde_json::from_str::<Value>(candidate)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(&candidate.replace('\'', "\"")).ok())
        .and_then(|v| track_from_value(&v))
}

/// Parse `N. Title by Artist` lines.
///
/// A line qualifies when the text before its first `". "` is a number and the
/// remainder contains `" by "`. The split happens on the last `" by "`, so
/// titles that contain the word keep it. Anything else is skipped.
#[must_use]
pub fn parse_numbered_list(text: &str) -> Vec<TrackRef> {
    text.lines().filter_map(parse_numbered_line).collect()
}

fn parse_numbered_line(line: &str) -> Option<TrackRef> {
    let (ordinal, rest) = line.trim().split_once(". ")?;
    let ordinal = ordinal.trim_start_matches(['*', '#', '-', ' ']);
    if ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (title, artist) = rest.rsplit_once(" by ")?;
    let track = TrackRef::new(clean_field(title), clean_field(artist));
    track.is_complete().then_some(track)
}

/// Strip the quoting and emphasis models like to wrap names in.
fn clean_field(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '*' | '_' | '\u{201c}' | '\u{201d}'))
        .trim()
        .to_string()
}

/// Parse a batch of recommendations with optional intros.
///
/// Accepts a JSON object (wrapped into a one-element list) or a JSON array.
/// Text that is not valid JSON, or JSON of any other shape, yields an empty
/// list; there is no line-based fallback. Items are read leniently, see
/// [`BatchItem`].
#[must_use]
pub fn parse_batch_with_intro(text: &str) -> Vec<BatchItem> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(item @ Value::Object(_)) => vec![batch_item_from_value(&item)],
        Ok(Value::Array(items)) => items.iter().map(batch_item_from_value).collect(),
        Ok(_) | Err(_) => Vec::new(),
    }
}

fn batch_item_from_value(value: &Value) -> BatchItem {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
    };
    BatchItem {
        track_name: text("track_name").unwrap_or_default(),
        artist_name: text("artist_name").unwrap_or_default(),
        intro: text("intro").filter(|intro| !intro.is_empty()),
    }
}

/// Classify arbitrary model text.
///
/// Order: whole-text JSON (object or array), embedded object, numbered list.
#[must_use]
pub fn parse_response(text: &str) -> ParsedResponse {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        match &value {
            Value::Object(_) => {
                if let Some(track) = track_from_value(&value) {
                    return ParsedResponse::Track(track);
                }
            }
            Value::Array(items) => {
                let tracks: Vec<TrackRef> = items.iter().filter_map(track_from_value).collect();
                if !tracks.is_empty() {
                    return ParsedResponse::TrackList(tracks);
                }
            }
            _ => {}
        }
    }

    if let Some(track) = parse_single(text) {
        return ParsedResponse::Track(track);
    }

    let tracks = parse_numbered_list(text);
    if tracks.is_empty() {
        ParsedResponse::Empty
    } else {
        ParsedResponse::TrackList(tracks)
    }
}

/// Parse a mystery-round payload.
///
/// Expects either `{"options": [...], "selected_index": N}` or a bare array of
/// options. Returns `None` only when the text is not valid JSON; a payload
/// with no usable options comes back with an empty `options` list.
///
/// `selected_index` is 1-based on the wire. Non-integer, zero and negative
/// values mean "no selection"; range checking against the resolved options is
/// the caller's job.
#[must_use]
pub fn parse_mystery(text: &str) -> Option<MysteryPayload> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;

    let (raw_options, raw_index) = match &value {
        Value::Object(map) => (
            map.get("options").and_then(Value::as_array),
            map.get("selected_index").and_then(Value::as_i64),
        ),
        Value::Array(items) => (Some(items), None),
        _ => (None, None),
    };

    let options = raw_options
        .map(|items| {
            items
                .iter()
                .filter_map(track_from_value)
                .take(MYSTERY_OPTION_LIMIT)
                .collect()
        })
        .unwrap_or_default();

    let selected_index = raw_index
        .filter(|idx| *idx > 0)
        .and_then(|idx| usize::try_from(idx - 1).ok());

    Some(MysteryPayload {
        options,
        selected_index,
    })
}

fn track_from_value(value: &Value) -> Option<TrackRef> {
    let track_name = value.get("track_name")?.as_str()?.trim();
    let artist_name = value.get("artist_name")?.as_str()?.trim();
    let track = TrackRef::new(track_name, artist_name);
    track.is_complete().then_some(track)
}

/// First balanced `{...}` substring, ignoring braces inside JSON strings.
fn first_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
