//! Encode/decode helpers between domain values and `players` / moderation
//! column encodings.
//!
//! These are the only functions that know about the delimited string
//! formats. Repositories hand them typed values and get typed values back.

use std::fmt::Display;
use std::str::FromStr;

use crate::model::{ChatColors, Expiry};
use crate::StoreError;

const LIST_SEPARATOR: &str = ",";
const TRUE_TOKEN: &str = "true";
const FALSE_TOKEN: &str = "false";
const PERMANENT_SENTINEL: i64 = -1;

// ── Identifier lists ───────────────────────────────────────────────────

/// Join identifiers with `,`. An empty list encodes as `None` (a NULL
/// column), never as an empty string.
pub fn encode_list<T: Display>(items: &[T]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let joined = items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR);
    Some(joined)
}

/// Append `items` to a stored list column, keeping every stored token as it
/// was written, including ones that do not parse.
pub fn append_list<T: Display>(raw: Option<&str>, items: &[T]) -> Option<String> {
    let mut joined: Vec<String> = tokens(raw).map(str::to_string).collect();
    joined.extend(items.iter().map(ToString::to_string));
    if joined.is_empty() {
        return None;
    }
    Some(joined.join(LIST_SEPARATOR))
}

/// Split a list column back into identifiers. NULL decodes to an empty list.
///
/// Empty tokens are ignored: older releases wrote a trailing separator.
pub fn decode_list<T>(raw: Option<&str>) -> Result<Vec<T>, StoreError>
where
    T: FromStr<Err = StoreError>,
{
    tokens(raw).map(str::parse).collect()
}

/// Like [`decode_list`], but malformed tokens are logged and skipped.
pub fn decode_list_lossy<T>(raw: Option<&str>, column: &'static str) -> Vec<T>
where
    T: FromStr<Err = StoreError>,
{
    tokens(raw)
        .filter_map(|token| match token.parse() {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(column, token, error = %e, "Skipping malformed list entry");
                None
            }
        })
        .collect()
}

fn tokens(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.into_iter()
        .flat_map(|raw| raw.split(LIST_SEPARATOR))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ── Tri-state toggles ──────────────────────────────────────────────────

pub fn encode_tristate(enabled: bool) -> &'static str {
    if enabled {
        TRUE_TOKEN
    } else {
        FALSE_TOKEN
    }
}

/// NULL means "never set" and reads as enabled. A stored value is enabled
/// only when it is the truthy token.
pub fn decode_tristate(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(value) => value.trim().eq_ignore_ascii_case(TRUE_TOKEN),
    }
}

// ── Colors ─────────────────────────────────────────────────────────────

pub fn encode_colors(colors: &ChatColors) -> String {
    format!("{},{}", colors.foreground, colors.background)
}

/// Decode `fg,bg`. NULL or anything without two non-empty parts yields
/// `default`.
pub fn decode_colors(raw: Option<&str>, default: &ChatColors) -> ChatColors {
    let parts = raw.and_then(|raw| raw.split_once(LIST_SEPARATOR));
    match parts {
        Some((fg, bg)) if !fg.trim().is_empty() && !bg.trim().is_empty() => {
            ChatColors::new(fg.trim(), bg.trim())
        }
        _ => default.clone(),
    }
}

// ── Expiry ─────────────────────────────────────────────────────────────

pub fn encode_expiry(expiry: Expiry) -> i64 {
    match expiry {
        Expiry::Permanent => PERMANENT_SENTINEL,
        Expiry::At(time) => time,
    }
}

/// Any negative time is treated as the permanent sentinel.
pub fn decode_expiry(time: i64) -> Expiry {
    if time < 0 {
        Expiry::Permanent
    } else {
        Expiry::At(time)
    }
}
