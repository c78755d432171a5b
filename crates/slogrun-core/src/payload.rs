//! Embedded capdata body decoding.
//!
//! Message arguments and wallet spend actions travel as JSON *text* inside
//! the JSON record. A body is either:
//! - **smallcaps**: the text starts with `#` and the rest is JSON, or
//! - **legacy**: the whole text is JSON.
//!
//! Everything that needs an embedded structure goes through [`decode_body`],
//! so the marker heuristic lives only here.

use serde::Deserialize;
use serde_json::Value;

use crate::error::PayloadError;

/// Prefix that marks a smallcaps-encoded body.
pub const SMALLCAPS_MARKER: char = '#';

/// Which encoding a body used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// `#`-prefixed smallcaps.
    Smallcaps,
    /// Plain JSON.
    Legacy,
}

impl Encoding {
    const fn name(self) -> &'static str {
        match self {
            Self::Smallcaps => "smallcaps",
            Self::Legacy => "legacy",
        }
    }
}

/// A decoded body plus the encoding it arrived in.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBody {
    /// Encoding detected from the marker.
    pub encoding: Encoding,
    /// Normalized nested value.
    pub value: Value,
}

/// Decode a capdata body string.
pub fn decode_body(body: &str) -> Result<DecodedBody, PayloadError> {
    let (encoding, text) = match body.strip_prefix(SMALLCAPS_MARKER) {
        Some(rest) => (Encoding::Smallcaps, rest),
        None => (Encoding::Legacy, body),
    };
    let value = serde_json::from_str(text).map_err(|source| PayloadError::Json {
        encoding: encoding.name(),
        source,
    })?;
    Ok(DecodedBody { encoding, value })
}

/// Capdata wrapper: `{ body, slots }`.
#[derive(Clone, Debug, Deserialize)]
pub struct CapData {
    /// Encoded body text.
    pub body: String,
    /// Slot references (unused for classification).
    #[serde(default)]
    pub slots: Vec<Value>,
}

/// Decode capdata that was itself serialized to a JSON string, then its body.
pub fn decode_capdata_text(text: &str) -> Result<DecodedBody, PayloadError> {
    let capdata: CapData = serde_json::from_str(text).map_err(PayloadError::CapData)?;
    decode_body(&capdata.body)
}
