//! Protocol frame extraction from decoded records.
//!
//! The analysis service frames its stream as newline-delimited records.
//! Records of interest carry the `data: ` prefix followed by a JSON-encoded
//! string fragment; everything else (blank separator lines, comments,
//! unrecognized fields) is discarded silently.

use tracing::debug;

/// Framing prefix marking a payload record.
pub const DATA_PREFIX: &str = "data: ";

/// Payload prefixes the service uses for inline error text.
///
/// These payloads are not valid JSON; they are literal text the service
/// emits in place of a fragment when generation fails server-side.
pub const ERROR_MARKERS: [&str; 2] = ["[Server Error", "[Error"];

/// One decoded unit of streamed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A text fragment to append to the stage buffer.
    Text(String),
    /// A recognized error payload, appended verbatim and flagged.
    Error(String),
}

impl StreamFrame {
    /// The text carried by the frame, error or not.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Text(s) | Self::Error(s) => s,
        }
    }

    /// Whether the frame carries a recognized error marker.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Parse a single decoded record into a [`StreamFrame`].
///
/// Records without the `data: ` prefix return `None`. Prefixed payloads are
/// attempted as a JSON string decode; on success the decoded value is the
/// frame's text. On decode failure the raw payload is kept only when it
/// begins with a recognized error marker; anything else is dropped.
#[must_use]
pub fn parse_frame(line: &str) -> Option<StreamFrame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;

    match serde_json::from_str::<String>(payload) {
        Ok(text) => Some(StreamFrame::Text(text)),
        Err(_) => {
            if ERROR_MARKERS.iter().any(|m| payload.starts_with(m)) {
                Some(StreamFrame::Error(payload.to_owned()))
            } else {
                debug!(payload, "dropping malformed non-error payload");
                None
            }
        }
    }
}
