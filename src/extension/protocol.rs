//! Line-delimited JSON protocol spoken with the launcher.
//!
//! Each line on stdin is one [`Event`]; each event is answered with exactly
//! one [`Action`] line on stdout. Binary payloads travel as base64 strings.
//!
//! ```text
//! -> {"event":"keyword_query","argument":"x^2"}
//! <- {"action":"render_result_list","items":[{"icon":"images/icon.png","name":"x^2",...}]}
//! -> {"event":"item_enter","data":"iVBORw0KGgo..."}
//! <- {"action":"do_nothing"}
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::items::ResultItem;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed event: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),
}

/// An event delivered by the launcher.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The text after the keyword changed.
    KeywordQuery {
        #[serde(default)]
        argument: Option<String>,
    },
    /// A result item was selected; carries its `on_enter` data back.
    ItemEnter {
        #[serde(deserialize_with = "decode_base64")]
        data: Vec<u8>,
    },
    /// Full preference set, sent once at startup.
    Preferences {
        #[serde(default)]
        preferences: HashMap<String, String>,
    },
    /// A single preference changed.
    PreferencesUpdate {
        id: String,
        #[serde(default)]
        old_value: Option<String>,
        #[serde(default)]
        new_value: Option<String>,
    },
}

impl Event {
    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeywordQuery { .. } => "keyword_query",
            Self::ItemEnter { .. } => "item_enter",
            Self::Preferences { .. } => "preferences",
            Self::PreferencesUpdate { .. } => "preferences_update",
        }
    }
}

/// The response to an event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RenderResultList {
        #[serde(serialize_with = "encode_items")]
        items: Vec<ResultItem>,
    },
    DoNothing,
    /// Surfaced by the launcher's generic error handling.
    Error { message: String },
}

impl Action {
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

#[derive(Serialize)]
struct WireItem<'a> {
    icon: &'a Path,
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    on_enter: Option<WireEnter>,
}

#[derive(Serialize)]
struct WireEnter {
    data: String,
    keep_app_open: bool,
}

impl<'a> From<&'a ResultItem> for WireItem<'a> {
    fn from(item: &'a ResultItem) -> Self {
        Self {
            icon: &item.icon,
            name: &item.name,
            description: &item.description,
            on_enter: item.on_enter.as_ref().map(|data| WireEnter {
                data: STANDARD.encode(data),
                keep_app_open: item.keep_app_open,
            }),
        }
    }
}

fn encode_items<S: Serializer>(items: &[ResultItem], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(items.iter().map(WireItem::from))
}

fn decode_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.trim())
        .map_err(serde::de::Error::custom)
}

/// Parse one line of input into an event.
pub fn parse_event(line: &str) -> Result<Event, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Parse one raw line of input, which must be UTF-8.
pub fn parse_event_bytes(line: &[u8]) -> Result<Event, ProtocolError> {
    parse_event(std::str::from_utf8(line)?)
}

/// Write an action as a single line and flush it.
pub fn write_action<W: Write>(output: &mut W, action: &Action) -> Result<(), ProtocolError> {
    serde_json::to_writer(&mut *output, action)?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}
