//! Room lifecycle event normalization
//!
//! The platform (and proxies in front of it) deliver room events in a few
//! shapes. Everything is folded into one [`RoomEvent`] here so handlers only
//! ever match on a tagged value.
//!
//! Lookup order:
//! - event name: `event`, then `type`; lowercased
//! - room name: `room.name`, then `roomName`, then `room_name`, then `room`
//!   when it is a plain string
//!
//! Bodies that aren't JSON objects parse as an empty event.

use serde_json::{Map, Value};

/// Normalized room lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// `room_started` / `room_created`
    Started { room: String },
    /// `room_ended` / `room_finished`
    Ended { room: String },
    /// Anything else, including start/end events without a room name
    Other {
        event: Option<String>,
        room: Option<String>,
    },
}

impl RoomEvent {
    pub fn room(&self) -> Option<&str> {
        match self {
            Self::Started { room } | Self::Ended { room } => Some(room),
            Self::Other { room, .. } => room.as_deref(),
        }
    }
}

/// Parse a raw webhook body; never fails
pub fn parse_event(body: &[u8]) -> RoomEvent {
    let fields = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let event = event_name(&fields);
    let room = room_name(&fields);

    match (event.as_deref(), room) {
        (Some("room_started" | "room_created"), Some(room)) => RoomEvent::Started { room },
        (Some("room_ended" | "room_finished"), Some(room)) => RoomEvent::Ended { room },
        (_, room) => RoomEvent::Other { event, room },
    }
}

fn event_name(fields: &Map<String, Value>) -> Option<String> {
    ["event", "type"]
        .iter()
        .find_map(|key| non_empty_str(fields.get(*key)))
        .map(str::to_lowercase)
}

fn room_name(fields: &Map<String, Value>) -> Option<String> {
    let nested = fields
        .get("room")
        .and_then(Value::as_object)
        .and_then(|room| non_empty_str(room.get("name")));

    nested
        .or_else(|| non_empty_str(fields.get("roomName")))
        .or_else(|| non_empty_str(fields.get("room_name")))
        .or_else(|| non_empty_str(fields.get("room")))
        .map(str::to_string)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
