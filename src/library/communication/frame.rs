//! Wire representation of an event
//!
//! Events travel as a JSON array `[name, id, arg0, arg1, ...]` on the channel of their
//! [`EventKey`]. The name and id are repeated in the payload so that a receiver does not
//! have to rely on the channel name to route the signal.

use super::trigger::{EventId, EventKey, KeyError, Signal};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reasons why a decoded JSON value is not a valid frame
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// Frame has less than the two mandatory elements
    #[error("frame contains {0} elements, expected at least name and id")]
    TooShort(usize),
    /// First element is not a string
    #[error("event name is not a string: {0}")]
    InvalidName(Value),
    /// Second element is neither a string nor a number
    #[error("event id is neither a string nor a number: {0}")]
    InvalidId(Value),
}

/// Event as it is published on and received from the transport
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    name: String,
    id: EventId,
    signal: Signal,
}

impl EventFrame {
    /// Creates a new frame from raw parts
    pub fn new(name: impl Into<String>, id: impl Into<EventId>, signal: impl Into<Signal>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            signal: signal.into(),
        }
    }

    /// Name of the event
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the event
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Key, and thus channel, of the event
    pub fn key(&self) -> Result<EventKey, KeyError> {
        EventKey::new(&self.name, &self.id)
    }

    /// Payload carried by the event
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Splits the frame into its key and payload
    pub fn into_parts(self) -> Result<(EventKey, Signal), KeyError> {
        let key = self.key()?;
        Ok((key, self.signal))
    }
}

impl TryFrom<Vec<Value>> for EventFrame {
    type Error = FrameError;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        if values.len() < 2 {
            return Err(FrameError::TooShort(values.len()));
        }

        let mut values = values.into_iter();
        let name = match values.next() {
            Some(Value::String(name)) => name,
            Some(other) => return Err(FrameError::InvalidName(other)),
            None => return Err(FrameError::TooShort(0)),
        };

        let id = match values.next() {
            Some(Value::String(id)) => EventId::Text(id),
            Some(Value::Number(number)) => match number.as_i64() {
                Some(id) => EventId::Integer(id),
                // Floats and huge integers are only relevant in their textual form
                None => EventId::Text(number.to_string()),
            },
            Some(other) => return Err(FrameError::InvalidId(other)),
            None => return Err(FrameError::TooShort(1)),
        };

        Ok(Self {
            name,
            id,
            signal: Signal::from_arguments(values.collect()),
        })
    }
}

impl Serialize for EventFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let arguments = self.signal.to_arguments();
        let mut seq = serializer.serialize_seq(Some(arguments.len() + 2))?;

        seq.serialize_element(&self.name)?;
        seq.serialize_element(&self.id)?;
        for argument in &arguments {
            seq.serialize_element(argument)?;
        }

        seq.end()
    }
}

impl<'de> Deserialize<'de> for EventFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Value>::deserialize(deserializer)?;
        EventFrame::try_from(values).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::RemoteError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn serialize_as_flat_array() {
        let frame = EventFrame::new(
            "E",
            1,
            vec![json!("arg 1"), json!({ "f": 1, "c": { "k": "a" } })],
        );

        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!(["E", 1, "arg 1", { "f": 1, "c": { "k": "a" } }])
        );
    }

    #[test]
    fn deserialize_frames_without_arguments() {
        let frame: EventFrame = serde_json::from_str(r#"["timeout event", 1]"#).unwrap();

        assert_eq!(frame.key().unwrap().channel(), "timeout event:1");
        assert_eq!(frame.signal(), &Signal::Arguments(Vec::new()));
    }

    #[test]
    fn deserialize_failures() {
        let frame: EventFrame =
            serde_json::from_str(r#"["E", "x", {"$error": {"causes": ["boom"]}}]"#).unwrap();

        assert_eq!(frame.signal(), &Signal::Failure(RemoteError::message("boom")));
    }

    #[test]
    fn stringify_fractional_ids() {
        let frame: EventFrame = serde_json::from_str(r#"["E", 1.5]"#).unwrap();
        assert_eq!(frame.id(), &EventId::Text("1.5".into()));
    }

    #[test]
    fn reject_malformed_frames() {
        assert_eq!(
            EventFrame::try_from(vec![json!("E")]),
            Err(FrameError::TooShort(1))
        );
        assert_eq!(
            EventFrame::try_from(vec![json!(1), json!(1)]),
            Err(FrameError::InvalidName(json!(1)))
        );
        assert_eq!(
            EventFrame::try_from(vec![json!("E"), json!(null)]),
            Err(FrameError::InvalidId(json!(null)))
        );
        assert!(serde_json::from_str::<EventFrame>(r#"{"name": "E"}"#).is_err());
    }
}
