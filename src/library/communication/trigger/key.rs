use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Separator between the name and id of an [`EventKey`]
pub const KEY_SEPARATOR: char = ':';

/// Reasons why a name and id can not be combined into an [`EventKey`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The event name is an empty string
    #[error("event name must not be empty")]
    EmptyName,
    /// The event name contains the key separator and would be ambiguous
    #[error("event name '{0}' contains the reserved separator ':'")]
    SeparatorInName(String),
}

/// Identifier of a specific object an event refers to
///
/// Integers and strings are both accepted and serialized as-is, but for the
/// purpose of key formation only their textual representation matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    /// Numeric identifier
    Integer(i64),
    /// Textual identifier
    Text(String),
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{}", id),
            Self::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EventId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<i32> for EventId {
    fn from(id: i32) -> Self {
        Self::Integer(id.into())
    }
}

impl From<u32> for EventId {
    fn from(id: u32) -> Self {
        Self::Integer(id.into())
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// Composite `name:id` identifying a single correlation slot
///
/// The same representation is used as the name of the PubSub channel on which the event travels.
/// Names may not contain the [separator](KEY_SEPARATOR), ids may, as the first separator
/// always terminates the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey(String);

impl EventKey {
    /// Combines a name and id into a key
    pub fn new(name: &str, id: &EventId) -> Result<Self, KeyError> {
        if name.is_empty() {
            return Err(KeyError::EmptyName);
        }

        if name.contains(KEY_SEPARATOR) {
            return Err(KeyError::SeparatorInName(name.to_owned()));
        }

        Ok(Self(format!("{}{}{}", name, KEY_SEPARATOR, id)))
    }

    /// Channel name used on the transport
    pub fn channel(&self) -> &str {
        &self.0
    }

    /// Event name part of the key
    pub fn name(&self) -> &str {
        self.0.split(KEY_SEPARATOR).next().unwrap_or_default()
    }
}

impl Display for EventKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn join_name_and_id() {
        let key = EventKey::new("session.created", &EventId::from(42)).unwrap();
        assert_eq!(key.channel(), "session.created:42");
        assert_eq!(key.name(), "session.created");
    }

    #[test]
    fn treat_numeric_and_textual_ids_alike() {
        let numeric = EventKey::new("E", &1.into()).unwrap();
        let textual = EventKey::new("E", &"1".into()).unwrap();

        assert_eq!(numeric, textual);
    }

    #[test]
    fn allow_separator_in_id() {
        let key = EventKey::new("E", &"a:b".into()).unwrap();
        assert_eq!(key.channel(), "E:a:b");
        assert_eq!(key.name(), "E");
    }

    #[test]
    fn reject_empty_name() {
        assert_eq!(EventKey::new("", &1.into()), Err(KeyError::EmptyName));
    }

    #[test]
    fn reject_separator_in_name() {
        assert_eq!(
            EventKey::new("a:b", &1.into()),
            Err(KeyError::SeparatorInName("a:b".into()))
        );
    }

    #[test]
    fn serialize_ids_untagged() {
        assert_eq!(serde_json::to_string(&EventId::from(150)).unwrap(), "150");
        assert_eq!(serde_json::to_string(&EventId::from("x")).unwrap(), "\"x\"");
        assert_eq!(
            serde_json::from_str::<EventId>("7").unwrap(),
            EventId::Integer(7)
        );
    }
}
