use super::super::RemoteError;
use serde_json::{Map, Value};

/// Object key marking an argument as an encoded [`RemoteError`]
pub const ERROR_MARKER: &str = "$error";

/// Payload delivered to a pending wait
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Ordered list of application-level arguments
    Arguments(Vec<Value>),
    /// The publisher reported a failure instead of a result
    Failure(RemoteError),
}

impl Signal {
    /// Builds a signal from the raw argument list as it travels over the wire
    ///
    /// If the first argument is an encoded [`RemoteError`], the signal is a [`Signal::Failure`]
    /// and any further arguments are dropped.
    pub fn from_arguments(arguments: Vec<Value>) -> Self {
        match arguments.first().and_then(decode_error) {
            Some(error) => Self::Failure(error),
            None => Self::Arguments(arguments),
        }
    }

    /// Raw argument list as it travels over the wire
    pub fn to_arguments(&self) -> Vec<Value> {
        match self {
            Self::Arguments(arguments) => arguments.clone(),
            Self::Failure(error) => vec![encode_error(error)],
        }
    }
}

impl From<Vec<Value>> for Signal {
    fn from(arguments: Vec<Value>) -> Self {
        Self::Arguments(arguments)
    }
}

impl From<RemoteError> for Signal {
    fn from(error: RemoteError) -> Self {
        Self::Failure(error)
    }
}

fn encode_error(error: &RemoteError) -> Value {
    let mut object = Map::new();
    // Serializing a plain struct of strings can not fail
    let encoded = serde_json::to_value(error).unwrap_or(Value::Null);
    object.insert(ERROR_MARKER.to_owned(), encoded);
    Value::Object(object)
}

fn decode_error(value: &Value) -> Option<RemoteError> {
    let object = value.as_object()?;

    if object.len() != 1 {
        return None;
    }

    serde_json::from_value(object.get(ERROR_MARKER)?.clone()).ok()
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn keep_plain_arguments() {
        let arguments = vec![json!("arg 1"), json!({ "f": 1, "c": { "k": "a" } })];
        assert_eq!(
            Signal::from_arguments(arguments.clone()),
            Signal::Arguments(arguments)
        );
    }

    #[test]
    fn detect_leading_error() {
        let arguments = vec![json!({ "$error": { "causes": ["boom"] } }), json!(1)];
        assert_eq!(
            Signal::from_arguments(arguments),
            Signal::Failure(RemoteError::message("boom"))
        );
    }

    #[test]
    fn ignore_errors_after_the_first_argument() {
        let arguments = vec![json!(1), json!({ "$error": { "causes": ["boom"] } })];
        assert!(matches!(
            Signal::from_arguments(arguments),
            Signal::Arguments(_)
        ));
    }

    #[test]
    fn ignore_lookalike_objects() {
        let arguments = vec![json!({ "$error": "nope" })];
        assert!(matches!(
            Signal::from_arguments(arguments),
            Signal::Arguments(_)
        ));
    }

    #[test]
    fn encode_failures_as_single_argument() {
        let signal = Signal::Failure(RemoteError::message("boom"));
        assert_eq!(
            signal.to_arguments(),
            vec![json!({ "$error": { "causes": ["boom"] } })]
        );
    }
}
