use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Type erased, serializable error which retains the error chain information
///
/// Publishers use this to report a failure instead of a result for an event.
/// Waiting parties don't know about the concrete error types of the publisher,
/// but they can still embed it into their own errors and display meaningful
/// information.
///
/// When the Error from which this is created contains another RemoteError in its
/// source chain, it will be consumed and integrated so that one flat list of causes
/// is carried over the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    causes: Vec<String>,
}

impl RemoteError {
    /// Creates a new instance carrying a single message without any causes
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self {
            causes: vec![message.into()],
        }
    }

    /// Messages of the error chain, outermost first
    pub fn causes(&self) -> &[String] {
        &self.causes
    }
}

#[cfg(test)]
impl RemoteError {
    fn new_with_causes(causes: Vec<String>) -> Self {
        Self { causes }
    }
}

impl Error for RemoteError {}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut causes = self.causes.iter();

        match causes.next() {
            Some(first) => write!(f, "{}", first)?,
            None => return write!(f, "unknown remote error"),
        }

        for cause in causes {
            write!(f, ": {}", cause)?;
        }

        Ok(())
    }
}

impl From<&(dyn Error + 'static)> for RemoteError {
    fn from(e: &(dyn Error + 'static)) -> Self {
        let mut source: Option<&(dyn Error + 'static)> = Some(e);
        let mut causes: Vec<String> = Vec::new();

        while let Some(error) = source {
            // Integrate any child RemoteErrors and use ToString for anything else
            if let Some(remote_error) = error.downcast_ref::<RemoteError>() {
                causes.extend(remote_error.causes.iter().cloned());
            } else {
                causes.push(error.to_string());
            }

            source = error.source();
        }

        Self { causes }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum TestError {
        #[error("lookup failed")]
        Lookup(#[from] RemoteError),
    }

    #[test]
    fn handle_no_cause() {
        let error = RemoteError::new_with_causes(Vec::new());
        assert_eq!(error.to_string(), "unknown remote error");
    }

    #[test]
    fn consume_nested() {
        let lower_error =
            RemoteError::new_with_causes(vec![String::from("cause1"), String::from("cause2")]);
        let middle_error = TestError::from(lower_error);
        let high_error = RemoteError::from(&middle_error as &(dyn Error + 'static));

        assert_eq!(high_error.causes(), ["lookup failed", "cause1", "cause2"]);
    }

    #[test]
    fn format_chain_on_one_line() {
        let formatted =
            RemoteError::new_with_causes(vec!["cause1".into(), "cause2".into(), "cause3".into()])
                .to_string();

        assert_eq!(formatted, "cause1: cause2: cause3");
    }

    #[test]
    fn survive_the_wire() {
        let error = RemoteError::message("session not found");
        let json = serde_json::to_string(&error).unwrap();

        assert_eq!(json, r#"{"causes":["session not found"]}"#);
        assert_eq!(serde_json::from_str::<RemoteError>(&json).unwrap(), error);
    }
}
