use thiserror::Error;

use crate::config::ConfigError;

/// Failure talking to a destination. Only `Throttled` is retried, everything else
/// aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("{operation} was throttled: {message}")]
    Throttled {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} still throttled after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },
}

impl DestinationError {
    pub fn throttled(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Throttled {
            operation,
            message: message.into(),
        }
    }

    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to parse log envelope {line:?}")]
    MalformedEnvelope {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("log payload {payload:?} is shorter than the {expected} character record id")]
    ShortPayload { payload: String, expected: usize },
}

/// Anything that ends a validation run early.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Destination(#[from] DestinationError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_throttling_is_transient() {
        assert!(DestinationError::throttled("GetLogEvents", "Rate exceeded").is_transient());
        assert!(!DestinationError::failed("GetLogEvents", "AccessDenied").is_transient());
        assert!(!DestinationError::RetriesExhausted {
            operation: "GetLogEvents",
            attempts: 3
        }
        .is_transient());
    }

    #[test]
    fn test_destination_error_messages_name_the_operation() {
        let err = DestinationError::failed("ListObjectsV2", "NoSuchBucket");
        assert_eq!(err.to_string(), "ListObjectsV2 failed: NoSuchBucket");
    }
}
