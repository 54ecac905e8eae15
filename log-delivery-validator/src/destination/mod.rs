use std::{fmt, str::FromStr};

use async_trait::async_trait;

use crate::{error::DestinationError, extract::LineFormat};

pub mod cloudwatch;
pub mod s3;

/// A paginated destination read front to back exactly once. Each call to
/// `next_batch` performs at most one page or object fetch and hands back its raw
/// lines; `Ok(None)` means the destination is exhausted. Readers keep their cursor
/// internally, so a second traversal needs a fresh reader.
#[async_trait]
pub trait LogSource: Send {
    /// Name used in the report, e.g. "S3".
    fn name(&self) -> &'static str;

    fn line_format(&self) -> LineFormat;

    async fn next_batch(&mut self) -> Result<Option<Vec<String>>, DestinationError>;

    /// Number of objects fetched so far, for sources that read whole objects.
    fn objects_read(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    S3,
    CloudWatch,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::S3 => "s3",
            DestinationKind::CloudWatch => "cloudwatch",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownDestination(pub String);

impl FromStr for DestinationKind {
    type Err = UnknownDestination;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(DestinationKind::S3),
            "cloudwatch" => Ok(DestinationKind::CloudWatch),
            other => Err(UnknownDestination(other.to_owned())),
        }
    }
}

const THROTTLING_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "SlowDown",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Maps an AWS error code onto our retry taxonomy. Anything that isn't a known
/// throttling code is permanent.
pub(crate) fn classify_aws_error(
    operation: &'static str,
    code: Option<&str>,
    message: String,
) -> DestinationError {
    match code {
        Some(code) if THROTTLING_CODES.contains(&code) => {
            DestinationError::throttled(operation, message)
        }
        _ => DestinationError::failed(operation, message),
    }
}
