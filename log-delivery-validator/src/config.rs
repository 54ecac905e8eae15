use std::{collections::HashMap, str::FromStr, time};

use clap::Parser;
use envconfig::Envconfig;
use thiserror::Error;

use crate::{destination::DestinationKind, retry::RetryPolicy};

pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_S3_BUCKET: &str = "S3_BUCKET_NAME";
pub const ENV_CW_LOG_GROUP: &str = "CW_LOG_GROUP_NAME";
pub const ENV_LOG_PREFIX: &str = "LOG_PREFIX";
pub const ENV_DESTINATION: &str = "DESTINATION";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{what} required. Set the value for environment variable- {var}")]
    MissingEnv {
        what: &'static str,
        var: &'static str,
    },
    #[error("Invalid value for environment variable- {var}")]
    InvalidEnv { var: &'static str },
    #[error("Unknown log destination {0:?}. Set DESTINATION to one of: s3, cloudwatch")]
    UnknownDestination(String),
    #[error("Total input record number required. Set the value as the first argument")]
    MissingRecordCount,
    #[error("Total input record number must be a positive integer, got {0:?}")]
    InvalidRecordCount(String),
    #[error("Log delay required. Set the value as the second argument")]
    MissingLogDelay,
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Expected record ids overflow: {count} records starting at {base}")]
    RecordIdOverflow { base: u64, count: u64 },
}

/// What each required variable is for, used in the "missing" message.
fn describe_required(var: &str) -> Option<&'static str> {
    match var {
        ENV_AWS_REGION => Some("AWS Region"),
        ENV_S3_BUCKET => Some("Bucket name"),
        ENV_CW_LOG_GROUP => Some("Log group name"),
        ENV_LOG_PREFIX => Some("Object prefix"),
        ENV_DESTINATION => Some("Log destination for validation"),
        _ => None,
    }
}

impl From<envconfig::Error> for ConfigError {
    fn from(err: envconfig::Error) -> Self {
        // Required variables only fail to parse when they are empty, which we
        // report the same way as unset.
        let var = match err {
            envconfig::Error::EnvVarMissing { name } | envconfig::Error::ParseError { name } => {
                name
            }
        };
        match describe_required(var) {
            Some(what) => ConfigError::MissingEnv { what, var },
            None => ConfigError::InvalidEnv { var },
        }
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "AWS_REGION")]
    pub region: NonEmptyString,

    #[envconfig(from = "S3_BUCKET_NAME")]
    pub bucket: NonEmptyString,

    #[envconfig(from = "CW_LOG_GROUP_NAME")]
    pub log_group: NonEmptyString,

    // Object key prefix for S3, stream name for CloudWatch
    #[envconfig(from = "LOG_PREFIX")]
    pub log_prefix: NonEmptyString,

    #[envconfig(from = "DESTINATION")]
    pub destination: NonEmptyString,

    // First id the load producer writes; ids are this plus the record's sequence number
    #[envconfig(from = "RECORD_ID_BASE", default = "10000000")]
    pub record_id_base: u64,

    #[envconfig(from = "RETRY_INTERVAL_MS", default = "1000")]
    pub retry_interval: EnvMsDuration,

    // 0 means unlimited retries
    #[envconfig(from = "RETRY_MAX_ATTEMPTS", default = "0")]
    pub retry_max_attempts: u32,

    // 0 means unlimited retries
    #[envconfig(from = "RETRY_MAX_ELAPSED_MS", default = "0")]
    pub retry_max_elapsed: EnvMsDuration,

    // For pointing at LocalStack or MinIO
    #[envconfig(from = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::init_from_env()?)
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self::init_from_hashmap(vars)?)
    }

    pub fn destination_kind(&self) -> Result<DestinationKind, ConfigError> {
        self.destination
            .0
            .parse()
            .map_err(|_| ConfigError::UnknownDestination(self.destination.0.clone()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_interval.0)
            .max_attempts(self.retry_max_attempts)
            .max_elapsed(self.retry_max_elapsed.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}

impl From<clap::Error> for ConfigError {
    fn from(err: clap::Error) -> Self {
        let rendered = err.to_string();
        let first = rendered.lines().next().unwrap_or_default();
        ConfigError::InvalidArguments(first.trim_start_matches("error: ").to_owned())
    }
}

/// Checks how many load-test records made it to S3 or CloudWatch.
///
/// Both positionals are optional to clap so that a missing one is reported like
/// every other configuration fault.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Number of records the load producer wrote
    pub total_input_records: Option<String>,

    /// How long the pipeline was given to deliver; only echoed in the report
    pub log_delay: Option<String>,
}

impl Args {
    pub fn record_count(&self) -> Result<u64, ConfigError> {
        let raw = self.total_input_records.as_deref().unwrap_or_default().trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingRecordCount);
        }
        match raw.parse::<u64>() {
            Ok(count) if count > 0 => Ok(count),
            _ => Err(ConfigError::InvalidRecordCount(raw.to_owned())),
        }
    }

    pub fn log_delay(&self) -> Result<&str, ConfigError> {
        match self.log_delay.as_deref() {
            Some(delay) if !delay.is_empty() => Ok(delay),
            _ => Err(ConfigError::MissingLogDelay),
        }
    }
}

/// Last id of the expected range, or an error when `base + count - 1` does not fit.
pub fn last_record_id(count: u64, base: u64) -> Result<u64, ConfigError> {
    base.checked_add(count.saturating_sub(1))
        .ok_or(ConfigError::RecordIdOverflow { base, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn required() -> HashMap<String, String> {
        vars(&[
            (ENV_AWS_REGION, "us-west-2"),
            (ENV_S3_BUCKET, "load-test-bucket"),
            (ENV_CW_LOG_GROUP, "load-test-group"),
            (ENV_LOG_PREFIX, "kinesis-stream-1"),
            (ENV_DESTINATION, "s3"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_map(&required()).unwrap();
        assert_eq!(config.region.as_str(), "us-west-2");
        assert_eq!(config.log_prefix.as_str(), "kinesis-stream-1");
        assert_eq!(config.record_id_base, 10_000_000);
        assert_eq!(config.endpoint_url, None);
        assert_eq!(config.destination_kind(), Ok(DestinationKind::S3));

        let policy = config.retry_policy();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_retry_limits_from_env() {
        let mut env = required();
        env.insert("RETRY_INTERVAL_MS".into(), "250".into());
        env.insert("RETRY_MAX_ATTEMPTS".into(), "10".into());
        env.insert("RETRY_MAX_ELAPSED_MS".into(), "60000".into());

        let policy = Config::from_map(&env).unwrap().retry_policy();

        assert_eq!(policy.interval, time::Duration::from_millis(250));
        assert_eq!(policy.max_attempts, Some(10));
        assert_eq!(policy.max_elapsed, Some(time::Duration::from_secs(60)));
    }

    #[test]
    fn test_each_missing_variable_has_its_own_message() {
        let cases = [
            (ENV_AWS_REGION, "AWS Region required"),
            (ENV_S3_BUCKET, "Bucket name required"),
            (ENV_CW_LOG_GROUP, "Log group name required"),
            (ENV_LOG_PREFIX, "Object prefix required"),
            (ENV_DESTINATION, "Log destination for validation required"),
        ];
        for (var, message) in cases {
            let mut env = required();
            env.remove(var);

            let err = Config::from_map(&env).unwrap_err();

            assert!(matches!(err, ConfigError::MissingEnv { var: v, .. } if v == var));
            let rendered = err.to_string();
            assert!(rendered.starts_with(message), "{rendered}");
            assert!(rendered.ends_with(var), "{rendered}");
        }
    }

    #[test]
    fn test_empty_variable_counts_as_missing() {
        let mut env = required();
        env.insert(ENV_S3_BUCKET.into(), String::new());

        let err = Config::from_map(&env).unwrap_err();

        assert_eq!(
            err,
            ConfigError::MissingEnv {
                what: "Bucket name",
                var: ENV_S3_BUCKET
            }
        );
    }

    #[test]
    fn test_unparseable_tuning_value() {
        let mut env = required();
        env.insert("RETRY_MAX_ATTEMPTS".into(), "lots".into());

        let err = Config::from_map(&env).unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "RETRY_MAX_ATTEMPTS"
            }
        );
    }

    #[test]
    fn test_unknown_destination() {
        let mut env = required();
        env.insert(ENV_DESTINATION.into(), "firehose".into());

        let config = Config::from_map(&env).unwrap();

        assert_eq!(
            config.destination_kind(),
            Err(ConfigError::UnknownDestination("firehose".to_string()))
        );
    }

    #[test]
    fn test_args_positional() {
        let args =
            Args::try_parse_from(["log-delivery-validator", "50000", "10m"]).unwrap();
        assert_eq!(args.record_count(), Ok(50000));
        assert_eq!(args.log_delay(), Ok("10m"));
    }

    #[test]
    fn test_missing_positionals_are_config_errors() {
        let args = Args::try_parse_from(["log-delivery-validator", "50000"]).unwrap();
        assert_eq!(args.record_count(), Ok(50000));
        assert_eq!(args.log_delay(), Err(ConfigError::MissingLogDelay));
        assert_eq!(
            ConfigError::MissingLogDelay.to_string(),
            "Log delay required. Set the value as the second argument"
        );

        let args = Args::try_parse_from(["log-delivery-validator"]).unwrap();
        assert_eq!(args.record_count(), Err(ConfigError::MissingRecordCount));
    }

    #[test]
    fn test_unexpected_argument_maps_to_config_error() {
        let err = Args::try_parse_from(["log-delivery-validator", "5", "1m", "extra"])
            .unwrap_err();
        assert!(err.use_stderr());

        let err = ConfigError::from(err);

        assert!(matches!(err, ConfigError::InvalidArguments(_)));
        assert!(!err.to_string().contains("error: "), "{err}");
    }

    #[test]
    fn test_last_record_id() {
        assert_eq!(last_record_id(5, 10_000_000), Ok(10_000_004));
        assert_eq!(last_record_id(1, u64::MAX), Ok(u64::MAX));
        assert_eq!(
            last_record_id(2, u64::MAX),
            Err(ConfigError::RecordIdOverflow {
                base: u64::MAX,
                count: 2
            })
        );
    }

    #[test]
    fn test_args_reject_bad_counts() {
        for (raw, expected) in [
            ("", ConfigError::MissingRecordCount),
            ("0", ConfigError::InvalidRecordCount("0".into())),
            ("-5", ConfigError::InvalidRecordCount("-5".into())),
            ("ten", ConfigError::InvalidRecordCount("ten".into())),
        ] {
            let args = Args {
                total_input_records: Some(raw.to_string()),
                log_delay: Some("1m".to_string()),
            };
            assert_eq!(args.record_count(), Err(expected));
        }

        let args = Args {
            total_input_records: Some("1".to_string()),
            log_delay: Some(String::new()),
        };
        assert_eq!(args.log_delay(), Err(ConfigError::MissingLogDelay));
    }
}
