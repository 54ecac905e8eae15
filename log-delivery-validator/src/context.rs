use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use crate::{
    config::Config,
    destination::{
        cloudwatch::{CloudWatchLogEventPager, LogStreamReader},
        s3::{ObjectStoreReader, S3ObjectStore},
        DestinationKind, LogSource,
    },
    error::ValidationError,
};

async fn load_aws_config(config: &Config) -> SdkConfig {
    let mut builder = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.0.clone()));
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }
    builder.load().await
}

/// Builds the reader for the configured destination. Only the client that reader
/// needs is created.
pub async fn build_source(config: &Config) -> Result<Box<dyn LogSource>, ValidationError> {
    let kind = config.destination_kind()?;
    let aws_config = load_aws_config(config).await;
    let retry = config.retry_policy();
    info!("Destination: {}", kind);

    let source: Box<dyn LogSource> = match kind {
        DestinationKind::S3 => {
            let mut s3_config = aws_sdk_s3::config::Builder::from(&aws_config);
            if config.endpoint_url.is_some() {
                s3_config = s3_config.force_path_style(true);
            }
            let client = aws_sdk_s3::Client::from_conf(s3_config.build());
            info!(
                "Reading objects from s3://{}/{}",
                config.bucket.as_str(),
                config.log_prefix.as_str()
            );
            Box::new(ObjectStoreReader::new(
                S3ObjectStore::new(client),
                config.bucket.0.clone(),
                config.log_prefix.0.clone(),
                retry,
            ))
        }
        DestinationKind::CloudWatch => {
            let client = aws_sdk_cloudwatchlogs::Client::new(&aws_config);
            info!(
                "Reading log stream {} from log group {}",
                config.log_prefix.as_str(),
                config.log_group.as_str()
            );
            Box::new(LogStreamReader::new(
                CloudWatchLogEventPager::new(client),
                config.log_group.0.clone(),
                config.log_prefix.0.clone(),
                retry,
            ))
        }
    };
    Ok(source)
}
