use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    Client as AwsCloudWatchLogsClient,
};
use tracing::{debug, info};

use super::{classify_aws_error, LogSource};
use crate::{error::DestinationError, extract::LineFormat, retry::RetryPolicy};

const GET_LOG_EVENTS: &str = "GetLogEvents";

/// One page of events from a log stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    pub messages: Vec<String>,
    pub next_forward_token: Option<String>,
}

#[async_trait]
pub trait LogEventPager: Send + Sync {
    /// Always reads from the head of the stream; `next_token` continues a previous
    /// page.
    async fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        next_token: Option<&str>,
    ) -> Result<EventPage, DestinationError>;
}

pub struct CloudWatchLogEventPager {
    client: AwsCloudWatchLogsClient,
}

impl CloudWatchLogEventPager {
    pub fn new(client: AwsCloudWatchLogsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogEventPager for CloudWatchLogEventPager {
    async fn get_log_events(
        &self,
        log_group: &str,
        log_stream: &str,
        next_token: Option<&str>,
    ) -> Result<EventPage, DestinationError> {
        let output = self
            .client
            .get_log_events()
            .log_group_name(log_group)
            .log_stream_name(log_stream)
            .start_from_head(true)
            .set_next_token(next_token.map(str::to_owned))
            .send()
            .await
            .map_err(|e| {
                classify_aws_error(
                    GET_LOG_EVENTS,
                    e.code(),
                    format!(
                        "Failed to get the log events from log group {log_group:?}: {}",
                        DisplayErrorContext(&e)
                    ),
                )
            })?;

        Ok(EventPage {
            messages: output
                .events()
                .iter()
                .map(|event| event.message().unwrap_or_default().to_owned())
                .collect(),
            next_forward_token: output.next_forward_token().map(str::to_owned),
        })
    }
}

/// Scripted pager for tests. Pages are handed out in the order they were queued.
#[derive(Default)]
pub struct MockLogEventPager {
    responses: Mutex<VecDeque<Result<EventPage, DestinationError>>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl MockLogEventPager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_ret(self, response: Result<EventPage, DestinationError>) -> Self {
        self.responses
            .lock()
            .expect("poisoned")
            .push_back(response);
        self
    }

    /// Token passed on each call.
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl LogEventPager for MockLogEventPager {
    async fn get_log_events(
        &self,
        _log_group: &str,
        _log_stream: &str,
        next_token: Option<&str>,
    ) -> Result<EventPage, DestinationError> {
        self.calls
            .lock()
            .expect("poisoned")
            .push(next_token.map(str::to_owned));
        self.responses
            .lock()
            .expect("poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(DestinationError::failed(GET_LOG_EVENTS, "no page queued")))
    }
}

/// Pages forward through a single log stream. CloudWatch never says it is done:
/// the end of the stream is reached when a page hands back the same forward token
/// it was given.
pub struct LogStreamReader<P> {
    pager: P,
    log_group: String,
    log_stream: String,
    retry: RetryPolicy,
    forward_token: Option<String>,
    done: bool,
    pages: u64,
}

impl<P: LogEventPager> LogStreamReader<P> {
    pub fn new(pager: P, log_group: String, log_stream: String, retry: RetryPolicy) -> Self {
        Self {
            pager,
            log_group,
            log_stream,
            retry,
            forward_token: None,
            done: false,
            pages: 0,
        }
    }

    pub fn pager(&self) -> &P {
        &self.pager
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }
}

#[async_trait]
impl<P: LogEventPager> LogSource for LogStreamReader<P> {
    fn name(&self) -> &'static str {
        "CloudWatch"
    }

    fn line_format(&self) -> LineFormat {
        LineFormat::Plain
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<String>>, DestinationError> {
        if self.done {
            return Ok(None);
        }

        let page = {
            let pager = &self.pager;
            let log_group = self.log_group.as_str();
            let log_stream = self.log_stream.as_str();
            let token = self.forward_token.as_deref();
            self.retry
                .run(GET_LOG_EVENTS, move || {
                    pager.get_log_events(log_group, log_stream, token)
                })
                .await?
        };
        self.pages += 1;
        debug!(
            "Got {} events from {}/{} (page {})",
            page.messages.len(),
            self.log_group,
            self.log_stream,
            self.pages
        );

        // A missing token would send the next request back to the head of the
        // stream, so it ends the traversal too.
        if page.next_forward_token.is_none() || page.next_forward_token == self.forward_token {
            self.done = true;
            info!(
                "Reached end of {}/{} after {} pages",
                self.log_group, self.log_stream, self.pages
            );
        } else {
            self.forward_token = page.next_forward_token;
        }

        Ok(Some(page.messages))
    }
}
