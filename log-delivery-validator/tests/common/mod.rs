//! Shared fixtures for the end-to-end validation tests.
#![allow(dead_code)]

use log_delivery_validator::{
    destination::{
        cloudwatch::{EventPage, LogStreamReader, MockLogEventPager},
        s3::{ListPage, MockObjectStore, ObjectStoreReader},
    },
    retry::RetryPolicy,
};

pub const BASE: u64 = 10_000_000;

/// The five deliveries from the reference scenario: two expected ids missing, one
/// delivered twice, and one id the producer never wrote.
pub const DELIVERED_IDS: [&str; 5] = ["10000000", "10000001", "10000001", "10000003", "99999999"];

pub fn payload(id: &str) -> String {
    format!("{id}_1639151827578_RandomString")
}

pub fn envelope(id: &str) -> String {
    format!(r#"{{"log":"{}"}}"#, payload(id))
}

pub fn list_page(keys: &[&str], next: Option<&str>) -> ListPage {
    ListPage {
        keys: keys.iter().map(|k| k.to_string()).collect(),
        is_truncated: next.is_some(),
        next_continuation_token: next.map(str::to_owned),
    }
}

pub fn event_page(ids: &[&str], token: &str) -> EventPage {
    EventPage {
        messages: ids.iter().map(|id| payload(id)).collect(),
        next_forward_token: Some(token.to_string()),
    }
}

pub fn s3_reader(store: MockObjectStore) -> ObjectStoreReader<MockObjectStore> {
    ObjectStoreReader::new(
        store,
        "load-test-bucket".to_string(),
        "stream-1/".to_string(),
        RetryPolicy::default(),
    )
}

pub fn cloudwatch_reader(pager: MockLogEventPager) -> LogStreamReader<MockLogEventPager> {
    LogStreamReader::new(
        pager,
        "load-test-group".to_string(),
        "stream-1".to_string(),
        RetryPolicy::default(),
    )
}
