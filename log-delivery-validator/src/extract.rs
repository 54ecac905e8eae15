use std::fmt;

use serde::{
    de::{self, IgnoredAny, MapAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::{
    error::ExtractError,
    universe::{RecordId, RECORD_ID_LEN},
};

/// How a destination wraps the producer's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// One JSON object per line with the payload under `log`, as Firehose writes to S3.
    JsonEnvelope,
    /// The line is the payload itself, as CloudWatch returns event messages.
    Plain,
}

/// The payload sits under a `log` key in any letter case. When a line carries
/// several such keys the last one wins.
struct Envelope {
    log: String,
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EnvelopeVisitor;

        impl<'de> Visitor<'de> for EnvelopeVisitor {
            type Value = Envelope;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object with a log field")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Envelope, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut log = None;
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("log") {
                        log = Some(map.next_value::<String>()?);
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                let log = log.ok_or_else(|| de::Error::missing_field("log"))?;
                Ok(Envelope { log })
            }
        }

        deserializer.deserialize_map(EnvelopeVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub record_id: RecordId,
    pub payload: String,
}

pub fn extract(line: &str, format: LineFormat) -> Result<ExtractedRecord, ExtractError> {
    match format {
        LineFormat::JsonEnvelope => {
            let envelope: Envelope =
                serde_json::from_str(line).map_err(|source| ExtractError::MalformedEnvelope {
                    line: line.to_owned(),
                    source,
                })?;
            split_record_id(&envelope.log)
        }
        LineFormat::Plain => split_record_id(line),
    }
}

/// Splits the fixed-width id off the front of a payload. Counts characters, not
/// bytes, so a multi-byte payload never gets cut mid-character.
pub fn split_record_id(payload: &str) -> Result<ExtractedRecord, ExtractError> {
    let Some((idx, ch)) = payload.char_indices().nth(RECORD_ID_LEN - 1) else {
        return Err(ExtractError::ShortPayload {
            payload: payload.to_owned(),
            expected: RECORD_ID_LEN,
        });
    };
    let (id, rest) = payload.split_at(idx + ch.len_utf8());
    Ok(ExtractedRecord {
        record_id: RecordId::from(id),
        payload: rest.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_envelope() {
        let line = r#"{"log":"10029999_1639151827578_RandomString"}"#;
        let record = extract(line, LineFormat::JsonEnvelope).unwrap();
        assert_eq!(record.record_id.as_str(), "10029999");
        assert_eq!(record.payload, "_1639151827578_RandomString");
    }

    #[test]
    fn test_extract_envelope_ignores_extra_fields_and_accepts_capitalised_key() {
        let line = r#"{"Log":"10000001_x","container_id":"abc","source":"stdout"}"#;
        let record = extract(line, LineFormat::JsonEnvelope).unwrap();
        assert_eq!(record.record_id.as_str(), "10000001");
    }

    #[test]
    fn test_extract_envelope_key_in_any_case() {
        for key in ["LOG", "lOg", "loG"] {
            let line = format!(r#"{{"{key}":"10000002_x"}}"#);
            let record = extract(&line, LineFormat::JsonEnvelope).unwrap();
            assert_eq!(record.record_id.as_str(), "10000002", "key {key}");
        }
    }

    #[test]
    fn test_extract_envelope_last_log_key_wins() {
        let line = r#"{"log":"10000001_a","stream":"stdout","Log":"10000003_b"}"#;
        let record = extract(line, LineFormat::JsonEnvelope).unwrap();
        assert_eq!(record.record_id.as_str(), "10000003");
        assert_eq!(record.payload, "_b");
    }

    #[test]
    fn test_extract_envelope_without_log_key() {
        let err = extract(r#"{"logs":"10000001_a"}"#, LineFormat::JsonEnvelope).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedEnvelope { .. }));
    }

    #[test]
    fn test_extract_plain_line() {
        let record = extract("10000004_1639151827578_abc", LineFormat::Plain).unwrap();
        assert_eq!(record.record_id.as_str(), "10000004");
    }

    #[test]
    fn test_exactly_eight_characters_has_empty_rest() {
        let record = split_record_id("10000000").unwrap();
        assert_eq!(record.record_id.as_str(), "10000000");
        assert_eq!(record.payload, "");
    }

    #[test]
    fn test_short_payload_is_an_error() {
        let err = split_record_id("1000000").unwrap_err();
        assert!(matches!(err, ExtractError::ShortPayload { expected: 8, .. }));

        let err = extract(r#"{"log":"123"}"#, LineFormat::JsonEnvelope).unwrap_err();
        assert!(matches!(err, ExtractError::ShortPayload { .. }));
    }

    #[test]
    fn test_multibyte_payload_split_on_char_boundary() {
        let record = split_record_id("ééééééééabc").unwrap();
        assert_eq!(record.record_id.as_str(), "éééééééé");
        assert_eq!(record.payload, "abc");
    }

    #[test]
    fn test_malformed_envelope_is_an_error() {
        for line in [
            "this is not valid json",
            r#"{"log": "10000000_"#,
            r#"{"message":"10000000_abc"}"#,
            r#"{"log": 10000000}"#,
        ] {
            let err = extract(line, LineFormat::JsonEnvelope).unwrap_err();
            assert!(
                matches!(err, ExtractError::MalformedEnvelope { .. }),
                "expected malformed envelope for {line}"
            );
        }
    }
}
