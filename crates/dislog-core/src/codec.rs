//! Entry codec
//!
//! Each entry is written as one JSON object on its own line:
//!
//! ```text
//! {"type":"msg","time":"2024-03-15T10:00:00Z","data":{...}}\n
//! ```
//!
//! `type` is the kind tag, `time` the RFC 3339 instant the entry was
//! appended, and `data` the kind-specific payload. The codec treats the
//! payload as opaque; it only needs it to be serializable. Encoding happens
//! entirely in memory so a failure can never leave a partial line on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Borrowed view of a record, for encoding without copying the payload
#[derive(Serialize)]
struct RecordRef<'a, P: ?Sized> {
    #[serde(rename = "type")]
    kind: &'a str,
    time: DateTime<Utc>,
    data: &'a P,
}

/// A decoded log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The `type` tag
    #[serde(rename = "type")]
    pub kind: String,
    /// When the entry was appended
    pub time: DateTime<Utc>,
    /// The kind-specific payload
    pub data: serde_json::Value,
}

/// Encode a record as a newline-terminated JSON line
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if `payload` fails to serialize.
pub fn encode_record<P>(kind: &str, time: DateTime<Utc>, payload: &P) -> Result<Vec<u8>, CodecError>
where
    P: Serialize + ?Sized,
{
    let record = RecordRef {
        kind,
        time,
        data: payload,
    };
    let mut line = serde_json::to_vec(&record).map_err(CodecError::Encode)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode one line (with or without its trailing newline)
pub fn decode_record(line: impl AsRef<[u8]>) -> Result<Record, CodecError> {
    serde_json::from_slice(line.as_ref()).map_err(CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Serializer;
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("payload refused to serialize"))
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let line = encode_record("msg", stamp(), &json!({"content": "hi"})).unwrap();
        assert_eq!(
            std::str::from_utf8(&line).unwrap(),
            "{\"type\":\"msg\",\"time\":\"2024-03-15T10:00:00Z\",\"data\":{\"content\":\"hi\"}}\n"
        );
    }

    #[test]
    fn test_encoded_record_is_one_line() {
        let line = encode_record("msg", stamp(), &json!({"content": "a\nb\r\nc"})).unwrap();
        assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(line.last(), Some(&b'\n'));
    }

    #[test]
    fn test_roundtrip_arbitrary_payload() {
        let payload = json!({"content": "hi", "nested": {"n": [1, 2, 3]}, "none": null});
        let time = stamp() + chrono::Duration::nanoseconds(123_456_789);
        let line = encode_record("custom", time, &payload).unwrap();

        let record = decode_record(&line).unwrap();
        assert_eq!(record.kind, "custom");
        assert_eq!(record.time, time);
        assert_eq!(record.data, payload);
    }

    #[test]
    fn test_encode_failure_carries_cause() {
        let err = encode_record("msg", stamp(), &Unserializable).unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
        assert!(err.to_string().contains("payload refused to serialize"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_record("not json"), Err(CodecError::Decode(_))));
        assert!(matches!(
            decode_record("{\"type\":\"msg\",\"data\":{}}"),
            Err(CodecError::Decode(_))
        ));
    }
}
