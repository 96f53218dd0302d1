//! Transport adapters: HTTP polling and WebSocket streaming. Both surface one
//! `TransportEvent` per outcome so the controller never cares which is in use.

pub mod poll;
pub mod stream;

use std::{fs, path::Path, time::Duration};

use serde_json::Value;

use crate::error::{FailureReason, FeedError};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Payload {
        payload: Value,
        /// Measured request round trip (polling only).
        rtt: Option<Duration>,
    },
    Failure(FailureReason),
}

impl From<Result<Value, FailureReason>> for TransportEvent {
    fn from(r: Result<Value, FailureReason>) -> Self {
        match r {
            Ok(payload) => TransportEvent::Payload { payload, rtt: None },
            Err(reason) => TransportEvent::Failure(reason),
        }
    }
}

/// Decode a response body or frame into the metrics object.
///
/// Accepts the metrics object directly or wrapped as `{ "success": .., "data": {..} }`.
/// `success: false` becomes `Rejected` with the server's message.
pub fn decode_body(body: &[u8]) -> Result<Value, FailureReason> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| FailureReason::Parse(e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(FailureReason::Parse("expected a JSON object".into()));
    };

    match obj.get("success") {
        Some(Value::Bool(false)) => {
            let msg = ["error", "message"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .unwrap_or("server reported success=false");
            return Err(FailureReason::Rejected(msg.to_string()));
        }
        Some(_) => {
            return match obj.remove("data") {
                Some(data @ Value::Object(_)) => Ok(data),
                Some(_) => Err(FailureReason::Parse("envelope 'data' is not an object".into())),
                None => Ok(Value::Object(obj)),
            };
        }
        None => {}
    }

    if obj.len() == 1 && obj.get("data").is_some_and(Value::is_object) {
        return Ok(obj.remove("data").unwrap_or(Value::Null));
    }
    Ok(Value::Object(obj))
}

/// Read a PEM bundle from disk (`--tls-ca`).
pub(crate) fn read_pem(path: &Path) -> Result<Vec<u8>, FeedError> {
    fs::read(path).map_err(|e| FeedError::Tls(format!("read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_object_passes_through() {
        let v = decode_body(br#"{"players": 3}"#).unwrap();
        assert_eq!(v, json!({"players": 3}));
    }

    #[test]
    fn envelope_is_unwrapped() {
        let v = decode_body(br#"{"success": true, "data": {"players": 3}}"#).unwrap();
        assert_eq!(v, json!({"players": 3}));
        let v = decode_body(br#"{"data": {"players": 1}}"#).unwrap();
        assert_eq!(v, json!({"players": 1}));
    }

    #[test]
    fn fetch_results_map_to_events() {
        let ok = TransportEvent::from(Ok(json!({"players": 2})));
        assert_eq!(
            ok,
            TransportEvent::Payload {
                payload: json!({"players": 2}),
                rtt: None
            }
        );
        let failed = TransportEvent::from(Err(FailureReason::HttpStatus(502)));
        assert_eq!(failed, TransportEvent::Failure(FailureReason::HttpStatus(502)));
    }

    #[test]
    fn success_false_is_rejected() {
        let err = decode_body(br#"{"success": false, "error": "node offline"}"#).unwrap_err();
        assert_eq!(err, FailureReason::Rejected("node offline".into()));
        assert_eq!(err.tag(), "rejected");
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        for body in [&b"not json"[..], b"[1,2]", b"12", b"", br#"{"success":true,"data":7}"#] {
            let err = decode_body(body).unwrap_err();
            assert_eq!(err.tag(), "parse-error", "body {:?}", String::from_utf8_lossy(body));
        }
    }
}
