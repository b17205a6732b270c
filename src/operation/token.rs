//! Opaque, resumable handle for polling a long-running deployment.
//!
//! A token is compact JSON carrying a format version, the tagged request and the
//! UTC instant the request started:
//!
//! ```text
//! {"v":1,"request":{"kind":"create","service_instance_id":"..."},"started_at":"2018-01-22T14:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::{OperationKind, OperationRequest};
use crate::error::{SyncError, SyncResult};

/// Current token format version.
pub const TOKEN_VERSION: u32 = 1;

/// What was requested, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationToken {
    pub request: OperationRequest,
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct EncodedToken<'a> {
    v: u32,
    request: &'a OperationRequest,
    started_at: &'a DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawToken {
    v: u32,
    request: Value,
    started_at: DateTime<Utc>,
}

impl OperationToken {
    pub fn new(request: OperationRequest, started_at: DateTime<Utc>) -> Self {
        Self {
            request,
            started_at,
        }
    }

    pub fn encode(&self) -> SyncResult<String> {
        serde_json::to_string(&EncodedToken {
            v: TOKEN_VERSION,
            request: &self.request,
            started_at: &self.started_at,
        })
        .map_err(|e| SyncError::InvalidToken(e.to_string()))
    }

    /// Rebuild a token from its encoded form.
    ///
    /// Unknown versions and request kinds are rejected as unsupported rather than
    /// guessed at.
    pub fn decode(encoded: &str) -> SyncResult<Self> {
        let raw: RawToken =
            serde_json::from_str(encoded).map_err(|e| SyncError::InvalidToken(e.to_string()))?;

        if raw.v != TOKEN_VERSION {
            return Err(SyncError::UnsupportedOperationKind {
                kind: format!("token version {}", raw.v),
            });
        }

        let kind = raw
            .request
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::InvalidToken("request kind is missing".to_string()))?;
        if OperationKind::parse(kind).is_none() {
            return Err(SyncError::UnsupportedOperationKind {
                kind: kind.to_string(),
            });
        }

        let request: OperationRequest = serde_json::from_value(raw.request)
            .map_err(|e| SyncError::InvalidToken(e.to_string()))?;

        Ok(OperationToken {
            request,
            started_at: raw.started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::request::{CreateServiceInstanceRequest, DeleteServiceInstanceRequest};
    use chrono::TimeZone;
    use serde_json::json;

    fn create_request() -> OperationRequest {
        let mut parameters = std::collections::BTreeMap::new();
        parameters.insert("replicas".to_string(), json!(3));
        parameters.insert("tags".to_string(), json!(["a", "b"]));
        OperationRequest::Create(CreateServiceInstanceRequest {
            service_instance_id: "111-222".to_string(),
            service_definition_id: "cassandra-ondemand-service".to_string(),
            plan_id: "cassandra-ondemand-plan".to_string(),
            organization_guid: "org_id".to_string(),
            space_guid: "space_id".to_string(),
            parameters,
        })
    }

    fn delete_request() -> OperationRequest {
        OperationRequest::Delete(DeleteServiceInstanceRequest {
            service_instance_id: "111-222".to_string(),
            service_definition_id: "cassandra-ondemand-service".to_string(),
            plan_id: "cassandra-ondemand-plan".to_string(),
        })
    }

    #[test]
    fn test_round_trip_every_kind() {
        let started_at = Utc.with_ymd_and_hms(2018, 1, 22, 14, 0, 0).unwrap();
        for request in [create_request(), delete_request()] {
            let token = OperationToken::new(request, started_at);
            let decoded = OperationToken::decode(&token.encode().unwrap()).unwrap();
            assert_eq!(decoded, token);
        }
    }

    #[test]
    fn test_round_trip_keeps_float_parameters_exact() {
        let started_at = Utc.with_ymd_and_hms(2018, 1, 22, 14, 0, 0).unwrap();
        let floats = [
            0.1,
            1.0715660391465826e-75,
            -1.81996730402717e-179,
            -1.603964615428183e143,
            f64::MAX,
            f64::MIN_POSITIVE,
        ];
        for value in floats {
            let OperationRequest::Create(mut create) = create_request() else {
                unreachable!()
            };
            create.parameters.insert("ratio".to_string(), json!(value));
            let token = OperationToken::new(OperationRequest::Create(create), started_at);

            let decoded = OperationToken::decode(&token.encode().unwrap()).unwrap();
            assert_eq!(decoded, token, "float {value:e} changed");
        }
    }

    #[test]
    fn test_round_trip_keeps_sub_second_precision() {
        let started_at = Utc.timestamp_opt(1_516_629_600, 123_456_789).unwrap();
        let token = OperationToken::new(delete_request(), started_at);
        let decoded = OperationToken::decode(&token.encode().unwrap()).unwrap();
        assert_eq!(decoded.started_at, started_at);
    }

    #[test]
    fn test_encoded_form_is_tagged_and_utc() {
        let started_at = Utc.with_ymd_and_hms(2018, 1, 22, 14, 0, 0).unwrap();
        let encoded = OperationToken::new(delete_request(), started_at)
            .encode()
            .unwrap();

        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["request"]["kind"], "delete");
        assert_eq!(value["started_at"], "2018-01-22T14:00:00Z");
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let encoded = r#"{"v":1,"request":{"kind":"bind","service_instance_id":"x"},"started_at":"2018-01-22T14:00:00Z"}"#;
        match OperationToken::decode(encoded) {
            Err(SyncError::UnsupportedOperationKind { kind }) => assert_eq!(kind, "bind"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_version_is_unsupported() {
        let encoded = r#"{"v":2,"request":{"kind":"create"},"started_at":"2018-01-22T14:00:00Z"}"#;
        assert!(matches!(
            OperationToken::decode(encoded),
            Err(SyncError::UnsupportedOperationKind { .. })
        ));
    }

    #[test]
    fn test_malformed_tokens_are_invalid() {
        for encoded in [
            "",
            "not json",
            r#"{"v":1,"request":{},"started_at":"2018-01-22T14:00:00Z"}"#,
            r#"{"v":1,"request":{"kind":"delete"},"started_at":"2018-01-22T14:00:00Z"}"#,
            r#"{"v":1,"request":{"kind":"delete","service_instance_id":"x","service_definition_id":"s","plan_id":"p"},"started_at":"yesterday"}"#,
        ] {
            assert!(
                matches!(OperationToken::decode(encoded), Err(SyncError::InvalidToken(_))),
                "expected invalid token for {encoded:?}"
            );
        }
    }
}
