//! Wire types for the Privileged Helper's unix-socket protocol
//! (`spec.md` §4.4, §6): one JSON object per line, request carries an
//! opaque request id that is echoed verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct HelperRequest {
    pub request_id: String,
    pub operation: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct HelperResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HelperResponse {
    pub fn ok(request_id: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// The fixed, enumerated operation tags (`spec.md` §4.4). Any other tag is
/// rejected at validation step 2, before parameter decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReadFile,
    ListDir,
    ReadProcNet,
    CheckPort,
    ReadProcessInfo,
}

impl Operation {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "read-file" => Some(Operation::ReadFile),
            "list-dir" => Some(Operation::ListDir),
            "read-proc-net" => Some(Operation::ReadProcNet),
            "check-port" => Some(Operation::CheckPort),
            "read-process-info" => Some(Operation::ReadProcessInfo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_tags_do_not_parse() {
        assert!(Operation::from_tag("delete-file").is_none());
    }

    #[test]
    fn request_round_trips_through_json() {
        let json = r#"{"request_id":"abc-1","operation":"read-file","params":{"path":"/etc/nginx/nginx.conf"}}"#;
        let request: HelperRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.request_id, "abc-1");
        assert_eq!(request.operation, "read-file");
    }

    #[test]
    fn response_envelope_omits_absent_fields() {
        let response = HelperResponse::ok("abc-1", serde_json::json!({"size": 4}));
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"error\""));
    }
}
