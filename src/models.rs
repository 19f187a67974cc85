use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// POST /api/check-wordpress request body. Only presence of `url` is required;
// a missing key fails deserialization, while `null` or a number still parses.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CheckRequest {
    pub url: Value,
}

impl CheckRequest {
    /// Target handed to the detector. Non-string values keep their JSON text,
    /// which never parses as a URL, so they come back as "not WordPress".
    pub fn target(&self) -> String {
        match &self.url {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CheckResponse {
    #[serde(rename = "isWordPress")]
    pub is_wordpress: bool,
}

// Body of every non-200 response
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<DateTime<Utc>>,
}
