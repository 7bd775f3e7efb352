//! Captured traffic handed over by the serving layer.

use crate::stub::{decode_body, encode_body};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One request/response exchange seen by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedInteraction {
    /// Assigned when the request arrived; becomes the stub id
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
    /// Whether the response came from the proxied target
    #[serde(default = "default_was_proxied")]
    pub was_proxied: bool,
}

fn default_was_proxied() -> bool {
    true
}

impl CapturedInteraction {
    /// Proxied interaction with a fresh id.
    pub fn new(request: CapturedRequest, response: CapturedResponse) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            response,
            was_proxied: true,
        }
    }
}

/// Request as received; `url` is the path and query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CapturedRequestRaw", into = "CapturedRequestRaw")]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CapturedResponseRaw", into = "CapturedResponseRaw")]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapturedRequestRaw {
    method: String,
    url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64_body: Option<String>,
}

impl From<CapturedRequestRaw> for CapturedRequest {
    fn from(raw: CapturedRequestRaw) -> Self {
        Self {
            method: raw.method.to_uppercase(),
            url: raw.url,
            headers: raw.headers,
            body: decode_body(raw.body, raw.base64_body).unwrap_or_default(),
        }
    }
}

impl From<CapturedRequest> for CapturedRequestRaw {
    fn from(request: CapturedRequest) -> Self {
        let (body, base64_body) = if request.body.is_empty() {
            (None, None)
        } else {
            encode_body(request.body)
        };
        Self {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
            base64_body,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapturedResponseRaw {
    status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64_body: Option<String>,
}

impl From<CapturedResponseRaw> for CapturedResponse {
    fn from(raw: CapturedResponseRaw) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            body: decode_body(raw.body, raw.base64_body).unwrap_or_default(),
        }
    }
}

impl From<CapturedResponse> for CapturedResponseRaw {
    fn from(response: CapturedResponse) -> Self {
        let (body, base64_body) = if response.body.is_empty() {
            (None, None)
        } else {
            encode_body(response.body)
        };
        Self {
            status: response.status,
            headers: response.headers,
            body,
            base64_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_interaction() {
        let interaction: CapturedInteraction = serde_json::from_value(json!({
            "id": "3f0e2a4c-5b8d-4e7f-9a1b-2c3d4e5f6a7b",
            "request": {"method": "post", "url": "/orders?x=1", "body": "{}"},
            "response": {"status": 201, "base64Body": "AAE="}
        }))
        .unwrap();

        assert_eq!(interaction.request.method, "POST");
        assert_eq!(interaction.request.body, b"{}");
        assert_eq!(interaction.response.body, vec![0x00, 0x01]);
        assert!(interaction.was_proxied);
    }

    #[test]
    fn test_missing_id_is_generated() {
        let a: CapturedInteraction = serde_json::from_value(json!({
            "request": {"method": "GET", "url": "/"},
            "response": {"status": 200}
        }))
        .unwrap();
        let b: CapturedInteraction = serde_json::from_value(json!({
            "request": {"method": "GET", "url": "/"},
            "response": {"status": 200}
        }))
        .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = CapturedRequest::new("get", "/").with_header("Content-Type", "text/plain");
        assert_eq!(request.header("content-type"), Some("text/plain"));
        assert_eq!(request.header("accept"), None);
    }
}
