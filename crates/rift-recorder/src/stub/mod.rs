//! Stub artifacts: the request/response rules produced by a recording.
//!
//! The JSON shape follows the mock server's stub mapping files:
//! `{"id", "name", "request": {...}, "response": {...}, "persistent", "scenarioName", ...}`.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Request method meaning "any method".
pub const ANY_METHOD: &str = "ANY";

// ============================================================================
// Stub
// ============================================================================

/// A recorded request/response rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubArtifact {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub request: RequestPattern,
    pub response: ResponseDefinition,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub persistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scenario_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_scenario_state: Option<String>,
}

impl StubArtifact {
    /// New stub with a fresh random id.
    pub fn new(request: RequestPattern, response: ResponseDefinition) -> Self {
        Self::with_id(Uuid::new_v4(), request, response)
    }

    pub fn with_id(id: Uuid, request: RequestPattern, response: ResponseDefinition) -> Self {
        Self {
            id,
            name: None,
            request,
            response,
            persistent: false,
            scenario_name: None,
            required_scenario_state: None,
            new_scenario_state: None,
        }
    }
}

// ============================================================================
// Request Pattern
// ============================================================================

/// How a stub matches the request URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlMatcher {
    /// Path and query equal to the value
    Url(String),
    /// Path equal to the value, any query
    UrlPath(String),
    /// Path and query match the regex
    UrlPattern(String),
    /// Path matches the regex, any query
    UrlPathPattern(String),
    /// Matches anything
    Any,
}

impl UrlMatcher {
    /// Expected URL or pattern, `None` for [`UrlMatcher::Any`].
    pub fn expected(&self) -> Option<&str> {
        match self {
            UrlMatcher::Url(v)
            | UrlMatcher::UrlPath(v)
            | UrlMatcher::UrlPattern(v)
            | UrlMatcher::UrlPathPattern(v) => Some(v),
            UrlMatcher::Any => None,
        }
    }

    /// Value of an exact [`UrlMatcher::Url`] or [`UrlMatcher::UrlPath`].
    pub fn exact_url(&self) -> Option<&str> {
        match self {
            UrlMatcher::Url(v) | UrlMatcher::UrlPath(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, UrlMatcher::Any)
    }
}

/// Request side of a stub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RequestPatternRaw", into = "RequestPatternRaw")]
pub struct RequestPattern {
    pub method: String,
    pub url_matcher: UrlMatcher,
    pub headers: BTreeMap<String, HeaderPattern>,
    pub body_patterns: Vec<BodyPattern>,
}

impl RequestPattern {
    pub fn new(method: &str, url_matcher: UrlMatcher) -> Self {
        Self {
            method: method.to_uppercase(),
            url_matcher,
            headers: BTreeMap::new(),
            body_patterns: Vec::new(),
        }
    }

    /// Pattern matching every request.
    pub fn any() -> Self {
        Self::new(ANY_METHOD, UrlMatcher::Any)
    }
}

/// Wire form of [`RequestPattern`]: at most one of the URL fields is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestPatternRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_path_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, HeaderPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    body_patterns: Vec<BodyPattern>,
}

impl From<RequestPatternRaw> for RequestPattern {
    fn from(raw: RequestPatternRaw) -> Self {
        let url_matcher = if let Some(url) = raw.url {
            UrlMatcher::Url(url)
        } else if let Some(path) = raw.url_path {
            UrlMatcher::UrlPath(path)
        } else if let Some(pattern) = raw.url_pattern {
            UrlMatcher::UrlPattern(pattern)
        } else if let Some(pattern) = raw.url_path_pattern {
            UrlMatcher::UrlPathPattern(pattern)
        } else {
            UrlMatcher::Any
        };

        Self {
            method: raw
                .method
                .map(|m| m.to_uppercase())
                .unwrap_or_else(|| ANY_METHOD.to_string()),
            url_matcher,
            headers: raw.headers,
            body_patterns: raw.body_patterns,
        }
    }
}

impl From<RequestPattern> for RequestPatternRaw {
    fn from(pattern: RequestPattern) -> Self {
        let mut raw = RequestPatternRaw {
            method: Some(pattern.method),
            headers: pattern.headers,
            body_patterns: pattern.body_patterns,
            ..Default::default()
        };
        match pattern.url_matcher {
            UrlMatcher::Url(v) => raw.url = Some(v),
            UrlMatcher::UrlPath(v) => raw.url_path = Some(v),
            UrlMatcher::UrlPattern(v) => raw.url_pattern = Some(v),
            UrlMatcher::UrlPathPattern(v) => raw.url_path_pattern = Some(v),
            UrlMatcher::Any => {}
        }
        raw
    }
}

/// Exact header match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderPattern {
    pub equal_to: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub case_insensitive: bool,
}

/// Request body match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyPattern {
    EqualToJson {
        #[serde(rename = "equalToJson")]
        equal_to_json: String,
        #[serde(rename = "ignoreArrayOrder", default)]
        ignore_array_order: bool,
        #[serde(rename = "ignoreExtraElements", default)]
        ignore_extra_elements: bool,
    },
    BinaryEqualTo {
        /// Base64 of the expected bytes
        #[serde(rename = "binaryEqualTo")]
        binary_equal_to: String,
    },
    EqualTo {
        #[serde(rename = "equalTo")]
        equal_to: String,
    },
}

// ============================================================================
// Response Definition
// ============================================================================

/// Response side of a stub.
///
/// The body is kept as bytes. On the wire it is `body` when it is valid UTF-8
/// and `base64Body` otherwise; once extracted it is replaced by `bodyFileName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ResponseDefinitionRaw", into = "ResponseDefinitionRaw")]
pub struct ResponseDefinition {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub body_file_name: Option<String>,
    pub proxy_base_url: Option<String>,
}

impl ResponseDefinition {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
            body_file_name: None,
            proxy_base_url: None,
        }
    }

    pub fn ok() -> Self {
        Self::with_status(200)
    }

    /// Response that forwards to `base_url`.
    pub fn proxied_from(base_url: &str) -> Self {
        Self {
            proxy_base_url: Some(base_url.to_string()),
            ..Self::ok()
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn specifies_body_content(&self) -> bool {
        self.body.is_some()
    }

    pub fn specifies_body_file(&self) -> bool {
        self.body_file_name.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseDefinitionRaw {
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64_body: Option<String>,
    /// Structured JSON body, accepted on input only
    #[serde(default, skip_serializing)]
    json_body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy_base_url: Option<String>,
}

fn default_status() -> u16 {
    200
}

impl From<ResponseDefinitionRaw> for ResponseDefinition {
    fn from(raw: ResponseDefinitionRaw) -> Self {
        let body = decode_body(raw.body, raw.base64_body)
            .or_else(|| raw.json_body.map(|json| json.to_string().into_bytes()));

        Self {
            status: raw.status,
            headers: raw.headers,
            body,
            body_file_name: raw.body_file_name,
            proxy_base_url: raw.proxy_base_url,
        }
    }
}

impl From<ResponseDefinition> for ResponseDefinitionRaw {
    fn from(def: ResponseDefinition) -> Self {
        let (body, base64_body) = def.body.map(encode_body).unwrap_or_default();

        Self {
            status: def.status,
            headers: def.headers,
            body,
            base64_body,
            json_body: None,
            body_file_name: def.body_file_name,
            proxy_base_url: def.proxy_base_url,
        }
    }
}

/// Split body bytes into the `body` / `base64Body` wire pair.
pub(crate) fn encode_body(bytes: Vec<u8>) -> (Option<String>, Option<String>) {
    match String::from_utf8(bytes) {
        Ok(text) => (Some(text), None),
        Err(err) => (
            None,
            Some(base64::engine::general_purpose::STANDARD.encode(err.as_bytes())),
        ),
    }
}

/// Join the `body` / `base64Body` wire pair back into bytes.
pub(crate) fn decode_body(body: Option<String>, base64_body: Option<String>) -> Option<Vec<u8>> {
    if let Some(text) = body {
        return Some(text.into_bytes());
    }
    // Undecodable base64 is kept verbatim rather than dropped.
    base64_body.map(|encoded| {
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .unwrap_or_else(|_| encoded.into_bytes())
    })
}
