//! Stub generation from captured interactions.

use super::CapturedInteraction;
use crate::config::RequestOptions;
use crate::stub::{BodyPattern, HeaderPattern, RequestPattern, ResponseDefinition, StubArtifact, UrlMatcher};
use base64::Engine as _;
use tracing::debug;

/// Response headers that describe the original connection, not the content.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "content-length",
];

/// Build a stub that replays `interaction`.
///
/// The stub matches the exact method and URL, the headers listed in
/// `captureHeaders`, and the request body if there was one. Its id is the
/// interaction id.
pub fn generate_stub(interaction: &CapturedInteraction, options: &RequestOptions) -> StubArtifact {
    let request = &interaction.request;
    let mut pattern = RequestPattern::new(&request.method, UrlMatcher::Url(request.url.clone()));

    for (name, capture) in &options.capture_headers {
        if let Some(value) = request.header(name) {
            pattern.headers.insert(
                name.clone(),
                HeaderPattern {
                    equal_to: value.to_string(),
                    case_insensitive: capture.case_insensitive,
                },
            );
        }
    }

    if !request.body.is_empty() {
        pattern.body_patterns.push(body_pattern(&request.body, options));
    }

    let captured = &interaction.response;
    let mut response = ResponseDefinition::with_status(captured.status);
    response.headers = captured
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if !captured.body.is_empty() {
        response.body = Some(captured.body.clone());
    }

    debug!(
        "Generated stub {} for {} {} ({} header patterns)",
        interaction.id,
        request.method,
        request.url,
        pattern.headers.len()
    );

    StubArtifact::with_id(interaction.id, pattern, response)
}

fn body_pattern(body: &[u8], options: &RequestOptions) -> BodyPattern {
    match std::str::from_utf8(body) {
        Ok(text) if serde_json::from_str::<serde_json::Value>(text).is_ok() => {
            let flags = options.json_matching_flags;
            BodyPattern::EqualToJson {
                equal_to_json: text.to_string(),
                ignore_array_order: flags.ignore_array_order,
                ignore_extra_elements: flags.ignore_extra_elements,
            }
        }
        Ok(text) => BodyPattern::EqualTo {
            equal_to: text.to_string(),
        },
        Err(_) => BodyPattern::BinaryEqualTo {
            binary_equal_to: base64::engine::general_purpose::STANDARD.encode(body),
        },
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureHeader, RequestOptionsSpec};
    use crate::recording::{CapturedRequest, CapturedResponse};

    fn options_capturing(headers: &[(&str, bool)]) -> RequestOptions {
        let mut options = RequestOptionsSpec::default().resolve();
        for (name, case_insensitive) in headers {
            options.capture_headers.insert(
                name.to_string(),
                CaptureHeader {
                    case_insensitive: *case_insensitive,
                },
            );
        }
        options
    }

    #[test]
    fn test_generates_exact_url_stub() {
        let interaction = CapturedInteraction::new(
            CapturedRequest::new("get", "/users?page=2"),
            CapturedResponse::new(200)
                .with_header("Content-Type", "application/json")
                .with_body(r#"[{"id":1}]"#),
        );

        let stub = generate_stub(&interaction, &RequestOptions::default());

        assert_eq!(stub.id, interaction.id);
        assert_eq!(stub.request.method, "GET");
        assert_eq!(
            stub.request.url_matcher,
            UrlMatcher::Url("/users?page=2".into())
        );
        assert!(stub.request.headers.is_empty());
        assert!(stub.request.body_patterns.is_empty());
        assert_eq!(stub.response.status, 200);
        assert_eq!(stub.response.content_type(), Some("application/json"));
        assert_eq!(stub.response.body.as_deref(), Some(&br#"[{"id":1}]"#[..]));
    }

    #[test]
    fn test_captures_only_configured_headers() {
        let interaction = CapturedInteraction::new(
            CapturedRequest::new("GET", "/")
                .with_header("accept", "text/plain")
                .with_header("X-Request-Id", "abc"),
            CapturedResponse::new(204),
        );
        let options = options_capturing(&[("Accept", true), ("Authorization", false)]);

        let stub = generate_stub(&interaction, &options);

        assert_eq!(stub.request.headers.len(), 1);
        let accept = &stub.request.headers["Accept"];
        assert_eq!(accept.equal_to, "text/plain");
        assert!(accept.case_insensitive);
        assert!(stub.response.body.is_none());
    }

    #[test]
    fn test_json_body_pattern_uses_flags() {
        let interaction = CapturedInteraction::new(
            CapturedRequest::new("POST", "/orders").with_body(r#"{"items":[1,2]}"#),
            CapturedResponse::new(201),
        );
        let mut options = RequestOptions::default();
        options.json_matching_flags.ignore_extra_elements = false;

        let stub = generate_stub(&interaction, &options);

        assert_eq!(
            stub.request.body_patterns,
            vec![BodyPattern::EqualToJson {
                equal_to_json: r#"{"items":[1,2]}"#.into(),
                ignore_array_order: true,
                ignore_extra_elements: false,
            }]
        );
    }

    #[test]
    fn test_text_and_binary_body_patterns() {
        let options = RequestOptions::default();
        assert_eq!(
            body_pattern(b"name=rift", &options),
            BodyPattern::EqualTo {
                equal_to: "name=rift".into()
            }
        );
        assert_eq!(
            body_pattern(&[0xff, 0xfe], &options),
            BodyPattern::BinaryEqualTo {
                binary_equal_to: "//4=".into()
            }
        );
    }

    #[test]
    fn test_drops_hop_by_hop_headers() {
        let interaction = CapturedInteraction::new(
            CapturedRequest::new("GET", "/"),
            CapturedResponse::new(200)
                .with_header("Transfer-Encoding", "chunked")
                .with_header("Connection", "keep-alive")
                .with_header("Content-Length", "5")
                .with_header("Content-Type", "text/plain")
                .with_body("hello"),
        );

        let stub = generate_stub(&interaction, &RequestOptions::default());

        assert_eq!(stub.response.headers.len(), 1);
        assert_eq!(stub.response.content_type(), Some("text/plain"));
    }
}
