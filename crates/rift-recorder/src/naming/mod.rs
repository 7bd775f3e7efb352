//! File names for recorded stubs and their extracted bodies.
//!
//! Both names share a prefix derived from the stub: its display name when it
//! has one, nothing for a match-anything URL matcher, otherwise the path of
//! the matcher's expected URL. The stub file is then disambiguated by the stub
//! id and the body file by a fingerprint of the body bytes, so re-recording
//! unchanged content lands on the same body file while different stubs and
//! different bodies never collide.
//!
//! # Module Structure
//!
//! - `slug` - text to slug encoding
//! - `content_type` - body file extensions

mod content_type;
mod slug;

pub use content_type::{
    determine_file_extension, determine_text_file_extension, is_binary_body, mime_type_part,
    DEFAULT_EXTENSION,
};
pub use slug::{make_safe_name, make_safe_name_from_url, MAX_SLUG_LEN};

use crate::fingerprint::fingerprint_hex;
use crate::stub::{StubArtifact, UrlMatcher};
use http::Uri;
use slug::sanitise;
use std::borrow::Cow;

/// `<slug>-<id>.json`, or `<id>.json` when the slug is empty.
pub fn stub_file_name(stub: &StubArtifact) -> String {
    with_prefix(&name_prefix(stub), &format!("{}.json", stub.id))
}

/// `<slug>-<fingerprint>.<ext>`, or `<fingerprint>.<ext>` when the slug is empty.
///
/// A stub without a body names the empty body. Only an exact URL or path
/// matcher contributes a file suffix to the extension; a regex never does.
pub fn body_file_name(stub: &StubArtifact) -> String {
    let body = stub.response.body.as_deref().unwrap_or_default();
    let extension = determine_file_extension(
        stub.request.url_matcher.exact_url().unwrap_or_default(),
        stub.response.content_type(),
        body,
    );
    let suffix = format!("{}.{}", fingerprint_hex(body), extension);
    with_prefix(&name_prefix(stub), &suffix)
}

/// Slug for the path of a URL; scheme, host, query and fragment are ignored.
///
/// Percent escapes are not decoded, so `/search%20results` becomes
/// `search20results`.
pub fn slug_from_url(url: &str) -> String {
    slug_from_pattern(&url_path(url))
}

/// Slug for a URL regex. The whole pattern is kept, since `?` there is a
/// quantifier and not the start of a query.
///
/// `/named/([0-9]*)/things` becomes `named0-9things`.
pub fn slug_from_pattern(pattern: &str) -> String {
    make_safe_name(&sanitise(pattern))
}

fn name_prefix(stub: &StubArtifact) -> String {
    if let Some(name) = stub.name.as_deref().filter(|n| !n.is_empty()) {
        return make_safe_name(name);
    }
    match &stub.request.url_matcher {
        // Kept as-is for compatibility with existing recordings.
        UrlMatcher::Any => String::new(),
        UrlMatcher::Url(url) | UrlMatcher::UrlPath(url) => slug_from_url(url),
        UrlMatcher::UrlPattern(pattern) | UrlMatcher::UrlPathPattern(pattern) => {
            slug_from_pattern(pattern)
        }
    }
}

fn with_prefix(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{prefix}-{suffix}")
    }
}

/// Path component of an absolute URL or an origin-form `/path?query`.
///
/// Anything that does not parse as one of those is returned whole.
pub(crate) fn url_path(url: &str) -> Cow<'_, str> {
    match url.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() || url.starts_with('/') => {
            Cow::Owned(uri.path().to_string())
        }
        _ => Cow::Borrowed(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{RequestPattern, ResponseDefinition};
    use proptest::prelude::*;
    use uuid::Uuid;

    const TEST_BODY: &[u8] = b"[1]";
    const TEST_BODY_FINGERPRINT: &str = "180e7070d8425721";

    fn stub(matcher: UrlMatcher, response: ResponseDefinition) -> StubArtifact {
        StubArtifact::new(RequestPattern::new("GET", matcher), response)
    }

    fn ok_body(body: &[u8]) -> ResponseDefinition {
        ResponseDefinition::ok().with_body(body.to_vec())
    }

    #[test]
    fn test_stub_name_from_display_name() {
        let mut s = stub(UrlMatcher::Url("/named".into()), ResponseDefinition::ok());
        s.name = Some("This is a NAMED stub".into());
        assert_eq!(stub_file_name(&s), format!("this-is-a-named-stub-{}.json", s.id));
    }

    #[test]
    fn test_stub_name_from_url_when_unnamed() {
        let s = stub(
            UrlMatcher::UrlPattern("/named/([0-9]*)/things".into()),
            ResponseDefinition::ok(),
        );
        assert_eq!(stub_file_name(&s), format!("named0-9things-{}.json", s.id));
    }

    #[test]
    fn test_stub_name_for_any_url_is_just_id() {
        let s = stub(UrlMatcher::Any, ResponseDefinition::ok());
        assert_eq!(stub_file_name(&s), format!("{}.json", s.id));
    }

    #[test]
    fn test_empty_display_name_falls_back_to_url() {
        let mut s = stub(UrlMatcher::Url("/orders".into()), ResponseDefinition::ok());
        s.name = Some(String::new());
        assert_eq!(stub_file_name(&s), format!("orders-{}.json", s.id));
    }

    #[test]
    fn test_unrepresentable_display_name_gives_bare_id() {
        let mut s = stub(UrlMatcher::Url("/orders".into()), ResponseDefinition::ok());
        s.name = Some("😀😀".into());
        assert_eq!(stub_file_name(&s), format!("{}.json", s.id));
    }

    #[test]
    fn test_body_name_with_json_url_extension() {
        let s = stub(UrlMatcher::Url("/foo/bar.json".into()), ok_body(TEST_BODY));
        assert_eq!(
            body_file_name(&s),
            format!("foobarjson-{TEST_BODY_FINGERPRINT}.json")
        );
    }

    #[test]
    fn test_body_name_with_txt_url_extension() {
        let s = stub(UrlMatcher::Url("/foo/bar.txt".into()), ok_body(TEST_BODY));
        assert_eq!(
            body_file_name(&s),
            format!("foobartxt-{TEST_BODY_FINGERPRINT}.txt")
        );
    }

    #[test]
    fn test_body_name_with_json_content_type() {
        let s = stub(
            UrlMatcher::Url("/foo.txt".into()),
            ok_body(TEST_BODY).with_header("Content-Type", "application/json"),
        );
        assert_eq!(body_file_name(&s), format!("footxt-{TEST_BODY_FINGERPRINT}.json"));
    }

    #[test]
    fn test_body_name_with_xml_content_type() {
        let s = stub(
            UrlMatcher::Url("/foo.txt".into()),
            ok_body(TEST_BODY).with_header("content-type", "application/xml"),
        );
        assert_eq!(body_file_name(&s), format!("footxt-{TEST_BODY_FINGERPRINT}.xml"));
    }

    #[test]
    fn test_body_name_with_display_name() {
        let mut s = stub(UrlMatcher::Url("/foo".into()), ok_body(TEST_BODY));
        s.name = Some("TEST NAME!".into());
        assert_eq!(body_file_name(&s), format!("test-name-{TEST_BODY_FINGERPRINT}.json"));
    }

    #[test]
    fn test_body_name_for_any_url_has_no_prefix() {
        let s = stub(UrlMatcher::Any, ok_body(TEST_BODY));
        assert_eq!(body_file_name(&s), format!("{TEST_BODY_FINGERPRINT}.json"));
    }

    #[test]
    fn test_body_name_is_stable_and_ignores_id() {
        let a = stub(UrlMatcher::Url("/foo".into()), ok_body(b"same"));
        let b = stub(UrlMatcher::Url("/foo".into()), ok_body(b"same"));
        assert_ne!(a.id, b.id);
        assert_eq!(body_file_name(&a), body_file_name(&b));
        assert_eq!(body_file_name(&a), body_file_name(&a));
        assert_ne!(stub_file_name(&a), stub_file_name(&b));
    }

    #[test]
    fn test_slug_from_url_uses_path_only() {
        assert_eq!(slug_from_url("https://api.example.com:8443/v1/users?page=2#top"), "v1users");
        assert_eq!(slug_from_url("http://example.com"), "");
        assert_eq!(slug_from_url("/orders?status=open"), "orders");
    }

    #[test]
    fn test_slug_from_url_keeps_escapes_undecoded() {
        assert_eq!(slug_from_url("/search%20results"), "search20results");
        assert_eq!(slug_from_url("/caf%C3%A9/menu"), "cafc3a9menu");
    }

    #[test]
    fn test_regex_matchers_keep_whole_pattern() {
        for (pattern, expected) in [
            ("/colou?r/items", "colouritems"),
            ("/api/.*?/orders", "apiorders"),
            ("/search\\?q=.*", "searchq"),
        ] {
            let s = stub(UrlMatcher::UrlPattern(pattern.into()), ResponseDefinition::ok());
            assert_eq!(stub_file_name(&s), format!("{expected}-{}.json", s.id), "{pattern}");
            let s = stub(UrlMatcher::UrlPathPattern(pattern.into()), ResponseDefinition::ok());
            assert_eq!(stub_file_name(&s), format!("{expected}-{}.json", s.id), "{pattern}");
        }
    }

    #[test]
    fn test_regex_matcher_does_not_pick_body_extension() {
        let s = stub(UrlMatcher::UrlPattern("/files/.*\\.csv".into()), ok_body(TEST_BODY));
        assert_eq!(body_file_name(&s), format!("filescsv-{TEST_BODY_FINGERPRINT}.json"));

        let s = stub(UrlMatcher::UrlPath("/files/report.csv".into()), ok_body(TEST_BODY));
        assert_eq!(
            body_file_name(&s),
            format!("filesreportcsv-{TEST_BODY_FINGERPRINT}.csv")
        );
    }

    #[test]
    fn test_url_path() {
        assert_eq!(url_path("/a/b?c=d"), "/a/b");
        assert_eq!(url_path("http://host/a#frag"), "/a");
        assert_eq!(url_path("http://host"), "/");
        assert_eq!(url_path("orders"), "orders");
        assert_eq!(url_path(""), "");
    }

    #[test]
    fn test_long_url_slug_is_truncated() {
        let url = format!("/{}", "segment".repeat(60));
        let s = stub(UrlMatcher::Url(url), ResponseDefinition::ok());
        let name = stub_file_name(&s);
        let prefix = name.strip_suffix(&format!("-{}.json", s.id)).unwrap();
        assert_eq!(prefix.len(), MAX_SLUG_LEN);
    }

    proptest! {
        #[test]
        fn prop_distinct_bodies_get_distinct_names(
            a in proptest::collection::vec(any::<u8>(), 0..512),
            b in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            prop_assume!(a != b);
            let first = stub(UrlMatcher::Url("/payload".into()), ok_body(&a));
            let second = stub(UrlMatcher::Url("/payload".into()), ok_body(&b));
            let first_name = body_file_name(&first);
            let second_name = body_file_name(&second);
            // Extensions may differ when one body sniffs as JSON; compare the digests.
            let digest = |n: &str| n.trim_start_matches("payload-")[..16].to_string();
            prop_assert_ne!(digest(&first_name), digest(&second_name));
        }

        #[test]
        fn prop_names_are_filesystem_safe(name in any::<String>(), url in any::<String>()) {
            let mut s = stub(UrlMatcher::Url(url), ResponseDefinition::ok());
            s.name = Some(name);
            let file = stub_file_name(&s);
            prop_assert!(file.ends_with(".json"));
            prop_assert!(!file.contains('/'));
            prop_assert!(file
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        }
    }
}
