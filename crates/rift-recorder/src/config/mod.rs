//! Recording configuration: the user-facing spec and its resolved plan.
//!
//! A [`RecordSpec`] is what users send or write to a file; any field at any
//! depth may be missing. [`RecordSpec::resolve`] turns it into a
//! [`RecordingPlan`] where every option has a concrete value.
//!
//! The spec format has grown over time. Older files put `captureHeaders`,
//! `repeatsAsScenarios`, `jsonMatchingFlags` and `extractBodyCriteria` at the
//! top level or flat inside `generatorOptions`; current files nest them under
//! `generatorOptions.request` and `generatorOptions.response`. All of these
//! are accepted and folded into the nested form when the spec is parsed, with
//! the most deeply nested value winning.
//!
//! # Module Structure
//!
//! - `options` - request/response generation options
//! - `filters` - interaction filters
//! - `plan` - resolved plan and output format

mod filters;
mod options;
mod plan;

pub use filters::{FiltersSpec, RequestFilters, UrlRegex};
pub use options::{
    BodyExtractCriteria, BodyExtractCriteriaSpec, ByteSize, CaptureHeader, CaptureHeaderSpec,
    JsonMatchingFlags, JsonMatchingFlagsSpec, RequestOptions, RequestOptionsSpec,
    ResponseOptions, ResponseOptionsSpec, DEFAULT_BINARY_SIZE_THRESHOLD,
    DEFAULT_TEXT_SIZE_THRESHOLD,
};
pub use plan::{OutputFormat, RecordingPlan};

use crate::stub::ResponseDefinition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Parameters handed to every transformer.
pub type TransformerParameters = serde_json::Map<String, serde_json::Value>;

/// Errors raised while loading or resolving a recording spec.
///
/// Missing fields never produce an error; only explicit values that cannot be
/// used do.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid targetBaseUrl '{0}': {1}")]
    InvalidBaseUrl(String, String),

    #[error("invalid filters.urlPattern '{0}': {1}")]
    InvalidUrlPattern(String, String),

    #[error("unknown outputFormat '{0}' (expected FULL or IDS)")]
    InvalidOutputFormat(String),

    #[error("invalid size '{0}' (expected a byte count such as 10240 or \"10kb\")")]
    InvalidSize(String),

    #[error("invalid filter id '{0}': {1}")]
    InvalidFilterId(String, String),

    #[error("failed to parse recording spec: {0}")]
    Parse(String),

    #[error("failed to read recording spec {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Spec
// ============================================================================

/// Recording spec in its canonical nested shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", from = "RecordSpecWire")]
pub struct RecordSpec {
    /// Base URL of the system being recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_base_url: Option<String>,
    /// Explicit proxy response; derived from `targetBaseUrl` when missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_response: Option<ResponseDefinition>,
    /// Which interactions to record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FiltersSpec>,
    /// How to generate stubs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_options: Option<GeneratorOptionsSpec>,
    /// Transformer ids or names, applied in order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformer_parameters: Option<TransformerParameters>,
    /// Whether to write stubs to storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist: Option<bool>,
    /// `FULL` or `IDS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptionsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestOptionsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseOptionsSpec>,
}

impl RecordSpec {
    /// Spec that records everything from `target_base_url` with default options.
    pub fn for_base_url(target_base_url: &str) -> Self {
        Self {
            target_base_url: Some(target_base_url.to_string()),
            ..Default::default()
        }
    }

    /// Load a spec from a YAML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Request options, or an empty spec when none were given.
    pub fn request_options(&self) -> RequestOptionsSpec {
        self.generator_options
            .as_ref()
            .and_then(|g| g.request.clone())
            .unwrap_or_default()
    }

    /// Response options, or an empty spec when none were given.
    pub fn response_options(&self) -> ResponseOptionsSpec {
        self.generator_options
            .as_ref()
            .and_then(|g| g.response.clone())
            .unwrap_or_default()
    }
}

// ============================================================================
// Compatibility layer
// ============================================================================

/// Every shape a spec has been written in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSpecWire {
    #[serde(default)]
    target_base_url: Option<String>,
    #[serde(default)]
    proxy_response: Option<ResponseDefinition>,
    #[serde(default)]
    filters: Option<FiltersSpec>,
    #[serde(default)]
    generator_options: Option<GeneratorOptionsWire>,
    #[serde(default)]
    transformers: Option<Vec<String>>,
    #[serde(default)]
    transformer_parameters: Option<TransformerParameters>,
    #[serde(default)]
    persist: Option<bool>,
    #[serde(default)]
    output_format: Option<String>,
    /// Oldest format: request options at the top level
    #[serde(flatten)]
    legacy_request: RequestOptionsSpec,
    /// Oldest format: response options at the top level
    #[serde(flatten)]
    legacy_response: ResponseOptionsSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratorOptionsWire {
    #[serde(default)]
    request: Option<RequestOptionsSpec>,
    #[serde(default)]
    response: Option<ResponseOptionsSpec>,
    #[serde(default)]
    transformers: Option<Vec<String>>,
    #[serde(default)]
    transformer_parameters: Option<TransformerParameters>,
    #[serde(default)]
    persist: Option<bool>,
    /// Intermediate format: request options flat inside generatorOptions
    #[serde(flatten)]
    flat_request: RequestOptionsSpec,
    /// Intermediate format: response options flat inside generatorOptions
    #[serde(flatten)]
    flat_response: ResponseOptionsSpec,
}

impl From<RecordSpecWire> for RecordSpec {
    fn from(wire: RecordSpecWire) -> Self {
        let generator = wire.generator_options.unwrap_or_default();

        if !wire.legacy_request.is_empty()
            || !wire.legacy_response.is_empty()
            || !generator.flat_request.is_empty()
            || !generator.flat_response.is_empty()
        {
            tracing::debug!("Translating flat recording options into generatorOptions");
        }

        let request = generator
            .request
            .unwrap_or_default()
            .or(generator.flat_request)
            .or(wire.legacy_request);
        let response = generator
            .response
            .unwrap_or_default()
            .or(generator.flat_response)
            .or(wire.legacy_response);

        let generator_options = if request.is_empty() && response.is_empty() {
            None
        } else {
            Some(GeneratorOptionsSpec {
                request: (!request.is_empty()).then_some(request),
                response: (!response.is_empty()).then_some(response),
            })
        };

        Self {
            target_base_url: wire.target_base_url,
            proxy_response: wire.proxy_response,
            filters: wire.filters,
            generator_options,
            transformers: wire.transformers.or(generator.transformers),
            transformer_parameters: wire
                .transformer_parameters
                .or(generator.transformer_parameters),
            persist: wire.persist.or(generator.persist),
            output_format: wire.output_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_spec() {
        let yaml = r#"
targetBaseUrl: "http://api.example.com"
filters:
  urlPattern: "/api/.*"
generatorOptions:
  request:
    captureHeaders:
      Accept: {}
      X-Tenant:
        caseInsensitive: true
    repeatsAsScenarios: false
  response:
    extractBodyCriteria:
      textSizeThreshold: 2kb
persist: false
outputFormat: ids
"#;

        let spec = RecordSpec::from_yaml_str(yaml).unwrap();
        assert_eq!(spec.target_base_url.as_deref(), Some("http://api.example.com"));
        let request = spec.request_options();
        assert_eq!(request.repeats_as_scenarios, Some(false));
        assert_eq!(request.capture_headers.as_ref().unwrap().len(), 2);
        assert_eq!(
            spec.response_options()
                .extract_body_criteria
                .unwrap()
                .text_size_threshold,
            Some(ByteSize::Text("2kb".into()))
        );
        assert_eq!(spec.persist, Some(false));
        assert_eq!(spec.output_format.as_deref(), Some("ids"));
    }

    #[test]
    fn test_empty_spec_parses() {
        let spec = RecordSpec::from_json_str("{}").unwrap();
        assert_eq!(spec, RecordSpec::default());
    }

    #[test]
    fn test_legacy_top_level_fields_move_into_generator_options() {
        let legacy = RecordSpec::from_json_str(
            r#"{
                "captureHeaders": {"Accept": {}},
                "repeatsAsScenarios": false,
                "extractBodyCriteria": {"binarySizeThreshold": 100}
            }"#,
        )
        .unwrap();
        let nested = RecordSpec::from_json_str(
            r#"{
                "generatorOptions": {
                    "request": {"captureHeaders": {"Accept": {}}, "repeatsAsScenarios": false},
                    "response": {"extractBodyCriteria": {"binarySizeThreshold": 100}}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(legacy, nested);
    }

    #[test]
    fn test_flat_generator_options_move_into_request_and_response() {
        let spec = RecordSpec::from_json_str(
            r#"{
                "generatorOptions": {
                    "repeatsAsScenarios": false,
                    "jsonMatchingFlags": {"ignoreArrayOrder": false},
                    "transformers": ["strip-dates"],
                    "persist": false
                }
            }"#,
        )
        .unwrap();
        let request = spec.request_options();
        assert_eq!(request.repeats_as_scenarios, Some(false));
        assert_eq!(
            request.json_matching_flags.unwrap().ignore_array_order,
            Some(false)
        );
        assert_eq!(spec.transformers, Some(vec!["strip-dates".to_string()]));
        assert_eq!(spec.persist, Some(false));
    }

    #[test]
    fn test_nested_value_beats_flat_values() {
        let spec = RecordSpec::from_json_str(
            r#"{
                "repeatsAsScenarios": true,
                "generatorOptions": {
                    "repeatsAsScenarios": true,
                    "request": {"repeatsAsScenarios": false}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(spec.request_options().repeats_as_scenarios, Some(false));
    }

    #[test]
    fn test_flat_generator_option_beats_top_level() {
        let spec = RecordSpec::from_json_str(
            r#"{
                "captureHeaders": {"Accept": {}},
                "generatorOptions": {"captureHeaders": {"Authorization": {}}}
            }"#,
        )
        .unwrap();
        let headers = spec.request_options().capture_headers.unwrap();
        assert!(headers.contains_key("Authorization"));
        assert!(!headers.contains_key("Accept"));
    }

    #[test]
    fn test_top_level_persist_beats_generator_options() {
        let spec = RecordSpec::from_json_str(
            r#"{"persist": true, "generatorOptions": {"persist": false}}"#,
        )
        .unwrap();
        assert_eq!(spec.persist, Some(true));
    }

    #[test]
    fn test_serializes_canonical_shape() {
        let spec = RecordSpec::from_json_str(r#"{"repeatsAsScenarios": false}"#).unwrap();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "generatorOptions": {"request": {"repeatsAsScenarios": false}}
            })
        );
    }

    #[test]
    fn test_parse_error() {
        let err = RecordSpec::from_json_str(r#"{"persist": "sometimes"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.yaml");
        std::fs::write(&path, "targetBaseUrl: http://localhost:9000\n").unwrap();
        let spec = RecordSpec::from_file(&path).unwrap();
        assert_eq!(spec, RecordSpec::for_base_url("http://localhost:9000"));

        let missing = RecordSpec::from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
