//! Request and response generation options.
//!
//! Each option exists twice: a `*Spec` type where every field may be missing
//! (what users write) and a resolved type where every field is concrete
//! (what the recorder reads).

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text bodies larger than this are extracted to files by default.
pub const DEFAULT_TEXT_SIZE_THRESHOLD: u64 = 10 * 1024;
/// Binary bodies larger than this are extracted to files by default.
pub const DEFAULT_BINARY_SIZE_THRESHOLD: u64 = 0;

// ============================================================================
// Request options
// ============================================================================

/// Options for generating the request side of stubs
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptionsSpec {
    /// Request headers to copy into the stub's request pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_headers: Option<BTreeMap<String, CaptureHeaderSpec>>,
    /// Record repeated requests as scenario steps instead of dropping them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats_as_scenarios: Option<bool>,
    /// Flags for JSON request body patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_matching_flags: Option<JsonMatchingFlagsSpec>,
}

impl RequestOptionsSpec {
    /// Fill gaps in `self` from `fallback`; fields already set are kept.
    pub(crate) fn or(self, fallback: RequestOptionsSpec) -> Self {
        Self {
            capture_headers: self.capture_headers.or(fallback.capture_headers),
            repeats_as_scenarios: self.repeats_as_scenarios.or(fallback.repeats_as_scenarios),
            json_matching_flags: self.json_matching_flags.or(fallback.json_matching_flags),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn resolve(&self) -> RequestOptions {
        RequestOptions {
            capture_headers: self
                .capture_headers
                .as_ref()
                .map(|headers| {
                    headers
                        .iter()
                        .map(|(name, spec)| (name.clone(), spec.resolve()))
                        .collect()
                })
                .unwrap_or_default(),
            repeats_as_scenarios: self.repeats_as_scenarios.unwrap_or(true),
            json_matching_flags: self
                .json_matching_flags
                .clone()
                .unwrap_or_default()
                .resolve(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureHeaderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_insensitive: Option<bool>,
}

impl CaptureHeaderSpec {
    pub fn resolve(&self) -> CaptureHeader {
        CaptureHeader {
            case_insensitive: self.case_insensitive.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonMatchingFlagsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_array_order: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_extra_elements: Option<bool>,
}

impl JsonMatchingFlagsSpec {
    pub fn resolve(&self) -> JsonMatchingFlags {
        JsonMatchingFlags {
            ignore_array_order: self.ignore_array_order.unwrap_or(true),
            ignore_extra_elements: self.ignore_extra_elements.unwrap_or(true),
        }
    }
}

/// Resolved request options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub capture_headers: BTreeMap<String, CaptureHeader>,
    pub repeats_as_scenarios: bool,
    pub json_matching_flags: JsonMatchingFlags,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptionsSpec::default().resolve()
    }
}

impl RequestOptions {
    /// Fully populated spec that resolves back to these options.
    pub fn to_spec(&self) -> RequestOptionsSpec {
        RequestOptionsSpec {
            capture_headers: Some(
                self.capture_headers
                    .iter()
                    .map(|(name, header)| {
                        let spec = CaptureHeaderSpec {
                            case_insensitive: Some(header.case_insensitive),
                        };
                        (name.clone(), spec)
                    })
                    .collect(),
            ),
            repeats_as_scenarios: Some(self.repeats_as_scenarios),
            json_matching_flags: Some(JsonMatchingFlagsSpec {
                ignore_array_order: Some(self.json_matching_flags.ignore_array_order),
                ignore_extra_elements: Some(self.json_matching_flags.ignore_extra_elements),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureHeader {
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonMatchingFlags {
    pub ignore_array_order: bool,
    pub ignore_extra_elements: bool,
}

// ============================================================================
// Response options
// ============================================================================

/// Options for generating the response side of stubs
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOptionsSpec {
    /// When to move response bodies out of the stub into separate files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_body_criteria: Option<BodyExtractCriteriaSpec>,
}

impl ResponseOptionsSpec {
    pub(crate) fn or(self, fallback: ResponseOptionsSpec) -> Self {
        Self {
            extract_body_criteria: self.extract_body_criteria.or(fallback.extract_body_criteria),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn resolve(&self) -> Result<ResponseOptions, ConfigError> {
        Ok(ResponseOptions {
            extract_body_criteria: self
                .extract_body_criteria
                .clone()
                .unwrap_or_default()
                .resolve()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyExtractCriteriaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size_threshold: Option<ByteSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_size_threshold: Option<ByteSize>,
}

impl BodyExtractCriteriaSpec {
    pub fn resolve(&self) -> Result<BodyExtractCriteria, ConfigError> {
        let text_size_threshold = match &self.text_size_threshold {
            Some(size) => size.to_bytes()?,
            None => DEFAULT_TEXT_SIZE_THRESHOLD,
        };
        let binary_size_threshold = match &self.binary_size_threshold {
            Some(size) => size.to_bytes()?,
            None => DEFAULT_BINARY_SIZE_THRESHOLD,
        };
        Ok(BodyExtractCriteria {
            text_size_threshold,
            binary_size_threshold,
        })
    }
}

/// Resolved response options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseOptions {
    pub extract_body_criteria: BodyExtractCriteria,
}

impl ResponseOptions {
    pub fn to_spec(&self) -> ResponseOptionsSpec {
        let criteria = self.extract_body_criteria;
        ResponseOptionsSpec {
            extract_body_criteria: Some(BodyExtractCriteriaSpec {
                text_size_threshold: Some(ByteSize::Bytes(criteria.text_size_threshold)),
                binary_size_threshold: Some(ByteSize::Bytes(criteria.binary_size_threshold)),
            }),
        }
    }
}

/// Body size thresholds in bytes; a body strictly larger than its threshold
/// is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyExtractCriteria {
    pub text_size_threshold: u64,
    pub binary_size_threshold: u64,
}

impl Default for BodyExtractCriteria {
    fn default() -> Self {
        Self {
            text_size_threshold: DEFAULT_TEXT_SIZE_THRESHOLD,
            binary_size_threshold: DEFAULT_BINARY_SIZE_THRESHOLD,
        }
    }
}

impl BodyExtractCriteria {
    /// Whether a body of `len` bytes should live in its own file.
    pub fn should_extract(&self, len: usize, binary: bool) -> bool {
        let threshold = if binary {
            self.binary_size_threshold
        } else {
            self.text_size_threshold
        };
        len as u64 > threshold
    }
}

/// A size written either as a plain byte count or as text like `"10kb"` / `"1 MB"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ByteSize {
    Bytes(u64),
    Text(String),
}

impl ByteSize {
    pub fn to_bytes(&self) -> Result<u64, ConfigError> {
        match self {
            ByteSize::Bytes(n) => Ok(*n),
            ByteSize::Text(text) => parse_byte_size(text),
        }
    }
}

fn parse_byte_size(text: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSize(text.to_string());
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };
    value.checked_mul(multiplier).ok_or_else(invalid)
}
