//! Which captured interactions a recording turns into stubs.

use super::ConfigError;
use crate::recording::CapturedInteraction;
use crate::stub::ANY_METHOD;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filters as written by users; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersSpec {
    /// Only record this method (`ANY` or missing records all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Only record requests whose URL (path and query) matches this regex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    /// Only record these interaction ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Also record requests that were served locally rather than proxied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_non_proxied: Option<bool>,
}

impl FiltersSpec {
    pub fn resolve(&self) -> Result<RequestFilters, ConfigError> {
        let url_pattern = self
            .url_pattern
            .as_deref()
            .map(UrlRegex::new)
            .transpose()?;

        let ids = self
            .ids
            .as_ref()
            .map(|ids| {
                ids.iter()
                    .map(|id| {
                        Uuid::parse_str(id.trim())
                            .map_err(|e| ConfigError::InvalidFilterId(id.clone(), e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(RequestFilters {
            method: self
                .method
                .as_deref()
                .map(str::to_uppercase)
                .filter(|m| m != ANY_METHOD),
            url_pattern,
            ids,
            allow_non_proxied: self.allow_non_proxied.unwrap_or(false),
        })
    }
}

/// Resolved filters. The default matches every proxied interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilters {
    pub method: Option<String>,
    pub url_pattern: Option<UrlRegex>,
    pub ids: Option<Vec<Uuid>>,
    pub allow_non_proxied: bool,
}

impl RequestFilters {
    /// Fully populated spec that resolves back to these filters.
    pub fn to_spec(&self) -> FiltersSpec {
        FiltersSpec {
            method: Some(self.method.clone().unwrap_or_else(|| ANY_METHOD.to_string())),
            url_pattern: self.url_pattern.as_ref().map(|p| p.as_str().to_string()),
            ids: self
                .ids
                .as_ref()
                .map(|ids| ids.iter().map(Uuid::to_string).collect()),
            allow_non_proxied: Some(self.allow_non_proxied),
        }
    }

    pub fn matches(&self, interaction: &CapturedInteraction) -> bool {
        if !self.allow_non_proxied && !interaction.was_proxied {
            return false;
        }
        if let Some(method) = &self.method {
            if !interaction.request.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(pattern) = &self.url_pattern {
            if !pattern.is_match(&interaction.request.url) {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&interaction.id) {
                return false;
            }
        }
        true
    }
}

/// Compiled URL regex, compared by its source text.
#[derive(Debug, Clone)]
pub struct UrlRegex {
    source: String,
    anchored: Regex,
}

impl UrlRegex {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |e: regex::Error| {
            ConfigError::InvalidUrlPattern(pattern.to_string(), e.to_string())
        };
        Regex::new(pattern).map_err(invalid)?;
        // The whole URL must match, not a substring.
        let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(invalid)?;
        Ok(Self {
            source: pattern.to_string(),
            anchored,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }
}

impl PartialEq for UrlRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for UrlRegex {}
