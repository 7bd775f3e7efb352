//! Resolved recording plan.

use super::{
    ConfigError, FiltersSpec, GeneratorOptionsSpec, RecordSpec, RequestFilters, RequestOptions,
    ResponseOptions, TransformerParameters,
};
use crate::stub::ResponseDefinition;
use http::uri::{InvalidUri, Uri};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What a recording returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The generated stubs
    #[default]
    Full,
    /// Only the generated stub ids
    Ids,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL" => Ok(OutputFormat::Full),
            "IDS" => Ok(OutputFormat::Ids),
            _ => Err(ConfigError::InvalidOutputFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Full => write!(f, "FULL"),
            OutputFormat::Ids => write!(f, "IDS"),
        }
    }
}

/// A recording spec with every option decided.
///
/// Serializes as a fully populated [`RecordSpec`], so a serialized plan can be
/// read back and resolved to the same plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "RecordSpec")]
pub struct RecordingPlan {
    pub target_base_url: Option<String>,
    /// Response used to proxy unmatched requests while recording; `None`
    /// records from already captured traffic only
    pub proxy_response_template: Option<ResponseDefinition>,
    pub filters: RequestFilters,
    pub request_options: RequestOptions,
    pub response_options: ResponseOptions,
    /// Transformer ids or names, in application order
    pub transformers: Vec<String>,
    pub transformer_parameters: TransformerParameters,
    pub persist: bool,
    pub output_format: OutputFormat,
}

impl Default for RecordingPlan {
    fn default() -> Self {
        Self {
            target_base_url: None,
            proxy_response_template: None,
            filters: RequestFilters::default(),
            request_options: RequestOptions::default(),
            response_options: ResponseOptions::default(),
            transformers: Vec::new(),
            transformer_parameters: TransformerParameters::new(),
            persist: true,
            output_format: OutputFormat::Full,
        }
    }
}

impl RecordSpec {
    /// Resolve every missing field to its default.
    ///
    /// Fails only when a value that is present cannot be used.
    pub fn resolve(&self) -> Result<RecordingPlan, ConfigError> {
        if let Some(url) = &self.target_base_url {
            validate_base_url(url)?;
        }

        let proxy_response_template = match (&self.proxy_response, &self.target_base_url) {
            (Some(explicit), _) => Some(explicit.clone()),
            (None, Some(url)) => Some(ResponseDefinition::proxied_from(url)),
            (None, None) => None,
        };

        let output_format = match &self.output_format {
            Some(format) => format.parse()?,
            None => OutputFormat::default(),
        };

        let plan = RecordingPlan {
            target_base_url: self.target_base_url.clone(),
            proxy_response_template,
            filters: self.filters.clone().unwrap_or_default().resolve()?,
            request_options: self.request_options().resolve(),
            response_options: self.response_options().resolve()?,
            transformers: self.transformers.clone().unwrap_or_default(),
            transformer_parameters: self.transformer_parameters.clone().unwrap_or_default(),
            persist: self.persist.unwrap_or(true),
            output_format,
        };

        tracing::debug!(
            "Resolved recording plan: persist={}, repeats_as_scenarios={}, output_format={}, transformers={}",
            plan.persist,
            plan.request_options.repeats_as_scenarios,
            plan.output_format,
            plan.transformers.len()
        );

        Ok(plan)
    }
}

impl From<RecordingPlan> for RecordSpec {
    fn from(plan: RecordingPlan) -> Self {
        RecordSpec {
            target_base_url: plan.target_base_url,
            proxy_response: plan.proxy_response_template,
            filters: Some(plan.filters.to_spec()),
            generator_options: Some(GeneratorOptionsSpec {
                request: Some(plan.request_options.to_spec()),
                response: Some(plan.response_options.to_spec()),
            }),
            transformers: Some(plan.transformers),
            transformer_parameters: Some(plan.transformer_parameters),
            persist: Some(plan.persist),
            output_format: Some(plan.output_format.to_string()),
        }
    }
}

/// Accept absolute `http` and `https` URLs with a host.
fn validate_base_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl(url.to_string(), reason.to_string());

    let uri: Uri = url.parse().map_err(|e: InvalidUri| invalid(&e.to_string()))?;

    match uri.scheme_str() {
        Some(scheme)
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {}
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("missing scheme")),
    }

    let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
    if authority.host().is_empty() {
        return Err(invalid("missing host"));
    }
    // `port_u16` quietly yields None for ports that are not a u16
    let after_host = authority
        .as_str()
        .rsplit_once(authority.host())
        .map_or("", |(_, rest)| rest);
    if !after_host.is_empty() && authority.port_u16().is_none() {
        return Err(invalid("invalid port"));
    }

    if let Some(path_and_query) = uri.path_and_query() {
        if has_malformed_escape(path_and_query.as_str()) {
            return Err(invalid("malformed percent-encoding"));
        }
    }

    Ok(())
}

/// Whether some `%` is not followed by two hex digits.
fn has_malformed_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().any(|(i, b)| {
        *b == b'%'
            && !bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit))
    })
}
