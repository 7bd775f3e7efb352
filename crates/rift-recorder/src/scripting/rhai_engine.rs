use super::validator::{validate_transformer, CompileError, InvokeError, TRANSFORM_FN};
use crate::recording::CapturedRequest;
use crate::stub::ResponseDefinition;
use base64::Engine as _;
use rhai::{Dynamic, Engine, Map, Scope, AST};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operation budget for one transformer call.
pub const MAX_OPERATIONS: u64 = 500_000;

/// Rhai engine for response transformers.
///
/// Scripts define `fn transform(request, response, parameters)` and return a
/// map with any of `status`, `headers` and `body`; keys that are left out keep
/// the incoming response's value.
pub struct TransformerEngine {
    engine: Engine,
}

/// A compiled transformer, cheap to clone.
#[derive(Clone)]
pub struct TransformerHandle {
    ast: Arc<AST>, // Shared between registry readers
}

impl std::fmt::Debug for TransformerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerHandle").finish_non_exhaustive()
    }
}

/// Response produced by a transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl TransformedResponse {
    /// Copy the transformed fields onto `definition`.
    pub fn apply_to(self, definition: &mut ResponseDefinition) {
        definition.status = self.status;
        definition.headers = self.headers;
        definition.body = self.body;
    }
}

impl Default for TransformerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformerEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(64);

        // JSON helpers so scripts can rewrite structured bodies
        engine.register_fn("parse_json", |text: &str| -> Dynamic {
            serde_json::from_str::<Value>(text)
                .map(json_to_dynamic)
                .unwrap_or(Dynamic::UNIT)
        });
        engine.register_fn("to_json", |value: Dynamic| -> String {
            dynamic_to_json(value).to_string()
        });

        Self { engine }
    }

    pub fn compile(&self, script: &str) -> Result<TransformerHandle, CompileError> {
        let ast = validate_transformer(&self.engine, script)?;
        Ok(TransformerHandle { ast: Arc::new(ast) })
    }

    pub fn invoke(
        &self,
        handle: &TransformerHandle,
        request: &CapturedRequest,
        response: &ResponseDefinition,
        parameters: &serde_json::Map<String, Value>,
    ) -> Result<TransformedResponse, InvokeError> {
        let mut scope = Scope::new();
        let result: Dynamic = self
            .engine
            .call_fn(
                &mut scope,
                handle.ast.as_ref(),
                TRANSFORM_FN,
                (
                    request_to_dynamic(request),
                    response_to_dynamic(response),
                    json_to_dynamic(Value::Object(parameters.clone())),
                ),
            )
            .map_err(|e| InvokeError::Runtime(e.to_string()))?;

        parse_transformed_response(result, response)
    }
}

fn request_to_dynamic(request: &CapturedRequest) -> Dynamic {
    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method.clone()));
    map.insert("url".into(), Dynamic::from(request.url.clone()));
    map.insert("headers".into(), headers_to_dynamic(&request.headers));
    map.insert(
        "body".into(),
        Dynamic::from(String::from_utf8_lossy(&request.body).into_owned()),
    );
    Dynamic::from(map)
}

/// Text bodies are passed as `body`, other bytes as `base64Body`. A response
/// without a body has neither key.
fn response_to_dynamic(response: &ResponseDefinition) -> Dynamic {
    let mut map = Map::new();
    map.insert("status".into(), Dynamic::from(i64::from(response.status)));
    map.insert("headers".into(), headers_to_dynamic(&response.headers));
    if let Some(body) = response.body.as_deref() {
        match std::str::from_utf8(body) {
            Ok(text) => {
                map.insert("body".into(), Dynamic::from(text.to_string()));
            }
            Err(_) => {
                map.insert(
                    "base64Body".into(),
                    Dynamic::from(base64::engine::general_purpose::STANDARD.encode(body)),
                );
            }
        }
    }
    Dynamic::from(map)
}

fn headers_to_dynamic(headers: &BTreeMap<String, String>) -> Dynamic {
    let mut map = Map::new();
    for (k, v) in headers {
        map.insert(k.as_str().into(), Dynamic::from(v.clone()));
    }
    Dynamic::from(map)
}

fn parse_transformed_response(
    result: Dynamic,
    original: &ResponseDefinition,
) -> Result<TransformedResponse, InvokeError> {
    let type_name = result.type_name();
    let map = result.try_cast::<Map>().ok_or_else(|| {
        InvokeError::InvalidResult(format!("expected a map, got {type_name}"))
    })?;

    let status = match map.get("status") {
        None => original.status,
        Some(v) => {
            let code = v
                .as_int()
                .map_err(|_| InvokeError::InvalidResult("status must be an integer".into()))?;
            u16::try_from(code)
                .ok()
                .filter(|c| (100..=999).contains(c))
                .ok_or_else(|| InvokeError::InvalidResult(format!("status {code} out of range")))?
        }
    };

    let headers = match map.get("headers") {
        None => original.headers.clone(),
        Some(v) => {
            let headers_map = v
                .clone()
                .try_cast::<Map>()
                .ok_or_else(|| InvokeError::InvalidResult("headers must be a map".into()))?;
            headers_map
                .into_iter()
                .map(|(key, value)| {
                    let value_str = if let Some(s) = value.clone().try_cast::<String>() {
                        s
                    } else {
                        format!("{value}")
                    };
                    (key.to_string(), value_str)
                })
                .collect()
        }
    };

    let body = if let Some(v) = map.get("body") {
        body_from_dynamic(v.clone())
    } else if let Some(v) = map.get("base64Body") {
        let encoded = v
            .clone()
            .try_cast::<String>()
            .ok_or_else(|| InvokeError::InvalidResult("base64Body must be a string".into()))?;
        Some(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| InvokeError::InvalidResult(format!("invalid base64Body: {e}")))?,
        )
    } else {
        original.body.clone()
    };

    Ok(TransformedResponse {
        status,
        headers,
        body,
    })
}

/// Strings are used as-is, `()` clears the body, anything else becomes JSON.
fn body_from_dynamic(value: Dynamic) -> Option<Vec<u8>> {
    if value.is_unit() {
        None
    } else if let Some(s) = value.clone().try_cast::<String>() {
        Some(s.into_bytes())
    } else {
        Some(dynamic_to_json(value).to_string().into_bytes())
    }
}

// Helper functions to convert between Rhai Dynamic and serde_json::Value

pub(super) fn json_to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s),
        Value::Array(arr) => {
            let vec: Vec<Dynamic> = arr.into_iter().map(json_to_dynamic).collect();
            Dynamic::from(vec)
        }
        Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

pub(super) fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
    } else if let Some(s) = value.clone().try_cast::<String>() {
        Value::String(s)
    } else if let Some(arr) = value.clone().try_cast::<Vec<Dynamic>>() {
        Value::Array(arr.into_iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        let mut obj = serde_json::Map::new();
        for (k, v) in map {
            obj.insert(k.to_string(), dynamic_to_json(v));
        }
        Value::Object(obj)
    } else {
        Value::String(format!("{value}"))
    }
}
