//! User-supplied transformer extensions.
//!
//! One registry is owned by the hosting process and passed to whatever needs
//! it. Extensions are compiled once on registration and looked up by id or by
//! name afterwards.

use super::rhai_engine::{TransformedResponse, TransformerEngine, TransformerHandle};
use super::validator::{CompileError, InvokeError};
use crate::recording::CapturedRequest;
use crate::stub::ResponseDefinition;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Extension as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    /// Name used to refer to the extension from recording specs
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub script: String,
}

impl ExtensionSpec {
    pub fn new(name: &str, script: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            script: script.to_string(),
        }
    }
}

/// A registered, compiled extension.
#[derive(Debug, Clone)]
pub struct UserExtension {
    pub id: Uuid,
    pub name: Option<String>,
    pub script: String,
    handle: TransformerHandle,
}

impl UserExtension {
    pub fn handle(&self) -> &TransformerHandle {
        &self.handle
    }
}

/// Registry of transformer extensions.
#[derive(Default)]
pub struct ExtensionRegistry {
    engine: TransformerEngine,
    extensions: RwLock<HashMap<Uuid, Arc<UserExtension>>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and store an extension, returning its new id.
    ///
    /// An extension registered under a name that is already taken replaces
    /// the previous one.
    pub fn register(&self, spec: ExtensionSpec) -> Result<Uuid, CompileError> {
        let handle = self.engine.compile(&spec.script)?;
        let extension = UserExtension {
            id: Uuid::new_v4(),
            name: spec.name.filter(|n| !n.is_empty()),
            script: spec.script,
            handle,
        };
        let id = extension.id;

        let mut extensions = self.extensions.write();
        if let Some(name) = &extension.name {
            let replaced: Vec<Uuid> = extensions
                .values()
                .filter(|e| e.name.as_ref() == Some(name))
                .map(|e| e.id)
                .collect();
            for old in replaced {
                extensions.remove(&old);
                info!("Replaced transformer extension '{}' ({})", name, old);
            }
        }
        info!(
            "Registered transformer extension {} ({})",
            id,
            extension.name.as_deref().unwrap_or("unnamed")
        );
        extensions.insert(id, Arc::new(extension));
        Ok(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<UserExtension>> {
        self.extensions.read().get(id).cloned()
    }

    /// Look up by id when `key` parses as one, otherwise by name.
    pub fn find(&self, key: &str) -> Option<Arc<UserExtension>> {
        if let Ok(id) = Uuid::parse_str(key) {
            if let Some(extension) = self.get(&id) {
                return Some(extension);
            }
        }
        self.extensions
            .read()
            .values()
            .find(|e| e.name.as_deref() == Some(key))
            .cloned()
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<UserExtension>> {
        let removed = self.extensions.write().remove(id);
        if removed.is_some() {
            info!("Removed transformer extension {}", id);
        }
        removed
    }

    /// All extensions, ordered by name then id.
    pub fn list(&self) -> Vec<Arc<UserExtension>> {
        let mut all: Vec<_> = self.extensions.read().values().cloned().collect();
        all.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.extensions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.read().is_empty()
    }

    /// Run `extension` against a response.
    pub fn transform(
        &self,
        extension: &UserExtension,
        request: &CapturedRequest,
        response: &ResponseDefinition,
        parameters: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<TransformedResponse, InvokeError> {
        self.engine
            .invoke(extension.handle(), request, response, parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPPERCASE: &str = r#"
        fn transform(request, response, parameters) {
            response.body = response.body.to_upper();
            response
        }
    "#;

    #[test]
    fn test_register_and_get() {
        let registry = ExtensionRegistry::new();
        let id = registry
            .register(ExtensionSpec::new("uppercase", UPPERCASE))
            .unwrap();

        let extension = registry.get(&id).unwrap();
        assert_eq!(extension.id, id);
        assert_eq!(extension.name.as_deref(), Some("uppercase"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_invalid_script() {
        let registry = ExtensionRegistry::new();
        let err = registry
            .register(ExtensionSpec::new("bad", "fn nothing() {}"))
            .unwrap_err();
        assert_eq!(err, CompileError::MissingFunction);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_id_or_name() {
        let registry = ExtensionRegistry::new();
        let id = registry
            .register(ExtensionSpec::new("uppercase", UPPERCASE))
            .unwrap();

        assert_eq!(registry.find("uppercase").unwrap().id, id);
        assert_eq!(registry.find(&id.to_string()).unwrap().id, id);
        assert!(registry.find("lowercase").is_none());
        assert!(registry.find(&Uuid::new_v4().to_string()).is_none());
    }

    #[test]
    fn test_same_name_replaces() {
        let registry = ExtensionRegistry::new();
        let first = registry
            .register(ExtensionSpec::new("uppercase", UPPERCASE))
            .unwrap();
        let second = registry
            .register(ExtensionSpec::new("uppercase", UPPERCASE))
            .unwrap();

        assert_ne!(first, second);
        assert!(registry.get(&first).is_none());
        assert_eq!(registry.find("uppercase").unwrap().id, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = ExtensionRegistry::new();
        let id = registry
            .register(ExtensionSpec::new("uppercase", UPPERCASE))
            .unwrap();

        assert_eq!(registry.remove(&id).unwrap().id, id);
        assert!(registry.remove(&id).is_none());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_list_is_ordered_by_name() {
        let registry = ExtensionRegistry::new();
        registry.register(ExtensionSpec::new("b", UPPERCASE)).unwrap();
        registry.register(ExtensionSpec::new("a", UPPERCASE)).unwrap();
        let names: Vec<_> = registry
            .list()
            .iter()
            .map(|e| e.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_transform() {
        let registry = ExtensionRegistry::new();
        registry
            .register(ExtensionSpec::new("uppercase", UPPERCASE))
            .unwrap();
        let extension = registry.find("uppercase").unwrap();

        let result = registry
            .transform(
                &extension,
                &CapturedRequest::new("GET", "/"),
                &ResponseDefinition::ok().with_body("quiet"),
                &serde_json::Map::new(),
            )
            .unwrap();

        assert_eq!(result.body.as_deref(), Some(&b"QUIET"[..]));
    }

    #[test]
    fn test_spec_accepts_type_alias() {
        let spec: ExtensionSpec = serde_json::from_str(
            r#"{"type": "uppercase", "script": "fn transform(a, b, c) { b }"}"#,
        )
        .unwrap();
        assert_eq!(spec.name.as_deref(), Some("uppercase"));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        let registry = Arc::new(ExtensionRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .register(ExtensionSpec::new(&format!("ext-{i}"), UPPERCASE))
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 4);
    }
}
