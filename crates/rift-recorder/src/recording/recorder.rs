//! The recording pipeline.

use super::body_extractor::extract_body;
use super::scenarios::process_scenarios;
use super::store::{ArtifactStore, StoreError};
use super::stub_generator::generate_stub;
use super::CapturedInteraction;
use crate::config::{OutputFormat, RecordingPlan};
use crate::naming::stub_file_name;
use crate::scripting::{ExtensionRegistry, InvokeError, UserExtension};
use crate::stub::StubArtifact;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unknown transformer '{0}'")]
    UnknownTransformer(String),

    #[error("transformer '{name}' failed on stub {stub_id}: {source}")]
    Transformer {
        name: String,
        stub_id: Uuid,
        #[source]
        source: InvokeError,
    },

    #[error("interaction id {0} appears more than once")]
    DuplicateInteractionId(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a recording returns, shaped by the plan's output format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RecordResult {
    #[serde(rename = "mappings")]
    Full(Vec<StubArtifact>),
    #[serde(rename = "ids")]
    Ids(Vec<Uuid>),
}

impl RecordResult {
    pub fn len(&self) -> usize {
        match self {
            RecordResult::Full(stubs) => stubs.len(),
            RecordResult::Ids(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<Uuid> {
        match self {
            RecordResult::Full(stubs) => stubs.iter().map(|s| s.id).collect(),
            RecordResult::Ids(ids) => ids.clone(),
        }
    }
}

/// Turns captured interactions into stubs under a [`RecordingPlan`].
///
/// Stub files go to `mappings` and extracted bodies to `files`.
pub struct Recorder<'a> {
    plan: &'a RecordingPlan,
    registry: &'a ExtensionRegistry,
    mappings: &'a dyn ArtifactStore,
    files: &'a dyn ArtifactStore,
}

impl<'a> Recorder<'a> {
    pub fn new(
        plan: &'a RecordingPlan,
        registry: &'a ExtensionRegistry,
        mappings: &'a dyn ArtifactStore,
        files: &'a dyn ArtifactStore,
    ) -> Self {
        Self {
            plan,
            registry,
            mappings,
            files,
        }
    }

    pub fn record(&self, interactions: &[CapturedInteraction]) -> Result<RecordResult, RecordError> {
        let transformers = self.resolve_transformers()?;

        let selected: Vec<&CapturedInteraction> = interactions
            .iter()
            .filter(|i| self.plan.filters.matches(i))
            .collect();
        if selected.len() < interactions.len() {
            debug!(
                "Filters excluded {} of {} interactions",
                interactions.len() - selected.len(),
                interactions.len()
            );
        }

        // Stub ids and file names come from interaction ids
        let mut requests: HashMap<Uuid, &CapturedInteraction> =
            HashMap::with_capacity(selected.len());
        for &interaction in &selected {
            if requests.insert(interaction.id, interaction).is_some() {
                return Err(RecordError::DuplicateInteractionId(interaction.id));
            }
        }

        let stubs: Vec<StubArtifact> = selected
            .iter()
            .map(|i| generate_stub(i, &self.plan.request_options))
            .collect();
        let mut stubs = process_scenarios(stubs, self.plan.request_options.repeats_as_scenarios);

        // Nothing is written until every transformer has succeeded
        for stub in &mut stubs {
            if let Some(interaction) = requests.get(&stub.id) {
                self.apply_transformers(&transformers, interaction, stub)?;
            }
        }
        if self.plan.persist {
            for stub in &mut stubs {
                self.persist(stub)?;
            }
        }

        info!(
            "Recorded {} stubs from {} interactions (persist={})",
            stubs.len(),
            interactions.len(),
            self.plan.persist
        );

        Ok(match self.plan.output_format {
            OutputFormat::Full => RecordResult::Full(stubs),
            OutputFormat::Ids => RecordResult::Ids(stubs.iter().map(|s| s.id).collect()),
        })
    }

    fn resolve_transformers(&self) -> Result<Vec<Arc<UserExtension>>, RecordError> {
        self.plan
            .transformers
            .iter()
            .map(|key| {
                self.registry
                    .find(key)
                    .ok_or_else(|| RecordError::UnknownTransformer(key.clone()))
            })
            .collect()
    }

    fn apply_transformers(
        &self,
        transformers: &[Arc<UserExtension>],
        interaction: &CapturedInteraction,
        stub: &mut StubArtifact,
    ) -> Result<(), RecordError> {
        for extension in transformers {
            let transformed = self
                .registry
                .transform(
                    extension,
                    &interaction.request,
                    &stub.response,
                    &self.plan.transformer_parameters,
                )
                .map_err(|source| RecordError::Transformer {
                    name: extension
                        .name
                        .clone()
                        .unwrap_or_else(|| extension.id.to_string()),
                    stub_id: stub.id,
                    source,
                })?;
            transformed.apply_to(&mut stub.response);
        }
        Ok(())
    }

    fn persist(&self, stub: &mut StubArtifact) -> Result<(), StoreError> {
        stub.persistent = true;
        extract_body(stub, &self.plan.response_options.extract_body_criteria, self.files)?;

        let name = stub_file_name(stub);
        let json = serde_json::to_vec_pretty(stub).map_err(|source| StoreError::Serialize {
            name: name.clone(),
            source,
        })?;
        self.mappings.write(&name, &json)?;
        debug!("Persisted stub {} as {}", stub.id, name);
        Ok(())
    }
}
