//! Recording captured traffic as stubs.
//!
//! The pipeline, in order:
//! - `filters` from the plan select interactions
//! - `stub_generator` turns each into a stub
//! - `scenarios` chains or drops repeated requests
//! - registered transformers rewrite responses
//! - `body_extractor` moves large bodies into their own files
//! - the stub is written under its generated file name
//!
//! # Module Structure
//!
//! - `interaction` - captured request/response types
//! - `stub_generator` - stub generation
//! - `scenarios` - repeated request handling
//! - `body_extractor` - body file extraction
//! - `store` - artifact storage
//! - `recorder` - the pipeline

mod body_extractor;
mod interaction;
mod recorder;
mod scenarios;
mod store;
mod stub_generator;

pub use body_extractor::extract_body;
pub use interaction::{CapturedInteraction, CapturedRequest, CapturedResponse};
pub use recorder::{RecordError, RecordResult, Recorder};
pub use scenarios::{process_scenarios, STARTED_STATE};
pub use store::{ArtifactStore, FileArtifactStore, InMemoryArtifactStore, StoreError, WriteOutcome};
pub use stub_generator::generate_stub;

use std::path::Path;

/// Directory for stub files under a recording root.
pub const MAPPINGS_DIR: &str = "mappings";
/// Directory for extracted body files under a recording root.
pub const FILES_DIR: &str = "__files";

/// Stores for the standard `mappings/` and `__files/` layout under `root`.
pub fn file_stores(root: &Path) -> (FileArtifactStore, FileArtifactStore) {
    (
        FileArtifactStore::new(root.join(MAPPINGS_DIR)),
        FileArtifactStore::new(root.join(FILES_DIR)),
    )
}
