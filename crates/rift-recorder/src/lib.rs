//! Recording captured HTTP traffic as mock stubs.
//!
//! A [`RecordSpec`] describes what to record and how; it resolves into a
//! [`RecordingPlan`] with every option decided. The [`Recorder`] runs captured
//! interactions through that plan and writes stubs and extracted bodies to an
//! [`ArtifactStore`] under names from [`naming`]: a slug of the stub's name or
//! URL, followed by the stub id or a fingerprint of the body.

pub mod config;
pub mod fingerprint;
pub mod naming;
pub mod recording;
pub mod scripting;
pub mod stub;

pub use config::{ConfigError, OutputFormat, RecordSpec, RecordingPlan};
pub use naming::{body_file_name, make_safe_name, make_safe_name_from_url, stub_file_name};
pub use recording::{
    ArtifactStore, CapturedInteraction, FileArtifactStore, InMemoryArtifactStore, RecordError,
    RecordResult, Recorder, StoreError,
};
pub use scripting::{CompileError, ExtensionRegistry, ExtensionSpec, InvokeError, TransformerEngine};
pub use stub::StubArtifact;
