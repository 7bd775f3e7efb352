//! Moving large response bodies out of stubs into their own files.

use super::store::{ArtifactStore, StoreError, WriteOutcome};
use crate::config::BodyExtractCriteria;
use crate::naming::{body_file_name, is_binary_body};
use crate::stub::StubArtifact;
use tracing::debug;

/// Extract the stub's response body into `files` if it exceeds `criteria`.
///
/// On extraction the stub references the body by `bodyFileName` and no longer
/// carries it inline. Body files are named by content, so an existing file of
/// the same name already holds these bytes and is not rewritten.
///
/// Returns the body file name when the body was extracted.
pub fn extract_body(
    stub: &mut StubArtifact,
    criteria: &BodyExtractCriteria,
    files: &dyn ArtifactStore,
) -> Result<Option<String>, StoreError> {
    let Some(body) = stub.response.body.as_deref() else {
        return Ok(None);
    };
    let binary = is_binary_body(stub.response.content_type(), body);
    if !criteria.should_extract(body.len(), binary) {
        return Ok(None);
    }

    let name = body_file_name(stub);
    match files.write_if_absent(&name, body)? {
        WriteOutcome::Written => debug!("Extracted {} byte body to {}", body.len(), name),
        WriteOutcome::AlreadyExists => debug!("Body file {} already recorded", name),
    }

    stub.response.body = None;
    stub.response.body_file_name = Some(name.clone());
    Ok(Some(name))
}
