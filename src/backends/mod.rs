pub mod naming;
pub mod podman;

use std::path::Path;

use crate::error::Result;
use crate::image::InspectOutput;

pub use podman::PodmanBackend;

/// Inputs of one chunking transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Local reference of the image to chunk.
    pub source_ref: String,
    /// Image providing the chunker.
    pub chunker_image: String,
    /// Arguments after `build`: the provenance label followed by caller passthrough.
    pub args: Vec<String>,
}

/// Everything the series pipeline and the analyzer need from the outside world:
/// a remote registry, local image storage and the chunker.
///
/// Calls block until the underlying tool returns.
pub trait Backend {
    /// Returns the name of the backend for identification purposes
    fn name(&self) -> &str;

    /// All tags of a remote repository.
    fn list_tags(&self, repo: &str) -> Result<Vec<String>>;

    /// Creation timestamp (ISO 8601) of a remote image.
    fn created(&self, repo: &str, tag: &str) -> Result<String>;

    /// Copy `repo:tag` into local storage as `local_ref`.
    fn pull(&self, repo: &str, tag: &str, local_ref: &str) -> Result<()>;

    fn tag(&self, source_ref: &str, target_ref: &str) -> Result<()>;

    fn remove(&self, local_ref: &str) -> Result<()>;

    /// Local references (`repository:tag`) stored under `repository`.
    fn list_images(&self, repository: &str) -> Result<Vec<String>>;

    fn inspect(&self, local_ref: &str) -> Result<InspectOutput>;

    /// Run the chunker, writing the resulting OCI archive to `archive`.
    fn chunk(&self, request: &ChunkRequest, archive: &Path) -> Result<()>;

    /// Import an OCI archive into local storage and return the new image id.
    fn load(&self, archive: &Path) -> Result<String>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        (**self).list_tags(repo)
    }

    fn created(&self, repo: &str, tag: &str) -> Result<String> {
        (**self).created(repo, tag)
    }

    fn pull(&self, repo: &str, tag: &str, local_ref: &str) -> Result<()> {
        (**self).pull(repo, tag, local_ref)
    }

    fn tag(&self, source_ref: &str, target_ref: &str) -> Result<()> {
        (**self).tag(source_ref, target_ref)
    }

    fn remove(&self, local_ref: &str) -> Result<()> {
        (**self).remove(local_ref)
    }

    fn list_images(&self, repository: &str) -> Result<Vec<String>> {
        (**self).list_images(repository)
    }

    fn inspect(&self, local_ref: &str) -> Result<InspectOutput> {
        (**self).inspect(local_ref)
    }

    fn chunk(&self, request: &ChunkRequest, archive: &Path) -> Result<()> {
        (**self).chunk(request, archive)
    }

    fn load(&self, archive: &Path) -> Result<String> {
        (**self).load(archive)
    }
}
