//! Scripted backend shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chunk_series::backends::{Backend, ChunkRequest};
use chunk_series::image::InspectOutput;
use chunk_series::{Error, Result};
use serde_json::json;

/// In-memory registry + local storage that records every call.
#[derive(Default)]
pub struct MockBackend {
    pub remote_tags: Vec<String>,
    /// Creation dates per remote tag; a missing entry makes the lookup fail.
    pub created: HashMap<String, String>,
    pub fail_pull: HashSet<String>,
    pub fail_chunk: HashSet<String>,
    /// Target references that cannot be tagged.
    pub fail_tag: HashSet<String>,
    pub fail_remove: bool,
    /// Inspect payloads per local reference.
    pub inspections: HashMap<String, InspectOutput>,
    /// Local reference -> image id.
    pub local: RefCell<BTreeMap<String, String>>,
    pub calls: RefCell<Vec<String>>,
    pub archives: RefCell<Vec<PathBuf>>,
    next_id: Cell<usize>,
}

impl MockBackend {
    pub fn with_tags(tags: &[&str]) -> Self {
        Self {
            remote_tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Register a local image with its inspect payload.
    pub fn add_image(&mut self, reference: &str, inspect: InspectOutput) {
        self.local
            .borrow_mut()
            .insert(reference.to_string(), format!("id-{}", reference));
        self.inspections.insert(reference.to_string(), inspect);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn has_local(&self, reference: &str) -> bool {
        self.local.borrow().contains_key(reference)
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn tag_of(reference: &str) -> &str {
        reference.rsplit(':').next().unwrap_or(reference)
    }
}

/// Inspect payload with `(digest, size, component)` layers and an optional original-tag label.
pub fn inspect(layers: &[(&str, i64, Option<&str>)], original_tag: Option<&str>) -> InspectOutput {
    let layers_data: Vec<_> = layers
        .iter()
        .map(|(digest, size, component)| {
            let annotations = component.map(|c| json!({ "org.chunkah.component": c }));
            json!({ "Digest": digest, "Size": size, "Annotations": annotations })
        })
        .collect();
    let labels = original_tag.map(|tag| json!({ "org.chunkah.original-tag": tag }));
    serde_json::from_value(json!({ "Labels": labels, "LayersData": layers_data }))
        .expect("valid inspect payload")
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        self.record(format!("list_tags {}", repo));
        Ok(self.remote_tags.clone())
    }

    fn created(&self, repo: &str, tag: &str) -> Result<String> {
        self.record(format!("created {}:{}", repo, tag));
        self.created
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::collaborator(format!("skopeo inspect {}", tag), "manifest unknown"))
    }

    fn pull(&self, repo: &str, tag: &str, local_ref: &str) -> Result<()> {
        self.record(format!("pull {}:{} {}", repo, tag, local_ref));
        if self.fail_pull.contains(tag) {
            return Err(Error::collaborator("skopeo copy", "connection reset"));
        }
        self.local
            .borrow_mut()
            .insert(local_ref.to_string(), format!("src-{}", tag));
        Ok(())
    }

    fn tag(&self, source_ref: &str, target_ref: &str) -> Result<()> {
        self.record(format!("tag {} {}", source_ref, target_ref));
        if self.fail_tag.contains(target_ref) {
            return Err(Error::collaborator("podman tag", "tag already in use"));
        }
        let mut local = self.local.borrow_mut();
        let id = match local.get(source_ref) {
            Some(id) => id.clone(),
            None => source_ref.to_string(),
        };
        local.insert(target_ref.to_string(), id);
        Ok(())
    }

    fn remove(&self, local_ref: &str) -> Result<()> {
        self.record(format!("remove {}", local_ref));
        if self.fail_remove {
            return Err(Error::collaborator("podman rmi", "image in use"));
        }
        self.local.borrow_mut().remove(local_ref);
        Ok(())
    }

    fn list_images(&self, repository: &str) -> Result<Vec<String>> {
        self.record(format!("list_images {}", repository));
        let prefix = format!("{}:", repository);
        Ok(self
            .local
            .borrow()
            .keys()
            .filter(|reference| reference.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn inspect(&self, local_ref: &str) -> Result<InspectOutput> {
        self.record(format!("inspect {}", local_ref));
        self.inspections
            .get(local_ref)
            .cloned()
            .ok_or_else(|| Error::collaborator(format!("skopeo inspect {}", local_ref), "image not known"))
    }

    fn chunk(&self, request: &ChunkRequest, archive: &Path) -> Result<()> {
        self.record(format!(
            "chunk {} {} build {}",
            request.source_ref,
            request.chunker_image,
            request.args.join(" ")
        ));
        assert!(archive.exists(), "archive file is created before chunking");
        self.archives.borrow_mut().push(archive.to_path_buf());

        if self.fail_chunk.contains(Self::tag_of(&request.source_ref)) {
            return Err(Error::collaborator("podman run", "chunkah exited with 1"));
        }
        fs::write(archive, &request.source_ref)?;
        Ok(())
    }

    fn load(&self, archive: &Path) -> Result<String> {
        self.record("load".to_string());
        let source = fs::read_to_string(archive)?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(format!("chunked-{}-{}", id, source))
    }
}
