//! Layer and image records read from local storage.
//!
//! [`InspectOutput`] mirrors the subset of `skopeo inspect` JSON this crate reads.
//! Every field is optional on the wire; missing or null values fall back to
//! defaults instead of failing the whole inspection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::backends::naming;

/// Label recording which source tag a chunked image was produced from.
pub const ORIGINAL_TAG_LABEL: &str = "org.chunkah.original-tag";

/// Per-layer annotation naming the component that produced the layer.
pub const COMPONENT_ANNOTATION: &str = "org.chunkah.component";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectOutput {
    #[serde(default, rename = "Created")]
    pub created: Option<String>,
    #[serde(default, rename = "Labels")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default, rename = "LayersData")]
    pub layers_data: Option<Vec<LayerData>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerData {
    #[serde(default, rename = "Digest")]
    pub digest: Option<String>,
    #[serde(default, rename = "Size")]
    pub size: Option<i64>,
    #[serde(default, rename = "Annotations")]
    pub annotations: Option<HashMap<String, String>>,
}

/// Response of `skopeo list-tags`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagList {
    #[serde(default, rename = "Tags")]
    pub tags: Option<Vec<String>>,
}

/// One layer of an image. The digest is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    pub digest: String,
    pub size: u64,
    pub component: Option<String>,
}

impl LayerInfo {
    pub fn new(digest: impl Into<String>, size: u64) -> Self {
        Self {
            digest: digest.into(),
            size,
            component: None,
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl From<&LayerData> for LayerInfo {
    fn from(data: &LayerData) -> Self {
        Self {
            digest: data.digest.clone().unwrap_or_default(),
            size: data.size.unwrap_or(0).max(0) as u64,
            component: data
                .annotations
                .as_ref()
                .and_then(|a| a.get(COMPONENT_ANNOTATION))
                .cloned(),
        }
    }
}

/// One stored image of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub reference: String,
    pub tag: String,
    pub original_tag: Option<String>,
    pub layers: Vec<LayerInfo>,
    pub total_size: u64,
}

impl ImageInfo {
    /// Build an image from its layers. `total_size` counts each digest once.
    pub fn new(reference: impl Into<String>, layers: Vec<LayerInfo>) -> Self {
        let reference = reference.into();
        let tag = naming::tag_of(&reference).unwrap_or_default().to_string();
        let total_size = crate::diff::index_layers(&layers)
            .values()
            .map(|layer| layer.size)
            .sum();
        Self {
            reference,
            tag,
            original_tag: None,
            layers,
            total_size,
        }
    }

    /// Number of distinct layer digests.
    pub fn layer_count(&self) -> usize {
        crate::diff::index_layers(&self.layers).len()
    }

    pub fn from_inspect(reference: &str, inspect: &InspectOutput) -> Self {
        let layers = inspect
            .layers_data
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(LayerInfo::from)
            .collect();
        let original_tag = inspect
            .labels
            .as_ref()
            .and_then(|labels| labels.get(ORIGINAL_TAG_LABEL))
            .cloned();

        Self {
            original_tag,
            ..Self::new(reference, layers)
        }
    }

    /// Repository part of the reference (everything before the tag).
    pub fn repository(&self) -> &str {
        naming::repository_of(&self.reference)
    }
}
