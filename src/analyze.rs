//! Read a numbered series back from local storage and diff it.

use crate::backends::{naming, Backend};
use crate::diff::{diff_series, UpdateAnalysis};
use crate::error::{Error, Result};
use crate::image::ImageInfo;
use crate::notifier::Notifier;
use crate::summary::Summary;

/// One series with its pairwise updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesAnalysis {
    pub images: Vec<ImageInfo>,
    pub updates: Vec<UpdateAnalysis>,
}

impl SeriesAnalysis {
    pub fn from_images(images: Vec<ImageInfo>) -> Self {
        let updates = diff_series(&images);
        Self { images, updates }
    }

    pub fn summary(&self) -> Summary {
        Summary::from_updates(&self.updates)
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Chunked series and, when requested and present, the matching originals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub chunked: SeriesAnalysis,
    pub original: Option<SeriesAnalysis>,
}

/// Order series references by their numeric tag, dropping anything else.
pub fn order_series_refs(refs: Vec<String>) -> Vec<String> {
    let mut indexed: Vec<(usize, String)> = refs
        .into_iter()
        .filter_map(|reference| naming::series_index(&reference).map(|i| (i, reference)))
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, reference)| reference).collect()
}

pub struct Analyzer<B: Backend> {
    backend: B,
    notifier: Notifier,
}

impl<B: Backend> Analyzer<B> {
    pub fn new(backend: B, notifier: Notifier) -> Self {
        Self { backend, notifier }
    }

    /// Numbered images under `prefix`, ordered by index.
    pub fn find_images(&self, prefix: &str) -> Result<Vec<String>> {
        let refs = self.backend.list_images(prefix)?;
        self.notifier
            .debug(&format!("Found {} images under {}", refs.len(), prefix));
        Ok(order_series_refs(refs))
    }

    pub fn load_series(&self, refs: &[String]) -> Result<Vec<ImageInfo>> {
        refs.iter()
            .map(|reference| {
                self.notifier.debug(&format!("Inspecting {}", reference));
                let inspect = self.backend.inspect(reference)?;
                Ok(ImageInfo::from_inspect(reference, &inspect))
            })
            .collect()
    }

    /// Analyze `{prefix}:0..N` and optionally `{prefix}-orig:0..N`.
    ///
    /// Fails with [`Error::NotFound`] when the chunked series is empty. Missing
    /// originals only produce a warning.
    pub fn analyze(&self, prefix: &str, compare_originals: bool) -> Result<AnalysisReport> {
        self.notifier
            .debug(&format!("Analyzing {} with {} backend", prefix, self.backend.name()));
        let refs = self.find_images(prefix)?;
        if refs.is_empty() {
            return Err(Error::NotFound(format!(
                "No images found with prefix '{}'",
                prefix
            )));
        }
        if refs.len() == 1 {
            self.notifier
                .warn("Only 1 image found. Need at least 2 for update analysis.");
        }

        let chunked = SeriesAnalysis::from_images(self.load_series(&refs)?);

        let original = if compare_originals {
            let original_prefix = naming::original_prefix(prefix);
            let original_refs = self.find_images(&original_prefix)?;
            if original_refs.is_empty() {
                self.notifier.warn(&format!(
                    "No original images found at '{}'",
                    original_prefix
                ));
                None
            } else {
                Some(SeriesAnalysis::from_images(
                    self.load_series(&original_refs)?,
                ))
            }
        } else {
            None
        };

        Ok(AnalysisReport { chunked, original })
    }
}
