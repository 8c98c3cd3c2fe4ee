//! Sequential "source tags → chunked series" pipeline.
//!
//! This module provides [`SeriesBuilder`], which for every selected tag, in order:
//! - pulls the source image into the transient repository,
//! - optionally tags it as `{prefix}-orig:{i}` before anything touches it,
//! - runs the chunker with a provenance label and the caller's extra arguments,
//! - loads the resulting archive and tags it as `{prefix}:{i}`.
//!
//! A tag that fails at any step is recorded and skipped; the remaining tags still
//! run. Transient pulls are removed once every tag has been attempted.

use std::path::Path;

use crate::backends::{naming, Backend, ChunkRequest};
use crate::error::{Error, Result};
use crate::image::ORIGINAL_TAG_LABEL;
use crate::notifier::Notifier;
use crate::tags::{TagQuery, TagSelector};

/// Chunker image used when none is configured.
pub const DEFAULT_CHUNKER_IMAGE: &str = "quay.io/jlebon/chunkah";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesConfig {
    /// Remote repository the tags belong to.
    pub repo: String,
    /// Storage prefix; images land at `localhost/{prefix}:{i}`.
    pub prefix: String,
    pub chunker_image: String,
    /// Passed to the chunker verbatim after the provenance label.
    pub chunker_args: Vec<String>,
    pub keep_originals: bool,
    pub force: bool,
    pub dry_run: bool,
}

impl SeriesConfig {
    /// Configuration with defaults for everything but the repository.
    pub fn new(repo: impl Into<String>) -> Self {
        let repo = repo.into();
        Self {
            prefix: naming::default_prefix(&repo),
            repo,
            chunker_image: DEFAULT_CHUNKER_IMAGE.to_string(),
            chunker_args: Vec::new(),
            keep_originals: false,
            force: false,
            dry_run: false,
        }
    }

    pub fn original_prefix(&self) -> String {
        naming::original_prefix(&self.prefix)
    }
}

/// Where one source tag ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesEntry {
    pub index: usize,
    pub tag: String,
    pub target_ref: String,
    pub original_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesOutcome {
    /// Successfully produced images in series order.
    pub processed: Vec<SeriesEntry>,
    /// Tags that failed at some step.
    pub failed: Vec<String>,
}

impl SeriesOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn any failed tag into [`Error::Incomplete`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Incomplete {
                total: self.failed.len() + self.processed.len(),
                failed: self.failed,
            })
        }
    }
}

/// Source images pulled during a run. Each one is removed on release (or drop);
/// removal failures are logged and otherwise ignored.
struct TransientImages<'a, B: Backend> {
    backend: &'a B,
    notifier: &'a Notifier,
    refs: Vec<String>,
}

impl<'a, B: Backend> TransientImages<'a, B> {
    fn new(backend: &'a B, notifier: &'a Notifier) -> Self {
        Self {
            backend,
            notifier,
            refs: Vec::new(),
        }
    }

    fn track(&mut self, reference: String) {
        if !self.refs.contains(&reference) {
            self.refs.push(reference);
        }
    }

    fn release(&mut self) {
        if self.refs.is_empty() {
            return;
        }
        self.notifier.step("Cleaning up temporary images...");
        for reference in self.refs.drain(..) {
            if let Err(e) = self.backend.remove(&reference) {
                self.notifier
                    .debug(&format!("Ignoring cleanup failure for {}: {}", reference, e));
            }
        }
    }
}

impl<B: Backend> Drop for TransientImages<'_, B> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Builds a chunked image series through a [`Backend`].
///
/// Tags are processed strictly one after another: every tag is pulled into the
/// same transient repository, so two tags in flight would trample each other.
pub struct SeriesBuilder<B: Backend> {
    backend: B,
    notifier: Notifier,
}

impl<B: Backend> SeriesBuilder<B> {
    pub fn new(backend: B, notifier: Notifier) -> Self {
        Self { backend, notifier }
    }

    /// Select tags from the registry and build the series from them.
    ///
    /// The pre-flight check runs before the registry is contacted, so a blocked
    /// prefix fails without any network traffic.
    pub fn build(&self, query: &TagQuery, config: &SeriesConfig) -> Result<SeriesOutcome> {
        self.notifier
            .debug(&format!("Building series with {} backend", self.backend.name()));
        if !config.dry_run {
            self.preflight(config)?;
        }

        let tags = TagSelector::new(&self.backend, &self.notifier).select(&config.repo, query)?;

        if config.dry_run {
            self.print_plan(&tags, config);
            return Ok(SeriesOutcome::default());
        }
        Ok(self.process(&tags, config))
    }

    /// Build the series from an already ordered tag list.
    pub fn run(&self, tags: &[String], config: &SeriesConfig) -> Result<SeriesOutcome> {
        if config.dry_run {
            self.print_plan(tags, config);
            return Ok(SeriesOutcome::default());
        }
        self.preflight(config)?;
        Ok(self.process(tags, config))
    }

    /// Target names for every tag, index-for-index.
    pub fn plan(&self, tags: &[String], config: &SeriesConfig) -> Vec<SeriesEntry> {
        let original_prefix = config.original_prefix();
        tags.iter()
            .enumerate()
            .map(|(index, tag)| SeriesEntry {
                index,
                tag: tag.clone(),
                target_ref: naming::series_ref(&config.prefix, index),
                original_ref: config
                    .keep_originals
                    .then(|| naming::series_ref(&original_prefix, index)),
            })
            .collect()
    }

    /// Refuse to overwrite an existing series unless `force` is set.
    pub fn preflight(&self, config: &SeriesConfig) -> Result<()> {
        if config.force {
            return Ok(());
        }

        let mut existing = self.existing_images(&config.prefix);
        if config.keep_originals {
            existing.extend(self.existing_images(&config.original_prefix()));
        }

        if existing.is_empty() {
            Ok(())
        } else {
            Err(Error::Conflict {
                prefix: config.prefix.clone(),
                existing,
            })
        }
    }

    fn existing_images(&self, prefix: &str) -> Vec<String> {
        let repository = naming::local_repository(prefix);
        match self.backend.list_images(&repository) {
            Ok(images) => images,
            Err(e) => {
                self.notifier
                    .debug(&format!("Could not list images at {}: {}", repository, e));
                Vec::new()
            }
        }
    }

    fn print_plan(&self, tags: &[String], config: &SeriesConfig) {
        self.notifier.step("Dry run - would process:");
        for entry in self.plan(tags, config) {
            self.notifier.detail(&format!(
                "{}:{} -> {}",
                config.repo, entry.tag, entry.target_ref
            ));
            if let Some(original_ref) = &entry.original_ref {
                self.notifier
                    .detail(&format!("  (original -> {})", original_ref));
            }
        }
        if !config.chunker_args.is_empty() {
            self.notifier.println("");
            self.notifier.println(&format!(
                "Chunkah extra args: {}",
                config.chunker_args.join(" ")
            ));
        }
    }

    /// Attempt every tag, collect failures, clean up, print the summary.
    fn process(&self, tags: &[String], config: &SeriesConfig) -> SeriesOutcome {
        let mut outcome = SeriesOutcome::default();
        let mut transient = TransientImages::new(&self.backend, &self.notifier);
        let plan = self.plan(tags, config);
        let total = plan.len();

        for entry in plan {
            self.notifier.step(&format!(
                "Processing tag {}/{}: {}",
                entry.index + 1,
                total,
                entry.tag
            ));
            let result = self.process_tag(&entry, config, &mut transient);
            self.notifier.finish_activity();

            match result {
                Ok(()) => {
                    self.notifier.detail(&format!("Done: {}", entry.target_ref));
                    outcome.processed.push(entry);
                }
                Err(e) => {
                    self.notifier
                        .eprintln(&format!("  ERROR: Failed to process {}: {}", entry.tag, e));
                    outcome.failed.push(entry.tag);
                }
            }
        }

        transient.release();
        self.print_summary(&outcome, config.keep_originals);
        outcome
    }

    fn process_tag(
        &self,
        entry: &SeriesEntry,
        config: &SeriesConfig,
        transient: &mut TransientImages<'_, B>,
    ) -> Result<()> {
        let source_ref = naming::transient_ref(&entry.tag);

        self.progress("Pulling image...");
        self.backend.pull(&config.repo, &entry.tag, &source_ref)?;
        transient.track(source_ref.clone());

        if let Some(original_ref) = &entry.original_ref {
            self.progress(&format!("Storing original as {}...", original_ref));
            self.backend.tag(&source_ref, original_ref)?;
        }

        self.progress("Running chunkah...");
        let archive = tempfile::Builder::new()
            .prefix("chunk-series-")
            .suffix(".ociarchive")
            .tempfile()?;
        let request = ChunkRequest {
            source_ref,
            chunker_image: config.chunker_image.clone(),
            args: chunker_args(&entry.tag, &config.chunker_args),
        };
        self.notifier.debug(&format!(
            "Chunking {} with {} build {}",
            request.source_ref,
            request.chunker_image,
            request.args.join(" ")
        ));
        self.backend.chunk(&request, archive.path())?;

        self.progress(&format!("Loading as {}...", entry.target_ref));
        self.load(archive.path(), &entry.target_ref)?;

        if let Err(e) = archive.close() {
            self.notifier
                .warn(&format!("Could not remove temporary archive: {}", e));
        }
        Ok(())
    }

    fn load(&self, archive: &Path, target_ref: &str) -> Result<()> {
        let image_id = self.backend.load(archive)?;
        self.notifier.debug(&format!("Loaded image {}", image_id));
        if let Err(e) = self.backend.tag(&image_id, target_ref) {
            // Loaded but unnamed.
            if let Err(cleanup) = self.backend.remove(&image_id) {
                self.notifier.debug(&format!(
                    "Ignoring cleanup failure for {}: {}",
                    image_id, cleanup
                ));
            }
            return Err(e);
        }
        Ok(())
    }

    fn progress(&self, message: &str) {
        self.notifier.detail(message);
        self.notifier.activity(message);
    }

    fn print_summary(&self, outcome: &SeriesOutcome, keep_originals: bool) {
        self.notifier.println("");
        if !outcome.processed.is_empty() {
            self.notifier.step("Done! Chunked images stored as:");
            for entry in &outcome.processed {
                self.notifier
                    .detail(&format!("{}  ({})", entry.target_ref, entry.tag));
            }
            if keep_originals {
                self.notifier.step("Original images stored as:");
                for entry in &outcome.processed {
                    if let Some(original_ref) = &entry.original_ref {
                        self.notifier
                            .detail(&format!("{}  ({})", original_ref, entry.tag));
                    }
                }
            }
        }

        if !outcome.failed.is_empty() {
            self.notifier.println("");
            self.notifier.step("Failed to process:");
            for tag in &outcome.failed {
                self.notifier.detail(tag);
            }
        }
    }
}

/// Chunker arguments: the provenance label first, then the passthrough arguments.
pub fn chunker_args(tag: &str, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "--label".to_string(),
        format!("{}={}", ORIGINAL_TAG_LABEL, tag),
    ];
    args.extend(extra.iter().cloned());
    args
}
