//! Rendering of analysis results.
//!
//! Two renderings of the same [`AnalysisReport`]:
//! - [`render_human`]: sectioned text with binary-prefixed byte sizes.
//! - [`render_json`]: a `chunked` section, an optional `original` section and,
//!   when both series have updates, a `comparison` object.

use serde::Serialize;

use crate::analyze::{AnalysisReport, SeriesAnalysis};
use crate::diff::UpdateAnalysis;
use crate::image::{ImageInfo, LayerInfo};
use crate::summary::{Comparison, Summary};

/// How many component names an update lists before summarizing the rest.
pub const MAX_LISTED_COMPONENTS: usize = 5;

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Human readable size: `0 B`, `1.5 KiB`, `1.0 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return if unit == "B" {
                format!("{} {}", bytes, unit)
            } else {
                format!("{:.1} {}", value, unit)
            };
        }
        value /= 1024.0;
    }
    format!("{:.1} PiB", value)
}

/// [`format_bytes`] for values that may be negative.
pub fn format_signed_bytes(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_bytes(bytes.unsigned_abs()))
    } else {
        format_bytes(bytes as u64)
    }
}

/// `0.6667` -> `66.7%`
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// `0.25` -> `+25.0%`
pub fn format_signed_percent(ratio: f64) -> String {
    format!("{:+.1}%", ratio * 100.0)
}

#[derive(Debug, Serialize)]
struct LayerEntry<'a> {
    digest: &'a str,
    size: u64,
    component: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ImageEntry<'a> {
    #[serde(rename = "ref")]
    reference: &'a str,
    tag: &'a str,
    original_tag: Option<&'a str>,
    layer_count: usize,
    total_bytes: u64,
    layers: Vec<LayerEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct UpdateEntry<'a> {
    from: &'a str,
    to: &'a str,
    from_original: Option<&'a str>,
    to_original: Option<&'a str>,
    shared_layer_count: usize,
    added_layer_count: usize,
    removed_layer_count: usize,
    shared_bytes: u64,
    download_bytes: u64,
    reuse_ratio: f64,
}

#[derive(Debug, Serialize)]
struct SeriesSection<'a> {
    images: Vec<ImageEntry<'a>>,
    updates: Vec<UpdateEntry<'a>>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    chunked: SeriesSection<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original: Option<SeriesSection<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

impl<'a> From<&'a LayerInfo> for LayerEntry<'a> {
    fn from(layer: &'a LayerInfo) -> Self {
        Self {
            digest: &layer.digest,
            size: layer.size,
            component: layer.component.as_deref(),
        }
    }
}

impl<'a> From<&'a ImageInfo> for ImageEntry<'a> {
    fn from(image: &'a ImageInfo) -> Self {
        Self {
            reference: &image.reference,
            tag: &image.tag,
            original_tag: image.original_tag.as_deref(),
            layer_count: image.layer_count(),
            total_bytes: image.total_size,
            layers: image.layers.iter().map(LayerEntry::from).collect(),
        }
    }
}

impl<'a> From<&'a UpdateAnalysis> for UpdateEntry<'a> {
    fn from(update: &'a UpdateAnalysis) -> Self {
        Self {
            from: &update.from_tag,
            to: &update.to_tag,
            from_original: update.from_original.as_deref(),
            to_original: update.to_original.as_deref(),
            shared_layer_count: update.shared_layers.len(),
            added_layer_count: update.added_layers.len(),
            removed_layer_count: update.removed_layers.len(),
            shared_bytes: update.shared_bytes,
            download_bytes: update.download_bytes,
            reuse_ratio: update.reuse_ratio(),
        }
    }
}

impl<'a> From<&'a SeriesAnalysis> for SeriesSection<'a> {
    fn from(series: &'a SeriesAnalysis) -> Self {
        Self {
            images: series.images.iter().map(ImageEntry::from).collect(),
            updates: series.updates.iter().map(UpdateEntry::from).collect(),
            summary: series.summary(),
        }
    }
}

/// Chunked-vs-original comparison, present only when both series have updates.
pub fn comparison(report: &AnalysisReport) -> Option<Comparison> {
    let original = report.original.as_ref()?;
    if report.chunked.updates.is_empty() || original.updates.is_empty() {
        return None;
    }
    Some(Comparison::between(
        &report.chunked.summary(),
        &original.summary(),
    ))
}

pub fn render_json(report: &AnalysisReport) -> serde_json::Result<String> {
    let document = JsonReport {
        chunked: SeriesSection::from(&report.chunked),
        original: report.original.as_ref().map(SeriesSection::from),
        comparison: comparison(report),
    };
    serde_json::to_string_pretty(&document)
}

fn describe_update(update: &UpdateAnalysis) -> String {
    let mut from = format!(":{}", update.from_tag);
    let mut to = format!(":{}", update.to_tag);
    if let (Some(from_original), Some(to_original)) = (&update.from_original, &update.to_original) {
        from.push_str(&format!(" ({})", from_original));
        to.push_str(&format!(" ({})", to_original));
    }
    format!("{} -> {}", from, to)
}

/// Component lines for one update: at most [`MAX_LISTED_COMPONENTS`] names, then an overflow count.
pub fn component_lines(update: &UpdateAnalysis) -> Vec<String> {
    let components = update.changed_components();
    if components.is_empty() {
        return Vec::new();
    }

    let shown = components.len().min(MAX_LISTED_COMPONENTS);
    let mut lines = vec![format!(
        "    Changed components: {}",
        components[..shown].join(", ")
    )];
    if components.len() > shown {
        lines.push(format!(
            "                        ... and {} more",
            components.len() - shown
        ));
    }
    lines
}

pub fn render_human(report: &AnalysisReport, show_components: bool) -> String {
    let mut lines: Vec<String> = Vec::new();
    let chunked = &report.chunked;

    if let (Some(first), Some(last)) = (chunked.images.first(), chunked.images.last()) {
        lines.push(format!(
            "==> Found {} chunked images: {}:{} through :{}",
            chunked.images.len(),
            first.repository(),
            first.tag,
            last.tag
        ));
        lines.push(String::new());
    }

    lines.push("==> Chunked Image Summary:".to_string());
    for image in &chunked.images {
        let original = image
            .original_tag
            .as_ref()
            .map(|tag| format!(" ({})", tag))
            .unwrap_or_default();
        lines.push(format!(
            "    :{}{}  {} layers, {}",
            image.tag,
            original,
            image.layer_count(),
            format_bytes(image.total_size)
        ));
    }
    lines.push(String::new());

    if !chunked.updates.is_empty() {
        lines.push("==> Chunked Update Analysis:".to_string());
        lines.push(String::new());

        for update in &chunked.updates {
            lines.push(format!("    {}", describe_update(update)));
            lines.push(format!(
                "    Shared:   {:3} layers ({})",
                update.shared_layers.len(),
                format_bytes(update.shared_bytes)
            ));
            lines.push(format!(
                "    Added:    {:3} layers ({} download)",
                update.added_layers.len(),
                format_bytes(update.download_bytes)
            ));
            lines.push(format!(
                "    Removed:  {:3} layers",
                update.removed_layers.len()
            ));
            lines.push(format!("    Reuse:    {}", format_percent(update.reuse_ratio())));
            if show_components {
                lines.extend(component_lines(update));
            }
            lines.push(String::new());
        }

        let summary = chunked.summary();
        lines.push("==> Chunked Summary:".to_string());
        lines.push(format!(
            "    Total updates analyzed: {}",
            summary.update_count
        ));
        lines.push(format!(
            "    Average layer reuse:    {}",
            format_percent(summary.avg_reuse_ratio)
        ));
        lines.push(format!(
            "    Average download size:  {}",
            format_bytes(summary.avg_download_bytes)
        ));
        if summary.update_count > 1 {
            lines.push(format!(
                "    Min download:           {}",
                format_bytes(summary.min_download_bytes)
            ));
            lines.push(format!(
                "    Max download:           {}",
                format_bytes(summary.max_download_bytes)
            ));
        }
        lines.push(String::new());
    }

    if let Some(original) = report
        .original
        .as_ref()
        .filter(|original| !original.is_empty() && !original.updates.is_empty())
    {
        lines.push("==> Original (un-chunked) Update Analysis:".to_string());
        lines.push(String::new());

        for update in &original.updates {
            lines.push(format!("    :{} -> :{}", update.from_tag, update.to_tag));
            lines.push(format!(
                "    Shared:   {:3} layers ({})",
                update.shared_layers.len(),
                format_bytes(update.shared_bytes)
            ));
            lines.push(format!(
                "    Added:    {:3} layers ({} download)",
                update.added_layers.len(),
                format_bytes(update.download_bytes)
            ));
            lines.push(format!("    Reuse:    {}", format_percent(update.reuse_ratio())));
            lines.push(String::new());
        }

        let summary = original.summary();
        lines.push("==> Original Summary:".to_string());
        lines.push(format!(
            "    Average layer reuse:    {}",
            format_percent(summary.avg_reuse_ratio)
        ));
        lines.push(format!(
            "    Average download size:  {}",
            format_bytes(summary.avg_download_bytes)
        ));
        lines.push(String::new());

        if let Some(comparison) = comparison(report) {
            lines.push("==> Comparison (Chunked vs Original):".to_string());
            lines.push(format!(
                "    Download savings:       {} ({} smaller)",
                format_signed_bytes(comparison.download_savings_bytes),
                format_percent(comparison.download_savings_ratio)
            ));
            lines.push(format!(
                "    Layer reuse improvement: {}",
                format_signed_percent(comparison.reuse_improvement)
            ));
        }
    }

    lines.join("\n")
}
