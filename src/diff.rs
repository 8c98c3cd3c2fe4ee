//! Layer-level comparison of two consecutive images.
//!
//! Layers are matched by digest only. Each image is indexed once into a
//! digest map; when a digest repeats inside one image the last entry wins,
//! which is harmless because equal digests mean equal bytes.

use std::collections::{BTreeSet, HashMap};

use crate::image::{ImageInfo, LayerInfo};

/// What changes between two images of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAnalysis {
    pub from_tag: String,
    pub to_tag: String,
    pub from_original: Option<String>,
    pub to_original: Option<String>,
    /// Layers of `to` already present in `from`.
    pub shared_layers: Vec<LayerInfo>,
    /// Layers of `to` a client has to download.
    pub added_layers: Vec<LayerInfo>,
    /// Layers of `from` that `to` no longer references.
    pub removed_layers: Vec<LayerInfo>,
    pub shared_bytes: u64,
    pub download_bytes: u64,
}

impl UpdateAnalysis {
    /// Shared layers over all layers of the target image; 0 when both sides are empty.
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.layer_total();
        if total == 0 {
            0.0
        } else {
            self.shared_layers.len() as f64 / total as f64
        }
    }

    /// `shared + added`, the number of distinct layers in the target image.
    pub fn layer_total(&self) -> usize {
        self.shared_layers.len() + self.added_layers.len()
    }

    /// Distinct non-empty component names among the added layers, sorted.
    pub fn changed_components(&self) -> Vec<&str> {
        self.added_layers
            .iter()
            .filter_map(|layer| layer.component.as_deref())
            .filter(|component| !component.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Index layers by digest, deduplicating repeats (last occurrence wins).
pub fn index_layers(layers: &[LayerInfo]) -> HashMap<&str, &LayerInfo> {
    layers
        .iter()
        .map(|layer| (layer.digest.as_str(), layer))
        .collect()
}

/// Deduplicated layers in first-appearance order, carrying the winning entry.
fn distinct_layers<'a>(
    layers: &'a [LayerInfo],
    index: &HashMap<&'a str, &'a LayerInfo>,
) -> Vec<&'a LayerInfo> {
    let mut seen = BTreeSet::new();
    layers
        .iter()
        .filter(|layer| seen.insert(layer.digest.as_str()))
        .filter_map(|layer| index.get(layer.digest.as_str()).copied())
        .collect()
}

/// Compare `from` against `to`.
pub fn diff(from: &ImageInfo, to: &ImageInfo) -> UpdateAnalysis {
    let from_index = index_layers(&from.layers);
    let to_index = index_layers(&to.layers);

    let (shared_layers, added_layers): (Vec<LayerInfo>, Vec<LayerInfo>) =
        distinct_layers(&to.layers, &to_index)
            .into_iter()
            .cloned()
            .partition(|layer| from_index.contains_key(layer.digest.as_str()));

    let removed_layers: Vec<LayerInfo> = distinct_layers(&from.layers, &from_index)
        .into_iter()
        .filter(|layer| !to_index.contains_key(layer.digest.as_str()))
        .cloned()
        .collect();

    let shared_bytes = shared_layers.iter().map(|layer| layer.size).sum();
    let download_bytes = added_layers.iter().map(|layer| layer.size).sum();

    UpdateAnalysis {
        from_tag: from.tag.clone(),
        to_tag: to.tag.clone(),
        from_original: from.original_tag.clone(),
        to_original: to.original_tag.clone(),
        shared_layers,
        added_layers,
        removed_layers,
        shared_bytes,
        download_bytes,
    }
}

/// Diff every consecutive pair of a series.
pub fn diff_series(images: &[ImageInfo]) -> Vec<UpdateAnalysis> {
    images
        .windows(2)
        .map(|pair| diff(&pair[0], &pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: &str, layers: &[(&str, u64)]) -> ImageInfo {
        ImageInfo::new(
            format!("localhost/test:{tag}"),
            layers
                .iter()
                .map(|(digest, size)| LayerInfo::new(*digest, *size))
                .collect(),
        )
    }

    fn digests(layers: &[LayerInfo]) -> Vec<&str> {
        layers.iter().map(|l| l.digest.as_str()).collect()
    }

    #[test]
    fn test_shared_added_removed() {
        let from = image("0", &[("A", 100), ("B", 200), ("C", 50)]);
        let to = image("1", &[("A", 100), ("B", 200), ("D", 75)]);

        let update = diff(&from, &to);

        assert_eq!(digests(&update.shared_layers), vec!["A", "B"]);
        assert_eq!(update.shared_bytes, 300);
        assert_eq!(digests(&update.added_layers), vec!["D"]);
        assert_eq!(update.download_bytes, 75);
        assert_eq!(digests(&update.removed_layers), vec!["C"]);
        assert!((update.reuse_ratio() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(update.from_tag, "0");
        assert_eq!(update.to_tag, "1");
    }

    #[test]
    fn test_disjoint_images_share_nothing() {
        let from = image("0", &[("A", 10), ("B", 20)]);
        let to = image("1", &[("C", 30), ("D", 40)]);

        let update = diff(&from, &to);

        assert!(update.shared_layers.is_empty());
        assert_eq!(update.reuse_ratio(), 0.0);
        assert_eq!(update.download_bytes, to.total_size);
    }

    #[test]
    fn test_image_against_itself() {
        let img = image("0", &[("A", 10), ("B", 20), ("C", 30)]);

        let update = diff(&img, &img);

        assert_eq!(update.shared_layers.len(), 3);
        assert!(update.added_layers.is_empty());
        assert!(update.removed_layers.is_empty());
        assert_eq!(update.reuse_ratio(), 1.0);
        assert_eq!(update.download_bytes, 0);
    }

    #[test]
    fn test_diff_is_pure() {
        let from = image("0", &[("A", 1), ("B", 2)]);
        let to = image("1", &[("B", 2), ("C", 3)]);
        assert_eq!(diff(&from, &to), diff(&from, &to));
    }

    #[test]
    fn test_empty_images_have_zero_reuse() {
        let update = diff(&image("0", &[]), &image("1", &[]));
        assert_eq!(update.layer_total(), 0);
        assert_eq!(update.reuse_ratio(), 0.0);
    }

    #[test]
    fn test_duplicate_digest_counts_once() {
        let from = image("0", &[("A", 10)]);
        let to = image("1", &[("B", 5), ("B", 5), ("A", 10)]);

        let update = diff(&from, &to);

        assert_eq!(digests(&update.added_layers), vec!["B"]);
        assert_eq!(update.download_bytes, 5);
        assert_eq!(update.shared_bytes, 10);
    }

    #[test]
    fn test_duplicate_digest_last_entry_wins() {
        let from = image("0", &[]);
        let to = ImageInfo::new(
            "localhost/test:1",
            vec![
                LayerInfo::new("A", 10).with_component("first"),
                LayerInfo::new("A", 10).with_component("second"),
            ],
        );

        let update = diff(&from, &to);

        assert_eq!(update.added_layers.len(), 1);
        assert_eq!(update.added_layers[0].component.as_deref(), Some("second"));
    }

    #[test]
    fn test_changed_components_sorted_and_distinct() {
        let from = image("0", &[]);
        let to = ImageInfo::new(
            "localhost/test:1",
            vec![
                LayerInfo::new("A", 1).with_component("systemd"),
                LayerInfo::new("B", 1).with_component("kernel"),
                LayerInfo::new("C", 1).with_component("systemd"),
                LayerInfo::new("D", 1).with_component(""),
                LayerInfo::new("E", 1),
            ],
        );

        assert_eq!(diff(&from, &to).changed_components(), vec!["kernel", "systemd"]);
    }

    #[test]
    fn test_diff_series_pairs_consecutive_images() {
        let images = vec![
            image("0", &[("A", 1)]),
            image("1", &[("A", 1), ("B", 2)]),
            image("2", &[("B", 2), ("C", 3)]),
        ];

        let updates = diff_series(&images);

        assert_eq!(updates.len(), 2);
        assert_eq!((updates[0].from_tag.as_str(), updates[0].to_tag.as_str()), ("0", "1"));
        assert_eq!(updates[1].download_bytes, 3);
        assert!(diff_series(&images[..1]).is_empty());
    }
}
