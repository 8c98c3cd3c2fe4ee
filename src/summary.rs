use serde::Serialize;

use crate::diff::UpdateAnalysis;

/// Aggregate statistics over a sequence of updates.
///
/// An empty input yields an all-zero summary; check `update_count` first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub update_count: usize,
    pub avg_reuse_ratio: f64,
    pub avg_download_bytes: u64,
    pub min_download_bytes: u64,
    pub max_download_bytes: u64,
    pub total_download_bytes: u64,
}

impl Summary {
    pub fn from_updates(updates: &[UpdateAnalysis]) -> Self {
        if updates.is_empty() {
            return Self::default();
        }

        let downloads = updates.iter().map(|u| u.download_bytes);
        let total_download_bytes: u64 = downloads.clone().sum();

        // Updates between two empty images carry no reuse information.
        let ratios: Vec<f64> = updates
            .iter()
            .filter(|u| u.layer_total() > 0)
            .map(UpdateAnalysis::reuse_ratio)
            .collect();
        let avg_reuse_ratio = if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };

        Self {
            update_count: updates.len(),
            avg_reuse_ratio,
            avg_download_bytes: total_download_bytes / updates.len() as u64,
            min_download_bytes: downloads.clone().min().unwrap_or(0),
            max_download_bytes: downloads.max().unwrap_or(0),
            total_download_bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.update_count == 0
    }
}

/// Chunked series measured against the original series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    /// Original average download minus chunked average download; negative when chunking costs more.
    pub download_savings_bytes: i64,
    pub download_savings_ratio: f64,
    pub reuse_improvement: f64,
}

impl Comparison {
    pub fn between(chunked: &Summary, original: &Summary) -> Self {
        let download_savings_bytes =
            original.avg_download_bytes as i64 - chunked.avg_download_bytes as i64;
        let download_savings_ratio = if original.avg_download_bytes > 0 {
            download_savings_bytes as f64 / original.avg_download_bytes as f64
        } else {
            0.0
        };

        Self {
            download_savings_bytes,
            download_savings_ratio,
            reuse_improvement: chunked.avg_reuse_ratio - original.avg_reuse_ratio,
        }
    }
}
