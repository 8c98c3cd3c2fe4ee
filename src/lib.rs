pub mod analyze;
pub mod backends;
pub mod diff;
pub mod error;
pub mod image;
pub mod notifier;
pub mod pipeline;
pub mod report;
pub mod summary;
pub mod tags;

// Re-exports for easy access
pub use analyze::{AnalysisReport, Analyzer, SeriesAnalysis};
pub use backends::{Backend, ChunkRequest, PodmanBackend};
pub use diff::{diff, UpdateAnalysis};
pub use error::{Error, Result};
pub use image::{ImageInfo, LayerInfo};
pub use notifier::Notifier;
pub use pipeline::{SeriesBuilder, SeriesConfig, SeriesEntry, SeriesOutcome};
pub use summary::{Comparison, Summary};
pub use tags::{SortMode, TagQuery, TagSelector};
