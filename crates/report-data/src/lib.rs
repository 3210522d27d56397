pub mod aggregator;
pub mod cancel;
pub mod normalizer;
pub mod pipeline;
pub mod reader;

pub use aggregator::WeeklyAggregator;
pub use cancel::CancelFlag;
pub use normalizer::{normalize_lifecycle_state, LifecycleNormalizer, NormalizedRecords};
pub use pipeline::{PipelineConfig, PipelineMetadata, ReportPipeline};
pub use reader::{load_records, LoadedRecords, Sheet};
