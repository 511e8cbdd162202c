pub mod config;
pub mod dataset;
pub mod metrics;
pub mod plot;

// Re-export vision types for convenience
pub use bioeval_vision::{
    augment_gallery_image, images, load_images, sliding_window, viewer, warp, AugmentConfig,
    CommandViewer, LoadMode, LoadOptions, LoadedImage, NullViewer, Viewer,
};
pub use dataset::{LabelPartition, LabeledSample, TrainTestSplit};
pub use metrics::{compute_precision_recall, compute_roc, Curve, MetricError, PrecisionRecall, Roc};
pub use plot::Figure;
