pub mod images;
pub mod viewer;
pub mod warp;

// Re-export commonly used types
pub use images::{
    augment_gallery_image, load_images, sliding_window, AugmentConfig, LoadMode, LoadOptions,
    LoadedImage, SlidingWindows,
};
pub use viewer::{CommandViewer, NullViewer, Viewer};
