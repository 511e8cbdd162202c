use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::viewer::Viewer;
use crate::warp;

/// How `load_images` reacts to a file that cannot be read or decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Fail on the first unreadable file.
    #[default]
    Strict,
    /// Log and keep going, yielding `LoadedImage::Unreadable`.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub mode: LoadMode,
    pub display: bool,
    pub hold: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: LoadMode::Strict,
            display: false,
            hold: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadedImage {
    Decoded { path: PathBuf, image: DynamicImage },
    Unreadable { path: PathBuf },
}

impl LoadedImage {
    pub fn path(&self) -> &Path {
        match self {
            Self::Decoded { path, .. } | Self::Unreadable { path } => path,
        }
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Decoded { image, .. } => Some(image),
            Self::Unreadable { .. } => None,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Decoded { .. })
    }
}

/// Load `dir/name` for every name as an RGB image.
///
/// With `options.display` set each decoded image goes to `viewer` for
/// `options.hold`, and all viewer windows are closed after the last one.
pub fn load_images<S: AsRef<str>>(
    dir: &Path,
    names: &[S],
    options: &LoadOptions,
    viewer: &mut dyn Viewer,
) -> Result<Vec<LoadedImage>> {
    let mut loaded = Vec::with_capacity(names.len());

    for name in names {
        let name = name.as_ref();
        let path = dir.join(name);

        let decoded = image::open(&path).map(|img| DynamicImage::ImageRgb8(img.to_rgb8()));
        let entry = match (decoded, options.mode) {
            (Ok(image), _) => {
                log::debug!("loaded {} ({}x{})", path.display(), image.width(), image.height());
                LoadedImage::Decoded { path, image }
            }
            (Err(e), LoadMode::Strict) => {
                return Err(e).with_context(|| format!("loading image {}", path.display()));
            }
            (Err(e), LoadMode::Permissive) => {
                log::warn!("unreadable image {}: {}", path.display(), e);
                LoadedImage::Unreadable { path }
            }
        };

        if options.display {
            if let Some(image) = entry.image() {
                viewer.show(name, image, options.hold)?;
            }
        }
        loaded.push(entry);
    }

    if options.display {
        viewer.close_all()?;
    }

    Ok(loaded)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Rotation angles in degrees, counter-clockwise positive.
    pub angles: Vec<f32>,
    pub zoom: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            angles: vec![-5.0],
            zoom: 1.1,
        }
    }
}

/// Expand one gallery image into `[original, mirrored, rotated...]`.
///
/// Every output keeps the input dimensions; rotations pivot on the image
/// center and scale by `config.zoom`.
pub fn augment_gallery_image(
    image: &DynamicImage,
    config: &AugmentConfig,
) -> Result<Vec<DynamicImage>> {
    let mut samples = Vec::with_capacity(2 + config.angles.len());
    samples.push(image.clone());
    samples.push(image.fliph());

    let (w, h) = image.dimensions();
    let center = (w as f32 / 2.0, h as f32 / 2.0);
    for &angle in &config.angles {
        let m = warp::rotation_matrix(center, angle, config.zoom);
        let rotated = warp::warp_affine(image, &m)
            .with_context(|| format!("rotating gallery image by {} deg", angle))?;
        samples.push(DynamicImage::ImageRgb8(rotated));
    }

    Ok(samples)
}

/// Row-major windows over an image, clipped at the right and bottom edges.
pub struct SlidingWindows<'a> {
    image: &'a DynamicImage,
    window: (u32, u32),
    step: u32,
    x: u32,
    y: u32,
}

impl Iterator for SlidingWindows<'_> {
    type Item = (u32, u32, DynamicImage);

    fn next(&mut self) -> Option<Self::Item> {
        let (img_w, img_h) = self.image.dimensions();
        if img_w == 0 || self.y >= img_h {
            return None;
        }

        let (x, y) = (self.x, self.y);
        let w = self.window.0.min(img_w - x);
        let h = self.window.1.min(img_h - y);
        let crop = self.image.crop_imm(x, y, w, h);

        self.x = self.x.saturating_add(self.step);
        if self.x >= img_w {
            self.x = 0;
            self.y = self.y.saturating_add(self.step);
        }

        Some((x, y, crop))
    }
}

/// Slide a `(width, height)` window over `image` in `step` pixel increments.
pub fn sliding_window(
    image: &DynamicImage,
    window: (u32, u32),
    step: u32,
) -> Result<SlidingWindows<'_>> {
    if step == 0 {
        anyhow::bail!("sliding window step must be positive");
    }
    if window.0 == 0 || window.1 == 0 {
        anyhow::bail!("sliding window must be non-empty, got {}x{}", window.0, window.1);
    }
    Ok(SlidingWindows {
        image,
        window,
        step,
        x: 0,
        y: 0,
    })
}
