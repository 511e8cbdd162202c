use anyhow::{Context, Result};
use bioeval_vision::{AugmentConfig, CommandViewer, LoadMode, LoadOptions, NullViewer, Viewer};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub static CONFIG_PATH: Lazy<&'static Path> =
    Lazy::new(|| Path::new(option_env!("BIOEVAL_CONFIG_PATH").unwrap_or("bioeval.toml")));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub plots_dir: PathBuf,
    pub split_seed: u64,
    pub images: ImageConfig,
    pub augment: AugmentConfig,
    pub plot: PlotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plots_dir: PathBuf::from("plots"),
            split_seed: crate::dataset::DEFAULT_SPLIT_SEED,
            images: ImageConfig::default(),
            augment: AugmentConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub load_mode: LoadMode,
    pub display_hold_ms: u64,
    /// External program used to show images and interactive plots.
    pub viewer_command: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            load_mode: LoadMode::Strict,
            display_hold_ms: 20,
            viewer_command: None,
        }
    }
}

impl ImageConfig {
    pub fn load_options(&self, display: bool) -> LoadOptions {
        LoadOptions {
            mode: self.load_mode,
            display,
            hold: Duration::from_millis(self.display_hold_ms),
        }
    }

    /// Viewer for image display and untagged plots. Without a configured
    /// command, displays are only logged.
    pub fn viewer(&self) -> Result<Box<dyn Viewer>> {
        let viewer: Box<dyn Viewer> = match &self.viewer_command {
            Some(cmd) => Box::new(CommandViewer::new(cmd.as_str())?),
            None => Box::new(NullViewer::new()),
        };
        Ok(viewer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub line_width: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            line_width: 2,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = load_config(Some(&dir.path().join("absent.toml")))?;
        assert_eq!(cfg, Config::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bioeval.toml");
        std::fs::write(
            &path,
            "plots_dir = \"out\"\n\n[augment]\nangles = [-5.0, 5.0]\n\n[images]\nload_mode = \"permissive\"\n",
        )?;

        let cfg = load_config(Some(&path))?;
        assert_eq!(cfg.plots_dir, PathBuf::from("out"));
        assert_eq!(cfg.augment.angles, vec![-5.0, 5.0]);
        assert_eq!(cfg.augment.zoom, 1.1);
        assert_eq!(cfg.images.load_mode, LoadMode::Permissive);
        assert_eq!(cfg.plot, PlotConfig::default());
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/bioeval.toml");
        let mut cfg = Config::default();
        cfg.split_seed = 7;
        cfg.images.viewer_command = Some("feh".into());

        save_config(&cfg, Some(&path))?;
        assert_eq!(load_config(Some(&path))?, cfg);
        Ok(())
    }

    #[test]
    fn test_load_options_from_config() {
        let images = ImageConfig {
            display_hold_ms: 50,
            ..ImageConfig::default()
        };
        let opts = images.load_options(true);
        assert!(opts.display);
        assert_eq!(opts.hold, Duration::from_millis(50));
        assert_eq!(opts.mode, LoadMode::Strict);
    }

    #[test]
    fn test_default_viewer_only_logs() -> Result<()> {
        let mut viewer = ImageConfig::default().viewer()?;
        let img = image::DynamicImage::new_rgb8(2, 2);
        viewer.show("x", &img, Duration::ZERO)?;
        viewer.close_all()?;
        Ok(())
    }
}
