use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;

/// Sink for images that should be shown to a person rather than saved.
pub trait Viewer {
    /// Show `image` under `title`, keeping it up for at least `hold`.
    fn show(&mut self, title: &str, image: &DynamicImage, hold: Duration) -> Result<()>;

    /// Close every window opened by this viewer.
    fn close_all(&mut self) -> Result<()>;
}

/// Viewer that only logs what would have been shown.
#[derive(Debug, Default)]
pub struct NullViewer {
    shown: Vec<String>,
    open: usize,
}

impl NullViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Titles passed to `show`, in call order.
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    /// Number of windows currently considered open.
    pub fn open_windows(&self) -> usize {
        self.open
    }
}

impl Viewer for NullViewer {
    fn show(&mut self, title: &str, image: &DynamicImage, hold: Duration) -> Result<()> {
        log::debug!(
            "show '{}' ({}x{}) for {:?}",
            title,
            image.width(),
            image.height(),
            hold
        );
        self.shown.push(title.to_string());
        self.open += 1;
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        log::debug!("closing {} window(s)", self.open);
        self.open = 0;
        Ok(())
    }
}

/// Viewer that writes each image to a scratch directory and opens it with an
/// external program (e.g. `xdg-open`, `feh`).
///
/// Spawned processes are killed on `close_all` and when the viewer is dropped;
/// the scratch directory goes away with the viewer.
pub struct CommandViewer {
    program: String,
    children: Vec<Child>,
    counter: usize,
    scratch: TempDir,
}

impl CommandViewer {
    pub fn new(program: impl Into<String>) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("bioeval-view-")
            .tempdir()
            .context("creating viewer directory")?;
        Ok(Self {
            program: program.into(),
            scratch,
            children: Vec::new(),
            counter: 0,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn open_windows(&self) -> usize {
        self.children.len()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

impl Viewer for CommandViewer {
    fn show(&mut self, title: &str, image: &DynamicImage, hold: Duration) -> Result<()> {
        let name = format!("{:04}_{}.png", self.counter, sanitize(title));
        self.counter += 1;
        let path = self.scratch.path().join(name);
        image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;

        let child = Command::new(&self.program)
            .arg(&path)
            .spawn()
            .with_context(|| format!("launching viewer '{}'", self.program))?;
        log::debug!("viewer pid {} showing {}", child.id(), path.display());
        self.children.push(child);

        if !hold.is_zero() {
            std::thread::sleep(hold);
        }
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        for mut child in self.children.drain(..) {
            // The program may already have exited on its own.
            if let Err(e) = child.kill() {
                log::debug!("viewer pid {} already gone: {}", child.id(), e);
            }
            child.wait().ok();
        }
        Ok(())
    }
}

impl Drop for CommandViewer {
    fn drop(&mut self) {
        self.close_all().ok();
    }
}

fn sanitize(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("img 1/a.png"), "img_1_a_png");
        assert_eq!(sanitize("roc-curve"), "roc-curve");
    }

    #[test]
    fn test_null_viewer_tracks_windows() -> Result<()> {
        let mut viewer = NullViewer::new();
        let img = DynamicImage::new_rgb8(2, 2);
        viewer.show("a", &img, Duration::ZERO)?;
        viewer.show("b", &img, Duration::ZERO)?;
        assert_eq!(viewer.shown(), ["a", "b"]);
        assert_eq!(viewer.open_windows(), 2);
        viewer.close_all()?;
        assert_eq!(viewer.open_windows(), 0);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_command_viewer_reaps_children() -> Result<()> {
        let mut viewer = CommandViewer::new("true")?;
        let img = DynamicImage::new_rgb8(3, 3);
        viewer.show("probe", &img, Duration::ZERO)?;
        assert_eq!(viewer.open_windows(), 1);
        viewer.close_all()?;
        assert_eq!(viewer.open_windows(), 0);
        Ok(())
    }

    #[test]
    fn test_command_viewers_get_fresh_scratch_dirs() -> Result<()> {
        let first = CommandViewer::new("true")?;
        let second = CommandViewer::new("true")?;
        assert_ne!(first.scratch_dir(), second.scratch_dir());
        assert_eq!(std::fs::read_dir(first.scratch_dir())?.count(), 0);

        let kept = first.scratch_dir().to_path_buf();
        drop(first);
        assert!(!kept.exists());
        assert!(second.scratch_dir().exists());
        Ok(())
    }
}
