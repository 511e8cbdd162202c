use anyhow::Result;
use bioeval_vision::{load_images, LoadMode, LoadOptions, NullViewer};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::path::Path;

fn write_sample(dir: &Path, name: &str, w: u32, h: u32) -> Result<()> {
    let img = RgbImage::from_pixel(w, h, Rgb([10, 200, 30]));
    DynamicImage::ImageRgb8(img).save(dir.join(name))?;
    Ok(())
}

#[test]
fn test_load_images_in_order() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    write_sample(dir.path(), "a.png", 4, 3)?;
    write_sample(dir.path(), "b.png", 6, 2)?;

    let mut viewer = NullViewer::new();
    let loaded = load_images(
        dir.path(),
        &["a.png", "b.png"],
        &LoadOptions::default(),
        &mut viewer,
    )?;

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].image().map(|i| i.dimensions()), Some((4, 3)));
    assert_eq!(loaded[1].image().map(|i| i.dimensions()), Some((6, 2)));
    assert!(loaded[1].path().ends_with("b.png"));
    assert!(viewer.shown().is_empty(), "display is off by default");
    Ok(())
}

#[test]
fn test_strict_mode_fails_on_missing_file() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    write_sample(dir.path(), "a.png", 2, 2)?;

    let mut viewer = NullViewer::new();
    let result = load_images(
        dir.path(),
        &["a.png", "missing.png"],
        &LoadOptions::default(),
        &mut viewer,
    );

    let err = result.expect_err("missing file must fail in strict mode");
    assert!(format!("{err}").contains("missing.png"));
    Ok(())
}

#[test]
fn test_permissive_mode_yields_sentinel() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    write_sample(dir.path(), "a.png", 2, 2)?;
    std::fs::write(dir.path().join("corrupt.png"), b"not an image")?;

    let options = LoadOptions {
        mode: LoadMode::Permissive,
        display: true,
        ..LoadOptions::default()
    };
    let mut viewer = NullViewer::new();
    let loaded = load_images(
        dir.path(),
        &["a.png", "corrupt.png", "missing.png"],
        &options,
        &mut viewer,
    )?;

    assert_eq!(loaded.len(), 3);
    assert!(loaded[0].is_readable());
    assert!(!loaded[1].is_readable());
    assert!(loaded[2].image().is_none());

    // only decoded images are displayed, then every window is closed
    assert_eq!(viewer.shown(), ["a.png"]);
    assert_eq!(viewer.open_windows(), 0);
    Ok(())
}
