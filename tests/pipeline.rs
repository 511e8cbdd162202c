use anyhow::Result;
use bioeval::config::Config;
use bioeval::dataset::{load_samples, split_by_label_membership, split_train_test};
use bioeval::plot::{plot_roc, Figure};
use bioeval::{augment_gallery_image, compute_roc, load_images, NullViewer};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Walk one experiment end to end: list file, splits, images, augmentation,
/// scores, curve and plot.
#[test]
fn test_experiment_flow() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let cfg = Config {
        plots_dir: dir.path().join("plots"),
        ..Config::default()
    };

    let mut list = String::new();
    for subject in 0..4u8 {
        for shot in 0..2u8 {
            let name = format!("{subject}_{shot}.png");
            let img = RgbImage::from_pixel(16, 12, Rgb([subject * 60, shot * 100, 50]));
            DynamicImage::ImageRgb8(img).save(dir.path().join(&name))?;
            list.push_str(&format!("{name} {subject}\n"));
        }
    }
    let list_path = dir.path().join("list.txt");
    std::fs::write(&list_path, list)?;

    let samples = load_samples(&list_path)?;
    let partition = split_by_label_membership(&samples, 0.5, &mut StdRng::seed_from_u64(5))?;
    assert_eq!(partition.known.len(), 4);
    assert_eq!(partition.unknown.len(), 4);

    let split = split_train_test(&partition.known, 0.5)?;
    assert_eq!(split.train.len(), 2);

    let names: Vec<&str> = split.train.iter().map(|s| s.path.as_str()).collect();
    let mut viewer = NullViewer::new();
    let gallery = load_images(
        dir.path(),
        &names,
        &cfg.images.load_options(true),
        &mut viewer,
    )?;
    assert_eq!(viewer.shown().len(), 2);
    assert_eq!(viewer.open_windows(), 0);

    for loaded in &gallery {
        let image = loaded.image().expect("strict mode only returns decoded images");
        let augmented = augment_gallery_image(image, &cfg.augment)?;
        assert_eq!(augmented.len(), 2 + cfg.augment.angles.len());
        assert!(augmented.iter().all(|a| a.dimensions() == (16, 12)));
    }

    let labels = vec![vec![("0", 1), ("1", 0)], vec![("1", 1), ("0", 0)]];
    let scores = vec![vec![("0", 0.8), ("1", 0.3)], vec![("1", 0.7), ("0", 0.2)]];
    let roc = compute_roc(&labels, &scores)?;

    let mut figure = Figure::from_config(&cfg);
    let saved = plot_roc(&mut figure, &[roc], Some("flow"), &mut viewer)?;
    assert!(saved.is_some_and(|p| p.exists()));
    Ok(())
}
