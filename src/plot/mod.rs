//! CMC, Precision-Recall, ROC and per-probe score plots.
//!
//! Every function clears the `Figure` it is given, draws, and then either
//! writes `<plots_dir>/<name>.png` or hands the raster to a `Viewer`.

pub mod canvas;
pub mod palette;

use anyhow::{Context, Result};
use bioeval_vision::Viewer;
use image::Rgb;
use std::path::PathBuf;

use crate::metrics::{Curve, PrecisionRecall, Roc};
pub use canvas::{Figure, LegendEntry, LegendLoc, LineStyle};

const Y_MAX: f64 = 1.05;

fn color(name: &str) -> Result<Rgb<u8>> {
    palette::named(name).with_context(|| format!("unknown color '{name}'"))
}

/// Cumulative Matching Characteristic: identification rate by rank.
///
/// `scores[r]` is the fraction of probes whose true identity appears within
/// the top `r + 1` gallery matches.
pub fn plot_cmc(figure: &mut Figure, scores: &[f64], tag: &str) -> Result<PathBuf> {
    log::info!("CMC curve {:?}", scores);

    let ranks: Vec<f64> = (0..scores.len()).map(|r| r as f64).collect();

    figure.clear();
    figure.set_xlim(0.0, scores.len().max(1) as f64);
    figure.set_ylim(0.0, Y_MAX);
    figure.set_labels("Rank", "Accuracy Rate");
    figure.set_title("Cumulative Matching Characteristic");
    figure.plot_line(&ranks, scores, color("blue")?, LineStyle::Solid);

    figure.save(&format!("cmc_curve_{tag}.png"))
}

fn overlay<C: Curve>(figure: &mut Figure, results: &[C]) {
    for (index, (curve, (name, color))) in results.iter().zip(palette::cycle()).enumerate() {
        let label = curve.legend(index);
        log::debug!("{} drawn in {}", label, name);
        figure.plot_line(curve.xs(), curve.ys(), color, LineStyle::Solid);
        figure.add_legend(label, color);
    }
}

fn present(
    figure: &mut Figure,
    prefix: &str,
    tag: Option<&str>,
    viewer: &mut dyn Viewer,
) -> Result<Option<PathBuf>> {
    for entry in figure.legend() {
        log::info!("{}: {}", figure.title(), entry.label);
    }
    match tag {
        Some(tag) => figure.save(&format!("{prefix}_{tag}.png")).map(Some),
        None => {
            figure.show(viewer)?;
            Ok(None)
        }
    }
}

/// Overlay precision-recall curves, one color per result.
///
/// Saves to `precision_recall_<tag>.png` when `tag` is given, otherwise
/// shows the figure on `viewer`.
pub fn plot_precision_recall(
    figure: &mut Figure,
    results: &[PrecisionRecall],
    tag: Option<&str>,
    viewer: &mut dyn Viewer,
) -> Result<Option<PathBuf>> {
    figure.clear();
    figure.set_xlim(0.0, 1.0);
    figure.set_ylim(0.0, Y_MAX);
    figure.set_labels("Recall", "Precision");
    figure.set_title("Precision-Recall Curve");
    figure.set_legend_loc(LegendLoc::LowerLeft);
    overlay(figure, results);

    present(figure, "precision_recall", tag, viewer)
}

/// Overlay ROC curves plus the dashed chance diagonal.
///
/// Saves to `roc_curve_<tag>.png` when `tag` is given, otherwise shows the
/// figure on `viewer`.
pub fn plot_roc(
    figure: &mut Figure,
    results: &[Roc],
    tag: Option<&str>,
    viewer: &mut dyn Viewer,
) -> Result<Option<PathBuf>> {
    figure.clear();
    figure.set_xlim(0.0, 1.0);
    figure.set_ylim(0.0, Y_MAX);
    figure.set_labels("False Positive Rate", "True Positive Rate");
    figure.set_title("Receiver Operating Characteristic");
    figure.set_legend_loc(LegendLoc::LowerRight);
    overlay(figure, results);
    figure.plot_line(&[0.0, 1.0], &[0.0, 1.0], color("navy")?, LineStyle::Dashed);

    present(figure, "roc_curve", tag, viewer)
}

/// Bar chart of one probe's score against every gallery individual.
///
/// The file is `<tag>_<probe>_<top_match>.png`, with `_ERROR` appended when
/// the best-ranked individual is not the probe itself.
pub fn plot_probe_histogram(
    figure: &mut Figure,
    values: &[f64],
    tag: &str,
    probe: &str,
    top_match: &str,
) -> Result<PathBuf> {
    let lo = values.iter().copied().fold(0.0_f64, f64::min);
    let hi = values.iter().copied().fold(0.0_f64, f64::max);

    figure.clear();
    figure.set_xlim(-0.5, values.len().max(1) as f64 - 0.5);
    figure.set_ylim(lo, if hi > lo { hi * Y_MAX } else { lo + 1.0 });
    figure.set_labels("Individual", "Score");
    figure.set_title(&format!("Probe {probe}"));
    let blue = color("blue")?;
    for (i, &value) in values.iter().enumerate() {
        figure.bar(i as f64, 0.8, value, blue);
    }

    let suffix = if probe == top_match { "" } else { "_ERROR" };
    figure.save(&format!("{tag}_{probe}_{top_match}{suffix}.png"))
}
