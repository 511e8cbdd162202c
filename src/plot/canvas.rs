use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use bioeval_vision::Viewer;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, PlotConfig};

const MARGIN_LEFT: u32 = 50;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 30;
const MARGIN_BOTTOM: u32 = 40;
const MIN_WIDTH: u32 = 160;
const MIN_HEIGHT: u32 = 120;
const TICKS: u32 = 5;
const DASH_PX: f64 = 8.0;

const TITLE_PX: f32 = 16.0;
const LABEL_PX: f32 = 13.0;
const TICK_PX: f32 = 10.0;
const LEGEND_PX: f32 = 11.0;
const SWATCH_W: u32 = 20;

static FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const LEGEND_BG: Rgb<u8> = Rgb([245, 245, 245]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendLoc {
    LowerLeft,
    LowerRight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb<u8>,
}

/// Raster drawing surface for one plot at a time.
///
/// Every plotting function clears the figure before drawing, so one figure
/// can be reused for any number of plots. Figures are independent values;
/// give each thread its own.
#[derive(Debug, Clone)]
pub struct Figure {
    image: RgbImage,
    line_width: u32,
    plots_dir: PathBuf,
    x_range: (f64, f64),
    y_range: (f64, f64),
    title: String,
    x_label: String,
    y_label: String,
    legend: Vec<LegendEntry>,
    legend_loc: LegendLoc,
}

impl Figure {
    pub fn new(config: &PlotConfig, plots_dir: impl Into<PathBuf>) -> Self {
        let width = config.width.max(MIN_WIDTH);
        let height = config.height.max(MIN_HEIGHT);
        let mut figure = Self {
            image: RgbImage::from_pixel(width, height, WHITE),
            line_width: config.line_width.max(1),
            plots_dir: plots_dir.into(),
            x_range: (0.0, 1.0),
            y_range: (0.0, 1.0),
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            legend: Vec::new(),
            legend_loc: LegendLoc::LowerLeft,
        };
        figure.clear();
        figure
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.plot, cfg.plots_dir.clone())
    }

    /// Reset pixels, limits, labels and legend.
    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = WHITE;
        }
        self.x_range = (0.0, 1.0);
        self.y_range = (0.0, 1.0);
        self.title.clear();
        self.x_label.clear();
        self.y_label.clear();
        self.legend.clear();
        self.legend_loc = LegendLoc::LowerLeft;
    }

    pub fn set_xlim(&mut self, lo: f64, hi: f64) {
        self.x_range = (lo, hi);
    }

    pub fn set_ylim(&mut self, lo: f64, hi: f64) {
        self.y_range = (lo, hi);
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_labels(&mut self, x_label: &str, y_label: &str) {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
    }

    pub fn set_legend_loc(&mut self, loc: LegendLoc) {
        self.legend_loc = loc;
    }

    pub fn add_legend(&mut self, label: impl Into<String>, color: Rgb<u8>) {
        self.legend.push(LegendEntry {
            label: label.into(),
            color,
        });
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn labels(&self) -> (&str, &str) {
        (&self.x_label, &self.y_label)
    }

    pub fn legend(&self) -> &[LegendEntry] {
        &self.legend
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    fn plot_area(&self) -> (f64, f64, f64, f64) {
        let left = MARGIN_LEFT as f64;
        let top = MARGIN_TOP as f64;
        let right = (self.image.width() - MARGIN_RIGHT - 1) as f64;
        let bottom = (self.image.height() - MARGIN_BOTTOM - 1) as f64;
        (left, top, right, bottom)
    }

    /// Map data coordinates to pixel coordinates.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (left, top, right, bottom) = self.plot_area();
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        let fx = if x1 != x0 { (x - x0) / (x1 - x0) } else { 0.0 };
        let fy = if y1 != y0 { (y - y0) / (y1 - y0) } else { 0.0 };
        (left + fx * (right - left), bottom - fy * (bottom - top))
    }

    fn inside_plot(&self, px: i64, py: i64) -> bool {
        let (left, top, right, bottom) = self.plot_area();
        px >= left as i64 && px <= right as i64 && py >= top as i64 && py <= bottom as i64
    }

    fn stamp(&mut self, cx: f64, cy: f64, color: Rgb<u8>) {
        let half = (self.line_width as i64 - 1) / 2;
        let (cx, cy) = (cx.round() as i64, cy.round() as i64);
        for dy in -half..=(self.line_width as i64 - 1 - half) {
            for dx in -half..=(self.line_width as i64 - 1 - half) {
                let (px, py) = (cx + dx, cy + dy);
                if self.inside_plot(px, py) {
                    self.image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }

    /// Draw a polyline through `(xs[i], ys[i])` in data coordinates. Extra
    /// points in the longer slice are ignored.
    pub fn plot_line<'a>(
        &mut self,
        xs: impl IntoIterator<Item = &'a f64>,
        ys: impl IntoIterator<Item = &'a f64>,
        color: Rgb<u8>,
        style: LineStyle,
    ) {
        let points: Vec<(f64, f64)> = xs
            .into_iter()
            .zip(ys)
            .map(|(&x, &y)| self.to_pixel(x, y))
            .collect();

        if let [(x, y)] = points.as_slice() {
            self.stamp(*x, *y, color);
            return;
        }

        let mut travelled = 0.0;
        for pair in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            let (dx, dy) = (x1 - x0, y1 - y0);
            let length = (dx * dx + dy * dy).sqrt();
            if let Some((t0, t1)) = self.clip_segment((x0, y0), (dx, dy)) {
                let steps = ((t1 - t0) * length).ceil().max(1.0) as usize;
                for s in 0..=steps {
                    let t = t0 + (t1 - t0) * s as f64 / steps as f64;
                    let along = travelled + t * length;
                    if style == LineStyle::Dashed && (along / DASH_PX) as u64 % 2 == 1 {
                        continue;
                    }
                    self.stamp(x0 + t * dx, y0 + t * dy, color);
                }
            }
            travelled += length;
        }
    }

    /// Liang-Barsky: the parameter range of `p + t * d`, `t` in `[0, 1]`,
    /// that falls inside the plot area grown by one line width.
    fn clip_segment(&self, (x0, y0): (f64, f64), (dx, dy): (f64, f64)) -> Option<(f64, f64)> {
        if !(x0.is_finite() && y0.is_finite() && dx.is_finite() && dy.is_finite()) {
            return None;
        }
        let (left, top, right, bottom) = self.plot_area();
        let pad = self.line_width as f64;
        let edges = [
            (-dx, x0 - (left - pad)),
            (dx, (right + pad) - x0),
            (-dy, y0 - (top - pad)),
            (dy, (bottom + pad) - y0),
        ];

        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
            } else {
                let r = q / p;
                if p < 0.0 {
                    t0 = t0.max(r);
                } else {
                    t1 = t1.min(r);
                }
            }
        }
        (t0 <= t1).then_some((t0, t1))
    }

    /// Fill a bar of `width` data units centered on `x`, from 0 to `value`.
    pub fn bar(&mut self, x: f64, width: f64, value: f64, color: Rgb<u8>) {
        let (px0, py0) = self.to_pixel(x - width / 2.0, 0.0);
        let (px1, py1) = self.to_pixel(x + width / 2.0, value);
        let (xa, xb) = (px0.min(px1).round() as i64, px0.max(px1).round() as i64);
        let (ya, yb) = (py0.min(py1).round() as i64, py0.max(py1).round() as i64);
        for py in ya..=yb {
            for px in xa..=xb {
                if self.inside_plot(px, py) {
                    self.image.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }

    fn draw_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>, fill: bool) {
        let (w, h) = self.image.dimensions();
        for y in y0..=y1.min(h - 1) {
            for x in x0..=x1.min(w - 1) {
                let edge = x == x0 || x == x1 || y == y0 || y == y1;
                if fill || edge {
                    self.image.put_pixel(x, y, color);
                }
            }
        }
    }

    fn draw_text(&mut self, font: &FontRef, text: &str, x: i32, y: i32, px: f32) {
        draw_text_mut(&mut self.image, BLACK, x, y, PxScale::from(px), font, text);
    }

    fn draw_axes(&mut self, font: &FontRef) {
        let (left, top, right, bottom) = self.plot_area();
        let (l, t, r, b) = (left as u32, top as u32, right as u32, bottom as u32);
        self.draw_rect(l - 1, t - 1, r + 1, b + 1, BLACK, false);

        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        for i in 0..=TICKS {
            let tx = l + (r - l) * i / TICKS;
            let ty = b - (b - t) * i / TICKS;
            for d in 2..=5 {
                self.image.put_pixel(tx, b + d, BLACK);
                self.image.put_pixel(l - d, ty, BLACK);
            }

            let frac = i as f64 / TICKS as f64;
            let xt = tick_label(x0 + frac * (x1 - x0), x1 - x0);
            let (w, _) = text_size(PxScale::from(TICK_PX), font, &xt);
            self.draw_text(font, &xt, tx as i32 - w as i32 / 2, (b + 7) as i32, TICK_PX);

            let yt = tick_label(y0 + frac * (y1 - y0), y1 - y0);
            let (w, h) = text_size(PxScale::from(TICK_PX), font, &yt);
            self.draw_text(font, &yt, l.saturating_sub(7 + w) as i32, ty as i32 - h as i32 / 2, TICK_PX);
        }
    }

    fn draw_titles(&mut self, font: &FontRef) {
        let (left, _, right, bottom) = self.plot_area();
        let center = ((left + right) / 2.0) as i32;

        let title = self.title.clone();
        let (w, _) = text_size(PxScale::from(TITLE_PX), font, &title);
        self.draw_text(font, &title, center - w as i32 / 2, 7, TITLE_PX);

        let x_label = self.x_label.clone();
        let (w, _) = text_size(PxScale::from(LABEL_PX), font, &x_label);
        self.draw_text(font, &x_label, center - w as i32 / 2, bottom as i32 + 22, LABEL_PX);

        if self.y_label.is_empty() {
            return;
        }
        // Rendered horizontally off-canvas, then turned to read bottom-up.
        let (w, _) = text_size(PxScale::from(LABEL_PX), font, &self.y_label);
        let mut strip = RgbImage::from_pixel(w + 4, LABEL_PX as u32 + 4, WHITE);
        draw_text_mut(&mut strip, BLACK, 2, 2, PxScale::from(LABEL_PX), font, &self.y_label);
        let strip = imageops::rotate270(&strip);
        let mid = (MARGIN_TOP as i64 + bottom as i64) / 2;
        imageops::overlay(&mut self.image, &strip, 2, mid - strip.height() as i64 / 2);
    }

    fn draw_legend(&mut self, font: &FontRef) {
        if self.legend.is_empty() {
            return;
        }
        let (left, top, right, bottom) = self.plot_area();
        let scale = PxScale::from(LEGEND_PX);
        let text_w = self
            .legend
            .iter()
            .map(|e| text_size(scale, font, &e.label).0)
            .max()
            .unwrap_or(0);
        let row = (self.line_width.max(2) + 6).max(LEGEND_PX as u32 + 3);
        let box_w = (SWATCH_W + text_w + 16).min((right - left) as u32 - 12);
        let box_h = row * self.legend.len() as u32 + 6;
        let y1 = bottom as u32 - 6;
        let y0 = y1.saturating_sub(box_h).max(top as u32);
        let x0 = match self.legend_loc {
            LegendLoc::LowerLeft => left as u32 + 6,
            LegendLoc::LowerRight => right as u32 - 6 - box_w,
        };
        self.draw_rect(x0, y0, x0 + box_w, y1, LEGEND_BG, true);
        self.draw_rect(x0, y0, x0 + box_w, y1, BLACK, false);

        let entries: Vec<LegendEntry> = self.legend.clone();
        for (i, entry) in entries.iter().enumerate() {
            let sy = y0 + 4 + row * i as u32;
            let mid = sy + row / 2;
            let sh = self.line_width.max(2);
            self.draw_rect(x0 + 5, mid - sh / 2, x0 + 5 + SWATCH_W, mid - sh / 2 + sh, entry.color, true);
            self.draw_text(
                font,
                &entry.label,
                (x0 + SWATCH_W + 10) as i32,
                mid as i32 - LEGEND_PX as i32 / 2 - 1,
                LEGEND_PX,
            );
        }
    }

    fn finish(&mut self) -> Result<()> {
        let font = FontRef::try_from_slice(FONT).context("loading plot font")?;
        self.draw_axes(&font);
        self.draw_titles(&font);
        self.draw_legend(&font);
        log::debug!(
            "figure '{}' [{} vs {}], legend: {:?}",
            self.title,
            self.y_label,
            self.x_label,
            self.legend.iter().map(|e| e.label.as_str()).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Render decorations and write the figure as `<plots_dir>/<file_name>`,
    /// overwriting any existing file.
    pub fn save(&mut self, file_name: &str) -> Result<PathBuf> {
        self.finish()?;
        std::fs::create_dir_all(&self.plots_dir)
            .with_context(|| format!("creating plots dir {}", self.plots_dir.display()))?;
        let path = self.plots_dir.join(file_name);
        self.image
            .save(&path)
            .with_context(|| format!("saving plot {}", path.display()))?;
        log::info!("saved {} to {}", self.title, path.display());
        Ok(path)
    }

    /// Render decorations and hand the figure to `viewer`.
    pub fn show(&mut self, viewer: &mut dyn Viewer) -> Result<()> {
        self.finish()?;
        let snapshot = DynamicImage::ImageRgb8(self.image.clone());
        viewer.show(&self.title, &snapshot, Duration::ZERO)
    }
}

fn tick_label(value: f64, span: f64) -> String {
    match span.abs() {
        s if s >= 10.0 => format!("{value:.0}"),
        s if s >= 2.0 => format!("{value:.1}"),
        _ => format!("{value:.2}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figure() -> Figure {
        Figure::new(
            &PlotConfig {
                width: 200,
                height: 150,
                line_width: 1,
            },
            "plots",
        )
    }

    #[test]
    fn test_to_pixel_corners() {
        let fig = figure();
        let (left, top, right, bottom) = fig.plot_area();
        assert_eq!(fig.to_pixel(0.0, 0.0), (left, bottom));
        assert_eq!(fig.to_pixel(1.0, 1.0), (right, top));
    }

    #[test]
    fn test_line_is_drawn_and_clear_resets() {
        let mut fig = figure();
        let red = Rgb([255, 0, 0]);
        fig.plot_line(&[0.0, 1.0], &[0.0, 1.0], red, LineStyle::Solid);
        fig.add_legend("diag", red);
        assert!(fig.image().pixels().any(|p| *p == red));

        fig.clear();
        assert!(fig.image().pixels().all(|p| *p == WHITE));
        assert!(fig.legend().is_empty());
    }

    #[test]
    fn test_dashed_line_has_gaps() {
        let mut solid = figure();
        let mut dashed = figure();
        let navy = Rgb([0, 0, 128]);
        solid.plot_line(&[0.0, 1.0], &[0.0, 1.0], navy, LineStyle::Solid);
        dashed.plot_line(&[0.0, 1.0], &[0.0, 1.0], navy, LineStyle::Dashed);

        let count = |f: &Figure| f.image().pixels().filter(|p| **p == navy).count();
        assert!(count(&dashed) > 0);
        assert!(count(&dashed) < count(&solid));
    }

    #[test]
    fn test_points_outside_limits_are_clipped() {
        let mut fig = figure();
        let green = Rgb([0, 128, 0]);
        fig.plot_line(&[2.0, 3.0], &[2.0, 3.0], green, LineStyle::Solid);
        assert!(fig.image().pixels().all(|p| *p != green));
    }

    #[test]
    fn test_far_out_of_range_segment_is_clipped() {
        let mut fig = figure();
        let red = Rgb([255, 0, 0]);
        let (start, end) = (fig.to_pixel(0.0, 0.0), fig.to_pixel(1.0, 1e12));
        let (t0, t1) = fig
            .clip_segment(start, (end.0 - start.0, end.1 - start.1))
            .expect("segment starts inside the plot");
        assert_eq!(t0, 0.0);
        assert!(t1 < 1e-6);

        fig.plot_line(&[0.0, 1.0], &[0.0, 1e12], red, LineStyle::Solid);
        assert!(fig.image().pixels().any(|p| *p == red));
    }

    #[test]
    fn test_non_finite_segment_is_skipped() {
        let fig = figure();
        assert_eq!(fig.clip_segment((0.0, 0.0), (f64::INFINITY, 1.0)), None);
    }

    #[test]
    fn test_title_is_rendered() -> Result<()> {
        let band = |f: &Figure| {
            let (left, _, right, _) = f.plot_area();
            let mut dark = 0;
            for y in 0..22 {
                for x in left as u32..right as u32 {
                    if f.image().get_pixel(x, y).0.iter().all(|&c| c < 128) {
                        dark += 1;
                    }
                }
            }
            dark
        };

        let mut plain = figure();
        plain.finish()?;
        assert_eq!(band(&plain), 0);

        let mut titled = figure();
        titled.set_title("Receiver Operating Characteristic");
        titled.finish()?;
        assert!(band(&titled) > 0);
        Ok(())
    }

    #[test]
    fn test_legend_text_is_rendered() -> Result<()> {
        let red = Rgb([255, 0, 0]);
        let mut first = figure();
        first.add_legend("ROC curve 1 (area = 0.75)", red);
        first.finish()?;

        let mut second = figure();
        second.add_legend("ROC curve 1 (area = 0.31)", red);
        second.finish()?;

        assert_ne!(first.image(), second.image());
        Ok(())
    }
}
