//! Chart data: per-segment point arrays with a line color, the y-axis range
//! and the series average. Written out as a JSON document and rendered to a
//! PNG with plotters.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use plotters::style::register_font;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;

use crate::analyzer::{Analysis, Segment, Validity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineColor {
    Green,
    Red,
}

impl From<Validity> for LineColor {
    fn from(v: Validity) -> Self {
        match v {
            Validity::Valid => LineColor::Green,
            Validity::Invalid => LineColor::Red,
        }
    }
}

/// One line to draw: parallel x/y arrays, `None` where there is no price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLine {
    pub validity: Validity,
    pub color: LineColor,
    pub x: Vec<DateTime<Utc>>,
    pub y: Vec<Option<Decimal>>,
}

impl From<&Segment> for ChartLine {
    fn from(seg: &Segment) -> Self {
        Self {
            validity: seg.validity,
            color: seg.validity.into(),
            x: seg.points.iter().map(|p| p.timestamp).collect(),
            y: seg.points.iter().map(|p| p.price).collect(),
        }
    }
}

impl ChartLine {
    /// Contiguous priced stretches of the line; a `None` breaks the stroke.
    fn drawable_runs(&self) -> Vec<Vec<(DateTime<Utc>, f64)>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for (x, y) in self.x.iter().zip(&self.y) {
            match (*y).and_then(|p| p.to_f64()) {
                Some(price) => current.push((*x, price)),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDocument {
    pub product_id: u64,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub y_min: Decimal,
    /// `headroom * max price`; `None` when the series has no price at all.
    pub y_max: Option<Decimal>,
    pub average: Option<Decimal>,
    pub lines: Vec<ChartLine>,
}

impl ChartDocument {
    pub fn from_analysis(product_id: u64, analysis: &Analysis, y_axis_headroom: f64) -> Self {
        let headroom = Decimal::from_f64(y_axis_headroom).unwrap_or(Decimal::ONE);
        Self {
            product_id,
            title: "3 Monate Preisentwicklung".to_string(),
            x_label: "Datum".to_string(),
            y_label: "Preis in CHF".to_string(),
            y_min: Decimal::ZERO,
            y_max: analysis.max_price.map(|max| max.saturating_mul(headroom)),
            average: analysis.average,
            lines: analysis.segments.iter().map(ChartLine::from).collect(),
        }
    }

    /// Write as pretty JSON to `<dir>/<product_id>.chart.json` and return the path.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.chart.json", self.product_id));
        write_json(&path, self)?;
        Ok(path)
    }

    /// Render the lines to `<dir>/<product_id>.png` and return the path.
    /// Title, axis descriptions and tick labels need `font`; without a
    /// loadable font the image carries the lines only.
    pub fn render_png(&self, dir: &Path, font: Option<&Path>) -> Result<PathBuf> {
        let path = dir.join(format!("{}.png", self.product_id));
        let with_text = font.is_some_and(font_registered);
        self.draw(&path, with_text)
            .with_context(|| format!("failed to render {}", path.display()))?;
        tracing::info!(path = %path.display(), with_text, "wrote chart image");
        Ok(path)
    }

    fn draw(&self, path: &Path, with_text: bool) -> Result<()> {
        let root = BitMapBackend::new(path, PNG_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let (x_start, x_end) = self.x_range();
        let y_max = self
            .y_max
            .and_then(|v| v.to_f64())
            .filter(|v| *v > 0.0)
            .unwrap_or(1.0);
        let y_min = self.y_min.to_f64().unwrap_or(0.0).min(y_max);

        let mut builder = ChartBuilder::on(&root);
        builder.margin(20);
        if with_text {
            builder.caption(&self.title, ("sans-serif", 24)).x_label_area_size(40).y_label_area_size(60);
        }
        let mut chart = builder
            .build_cartesian_2d(x_start..x_end, y_min..y_max)
            .map_err(plot_error)?;

        if with_text {
            chart
                .configure_mesh()
                .x_desc(self.x_label.as_str())
                .y_desc(self.y_label.as_str())
                .x_label_formatter(&|d: &DateTime<Utc>| d.format("%b").to_string())
                .light_line_style(BLACK.mix(0.1))
                .draw()
                .map_err(plot_error)?;
        }

        for line in &self.lines {
            let color = match line.color {
                LineColor::Green => GREEN,
                LineColor::Red => RED,
            };
            for run in line.drawable_runs() {
                chart
                    .draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))
                    .map_err(plot_error)?;
                chart
                    .draw_series(run.iter().map(|p| Circle::new(*p, 3, color.filled())))
                    .map_err(plot_error)?;
            }
        }

        root.present().map_err(plot_error)?;
        Ok(())
    }

    /// First and last timestamp over all lines, widened to a day when they coincide.
    fn x_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let mut xs = self.lines.iter().flat_map(|l| l.x.iter().copied());
        let (start, end) = match xs.next() {
            Some(first) => xs.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x))),
            None => (DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::UNIX_EPOCH),
        };
        if start == end { (start, end + Duration::days(1)) } else { (start, end) }
    }
}

const PNG_SIZE: (u32, u32) = (1400, 700);

static FONT: OnceLock<bool> = OnceLock::new();

/// Register the TTF at `path` as plotters' "sans-serif". The first call wins
/// for the whole process; later paths are ignored.
fn font_registered(path: &Path) -> bool {
    *FONT.get_or_init(|| {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "chart font unavailable, drawing without text");
                return false;
            }
        };
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        let ok = register_font("sans-serif", FontStyle::Normal, bytes).is_ok();
        if !ok {
            tracing::warn!(path = %path.display(), "chart font is not a valid TTF/OTF, drawing without text");
        }
        ok
    })
}

fn plot_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("plotting failed: {e}")
}

/// Dump the raw endpoint response to `<dir>/<product_id>.json`.
pub fn write_raw_response(dir: &Path, product_id: u64, raw: &serde_json::Value) -> Result<PathBuf> {
    let path = dir.join(format!("{product_id}.json"));
    write_json(&path, raw)?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize chart output")?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote chart output");
    Ok(())
}
