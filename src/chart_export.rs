//! Bar chart of a pivot result, exported to PNG (plotters bitmap) or EPS (minimal PostScript).

use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::config::parse_hex;
use crate::error::DashboardError;
use crate::pivot::PivotResult;
use crate::table_text::BLANK_LABEL;

/// Escape a string for PostScript ( and ) and \.
fn ps_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Standard PostScript fonts have no Turkish glyphs.
fn ps_text(s: &str) -> String {
    let folded: String = s
        .chars()
        .map(|c| match c {
            'ı' | 'İ' => 'i',
            'ş' => 's',
            'Ş' => 'S',
            'ğ' => 'g',
            'Ğ' => 'G',
            'ö' => 'o',
            'Ö' => 'O',
            'ü' => 'u',
            'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect();
    ps_escape(&folded)
}

/// Generate "nice" tick values in [min, max] with roughly max_ticks steps.
fn nice_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<f64> {
    let range = if max > min { max - min } else { 1.0 };
    if max_ticks == 0 {
        return vec![min];
    }
    let raw_step = range / (max_ticks as f64).max(1.0);
    let mag = 10.0_f64.powf(raw_step.log10().floor());
    let norm = if mag > 0.0 { raw_step / mag } else { raw_step };
    let step = if norm <= 1.0 {
        mag
    } else if norm <= 2.0 {
        2.0 * mag
    } else if norm <= 5.0 {
        5.0 * mag
    } else {
        10.0 * mag
    };
    let step = step.max(f64::EPSILON);
    let start = (min / step).floor() * step;
    let mut ticks = Vec::new();
    let mut v = start;
    while v <= max + step * 0.001 {
        if v >= min - step * 0.001 {
            ticks.push(v);
        }
        v += step;
        if ticks.len() > max_ticks + 2 {
            break;
        }
    }
    if ticks.is_empty() {
        ticks.push(min);
    }
    ticks
}

/// Compact tick text: integer when whole, else 1-2 decimals.
fn format_tick(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let abs = v.abs();
    if abs >= 100_000.0 {
        format!("{:e}", v)
    } else if (v - v.round()).abs() < 1e-10 {
        format!("{:.0}", v)
    } else if abs >= 1.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn short_label(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

pub const DEFAULT_BAR_COLOR: (u8, u8, u8) = (31, 119, 180);

/// Bar fill from the `chart_bar` theme color. Only hex colors carry exact RGB.
pub fn bar_color(spec: &str) -> (u8, u8, u8) {
    parse_hex(spec).unwrap_or(DEFAULT_BAR_COLOR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExportFormat {
    Png,
    Eps,
}

impl ChartExportFormat {
    pub const ALL: [Self; 2] = [Self::Png, Self::Eps];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Eps => "eps",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Eps => "EPS",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }
}

/// One bar per pivot row, in pivot order.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<(String, f64)>,
}

impl BarChart {
    /// Bars of the chart measure. Rows whose value is absent are left out.
    pub fn from_pivot(result: &PivotResult) -> Result<Self> {
        let measure = result.chart_measure();
        let labels = result
            .frame
            .column(&result.row_column)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let values = result
            .frame
            .column(measure.label())?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let bars: Vec<(String, f64)> = labels
            .str()?
            .into_iter()
            .zip(values.f64()?)
            .filter_map(|(label, value)| {
                let value = value.filter(|v| v.is_finite())?;
                Some((label.unwrap_or(BLANK_LABEL).to_string(), value))
            })
            .collect();
        if bars.is_empty() {
            return Err(DashboardError::NoChartData.into());
        }
        Ok(Self {
            x_label: result.row_column.clone(),
            y_label: measure.label().to_string(),
            bars,
        })
    }

    /// Value range with zero always inside, so bars grow from the axis.
    fn y_bounds(&self) -> (f64, f64) {
        let min = self.bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::min);
        let max = self.bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
        if max > min {
            (min, max * 1.05)
        } else {
            (min, min + 1.0)
        }
    }
}

/// Write the chart in the format its extension names (PNG otherwise).
pub fn write_chart(path: &Path, chart: &BarChart, color: (u8, u8, u8)) -> Result<()> {
    match ChartExportFormat::from_path(path).unwrap_or(ChartExportFormat::Png) {
        ChartExportFormat::Png => write_chart_png(path, chart, color)?,
        ChartExportFormat::Eps => write_chart_eps(path, chart, color)?,
    }
    info!(path = %path.display(), bars = chart.bars.len(), "exported chart");
    Ok(())
}

/// Write chart to EPS (Encapsulated PostScript). No external dependencies.
pub fn write_chart_eps(path: &Path, chart: &BarChart, color: (u8, u8, u8)) -> Result<()> {
    if chart.bars.is_empty() {
        return Err(DashboardError::NoChartData.into());
    }

    const W: f64 = 480.0;
    const H: f64 = 320.0;
    const MARGIN_LEFT: f64 = 55.0;
    const MARGIN_BOTTOM: f64 = 70.0;
    const PLOT_W: f64 = W - MARGIN_LEFT - 20.0;
    const PLOT_H: f64 = H - MARGIN_BOTTOM - 20.0;

    let (y_min, y_max) = chart.y_bounds();
    let y_range = y_max - y_min;
    let n = chart.bars.len() as f64;
    let slot = PLOT_W / n;
    let to_y = |y: f64| MARGIN_BOTTOM + (y - y_min) / y_range * PLOT_H;

    let mut f = BufWriter::new(File::create(path)?);

    writeln!(f, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(f, "%%BoundingBox: 0 0 {} {}", W as i32, H as i32)?;
    writeln!(f, "%%Creator: callboard")?;
    writeln!(f, "%%EndComments")?;
    writeln!(f, "gsave")?;

    let y_ticks = nice_ticks(y_min, y_max, 6);

    // Grid
    writeln!(f, "0.9 setgray")?;
    writeln!(f, "0.5 setlinewidth")?;
    for &v in &y_ticks {
        let py = to_y(v);
        if (MARGIN_BOTTOM..=MARGIN_BOTTOM + PLOT_H).contains(&py) {
            writeln!(f, "{} {} moveto {} 0 rlineto stroke", MARGIN_LEFT, py, PLOT_W)?;
        }
    }

    // Bars
    let (r, g, b) = color;
    writeln!(
        f,
        "{:.3} {:.3} {:.3} setrgbcolor",
        r as f64 / 255.0,
        g as f64 / 255.0,
        b as f64 / 255.0
    )?;
    let base = to_y(0.0);
    for (i, (_, v)) in chart.bars.iter().enumerate() {
        let x = MARGIN_LEFT + slot * i as f64 + slot * 0.15;
        writeln!(
            f,
            "{:.2} {:.2} {:.2} {:.2} rectfill",
            x,
            base,
            slot * 0.7,
            to_y(*v) - base
        )?;
    }

    // Axis box
    writeln!(f, "0 setgray")?;
    writeln!(f, "1 setlinewidth")?;
    writeln!(f, "{} {} moveto", MARGIN_LEFT, MARGIN_BOTTOM)?;
    writeln!(f, "{} 0 rlineto", PLOT_W)?;
    writeln!(f, "0 {} rlineto", PLOT_H)?;
    writeln!(f, "{} 0 rlineto", -PLOT_W)?;
    writeln!(f, "closepath stroke")?;

    writeln!(f, "/Helvetica findfont 9 scalefont setfont")?;
    let char_w: f64 = 5.0;
    for &v in &y_ticks {
        let py = to_y(v);
        if (MARGIN_BOTTOM..=MARGIN_BOTTOM + PLOT_H).contains(&py) {
            let s = format_tick(v);
            let tx = (MARGIN_LEFT - s.len() as f64 * char_w - 4.0).max(2.0);
            writeln!(f, "{} {} moveto ({}) show", tx, py - 3.0, ps_escape(&s))?;
        }
    }
    // Category labels, rotated under each bar
    for (i, (label, _)) in chart.bars.iter().enumerate() {
        let cx = MARGIN_LEFT + slot * (i as f64 + 0.5);
        writeln!(f, "gsave")?;
        writeln!(f, "{:.2} {} translate 45 rotate", cx + 3.0, MARGIN_BOTTOM - 6.0)?;
        writeln!(f, "0 0 moveto")?;
        writeln!(f, "({}) dup stringwidth pop neg 0 rmoveto show", ps_text(&short_label(label, 16)))?;
        writeln!(f, "grestore")?;
    }

    // Axis titles
    writeln!(f, "/Helvetica findfont 10 scalefont setfont")?;
    writeln!(
        f,
        "{} 6 moveto ({}) show",
        MARGIN_LEFT + PLOT_W / 2.0 - chart.x_label.len() as f64 * char_w / 2.0,
        ps_text(&chart.x_label)
    )?;
    writeln!(f, "gsave")?;
    writeln!(f, "12 {} translate 90 rotate", MARGIN_BOTTOM + PLOT_H / 2.0)?;
    writeln!(
        f,
        "{} 0 moveto ({}) show",
        -(chart.y_label.len() as f64) * char_w / 2.0,
        ps_text(&chart.y_label)
    )?;
    writeln!(f, "grestore")?;

    writeln!(f, "grestore")?;
    writeln!(f, "%%EOF")?;
    f.flush()?;
    Ok(())
}

/// Write chart to PNG using plotters bitmap backend.
pub fn write_chart_png(path: &Path, chart: &BarChart, color: (u8, u8, u8)) -> Result<()> {
    use plotters::prelude::*;

    if chart.bars.is_empty() {
        return Err(DashboardError::NoChartData.into());
    }

    let (y_min, y_max) = chart.y_bounds();
    let n = chart.bars.len();
    let root = BitMapBackend::new(path, (900, 540)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut plot = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(90)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5_f64..(n as f64 - 0.5), y_min..y_max)?;

    let label_at = |x: &f64| -> String {
        let i = x.round();
        if (x - i).abs() > 0.01 || i < 0.0 {
            return String::new();
        }
        chart
            .bars
            .get(i as usize)
            .map(|(label, _)| short_label(label, 16))
            .unwrap_or_default()
    };
    plot.configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label_at)
        .x_label_style(
            ("sans-serif", 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .draw()?;

    let fill = RGBColor(color.0, color.1, color.2);
    plot.draw_series(chart.bars.iter().enumerate().map(|(i, (_, v))| {
        let x = i as f64;
        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *v)], fill.filled())
    }))?;

    root.present()?;
    Ok(())
}
