//! SVG rendering of chart data

use super::{AxisKind, Chart};
use crate::error::ReportError;
use chrono::DateTime;
use plotters::prelude::*;

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 600;

fn render_err<E: std::fmt::Display>(e: E) -> ReportError {
    ReportError::Render(e.to_string())
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

/// Vertical range including zero, with headroom above the highest point
fn y_range(lo: f64, hi: f64) -> (f64, f64) {
    let (lo, hi) = padded(lo.min(0.0), hi);
    (lo, hi + (hi - lo) * 0.05)
}

fn format_x(kind: AxisKind, x: f64) -> String {
    match kind {
        AxisKind::Date => DateTime::from_timestamp(x as i64, 0)
            .map(|d| d.date_naive().to_string())
            .unwrap_or_default(),
        AxisKind::Index => format!("{:.0}", x),
        AxisKind::Value => format!("{:.1}", x),
    }
}

/// Render a chart to an SVG document
pub fn render_svg(chart: &Chart, width: u32, height: u32) -> Result<String, ReportError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let ((x0, x1), (y0, y1)) = chart.bounds().unwrap_or(((0.0, 1.0), (0.0, 1.0)));
        let (x0, x1) = padded(x0, x1);
        let (y0, y1) = y_range(y0, y1);

        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(render_err)?;

        let kind = chart.x_axis;
        let x_fmt = |x: &f64| format_x(kind, *x);
        ctx.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .x_label_formatter(&x_fmt)
            .x_labels(8)
            .draw()
            .map_err(render_err)?;

        for (idx, series) in chart.series.iter().enumerate() {
            let color = Palette99::pick(idx).to_rgba();
            let points = series.points.iter().copied();

            let drawn = if kind == AxisKind::Value {
                ctx.draw_series(
                    AreaSeries::new(points, 0.0, color.mix(0.2)).border_style(color.stroke_width(2)),
                )
            } else {
                ctx.draw_series(LineSeries::new(points, color.stroke_width(2)))
            };

            drawn
                .map_err(render_err)?
                .label(series.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        if !chart.series.is_empty() {
            ctx.configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}
