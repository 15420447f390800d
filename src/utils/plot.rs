//! SVG chart of one run: sensor voltage and commanded duty (as volts) per sample.

use std::path::Path;

use log::info;
use plotters::{coord::Shift, prelude::*};

use crate::component_a::signal_model::{CalibrationRange, voltage_from_frequency};
use crate::component_b::driver::RunReport;
use crate::utils::error::{ControlError, Result};

const CHART_SIZE: (u32, u32) = (1024, 480);

/// Y range covering `[0, vref]` and every value, with a small margin.
pub fn y_bounds(values: &[f64], vref: f64) -> (f64, f64) {
    let lo = values.iter().cloned().fold(0.0, f64::min);
    let hi = values.iter().cloned().fold(vref, f64::max);
    let pad = ((hi - lo) * 0.05).max(1e-3);
    (lo - pad, hi + pad)
}

fn series(report: &RunReport, range: CalibrationRange, vref: f64) -> Result<(Vec<(usize, f64)>, Vec<(usize, f64)>)> {
    let mut sensor = Vec::with_capacity(report.samples.len());
    let mut duty = Vec::with_capacity(report.samples.len());
    for (index, &count) in report.samples.iter().enumerate().skip(report.first_index) {
        sensor.push((index, voltage_from_frequency(count as i32, range, vref)?));
        if let Some(&d) = report.duties.get(index) {
            duty.push((index, d as f64 * 0.01 * vref));
        }
    }
    Ok((sensor, duty))
}

fn draw_run<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    report: &RunReport,
    range: CalibrationRange,
    vref: f64,
) -> Result<()> {
    let plot_err = |e: DrawingAreaErrorKind<DB::ErrorType>| ControlError::Plot(e.to_string());

    let (sensor, duty) = series(report, range, vref)?;
    let values: Vec<f64> = sensor.iter().chain(duty.iter()).map(|&(_, v)| v).collect();
    let (min_y, max_y) = y_bounds(&values, vref);
    let max_x = report.samples.len().max(report.first_index + 1);

    root.fill(&WHITE).map_err(plot_err)?;
    let title = format!("{} (run {}, ~{} ms/sample)", report.label, report.run, report.sample_interval_ms);
    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(report.first_index..max_x, min_y..max_y)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("sample")
        .y_desc("volts")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(sensor, &BLUE))
        .map_err(plot_err)?
        .label("sensor")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(duty, &RED))
        .map_err(plot_err)?
        .label("duty")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

pub fn render_run_svg(path: &Path, report: &RunReport, range: CalibrationRange, vref: f64) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    draw_run(&root, report, range, vref)?;
    info!("[Plot] {} -> {}", report.label, path.display());
    Ok(())
}

/// Same chart rendered into a string.
pub fn render_run_svg_string(report: &RunReport, range: CalibrationRange, vref: f64) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        draw_run(&root, report, range, vref)?;
    }
    Ok(svg)
}
