//! Report output: serial-style plot block, per-run CSV and the run summary log.
//!
//! Plot block layout (tab separated, one row per sample):
//! ```text
//! <Test> Test Data\t\tAppx. Sample Interval: <n> msec
//! ===STARTPLOT===
//! <index>\t<raw count>\t<volts>
//! ===ENDPLOT===
//! ```

use std::{
    fs::{OpenOptions, create_dir_all},
    io::Write,
    path::Path,
};

use log::{error, info};
use serde::Serialize;

use crate::component_a::signal_model::{CalibrationRange, voltage_from_frequency, volts_to_string};
use crate::component_b::driver::RunReport;
use crate::utils::error::Result;
use crate::utils::metrics::calculate_stats;

pub const PLOT_START: &str = "===STARTPLOT===";
pub const PLOT_END: &str = "===ENDPLOT===";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotRow {
    pub index: usize,
    pub count: u32,
    pub volts: String,
}

/// Rows from `first_index` to the end of the run.
pub fn plot_rows(report: &RunReport, range: CalibrationRange, vref: f64) -> Result<Vec<PlotRow>> {
    report
        .samples
        .iter()
        .enumerate()
        .skip(report.first_index)
        .map(|(index, &count)| {
            let v = voltage_from_frequency(count as i32, range, vref)?;
            Ok(PlotRow { index, count, volts: volts_to_string(v) })
        })
        .collect()
}

pub fn write_plot<W: Write>(out: &mut W, report: &RunReport, range: CalibrationRange, vref: f64) -> Result<()> {
    let rows = plot_rows(report, range, vref)?;
    writeln!(out)?;
    writeln!(
        out,
        "{} Test Data\t\tAppx. Sample Interval: {} msec",
        report.label, report.sample_interval_ms
    )?;
    writeln!(out, "{}", PLOT_START)?;
    for row in &rows {
        writeln!(out, "{}\t{}\t{}", row.index, row.count, row.volts)?;
    }
    writeln!(out, "{}", PLOT_END)?;
    out.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SampleRow<'a> {
    run: u64,
    test: &'a str,
    index: usize,
    freq_hz: u32,
    volts: f64,
    duty: u8,
}

/// Full per-sample CSV of one run, overwriting `path`.
/// Returns the number of rows written.
pub fn export_run_csv(path: &Path, report: &RunReport, range: CalibrationRange, vref: f64) -> Result<usize> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    let mut rows = 0;
    for (index, &freq_hz) in report.samples.iter().enumerate().skip(report.first_index) {
        writer.serialize(SampleRow {
            run: report.run,
            test: report.label,
            index,
            freq_hz,
            volts: voltage_from_frequency(freq_hz as i32, range, vref)?,
            duty: report.duties.get(index).copied().unwrap_or(0),
        })?;
        rows += 1;
    }
    writer.flush()?;
    info!("[Export] {} rows -> {}", rows, path.display());
    Ok(rows)
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    run: u64,
    test: &'a str,
    samples: usize,
    start_ms: u64,
    end_ms: u64,
    interval_ms: u64,
    late_ticks: u64,
    min_hz: f64,
    max_hz: f64,
    mean_hz: f64,
}

/// Append one row per run; the header is written only when the file is new.
pub fn append_run_summary(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let file_exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
        error!("[Export] failed to open {}: {}", path.display(), e);
        e
    })?;

    let shown = report.samples.get(report.first_index..).unwrap_or(&[]);
    let stats = calculate_stats(shown);
    let mut writer = csv::WriterBuilder::new().has_headers(!file_exists).from_writer(file);
    writer.serialize(SummaryRow {
        run: report.run,
        test: report.label,
        samples: shown.len(),
        start_ms: report.start_ms,
        end_ms: report.end_ms,
        interval_ms: report.sample_interval_ms,
        late_ticks: report.late_ticks,
        min_hz: stats.as_ref().map_or(0.0, |s| s.min),
        max_hz: stats.as_ref().map_or(0.0, |s| s.max),
        mean_hz: stats.as_ref().map_or(0.0, |s| s.mean),
    })?;
    writer.flush()?;
    Ok(())
}
