use crate::error::{CliError, Result};
use retifep::analysis::estimator::FreeEnergyReport;
use retifep::analysis::pmf::PmfEstimate;
use retifep::engine::monitor::EnergyMonitor;
use retifep::engine::replica::{BlockReport, ReplicaEnsemble};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const COMPONENTS_FILE: &str = "components.csv";
pub const GRADIENTS_FILE: &str = "gradients.csv";
pub const PMF_FILE: &str = "pmf.csv";
pub const SITES_FILE: &str = "sites.csv";
pub const HISTOGRAMS_FILE: &str = "histograms.csv";
pub const REPORT_FILE: &str = "report.json";

fn output_error(path: &Path) -> impl Fn(csv::Error) -> CliError + '_ {
    move |e| CliError::Output {
        path: path.to_path_buf(),
        source: e.into(),
    }
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    csv::Writer::from_path(path).map_err(output_error(path))
}

#[derive(Serialize)]
struct ComponentRow<'a> {
    block: u64,
    window: usize,
    lambda: f64,
    component: &'a str,
    value: f64,
}

/// Per-block table of every window's averaged energy components, one row per value.
pub struct ComponentTable {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ComponentTable {
    /// Opens the table, appending to an existing non-empty file when `append` is set.
    pub fn open(path: &Path, append: bool) -> Result<Self> {
        let has_rows = append && std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(!has_rows)
            .from_writer(file);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn write_block(&mut self, ensemble: &ReplicaEnsemble, report: &BlockReport) -> Result<()> {
        let schedule = ensemble.schedule();
        for stats in &report.windows {
            let lambda = schedule.get(stats.index).unwrap_or(f64::NAN);
            let averages = &stats.averages;
            let scalars = [
                ("energy", averages.energy),
                ("dEdl-forward", averages.gradient_forward),
                ("dEdl-backward", averages.gradient_backward),
                ("dEdl-softcore", averages.softcore_gradient),
            ];
            let named = scalars
                .iter()
                .filter_map(|&(name, value)| value.map(|v| (name, v)))
                .chain(averages.components.iter().map(|(n, &v)| (n.as_str(), v)));
            for (component, value) in named {
                self.writer
                    .serialize(ComponentRow {
                        block: report.block,
                        window: stats.index,
                        lambda,
                        component,
                        value,
                    })
                    .map_err(output_error(&self.path))?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct GradientRow {
    window: usize,
    lambda: f64,
    samples: u64,
    forward: Option<f64>,
    forward_error: Option<f64>,
    backward: Option<f64>,
    backward_error: Option<f64>,
    window_gradient: Option<f64>,
    softcore_gradient: Option<f64>,
    move_acceptance: Option<f64>,
    exchange_acceptance: Option<f64>,
}

/// Writes the run-averaged gradients and acceptance ratios of every window.
pub fn write_gradients(path: &Path, ensemble: &ReplicaEnsemble) -> Result<()> {
    let mut writer = create_writer(path)?;
    for window in ensemble.windows() {
        let acc = &window.accumulators;
        writer
            .serialize(GradientRow {
                window: window.index,
                lambda: window.lambda(),
                samples: acc.samples(),
                forward: acc.ti_forward.total().mean(),
                forward_error: acc.ti_forward.total().std_error(),
                backward: acc.ti_backward.total().mean(),
                backward_error: acc.ti_backward.total().std_error(),
                window_gradient: acc.window_gradient.total().mean(),
                softcore_gradient: acc.softcore_gradient.total().mean(),
                move_acceptance: window.moves.acceptance(),
                exchange_acceptance: ensemble
                    .exchange_stats()
                    .get(window.index)
                    .and_then(|s| s.acceptance()),
            })
            .map_err(output_error(path))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct PmfRow {
    method: &'static str,
    lambda: f64,
    value: f64,
    forward: Option<f64>,
    backward: Option<f64>,
}

/// Writes every estimator's profile as rows of `(method, λ, F, F_forward, F_backward)`.
pub fn write_pmf(path: &Path, report: &FreeEnergyReport) -> Result<()> {
    let mut writer = create_writer(path)?;
    let methods: [(&'static str, &PmfEstimate); 3] =
        [("ti", &report.ti), ("fep", &report.fep), ("bar", &report.bar)];
    for (method, estimate) in methods {
        for (i, point) in estimate.pmf.points().iter().enumerate() {
            writer
                .serialize(PmfRow {
                    method,
                    lambda: point.lambda,
                    value: point.value,
                    forward: estimate.forward.points().get(i).map(|p| p.value),
                    backward: estimate.backward.points().get(i).map(|p| p.value),
                })
                .map_err(output_error(path))?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct SiteRow<'a> {
    window: usize,
    lambda: f64,
    site: &'a str,
    samples: u64,
    mean: Option<f64>,
    std_error: Option<f64>,
}

/// Writes the per-site solute interaction energies. Returns `false` when nothing is tracked.
pub fn write_sites(path: &Path, ensemble: &ReplicaEnsemble) -> Result<bool> {
    if ensemble.windows().iter().all(|w| w.identity.is_none()) {
        return Ok(false);
    }
    let mut writer = create_writer(path)?;
    for window in ensemble.windows() {
        let Some(tracker) = &window.identity else {
            continue;
        };
        for (point, monitor) in tracker.points().iter().zip(tracker.monitors()) {
            let total = monitor.total();
            writer
                .serialize(SiteRow {
                    window: window.index,
                    lambda: window.lambda(),
                    site: &point.label,
                    samples: total.count(),
                    mean: total.mean(),
                    std_error: total.std_error(),
                })
                .map_err(output_error(path))?;
        }
    }
    writer.flush()?;
    Ok(true)
}

#[derive(Serialize)]
struct HistogramRow<'a> {
    window: usize,
    lambda: f64,
    series: &'a str,
    lower_edge: f64,
    count: u64,
}

/// Writes the gradient and per-site histograms. Returns `false` when none were kept.
pub fn write_histograms(path: &Path, ensemble: &ReplicaEnsemble) -> Result<bool> {
    let mut rows = Vec::new();
    for window in ensemble.windows() {
        let acc = &window.accumulators;
        let mut series: Vec<(&str, &EnergyMonitor)> = vec![
            ("dEdl-forward", &acc.ti_forward),
            ("dEdl-backward", &acc.ti_backward),
        ];
        if let Some(tracker) = &window.identity {
            series.extend(
                tracker
                    .points()
                    .iter()
                    .map(|p| p.label.as_str())
                    .zip(tracker.monitors()),
            );
        }
        for (name, monitor) in series {
            let Some(histogram) = monitor.histogram() else {
                continue;
            };
            rows.extend(histogram.bins().map(|(lower_edge, count)| HistogramRow {
                window: window.index,
                lambda: window.lambda(),
                series: name,
                lower_edge,
                count,
            }));
        }
    }
    if rows.is_empty() {
        return Ok(false);
    }
    let mut writer = create_writer(path)?;
    for row in rows {
        writer.serialize(row).map_err(output_error(path))?;
    }
    writer.flush()?;
    Ok(true)
}

pub fn write_report_json(path: &Path, report: &FreeEnergyReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report).map_err(|e| CliError::Output {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Writes every end-of-run table into `dir`.
pub fn write_analysis(dir: &Path, ensemble: &ReplicaEnsemble, report: &FreeEnergyReport) -> Result<()> {
    write_gradients(&dir.join(GRADIENTS_FILE), ensemble)?;
    write_pmf(&dir.join(PMF_FILE), report)?;
    write_sites(&dir.join(SITES_FILE), ensemble)?;
    write_histograms(&dir.join(HISTOGRAMS_FILE), ensemble)?;
    write_report_json(&dir.join(REPORT_FILE), report)
}

pub fn print_summary(report: &FreeEnergyReport) {
    println!("Free-energy change (kcal/mol):");
    for (name, estimate) in [("TI", &report.ti), ("FEP", &report.fep), ("BAR", &report.bar)] {
        println!(
            "  {:<4} {:>12.4} ± {:.4}",
            name,
            estimate.delta_g(),
            estimate.error
        );
    }
}
