use anyhow::{Context, Result, bail};
use std::io::Write;
use tracing::info;

use stagdex_archive::{BuiltinCatalogue, Catalogue, Dimensionality, Geometry, RecordSource, Run};

pub struct InfoOptions {
    /// Time-series columns, in print order
    pub output: Vec<String>,
    pub dimensional: bool,
}

fn grid_extent(g: &Geometry) -> String {
    match g.dimensionality() {
        Dimensionality::ThreeDim => format!("{} x {} x {}", g.nxtot, g.nytot, g.nztot),
        Dimensionality::TwoDimXz => format!("{} x {}", g.nxtot, g.nztot),
        Dimensionality::TwoDimYz => format!("{} x {}", g.nytot, g.nztot),
    }
}

/// Run summary followed by the requested time-series values of every step.
pub fn print_info<S: RecordSource>(
    run: &Run<S>,
    opts: &InfoOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let last_step = run.last_step().context("read last step")?.istep;
    let last_snap = run.snapshots().ordered_snapshots().last().copied();

    if let Some(header) = run.steps().header() {
        for var in &opts.output {
            if !header.columns.iter().any(|c| c == var) {
                bail!(
                    "no time-series column {var:?} in {}",
                    run.steps().path().display()
                );
            }
        }
    }

    writeln!(out, "Run in {}", run.path().display())?;
    match last_snap {
        Some(_) => {
            let g = run.geometry()?;
            writeln!(out, "{} {}", g.coords, grid_extent(&g))?;
        }
        None => writeln!(out, "No snapshot")?,
    }
    writeln!(out)?;

    let catalogue = BuiltinCatalogue::time();
    let width = opts.output.iter().map(|v| v.len()).max().unwrap_or(0);
    let mut steps = 0usize;
    for step in run.walk()? {
        let step = step?;
        write!(out, "Step {}/{}", step.istep, last_step)?;
        match (step.isnap, last_snap) {
            (Some(isnap), Some(last)) => writeln!(out, ", snapshot {isnap}/{last}")?,
            _ => writeln!(out)?,
        }
        for var in &opts.output {
            let value = step.value(var).unwrap_or(f64::NAN);
            if opts.dimensional {
                let dim = catalogue.dim(var).unwrap_or("1");
                let (value, label) = run.scale(value, dim)?;
                writeln!(out, "  {var:<width$}  {value:.6e}  {label}")?;
            } else {
                writeln!(out, "  {var:<width$}  {value:.6e}")?;
            }
        }
        writeln!(out)?;
        steps += 1;
    }
    info!(steps, "info done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagdex_archive::{CoordSystem, Encoding, Field, OpenOptions, RunParams, ScaleOptions};
    use stagdex_format::{SnapshotHeader, TimeSeriesWriter, write_snapshot};
    use std::{fs, path::Path};

    fn write_run(dir: &Path) {
        let file = fs::File::create(dir.join("run_time.dat")).unwrap();
        let mut w = TimeSeriesWriter::new(file, Encoding::default(), &["t", "Tmean"]).unwrap();
        for istep in [0u32, 3, 7] {
            w.write_row(istep, &[istep as f64 * 0.5, 0.25]).unwrap();
        }
        let geometry = Geometry::new(8, 1, 4, CoordSystem::Spherical);
        let header = SnapshotHeader {
            encoding: Encoding::default(),
            isnap: 0,
            istep: 7,
            time: 3.5,
            geometry,
            nfields: 1,
        };
        let field = Field {
            name: "T".into(),
            components: 1,
            values: vec![0.5; 32],
        };
        let mut buf = Vec::new();
        write_snapshot(&mut buf, &header, &[field]).unwrap();
        fs::write(dir.join("run_snap00000.dat"), buf).unwrap();
    }

    fn render(run: &Run, output: &[&str], dimensional: bool) -> Result<String> {
        let opts = InfoOptions {
            output: output.iter().map(|s| s.to_string()).collect(),
            dimensional,
        };
        let mut out = Vec::new();
        print_info(run, &opts, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn prints_grid_and_steps() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let run = Run::open(dir.path()).unwrap();

        let text = render(&run, &["t"], false).unwrap();
        assert!(text.contains("Spherical 8 x 4\n"));
        assert!(text.contains("Step 3/7\n  t  1.500000e0\n"));
        assert!(text.contains("Step 7/7, snapshot 0/0\n"));
        // nothing but the last snapshot header was needed
        assert_eq!(run.cache_stats().snapshots, 0);
    }

    #[test]
    fn dimensional_values_carry_units() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let run = OpenOptions::new()
            .params(RunParams::default())
            .scale_options(ScaleOptions {
                time_in_years: true,
                vel_in_cm_per_year: false,
            })
            .open(dir.path())
            .unwrap();

        let text = render(&run, &["t", "Tmean"], true).unwrap();
        assert!(text.contains(" yr\n"));
        // 0.25 * 2500 K
        assert!(text.contains("Tmean  6.250000e2  K\n"));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let run = Run::open(dir.path()).unwrap();
        let err = render(&run, &["bogus"], false).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn empty_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let run = Run::open(dir.path()).unwrap();
        assert!(render(&run, &["t"], false).is_err());
    }
}
