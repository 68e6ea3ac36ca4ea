//! Conversion of dimensionless output to physical units.

use rustc_hash::FxHashMap;

use crate::{
    error::{ArchiveError, Result},
    params::{RunParams, ScalingParams},
};

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Presentation switches for scaled values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleOptions {
    /// Report times in years instead of seconds
    pub time_in_years: bool,
    /// Report velocities in cm/y instead of m/s
    pub vel_in_cm_per_year: bool,
}

/// Scaling factors for every known unit symbol.
///
/// A dimensionless value `x` of dimension `dim` is `x * factor(dim)` in SI.
#[derive(Debug, Clone)]
pub struct Scales {
    factors: FxHashMap<&'static str, f64>,
    opts: ScaleOptions,
}

impl Scales {
    /// Factors derived from the run's physical constants.
    pub fn new(params: &RunParams, opts: ScaleOptions) -> Self {
        Self {
            factors: factors(&params.scaling),
            opts,
        }
    }

    /// Presentation switches in effect
    pub fn options(&self) -> ScaleOptions {
        self.opts
    }

    /// SI factor for `dim`
    pub fn factor(&self, dim: &str) -> Result<f64> {
        if dim == "1" {
            return Ok(1.0);
        }
        self.factors
            .get(dim)
            .copied()
            .ok_or_else(|| ArchiveError::UnknownDimension {
                symbol: dim.to_string(),
            })
    }

    /// Whether `dim` can be scaled
    pub fn knows(&self, dim: &str) -> bool {
        dim == "1" || self.factors.contains_key(dim)
    }

    /// Scale `value` of dimension `dim`; returns the value and its unit label.
    ///
    /// Dimensionless quantities (`"1"`) come back unchanged with an empty
    /// label.
    pub fn scale(&self, value: f64, dim: &str) -> Result<(f64, String)> {
        if dim == "1" {
            return Ok((value, String::new()));
        }
        let v = value * self.factor(dim)?;
        Ok(match dim {
            "s" if self.opts.time_in_years => (v / SECONDS_PER_YEAR, "yr".to_string()),
            "m/s" if self.opts.vel_in_cm_per_year => {
                (v * 100.0 * SECONDS_PER_YEAR, "cm/y".to_string())
            }
            _ => (v, dim.to_string()),
        })
    }
}

fn factors(p: &ScalingParams) -> FxHashMap<&'static str, f64> {
    let l = p.length;
    let dt = p.delta_temperature;
    let kappa = p.diffusivity();
    let time = l * l / kappa;
    let heat_flux = p.conductivity * dt / l;

    let mut f = FxHashMap::default();
    f.insert("m", l);
    f.insert("K", dt);
    f.insert("s", time);
    f.insert("m/s", kappa / l);
    f.insert("1/s", 1.0 / time);
    f.insert("K/s", dt / time);
    f.insert("Pa", p.viscosity * kappa / (l * l));
    f.insert("Pa.s", p.viscosity);
    f.insert("kg/m3", p.density);
    f.insert("W/m2", heat_flux);
    f.insert("W/m3", heat_flux / l);
    f.insert("W/m/K", p.conductivity);
    f.insert("m2/s", kappa);
    f.insert("J/kg/K", p.heat_capacity);
    f.insert("1/K", p.expansivity);
    f.insert("m/s2", p.gravity);
    f.insert("W", heat_flux * l * l);
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_params() -> RunParams {
        RunParams {
            scaling: ScalingParams {
                length: 2.0,
                delta_temperature: 10.0,
                density: 1.0,
                conductivity: 4.0,
                heat_capacity: 1.0,
                viscosity: 3.0,
                expansivity: 0.5,
                gravity: 9.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn dimensionless_is_identity() {
        let s = Scales::new(&RunParams::default(), ScaleOptions::default());
        assert_eq!(s.scale(0.37, "1").unwrap(), (0.37, String::new()));
    }

    #[test]
    fn derived_factors() {
        // kappa = 4, time = 1, velocity = 2, stress = 3
        let s = Scales::new(&unit_params(), ScaleOptions::default());
        assert_eq!(s.scale(0.5, "m").unwrap(), (1.0, "m".to_string()));
        assert_eq!(s.factor("m2/s").unwrap(), 4.0);
        assert_eq!(s.factor("s").unwrap(), 1.0);
        assert_eq!(s.factor("m/s").unwrap(), 2.0);
        assert_eq!(s.factor("Pa").unwrap(), 3.0);
        assert_eq!(s.factor("W/m2").unwrap(), 20.0);
        assert_eq!(s.factor("W/m3").unwrap(), 10.0);
        assert_eq!(s.factor("W").unwrap(), 80.0);
        assert_eq!(s.factor("K/s").unwrap(), 10.0);
    }

    #[test]
    fn unknown_symbol_fails() {
        let s = Scales::new(&RunParams::default(), ScaleOptions::default());
        assert!(matches!(
            s.scale(1.0, "furlong"),
            Err(ArchiveError::UnknownDimension { symbol }) if symbol == "furlong"
        ));
        assert!(!s.knows("furlong"));
        assert!(s.knows("1"));
    }

    #[test]
    fn presentation_options() {
        let s = Scales::new(
            &unit_params(),
            ScaleOptions {
                time_in_years: true,
                vel_in_cm_per_year: true,
            },
        );
        let (t, label) = s.scale(SECONDS_PER_YEAR, "s").unwrap();
        assert_eq!(label, "yr");
        assert!((t - 1.0).abs() < 1e-12);
        let (v, label) = s.scale(1.0, "m/s").unwrap();
        assert_eq!(label, "cm/y");
        assert!((v - 200.0 * SECONDS_PER_YEAR).abs() < 1e-3);
    }
}
