//! Run parameters from an optional `par.toml` in the run directory.
//!
//! ```toml
//! [output]
//! stem = "run"
//!
//! [scaling]
//! length = 2.89e6
//! viscosity = 1e22
//! ```
//!
//! Every key is optional; missing keys take Earth-mantle defaults.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ArchiveError, Result};

/// File name looked up in the run directory
pub const PARAMS_FILE: &str = "par.toml";

/// Stem used when neither the caller nor `par.toml` names one
pub const DEFAULT_STEM: &str = "run";

/// Parsed `par.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunParams {
    /// `[output]`
    pub output: OutputParams,
    /// `[scaling]`
    pub scaling: ScalingParams,
}

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputParams {
    /// File name prefix of every output file
    pub stem: String,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            stem: DEFAULT_STEM.to_string(),
        }
    }
}

/// `[scaling]` section, SI units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingParams {
    /// Domain thickness (m)
    pub length: f64,
    /// Temperature contrast across the domain (K)
    pub delta_temperature: f64,
    /// Reference density (kg/m3)
    pub density: f64,
    /// Thermal conductivity (W/m/K)
    pub conductivity: f64,
    /// Specific heat capacity (J/kg/K)
    pub heat_capacity: f64,
    /// Reference viscosity (Pa.s)
    pub viscosity: f64,
    /// Thermal expansivity (1/K)
    pub expansivity: f64,
    /// Gravity acceleration (m/s2)
    pub gravity: f64,
}

impl Default for ScalingParams {
    fn default() -> Self {
        Self {
            length: 2.89e6,
            delta_temperature: 2500.0,
            density: 3300.0,
            conductivity: 3.0,
            heat_capacity: 1200.0,
            viscosity: 1e22,
            expansivity: 3e-5,
            gravity: 9.81,
        }
    }
}

impl ScalingParams {
    /// Thermal diffusivity k/(ρ·cp), m2/s
    pub fn diffusivity(&self) -> f64 {
        self.conductivity / (self.density * self.heat_capacity)
    }
}

impl RunParams {
    /// Parse parameters from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self> {
        let params: RunParams = toml::from_str(text).map_err(|e| ArchiveError::Params {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        params.validate(path)?;
        Ok(params)
    }

    /// Load `par.toml` from `dir`, or defaults when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = params_path(dir);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let params = Self::from_toml(&text, &path)?;
                debug!(path = %path.display(), "loaded run parameters");
                Ok(params)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ArchiveError::Io { path, source }),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let s = &self.scaling;
        let checks = [
            ("length", s.length),
            ("delta_temperature", s.delta_temperature),
            ("density", s.density),
            ("conductivity", s.conductivity),
            ("heat_capacity", s.heat_capacity),
            ("viscosity", s.viscosity),
            ("expansivity", s.expansivity),
            ("gravity", s.gravity),
        ];
        for (key, v) in checks {
            if !(v.is_finite() && v > 0.0) {
                return Err(ArchiveError::Params {
                    path: path.to_path_buf(),
                    detail: format!("scaling.{key} must be a positive number, got {v}"),
                });
            }
        }
        if self.output.stem.is_empty() {
            return Err(ArchiveError::Params {
                path: path.to_path_buf(),
                detail: "output.stem must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Location of the parameter file for a run directory
pub fn params_path(dir: &Path) -> PathBuf {
    dir.join(PARAMS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let p = RunParams::from_toml(
            "[scaling]\nviscosity = 1e21\n[output]\nstem = \"test\"\n",
            Path::new("par.toml"),
        )
        .unwrap();
        assert_eq!(p.output.stem, "test");
        assert_eq!(p.scaling.viscosity, 1e21);
        assert_eq!(p.scaling.length, ScalingParams::default().length);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RunParams::from_toml("[scaling]\nlenght = 1.0\n", Path::new("par.toml"))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Params { .. }));
        assert!(RunParams::from_toml("[plot]\n", Path::new("par.toml")).is_err());
    }

    #[test]
    fn non_positive_constants_are_rejected() {
        let err =
            RunParams::from_toml("[scaling]\ndensity = 0.0\n", Path::new("par.toml")).unwrap_err();
        assert!(err.to_string().contains("scaling.density"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RunParams::load(dir.path()).unwrap(), RunParams::default());

        fs::write(params_path(dir.path()), "[output]\nstem = \"m1\"\n").unwrap();
        assert_eq!(RunParams::load(dir.path()).unwrap().output.stem, "m1");

        fs::write(params_path(dir.path()), "not toml [").unwrap();
        assert!(matches!(
            RunParams::load(dir.path()),
            Err(ArchiveError::Params { .. })
        ));
    }
}
