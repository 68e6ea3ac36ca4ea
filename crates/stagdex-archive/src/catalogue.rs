//! Names, descriptions and unit symbols of output variables.

/// Description and dimension of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarMeta {
    /// Column or field name as written in the files
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Unit symbol understood by [`Scales`](crate::Scales), `"1"` if dimensionless
    pub dim: &'static str,
}

const fn var(name: &'static str, description: &'static str, dim: &'static str) -> VarMeta {
    VarMeta {
        name,
        description,
        dim,
    }
}

/// Time-series columns
pub const TIME: &[VarMeta] = &[
    var("t", "Time", "s"),
    var("ftop", "Heat flux at top", "W/m2"),
    var("fbot", "Heat flux at bottom", "W/m2"),
    var("Tmin", "Min temperature", "K"),
    var("Tmean", "Temperature", "K"),
    var("Tmax", "Max temperature", "K"),
    var("vmin", "Min velocity", "m/s"),
    var("vrms", "rms velocity", "m/s"),
    var("vmax", "Max velocity", "m/s"),
    var("etamin", "Min viscosity", "Pa.s"),
    var("etamean", "Viscosity", "Pa.s"),
    var("etamax", "Max viscosity", "Pa.s"),
    var("Raeff", "Effective Rayleigh number", "1"),
    var("Nutop", "Nusselt number at top", "1"),
    var("Nubot", "Nusselt number at bottom", "1"),
    var("Cmin", "Min concentration", "1"),
    var("Cmean", "Concentration", "1"),
    var("Cmax", "Max concentration", "1"),
    var("moltenf", "Molten fraction", "1"),
    var("erupt_rate", "Eruption rate", "1/s"),
    var("H_int", "Internal heating", "W/m3"),
    var("dTdt", "Temperature variation", "K/s"),
];

/// Radial-profile columns
pub const RPROF: &[VarMeta] = &[
    var("r", "Radial coordinate", "m"),
    var("Tmean", "Temperature", "K"),
    var("Tmin", "Min temperature", "K"),
    var("Tmax", "Max temperature", "K"),
    var("vrms", "rms velocity", "m/s"),
    var("vzabs", "Radial velocity", "m/s"),
    var("vhrms", "Horizontal velocity", "m/s"),
    var("etalog", "Viscosity", "Pa.s"),
    var("etamin", "Min viscosity", "Pa.s"),
    var("etamax", "Max viscosity", "Pa.s"),
    var("rhomean", "Density", "kg/m3"),
    var("stressmean", "Stress", "Pa"),
    var("edotmean", "Strain rate", "1/s"),
    var("fcond", "Conductive heat flux", "W/m2"),
    var("fadv", "Advected heat flux", "W/m2"),
    var("Cmean", "Concentration", "1"),
];

/// Snapshot fields
pub const FIELD: &[VarMeta] = &[
    var("T", "Temperature", "K"),
    var("v1", "x velocity", "m/s"),
    var("v2", "y velocity", "m/s"),
    var("v3", "z velocity", "m/s"),
    var("p", "Pressure", "Pa"),
    var("eta", "Viscosity", "Pa.s"),
    var("rho", "Density", "kg/m3"),
    var("sII", "Second invariant of stress tensor", "Pa"),
    var("edot", "Strain rate", "1/s"),
    var("c", "Composition", "1"),
    var("age", "Age", "s"),
];

/// Lookup of variable metadata by name.
pub trait Catalogue {
    /// Metadata of `name`, if known
    fn meta(&self, name: &str) -> Option<&VarMeta>;

    /// Unit symbol of `name`, if known
    fn dim(&self, name: &str) -> Option<&str> {
        self.meta(name).map(|m| m.dim)
    }
}

impl Catalogue for [VarMeta] {
    fn meta(&self, name: &str) -> Option<&VarMeta> {
        self.iter().find(|m| m.name == name)
    }
}

/// Which table of the built-in catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// [`TIME`]
    Time,
    /// [`RPROF`]
    Rprof,
    /// [`FIELD`]
    Field,
}

impl Section {
    /// All sections in display order
    pub const ALL: [Section; 3] = [Section::Field, Section::Rprof, Section::Time];

    /// Table heading
    pub fn title(self) -> &'static str {
        match self {
            Section::Time => "time",
            Section::Rprof => "rprof",
            Section::Field => "field",
        }
    }
}

/// Built-in tables, one section at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinCatalogue {
    section: Section,
}

impl BuiltinCatalogue {
    /// Catalogue restricted to `section`
    pub fn new(section: Section) -> Self {
        Self { section }
    }

    /// Time-series variables
    pub fn time() -> Self {
        Self::new(Section::Time)
    }

    /// Radial-profile variables
    pub fn rprof() -> Self {
        Self::new(Section::Rprof)
    }

    /// Snapshot fields
    pub fn field() -> Self {
        Self::new(Section::Field)
    }

    /// Section this catalogue covers
    pub fn section(&self) -> Section {
        self.section
    }

    /// Entries in table order
    pub fn entries(&self) -> &'static [VarMeta] {
        match self.section {
            Section::Time => TIME,
            Section::Rprof => RPROF,
            Section::Field => FIELD,
        }
    }
}

impl Catalogue for BuiltinCatalogue {
    fn meta(&self, name: &str) -> Option<&VarMeta> {
        self.entries().meta(name)
    }
}
