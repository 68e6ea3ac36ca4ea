use anyhow::Result;
use std::io::Write;

use stagdex_archive::{BuiltinCatalogue, Section};

/// Sections picked by the `--time`, `--rprof` and `--field` flags; all of
/// them when none is set.
pub fn sections(time: bool, rprof: bool, field: bool) -> Vec<Section> {
    if !(time || rprof || field) {
        return Section::ALL.to_vec();
    }
    Section::ALL
        .into_iter()
        .filter(|s| match s {
            Section::Time => time,
            Section::Rprof => rprof,
            Section::Field => field,
        })
        .collect()
}

pub fn print_vars(sections: &[Section], out: &mut dyn Write) -> Result<()> {
    for (i, &section) in sections.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        let entries = BuiltinCatalogue::new(section).entries();
        let width = entries.iter().map(|m| m.name.len()).max().unwrap_or(0);
        writeln!(out, "{}:", section.title())?;
        for m in entries {
            if m.dim == "1" {
                writeln!(out, "  {:<width$}  {}", m.name, m.description)?;
            } else {
                writeln!(out, "  {:<width$}  {} ({})", m.name, m.description, m.dim)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_select_sections() {
        assert_eq!(sections(false, false, false), Section::ALL.to_vec());
        assert_eq!(sections(true, false, false), vec![Section::Time]);
        assert_eq!(
            sections(true, false, true),
            vec![Section::Field, Section::Time]
        );
    }

    #[test]
    fn lists_descriptions_and_units() {
        let mut out = Vec::new();
        print_vars(&[Section::Time], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("time:\n"));
        assert!(text.contains("Tmean"));
        assert!(text.contains("Temperature (K)"));
        assert!(text.contains("Nusselt number at top\n"));
    }
}
