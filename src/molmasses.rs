//! Molar masses of the species the evaluation works with.

use crate::error::{AuxError, AuxResult};

/// Atomic mass of nitrogen (g/mol)
pub const M_N: f64 = 14.006;
/// Atomic mass of oxygen (g/mol)
pub const M_O: f64 = 15.999;
/// Atomic mass of hydrogen (g/mol)
pub const M_H: f64 = 1.007;

pub const AIR_DRY: &str = "air_dry";

static MOLMASSES: &[(&str, f64)] = &[
    (AIR_DRY, 28.9647),
    ("o3", 48.0),
    ("so2", 64.066),
    ("so4", 96.06),
    ("no", 30.01),
    ("no2", 46.0055),
    ("no3", 62.0049),
    ("hno3", 63.01),
    ("nh3", 17.031),
    ("nh4", 18.039),
    ("co", 28.01),
    ("co2", 44.01),
    ("ch4", 16.04),
    ("hcho", 30.026),
    ("glyoxal", 58.036),
    ("isop", 68.12),
    ("nh4no3", 80.043),
];

// Longer prefixes first so that e.g. "sconc" is not read as "s" + "conc".
static VAR_PREFIXES: &[&str] = &["wetdep", "drydep", "concN", "sconc", "conc", "vmr", "mmr"];

/// Extract the species from a variable name, e.g. "vmrnh3" -> "nh3".
pub fn get_species(var_name: &str) -> AuxResult<&str> {
    VAR_PREFIXES.iter()
        .find_map(|prefix| var_name.strip_prefix(prefix))
        .filter(|species| !species.is_empty())
        .ok_or_else(|| AuxError::UnknownSpecies(var_name.to_string()))
}

/// Molar mass in g/mol of a species or of the species of a variable name.
pub fn get_molmass(name: &str) -> AuxResult<f64> {
    if let Some(m) = lookup(name) {
        return Ok(m);
    }

    let species = get_species(name)?;
    lookup(species).ok_or_else(|| AuxError::UnknownSpecies(name.to_string()))
}

fn lookup(species: &str) -> Option<f64> {
    MOLMASSES.iter()
        .find(|(s, _)| *s == species)
        .map(|(_, m)| *m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case("vmrnh3", "nh3")]
    #[case("concno3", "no3")]
    #[case("sconcso4", "so4")]
    #[case("mmro3", "o3")]
    #[case("concNhno3", "hno3")]
    #[case("wetdepso4", "so4")]
    fn test_species(#[case] var_name: &str, #[case] expected: &str) {
        assert_eq!(get_species(var_name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_species() {
        assert!(matches!(get_species("od550aer"), Err(AuxError::UnknownSpecies(_))));
        assert!(matches!(get_species("vmr"), Err(AuxError::UnknownSpecies(_))));
        assert!(matches!(get_molmass("vmrxyz"), Err(AuxError::UnknownSpecies(_))));
    }

    #[test]
    fn test_molmass() {
        assert_abs_diff_eq!(get_molmass("air_dry").unwrap(), 28.9647);
        assert_abs_diff_eq!(get_molmass("nh3").unwrap(), 17.031);
        assert_abs_diff_eq!(get_molmass("vmrhno3").unwrap(), 63.01);
    }
}
