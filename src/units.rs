//! Unit string bookkeeping.
//!
//! Model and observation readers are not consistent about how they spell
//! units, so the calculators normalize a small set of known aliases before
//! checking that a cube has the units a formula expects.

/// Mixing ratio in parts per billion.
pub const PPB: &str = "ppb";
/// Mass concentration in micrograms per cubic meter.
pub const UG_M3: &str = "ug/m3";
/// Nitrogen-equivalent mass concentration.
pub const UG_N_M3: &str = "ug N m-3";
/// Dimensionless quantity (optical depths, ratios).
pub const DIMENSIONLESS: &str = "1";
/// Molar mixing ratio, as produced by mass-to-volume mixing ratio conversion.
pub const MOL_MOL: &str = "mol mol-1";

/// Spellings of a mass mixing ratio. These are deliberately not aliases of
/// [`DIMENSIONLESS`] or of any mole fraction unit.
pub const MASS_FRACTION_UNITS: &[&str] = &["kg kg-1", "kg/kg"];

#[derive(Debug, thiserror::Error)]
#[error("Unknown {quantity} unit '{unit}'")]
pub struct UnknownUnitError {
    pub quantity: &'static str,
    pub unit: String
}

impl UnknownUnitError {
    fn new<S: ToString>(quantity: &'static str, unit: S) -> Self {
        Self { quantity, unit: unit.to_string() }
    }
}

/// Return the canonical spelling of `unit`, or `unit` itself if it has no known alias.
pub fn canonical_unit(unit: &str) -> &str {
    match unit {
        "1e-9" => PPB,
        "ug m-3" | "ug/m**3" | "ug m**-3" => UG_M3,
        _ => unit,
    }
}

/// True if `unit` names a mole fraction scale (ppb, ppm, mol mol-1, ...).
///
/// Plain dimensionless quantities ("1") and mass mixing ratios are not mole
/// fractions and cannot be rescaled into one.
pub fn is_fraction_unit(unit: &str) -> bool {
    parts_to(canonical_unit(unit)).is_ok()
}

/// Factor to multiply a mole fraction in `old_unit` by to express it in `new_unit`.
pub fn dmf_conv_factor(old_unit: &str, new_unit: &str) -> Result<f64, UnknownUnitError> {
    let fac1 = parts_to(canonical_unit(old_unit))?;
    let fac2 = parts_to(canonical_unit(new_unit))?;
    Ok(fac2 / fac1)
}

fn parts_to(dmf_unit: &str) -> Result<f64, UnknownUnitError> {
    match dmf_unit {
        "parts" => Ok(1.0),
        "mol mol-1" => Ok(1.0),
        "ppm" => Ok(1e6),
        "ppb" => Ok(1e9),
        "ppt" => Ok(1e12),
        _ => Err(UnknownUnitError::new("mole fraction", dmf_unit)),
    }
}
