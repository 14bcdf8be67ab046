//! Element-wise arithmetic between cubes.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    cube::Cube,
    error::{AuxError, AuxResult},
    molmasses::{get_molmass, get_species, AIR_DRY},
    units::{canonical_unit, dmf_conv_factor, is_fraction_unit, DIMENSIONLESS, MASS_FRACTION_UNITS, MOL_MOL},
};

fn check_same_shape(left: &Cube, right: &Cube) -> AuxResult<()> {
    if left.shape() != right.shape() {
        return Err(AuxError::ShapeMismatch {
            left: left.var_name.clone(),
            left_shape: left.shape().to_vec(),
            right: right.var_name.clone(),
            right_shape: right.shape().to_vec(),
        });
    }
    Ok(())
}

/// Bring `right` into the units of `left`, if needed and possible.
///
/// Only mole fraction scales (ppb, ppm, ...) can be converted; any other
/// difference in units is an error.
fn harmonise_units(left: &Cube, right: &mut Cube) -> AuxResult<()> {
    let lu = canonical_unit(&left.units);
    let ru = canonical_unit(&right.units);
    if lu == ru {
        return Ok(());
    }

    if is_fraction_unit(lu) && is_fraction_unit(ru) {
        let factor = dmf_conv_factor(ru, lu)?;
        log::debug!("Converting {} from {ru} to {lu} (factor {factor})", right.var_name);
        right.scale(factor);
        right.set_units(lu);
        Ok(())
    } else {
        Err(AuxError::IncompatibleUnits {
            left: left.var_name.clone(),
            left_units: left.units.clone(),
            right: right.var_name.clone(),
            right_units: right.units.clone(),
        })
    }
}

/// Element-wise sum. The result keeps the metadata of `left`.
pub fn add_cubes(mut left: Cube, mut right: Cube) -> AuxResult<Cube> {
    check_same_shape(&left, &right)?;
    harmonise_units(&left, &mut right)?;
    left.data += &right.data;
    Ok(left)
}

/// Element-wise difference `left - right`. The result keeps the metadata of `left`.
pub fn subtract_cubes(mut left: Cube, mut right: Cube) -> AuxResult<Cube> {
    check_same_shape(&left, &right)?;
    harmonise_units(&left, &mut right)?;
    left.data -= &right.data;
    Ok(left)
}

pub fn multiply_cubes(mut left: Cube, right: Cube) -> AuxResult<Cube> {
    check_same_shape(&left, &right)?;
    let units = match (left.units.as_str(), right.units.as_str()) {
        (DIMENSIONLESS, r) => r.to_string(),
        (l, DIMENSIONLESS) => l.to_string(),
        (l, r) => format!("{l} {r}"),
    };
    left.data *= &right.data;
    left.set_units(units);
    Ok(left)
}

pub fn divide_cubes(mut left: Cube, right: Cube) -> AuxResult<Cube> {
    check_same_shape(&left, &right)?;
    let lu = canonical_unit(&left.units);
    let ru = canonical_unit(&right.units);
    let units = if lu == ru {
        DIMENSIONLESS.to_string()
    } else if ru == DIMENSIONLESS {
        left.units.clone()
    } else {
        format!("{}/({})", left.units, right.units)
    };
    left.data /= &right.data;
    left.set_units(units);
    Ok(left)
}

/// Read the wavelength in nm out of an optical depth variable name such as "od550aer".
pub fn wavelength_from_var_name(var_name: &str) -> Option<f64> {
    static OD_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = OD_REGEX.get_or_init(|| {
        Regex::new(r"^od(?<wvl>\d+)").expect("optical depth regex must be valid")
    });
    re.captures(var_name)
        .and_then(|c| c.name("wvl"))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Ångström exponent between two optical depths: `-ln(od1/od2) / ln(lambda1/lambda2)`.
///
/// Wavelengths not given are taken from the variable names of the cubes.
pub fn compute_angstrom_coeff_cubes(od1: Cube, od2: Cube, lambda1: Option<f64>, lambda2: Option<f64>) -> AuxResult<Cube> {
    check_same_shape(&od1, &od2)?;
    let lambda1 = lambda1.or_else(|| wavelength_from_var_name(&od1.var_name))
        .ok_or_else(|| AuxError::MissingWavelength(od1.var_name.clone()))?;
    let lambda2 = lambda2.or_else(|| wavelength_from_var_name(&od2.var_name))
        .ok_or_else(|| AuxError::MissingWavelength(od2.var_name.clone()))?;

    if lambda1 == lambda2 {
        return Err(AuxError::bad_arguments(
            "calc_ae",
            format!("wavelengths must differ, got {lambda1} nm for both {} and {}", od1.var_name, od2.var_name),
        ));
    }

    let denom = (lambda1 / lambda2).ln();
    let mut out = od1;
    ndarray::Zip::from(&mut out.data)
        .and(&od2.data)
        .for_each(|a, &b| *a = -(*a / b).ln() / denom);
    out.set_units(DIMENSIONLESS);
    out.set_var_name(format!("ang{}{}aer", (lambda1 / 10.0).round(), (lambda2 / 10.0).round()));
    Ok(out)
}

/// Convert a mass mixing ratio cube (var name "mmr<species>") to a volume mixing ratio.
///
/// The input must be in kg/kg (or plain "1").
pub fn mmr_to_vmr_cube(mut cube: Cube) -> AuxResult<Cube> {
    if !cube.var_name.starts_with("mmr") {
        return Err(AuxError::bad_arguments(
            "mmr_to_vmr",
            format!("variable {} is not a mass mixing ratio", cube.var_name),
        ));
    }
    if cube.units != DIMENSIONLESS && !MASS_FRACTION_UNITS.contains(&cube.units.as_str()) {
        return Err(AuxError::unit_mismatch(&cube.var_name, MASS_FRACTION_UNITS[0], &cube.units));
    }

    let species = get_species(&cube.var_name)?.to_string();
    let factor = get_molmass(AIR_DRY)? / get_molmass(&species)?;
    cube.scale(factor);
    cube.set_units(MOL_MOL);
    cube.set_var_name(format!("vmr{species}"));
    Ok(cube)
}
