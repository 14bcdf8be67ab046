//! Derived nitrogen species.
//!
//! These calculators take the gas phase mixing ratios and particulate mass
//! concentrations that models and observation networks report and express
//! them as nitrogen-equivalent mass concentrations ("ug N m-3"), so that e.g.
//! total nitrate (particulate NO3 + gaseous HNO3) can be compared between
//! datasets that split the species differently.
//!
//! Every calculator checks the units of its inputs before doing anything,
//! after normalizing a few known aliases (see [`crate::units::canonical_unit`]).
//! A wrong unit is reported as [`AuxError::UnitMismatch`]; there is no
//! attempt to convert.

use crate::{
    cube::Cube,
    cube_ops::{add_cubes, divide_cubes},
    error::{AuxError, AuxResult},
    molmasses::{get_molmass, AIR_DRY, M_H, M_N, M_O},
    units::{canonical_unit, DIMENSIONLESS, PPB, UG_M3, UG_N_M3},
};

/// Specific gas constant of dry air (J kg-1 K-1)
pub const R_DRY_AIR: f64 = 287.058;
/// Temperature (K) used to convert mixing ratios to concentrations
pub const STANDARD_T: f64 = 293.0;
/// Pressure (Pa) used to convert mixing ratios to concentrations
pub const STANDARD_P: f64 = 101300.0;

/// N / NH3
pub const NH3_TO_N: f64 = M_N / (M_N + M_H * 3.0);
/// N / NH4
pub const NH4_TO_N: f64 = M_N / (M_N + M_H * 4.0);
/// N / HNO3
pub const HNO3_TO_N: f64 = M_N / (M_H + M_N + M_O * 3.0);
/// N / NO3
pub const NO3_TO_N: f64 = M_N / (M_N + M_O * 3.0);

/// The `R T / P` factor applied to a mass mixing ratio at standard conditions.
pub fn stp_rho() -> f64 {
    R_DRY_AIR * STANDARD_T / STANDARD_P
}

/// Normalize the units of `cube` and check that they are `expected`.
fn require_units(cube: &mut Cube, expected: &str) -> AuxResult<()> {
    let canonical = canonical_unit(&cube.units);
    if canonical != cube.units {
        log::debug!("Treating units '{}' of {} as '{canonical}'", cube.units, cube.var_name);
        cube.units = canonical.to_string();
    }

    if cube.units != expected {
        return Err(AuxError::unit_mismatch(&cube.var_name, expected, &cube.units));
    }
    Ok(())
}

fn finish(mut cube: Cube, var_name: &str, units: &str, ts_type: crate::cube::TsType) -> Cube {
    cube.set_var_name(var_name);
    cube.set_units(units);
    cube.ts_type = ts_type;
    cube
}

/// Convert a gas volume mixing ratio into a mass mixing ratio using the molar
/// mass of the cube's species.
pub fn mmr_from_vmr(cube: Cube) -> AuxResult<Cube> {
    let m_air = get_molmass(AIR_DRY)?;
    let m_var = get_molmass(&cube.var_name)?;
    Ok(cube.scaled(m_var / m_air))
}

/// Convert a gas volume mixing ratio into a mass concentration at standard
/// temperature and pressure.
pub fn conc_from_vmr_stp(cube: Cube) -> AuxResult<Cube> {
    let mmr = mmr_from_vmr(cube)?;
    let mut conc = mmr.scaled(stp_rho());
    conc.set_units(UG_M3);
    Ok(conc)
}

/// Gaseous NH3 as nitrogen, from a mixing ratio in ppb.
///
/// The mixing ratio is first converted to an NH3 mass concentration with the
/// molar mass of NH3 (`rho * M_NH3 / M_air`), then scaled by `M_N / M_NH3`.
/// Writing `M_N / M_air` for the first step instead gives a value that is
/// smaller by a factor `M_N / M_NH3`.
pub fn calc_concnh3(mut vmrnh3: Cube) -> AuxResult<Cube> {
    require_units(&mut vmrnh3, PPB)?;
    let ts_type = vmrnh3.ts_type;
    let concnh3 = conc_from_vmr_stp(vmrnh3)?.scaled(NH3_TO_N);
    Ok(finish(concnh3, "concNnh3", UG_N_M3, ts_type))
}

/// Particulate NH4 as nitrogen.
pub fn calc_concnh4(mut concnh4: Cube) -> AuxResult<Cube> {
    require_units(&mut concnh4, UG_M3)?;
    let ts_type = concnh4.ts_type;
    let concnh4 = concnh4.scaled(NH4_TO_N);
    Ok(finish(concnh4, "concNnh4", UG_N_M3, ts_type))
}

/// Gaseous HNO3 as nitrogen, from a mixing ratio in ppb.
pub fn calc_conchno3(mut vmrhno3: Cube) -> AuxResult<Cube> {
    require_units(&mut vmrhno3, PPB)?;
    let ts_type = vmrhno3.ts_type;
    let conchno3 = conc_from_vmr_stp(vmrhno3)?.scaled(HNO3_TO_N);
    Ok(finish(conchno3, "concNhno3", UG_N_M3, ts_type))
}

/// Fine plus (if available) coarse nitrate, in ug/m3 of NO3.
fn total_nitrate(concno3c: Option<Cube>, mut concno3f: Cube) -> AuxResult<Cube> {
    require_units(&mut concno3f, UG_M3)?;
    match concno3c {
        Some(mut coarse) => {
            require_units(&mut coarse, UG_M3)?;
            add_cubes(concno3f, coarse)
        },
        None => {
            log::debug!("No coarse nitrate given, using {} alone", concno3f.var_name);
            Ok(concno3f)
        }
    }
}

/// PM10 nitrate as nitrogen: fine plus coarse mode, or the fine mode alone if
/// `concno3c` is `None`.
pub fn calc_concno310(concno3c: Option<Cube>, concno3f: Cube) -> AuxResult<Cube> {
    let ts_type = concno3f.ts_type;
    let concno310 = total_nitrate(concno3c, concno3f)?.scaled(NO3_TO_N);
    Ok(finish(concno310, "concNno310", UG_N_M3, ts_type))
}

pub fn calc_fine_concno310(concno3f: Cube) -> AuxResult<Cube> {
    calc_concno310(None, concno3f)
}

/// PM2.5 nitrate as nitrogen.
pub fn calc_concno325(mut concno3f: Cube) -> AuxResult<Cube> {
    require_units(&mut concno3f, UG_M3)?;
    let ts_type = concno3f.ts_type;
    let concno325 = concno3f.scaled(NO3_TO_N);
    Ok(finish(concno325, "concNno325", UG_N_M3, ts_type))
}

/// Total nitrate (particulate NO3 + gaseous HNO3) as nitrogen.
///
/// The output has the temporal resolution of `vmrhno3`.
pub fn calc_conctno3(concno3c: Option<Cube>, concno3f: Cube, mut vmrhno3: Cube) -> AuxResult<Cube> {
    require_units(&mut vmrhno3, PPB)?;
    let ts_type = vmrhno3.ts_type;

    let mut concno3 = total_nitrate(concno3c, concno3f)?.scaled(NO3_TO_N);
    let mut conchno3 = conc_from_vmr_stp(vmrhno3)?.scaled(HNO3_TO_N);
    // Both are now nitrogen mass concentrations
    concno3.set_units(UG_N_M3);
    conchno3.set_units(UG_N_M3);

    let conctno3 = add_cubes(concno3, conchno3)?;
    Ok(finish(conctno3, "concNtno3", UG_N_M3, ts_type))
}

pub fn calc_fine_conctno3(concno3f: Cube, vmrhno3: Cube) -> AuxResult<Cube> {
    calc_conctno3(None, concno3f, vmrhno3)
}

/// Total reduced nitrogen (particulate NH4 + gaseous NH3) as nitrogen.
///
/// The output has the temporal resolution of `concnh4`.
pub fn calc_conctnh(mut concnh4: Cube, mut vmrnh3: Cube) -> AuxResult<Cube> {
    require_units(&mut concnh4, UG_M3)?;
    require_units(&mut vmrnh3, PPB)?;
    let ts_type = concnh4.ts_type;

    let mut concnh3 = conc_from_vmr_stp(vmrnh3)?.scaled(NH3_TO_N);
    let mut concnh4 = concnh4.scaled(NH4_TO_N);
    concnh3.set_units(UG_N_M3);
    concnh4.set_units(UG_N_M3);

    let conctnh = add_cubes(concnh3, concnh4)?;
    Ok(finish(conctnh, "concNtnh", UG_N_M3, ts_type))
}

/// Ratio of PM10 to PM2.5; just PM10 if `pm25` is `None`.
///
/// Both inputs must be in the same units.
pub fn calc_ratpm10pm25(mut pm10: Cube, pm25: Option<Cube>) -> AuxResult<Cube> {
    let ts_type = pm10.ts_type;
    let ratio = match pm25 {
        Some(mut pm25) => {
            let expected = canonical_unit(&pm10.units).to_string();
            require_units(&mut pm10, &expected)?;
            require_units(&mut pm25, &expected)?;
            divide_cubes(pm10, pm25)?
        },
        None => pm10,
    };
    Ok(finish(ratio, "ratpm10pm25", DIMENSIONLESS, ts_type))
}

/// Total AOD as the sum of the per-species optical depths.
///
/// All inputs must be dimensionless. The result keeps the name and
/// temporal resolution of the first input.
pub fn calc_aod_from_species_contributions(contributions: Vec<Cube>) -> AuxResult<Cube> {
    let mut it = contributions.into_iter();
    let mut total = it.next().ok_or_else(|| AuxError::bad_arguments(
        "calc_aod_from_species_contributions", "at least one species contribution is required"
    ))?;
    require_units(&mut total, DIMENSIONLESS)?;

    for mut contrib in it {
        require_units(&mut contrib, DIMENSIONLESS)?;
        total = add_cubes(total, contrib)?;
    }
    Ok(total)
}
