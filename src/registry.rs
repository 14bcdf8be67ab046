//! Lookup of auxiliary variable calculators by name.
//!
//! An evaluation processor that needs a derived variable (say, total nitrate)
//! is configured with the name of the calculator to use and the variables to
//! feed it. [`funs`] returns the registry of all calculators this crate
//! provides, each with the list of arguments it takes so that calls can be
//! checked before dispatch.
//!
//! Arguments are passed positionally as `Option<Cube>`; `None` marks an
//! absent optional input.

use std::fmt::Display;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    cube::Cube,
    cube_ops,
    error::{AuxError, AuxResult},
    species,
};

/// One parameter in a calculator's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Required(&'static str),
    /// May be given as `None` or, if trailing, left out.
    Optional(&'static str),
    /// One or more cubes; only valid as the last parameter.
    Variadic(&'static str),
}

impl Param {
    pub fn name(&self) -> &'static str {
        match self {
            Param::Required(n) | Param::Optional(n) | Param::Variadic(n) => n,
        }
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Required(n) => write!(f, "{n}"),
            Param::Optional(n) => write!(f, "{n}?"),
            Param::Variadic(n) => write!(f, "{n}..."),
        }
    }
}

pub type AuxFn = fn(Args) -> AuxResult<Cube>;

/// A registered calculator.
#[derive(Debug, Clone, Copy)]
pub struct AuxFunction {
    pub name: &'static str,
    pub params: &'static [Param],
    pub description: &'static str,
    func: AuxFn,
}

impl AuxFunction {
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.iter().join(", "))
    }

    /// Whether a call with `n` inputs (none of them absent) fits the signature.
    pub fn accepts_n_inputs(&self, n: usize) -> bool {
        match self.params.last() {
            Some(Param::Variadic(_)) => n >= self.params.len(),
            _ => n <= self.params.len()
                && self.params[n..].iter().all(|p| matches!(p, Param::Optional(_))),
        }
    }

    /// Check `inputs` against the signature and call the function.
    pub fn call(&self, inputs: Vec<Option<Cube>>) -> AuxResult<Cube> {
        let inputs = self.check_inputs(inputs)?;
        (self.func)(Args { func: self.name, inner: inputs.into_iter() })
    }

    fn check_inputs(&self, mut inputs: Vec<Option<Cube>>) -> AuxResult<Vec<Option<Cube>>> {
        let n_params = self.params.len();

        if let Some(Param::Variadic(name)) = self.params.last() {
            if inputs.len() < n_params {
                return Err(AuxError::bad_arguments(self.name, format!(
                    "expected at least {n_params} inputs, got {}", inputs.len()
                )));
            }
            if let Some(i) = inputs[n_params - 1..].iter().position(|c| c.is_none()) {
                return Err(AuxError::bad_arguments(self.name, format!(
                    "input {} to {name} may not be absent", i + 1
                )));
            }
        } else {
            if inputs.len() > n_params {
                return Err(AuxError::bad_arguments(self.name, format!(
                    "expected at most {n_params} inputs, got {}", inputs.len()
                )));
            }

            let omitted = &self.params[inputs.len()..];
            if let Some(p) = omitted.iter().find(|p| !matches!(p, Param::Optional(_))) {
                return Err(AuxError::bad_arguments(self.name, format!("missing input {}", p.name())));
            }
            inputs.resize_with(n_params, || None);
        }

        for (param, input) in self.params.iter().zip(inputs.iter()) {
            if let (Param::Required(name), None) = (param, input) {
                return Err(AuxError::bad_arguments(self.name, format!("input {name} is required")));
            }
        }

        Ok(inputs)
    }
}

/// Positional inputs handed to a registered calculator.
///
/// By the time a calculator sees these, [`AuxFunction::call`] has already
/// checked them against its parameters, so the accessors only fail if a
/// calculator's parameter list and body disagree.
pub struct Args {
    func: &'static str,
    inner: std::vec::IntoIter<Option<Cube>>,
}

impl Args {
    fn required(&mut self, name: &str) -> AuxResult<Cube> {
        self.inner.next()
            .flatten()
            .ok_or_else(|| AuxError::bad_arguments(self.func, format!("input {name} is required")))
    }

    fn optional(&mut self) -> Option<Cube> {
        self.inner.next().flatten()
    }

    fn rest(self) -> Vec<Cube> {
        self.inner.flatten().collect()
    }
}

pub struct Registry {
    funs: IndexMap<&'static str, AuxFunction>,
}

impl Registry {
    fn new(funs: Vec<AuxFunction>) -> Self {
        let funs = funs.into_iter().map(|f| (f.name, f)).collect();
        Self { funs }
    }

    pub fn get(&self, name: &str) -> AuxResult<&AuxFunction> {
        self.funs.get(name).ok_or_else(|| AuxError::UnknownFunction(name.to_string()))
    }

    pub fn call(&self, name: &str, inputs: Vec<Option<Cube>>) -> AuxResult<Cube> {
        log::debug!("Computing auxiliary variable with {name}");
        self.get(name)?.call(inputs)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.funs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuxFunction> {
        self.funs.values()
    }

    pub fn len(&self) -> usize {
        self.funs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funs.is_empty()
    }
}

macro_rules! aux_fn {
    ($name:literal, [$($param:expr),+ $(,)?], $descr:literal, $func:expr) => {
        AuxFunction { name: $name, params: &[$($param),+], description: $descr, func: $func }
    };
}

/// The registry of all auxiliary calculators.
pub fn funs() -> Registry {
    use Param::*;

    Registry::new(vec![
        aux_fn!("add_cubes", [Required("cube1"), Required("cube2")], "element-wise sum",
            |mut a| cube_ops::add_cubes(a.required("cube1")?, a.required("cube2")?)),
        aux_fn!("subtract_cubes", [Required("cube1"), Required("cube2")], "element-wise difference",
            |mut a| cube_ops::subtract_cubes(a.required("cube1")?, a.required("cube2")?)),
        aux_fn!("divide_cubes", [Required("cube1"), Required("cube2")], "element-wise ratio",
            |mut a| cube_ops::divide_cubes(a.required("cube1")?, a.required("cube2")?)),
        aux_fn!("multiply_cubes", [Required("cube1"), Required("cube2")], "element-wise product",
            |mut a| cube_ops::multiply_cubes(a.required("cube1")?, a.required("cube2")?)),
        aux_fn!("calc_ae", [Required("od1"), Required("od2")], "Angstrom exponent from two optical depths",
            |mut a| cube_ops::compute_angstrom_coeff_cubes(a.required("od1")?, a.required("od2")?, None, None)),
        aux_fn!("calc_ratpm10pm25", [Required("pm10"), Optional("pm25")], "PM10 / PM2.5 ratio",
            |mut a| {
                let pm10 = a.required("pm10")?;
                species::calc_ratpm10pm25(pm10, a.optional())
            }),
        aux_fn!("calc_conctno3", [Optional("concno3c"), Required("concno3f"), Required("vmrhno3")], "total nitrate as N",
            |mut a| {
                let coarse = a.optional();
                species::calc_conctno3(coarse, a.required("concno3f")?, a.required("vmrhno3")?)
            }),
        aux_fn!("calc_fine_conctno3", [Required("concno3f"), Required("vmrhno3")], "fine nitrate plus HNO3 as N",
            |mut a| species::calc_fine_conctno3(a.required("concno3f")?, a.required("vmrhno3")?)),
        aux_fn!("calc_conctnh", [Required("concnh4"), Required("vmrnh3")], "total reduced nitrogen as N",
            |mut a| species::calc_conctnh(a.required("concnh4")?, a.required("vmrnh3")?)),
        aux_fn!("calc_concnh3", [Required("vmrnh3")], "NH3 as N",
            |mut a| species::calc_concnh3(a.required("vmrnh3")?)),
        aux_fn!("calc_concnh4", [Required("concnh4")], "NH4 as N",
            |mut a| species::calc_concnh4(a.required("concnh4")?)),
        aux_fn!("calc_conchno3", [Required("vmrhno3")], "HNO3 as N",
            |mut a| species::calc_conchno3(a.required("vmrhno3")?)),
        aux_fn!("calc_concno310", [Optional("concno3c"), Required("concno3f")], "PM10 nitrate as N",
            |mut a| {
                let coarse = a.optional();
                species::calc_concno310(coarse, a.required("concno3f")?)
            }),
        aux_fn!("calc_fine_concno310", [Required("concno3f")], "fine nitrate as N",
            |mut a| species::calc_fine_concno310(a.required("concno3f")?)),
        aux_fn!("calc_concno325", [Required("concno3f")], "PM2.5 nitrate as N",
            |mut a| species::calc_concno325(a.required("concno3f")?)),
        aux_fn!("calc_aod_from_species_contributions", [Variadic("contributions")], "sum of species AODs",
            |a| species::calc_aod_from_species_contributions(a.rest())),
        aux_fn!("mmr_to_vmr", [Required("mmr")], "mass to volume mixing ratio",
            |mut a| cube_ops::mmr_to_vmr_cube(a.required("mmr")?)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cube_1d;
    use approx::assert_abs_diff_eq;

    static EXPECTED: &[(&str, usize)] = &[
        ("add_cubes", 2),
        ("subtract_cubes", 2),
        ("divide_cubes", 2),
        ("multiply_cubes", 2),
        ("calc_ae", 2),
        ("calc_ratpm10pm25", 2),
        ("calc_conctno3", 3),
        ("calc_fine_conctno3", 2),
        ("calc_conctnh", 2),
        ("calc_concnh3", 1),
        ("calc_concnh4", 1),
        ("calc_conchno3", 1),
        ("calc_concno310", 2),
        ("calc_fine_concno310", 1),
        ("calc_concno325", 1),
        ("calc_aod_from_species_contributions", 1),
        ("mmr_to_vmr", 1),
    ];

    #[test]
    fn test_registry_complete() {
        let reg = funs();
        assert_eq!(reg.len(), EXPECTED.len());
        assert!(!reg.is_empty());
        assert!(reg.names().eq(EXPECTED.iter().map(|(n, _)| *n)));
        assert!(!reg.contains("calc_concso4"));
        for (name, n_params) in EXPECTED {
            let f = reg.get(name).unwrap_or_else(|_| panic!("{name} missing from registry"));
            assert_eq!(f.name, *name);
            assert_eq!(f.params.len(), *n_params, "wrong number of parameters for {name}");
        }
    }

    #[test]
    fn test_variadic_only_last() {
        for f in funs().iter() {
            let n = f.params.len();
            for p in &f.params[..n - 1] {
                assert!(!matches!(p, Param::Variadic(_)), "{} has a non-trailing variadic parameter", f.name);
            }
        }
    }

    #[test]
    fn test_signature_string() {
        let reg = funs();
        assert_eq!(reg.get("calc_conctno3").unwrap().signature(), "calc_conctno3(concno3c?, concno3f, vmrhno3)");
        assert_eq!(
            reg.get("calc_aod_from_species_contributions").unwrap().signature(),
            "calc_aod_from_species_contributions(contributions...)"
        );
    }

    #[test]
    fn test_accepts_n_inputs() {
        let reg = funs();
        let ratio = reg.get("calc_ratpm10pm25").unwrap();
        assert!(ratio.accepts_n_inputs(1));
        assert!(ratio.accepts_n_inputs(2));
        assert!(!ratio.accepts_n_inputs(0));
        assert!(!ratio.accepts_n_inputs(3));

        let tno3 = reg.get("calc_conctno3").unwrap();
        assert!(tno3.accepts_n_inputs(3));
        assert!(!tno3.accepts_n_inputs(2));

        let aod = reg.get("calc_aod_from_species_contributions").unwrap();
        assert!(!aod.accepts_n_inputs(0));
        assert!(aod.accepts_n_inputs(5));
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(funs().call("calc_nothing", vec![]), Err(AuxError::UnknownFunction(_))));
    }

    #[test]
    fn test_dispatch_matches_direct_call() {
        let reg = funs();
        let f = cube_1d("concno3f", "ug/m3", &[1.0, 2.0]);
        let hno3 = cube_1d("vmrhno3", "ppb", &[0.5, 0.1]);

        let via_registry = reg.call("calc_conctno3", vec![None, Some(f.clone()), Some(hno3.clone())]).unwrap();
        let direct = species::calc_fine_conctno3(f, hno3).unwrap();
        assert_eq!(via_registry, direct);
    }

    #[test]
    fn test_trailing_optional_omitted() {
        let reg = funs();
        let out = reg.call("calc_ratpm10pm25", vec![Some(cube_1d("concpm10", "ug/m3", &[3.0]))]).unwrap();
        assert_abs_diff_eq!(out.data[[0]], 3.0);
    }

    #[test]
    fn test_bad_arguments() {
        let reg = funs();
        let c = || Some(cube_1d("concno3f", "ug/m3", &[1.0]));

        // leading optional cannot be left out
        assert!(matches!(reg.call("calc_concno310", vec![c()]), Err(AuxError::BadArguments { .. })));
        assert!(matches!(reg.call("calc_concno325", vec![]), Err(AuxError::BadArguments { .. })));
        assert!(matches!(reg.call("calc_concno325", vec![c(), c()]), Err(AuxError::BadArguments { .. })));
        assert!(matches!(reg.call("calc_concno325", vec![None]), Err(AuxError::BadArguments { .. })));
        assert!(matches!(reg.call("calc_aod_from_species_contributions", vec![]), Err(AuxError::BadArguments { .. })));
        assert!(matches!(
            reg.call("calc_aod_from_species_contributions", vec![c(), None]),
            Err(AuxError::BadArguments { .. })
        ));
    }

    #[test]
    fn test_variadic_call() {
        let reg = funs();
        let out = reg.call("calc_aod_from_species_contributions", vec![
            Some(cube_1d("od550so4", "1", &[0.1])),
            Some(cube_1d("od550dust", "1", &[0.2])),
        ]).unwrap();
        assert_abs_diff_eq!(out.data[[0]], 0.3, epsilon = 1e-12);
    }
}
