//! Common errors across the aeroval-aux crate

use crate::units::UnknownUnitError;

pub type AuxResult<T> = Result<T, AuxError>;

/// Errors raised by the auxiliary variable calculators and cube arithmetic.
///
/// None of these are recoverable by the calculators themselves: the caller
/// gets no partial result and decides whether to abort the evaluation or
/// log the error and move on to the next variable.
#[derive(Debug, thiserror::Error)]
pub enum AuxError {
    /// A cube's declared unit does not match what a formula requires.
    #[error("Variable {var_name} has units '{actual}', expected '{expected}'")]
    UnitMismatch{var_name: String, expected: String, actual: String},
    #[error("Cannot combine {left} (shape {left_shape:?}) with {right} (shape {right_shape:?}): shapes differ")]
    ShapeMismatch{left: String, left_shape: Vec<usize>, right: String, right_shape: Vec<usize>},
    #[error("Cannot combine {left} ({left_units}) with {right} ({right_units}): incompatible units")]
    IncompatibleUnits{left: String, left_units: String, right: String, right_units: String},
    #[error("Could not determine the species of variable '{0}'")]
    UnknownSpecies(String),
    #[error("Could not determine the wavelength of variable '{0}'")]
    MissingWavelength(String),
    #[error("No auxiliary function named '{0}'")]
    UnknownFunction(String),
    #[error("Bad arguments for {func}: {reason}")]
    BadArguments{func: String, reason: String},
    #[error(transparent)]
    UnknownUnit(#[from] UnknownUnitError),
}

impl AuxError {
    pub(crate) fn unit_mismatch<V: ToString, E: ToString, A: ToString>(var_name: V, expected: E, actual: A) -> Self {
        Self::UnitMismatch { var_name: var_name.to_string(), expected: expected.to_string(), actual: actual.to_string() }
    }

    pub(crate) fn bad_arguments<F: ToString, R: ToString>(func: F, reason: R) -> Self {
        Self::BadArguments { func: func.to_string(), reason: reason.to_string() }
    }
}
