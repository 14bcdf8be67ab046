//! Auxiliary variable calculators and experiment configuration for
//! atmospheric model evaluation.
//!
//! The calculators in [`species`] and [`cube_ops`] turn one or more
//! [`cube::Cube`]s into a derived variable (e.g. total nitrate as nitrogen)
//! and are looked up by name through [`registry::funs`]. [`config`] holds the
//! typed configuration of an evaluation experiment.
pub mod error;
pub mod units;
pub mod molmasses;
pub mod cube;
pub mod cube_ops;
pub mod species;
pub mod registry;
pub mod config;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_utils;
