//! Configuration of a model evaluation experiment.
//!
//! The evaluation processor is configured with a single TOML file that lists
//! which models to evaluate, against which observations, over which periods,
//! and where to put the output. See `docs/configuration.md` for a complete
//! example. Broadly the file has four parts:
//!
//! - the model registry (`[model_cfg.<name>]` tables),
//! - the observation registry (`[obs_cfg.<name>]` tables),
//! - output locations and processing switches (top level keys), and
//! - experiment metadata (`proj_id`, `exp_id`, ...).
//!
//! # Models
//!
//! Each model gets a table keyed by the name it should have in the web
//! interface. Only `model_id` (the name of the model run in the data
//! directory) is required:
//!
//! ```toml
//! [model_cfg.NorESM]
//! model_id = "NorESM2.5-hybrid.20240822"
//! ```
//!
//! Variables a model does not provide directly can be computed from others
//! with one of the auxiliary calculators in [`crate::registry`]:
//!
//! ```toml
//! [model_cfg.EMEP.model_read_aux.concNtno3]
//! vars_required = ["concno3c", "concno3f", "vmrhno3"]
//! fun = "calc_conctno3"
//! ```
//!
//! # Observations
//!
//! ```toml
//! [obs_cfg.Aeronet]
//! obs_id = "AeronetSunV3Lev2.daily"
//! obs_vars = ["od550aer"]
//! obs_vert_type = "Column"
//! obs_filters = { altitude = [0, 1000], station_name = "DRAGON*", negate = "station_name" }
//! min_num_obs = { monthly = { daily = 3 } }
//! ```
//!
//! Filter values are either a numeric `[low, high]` range, a glob pattern,
//! or a list of glob patterns. The `negate` key lists the filters (one or
//! several) whose match should be inverted, so the example above excludes
//! all DRAGON campaign sites.
//!
//! # Environment overrides
//!
//! When loaded with [`EvalConfig::load`], a handful of top level keys (see
//! [`ENV_OVERRIDABLE_KEYS`]) can be overridden by environment variables with
//! the `AEROVAL_` prefix, e.g. `AEROVAL_EXP_ID=test2`.
use std::{fmt::Display, path::{Path, PathBuf}, str::FromStr};

use chrono::{Datelike, NaiveDate};
use error_stack::ResultExt;
use figment::{providers::{Env, Format, Toml}, Figment};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{cube::{Cube, TsType}, registry::Registry};

pub const ENV_PREFIX: &str = "AEROVAL_";

pub static ENV_OVERRIDABLE_KEYS: &[&str] = &[
    "json_basedir",
    "coldata_basedir",
    "proj_id",
    "exp_id",
    "exp_name",
    "raise_exceptions",
    "reanalyse_existing",
    "clear_existing_json",
    "only_json",
    "public",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("Could not read configuration file {}", .0.display())]
    Read(PathBuf),
    #[error("Could not parse the configuration")]
    Parse,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid<S: ToString>(msg: S) -> Self {
        Self::Invalid(msg.to_string())
    }
}

/// The full configuration of one evaluation experiment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    pub model_cfg: IndexMap<String, ModelEntry>,
    pub obs_cfg: IndexMap<String, ObsEntry>,

    /// Where the JSON files for the web interface are written.
    pub json_basedir: PathBuf,
    /// Where colocated data files are stored.
    pub coldata_basedir: PathBuf,
    #[serde(default)]
    pub io_aux_file: Option<PathBuf>,
    #[serde(default)]
    pub var_scale_colmap_file: Option<PathBuf>,

    /// Delete and recompute existing colocated data files.
    #[serde(default = "default_true")]
    pub reanalyse_existing: bool,
    #[serde(default)]
    pub only_json: bool,
    #[serde(default)]
    pub add_model_maps: bool,
    #[serde(default)]
    pub only_model_maps: bool,
    #[serde(default = "default_true")]
    pub clear_existing_json: bool,
    /// Stop the whole evaluation at the first error instead of logging it and continuing.
    #[serde(default)]
    pub raise_exceptions: bool,

    /// Regional filter for the analysis
    #[serde(default = "default_filter_name")]
    pub filter_name: String,
    /// Colocation frequency; no statistics at a finer resolution can be computed.
    #[serde(default = "default_ts_type")]
    pub ts_type: TsType,
    #[serde(default = "default_map_zoom")]
    pub map_zoom: String,
    #[serde(default = "default_freqs")]
    pub freqs: Vec<TsType>,
    #[serde(default = "default_ts_type")]
    pub main_freq: TsType,
    pub periods: Vec<Period>,

    #[serde(default)]
    pub zeros_to_nan: bool,
    #[serde(default)]
    pub colocate_time: bool,
    #[serde(default)]
    pub obs_remove_outliers: bool,
    #[serde(default)]
    pub model_remove_outliers: bool,
    /// Ranges outside which values are treated as outliers, by variable.
    #[serde(default)]
    pub var_outlier_ranges: IndexMap<String, ValueRange>,
    #[serde(default = "default_true")]
    pub harmonise_units: bool,
    #[serde(default)]
    pub annual_stats_constrained: bool,
    #[serde(default = "default_true")]
    pub weighted_stats: bool,

    pub proj_id: String,
    pub exp_id: String,
    #[serde(default)]
    pub exp_name: String,
    #[serde(default)]
    pub exp_descr: String,
    #[serde(default)]
    pub exp_pi: String,
    #[serde(default)]
    pub public: bool,
}

impl EvalConfig {
    pub fn from_toml_str(s: &str) -> error_stack::Result<Self, ConfigError> {
        toml::from_str(s).change_context(ConfigError::Parse)
    }

    pub fn from_toml_file(p: &Path) -> error_stack::Result<Self, ConfigError> {
        let s = std::fs::read_to_string(p)
            .change_context_lazy(|| ConfigError::Read(p.to_path_buf()))?;
        Self::from_toml_str(&s)
            .attach_printable_lazy(|| format!("in file {}", p.display()))
    }

    /// Load the configuration from a TOML file, letting `AEROVAL_*` environment
    /// variables override the keys in [`ENV_OVERRIDABLE_KEYS`].
    ///
    /// Unlike [`EvalConfig::from_toml_file`], the model and observation tables
    /// will be in alphabetical order rather than file order.
    pub fn load(p: &Path) -> error_stack::Result<Self, ConfigError> {
        if !p.exists() {
            return Err(ConfigError::NotFound(p.to_path_buf()).into());
        }

        Figment::from(Toml::file(p))
            .merge(Env::prefixed(ENV_PREFIX).only(ENV_OVERRIDABLE_KEYS))
            .extract()
            .change_context(ConfigError::Parse)
            .attach_printable_lazy(|| format!("in file {} or {ENV_PREFIX}* environment variables", p.display()))
    }

    /// Check the consistency of the configuration.
    ///
    /// `registry` is used to check that any auxiliary variables requested
    /// for the models name calculators that exist and give them the right
    /// number of inputs.
    pub fn validate(&self, registry: &Registry) -> error_stack::Result<(), ConfigError> {
        if self.model_cfg.is_empty() {
            return Err(ConfigError::invalid("no models configured").into());
        }
        if self.obs_cfg.is_empty() {
            return Err(ConfigError::invalid("no observations configured").into());
        }
        if self.periods.is_empty() {
            return Err(ConfigError::invalid("no periods configured").into());
        }

        if !self.freqs.contains(&self.main_freq) {
            return Err(ConfigError::invalid(format!(
                "main_freq '{}' is not one of the freqs", self.main_freq
            )).into());
        }
        if let Some(f) = self.freqs.iter().find(|f| f.is_finer_than(&self.ts_type)) {
            return Err(ConfigError::invalid(format!(
                "frequency '{f}' is finer than the colocation frequency '{}'", self.ts_type
            )).into());
        }

        if self.only_model_maps && !self.add_model_maps {
            return Err(ConfigError::invalid("only_model_maps requires add_model_maps").into());
        }

        for (var, range) in self.var_outlier_ranges.iter() {
            range.check().change_context_lazy(|| ConfigError::invalid(format!(
                "bad outlier range for {var}"
            )))?;
        }

        for (name, model) in self.model_cfg.iter() {
            model.validate(registry)
                .attach_printable_lazy(|| format!("in model entry '{name}'"))?;
        }

        for (name, obs) in self.obs_cfg.iter() {
            obs.validate()
                .attach_printable_lazy(|| format!("in observation entry '{name}'"))?;
        }

        Ok(())
    }

    pub fn outlier_range(&self, var_name: &str) -> Option<&ValueRange> {
        self.var_outlier_ranges.get(var_name)
    }

    /// Mask outliers (if enabled for this kind of data and a range is configured
    /// for the cube's variable) and zeros (if `zeros_to_nan` is set).
    /// Returns the number of values masked.
    pub fn preprocess(&self, cube: &mut Cube, is_obs: bool) -> usize {
        let remove_outliers = if is_obs { self.obs_remove_outliers } else { self.model_remove_outliers };
        let mut n = 0;
        if remove_outliers {
            if let Some(range) = self.outlier_range(&cube.var_name) {
                n += cube.mask_outside(range.0, range.1);
            } else {
                log::debug!("No outlier range configured for {}", cube.var_name);
            }
        }
        if self.zeros_to_nan {
            n += cube.zeros_to_nan();
        }
        n
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub model_id: String,
    #[serde(default)]
    pub model_ts_type_read: Option<TsType>,
    /// Variables to read under a different name, e.g. `od550aer = "od550csaer"`.
    #[serde(default)]
    pub model_use_vars: IndexMap<String, String>,
    /// Variables to compute from other model variables.
    #[serde(default)]
    pub model_read_aux: IndexMap<String, AuxReadSpec>,
}

impl ModelEntry {
    fn validate(&self, registry: &Registry) -> error_stack::Result<(), ConfigError> {
        if self.model_id.is_empty() {
            return Err(ConfigError::invalid("model_id is empty").into());
        }

        for (var, aux) in self.model_read_aux.iter() {
            let fun = registry.get(&aux.fun)
                .change_context_lazy(|| ConfigError::invalid(format!(
                    "auxiliary variable {var} uses an unknown function"
                )))?;
            if !fun.accepts_n_inputs(aux.vars_required.len()) {
                return Err(ConfigError::invalid(format!(
                    "auxiliary variable {var} gives {} inputs to {}",
                    aux.vars_required.len(), fun.signature()
                )).into());
            }
        }
        Ok(())
    }
}

/// How to compute an auxiliary variable: which function and what to feed it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuxReadSpec {
    pub vars_required: Vec<String>,
    pub fun: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum VertType {
    Column,
    Surface,
    ModelLevel,
    Profile,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObsEntry {
    pub obs_id: String,
    pub obs_vars: Vec<String>,
    pub obs_vert_type: VertType,
    #[serde(default)]
    pub obs_filters: IndexMap<String, FilterValue>,
    /// Minimum number of observations at the inner resolution needed to
    /// resample to the outer one, e.g. `{ monthly = { daily = 3 } }`.
    #[serde(default)]
    pub min_num_obs: IndexMap<String, IndexMap<String, u32>>,
}

impl ObsEntry {
    pub const NEGATE_KEY: &'static str = "negate";

    /// The filter keys whose match is inverted.
    pub fn negated_filters(&self) -> Vec<&str> {
        match self.obs_filters.get(Self::NEGATE_KEY) {
            Some(FilterValue::Pattern(key)) => vec![key.as_str()],
            Some(FilterValue::Patterns(keys)) => keys.iter().map(|k| k.as_str()).collect(),
            _ => vec![],
        }
    }

    fn validate(&self) -> error_stack::Result<(), ConfigError> {
        if self.obs_vars.is_empty() {
            return Err(ConfigError::invalid("obs_vars is empty").into());
        }

        for (key, value) in self.obs_filters.iter() {
            if key == Self::NEGATE_KEY {
                if matches!(value, FilterValue::Range(_)) {
                    return Err(ConfigError::invalid("'negate' must name filter keys, not a range").into());
                }
                continue;
            }
            value.check().change_context_lazy(|| ConfigError::invalid(format!(
                "bad value for filter '{key}'"
            )))?;
        }

        for key in self.negated_filters() {
            if key == Self::NEGATE_KEY || !self.obs_filters.contains_key(key) {
                return Err(ConfigError::invalid(format!(
                    "'negate' refers to filter '{key}', which is not defined"
                )).into());
            }
        }

        for (outer, inner) in self.min_num_obs.iter() {
            let outer_ts = parse_ts_type(outer)?;
            for inner in inner.keys() {
                let inner_ts = parse_ts_type(inner)?;
                if !inner_ts.is_finer_than(&outer_ts) {
                    return Err(ConfigError::invalid(format!(
                        "min_num_obs: '{inner}' is not finer than '{outer}'"
                    )).into());
                }
            }
        }

        Ok(())
    }
}

fn parse_ts_type(s: &str) -> error_stack::Result<TsType, ConfigError> {
    TsType::from_str(s).change_context_lazy(|| ConfigError::invalid(format!("unknown ts_type '{s}'")))
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("range lower bound {0} is greater than upper bound {1}")]
pub struct RangeError(f64, f64);

/// An inclusive `[low, high]` range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ValueRange(pub f64, pub f64);

impl ValueRange {
    fn check(&self) -> Result<(), RangeError> {
        if self.0 > self.1 {
            Err(RangeError(self.0, self.1))
        } else {
            Ok(())
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.0 && value <= self.1
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range(ValueRange),
    Pattern(String),
    Patterns(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("invalid pattern '{0}'")]
    Pattern(String),
}

impl FilterValue {
    fn check(&self) -> Result<(), FilterError> {
        match self {
            FilterValue::Range(r) => Ok(r.check()?),
            FilterValue::Pattern(p) => check_pattern(p),
            FilterValue::Patterns(ps) => ps.iter().try_for_each(|p| check_pattern(p)),
        }
    }

    /// Whether a string metadata value matches this filter. Ranges never match strings.
    pub fn matches_str(&self, value: &str) -> bool {
        let matches = |p: &String| glob::Pattern::new(p).is_ok_and(|p| p.matches(value));
        match self {
            FilterValue::Range(_) => false,
            FilterValue::Pattern(p) => matches(p),
            FilterValue::Patterns(ps) => ps.iter().any(matches),
        }
    }
}

fn check_pattern(p: &str) -> Result<(), FilterError> {
    glob::Pattern::new(p)
        .map(|_| ())
        .map_err(|_| FilterError::Pattern(p.to_string()))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeriodError {
    #[error("'{0}' is not a year or a YEAR-YEAR range")]
    BadFormat(String),
    #[error("period '{0}' ends before it starts")]
    Reversed(String),
}

/// A period of whole years, written "2010" or "2010-2021".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// The last day of the period (inclusive).
    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start.year()..=self.end.year()
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PeriodError::BadFormat(s.to_string());
        let (y1, y2) = match s.trim().split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s.trim(), s.trim()),
        };
        let y1: i32 = y1.parse().map_err(|_| bad())?;
        let y2: i32 = y2.parse().map_err(|_| bad())?;
        if y2 < y1 {
            return Err(PeriodError::Reversed(s.to_string()));
        }
        let start = NaiveDate::from_ymd_opt(y1, 1, 1).ok_or_else(bad)?;
        let end = NaiveDate::from_ymd_opt(y2, 12, 31).ok_or_else(bad)?;
        Ok(Self { start, end })
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (y1, y2) = (self.start.year(), self.end.year());
        if y1 == y2 {
            write!(f, "{y1}")
        } else {
            write!(f, "{y1}-{y2}")
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_filter_name() -> String {
    "ALL-wMOUNTAINS".to_string()
}

fn default_map_zoom() -> String {
    "World".to_string()
}

fn default_ts_type() -> TsType {
    TsType::Monthly
}

fn default_freqs() -> Vec<TsType> {
    vec![TsType::Monthly]
}
