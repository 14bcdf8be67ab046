//! The labeled data cube that auxiliary calculators operate on.
//!
//! A [`Cube`] is an N-dimensional array of values tagged with a variable name,
//! a unit string and a temporal resolution ([`TsType`]). Missing values are NaN
//! in memory and `null` when serialized.

use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Temporal resolution of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TsType {
    Minutely,
    Hourly,
    #[strum(serialize = "3hourly")]
    #[serde(rename = "3hourly")]
    ThreeHourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Native,
    Coarsest,
}

impl TsType {
    /// Position from finest (0) to coarsest; `None` for the symbolic resolutions.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Minutely => Some(0),
            Self::Hourly => Some(1),
            Self::ThreeHourly => Some(2),
            Self::Daily => Some(3),
            Self::Weekly => Some(4),
            Self::Monthly => Some(5),
            Self::Yearly => Some(6),
            Self::Native | Self::Coarsest => None,
        }
    }

    /// True if `self` is strictly finer than `other`. Unranked resolutions compare false.
    pub fn is_finer_than(&self, other: &TsType) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CubeRecord", try_from = "CubeRecord")]
pub struct Cube {
    pub var_name: String,
    pub units: String,
    pub ts_type: TsType,
    pub data: ArrayD<f64>,
    pub attributes: IndexMap<String, String>,
}

impl Cube {
    pub fn new<V: ToString, U: ToString>(var_name: V, units: U, ts_type: TsType, data: ArrayD<f64>) -> Self {
        Self {
            var_name: var_name.to_string(),
            units: units.to_string(),
            ts_type,
            data,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute<K: ToString, V: ToString>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_units<U: ToString>(&mut self, units: U) {
        self.units = units.to_string();
    }

    pub fn set_var_name<V: ToString>(&mut self, var_name: V) {
        self.var_name = var_name.to_string();
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Multiply every value by `factor` in place.
    pub fn scale(&mut self, factor: f64) {
        self.data.mapv_inplace(|v| v * factor);
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        self.scale(factor);
        self
    }

    /// Replace values outside `[low, high]` with NaN, returning how many were masked.
    pub fn mask_outside(&mut self, low: f64, high: f64) -> usize {
        let mut n = 0;
        for v in self.data.iter_mut() {
            if !v.is_nan() && (*v < low || *v > high) {
                *v = f64::NAN;
                n += 1;
            }
        }
        if n > 0 {
            log::warn!("{n} values of {} outside [{low}, {high}] were masked", self.var_name);
        }
        n
    }

    /// Replace exact zeros with NaN, returning how many were replaced.
    pub fn zeros_to_nan(&mut self) -> usize {
        let mut n = 0;
        for v in self.data.iter_mut() {
            if *v == 0.0 {
                *v = f64::NAN;
                n += 1;
            }
        }
        n
    }
}

/// Flat serialized form of a [`Cube`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CubeRecord {
    var_name: String,
    units: String,
    ts_type: TsType,
    shape: Vec<usize>,
    values: Vec<Option<f64>>,
    #[serde(default)]
    attributes: IndexMap<String, String>,
}

impl From<Cube> for CubeRecord {
    fn from(cube: Cube) -> Self {
        let shape = cube.data.shape().to_vec();
        let values = cube.data.iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        Self {
            var_name: cube.var_name,
            units: cube.units,
            ts_type: cube.ts_type,
            shape,
            values,
            attributes: cube.attributes,
        }
    }
}

impl TryFrom<CubeRecord> for Cube {
    type Error = ndarray::ShapeError;

    fn try_from(record: CubeRecord) -> Result<Self, Self::Error> {
        let values = record.values.into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        let data = ArrayD::from_shape_vec(IxDyn(&record.shape), values)?;
        Ok(Self {
            var_name: record.var_name,
            units: record.units,
            ts_type: record.ts_type,
            data,
            attributes: record.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use ndarray::array;

    #[test]
    fn test_ts_type_strings() {
        assert_eq!(TsType::from_str("3hourly").unwrap(), TsType::ThreeHourly);
        assert_eq!(TsType::from_str("monthly").unwrap(), TsType::Monthly);
        assert_eq!(TsType::Daily.to_string(), "daily");
        assert!(TsType::from_str("fortnightly").is_err());
        assert!(TsType::Daily.is_finer_than(&TsType::Monthly));
        assert!(!TsType::Monthly.is_finer_than(&TsType::Daily));
        assert!(!TsType::Native.is_finer_than(&TsType::Monthly));
    }

    #[test]
    fn test_mask_outside() {
        let mut cube = Cube::new("concpm10", "ug/m3", TsType::Daily, array![-5.0, 1.0, 6000.0, f64::NAN].into_dyn());
        assert_eq!(cube.mask_outside(-1.0, 5000.0), 2);
        assert!(cube.data[[0]].is_nan());
        assert_eq!(cube.data[[1]], 1.0);
        assert!(cube.data[[2]].is_nan());
    }

    #[test]
    fn test_json_missing_values() {
        let cube = Cube::new("vmro3", "ppb", TsType::Monthly, array![[1.0, f64::NAN], [3.0, 4.0]].into_dyn())
            .with_attribute("source", "test");
        let s = serde_json::to_string(&cube).unwrap();
        assert!(s.contains("null"));
        assert!(s.contains("\"ts_type\":\"monthly\""));

        let back: Cube = serde_json::from_str(&s).unwrap();
        assert_eq!(back.shape(), &[2, 2]);
        assert!(back.data[[0, 1]].is_nan());
        assert_eq!(back.data[[1, 1]], 4.0);
        assert_eq!(back.attributes.get("source").map(|s| s.as_str()), Some("test"));
    }

    #[test]
    fn test_bad_shape_rejected() {
        let s = r#"{"var_name": "vmro3", "units": "ppb", "ts_type": "daily", "shape": [3], "values": [1.0, 2.0]}"#;
        assert!(serde_json::from_str::<Cube>(s).is_err());
    }
}
