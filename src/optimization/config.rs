use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{FmErr, Result};

/// The hyperparameters of [`super::SgdUpdater`].
///
/// Serialized keys match the configuration keys accepted by
/// [`SgdConfig::from_kwargs`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SgdConfig {
    /// L1 shrinkage of the bias.
    #[serde(default = "defaults::l1")]
    pub l1: f32,
    /// L2 shrinkage of the bias.
    #[serde(default)]
    pub l2: f32,
    /// L2 shrinkage of the embeddings.
    #[serde(rename = "V_l2", default = "defaults::v_l2")]
    pub v_l2: f32,
    #[serde(default = "defaults::lr")]
    pub lr: f32,
    #[serde(default = "defaults::lr_beta")]
    pub lr_beta: f32,
    #[serde(rename = "V_lr", default = "defaults::lr")]
    pub v_lr: f32,
    #[serde(rename = "V_lr_beta", default = "defaults::lr_beta")]
    pub v_lr_beta: f32,
    /// Embeddings start uniformly distributed in `[-v_init_scale, v_init_scale]`.
    #[serde(rename = "V_init_scale", default = "defaults::v_init_scale")]
    pub v_init_scale: f32,
    /// The embedding width, `0` disables embeddings.
    #[serde(rename = "V_dim")]
    pub v_dim: usize,
    /// The occurrence count a feature needs before it gets an embedding.
    #[serde(rename = "V_threshold", default = "defaults::v_threshold")]
    pub v_threshold: f32,
    #[serde(default)]
    pub seed: u64,
}

mod defaults {
    pub fn l1() -> f32 {
        1.
    }

    pub fn v_l2() -> f32 {
        0.01
    }

    pub fn lr() -> f32 {
        0.01
    }

    pub fn lr_beta() -> f32 {
        1.
    }

    pub fn v_init_scale() -> f32 {
        0.01
    }

    pub fn v_threshold() -> f32 {
        10.
    }
}

/// Every key `SgdConfig` consumes.
pub const KEYS: [&str; 11] = [
    "l1",
    "l2",
    "V_l2",
    "lr",
    "lr_beta",
    "V_lr",
    "V_lr_beta",
    "V_init_scale",
    "V_dim",
    "V_threshold",
    "seed",
];

const REG_MAX: f32 = 1e10;

/// Fails unless `value` lies in `[low, high]`, or `(low, high]` when `open_low`.
fn check(key: &'static str, value: f32, open_low: bool, low: f32, high: f32) -> Result<()> {
    let above = if open_low { value > low } else { value >= low };
    if above && value <= high {
        return Ok(());
    }

    let bracket = if open_low { '(' } else { '[' };
    Err(FmErr::InvalidConfig {
        key,
        reason: format!("{value} is outside {bracket}{low}, {high}]"),
    })
}

/// Parses a configuration value as a JSON scalar, accepting the float
/// spellings JSON rejects such as `.5` or `1.`.
fn parse_scalar(key: &'static str, value: &str) -> Result<Value> {
    let value = value.trim();

    if let Ok(parsed @ (Value::Number(_) | Value::Bool(_))) = serde_json::from_str::<Value>(value) {
        return Ok(parsed);
    }

    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FmErr::InvalidConfig {
            key,
            reason: format!("`{value}` is not a number"),
        })
}

impl SgdConfig {
    /// Creates a new `SgdConfig` with every optional key at its default.
    ///
    /// # Arguments
    /// * `v_dim` - The embedding width.
    pub fn new(v_dim: usize) -> Self {
        Self {
            l1: defaults::l1(),
            l2: 0.,
            v_l2: defaults::v_l2(),
            lr: defaults::lr(),
            lr_beta: defaults::lr_beta(),
            v_lr: defaults::lr(),
            v_lr_beta: defaults::lr_beta(),
            v_init_scale: defaults::v_init_scale(),
            v_dim,
            v_threshold: defaults::v_threshold(),
            seed: 0,
        }
    }

    /// Builds a validated `SgdConfig` out of string key-value pairs.
    ///
    /// # Arguments
    /// * `kwargs` - The configuration pairs, which may include keys meant for other components.
    ///
    /// # Returns
    /// The config and every pair whose key isn't one of [`KEYS`], in input
    /// order, or an error if a value doesn't parse, `V_dim` is missing, or a
    /// value is out of range.
    pub fn from_kwargs<I, K, V>(kwargs: I) -> Result<(Self, Vec<(String, String)>)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut known = Map::new();
        let mut rest = Vec::new();

        for (key, value) in kwargs {
            let (key, value) = (key.into(), value.into());

            match KEYS.iter().find(|&&k| k == key) {
                Some(&name) => {
                    known.insert(key, parse_scalar(name, &value)?);
                }
                None => rest.push((key, value)),
            }
        }

        let config: Self = serde_json::from_value(Value::Object(known))?;
        config.validate()?;

        Ok((config, rest))
    }

    /// Checks every hyperparameter against its valid range.
    pub fn validate(&self) -> Result<()> {
        check("l1", self.l1, false, 0., REG_MAX)?;
        check("l2", self.l2, false, 0., REG_MAX)?;
        check("V_l2", self.v_l2, false, 0., REG_MAX)?;
        check("lr", self.lr, true, 0., 10.)?;
        check("lr_beta", self.lr_beta, false, 0., REG_MAX)?;
        check("V_lr", self.v_lr, true, 0., REG_MAX)?;
        check("V_lr_beta", self.v_lr_beta, false, 0., 10.)?;
        check("V_init_scale", self.v_init_scale, false, 0., 10.)?;
        check("V_threshold", self.v_threshold, false, 0., f32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let (config, rest) = SgdConfig::from_kwargs([("V_dim", "4")]).unwrap();

        assert_eq!(config, SgdConfig::new(4));
        assert!(rest.is_empty());
    }

    #[test]
    fn parses_known_and_returns_unknown() {
        let kwargs = [
            ("l1", "0.5"),
            ("V_dim", "8"),
            ("num_threads", "4"),
            ("V_lr", ".1"),
            ("seed", "42"),
            ("data", "train.txt"),
        ];

        let (config, rest) = SgdConfig::from_kwargs(kwargs).unwrap();

        assert_eq!(config.l1, 0.5);
        assert_eq!(config.v_dim, 8);
        assert_eq!(config.v_lr, 0.1);
        assert_eq!(config.seed, 42);
        assert_eq!(
            rest,
            [
                ("num_threads".to_string(), "4".to_string()),
                ("data".to_string(), "train.txt".to_string())
            ]
        );
    }

    #[test]
    fn missing_v_dim() {
        let res = SgdConfig::from_kwargs([("l1", "1")]);
        assert!(matches!(res, Err(FmErr::MalformedConfig(_))));
    }

    #[test]
    fn not_a_number() {
        let res = SgdConfig::from_kwargs([("V_dim", "2"), ("lr", "fast")]);
        assert!(matches!(res, Err(FmErr::InvalidConfig { key: "lr", .. })));
    }

    #[test]
    fn out_of_range() {
        for (key, value) in [("lr", "0"), ("lr", "11"), ("l1", "-1"), ("V_lr_beta", "10.5")] {
            let res = SgdConfig::from_kwargs([("V_dim", "2"), (key, value)]);
            assert!(
                matches!(res, Err(FmErr::InvalidConfig { key: k, .. }) if k == key),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn nan_is_rejected() {
        let config = SgdConfig {
            l2: f32::NAN,
            ..SgdConfig::new(0)
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_keys() {
        let json = serde_json::to_value(SgdConfig::new(3)).unwrap();

        assert_eq!(json["V_dim"], 3);
        assert!(json.get("V_threshold").is_some());
        assert!(json.get("v_dim").is_none());
    }
}
