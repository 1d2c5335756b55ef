//! Distribution engine configuration.
//!
//! Values can be deserialized (for example from a TOML scenario file) or read
//! from `LEADFLOW_*` environment variables; anything not supplied falls back
//! to [`DistributionConfig::default`].

use crate::entities::{DEFAULT_MAX_LOAD, DEFAULT_WEIGHT};
use crate::error::{ConfigError, LeadflowError, LeadflowResult};
use serde::{Deserialize, Serialize};

/// Configuration for the distribution orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Commit lead creation and contact creation in one store transaction.
    /// When false, a new lead is committed before the contact is written.
    pub atomic_assignment: bool,
    /// Seed for the selection RNG. `None` seeds from the operating system.
    pub rng_seed: Option<u64>,
    /// Capacity applied when an operator is created without one.
    pub default_max_load: u32,
    /// Weight applied when an operator is linked to a source without one.
    pub default_weight: f64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            atomic_assignment: true,
            rng_seed: None,
            default_max_load: DEFAULT_MAX_LOAD,
            default_weight: DEFAULT_WEIGHT,
        }
    }
}

impl DistributionConfig {
    /// Create a config from environment variables.
    ///
    /// Environment variables:
    /// - `LEADFLOW_ATOMIC_ASSIGNMENT`: "true" or "false" (default: true)
    /// - `LEADFLOW_RNG_SEED`: unsigned integer seed (default: unset)
    /// - `LEADFLOW_DEFAULT_MAX_LOAD`: default operator capacity (default: 10)
    /// - `LEADFLOW_DEFAULT_WEIGHT`: default link weight (default: 1.0)
    pub fn from_env() -> LeadflowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparseable values are
    /// reported instead of silently replaced by defaults.
    pub fn from_lookup<F>(lookup: F) -> LeadflowResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let atomic_assignment = match lookup("LEADFLOW_ATOMIC_ASSIGNMENT") {
            Some(raw) => parse_bool("LEADFLOW_ATOMIC_ASSIGNMENT", &raw)?,
            None => defaults.atomic_assignment,
        };
        let rng_seed = match lookup("LEADFLOW_RNG_SEED") {
            Some(raw) => Some(parse_value::<u64>("LEADFLOW_RNG_SEED", &raw)?),
            None => defaults.rng_seed,
        };
        let default_max_load = match lookup("LEADFLOW_DEFAULT_MAX_LOAD") {
            Some(raw) => parse_value::<u32>("LEADFLOW_DEFAULT_MAX_LOAD", &raw)?,
            None => defaults.default_max_load,
        };
        let default_weight = match lookup("LEADFLOW_DEFAULT_WEIGHT") {
            Some(raw) => parse_value::<f64>("LEADFLOW_DEFAULT_WEIGHT", &raw)?,
            None => defaults.default_weight,
        };

        let config = Self {
            atomic_assignment,
            rng_seed,
            default_max_load,
            default_weight,
        };
        config.validate()?;
        Ok(config)
    }

    /// Use a fixed RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Toggle atomic lead + contact commits.
    pub fn with_atomic_assignment(mut self, atomic: bool) -> Self {
        self.atomic_assignment = atomic;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - default_weight is finite and non-negative
    pub fn validate(&self) -> LeadflowResult<()> {
        if !self.default_weight.is_finite() || self.default_weight < 0.0 {
            return Err(LeadflowError::Config(ConfigError::InvalidValue {
                field: "default_weight".to_string(),
                value: self.default_weight.to_string(),
                reason: "default_weight must be a finite, non-negative number".to_string(),
            }));
        }
        Ok(())
    }
}

fn parse_bool(field: &str, raw: &str) -> LeadflowResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(field, raw, "expected true or false")),
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, raw: &str) -> LeadflowResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(field, raw, "could not be parsed"))
}

fn invalid(field: &str, raw: &str, reason: &str) -> LeadflowError {
    LeadflowError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DistributionConfig::default();
        assert!(config.atomic_assignment);
        assert!(config.rng_seed.is_none());
        assert_eq!(config.default_max_load, 10);
        assert_eq!(config.default_weight, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = DistributionConfig::from_lookup(lookup_from(&[
            ("LEADFLOW_ATOMIC_ASSIGNMENT", "false"),
            ("LEADFLOW_RNG_SEED", "42"),
            ("LEADFLOW_DEFAULT_MAX_LOAD", "3"),
            ("LEADFLOW_DEFAULT_WEIGHT", "2.5"),
        ]))
        .unwrap();

        assert!(!config.atomic_assignment);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.default_max_load, 3);
        assert_eq!(config.default_weight, 2.5);
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = DistributionConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, DistributionConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = DistributionConfig::from_lookup(lookup_from(&[("LEADFLOW_RNG_SEED", "abc")]))
            .unwrap_err();
        assert!(matches!(err, LeadflowError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let config = DistributionConfig {
            default_weight: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DistributionConfig {
            default_weight: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let config: DistributionConfig = toml::from_str("rng_seed = 7\n").unwrap();
        assert_eq!(config.rng_seed, Some(7));
        assert!(config.atomic_assignment);
        assert_eq!(config.default_max_load, 10);
    }
}
