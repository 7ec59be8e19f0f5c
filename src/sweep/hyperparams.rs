//! Hyperparameter configurations and grids.
//!
//! A `HyperparameterConfig` is an ordered name-to-value map that the sweep
//! passes verbatim to the fitting routine. The pipeline never inspects the
//! keys; validation is deferred to whichever `Fitter` consumes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single point in a hyperparameter grid.
///
/// Keys are kept sorted so the serialized form is canonical and can be
/// hashed for caching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterConfig(BTreeMap<String, Value>);

impl HyperparameterConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any previous value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Sets a parameter in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Returns the raw value of a parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical JSON encoding (sorted keys, no whitespace).
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Parses a `name=value` assignment and stores it.
    ///
    /// The value is read as JSON when possible (`0.1`, `true`, `"l2"`), and
    /// falls back to a plain string otherwise (`penalty=l2`).
    pub fn set_assignment(&mut self, assignment: &str) -> Result<(), String> {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, got '{}'", assignment))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("empty parameter name in '{}'", assignment));
        }
        let raw = raw.trim();
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        self.insert(name, value);
        Ok(())
    }
}

impl std::fmt::Display for HyperparameterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_json())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HyperparameterConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Expands named axes into the cartesian product of their values.
///
/// Axes are varied in declaration order with the last axis changing
/// fastest, so `[("C", [1, 2]), ("tol", [a, b])]` yields
/// `C=1,tol=a; C=1,tol=b; C=2,tol=a; C=2,tol=b`. Every entry also carries
/// the `fixed` parameters.
pub fn grid_product(
    axes: &[(String, Vec<Value>)],
    fixed: &HyperparameterConfig,
) -> Vec<HyperparameterConfig> {
    let mut grid = vec![fixed.clone()];
    for (name, values) in axes {
        let mut next = Vec::with_capacity(grid.len() * values.len());
        for base in &grid {
            for value in values {
                let mut config = base.clone();
                config.insert(name.clone(), value.clone());
                next.push(config);
            }
        }
        grid = next;
    }
    grid
}

/// Parses an axis specification of the form `name=v1,v2,v3`.
pub fn parse_axis(spec: &str) -> Result<(String, Vec<Value>), String> {
    let (name, raw_values) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected name=v1,v2,..., got '{}'", spec))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty axis name in '{}'", spec));
    }
    let values: Vec<Value> = raw_values
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())))
        .collect();
    if values.is_empty() {
        return Err(format!("axis '{}' has no values", name));
    }
    Ok((name.to_string(), values))
}
