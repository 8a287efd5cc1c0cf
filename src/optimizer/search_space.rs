//! Search space definition for hyperparameters
//!
//! A [`ParameterSpec`] is the declarative form handed over by a model catalog:
//! `{ name: { kind: bounds-or-choices } }`. It is parsed once into a typed
//! [`SearchSpace`] whose parameters carry a [`ParamDomain`] sum type, so sampling
//! never compares kind strings.

use crate::error::{Result, TuneError};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declaration of a single parameter: exactly one `kind -> args` entry
pub type ParamDecl = BTreeMap<String, Value>;

/// Declarative parameter specification
///
/// Accepted kinds are `int`/`integer` and `float`/`real` with `[min, max]` bounds,
/// and `categorical`/`str`/`bool`/`object` with a non-empty array of choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpec(BTreeMap<String, ParamDecl>);

impl ParameterSpec {
    /// Create an empty specification
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw `kind -> args` declaration
    pub fn with(mut self, name: impl Into<String>, kind: impl Into<String>, args: Value) -> Self {
        let mut decl = ParamDecl::new();
        decl.insert(kind.into(), args);
        self.0.insert(name.into(), decl);
        self
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.with(name, "int", Value::from(vec![low, high]))
    }

    /// Add a real-valued parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.with(name, "float", Value::from(vec![low, high]))
    }

    /// Add a categorical parameter of string choices
    pub fn categorical(self, name: impl Into<String>, choices: Vec<&str>) -> Self {
        self.with(name, "str", Value::from(choices))
    }

    /// Add a boolean parameter
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.with(name, "bool", Value::from(vec![true, false]))
    }

    /// Parse a specification from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamDecl)> {
        self.0.iter()
    }
}

/// Typed domain of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDomain {
    /// Integer in `[low, high]` inclusive
    Integer { low: i64, high: i64 },
    /// Real value in `[low, high]` inclusive
    Real { low: f64, high: f64 },
    /// One element of a finite ordered set
    Categorical { choices: Vec<ParameterValue> },
}

impl ParamDomain {
    fn parse(name: &str, kind: &str, args: &Value) -> Result<Self> {
        match kind {
            "int" | "integer" => {
                let (low, high) = parse_bounds(name, args, |v| {
                    v.as_i64().or_else(|| {
                        v.as_f64()
                            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                            .map(|f| f as i64)
                    })
                })?;
                if low > high {
                    return Err(TuneError::InvalidBounds {
                        name: name.to_string(),
                        reason: format!("min {} > max {}", low, high),
                    });
                }
                Ok(ParamDomain::Integer { low, high })
            }
            "float" | "real" => {
                let (low, high) = parse_bounds(name, args, Value::as_f64)?;
                if !low.is_finite() || !high.is_finite() {
                    return Err(TuneError::InvalidBounds {
                        name: name.to_string(),
                        reason: "bounds must be finite".to_string(),
                    });
                }
                if low > high {
                    return Err(TuneError::InvalidBounds {
                        name: name.to_string(),
                        reason: format!("min {} > max {}", low, high),
                    });
                }
                if !(high - low).is_finite() {
                    return Err(TuneError::InvalidBounds {
                        name: name.to_string(),
                        reason: format!("range [{}, {}] is too wide to sample", low, high),
                    });
                }
                Ok(ParamDomain::Real { low, high })
            }
            "categorical" | "str" | "bool" | "object" => {
                let items = args.as_array().ok_or_else(|| {
                    TuneError::ConfigError(format!(
                        "choices for parameter '{}' must be an array",
                        name
                    ))
                })?;
                if items.is_empty() {
                    return Err(TuneError::EmptyChoices(name.to_string()));
                }
                let choices = items.iter().map(ParameterValue::from_json).collect();
                Ok(ParamDomain::Categorical { choices })
            }
            other => Err(TuneError::UnknownParameterKind {
                name: name.to_string(),
                kind: other.to_string(),
            }),
        }
    }

    /// Draw a value uniformly from the domain
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match self {
            ParamDomain::Integer { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParamDomain::Real { low, high } => {
                if low == high {
                    ParameterValue::Float(*low)
                } else {
                    ParameterValue::Float(rng.gen_range(*low..=*high))
                }
            }
            ParamDomain::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                choices[idx].clone()
            }
        }
    }

    /// Whether `value` is a legal assignment for this domain
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (ParamDomain::Integer { low, high }, ParameterValue::Int(v)) => v >= low && v <= high,
            (ParamDomain::Real { low, high }, ParameterValue::Float(v)) => v >= low && v <= high,
            (ParamDomain::Categorical { choices }, v) => choices.contains(v),
            _ => false,
        }
    }
}

fn parse_bounds<T>(name: &str, args: &Value, convert: impl Fn(&Value) -> Option<T>) -> Result<(T, T)> {
    let invalid = |reason: &str| TuneError::InvalidBounds {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let items = args.as_array().ok_or_else(|| invalid("expected [min, max]"))?;
    if items.len() != 2 {
        return Err(invalid("expected exactly two bounds"));
    }
    let low = convert(&items[0]).ok_or_else(|| invalid("min is not a valid number"))?;
    let high = convert(&items[1]).ok_or_else(|| invalid("max is not a valid number"))?;
    Ok((low, high))
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub domain: ParamDomain,
}

impl Parameter {
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        self.domain.sample(rng)
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Opaque categorical literal (arrays, objects, null)
    Object(Value),
}

impl ParameterValue {
    /// Convert a categorical JSON literal
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => ParameterValue::Bool(*b),
            Value::String(s) => ParameterValue::String(s.clone()),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ParameterValue::Int(i),
                (None, Some(f)) => ParameterValue::Float(f),
                (None, None) => ParameterValue::Object(value.clone()),
            },
            other => ParameterValue::Object(other.clone()),
        }
    }

    /// Get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int (integral floats narrow)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
            ParameterValue::Object(v) => write!(f, "{}", v),
        }
    }
}

/// Alias for a sampled configuration
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Typed search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Parse a declarative specification
    pub fn from_spec(spec: &ParameterSpec) -> Result<Self> {
        let parameters = spec
            .iter()
            .map(|(name, decl)| {
                let mut entries = decl.iter();
                match (entries.next(), entries.next()) {
                    (Some((kind, args)), None) => Ok(Parameter {
                        name: name.clone(),
                        domain: ParamDomain::parse(name, kind, args)?,
                    }),
                    _ => Err(TuneError::ConfigError(format!(
                        "parameter '{}' must declare exactly one kind, found {}",
                        name,
                        decl.len()
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { parameters })
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Whether `params` assigns every parameter a legal value and nothing else
    pub fn contains(&self, params: &TrialParams) -> bool {
        params.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .all(|p| params.get(&p.name).map_or(false, |v| p.domain.contains(v)))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
