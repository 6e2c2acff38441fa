//! Named model parameters with bounds, fixed flags and ties.
//!
//! A [`Parameters`] collection is an ordered list; the order is the model's
//! term order and is what `evaluate_with` expects for a full value vector.
//! Fitters only move the *free* parameters (not fixed, not tied) and call
//! [`Parameters::apply_ties`] to refresh the tied ones.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Optional lower/upper limits. A missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub const NONE: Bounds = Bounds { min: None, max: None };

    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn lower(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    /// Inclusive containment; NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.is_none_or(|lo| value >= lo) && self.max.is_none_or(|hi| value <= hi)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(lo) = self.min {
            v = v.max(lo);
        }
        if let Some(hi) = self.max {
            v = v.min(hi);
        }
        v
    }
}

/// `value = factor * value(source)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tie {
    pub source: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub tie: Option<Tie>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            fixed: false,
            bounds: Bounds::NONE,
            tie: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Moved by fitters and samplers.
    pub fn is_free(&self) -> bool {
        !self.fixed && self.tie.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameters {
    items: Vec<Parameter>,
}

impl Parameters {
    pub fn new(items: Vec<Parameter>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, param: Parameter) {
        self.items.push(param);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.items.iter().map(|p| p.value).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Result<&Parameter, ModelError> {
        self.items
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ModelError::UnknownParameter(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Parameter, ModelError> {
        self.items
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ModelError::UnknownParameter(name.to_string()))
    }

    pub fn value(&self, name: &str) -> Result<f64, ModelError> {
        self.get(name).map(|p| p.value)
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), ModelError> {
        self.get_mut(name)?.value = value;
        Ok(())
    }

    pub fn set_fixed(&mut self, name: &str, fixed: bool) -> Result<(), ModelError> {
        self.get_mut(name)?.fixed = fixed;
        Ok(())
    }

    pub fn set_bounds(&mut self, name: &str, bounds: Bounds) -> Result<(), ModelError> {
        self.get_mut(name)?.bounds = bounds;
        Ok(())
    }

    /// Tie `name` to `factor * source` and refresh its value.
    pub fn tie(&mut self, name: &str, source: &str, factor: f64) -> Result<(), ModelError> {
        let source_value = self.value(source)?;
        let param = self.get_mut(name)?;
        param.tie = Some(Tie {
            source: source.to_string(),
            factor,
        });
        param.value = factor * source_value;
        Ok(())
    }

    /// Replace every value; the vector must be in collection order.
    pub fn set_values(&mut self, values: &[f64]) -> Result<(), ModelError> {
        if values.len() != self.items.len() {
            return Err(ModelError::ParameterCount {
                expected: self.items.len(),
                got: values.len(),
            });
        }
        for (p, &v) in self.items.iter_mut().zip(values) {
            p.value = v;
        }
        Ok(())
    }

    /// Indices of parameters that are neither fixed nor tied.
    pub fn free_indices(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_free())
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolve a list of names into indices.
    pub fn indices_of(&self, names: &[String]) -> Result<Vec<usize>, ModelError> {
        names
            .iter()
            .map(|n| self.index_of(n).ok_or_else(|| ModelError::UnknownParameter(n.clone())))
            .collect()
    }

    /// Recompute tied values inside a full value vector.
    pub fn apply_ties(&self, values: &mut [f64]) -> Result<(), ModelError> {
        for (i, p) in self.items.iter().enumerate() {
            if let Some(tie) = &p.tie {
                let src = self
                    .index_of(&tie.source)
                    .ok_or_else(|| ModelError::UnknownParameter(tie.source.clone()))?;
                values[i] = tie.factor * values[src];
            }
        }
        Ok(())
    }

    /// Build a full value vector from the current values with `free` overridden.
    pub fn expand(&self, indices: &[usize], free: &[f64]) -> Result<Vec<f64>, ModelError> {
        if indices.len() != free.len() {
            return Err(ModelError::ParameterCount {
                expected: indices.len(),
                got: free.len(),
            });
        }
        let mut values = self.values();
        for (&i, &v) in indices.iter().zip(free) {
            values[i] = v;
        }
        self.apply_ties(&mut values)?;
        Ok(values)
    }

    pub fn bounds_at(&self, index: usize) -> Bounds {
        self.items.get(index).map(|p| p.bounds).unwrap_or_default()
    }

    pub fn name_at(&self, index: usize) -> &str {
        self.items.get(index).map(|p| p.name.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Parameters {
        Parameters::new(vec![
            Parameter::new("SIL1_amp", 0.004).with_bounds(Bounds::lower(0.0)),
            Parameter::new("SIL1_lambda", 9.7).with_bounds(Bounds::new(7.0, 13.0)),
            Parameter::new("SIL1_n", 2.0).fixed(),
            Parameter::new("FIR_amp", 0.02),
        ])
    }

    #[test]
    fn bounds_contain_and_clamp() {
        let b = Bounds::new(7.0, 13.0);
        assert!(b.contains(7.0) && b.contains(13.0));
        assert!(!b.contains(6.99) && !b.contains(f64::NAN));
        assert_eq!(b.clamp(20.0), 13.0);
        assert_eq!(Bounds::lower(0.0).clamp(-1.0), 0.0);
        assert!(Bounds::NONE.contains(-1e300));
    }

    #[test]
    fn tie_sets_value_and_leaves_free_set() {
        let mut p = sample();
        p.tie("FIR_amp", "SIL1_amp", 6.0).unwrap();
        assert!((p.value("FIR_amp").unwrap() - 0.024).abs() < 1e-15);
        assert_eq!(p.free_indices(), vec![0, 1]);

        let values = p.expand(&[0, 1], &[0.01, 10.0]).unwrap();
        assert!((values[3] - 0.06).abs() < 1e-15);
        assert_eq!(values[2], 2.0);
    }

    #[test]
    fn unknown_names_are_errors() {
        let mut p = sample();
        assert_eq!(
            p.set_value("NOPE", 1.0),
            Err(ModelError::UnknownParameter("NOPE".to_string()))
        );
        assert!(p.tie("FIR_amp", "NOPE", 1.0).is_err());
        assert!(p.indices_of(&["SIL1_lambda".to_string(), "X".to_string()]).is_err());
    }

    #[test]
    fn set_values_checks_length() {
        let mut p = sample();
        assert_eq!(
            p.set_values(&[1.0]),
            Err(ModelError::ParameterCount { expected: 4, got: 1 })
        );
        p.set_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(p.values(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
