use crate::error::{PbtError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Rule used to draw a fresh value for a float hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sampler {
    Uniform { low: f64, high: f64 },
    /// `10^u` with `u` drawn uniformly from `[low_exp, high_exp]`
    LogUniform { low_exp: f64, high_exp: f64 },
    Constant(f64),
}

impl Sampler {
    fn validate(&self) -> Result<()> {
        let (low, high) = match *self {
            Sampler::Uniform { low, high } => (low, high),
            Sampler::LogUniform { low_exp, high_exp } => (low_exp, high_exp),
            Sampler::Constant(value) => (value, value),
        };
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(PbtError::Initialization(format!(
                "invalid sampling range [{}, {}]",
                low, high
            )));
        }
        Ok(())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Sampler::Uniform { low, high } => rng.gen_range(low..=high),
            Sampler::LogUniform { low_exp, high_exp } => {
                10f64.powf(rng.gen_range(low_exp..=high_exp))
            }
            Sampler::Constant(value) => value,
        }
    }
}

/// A hyperparameter holding a single bounded floating-point value.
#[derive(Debug, Clone)]
pub struct FloatHyperparameter {
    name: String,
    value: f64,
    sampler: Sampler,
    factor: f64,
    min: f64,
    max: f64,
    unused: bool,
}

impl FloatHyperparameter {
    /// Creates an unbounded hyperparameter. `factor` is what the value gets
    /// multiplied or divided by when perturbed.
    pub fn new(name: impl Into<String>, sampler: Sampler, factor: f64) -> Self {
        Self {
            name: name.into(),
            value: 0.0,
            sampler,
            factor,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            unused: false,
        }
    }

    pub fn bounded(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self.value = self.limited(self.value);
        self
    }

    /// Starts out excluded from history, e.g. a dependent of an inactive option.
    pub fn initially_unused(mut self) -> Self {
        self.unused = true;
        self
    }

    fn limited(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(PbtError::Initialization(format!(
                "{}: invalid bounds [{}, {}]",
                self.name, self.min, self.max
            )));
        }
        if !self.factor.is_finite() || self.factor <= 1.0 {
            return Err(PbtError::Initialization(format!(
                "{}: perturbation factor must be finite and greater than 1, got {}",
                self.name, self.factor
            )));
        }
        self.sampler
            .validate()
            .map_err(|e| PbtError::Initialization(format!("{}: {}", self.name, e)))?;

        self.value = self.limited(self.sampler.sample(rng));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Clamps into the declared bounds; never rejects.
    pub fn set_value(&mut self, value: f64) {
        self.value = self.limited(value);
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn is_unused(&self) -> bool {
        self.unused
    }

    pub fn set_unused(&mut self, unused: bool) {
        self.unused = unused;
    }

    pub fn perturb<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let value = if rng.gen_bool(0.5) {
            self.value * self.factor
        } else {
            self.value / self.factor
        };
        self.set_value(value);
    }

    pub fn resample<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let value = self.sampler.sample(rng);
        self.set_value(value);
    }

    pub fn copy(&mut self, source: &FloatHyperparameter) -> Result<()> {
        if self.name != source.name {
            return Err(PbtError::HyperparameterMismatch(format!(
                "cannot copy {} into {}",
                source.name, self.name
            )));
        }
        self.set_value(source.value);
        self.unused = source.unused;
        Ok(())
    }
}
