#![allow(dead_code)]

use pbtrain::engines::population::{Member, Population, Trainable};
use pbtrain::hyperparams::{FloatHyperparameter, HyperparameterSet, Sampler};
use pbtrain::{PbtError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const ALPHA: &str = "Alpha";
pub const BETA: &str = "Beta";

/// A model whose metric is whatever it was told, optionally drifting by a
/// fixed amount per step.
pub struct MockTrainable {
    hyperparams: HyperparameterSet,
    metric: f64,
    drift: f64,
    step: u64,
    fail_at: Option<u64>,
    reject_imports: bool,
}

impl MockTrainable {
    pub fn new(metric: f64) -> Self {
        Self::drifting(metric, 0.0)
    }

    pub fn drifting(metric: f64, drift: f64) -> Self {
        let mut hyperparams = HyperparameterSet::new();
        hyperparams
            .add(FloatHyperparameter::new(
                ALPHA,
                Sampler::Uniform { low: 0.1, high: 1.0 },
                1.5,
            ))
            .unwrap();
        hyperparams
            .add(FloatHyperparameter::new(
                BETA,
                Sampler::LogUniform { low_exp: -3.0, high_exp: -1.0 },
                1.5,
            ))
            .unwrap();
        Self {
            hyperparams,
            metric,
            drift,
            step: 0,
            fail_at: None,
            reject_imports: false,
        }
    }

    /// Makes `train_one_step` fail when the model is at `step`.
    pub fn failing_at(mut self, step: u64) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Makes every `import_state` fail without touching the model.
    pub fn rejecting_imports(mut self) -> Self {
        self.reject_imports = true;
        self
    }
}

impl Trainable for MockTrainable {
    type State = f64;

    fn hyperparameters(&self) -> &HyperparameterSet {
        &self.hyperparams
    }

    fn hyperparameters_mut(&mut self) -> &mut HyperparameterSet {
        &mut self.hyperparams
    }

    fn initialize_variables(&mut self, _rng: &mut StdRng) -> Result<()> {
        Ok(())
    }

    fn train_one_step(&mut self) -> Result<()> {
        if self.fail_at == Some(self.step) {
            return Err(PbtError::Training(format!("failed at step {}", self.step)));
        }
        self.step += 1;
        self.metric += self.drift;
        Ok(())
    }

    fn evaluate_metric(&self) -> Result<f64> {
        Ok(self.metric)
    }

    fn step_number(&self) -> u64 {
        self.step
    }

    fn set_step_number(&mut self, step: u64) {
        self.step = step;
    }

    fn export_state(&self) -> f64 {
        self.metric
    }

    fn import_state(&mut self, state: f64) -> Result<()> {
        if self.reject_imports {
            return Err(PbtError::Training("import rejected".to_string()));
        }
        self.metric = state;
        Ok(())
    }
}

pub fn member(id: usize, model: MockTrainable, seed: u64) -> Member<MockTrainable> {
    Member::new(id, model, StdRng::seed_from_u64(seed + id as u64))
}

/// An initialized population with one member per metric, ids in order.
pub fn population(metrics: &[f64], seed: u64) -> Population<MockTrainable> {
    let members = metrics
        .iter()
        .enumerate()
        .map(|(id, &metric)| member(id, MockTrainable::new(metric), seed))
        .collect();
    let population = Population::new(members).unwrap();
    for member in population.iter() {
        member.initialize().unwrap();
    }
    population
}
