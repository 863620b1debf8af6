use crate::config::TrainingConfig;
use crate::engines::population::Trainable;
use crate::error::{PbtError, Result};
use crate::hyperparams::{
    ChoiceHyperparameter, ChoiceOption, FloatHyperparameter, HyperparameterSet, Sampler,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const WEIGHT_DECAY: &str = "Weight decay";
pub const OPTIMIZER: &str = "Optimizer";
pub const LEARNING_RATE: &str = "Learning rate";
pub const MOMENTUM: &str = "Momentum";

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const ADAGRAD_INITIAL_ACCUMULATOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    GradientDescent,
    Adagrad,
    Momentum,
    Adam,
}

impl OptimizerKind {
    pub const ALL: [OptimizerKind; 4] = [
        OptimizerKind::GradientDescent,
        OptimizerKind::Adagrad,
        OptimizerKind::Momentum,
        OptimizerKind::Adam,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OptimizerKind::GradientDescent => "GradientDescent",
            OptimizerKind::Adagrad => "Adagrad",
            OptimizerKind::Momentum => "Momentum",
            OptimizerKind::Adam => "Adam",
        }
    }
}

/// Per-weight optimizer variables. They belong to one optimizer and are reset
/// whenever a different one takes over.
#[derive(Debug, Clone, Default)]
pub struct OptimizerSlots {
    kind: Option<OptimizerKind>,
    first: Vec<f64>,  // Adagrad accumulator, momentum velocity or Adam m
    second: Vec<f64>, // Adam v
    updates: u64,
}

impl OptimizerSlots {
    fn reset(&mut self, kind: OptimizerKind, dimensions: usize) {
        let initial = match kind {
            OptimizerKind::Adagrad => ADAGRAD_INITIAL_ACCUMULATOR,
            _ => 0.0,
        };
        self.kind = Some(kind);
        self.first = vec![initial; dimensions];
        self.second = vec![0.0; dimensions];
        self.updates = 0;
    }
}

/// Weights and optimizer slots of a [`BowlModel`].
#[derive(Debug, Clone)]
pub struct BowlState {
    weights: Vec<f64>,
    slots: OptimizerSlots,
}

/// A small regression problem: pull a weight vector towards a fixed target
/// through noisy gradients, with the optimizer, its learning rate and
/// momentum, and a weight decay all exposed as hyperparameters.
///
/// The metric is `1 / (1 + loss)`, so it lies in `(0, 1]` and grows as the
/// model improves.
pub struct BowlModel {
    hyperparams: HyperparameterSet,
    target: Vec<f64>,
    weights: Vec<f64>,
    slots: OptimizerSlots,
    step: u64,
    gradient_noise: f64,
    rng: StdRng,
}

impl BowlModel {
    /// When `vary_optimizer` is false the model always uses Adam. The noise
    /// generator is seeded from the member's generator in
    /// `initialize_variables`.
    pub fn new(dimensions: usize, vary_optimizer: bool, gradient_noise: f64) -> Result<Self> {
        if dimensions == 0 {
            return Err(PbtError::Initialization(
                "bowl model needs at least one weight".to_string(),
            ));
        }

        let mut hyperparams = HyperparameterSet::new();
        hyperparams.add(
            FloatHyperparameter::new(
                WEIGHT_DECAY,
                Sampler::LogUniform { low_exp: -5.0, high_exp: -1.0 },
                1.2,
            )
            .bounded(1e-5, 0.1),
        )?;
        let learning_rate = 2;
        let momentum = 3;
        hyperparams.add(ChoiceHyperparameter::new(
            OPTIMIZER,
            vec![
                ChoiceOption::new(OptimizerKind::GradientDescent.label(), vec![learning_rate]),
                ChoiceOption::new(OptimizerKind::Adagrad.label(), vec![learning_rate]),
                ChoiceOption::new(OptimizerKind::Momentum.label(), vec![learning_rate, momentum]),
                ChoiceOption::new(OptimizerKind::Adam.label(), vec![learning_rate]),
            ],
            3,
            vary_optimizer,
        ))?;
        hyperparams.add(
            FloatHyperparameter::new(
                LEARNING_RATE,
                Sampler::LogUniform { low_exp: -4.0, high_exp: 0.0 },
                1.2,
            )
            .bounded(1e-4, 1.0)
            .initially_unused(),
        )?;
        hyperparams.add(
            FloatHyperparameter::new(MOMENTUM, Sampler::Uniform { low: 0.0, high: 0.99 }, 1.2)
                .bounded(0.0, 0.99)
                .initially_unused(),
        )?;

        let target = (0..dimensions)
            .map(|i| (i as f64 * 0.7).sin() * 2.0 + 1.0)
            .collect();

        Ok(Self {
            hyperparams,
            target,
            weights: vec![0.0; dimensions],
            slots: OptimizerSlots::default(),
            step: 0,
            gradient_noise,
            rng: StdRng::seed_from_u64(0),
        })
    }

    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        Self::new(config.dimensions, config.vary_optimizer, config.gradient_noise)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mean squared distance to the target.
    pub fn loss(&self) -> f64 {
        let total: f64 = self
            .weights
            .iter()
            .zip(&self.target)
            .map(|(w, t)| (w - t).powi(2))
            .sum();
        total / self.weights.len() as f64
    }

    pub fn optimizer(&self) -> OptimizerKind {
        self.hyperparams
            .choice_index(OPTIMIZER)
            .and_then(|i| OptimizerKind::ALL.get(i).copied())
            .unwrap_or(OptimizerKind::Adam)
    }

    fn required(&self, name: &str) -> Result<f64> {
        self.hyperparams
            .float_value(name)
            .ok_or_else(|| PbtError::Training(format!("missing hyperparameter {}", name)))
    }
}

impl Trainable for BowlModel {
    type State = BowlState;

    fn hyperparameters(&self) -> &HyperparameterSet {
        &self.hyperparams
    }

    fn hyperparameters_mut(&mut self) -> &mut HyperparameterSet {
        &mut self.hyperparams
    }

    fn initialize_variables(&mut self, rng: &mut StdRng) -> Result<()> {
        for weight in self.weights.iter_mut() {
            *weight = rng.gen_range(-5.0..=5.0);
        }
        self.slots = OptimizerSlots::default();
        self.rng = StdRng::seed_from_u64(rng.gen());
        Ok(())
    }

    fn train_one_step(&mut self) -> Result<()> {
        let learning_rate = self.required(LEARNING_RATE)?;
        let weight_decay = self.required(WEIGHT_DECAY)?;
        let kind = self.optimizer();
        let dimensions = self.weights.len();

        if self.slots.kind != Some(kind) {
            self.slots.reset(kind, dimensions);
        }

        let scale = 2.0 / dimensions as f64;
        let gradients: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.target)
            .map(|(w, t)| {
                let noise = if self.gradient_noise > 0.0 {
                    self.rng.gen_range(-self.gradient_noise..=self.gradient_noise)
                } else {
                    0.0
                };
                scale * (w - t) + weight_decay * w + noise
            })
            .collect();

        self.slots.updates += 1;
        match kind {
            OptimizerKind::GradientDescent => {
                for (w, g) in self.weights.iter_mut().zip(&gradients) {
                    *w -= learning_rate * g;
                }
            }
            OptimizerKind::Adagrad => {
                for ((w, g), acc) in self.weights.iter_mut().zip(&gradients).zip(&mut self.slots.first) {
                    *acc += g * g;
                    *w -= learning_rate * g / acc.sqrt();
                }
            }
            OptimizerKind::Momentum => {
                let momentum = self.required(MOMENTUM)?;
                for ((w, g), v) in self.weights.iter_mut().zip(&gradients).zip(&mut self.slots.first) {
                    *v = momentum * *v + g;
                    *w -= learning_rate * *v;
                }
            }
            OptimizerKind::Adam => {
                let t = self.slots.updates as i32;
                let correction1 = 1.0 - ADAM_BETA1.powi(t);
                let correction2 = 1.0 - ADAM_BETA2.powi(t);
                for (((w, g), m), v) in self
                    .weights
                    .iter_mut()
                    .zip(&gradients)
                    .zip(&mut self.slots.first)
                    .zip(&mut self.slots.second)
                {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                    let m_hat = *m / correction1;
                    let v_hat = *v / correction2;
                    *w -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                }
            }
        }

        if self.weights.iter().any(|w| !w.is_finite()) {
            return Err(PbtError::Training(format!(
                "weights diverged at step {} using {}",
                self.step,
                kind.label()
            )));
        }
        self.step += 1;
        Ok(())
    }

    fn evaluate_metric(&self) -> Result<f64> {
        Ok(1.0 / (1.0 + self.loss()))
    }

    fn step_number(&self) -> u64 {
        self.step
    }

    fn set_step_number(&mut self, step: u64) {
        self.step = step;
    }

    fn export_state(&self) -> BowlState {
        BowlState {
            weights: self.weights.clone(),
            slots: self.slots.clone(),
        }
    }

    fn import_state(&mut self, state: BowlState) -> Result<()> {
        if state.weights.len() != self.weights.len() {
            return Err(PbtError::Training(format!(
                "state has {} weights, model has {}",
                state.weights.len(),
                self.weights.len()
            )));
        }
        self.weights = state.weights;
        self.slots = state.slots;
        Ok(())
    }
}
