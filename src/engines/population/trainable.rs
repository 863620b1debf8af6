use crate::error::Result;
use crate::hyperparams::HyperparameterSet;
use rand::rngs::StdRng;

/// A model that a [`super::Cluster`] can train.
///
/// The engine never looks inside the model: it trains it one step at a time,
/// asks for its metric and moves its weights between members through
/// [`Trainable::export_state`] and [`Trainable::import_state`].
pub trait Trainable: Send {
    /// Opaque snapshot of the trained weights.
    type State: Send;

    /// The model's hyperparameters, in declaration order.
    fn hyperparameters(&self) -> &HyperparameterSet;

    fn hyperparameters_mut(&mut self) -> &mut HyperparameterSet;

    /// Sets up the weights. Called once, after the hyperparameters have been
    /// initialized.
    fn initialize_variables(&mut self, rng: &mut StdRng) -> Result<()>;

    /// Advances the model by exactly one training step.
    fn train_one_step(&mut self) -> Result<()>;

    /// Scores the model; higher is better. Must not change the weights.
    fn evaluate_metric(&self) -> Result<f64>;

    fn step_number(&self) -> u64;

    fn set_step_number(&mut self, step: u64);

    fn export_state(&self) -> Self::State;

    /// Replaces the weights. On error the model must be left as it was.
    fn import_state(&mut self, state: Self::State) -> Result<()>;
}
