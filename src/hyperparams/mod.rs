pub mod choice;
pub mod float;
pub mod set;

pub use choice::{ChoiceHyperparameter, ChoiceOption};
pub use float::{FloatHyperparameter, Sampler};
pub use set::HyperparameterSet;

use std::fmt;

/// A non-trained parameter of a population member.
///
/// Unused hyperparameters currently have no effect on training and are left
/// out of recorded updates.
#[derive(Debug, Clone)]
pub enum Hyperparameter {
    Float(FloatHyperparameter),
    Choice(ChoiceHyperparameter),
}

impl Hyperparameter {
    pub fn name(&self) -> &str {
        match self {
            Hyperparameter::Float(hp) => hp.name(),
            Hyperparameter::Choice(hp) => hp.name(),
        }
    }

    pub fn is_unused(&self) -> bool {
        match self {
            Hyperparameter::Float(hp) => hp.is_unused(),
            Hyperparameter::Choice(hp) => hp.is_unused(),
        }
    }

    pub fn set_unused(&mut self, unused: bool) {
        match self {
            Hyperparameter::Float(hp) => hp.set_unused(unused),
            Hyperparameter::Choice(hp) => hp.set_unused(unused),
        }
    }

    /// Whether a perturbation can move this hyperparameter off its current
    /// value. Floats are scaled multiplicatively, so zero stays zero.
    pub fn can_change(&self) -> bool {
        match self {
            Hyperparameter::Float(hp) => hp.min() < hp.max() && hp.value() != 0.0,
            Hyperparameter::Choice(hp) => hp.varies() && hp.options().len() > 1,
        }
    }

    pub fn same_value(&self, other: &Hyperparameter) -> bool {
        match (self, other) {
            (Hyperparameter::Float(a), Hyperparameter::Float(b)) => a.value() == b.value(),
            (Hyperparameter::Choice(a), Hyperparameter::Choice(b)) => a.index() == b.index(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Hyperparameter::Float(_) => "float",
            Hyperparameter::Choice(_) => "choice",
        }
    }

    pub fn as_float(&self) -> Option<&FloatHyperparameter> {
        match self {
            Hyperparameter::Float(hp) => Some(hp),
            Hyperparameter::Choice(_) => None,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceHyperparameter> {
        match self {
            Hyperparameter::Choice(hp) => Some(hp),
            Hyperparameter::Float(_) => None,
        }
    }
}

impl fmt::Display for Hyperparameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hyperparameter::Float(hp) => write!(f, "{}", hp.value()),
            Hyperparameter::Choice(hp) => write!(f, "{}", hp.label()),
        }
    }
}

impl From<FloatHyperparameter> for Hyperparameter {
    fn from(hp: FloatHyperparameter) -> Self {
        Hyperparameter::Float(hp)
    }
}

impl From<ChoiceHyperparameter> for Hyperparameter {
    fn from(hp: ChoiceHyperparameter) -> Self {
        Hyperparameter::Choice(hp)
    }
}
