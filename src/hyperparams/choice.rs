use crate::error::{PbtError, Result};
use rand::Rng;

/// One alternative of a [`ChoiceHyperparameter`].
///
/// `dependents` are positions, in the owning set, of the hyperparameters that
/// only take effect while this option is selected. Several options may share a
/// dependent (a learning rate used by every optimizer, for instance).
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    pub label: String,
    pub dependents: Vec<usize>,
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>, dependents: Vec<usize>) -> Self {
        Self {
            label: label.into(),
            dependents,
        }
    }
}

/// A categorical hyperparameter selecting one of several options.
///
/// Switching options needs access to the dependents, so the switch itself is
/// carried out by [`super::HyperparameterSet`]; this type only decides which
/// option to move to.
#[derive(Debug, Clone)]
pub struct ChoiceHyperparameter {
    name: String,
    options: Vec<ChoiceOption>,
    index: usize,
    default_index: usize,
    vary: bool,
    unused: bool,
}

impl ChoiceHyperparameter {
    /// When `vary` is false the option is pinned to `default_index` and
    /// perturb/resample leave it alone.
    pub fn new(
        name: impl Into<String>,
        options: Vec<ChoiceOption>,
        default_index: usize,
        vary: bool,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            index: default_index,
            default_index,
            vary,
            unused: false,
        }
    }

    pub(crate) fn validate(&self, set_len: usize, own_position: usize) -> Result<()> {
        if self.options.is_empty() {
            return Err(PbtError::Initialization(format!(
                "{}: no options to choose from",
                self.name
            )));
        }
        if self.default_index >= self.options.len() {
            return Err(PbtError::Initialization(format!(
                "{}: default option {} out of range",
                self.name, self.default_index
            )));
        }
        for option in &self.options {
            if let Some(&bad) = option
                .dependents
                .iter()
                .find(|&&d| d >= set_len || d == own_position)
            {
                return Err(PbtError::Initialization(format!(
                    "{}: option {} refers to invalid dependent {}",
                    self.name, option.label, bad
                )));
            }
        }
        Ok(())
    }

    /// Picks the starting option.
    pub(crate) fn initial_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.vary {
            rng.gen_range(0..self.options.len())
        } else {
            self.default_index
        }
    }

    /// A different option chosen uniformly among the others, if any.
    pub(crate) fn propose_switch<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let count = self.options.len();
        if !self.vary || count < 2 {
            return None;
        }
        Some((self.index + rng.gen_range(1..count)) % count)
    }

    /// Any option, the current one included.
    pub(crate) fn propose_resample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if !self.vary {
            return None;
        }
        Some(rng.gen_range(0..self.options.len()))
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        self.options
            .get(self.index)
            .map(|o| o.label.as_str())
            .unwrap_or("")
    }

    pub fn options(&self) -> &[ChoiceOption] {
        &self.options
    }

    pub fn varies(&self) -> bool {
        self.vary
    }

    pub fn is_unused(&self) -> bool {
        self.unused
    }

    pub fn set_unused(&mut self, unused: bool) {
        self.unused = unused;
    }

    pub(crate) fn matches(&self, other: &ChoiceHyperparameter) -> bool {
        self.name == other.name && self.options == other.options
    }

    pub(crate) fn copy(&mut self, source: &ChoiceHyperparameter) {
        self.index = source.index;
        self.vary = source.vary;
        self.unused = source.unused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn optimizer(vary: bool) -> ChoiceHyperparameter {
        ChoiceHyperparameter::new(
            "Optimizer",
            vec![
                ChoiceOption::new("GradientDescent", vec![1]),
                ChoiceOption::new("Momentum", vec![1, 2]),
                ChoiceOption::new("Adam", vec![1]),
            ],
            2,
            vary,
        )
    }

    #[test]
    fn test_switch_never_proposes_current_option() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut choice = optimizer(true);
        for _ in 0..200 {
            let next = choice.propose_switch(&mut rng).unwrap();
            assert_ne!(next, choice.index());
            choice.set_index(next);
        }
    }

    #[test]
    fn test_fixed_choice_does_not_move() {
        let mut rng = StdRng::seed_from_u64(11);
        let choice = optimizer(false);
        assert_eq!(choice.initial_index(&mut rng), 2);
        assert!(choice.propose_switch(&mut rng).is_none());
        assert!(choice.propose_resample(&mut rng).is_none());
        assert_eq!(choice.label(), "Adam");
    }

    #[test]
    fn test_validate_dependents() {
        let choice = optimizer(true);
        assert!(choice.validate(3, 0).is_ok());
        // Dependent 2 does not exist in a set of two
        assert!(choice.validate(2, 0).is_err());
        // A choice cannot depend on itself
        assert!(choice.validate(3, 1).is_err());
    }
}
