use super::{FloatHyperparameter, Hyperparameter};
use crate::error::{PbtError, Result};
use rand::Rng;

/// The ordered hyperparameters of one population member.
///
/// Declaration order is fixed once the set is built and is the order in which
/// values are recorded in the update history. Operations that touch more than
/// one hyperparameter (option switches, copies, exploration) live here.
#[derive(Debug, Clone, Default)]
pub struct HyperparameterSet {
    params: Vec<Hyperparameter>,
}

impl HyperparameterSet {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Appends a hyperparameter and returns its position.
    pub fn add(&mut self, hyperparam: impl Into<Hyperparameter>) -> Result<usize> {
        let hyperparam = hyperparam.into();
        if self.position(hyperparam.name()).is_some() {
            return Err(PbtError::Initialization(format!(
                "duplicate hyperparameter name: {}",
                hyperparam.name()
            )));
        }
        self.params.push(hyperparam);
        Ok(self.params.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hyperparameter> {
        self.params.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Hyperparameter> {
        self.params.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|hp| hp.name() == name)
    }

    pub fn find(&self, name: &str) -> Option<&Hyperparameter> {
        self.params.iter().find(|hp| hp.name() == name)
    }

    pub fn float_value(&self, name: &str) -> Option<f64> {
        self.find(name).and_then(Hyperparameter::as_float).map(FloatHyperparameter::value)
    }

    pub fn choice_index(&self, name: &str) -> Option<usize> {
        self.find(name)
            .and_then(Hyperparameter::as_choice)
            .map(|hp| hp.index())
    }

    pub fn used_count(&self) -> usize {
        self.params.iter().filter(|hp| !hp.is_unused()).count()
    }

    pub fn set_float(&mut self, name: &str, value: f64) -> Result<()> {
        match self.params.iter_mut().find(|hp| hp.name() == name) {
            Some(Hyperparameter::Float(hp)) => {
                hp.set_value(value);
                Ok(())
            }
            Some(_) => Err(PbtError::HyperparameterMismatch(format!(
                "{} is not a float hyperparameter",
                name
            ))),
            None => Err(PbtError::HyperparameterMismatch(format!(
                "no hyperparameter named {}",
                name
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        for (position, hp) in self.params.iter().enumerate() {
            if let Hyperparameter::Choice(choice) = hp {
                choice.validate(self.params.len(), position)?;
                for option in choice.options() {
                    for &dependent in &option.dependents {
                        if self.params[dependent].as_float().is_none() {
                            return Err(PbtError::Initialization(format!(
                                "{}: dependent {} of option {} must be a float hyperparameter",
                                choice.name(),
                                self.params[dependent].name(),
                                option.label
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Samples every starting value and marks only the selected options'
    /// dependents as used.
    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.validate()?;

        for hp in self.params.iter_mut() {
            if let Hyperparameter::Float(float) = hp {
                float.initialize(rng)?;
            }
        }

        for position in 0..self.params.len() {
            let initial = match &self.params[position] {
                Hyperparameter::Choice(choice) => choice.initial_index(rng),
                Hyperparameter::Float(_) => continue,
            };
            if let Hyperparameter::Choice(choice) = &mut self.params[position] {
                choice.set_index(initial);
            }
            self.apply_selection(position);
        }
        Ok(())
    }

    /// Flags every dependent of the choice at `position` unused except those
    /// of its selected option.
    fn apply_selection(&mut self, position: usize) {
        let (all, active) = match &self.params[position] {
            Hyperparameter::Choice(choice) => {
                let all: Vec<usize> = choice
                    .options()
                    .iter()
                    .flat_map(|o| o.dependents.iter().copied())
                    .collect();
                (all, choice.options()[choice.index()].dependents.clone())
            }
            Hyperparameter::Float(_) => return,
        };
        for dependent in all {
            self.params[dependent].set_unused(true);
        }
        for dependent in active {
            self.params[dependent].set_unused(false);
        }
    }

    fn switch_option<R: Rng + ?Sized>(&mut self, position: usize, index: usize, rng: &mut R) {
        let (previous, next) = match &self.params[position] {
            Hyperparameter::Choice(choice) => (
                choice.options()[choice.index()].dependents.clone(),
                choice.options()[index].dependents.clone(),
            ),
            Hyperparameter::Float(_) => return,
        };

        for dependent in previous {
            self.params[dependent].set_unused(true);
        }
        if let Hyperparameter::Choice(choice) = &mut self.params[position] {
            choice.set_index(index);
        }
        // The newly active branch may never have been set for this member
        for dependent in next {
            if let Hyperparameter::Float(float) = &mut self.params[dependent] {
                float.resample(rng);
                float.set_unused(false);
            }
        }
    }

    pub fn perturb<R: Rng + ?Sized>(&mut self, position: usize, rng: &mut R) {
        let switch = match self.params.get_mut(position) {
            Some(Hyperparameter::Float(float)) => {
                float.perturb(rng);
                None
            }
            Some(Hyperparameter::Choice(choice)) => choice.propose_switch(rng),
            None => None,
        };
        if let Some(index) = switch {
            self.switch_option(position, index, rng);
        }
    }

    pub fn resample<R: Rng + ?Sized>(&mut self, position: usize, rng: &mut R) {
        let switch = match self.params.get_mut(position) {
            Some(Hyperparameter::Float(float)) => {
                float.resample(rng);
                None
            }
            Some(Hyperparameter::Choice(choice)) => choice.propose_resample(rng),
            None => None,
        };
        if let Some(index) = switch {
            self.switch_option(position, index, rng);
        }
    }

    /// Fails unless `source` has the same hyperparameters, in the same order
    /// and of the same kinds, as this set.
    pub fn check_compatible(&self, source: &HyperparameterSet) -> Result<()> {
        if self.params.len() != source.params.len() {
            return Err(PbtError::HyperparameterMismatch(format!(
                "expected {} hyperparameters, source has {}",
                self.params.len(),
                source.params.len()
            )));
        }
        for (mine, theirs) in self.params.iter().zip(&source.params) {
            let compatible = match (mine, theirs) {
                (Hyperparameter::Float(a), Hyperparameter::Float(b)) => a.name() == b.name(),
                (Hyperparameter::Choice(a), Hyperparameter::Choice(b)) => a.matches(b),
                _ => false,
            };
            if !compatible {
                return Err(PbtError::HyperparameterMismatch(format!(
                    "{} {} does not match {} {}",
                    mine.kind(),
                    mine.name(),
                    theirs.kind(),
                    theirs.name()
                )));
            }
        }
        Ok(())
    }

    /// Takes on every value and unused flag of `source`.
    ///
    /// The structure is checked in full before anything is written, so a
    /// mismatch leaves this set untouched.
    pub fn copy_from(&mut self, source: &HyperparameterSet) -> Result<()> {
        self.check_compatible(source)?;
        for (mine, theirs) in self.params.iter_mut().zip(&source.params) {
            match (mine, theirs) {
                (Hyperparameter::Float(a), Hyperparameter::Float(b)) => a.copy(b)?,
                (Hyperparameter::Choice(a), Hyperparameter::Choice(b)) => a.copy(b),
                _ => {}
            }
        }
        Ok(())
    }

    /// Randomly perturbs some hyperparameters and returns the names of those
    /// whose value changed.
    ///
    /// A uniformly drawn non-empty subset of the used hyperparameters that can
    /// change is perturbed; each unused one is perturbed with probability 0.5.
    /// The draw is repeated until some used hyperparameter has a new value,
    /// unless none of them can change at all.
    pub fn explore<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<String> {
        let before = self.params.clone();
        let was_used: Vec<bool> = self.params.iter().map(|hp| !hp.is_unused()).collect();
        let candidates: Vec<usize> = (0..self.params.len())
            .filter(|&p| was_used[p] && self.params[p].can_change())
            .collect();

        loop {
            self.explore_once(&was_used, &candidates, rng);
            let changed = candidates
                .iter()
                .any(|&p| !self.params[p].same_value(&before[p]));
            if changed || candidates.is_empty() {
                break;
            }
        }

        self.params
            .iter()
            .zip(&before)
            .filter(|(now, then)| !now.same_value(then))
            .map(|(now, _)| now.name().to_string())
            .collect()
    }

    fn explore_once<R: Rng + ?Sized>(&mut self, was_used: &[bool], candidates: &[usize], rng: &mut R) {
        let mut chosen = vec![false; candidates.len()];
        if !candidates.is_empty() {
            while !chosen.iter().any(|&c| c) {
                for slot in chosen.iter_mut() {
                    *slot = rng.gen_bool(0.5);
                }
            }
        }

        let mut next = 0;
        for position in 0..self.params.len() {
            let perturb = if was_used[position] {
                match candidates.get(next) {
                    Some(&candidate) if candidate == position => {
                        next += 1;
                        chosen[next - 1]
                    }
                    _ => false,
                }
            } else {
                rng.gen_bool(0.5)
            };
            if perturb {
                self.perturb(position, rng);
            }
        }
    }
}

impl<'a> IntoIterator for &'a HyperparameterSet {
    type Item = &'a Hyperparameter;
    type IntoIter = std::slice::Iter<'a, Hyperparameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparams::{ChoiceHyperparameter, ChoiceOption, Sampler};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const LR: usize = 2;
    const MOMENTUM: usize = 3;

    fn optimizer_set(vary: bool) -> HyperparameterSet {
        let mut set = HyperparameterSet::new();
        set.add(
            FloatHyperparameter::new("Keep probability", Sampler::Uniform { low: 0.1, high: 1.0 }, 1.2)
                .bounded(0.1, 1.0),
        )
        .unwrap();
        set.add(ChoiceHyperparameter::new(
            "Optimizer",
            vec![
                ChoiceOption::new("GradientDescent", vec![LR]),
                ChoiceOption::new("Momentum", vec![LR, MOMENTUM]),
            ],
            1,
            vary,
        ))
        .unwrap();
        set.add(
            FloatHyperparameter::new(
                "Learning rate",
                Sampler::LogUniform { low_exp: -6.0, high_exp: 0.0 },
                1.2,
            )
            .bounded(1e-6, 1.0)
            .initially_unused(),
        )
        .unwrap();
        set.add(
            FloatHyperparameter::new("Momentum", Sampler::Uniform { low: 0.0, high: 1.0 }, 1.2)
                .bounded(0.0, 1.0)
                .initially_unused(),
        )
        .unwrap();
        set
    }

    fn unused_names(set: &HyperparameterSet) -> Vec<&str> {
        set.iter().filter(|hp| hp.is_unused()).map(|hp| hp.name()).collect()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = optimizer_set(true);
        let err = set.add(FloatHyperparameter::new("Momentum", Sampler::Constant(0.5), 1.2));
        assert!(matches!(err, Err(PbtError::Initialization(_))));
    }

    #[test]
    fn test_initialize_activates_selected_branch() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut set = optimizer_set(false);
        set.initialize(&mut rng).unwrap();

        assert_eq!(set.choice_index("Optimizer"), Some(1));
        assert!(unused_names(&set).is_empty());
    }

    #[test]
    fn test_switching_toggles_unused_flags() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut set = optimizer_set(true);
        set.initialize(&mut rng).unwrap();

        for _ in 0..20 {
            set.perturb(1, &mut rng);
            match set.choice_index("Optimizer") {
                Some(0) => assert_eq!(unused_names(&set), vec!["Momentum"]),
                Some(1) => assert!(unused_names(&set).is_empty()),
                other => panic!("unexpected option {:?}", other),
            }
            // The learning rate is shared, so it stays in use either way
            assert!(!set.get(LR).unwrap().is_unused());
        }
    }

    #[test]
    fn test_copy_takes_whole_structure() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut source = optimizer_set(true);
        source.initialize(&mut rng).unwrap();
        let mut target = optimizer_set(true);
        target.initialize(&mut rng).unwrap();

        target.copy_from(&source).unwrap();
        for (a, b) in target.iter().zip(source.iter()) {
            assert_eq!(a.to_string(), b.to_string());
            assert_eq!(a.is_unused(), b.is_unused());
        }
    }

    #[test]
    fn test_copy_mismatch_leaves_target_untouched() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut target = optimizer_set(true);
        target.initialize(&mut rng).unwrap();
        let before: Vec<String> = target.iter().map(|hp| hp.to_string()).collect();

        let mut other = HyperparameterSet::new();
        other
            .add(FloatHyperparameter::new("Keep probability", Sampler::Constant(0.5), 1.2))
            .unwrap();
        other
            .add(FloatHyperparameter::new("Optimizer", Sampler::Constant(0.5), 1.2))
            .unwrap();
        other.add(FloatHyperparameter::new("Learning rate", Sampler::Constant(0.5), 1.2)).unwrap();
        other.add(FloatHyperparameter::new("Momentum", Sampler::Constant(0.5), 1.2)).unwrap();
        other.initialize(&mut rng).unwrap();

        assert!(matches!(
            target.copy_from(&other),
            Err(PbtError::HyperparameterMismatch(_))
        ));
        let after: Vec<String> = target.iter().map(|hp| hp.to_string()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_explore_always_touches_a_used_hyperparameter() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut set = optimizer_set(true);
        set.initialize(&mut rng).unwrap();

        for _ in 0..200 {
            let used_before: Vec<String> = set
                .iter()
                .filter(|hp| !hp.is_unused())
                .map(|hp| hp.name().to_string())
                .collect();
            let perturbed = set.explore(&mut rng);
            assert!(perturbed.iter().any(|name| used_before.contains(name)));
        }
    }

    #[test]
    fn test_explore_never_reports_a_pinned_choice() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut set = optimizer_set(false);
        set.initialize(&mut rng).unwrap();

        for _ in 0..300 {
            let before = set.clone();
            let perturbed = set.explore(&mut rng);

            assert!(!perturbed.is_empty());
            assert!(!perturbed.iter().any(|name| name == "Optimizer"));
            for (now, then) in set.iter().zip(before.iter()) {
                let listed = perturbed.iter().any(|name| name == now.name());
                assert_eq!(listed, !now.same_value(then), "{}", now.name());
            }
        }
    }

    #[test]
    fn test_explore_with_nothing_to_change_returns() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut set = HyperparameterSet::new();
        set.add(ChoiceHyperparameter::new(
            "Optimizer",
            vec![ChoiceOption::new("Adam", vec![]), ChoiceOption::new("Adagrad", vec![])],
            0,
            false,
        ))
        .unwrap();
        set.add(FloatHyperparameter::new("Fixed", Sampler::Constant(0.5), 1.2).bounded(0.5, 0.5))
            .unwrap();
        set.initialize(&mut rng).unwrap();

        assert!(set.explore(&mut rng).is_empty());
    }

    #[test]
    fn test_choice_dependent_must_be_float() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut set = HyperparameterSet::new();
        set.add(ChoiceHyperparameter::new("A", vec![ChoiceOption::new("x", vec![1])], 0, true))
            .unwrap();
        set.add(ChoiceHyperparameter::new("B", vec![ChoiceOption::new("y", vec![])], 0, true))
            .unwrap();
        assert!(matches!(set.initialize(&mut rng), Err(PbtError::Initialization(_))));
    }
}
