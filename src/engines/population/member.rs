use super::history::{HyperparamsUpdate, UpdateHistory};
use super::trainable::Trainable;
use crate::error::{PbtError, Result};
use crate::hyperparams::HyperparameterSet;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) type StateGuard<'a, T> = MutexGuard<'a, MemberState<T>>;

/// Everything about a member that changes during training. Only reachable
/// through the member's lock.
pub struct MemberState<T: Trainable> {
    trainable: T,
    last_update: Option<Arc<HyperparamsUpdate>>,
    cached_metric: Option<f64>,
    rng: StdRng,
}

impl<T: Trainable> MemberState<T> {
    pub fn trainable(&self) -> &T {
        &self.trainable
    }

    pub fn hyperparameters(&self) -> &HyperparameterSet {
        self.trainable.hyperparameters()
    }

    pub fn step_count(&self) -> u64 {
        self.trainable.step_number()
    }

    /// The cached metric, evaluating the model only if it changed since the
    /// last call. A NaN or infinite metric is an error, so such a member is
    /// never ranked.
    pub fn metric(&mut self) -> Result<f64> {
        if let Some(metric) = self.cached_metric {
            return Ok(metric);
        }
        let metric = self.trainable.evaluate_metric()?;
        if !metric.is_finite() {
            return Err(PbtError::Training(format!(
                "metric is not finite at step {}: {}",
                self.step_count(),
                metric
            )));
        }
        self.cached_metric = Some(metric);
        Ok(metric)
    }

    pub fn history(&self) -> UpdateHistory {
        UpdateHistory::new(self.last_update.clone())
    }

    fn initialize(&mut self) -> Result<()> {
        self.trainable
            .hyperparameters_mut()
            .initialize(&mut self.rng)?;
        self.trainable.initialize_variables(&mut self.rng)?;
        self.cached_metric = None;
        self.record_update();
        Ok(())
    }

    fn train_step(&mut self) -> Result<()> {
        self.cached_metric = None;
        self.trainable.train_one_step()
    }

    fn record_update(&mut self) {
        self.last_update = Some(HyperparamsUpdate::record(
            self.last_update.take(),
            self.trainable.step_number(),
            self.trainable.hyperparameters(),
        ));
    }

    fn explore(&mut self) -> Vec<String> {
        let perturbed = self
            .trainable
            .hyperparameters_mut()
            .explore(&mut self.rng);
        self.cached_metric = None;
        self.record_update();
        perturbed
    }

    /// Becomes a perturbed copy of `source`, taking over its history.
    /// Returns the names of the hyperparameters that were perturbed.
    ///
    /// Nothing is changed if the source's hyperparameters do not match or its
    /// weights cannot be imported.
    pub(crate) fn exploit(&mut self, source: &MemberState<T>) -> Result<Vec<String>> {
        self.cached_metric = None;
        let hyperparams = source.trainable.hyperparameters();
        self.trainable.hyperparameters().check_compatible(hyperparams)?;
        self.trainable.import_state(source.trainable.export_state())?;
        self.trainable.hyperparameters_mut().copy_from(hyperparams)?;
        self.trainable.set_step_number(source.trainable.step_number());
        self.last_update = source.last_update.clone();
        Ok(self.explore())
    }
}

/// One slot of the population: a trainable model plus its bookkeeping, all
/// behind a single lock.
pub struct Member<T: Trainable> {
    id: usize,
    state: Mutex<MemberState<T>>,
}

impl<T: Trainable> Member<T> {
    pub fn new(id: usize, trainable: T, rng: StdRng) -> Self {
        Self {
            id,
            state: Mutex::new(MemberState {
                trainable,
                last_update: None,
                cached_metric: None,
                rng,
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn lock(&self) -> Result<StateGuard<'_, T>> {
        self.state.lock().map_err(|_| PbtError::Poisoned(self.id))
    }

    /// Runs `f` with this member locked. Do not touch other members from
    /// inside `f`.
    pub fn inspect<R>(&self, f: impl FnOnce(&mut MemberState<T>) -> R) -> Result<R> {
        let mut state = self.lock()?;
        Ok(f(&mut state))
    }

    /// Initializes hyperparameters and weights and records the first update.
    pub fn initialize(&self) -> Result<()> {
        self.lock()?
            .initialize()
            .map_err(|e| e.for_member(self.id))
    }

    pub fn metric(&self) -> Result<f64> {
        self.lock()?.metric().map_err(|e| e.for_member(self.id))
    }

    pub fn step_count(&self) -> Result<u64> {
        Ok(self.lock()?.step_count())
    }

    pub fn hyperparameters(&self) -> Result<HyperparameterSet> {
        Ok(self.lock()?.hyperparameters().clone())
    }

    pub fn history(&self) -> Result<UpdateHistory> {
        Ok(self.lock()?.history())
    }

    /// Trains until the step count reaches the next multiple of
    /// `steps_per_burst`, locking once per step. Returns the steps taken.
    pub fn train_burst(&self, steps_per_burst: u64) -> Result<u64> {
        if steps_per_burst == 0 {
            return Err(PbtError::Configuration(
                "steps per burst must be positive".to_string(),
            ));
        }
        let mut trained = 0;
        loop {
            let mut state = self.lock()?;
            state.train_step().map_err(|e| e.for_member(self.id))?;
            trained += 1;
            if state.step_count() % steps_per_burst == 0 {
                return Ok(trained);
            }
        }
    }

    /// Copies `source`'s step count, weights and hyperparameters into this
    /// member, then explores. Both members stay locked throughout.
    pub fn copy_from(&self, source: &Member<T>) -> Result<Vec<String>> {
        if std::ptr::eq(self, source) {
            return Err(PbtError::Configuration(format!(
                "member {} cannot copy itself",
                self.id
            )));
        }
        let (mut copier, source_state) = lock_pair(self, source)?;
        copier
            .exploit(&source_state)
            .map_err(|e| e.for_member(self.id))
    }
}

fn lock_key<T: Trainable>(member: &Member<T>) -> (usize, usize) {
    (member.id, member as *const Member<T> as usize)
}

/// Locks two distinct members in the global order (ascending id), returning
/// the guards in argument order.
pub(crate) fn lock_pair<'a, T: Trainable>(
    first: &'a Member<T>,
    second: &'a Member<T>,
) -> Result<(StateGuard<'a, T>, StateGuard<'a, T>)> {
    if lock_key(first) < lock_key(second) {
        let a = first.lock()?;
        let b = second.lock()?;
        Ok((a, b))
    } else {
        let b = second.lock()?;
        let a = first.lock()?;
        Ok((a, b))
    }
}

/// The fixed set of members a cluster trains, kept sorted by id.
pub struct Population<T: Trainable> {
    members: Vec<Member<T>>,
}

impl<T: Trainable> Population<T> {
    pub fn new(mut members: Vec<Member<T>>) -> Result<Self> {
        if members.is_empty() {
            return Err(PbtError::EmptyPopulation);
        }
        members.sort_by_key(Member::id);
        if let Some(pair) = members.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(PbtError::Configuration(format!(
                "duplicate member id {}",
                pair[0].id
            )));
        }
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Member<T>] {
        &self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Member<T>> {
        self.members.iter()
    }

    pub fn position(&self, id: usize) -> Option<usize> {
        self.members.binary_search_by_key(&id, Member::id).ok()
    }

    pub fn get(&self, id: usize) -> Option<&Member<T>> {
        self.position(id).map(|p| &self.members[p])
    }

    /// Locks every member in ascending id order.
    pub(crate) fn lock_all(&self) -> Result<Vec<Option<StateGuard<'_, T>>>> {
        self.members
            .iter()
            .map(|member| member.lock().map(Some))
            .collect()
    }
}

impl<'a, T: Trainable> IntoIterator for &'a Population<T> {
    type Item = &'a Member<T>;
    type IntoIter = std::slice::Iter<'a, Member<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
