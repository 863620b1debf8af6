use crate::config::{AppConfig, ExploitPolicy, PopulationConfig, TrainingConfig};
use crate::engines::population::{
    hall_of_fame::{EliteSnapshot, HallOfFame},
    member::{Member, Population},
    progress::SilentProgressCallback,
    selection::{ExploitRecord, Selector},
    trainable::Trainable,
};
use crate::error::{PbtError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

pub trait ProgressCallback: Send {
    fn on_round_start(&mut self, round: usize);
    fn on_member_trained(&mut self, member_id: usize, step: u64);
    fn on_round_complete(&mut self, round: usize, best_metric: f64, exploits: usize);
}

/// Performs population-based training on a fixed population.
///
/// Each round trains every member that should keep going for one burst, then
/// runs a single exploit/explore pass over the whole population. Training
/// stops once no member wants to continue.
pub struct Cluster<T: Trainable> {
    population: Population<T>,
    population_config: PopulationConfig,
    training_config: TrainingConfig,
    selector: Selector,
    hall_of_fame: HallOfFame,
    rounds: usize,
}

impl<T: Trainable> Cluster<T> {
    /// Builds `population_size` members from `make`, which receives each
    /// member's id.
    pub fn new<F>(config: &AppConfig, mut make: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<T>,
    {
        config.validate()?;
        let population_config = config.population.clone();

        let members = (0..population_config.population_size)
            .map(|id| {
                let trainable = make(id).map_err(|e| e.for_member(id))?;
                let rng = match population_config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
                    None => StdRng::from_entropy(),
                };
                Ok(Member::new(id, trainable, rng))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            population: Population::new(members)?,
            selector: Selector::new(population_config.exploit_fraction)?,
            hall_of_fame: HallOfFame::new(population_config.hall_of_fame_size),
            training_config: config.training.clone(),
            population_config,
            rounds: 0,
        })
    }

    pub fn population(&self) -> &Population<T> {
        &self.population
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    /// Best snapshot seen so far over the whole run.
    pub fn peak(&self) -> Option<&EliteSnapshot> {
        self.hall_of_fame.best()
    }

    /// Rounds completed since the cluster was built.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Initializes every member's hyperparameters and weights.
    pub fn initialize_all(&self) -> Result<()> {
        if self.training_config.parallel {
            self.population
                .members()
                .par_iter()
                .try_for_each(Member::initialize)
        } else {
            self.population.iter().try_for_each(Member::initialize)
        }
    }

    /// The member with the highest metric; ties go to the lowest id.
    pub fn best_member(&self) -> Result<&Member<T>> {
        let mut best: Option<(&Member<T>, f64)> = None;
        for member in self.population.iter() {
            let metric = member.metric()?;
            match best {
                Some((_, best_metric)) if metric <= best_metric => {}
                _ => best = Some((member, metric)),
            }
        }
        best.map(|(member, _)| member).ok_or(PbtError::EmptyPopulation)
    }

    pub fn train<P>(&mut self, training_cond: P) -> Result<usize>
    where
        P: Fn(&Member<T>, &Population<T>) -> Result<bool>,
    {
        self.train_with_progress(training_cond, &mut SilentProgressCallback)
    }

    /// Trains until `training_cond` is false for every member and returns the
    /// number of rounds run. `training_cond` is asked once per member per
    /// round.
    pub fn train_with_progress<P, C>(&mut self, training_cond: P, callback: &mut C) -> Result<usize>
    where
        P: Fn(&Member<T>, &Population<T>) -> Result<bool>,
        C: ProgressCallback,
    {
        let mut rounds_run = 0;
        loop {
            let mut selected = Vec::new();
            for member in self.population.iter() {
                if training_cond(member, &self.population).map_err(|e| e.for_member(member.id()))? {
                    selected.push(member);
                }
            }
            if selected.is_empty() {
                log::info!("No member left to train after {} rounds", self.rounds);
                break;
            }

            let round = self.rounds;
            callback.on_round_start(round);

            let trained = self.train_phase(&selected).map_err(|e| {
                log::warn!("Round {} aborted: {}", round + 1, e);
                e
            })?;
            for (member_id, step) in trained {
                callback.on_member_trained(member_id, step);
            }

            let best_metric = self.record_elites()?;
            let exploits = self.exploit_explore()?;

            callback.on_round_complete(round, best_metric, exploits.len());
            self.rounds += 1;
            rounds_run += 1;
        }
        Ok(rounds_run)
    }

    fn train_phase(&self, selected: &[&Member<T>]) -> Result<Vec<(usize, u64)>> {
        let burst = self.population_config.steps_per_burst;
        let train = |member: &&Member<T>| -> Result<(usize, u64)> {
            member.train_burst(burst)?;
            Ok((member.id(), member.step_count()?))
        };

        if self.training_config.parallel {
            selected.par_iter().map(train).collect()
        } else {
            selected.iter().map(train).collect()
        }
    }

    /// Offers every member's current state to the hall of fame and returns
    /// the best metric of the round.
    fn record_elites(&mut self) -> Result<f64> {
        let mut best_metric = f64::NEG_INFINITY;
        for member in self.population.iter() {
            let (metric, step, history) = member
                .inspect(|state| {
                    state
                        .metric()
                        .map(|metric| (metric, state.step_count(), state.history()))
                })?
                .map_err(|e| e.for_member(member.id()))?;

            best_metric = best_metric.max(metric);
            self.hall_of_fame
                .try_add(EliteSnapshot::new(member.id(), metric, step, history));
        }
        Ok(best_metric)
    }

    /// Runs exploit/explore once, following the configured policy.
    pub fn exploit_explore(&self) -> Result<Vec<ExploitRecord>> {
        match self.population_config.exploit_policy {
            ExploitPolicy::Population => self.selector.population_exploit_explore(&self.population),
            ExploitPolicy::PerMember => {
                let mut records = Vec::new();
                for member in self.population.iter() {
                    if let Some(record) = self.selector.exploit_and_or_explore(member, &self.population)? {
                        records.push(record);
                    }
                }
                Ok(records)
            }
        }
    }
}

/// A training condition that keeps members going until they reach `max_steps`.
pub fn until_step<T: Trainable>(max_steps: u64) -> impl Fn(&Member<T>, &Population<T>) -> Result<bool> {
    move |member, _| Ok(member.step_count()? < max_steps)
}
