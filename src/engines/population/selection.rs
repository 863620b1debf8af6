use super::member::{lock_pair, Member, Population, StateGuard};
use super::trainable::Trainable;
use crate::error::{PbtError, Result};
use serde::Serialize;

/// A member's place in a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedMember {
    pub id: usize,
    pub metric: f64,
}

/// What happened when one member exploited another.
#[derive(Debug, Clone, Serialize)]
pub struct ExploitRecord {
    pub copier: usize,
    pub source: usize,
    pub copier_metric: f64,
    pub source_metric: f64,
    pub source_step: u64,
    pub perturbed: Vec<String>,
}

/// Number of worst-ranked members that copy someone, `ceil(fraction * n)`,
/// capped so the copiers never overlap their sources.
pub fn bottom_count(population_size: usize, fraction: f64) -> usize {
    if population_size <= 1 {
        return 0;
    }
    let count = (population_size as f64 * fraction - 1e-9).ceil().max(0.0) as usize;
    count.min(population_size / 2)
}

/// Copy assignments over an ascending ranking: position `i` of the bottom
/// segment copies position `n - 1 - i`.
pub fn pair_positions(population_size: usize, fraction: f64) -> Vec<(usize, usize)> {
    (0..bottom_count(population_size, fraction))
        .map(|i| (i, population_size - 1 - i))
        .collect()
}

/// Ranks locked members ascending by metric, ties broken by id. Returns
/// indices into `guards` alongside the metrics.
fn rank_locked<T: Trainable>(
    population: &Population<T>,
    guards: &mut [Option<StateGuard<'_, T>>],
) -> Result<Vec<(usize, RankedMember)>> {
    let mut ranking = Vec::with_capacity(guards.len());
    for (index, (member, guard)) in population.iter().zip(guards.iter_mut()).enumerate() {
        if let Some(state) = guard.as_mut() {
            let metric = state.metric().map_err(|e| e.for_member(member.id()))?;
            ranking.push((
                index,
                RankedMember {
                    id: member.id(),
                    metric,
                },
            ));
        }
    }
    ranking.sort_by(|(_, a), (_, b)| a.metric.total_cmp(&b.metric).then(a.id.cmp(&b.id)));
    Ok(ranking)
}

/// Runs one copy between two locked members and releases both afterwards.
fn exploit_locked<T: Trainable>(
    copier: &Member<T>,
    mut copier_state: StateGuard<'_, T>,
    source: &RankedMember,
    source_state: StateGuard<'_, T>,
    copier_metric: f64,
) -> Result<ExploitRecord> {
    let source_step = source_state.step_count();
    let perturbed = copier_state
        .exploit(&source_state)
        .map_err(|e| e.for_member(copier.id()))?;

    log::debug!(
        "Member {} ({:.4}) copied member {} ({:.4}) at step {}, perturbed {:?}",
        copier.id(),
        copier_metric,
        source.id,
        source.metric,
        source_step,
        perturbed
    );

    Ok(ExploitRecord {
        copier: copier.id(),
        source: source.id,
        copier_metric,
        source_metric: source.metric,
        source_step,
        perturbed,
    })
}

/// Ranking and exploit/explore rounds over a population.
///
/// Every round locks all members in ascending id order, reads their metrics,
/// releases the members that take no part in a copy, and then copies from the
/// best members into the worst, releasing each pair once its copy is done.
#[derive(Debug, Clone, Copy)]
pub struct Selector {
    exploit_fraction: f64,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            exploit_fraction: 0.2,
        }
    }
}

impl Selector {
    pub fn new(exploit_fraction: f64) -> Result<Self> {
        if !(exploit_fraction > 0.0 && exploit_fraction <= 0.5) {
            return Err(PbtError::Configuration(format!(
                "exploit fraction must be in (0, 0.5], got {}",
                exploit_fraction
            )));
        }
        Ok(Self { exploit_fraction })
    }

    pub fn exploit_fraction(&self) -> f64 {
        self.exploit_fraction
    }

    /// The whole population ordered from worst to best metric.
    pub fn rank<T: Trainable>(&self, population: &Population<T>) -> Result<Vec<RankedMember>> {
        let mut guards = population.lock_all()?;
        let ranking = rank_locked(population, &mut guards)?;
        Ok(ranking.into_iter().map(|(_, ranked)| ranked).collect())
    }

    /// Lets `member` copy its counterpart among the best members if it ranks
    /// among the worst. Returns `None` when no copy was needed.
    pub fn exploit_and_or_explore<T: Trainable>(
        &self,
        member: &Member<T>,
        population: &Population<T>,
    ) -> Result<Option<ExploitRecord>> {
        let size = population.len();
        if size <= 1 {
            return Ok(None);
        }
        let own_index = population.position(member.id()).ok_or_else(|| {
            PbtError::Configuration(format!("member {} is not in the population", member.id()))
        })?;

        let mut guards = population.lock_all()?;
        let ranking = rank_locked(population, &mut guards)?;

        let rank = ranking
            .iter()
            .position(|(index, _)| *index == own_index)
            .unwrap_or(size);
        let pair = pair_positions(size, self.exploit_fraction)
            .into_iter()
            .find(|(copier, _)| *copier == rank);
        let Some((copier_rank, source_rank)) = pair else {
            return Ok(None);
        };

        let (copier_index, copier_ranked) = ranking[copier_rank];
        let (source_index, source_ranked) = ranking[source_rank];

        // Only the pair stays locked for the copy
        let copier_state = guards[copier_index].take();
        let source_state = guards[source_index].take();
        drop(guards);

        match (copier_state, source_state) {
            (Some(copier_state), Some(source_state)) => exploit_locked(
                &population.members()[copier_index],
                copier_state,
                &source_ranked,
                source_state,
                copier_ranked.metric,
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    /// All of the worst members copy their counterparts among the best at
    /// once, as a combined version of every member's
    /// [`Selector::exploit_and_or_explore`].
    pub fn population_exploit_explore<T: Trainable>(
        &self,
        population: &Population<T>,
    ) -> Result<Vec<ExploitRecord>> {
        let size = population.len();
        if size <= 1 {
            return Ok(Vec::new());
        }

        let mut guards = population.lock_all()?;
        let ranking = rank_locked(population, &mut guards)?;
        let pairs = pair_positions(size, self.exploit_fraction);

        let mut participating = vec![false; size];
        for &(copier, source) in &pairs {
            participating[ranking[copier].0] = true;
            participating[ranking[source].0] = true;
        }
        for (guard, keep) in guards.iter_mut().zip(&participating) {
            if !keep {
                *guard = None;
            }
        }

        let members = population.members();
        let mut records = Vec::with_capacity(pairs.len());
        for (copier_rank, source_rank) in pairs {
            let (copier_index, copier_ranked) = ranking[copier_rank];
            let (source_index, source_ranked) = ranking[source_rank];
            let (Some(copier_state), Some(source_state)) =
                (guards[copier_index].take(), guards[source_index].take())
            else {
                continue;
            };
            records.push(exploit_locked(
                &members[copier_index],
                copier_state,
                &source_ranked,
                source_state,
                copier_ranked.metric,
            )?);
        }
        Ok(records)
    }
}

/// Copies `source` into `copier` outside of a ranking round, locking both in
/// id order.
pub fn exploit_pair<T: Trainable>(copier: &Member<T>, source: &Member<T>) -> Result<ExploitRecord> {
    if std::ptr::eq(copier, source) {
        return Err(PbtError::Configuration(format!(
            "member {} cannot copy itself",
            copier.id()
        )));
    }
    let (mut copier_state, mut source_state) = lock_pair(copier, source)?;
    let copier_metric = copier_state.metric().map_err(|e| e.for_member(copier.id()))?;
    let source_metric = source_state.metric().map_err(|e| e.for_member(source.id()))?;
    exploit_locked(
        copier,
        copier_state,
        &RankedMember {
            id: source.id(),
            metric: source_metric,
        },
        source_state,
        copier_metric,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_count_rounds_up() {
        assert_eq!(bottom_count(0, 0.2), 0);
        assert_eq!(bottom_count(1, 0.2), 0);
        assert_eq!(bottom_count(2, 0.2), 1);
        assert_eq!(bottom_count(5, 0.2), 1);
        assert_eq!(bottom_count(6, 0.2), 2);
        assert_eq!(bottom_count(10, 0.2), 2);
        assert_eq!(bottom_count(11, 0.2), 3);
        assert_eq!(bottom_count(35, 0.2), 7);
    }

    #[test]
    fn test_bottom_and_top_partition_the_population() {
        for size in 2..200 {
            let bottom = bottom_count(size, 0.2);
            let top_start = (size as f64 * 0.8).floor() as usize;
            assert_eq!(bottom + top_start, size, "size {}", size);
        }
    }

    #[test]
    fn test_pairs_are_index_aligned() {
        assert_eq!(pair_positions(5, 0.2), vec![(0, 4)]);
        assert_eq!(pair_positions(10, 0.2), vec![(0, 9), (1, 8)]);
        assert_eq!(pair_positions(4, 0.5), vec![(0, 3), (1, 2)]);
        assert!(pair_positions(1, 0.2).is_empty());
    }

    #[test]
    fn test_selector_rejects_bad_fraction() {
        assert!(Selector::new(0.0).is_err());
        assert!(Selector::new(0.6).is_err());
        assert!(Selector::new(f64::NAN).is_err());
        assert!(Selector::new(0.25).is_ok());
    }
}
