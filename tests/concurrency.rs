mod common;

use common::{member, MockTrainable};
use pbtrain::engines::population::{Population, Selector};
use std::thread;

fn drifting_population(size: usize) -> Population<MockTrainable> {
    let members = (0..size)
        .map(|id| {
            let drift = if id % 2 == 0 { 0.001 } else { -0.001 };
            member(id, MockTrainable::drifting(id as f64 / size as f64, drift), 100)
        })
        .collect();
    let population = Population::new(members).unwrap();
    for m in population.iter() {
        m.initialize().unwrap();
    }
    population
}

/// Training, per-member rounds and population rounds all running at once must
/// neither deadlock nor leave any member half copied.
#[test]
fn test_concurrent_rounds_do_not_deadlock() {
    let population = drifting_population(12);
    let selector = Selector::default();

    thread::scope(|scope| {
        for m in population.iter() {
            scope.spawn(move || {
                for _ in 0..20 {
                    m.train_burst(10).unwrap();
                }
            });
        }
        for m in population.iter() {
            let population = &population;
            scope.spawn(move || {
                for _ in 0..10 {
                    selector.exploit_and_or_explore(m, population).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let population = &population;
            scope.spawn(move || {
                for _ in 0..10 {
                    selector.population_exploit_explore(population).unwrap();
                }
            });
        }
    });

    for m in population.iter() {
        let step = m.step_count().unwrap();
        assert!(step > 0, "member {} never trained", m.id());
        let history = m.history().unwrap();
        assert!(!history.is_empty());
        assert!(history.latest().unwrap().step() <= step);
    }
}

#[test]
fn test_copies_between_the_same_pair_in_both_directions() {
    let population = drifting_population(2);
    let (a, b) = (population.get(0).unwrap(), population.get(1).unwrap());

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                a.copy_from(b).unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..200 {
                b.copy_from(a).unwrap();
            }
        });
    });

    assert_eq!(a.step_count().unwrap(), b.step_count().unwrap());
}
