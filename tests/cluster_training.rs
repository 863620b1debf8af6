mod common;

use common::MockTrainable;
use pbtrain::config::{AppConfig, ExploitPolicy};
use pbtrain::engines::population::{until_step, ChannelProgressCallback, Cluster, ProgressMessage};
use pbtrain::models::BowlModel;
use pbtrain::PbtError;
use std::sync::mpsc;

/// Small and fast config with a fixed seed.
fn test_config(population_size: usize, steps_per_burst: u64, max_steps: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.population.population_size = population_size;
    config.population.steps_per_burst = steps_per_burst;
    config.population.seed = Some(7);
    config.training.max_steps = max_steps;
    config.training.dimensions = 4;
    config
}

fn mock_cluster(metrics: &'static [f64], config: &AppConfig) -> Cluster<MockTrainable> {
    let cluster = Cluster::new(config, |id| Ok(MockTrainable::new(metrics[id]))).unwrap();
    cluster.initialize_all().unwrap();
    cluster
}

#[test]
fn test_bowl_population_trains_to_max_steps() {
    println!("\n=== Training a bowl population ===");
    let config = test_config(6, 50, 500);
    let mut cluster = Cluster::new(&config, |_| BowlModel::from_config(&config.training)).unwrap();
    cluster.initialize_all().unwrap();

    let rounds = cluster.train(until_step(config.training.max_steps)).unwrap();
    assert_eq!(rounds, 10);
    assert_eq!(cluster.rounds(), 10);

    for member in cluster.population().iter() {
        assert_eq!(member.step_count().unwrap(), 500);

        let steps: Vec<u64> = member.history().unwrap().iter().map(|u| u.step()).collect();
        assert!(!steps.is_empty());
        assert!(steps.windows(2).all(|w| w[0] <= w[1]), "member {}: {:?}", member.id(), steps);
    }

    let best = cluster.best_member().unwrap();
    let best_metric = best.metric().unwrap();
    let peak = cluster.peak().unwrap();
    println!("✓ Best member {} at {:.4}, peak {:.4}", best.id(), best_metric, peak.metric);
    assert!(peak.metric >= best_metric - 1e-12);
    assert!(cluster.hall_of_fame().len() <= config.population.hall_of_fame_size);

    let json: serde_json::Value = serde_json::from_str(&best.history().unwrap().to_json().unwrap()).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(best.history().unwrap().len()));
}

#[test]
fn test_training_error_names_the_member() {
    let config = test_config(4, 5, 20);
    let mut cluster = Cluster::new(&config, |id| {
        let model = MockTrainable::new(id as f64);
        Ok(if id == 2 { model.failing_at(3) } else { model })
    })
    .unwrap();
    cluster.initialize_all().unwrap();

    match cluster.train(until_step(config.training.max_steps)) {
        Err(PbtError::Member { id, source }) => {
            assert_eq!(id, 2);
            assert!(matches!(*source, PbtError::Training(_)));
        }
        other => panic!("expected a member error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_exploit_policies() {
    static METRICS: [f64; 5] = [0.1, 0.2, 0.5, 0.8, 0.9];

    let config = test_config(5, 5, 10);
    let cluster = mock_cluster(&METRICS, &config);
    let pairs: Vec<(usize, usize)> = cluster
        .exploit_explore()
        .unwrap()
        .iter()
        .map(|r| (r.copier, r.source))
        .collect();
    assert_eq!(pairs, vec![(0, 4)]);

    // Each copy leaves the next member in id order at the bottom
    let mut config = test_config(5, 5, 10);
    config.population.exploit_policy = ExploitPolicy::PerMember;
    let cluster = mock_cluster(&METRICS, &config);
    let pairs: Vec<(usize, usize)> = cluster
        .exploit_explore()
        .unwrap()
        .iter()
        .map(|r| (r.copier, r.source))
        .collect();
    assert_eq!(pairs, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
}

#[test]
fn test_best_member_prefers_lowest_id_on_ties() {
    static METRICS: [f64; 3] = [0.5, 0.9, 0.9];
    let config = test_config(3, 5, 10);
    let cluster = mock_cluster(&METRICS, &config);
    assert_eq!(cluster.best_member().unwrap().id(), 1);
}

#[test]
fn test_no_rounds_when_nobody_wants_to_train() {
    static METRICS: [f64; 2] = [0.5, 0.9];
    let config = test_config(2, 5, 10);
    let mut cluster = mock_cluster(&METRICS, &config);
    assert_eq!(cluster.train(until_step(0)).unwrap(), 0);
    assert!(cluster.peak().is_none());
}

#[test]
fn test_progress_reaches_the_channel() {
    static METRICS: [f64; 4] = [0.1, 0.4, 0.6, 0.9];
    let config = test_config(4, 5, 15);
    let mut cluster = mock_cluster(&METRICS, &config);

    let (sender, receiver) = mpsc::channel();
    let mut callback = ChannelProgressCallback::new(sender);
    let rounds = cluster
        .train_with_progress(until_step(config.training.max_steps), &mut callback)
        .unwrap();
    drop(callback);

    let messages: Vec<ProgressMessage> = receiver.iter().collect();
    assert_eq!(rounds, 3);
    assert_eq!(messages.first(), Some(&ProgressMessage::RoundStart(0)));

    let trained = messages
        .iter()
        .filter(|m| matches!(m, ProgressMessage::MemberTrained { .. }))
        .count();
    assert_eq!(trained, 12);

    let best: Vec<f64> = messages
        .iter()
        .filter_map(|m| match m {
            ProgressMessage::RoundComplete { best_metric, .. } => Some(*best_metric),
            _ => None,
        })
        .collect();
    assert_eq!(best, vec![0.9, 0.9, 0.9]);
}
