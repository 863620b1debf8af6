use anyhow::Context;
use pbtrain::config::ConfigManager;
use pbtrain::engines::population::{until_step, Cluster, ConsoleProgressCallback};
use pbtrain::models::BowlModel;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let manager = ConfigManager::new();
    let argument = std::env::args().nth(1);
    if argument.as_deref() == Some("--manifest") {
        println!("{}", serde_json::to_string_pretty(&manager.get()?.manifest())?);
        return Ok(());
    }
    if let Some(path) = argument {
        manager
            .load_from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?;
    }
    let config = manager.get()?;
    let mut cluster = Cluster::new(&config, |_| BowlModel::from_config(&config.training))?;
    cluster.initialize_all()?;

    let rounds = cluster.train_with_progress(
        until_step(config.training.max_steps),
        &mut ConsoleProgressCallback,
    )?;

    let best = cluster.best_member()?;
    let (metric, loss, optimizer) =
        best.inspect(|state| -> pbtrain::Result<_> {
            let metric = state.metric()?;
            let model = state.trainable();
            Ok((metric, model.loss(), model.optimizer()))
        })??;
    log::info!(
        "Finished after {} rounds. Best member {} has metric {:.4} (loss {:.6}, {})",
        rounds,
        best.id(),
        metric,
        loss,
        optimizer.label()
    );

    for (rank, elite) in cluster.hall_of_fame().get_top_n(3).iter().enumerate() {
        log::info!(
            "Elite #{}: member {} reached {:.4} at step {}",
            rank + 1,
            elite.member_id,
            elite.metric,
            elite.step
        );
    }

    println!("Hyperparameter history of member {}:", best.id());
    print!("{}", best.history()?.render());
    Ok(())
}
