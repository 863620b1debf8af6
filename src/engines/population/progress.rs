use super::cluster::ProgressCallback;

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_round_start(&mut self, round: usize) {
        log::info!("Round {} starting...", round + 1);
    }

    fn on_member_trained(&mut self, member_id: usize, step: u64) {
        log::debug!("  Member {} reached step {}", member_id, step);
    }

    fn on_round_complete(&mut self, round: usize, best_metric: f64, exploits: usize) {
        log::info!(
            "Round {} complete. Best metric: {:.4}, members replaced: {}",
            round + 1,
            best_metric,
            exploits
        );
    }
}

/// Ignores every event.
pub struct SilentProgressCallback;

impl ProgressCallback for SilentProgressCallback {
    fn on_round_start(&mut self, _round: usize) {}

    fn on_member_trained(&mut self, _member_id: usize, _step: u64) {}

    fn on_round_complete(&mut self, _round: usize, _best_metric: f64, _exploits: usize) {}
}

// For reporting to another thread
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    RoundStart(usize),
    MemberTrained { member_id: usize, step: u64 },
    RoundComplete { round: usize, best_metric: f64, exploits: usize },
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_round_start(&mut self, round: usize) {
        let _ = self.sender.send(ProgressMessage::RoundStart(round));
    }

    fn on_member_trained(&mut self, member_id: usize, step: u64) {
        let _ = self.sender.send(ProgressMessage::MemberTrained { member_id, step });
    }

    fn on_round_complete(&mut self, round: usize, best_metric: f64, exploits: usize) {
        let _ = self.sender.send(ProgressMessage::RoundComplete {
            round,
            best_metric,
            exploits,
        });
    }
}
