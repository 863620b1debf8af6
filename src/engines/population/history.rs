use crate::error::Result;
use crate::hyperparams::HyperparameterSet;
use serde::{Serialize, Serializer};
use std::fmt::Write as _;
use std::sync::Arc;

/// The hyperparameter values of a member at the step they took effect.
///
/// Updates are immutable and linked to their predecessor, so members that
/// copied each other share the older part of their history.
#[derive(Debug, Serialize)]
pub struct HyperparamsUpdate {
    step: u64,
    #[serde(serialize_with = "serialize_ordered")]
    values: Vec<(String, String)>,
    #[serde(skip)]
    previous: Option<Arc<HyperparamsUpdate>>,
}

fn serialize_ordered<S: Serializer>(
    values: &[(String, String)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(values.iter().map(|(k, v)| (k, v)))
}

impl HyperparamsUpdate {
    /// Snapshots every used hyperparameter of `hyperparams` on top of `previous`.
    pub fn record(
        previous: Option<Arc<HyperparamsUpdate>>,
        step: u64,
        hyperparams: &HyperparameterSet,
    ) -> Arc<HyperparamsUpdate> {
        let values = hyperparams
            .iter()
            .filter(|hp| !hp.is_unused())
            .map(|hp| (hp.name().to_string(), hp.to_string()))
            .collect();
        Arc::new(Self {
            step,
            values,
            previous,
        })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn values(&self) -> &[(String, String)] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn previous(&self) -> Option<&Arc<HyperparamsUpdate>> {
        self.previous.as_ref()
    }
}

impl Drop for HyperparamsUpdate {
    // Unlink iteratively; the default drop would recurse once per update.
    fn drop(&mut self) {
        let mut previous = self.previous.take();
        while let Some(update) = previous {
            match Arc::try_unwrap(update) {
                Ok(mut update) => previous = update.previous.take(),
                Err(_) => break,
            }
        }
    }
}

/// A member's hyperparameter updates, iterated from oldest to newest.
///
/// Holds only the newest update; each call to [`UpdateHistory::iter`] walks the
/// chain again, so the sequence can be traversed any number of times.
#[derive(Debug, Clone, Default)]
pub struct UpdateHistory {
    head: Option<Arc<HyperparamsUpdate>>,
}

impl UpdateHistory {
    pub fn new(head: Option<Arc<HyperparamsUpdate>>) -> Self {
        Self { head }
    }

    pub fn latest(&self) -> Option<&HyperparamsUpdate> {
        self.head.as_deref()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<HyperparamsUpdate>> {
        let mut updates = Vec::new();
        let mut update = self.head.clone();
        while let Some(current) = update {
            update = current.previous.clone();
            updates.push(current);
        }
        updates.reverse();
        updates.into_iter()
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut update = self.head.as_deref();
        while let Some(current) = update {
            count += 1;
            update = current.previous.as_deref();
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Plain-text listing, one block per update.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for update in self.iter() {
            let _ = writeln!(out, "Step {}", update.step);
            for (name, value) in &update.values {
                let _ = writeln!(out, "{}: {}", name, value);
            }
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        let updates: Vec<Arc<HyperparamsUpdate>> = self.iter().collect();
        let updates: Vec<&HyperparamsUpdate> = updates.iter().map(Arc::as_ref).collect();
        Ok(serde_json::to_string_pretty(&updates)?)
    }
}

impl<'a> IntoIterator for &'a UpdateHistory {
    type Item = Arc<HyperparamsUpdate>;
    type IntoIter = std::vec::IntoIter<Arc<HyperparamsUpdate>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
