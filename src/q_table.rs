use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::engine::Action;

pub(crate) const LEARNING_RATE: f64 = 0.1;
pub(crate) const DISCOUNT_FACTOR: f64 = 0.95;
const RIGHT_INIT_VALUE: f64 = 0.1;

/// Tabular value store: one fixed-size row per state signature, indexed by
/// `Action::index`. Rows appear lazily on first access, with a small head
/// start for the rightward action to bias early play toward progress.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct QTable {
    values: HashMap<String, [f64; 3]>,
}

impl QTable {
    pub(crate) fn new() -> Self {
        QTable {
            values: HashMap::new(),
        }
    }

    fn fresh_row() -> [f64; 3] {
        let mut row = [0.0; 3];
        row[Action::Right.index()] = RIGHT_INIT_VALUE;
        row
    }

    pub(crate) fn row(&mut self, key: &str) -> &mut [f64; 3] {
        self.values
            .entry(key.to_string())
            .or_insert_with(Self::fresh_row)
    }

    pub(crate) fn max_value(&mut self, key: &str) -> f64 {
        self.row(key).iter().copied().fold(f64::MIN, f64::max)
    }

    /// All actions tied for the maximum value at `key`.
    pub(crate) fn best_actions(&mut self, key: &str) -> Vec<Action> {
        let max = self.max_value(key);
        let row = self.row(key);
        Action::ALL
            .iter()
            .copied()
            .filter(|a| row[a.index()] == max)
            .collect()
    }

    /// Deterministic greedy pick, preferring Right among ties.
    pub(crate) fn greedy_action(&mut self, key: &str) -> Action {
        let best = self.best_actions(key);
        if best.contains(&Action::Right) {
            Action::Right
        } else {
            best[0]
        }
    }

    /// One-step tabular update:
    /// `Q[s][a] += alpha * (r + gamma * max_a' Q[s'][a'] - Q[s][a])`.
    pub(crate) fn update(&mut self, key: &str, action: Action, reward: f64, next_key: &str) {
        let next_max = self.max_value(next_key);
        let row = self.row(key);
        let current = row[action.index()];
        row[action.index()] =
            current + LEARNING_RATE * (reward + DISCOUNT_FACTOR * next_max - current);
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing model to {}", path.display()))?;
        Ok(())
    }

    pub(crate) fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading model from {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
