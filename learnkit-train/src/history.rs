// learnkit-train/src/history.rs

//! Insertion-ordered, append-only loss and metric histories keyed by
//! `(phase, epoch)`.

use learnkit_core::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryKey {
    pub phase: Phase,
    pub epoch: usize,
}

impl HistoryKey {
    pub fn new(phase: Phase, epoch: usize) -> Self {
        Self { phase, epoch }
    }
}

/// The values recorded under one name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f32>,
}

/// Every series recorded for one `(phase, epoch)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub key: HistoryKey,
    pub series: Vec<Series>,
}

impl HistoryEntry {
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.values.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }
}

/// `(phase, epoch) -> (name -> values)`, ordered by first insertion at both
/// levels. Values are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `values` to the series `name` under `key`, creating the entry
    /// and the series on first use.
    pub fn extend(&mut self, key: HistoryKey, name: &str, values: &[f32]) {
        let entry = match self.entries.iter().position(|e| e.key == key) {
            Some(i) => &mut self.entries[i],
            None => {
                self.entries.push(HistoryEntry {
                    key,
                    series: Vec::new(),
                });
                let last = self.entries.len() - 1;
                &mut self.entries[last]
            }
        };
        match entry.series.iter_mut().find(|s| s.name == name) {
            Some(series) => series.values.extend_from_slice(values),
            None => entry.series.push(Series {
                name: name.to_string(),
                values: values.to_vec(),
            }),
        }
    }

    pub fn push(&mut self, key: HistoryKey, name: &str, value: f32) {
        self.extend(key, name, &[value]);
    }

    pub fn entry(&self, phase: Phase, epoch: usize) -> Option<&HistoryEntry> {
        let key = HistoryKey::new(phase, epoch);
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn get(&self, phase: Phase, epoch: usize, name: &str) -> Option<&[f32]> {
        self.entry(phase, epoch).and_then(|e| e.get(name))
    }

    pub fn keys(&self) -> impl Iterator<Item = HistoryKey> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Whether `name` was recorded under any key.
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.get(name).is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Combines two histories: keys of `self` come first, then keys only
    /// present in `other`; under a shared key the series of `self` precede
    /// those of `other`.
    pub fn merged(&self, other: &History) -> History {
        let mut merged = self.clone();
        for entry in &other.entries {
            for series in &entry.series {
                merged.extend(entry.key, &series.name, &series.values);
            }
        }
        merged
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
