use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::document::LocalizationMap;

/// Key sets derived from an old/new pair of localization files.
///
/// `new_keys` and `kept_keys` follow the new file's order and
/// `obsolete_keys` the old file's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyClassification {
    pub new_keys: Vec<String>,
    pub obsolete_keys: Vec<String>,
    pub kept_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub new_count: usize,
    pub obsolete_count: usize,
    pub kept_count: usize,
    pub new_file_total: usize,
    pub old_file_total: usize,
}

/// Result of comparing two files; owns both maps for later assembly.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub classification: KeyClassification,
    pub new_map: LocalizationMap,
    pub old_map: LocalizationMap,
}

impl Analysis {
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            new_count: self.classification.new_keys.len(),
            obsolete_count: self.classification.obsolete_keys.len(),
            kept_count: self.classification.kept_keys.len(),
            new_file_total: self.new_map.len(),
            old_file_total: self.old_map.len(),
        }
    }

    /// True when the new file adds or removes keys relative to the old one.
    pub fn has_changes(&self) -> bool {
        !self.classification.new_keys.is_empty() || !self.classification.obsolete_keys.is_empty()
    }

    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.new_map.get(key)
    }

    pub fn old_value(&self, key: &str) -> Option<&Value> {
        self.old_map.get(key)
    }
}

/// Classifies every key of `old_map` and `new_map`. An empty `old_map`
/// (no baseline selected) turns every key of `new_map` into a new key.
pub fn compare(old_map: LocalizationMap, new_map: LocalizationMap) -> Analysis {
    let old_keys: HashSet<&str> = old_map.keys().map(String::as_str).collect();
    let new_keys: HashSet<&str> = new_map.keys().map(String::as_str).collect();

    let mut classification = KeyClassification::default();
    for key in new_map.keys() {
        if old_keys.contains(key.as_str()) {
            classification.kept_keys.push(key.clone());
        } else {
            classification.new_keys.push(key.clone());
        }
    }
    classification.obsolete_keys = old_map
        .keys()
        .filter(|key| !new_keys.contains(key.as_str()))
        .cloned()
        .collect();

    Analysis {
        classification,
        new_map,
        old_map,
    }
}
