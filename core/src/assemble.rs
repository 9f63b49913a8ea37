//! Builds the final document (and the dry-run preview) in new-file key order.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::diff::Analysis;
use crate::document::{LocalizationMap, OutputDocument};
use crate::selection::SelectionSnapshot;

/// Message keys the preview labels are looked up under.
pub const WILL_TRANSLATE_KEY: &str = "will_translate";
pub const SKIPPED_KEY: &str = "skipped";

/// Tags put in front of new values in the preview, shown in brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLabels {
    pub will_translate: String,
    pub skipped: String,
}

impl PreviewLabels {
    pub fn new(will_translate: impl Into<String>, skipped: impl Into<String>) -> Self {
        Self {
            will_translate: will_translate.into(),
            skipped: skipped.into(),
        }
    }
}

impl Default for PreviewLabels {
    fn default() -> Self {
        Self::new(WILL_TRANSLATE_KEY, SKIPPED_KEY)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("key '{0}' from the new file has no kept, translated or skipped value")]
    MissingKey(String),
}

/// Merges kept, translated and skipped values into one document.
///
/// * kept keys take the old file's value
/// * selected new keys take the value from `translated`
/// * deselected new keys take the new file's value unchanged
///
/// Obsolete keys never appear because only new-file keys are visited.
pub fn assemble(
    analysis: &Analysis,
    selection: &SelectionSnapshot,
    translated: &LocalizationMap,
) -> Result<OutputDocument, AssembleError> {
    let skipped: HashSet<&str> = selection.skipped().iter().map(String::as_str).collect();
    let mut entries = LocalizationMap::new();

    for (key, new_value) in &analysis.new_map {
        let value = if let Some(old_value) = analysis.old_map.get(key) {
            old_value.clone()
        } else if let Some(value) = translated.get(key) {
            value.clone()
        } else if skipped.contains(key.as_str()) {
            new_value.clone()
        } else {
            return Err(AssembleError::MissingKey(key.clone()));
        };
        entries.insert(key.clone(), value);
    }

    Ok(OutputDocument::new(entries))
}

/// Dry-run view of the output: kept values as they are, new values tagged
/// with what a run would do to them.
pub fn build_preview(
    analysis: &Analysis,
    selection: &SelectionSnapshot,
    labels: &PreviewLabels,
) -> LocalizationMap {
    let selected: HashSet<&str> = selection.selected().iter().map(String::as_str).collect();

    analysis
        .new_map
        .iter()
        .map(|(key, new_value)| {
            let value = match analysis.old_map.get(key) {
                Some(old_value) => old_value.clone(),
                None => {
                    let label = if selected.contains(key.as_str()) {
                        &labels.will_translate
                    } else {
                        &labels.skipped
                    };
                    Value::String(format!("[{label}] {}", display_value(new_value)))
                }
            };
            (key.clone(), value)
        })
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
