use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Page size used by selection lists.
pub const KEYS_PER_PAGE: usize = 200;

/// Per-key "include in translation" flags for the new keys of an analysis.
///
/// Every new key starts selected. The state belongs to the interactive side;
/// a run only ever sees a [`SelectionSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    order: Vec<String>,
    flags: HashMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEntry {
    pub key: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPage {
    pub page: usize,
    pub total_pages: usize,
    pub total_keys: usize,
    pub entries: Vec<SelectionEntry>,
}

impl SelectionState {
    pub fn for_new_keys(keys: &[String]) -> Self {
        Self {
            order: keys.to_vec(),
            flags: keys.iter().map(|key| (key.clone(), true)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    /// Returns `false` when `key` is not one of the new keys.
    pub fn set(&mut self, key: &str, selected: bool) -> bool {
        match self.flags.get_mut(key) {
            Some(flag) => {
                *flag = selected;
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let flag = self.flags.get_mut(key)?;
        *flag = !*flag;
        Some(*flag)
    }

    pub fn select_all(&mut self) {
        self.flags.values_mut().for_each(|flag| *flag = true);
    }

    pub fn deselect_all(&mut self) {
        self.flags.values_mut().for_each(|flag| *flag = false);
    }

    pub fn selected_count(&self) -> usize {
        self.flags.values().filter(|flag| **flag).count()
    }

    pub fn selected_keys(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|key| self.is_selected(key))
            .cloned()
            .collect()
    }

    pub fn skipped_keys(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|key| !self.is_selected(key))
            .cloned()
            .collect()
    }

    pub fn page_count(&self, per_page: usize) -> usize {
        if per_page == 0 {
            return 0;
        }
        self.order.len().div_ceil(per_page).max(1)
    }

    /// One-based page of entries; out-of-range pages are clamped.
    pub fn page(&self, page: usize, per_page: usize) -> SelectionPage {
        let total_pages = self.page_count(per_page);
        let page = page.clamp(1, total_pages.max(1));
        let start = (page - 1).saturating_mul(per_page).min(self.order.len());
        let end = start.saturating_add(per_page).min(self.order.len());

        SelectionPage {
            page,
            total_pages,
            total_keys: self.order.len(),
            entries: self.order[start..end]
                .iter()
                .map(|key| SelectionEntry {
                    key: key.clone(),
                    selected: self.is_selected(key),
                })
                .collect(),
        }
    }

    /// Freezes the current flags for a run.
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            selected: Arc::from(self.selected_keys()),
            skipped: Arc::from(self.skipped_keys()),
        }
    }
}

/// Immutable copy of the selection taken when a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    selected: Arc<[String]>,
    skipped: Arc<[String]>,
}

impl SelectionSnapshot {
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}
