use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{FlatItem, GameDocument, Tab};
use crate::error::NavigationError;

/// Serialisable form of a [`NavigationState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedNavigation {
    pub current_tab: String,
    #[serde(default)]
    pub selection_by_tab: BTreeMap<String, usize>,
}

/// The active tab plus a cursor into every tab's flattened step sequence.
///
/// Every operation takes the document it was created for. Movement is
/// clamped and never wraps; requests that cannot be honoured leave the state
/// untouched. Mutating operations report whether anything changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    current_tab: String,
    selection_by_tab: HashMap<String, usize>,
}

impl NavigationState {
    pub fn new(document: &GameDocument) -> Self {
        Self {
            current_tab: document.first_tab().id.clone(),
            selection_by_tab: document
                .tabs()
                .iter()
                .map(|tab| (tab.id.clone(), 0))
                .collect(),
        }
    }

    /// Rebuilds state from a snapshot. Unknown tabs are dropped, indices are
    /// clamped to the current document and a missing tab falls back to the
    /// first one.
    pub fn restore(document: &GameDocument, snapshot: &PersistedNavigation) -> Self {
        let mut state = Self::new(document);
        for tab in document.tabs() {
            if let Some(&index) = snapshot.selection_by_tab.get(&tab.id) {
                let clamped = index.min(tab.flattened_len().saturating_sub(1));
                state.selection_by_tab.insert(tab.id.clone(), clamped);
            }
        }
        if document.tab(&snapshot.current_tab).is_some() {
            state.current_tab = snapshot.current_tab.clone();
        } else {
            debug!(tab = %snapshot.current_tab, "saved tab no longer exists");
        }
        state
    }

    pub fn snapshot(&self) -> PersistedNavigation {
        PersistedNavigation {
            current_tab: self.current_tab.clone(),
            selection_by_tab: self
                .selection_by_tab
                .iter()
                .map(|(tab, index)| (tab.clone(), *index))
                .collect(),
        }
    }

    pub fn current_tab_id(&self) -> &str {
        &self.current_tab
    }

    pub fn current_tab<'d>(&self, document: &'d GameDocument) -> &'d Tab {
        document
            .tab(&self.current_tab)
            .unwrap_or_else(|| document.first_tab())
    }

    pub fn selection(&self, tab_id: &str) -> usize {
        self.selection_by_tab.get(tab_id).copied().unwrap_or(0)
    }

    pub fn current_index(&self) -> usize {
        self.selection(&self.current_tab)
    }

    /// The selected item of the active tab, `None` for an empty tab.
    pub fn selected_item<'d>(&self, document: &'d GameDocument) -> Option<FlatItem<'d>> {
        self.current_tab(document).item_at(self.current_index())
    }

    /// Activates `tab_id`, keeping whatever selection it had. Unknown ids are
    /// ignored.
    pub fn switch_tab(&mut self, document: &GameDocument, tab_id: &str) -> bool {
        if document.tab(tab_id).is_none() {
            debug!(tab = %tab_id, "ignoring switch to unknown tab");
            return false;
        }
        if self.current_tab == tab_id {
            return false;
        }
        self.current_tab = tab_id.to_owned();
        self.selection_by_tab.entry(tab_id.to_owned()).or_insert(0);
        true
    }

    /// Switches to the tab `offset` positions away in document order,
    /// stopping at the first and last tab.
    pub fn adjacent_tab(&mut self, document: &GameDocument, offset: isize) -> bool {
        let Some(position) = document.tab_position(&self.current_tab) else {
            let first = document.first_tab().id.clone();
            return self.switch_tab(document, &first);
        };
        let target = clamp_offset(position, offset, document.tabs().len());
        let id = document.tabs()[target].id.clone();
        self.switch_tab(document, &id)
    }

    /// Switches to the tab at `position` (0-based). Out-of-range positions are
    /// ignored.
    pub fn select_tab_at(&mut self, document: &GameDocument, position: usize) -> bool {
        match document.tabs().get(position) {
            Some(tab) => {
                let id = tab.id.clone();
                self.switch_tab(document, &id)
            }
            None => {
                debug!(position, "ignoring tab position out of range");
                false
            }
        }
    }

    /// Moves the active tab's cursor by `delta`, clamped to the tab's bounds.
    pub fn move_by(&mut self, document: &GameDocument, delta: isize) -> bool {
        let len = self.current_tab(document).flattened_len();
        if len == 0 {
            return false;
        }
        let current = self.current_index();
        let next = clamp_offset(current, delta, len);
        if next == current {
            return false;
        }
        self.selection_by_tab.insert(self.current_tab.clone(), next);
        true
    }

    /// Selects `index` in the active tab. Out-of-range indices are rejected
    /// and leave the selection unchanged.
    pub fn go_to(
        &mut self,
        document: &GameDocument,
        index: usize,
    ) -> Result<bool, NavigationError> {
        let tab = self.current_tab(document);
        let len = tab.flattened_len();
        if index >= len {
            return Err(NavigationError::OutOfRange {
                tab: tab.id.clone(),
                index,
                len,
            });
        }
        if index == self.current_index() {
            return Ok(false);
        }
        self.selection_by_tab.insert(self.current_tab.clone(), index);
        Ok(true)
    }
}

fn clamp_offset(current: usize, delta: isize, len: usize) -> usize {
    let target = current as i128 + delta as i128;
    target.clamp(0, len.saturating_sub(1) as i128) as usize
}
