use serde::Serialize;

use crate::document::GameDocument;
use crate::format::{FormatCache, MarkedUpText};
use crate::navigation::NavigationState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabHeader {
    pub id: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRow {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub depth: usize,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailView {
    pub id: String,
    pub title: String,
    pub body: MarkedUpText,
}

/// Everything a presentation surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub title: String,
    pub subtitle: Option<String>,
    pub tabs: Vec<TabHeader>,
    pub items: Vec<ItemRow>,
    pub detail: Option<DetailView>,
}

impl ViewModel {
    pub fn selected_index(&self) -> Option<usize> {
        self.items.iter().find(|row| row.selected).map(|row| row.index)
    }

    pub fn active_tab(&self) -> Option<&TabHeader> {
        self.tabs.iter().find(|tab| tab.active)
    }
}

/// Projects a document and its navigation state into a [`ViewModel`].
///
/// Holds no state of its own: the same inputs always give the same view. The
/// cache only saves re-formatting the selected item's detail.
pub fn project(
    document: &GameDocument,
    navigation: &NavigationState,
    formatter: &FormatCache,
) -> ViewModel {
    let tab = navigation.current_tab(document);
    let selected = navigation.current_index();

    let tabs = document
        .tabs()
        .iter()
        .map(|candidate| TabHeader {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            active: candidate.id == tab.id,
        })
        .collect();

    let items = tab
        .flatten()
        .into_iter()
        .enumerate()
        .map(|(index, item)| ItemRow {
            index,
            id: item.id().to_owned(),
            title: item.title().to_owned(),
            depth: item.depth(),
            selected: index == selected,
        })
        .collect();

    let detail = tab.item_at(selected).map(|item| DetailView {
        id: item.id().to_owned(),
        title: item.title().to_owned(),
        body: formatter
            .format(item.detail(), document.rules())
            .as_ref()
            .clone(),
    });

    ViewModel {
        title: document.info().title.clone(),
        subtitle: document.info().subtitle.clone(),
        tabs,
        items,
        detail,
    }
}
