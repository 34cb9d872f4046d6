use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LoadError;
use crate::rules::{CompiledRules, FormattingRules};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "rulebookReferences")]
    pub rulebooks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub substeps: Vec<Substep>,
}

/// A child of exactly one [`Step`]. Substeps do not nest further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substep {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// One entry of a tab's navigable sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatItem<'a> {
    Step(&'a Step),
    Substep {
        parent: &'a Step,
        substep: &'a Substep,
    },
}

impl<'a> FlatItem<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            FlatItem::Step(step) => &step.id,
            FlatItem::Substep { substep, .. } => &substep.id,
        }
    }

    pub fn title(&self) -> &'a str {
        match self {
            FlatItem::Step(step) => &step.title,
            FlatItem::Substep { substep, .. } => &substep.title,
        }
    }

    pub fn detail(&self) -> &'a str {
        match self {
            FlatItem::Step(step) => &step.detail,
            FlatItem::Substep { substep, .. } => &substep.detail,
        }
    }

    /// 0 for steps, 1 for substeps.
    pub fn depth(&self) -> usize {
        match self {
            FlatItem::Step(_) => 0,
            FlatItem::Substep { .. } => 1,
        }
    }
}

impl Tab {
    /// Steps interleaved with their own substeps, in document order.
    pub fn flatten(&self) -> Vec<FlatItem<'_>> {
        let mut items = Vec::with_capacity(self.flattened_len());
        for step in &self.steps {
            items.push(FlatItem::Step(step));
            items.extend(step.substeps.iter().map(|substep| FlatItem::Substep {
                parent: step,
                substep,
            }));
        }
        items
    }

    pub fn flattened_len(&self) -> usize {
        self.steps.iter().map(|step| 1 + step.substeps.len()).sum()
    }

    pub fn item_at(&self, index: usize) -> Option<FlatItem<'_>> {
        let mut remaining = index;
        for step in &self.steps {
            if remaining == 0 {
                return Some(FlatItem::Step(step));
            }
            remaining -= 1;
            if remaining < step.substeps.len() {
                return Some(FlatItem::Substep {
                    parent: step,
                    substep: &step.substeps[remaining],
                });
            }
            remaining -= step.substeps.len();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    game_info: GameInfo,
    tabs: Vec<Tab>,
    #[serde(default)]
    formatting: FormattingRules,
}

/// A validated game script.
///
/// Documents are immutable once loaded and are shared behind an `Arc`, so the
/// flattened sequence derived from a tab never goes stale.
#[derive(Debug, Clone)]
pub struct GameDocument {
    info: GameInfo,
    tabs: Vec<Tab>,
    rules: CompiledRules,
}

impl GameDocument {
    pub fn new(
        info: GameInfo,
        tabs: Vec<Tab>,
        formatting: FormattingRules,
    ) -> Result<Self, LoadError> {
        if tabs.is_empty() {
            return Err(LoadError::malformed("`tabs` must contain at least one tab"));
        }

        let mut seen = HashSet::with_capacity(tabs.len());
        for tab in &tabs {
            if !seen.insert(tab.id.as_str()) {
                return Err(LoadError::malformed(format!(
                    "duplicate tab id `{}`",
                    tab.id
                )));
            }
        }

        let rules = CompiledRules::compile(&formatting)?;
        debug!(
            title = %info.title,
            tabs = tabs.len(),
            passes = rules.len(),
            "validated game document"
        );

        Ok(Self {
            info,
            tabs,
            rules,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, LoadError> {
        let raw: RawDocument =
            serde_json::from_slice(bytes).map_err(|err| LoadError::malformed(err.to_string()))?;
        Self::new(raw.game_info, raw.tabs, raw.formatting)
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Self::from_slice(text.as_bytes())
    }

    pub fn info(&self) -> &GameInfo {
        &self.info
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn tab_position(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    pub fn first_tab(&self) -> &Tab {
        // Construction rejects documents without tabs.
        &self.tabs[0]
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadErrorKind;

    const SAMPLE: &str = r#"{
        "gameInfo": {
            "title": "Harbor Lights",
            "subtitle": "Turn tracker",
            "rulebooks": ["Core Rules", "Almanac"]
        },
        "tabs": [
            {
                "id": "setup",
                "name": "Setup",
                "steps": [
                    {
                        "id": "board",
                        "title": "Lay out the board",
                        "detail": "Place the board in the middle.",
                        "substeps": [
                            { "id": "board-a", "title": "Tiles", "detail": "Shuffle tiles." },
                            { "id": "board-b", "title": "Ships", "detail": "Place ships." }
                        ]
                    },
                    { "id": "deal", "title": "Deal", "detail": "Deal five cards." }
                ]
            },
            { "id": "turn", "name": "Turn", "steps": [] }
        ],
        "formatting": { "gameTerms": ["Harbor"], "actionWords": ["deal"] }
    }"#;

    #[test]
    fn parses_document_and_flattens_in_order() {
        let doc = GameDocument::from_json(SAMPLE).unwrap();
        assert_eq!(doc.info().title, "Harbor Lights");
        assert_eq!(doc.info().rulebooks, vec!["Core Rules", "Almanac"]);
        assert_eq!(doc.tabs().len(), 2);

        let setup = doc.tab("setup").unwrap();
        let ids: Vec<_> = setup.flatten().iter().map(|item| item.id()).collect();
        assert_eq!(ids, vec!["board", "board-a", "board-b", "deal"]);
        assert_eq!(setup.flattened_len(), 4);
        assert_eq!(setup.item_at(2).map(|item| item.id()), Some("board-b"));
        assert_eq!(setup.item_at(3).map(|item| item.depth()), Some(0));
        assert!(setup.item_at(4).is_none());
    }

    #[test]
    fn item_at_agrees_with_flatten() {
        let doc = GameDocument::from_json(SAMPLE).unwrap();
        let setup = doc.tab("setup").unwrap();
        for (index, item) in setup.flatten().into_iter().enumerate() {
            assert_eq!(setup.item_at(index), Some(item));
        }
    }

    #[test]
    fn empty_tab_flattens_to_nothing() {
        let doc = GameDocument::from_json(SAMPLE).unwrap();
        let turn = doc.tab("turn").unwrap();
        assert!(turn.is_empty());
        assert_eq!(turn.flattened_len(), 0);
        assert!(turn.item_at(0).is_none());
    }

    #[test]
    fn rejects_empty_tabs() {
        let err = GameDocument::from_json(r#"{"gameInfo":{"title":"x"},"tabs":[]}"#).unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::DocumentMalformed);
    }

    #[test]
    fn rejects_missing_tabs_and_title() {
        let err = GameDocument::from_json(r#"{"gameInfo":{"title":"x"}}"#).unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::DocumentMalformed);

        let err = GameDocument::from_json(
            r#"{"gameInfo":{},"tabs":[{"id":"a","name":"A","steps":[]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::DocumentMalformed);
    }

    #[test]
    fn rejects_duplicate_tab_ids() {
        let err = GameDocument::from_json(
            r#"{"gameInfo":{"title":"x"},"tabs":[
                {"id":"a","name":"A","steps":[]},
                {"id":"a","name":"Again","steps":[]}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::DocumentMalformed);
        assert!(err.to_string().contains("duplicate tab id `a`"));
    }

    #[test]
    fn rejects_invalid_custom_rule_at_load() {
        let err = GameDocument::from_json(
            r#"{"gameInfo":{"title":"x"},"tabs":[{"id":"a","name":"A","steps":[]}],
                "formatting":{"customRules":[{"pattern":"(unclosed","replacement":"x"}]}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::FormatterInputInvalid);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = GameDocument::from_slice(b"{ not json").unwrap_err();
        assert_eq!(err.kind(), LoadErrorKind::DocumentMalformed);
    }
}
