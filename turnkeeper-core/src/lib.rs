//! Game-script model, rule text formatting and navigation for turnkeeper.

use bytes::Bytes;
use once_cell::sync::Lazy;
use uuid::Uuid;

pub mod document;
pub mod error;
pub mod format;
pub mod navigation;
pub mod rules;
pub mod session;
pub mod store;
pub mod view;

pub use document::{FlatItem, GameDocument, GameInfo, Step, Substep, Tab};
pub use error::{LoadError, LoadErrorKind, NavigationError};
pub use format::{format, Block, FormatCache, Inline, ListItem, MarkedUpText};
pub use navigation::{NavigationState, PersistedNavigation};
pub use rules::{CompiledRules, CustomRule, FormattingRules, InlineStyle};
pub use session::{
    fetch_document, ActiveGame, LoadOutcome, LoadPhase, LoadTicket, Session,
};
pub use store::{FileStateStore, MemoryStateStore, NullStateStore, StateStore};
pub use view::{project, DetailView, ItemRow, TabHeader, ViewModel};

/// Whatever the document source understands: a file name, a path, a key.
pub type DocumentId = String;

static STATE_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d8a52-6c1e-5b7a-9e44-2a9c1d7b0e61").expect("valid namespace UUID")
});

/// Stable key for a document's saved navigation, safe to use as a file name.
pub fn state_key(document_id: &str) -> Uuid {
    Uuid::new_v5(&STATE_NAMESPACE, document_id.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move { delta: isize },
    SwitchTab { tab_id: String },
    AdjacentTab { offset: isize },
    SelectTabAt { position: usize },
    GoTo { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DocumentLoaded(DocumentId),
    LoadDiscarded(DocumentId),
    LoadFailed(DocumentId),
    TabChanged(String),
    SelectionChanged(usize),
}

/// Fetches the raw bytes of a game document.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fails with [`LoadError::DocumentNotFound`] for unknown ids and
    /// [`LoadError::Unavailable`] when the source itself cannot be read.
    async fn fetch(&self, id: &str) -> Result<Bytes, LoadError>;
}
