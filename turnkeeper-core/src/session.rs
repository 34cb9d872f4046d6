use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::document::GameDocument;
use crate::error::LoadError;
use crate::format::FormatCache;
use crate::navigation::NavigationState;
use crate::store::StateStore;
use crate::view::{project, ViewModel};
use crate::{Command, DocumentId, DocumentSource, SessionEvent};

/// Identifies one load request. Only the most recently issued ticket may
/// install its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    id: DocumentId,
}

impl LoadTicket {
    pub fn document_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer request was issued after this one; the result was dropped.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading { id: DocumentId },
    Ready,
    Failed { id: DocumentId, message: String },
}

pub struct ActiveGame {
    pub id: DocumentId,
    pub document: Arc<GameDocument>,
    pub navigation: NavigationState,
}

/// Owns the loaded game, its navigation state and the format cache.
///
/// Commands are ignored unless a document is ready. Starting a new load
/// drops the current game, so navigation never runs against a pending
/// document.
pub struct Session {
    phase: LoadPhase,
    active: Option<ActiveGame>,
    latest_generation: u64,
    restore_state: bool,
    store: Arc<dyn StateStore>,
    formatter: FormatCache,
    events: Mutex<Vec<SessionEvent>>,
}

impl Session {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            phase: LoadPhase::Idle,
            active: None,
            latest_generation: 0,
            restore_state: true,
            store,
            formatter: FormatCache::default(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.formatter = FormatCache::new(capacity);
        self
    }

    /// Whether saved navigation is applied when a document loads.
    pub fn with_restore_state(mut self, restore: bool) -> Self {
        self.restore_state = restore;
        self
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    pub fn active(&self) -> Option<&ActiveGame> {
        self.active.as_ref()
    }

    /// Starts a load of `id`, superseding any load still in flight. The
    /// current game, if any, is persisted and dropped.
    pub fn begin_load(&mut self, id: impl Into<DocumentId>) -> LoadTicket {
        let id = id.into();
        if let Err(err) = self.persist() {
            warn!(?err, "failed to persist navigation before switching documents");
        }
        self.active = None;
        self.latest_generation += 1;
        self.phase = LoadPhase::Loading { id: id.clone() };
        debug!(document = %id, generation = self.latest_generation, "load requested");
        LoadTicket {
            generation: self.latest_generation,
            id,
        }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.latest_generation
            && matches!(self.phase, LoadPhase::Loading { .. })
    }

    /// Installs the result of a load. Results for superseded tickets are
    /// discarded without touching the session.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<GameDocument, LoadError>,
    ) -> Result<LoadOutcome, LoadError> {
        if !self.is_current(&ticket) {
            warn!(
                document = %ticket.id,
                generation = ticket.generation,
                latest = self.latest_generation,
                "discarding stale load result"
            );
            self.events
                .lock()
                .push(SessionEvent::LoadDiscarded(ticket.id));
            return Ok(LoadOutcome::Discarded);
        }

        let document = match result {
            Ok(document) => document,
            Err(err) => {
                warn!(document = %ticket.id, %err, "document load failed");
                self.phase = LoadPhase::Failed {
                    id: ticket.id.clone(),
                    message: err.to_string(),
                };
                self.events.lock().push(SessionEvent::LoadFailed(ticket.id));
                return Err(err);
            }
        };

        let navigation = self.initial_navigation(&ticket.id, &document);
        info!(
            document = %ticket.id,
            title = %document.info().title,
            tab = navigation.current_tab_id(),
            "document loaded"
        );
        self.active = Some(ActiveGame {
            id: ticket.id.clone(),
            document: Arc::new(document),
            navigation,
        });
        self.phase = LoadPhase::Ready;
        self.events
            .lock()
            .push(SessionEvent::DocumentLoaded(ticket.id));
        Ok(LoadOutcome::Applied)
    }

    /// Fetches and installs `id` in one step.
    #[instrument(skip(self, source))]
    pub async fn load_with<S: DocumentSource + ?Sized>(
        &mut self,
        source: &S,
        id: &str,
    ) -> Result<LoadOutcome, LoadError> {
        let ticket = self.begin_load(id);
        let result = fetch_document(source, id).await;
        self.complete_load(ticket, result)
    }

    fn initial_navigation(&self, id: &str, document: &GameDocument) -> NavigationState {
        if !self.restore_state {
            return NavigationState::new(document);
        }
        match self.store.load(id) {
            Ok(Some(snapshot)) => NavigationState::restore(document, &snapshot),
            Ok(None) => NavigationState::new(document),
            Err(err) => {
                warn!(?err, document = %id, "ignoring unreadable saved navigation");
                NavigationState::new(document)
            }
        }
    }

    /// Applies one navigation command. Returns whether the state changed.
    pub fn apply(&mut self, command: Command) -> bool {
        let Some(game) = self.active.as_mut() else {
            debug!(?command, "no document loaded; ignoring command");
            return false;
        };
        let document = Arc::clone(&game.document);
        let nav = &mut game.navigation;
        let tab_before = nav.current_tab_id().to_owned();

        let changed = match command {
            Command::Move { delta } => nav.move_by(&document, delta),
            Command::SwitchTab { tab_id } => nav.switch_tab(&document, &tab_id),
            Command::AdjacentTab { offset } => nav.adjacent_tab(&document, offset),
            Command::SelectTabAt { position } => nav.select_tab_at(&document, position),
            Command::GoTo { index } => match nav.go_to(&document, index) {
                Ok(changed) => changed,
                Err(err) => {
                    debug!(%err, "ignoring navigation request");
                    false
                }
            },
        };

        if changed {
            let event = if nav.current_tab_id() != tab_before {
                SessionEvent::TabChanged(nav.current_tab_id().to_owned())
            } else {
                SessionEvent::SelectionChanged(nav.current_index())
            };
            self.events.lock().push(event);
        }
        changed
    }

    /// The current frame, or `None` while no document is ready.
    pub fn view(&self) -> Option<ViewModel> {
        self.active
            .as_ref()
            .map(|game| project(&game.document, &game.navigation, &self.formatter))
    }

    pub fn persist(&self) -> anyhow::Result<()> {
        if let Some(game) = &self.active {
            self.store.save(&game.id, &game.navigation.snapshot())?;
        }
        Ok(())
    }
}

/// Fetches bytes from `source` and parses them into a validated document.
#[instrument(skip(source))]
pub async fn fetch_document<S: DocumentSource + ?Sized>(
    source: &S,
    id: &str,
) -> Result<GameDocument, LoadError> {
    let bytes = source.fetch(id).await?;
    debug!(document = %id, bytes = bytes.len(), "fetched document");
    GameDocument::from_slice(&bytes)
}
