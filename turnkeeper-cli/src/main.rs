use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use directories::ProjectDirs;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};
use turnkeeper_core::{
    fetch_document, Command, DocumentSource, FileStateStore, GameDocument, LoadError,
    LoadOutcome, LoadPhase, LoadTicket, NullStateStore, Session, SessionEvent, StateStore,
};
use turnkeeper_source::DirectorySource;
use turnkeeper_tty::{EventMapper, InputMode, TerminalRenderer, UiEvent};

mod config;

use config::Config;

type LoadResult = (LoadTicket, Result<GameDocument, LoadError>);

#[derive(Debug, Parser)]
#[command(
    name = "turnkeeper",
    version,
    about = "Step-by-step turn guide for tabletop game rules"
)]
struct Args {
    /// Game documents to open, as ids in the library or paths; `[` and `]`
    /// switch between them
    #[arg(required = true)]
    documents: Vec<String>,

    /// Directory that document ids resolve against
    #[arg(short = 'L', long = "library")]
    library: Option<PathBuf>,

    /// Tab to show first, by id
    #[arg(short = 't', long = "tab")]
    tab: Option<String>,

    /// Ignore saved positions and start at the first step
    #[arg(long)]
    fresh: bool,

    /// Print the first screen of each document as JSON and exit
    #[arg(long)]
    dump: bool,

    /// Config file to use instead of the default location
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(
            stdout,
            DisableMouseCapture,
            LeaveAlternateScreen,
            cursor::Show
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("org", "turnkeeper", "turnkeeper")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_path(&project_dirs));
    let config = Config::load(&config_path)?;
    let _log_guard = init_logging(&project_dirs, &config.log_filter)?;

    let library = match args.library.clone().or_else(|| config.library_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };
    let source: Arc<dyn DocumentSource> = Arc::new(DirectorySource::new(library)?);

    // A dump always shows the first screen and leaves saved positions alone.
    let store: Arc<dyn StateStore> = if args.dump {
        Arc::new(NullStateStore)
    } else {
        let state_dir = project_dirs.data_local_dir().join("state");
        Arc::new(FileStateStore::new(state_dir)?)
    };
    let session = Session::new(store)
        .with_cache_capacity(config.format_cache_capacity)
        .with_restore_state(config.restore_state && !args.fresh);

    if args.dump {
        return dump(session, source.as_ref(), &args).await;
    }
    run(session, source, args)
}

/// Loads each document in turn and prints its projected view.
async fn dump(mut session: Session, source: &dyn DocumentSource, args: &Args) -> Result<()> {
    let mut views = Vec::with_capacity(args.documents.len());
    for id in &args.documents {
        session
            .load_with(source, id)
            .await
            .with_context(|| format!("failed to open {}", id))?;
        if let Some(tab) = &args.tab {
            session.apply(Command::SwitchTab {
                tab_id: tab.clone(),
            });
        }
        let view = session
            .view()
            .ok_or_else(|| anyhow!("{} loaded without a view", id))?;
        views.push(view);
    }
    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}

fn run(session: Session, source: Arc<dyn DocumentSource>, args: Args) -> Result<()> {
    let (loads, mut completed) = unbounded_channel::<LoadResult>();
    let mut app = App {
        session,
        source,
        documents: args.documents,
        current: 0,
        initial_tab: args.tab,
        loads,
    };
    app.start_load();

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
    let (columns, rows) = terminal::size()?;
    let mut renderer = TerminalRenderer::new(stdout, columns, rows);
    let mut event_mapper = EventMapper::new();
    let mut help = false;
    let mut dirty = true;

    loop {
        while let Ok((ticket, result)) = completed.try_recv() {
            app.finish_load(ticket, result);
            dirty = true;
        }
        if reset_for_events(&app.session) {
            renderer.reset_scroll();
        }

        let mode = if help {
            InputMode::Help
        } else {
            InputMode::Normal
        };
        if event_mapper.mode() != mode {
            event_mapper.set_mode(mode);
        }

        if dirty {
            let pending = event_mapper.pending_input();
            redraw(&mut renderer, &app, pending.as_deref(), help)?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let before = event_mapper.pending_input();
            let ui_event = event_mapper.map_event(event::read()?);
            match handle_event(ui_event, &mut app, &mut renderer, &mut help) {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
            if event_mapper.pending_input() != before {
                dirty = true;
            }
        }
    }

    renderer.clear_all()?;
    app.session
        .persist()
        .context("failed to save navigation state")?;
    Ok(())
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

struct App {
    session: Session,
    source: Arc<dyn DocumentSource>,
    documents: Vec<String>,
    current: usize,
    /// Applied once, to the first document that loads.
    initial_tab: Option<String>,
    loads: UnboundedSender<LoadResult>,
}

impl App {
    fn current_id(&self) -> &str {
        &self.documents[self.current]
    }

    /// Fetches the current document off the UI thread. A load started later
    /// supersedes this one.
    fn start_load(&mut self) {
        let id = self.current_id().to_owned();
        let ticket = self.session.begin_load(id);
        let source = Arc::clone(&self.source);
        let loads = self.loads.clone();
        tokio::spawn(async move {
            let result = fetch_document(source.as_ref(), ticket.document_id()).await;
            let _ = loads.send((ticket, result));
        });
    }

    fn finish_load(&mut self, ticket: LoadTicket, result: Result<GameDocument, LoadError>) {
        match self.session.complete_load(ticket, result) {
            Ok(LoadOutcome::Applied) => {
                if let Some(tab_id) = self.initial_tab.take() {
                    let known = self
                        .session
                        .active()
                        .is_some_and(|game| game.document.tab(&tab_id).is_some());
                    if known {
                        self.session.apply(Command::SwitchTab { tab_id });
                    } else {
                        warn!(tab = %tab_id, "requested tab not found");
                    }
                }
            }
            // Failures are logged and kept in the session phase.
            Ok(LoadOutcome::Discarded) | Err(_) => {}
        }
    }

    fn cycle(&mut self, offset: isize) -> bool {
        let next = cycle_index(self.current, self.documents.len(), offset);
        if next == self.current {
            return false;
        }
        self.current = next;
        info!(document = %self.current_id(), "switching document");
        self.start_load();
        true
    }
}

fn cycle_index(current: usize, len: usize, offset: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as isize;
    (current as isize + offset).rem_euclid(len) as usize
}

/// Whether a tab or document change since the last check should reset the
/// list scroll position.
fn reset_for_events(session: &Session) -> bool {
    session.drain_events().iter().any(|event| {
        matches!(
            event,
            SessionEvent::DocumentLoaded(_) | SessionEvent::TabChanged(_)
        )
    })
}

fn handle_event(
    ui_event: UiEvent,
    app: &mut App,
    renderer: &mut TerminalRenderer<io::Stdout>,
    help: &mut bool,
) -> LoopAction {
    match ui_event {
        UiEvent::Command(command) => redraw_if(app.session.apply(command)),
        UiEvent::Pointer { column, row } => {
            let command = app
                .session
                .view()
                .and_then(|view| renderer.hit_test(&view, column, row));
            match command {
                Some(command) => redraw_if(app.session.apply(command)),
                None => LoopAction::Continue,
            }
        }
        UiEvent::PreviousDocument => redraw_if(app.cycle(-1)),
        UiEvent::NextDocument => redraw_if(app.cycle(1)),
        UiEvent::Reload => {
            app.start_load();
            LoopAction::ContinueRedraw
        }
        UiEvent::ToggleHelp => {
            *help = !*help;
            LoopAction::ContinueRedraw
        }
        UiEvent::CloseOverlay => {
            *help = false;
            LoopAction::ContinueRedraw
        }
        UiEvent::Resize { columns, rows } => {
            renderer.resize(columns, rows);
            LoopAction::ContinueRedraw
        }
        UiEvent::Quit => LoopAction::Quit,
        UiEvent::None => LoopAction::Continue,
    }
}

fn redraw_if(changed: bool) -> LoopAction {
    if changed {
        LoopAction::ContinueRedraw
    } else {
        LoopAction::Continue
    }
}

fn redraw(
    renderer: &mut TerminalRenderer<io::Stdout>,
    app: &App,
    pending: Option<&str>,
    help: bool,
) -> Result<()> {
    let status = combine_status(document_status(app), pending).unwrap_or_default();
    renderer.begin_sync_update()?;
    match app.session.view() {
        Some(view) => renderer.draw(&view, &status)?,
        None => match app.session.phase() {
            LoadPhase::Loading { id } => {
                renderer.draw_message("Loading", &format!("Opening {}", id), &status)?
            }
            LoadPhase::Failed { id, message } => renderer.draw_message(
                &format!("Could not open {}", id),
                &format!("{} (r retries, q quits)", message),
                &status,
            )?,
            LoadPhase::Idle | LoadPhase::Ready => {
                renderer.draw_message("turnkeeper", "No game loaded.", &status)?
            }
        },
    }
    if help {
        renderer.draw_help()?;
    }
    renderer.end_sync_update()
}

fn document_status(app: &App) -> Option<String> {
    let view = app.session.view()?;
    let mut status = view.title.clone();
    if let Some(tab) = view.active_tab() {
        status.push_str(" | ");
        status.push_str(&tab.name);
    }
    if let Some(index) = view.selected_index() {
        status.push_str(&format!(" {}/{}", index + 1, view.items.len()));
    }
    if app.documents.len() > 1 {
        status.push_str(&format!(
            " | game {}/{}",
            app.current + 1,
            app.documents.len()
        ));
    }
    Some(status)
}

fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

fn init_logging(project_dirs: &ProjectDirs, default_filter: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "turnkeeper.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // File only: console output would tear through the full-screen view.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
