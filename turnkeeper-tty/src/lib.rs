use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use turnkeeper_core::Command;

pub mod layout;
pub mod renderer;
pub mod wrap;

pub use layout::{hit_test, scroll_offset, Rect, ScreenLayout};
pub use renderer::TerminalRenderer;
pub use wrap::{wrap_marked_up, wrap_plain, Fragment, StyledLine, TextStyle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Command(Command),
    /// A click at a screen cell; the caller resolves it against the layout.
    Pointer { column: u16, row: u16 },
    PreviousDocument,
    NextDocument,
    Reload,
    ToggleHelp,
    CloseOverlay,
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Help,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    char_stack: String,
    mode: InputMode,
}

impl EventMapper {
    /// Rows moved by PageUp/PageDown without a count.
    pub const PAGE_STEP: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.reset_char_stack();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Key(KeyEvent {
                kind: KeyEventKind::Release,
                ..
            }) => UiEvent::None,
            _ => match self.mode {
                InputMode::Normal => self.map_event_normal(event),
                InputMode::Help => self.map_event_help(event),
            },
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Char(c), _) if self.char_stack.as_str() == "t" => {
                    self.reset_char_stack();
                    self.reset_count();
                    match c.to_digit(10) {
                        Some(digit) if digit > 0 => UiEvent::Command(Command::SelectTabAt {
                            position: digit as usize - 1,
                        }),
                        _ => UiEvent::None,
                    }
                }
                (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                    if let Some(digit) = c.to_digit(10) {
                        self.push_digit(digit as usize);
                    }
                    UiEvent::None
                }
                (KeyCode::Char('t'), KeyModifiers::NONE) => {
                    self.reset_count();
                    self.push_char('t');
                    UiEvent::None
                }
                (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                    UiEvent::Quit
                }
                (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                    let count = self.take_count();
                    self.step(count as isize)
                }
                (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                    let count = self.take_count();
                    self.step(-(count as isize))
                }
                (KeyCode::PageDown, _) => {
                    let count = self.take_count_or(Self::PAGE_STEP);
                    self.step(count as isize)
                }
                (KeyCode::PageUp, _) => {
                    let count = self.take_count_or(Self::PAGE_STEP);
                    self.step(-(count as isize))
                }
                (KeyCode::Char('l'), KeyModifiers::NONE)
                | (KeyCode::Right, _)
                | (KeyCode::Tab, _) => {
                    let count = self.take_count();
                    self.reset_char_stack();
                    UiEvent::Command(Command::AdjacentTab {
                        offset: count as isize,
                    })
                }
                (KeyCode::Char('h'), KeyModifiers::NONE)
                | (KeyCode::Left, _)
                | (KeyCode::BackTab, _) => {
                    let count = self.take_count();
                    self.reset_char_stack();
                    UiEvent::Command(Command::AdjacentTab {
                        offset: -(count as isize),
                    })
                }
                (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                    self.reset_count();
                    self.step(isize::MIN)
                }
                (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
                    self.reset_char_stack();
                    // `5G` jumps to the fifth item, plain `G` to the last.
                    match self.pending_count.take().filter(|&count| count > 0) {
                        Some(count) => {
                            self.pending_digits.clear();
                            UiEvent::Command(Command::GoTo { index: count - 1 })
                        }
                        None => {
                            self.reset_count();
                            UiEvent::Command(Command::Move { delta: isize::MAX })
                        }
                    }
                }
                (KeyCode::Char('['), _) => {
                    self.reset_count();
                    UiEvent::PreviousDocument
                }
                (KeyCode::Char(']'), _) => {
                    self.reset_count();
                    UiEvent::NextDocument
                }
                (KeyCode::Char('r'), KeyModifiers::NONE) => {
                    self.reset_count();
                    UiEvent::Reload
                }
                (KeyCode::Char('?'), _) => {
                    self.reset_count();
                    UiEvent::ToggleHelp
                }
                (KeyCode::Char('q'), _) => {
                    self.reset_count();
                    UiEvent::Quit
                }
                _ => {
                    self.reset_count();
                    self.reset_char_stack();
                    UiEvent::None
                }
            },
            Event::Mouse(MouseEvent {
                kind, column, row, ..
            }) => match kind {
                MouseEventKind::Down(MouseButton::Left) => UiEvent::Pointer { column, row },
                MouseEventKind::ScrollDown => UiEvent::Command(Command::Move { delta: 1 }),
                MouseEventKind::ScrollUp => UiEvent::Command(Command::Move { delta: -1 }),
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_help(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) | (KeyCode::Char('?'), _) | (KeyCode::Enter, _) => {
                    UiEvent::CloseOverlay
                }
                (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                    UiEvent::Quit
                }
                (KeyCode::Char('q'), _) => UiEvent::Quit,
                _ => UiEvent::None,
            },
            Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(_),
                ..
            }) => UiEvent::CloseOverlay,
            _ => UiEvent::None,
        }
    }

    fn step(&mut self, delta: isize) -> UiEvent {
        self.reset_char_stack();
        UiEvent::Command(Command::Move { delta })
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        self.take_count_or(1)
    }

    fn take_count_or(&mut self, default: usize) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(default)
            .min(isize::MAX as usize);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    fn push_char(&mut self, char: char) {
        self.char_stack.push(char);
    }

    fn reset_char_stack(&mut self) {
        self.char_stack.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        let mut pending = String::new();
        pending.push_str(&self.pending_digits);
        pending.push_str(&self.char_stack);
        if pending.is_empty() {
            None
        } else {
            Some(pending)
        }
    }
}
