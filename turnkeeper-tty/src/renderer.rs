use std::io::Write;

use anyhow::Result;
use crossterm::{
    cursor, queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use tracing::trace;
use turnkeeper_core::{Command, ItemRow, ViewModel};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::layout::{self, ScreenLayout};
use crate::wrap::{wrap_marked_up, wrap_plain, StyledLine, TextStyle};

const SEPARATOR: &str = "│";
const ELLIPSIS: &str = "...";

const HELP_LINES: &[&str] = &[
    "j / k, Down / Up    next / previous step",
    "h / l, Tab          previous / next tab",
    "t1 .. t9            jump to tab",
    "g / G               first / last step",
    "5j, 5G              repeat, go to step 5",
    "[ / ]               previous / next game",
    "r                   reload game",
    "?                   close this help",
    "q                   quit",
];

/// Draws a [`ViewModel`] as text panes with crossterm escape sequences.
pub struct TerminalRenderer<W: Write> {
    writer: W,
    layout: ScreenLayout,
    list_offset: usize,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(writer: W, columns: u16, rows: u16) -> Self {
        Self {
            writer,
            layout: ScreenLayout::new(columns, rows),
            list_offset: 0,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    pub fn list_offset(&self) -> usize {
        self.list_offset
    }

    pub fn resize(&mut self, columns: u16, rows: u16) {
        self.layout = ScreenLayout::new(columns, rows);
    }

    /// Forgets the list scroll position, used when another document or tab
    /// is shown.
    pub fn reset_scroll(&mut self) {
        self.list_offset = 0;
    }

    pub fn hit_test(&self, view: &ViewModel, column: u16, row: u16) -> Option<Command> {
        layout::hit_test(&self.layout, view, self.list_offset, column, row)
    }

    pub fn draw(&mut self, view: &ViewModel, status: &str) -> Result<()> {
        let list_height = usize::from(self.layout.list.height);
        let selected = view.selected_index().unwrap_or(0);
        self.list_offset =
            layout::scroll_offset(self.list_offset, selected, view.items.len(), list_height);
        trace!(offset = self.list_offset, selected, "drawing view");

        queue!(self.writer, Clear(ClearType::All))?;
        self.draw_tab_bar(view)?;
        self.draw_list(&view.items)?;
        self.draw_detail(view)?;
        self.draw_status(status)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Replaces the whole screen with a title and a wrapped message, for the
    /// loading and failure states.
    pub fn draw_message(&mut self, title: &str, message: &str, status: &str) -> Result<()> {
        let width = usize::from(self.layout.columns);
        queue!(
            self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0),
            SetAttribute(Attribute::Bold),
            Print(fit_to_width(title, width)),
            SetAttribute(Attribute::Reset)
        )?;
        let last_row = self.layout.status.y;
        for (row, line) in (2..last_row).zip(wrap_plain(message, width)) {
            queue!(self.writer, cursor::MoveTo(0, row))?;
            self.write_line(&line, width)?;
        }
        self.draw_status(status)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn draw_help(&mut self) -> Result<()> {
        let inner = HELP_LINES
            .iter()
            .map(|line| line.width())
            .max()
            .unwrap_or(0)
            + 2;
        let width = (inner + 2).min(usize::from(self.layout.columns));
        let height = (HELP_LINES.len() + 2).min(usize::from(self.layout.rows));
        let left = (usize::from(self.layout.columns) - width) / 2;
        let top = (usize::from(self.layout.rows) - height) / 2;
        let inner = width.saturating_sub(2);

        let border = "─".repeat(inner);
        let mut rows = Vec::with_capacity(height);
        rows.push(format!("┌{}┐", border));
        for line in HELP_LINES.iter().take(height.saturating_sub(2)) {
            rows.push(format!("│{}│", fit_to_width(&format!(" {}", line), inner)));
        }
        rows.push(format!("└{}┘", border));

        for (offset, text) in rows.iter().take(height).enumerate() {
            queue!(
                self.writer,
                cursor::MoveTo(to_u16(left), to_u16(top + offset)),
                Print(text)
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Ends a synchronized update; the terminal shows all buffered changes
    /// at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }

    fn draw_tab_bar(&mut self, view: &ViewModel) -> Result<()> {
        let bar = self.layout.tab_bar;
        for ((start, _), tab) in layout::tab_extents(&view.tabs).into_iter().zip(&view.tabs) {
            if start >= bar.width {
                break;
            }
            let room = usize::from(bar.width - start);
            let label = layout::tab_label(tab);
            let label = fit_to_width(&label, room.min(label.width()));
            queue!(self.writer, cursor::MoveTo(start, bar.y))?;
            if tab.active {
                queue!(
                    self.writer,
                    SetAttribute(Attribute::Reverse),
                    Print(label),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.writer, Print(label))?;
            }
        }
        Ok(())
    }

    fn draw_list(&mut self, items: &[ItemRow]) -> Result<()> {
        let area = self.layout.list;
        let width = usize::from(area.width);
        let visible = items
            .iter()
            .skip(self.list_offset)
            .take(usize::from(area.height));
        for (row, item) in (area.y..).zip(visible) {
            let text = format!("{}{}", "  ".repeat(item.depth), item.title);
            let text = fit_to_width(&text, width);
            queue!(self.writer, cursor::MoveTo(area.x, row))?;
            if item.selected {
                queue!(
                    self.writer,
                    SetAttribute(Attribute::Reverse),
                    Print(text),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.writer, Print(text))?;
            }
        }

        if self.layout.detail.width > 0 {
            for row in area.y..area.y + area.height {
                queue!(
                    self.writer,
                    cursor::MoveTo(area.x + area.width, row),
                    Print(SEPARATOR)
                )?;
            }
        }
        Ok(())
    }

    fn draw_detail(&mut self, view: &ViewModel) -> Result<()> {
        let area = self.layout.detail;
        if area.width == 0 || area.height == 0 {
            return Ok(());
        }
        let width = usize::from(area.width);
        // One column of padding from the separator.
        let text_width = width.saturating_sub(1).max(1);

        let Some(detail) = &view.detail else {
            queue!(
                self.writer,
                cursor::MoveTo(area.x + 1, area.y),
                SetAttribute(Attribute::Dim),
                Print(fit_to_width("No steps in this tab.", text_width)),
                SetAttribute(Attribute::Reset)
            )?;
            return Ok(());
        };

        let mut lines = wrap_plain(&detail.title, text_width);
        for line in &mut lines {
            for fragment in &mut line.fragments {
                fragment.style = TextStyle::Strong;
            }
        }
        lines.push(StyledLine::default());
        lines.extend(wrap_marked_up(&detail.body, text_width));

        for (row, line) in (area.y..area.y + area.height).zip(&lines) {
            queue!(self.writer, cursor::MoveTo(area.x + 1, row))?;
            self.write_line(line, text_width)?;
        }
        Ok(())
    }

    fn draw_status(&mut self, status: &str) -> Result<()> {
        let area = self.layout.status;
        queue!(
            self.writer,
            cursor::MoveTo(area.x, area.y),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(fit_to_width(status, usize::from(area.width))),
            SetAttribute(Attribute::Reset)
        )?;
        Ok(())
    }

    fn write_line(&mut self, line: &StyledLine, width: usize) -> Result<()> {
        let mut remaining = width;
        for fragment in &line.fragments {
            if remaining == 0 {
                break;
            }
            let text = clip(&fragment.text, remaining);
            remaining -= text.width();
            match attribute(fragment.style) {
                Some(attr) => queue!(
                    self.writer,
                    SetAttribute(attr),
                    Print(text),
                    SetAttribute(Attribute::Reset)
                )?,
                None => queue!(self.writer, Print(text))?,
            }
        }
        Ok(())
    }
}

fn attribute(style: TextStyle) -> Option<Attribute> {
    match style {
        TextStyle::Plain | TextStyle::Bullet => None,
        TextStyle::Emphasis => Some(Attribute::Italic),
        TextStyle::Strong => Some(Attribute::Bold),
        TextStyle::PageRef => Some(Attribute::Dim),
    }
}

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Longest prefix of `text` that fits in `width` columns.
fn clip(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (at, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            return &text[..at];
        }
        used += w;
    }
    text
}

/// Truncates with an ellipsis or pads with spaces to exactly `width` columns.
fn fit_to_width(text: &str, width: usize) -> String {
    let mut fitted = if text.width() > width {
        if width <= ELLIPSIS.len() {
            clip(text, width).to_owned()
        } else {
            let mut truncated = clip(text, width - ELLIPSIS.len()).to_owned();
            truncated.push_str(ELLIPSIS);
            truncated
        }
    } else {
        text.to_owned()
    };
    let used = fitted.width();
    if used < width {
        fitted.push_str(&" ".repeat(width - used));
    }
    fitted
}
