use turnkeeper_core::{Command, TabHeader, ViewModel};
use unicode_width::UnicodeWidthStr;

const MIN_LIST_WIDTH: u16 = 16;
const MAX_LIST_WIDTH: u16 = 40;
const TAB_GAP: u16 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn contains(&self, column: u16, row: u16) -> bool {
        column >= self.x
            && row >= self.y
            && u32::from(column) < u32::from(self.x) + u32::from(self.width)
            && u32::from(row) < u32::from(self.y) + u32::from(self.height)
    }
}

/// Screen areas: tab bar on top, item list on the left, detail on the right,
/// status line at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub columns: u16,
    pub rows: u16,
    pub tab_bar: Rect,
    pub list: Rect,
    pub detail: Rect,
    pub status: Rect,
}

impl ScreenLayout {
    pub fn new(columns: u16, rows: u16) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(3);
        let body_height = rows - 2;

        let list_width = (columns / 3)
            .clamp(MIN_LIST_WIDTH, MAX_LIST_WIDTH)
            .min(columns);
        // One column separates the panes.
        let detail_x = list_width.saturating_add(1).min(columns);

        Self {
            columns,
            rows,
            tab_bar: Rect {
                x: 0,
                y: 0,
                width: columns,
                height: 1,
            },
            list: Rect {
                x: 0,
                y: 1,
                width: list_width,
                height: body_height,
            },
            detail: Rect {
                x: detail_x,
                y: 1,
                width: columns - detail_x,
                height: body_height,
            },
            status: Rect {
                x: 0,
                y: rows - 1,
                width: columns,
                height: 1,
            },
        }
    }
}

pub fn tab_label(tab: &TabHeader) -> String {
    format!(" {} ", tab.name)
}

/// Start column and width of every tab label on the tab bar.
pub fn tab_extents(tabs: &[TabHeader]) -> Vec<(u16, u16)> {
    let mut extents = Vec::with_capacity(tabs.len());
    let mut column: u16 = 0;
    for tab in tabs {
        let width = u16::try_from(tab_label(tab).width()).unwrap_or(u16::MAX);
        extents.push((column, width));
        column = column.saturating_add(width).saturating_add(TAB_GAP);
    }
    extents
}

/// First visible list row so that `selected` stays on screen, scrolling as
/// little as possible from `previous`.
pub fn scroll_offset(previous: usize, selected: usize, len: usize, height: usize) -> usize {
    if height == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(height);
    let mut offset = previous.min(max_offset);
    if selected < offset {
        offset = selected;
    } else if selected >= offset + height {
        offset = selected + 1 - height;
    }
    offset.min(max_offset)
}

/// Resolves a click to the command it stands for: a tab label switches tabs,
/// a list row selects that item.
pub fn hit_test(
    layout: &ScreenLayout,
    view: &ViewModel,
    list_offset: usize,
    column: u16,
    row: u16,
) -> Option<Command> {
    if layout.tab_bar.contains(column, row) {
        return tab_extents(&view.tabs)
            .into_iter()
            .zip(&view.tabs)
            .find(|((start, width), _)| column >= *start && column < start.saturating_add(*width))
            .map(|(_, tab)| Command::SwitchTab {
                tab_id: tab.id.clone(),
            });
    }
    if layout.list.contains(column, row) {
        let index = list_offset + usize::from(row - layout.list.y);
        if index < view.items.len() {
            return Some(Command::GoTo { index });
        }
    }
    None
}
