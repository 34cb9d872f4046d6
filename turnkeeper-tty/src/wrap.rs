//! Word wrapping for formatted rule text.
//!
//! Works on styled fragments rather than plain strings so a word like
//! `Zone.` keeps its emphasised stem and plain full stop on the same line.

use turnkeeper_core::{Block, Inline, InlineStyle, MarkedUpText};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const BULLET_PREFIX: &str = "• ";
const CONTINUATION_PREFIX: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Plain,
    Emphasis,
    Strong,
    PageRef,
    Bullet,
}

impl From<InlineStyle> for TextStyle {
    fn from(style: InlineStyle) -> Self {
        match style {
            InlineStyle::Plain => TextStyle::Plain,
            InlineStyle::Emphasis => TextStyle::Emphasis,
            InlineStyle::Strong => TextStyle::Strong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub style: TextStyle,
    pub text: String,
}

impl Fragment {
    fn new(style: TextStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    pub fragments: Vec<Fragment>,
}

impl StyledLine {
    pub fn width(&self) -> usize {
        self.fragments
            .iter()
            .map(|fragment| fragment.text.width())
            .sum()
    }

    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect()
    }

    fn push(&mut self, style: TextStyle, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.fragments.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.fragments.push(Fragment::new(style, text)),
        }
    }
}

/// Lays out a formatted body into lines at most `width` columns wide, with a
/// blank line between blocks.
pub fn wrap_marked_up(body: &MarkedUpText, width: usize) -> Vec<StyledLine> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for (n, block) in body.blocks.iter().enumerate() {
        if n > 0 {
            lines.push(StyledLine::default());
        }
        match block {
            Block::Paragraph { content } => lines.extend(wrap_inline(content, width, "", "")),
            Block::List { items } => {
                for item in items {
                    lines.extend(wrap_inline(
                        &item.content,
                        width,
                        BULLET_PREFIX,
                        CONTINUATION_PREFIX,
                    ));
                }
            }
            Block::PageRef { text } => {
                let reference = [Inline::PlainText(format!("({})", text))];
                for mut line in wrap_inline(&reference, width, "", "") {
                    for fragment in &mut line.fragments {
                        fragment.style = TextStyle::PageRef;
                    }
                    lines.push(line);
                }
            }
        }
    }
    lines
}

/// Wraps a plain string, used for titles and status text.
pub fn wrap_plain(text: &str, width: usize) -> Vec<StyledLine> {
    wrap_inline(&[Inline::PlainText(text.to_owned())], width.max(1), "", "")
}

type Word = Vec<(TextStyle, String)>;

fn words(content: &[Inline]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Word = Vec::new();
    for run in content {
        let style = TextStyle::from(run.style());
        let mut piece = String::new();
        for c in run.text().chars() {
            if c.is_whitespace() {
                if !piece.is_empty() {
                    current.push((style, std::mem::take(&mut piece)));
                }
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            } else {
                piece.push(c);
            }
        }
        if !piece.is_empty() {
            current.push((style, piece));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn word_width(word: &Word) -> usize {
    word.iter().map(|(_, text)| text.width()).sum()
}

fn wrap_inline(content: &[Inline], width: usize, first: &str, rest: &str) -> Vec<StyledLine> {
    let mut lines = Vec::new();
    let mut line = new_line(first);
    let mut line_width = first.width();
    let mut has_words = false;

    for word in words(content) {
        let needed = word_width(&word);
        let gap = usize::from(has_words);
        if has_words && line_width + gap + needed > width {
            lines.push(std::mem::replace(&mut line, new_line(rest)));
            line_width = rest.width();
            has_words = false;
        }

        if has_words {
            line.push(TextStyle::Plain, " ");
            line_width += 1;
        }

        if line_width + needed <= width {
            for (style, text) in &word {
                line.push(*style, text);
            }
            line_width += needed;
            has_words = true;
            continue;
        }

        // Longer than a whole line: hard-break at character boundaries.
        for (style, text) in &word {
            for c in text.chars() {
                let w = c.width().unwrap_or(0);
                if line_width + w > width && line_width > rest.width() {
                    lines.push(std::mem::replace(&mut line, new_line(rest)));
                    line_width = rest.width();
                }
                let mut buf = [0u8; 4];
                line.push(*style, c.encode_utf8(&mut buf));
                line_width += w;
            }
        }
        has_words = true;
    }

    if has_words || lines.is_empty() {
        lines.push(line);
    }
    lines
}

fn new_line(prefix: &str) -> StyledLine {
    let mut line = StyledLine::default();
    line.push(TextStyle::Bullet, prefix);
    line
}
