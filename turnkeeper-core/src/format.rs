//! Rule text formatting.
//!
//! [`format`] turns a step's raw `detail` string into a [`MarkedUpText`]
//! tree: an optional intro paragraph, a list of sentences or bullet items,
//! and a trailing page reference. Markup passes only ever scan plain text, so
//! a later pass never matches inside a span produced by an earlier one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tracing::trace;
use uuid::Uuid;

use crate::rules::{CompiledRules, InlineStyle, MarkupPass, PassAction};

static PAGE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*?(\bpp?\.[^)]+)\)").expect("valid page reference pattern"));

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(/?)(em|i|strong|b)(?:\s[^>]*)?>").expect("valid inline tag pattern")
});

const BULLET: char = '•';

/// Bodies with at least this many sentences are rendered as a list, so two
/// sentences already give a two-item list.
const MIN_LIST_SENTENCES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "camelCase")]
pub enum Inline {
    PlainText(String),
    Emphasis(String),
    Strong(String),
}

impl Inline {
    pub fn text(&self) -> &str {
        match self {
            Inline::PlainText(text) | Inline::Emphasis(text) | Inline::Strong(text) => text,
        }
    }

    pub fn style(&self) -> InlineStyle {
        match self {
            Inline::PlainText(_) => InlineStyle::Plain,
            Inline::Emphasis(_) => InlineStyle::Emphasis,
            Inline::Strong(_) => InlineStyle::Strong,
        }
    }

    fn new(style: InlineStyle, text: String) -> Self {
        match style {
            InlineStyle::Plain => Inline::PlainText(text),
            InlineStyle::Emphasis => Inline::Emphasis(text),
            InlineStyle::Strong => Inline::Strong(text),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub content: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph { content: Vec<Inline> },
    List { items: Vec<ListItem> },
    PageRef { text: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkedUpText {
    pub blocks: Vec<Block>,
}

impl MarkedUpText {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn page_ref(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::PageRef { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// The text content with all markup dropped, blocks separated by newlines.
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph { content } => lines.push(join_inline(content)),
                Block::List { items } => {
                    lines.extend(items.iter().map(|item| join_inline(&item.content)))
                }
                Block::PageRef { text } => lines.push(format!("({})", text)),
            }
        }
        lines.join("\n")
    }
}

fn join_inline(content: &[Inline]) -> String {
    content.iter().map(Inline::text).collect()
}

/// Formats raw rule text. Pure and deterministic.
pub fn format(raw: &str, rules: &CompiledRules) -> MarkedUpText {
    let text = raw.trim();
    if text.is_empty() {
        return MarkedUpText::default();
    }

    let (body, page_ref) = extract_page_ref(text);
    let mut blocks = Vec::new();

    if body.contains(BULLET) {
        let mut segments = body.split(BULLET);
        let intro = segments.next().unwrap_or_default().trim();
        if !intro.is_empty() {
            blocks.push(Block::Paragraph {
                content: apply_markup(intro, rules),
            });
        }
        let items: Vec<ListItem> = segments
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| ListItem {
                content: apply_markup(segment, rules),
            })
            .collect();
        if !items.is_empty() {
            blocks.push(Block::List { items });
        }
    } else if !body.is_empty() {
        let content = apply_markup(&body, rules);
        let mut sentences = split_sentences(&content);
        if sentences.len() < MIN_LIST_SENTENCES {
            blocks.push(Block::Paragraph {
                content: sentences.pop().unwrap_or(content),
            });
        } else {
            blocks.push(Block::List {
                items: sentences
                    .into_iter()
                    .map(|content| ListItem { content })
                    .collect(),
            });
        }
    }

    if let Some(text) = page_ref {
        blocks.push(Block::PageRef { text });
    }

    MarkedUpText { blocks }
}

/// Splits off the first parenthesised page reference. The returned body has
/// the whole parenthesised fragment removed; the reference keeps only the
/// `p. …` part.
fn extract_page_ref(text: &str) -> (String, Option<String>) {
    let Some(captures) = PAGE_REFERENCE.captures(text) else {
        return (text.to_owned(), None);
    };
    let (Some(whole), Some(reference)) = (captures.get(0), captures.get(1)) else {
        return (text.to_owned(), None);
    };

    let before = text[..whole.start()].trim_end();
    let after = text[whole.end()..].trim_start();
    let body = match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_owned(),
        (_, true) => before.to_owned(),
        _ => format!("{} {}", before, after),
    };
    (body, Some(reference.as_str().trim().to_owned()))
}

/// Runs every markup pass, in order, over the plain parts of `text`.
fn apply_markup(text: &str, rules: &CompiledRules) -> Vec<Inline> {
    let mut runs = vec![Inline::PlainText(text.to_owned())];
    for pass in rules.passes() {
        runs = apply_pass(runs, pass);
    }
    normalize(runs)
}

/// A match lying wholly inside one plain run. Offsets are relative to that
/// run.
struct PlainMatch {
    run: usize,
    start: usize,
    end: usize,
    replacement: Vec<Inline>,
}

/// Applies one pass to the plain runs. Matching runs over the whole text,
/// so `^`, `$` and `\b` see the real neighbours and a non-global rule
/// replaces only the first match in the text. Matches that reach into a
/// styled run are skipped.
fn apply_pass(runs: Vec<Inline>, pass: &MarkupPass) -> Vec<Inline> {
    let joined: String = runs.iter().map(Inline::text).collect();
    let mut spans = Vec::with_capacity(runs.len());
    let mut at = 0;
    for run in &runs {
        spans.push((at, at + run.text().len()));
        at += run.text().len();
    }

    let global = match &pass.action {
        PassAction::Wrap(_) => true,
        PassAction::Replace { global, .. } => *global,
    };

    let mut matches = Vec::new();
    for captures in pass.regex.captures_iter(&joined) {
        let Some(found) = captures.get(0) else {
            continue;
        };
        let owner = spans.iter().zip(&runs).position(|(&(start, end), run)| {
            matches!(run, Inline::PlainText(_)) && start <= found.start() && found.end() <= end
        });
        let Some(run) = owner else {
            continue;
        };
        let replacement = match &pass.action {
            PassAction::Wrap(style) => {
                if found.as_str().is_empty() {
                    continue;
                }
                vec![Inline::new(*style, found.as_str().to_owned())]
            }
            PassAction::Replace { template, .. } => {
                let mut expanded = String::new();
                captures.expand(template, &mut expanded);
                parse_inline_tags(&expanded)
            }
        };
        matches.push(PlainMatch {
            run,
            start: found.start() - spans[run].0,
            end: found.end() - spans[run].0,
            replacement,
        });
        if !global {
            break;
        }
    }
    if matches.is_empty() {
        return runs;
    }

    let mut out = Vec::with_capacity(runs.len() + matches.len() * 2);
    let mut pending = matches.into_iter().peekable();
    for (index, run) in runs.into_iter().enumerate() {
        let touched = pending.peek().is_some_and(|found| found.run == index);
        let text = match run {
            Inline::PlainText(text) if touched => text,
            other => {
                out.push(other);
                continue;
            }
        };
        let mut last = 0;
        while let Some(found) = pending.next_if(|found| found.run == index) {
            if found.start > last {
                out.push(Inline::PlainText(text[last..found.start].to_owned()));
            }
            out.extend(found.replacement);
            last = found.end;
        }
        if last < text.len() {
            out.push(Inline::PlainText(text[last..].to_owned()));
        }
    }
    out
}

/// Reads `<em>`/`<i>` and `<strong>`/`<b>` tags emitted by custom rule
/// replacements. Strong wins when both are open. Other tags stay as text.
fn parse_inline_tags(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut emphasis = 0usize;
    let mut strong = 0usize;
    let mut last = 0;

    let current = |emphasis: usize, strong: usize| {
        if strong > 0 {
            InlineStyle::Strong
        } else if emphasis > 0 {
            InlineStyle::Emphasis
        } else {
            InlineStyle::Plain
        }
    };

    for captures in INLINE_TAG.captures_iter(text) {
        let Some(tag) = captures.get(0) else {
            continue;
        };
        if tag.start() > last {
            out.push(Inline::new(
                current(emphasis, strong),
                text[last..tag.start()].to_owned(),
            ));
        }
        last = tag.end();

        let closing = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = captures
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let counter = match name.as_str() {
            "strong" | "b" => &mut strong,
            _ => &mut emphasis,
        };
        if closing {
            *counter = counter.saturating_sub(1);
        } else {
            *counter += 1;
        }
    }
    if last < text.len() {
        out.push(Inline::new(
            current(emphasis, strong),
            text[last..].to_owned(),
        ));
    }
    out
}

/// Drops empty runs and merges neighbours that share a style.
fn normalize(runs: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text().is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(prev) if prev.style() == run.style() => {
                let merged = format!("{}{}", prev.text(), run.text());
                *prev = Inline::new(run.style(), merged);
            }
            _ => out.push(run),
        }
    }
    out
}

/// Sentence boundary: `.`, `!` or `?`, then whitespace, then an ASCII
/// uppercase letter. The whitespace is dropped; styles are carried across.
fn split_sentences(content: &[Inline]) -> Vec<Vec<Inline>> {
    let chars: Vec<(char, InlineStyle)> = content
        .iter()
        .flat_map(|run| run.text().chars().map(move |c| (c, run.style())))
        .collect();

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i].0, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].0.is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j].0.is_ascii_uppercase() {
                sentences.push(collect_runs(&chars[start..=i]));
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    if start < chars.len() {
        sentences.push(collect_runs(&chars[start..]));
    }
    sentences.retain(|sentence| !sentence.is_empty());
    sentences
}

fn collect_runs(chars: &[(char, InlineStyle)]) -> Vec<Inline> {
    let mut runs: Vec<Inline> = Vec::new();
    let mut text = String::new();
    let mut style = None;
    for &(c, s) in chars {
        if style != Some(s) {
            if let Some(prev) = style {
                runs.push(Inline::new(prev, std::mem::take(&mut text)));
            }
            style = Some(s);
        }
        text.push(c);
    }
    if let Some(prev) = style {
        runs.push(Inline::new(prev, text));
    }
    trim_runs(runs)
}

fn trim_runs(mut runs: Vec<Inline>) -> Vec<Inline> {
    if let Some(first) = runs.first_mut() {
        *first = Inline::new(first.style(), first.text().trim_start().to_owned());
    }
    if let Some(last) = runs.last_mut() {
        *last = Inline::new(last.style(), last.text().trim_end().to_owned());
    }
    runs.retain(|run| !run.text().is_empty());
    runs
}

const DEFAULT_CACHE_CAPACITY: usize = 64;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    rules: Uuid,
    text: String,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Arc<MarkedUpText>>,
    order: VecDeque<CacheKey>,
}

/// Memoises [`format`] per `(rule set, raw text)`, evicting the oldest entry
/// once `capacity` is exceeded.
pub struct FormatCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl FormatCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self, raw: &str, rules: &CompiledRules) -> Arc<MarkedUpText> {
        let key = CacheKey {
            rules: rules.id(),
            text: raw.to_owned(),
        };
        if let Some(hit) = self.inner.lock().entries.get(&key) {
            return Arc::clone(hit);
        }

        let formatted = Arc::new(format(raw, rules));
        if self.capacity == 0 {
            return formatted;
        }

        let mut inner = self.inner.lock();
        if inner
            .entries
            .insert(key.clone(), Arc::clone(&formatted))
            .is_none()
        {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                trace!(capacity = self.capacity, "evicted formatted text");
            }
        }
        formatted
    }
}

impl Default for FormatCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CustomRule, FormattingRules};

    fn compile(rules: FormattingRules) -> CompiledRules {
        CompiledRules::compile(&rules).unwrap()
    }

    fn plain(text: &str) -> Inline {
        Inline::PlainText(text.to_string())
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(format("", &CompiledRules::empty()).is_empty());
        assert!(format("   \n ", &CompiledRules::empty()).is_empty());
    }

    #[test]
    fn two_sentences_with_page_reference() {
        let out = format(
            "Draw a card. Then discard a card. (Rulebook p. 12)",
            &CompiledRules::empty(),
        );
        assert_eq!(
            out.blocks,
            vec![
                Block::List {
                    items: vec![
                        ListItem {
                            content: vec![plain("Draw a card.")]
                        },
                        ListItem {
                            content: vec![plain("Then discard a card.")]
                        },
                    ]
                },
                Block::PageRef {
                    text: "p. 12".into()
                },
            ]
        );
        assert_eq!(out.page_ref(), Some("p. 12"));
    }

    #[test]
    fn bullets_become_intro_and_items() {
        let out = format("Choose one: • Draw • Discard (p. 5)", &CompiledRules::empty());
        assert_eq!(
            out.blocks,
            vec![
                Block::Paragraph {
                    content: vec![plain("Choose one:")]
                },
                Block::List {
                    items: vec![
                        ListItem {
                            content: vec![plain("Draw")]
                        },
                        ListItem {
                            content: vec![plain("Discard")]
                        },
                    ]
                },
                Block::PageRef {
                    text: "p. 5".into()
                },
            ]
        );
    }

    #[test]
    fn bullets_without_intro_skip_the_paragraph() {
        let out = format("• Move • • Attack", &CompiledRules::empty());
        assert_eq!(out.blocks.len(), 1);
        match &out.blocks[0] {
            Block::List { items } => assert_eq!(items.len(), 2),
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[test]
    fn game_term_is_emphasised() {
        let rules = compile(FormattingRules {
            game_terms: vec!["Zone".into()],
            ..FormattingRules::default()
        });
        let out = format("Enter the Zone now.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![
                    plain("Enter the "),
                    Inline::Emphasis("Zone".into()),
                    plain(" now."),
                ]
            }]
        );
    }

    #[test]
    fn game_terms_respect_word_boundaries_and_case() {
        let rules = compile(FormattingRules {
            game_terms: vec!["Zone".into()],
            ..FormattingRules::default()
        });
        let out = format("Ozone zone Zones.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![plain("Ozone zone Zones.")]
            }]
        );
    }

    #[test]
    fn action_words_are_case_insensitive() {
        let rules = compile(FormattingRules {
            action_words: vec!["discard".into()],
            ..FormattingRules::default()
        });
        let out = format("Discard two cards.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![Inline::Strong("Discard".into()), plain(" two cards.")]
            }]
        );
    }

    #[test]
    fn earlier_pass_claims_text_first() {
        let rules = compile(FormattingRules {
            game_terms: vec!["Raid".into()],
            action_words: vec!["raid".into()],
            ..FormattingRules::default()
        });
        let out = format("Raid the port.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![Inline::Emphasis("Raid".into()), plain(" the port.")]
            }]
        );
    }

    #[test]
    fn later_passes_never_match_inside_earlier_spans() {
        let rules = compile(FormattingRules {
            game_terms: vec!["Strong Hold".into()],
            custom_rules: vec![CustomRule {
                pattern: "Hold".into(),
                replacement: "<em>Hold</em>".into(),
                flags: "g".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("Capture the Strong Hold. Hold fast.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::List {
                items: vec![
                    ListItem {
                        content: vec![
                            plain("Capture the "),
                            Inline::Emphasis("Strong Hold".into()),
                            plain("."),
                        ]
                    },
                    ListItem {
                        content: vec![Inline::Emphasis("Hold".into()), plain(" fast.")]
                    },
                ]
            }]
        );
    }

    #[test]
    fn measurements_are_strong() {
        let rules = compile(FormattingRules {
            measurements: vec![r"\d+ spaces?".into()],
            ..FormattingRules::default()
        });
        let out = format("Move up to 3 spaces.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![
                    plain("Move up to "),
                    Inline::Strong("3 spaces".into()),
                    plain("."),
                ]
            }]
        );
    }

    #[test]
    fn custom_rule_respects_global_and_case_flags() {
        let first_only = compile(FormattingRules {
            custom_rules: vec![CustomRule {
                pattern: "vp".into(),
                replacement: "<b>VP</b>".into(),
                flags: "i".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("Gain 1 VP and 2 vp.", &first_only);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![
                    plain("Gain 1 "),
                    Inline::Strong("VP".into()),
                    plain(" and 2 vp."),
                ]
            }]
        );

        let case_sensitive = compile(FormattingRules {
            custom_rules: vec![CustomRule {
                pattern: "vp".into(),
                replacement: "<b>VP</b>".into(),
                flags: "g".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("Gain 1 VP and 2 vp.", &case_sensitive);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![plain("Gain 1 VP and 2 "), Inline::Strong("VP".into()), plain(".")]
            }]
        );
    }

    #[test]
    fn custom_rule_capture_groups() {
        let rules = compile(FormattingRules {
            custom_rules: vec![CustomRule {
                pattern: r"\[(\w+)\]".into(),
                replacement: "<em>$1</em>".into(),
                flags: "g".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("Spend [gold].", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![plain("Spend "), Inline::Emphasis("gold".into()), plain(".")]
            }]
        );
    }

    #[test]
    fn non_global_rule_replaces_first_match_across_styled_spans() {
        let rules = compile(FormattingRules {
            game_terms: vec!["Zone".into()],
            custom_rules: vec![CustomRule {
                pattern: "vp".into(),
                replacement: "<b>VP</b>".into(),
                flags: "".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("Gain vp in the Zone and vp.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![
                    plain("Gain "),
                    Inline::Strong("VP".into()),
                    plain(" in the "),
                    Inline::Emphasis("Zone".into()),
                    plain(" and vp."),
                ]
            }]
        );
    }

    #[test]
    fn anchored_rule_only_matches_at_start_of_text() {
        let rules = compile(FormattingRules {
            measurements: vec![r"\d+".into()],
            custom_rules: vec![CustomRule {
                pattern: "^x".into(),
                replacement: "X".into(),
                flags: "g".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("3x and 4x", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![
                    Inline::Strong("3".into()),
                    plain("x and "),
                    Inline::Strong("4".into()),
                    plain("x"),
                ]
            }]
        );

        let out = format("x and 4x", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![plain("X and "), Inline::Strong("4".into()), plain("x")]
            }]
        );
    }

    #[test]
    fn dollar_text_in_replacement_is_kept() {
        let rules = compile(FormattingRules {
            custom_rules: vec![CustomRule {
                pattern: "coin".into(),
                replacement: "$X coin".into(),
                flags: "g".into(),
            }],
            ..FormattingRules::default()
        });
        let out = format("Pay one coin.", &rules);
        assert_eq!(out.plain_text(), "Pay one $X coin.");
    }

    #[test]
    fn no_rules_still_structures_text() {
        let out = format("One. Two. Three.", &CompiledRules::empty());
        match &out.blocks[..] {
            [Block::List { items }] => assert_eq!(items.len(), 3),
            other => panic!("unexpected blocks: {:?}", other),
        }
    }

    #[test]
    fn single_sentence_is_a_paragraph() {
        let out = format("Roll two dice and add 3.5 to the result.", &CompiledRules::empty());
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![plain("Roll two dice and add 3.5 to the result.")]
            }]
        );
    }

    #[test]
    fn lowercase_after_period_does_not_split() {
        let out = format("Use e.g. a pawn. then continue", &CompiledRules::empty());
        assert_eq!(out.blocks.len(), 1);
        assert!(matches!(out.blocks[0], Block::Paragraph { .. }));
    }

    #[test]
    fn exclamation_and_question_marks_end_sentences() {
        let out = format("Roll now! Did you win? Score it.", &CompiledRules::empty());
        assert_eq!(
            out.blocks,
            vec![Block::List {
                items: vec![
                    ListItem {
                        content: vec![plain("Roll now!")]
                    },
                    ListItem {
                        content: vec![plain("Did you win?")]
                    },
                    ListItem {
                        content: vec![plain("Score it.")]
                    },
                ]
            }]
        );
    }

    #[test]
    fn non_ascii_uppercase_after_period_does_not_split() {
        let out = format("Rest a turn. Élan returns.", &CompiledRules::empty());
        assert_eq!(
            out.blocks,
            vec![Block::Paragraph {
                content: vec![plain("Rest a turn. Élan returns.")]
            }]
        );
    }

    #[test]
    fn sentence_split_carries_styles_across_boundaries() {
        let rules = compile(FormattingRules {
            game_terms: vec!["Market".into()],
            ..FormattingRules::default()
        });
        let out = format("Buy goods. Market closes.", &rules);
        assert_eq!(
            out.blocks,
            vec![Block::List {
                items: vec![
                    ListItem {
                        content: vec![plain("Buy goods.")]
                    },
                    ListItem {
                        content: vec![Inline::Emphasis("Market".into()), plain(" closes.")]
                    },
                ]
            }]
        );
    }

    #[test]
    fn unbalanced_parenthesis_degrades_to_body_text() {
        let out = format("Score points (see p. 4", &CompiledRules::empty());
        assert_eq!(out.page_ref(), None);
        assert_eq!(out.plain_text(), "Score points (see p. 4");
    }

    #[test]
    fn only_first_page_reference_is_extracted() {
        let out = format("Trade (p. 3) then rest (p. 9)", &CompiledRules::empty());
        assert_eq!(out.page_ref(), Some("p. 3"));
        assert_eq!(out.plain_text(), "Trade then rest (p. 9)\n(p. 3)");
    }

    #[test]
    fn parenthetical_without_page_marker_is_kept() {
        let out = format("Draw (face down).", &CompiledRules::empty());
        assert_eq!(out.page_ref(), None);
        assert_eq!(out.plain_text(), "Draw (face down).");
    }

    #[test]
    fn page_reference_only() {
        let out = format("(p. 7)", &CompiledRules::empty());
        assert_eq!(
            out.blocks,
            vec![Block::PageRef {
                text: "p. 7".into()
            }]
        );
    }

    #[test]
    fn cache_returns_shared_result_and_evicts_oldest() {
        let cache = FormatCache::new(2);
        let rules = CompiledRules::empty();

        let first = cache.format("Alpha.", &rules);
        let again = cache.format("Alpha.", &rules);
        assert!(Arc::ptr_eq(&first, &again));

        cache.format("Beta.", &rules);
        cache.format("Gamma.", &rules);
        assert_eq!(cache.len(), 2);

        let refreshed = cache.format("Alpha.", &rules);
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(*first, *refreshed);
    }

    #[test]
    fn cache_keys_on_rule_identity() {
        let cache = FormatCache::default();
        let plain_rules = CompiledRules::empty();
        let zone_rules = compile(FormattingRules {
            game_terms: vec!["Zone".into()],
            ..FormattingRules::default()
        });

        let a = cache.format("Enter the Zone.", &plain_rules);
        let b = cache.format("Enter the Zone.", &zone_rules);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_cache_does_not_store() {
        let cache = FormatCache::new(0);
        cache.format("Alpha.", &CompiledRules::empty());
        assert!(cache.is_empty());
    }
}
