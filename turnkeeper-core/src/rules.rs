use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::LoadError;

/// Declarative markup instructions bundled with a game document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingRules {
    #[serde(default)]
    pub game_terms: Vec<String>,
    #[serde(default)]
    pub action_words: Vec<String>,
    #[serde(default)]
    pub measurements: Vec<String>,
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

/// A pattern replacement. `flags` uses the familiar letters: `i` makes the
/// pattern case-insensitive, `g` replaces every match instead of the first,
/// `m` and `s` toggle multi-line and dot-all matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub flags: String,
}

impl CustomRule {
    pub fn case_insensitive(&self) -> bool {
        self.flags.contains('i')
    }

    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InlineStyle {
    Plain,
    Emphasis,
    Strong,
}

#[derive(Debug, Clone)]
pub(crate) enum PassAction {
    Wrap(InlineStyle),
    Replace { template: String, global: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct MarkupPass {
    pub(crate) regex: Regex,
    pub(crate) action: PassAction,
}

/// Formatting rules with every pattern validated and compiled, in
/// application order: game terms, action words, measurements, custom rules.
///
/// Each compiled set carries a random identity used as the format cache key.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    id: Uuid,
    passes: Vec<MarkupPass>,
}

impl CompiledRules {
    pub fn compile(rules: &FormattingRules) -> Result<Self, LoadError> {
        let mut passes = Vec::new();

        if let Some(regex) = literal_alternation(&rules.game_terms, false)? {
            passes.push(MarkupPass {
                regex,
                action: PassAction::Wrap(InlineStyle::Emphasis),
            });
        }

        if let Some(regex) = literal_alternation(&rules.action_words, true)? {
            passes.push(MarkupPass {
                regex,
                action: PassAction::Wrap(InlineStyle::Strong),
            });
        }

        for fragment in rules.measurements.iter().filter(|m| !m.is_empty()) {
            passes.push(MarkupPass {
                regex: build(fragment, RegexBuilder::new(fragment))?,
                action: PassAction::Wrap(InlineStyle::Strong),
            });
        }

        for rule in &rules.custom_rules {
            let mut builder = RegexBuilder::new(&rule.pattern);
            for flag in rule.flags.chars() {
                match flag {
                    'i' => {
                        builder.case_insensitive(true);
                    }
                    'm' => {
                        builder.multi_line(true);
                    }
                    's' => {
                        builder.dot_matches_new_line(true);
                    }
                    'g' => {}
                    other => debug!(flag = %other, pattern = %rule.pattern, "ignoring rule flag"),
                }
            }
            passes.push(MarkupPass {
                regex: build(&rule.pattern, builder)?,
                action: PassAction::Replace {
                    template: translate_replacement(&rule.replacement),
                    global: rule.global(),
                },
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            passes,
        })
    }

    /// A rule set that applies no markup.
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            passes: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub(crate) fn passes(&self) -> &[MarkupPass] {
        &self.passes
    }
}

impl Default for CompiledRules {
    fn default() -> Self {
        Self::empty()
    }
}

fn build(pattern: &str, builder: RegexBuilder) -> Result<Regex, LoadError> {
    builder
        .build()
        .map_err(|source| LoadError::FormatterInputInvalid {
            pattern: pattern.to_owned(),
            source,
        })
}

/// Whole-word alternation over literal terms. Longer terms are tried first so
/// `Safe Zone` wins over `Zone`.
fn literal_alternation(
    terms: &[String],
    case_insensitive: bool,
) -> Result<Option<Regex>, LoadError> {
    let mut terms: Vec<&str> = terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .collect();
    if terms.is_empty() {
        return Ok(None);
    }
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    terms.dedup();

    let alternation = terms
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\b(?:{})\b", alternation);
    let mut builder = RegexBuilder::new(&pattern);
    builder.case_insensitive(case_insensitive);
    build(&pattern, builder).map(Some)
}

/// Rewrites `$&` and bare `$n` group references into the `${n}` form so a
/// following letter is never read as part of a group name. Any other `$` is
/// literal text and is escaped as `$$`.
fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(d);
                    chars.next();
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            _ => out.push_str("$$"),
        }
    }
    out
}
