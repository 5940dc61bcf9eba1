//! Pattern subjects: the regex-shaped total/partial matchers that can appear
//! as the sole declaration of a statement.
//!
//! A pattern is parsed into a sequence of [`RegexUnit`]s by [`parser`], then
//! lowered into a compiled matcher. Totality is a syntactic property (the
//! pattern closed with an unquantified terminating delimiter) that decides
//! whether the matcher is anchored at both ends. The [`Pattern::digest`] is
//! the cross-document identity: a content hash over the sorted annotation
//! texts of the declaring statement.

pub mod parser;

use enumset::{EnumSet, EnumSetType};
use regex::{escape as re_escape, Regex, RegexBuilder};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter, Write};
use thiserror::Error;

use crate::{
    scanner::{Grapheme, UNICODE_BLOCKS},
    statement::Boundary,
    subject::Term,
};

/// Internal parse failures. The statement parser folds every variant into a
/// single user-facing fault on the declaring statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern contains no units")]
    Empty,
    #[error("unterminated {0}")]
    Unterminated(&'static str),
    #[error("consecutive quantifiers")]
    DoubleQuantifier,
    #[error("matcher compilation failed: {0}")]
    Compile(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuantifierKind {
    ZeroOrMore,
    OneOrMore,
    Exactly(u32),
    AtLeast(u32),
    Between(u32, u32),
}

/// A repetition suffix on a unit, optionally restrained (lazy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub kind: QuantifierKind,
    pub restrained: bool,
}

impl Display for Quantifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            QuantifierKind::ZeroOrMore => write!(f, "*")?,
            QuantifierKind::OneOrMore => write!(f, "+")?,
            QuantifierKind::Exactly(n) => write!(f, "{{{n}}}")?,
            QuantifierKind::AtLeast(n) => write!(f, "{{{n},}}")?,
            QuantifierKind::Between(n, m) => write!(f, "{{{n},{m}}}")?,
        }
        if self.restrained {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// A named character class reachable through an escaped sign (`\d`, `\S`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KnownClass {
    Digit,
    NonDigit,
    Space,
    NonSpace,
    Word,
    NonWord,
}

impl KnownClass {
    pub(crate) fn from_sign(sign: char) -> Option<KnownClass> {
        match sign {
            'd' => Some(KnownClass::Digit),
            'D' => Some(KnownClass::NonDigit),
            's' => Some(KnownClass::Space),
            'S' => Some(KnownClass::NonSpace),
            'w' => Some(KnownClass::Word),
            'W' => Some(KnownClass::NonWord),
            _ => None,
        }
    }

    fn render(&self) -> &'static str {
        match self {
            KnownClass::Digit => "\\d",
            KnownClass::NonDigit => "\\D",
            KnownClass::Space => "\\s",
            KnownClass::NonSpace => "\\S",
            KnownClass::Word => "\\w",
            KnownClass::NonWord => "\\W",
        }
    }
}

/// One member of a `[...]` set body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetComponent {
    Class(KnownClass),
    Range(char, char),
    Grapheme(Grapheme),
}

/// One parsed unit of the pattern body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexUnit {
    Grapheme {
        grapheme: Grapheme,
        quantifier: Option<Quantifier>,
    },
    Sign {
        class: KnownClass,
        quantifier: Option<Quantifier>,
    },
    Set {
        negated: bool,
        components: Vec<SetComponent>,
        quantifier: Option<Quantifier>,
    },
    Group {
        alternatives: Vec<Vec<RegexUnit>>,
        quantifier: Option<Quantifier>,
    },
    Infix(Infix),
}

impl RegexUnit {
    pub(crate) fn quantifier(&self) -> Option<Quantifier> {
        match self {
            RegexUnit::Grapheme { quantifier, .. }
            | RegexUnit::Sign { quantifier, .. }
            | RegexUnit::Set { quantifier, .. }
            | RegexUnit::Group { quantifier, .. } => *quantifier,
            RegexUnit::Infix(_) => None,
        }
    }

    pub(crate) fn set_quantifier(&mut self, q: Quantifier) -> bool {
        match self {
            RegexUnit::Grapheme { quantifier, .. }
            | RegexUnit::Sign { quantifier, .. }
            | RegexUnit::Set { quantifier, .. }
            | RegexUnit::Group { quantifier, .. } => {
                *quantifier = Some(q);
                true
            }
            RegexUnit::Infix(_) => false,
        }
    }

    /// An unescaped, unquantified whitespace grapheme; these are trimmed off
    /// the tail before the totality test.
    fn is_trailing_whitespace(&self) -> bool {
        match self {
            RegexUnit::Grapheme {
                grapheme,
                quantifier: None,
            } => grapheme.is_whitespace(),
            _ => false,
        }
    }
}

#[derive(EnumSetType, Debug)]
pub enum InfixFlag {
    /// Declared with `</` … `/>`.
    Nominal,
    /// Declared with `<<` … `>>`: the hole is filled by another pattern.
    Pattern,
    /// A joint with no left side: `<` `:` … `>`.
    Portability,
    HasJoint,
}

/// An identifier inside an infix, with its boundary in the statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfixTerm {
    pub term: Term,
    pub boundary: Boundary,
}

/// An infix hole embedded at the top level of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infix {
    pub flags: EnumSet<InfixFlag>,
    pub declarations: Vec<InfixTerm>,
    pub annotations: Vec<InfixTerm>,
    pub boundary: Boundary,
}

impl Infix {
    pub fn is_nominal(&self) -> bool {
        self.flags.contains(InfixFlag::Nominal)
    }

    pub fn is_pattern(&self) -> bool {
        self.flags.contains(InfixFlag::Pattern)
    }

    pub fn is_portability(&self) -> bool {
        self.flags.contains(InfixFlag::Portability)
    }

    pub fn has_joint(&self) -> bool {
        self.flags.contains(InfixFlag::HasJoint)
    }

    /// A population infix is the plain form: identifiers without a joint.
    pub fn is_population(&self) -> bool {
        (self.flags & (InfixFlag::Nominal | InfixFlag::Pattern | InfixFlag::Portability)).is_empty()
    }
}

/// A parsed pattern declaration.
#[derive(Debug)]
pub struct Pattern {
    source: String,
    units: Vec<RegexUnit>,
    total: bool,
    digest: u64,
    compiled: Regex,
}

impl Pattern {
    /// Assemble a pattern from its parsed units and the annotation texts of
    /// the declaring statement (which seed the identity digest).
    pub(crate) fn new(
        source: &str,
        mut units: Vec<RegexUnit>,
        total: bool,
        annotation_texts: &[&str],
    ) -> Result<Pattern, PatternError> {
        if !total {
            while units.last().map(RegexUnit::is_trailing_whitespace) == Some(true) {
                units.pop();
            }
        }
        if units.is_empty() {
            return Err(PatternError::Empty);
        }
        let mut expression = String::from("^");
        render_units(&mut expression, &units);
        if total {
            expression.push('$');
        }
        let compiled = RegexBuilder::new(&expression)
            .build()
            .map_err(|e| PatternError::Compile(e.to_string()))?;
        Ok(Pattern {
            source: source.to_string(),
            units,
            total,
            digest: annotation_digest(annotation_texts),
            compiled,
        })
    }

    pub fn units(&self) -> &[RegexUnit] {
        &self.units
    }

    pub fn is_total(&self) -> bool {
        self.total
    }

    /// Cross-document identity of this pattern.
    pub fn digest(&self) -> u64 {
        self.digest
    }

    /// Whether the pattern accepts `input`. Total patterns must consume the
    /// whole input; partial patterns match a prefix.
    pub fn matches(&self, input: &str) -> bool {
        self.compiled.is_match(input)
    }

    pub fn can_match_empty(&self) -> bool {
        self.matches("")
    }

    pub fn infixes(&self) -> impl Iterator<Item = &Infix> {
        self.units.iter().filter_map(|unit| match unit {
            RegexUnit::Infix(infix) => Some(infix),
            _ => None,
        })
    }

    pub fn has_infixes(&self) -> bool {
        self.infixes().next().is_some()
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn annotation_digest(annotation_texts: &[&str]) -> u64 {
    let mut sorted: Vec<&str> = annotation_texts.to_vec();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for text in sorted {
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    let bytes = hasher.finalize();
    u64::from_be_bytes(bytes[..8].try_into().expect("Sha256 output is 32 bytes"))
}

fn render_units(out: &mut String, units: &[RegexUnit]) {
    for unit in units {
        match unit {
            RegexUnit::Grapheme { grapheme, .. } => render_grapheme(out, grapheme),
            RegexUnit::Sign { class, .. } => out.push_str(class.render()),
            RegexUnit::Set {
                negated,
                components,
                ..
            } => {
                out.push('[');
                if *negated {
                    out.push('^');
                }
                for component in components {
                    match component {
                        SetComponent::Class(class) => out.push_str(class.render()),
                        SetComponent::Range(lo, hi) => {
                            push_set_char(out, *lo);
                            out.push('-');
                            push_set_char(out, *hi);
                        }
                        SetComponent::Grapheme(grapheme) => {
                            for ch in grapheme.literal.chars() {
                                push_set_char(out, ch);
                            }
                        }
                    }
                }
                out.push(']');
            }
            RegexUnit::Group { alternatives, .. } => {
                out.push_str("(?:");
                for (idx, alternative) in alternatives.iter().enumerate() {
                    if idx > 0 {
                        out.push('|');
                    }
                    render_units(out, alternative);
                }
                out.push(')');
            }
            // A hole stands in for whatever its referenced types accept;
            // at this layer it matches any non-empty run.
            RegexUnit::Infix(_) => out.push_str(".+"),
        }
        if let Some(quantifier) = unit.quantifier() {
            let _ = write!(out, "{quantifier}");
        }
    }
}

fn render_grapheme(out: &mut String, grapheme: &Grapheme) {
    if let Some(block) = grapheme.block {
        let class = UNICODE_BLOCKS.get(block).copied().unwrap_or(block);
        let _ = write!(out, "\\p{{{class}}}");
    } else {
        out.push_str(&re_escape(&grapheme.literal));
    }
}

fn push_set_char(out: &mut String, ch: char) {
    if matches!(ch, ']' | '\\' | '^' | '-' | '[' | '&') {
        out.push('\\');
    }
    out.push(ch);
}
