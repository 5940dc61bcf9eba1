//! Recursive-descent reader for the pattern body grammar.
//!
//! The entry point is [`parse_body`], called with the scanner positioned just
//! past the opening delimiter. Group alternation recurses through the same
//! sequence reader with different break tokens; infixes only appear at the
//! top level.

use enumset::EnumSet;

use crate::{
    pattern::{
        Infix, InfixFlag, InfixTerm, KnownClass, PatternError, Quantifier, QuantifierKind,
        RegexUnit, SetComponent,
    },
    scanner::{syntax, Scanner},
    statement::Boundary,
    subject::TermTable,
};

#[derive(Debug)]
pub(crate) struct ParsedPatternBody {
    pub units: Vec<RegexUnit>,
    pub total: bool,
}

/// How a unit sequence stopped.
#[derive(Debug, PartialEq, Eq)]
enum SequenceStop {
    /// Unquantified terminating delimiter (top level only).
    Terminal,
    /// End of line.
    Exhausted,
    /// A joint operator follows; the scanner is left positioned on it so the
    /// statement parser can pick up annotations. Only partial patterns stop
    /// this way.
    Joint,
    Alternator,
    GroupEnd,
}

pub(crate) fn parse_body(
    scanner: &mut Scanner<'_>,
    terms: &mut TermTable,
) -> Result<ParsedPatternBody, PatternError> {
    let (units, stop) = parse_sequence(scanner, terms, false)?;
    debug_assert!(matches!(
        stop,
        SequenceStop::Terminal | SequenceStop::Exhausted | SequenceStop::Joint
    ));
    Ok(ParsedPatternBody {
        units,
        total: stop == SequenceStop::Terminal,
    })
}

fn parse_sequence(
    scanner: &mut Scanner<'_>,
    terms: &mut TermTable,
    in_group: bool,
) -> Result<(Vec<RegexUnit>, SequenceStop), PatternError> {
    let mut units: Vec<RegexUnit> = Vec::new();
    loop {
        if !scanner.more() {
            if in_group {
                return Err(PatternError::Unterminated("group"));
            }
            return Ok((units, SequenceStop::Exhausted));
        }
        if in_group {
            if scanner.read_char(syntax::ALTERNATOR) {
                return Ok((units, SequenceStop::Alternator));
            }
            if scanner.read_char(syntax::GROUP_END) {
                return Ok((units, SequenceStop::GroupEnd));
            }
        } else if scanner.peek_char(syntax::PATTERN_DELIMITER) {
            let save = scanner.position();
            scanner.read_char(syntax::PATTERN_DELIMITER);
            if peek_quantifier(scanner) {
                // A quantified delimiter is an ordinary repeated grapheme,
                // not a terminator.
                scanner.set_position(save);
            } else {
                return Ok((units, SequenceStop::Terminal));
            }
        } else if joint_ahead(scanner) {
            return Ok((units, SequenceStop::Joint));
        }
        let unit = if !in_group && scanner.peek(syntax::INFIX_START) {
            RegexUnit::Infix(parse_infix(scanner, terms)?)
        } else if scanner.peek_char(syntax::SET_START) {
            parse_set(scanner)?
        } else if scanner.peek_char(syntax::GROUP_START) {
            parse_group(scanner, terms)?
        } else {
            let grapheme = scanner
                .read_grapheme()
                .ok_or(PatternError::Unterminated("grapheme"))?;
            match sign_of(&grapheme) {
                Some(class) => RegexUnit::Sign {
                    class,
                    quantifier: None,
                },
                None => RegexUnit::Grapheme {
                    grapheme,
                    quantifier: None,
                },
            }
        };
        units.push(unit);
        if let Some(quantifier) = parse_quantifier(scanner) {
            let attached = units
                .last_mut()
                .map(|u| u.set_quantifier(quantifier))
                .unwrap_or(false);
            if !attached || peek_quantifier(scanner) {
                return Err(PatternError::DoubleQuantifier);
            }
        }
    }
}

fn sign_of(grapheme: &crate::scanner::Grapheme) -> Option<KnownClass> {
    if !grapheme.escaped || grapheme.block.is_some() {
        return None;
    }
    let mut chars = grapheme.literal.chars();
    let sign = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    KnownClass::from_sign(sign)
}

fn parse_group(
    scanner: &mut Scanner<'_>,
    terms: &mut TermTable,
) -> Result<RegexUnit, PatternError> {
    scanner.read_char(syntax::GROUP_START);
    let mut alternatives = Vec::new();
    loop {
        let (units, stop) = parse_sequence(scanner, terms, true)?;
        alternatives.push(units);
        match stop {
            SequenceStop::Alternator => continue,
            SequenceStop::GroupEnd => break,
            _ => return Err(PatternError::Unterminated("group")),
        }
    }
    Ok(RegexUnit::Group {
        alternatives,
        quantifier: None,
    })
}

fn parse_set(scanner: &mut Scanner<'_>) -> Result<RegexUnit, PatternError> {
    scanner.read_char(syntax::SET_START);
    let negated = scanner.read_char(syntax::SET_NEGATE);
    let mut components = Vec::new();
    loop {
        if scanner.read_char(syntax::SET_END) {
            break;
        }
        if !scanner.more() {
            return Err(PatternError::Unterminated("set"));
        }
        let grapheme = scanner
            .read_grapheme()
            .ok_or(PatternError::Unterminated("set"))?;
        if let Some(class) = sign_of(&grapheme) {
            components.push(SetComponent::Class(class));
            continue;
        }
        // A dash joining two single characters forms a range; a trailing
        // dash before the closing bracket stays literal.
        let range_ahead = scanner.peek_char(syntax::RANGE) && {
            let mut probe = scanner.clone();
            probe.read_char(syntax::RANGE);
            probe.more() && !probe.peek_char(syntax::SET_END)
        };
        if range_ahead {
            scanner.read_char(syntax::RANGE);
            let hi = scanner
                .read_grapheme()
                .ok_or(PatternError::Unterminated("set"))?;
            let lo_char = grapheme.literal.chars().next();
            let hi_char = hi.literal.chars().next();
            match (lo_char, hi_char) {
                (Some(lo), Some(hi)) => components.push(SetComponent::Range(lo, hi)),
                _ => return Err(PatternError::Unterminated("set")),
            }
        } else {
            components.push(SetComponent::Grapheme(grapheme));
        }
    }
    Ok(RegexUnit::Set {
        negated,
        components,
        quantifier: None,
    })
}

fn parse_quantifier(scanner: &mut Scanner<'_>) -> Option<Quantifier> {
    let kind = if scanner.read_char(syntax::QUANTIFY_ZERO_PLUS) {
        QuantifierKind::ZeroOrMore
    } else if scanner.read_char(syntax::QUANTIFY_ONE_PLUS) {
        QuantifierKind::OneOrMore
    } else if scanner.peek_char(syntax::QUANTIFY_OPEN) {
        let save = scanner.position();
        scanner.read_char(syntax::QUANTIFY_OPEN);
        match parse_bounds(scanner) {
            Some(kind) => kind,
            None => {
                // Malformed body: `{` is an ordinary grapheme.
                scanner.set_position(save);
                return None;
            }
        }
    } else {
        return None;
    };
    let restrained = scanner.read_char(syntax::RESTRAINT);
    Some(Quantifier { kind, restrained })
}

fn parse_bounds(scanner: &mut Scanner<'_>) -> Option<QuantifierKind> {
    let min = read_number(scanner)?;
    if scanner.read_char(syntax::QUANTIFY_CLOSE) {
        return Some(QuantifierKind::Exactly(min));
    }
    if !scanner.read_char(syntax::COMBINATOR) {
        return None;
    }
    if scanner.read_char(syntax::QUANTIFY_CLOSE) {
        return Some(QuantifierKind::AtLeast(min));
    }
    let max = read_number(scanner)?;
    if scanner.read_char(syntax::QUANTIFY_CLOSE) {
        Some(QuantifierKind::Between(min, max))
    } else {
        None
    }
}

fn read_number(scanner: &mut Scanner<'_>) -> Option<u32> {
    let rest = scanner.rest();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let value = digits.parse().ok()?;
    scanner.set_position(scanner.position() + digits.len());
    Some(value)
}

fn peek_quantifier(scanner: &Scanner<'_>) -> bool {
    let mut probe = scanner.clone();
    parse_quantifier(&mut probe).is_some()
}

/// A joint operator at the cursor: an unescaped `:` followed by a space, a
/// tab, or the end of the line.
fn joint_ahead(scanner: &Scanner<'_>) -> bool {
    let mut probe = scanner.clone();
    if !probe.read_char(syntax::JOINT) {
        return false;
    }
    !probe.more() || probe.peek_char(syntax::SPACE) || probe.peek_char(syntax::TAB)
}

/// Parse one infix hole: `<…>`, `<<…>>`, or `</…/>`. The body reads as
/// `declarations [joint annotations]` up to the matching quit token.
fn parse_infix(scanner: &mut Scanner<'_>, terms: &mut TermTable) -> Result<Infix, PatternError> {
    let start = scanner.position();
    let mut flags = EnumSet::<InfixFlag>::empty();
    let quit = if scanner.read(syntax::NOMINAL_INFIX_START) {
        flags |= InfixFlag::Nominal;
        syntax::NOMINAL_INFIX_END
    } else if scanner.read(syntax::PATTERN_INFIX_START) {
        flags |= InfixFlag::Pattern;
        syntax::PATTERN_INFIX_END
    } else {
        scanner.read(syntax::INFIX_START);
        syntax::INFIX_END
    };

    let mut declarations = Vec::new();
    let mut annotations = Vec::new();
    let mut after_joint = false;
    loop {
        scanner.read_whitespace();
        if scanner.read(quit) {
            break;
        }
        if !scanner.more() {
            return Err(PatternError::Unterminated("infix"));
        }
        if scanner.read_char(syntax::JOINT) {
            if declarations.is_empty() && !after_joint {
                flags |= InfixFlag::Portability;
            }
            flags |= InfixFlag::HasJoint;
            after_joint = true;
            continue;
        }
        if scanner.read_char(syntax::COMBINATOR) {
            continue;
        }
        let (spelling, boundary) = read_infix_identifier(scanner, quit);
        if spelling.is_empty() {
            continue;
        }
        let entry = InfixTerm {
            term: terms.intern_spelling(&spelling),
            boundary,
        };
        if after_joint {
            annotations.push(entry);
        } else {
            declarations.push(entry);
        }
    }
    Ok(Infix {
        flags,
        declarations,
        annotations,
        boundary: Boundary {
            start,
            end: scanner.position(),
        },
    })
}

/// Accumulate an identifier up to a combinator, joint, quit token, or end of
/// line. Returns the decoded spelling and the trimmed boundary.
fn read_infix_identifier(scanner: &mut Scanner<'_>, quit: &str) -> (String, Boundary) {
    let mut spelling = String::new();
    let start = scanner.position();
    let mut end = start;
    loop {
        if !scanner.more()
            || scanner.peek(quit)
            || scanner.peek_char(syntax::COMBINATOR)
            || scanner.peek_char(syntax::JOINT)
        {
            break;
        }
        match scanner.read_grapheme() {
            Some(grapheme) => {
                if grapheme.is_whitespace() {
                    continue;
                }
                spelling.push_str(&grapheme.literal);
                end = scanner.position();
            }
            None => break,
        }
    }
    (spelling, Boundary { start, end })
}
