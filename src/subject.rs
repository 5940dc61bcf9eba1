//! The subject union and per-program term interning.
//!
//! A [`Subject`] is what a declaration or annotation span resolves to: an
//! interned [`Term`], a parsed [`Pattern`](crate::pattern::Pattern), a
//! [`KnownUri`](crate::uri::KnownUri), or the void subject used by vacuous
//! statements. Terms are interned through a [`TermTable`] owned by the
//! program, so two spans spelling the same identifier hold the identical
//! term.

use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::{pattern::Pattern, scanner::syntax, uri::KnownUri};

/// Identity of an interned term, scoped to one program's [`TermTable`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TermId(pub u32);

impl Display for TermId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An interned identifier, optionally carrying the list marker (`...`).
///
/// Equality, ordering, and hashing go through the interned id, so the spelling
/// comparison happens once at intern time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    id: TermId,
    text: Arc<str>,
    list: bool,
}

impl Term {
    pub fn id(&self) -> TermId {
        self.id
    }

    /// The identifier without the list marker.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_list(&self) -> bool {
        self.list
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "{}{}", self.text, syntax::LIST)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// Program-scoped interning table. Spelling plus list marker is the identity
/// key; the same spelling with and without the marker interns to two distinct
/// terms.
#[derive(Debug, Default)]
pub struct TermTable {
    ids: BTreeMap<(Box<str>, bool), TermId>,
    entries: Vec<(Arc<str>, bool)>,
}

impl TermTable {
    pub fn intern(&mut self, text: &str, list: bool) -> Term {
        if let Some(id) = self.ids.get(&(Box::from(text), list)) {
            let (stored, _) = &self.entries[id.0 as usize];
            return Term {
                id: *id,
                text: stored.clone(),
                list,
            };
        }
        let id = TermId(self.entries.len() as u32);
        let stored: Arc<str> = Arc::from(text);
        self.entries.push((stored.clone(), list));
        self.ids.insert((Box::from(text), list), id);
        Term {
            id,
            text: stored,
            list,
        }
    }

    /// Intern from a raw spelling, detecting a trailing list marker.
    pub fn intern_spelling(&mut self, spelling: &str) -> Term {
        match spelling.strip_suffix(syntax::LIST) {
            Some(base) if !base.is_empty() => self.intern(base, true),
            _ => self.intern(spelling, false),
        }
    }

    /// Non-mutating lookup by exact spelling and list marker.
    pub fn find(&self, text: &str, list: bool) -> Option<Term> {
        self.ids
            .get(&(Box::from(text), list))
            .and_then(|id| self.get(*id))
    }

    /// Non-mutating lookup from a raw spelling, detecting a trailing list
    /// marker the way [`TermTable::intern_spelling`] does.
    pub fn find_spelling(&self, spelling: &str) -> Option<Term> {
        match spelling.strip_suffix(syntax::LIST) {
            Some(base) if !base.is_empty() => self.find(base, true),
            _ => self.find(spelling, false),
        }
    }

    pub fn get(&self, id: TermId) -> Option<Term> {
        self.entries.get(id.0 as usize).map(|(text, list)| Term {
            id,
            text: text.clone(),
            list: *list,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical key over a statement's annotation terms: the term ids sorted
/// ascending. Two statements with the same clarifiers in any order produce
/// equal keys, which is what keeps homograph phrases distinct in the trie.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ClarifierKey(Box<[TermId]>);

impl ClarifierKey {
    pub fn of(clarifiers: &[Term]) -> ClarifierKey {
        let mut ids: Vec<TermId> = clarifiers.iter().map(Term::id).collect();
        ids.sort_unstable();
        ClarifierKey(ids.into_boxed_slice())
    }

    pub fn empty() -> ClarifierKey {
        ClarifierKey::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> &[TermId] {
        &self.0
    }
}

impl Display for ClarifierKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{joined}")
    }
}

/// What a span resolves to.
#[derive(Debug, Clone)]
pub enum Subject {
    Term(Term),
    Pattern(Arc<Pattern>),
    Uri(KnownUri),
    /// The subject of a vacuous statement (a lone joint).
    Void,
}

impl Subject {
    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Subject::Term(term) => Some(term),
            _ => None,
        }
    }

    pub fn as_pattern(&self) -> Option<&Arc<Pattern>> {
        match self {
            Subject::Pattern(pattern) => Some(pattern),
            _ => None,
        }
    }

    pub fn as_uri(&self) -> Option<&KnownUri> {
        match self {
            Subject::Uri(uri) => Some(uri),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Subject::Void)
    }

    fn rank(&self) -> u8 {
        match self {
            Subject::Term(_) => 0,
            Subject::Pattern(_) => 1,
            Subject::Uri(_) => 2,
            Subject::Void => 3,
        }
    }
}

impl PartialEq for Subject {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Subject::Term(a), Subject::Term(b)) => a == b,
            (Subject::Pattern(a), Subject::Pattern(b)) => {
                a.digest() == b.digest() && a.is_total() == b.is_total()
            }
            (Subject::Uri(a), Subject::Uri(b)) => a == b,
            (Subject::Void, Subject::Void) => true,
            _ => false,
        }
    }
}

impl Eq for Subject {}

impl PartialOrd for Subject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Subject {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Subject::Term(a), Subject::Term(b)) => a.cmp(b),
            (Subject::Pattern(a), Subject::Pattern(b)) => a
                .digest()
                .cmp(&b.digest())
                .then(a.is_total().cmp(&b.is_total())),
            (Subject::Uri(a), Subject::Uri(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Term(term) => write!(f, "{term}"),
            Subject::Pattern(pattern) => write!(f, "{pattern}"),
            Subject::Uri(uri) => write!(f, "{}", uri.store_string()),
            Subject::Void => write!(f, "void"),
        }
    }
}
