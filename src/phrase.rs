//! The per-document phrase trie.
//!
//! Every declaration span in a document justifies one or more paths from the
//! document's root phrase down to a leaf whose terminal is the span's
//! subject. Nodes are keyed by `(subject, clarifier-key)`, so homographs
//! (the same subject introduced under different clarifiers) coexist as
//! siblings. A phrase stays alive exactly as long as its set of inflating
//! spans is non-empty; hypothetical phrases synthesized during lookup are
//! never registered in the forwarding map.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use crate::{
    document::DocumentId,
    statement::SpanRef,
    subject::{ClarifierKey, Subject, Term},
};

/// The forwarding key: one step along a phrase path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhraseKey {
    pub subject: Subject,
    pub clarifier: ClarifierKey,
}

/// One step of a spine before it is keyed: the subject plus the clarifier
/// terms of the statement that contributed it.
#[derive(Debug, Clone)]
pub struct PhraseStep {
    pub subject: Subject,
    pub clarifiers: Vec<Term>,
}

impl PhraseStep {
    pub fn key(&self) -> PhraseKey {
        PhraseKey {
            subject: self.subject.clone(),
            clarifier: ClarifierKey::of(&self.clarifiers),
        }
    }
}

/// A node in the trie. The root phrase has length zero and a void terminal.
#[derive(Debug, Clone)]
pub struct Phrase {
    terminal: Subject,
    clarifiers: Vec<Term>,
    clarifier_key: ClarifierKey,
    path: Vec<PhraseKey>,
    inflating: BTreeSet<SpanRef>,
    hypothetical: bool,
    forwardings: BTreeMap<PhraseKey, Phrase>,
}

impl Phrase {
    pub fn root() -> Phrase {
        Phrase {
            terminal: Subject::Void,
            clarifiers: Vec::new(),
            clarifier_key: ClarifierKey::empty(),
            path: Vec::new(),
            inflating: BTreeSet::new(),
            hypothetical: false,
            forwardings: BTreeMap::new(),
        }
    }

    /// A transient phrase for a path step with no attestation. Never enters
    /// any forwarding map; dropping it has no side effects.
    pub fn hypothetical(path: Vec<PhraseKey>, subject: Subject, clarifiers: Vec<Term>) -> Phrase {
        Phrase {
            terminal: subject,
            clarifier_key: ClarifierKey::of(&clarifiers),
            clarifiers,
            path,
            inflating: BTreeSet::new(),
            hypothetical: true,
            forwardings: BTreeMap::new(),
        }
    }

    pub fn terminal(&self) -> &Subject {
        &self.terminal
    }

    pub fn clarifiers(&self) -> &[Term] {
        &self.clarifiers
    }

    pub fn clarifier_key(&self) -> &ClarifierKey {
        &self.clarifier_key
    }

    /// Forwarding keys from the root to this phrase; empty for the root.
    pub fn path(&self) -> &[PhraseKey] {
        &self.path
    }

    pub fn length(&self) -> usize {
        self.path.len()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_hypothetical(&self) -> bool {
        self.hypothetical
    }

    pub fn inflating_spans(&self) -> &BTreeSet<SpanRef> {
        &self.inflating
    }

    pub fn forwardings(&self) -> &BTreeMap<PhraseKey, Phrase> {
        &self.forwardings
    }

    /// All children introduced under `subject`, regardless of clarifier.
    /// More than one result is a homograph.
    pub fn peek(&self, subject: &Subject) -> Vec<&Phrase> {
        self.forwardings
            .iter()
            .filter(|(key, _)| &key.subject == subject)
            .map(|(_, phrase)| phrase)
            .collect()
    }

    pub fn peek_with(&self, subject: &Subject, clarifier: &ClarifierKey) -> Option<&Phrase> {
        self.forwardings.get(&PhraseKey {
            subject: subject.clone(),
            clarifier: clarifier.clone(),
        })
    }

    /// Resolve a descendant by its key path relative to this phrase.
    pub fn get(&self, path: &[PhraseKey]) -> Option<&Phrase> {
        let mut cursor = self;
        for key in path {
            cursor = cursor.forwardings.get(key)?;
        }
        Some(cursor)
    }

    /// A copy of this phrase without its subtree, suitable for event and
    /// lookup payloads.
    pub fn detached(&self) -> Phrase {
        Phrase {
            terminal: self.terminal.clone(),
            clarifiers: self.clarifiers.clone(),
            clarifier_key: self.clarifier_key.clone(),
            path: self.path.clone(),
            inflating: self.inflating.clone(),
            hypothetical: self.hypothetical,
            forwardings: BTreeMap::new(),
        }
    }

    /// Walk down the spine, creating nodes as needed, and record `span` as an
    /// inflating span of the leaf. Returns the leaf's full path.
    pub(crate) fn inflate(&mut self, steps: &[PhraseStep], span: SpanRef) -> Vec<PhraseKey> {
        debug_assert!(self.is_root());
        let mut cursor = self;
        let mut path = Vec::with_capacity(steps.len());
        for step in steps {
            let key = step.key();
            path.push(key.clone());
            let child_path = path.clone();
            cursor = cursor.forwardings.entry(key).or_insert_with(|| Phrase {
                terminal: step.subject.clone(),
                clarifier_key: ClarifierKey::of(&step.clarifiers),
                clarifiers: step.clarifiers.clone(),
                path: child_path,
                inflating: BTreeSet::new(),
                hypothetical: false,
                forwardings: BTreeMap::new(),
            });
        }
        if !cursor.is_root() {
            cursor.inflating.insert(span);
        }
        path
    }

    /// Remove `span` from every phrase it inflates and dispose phrases whose
    /// justification is gone. Children are pruned before their parents so a
    /// chain emptied by one span collapses in a single pass.
    pub(crate) fn deflate(&mut self, span: &SpanRef) {
        self.inflating.remove(span);
        for child in self.forwardings.values_mut() {
            child.deflate(span);
        }
        self.forwardings
            .retain(|_, child| !child.inflating.is_empty() || !child.forwardings.is_empty());
    }

    /// Count of phrases in this subtree, excluding the root.
    pub fn size(&self) -> usize {
        self.forwardings
            .values()
            .map(|child| 1 + child.size())
            .sum()
    }
}

impl Display for Phrase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self
            .path
            .iter()
            .map(|key| key.subject.to_string())
            .collect::<Vec<_>>()
            .join("/");
        write!(f, "/{joined}")
    }
}

/// Non-owning handle to a phrase: document identity plus key path. Resolved
/// on demand, so holding one across edits is safe; resolution simply fails
/// once the phrase is disposed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhraseRef {
    pub document: DocumentId,
    pub path: Vec<PhraseKey>,
}

/// A directed edge from a phrase along one of its clarifier terms to the
/// candidate phrases that term may resolve to.
#[derive(Debug, Clone)]
pub struct Fork {
    pub origin: PhraseRef,
    pub via: Term,
    pub successors: Vec<PhraseRef>,
}
