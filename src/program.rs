//! The program facade: owns the documents, the term table, the dependency
//! graph, the observable fault set, and the cause bus.
//!
//! All mutation flows through the program. The only suspension points are
//! URI loads through the pluggable [`UriReader`]; parsing, editing, and
//! phrase maintenance are synchronous. Documents discovered during reference
//! resolution are loaded through a work queue rather than recursion, the
//! same discipline the resolver module documents.

use parking_lot::{Mutex, RwLock};
use petgraph::graphmap::DiGraphMap;
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    document::{Document, DocumentId},
    edit::{self, EditRecorder, RangeEdit},
    error::TruthError,
    event::{Cause, CauseObserver},
    fault::Fault,
    phrase::{Fork, PhraseKey, PhraseRef},
    resolver::ResolutionRequest,
    statement::StatementId,
    subject::{Subject, Term, TermTable},
    uri::KnownUri,
};

pub type UriReadFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TruthError>> + Send + 'a>>;

/// Pluggable loader for referenced documents. Failures surface as
/// `UnresolvedResource` faults on the referring statement, never as panics
/// or exceptions to the caller.
pub trait UriReader: Send + Sync {
    fn read<'a>(&'a self, uri: &'a KnownUri) -> UriReadFuture<'a>;
}

/// In-memory reader keyed by URI store form. The standard test double, and
/// sufficient for hosts that manage their own text.
#[derive(Debug, Default)]
pub struct MapUriReader {
    texts: RwLock<BTreeMap<String, String>>,
}

impl MapUriReader {
    pub fn insert(&self, uri: &KnownUri, text: impl Into<String>) {
        self.texts.write().insert(uri.store_string(), text.into());
    }
}

impl UriReader for MapUriReader {
    fn read<'a>(&'a self, uri: &'a KnownUri) -> UriReadFuture<'a> {
        let result = self
            .texts
            .read()
            .get(&uri.store_string())
            .cloned()
            .ok_or_else(|| TruthError::UriRead(format!("no text registered for {uri}")));
        Box::pin(async move { result })
    }
}

/// A reader that refuses every load.
#[derive(Debug, Default)]
pub struct FailingUriReader;

impl UriReader for FailingUriReader {
    fn read<'a>(&'a self, uri: &'a KnownUri) -> UriReadFuture<'a> {
        let error = TruthError::UriRead(format!("reader rejects {uri}"));
        Box::pin(async move { Err(error) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Clears a document's transaction guard on every exit path, panics
/// included.
struct InEditGuard(Arc<AtomicBool>);

impl Drop for InEditGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Single-owner structure holding every document of one compilation unit.
pub struct Program {
    pub(crate) documents: BTreeMap<DocumentId, Document>,
    pub(crate) by_uri: BTreeMap<String, DocumentId>,
    pub(crate) dep_graph: DiGraphMap<DocumentId, ()>,
    terms: Arc<RwLock<TermTable>>,
    observers: Arc<Mutex<Vec<(ObserverId, CauseObserver)>>>,
    next_observer: u64,
    pub(crate) resolution_faults: BTreeMap<DocumentId, BTreeMap<StatementId, Vec<Fault>>>,
    pub(crate) resolution_queue: VecDeque<ResolutionRequest>,
    verification: Vec<PhraseRef>,
    verified_seen: BTreeSet<PhraseRef>,
    reader: Arc<dyn UriReader>,
    internal_counter: u64,
}

impl Program {
    pub fn new(reader: Arc<dyn UriReader>) -> Program {
        Program {
            documents: BTreeMap::new(),
            by_uri: BTreeMap::new(),
            dep_graph: DiGraphMap::new(),
            terms: Arc::new(RwLock::new(TermTable::default())),
            observers: Arc::new(Mutex::new(Vec::new())),
            next_observer: 0,
            resolution_faults: BTreeMap::new(),
            resolution_queue: VecDeque::new(),
            verification: Vec::new(),
            verified_seen: BTreeSet::new(),
            reader,
            internal_counter: 0,
        }
    }

    /// A program over an in-memory reader; returns the reader handle so the
    /// host can register texts.
    pub fn in_memory() -> (Program, Arc<MapUriReader>) {
        let reader = Arc::new(MapUriReader::default());
        (Program::new(reader.clone()), reader)
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn observe(&mut self, observer: impl FnMut(&Cause) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.lock().push((id, Box::new(observer)));
        id
    }

    pub fn unobserve(&mut self, id: ObserverId) {
        self.observers.lock().retain(|(oid, _)| *oid != id);
    }

    fn publish(&self, cause: Cause) {
        tracing::debug!("cause: {cause}");
        let mut observers = self.observers.lock();
        for (_, observer) in observers.iter_mut() {
            observer(&cause);
        }
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn document_by_uri(&self, uri: &KnownUri) -> Option<&Document> {
        self.by_uri
            .get(&uri.store_string())
            .and_then(|id| self.documents.get(id))
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Open a document from text. Without a URI an internal one is
    /// generated; the document then never appears in rendered fault
    /// locations.
    pub async fn add_document(
        &mut self,
        text: &str,
        uri: Option<KnownUri>,
    ) -> Result<DocumentId, TruthError> {
        let uri = match uri {
            Some(uri) => uri,
            None => {
                self.internal_counter += 1;
                KnownUri::internal(&format!("doc-{}", self.internal_counter))
            }
        };
        let before = self.global_fault_set();
        let id = self.register_document(text, uri)?;
        self.drive_resolution().await;
        self.publish_fault_delta(before);
        Ok(id)
    }

    /// Open a document by loading its text through the reader.
    pub async fn add_document_from_uri(&mut self, uri: KnownUri) -> Result<DocumentId, TruthError> {
        if self.by_uri.contains_key(&uri.store_string()) {
            return Err(TruthError::UriInUse(uri.store_string()));
        }
        let text = self.reader.read(&uri).await?;
        let before = self.global_fault_set();
        let id = self.register_document(&text, uri)?;
        self.drive_resolution().await;
        self.publish_fault_delta(before);
        Ok(id)
    }

    /// Load a document referenced during resolution. The caller is already
    /// inside the drive loop, so the new document's own references are
    /// queued, not driven here.
    pub(crate) async fn load_referenced(
        &mut self,
        uri: KnownUri,
    ) -> Result<DocumentId, TruthError> {
        let text = self.reader.read(&uri).await?;
        self.register_document(&text, uri)
    }

    /// Parse, save, announce, and queue resolution for a new document.
    fn register_document(&mut self, text: &str, uri: KnownUri) -> Result<DocumentId, TruthError> {
        let store = uri.store_string();
        if self.by_uri.contains_key(&store) {
            return Err(TruthError::UriInUse(store));
        }
        let id = DocumentId::generate();
        let document = Document::new(id, uri, text, self.terms.clone());
        let added: Vec<_> = document
            .statements()
            .iter()
            .filter(|s| s.has_uri())
            .map(|s| s.id())
            .collect();
        self.enqueue_verification_of(&document);
        self.documents.insert(id, document);
        self.by_uri.insert(store, id);
        self.dep_graph.add_node(id);
        self.publish(Cause::DocumentCreate { document: id });
        self.resolution_queue.push_back(ResolutionRequest {
            document: id,
            deleted: Vec::new(),
            added,
        });
        Ok(id)
    }

    /// Remove a document. Dependents keep their URI statements; the links
    /// simply stop resolving until a future transaction re-runs their
    /// resolution.
    pub fn delete_document(&mut self, id: DocumentId) -> Result<(), TruthError> {
        if !self.documents.contains_key(&id) {
            return Err(TruthError::UnknownDocument(id));
        }
        let before = self.global_fault_set();
        self.publish(Cause::DocumentDelete { document: id });
        let document = self
            .documents
            .remove(&id)
            .expect("presence checked above");
        for dep in document.dependencies() {
            if let Some(target) = self.documents.get_mut(dep) {
                target.dependents.retain(|d| *d != id);
            }
        }
        for dependent in document.dependents() {
            if let Some(source) = self.documents.get_mut(dependent) {
                source.dependencies.retain(|d| *d != id);
            }
        }
        self.by_uri.remove(&document.uri().store_string());
        self.dep_graph.remove_node(id);
        self.resolution_faults.remove(&id);
        self.publish_fault_delta(before);
        Ok(())
    }

    /// Reassign a document's URI. Fails fast when the URI is already held.
    pub fn update_uri(&mut self, id: DocumentId, new_uri: KnownUri) -> Result<(), TruthError> {
        let store = new_uri.store_string();
        if let Some(holder) = self.by_uri.get(&store) {
            if *holder != id {
                return Err(TruthError::UriInUse(store));
            }
            return Ok(());
        }
        let document = self
            .documents
            .get_mut(&id)
            .ok_or(TruthError::UnknownDocument(id))?;
        let old_store = document.uri().store_string();
        document.set_uri(new_uri.clone());
        self.by_uri.remove(&old_store);
        self.by_uri.insert(store, id);
        self.publish(Cause::DocumentUriChange {
            document: id,
            new_uri,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Run a transaction: the mutator records calls, and on return the batch
    /// is classified, applied, and broadcast. See the edit module for the
    /// fast paths and the invalidation rules.
    pub async fn edit<F>(&mut self, id: DocumentId, mutator: F) -> Result<(), TruthError>
    where
        F: FnOnce(&mut EditRecorder),
    {
        let document = self
            .documents
            .get(&id)
            .ok_or(TruthError::UnknownDocument(id))?;
        if document.in_edit.swap(true, Ordering::Relaxed) {
            return Err(TruthError::DoubleTransaction(id));
        }
        let guard = InEditGuard(document.in_edit.clone());

        let mut recorder = EditRecorder::default();
        mutator(&mut recorder);
        let calls = recorder.into_calls();
        if calls.is_empty() {
            drop(guard);
            return Ok(());
        }

        let before = self.global_fault_set();
        let document = self
            .documents
            .get_mut(&id)
            .expect("transaction target present");
        let outcome = edit::apply(document, calls)?;

        for cause in &outcome.causes {
            self.publish(cause.clone());
        }
        if outcome.mutated {
            let document = self
                .documents
                .get_mut(&id)
                .expect("transaction target present");
            document.clear_root_memo();
            self.publish(Cause::EditComplete { document: id });
            let document = self
                .documents
                .get_mut(&id)
                .expect("transaction target present");
            document.bump_version();
        }
        drop(guard);

        if !outcome.added_uri.is_empty() || !outcome.removed_uri.is_empty() {
            self.resolution_queue.push_back(ResolutionRequest {
                document: id,
                deleted: outcome.removed_uri.clone(),
                added: outcome.added_uri.clone(),
            });
            self.drive_resolution().await;
        }
        self.publish_fault_delta(before);

        for path in outcome.inflated {
            self.enqueue_verification(PhraseRef { document: id, path });
        }
        Ok(())
    }

    /// Apply editor-style range edits as one transaction.
    pub async fn edit_atomic(
        &mut self,
        id: DocumentId,
        edits: &[RangeEdit],
    ) -> Result<(), TruthError> {
        let document = self
            .documents
            .get(&id)
            .ok_or(TruthError::UnknownDocument(id))?;
        let calls = edit::convert_range_edits(document, edits);
        self.edit(id, move |recorder| {
            for call in calls {
                match call {
                    edit::EditCall::Delete { at, count } => recorder.delete(at, count),
                    edit::EditCall::Insert { at, text } => recorder.insert(text, at),
                    edit::EditCall::Update { at, text } => recorder.update(text, at),
                }
            }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Faults
    // ------------------------------------------------------------------

    /// The observable fault set of one document: parse faults plus
    /// resolution faults.
    pub fn faults(&self, id: DocumentId) -> Vec<Fault> {
        let mut all = Vec::new();
        if let Some(document) = self.documents.get(&id) {
            all.extend(document.parse_faults());
        }
        if let Some(resolution) = self.resolution_faults.get(&id) {
            for entries in resolution.values() {
                all.extend(entries.iter().cloned());
            }
        }
        all
    }

    pub(crate) fn global_fault_set(&self) -> BTreeSet<(DocumentId, Fault)> {
        let mut set = BTreeSet::new();
        for id in self.documents.keys() {
            for fault in self.faults(*id) {
                set.insert((*id, fault));
            }
        }
        set
    }

    pub(crate) fn publish_fault_delta(&mut self, before: BTreeSet<(DocumentId, Fault)>) {
        let after = self.global_fault_set();
        let added: Vec<Fault> = after
            .difference(&before)
            .map(|(_, fault)| fault.clone())
            .collect();
        let removed: Vec<Fault> = before
            .difference(&after)
            .map(|(_, fault)| fault.clone())
            .collect();
        if !added.is_empty() || !removed.is_empty() {
            self.publish(Cause::FaultChange { added, removed });
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The first-level subjects of a document's phrase trie.
    pub fn root_subjects(&self, id: DocumentId) -> Vec<Subject> {
        self.documents
            .get(&id)
            .map(|d| d.root_subjects())
            .unwrap_or_default()
    }

    /// Outbound forks of a phrase: for each clarifier term, the candidate
    /// successor phrases found in the phrase's ancestors (nearest first) and
    /// in the roots of the transitive dependency closure.
    pub fn outbounds(&self, document: DocumentId, path: &[PhraseKey]) -> Vec<Fork> {
        let Some(doc) = self.documents.get(&document) else {
            return Vec::new();
        };
        let Some(phrase) = doc.phrase(path) else {
            return Vec::new();
        };
        if phrase.is_hypothetical() {
            return Vec::new();
        }
        let closure = self.dependency_closure(document);
        let mut forks = Vec::new();
        for term in phrase.clarifiers() {
            let subject = Subject::Term(term.clone());
            let mut successors: Vec<PhraseRef> = Vec::new();
            for prefix_len in (0..path.len()).rev() {
                let Some(ancestor) = doc.phrase(&path[..prefix_len]) else {
                    continue;
                };
                for hit in ancestor.peek(&subject) {
                    successors.push(PhraseRef {
                        document,
                        path: hit.path().to_vec(),
                    });
                }
            }
            for dep in &closure {
                let Some(dep_doc) = self.documents.get(dep) else {
                    continue;
                };
                for hit in dep_doc.root_phrase().peek(&subject) {
                    successors.push(PhraseRef {
                        document: *dep,
                        path: hit.path().to_vec(),
                    });
                }
            }
            forks.push(Fork {
                origin: PhraseRef {
                    document,
                    path: path.to_vec(),
                },
                via: term.clone(),
                successors,
            });
        }
        forks
    }

    /// Find a term already interned by some parsed statement.
    pub fn find_term(&self, spelling: &str) -> Option<Term> {
        self.terms.read().find_spelling(spelling)
    }

    // ------------------------------------------------------------------
    // Verification queue
    // ------------------------------------------------------------------

    fn enqueue_verification(&mut self, phrase: PhraseRef) {
        if self.verified_seen.insert(phrase.clone()) {
            self.verification.push(phrase);
        }
    }

    fn enqueue_verification_of(&mut self, document: &Document) {
        let mut stack = vec![document.root_phrase()];
        let mut paths = Vec::new();
        while let Some(phrase) = stack.pop() {
            for child in phrase.forwardings().values() {
                paths.push(child.path().to_vec());
                stack.push(child);
            }
        }
        for path in paths {
            self.enqueue_verification(PhraseRef {
                document: document.id(),
                path,
            });
        }
    }

    /// Drain the phrases accumulated for verification since the last drain,
    /// in arrival order. Phrases disposed in the meantime are dropped.
    pub fn drain_verifications(&mut self) -> Vec<PhraseRef> {
        let pending = std::mem::take(&mut self.verification);
        self.verified_seen.clear();
        pending
            .into_iter()
            .filter(|phrase| {
                self.documents
                    .get(&phrase.document)
                    .and_then(|doc| doc.phrase(&phrase.path))
                    .is_some()
            })
            .collect()
    }
}
