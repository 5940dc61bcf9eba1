//! Inter-document reference resolution.
//!
//! Resolution runs off a FIFO work queue owned by the program: a transaction
//! (or document creation) enqueues its URI-statement deltas, and the drive
//! loop processes requests until the queue drains. Documents discovered
//! through references are loaded and parsed inline but their own references
//! are *queued*, not recursed into, which is what gives the first-loaded
//! document the chance to commit its edges before a back-reference is
//! checked for a cycle.

use petgraph::algo::has_path_connecting;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    document::DocumentId,
    fault::{Fault, FaultKind, FaultSource},
    program::Program,
    statement::StatementId,
    uri::KnownUri,
};

/// One unit of resolution work: a document plus the URI-statement deltas of
/// the transaction that produced it.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionRequest {
    pub document: DocumentId,
    pub deleted: Vec<StatementId>,
    pub added: Vec<StatementId>,
}

impl Program {
    /// Process resolution requests until the queue drains. Returns the ids of
    /// every document whose state may have changed (resolved documents plus
    /// any loaded along the way).
    pub(crate) async fn drive_resolution(&mut self) -> Vec<DocumentId> {
        let mut touched = Vec::new();
        while let Some(request) = self.resolution_queue.pop_front() {
            touched.push(request.document);
            self.resolve_references(request, &mut touched).await;
        }
        touched
    }

    async fn resolve_references(
        &mut self,
        request: ResolutionRequest,
        touched: &mut Vec<DocumentId>,
    ) {
        let document = request.document;
        let Some(doc) = self.documents.get(&document) else {
            tracing::warn!("resolution request for unknown document {document}");
            return;
        };
        let base_uri = doc.uri().clone();

        // Start from the committed list minus this transaction's deletions,
        // then merge the additions.
        let mut proposed: Vec<StatementId> = doc
            .uri_statement_ids()
            .iter()
            .filter(|id| !request.deleted.contains(id))
            .copied()
            .collect();
        for id in &request.added {
            if !proposed.contains(id) {
                proposed.push(*id);
            }
        }
        // Pin each statement to its current line and keep document order;
        // the duplicate check below compares lines directly, so the first
        // occurrence always wins regardless of merge order.
        let mut proposed: Vec<(usize, StatementId)> = proposed
            .into_iter()
            .filter_map(|id| doc.line_of(id).map(|line| (line, id)))
            .collect();
        proposed.sort_by_key(|(line, _)| *line);

        // Resolved store-form of each proposed statement's URI.
        let resolved: BTreeMap<StatementId, KnownUri> = proposed
            .iter()
            .filter_map(|(_, id)| {
                doc.statement_by_id(*id)
                    .and_then(|s| s.uri())
                    .map(|u| (*id, u.resolved_against(&base_uri)))
            })
            .collect();

        // Rebuild this document's resolution faults: carry over resource
        // faults for untouched statements, recompute all duplicate faults.
        let mut faults: BTreeMap<StatementId, Vec<Fault>> = self
            .resolution_faults
            .remove(&document)
            .unwrap_or_default();
        faults.retain(|id, _| !request.deleted.contains(id));
        for entries in faults.values_mut() {
            entries.retain(|f| f.kind != FaultKind::DuplicateReference);
        }
        for id in &request.added {
            faults.remove(id);
        }

        // A statement duplicates a reference when an equal URI occurs at an
        // earlier line; the first occurrence stays clean.
        for (line, id) in &proposed {
            let Some(uri) = resolved.get(id) else {
                continue;
            };
            let duplicated = proposed.iter().any(|(other_line, other_id)| {
                other_id != id
                    && other_line < line
                    && resolved.get(other_id).map(|u| u == uri) == Some(true)
            });
            if duplicated {
                let fault = self.reference_fault(document, *id, FaultKind::DuplicateReference);
                faults.entry(*id).or_default().push(fault);
            }
        }

        // Resolve the targets of this transaction's additions, loading
        // referenced documents that are not yet in the program. `proposed`
        // is in document order, so load order is deterministic.
        let added: Vec<(usize, StatementId)> = proposed
            .iter()
            .filter(|(_, id)| request.added.contains(id))
            .copied()
            .collect();
        let protocol = base_uri.protocol();
        for (_, id) in &added {
            let Some(target_uri) = resolved.get(id) else {
                continue;
            };
            if protocol.is_remote() && target_uri.protocol() == crate::uri::UriProtocol::File {
                let fault =
                    self.reference_fault(document, *id, FaultKind::InsecureResourceReference);
                faults.entry(*id).or_default().push(fault);
                continue;
            }
            let existing = self.by_uri.get(&target_uri.store_string()).copied();
            let target = match existing {
                Some(existing) => Some(existing),
                None => match self.load_referenced(target_uri.clone()).await {
                    Ok(loaded) => {
                        touched.push(loaded);
                        Some(loaded)
                    }
                    Err(error) => {
                        tracing::debug!("reference load failed for {target_uri}: {error}");
                        None
                    }
                },
            };
            let Some(target) = target else {
                let fault = self.reference_fault(document, *id, FaultKind::UnresolvedResource);
                faults.entry(*id).or_default().push(fault);
                continue;
            };
            // A path from the candidate back to this document means the new
            // edge would close a cycle.
            if target == document || has_path_connecting(&self.dep_graph, target, document, None) {
                let fault =
                    self.reference_fault(document, *id, FaultKind::CircularResourceReference);
                faults.entry(*id).or_default().push(fault);
            }
        }

        // Dependencies are rebuilt from the non-faulty statements in document
        // order, first occurrence of each URI winning.
        let doc = self
            .documents
            .get(&document)
            .expect("resolved document still present");
        let mut new_dependencies: Vec<DocumentId> = Vec::new();
        for (_, id) in &proposed {
            let has_error = faults
                .get(id)
                .map(|list| list.iter().any(Fault::is_error))
                .unwrap_or(false);
            if has_error {
                continue;
            }
            let Some(uri) = resolved.get(id) else {
                continue;
            };
            let Some(target) = self.by_uri.get(&uri.store_string()).copied() else {
                continue;
            };
            if target != document && !new_dependencies.contains(&target) {
                new_dependencies.push(target);
            }
        }

        let old_dependencies = doc.dependencies().to_vec();
        let added_deps: Vec<DocumentId> = new_dependencies
            .iter()
            .filter(|d| !old_dependencies.contains(d))
            .copied()
            .collect();
        let removed_deps: Vec<DocumentId> = old_dependencies
            .iter()
            .filter(|d| !new_dependencies.contains(d))
            .copied()
            .collect();
        for dep in &added_deps {
            if let Some(target) = self.documents.get_mut(dep) {
                if !target.dependents.contains(&document) {
                    target.dependents.push(document);
                }
            }
            self.dep_graph.add_edge(document, *dep, ());
        }
        for dep in &removed_deps {
            if let Some(target) = self.documents.get_mut(dep) {
                target.dependents.retain(|d| *d != document);
            }
            self.dep_graph.remove_edge(document, *dep);
        }

        let doc = self
            .documents
            .get_mut(&document)
            .expect("resolved document still present");
        doc.dependencies = new_dependencies;
        doc.uri_statements = proposed.into_iter().map(|(_, id)| id).collect();
        faults.retain(|_, list| !list.is_empty());
        if !faults.is_empty() {
            self.resolution_faults.insert(document, faults);
        }
        tracing::debug!(
            "resolved references of {document}: {} dependencies (+{} -{})",
            self.documents[&document].dependencies().len(),
            added_deps.len(),
            removed_deps.len()
        );
    }

    /// The transitive dependency closure of a document, excluding itself.
    pub(crate) fn dependency_closure(&self, document: DocumentId) -> Vec<DocumentId> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut stack = vec![document];
        while let Some(current) = stack.pop() {
            let Some(doc) = self.documents.get(&current) else {
                continue;
            };
            for dep in doc.dependencies() {
                if seen.insert(*dep) {
                    order.push(*dep);
                    stack.push(*dep);
                }
            }
        }
        order
    }

    fn reference_fault(
        &self,
        document: DocumentId,
        statement: StatementId,
        kind: FaultKind,
    ) -> Fault {
        let range = self
            .documents
            .get(&document)
            .and_then(|doc| doc.statement_by_id(statement))
            .map(|s| (s.indent() + 1, s.source_text().len() as u32 + 1))
            .unwrap_or((0, 0));
        Fault::new(kind, FaultSource::Statement(statement), range)
    }
}
