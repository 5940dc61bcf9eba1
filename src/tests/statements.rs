//! Statement parser coverage: flags, spans, faults, and the pattern and
//! infix sub-grammars.

use crate::{
    fault::{FaultKind, FaultSeverity},
    statement::{CruftObject, StatementId},
    subject::{Subject, TermTable},
    tests::helpers::{parse_line, parse_line_with},
    uri::UriProtocol,
};

#[test]
fn test_simple_declaration_annotation() {
    let statement = parse_line("A : B");
    assert_eq!(statement.indent(), 0);
    assert_eq!(statement.joint_position(), Some(2));
    assert_eq!(statement.declarations().len(), 1);
    assert_eq!(statement.annotations().len(), 1);
    assert_eq!(
        statement.declarations()[0].subject.to_string(),
        "A".to_string()
    );
    assert_eq!(statement.sum(), "B");
    assert!(!statement.is_noop());
    assert!(statement.faults().is_empty());
}

#[test]
fn test_multiple_annotations() {
    let statement = parse_line("C : D, E");
    assert_eq!(statement.joint_position(), Some(2));
    let annotations: Vec<String> = statement
        .annotations()
        .iter()
        .map(|span| span.subject.to_string())
        .collect();
    assert_eq!(annotations, ["D", "E"]);
    assert_eq!(statement.sum(), "D, E");
}

#[test]
fn test_span_boundaries() {
    let statement = parse_line("Alpha, Beta : Gamma");
    let decl: Vec<_> = statement
        .declarations()
        .iter()
        .map(|span| (span.boundary.start, span.boundary.end))
        .collect();
    assert_eq!(decl, [(0, 5), (7, 11)]);
    assert_eq!(statement.annotations()[0].boundary.start, 14);
    assert_eq!(statement.annotations()[0].boundary.end, 19);
}

#[test]
fn test_tabs_and_spaces_warning() {
    let statement = parse_line("\t A");
    assert_eq!(statement.indent(), 2);
    assert_eq!(statement.faults().len(), 1);
    let fault = &statement.faults()[0];
    assert_eq!(fault.kind, FaultKind::TabsAndSpaces);
    assert_eq!(fault.severity(), FaultSeverity::Warning);
    assert_eq!(fault.range, (1, 3));
    assert!(!statement.is_cruft());
}

#[test]
fn test_whitespace_and_comment_are_noops() {
    let blank = parse_line("   \t");
    assert!(blank.is_whitespace());
    assert!(blank.is_noop());
    assert!(blank.declarations().is_empty());

    let comment = parse_line("\t// a note here");
    assert!(comment.is_comment());
    assert!(comment.is_noop());
    assert_eq!(comment.comment_text(), Some("a note here"));

    // A comment token fused to following text is not a comment.
    let fused = parse_line("//not-a-comment");
    assert!(!fused.is_comment());
}

#[test]
fn test_unparsable_prefixes_are_cruft() {
    for (source, kind) in [
        (", x", FaultKind::StatementBeginsWithComma),
        ("...x", FaultKind::StatementBeginsWithEllipsis),
        ("\\ x", FaultKind::StatementBeginsWithEscapedSpace),
        ("\\", FaultKind::StatementContainsOnlyEscapeCharacter),
    ] {
        let statement = parse_line(source);
        assert!(statement.is_cruft(), "{source:?} should be cruft");
        assert_eq!(statement.faults().len(), 1, "{source:?}");
        assert_eq!(statement.faults()[0].kind, kind);
        assert!(statement
            .cruft_objects()
            .contains(&CruftObject::Statement));
        assert!(statement.declarations().is_empty());
    }
}

#[test]
fn test_uri_statement() {
    let statement = parse_line("file//dir/doc.truth");
    assert!(statement.has_uri());
    assert_eq!(statement.declarations().len(), 1);
    assert!(statement.annotations().is_empty());
    assert_eq!(statement.joint_position(), None);
    let uri = statement.uri().expect("uri subject");
    assert_eq!(uri.protocol(), UriProtocol::File);
    assert_eq!(uri.store_string(), "file://dir/doc.truth");
}

#[test]
fn test_uri_with_trailing_content_is_not_a_uri() {
    let statement = parse_line("file//doc extra");
    assert!(!statement.has_uri());
    assert_eq!(statement.declarations().len(), 1);
}

#[test]
fn test_vacuous_statement() {
    let statement = parse_line(":");
    assert!(statement.is_vacuous());
    assert_eq!(statement.joint_position(), Some(0));
    assert_eq!(statement.declarations().len(), 1);
    assert!(statement.declarations()[0].subject.is_void());
    assert!(statement.annotations().is_empty());
}

#[test]
fn test_refresh_statement() {
    let statement = parse_line("A, B :");
    assert!(statement.is_refresh());
    assert!(!statement.is_vacuous());
    assert_eq!(statement.declarations().len(), 2);
    assert!(statement.annotations().is_empty());
}

#[test]
fn test_joint_requires_space_or_line_end() {
    // A colon fused into text is part of the identifier.
    let fused = parse_line("A:B");
    assert_eq!(fused.joint_position(), None);
    assert_eq!(fused.declarations().len(), 1);
    assert_eq!(fused.declarations()[0].subject.to_string(), "A:B");

    let terminal = parse_line("A :");
    assert_eq!(terminal.joint_position(), Some(2));
}

#[test]
fn test_escaped_combinator_stays_in_identifier() {
    let statement = parse_line("Foo\\, Bar : X");
    assert_eq!(statement.declarations().len(), 1);
    assert_eq!(statement.declarations()[0].subject.to_string(), "Foo, Bar");
}

#[test]
fn test_duplicate_declaration_fault() {
    let statement = parse_line("A, B, A : C");
    let faults: Vec<_> = statement
        .faults()
        .iter()
        .filter(|f| f.kind == FaultKind::DuplicateDeclaration)
        .collect();
    assert_eq!(faults.len(), 1);
    assert!(statement
        .cruft_objects()
        .contains(&CruftObject::Declaration(2)));
    assert!(!statement.is_cruft());
}

#[test]
fn test_list_extending_list_fault() {
    let statement = parse_line("Items... : Entry...");
    let faults: Vec<_> = statement
        .faults()
        .iter()
        .filter(|f| f.kind == FaultKind::ListIntrinsicExtendingList)
        .collect();
    assert_eq!(faults.len(), 1);
    assert!(statement
        .cruft_objects()
        .contains(&CruftObject::Annotation(0)));
}

#[test]
fn test_list_marker_detection() {
    let mut terms = TermTable::default();
    let statement = parse_line_with("Items... : Entry", &mut terms);
    let term = statement.declarations()[0]
        .subject
        .as_term()
        .expect("term subject");
    assert!(term.is_list());
    assert_eq!(term.text(), "Items");

    // An escaped ellipsis is not a list marker.
    let escaped = parse_line_with("Items\\... : Entry", &mut terms);
    let term = escaped.declarations()[0].subject.as_term().unwrap();
    assert!(!term.is_list());
}

#[test]
fn test_total_pattern() {
    let statement = parse_line("/\\d+/ : Number");
    assert!(statement.has_pattern());
    assert!(statement.has_total_pattern());
    assert!(!statement.has_partial_pattern());
    assert_eq!(statement.declarations().len(), 1);
    let pattern = statement.pattern().expect("pattern subject");
    assert!(pattern.is_total());
    assert!(!pattern.can_match_empty());
    assert!(pattern.matches("12"));
    assert!(!statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PatternCanMatchEmpty));
    assert_eq!(statement.annotations().len(), 1);
    assert_eq!(statement.sum(), "Number");
}

#[test]
fn test_partial_pattern_stops_at_joint() {
    let statement = parse_line("/\\d+ : Number");
    assert!(statement.has_partial_pattern());
    let pattern = statement.pattern().unwrap();
    assert!(!pattern.is_total());
    assert!(pattern.matches("12 widgets"));
    assert!(!pattern.matches("x12"));
    assert_eq!(statement.annotations().len(), 1);
}

#[test]
fn test_pattern_digest_tracks_annotations() {
    let one = parse_line("/\\d+/ : Number");
    let two = parse_line("/\\d+/ : Number");
    let three = parse_line("/\\d+/ : Quantity");
    assert_eq!(
        one.pattern().unwrap().digest(),
        two.pattern().unwrap().digest()
    );
    assert_ne!(
        one.pattern().unwrap().digest(),
        three.pattern().unwrap().digest()
    );
}

#[test]
fn test_pattern_without_annotation_warns() {
    let statement = parse_line("/\\d+/");
    assert!(statement.has_pattern());
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PatternWithoutAnnotation));
    // A warning does not make the statement cruft.
    assert!(!statement.is_cruft());
}

#[test]
fn test_pattern_can_match_empty_fault() {
    let statement = parse_line("/\\d*/ : Number");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PatternCanMatchEmpty));
    assert!(statement.is_cruft());
}

#[test]
fn test_partial_pattern_matching_combinator_fault() {
    let statement = parse_line("/[,x]+ : Odd");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PatternPartialWithCombinator));
}

#[test]
fn test_unterminated_group_is_invalid() {
    let statement = parse_line("/(ab : T");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PatternInvalid));
    assert!(statement.is_cruft());
    assert!(!statement.has_pattern());
}

#[test]
fn test_empty_pattern_is_invalid() {
    let statement = parse_line("/ : T");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PatternInvalid));
}

#[test]
fn test_group_alternation_matches() {
    let statement = parse_line("/(red|green|blue)/ : Color");
    let pattern = statement.pattern().unwrap();
    assert!(pattern.matches("green"));
    assert!(!pattern.matches("mauve"));
    assert!(pattern.is_total());
}

#[test]
fn test_set_ranges_and_classes() {
    let statement = parse_line("/[a-f0-9]{2}/ : Byte");
    let pattern = statement.pattern().unwrap();
    assert!(pattern.matches("a0"));
    assert!(!pattern.matches("g0"));
    assert!(!pattern.matches("a"));
}

#[test]
fn test_negated_set() {
    let statement = parse_line("/[^abc]+/ : Other");
    let pattern = statement.pattern().unwrap();
    assert!(pattern.matches("xyz"));
    assert!(!pattern.matches("abc"));
}

#[test]
fn test_quantifier_bounds() {
    let statement = parse_line("/\\d{2,4}/ : Pin");
    let pattern = statement.pattern().unwrap();
    assert!(!pattern.matches("1"));
    assert!(pattern.matches("12"));
    assert!(pattern.matches("1234"));
    assert!(!pattern.matches("12345"));
}

#[test]
fn test_population_infix_parses() {
    let statement = parse_line("/x<Size>/ : Dim");
    let pattern = statement.pattern().unwrap();
    assert!(pattern.has_infixes());
    let infix = pattern.infixes().next().unwrap();
    assert!(infix.is_population());
    assert!(!infix.has_joint());
    assert_eq!(infix.declarations.len(), 1);
    assert_eq!(infix.declarations[0].term.text(), "Size");
}

#[test]
fn test_population_infix_with_multiple_declarations_faults() {
    let statement = parse_line("/x<a, b>/ : T");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PopulationInfixHasMultipleDeclarations));
}

#[test]
fn test_self_referential_infix_faults() {
    let statement = parse_line("/x<n : n>/ : T");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::InfixHasSelfReferentialType));
}

#[test]
fn test_infix_list_operator_faults() {
    let statement = parse_line("/x<n...>/ : T");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::InfixUsingListOperator));
}

#[test]
fn test_portability_infix_duplicate_definition_faults() {
    let statement = parse_line("/x< : A>< : A>/ : T");
    assert!(statement
        .faults()
        .iter()
        .any(|f| f.kind == FaultKind::PortabilityInfixHasMultipleDefinitions));
    let pattern = statement.pattern().unwrap();
    assert_eq!(pattern.infixes().count(), 2);
    assert!(pattern.infixes().all(|i| i.is_portability()));
}

#[test]
fn test_nominal_and_pattern_infix_kinds() {
    let nominal = parse_line("/x</name/>/ : T");
    assert!(nominal.pattern().unwrap().infixes().next().unwrap().is_nominal());

    let hole = parse_line("/x<<Sub>>/ : T");
    assert!(hole.pattern().unwrap().infixes().next().unwrap().is_pattern());
}

#[test]
fn test_statement_ids_are_carried() {
    let mut terms = TermTable::default();
    let statement = crate::statement::parser::parse(StatementId(7), "A : B", &mut terms);
    assert_eq!(statement.id(), StatementId(7));
    assert!(!statement.is_disposed());
}

#[test]
fn test_interned_terms_share_identity() {
    let mut terms = TermTable::default();
    let one = parse_line_with("Product : Thing", &mut terms);
    let two = parse_line_with("Sku : Product", &mut terms);
    let declared = one.declarations()[0].subject.clone();
    assert_eq!(
        declared,
        Subject::Term(terms.find_spelling("Product").unwrap())
    );
    // Same spelling on different sides and lines interns to the same term.
    let annotated = two.annotations()[0].subject.as_term().unwrap();
    assert_eq!(
        one.declarations()[0].subject.as_term().unwrap().id(),
        annotated.id()
    );
    let sku = two.declarations()[0].subject.as_term().unwrap();
    assert_ne!(annotated.id(), sku.id());
}
