use super::*;
use crate::model::ChunkMetadata;

fn chunk(name: &str, page: u32, similarity: f64) -> RawChunk {
    RawChunk {
        text: format!("clause from {name}"),
        similarity,
        confidence: None,
        metadata: ChunkMetadata {
            contract_name: Some(name.to_string()),
            page: Some(page),
        },
    }
}

fn response(chunks: Vec<RawChunk>) -> AskResponse {
    AskResponse {
        answer: "Either party may terminate with 30 days notice.".to_string(),
        confidence: None,
        chunks,
    }
}

#[test]
fn evidence_keeps_backend_order() {
    let result = correlate(
        "termination?",
        response(vec![
            chunk("Employment Contract - John Smith", 3, 0.42),
            chunk("Software License Agreement - Adobe", 5, 0.95),
            chunk("Service Agreement - CloudHost", 8, 0.76),
        ]),
    );

    let names = result
        .evidence
        .iter()
        .map(|chunk| chunk.contract_name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        names,
        vec![
            "Employment Contract - John Smith",
            "Software License Agreement - Adobe",
            "Service Agreement - CloudHost",
        ]
    );
    let ranks = result.evidence.iter().map(|chunk| chunk.rank).collect::<Vec<usize>>();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[test]
fn confidence_is_derived_from_similarity() {
    assert_eq!(confidence_from_similarity(0.954), 95);
    assert_eq!(confidence_from_similarity(0.956), 96);
    assert_eq!(confidence_from_similarity(-1.0), 0);
    assert_eq!(confidence_from_similarity(1.7), 100);
    assert_eq!(confidence_from_similarity(f64::NAN), 0);

    let result = correlate("q", response(vec![chunk("A", 1, 0.9), chunk("B", 2, 0.6)]));
    assert_eq!(result.evidence[0].confidence, 90);
    assert_eq!(result.evidence[1].confidence, 60);
    assert_eq!(result.confidence, 75);
}

#[test]
fn backend_confidence_takes_precedence() {
    let mut supplied = chunk("A", 1, 0.5);
    supplied.confidence = Some(88.0);
    let mut body = response(vec![supplied]);
    body.confidence = Some(92.0);

    let result = correlate("q", body);
    assert_eq!(result.evidence[0].confidence, 88);
    assert_eq!(result.evidence[0].relevance, 0.5);
    assert_eq!(result.confidence, 92);
}

#[test]
fn empty_chunks_yield_answer_without_evidence() {
    let result = correlate("q", response(Vec::new()));
    assert_eq!(result.answer, "Either party may terminate with 30 days notice.");
    assert!(result.evidence.is_empty());
    assert_eq!(result.confidence, 0);
}

#[test]
fn missing_source_name_is_labelled() {
    let mut raw = chunk("", 1, 0.3);
    raw.metadata.page = None;

    let result = correlate("q", response(vec![raw]));
    assert_eq!(result.evidence[0].contract_name, "Unknown contract");
    assert_eq!(result.evidence[0].page, None);
}

#[test]
fn blank_questions_are_rejected_without_touching_state() {
    let mut session = QuerySession::new();
    let (ticket, _) = session.submit("What expires soon?").expect("accepted");
    session.resolve::<String>(ticket, Ok(response(Vec::new())));
    let before = session.view().clone();

    assert_eq!(session.submit(""), Err(BlankQuestion));
    assert_eq!(session.submit("   \t "), Err(BlankQuestion));
    assert_eq!(session.view(), &before);
}

#[test]
fn submitted_question_is_trimmed_and_pending() {
    let mut session = QuerySession::new();
    assert_eq!(session.view(), &QueryView::Idle);

    let (_, question) = session.submit("  liability caps?  ").expect("accepted");
    assert_eq!(question, "liability caps?");
    assert!(session.is_pending());
}

#[test]
fn stale_resolution_does_not_overwrite_newer_pending_state() {
    let mut session = QuerySession::new();
    let (first, _) = session.submit("first question").expect("accepted");
    let (second, _) = session.submit("second question").expect("accepted");

    assert_eq!(
        session.resolve::<String>(first, Ok(response(Vec::new()))),
        Resolution::Superseded
    );
    assert_eq!(
        session.view(),
        &QueryView::Pending {
            question: "second question".to_string()
        }
    );

    assert_eq!(
        session.resolve::<String>(second, Ok(response(vec![chunk("A", 1, 0.8)]))),
        Resolution::Applied
    );
    match session.view() {
        QueryView::Answered(result) => {
            assert_eq!(result.question, "second question");
            assert_eq!(result.evidence.len(), 1);
        }
        other => panic!("expected answer, got {other:?}"),
    }

    assert_eq!(
        session.resolve::<String>(second, Err("duplicate".to_string())),
        Resolution::Superseded
    );
    assert!(matches!(session.view(), QueryView::Answered(_)));
}

#[test]
fn failure_clears_pending_into_distinct_state() {
    let mut session = QuerySession::new();
    let (ticket, _) = session.submit("payment terms?").expect("accepted");

    let resolution = session.resolve(ticket, Err::<AskResponse, _>("No documents found for this user."));
    assert_eq!(resolution, Resolution::Applied);
    assert!(!session.is_pending());
    assert_eq!(
        session.view(),
        &QueryView::Failed {
            question: "payment terms?".to_string(),
            message: "No documents found for this user.".to_string(),
        }
    );
}
