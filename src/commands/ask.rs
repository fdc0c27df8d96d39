use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::cli::AskArgs;
use crate::commands::{connect, guard_session};
use crate::model::AskResponse;
use crate::query::{EXAMPLE_QUESTIONS, QueryResult, QuerySession, QueryView, Resolution, Ticket, render_citation};
use crate::session::{Session, SessionStore};
use crate::util::write_json_stdout;

pub async fn run(args: AskArgs) -> Result<()> {
    if args.examples {
        write_examples()?;
        if args.question.is_none() && !args.interactive {
            return Ok(());
        }
    }

    let (client, store) = connect(&args.connection)?;
    let session = store.require()?;

    if args.interactive {
        return interactive(client, store, session, args.json).await;
    }

    let Some(question) = args.question else {
        bail!("provide a question, or use --interactive or --examples");
    };

    let mut query = QuerySession::new();
    let (ticket, question) = query.submit(&question)?;
    info!(question = %question, "asking");

    let outcome = client.ask(&session, &question).await;
    if matches!(outcome, Err(ApiError::Unauthorized)) {
        return guard_session(&store, outcome).map(|_| ());
    }
    query.resolve(ticket, outcome);

    write_view(query.view(), args.json)?;
    if let QueryView::Failed { message, .. } = query.view() {
        bail!("query failed: {message}");
    }
    Ok(())
}

/// Reads questions from stdin until EOF. Each line is dispatched at once;
/// an answer arriving after a newer question was asked is dropped.
async fn interactive(client: ApiClient, store: SessionStore, session: Session, json: bool) -> Result<()> {
    let (answers_tx, mut answers_rx) =
        mpsc::unbounded_channel::<(Ticket, Result<AskResponse, ApiError>)>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut query = QuerySession::new();
    let mut stdin_open = true;

    info!("reading questions from stdin; Ctrl-D to finish");
    loop {
        if !stdin_open && !query.is_pending() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read question from stdin")? else {
                    stdin_open = false;
                    continue;
                };
                let Ok((ticket, question)) = query.submit(&line) else {
                    continue;
                };

                info!(question = %question, "asking");
                let client = client.clone();
                let session = session.clone();
                let answers_tx = answers_tx.clone();
                tokio::spawn(async move {
                    let outcome = client.ask(&session, &question).await;
                    let _ = answers_tx.send((ticket, outcome));
                });
            }
            Some((ticket, outcome)) = answers_rx.recv() => {
                if matches!(outcome, Err(ApiError::Unauthorized)) {
                    return guard_session(&store, outcome).map(|_| ());
                }
                match query.resolve(ticket, outcome) {
                    Resolution::Applied => write_view(query.view(), json)?,
                    Resolution::Superseded => debug!("dropping answer to an earlier question"),
                }
            }
        }
    }

    Ok(())
}

fn write_examples() -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Example questions:")?;
    for example in EXAMPLE_QUESTIONS {
        writeln!(output, "\t{example}")?;
    }
    output.flush()?;
    Ok(())
}

fn write_view(view: &QueryView, json: bool) -> Result<()> {
    if json {
        return write_json_stdout(view);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    match view {
        QueryView::Idle => {}
        QueryView::Pending { question } => writeln!(output, "Analyzing: {question}")?,
        QueryView::Answered(result) => write_answer(&mut output, result)?,
        QueryView::Failed { question, message } => {
            writeln!(output, "Question: {question}")?;
            writeln!(output, "Query failed: {message}")?;
        }
    }
    output.flush()?;
    Ok(())
}

fn write_answer(output: &mut impl Write, result: &QueryResult) -> Result<()> {
    writeln!(output, "Question: {}", result.question)?;
    writeln!(output, "Answer ({}% confidence):", result.confidence)?;
    for line in result.answer.lines() {
        writeln!(output, "\t{line}")?;
    }

    if result.evidence.is_empty() {
        writeln!(output, "Evidence: none returned")?;
        return Ok(());
    }

    writeln!(output, "Evidence: {}", result.evidence.len())?;
    for chunk in &result.evidence {
        writeln!(output, "{}.\t{}", chunk.rank, render_citation(chunk))?;
        writeln!(output, "\ttext: \"{}\"", chunk.text.trim())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::EvidenceChunk;

    fn result(evidence: Vec<EvidenceChunk>) -> QueryResult {
        QueryResult {
            question: "What are the termination clauses?".to_string(),
            answer: "Either party may terminate\nwith 30 days notice.".to_string(),
            confidence: 86,
            evidence,
        }
    }

    fn render(result: &QueryResult) -> String {
        let mut buffer = Vec::new();
        write_answer(&mut buffer, result).expect("render");
        String::from_utf8(buffer).expect("utf8")
    }

    #[test]
    fn answer_lists_evidence_in_rank_order() {
        let text = render(&result(vec![
            EvidenceChunk {
                rank: 1,
                contract_name: "Software License Agreement - Adobe".to_string(),
                page: Some(5),
                text: " Termination requires 30 days notice. ".to_string(),
                relevance: 0.89,
                confidence: 89,
            },
            EvidenceChunk {
                rank: 2,
                contract_name: "Unknown contract".to_string(),
                page: None,
                text: "Renewal is automatic.".to_string(),
                relevance: 0.82,
                confidence: 82,
            },
        ]));

        assert!(text.starts_with("Question: What are the termination clauses?\n"));
        assert!(text.contains("Answer (86% confidence):\n\tEither party may terminate\n\twith 30 days notice.\n"));
        assert!(text.contains("Evidence: 2\n1.\tSoftware License Agreement - Adobe, page 5"));
        assert!(text.contains("\ttext: \"Termination requires 30 days notice.\""));
        let first = text.find("1.\t").expect("first rank");
        let second = text.find("2.\tUnknown contract, page unknown").expect("second rank");
        assert!(first < second);
    }

    #[test]
    fn answer_without_chunks_says_so() {
        let text = render(&result(Vec::new()));
        assert!(text.ends_with("Evidence: none returned\n"));
    }

    #[tokio::test]
    async fn rejected_session_on_ask_clears_stored_token() {
        use axum::Router;
        use axum::http::StatusCode;
        use axum::routing::post;

        use crate::commands::testing::{connection, serve, signed_in};

        let router = Router::new().route(
            "/ask/",
            post(|| async { (StatusCode::UNAUTHORIZED, "{\"detail\": \"Invalid token\"}") }),
        );
        let base_url = serve(router).await;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = signed_in(dir.path());
        let args = AskArgs {
            connection: connection(dir.path(), base_url),
            question: Some("Which contracts expire in the next 6 months?".to_string()),
            interactive: false,
            examples: false,
            json: false,
        };

        let err = run(args).await.expect_err("rejected session");
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));
        assert!(store.load().expect("load").is_none());
    }
}
