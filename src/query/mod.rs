//! Question submission and evidence correlation.

use serde::Serialize;

use crate::model::{AskResponse, RawChunk};

mod citation;
#[cfg(test)]
mod tests;

pub use citation::render_citation;

pub const EXAMPLE_QUESTIONS: [&str; 4] = [
    "What are the termination clauses in my contracts?",
    "Which contracts expire in the next 6 months?",
    "What liability limitations exist across all agreements?",
    "Show me all payment terms and deadlines",
];

const UNKNOWN_SOURCE: &str = "Unknown contract";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceChunk {
    pub rank: usize,
    pub contract_name: String,
    pub page: Option<u32>,
    pub text: String,
    pub relevance: f64,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub confidence: u8,
    pub evidence: Vec<EvidenceChunk>,
}

/// Maps a similarity score onto a whole percentage.
pub fn confidence_from_similarity(similarity: f64) -> u8 {
    percent(clamp_unit(similarity) * 100.0)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

fn evidence_chunk(rank: usize, raw: RawChunk) -> EvidenceChunk {
    let relevance = clamp_unit(raw.similarity);
    let confidence = match raw.confidence {
        Some(supplied) => percent(supplied),
        None => confidence_from_similarity(raw.similarity),
    };

    EvidenceChunk {
        rank,
        contract_name: raw
            .metadata
            .contract_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        page: raw.metadata.page,
        text: raw.text,
        relevance,
        confidence,
    }
}

/// Builds the display result. Evidence keeps the order the backend ranked it in.
pub fn correlate(question: &str, response: AskResponse) -> QueryResult {
    let evidence = response
        .chunks
        .into_iter()
        .enumerate()
        .map(|(index, raw)| evidence_chunk(index + 1, raw))
        .collect::<Vec<EvidenceChunk>>();

    let confidence = match response.confidence {
        Some(supplied) => percent(supplied),
        None => mean_confidence(&evidence),
    };

    QueryResult {
        question: question.to_string(),
        answer: response.answer,
        confidence,
        evidence,
    }
}

fn mean_confidence(evidence: &[EvidenceChunk]) -> u8 {
    if evidence.is_empty() {
        return 0;
    }

    let total = evidence
        .iter()
        .map(|chunk| f64::from(chunk.confidence))
        .sum::<f64>();
    percent(total / evidence.len() as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("question must not be empty")]
pub struct BlankQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QueryView {
    Idle,
    Pending { question: String },
    Answered(QueryResult),
    Failed { question: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Superseded,
}

/// Tracks submissions so that only the most recently initiated one is shown.
#[derive(Debug)]
pub struct QuerySession {
    issued: u64,
    pending: Option<(Ticket, String)>,
    view: QueryView,
}

impl Default for QuerySession {
    fn default() -> Self {
        Self {
            issued: 0,
            pending: None,
            view: QueryView::Idle,
        }
    }
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &QueryView {
        &self.view
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.view, QueryView::Pending { .. })
    }

    /// Accepts a question for dispatch. Blank input leaves the session untouched.
    pub fn submit(&mut self, question: &str) -> Result<(Ticket, String), BlankQuestion> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BlankQuestion);
        }

        self.issued += 1;
        let ticket = Ticket(self.issued);
        self.pending = Some((ticket, question.to_string()));
        self.view = QueryView::Pending {
            question: question.to_string(),
        };
        Ok((ticket, question.to_string()))
    }

    pub fn resolve<E: std::fmt::Display>(
        &mut self,
        ticket: Ticket,
        outcome: Result<AskResponse, E>,
    ) -> Resolution {
        let question = match self.pending.take() {
            Some((pending, question)) if pending == ticket => question,
            other => {
                self.pending = other;
                return Resolution::Superseded;
            }
        };

        self.view = match outcome {
            Ok(response) => QueryView::Answered(correlate(&question, response)),
            Err(err) => QueryView::Failed {
                question,
                message: err.to_string(),
            },
        };
        Resolution::Applied
    }
}
