use super::EvidenceChunk;

fn format_page(page: Option<u32>) -> String {
    match page {
        Some(page) => format!("page {page}"),
        None => "page unknown".to_string(),
    }
}

pub fn render_citation(chunk: &EvidenceChunk) -> String {
    format!(
        "{}, {}, {}% relevant, {}% confidence",
        chunk.contract_name,
        format_page(chunk.page),
        (chunk.relevance * 100.0).round(),
        chunk.confidence
    )
}
