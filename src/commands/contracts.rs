use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{ContractsCommand, ListArgs, ShowArgs};
use crate::commands::{connect, guard_session};
use crate::display::{Badge, Tone, render_badge};
use crate::model::{ContractDetail, ContractRecord};
use crate::table::{self, EmptyState, FilterState, TableView};
use crate::util::{format_date, write_json_stdout};

#[derive(Debug, Serialize)]
struct ContractRow<'a> {
    id: &'a str,
    name: &'a str,
    parties: &'a [String],
    uploaded_on: Option<&'a str>,
    status: &'static str,
    status_tone: Tone,
    risk: &'static str,
    risk_tone: Tone,
}

impl<'a> From<&'a ContractRecord> for ContractRow<'a> {
    fn from(record: &'a ContractRecord) -> Self {
        Self {
            id: &record.id,
            name: &record.name,
            parties: &record.parties,
            uploaded_on: record.uploaded_on.as_deref(),
            status: record.status.label(),
            status_tone: record.status.tone(),
            risk: record.risk.label(),
            risk_tone: record.risk.tone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListResponse<'a> {
    search: &'a str,
    page: usize,
    total_pages: usize,
    total_count: usize,
    summary: String,
    empty_state: Option<EmptyState>,
    rows: Vec<ContractRow<'a>>,
}

pub async fn run(command: ContractsCommand) -> Result<()> {
    match command {
        ContractsCommand::List(args) => list(args).await,
        ContractsCommand::Show(args) => show(args).await,
    }
}

async fn list(args: ListArgs) -> Result<()> {
    let (client, store) = connect(&args.connection)?;
    let session = store.require()?;

    info!(api = %client.base_url(), "fetching contracts");
    let records = guard_session(&store, client.list_contracts(&session).await)
        .context("failed to load contracts")?;

    let mut state = FilterState {
        search: args.search.trim().to_string(),
        status: args.status.selection(),
        risk: args.risk.selection(),
        page: args.page,
    };
    let view = table::view(&records, &state);
    if view.page != state.page {
        warn!(
            requested = state.page,
            effective = view.page,
            total_pages = view.total_pages,
            "requested page out of range; clamped"
        );
        state.clamp_page(view.total_count);
    }
    info!(
        fetched = records.len(),
        matching = view.total_count,
        page = view.page,
        "contracts filtered"
    );

    if args.json {
        write_json_stdout(&ListResponse {
            search: &state.search,
            page: view.page,
            total_pages: view.total_pages,
            total_count: view.total_count,
            summary: view.summary(),
            empty_state: view.empty_state,
            rows: view.rows.iter().map(|record| ContractRow::from(*record)).collect(),
        })
    } else {
        write_list_text(&state, &view)
    }
}

fn write_list_text(state: &FilterState, view: &TableView<'_>) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    if let Some(empty) = view.empty_state {
        writeln!(output, "{}", empty.headline())?;
        writeln!(output, "{}", empty.message())?;
        if let Some(action) = empty.call_to_action() {
            writeln!(output, "Upload a contract: {action}")?;
        }
        output.flush()?;
        return Ok(());
    }

    writeln!(output, "Contracts: {}", view.total_count)?;
    for (offset, record) in view.rows.iter().enumerate() {
        let parties = if record.parties.is_empty() {
            "—".to_string()
        } else {
            record.parties.join(", ")
        };

        writeln!(
            output,
            "{}.\t{}\t{}\t{}\t{}\t{}",
            view.first_row() + offset,
            record.name,
            parties,
            format_date(record.uploaded_on.as_deref()),
            render_badge(&record.status),
            render_badge(&record.risk)
        )?;
        writeln!(output, "\tid: {}", record.id)?;
    }

    if view.total_pages > 1 {
        writeln!(output, "{}", view.summary())?;
        writeln!(output, "{}", navigation_line(state, view))?;
    }

    output.flush()?;
    Ok(())
}

fn navigation_line(state: &FilterState, view: &TableView<'_>) -> String {
    let mut navigation = format!("Page {} of {}", view.page, view.total_pages);
    if view.has_previous() {
        let mut previous = state.clone();
        previous.previous_page();
        navigation.push_str(&format!("\tprevious: --page {}", previous.page));
    }
    if view.has_next() {
        let mut next = state.clone();
        next.next_page(view.total_pages);
        navigation.push_str(&format!("\tnext: --page {}", next.page));
    }
    navigation
}

async fn show(args: ShowArgs) -> Result<()> {
    let (client, store) = connect(&args.connection)?;
    let session = store.require()?;

    info!(id = %args.id, "fetching contract");
    let detail = guard_session(&store, client.get_contract(&session, &args.id).await)
        .with_context(|| format!("failed to load contract {}", args.id))?;

    if args.json {
        write_json_stdout(&detail)
    } else {
        write_detail_text(&detail)
    }
}

fn write_detail_text(detail: &ContractDetail) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "{}", detail.name)?;
    writeln!(output, "\tid: {}", detail.id)?;
    writeln!(output, "\tuploaded_on: {}", format_date(detail.uploaded_on.as_deref()))?;
    writeln!(output, "\texpiry_date: {}", format_date(detail.expiry_date.as_deref()))?;
    writeln!(output, "\tstatus: {}", render_badge(&detail.status))?;
    writeln!(output, "\trisk: {}", render_badge(&detail.risk))?;

    output.flush()?;
    Ok(())
}
