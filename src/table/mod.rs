//! Search, filter and paginate over a fetched contract collection.
//!
//! Every call to [`view`] recomputes from scratch; the input collection is never
//! reordered or mutated, so the visible rows always follow fetch order.

use serde::Serialize;

use crate::model::{ContractRecord, ContractStatus, RiskLevel};


pub const PAGE_SIZE: usize = 10;

/// Either "all" or a single value of a closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq + Copy> Selection<T> {
    pub fn admits(&self, value: T) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub search: String,
    pub status: Selection<ContractStatus>,
    pub risk: Selection<RiskLevel>,
    pub page: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: Selection::All,
            risk: Selection::All,
            page: 1,
        }
    }
}

impl FilterState {
    pub fn is_filtering(&self) -> bool {
        !self.search.is_empty() || !self.status.is_all() || !self.risk.is_all()
    }

    pub fn matches(&self, record: &ContractRecord) -> bool {
        self.matches_search(record)
            && self.status.admits(record.status)
            && self.risk.admits(record.risk)
    }

    fn matches_search(&self, record: &ContractRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }

        let needle = self.search.to_lowercase();
        record.name.to_lowercase().contains(&needle)
            || record
                .parties
                .iter()
                .any(|party| party.to_lowercase().contains(&needle))
    }

    /// Pulls the stored page back into range after the match count changed.
    pub fn clamp_page(&mut self, match_count: usize) {
        self.page = effective_page(self.page, total_pages(match_count));
    }

    pub fn next_page(&mut self, total_pages: usize) {
        self.page = (self.page + 1).min(total_pages.max(1));
    }

    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    /// Nothing has been uploaded yet.
    NoContracts,
    /// Contracts exist but the active filters exclude all of them.
    NoMatches,
}

impl EmptyState {
    pub fn headline(self) -> &'static str {
        "No contracts found"
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NoContracts => "Upload your first contract to get started",
            Self::NoMatches => "Try adjusting your filters",
        }
    }

    pub fn call_to_action(self) -> Option<&'static str> {
        match self {
            Self::NoContracts => Some("contractwise upload <FILE>..."),
            Self::NoMatches => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView<'a> {
    pub rows: Vec<&'a ContractRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub empty_state: Option<EmptyState>,
}

impl TableView<'_> {
    /// 1-based index of the first visible row, 0 when nothing is visible.
    pub fn first_row(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            (self.page - 1) * PAGE_SIZE + 1
        }
    }

    pub fn last_row(&self) -> usize {
        ((self.page - 1) * PAGE_SIZE + self.rows.len()).min(self.total_count)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn summary(&self) -> String {
        format!(
            "Showing {} to {} of {} contracts",
            self.first_row(),
            self.last_row(),
            self.total_count
        )
    }
}

pub fn total_pages(match_count: usize) -> usize {
    match_count.div_ceil(PAGE_SIZE)
}

fn effective_page(requested: usize, total_pages: usize) -> usize {
    requested.clamp(1, total_pages.max(1))
}

pub fn view<'a>(records: &'a [ContractRecord], state: &FilterState) -> TableView<'a> {
    let matching = records
        .iter()
        .filter(|record| state.matches(record))
        .collect::<Vec<&ContractRecord>>();

    let total_count = matching.len();
    let total_pages = total_pages(total_count);
    let page = effective_page(state.page, total_pages);

    let start = (page - 1) * PAGE_SIZE;
    let rows = matching
        .into_iter()
        .skip(start)
        .take(PAGE_SIZE)
        .collect::<Vec<&ContractRecord>>();

    let empty_state = (total_count == 0).then(|| {
        if state.is_filtering() {
            EmptyState::NoMatches
        } else {
            EmptyState::NoContracts
        }
    });

    TableView {
        rows,
        page,
        total_pages,
        total_count,
        empty_state,
    }
}
