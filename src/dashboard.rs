// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin request dashboard view-model.
//!
//! Each fetch is issued a [`FetchTicket`]. Only the result for the most
//! recently issued ticket is applied, so a slow response for a tab the admin
//! has already left cannot overwrite the current list.

use crate::error::AppError;
use crate::models::{PointRequestView, RequestStatus};
use crate::services::workflow::PointRequestWorkflow;
use serde::{Deserialize, Serialize};

/// Status filter tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTab {
    #[default]
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusTab {
    /// The storage filter for this tab; `All` means no filter.
    pub fn filter(self) -> Option<RequestStatus> {
        match self {
            StatusTab::Pending => Some(RequestStatus::Pending),
            StatusTab::Approved => Some(RequestStatus::Approved),
            StatusTab::Rejected => Some(RequestStatus::Rejected),
            StatusTab::All => None,
        }
    }
}

/// Identifies one in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub tab: StatusTab,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct RequestBoard {
    tab: StatusTab,
    generation: u64,
    loading: bool,
    requests: Vec<PointRequestView>,
    error: Option<String>,
}

impl RequestBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(&self) -> StatusTab {
        self.tab
    }

    pub fn requests(&self) -> &[PointRequestView] {
        &self.requests
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Switch tabs and start a fetch for the new tab.
    pub fn select_tab(&mut self, tab: StatusTab) -> FetchTicket {
        self.tab = tab;
        self.refresh()
    }

    /// Start a fetch for the current tab, superseding any in flight.
    pub fn refresh(&mut self) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            tab: self.tab,
            generation: self.generation,
        }
    }

    /// Apply a fetch result. Returns false, changing nothing, when `ticket`
    /// has been superseded.
    pub fn apply(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<PointRequestView>, AppError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(tab = ?ticket.tab, "Discarding stale request list");
            return false;
        }

        self.loading = false;
        match result {
            Ok(requests) => {
                self.requests = requests;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(tab = ?ticket.tab, error = %e, "Failed to load requests");
                self.requests.clear();
                self.error = Some(e.to_string());
            }
        }
        true
    }

    /// Fetch the current tab and apply the result.
    pub async fn load(&mut self, workflow: &PointRequestWorkflow) {
        let ticket = self.refresh();
        let result = workflow.list_requests(ticket.tab.filter()).await;
        self.apply(ticket, result);
    }
}
