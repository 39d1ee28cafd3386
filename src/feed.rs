//! Paginated feed state and its transition function.
//!
//! `FeedState` never performs I/O. Each user event either yields a
//! [`FetchTicket`] describing the one request to issue or is ignored; the
//! request's outcome is handed back through [`FeedState::complete`]. Only the
//! most recently issued ticket can change the state, so a result that lost
//! a race with a category switch is dropped instead of merged.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::article::{normalize_entries, Article};
use crate::error::FetchError;
use crate::fetcher::{NewsPage, PageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Idle,
    /// Page 1 of a newly selected category is pending
    Loading,
    /// A user-requested reload of page 1 is pending
    Refreshing,
    /// A subsequent page is pending
    LoadingMore,
    Error,
}

impl FeedStatus {
    pub fn is_fetching(self) -> bool {
        matches!(
            self,
            FeedStatus::Loading | FeedStatus::Refreshing | FeedStatus::LoadingMore
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    Refresh,
    More,
}

/// The single live request of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub kind: FetchKind,
    pub request: PageRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The page landed; `added` articles are new to the list
    Merged { added: usize },
    Failed,
    /// Superseded before it finished; nothing changed
    Stale,
}

/// Read-only copy of the feed handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub category: String,
    pub articles: Vec<Article>,
    pub page: u32,
    pub has_more: bool,
    pub status: FeedStatus,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedState {
    category: String,
    articles: Vec<Article>,
    page: u32,
    has_more: bool,
    status: FeedStatus,
    last_error: Option<String>,
    generation: u64,
    // page 1 of `category` has been merged
    primed: bool,
}

impl FeedState {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            articles: Vec::new(),
            page: 1,
            has_more: true,
            status: FeedStatus::Idle,
            last_error: None,
            generation: 0,
            primed: false,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            category: self.category.clone(),
            articles: self.articles.clone(),
            page: self.page,
            has_more: self.has_more,
            status: self.status,
            last_error: self.last_error.clone(),
        }
    }

    /// Switches category and requests its first page.
    ///
    /// Always accepted. A fetch still in flight is superseded. The current
    /// articles stay visible until the new page arrives.
    pub fn select_category(&mut self, category: impl Into<String>) -> FetchTicket {
        self.category = category.into();
        self.page = 1;
        self.has_more = true;
        self.primed = false;
        self.begin(FeedStatus::Loading, FetchKind::Initial, 1)
    }

    /// Reloads page 1 of the current category. Ignored while a fetch is pending.
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        if self.status.is_fetching() {
            debug!("Ignoring refresh of {}: fetch already pending", self.category);
            return None;
        }
        Some(self.begin(FeedStatus::Refreshing, FetchKind::Refresh, 1))
    }

    /// Requests the page after the last merged one.
    ///
    /// Ignored while a fetch is pending, when the server reported no more
    /// pages, or before the first page of the category has landed.
    pub fn load_more(&mut self) -> Option<FetchTicket> {
        if self.status.is_fetching() {
            debug!("Ignoring load more of {}: fetch already pending", self.category);
            return None;
        }
        if !self.has_more {
            debug!("Ignoring load more of {}: no more pages", self.category);
            return None;
        }
        if !self.primed {
            debug!("Ignoring load more of {}: first page not loaded", self.category);
            return None;
        }
        let next = self.page + 1;
        Some(self.begin(FeedStatus::LoadingMore, FetchKind::More, next))
    }

    fn begin(&mut self, status: FeedStatus, kind: FetchKind, page: u32) -> FetchTicket {
        self.generation += 1;
        self.status = status;
        self.last_error = None;
        FetchTicket {
            generation: self.generation,
            kind,
            request: PageRequest {
                category: self.category.clone(),
                page,
            },
        }
    }

    fn is_live(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && self.status.is_fetching()
    }

    /// Applies the outcome of the request described by `ticket`.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<NewsPage, FetchError>,
        fetched_at: DateTime<Utc>,
    ) -> Completion {
        if !self.is_live(ticket) {
            debug!(
                "Discarding stale result for {} page {}",
                ticket.request.category, ticket.request.page
            );
            return Completion::Stale;
        }

        let page = ticket.request.page;
        match result {
            Ok(news) => {
                let incoming =
                    normalize_entries(&news.entries, &ticket.request.category, page, fetched_at);

                let added = if page == 1 {
                    self.articles = dedup_by_id(incoming);
                    self.articles.len()
                } else {
                    append_new(&mut self.articles, incoming)
                };

                self.has_more = news.has_more;
                self.page = page;
                self.primed = true;
                self.status = FeedStatus::Idle;
                Completion::Merged { added }
            }
            Err(e) => {
                if page == 1 {
                    self.articles.clear();
                    self.page = 1;
                    self.primed = false;
                }
                self.last_error = Some(e.to_string());
                self.status = FeedStatus::Error;
                Completion::Failed
            }
        }
    }
}

/// Keeps the first article for each id, in order.
pub fn dedup_by_id(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

/// Appends articles whose id is not yet present. Returns how many were added.
pub fn append_new(existing: &mut Vec<Article>, incoming: Vec<Article>) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|a| a.id.clone()).collect();
    let before = existing.len();
    existing.extend(incoming.into_iter().filter(|a| seen.insert(a.id.clone())));
    existing.len() - before
}
