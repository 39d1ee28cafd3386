use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::feed::{Completion, FeedSnapshot, FeedState, FetchTicket};
use crate::fetcher::{NewsPage, NewsSource};

/// Drives a [`FeedState`] against a [`NewsSource`] and publishes every
/// transition to subscribers.
///
/// The state lock is never held while a request is in flight, so other
/// callers see the pending status and have their overlapping requests
/// dropped by the state's guards. Each fetch runs on its own task, so a
/// caller that goes away mid-request still leaves the ticket completed.
pub struct FeedController<S> {
    shared: Arc<Shared<S>>,
}

struct Shared<S> {
    source: S,
    state: Mutex<FeedState>,
    updates: watch::Sender<FeedSnapshot>,
}

impl<S: NewsSource + 'static> FeedController<S> {
    pub fn new(source: S, category: impl Into<String>) -> Self {
        let state = FeedState::new(category);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(Shared {
                source,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    /// Receives a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.shared.updates.borrow().clone()
    }

    pub async fn select_category(&self, category: &str) -> Completion {
        let ticket = {
            let mut state = self.shared.state.lock().await;
            let ticket = state.select_category(category);
            self.shared.publish(&state);
            ticket
        };
        info!("Selected category {}", category);
        self.run(ticket).await
    }

    /// Returns `None` when the refresh was ignored.
    pub async fn refresh(&self) -> Option<Completion> {
        let ticket = {
            let mut state = self.shared.state.lock().await;
            let ticket = state.refresh()?;
            self.shared.publish(&state);
            ticket
        };
        Some(self.run(ticket).await)
    }

    /// Returns `None` when the request was ignored.
    pub async fn load_more(&self) -> Option<Completion> {
        let ticket = {
            let mut state = self.shared.state.lock().await;
            let ticket = state.load_more()?;
            self.shared.publish(&state);
            ticket
        };
        Some(self.run(ticket).await)
    }

    async fn run(&self, ticket: FetchTicket) -> Completion {
        let shared = self.shared.clone();
        let task = {
            let ticket = ticket.clone();
            tokio::spawn(async move {
                let result = shared.source.fetch_page(&ticket.request).await;
                shared.finish(&ticket, result).await
            })
        };

        match task.await {
            Ok(completion) => completion,
            Err(e) => {
                error!(
                    "Fetch task for {} page {} failed: {}",
                    ticket.request.category, ticket.request.page, e
                );
                let failure = FetchError::Network(format!("fetch task failed: {}", e));
                self.shared.finish(&ticket, Err(failure)).await
            }
        }
    }
}

impl<S> Shared<S> {
    async fn finish(
        &self,
        ticket: &FetchTicket,
        result: Result<NewsPage, FetchError>,
    ) -> Completion {
        if let Err(e) = &result {
            warn!(
                "Failed to fetch {} page {}: {}",
                ticket.request.category, ticket.request.page, e
            );
        }

        let mut state = self.state.lock().await;
        let completion = state.complete(ticket, result, Utc::now());
        match completion {
            Completion::Merged { added } => info!(
                "Merged {} page {}: {} new, {} total, has_more {}",
                ticket.request.category,
                ticket.request.page,
                added,
                state.articles().len(),
                state.has_more()
            ),
            Completion::Failed => {}
            Completion::Stale => {
                debug!("Result for {:?} arrived after being superseded", ticket.kind);
                return completion;
            }
        }
        self.publish(&state);
        completion
    }

    fn publish(&self, state: &FeedState) {
        self.updates.send_replace(state.snapshot());
    }
}
