use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use crate::app::Result;
use crate::domain::FetchWindow;
use crate::fetch::{remote_fetch_error, validate, FetchBudget, FetchStrategy, Page};
use crate::remote::{PlatformClient, SearchMode};

/// Pages through `from:<account>` search results bounded to the window's
/// days, then filters them to the exact window.
pub struct SearchStrategy {
    client: Arc<dyn PlatformClient>,
    extra_terms: Option<String>,
}

impl SearchStrategy {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self {
            client,
            extra_terms: None,
        }
    }

    pub fn with_terms(mut self, terms: Option<String>) -> Self {
        self.extra_terms = terms.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn query(&self, account: &str, window: &FetchWindow) -> String {
        let mut query = format!(
            "from:{} since:{} until:{}",
            account,
            window.start_day(),
            window.end_day()
        );
        if let Some(terms) = &self.extra_terms {
            query.push(' ');
            query.push_str(terms.trim());
        }
        query
    }
}

struct SearchState {
    cursor: Option<String>,
    pages_requested: usize,
    done: bool,
}

impl FetchStrategy for SearchStrategy {
    fn name(&self) -> &'static str {
        "search"
    }

    fn fetch<'a>(
        &'a self,
        account: &'a str,
        window: FetchWindow,
        budget: FetchBudget,
    ) -> BoxStream<'a, Result<Page>> {
        let query = self.query(account, &window);
        let initial = SearchState {
            cursor: None,
            pages_requested: 0,
            done: false,
        };

        stream::unfold(initial, move |mut state| {
            let query = query.clone();
            async move {
                if state.done || state.pages_requested >= budget.max_pages {
                    return None;
                }
                state.pages_requested += 1;

                let result = self
                    .client
                    .search(
                        &query,
                        budget.page_size,
                        SearchMode::Latest,
                        state.cursor.as_deref(),
                    )
                    .await;

                let response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        state.done = true;
                        return Some((Err(remote_fetch_error(account, e)), state));
                    }
                };

                if response.items.is_empty() {
                    return None;
                }
                tracing::debug!(
                    account,
                    page = state.pages_requested,
                    count = response.items.len(),
                    "search page"
                );

                state.done = response.next_cursor.is_none();
                state.cursor = response.next_cursor;

                let mut page = Page::default();
                for wire in response.items {
                    if let Some(record) = validate(account, wire) {
                        page.push(record, &window);
                    }
                }
                Some((Ok(page), state))
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SluiceError;
    use crate::domain::record::fixtures::wire;
    use crate::remote::mock::MockClient;

    fn budget(max_pages: usize) -> FetchBudget {
        FetchBudget {
            max_scan: 100,
            max_pages,
            page_size: 20,
        }
    }

    #[test]
    fn test_query_shape() {
        let client = Arc::new(MockClient::new());
        let strategy = SearchStrategy::new(client).with_terms(Some("-filter:replies".into()));
        let window = FetchWindow::for_date("2024-01-02").unwrap();
        assert_eq!(
            strategy.query("alice", &window),
            "from:alice since:2024-01-02 until:2024-01-03 -filter:replies"
        );
    }

    #[tokio::test]
    async fn test_follows_cursor_and_filters_window() {
        let window = FetchWindow::for_date("2024-01-02").unwrap();
        let day = window.start_inclusive;
        let client = Arc::new(MockClient::new().with_search_pages(
            "alice",
            vec![
                vec![wire("3", "alice", day + 500, "a"), wire("2", "alice", day - 10, "b")],
                vec![wire("1", "alice", day + 100, "c")],
            ],
        ));
        let strategy = SearchStrategy::new(client.clone());

        let pages: Vec<_> = strategy.fetch("alice", window, budget(5)).collect().await;
        assert_eq!(pages.len(), 2);
        let first = pages[0].as_ref().unwrap();
        assert_eq!(first.records.len(), 1);
        assert_eq!(first.spillover[0].id(), "2");
        assert_eq!(pages[1].as_ref().unwrap().records[0].id(), "1");
        assert_eq!(MockClient::calls(&client.search_calls), 2);
    }

    #[tokio::test]
    async fn test_respects_page_budget() {
        let window = FetchWindow::for_date("2024-01-02").unwrap();
        let day = window.start_inclusive;
        let pages = (0..4)
            .map(|i| vec![wire(&i.to_string(), "alice", day + i, "x")])
            .collect();
        let client = Arc::new(MockClient::new().with_search_pages("alice", pages));
        let strategy = SearchStrategy::new(client.clone());

        let fetched: Vec<_> = strategy.fetch("alice", window, budget(2)).collect().await;
        assert_eq!(fetched.len(), 2);
        assert_eq!(MockClient::calls(&client.search_calls), 2);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let window = FetchWindow::for_date("2024-01-02").unwrap();
        let day = window.start_inclusive;
        let client = Arc::new(
            MockClient::new()
                .with_search_pages(
                    "alice",
                    vec![
                        vec![wire("2", "alice", day + 5, "x")],
                        vec![wire("1", "alice", day + 1, "y")],
                    ],
                )
                .failing_after("alice", 1),
        );
        let strategy = SearchStrategy::new(client);

        let pages: Vec<_> = strategy.fetch("alice", window, budget(5)).collect().await;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(matches!(pages[1], Err(SluiceError::RemoteFetch { .. })));
    }
}
