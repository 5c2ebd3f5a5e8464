use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use crate::app::{Result, SluiceError};
use crate::domain::{FetchWindow, WireRecord};
use crate::fetch::{remote_fetch_error, validate, FetchBudget, FetchStrategy, Page};
use crate::remote::PlatformClient;

/// Scans an account's newest-first timeline until it walks past the start
/// of the window or spends `max_scan`.
pub struct TimelineStrategy {
    client: Arc<dyn PlatformClient>,
}

impl TimelineStrategy {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }
}

struct ScanState<'a> {
    records: BoxStream<'a, Result<WireRecord>>,
    pending_error: Option<SluiceError>,
    done: bool,
}

impl FetchStrategy for TimelineStrategy {
    fn name(&self) -> &'static str {
        "timeline"
    }

    fn fetch<'a>(
        &'a self,
        account: &'a str,
        window: FetchWindow,
        budget: FetchBudget,
    ) -> BoxStream<'a, Result<Page>> {
        let initial = ScanState {
            records: self
                .client
                .timeline(account, budget.max_scan)
                .take(budget.max_scan)
                .boxed(),
            pending_error: None,
            done: false,
        };

        stream::unfold(initial, move |mut state| async move {
            if let Some(error) = state.pending_error.take() {
                state.done = true;
                return Some((Err(error), state));
            }
            if state.done {
                return None;
            }

            let mut page = Page::default();
            let mut scanned = 0;
            while scanned < budget.page_size {
                let wire = match state.records.next().await {
                    Some(Ok(wire)) => wire,
                    Some(Err(e)) => {
                        let error = remote_fetch_error(account, e);
                        if page.is_empty() {
                            state.done = true;
                            return Some((Err(error), state));
                        }
                        state.pending_error = Some(error);
                        return Some((Ok(page), state));
                    }
                    None => {
                        state.done = true;
                        break;
                    }
                };
                scanned += 1;

                let Some(record) = validate(account, wire) else {
                    continue;
                };
                // Pinned records sit on top regardless of age.
                let passed_window = window.is_before(record.timestamp()) && !record.post().is_pin;
                page.push(record, &window);
                if passed_window {
                    tracing::debug!(account, "timeline scan reached window start");
                    state.done = true;
                    break;
                }
            }

            if page.is_empty() && state.done {
                None
            } else {
                Some((Ok(page), state))
            }
        })
        .boxed()
    }
}
