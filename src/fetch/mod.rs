//! Fetch strategies.
//!
//! A strategy turns `(account, window, budget)` into a stream of pages of
//! validated records. Records inside the window go to [`Page::records`];
//! records the strategy scanned that fall outside it go to
//! [`Page::spillover`], so callers can still cache them under their own day.
//! A remote failure ends the stream with a single `RemoteFetch` error after
//! whatever pages were already produced.

pub mod search;
pub mod timeline;

use futures::stream::BoxStream;

use crate::app::{Result, SluiceError};
use crate::config::TwitterConfig;
use crate::domain::{FetchWindow, RawRecord, WireRecord};

pub use search::SearchStrategy;
pub use timeline::TimelineStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchBudget {
    /// Records scanned per account (timeline)
    pub max_scan: usize,
    /// Pages requested per account (search)
    pub max_pages: usize,
    pub page_size: usize,
}

impl Default for FetchBudget {
    fn default() -> Self {
        Self {
            max_scan: 200,
            max_pages: 5,
            page_size: 50,
        }
    }
}

impl FetchBudget {
    pub fn from_config(config: &TwitterConfig) -> Self {
        Self {
            max_scan: config.max_scan,
            max_pages: config.max_pages,
            page_size: config.page_size.max(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub spillover: Vec<RawRecord>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.spillover.is_empty()
    }

    /// File `record` by whether `window` contains it.
    pub fn push(&mut self, record: RawRecord, window: &FetchWindow) {
        if window.contains(record.timestamp()) {
            self.records.push(record);
        } else {
            self.spillover.push(record);
        }
    }
}

pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch<'a>(
        &'a self,
        account: &'a str,
        window: FetchWindow,
        budget: FetchBudget,
    ) -> BoxStream<'a, Result<Page>>;
}

/// Drain a strategy stream into its in-window records. Stops at the first
/// error, returning it.
#[cfg(test)]
pub async fn collect_records(mut pages: BoxStream<'_, Result<Page>>) -> Result<Vec<RawRecord>> {
    use futures::StreamExt;

    let mut records = Vec::new();
    while let Some(page) = pages.next().await {
        records.extend(page?.records);
    }
    Ok(records)
}

/// Narrow a wire record, logging and dropping it when it is unusable.
pub(crate) fn validate(account: &str, wire: WireRecord) -> Option<RawRecord> {
    match RawRecord::try_from(wire) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(account, error = %e, "skipping invalid record");
            None
        }
    }
}

pub(crate) fn remote_fetch_error(account: &str, error: SluiceError) -> SluiceError {
    match error {
        already @ SluiceError::RemoteFetch { .. } => already,
        other => SluiceError::RemoteFetch {
            account: account.to_string(),
            message: other.to_string(),
        },
    }
}
