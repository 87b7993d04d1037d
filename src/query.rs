//! Search filter state and the debounced query pipeline.
//!
//! Filter edits land in [`SearchDebouncer`] immediately; each one (re)starts a
//! quiet-period timer and only the last edit inside a quiet window produces a
//! downstream call. The call carries whatever the filters hold when the timer
//! fires. Once fired, the request runs detached: later edits cancel pending
//! timers, never in-flight requests.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::Category;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Category,
    MinPrice,
    MaxPrice,
}

impl std::str::FromStr for FilterField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "name" => Ok(FilterField::Name),
            "category" => Ok(FilterField::Category),
            "minprice" | "min" => Ok(FilterField::MinPrice),
            "maxprice" | "max" => Ok(FilterField::MaxPrice),
            other => Err(format!("unknown filter field: {}", other)),
        }
    }
}

/// Raw filter inputs as typed by the user. Empty string means "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub name: String,
    pub category: String,
    pub min_price: String,
    pub max_price: String,
}

/// Query parameters for `GET /api/sweets/search`; unset fields are omitted
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

impl SearchParams {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }
}

/// The two distinct listing operations. Empty filters mean "list everything",
/// never "search with no constraints".
#[derive(Debug, Clone, PartialEq)]
pub enum SweetQuery {
    All,
    Search(SearchParams),
}

impl SearchFilters {
    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FilterField::Name => self.name = value,
            FilterField::Category => self.category = value,
            FilterField::MinPrice => self.min_price = value,
            FilterField::MaxPrice => self.max_price = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_params().is_empty()
    }

    /// Category and price bounds that are set; the name box is not counted
    pub fn active_filter_count(&self) -> usize {
        [&self.category, &self.min_price, &self.max_price]
            .iter()
            .filter(|v| !v.trim().is_empty())
            .count()
    }

    pub fn to_params(&self) -> SearchParams {
        // Whitespace-only names count as blank and fall through to list-all
        let name = Some(self.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let category = match self.category.trim() {
            "" => None,
            raw => match raw.parse::<Category>() {
                Ok(c) => Some(c),
                Err(_) => {
                    warn!("Ignoring unknown category filter {:?}", raw);
                    None
                }
            },
        };

        SearchParams {
            name,
            category,
            min_price: parse_price("minPrice", &self.min_price),
            max_price: parse_price("maxPrice", &self.max_price),
        }
    }

    pub fn to_query(&self) -> SweetQuery {
        let params = self.to_params();
        if params.is_empty() {
            SweetQuery::All
        } else {
            SweetQuery::Search(params)
        }
    }
}

/// Non-negative decimal or nothing. `minPrice <= maxPrice` is left to the server.
fn parse_price(label: &str, raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            warn!("Ignoring invalid {} filter {:?}", label, raw);
            None
        }
    }
}

/// Downstream consumer of coalesced queries (usually the storefront listing)
#[async_trait]
pub trait SearchSink: Send + Sync + 'static {
    async fn dispatch(&self, query: SweetQuery);
}

/// A delayed task that can be cancelled until it fires. Dropping the handle cancels it.
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Must be called from within a Tokio runtime
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Single-owner debouncer: `&mut self` on every edit makes rescheduling atomic.
/// Dropping it is the teardown: any pending timer is cancelled.
pub struct SearchDebouncer {
    filters: watch::Sender<SearchFilters>,
    pending: Option<ScheduledTask>,
    quiet_period: Duration,
    sink: Arc<dyn SearchSink>,
}

impl SearchDebouncer {
    pub fn new(sink: Arc<dyn SearchSink>, quiet_period: Duration) -> Self {
        let (filters, _rx) = watch::channel(SearchFilters::default());
        Self {
            filters,
            pending: None,
            quiet_period,
            sink,
        }
    }

    pub fn on_filter_change(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        self.filters.send_modify(|f| f.set(field, value));
        self.reschedule();
    }

    /// Reset every field; counts as a change
    pub fn clear(&mut self) {
        self.filters.send_replace(SearchFilters::default());
        self.reschedule();
    }

    pub fn filters(&self) -> SearchFilters {
        self.filters.borrow().clone()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Cancel the pending timer, if any, without dispatching
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
    }

    fn reschedule(&mut self) {
        self.cancel();

        let rx = self.filters.subscribe();
        let sink = Arc::clone(&self.sink);
        self.pending = Some(ScheduledTask::after(self.quiet_period, async move {
            // Snapshot at fire time, not at schedule time
            let query = rx.borrow().to_query();
            debug!("Debounced search fired: {:?}", query);
            tokio::spawn(async move {
                sink.dispatch(query).await;
            });
        }));
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
