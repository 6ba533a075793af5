//! Dashboard controller
//!
//! One per page session (see [`crate::session`]). Owns that page's
//! [`FilterSelection`] and keeps the published
//! [`DashboardSnapshot`] in sync with it:
//!
//! - the default selection is fetched immediately on spawn
//! - later changes wait for a trailing debounce window, restarted by every
//!   further change, before anything is fetched
//! - a new refresh aborts the one still in flight and bumps the generation;
//!   results tagged with an older generation are dropped
//! - the primary and comparison fetches run concurrently and publish
//!   independently as they resolve

use crate::view::{DashboardView, FetchState};
use chrono::{Local, NaiveDate};
use replyrate_core::{
    AggregateSource, DateRange, FilterSelection, PeriodField, PeriodQuery, Result, WeekStart,
};
use replyrate_observability::Metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default trailing debounce window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub debounce: Duration,
    pub week_start: WeekStart,
    /// Pin "today" instead of reading the local clock
    pub fixed_today: Option<NaiveDate>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            week_start: WeekStart::default(),
            fixed_today: None,
        }
    }
}

/// Ranges a selection resolves to on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRanges {
    pub period: DateRange,
    pub period_compare: Option<DateRange>,
}

/// Everything readers need to render the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    /// Bumped on every refresh; 0 until the first one starts
    pub generation: u64,
    pub filters: FilterSelection,
    pub primary_range: Option<DateRange>,
    pub compare_range: Option<DateRange>,
    pub primary: FetchState,
    pub compare: FetchState,
}

impl DashboardSnapshot {
    fn initial(filters: FilterSelection) -> Self {
        let compare = if filters.period_compare.period().is_some() {
            FetchState::Pending
        } else {
            FetchState::Skipped
        };
        Self {
            generation: 0,
            filters,
            primary_range: None,
            compare_range: None,
            primary: FetchState::Pending,
            compare,
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::compose(&self.primary, &self.compare)
    }

    /// Neither fetch is still running
    pub fn is_settled(&self) -> bool {
        self.generation > 0 && !self.primary.is_pending() && !self.compare.is_pending()
    }
}

struct Shared {
    source: Arc<dyn AggregateSource>,
    config: ControllerConfig,
    metrics: Arc<Metrics>,
    snapshot: watch::Sender<DashboardSnapshot>,
}

/// A refresh task that is cancelled when dropped
struct InflightRefresh {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Drop for InflightRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Handle to the background refresh loop
pub struct DashboardController {
    filters: watch::Sender<FilterSelection>,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl DashboardController {
    /// Start the refresh loop; the initial selection is fetched right away.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        source: Arc<dyn AggregateSource>,
        initial: FilterSelection,
        config: ControllerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (filters, filters_rx) = watch::channel(initial.clone());
        let (snapshot, _) = watch::channel(DashboardSnapshot::initial(initial));

        let shared = Arc::new(Shared {
            source,
            config,
            metrics,
            snapshot,
        });

        let task = tokio::spawn(run(Arc::clone(&shared), filters_rx));

        Self {
            filters,
            shared,
            task,
        }
    }

    /// Commit a new selection. Returns false if it equals the current one.
    pub fn submit(&self, selection: FilterSelection) -> bool {
        self.shared.metrics.record_filter_change();
        self.filters.send_if_modified(|current| {
            if *current == selection {
                return false;
            }
            debug!(
                "Filter change: user={} period={} compare={}",
                selection.user, selection.period, selection.period_compare
            );
            *current = selection;
            true
        })
    }

    /// Current (possibly not yet fetched) selection
    pub fn filters(&self) -> FilterSelection {
        self.filters.borrow().clone()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    pub fn today(&self) -> NaiveDate {
        self.shared.today()
    }

    /// Resolve a selection without fetching anything
    pub fn resolve(&self, selection: &FilterSelection) -> Result<ResolvedRanges> {
        let today = self.today();
        let week_start = self.shared.config.week_start;
        let period = selection.period.range(today, week_start)?;
        let period_compare = selection
            .resolve(PeriodField::Compare, today, week_start)?
            .map(|query| query.range);
        Ok(ResolvedRanges {
            period,
            period_compare,
        })
    }

    /// Stop the refresh loop and cancel any in-flight fetches
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(shared: Arc<Shared>, mut filters: watch::Receiver<FilterSelection>) {
    let initial = filters.borrow_and_update().clone();
    let mut inflight = Some(shared.refresh(initial));

    // Exits when the sender side is dropped
    while filters.changed().await.is_ok() {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(shared.config.debounce) => break,
                changed = filters.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let selection = filters.borrow_and_update().clone();
        if let Some(previous) = inflight.take()
            && !previous.handle.is_finished()
        {
            debug!("Superseding refresh generation {}", previous.generation);
            shared.metrics.record_superseded();
        }
        inflight = Some(shared.refresh(selection));
    }
}

impl Shared {
    fn today(&self) -> NaiveDate {
        self.config
            .fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Publish the pending state for `filters` and start both fetches
    fn refresh(self: &Arc<Self>, filters: FilterSelection) -> InflightRefresh {
        let today = self.today();
        let week_start = self.config.week_start;
        let primary = filters.resolve(PeriodField::Period, today, week_start);
        let compare = filters.resolve(PeriodField::Compare, today, week_start);

        let mut generation = 0;
        self.snapshot.send_modify(|snap| {
            snap.generation += 1;
            generation = snap.generation;
            snap.filters = filters;
            (snap.primary, snap.primary_range) = initial_state(&primary);
            (snap.compare, snap.compare_range) = initial_state(&compare);
        });

        let primary = primary.ok().flatten();
        let compare = compare.ok().flatten();
        info!(
            "Refresh {}: period={} compare={}",
            generation,
            describe(primary.as_ref()),
            describe(compare.as_ref())
        );
        self.metrics.record_refresh();

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::join!(
                shared.fetch(generation, PeriodField::Period, primary),
                shared.fetch(generation, PeriodField::Compare, compare),
            );
        });

        InflightRefresh { generation, handle }
    }

    async fn fetch(&self, generation: u64, field: PeriodField, query: Option<PeriodQuery>) {
        let Some(query) = query else {
            return;
        };

        let started = Instant::now();
        let result = self.source.fetch_counts(&query).await;
        let elapsed = started.elapsed();
        self.metrics
            .record_fetch(field.as_str(), result.is_ok(), elapsed.as_secs_f64());

        let state = match result {
            Ok(counts) => {
                debug!(
                    "Fetched {} {} in {:?}",
                    field.as_str(),
                    query.range,
                    elapsed
                );
                FetchState::Ready { counts }
            }
            Err(e) => {
                match field {
                    PeriodField::Period => error!("Failed to fetch statistics: {}", e),
                    PeriodField::Compare => warn!("Failed to fetch comparison statistics: {}", e),
                }
                FetchState::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.snapshot.send_if_modified(|snap| {
            if snap.generation != generation {
                debug!(
                    "Dropping stale {} result from generation {}",
                    field.as_str(),
                    generation
                );
                return false;
            }
            match field {
                PeriodField::Period => snap.primary = state,
                PeriodField::Compare => snap.compare = state,
            }
            true
        });
    }
}

fn initial_state(resolved: &Result<Option<PeriodQuery>>) -> (FetchState, Option<DateRange>) {
    match resolved {
        Ok(Some(query)) => (FetchState::Pending, Some(query.range)),
        Ok(None) => (FetchState::Skipped, None),
        Err(e) => (
            FetchState::Failed {
                error: e.to_string(),
            },
            None,
        ),
    }
}

fn describe(query: Option<&PeriodQuery>) -> String {
    query.map_or_else(|| "none".to_string(), |q| q.range.to_string())
}
