//! Collection loop.
//!
//! [`run`] ticks on a fixed interval, pulls a snapshot from the configured
//! [`SnapshotSource`], and hands it to a [`Monitor`], which keeps the
//! trailing history and runs the health rules and config advisor. The loop
//! stops on Ctrl-C, after the configured tick count, or once too many
//! consecutive collections have failed.

use std::collections::VecDeque;
use std::time::Duration;

use throtl_core::{advise, analyze, compare, ComparisonReport, ConfigSuggestion};
use throtl_core::{Recommendation, Severity, Snapshot};

use crate::collector::{CollectError, SnapshotSource};

/// Errors that end the collection loop.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Aborting after {count} consecutive collection failures")]
    TooManyFailures {
        count: u32,
        #[source]
        source: CollectError,
    },
}

/// Settings for [`Monitor`] and [`run`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub interval: Duration,
    pub history_len: usize,
    pub max_failures: u32,
    /// `None` runs until interrupted.
    pub max_ticks: Option<u64>,
    pub compare_window: usize,
}

/// Analysis results for one successful collection.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub snapshot: Snapshot,
    pub recommendations: Vec<Recommendation>,
    pub suggestions: Vec<ConfigSuggestion>,
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub collected: u64,
    pub failures: u64,
    /// Oldest vs newest window, when enough snapshots were collected.
    pub comparison: Option<ComparisonReport>,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Stateful wrapper around the stateless core analysis.
pub struct Monitor {
    settings: RunSettings,
    history: VecDeque<Snapshot>,
    baseline: Vec<Snapshot>,
    recent: VecDeque<Snapshot>,
    consecutive_failures: u32,
    collected: u64,
    failures: u64,
}

impl Monitor {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            history: VecDeque::with_capacity(settings.history_len),
            baseline: Vec::with_capacity(settings.compare_window),
            recent: VecDeque::with_capacity(settings.compare_window),
            settings,
            consecutive_failures: 0,
            collected: 0,
            failures: 0,
        }
    }

    /// Record one collection attempt.
    ///
    /// A success is analyzed against the history that preceded it and then
    /// appended. A failure is counted; reaching the failure budget in a row
    /// returns [`RunError::TooManyFailures`].
    pub fn record(
        &mut self,
        outcome: Result<Snapshot, CollectError>,
    ) -> Result<Option<TickReport>, RunError> {
        let snapshot = match outcome {
            Ok(snapshot) => snapshot,
            Err(source) => {
                self.consecutive_failures += 1;
                self.failures += 1;
                tracing::warn!(
                    error = %source,
                    consecutive = self.consecutive_failures,
                    "Collection failed",
                );
                if self.consecutive_failures >= self.settings.max_failures {
                    return Err(RunError::TooManyFailures {
                        count: self.consecutive_failures,
                        source,
                    });
                }
                return Ok(None);
            }
        };

        self.consecutive_failures = 0;
        self.collected += 1;

        let recommendations = analyze(&snapshot, self.history.make_contiguous());
        let suggestions = advise(&snapshot);

        push_bounded(&mut self.history, snapshot.clone(), self.settings.history_len);
        if self.baseline.len() < self.settings.compare_window {
            self.baseline.push(snapshot.clone());
        }
        push_bounded(&mut self.recent, snapshot.clone(), self.settings.compare_window);

        Ok(Some(TickReport {
            snapshot,
            recommendations,
            suggestions,
        }))
    }

    /// Compare the first window against the latest one.
    ///
    /// `None` until two non-overlapping windows have been collected.
    pub fn final_comparison(&self) -> Option<ComparisonReport> {
        let window = self.settings.compare_window;
        if window == 0 || self.collected < 2 * window as u64 {
            return None;
        }
        let recent: Vec<Snapshot> = self.recent.iter().cloned().collect();
        Some(compare(&self.baseline, &recent))
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn summary(&self, ticks: u64) -> RunSummary {
        RunSummary {
            ticks,
            collected: self.collected,
            failures: self.failures,
            comparison: self.final_comparison(),
        }
    }
}

fn push_bounded(queue: &mut VecDeque<Snapshot>, snapshot: Snapshot, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while queue.len() >= capacity {
        queue.pop_front();
    }
    queue.push_back(snapshot);
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Drive `source` until Ctrl-C, the tick limit, or the failure budget.
pub async fn run(
    source: &mut dyn SnapshotSource,
    settings: RunSettings,
) -> Result<RunSummary, RunError> {
    tracing::info!(
        source = %source.name(),
        interval_secs = settings.interval.as_secs_f64(),
        "Starting collection loop",
    );

    let max_ticks = settings.max_ticks;
    let mut ticker = tokio::time::interval(settings.interval);
    let mut monitor = Monitor::new(settings);
    let mut ticks: u64 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                let outcome = source.collect().await;
                if let Some(report) = monitor.record(outcome)? {
                    log_tick(&report);
                }
                if max_ticks.is_some_and(|max| ticks >= max) {
                    tracing::info!(ticks, "Tick limit reached");
                    break;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    Ok(monitor.summary(ticks))
}

fn log_tick(report: &TickReport) {
    let s = report.snapshot.summary();
    tracing::info!(
        running = s.requests_running,
        waiting = s.requests_waiting,
        tokens_per_second = s.tokens_per_second,
        ttft_p95_ms = s.ttft_p95_ms,
        tbt_p50_ms = s.tbt_p50_ms,
        gpu_cache_pct = s.gpu_cache_pct,
        gpu_util_pct = s.gpu_util_pct,
        cost_per_1k = s.cost_per_1k_tokens,
        sla_pct = s.sla_compliance_pct,
        "Snapshot",
    );

    for rec in &report.recommendations {
        let category = rec.category.as_str();
        match rec.severity {
            Severity::Critical => {
                tracing::error!(category, title = %rec.title, detail = %rec.detail, "Critical")
            }
            Severity::Warning => {
                tracing::warn!(category, title = %rec.title, detail = %rec.detail, "Warning")
            }
            Severity::Info => {
                tracing::info!(category, title = %rec.title, detail = %rec.detail, "Info")
            }
        }
    }

    for suggestion in &report.suggestions {
        tracing::debug!(
            flag = %suggestion.flag,
            action = %suggestion.suggested_action,
            impact = %suggestion.expected_impact,
            priority = suggestion.priority,
            "Config suggestion",
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
