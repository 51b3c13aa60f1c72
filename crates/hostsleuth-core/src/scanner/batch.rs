/// Incremental batch scheduler.
///
/// Long enumerations (hundreds of services or devices, each needing one or
/// more slow secondary queries) are processed in small fixed-size batches.
/// [`BatchScheduler`] is an explicit state machine: the caller drives it one
/// batch at a time with [`BatchScheduler::step`] and decides what to do in
/// between (pump a message loop, send progress, check for cancellation).
///
/// A failing item never aborts a batch. The analyzer's placeholder is
/// recorded in its slot and the failure is reported in the
/// [`BatchReport`], so the result buffer always ends with exactly one output
/// per input, in input order.
use super::progress::ScanPhase;
use crate::error::{Error, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

/// Items processed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Per-item analysis used by the scheduler.
pub trait ItemAnalyzer: Send + Sync {
    type Item: Send + Sync;
    type Output: Send;

    /// Short label for logs and failure reports.
    fn label(&self, item: &Self::Item) -> String;

    /// Run the (potentially slow) secondary queries for one item.
    fn analyze(&self, item: &Self::Item) -> Result<Self::Output>;

    /// Output recorded when [`Self::analyze`] fails.
    fn placeholder(&self, item: &Self::Item, error: &Error) -> Self::Output;
}

/// A failed item inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position in the input sequence.
    pub index: usize,
    pub label: String,
    pub message: String,
}

/// What one call to [`BatchScheduler::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Zero-based batch number.
    pub batch_index: usize,
    /// Items in this batch (the last batch may be short).
    pub batch_len: usize,
    pub processed: usize,
    pub total: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// Status line, e.g. `Analyzed 10/12 services`.
    pub fn status_message(&self, noun: &str) -> String {
        format!("Analyzed {}/{} {noun}", self.processed, self.total)
    }
}

/// Scan-session context for one refresh.
pub struct BatchScheduler<I, T> {
    items: Vec<I>,
    results: Vec<T>,
    batch_size: usize,
    cursor: usize,
    batches_run: usize,
    failed_items: usize,
    phase: ScanPhase,
}

impl<I, T> BatchScheduler<I, T> {
    /// Create an idle scheduler. A batch size of 0 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            items: Vec::new(),
            results: Vec::new(),
            batch_size: batch_size.max(1),
            cursor: 0,
            batches_run: 0,
            failed_items: 0,
            phase: ScanPhase::Idle,
        }
    }

    /// Mark the primary enumeration as in flight.
    pub fn begin_enumeration(&mut self) {
        self.phase = ScanPhase::Enumerating;
    }

    /// Hand over the enumerated items and enter the analysis phase.
    ///
    /// An empty enumeration completes immediately.
    pub fn load(&mut self, items: Vec<I>) {
        let total = items.len();
        self.results = Vec::with_capacity(total);
        self.items = items;
        self.cursor = 0;
        self.batches_run = 0;
        self.failed_items = 0;
        self.phase = if total == 0 {
            ScanPhase::Complete
        } else {
            ScanPhase::Analyzing {
                processed: 0,
                total,
            }
        };
    }

    /// Abort the refresh.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = ScanPhase::Failed(message.into());
    }

    pub fn phase(&self) -> &ScanPhase {
        &self.phase
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn processed(&self) -> usize {
        self.cursor
    }

    pub fn batches_run(&self) -> usize {
        self.batches_run
    }

    pub fn failed_items(&self) -> usize {
        self.failed_items
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ScanPhase::Complete | ScanPhase::Failed(_))
    }

    /// Take the results. Only meaningful once the phase is `Complete`.
    pub fn into_results(self) -> Vec<T> {
        self.results
    }

    /// Process the next batch sequentially on the calling thread.
    ///
    /// Returns `None` when there is nothing left to do.
    pub fn step<A>(&mut self, analyzer: &A) -> Option<BatchReport>
    where
        A: ItemAnalyzer<Item = I, Output = T>,
    {
        let range = self.next_range()?;
        let outcomes: Vec<Result<T>> = self.items[range.clone()]
            .iter()
            .map(|item| analyzer.analyze(item))
            .collect();
        Some(self.record(analyzer, range, outcomes))
    }

    /// Process the next batch with its items spread over `pool`.
    ///
    /// Output order is preserved; only the analysis runs concurrently.
    pub fn step_on_pool<A>(&mut self, analyzer: &A, pool: &ThreadPool) -> Option<BatchReport>
    where
        A: ItemAnalyzer<Item = I, Output = T>,
        I: Sync,
        T: Send,
    {
        let range = self.next_range()?;
        let batch = &self.items[range.clone()];
        let outcomes: Vec<Result<T>> =
            pool.install(|| batch.par_iter().map(|item| analyzer.analyze(item)).collect());
        Some(self.record(analyzer, range, outcomes))
    }

    fn next_range(&self) -> Option<std::ops::Range<usize>> {
        if !matches!(self.phase, ScanPhase::Analyzing { .. }) {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.items.len());
        Some(self.cursor..end)
    }

    fn record<A>(
        &mut self,
        analyzer: &A,
        range: std::ops::Range<usize>,
        outcomes: Vec<Result<T>>,
    ) -> BatchReport
    where
        A: ItemAnalyzer<Item = I, Output = T>,
    {
        let mut failures = Vec::new();
        for (index, outcome) in range.clone().zip(outcomes) {
            let item = &self.items[index];
            let output = match outcome {
                Ok(output) => output,
                Err(e) => {
                    let label = analyzer.label(item);
                    warn!("Analysis of {label} failed: {e}");
                    let placeholder = analyzer.placeholder(item, &e);
                    failures.push(ItemFailure {
                        index,
                        label,
                        message: e.to_string(),
                    });
                    placeholder
                }
            };
            self.results.push(output);
        }

        self.cursor = range.end;
        self.failed_items += failures.len();
        let total = self.items.len();
        let report = BatchReport {
            batch_index: self.batches_run,
            batch_len: range.len(),
            processed: self.cursor,
            total,
            failures,
        };
        self.batches_run += 1;

        self.phase = if self.cursor >= total {
            ScanPhase::Complete
        } else {
            ScanPhase::Analyzing {
                processed: self.cursor,
                total,
            }
        };
        debug!(
            "Batch {} done: {}/{} items",
            report.batch_index, report.processed, report.total
        );
        report
    }
}

/// Drive a scheduler to completion on the calling thread.
///
/// The single-loop form for headless callers where responsiveness is not a
/// constraint. `on_batch` runs after every batch.
pub fn run_to_completion<A, F>(
    items: Vec<A::Item>,
    analyzer: &A,
    batch_size: usize,
    mut on_batch: F,
) -> Vec<A::Output>
where
    A: ItemAnalyzer,
    F: FnMut(&BatchReport),
{
    let mut scheduler = BatchScheduler::new(batch_size);
    scheduler.load(items);
    while let Some(report) = scheduler.step(analyzer) {
        on_batch(&report);
    }
    scheduler.into_results()
}
