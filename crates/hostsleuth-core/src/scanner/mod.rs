/// Scanner module: runs enumeration plus per-item analysis off the
/// controlling thread.
///
/// The enumeration closure and every batch run on a dedicated background
/// thread; each batch is spread over a small rayon pool. Progress and the
/// final results arrive through a bounded crossbeam channel that the caller
/// drains at its own pace.
///
/// For callers that do not need a background thread, [`batch::BatchScheduler`]
/// can be driven directly.
pub mod batch;
pub mod drivers;
pub mod progress;
pub mod services;
pub mod software;

pub use batch::{
    run_to_completion, BatchReport, BatchScheduler, ItemAnalyzer, ItemFailure, DEFAULT_BATCH_SIZE,
};
pub use drivers::DriverAnalyzer;
pub use progress::{AnalysisProgress, ScanPhase};
pub use services::ServiceAnalyzer;
pub use software::{RawSoftware, SoftwareMapper};

use crate::error::{Error, Result};
use crate::model::Domain;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info, warn};

/// Maximum number of progress messages that may queue up in the channel.
///
/// Batches are slow (several external queries each), so the queue only
/// fills if the receiver stops draining entirely; the analysis thread then
/// blocks instead of buffering without bound.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on concurrent secondary queries within one batch.
pub const MAX_WORKERS: usize = 4;

/// Worker count for the per-batch pool: `min(num_cpus, MAX_WORKERS)`.
pub fn worker_count() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

/// Handle to a running or finished analysis.
pub struct AnalysisHandle<T> {
    /// Receiver for progress updates and the final result.
    pub progress_rx: Receiver<AnalysisProgress<T>>,
    domain: Domain,
    cancel_flag: Arc<AtomicBool>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl<T> AnalysisHandle<T> {
    /// Request a stop at the next batch boundary.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }
}

/// Start enumeration and analysis on a background thread.
///
/// `enumerate` runs first (the `Enumerating` phase); its items are then fed
/// through a [`BatchScheduler`] in batches of `batch_size`. Exactly one
/// terminal message (`Complete`, `Failed` or `Cancelled`) is sent.
pub fn start_analysis<A, E>(
    domain: Domain,
    enumerate: E,
    analyzer: A,
    batch_size: usize,
) -> Result<AnalysisHandle<A::Output>>
where
    A: ItemAnalyzer + 'static,
    A::Item: 'static,
    A::Output: 'static,
    E: FnOnce() -> Result<Vec<A::Item>> + Send + 'static,
{
    let (progress_tx, progress_rx) = crossbeam_channel::bounded(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name(format!("hostsleuth-{}", domain.label()))
        .spawn(move || {
            run_analysis(
                domain,
                enumerate,
                &analyzer,
                batch_size,
                &progress_tx,
                &cancel_clone,
            );
        })?;

    Ok(AnalysisHandle {
        progress_rx,
        domain,
        cancel_flag,
        _thread: Some(thread),
    })
}

fn run_analysis<A, E>(
    domain: Domain,
    enumerate: E,
    analyzer: &A,
    batch_size: usize,
    tx: &Sender<AnalysisProgress<A::Output>>,
    cancel: &AtomicBool,
) where
    A: ItemAnalyzer,
    E: FnOnce() -> Result<Vec<A::Item>>,
{
    let start = Instant::now();
    let mut scheduler = BatchScheduler::new(batch_size);
    scheduler.begin_enumeration();
    info!("Enumerating {domain}");

    let items = match enumerate() {
        Ok(items) => items,
        Err(e) => {
            error!("Enumeration of {domain} failed: {e}");
            scheduler.fail(e.to_string());
            let _ = tx.send(AnalysisProgress::Failed {
                message: e.to_string(),
            });
            return;
        }
    };

    let total = items.len();
    scheduler.load(items);
    let _ = tx.send(AnalysisProgress::Started { domain, total });
    info!(
        "Analyzing {total} {domain} in batches of {}",
        scheduler.batch_size()
    );

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count())
        .thread_name(move |i| format!("hostsleuth-{}-{i}", domain.label()))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Worker pool unavailable, analysing sequentially: {e}");
            None
        }
    };

    loop {
        if cancel.load(Ordering::Relaxed) {
            info!("Analysis of {domain} cancelled after {} items", scheduler.processed());
            let _ = tx.send(AnalysisProgress::Cancelled);
            return;
        }

        let report = match &pool {
            Some(pool) => scheduler.step_on_pool(analyzer, pool),
            None => scheduler.step(analyzer),
        };
        let Some(report) = report else { break };

        for failure in &report.failures {
            let _ = tx.send(AnalysisProgress::ItemFailed {
                item: failure.label.clone(),
                message: failure.message.clone(),
            });
        }
        let _ = tx.send(AnalysisProgress::Batch {
            processed: report.processed,
            total: report.total,
            message: report.status_message(domain.label()),
        });
    }

    let failed_items = scheduler.failed_items();
    let duration = start.elapsed();
    info!(
        "Analysis of {domain} complete: {total} items, {failed_items} failed, {:.1}s",
        duration.as_secs_f64()
    );
    let _ = tx.send(AnalysisProgress::Complete {
        results: scheduler.into_results(),
        duration,
        failed_items,
    });
}

/// Block until the handle's terminal message arrives, forwarding every
/// intermediate message to `on_progress`.
///
/// Returns the results on `Complete`; `Failed` becomes
/// [`Error::QueryFailed`] and `Cancelled` an empty vector.
pub fn wait_for_results<T, F>(handle: &AnalysisHandle<T>, mut on_progress: F) -> Result<Vec<T>>
where
    F: FnMut(&AnalysisProgress<T>),
{
    for msg in handle.progress_rx.iter() {
        match msg {
            AnalysisProgress::Complete { results, .. } => return Ok(results),
            AnalysisProgress::Failed { message } => {
                return Err(Error::query(handle.domain().label(), message));
            }
            AnalysisProgress::Cancelled => {
                on_progress(&AnalysisProgress::Cancelled);
                return Ok(Vec::new());
            }
            other => on_progress(&other),
        }
    }
    Err(Error::query(
        handle.domain().label(),
        "analysis thread exited without a result",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl ItemAnalyzer for Upper {
        type Item = String;
        type Output = String;

        fn label(&self, item: &String) -> String {
            item.clone()
        }

        fn analyze(&self, item: &String) -> Result<String> {
            if item.starts_with('!') {
                return Err(Error::query("upper", "bang"));
            }
            Ok(item.to_uppercase())
        }

        fn placeholder(&self, item: &String, _error: &Error) -> String {
            format!("{item}?")
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("svc{i}")).collect()
    }

    #[test]
    fn background_analysis_reports_every_batch() {
        let handle =
            start_analysis(Domain::Services, || Ok(names(12)), Upper, 5).unwrap();

        let mut batches = Vec::new();
        let mut started = None;
        let results = wait_for_results(&handle, |msg| match msg {
            AnalysisProgress::Started { total, .. } => started = Some(*total),
            AnalysisProgress::Batch {
                processed, total, ..
            } => batches.push((*processed, *total)),
            _ => {}
        })
        .unwrap();

        assert_eq!(started, Some(12));
        assert_eq!(batches, vec![(5, 12), (10, 12), (12, 12)]);
        assert_eq!(results.len(), 12);
        assert_eq!(results[0], "SVC0");
        assert_eq!(results[11], "SVC11");
    }

    #[test]
    fn item_failures_are_reported_and_replaced() {
        let items = vec!["a".to_string(), "!b".to_string(), "c".to_string()];
        let handle = start_analysis(Domain::Drivers, move || Ok(items), Upper, 2).unwrap();

        let mut failed = Vec::new();
        let results = wait_for_results(&handle, |msg| {
            if let AnalysisProgress::ItemFailed { item, .. } = msg {
                failed.push(item.clone());
            }
        })
        .unwrap();

        assert_eq!(failed, vec!["!b".to_string()]);
        assert_eq!(results, vec!["A", "!b?", "C"]);
    }

    #[test]
    fn enumeration_failure_is_terminal() {
        let handle = start_analysis(
            Domain::Services,
            || Err(Error::query("Win32_Service", "access denied")),
            Upper,
            5,
        )
        .unwrap();
        let err = wait_for_results(&handle, |_| {}).unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn cancel_before_first_batch() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = start_analysis(
            Domain::Services,
            move || {
                let _ = gate_rx.recv();
                Ok(names(20))
            },
            Upper,
            5,
        )
        .unwrap();
        handle.cancel();
        assert!(handle.is_cancelled());
        gate_tx.send(()).unwrap();

        let mut cancelled = false;
        let results = wait_for_results(&handle, |msg| {
            if matches!(msg, AnalysisProgress::Cancelled) {
                cancelled = true;
            }
        })
        .unwrap();
        assert!(cancelled);
        assert!(results.is_empty());
    }

    #[test]
    fn worker_count_is_bounded() {
        let n = worker_count();
        assert!((1..=MAX_WORKERS).contains(&n));
    }
}
