use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::DEFAULT_POLL_INTERVAL;
use crate::error::{PassError, PassResult};
use crate::progress::{BuildProgress, Stage};

/// Fixed-size pool running data-parallel passes under a polling supervisor.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
    poll_interval: Duration,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl WorkerPool {
    /// `threads == 0` sizes the pool to the available parallelism.
    pub fn new(threads: usize) -> PassResult<Self> {
        let threads = if threads == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            threads
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("frost-mesh-{i}"))
            .build()
            .map_err(|e| PassError::PoolBuild(e.to_string()))?;
        Ok(Self {
            pool,
            threads,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `f(0..units)` on the pool while the calling thread polls for
    /// completion, reports the `[start, end]` progress range and watches for
    /// cancellation. Results are returned in unit order.
    ///
    /// A panic in any unit skips the remaining units without touching the
    /// caller's cancel token; the call returns only after every worker has stopped.
    pub fn run_pass<T, F>(
        &self,
        name: &str,
        progress: &BuildProgress<'_>,
        range: (f32, f32),
        units: usize,
        f: F,
    ) -> PassResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        let t0 = Instant::now();
        progress.check()?;
        let stage = progress.stage(range.0, range.1, units as u64);
        let cancel = progress.cancel_token();
        let first_panic: Mutex<Option<String>> = Mutex::new(None);
        let failed = AtomicBool::new(false);
        let (tx, rx) = bounded::<Vec<Option<T>>>(1);

        let collected = self.pool.in_place_scope(|scope| {
            let stage = &stage;
            let f = &f;
            let first_panic = &first_panic;
            let failed = &failed;
            scope.spawn(move |_| {
                let out: Vec<Option<T>> = (0..units)
                    .into_par_iter()
                    .map(|i| {
                        if cancel.is_cancelled() || failed.load(Ordering::Relaxed) {
                            return None;
                        }
                        match catch_unwind(AssertUnwindSafe(|| f(i))) {
                            Ok(v) => {
                                stage.advance(1);
                                Some(v)
                            }
                            Err(payload) => {
                                let msg = panic_message(payload.as_ref());
                                if let Ok(mut slot) = first_panic.lock() {
                                    slot.get_or_insert(msg);
                                }
                                failed.store(true, Ordering::Relaxed);
                                None
                            }
                        }
                    })
                    .collect();
                let _ = tx.send(out);
            });
            supervise(&rx, &stage, self.poll_interval)
        });

        let panicked = match first_panic.into_inner() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(msg) = panicked {
            log::error!("pass {name} aborted: worker panicked: {msg}");
            return Err(PassError::WorkerPanicked(msg));
        }
        let results = collected
            .and_then(|v| v.into_iter().collect::<Option<Vec<T>>>())
            .ok_or(PassError::Cancelled)?;
        progress.check()?;
        stage.finish()?;
        log::info!(
            target: "perf",
            "ms={} pass_{} units={} threads={}",
            t0.elapsed().as_millis(),
            name,
            units,
            self.threads
        );
        Ok(results)
    }

    /// [`WorkerPool::run_pass`] over `len` items split into ranges of `chunk` items.
    /// Each call of `f` returns the results for its range; they are concatenated in order.
    pub fn run_chunked<T, F>(
        &self,
        name: &str,
        progress: &BuildProgress<'_>,
        range: (f32, f32),
        len: usize,
        chunk: usize,
        f: F,
    ) -> PassResult<Vec<T>>
    where
        T: Send,
        F: Fn(std::ops::Range<usize>) -> Vec<T> + Sync,
    {
        let chunk = chunk.max(1);
        let units = len.div_ceil(chunk);
        let parts = self.run_pass(name, progress, range, units, |u| {
            let lo = u * chunk;
            f(lo..(lo + chunk).min(len))
        })?;
        Ok(parts.into_iter().flatten().collect())
    }
}

/// Poll-wait for the pass result, reporting progress on each wake-up.
/// A logger abort trips the token; we keep waiting so no worker outlives the pass.
fn supervise<T>(
    rx: &crossbeam_channel::Receiver<T>,
    stage: &Stage<'_, '_>,
    poll_interval: Duration,
) -> Option<T> {
    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(out) => return Some(out),
            Err(RecvTimeoutError::Timeout) => {
                let _ = stage.report();
            }
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}
