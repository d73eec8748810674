use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cancel::{CancelToken, Cancelled};
use crate::error::{PassError, PassResult};

/// Receives build progress. Either method may return `Err(Cancelled)` to abort.
pub trait ProgressLogger: Sync {
    fn update_progress_percent(&self, percent: f32) -> Result<(), Cancelled>;

    fn update_progress(&self, completed: u64, total: u64) -> Result<(), Cancelled> {
        let percent = if total == 0 {
            100.0
        } else {
            100.0 * completed as f32 / total as f32
        };
        self.update_progress_percent(percent)
    }
}

/// Discards progress and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressLogger for NullProgress {
    fn update_progress_percent(&self, _percent: f32) -> Result<(), Cancelled> {
        Ok(())
    }
}

/// Monotonic progress front-end for one build, shared with workers by reference.
pub struct BuildProgress<'a> {
    logger: &'a dyn ProgressLogger,
    cancel: CancelToken,
    reported: Mutex<f32>,
}

impl<'a> BuildProgress<'a> {
    pub fn new(logger: &'a dyn ProgressLogger, cancel: CancelToken) -> Self {
        Self {
            logger,
            cancel,
            reported: Mutex::new(0.0),
        }
    }

    #[inline]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Cheap abort check for inner loops.
    #[inline]
    pub fn check(&self) -> PassResult<()> {
        self.cancel.check().map_err(PassError::from)
    }

    /// Forwards `percent` (clamped to [0, 100], never below the last value) to the logger.
    /// A logger abort trips the shared token.
    pub fn report(&self, percent: f32) -> PassResult<()> {
        self.check()?;
        let value = {
            let mut last = match self.reported.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            let clamped = if percent.is_finite() {
                percent.clamp(0.0, 100.0)
            } else {
                *last
            };
            *last = last.max(clamped);
            *last
        };
        if self.logger.update_progress_percent(value).is_err() {
            self.cancel.cancel();
            return Err(PassError::Cancelled);
        }
        Ok(())
    }

    /// Last value handed to the logger.
    pub fn reported(&self) -> f32 {
        match self.reported.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sub-range `[start, end]` of the overall percentage split into `total` units.
    pub fn stage(&self, start: f32, end: f32, total: u64) -> Stage<'_, 'a> {
        Stage {
            progress: self,
            start,
            end,
            total,
            completed: AtomicU64::new(0),
        }
    }
}

/// Unit counter mapped onto a percentage range. Workers advance, the supervisor reports.
pub struct Stage<'p, 'a> {
    progress: &'p BuildProgress<'a>,
    start: f32,
    end: f32,
    total: u64,
    completed: AtomicU64,
}

impl Stage<'_, '_> {
    #[inline]
    pub fn advance(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> PassResult<()> {
        let frac = if self.total == 0 {
            1.0
        } else {
            (self.completed() as f32 / self.total as f32).min(1.0)
        };
        self.progress
            .report(self.start + (self.end - self.start) * frac)
    }

    pub fn finish(&self) -> PassResult<()> {
        self.progress.report(self.end)
    }
}
