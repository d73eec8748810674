//! Worker pool, cancellation and progress plumbing for meshing passes.
#![forbid(unsafe_code)]

mod cancel;
mod error;
mod pool;
mod progress;

use std::time::Duration;

pub use cancel::{CancelToken, Cancelled};
pub use error::{PassError, PassResult};
pub use pool::WorkerPool;
pub use progress::{BuildProgress, NullProgress, ProgressLogger, Stage};

/// How often the supervising thread wakes to report progress and check for aborts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
