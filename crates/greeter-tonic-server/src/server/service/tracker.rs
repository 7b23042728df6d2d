use crate::server::telemetry::{
    decrement_streams_inflight, increment_streams_inflight, record_stream_duration,
};
use core::time::Duration;
use greeter_tonic_core::{Error, Result};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{sync::Arc, time::Instant};
use tokio::time::{sleep, timeout};

/// Interval between in-flight checks while draining.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Admission control for streaming calls.
///
/// Counts in-flight streams so shutdown can wait for them, and refuses new
/// calls once shutdown has begun.
#[derive(Debug, Default)]
pub struct StreamTracker {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
}

impl StreamTracker {
    /// Admits a new stream. The stream counts as in flight until the returned
    /// guard is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceShutdown`] once [`refuse_new`](Self::refuse_new) was
    /// called.
    pub fn begin(self: &Arc<Self>) -> Result<StreamGuard> {
        self.ensure_accepting()?;
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Ok(StreamGuard {
            tracker: Arc::clone(self),
            start: Instant::now(),
        })
    }

    /// Fails with [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn ensure_accepting(&self) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }
        Ok(())
    }

    pub fn refuse_new(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Waits until no stream is in flight, for at most `limit`. Returns
    /// whether every stream drained in time.
    pub async fn drain(&self, limit: Duration) -> bool {
        timeout(limit, async {
            while self.inflight() > 0 {
                sleep(DRAIN_POLL).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Keeps a stream counted as in flight; records its duration on drop.
#[derive(Debug)]
pub struct StreamGuard {
    tracker: Arc<StreamTracker>,
    start: Instant,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.tracker.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
        record_stream_duration(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
