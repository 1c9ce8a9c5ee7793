//! Background frame feed.
//!
//! Spawns a thread that owns the `PoseSource` and pushes detections through a
//! bounded(1) channel. When the consumer has not taken the previous frame it
//! is evicted and counted as dropped, so the pipeline always sees the newest
//! frame and nothing queues up.
//!
//! Each `FrameFeed` spawns exactly one thread, stopped and joined on drop.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use vbt_traits::clock::Clock;
use vbt_traits::{Detection, PoseSource};

/// How long a blocked end-of-stream hand-off waits between shutdown checks.
const EOS_RETRY: Duration = Duration::from_millis(20);

pub struct FrameFeed {
    rx: xch::Receiver<Detection>,
    last_ok: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    epoch: Instant,
    clock: Box<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for FrameFeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameFeed")
            .field("dropped", &self.dropped())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Push `item`, evicting a stale one. Returns `false` if the consumer is gone.
fn push_latest(
    tx: &xch::Sender<Detection>,
    evict: &xch::Receiver<Detection>,
    dropped: &AtomicU64,
    mut item: Detection,
) -> bool {
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(xch::TrySendError::Full(back)) => {
                if evict.try_recv().is_ok() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                item = back;
            }
            Err(xch::TrySendError::Disconnected(_)) => return false,
        }
    }
}

impl FrameFeed {
    /// Spawn a feed pulling from `source` at `fps`, paced by `clock`.
    pub fn spawn<P, C>(mut source: P, fps: u32, timeout: Duration, clock: C) -> Self
    where
        P: PoseSource + Send + 'static,
        C: Clock + Clone + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(1);
        let evict = rx.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_clone = dropped.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = finished.clone();
        let period = Duration::from_micros(crate::util::period_us(fps));
        let epoch = clock.now();
        let thread_clock = clock.clone();

        let join_handle = std::thread::spawn(move || {
            let clock = thread_clock;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("frame feed received shutdown signal");
                    break;
                }

                match source.next_frame(timeout) {
                    Ok(Detection::EndOfStream) => {
                        // Never evict the last real frame for the end marker.
                        let mut item = Detection::EndOfStream;
                        loop {
                            match tx.send_timeout(item, EOS_RETRY) {
                                Ok(()) | Err(xch::SendTimeoutError::Disconnected(_)) => break,
                                Err(xch::SendTimeoutError::Timeout(back)) => {
                                    if shutdown_clone.load(Ordering::Relaxed) {
                                        break;
                                    }
                                    item = back;
                                }
                            }
                        }
                        finished_clone.store(true, Ordering::Release);
                        tracing::debug!("frame feed reached end of stream");
                        break;
                    }
                    Ok(d) => {
                        if !push_latest(&tx, &evict, &dropped_clone, d) {
                            tracing::debug!("frame feed consumer disconnected, exiting thread");
                            break;
                        }
                        last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Err(e) => {
                        // Nothing is forwarded; the consumer's stall watchdog
                        // notices a source that keeps failing.
                        tracing::debug!(error = %e, "pose source read failed");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("frame feed thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            dropped,
            finished,
            epoch,
            clock: Box::new(clock),
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Wait up to `wait` for the next item.
    pub fn next(&self, wait: Duration) -> Option<Detection> {
        self.rx.recv_timeout(wait).ok()
    }

    pub fn try_next(&self) -> Option<Detection> {
        self.rx.try_recv().ok()
    }

    /// The source reported end of stream.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Frames evicted before the consumer took them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Milliseconds since the source last produced a frame, on the feed's clock.
    pub fn stalled_for_now(&self) -> u64 {
        self.stalled_for(self.clock.ms_since(self.epoch))
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits between frames, or after a blocking
        // `next_frame` returns (bounded by the source timeout).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("frame feed thread joined"),
                Err(e) => tracing::warn!(?e, "frame feed thread panicked during shutdown"),
            }
        }
    }
}
