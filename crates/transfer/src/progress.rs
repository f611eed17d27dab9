//! Upload progress: byte counting, interval sampling and speed estimation.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default progress notification interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Callback invoked with transfer progress.
pub type ProgressCallback = Box<dyn Fn(TransferProgress) + Send + Sync>;

/// A point-in-time observation of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    /// Bytes handed to the transport so far.
    pub transferred: u64,
    /// Size of the source in bytes (0 if unknown).
    pub total: u64,
    /// Average speed over the recent window.
    pub bytes_per_second: f64,
}

impl TransferProgress {
    /// Returns the progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.transferred as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({:.0}%)",
            format_bytes(self.transferred),
            format_bytes(self.total),
            self.percentage()
        )?;
        if self.bytes_per_second > 0.0 {
            write!(f, " at {}/s", format_bytes(self.bytes_per_second as u64))?;
        }
        Ok(())
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ---------------------------------------------------------------------------
// ProgressReader
// ---------------------------------------------------------------------------

/// Pass-through reader that counts every byte delivered downstream.
///
/// The bytes themselves are never touched. The counter is shared so a
/// [`ProgressTracker`] can sample it from another task.
pub struct ProgressReader<R> {
    inner: R,
    transferred: Arc<AtomicU64>,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            transferred: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared handle to the byte counter.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.transferred)
    }

}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = buf.filled().len() - before;
                this.transferred.fetch_add(n as u64, Ordering::Relaxed);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Samples a byte counter on a fixed interval and notifies callbacks.
///
/// Sampling happens on its own tokio task, so a slow or panicking
/// callback never stalls or fails the transfer being observed.
pub struct ProgressTracker {
    inner: Arc<RwLock<TrackerInner>>,
    sampler: Mutex<Option<Sampler>>,
}

/// A running sampling task and the sender that ends it.
struct Sampler {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct TrackerInner {
    callbacks: Vec<ProgressCallback>,
    interval: Duration,
}

impl ProgressTracker {
    /// Creates a new tracker with the given notification interval.
    ///
    /// If `interval` is `None`, defaults to [`DEFAULT_INTERVAL`].
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TrackerInner {
                callbacks: Vec::new(),
                interval: interval.unwrap_or(DEFAULT_INTERVAL),
            })),
            sampler: Mutex::new(None),
        }
    }

    /// Registers a progress callback.
    pub fn on_progress(&self, callback: ProgressCallback) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.callbacks.push(callback);
    }

    /// Sends a one-time progress notification.
    pub fn notify(&self, transferred: u64, total: u64) {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let progress = TransferProgress {
            transferred,
            total,
            bytes_per_second: 0.0,
        };
        for cb in &inner.callbacks {
            cb(progress);
        }
    }

    /// Starts periodic sampling of `counter` in a background tokio task.
    ///
    /// The first report fires one interval after the call. Call
    /// [`stop`](Self::stop), or drop the tracker, to end it. A previous
    /// sampler, if any, is told to exit.
    pub fn start(&self, counter: Arc<AtomicU64>, total: u64) {
        let (tx, mut rx) = oneshot::channel::<()>();

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let interval = inner
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let speed = SpeedCalculator::new(None, None);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let transferred = counter.load(Ordering::Relaxed);
                        speed.add_sample(transferred);
                        let progress = TransferProgress {
                            transferred,
                            total,
                            bytes_per_second: speed.bytes_per_second(),
                        };
                        let i = inner.read().unwrap_or_else(PoisonError::into_inner);
                        for cb in &i.callbacks {
                            cb(progress);
                        }
                    }
                    _ = &mut rx => {
                        break;
                    }
                }
            }
        });

        let previous = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Sampler { stop: tx, task });
        drop(previous);
    }

    /// Stops the sampling task and waits for it to exit.
    ///
    /// Once this returns no periodic report is in flight, so a following
    /// [`notify`](Self::notify) is the last observation callbacks see.
    pub async fn stop(&self) {
        let sampler = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Sampler { stop, task }) = sampler {
            drop(stop);
            // A panicking callback ends the task with an error; nothing to report.
            let _ = task.await;
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        // Dropping the sender signals the task to exit.
        let sampler = self
            .sampler
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sampler);
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

/// Estimates transfer speed from cumulative byte counts in a sliding window.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<(Instant, u64)>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 15 s).
    /// - `max_samples`: maximum retained samples (default 32).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                max_samples: max_samples.unwrap_or(32).max(2),
                window_size: window_size.unwrap_or(Duration::from_secs(15)),
            }),
        }
    }

    /// Records the cumulative byte count observed now.
    pub fn add_sample(&self, cumulative: u64) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        s.samples.push_back((now, cumulative));

        let window = s.window_size;
        while s.samples.len() > 2 {
            match s.samples.front() {
                Some(&(t, _)) if now.duration_since(t) > window => {
                    s.samples.pop_front();
                }
                _ => break,
            }
        }
        while s.samples.len() > s.max_samples {
            s.samples.pop_front();
        }
    }

    /// Average bytes/second between the oldest and newest retained sample.
    ///
    /// Returns 0.0 with fewer than 2 samples or no elapsed time.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(&(t0, b0)), Some(&(t1, b1))) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        let elapsed = t1.duration_since(t0);
        if elapsed.is_zero() {
            return 0.0;
        }
        b1.saturating_sub(b0) as f64 / elapsed.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    fn collecting_tracker(interval: Duration) -> (ProgressTracker, Arc<Mutex<Vec<TransferProgress>>>) {
        let tracker = ProgressTracker::new(Some(interval));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        tracker.on_progress(Box::new(move |p| s.lock().unwrap().push(p)));
        (tracker, seen)
    }

    #[tokio::test]
    async fn reader_forwards_bytes_unchanged() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut reader = ProgressReader::new(Cursor::new(data.clone()));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        assert_eq!(reader.counter().load(Ordering::Relaxed), data.len() as u64);
    }

    #[tokio::test]
    async fn reader_counter_is_shared() {
        let mut reader = ProgressReader::new(Cursor::new(vec![1u8; 64]));
        let counter = reader.counter();
        let mut buf = [0u8; 16];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn notify_calls_callbacks() {
        let (tracker, seen) = collecting_tracker(DEFAULT_INTERVAL);
        tracker.notify(5, 10);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].transferred, 5);
        assert_eq!(seen[0].percentage(), 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_reports_on_interval() {
        let (tracker, seen) = collecting_tracker(Duration::from_secs(3));
        let counter = Arc::new(AtomicU64::new(0));
        tracker.start(Arc::clone(&counter), 100);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(seen.lock().unwrap().is_empty());

        counter.store(40, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_secs(2)).await;
        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].transferred, 40);
            assert_eq!(seen[0].total, 100);
        }

        tracker.stop().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_observations_are_monotonic() {
        let (tracker, seen) = collecting_tracker(Duration::from_millis(100));
        let counter = Arc::new(AtomicU64::new(0));
        tracker.start(Arc::clone(&counter), 1_000);

        for _ in 0..20 {
            counter.fetch_add(50, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_millis(70)).await;
        }
        drop(tracker);

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        for pair in seen.windows(2) {
            assert!(pair[0].transferred <= pair[1].transferred);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn final_notify_is_last_after_stop() {
        let tracker = ProgressTracker::new(Some(Duration::from_millis(1)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        tracker.on_progress(Box::new(move |p: TransferProgress| {
            // Slow callback widens the window where a tick is mid-flight.
            std::thread::sleep(Duration::from_millis(2));
            s.lock().unwrap().push(p.transferred);
        }));

        let counter = Arc::new(AtomicU64::new(0));
        tracker.start(Arc::clone(&counter), 1_000);
        for _ in 0..10 {
            counter.fetch_add(90, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_millis(3)).await;
        }

        tracker.stop().await;
        tracker.notify(1_000, 1_000);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&1_000));
        for pair in seen.windows(2) {
            assert!(pair[0] <= pair[1], "observations went backwards: {seen:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_start_is_a_no_op() {
        let (tracker, seen) = collecting_tracker(Duration::from_secs(1));
        tracker.stop().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_does_not_affect_transfer() {
        let tracker = ProgressTracker::new(Some(Duration::from_millis(10)));
        tracker.on_progress(Box::new(|_| panic!("render failed")));

        let data = vec![9u8; 4096];
        let mut reader = ProgressReader::new(Cursor::new(data.clone()));
        tracker.start(reader.counter(), data.len() as u64);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_calculator_rate() {
        let calc = SpeedCalculator::new(None, None);
        calc.add_sample(0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        calc.add_sample(2_000);

        assert_eq!(calc.bytes_per_second(), 1_000.0);
    }

    #[test]
    fn speed_calculator_needs_two_samples() {
        let calc = SpeedCalculator::new(None, None);
        assert_eq!(calc.bytes_per_second(), 0.0);
        calc.add_sample(100);
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_max_samples() {
        let calc = SpeedCalculator::new(Some(Duration::from_secs(60)), Some(5));
        for i in 0..20 {
            calc.add_sample(i * 10);
        }
        assert!(calc.inner.lock().unwrap().samples.len() <= 5);
    }

    #[test]
    fn display_formats_units() {
        let p = TransferProgress {
            transferred: 1536,
            total: 3 * 1024 * 1024,
            bytes_per_second: 0.0,
        };
        assert_eq!(p.to_string(), "1.5 KiB / 3.0 MiB (0%)");

        let small = TransferProgress {
            transferred: 12,
            total: 24,
            bytes_per_second: 0.0,
        };
        assert_eq!(small.to_string(), "12 B / 24 B (50%)");
    }
}
