use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Averages over the last metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub frame_time_ms: f32,
    pub max_frame_time_ms: f32,
    pub update_ms: f32,
    pub render_ms: f32,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FrameTimings {
    pub frame: Duration,
    pub update: Duration,
    pub render: Duration,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    frame_time_sum: Duration,
    frame_time_max: Duration,
    update_sum: Duration,
    render_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub(crate) fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval_start: start,
            interval,
            frames: 0,
            frame_time_sum: Duration::ZERO,
            frame_time_max: Duration::ZERO,
            update_sum: Duration::ZERO,
            render_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, timings: FrameTimings) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(timings.frame);
        self.frame_time_max = self.frame_time_max.max(timings.frame);
        self.update_sum = self.update_sum.saturating_add(timings.update);
        self.render_sum = self.render_sum.saturating_add(timings.render);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let average_ms = |sum: Duration| {
            if self.frames == 0 {
                0.0
            } else {
                sum.as_secs_f32() / self.frames as f32 * 1000.0
            }
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            frame_time_ms: average_ms(self.frame_time_sum),
            max_frame_time_ms: self.frame_time_max.as_secs_f32() * 1000.0,
            update_ms: average_ms(self.update_sum),
            render_ms: average_ms(self.render_sum),
        };

        *self = Self::starting_at(self.interval, now);
        Some(snapshot)
    }
}
