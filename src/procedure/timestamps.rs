//! Reconciliation of model-reported step windows with the real video timeline

use crate::procedure::Step;
use tracing::debug;

/// Shortest window a step may have once reconciled, seconds
pub const MIN_WINDOW_SECS: f64 = 0.5;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Steps whose missing window was replaced by an even share of the video
    pub split: usize,
    /// Steps whose window was clamped or widened
    pub clamped: usize,
    /// Steps whose window was moved to remove an overlap
    pub trimmed: usize,
    /// Steps were out of time order and have been sorted and renumbered
    pub reordered: bool,
}

impl ReconcileSummary {
    pub fn changed(&self) -> usize {
        self.split + self.clamped + self.trimmed + usize::from(self.reordered)
    }
}

/// Fills missing windows and keeps the rest inside the video
///
/// Running it twice gives the same windows as running it once.
#[derive(Debug, Clone, Copy)]
pub struct TimestampReconciler {
    min_window: f64,
}

impl Default for TimestampReconciler {
    fn default() -> Self {
        Self {
            min_window: MIN_WINDOW_SECS,
        }
    }
}

impl TimestampReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles `steps` in place against a video of `duration` seconds
    ///
    /// A duration of zero or less means unknown: missing windows stay as they
    /// are, and valid ones are only kept non-negative and non-degenerate.
    pub fn reconcile(&self, steps: &mut [Step], duration: f64) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let known = duration.is_finite() && duration > 0.0;
        let count = steps.len();

        for (index, step) in steps.iter_mut().enumerate() {
            if !step.has_valid_window() {
                if known {
                    let slot = duration / count as f64;
                    step.start_time = index as f64 * slot;
                    step.end_time = if index + 1 == count {
                        duration
                    } else {
                        (index + 1) as f64 * slot
                    };
                    summary.split += 1;
                }
                continue;
            }

            let before = (step.start_time, step.end_time);
            self.clamp_window(step, known.then_some(duration));
            if (step.start_time, step.end_time) != before {
                summary.clamped += 1;
            }
        }

        if steps.iter().all(Step::has_valid_window) {
            summary.reordered = sort_by_start(steps);
            summary.trimmed = self.separate(steps, known.then_some(duration));
        }

        for step in steps.iter_mut().filter(|s| s.has_valid_window()) {
            step.expected_duration_seconds = (step.window_len().round() as u32).max(1);
        }

        if summary.changed() > 0 {
            debug!(
                split = summary.split,
                clamped = summary.clamped,
                trimmed = summary.trimmed,
                reordered = summary.reordered,
                "Reconciled step windows against {:.1}s of video",
                duration
            );
        }
        summary
    }

    fn clamp_window(&self, step: &mut Step, duration: Option<f64>) {
        let mut start = step.start_time.max(0.0);
        let mut end = step.end_time.max(0.0);

        if let Some(duration) = duration {
            start = start.min(duration);
            end = end.min(duration);
        }

        if end < start + self.min_window {
            end = start + self.min_window;
            if let Some(duration) = duration {
                if end > duration {
                    end = duration;
                    start = (duration - self.min_window).max(0.0);
                }
            }
        }

        step.start_time = start;
        step.end_time = end;
    }

    /// Removes overlaps between consecutive steps, returns how many windows moved
    ///
    /// A later step that runs past its predecessor loses its head. One that
    /// ends inside it cuts the predecessor short instead. Two steps that nearly
    /// coincide are laid end to end. With a known duration the windows are then
    /// pulled back under it, or split evenly when they cannot all fit.
    fn separate(&self, steps: &mut [Step], duration: Option<f64>) -> usize {
        let before: Vec<(f64, f64)> = steps.iter().map(|s| (s.start_time, s.end_time)).collect();

        for i in 1..steps.len() {
            let (head, tail) = steps.split_at_mut(i);
            let previous = &mut head[i - 1];
            let step = &mut tail[0];
            if step.start_time >= previous.end_time {
                continue;
            }

            if step.end_time - previous.end_time >= self.min_window {
                step.start_time = previous.end_time;
            } else if step.start_time - previous.start_time >= self.min_window {
                previous.end_time = step.start_time;
            } else {
                step.start_time = previous.end_time;
                step.end_time = step.start_time + self.min_window;
            }
        }

        if let Some(duration) = duration {
            if steps.len() as f64 * self.min_window > duration {
                split_evenly(steps, duration);
            } else {
                let mut cap = duration;
                for step in steps.iter_mut().rev() {
                    step.end_time = step.end_time.min(cap);
                    if step.end_time - step.start_time < self.min_window {
                        step.start_time = step.end_time - self.min_window;
                    }
                    cap = step.start_time;
                }
            }
        }

        steps
            .iter()
            .zip(before)
            .filter(|(step, (start, end))| step.start_time != *start || step.end_time != *end)
            .count()
    }
}

/// Stable sort by start time; renumbers ids when the order changed
fn sort_by_start(steps: &mut [Step]) -> bool {
    let ordered = steps
        .windows(2)
        .all(|pair| pair[0].start_time <= pair[1].start_time);
    if ordered {
        return false;
    }

    steps.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    for (index, step) in steps.iter_mut().enumerate() {
        step.step_id = index as u32 + 1;
    }
    debug!("Steps were out of time order, renumbered after sorting");
    true
}

fn split_evenly(steps: &mut [Step], duration: f64) {
    let count = steps.len();
    let slot = duration / count as f64;
    for (index, step) in steps.iter_mut().enumerate() {
        step.start_time = index as f64 * slot;
        step.end_time = if index + 1 == count {
            duration
        } else {
            (index + 1) as f64 * slot
        };
    }
}
