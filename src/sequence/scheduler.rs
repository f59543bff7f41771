use crate::{
    foundation::error::{BeatlineError, BeatlineResult},
    sequence::engine::{FrameOutcome, Sequence},
};

/// Opaque id of one scheduled frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host frame source (display refresh, game loop, offline renderer).
///
/// The host later calls [`Sequence::on_frame`] with the handle it was given.
pub trait FrameScheduler {
    /// Request a frame callback.
    fn schedule(&mut self) -> FrameHandle;
    /// Withdraw a request made by [`schedule`](Self::schedule).
    fn cancel(&mut self, handle: FrameHandle);
}

/// Hands out increasing handles and nothing else. Drivers read the pending
/// handle back from [`Sequence::pending_frame`].
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&mut self) -> FrameHandle {
        self.next += 1;
        FrameHandle(self.next)
    }

    fn cancel(&mut self, _handle: FrameHandle) {}
}

/// Counts from one [`FixedStepRunner::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frame callbacks delivered.
    pub frames: u64,
    /// Frames that produced a composited image.
    pub rendered: u64,
}

/// Fixed-rate loop driver: pumps [`Sequence::on_frame`] with synthetic host
/// timestamps `i * 1000 / fps`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedStepRunner {
    fps: f64,
    max_frames: Option<u64>,
}

impl FixedStepRunner {
    /// Runner at `fps` frames per second.
    pub fn new(fps: f64) -> BeatlineResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(BeatlineError::validation(format!(
                "fps must be finite and > 0 (got {fps})"
            )));
        }
        Ok(Self {
            fps,
            max_frames: None,
        })
    }

    /// Stop after `max_frames` callbacks.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Host time between frames.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Play `sequence` until it stops, is paused or hits the frame cap.
    /// `on_rendered(frame_index, sequence)` sees every composited frame and
    /// may mutate the sequence before the next one (e.g. conductor events).
    pub fn run<F>(&self, sequence: &mut Sequence, mut on_rendered: F) -> BeatlineResult<RunStats>
    where
        F: FnMut(u64, &mut Sequence) -> BeatlineResult<()>,
    {
        sequence.play();
        let mut stats = RunStats::default();
        while let Some(handle) = sequence.pending_frame() {
            if self.max_frames.is_some_and(|max| stats.frames >= max) {
                break;
            }
            let host_ms = stats.frames as f64 * self.frame_interval_ms();
            let outcome = sequence.on_frame(handle, host_ms);
            stats.frames += 1;
            match outcome {
                FrameOutcome::Rendered => {
                    on_rendered(stats.frames - 1, sequence)?;
                    stats.rendered += 1;
                }
                FrameOutcome::Idle => {}
                FrameOutcome::Finished | FrameOutcome::NotPlaying => break,
            }
        }
        tracing::debug!(frames = stats.frames, rendered = stats.rendered, "run finished");
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/scheduler.rs"]
mod tests;
