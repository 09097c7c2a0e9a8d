use std::{
    f64::consts::PI,
    time::{Duration, Instant},
};

use crate::bvh::Bvh;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum EasingCurve {
    Linear,
    #[default]
    InOutSine,
}

impl EasingCurve {
    pub fn value_for_progress(&self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            EasingCurve::Linear => p,
            EasingCurve::InOutSine => -0.5 * ((PI * p).cos() - 1.0),
        }
    }

    pub fn progress_for_value(&self, value: f64) -> f64 {
        let v = value.clamp(0.0, 1.0);
        match self {
            EasingCurve::Linear => v,
            EasingCurve::InOutSine => (1.0 - 2.0 * v).acos() / PI,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineState {
    NotRunning,
    Paused,
    Running,
}

/// Wall-clock driven frame counter. The owner calls `tick` from its event
/// loop and receives a frame only when it changes.
#[derive(Clone, Debug)]
pub struct Timeline {
    duration: Duration,
    start_frame: usize,
    end_frame: usize,
    loop_count: u32,
    current_loop: u32,
    current_time: Duration,
    current_frame: usize,
    state: TimelineState,
    last_tick: Option<Instant>,
    easing: EasingCurve,
}

impl Timeline {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            start_frame: 0,
            end_frame: 0,
            loop_count: 1,
            current_loop: 0,
            current_time: Duration::ZERO,
            current_frame: 0,
            state: TimelineState::NotRunning,
            last_tick: None,
            easing: EasingCurve::default(),
        }
    }

    pub fn set_frame_range(&mut self, start: usize, end: usize) {
        self.start_frame = start;
        self.end_frame = end.max(start);
        self.current_frame = self.frame_for_time(self.current_time);
    }

    /// 0 loops forever.
    pub fn set_loop_count(&mut self, count: u32) {
        self.loop_count = count;
    }

    pub fn set_easing_curve(&mut self, easing: EasingCurve) {
        self.easing = easing;
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn value_for_time(&self, time: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let clamped = time.min(self.duration);
        self.easing
            .value_for_progress(clamped.as_secs_f64() / self.duration.as_secs_f64())
    }

    pub fn frame_for_time(&self, time: Duration) -> usize {
        let span = (self.end_frame - self.start_frame) as f64;
        self.start_frame + (span * self.value_for_time(time)).floor() as usize
    }

    pub fn start(&mut self, now: Instant) -> Option<usize> {
        if self.state == TimelineState::Running {
            log::debug!("timeline already running");
            return None;
        }
        self.current_loop = 0;
        self.state = TimelineState::Running;
        self.last_tick = Some(now);
        self.set_time(Duration::ZERO)
    }

    /// Continues from the current time.
    pub fn resume(&mut self, now: Instant) {
        if self.state != TimelineState::Running {
            self.state = TimelineState::Running;
            self.last_tick = Some(now);
        }
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        match (paused, self.state) {
            (true, TimelineState::Running) => self.state = TimelineState::Paused,
            (false, TimelineState::Paused) => self.resume(now),
            _ => {}
        }
    }

    pub fn stop(&mut self) {
        self.state = TimelineState::NotRunning;
        self.last_tick = None;
    }

    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        if self.state != TimelineState::Running {
            return None;
        }
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let mut time = self.current_time + elapsed;
        if time >= self.duration {
            let more_loops = self.loop_count == 0 || self.current_loop + 1 < self.loop_count;
            if more_loops && !self.duration.is_zero() {
                self.current_loop += 1;
                let wrapped = time.as_nanos() % self.duration.as_nanos();
                time = Duration::from_nanos(wrapped as u64);
            } else {
                time = self.duration;
                self.state = TimelineState::NotRunning;
                self.last_tick = None;
            }
        }
        self.set_time(time)
    }

    /// Scrubs to `time`, keeping the running state.
    pub fn set_current_time(&mut self, time: Duration) -> Option<usize> {
        self.set_time(time.min(self.duration))
    }

    /// Scrubs to `frame`; the time is recovered through the inverse easing.
    pub fn set_current_frame(&mut self, frame: usize) -> Option<usize> {
        let frame = frame.clamp(self.start_frame, self.end_frame);
        let span = self.end_frame - self.start_frame;
        self.current_time = if span == 0 {
            Duration::ZERO
        } else {
            let value = (frame - self.start_frame) as f64 / span as f64;
            self.duration
                .mul_f64(self.easing.progress_for_value(value))
        };
        self.change_frame(frame)
    }

    fn set_time(&mut self, time: Duration) -> Option<usize> {
        self.current_time = time;
        let frame = self.frame_for_time(time);
        self.change_frame(frame)
    }

    fn change_frame(&mut self, frame: usize) -> Option<usize> {
        if frame == self.current_frame {
            return None;
        }
        self.current_frame = frame;
        Some(frame)
    }
}

/// `[Start][progress bar]` controller bound to one loaded motion.
#[derive(Clone, Debug, Default)]
pub struct Playback {
    timeline: Option<Timeline>,
    progress_max: usize,
    progress_value: usize,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bvh(&mut self, bvh: &Bvh, easing: EasingCurve, looping: bool) {
        let duration = Duration::from_millis((bvh.get_seconds() * 1000.0) as u64);
        let mut timeline = Timeline::new(duration);
        timeline.set_frame_range(0, bvh.frames);
        timeline.set_easing_curve(easing);
        timeline.set_loop_count(if looping { 0 } else { 1 });

        self.progress_max = bvh.frames;
        self.progress_value = 0;
        self.timeline = Some(timeline);
    }

    pub fn start(&mut self, now: Instant) -> Option<usize> {
        let frame = self.timeline.as_mut()?.start(now);
        self.apply(frame)
    }

    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        let frame = self.timeline.as_mut()?.tick(now);
        self.apply(frame)
    }

    pub fn toggle_pause(&mut self, now: Instant) {
        let Some(timeline) = self.timeline.as_mut() else {
            return;
        };
        match timeline.state() {
            TimelineState::Running => timeline.set_paused(true, now),
            TimelineState::Paused => timeline.set_paused(false, now),
            TimelineState::NotRunning => timeline.resume(now),
        }
    }

    pub fn stop(&mut self) {
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.stop();
        }
    }

    /// Moves the current frame by `delta`, clamped to the progress range.
    pub fn step(&mut self, delta: isize) -> Option<usize> {
        let target = self
            .progress_value
            .saturating_add_signed(delta)
            .min(self.progress_max);
        let frame = self.timeline.as_mut()?.set_current_frame(target);
        self.apply(frame)
    }

    pub fn is_loaded(&self) -> bool {
        self.timeline.is_some()
    }

    pub fn state(&self) -> TimelineState {
        self.timeline
            .as_ref()
            .map(Timeline::state)
            .unwrap_or(TimelineState::NotRunning)
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.progress_value, self.progress_max)
    }

    pub fn progress_fraction(&self) -> f32 {
        if self.progress_max == 0 {
            return 0.0;
        }
        self.progress_value as f32 / self.progress_max as f32
    }

    fn apply(&mut self, frame: Option<usize>) -> Option<usize> {
        if let Some(frame) = frame {
            self.progress_value = frame.min(self.progress_max);
        }
        frame
    }
}
