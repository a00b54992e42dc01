//! Frame graph configuration.

/// What a frame does when a pass callback fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the frame at the first failing pass.
    #[default]
    Abort,
    /// Keep executing the remaining passes and report every failure.
    Continue,
}

/// Configuration for a [`FrameGraph`](crate::FrameGraph).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGraphConfig {
    /// Frames a free object may stay unused before a flush disposes it.
    pub max_age_frames: u64,
    /// Behaviour on pass failure.
    pub failure_policy: FailurePolicy,
    /// Record a [`CaptureEvent`](crate::CaptureEvent) log.
    pub capture_events: bool,
    /// Number of object map slots used by [`ObjectMapSlots`](crate::ObjectMapSlots).
    pub frames_in_flight: usize,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            max_age_frames: 8,
            failure_policy: FailurePolicy::Abort,
            capture_events: false,
            frames_in_flight: 2,
        }
    }
}

impl FrameGraphConfig {
    pub fn with_max_age_frames(mut self, frames: u64) -> Self {
        self.max_age_frames = frames;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_capture_events(mut self, enabled: bool) -> Self {
        self.capture_events = enabled;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }
}
