use std::time::{Duration, Instant};

/// Time elapsed between consecutive calls, read from one clock sample per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeltaTimer {
    last: Option<Instant>,
}

impl DeltaTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero on the first call.
    pub fn next(&mut self) -> Duration {
        let now = Instant::now();
        let dt = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last = Some(now);
        dt
    }
}
