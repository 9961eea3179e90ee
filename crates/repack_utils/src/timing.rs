use std::time::{Duration, Instant};

/// Simple stopwatch helper for wall-clock measurements.
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start_new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Named wall-clock measurements for the stages of a pass run.
#[derive(Default)]
pub struct PhaseTimings {
    phases: Vec<(String, Duration)>,
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` and records its duration under `name`.
    pub fn record<F, T>(&mut self, name: impl Into<String>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let watch = Stopwatch::start_new();
        let output = f();
        self.phases.push((name.into(), watch.elapsed()));
        output
    }

    pub fn phases(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.phases.iter().map(|(name, d)| (name.as_str(), *d))
    }
}
