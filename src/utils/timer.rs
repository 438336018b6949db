//! Stage timing

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Timer for measuring execution time of pipeline stages
#[derive(Debug)]
pub struct Timer {
    name: String,
    start: Instant,
    checkpoints: Vec<(String, Duration)>,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            checkpoints: Vec::new(),
        }
    }

    /// Record a named checkpoint
    pub fn checkpoint(&mut self, name: impl Into<String>) {
        let name = name.into();
        let at = self.start.elapsed();
        debug!(timer = %self.name, checkpoint = %name, elapsed_secs = at.as_secs_f64(), "Checkpoint");
        self.checkpoints.push((name, at));
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Recorded checkpoints, in order
    pub fn checkpoints(&self) -> &[(String, Duration)] {
        &self.checkpoints
    }

    /// Stop and log the timer
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        info!("{} completed in {:.3}s", self.name, elapsed.as_secs_f64());
        elapsed
    }

    /// Stop and log every checkpoint with its delta
    pub fn stop_with_report(self) -> Duration {
        let elapsed = self.start.elapsed();

        info!("=== {} timing ===", self.name);
        let mut prev = Duration::ZERO;
        for (name, at) in &self.checkpoints {
            let delta = at.saturating_sub(prev);
            info!("  {}: {:.3}s (+{:.3}s)", name, at.as_secs_f64(), delta.as_secs_f64());
            prev = *at;
        }
        info!("  total: {:.3}s", elapsed.as_secs_f64());

        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test");
        sleep(Duration::from_millis(10));
        let elapsed = timer.stop();

        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_timer_checkpoints() {
        let mut timer = Timer::start("test");

        sleep(Duration::from_millis(2));
        timer.checkpoint("load");
        sleep(Duration::from_millis(2));
        timer.checkpoint("evaluate");

        assert_eq!(timer.checkpoints().len(), 2);
        assert!(timer.checkpoints()[1].1 >= timer.checkpoints()[0].1);
    }
}
