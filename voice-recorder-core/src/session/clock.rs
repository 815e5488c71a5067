use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Tracks active time of a session, excluding paused intervals.
#[derive(Debug, Clone)]
pub struct SessionClock {
    started: Instant,
    started_at: DateTime<Utc>,
    paused_duration: Duration,
    last_pause: Option<Instant>,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            paused_duration: Duration::ZERO,
            last_pause: None,
        }
    }

    pub fn pause(&mut self) {
        if self.last_pause.is_none() {
            self.last_pause = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(pause_start) = self.last_pause.take() {
            self.paused_duration += pause_start.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.last_pause.is_some()
    }

    pub fn elapsed_secs(&self) -> f64 {
        let mut paused = self.paused_duration;
        if let Some(pause_start) = self.last_pause {
            paused += pause_start.elapsed();
        }
        self.started.elapsed().saturating_sub(paused).as_secs_f64()
    }

    pub fn started_at(&self) -> String {
        self.started_at.to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::thread;

    #[test]
    fn paused_time_is_excluded() {
        let mut clock = SessionClock::start();
        clock.pause();
        assert!(clock.is_paused());
        thread::sleep(Duration::from_millis(50));
        let while_paused = clock.elapsed_secs();
        thread::sleep(Duration::from_millis(20));
        assert_abs_diff_eq!(clock.elapsed_secs(), while_paused, epsilon = 0.01);

        clock.resume();
        assert!(!clock.is_paused());
        assert!(clock.elapsed_secs() < 0.04);
    }

    #[test]
    fn double_pause_keeps_first_timestamp() {
        let mut clock = SessionClock::start();
        clock.pause();
        let first = clock.last_pause;
        clock.pause();
        assert_eq!(clock.last_pause, first);
    }

    #[test]
    fn started_at_is_rfc3339() {
        let clock = SessionClock::start();
        assert!(DateTime::parse_from_rfc3339(&clock.started_at()).is_ok());
    }
}
