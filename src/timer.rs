//! Poll-based countdown timer.
//!
//! The state machines never wait on the timer directly: they ask whether it
//! has expired between receive attempts and use [`CountdownTimer::remaining`]
//! to bound how long a single attempt may sleep.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CountdownTimer {
    duration: Duration,
    deadline: Option<Instant>,
}

impl CountdownTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            deadline: None,
        }
    }

    /// Takes effect at the next [`start`](Self::start).
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Starts counting from zero, restarting if already running.
    pub fn start(&mut self) {
        self.deadline = Some(Instant::now() + self.duration);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn running(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once the duration has elapsed since the last start, until the
    /// timer is started again or stopped.
    pub fn expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Time left before expiry. Zero when stopped or expired.
    pub fn remaining(&self) -> Duration {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn expires_after_duration() {
        let mut timer = CountdownTimer::new(Duration::from_millis(100));
        timer.start();
        assert!(timer.running());
        assert!(!timer.expired());

        advance(Duration::from_millis(99)).await;
        assert!(!timer.expired());
        assert_eq!(timer.remaining(), Duration::from_millis(1));

        advance(Duration::from_millis(1)).await;
        assert!(timer.expired());
        assert_eq!(timer.remaining(), Duration::ZERO);

        advance(Duration::from_secs(10)).await;
        assert!(timer.expired(), "stays expired until restarted");
    }

    #[tokio::test(start_paused = true)]
    async fn start_restarts_countdown() {
        let mut timer = CountdownTimer::new(Duration::from_millis(50));
        timer.start();
        advance(Duration::from_millis(60)).await;
        assert!(timer.expired());

        timer.start();
        assert!(!timer.expired());
        advance(Duration::from_millis(30)).await;
        timer.start();
        advance(Duration::from_millis(30)).await;
        assert!(!timer.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_safe_and_clears_state() {
        let mut timer = CountdownTimer::new(Duration::from_millis(10));
        timer.stop();
        assert!(!timer.running());

        timer.start();
        advance(Duration::from_millis(20)).await;
        timer.stop();
        assert!(!timer.running());
        assert!(!timer.expired());
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn new_duration_applies_on_next_start() {
        let mut timer = CountdownTimer::new(Duration::from_millis(10));
        timer.start();
        timer.set_duration(Duration::from_millis(40));
        advance(Duration::from_millis(20)).await;
        assert!(timer.expired());

        timer.start();
        advance(Duration::from_millis(20)).await;
        assert!(!timer.expired());
    }
}
