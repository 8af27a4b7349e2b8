// src/session/clock.rs

use super::SessionError;

/// Result of advancing the clock by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Clock is not running (not started, stopped, or already expired).
    Idle,
    /// On break; nothing was decremented.
    Paused,
    /// Decremented; seconds left.
    Running(u32),
    /// Reached zero on this tick. Reported once.
    Expired,
}

/// Countdown in whole seconds, pausable for breaks.
#[derive(Debug, Clone)]
pub struct SessionClock {
    time_left: u32,
    running: bool,
    on_break: bool,
    expired: bool,
}

impl SessionClock {
    pub fn from_minutes(minutes: u32) -> Self {
        Self {
            time_left: minutes.saturating_mul(60),
            running: false,
            on_break: false,
            expired: false,
        }
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn is_on_break(&self) -> bool {
        self.on_break
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn start(&mut self) {
        if !self.expired {
            self.running = true;
        }
    }

    /// Freezes the clock for good, e.g. after a manual submit.
    pub fn stop(&mut self) {
        self.running = false;
        self.on_break = false;
    }

    pub fn tick(&mut self) -> Tick {
        if !self.running || self.expired {
            return Tick::Idle;
        }
        if self.on_break {
            return Tick::Paused;
        }

        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.expired = true;
            self.running = false;
            return Tick::Expired;
        }
        Tick::Running(self.time_left)
    }

    pub fn start_break(&mut self) -> Result<(), SessionError> {
        if !self.running {
            return Err(SessionError::NotInProgress);
        }
        if self.on_break {
            return Err(SessionError::OnBreak);
        }
        self.on_break = true;
        Ok(())
    }

    pub fn end_break(&mut self) -> Result<(), SessionError> {
        if !self.running {
            return Err(SessionError::NotInProgress);
        }
        if !self.on_break {
            return Err(SessionError::NotOnBreak);
        }
        self.on_break = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_until_started() {
        let mut clock = SessionClock::from_minutes(1);
        assert_eq!(clock.tick(), Tick::Idle);
        assert_eq!(clock.time_left(), 60);
    }

    #[test]
    fn test_counts_down_to_zero_once() {
        let mut clock = SessionClock::from_minutes(1);
        clock.start();

        let mut expiries = 0;
        for _ in 0..120 {
            if clock.tick() == Tick::Expired {
                expiries += 1;
            }
        }

        assert_eq!(expiries, 1);
        assert_eq!(clock.time_left(), 0);
        assert!(clock.is_expired());
    }

    #[test]
    fn test_break_suspends_without_reset() {
        let mut clock = SessionClock::from_minutes(1);
        clock.start();
        clock.tick();
        clock.tick();
        assert_eq!(clock.time_left(), 58);

        clock.start_break().unwrap();
        for _ in 0..10 {
            assert_eq!(clock.tick(), Tick::Paused);
        }
        assert_eq!(clock.time_left(), 58);

        clock.end_break().unwrap();
        assert_eq!(clock.tick(), Tick::Running(57));
    }

    #[test]
    fn test_rapid_break_toggling_still_expires_once() {
        let mut clock = SessionClock::from_minutes(1);
        clock.start();

        let mut expiries = 0;
        for i in 0..500 {
            if i % 3 == 0 {
                let _ = clock.start_break();
            } else if i % 3 == 1 {
                let _ = clock.end_break();
            }
            if clock.tick() == Tick::Expired {
                expiries += 1;
            }
        }

        assert_eq!(expiries, 1);
        assert_eq!(clock.time_left(), 0);
    }

    #[test]
    fn test_break_rules() {
        let mut clock = SessionClock::from_minutes(1);
        assert!(matches!(clock.start_break(), Err(SessionError::NotInProgress)));

        clock.start();
        assert!(matches!(clock.end_break(), Err(SessionError::NotOnBreak)));
        clock.start_break().unwrap();
        assert!(matches!(clock.start_break(), Err(SessionError::OnBreak)));
    }

    #[test]
    fn test_stopped_clock_does_not_move() {
        let mut clock = SessionClock::from_minutes(1);
        clock.start();
        clock.stop();
        assert_eq!(clock.tick(), Tick::Idle);
        assert_eq!(clock.time_left(), 60);
    }
}
