//! Test session tracking.
//!
//! A session is the span of time during which the rotor turns. It opens on the poll
//! where RPM goes from all-zero to any channel above zero, and closes on the poll
//! where every channel is back to zero. Records are only logged while a session is
//! open, and the session id names the log file.
//!
//! ## States
//!
//! - **Idle**: no session; nothing is logged.
//! - **Active**: a session id exists and every poll is logged, including the poll that
//!   ends the session.
//!
//! The previous poll's RPM starts out unknown, so the very first poll after start-up
//! cannot open a session even if the rotor is already turning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session id format, UTC with second resolution.
pub const SESSION_ID_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// An active logging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identifier derived from the start time; also the log file stem.
    pub id: String,
    /// When the rotor started turning.
    pub start_time: DateTime<Utc>,
}

impl Session {
    /// Open a session starting at `start_time`.
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            id: start_time.format(SESSION_ID_FORMAT).to_string(),
            start_time,
        }
    }
}

/// Outcome of [`SessionManager::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    /// State unchanged.
    None,
    /// A session was opened on this poll.
    Started(Session),
    /// The session ended on this poll.
    Stopped(Session),
}

/// Session state machine driven by per-channel RPM.
#[derive(Debug, Default)]
pub struct SessionManager {
    active: Option<Session>,
    previous_rpm: Option<Vec<u32>>,
}

impl SessionManager {
    /// Idle manager with no RPM history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently open session.
    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Id of the currently open session.
    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.id.as_str())
    }

    /// RPM remembered from the previous poll.
    pub fn previous_rpm(&self) -> Option<&[u32]> {
        self.previous_rpm.as_deref()
    }

    /// Open a session if this poll starts rotation.
    ///
    /// Call before logging the cycle's record so the first rotating poll is logged.
    pub fn begin_cycle(&mut self, current: &[u32], now: DateTime<Utc>) -> Option<&Session> {
        let was_still = self
            .previous_rpm
            .as_deref()
            .is_some_and(|previous| previous.iter().all(|&rpm| rpm == 0));
        let is_turning = current.iter().any(|&rpm| rpm > 0);

        if self.active.is_none() && was_still && is_turning {
            let session = Session::starting_at(now);
            tracing::info!(session_id = %session.id, rpm = ?current, "session started");
            self.active = Some(session);
            return self.active.as_ref();
        }
        None
    }

    /// Close the session if this poll ends rotation, and remember `current`.
    ///
    /// Call after logging the cycle's record so the final poll is logged.
    pub fn end_cycle(&mut self, current: &[u32]) -> Option<Session> {
        let was_turning = self
            .previous_rpm
            .as_deref()
            .is_some_and(|previous| previous.iter().any(|&rpm| rpm > 0));
        let is_still = current.iter().all(|&rpm| rpm == 0);

        self.previous_rpm = Some(current.to_vec());

        if was_turning && is_still {
            let session = self.active.take()?;
            tracing::info!(session_id = %session.id, "session stopped");
            return Some(session);
        }
        None
    }

    /// Apply both halves of a cycle at once.
    ///
    /// Useful when nothing has to happen between opening and closing, e.g. in tests
    /// and simulations. Opening takes precedence; a poll cannot both open and close.
    pub fn advance(&mut self, current: &[u32], now: DateTime<Utc>) -> SessionTransition {
        if let Some(started) = self.begin_cycle(current, now).cloned() {
            self.previous_rpm = Some(current.to_vec());
            return SessionTransition::Started(started);
        }
        match self.end_cycle(current) {
            Some(stopped) => SessionTransition::Stopped(stopped),
            None => SessionTransition::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, sec).unwrap()
    }

    #[test]
    fn test_session_id_format() {
        let session = Session::starting_at(at(9));
        assert_eq!(session.id, "2024-03-09_14.05.09");
    }

    #[test]
    fn test_first_poll_never_starts_session() {
        let mut manager = SessionManager::new();
        assert_eq!(manager.advance(&[500, 0], at(0)), SessionTransition::None);
        assert!(manager.active().is_none());
    }

    #[test]
    fn test_lifecycle() {
        let mut manager = SessionManager::new();
        manager.advance(&[0, 0], at(0));

        match manager.advance(&[5, 0], at(1)) {
            SessionTransition::Started(session) => assert_eq!(session.id, "2024-03-09_14.05.01"),
            other => panic!("expected start, got {other:?}"),
        }
        assert_eq!(manager.session_id(), Some("2024-03-09_14.05.01"));

        assert_eq!(manager.advance(&[7, 3], at(2)), SessionTransition::None);

        match manager.advance(&[0, 0], at(3)) {
            SessionTransition::Stopped(session) => assert_eq!(session.id, "2024-03-09_14.05.01"),
            other => panic!("expected stop, got {other:?}"),
        }
        assert!(manager.session_id().is_none());
    }

    #[test]
    fn test_split_cycle_keeps_session_for_final_record() {
        let mut manager = SessionManager::new();
        manager.advance(&[0, 0], at(0));
        manager.advance(&[5, 0], at(1));

        // Stopping poll: session still visible between the two halves.
        assert!(manager.begin_cycle(&[0, 0], at(2)).is_none());
        assert!(manager.session_id().is_some());
        assert!(manager.end_cycle(&[0, 0]).is_some());
        assert!(manager.session_id().is_none());
    }

    #[test]
    fn test_no_restart_while_active() {
        let mut manager = SessionManager::new();
        manager.advance(&[0, 0], at(0));
        manager.advance(&[5, 0], at(1));
        assert_eq!(manager.advance(&[5, 9], at(2)), SessionTransition::None);
        assert_eq!(manager.session_id(), Some("2024-03-09_14.05.01"));
    }

    #[test]
    fn test_remembers_previous_rpm() {
        let mut manager = SessionManager::new();
        assert!(manager.previous_rpm().is_none());
        manager.advance(&[0, 4], at(0));
        assert_eq!(manager.previous_rpm(), Some(&[0, 4][..]));
    }
}
