use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::credentials::CredentialBundle;
use crate::helpers::time::add_duration;
use crate::resilience::retry::RetryWait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

/// Snapshot of the renewal schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleState {
    pub phase: Phase,
    /// `None` while no timer is armed
    pub next_fire_at: Option<DateTime<Utc>>,
    /// failed rounds since the last success
    pub retry_count: u32,
    pub rounds: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScheduleState {
    pub fn reset(now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Idle,
            next_fire_at: Some(now),
            retry_count: 0,
            rounds: 0,
            last_started_at: None,
            last_finished_at: None,
            last_success_at: None,
            last_error: None,
        }
    }

    pub(crate) fn begin(&mut self, at: DateTime<Utc>) {
        self.phase = Phase::Running;
        self.rounds += 1;
        self.last_started_at = Some(at);
    }

    /// Next fire is the deadline, but never sooner than `at + min_delay`.
    pub(crate) fn succeed(&mut self, at: DateTime<Utc>, deadline: Option<DateTime<Utc>>, min_delay: Duration) {
        self.phase = Phase::Succeeded;
        self.retry_count = 0;
        self.last_finished_at = Some(at);
        self.last_success_at = Some(at);
        self.last_error = None;
        let earliest_allowed = add_duration(at, min_delay);
        self.next_fire_at = deadline.map(|deadline| deadline.max(earliest_allowed));
    }

    pub(crate) fn fail(&mut self, at: DateTime<Utc>, retry: &RetryWait, error: String) {
        self.phase = Phase::Failed;
        self.retry_count += 1;
        self.last_finished_at = Some(at);
        self.last_error = Some(error);
        self.next_fire_at = Some(retry.next_attempt_at(at));
    }

    pub(crate) fn rearm(&mut self) {
        self.phase = Phase::Idle;
    }

    pub(crate) fn stop(&mut self) {
        self.phase = Phase::Stopped;
        self.next_fire_at = None;
    }
}

/// What the last successful round handed to the distribution endpoint.
#[derive(Debug, Clone)]
pub struct PublishedCredentials {
    pub bundle: CredentialBundle,
    pub serialized: Arc<Vec<u8>>,
    pub renewal_deadline: Option<DateTime<Utc>>,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn success_resets_retries_and_clamps_past_deadline() {
        let t = Utc::now();
        let mut state = ScheduleState::reset(t);
        state.fail(t, &RetryWait::new(Duration::from_secs(60)), "kdc down".to_owned());
        assert_eq!(state.retry_count, 1);

        state.succeed(t, Some(t - TimeDelta::seconds(5)), Duration::from_secs(1));
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.last_error, None);
        assert_eq!(state.next_fire_at, Some(t + TimeDelta::seconds(1)));
    }

    #[test]
    fn success_without_deadline_disarms_timer() {
        let t = Utc::now();
        let mut state = ScheduleState::reset(t);
        state.succeed(t, None, Duration::from_secs(1));
        assert_eq!(state.next_fire_at, None);
    }

    #[test]
    fn failure_schedules_flat_retry() {
        let t = Utc::now();
        let mut state = ScheduleState::reset(t);
        let retry = RetryWait::new(Duration::from_secs(600));
        state.fail(t, &retry, "a".to_owned());
        state.fail(t, &retry, "b".to_owned());
        assert_eq!(state.retry_count, 2);
        assert_eq!(state.next_fire_at, Some(t + TimeDelta::seconds(600)));
    }
}
