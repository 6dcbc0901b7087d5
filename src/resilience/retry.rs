use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::helpers::time::add_duration;

/// Flat wait between a failed round and the next attempt.
///
/// No backoff: the next attempt after a failure is always
/// `failed_at + wait`, however many failures preceded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryWait {
    wait: Duration,
}

impl RetryWait {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn next_attempt_at(&self, failed_at: DateTime<Utc>) -> DateTime<Utc> {
        add_duration(failed_at, self.wait)
    }
}
