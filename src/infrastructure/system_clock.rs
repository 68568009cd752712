use chrono::Utc;

use crate::domain::services::clock::SubmissionClock;

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl SubmissionClock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
