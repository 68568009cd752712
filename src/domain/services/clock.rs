/// Source of submission timestamps
pub trait SubmissionClock {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}
