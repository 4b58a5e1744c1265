use std::time::Duration;

/// A bounded wait for a target state expired.
#[derive(Debug, Clone, thiserror::Error)]
#[error("`{unit}` did not reach {target} within {}s", .waited.as_secs_f32())]
pub struct WaitTimeout {
    pub unit: String,
    pub target: &'static str,
    pub waited: Duration,
}
