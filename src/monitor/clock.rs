use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall clock time that only moves forward.
///
/// Anchored to the system clock once, then advanced by the monotonic clock, so an NTP step
/// can never produce a reading older than the one before it.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall: DateTime<Utc>,
    origin: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed =
            chrono::Duration::from_std(self.origin.elapsed()).unwrap_or(chrono::Duration::zero());
        self.wall + elapsed
    }
}
