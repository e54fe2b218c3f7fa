//! Wall-clock port.

/// Source of wall-clock time in milliseconds since the Unix epoch.
///
/// Used for persisted timestamps and the pause/confirmation grace windows.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
