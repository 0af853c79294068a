//! Shared wall clock, written only by time sync.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClockState {
    unix_secs: u32,
    synced_at_uptime_secs: u64,
}

/// The device's notion of wall-clock time.
///
/// Holds the last authoritative unix timestamp fetched from the server and
/// the uptime at which it was fetched. Readers extrapolate from there. Only
/// [`UploadSession::sync_clock`](crate::session::UploadSession::sync_clock)
/// writes it, and only with a fully parsed value.
pub struct Clock {
    state: Mutex<CriticalSectionRawMutex, Cell<ClockState>>,
}

/// Process-wide clock for the firmware.
pub static CLOCK: Clock = Clock::new();

impl Clock {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(ClockState {
                unix_secs: 0,
                synced_at_uptime_secs: 0,
            })),
        }
    }

    /// Last synced unix timestamp, 0 if never synced.
    pub fn timestamp(&self) -> u32 {
        self.state.lock(|s| s.get().unix_secs)
    }

    /// Whether at least one sync has succeeded.
    pub fn is_synced(&self) -> bool {
        self.timestamp() != 0
    }

    /// Uptime (seconds) at which the last sync happened.
    pub fn synced_at(&self) -> u64 {
        self.state.lock(|s| s.get().synced_at_uptime_secs)
    }

    /// Current unix time extrapolated from the last sync.
    ///
    /// Returns 0 before the first sync, which is the empty-slot sentinel, so
    /// callers must not stamp samples with it.
    pub fn now(&self, uptime_secs: u64) -> u32 {
        let state = self.state.lock(|s| s.get());
        if state.unix_secs == 0 {
            return 0;
        }
        let elapsed = uptime_secs.saturating_sub(state.synced_at_uptime_secs);
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        state.unix_secs.saturating_add(elapsed)
    }

    pub(crate) fn set(&self, unix_secs: u32, uptime_secs: u64) {
        self.state.lock(|s| {
            s.set(ClockState {
                unix_secs,
                synced_at_uptime_secs: uptime_secs,
            })
        });
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsynced_clock_reads_zero() {
        let clock = Clock::new();
        assert_eq!(clock.timestamp(), 0);
        assert_eq!(clock.now(1234), 0);
        assert!(!clock.is_synced());
    }

    #[test]
    fn test_now_extrapolates_from_sync_point() {
        let clock = Clock::new();
        clock.set(1_700_000_000, 50);
        assert!(clock.is_synced());
        assert_eq!(clock.timestamp(), 1_700_000_000);
        assert_eq!(clock.now(50), 1_700_000_000);
        assert_eq!(clock.now(80), 1_700_000_030);
        assert_eq!(clock.synced_at(), 50);
    }

    #[test]
    fn test_now_before_sync_point_does_not_go_backwards() {
        let clock = Clock::new();
        clock.set(1_700_000_000, 100);
        assert_eq!(clock.now(10), 1_700_000_000);
    }

    #[test]
    fn test_now_saturates() {
        let clock = Clock::new();
        clock.set(u32::MAX - 5, 0);
        assert_eq!(clock.now(1000), u32::MAX);
    }
}
