//! The monitoring loop.
//!
//! Owns the sample buffer and decides when to sample, upload and resync the
//! clock. Anything that fails is tried again on the next tick.

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{EXPECTED_UPLOAD_STATUS, Schedule};
use crate::http::StatusCode;
use crate::sample::{BATCH_CAPACITY, SampleBuffer};
use crate::sensors::{SensorError, TemperatureSensor};
use crate::session::{HttpTransport, SyncError, UploadSession};

/// What happened to the sample slot on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Recorded { index: usize, timestamp: u32 },
    /// No clock yet; a 0 timestamp would read as an empty slot
    SkippedUnsynced,
    SensorFailed(SensorError),
}

/// Summary of one [`TelemetryAgent::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub sync: Option<Result<u32, SyncError>>,
    pub sample: SampleOutcome,
    pub upload: Option<StatusCode>,
}

pub struct TelemetryAgent<'a, T, S, const N: usize = BATCH_CAPACITY> {
    session: UploadSession<'a, T>,
    sensor: S,
    buffer: SampleBuffer<N>,
    clock: &'a Clock,
    schedule: Schedule,
    last_upload_uptime: u64,
}

impl<'a, T, S, const N: usize> TelemetryAgent<'a, T, S, N>
where
    T: HttpTransport,
    S: TemperatureSensor,
{
    pub fn new(
        session: UploadSession<'a, T>,
        sensor: S,
        clock: &'a Clock,
        schedule: Schedule,
    ) -> Self {
        Self {
            session,
            sensor,
            buffer: SampleBuffer::new(),
            clock,
            schedule,
            last_upload_uptime: 0,
        }
    }

    pub fn buffer(&self) -> &SampleBuffer<N> {
        &self.buffer
    }

    pub fn session(&self) -> &UploadSession<'a, T> {
        &self.session
    }

    /// One pass of the loop: resync if due, take a sample, upload if due.
    pub async fn tick(&mut self, uptime_secs: u64) -> TickReport {
        let sync = self.sync_if_due(uptime_secs).await;
        let sample = self.sample(uptime_secs).await;

        let upload_due = uptime_secs.saturating_sub(self.last_upload_uptime)
            >= u64::from(self.schedule.upload_interval_secs);
        let upload = if upload_due && !self.buffer.is_empty() {
            Some(self.flush(uptime_secs).await)
        } else {
            None
        };

        TickReport {
            sync,
            sample,
            upload,
        }
    }

    /// Sync the clock if it was never synced or the sync interval elapsed.
    pub async fn sync_if_due(&mut self, uptime_secs: u64) -> Option<Result<u32, SyncError>> {
        let due = !self.clock.is_synced()
            || uptime_secs.saturating_sub(self.clock.synced_at())
                >= u64::from(self.schedule.time_sync_interval_secs);
        if !due {
            return None;
        }
        Some(self.session.sync_clock(self.clock, uptime_secs).await)
    }

    /// Read the sensor into the next free slot.
    ///
    /// A full buffer is flushed first.
    pub async fn sample(&mut self, uptime_secs: u64) -> SampleOutcome {
        let timestamp = self.clock.now(uptime_secs);
        if timestamp == 0 {
            debug!("Skipping sample: clock not synced yet");
            return SampleOutcome::SkippedUnsynced;
        }

        let readings = match self.sensor.read().await {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Skipping sample: {}", e);
                return SampleOutcome::SensorFailed(e);
            }
        };

        if self.buffer.is_full() {
            self.flush(uptime_secs).await;
        }

        let index = self.buffer.live_len();
        self.buffer
            .set(index, readings.reading1, readings.reading2, timestamp);
        debug!(
            "Sample {} at {}: {} / {}",
            index, timestamp, readings.reading1, readings.reading2
        );
        SampleOutcome::Recorded { index, timestamp }
    }

    /// Upload the live prefix.
    ///
    /// The buffer is cleared after the expected status. On any other status it
    /// is kept for the next attempt, unless it is already full, in which case
    /// the batch is dropped to make room.
    pub async fn flush(&mut self, uptime_secs: u64) -> StatusCode {
        let live = self.buffer.live_len();
        let status = self.session.upload_batch(&self.buffer).await;
        self.last_upload_uptime = uptime_secs;

        if status == EXPECTED_UPLOAD_STATUS {
            info!("Uploaded {} samples", live);
            self.buffer.clear();
        } else if self.buffer.is_full() {
            warn!(
                "Upload failed with status {}, buffer full: dropping {} samples",
                status, live
            );
            self.buffer.clear();
        } else {
            warn!(
                "Upload failed with status {}, keeping {} samples",
                status, live
            );
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleRecord;
    use crate::testing::{FakeSensor, FakeTransport, Reply, block_on, endpoint};

    const TIME: &str = "{\"unix_time\":1700000000}";

    fn schedule() -> Schedule {
        Schedule {
            sample_interval_secs: 10,
            upload_interval_secs: 60,
            time_sync_interval_secs: 3600,
            connect_poll_interval_ms: 500,
        }
    }

    fn agent<'a, const N: usize>(
        clock: &'a Clock,
        replies: &[Reply],
    ) -> TelemetryAgent<'a, FakeTransport, FakeSensor, N> {
        let session = UploadSession::with_endpoint(FakeTransport::scripted(replies), endpoint());
        TelemetryAgent::new(session, FakeSensor::new(25.0, 25.5), clock, schedule())
    }

    #[test]
    fn test_no_samples_before_first_sync() {
        let clock = Clock::new();
        let mut agent = agent::<4>(&clock, &[Reply::Refuse(StatusCode::CONNECTION_REFUSED)]);

        let report = block_on(agent.tick(0));
        assert_eq!(report.sync, Some(Err(SyncError::NoResponse)));
        assert_eq!(report.sample, SampleOutcome::SkippedUnsynced);
        assert_eq!(report.upload, None);
        assert!(agent.buffer().is_empty());
    }

    #[test]
    fn test_sampling_stamps_with_extrapolated_clock() {
        let clock = Clock::new();
        let mut agent = agent::<4>(&clock, &[Reply::body(200, TIME)]);

        let report = block_on(agent.tick(5));
        assert_eq!(report.sync, Some(Ok(1_700_000_000)));
        assert_eq!(
            report.sample,
            SampleOutcome::Recorded {
                index: 0,
                timestamp: 1_700_000_000
            }
        );

        let report = block_on(agent.tick(15));
        assert_eq!(report.sync, None, "sync is not due yet");
        assert_eq!(
            report.sample,
            SampleOutcome::Recorded {
                index: 1,
                timestamp: 1_700_000_010
            }
        );
        assert_eq!(agent.buffer().live_len(), 2);
        assert_eq!(
            agent.buffer().get(1),
            Some(&SampleRecord::new(25.0, 25.5, 1_700_000_010))
        );
    }

    #[test]
    fn test_successful_upload_clears_buffer() {
        let clock = Clock::new();
        let mut agent = agent::<8>(&clock, &[Reply::body(200, TIME), Reply::status(204)]);

        block_on(agent.tick(0));
        block_on(agent.tick(10));
        let report = block_on(agent.tick(60));
        assert_eq!(report.upload, Some(StatusCode::NO_CONTENT));
        assert!(agent.buffer().is_empty());

        let body = &agent.session().transport().requests[1].body;
        assert_eq!(body.matches("\"time\"").count(), 3);
    }

    #[test]
    fn test_failed_upload_keeps_buffer() {
        let clock = Clock::new();
        let mut agent = agent::<8>(
            &clock,
            &[Reply::body(200, TIME), Reply::Refuse(StatusCode::CONNECTION_REFUSED)],
        );

        block_on(agent.tick(0));
        let report = block_on(agent.tick(60));
        assert_eq!(report.upload, Some(StatusCode::CONNECTION_REFUSED));
        assert_eq!(agent.buffer().live_len(), 2);
    }

    #[test]
    fn test_wrong_success_code_is_not_treated_as_uploaded() {
        let clock = Clock::new();
        let mut agent = agent::<8>(&clock, &[Reply::body(200, TIME), Reply::status(200)]);

        block_on(agent.tick(0));
        let report = block_on(agent.tick(60));
        assert_eq!(report.upload, Some(StatusCode::OK));
        assert_eq!(agent.buffer().live_len(), 2, "only 204 clears the buffer");
    }

    #[test]
    fn test_full_buffer_flushes_before_sampling() {
        let clock = Clock::new();
        let mut agent = agent::<3>(&clock, &[Reply::body(200, TIME), Reply::status(204)]);

        block_on(agent.tick(0));
        block_on(agent.tick(1));
        block_on(agent.tick(2));
        assert!(agent.buffer().is_full());

        let report = block_on(agent.tick(3));
        assert_eq!(
            report.sample,
            SampleOutcome::Recorded {
                index: 0,
                timestamp: 1_700_000_003
            }
        );
        assert_eq!(agent.buffer().live_len(), 1);
        let body = &agent.session().transport().requests[1].body;
        assert_eq!(body.matches("\"time\"").count(), 3);
    }

    #[test]
    fn test_full_buffer_dropped_when_upload_fails() {
        let clock = Clock::new();
        let mut agent = agent::<2>(
            &clock,
            &[Reply::body(200, TIME), Reply::Refuse(StatusCode::READ_TIMEOUT)],
        );

        block_on(agent.tick(0));
        block_on(agent.tick(1));
        assert!(agent.buffer().is_full());

        block_on(agent.tick(2));
        assert_eq!(agent.buffer().live_len(), 1, "overflowed batch is dropped");
    }

    #[test]
    fn test_sensor_failure_skips_sample() {
        let clock = Clock::new();
        let mut agent = agent::<4>(&clock, &[Reply::body(200, TIME)]);
        agent.sensor.fail_next = true;

        let report = block_on(agent.tick(0));
        assert!(matches!(report.sample, SampleOutcome::SensorFailed(_)));
        assert!(agent.buffer().is_empty());
    }

    #[test]
    fn test_resync_after_interval() {
        let clock = Clock::new();
        let mut agent = agent::<4>(
            &clock,
            &[
                Reply::body(200, TIME),
                Reply::body(200, "{\"unix_time\":1700003601}"),
            ],
        );

        block_on(agent.sync_if_due(0));
        assert_eq!(block_on(agent.sync_if_due(3599)), None);
        assert_eq!(block_on(agent.sync_if_due(3600)), Some(Ok(1_700_003_601)));
        assert_eq!(clock.synced_at(), 3600);
    }
}
