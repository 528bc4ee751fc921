use crate::sensors::SensorReader;
use crate::submit::{submit_metric, TelemetrySink};
use crate::telemetry::{MetricKind, UploaderContext};
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopped,
}

/// Runs cycles until `shutdown` resolves and returns the number of completed cycles.
///
/// A cycle submits every metric in [`MetricKind::CYCLE`] order, each one finishing before
/// the next starts, then sleeps for `interval`. `shutdown` is raced against both the
/// cycle and the sleep. A sensor failure ends the loop with an error.
pub async fn run<S, K, F>(
    ctx: &UploaderContext,
    sensors: &mut S,
    sink: &K,
    interval: Duration,
    shutdown: F,
) -> Result<u64>
where
    S: SensorReader,
    K: TelemetrySink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut state = LoopState::Running;
    let mut cycles: u64 = 0;

    while state == LoopState::Running {
        state = tokio::select! {
            biased;
            _ = &mut shutdown => LoopState::Stopped,
            res = run_cycle(ctx, sensors, sink) => {
                let delivered = res?;
                cycles += 1;
                tracing::debug!(cycle = cycles, delivered, "cycle complete");
                LoopState::Running
            }
        };

        if state == LoopState::Stopped {
            break;
        }

        state = tokio::select! {
            biased;
            _ = &mut shutdown => LoopState::Stopped,
            _ = sleep(interval) => LoopState::Running,
        };
    }

    tracing::info!(cycles, "program stopped by user");
    Ok(cycles)
}

async fn run_cycle<S, K>(ctx: &UploaderContext, sensors: &mut S, sink: &K) -> Result<usize>
where
    S: SensorReader,
    K: TelemetrySink,
{
    let mut delivered = 0;
    for kind in MetricKind::CYCLE {
        if submit_metric(ctx, sensors, sink, kind).await?.is_some() {
            delivered += 1;
        }
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::{SubmitError, SubmitResponse};
    use crate::telemetry::{Location, TelemetryPayload};
    use std::cell::RefCell;
    use tokio::time::Instant;

    #[derive(Debug, Clone)]
    struct Sent {
        kind: MetricKind,
        payload: TelemetryPayload,
        at: Duration,
    }

    struct RecordingSink {
        started: Instant,
        sent: RefCell<Vec<Sent>>,
        fail: Option<MetricKind>,
    }

    impl RecordingSink {
        fn new(fail: Option<MetricKind>) -> Self {
            Self {
                started: Instant::now(),
                sent: RefCell::new(Vec::new()),
                fail,
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.borrow().clone()
        }
    }

    impl TelemetrySink for RecordingSink {
        async fn send(
            &self,
            kind: MetricKind,
            payload: &TelemetryPayload,
        ) -> Result<SubmitResponse, SubmitError> {
            self.sent.borrow_mut().push(Sent {
                kind,
                payload: payload.clone(),
                at: self.started.elapsed(),
            });
            if self.fail == Some(kind) {
                return Err(SubmitError::Status {
                    status: 503,
                    reason: "Service Unavailable".to_string(),
                });
            }
            Ok(SubmitResponse {
                status: 201,
                body: r#"{"id":42}"#.to_string(),
            })
        }
    }

    struct CountingSensor {
        next: f64,
        fail_on_read: Option<usize>,
        reads: usize,
    }

    impl CountingSensor {
        fn new() -> Self {
            Self {
                next: 0.0,
                fail_on_read: None,
                reads: 0,
            }
        }
    }

    impl SensorReader for CountingSensor {
        fn read(&mut self, _kind: MetricKind) -> Result<f64> {
            self.reads += 1;
            if self.fail_on_read == Some(self.reads) {
                anyhow::bail!("i2c bus error");
            }
            self.next += 1.0;
            Ok(self.next)
        }
    }

    fn ctx(location: Option<Location>) -> UploaderContext {
        UploaderContext {
            device_id: "pi".to_string(),
            location,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submits_each_metric_once_per_cycle_in_order() {
        let sink = RecordingSink::new(None);
        let mut sensors = CountingSensor::new();

        // Interrupt lands in the third sleep.
        let cycles = run(
            &ctx(None),
            &mut sensors,
            &sink,
            Duration::from_secs(5),
            sleep(Duration::from_millis(12_500)),
        )
        .await
        .unwrap();

        assert_eq!(cycles, 3);
        let sent = sink.sent();
        let kinds: Vec<MetricKind> = sent.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, MetricKind::CYCLE.repeat(3));

        let values: Vec<&str> = sent.iter().map(|s| s.payload.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_exactly_the_interval_between_cycles() {
        let sink = RecordingSink::new(None);
        let mut sensors = CountingSensor::new();

        run(
            &ctx(None),
            &mut sensors,
            &sink,
            Duration::from_secs(5),
            sleep(Duration::from_millis(10_500)),
        )
        .await
        .unwrap();

        let starts: Vec<Duration> = sink
            .sent()
            .iter()
            .filter(|s| s.kind == MetricKind::Temperature)
            .map(|s| s.at)
            .collect();
        assert_eq!(
            starts,
            vec![Duration::ZERO, Duration::from_secs(5), Duration::from_secs(10)]
        );
        // Nothing is sent while sleeping.
        assert!(sink
            .sent()
            .iter()
            .all(|s| s.at.as_millis() % 5_000 == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_does_not_abort_cycle() {
        let sink = RecordingSink::new(Some(MetricKind::Humidity));
        let mut sensors = CountingSensor::new();

        let cycles = run(
            &ctx(None),
            &mut sensors,
            &sink,
            Duration::from_secs(5),
            sleep(Duration::from_millis(7_000)),
        )
        .await
        .unwrap();

        assert_eq!(cycles, 2);
        let kinds: Vec<MetricKind> = sink.sent().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, MetricKind::CYCLE.repeat(2));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_sleep_stops_without_more_submissions() {
        let sink = RecordingSink::new(None);
        let mut sensors = CountingSensor::new();

        let cycles = run(
            &ctx(None),
            &mut sensors,
            &sink,
            Duration::from_secs(5),
            sleep(Duration::from_secs(1)),
        )
        .await
        .unwrap();

        assert_eq!(cycles, 1);
        assert_eq!(sink.sent().len(), 3);
        assert_eq!(sensors.reads, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn location_is_identical_across_cycles() {
        let sink = RecordingSink::new(None);
        let mut sensors = CountingSensor::new();
        let location = Location {
            latitude: 52.52,
            longitude: 13.405,
        };

        run(
            &ctx(Some(location)),
            &mut sensors,
            &sink,
            Duration::from_secs(5),
            sleep(Duration::from_millis(15_500)),
        )
        .await
        .unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 12);
        for s in &sent {
            assert_eq!(s.payload.device_id, "pi");
            assert_eq!(s.payload.latitude.as_deref(), Some("52.52"));
            assert_eq!(s.payload.longitude.as_deref(), Some("13.405"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_failure_ends_the_loop() {
        let sink = RecordingSink::new(None);
        let mut sensors = CountingSensor::new();
        sensors.fail_on_read = Some(5);

        let err = run(
            &ctx(None),
            &mut sensors,
            &sink,
            Duration::from_secs(5),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("i2c bus error"));
        let kinds: Vec<MetricKind> = sink.sent().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MetricKind::Temperature,
                MetricKind::Humidity,
                MetricKind::Pressure,
                MetricKind::Temperature,
            ]
        );
    }
}
