//! Producer/consumer pipeline.
//!
//! One [`Pipeline`] is one run: a producer task reads raw samples from the
//! source, classifies them and pushes the resulting records into a bounded
//! shared queue; a consumer task pops them into a [`RecordStore`] and flushes
//! the store to its sinks. Both tasks run on a [`WorkerPool`] created for the
//! run and shut down when it ends.
//!
//! ```text
//!  source ──read──▶ producer ──push──▶ [ shared queue ] ──pop──▶ consumer ──log/flush──▶ sinks
//! ```
//!
//! # Run phases
//!
//! ```text
//! Created ──run()──▶ Running ──producer done──▶ Draining ──queue empty──▶ Completed
//! ```
//!
//! The phase lives next to the shared queue under one lock. The producer
//! moves `Running → Draining` when the source is exhausted, fails, or a stop
//! is requested; the consumer moves to `Completed` only after it has seen
//! `Draining` with an empty queue and performed the final flush. Both moves
//! happen in drop guards, so a panicking task still ends the run. A
//! panicking consumer also requests a stop, so the producer does not keep
//! reading into a queue nobody drains.
//!
//! # Data loss
//!
//! The shared queue overwrites its oldest record when the consumer falls
//! behind. Overwrites are counted in [`PipelineReport::queue_overwrites`];
//! records already queued when production ends are always drained.

use crate::error::PipelineError;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tlm_core::limits::{
    DEFAULT_SHARED_QUEUE_CAPACITY, DEFAULT_STORE_CAPACITY, DEFAULT_TASK_QUEUE_CAPACITY,
    DEFAULT_WORKERS,
};
use tlm_core::{
    BoundedRing, Record, SampleClassifier, SharedSink, SharedSource, SourceError, TlmResult,
};
use tlm_pool::WorkerPool;
use tlm_storage::{FlushReport, RecordStore};
use tracing::{debug, error, info, trace, warn};

/// When the consumer flushes the record store.
///
/// A final flush always happens when the run ends, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Flush after every logged record.
    #[default]
    EveryRecord,
    /// Flush once this many records have been logged since the last flush.
    Batch(usize),
}

impl FlushPolicy {
    /// Records logged between two flushes.
    pub fn batch_size(&self) -> usize {
        match self {
            FlushPolicy::EveryRecord => 1,
            FlushPolicy::Batch(n) => *n,
        }
    }
}

/// Sizing and cadence of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Pool threads; at least two (producer and consumer).
    pub workers: usize,
    /// Pending-task slots of the pool.
    pub task_queue_capacity: usize,
    /// Records the producer may queue ahead of the consumer.
    pub shared_queue_capacity: usize,
    /// Records the store buffers between flushes.
    pub store_capacity: usize,
    /// When the consumer flushes the store.
    pub flush: FlushPolicy,
    /// Producer pause after each sample.
    pub poll_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            shared_queue_capacity: DEFAULT_SHARED_QUEUE_CAPACITY,
            store_capacity: DEFAULT_STORE_CAPACITY,
            flush: FlushPolicy::EveryRecord,
            poll_interval: Duration::ZERO,
        }
    }
}

impl PipelineOptions {
    /// Check sizing constraints before any resource is built.
    ///
    /// # Errors
    /// [`PipelineError::InvalidOptions`] naming the first violated bound.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidOptions(msg));
        if self.workers < 2 {
            return invalid(format!(
                "workers must be at least 2 to run producer and consumer, got {}",
                self.workers
            ));
        }
        if self.task_queue_capacity < 2 {
            return invalid(format!(
                "task_queue_capacity must hold both pipeline tasks, got {}",
                self.task_queue_capacity
            ));
        }
        if self.shared_queue_capacity == 0 {
            return invalid("shared_queue_capacity must be greater than zero".into());
        }
        if self.store_capacity == 0 {
            return invalid("store_capacity must be greater than zero".into());
        }
        if let FlushPolicy::Batch(n) = self.flush {
            if n == 0 || n > self.store_capacity {
                return invalid(format!(
                    "flush batch must be between 1 and store_capacity ({}), got {}",
                    self.store_capacity, n
                ));
            }
        }
        Ok(())
    }
}

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Assembled, no tasks started.
    Created,
    /// Producer and consumer are running.
    Running,
    /// Production ended; the consumer empties the shared queue.
    Draining,
    /// Final flush done; the consumer has exited.
    Completed,
}

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The source reported end of stream.
    Exhausted,
    /// Opening or reading the source failed, or the producer panicked.
    SourceFailed(String),
    /// A [`StopHandle`] requested shutdown.
    Stopped,
    /// The consumer task panicked; production was stopped and unflushed
    /// records were lost.
    ConsumerFailed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Exhausted => write!(f, "source exhausted"),
            EndReason::SourceFailed(reason) => write!(f, "source failed: {reason}"),
            EndReason::Stopped => write!(f, "stopped"),
            EndReason::ConsumerFailed => write!(f, "consumer failed"),
        }
    }
}

/// Counters of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Raw samples read from the source.
    pub samples_read: u64,
    /// Samples that produced no record.
    pub samples_rejected: u64,
    /// Records pushed into the shared queue.
    pub records_queued: u64,
    /// Records lost because the shared queue was full.
    pub queue_overwrites: u64,
    /// Records the consumer moved into the store.
    pub records_logged: u64,
    /// Records lost because the record store was full.
    pub store_overwrites: u64,
    /// Store flushes, the final one included.
    pub flushes: u64,
    /// Failed or panicking sink `write`/`flush` calls.
    pub sink_failures: u64,
    /// Why the run ended.
    pub end: EndReason,
    /// Wall time from `run()` to completion.
    pub elapsed: Duration,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} samples ({} rejected), {} records logged, {} lost in queue, {} lost in store, \
             {} flushes, {} sink failures; {} after {:.2?}",
            self.samples_read,
            self.samples_rejected,
            self.records_logged,
            self.queue_overwrites,
            self.store_overwrites,
            self.flushes,
            self.sink_failures,
            self.end,
            self.elapsed
        )
    }
}

#[derive(Debug, Default)]
struct ProducerTally {
    samples_read: u64,
    samples_rejected: u64,
    records_queued: u64,
    queue_overwrites: u64,
    end: Option<EndReason>,
    open_error: Option<SourceError>,
}

#[derive(Debug, Default)]
struct ConsumerTally {
    records_logged: u64,
    store_overwrites: u64,
    flushes: u64,
    delivered: FlushReport,
    panicked: bool,
}

struct Exchange {
    queue: BoundedRing<Record>,
    phase: RunPhase,
    stop_requested: bool,
    producer: ProducerTally,
    consumer: ConsumerTally,
}

struct Shared {
    exchange: Mutex<Exchange>,
    /// Signalled when a record is queued or production ends.
    data_ready: Condvar,
    /// Signalled when the phase changes or a stop is requested.
    phase_changed: Condvar,
}

impl Shared {
    fn new(queue_capacity: usize) -> TlmResult<Self> {
        Ok(Self {
            exchange: Mutex::new(Exchange {
                queue: BoundedRing::new(queue_capacity)?,
                phase: RunPhase::Created,
                stop_requested: false,
                producer: ProducerTally::default(),
                consumer: ConsumerTally::default(),
            }),
            data_ready: Condvar::new(),
            phase_changed: Condvar::new(),
        })
    }

    /// `Running → Draining`; no-op from any other phase.
    fn end_production(&self) {
        let mut exchange = self.exchange.lock();
        if exchange.phase == RunPhase::Running {
            exchange.phase = RunPhase::Draining;
            debug!("pipeline draining");
        }
        drop(exchange);
        self.data_ready.notify_all();
        self.phase_changed.notify_all();
    }

    fn wait_for_completion(&self) {
        let mut exchange = self.exchange.lock();
        while exchange.phase != RunPhase::Completed {
            self.phase_changed.wait(&mut exchange);
        }
    }
}

/// Requests cooperative shutdown of a pipeline run.
///
/// The producer checks for a stop between samples, so a source blocked in
/// `read_sample` finishes that read first. Records already queued are still
/// drained and flushed.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Ask the producer to stop after its current sample.
    pub fn stop(&self) {
        self.shared.exchange.lock().stop_requested = true;
        self.shared.phase_changed.notify_all();
        info!("pipeline stop requested");
    }

    /// `true` once [`StopHandle::stop`] was called on any clone.
    pub fn is_stop_requested(&self) -> bool {
        self.shared.exchange.lock().stop_requested
    }

    /// Current phase of the run this handle belongs to.
    pub fn phase(&self) -> RunPhase {
        self.shared.exchange.lock().phase
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("phase", &self.phase())
            .finish()
    }
}

/// One assembled run, in the `Created` phase until [`Pipeline::run`].
pub struct Pipeline {
    shared: Arc<Shared>,
    source: SharedSource,
    classifier: Arc<dyn SampleClassifier>,
    store: RecordStore,
    options: PipelineOptions,
}

impl Pipeline {
    /// Assemble a run: validates `options`, builds the shared queue and the
    /// record store with `sinks`. No thread is started.
    pub fn new(
        source: SharedSource,
        classifier: Arc<dyn SampleClassifier>,
        sinks: Vec<SharedSink>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        options.validate()?;
        let store = RecordStore::builder(options.store_capacity)
            .sinks(sinks)
            .build()?;
        Ok(Self {
            shared: Arc::new(Shared::new(options.shared_queue_capacity)?),
            source,
            classifier,
            store,
            options,
        })
    }

    /// Handle for stopping this run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current phase of the run.
    pub fn phase(&self) -> RunPhase {
        self.shared.exchange.lock().phase
    }

    /// Options the run was assembled with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run to completion on a fresh worker pool.
    ///
    /// Blocks until the consumer has drained the shared queue and flushed
    /// the store, then shuts the pool down.
    ///
    /// # Errors
    /// [`PipelineError::SourceOpen`] if the source could not be opened (the
    /// pool is shut down first); [`PipelineError::Pool`] if the pool could
    /// not be created or refused a task.
    pub fn run(self) -> Result<PipelineReport, PipelineError> {
        let Pipeline {
            shared,
            source,
            classifier,
            store,
            options,
        } = self;
        let started = Instant::now();

        let pool = WorkerPool::new(options.workers, options.task_queue_capacity)?;
        shared.exchange.lock().phase = RunPhase::Running;
        let source_name = source.lock().name().to_string();
        info!(
            source = %source_name,
            sinks = store.sink_count(),
            workers = options.workers,
            queue_capacity = options.shared_queue_capacity,
            store_capacity = options.store_capacity,
            "pipeline running"
        );

        // The consumer goes first so a refused producer still leaves a task
        // that can complete the run.
        let consumer_shared = Arc::clone(&shared);
        let flush = options.flush;
        if let Err(e) = pool.submit(move || consume(consumer_shared, store, flush)) {
            error!(error = %e, "consumer task refused");
            shared.exchange.lock().phase = RunPhase::Completed;
            pool.join();
            return Err(e.into());
        }

        let producer_shared = Arc::clone(&shared);
        let poll_interval = options.poll_interval;
        if let Err(e) =
            pool.submit(move || produce(producer_shared, source, classifier, poll_interval))
        {
            error!(error = %e, "producer task refused");
            shared.end_production();
            shared.wait_for_completion();
            pool.join();
            return Err(e.into());
        }

        shared.wait_for_completion();
        pool.join();

        let mut exchange = shared.exchange.lock();
        let producer = std::mem::take(&mut exchange.producer);
        let consumer = std::mem::take(&mut exchange.consumer);
        drop(exchange);

        if let Some(err) = producer.open_error {
            return Err(PipelineError::SourceOpen(err));
        }

        let report = PipelineReport {
            samples_read: producer.samples_read,
            samples_rejected: producer.samples_rejected,
            records_queued: producer.records_queued,
            queue_overwrites: producer.queue_overwrites,
            records_logged: consumer.records_logged,
            store_overwrites: consumer.store_overwrites,
            flushes: consumer.flushes,
            sink_failures: consumer.delivered.sink_failures as u64,
            end: if consumer.panicked {
                EndReason::ConsumerFailed
            } else {
                producer
                    .end
                    .unwrap_or_else(|| EndReason::SourceFailed("producer task panicked".into()))
            },
            elapsed: started.elapsed(),
        };
        if report.queue_overwrites > 0 {
            warn!(
                dropped = report.queue_overwrites,
                "shared queue overflowed; oldest records were dropped"
            );
        }
        info!(
            samples = report.samples_read,
            logged = report.records_logged,
            end = %report.end,
            "pipeline completed"
        );
        Ok(report)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("phase", &self.phase())
            .field("store", &self.store)
            .field("options", &self.options)
            .finish()
    }
}

/// Hands the producer's tally over and ends production when dropped,
/// including on unwind.
struct ProducerGuard {
    shared: Arc<Shared>,
    tally: ProducerTally,
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("producer task panicked; draining pipeline");
        }
        self.shared.exchange.lock().producer = std::mem::take(&mut self.tally);
        self.shared.end_production();
    }
}

/// Hands the consumer's tally over and completes the run when dropped.
/// On unwind it also stops the producer.
struct ConsumerGuard {
    shared: Arc<Shared>,
    tally: ConsumerTally,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        let panicked = std::thread::panicking();
        if panicked {
            error!("consumer task panicked; stopping producer and completing pipeline");
            self.tally.panicked = true;
        }
        let mut exchange = self.shared.exchange.lock();
        exchange.consumer = std::mem::take(&mut self.tally);
        if panicked {
            exchange.stop_requested = true;
        }
        exchange.phase = RunPhase::Completed;
        drop(exchange);
        self.shared.data_ready.notify_all();
        self.shared.phase_changed.notify_all();
    }
}

fn produce(
    shared: Arc<Shared>,
    source: SharedSource,
    classifier: Arc<dyn SampleClassifier>,
    poll_interval: Duration,
) {
    let mut guard = ProducerGuard {
        shared,
        tally: ProducerTally::default(),
    };
    let ProducerGuard { shared, tally } = &mut guard;

    let opened = source.lock().open();
    if let Err(e) = opened {
        error!(error = %e, "telemetry source failed to open");
        tally.end = Some(EndReason::SourceFailed(e.to_string()));
        tally.open_error = Some(e);
        return;
    }

    let end = loop {
        if shared.exchange.lock().stop_requested {
            break EndReason::Stopped;
        }

        let sample = source.lock().read_sample();
        let raw = match sample {
            Ok(Some(raw)) => raw,
            Ok(None) => break EndReason::Exhausted,
            Err(e) => {
                warn!(error = %e, "source read failed; ending production");
                break EndReason::SourceFailed(e.to_string());
            }
        };
        tally.samples_read += 1;

        let records = classifier.classify_sample(&raw);
        if records.is_empty() {
            tally.samples_rejected += 1;
            trace!(raw = %raw, "sample produced no record");
        } else {
            let mut exchange = shared.exchange.lock();
            for record in records {
                if !exchange.queue.push(record) {
                    tally.queue_overwrites += 1;
                    debug!(
                        capacity = exchange.queue.capacity(),
                        "shared queue full; oldest record overwritten"
                    );
                }
                tally.records_queued += 1;
            }
            drop(exchange);
            shared.data_ready.notify_one();
        }

        if !poll_interval.is_zero() {
            let mut exchange = shared.exchange.lock();
            shared
                .phase_changed
                .wait_while_for(&mut exchange, |ex| !ex.stop_requested, poll_interval);
        }
    };

    debug!(samples = tally.samples_read, end = %end, "producer finished");
    tally.end = Some(end);
}

fn consume(shared: Arc<Shared>, mut store: RecordStore, flush: FlushPolicy) {
    let mut guard = ConsumerGuard {
        shared,
        tally: ConsumerTally::default(),
    };
    let ConsumerGuard { shared, tally } = &mut guard;
    let batch = flush.batch_size();
    let mut since_flush = 0;

    loop {
        let next = {
            let mut exchange = shared.exchange.lock();
            loop {
                if let Some(record) = exchange.queue.pop() {
                    break Some(record);
                }
                if exchange.phase != RunPhase::Running {
                    break None;
                }
                shared.data_ready.wait(&mut exchange);
            }
        };
        let Some(record) = next else { break };

        store.log(record);
        tally.records_logged += 1;
        since_flush += 1;
        if since_flush >= batch {
            flush_store(&mut store, tally);
            since_flush = 0;
        }
    }

    flush_store(&mut store, tally);
    tally.store_overwrites = store.overwritten();
    debug!(
        logged = tally.records_logged,
        deliveries = tally.delivered.deliveries,
        "consumer finished"
    );
}

fn flush_store(store: &mut RecordStore, tally: &mut ConsumerTally) {
    tally.delivered.merge(store.flush());
    tally.flushes += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlm_core::{shared_source, Severity, SingleValue, ThresholdPolicy};
    use tlm_sources::ScriptedSource;
    use tlm_storage::MemorySink;

    fn cpu_classifier() -> Arc<dyn SampleClassifier> {
        Arc::new(SingleValue::new(Arc::new(ThresholdPolicy::cpu())))
    }

    fn pipeline_with(
        samples: &[&str],
        sink: Arc<MemorySink>,
        options: PipelineOptions,
    ) -> Pipeline {
        Pipeline::new(
            shared_source(ScriptedSource::new(samples.iter().copied())),
            cpu_classifier(),
            vec![sink as SharedSink],
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_options_validation() {
        assert!(PipelineOptions::default().validate().is_ok());

        let bad = [
            PipelineOptions {
                workers: 1,
                ..Default::default()
            },
            PipelineOptions {
                task_queue_capacity: 1,
                ..Default::default()
            },
            PipelineOptions {
                shared_queue_capacity: 0,
                ..Default::default()
            },
            PipelineOptions {
                store_capacity: 0,
                ..Default::default()
            },
            PipelineOptions {
                store_capacity: 4,
                flush: FlushPolicy::Batch(5),
                ..Default::default()
            },
            PipelineOptions {
                flush: FlushPolicy::Batch(0),
                ..Default::default()
            },
        ];
        for options in bad {
            assert!(
                matches!(options.validate(), Err(PipelineError::InvalidOptions(_))),
                "{options:?}"
            );
        }
    }

    #[test]
    fn test_created_until_run() {
        let sink = Arc::new(MemorySink::new("mem"));
        let pipeline = pipeline_with(&["10"], sink.clone(), PipelineOptions::default());
        let handle = pipeline.stop_handle();
        assert_eq!(pipeline.phase(), RunPhase::Created);

        let report = pipeline.run().unwrap();
        assert_eq!(handle.phase(), RunPhase::Completed);
        assert_eq!(report.end, EndReason::Exhausted);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_classification_end_to_end() {
        let sink = Arc::new(MemorySink::new("mem"));
        let report = pipeline_with(
            &["50", "-5", "101", "80"],
            sink.clone(),
            PipelineOptions::default(),
        )
        .run()
        .unwrap();

        let severities: Vec<Severity> = sink.records().iter().map(Record::severity).collect();
        assert_eq!(severities, vec![Severity::Info, Severity::Warning]);
        assert_eq!(report.samples_read, 4);
        assert_eq!(report.samples_rejected, 2);
        assert_eq!(report.records_logged, 2);
        // One flush per record plus the final one.
        assert_eq!(report.flushes, 3);
    }

    #[test]
    fn test_batch_flush_counts() {
        let sink = Arc::new(MemorySink::new("mem"));
        let options = PipelineOptions {
            flush: FlushPolicy::Batch(4),
            ..Default::default()
        };
        let samples = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"];
        let report = pipeline_with(&samples, sink.clone(), options).run().unwrap();

        assert_eq!(report.records_logged, 10);
        // Two full batches and the final flush for the remaining two.
        assert_eq!(report.flushes, 3);
        assert_eq!(sink.len(), 10);
    }

    #[test]
    fn test_consumer_panic_stops_producer() {
        let shared = Arc::new(Shared::new(16).unwrap());
        shared.exchange.lock().phase = RunPhase::Running;

        let source = shared_source(
            ScriptedSource::new(vec!["42"; 10_000]).with_delay(Duration::from_millis(2)),
        );
        let producer_shared = Arc::clone(&shared);
        let started = Instant::now();
        let producer = std::thread::spawn(move || {
            produce(producer_shared, source, cpu_classifier(), Duration::ZERO)
        });

        std::thread::sleep(Duration::from_millis(20));
        let consumer_shared = Arc::clone(&shared);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ConsumerGuard {
                shared: consumer_shared,
                tally: ConsumerTally::default(),
            };
            panic!("consumer bug");
        }));
        assert!(outcome.is_err());

        producer.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        let exchange = shared.exchange.lock();
        assert_eq!(exchange.phase, RunPhase::Completed);
        assert!(exchange.stop_requested);
        assert!(exchange.consumer.panicked);
        assert_eq!(exchange.producer.end, Some(EndReason::Stopped));
        assert!(exchange.producer.samples_read < 10_000);
    }

    #[test]
    fn test_flush_policy_batch_size() {
        assert_eq!(FlushPolicy::EveryRecord.batch_size(), 1);
        assert_eq!(FlushPolicy::Batch(12).batch_size(), 12);
        assert_eq!(FlushPolicy::default(), FlushPolicy::EveryRecord);
    }
}
