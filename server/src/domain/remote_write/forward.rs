//! Queue forwarder
//!
//! Drains the dispatch queues into the downstream consumers. Runs as one task
//! next to the HTTP server; on shutdown it closes the queues and forwards
//! whatever is still buffered before exiting.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::reporter::{Reporter, RequestContext};
use crate::data::queues::{Dispatched, QueueKind, QueueReceivers};
use crate::data::types::{ExemplarPoint, HistogramSnapshot, SamplePoint, Series};
use crate::domain::consumers::{MetricsConsumer, TracesConsumer};
use crate::domain::error::{ConsumerError, IngestError};

/// Totals for one forwarder run, counted per entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Entities every consumer accepted
    pub forwarded: u64,
    /// Entities at least one consumer rejected
    pub failed: u64,
    /// Exemplars also delivered to the traces consumer
    pub trace_links: u64,
}

pub struct Forwarder {
    metrics: Arc<dyn MetricsConsumer>,
    traces: Arc<dyn TracesConsumer>,
    reporter: Arc<dyn Reporter>,
    stats: ForwardStats,
}

impl Forwarder {
    pub fn new(
        metrics: Arc<dyn MetricsConsumer>,
        traces: Arc<dyn TracesConsumer>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            metrics,
            traces,
            reporter,
            stats: ForwardStats::default(),
        }
    }

    pub fn start(
        mut self,
        mut queues: QueueReceivers,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<ForwardStats> {
        tokio::spawn(async move {
            let mut series_open = true;
            let mut samples_open = true;
            let mut exemplars_open = true;
            let mut histograms_open = true;

            while series_open || samples_open || exemplars_open || histograms_open {
                tokio::select! {
                    biased;
                    // The watch::Ref must not outlive this arm
                    _ = async { let _ = shutdown_rx.wait_for(|&v| v).await; } => {
                        tracing::debug!("Forwarder received shutdown, draining...");
                        break;
                    }
                    msg = queues.series.recv(), if series_open => match msg {
                        Some(m) => self.forward_series(m).await,
                        None => series_open = false,
                    },
                    msg = queues.samples.recv(), if samples_open => match msg {
                        Some(m) => self.forward_sample(m).await,
                        None => samples_open = false,
                    },
                    msg = queues.exemplars.recv(), if exemplars_open => match msg {
                        Some(m) => self.forward_exemplar(m).await,
                        None => exemplars_open = false,
                    },
                    msg = queues.histograms.recv(), if histograms_open => match msg {
                        Some(m) => self.forward_histogram(m).await,
                        None => histograms_open = false,
                    },
                }
            }

            // Producers are done (server drained); flush what is buffered
            queues.close();
            while let Some(m) = queues.series.recv().await {
                self.forward_series(m).await;
            }
            while let Some(m) = queues.samples.recv().await {
                self.forward_sample(m).await;
            }
            while let Some(m) = queues.exemplars.recv().await {
                self.forward_exemplar(m).await;
            }
            while let Some(m) = queues.histograms.recv().await {
                self.forward_histogram(m).await;
            }

            tracing::debug!(
                forwarded = self.stats.forwarded,
                failed = self.stats.failed,
                trace_links = self.stats.trace_links,
                "Forwarder shutdown complete"
            );
            self.stats
        })
    }

    async fn forward_series(&mut self, msg: Dispatched<Series>) {
        let ctx = msg.ctx.clone();
        let ok = self.check(&ctx, QueueKind::Series, self.metrics.consume_series(msg).await);
        self.count(ok);
    }

    async fn forward_sample(&mut self, msg: Dispatched<SamplePoint>) {
        let ctx = msg.ctx.clone();
        let ok = self.check(&ctx, QueueKind::Samples, self.metrics.consume_sample(msg).await);
        self.count(ok);
    }

    async fn forward_exemplar(&mut self, msg: Dispatched<ExemplarPoint>) {
        let ctx = msg.ctx.clone();
        let mut ok = true;
        if msg.item.trace_id().is_some() {
            let linked = self.traces.consume_trace_link(&msg).await;
            if self.check(&ctx, QueueKind::Exemplars, linked) {
                self.stats.trace_links += 1;
            } else {
                ok = false;
            }
        }
        let delivered = self.metrics.consume_exemplar(msg).await;
        ok &= self.check(&ctx, QueueKind::Exemplars, delivered);
        self.count(ok);
    }

    async fn forward_histogram(&mut self, msg: Dispatched<HistogramSnapshot>) {
        let ctx = msg.ctx.clone();
        let ok = self.check(
            &ctx,
            QueueKind::Histograms,
            self.metrics.consume_histogram(msg).await,
        );
        self.count(ok);
    }

    /// Downstream failures are not retried; they go to the reporter under
    /// the originating request's context.
    fn check(
        &self,
        ctx: &RequestContext,
        kind: QueueKind,
        result: Result<(), ConsumerError>,
    ) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(queue = %kind, "Dropping entity after consumer failure");
                self.reporter
                    .on_downstream_error(ctx, &IngestError::Downstream(e));
                false
            }
        }
    }

    fn count(&mut self, ok: bool) {
        if ok {
            self.stats.forwarded += 1;
        } else {
            self.stats.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::core::reporter::{RequestContext, TracingReporter};
    use crate::data::queues::{DispatchQueues, QueueCapacities};
    use crate::data::types::LabelSet;

    #[derive(Default)]
    struct RecordingMetrics {
        samples: Mutex<Vec<f64>>,
        series: AtomicUsize,
        exemplars: AtomicUsize,
        fail_samples: bool,
    }

    #[async_trait]
    impl MetricsConsumer for RecordingMetrics {
        async fn consume_series(&self, _: Dispatched<Series>) -> Result<(), ConsumerError> {
            self.series.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn consume_sample(&self, s: Dispatched<SamplePoint>) -> Result<(), ConsumerError> {
            if self.fail_samples {
                return Err(ConsumerError::new("metrics", "unavailable"));
            }
            self.samples.lock().push(s.item.value);
            Ok(())
        }

        async fn consume_exemplar(&self, _: Dispatched<ExemplarPoint>) -> Result<(), ConsumerError> {
            self.exemplars.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn consume_histogram(
            &self,
            _: Dispatched<HistogramSnapshot>,
        ) -> Result<(), ConsumerError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTraces {
        links: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TracesConsumer for RecordingTraces {
        async fn consume_trace_link(
            &self,
            exemplar: &Dispatched<ExemplarPoint>,
        ) -> Result<(), ConsumerError> {
            if let Some(id) = exemplar.item.trace_id() {
                self.links.lock().push(id.to_string());
            }
            Ok(())
        }
    }

    fn envelope<T>(item: T) -> Dispatched<T> {
        Dispatched {
            ctx: RequestContext::new(),
            labels: Arc::new(LabelSet::from_pairs([("__name__", "up")])),
            item,
        }
    }

    fn publish<T>(tx: &crate::data::queues::Publisher<T>, msg: Dispatched<T>) {
        let mut slot = tx.try_reserve(1).unwrap();
        assert!(slot.send(msg).is_ok());
    }

    /// Keeps the request id of every downstream failure
    #[derive(Default)]
    struct FailureLog {
        failures: Mutex<Vec<(uuid::Uuid, String)>>,
    }

    impl Reporter for FailureLog {
        fn on_data_received(&self, ctx: RequestContext) -> RequestContext {
            ctx
        }

        fn on_translation_error(&self, _: &RequestContext, _: &IngestError) {}

        fn on_metrics_processed(&self, _: &RequestContext, _: usize, _: Option<&IngestError>) {}

        fn on_downstream_error(&self, ctx: &RequestContext, err: &IngestError) {
            self.failures.lock().push((ctx.request_id(), err.to_string()));
        }

        fn on_debugf(&self, _: std::fmt::Arguments<'_>) {}
    }

    fn exemplar(trace_id: Option<&str>) -> ExemplarPoint {
        ExemplarPoint {
            labels: trace_id
                .map(|id| LabelSet::from_pairs([("trace_id", id)]))
                .unwrap_or_default(),
            value: 1.0,
            timestamp_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_forwards_in_order_and_drains_on_shutdown() {
        let (tx, rx) = DispatchQueues::bounded(QueueCapacities::uniform(64)).into_parts();
        let metrics = Arc::new(RecordingMetrics::default());
        let traces = Arc::new(RecordingTraces::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        for v in 0..10 {
            publish(
                &tx.samples,
                envelope(SamplePoint {
                    value: v as f64,
                    timestamp_ms: v,
                }),
            );
        }
        publish(
            &tx.series,
            envelope(Series {
                labels: Arc::new(LabelSet::new()),
            }),
        );

        let handle = Forwarder::new(
            metrics.clone(),
            traces.clone(),
            Arc::new(TracingReporter::new()),
        )
        .start(rx, shutdown_rx);

        shutdown_tx.send(true).unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.forwarded, 11);
        assert_eq!(*metrics.samples.lock(), (0..10).map(|v| v as f64).collect::<Vec<_>>());
        assert_eq!(metrics.series.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exemplars_with_trace_id_reach_traces_consumer() {
        let (tx, rx) = DispatchQueues::bounded(QueueCapacities::uniform(8)).into_parts();
        let metrics = Arc::new(RecordingMetrics::default());
        let traces = Arc::new(RecordingTraces::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        publish(&tx.exemplars, envelope(exemplar(Some("abc"))));
        publish(&tx.exemplars, envelope(exemplar(None)));

        let handle = Forwarder::new(
            metrics.clone(),
            traces.clone(),
            Arc::new(TracingReporter::new()),
        )
        .start(rx, shutdown_rx);
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(*traces.links.lock(), vec!["abc".to_string()]);
        assert_eq!(metrics.exemplars.load(Ordering::SeqCst), 2);
        // Two exemplars, one of which was also linked to a trace
        assert_eq!(
            stats,
            ForwardStats {
                forwarded: 2,
                failed: 0,
                trace_links: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_downstream_failures_are_reported_not_retried() {
        let (tx, rx) = DispatchQueues::bounded(QueueCapacities::uniform(8)).into_parts();
        let metrics = Arc::new(RecordingMetrics {
            fail_samples: true,
            ..Default::default()
        });
        let reporter = Arc::new(FailureLog::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let failing = envelope(SamplePoint {
            value: 1.0,
            timestamp_ms: 1,
        });
        let request_id = failing.ctx.request_id();
        publish(&tx.samples, failing);
        publish(
            &tx.series,
            envelope(Series {
                labels: Arc::new(LabelSet::new()),
            }),
        );

        let handle = Forwarder::new(
            metrics.clone(),
            Arc::new(RecordingTraces::default()),
            reporter.clone(),
        )
        .start(rx, shutdown_rx);
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(
            stats,
            ForwardStats {
                forwarded: 1,
                failed: 1,
                trace_links: 0,
            }
        );
        assert_eq!(
            *reporter.failures.lock(),
            vec![(request_id, "metrics consumer failed: unavailable".to_string())]
        );
        assert!(metrics.samples.lock().is_empty());
    }

    #[tokio::test]
    async fn test_exits_when_all_producers_are_dropped() {
        let (tx, rx) = DispatchQueues::bounded(QueueCapacities::uniform(8)).into_parts();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = Forwarder::new(
            Arc::new(RecordingMetrics::default()),
            Arc::new(RecordingTraces::default()),
            Arc::new(TracingReporter::new()),
        )
        .start(rx, shutdown_rx);
        drop(tx);

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, ForwardStats::default());
    }
}
