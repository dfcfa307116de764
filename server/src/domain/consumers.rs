//! Downstream consumer capabilities
//!
//! The receiver hands fully-formed entities to three sinks:
//! - metrics: series, samples, exemplars and histograms (via the forwarder)
//! - traces: exemplars that reference a trace (via the forwarder)
//! - logs: metric metadata (directly from the write handler)
//!
//! The bundled implementations write structured `tracing` events. Real
//! deployments plug in their own sinks through the same traits.

use async_trait::async_trait;

use crate::core::reporter::RequestContext;
use crate::data::queues::Dispatched;
use crate::data::types::{
    ExemplarPoint, HistogramSnapshot, MetadataRecord, SPAN_ID_LABEL, SamplePoint, Series,
};
use crate::domain::error::ConsumerError;
use crate::utils::time::millis_to_iso;

#[async_trait]
pub trait MetricsConsumer: Send + Sync {
    async fn consume_series(&self, series: Dispatched<Series>) -> Result<(), ConsumerError>;

    async fn consume_sample(&self, sample: Dispatched<SamplePoint>) -> Result<(), ConsumerError>;

    async fn consume_exemplar(
        &self,
        exemplar: Dispatched<ExemplarPoint>,
    ) -> Result<(), ConsumerError>;

    async fn consume_histogram(
        &self,
        histogram: Dispatched<HistogramSnapshot>,
    ) -> Result<(), ConsumerError>;
}

#[async_trait]
pub trait TracesConsumer: Send + Sync {
    /// Called for exemplars carrying a `trace_id` label
    async fn consume_trace_link(
        &self,
        exemplar: &Dispatched<ExemplarPoint>,
    ) -> Result<(), ConsumerError>;
}

#[async_trait]
pub trait LogsConsumer: Send + Sync {
    async fn consume_metadata(
        &self,
        ctx: &RequestContext,
        records: Vec<MetadataRecord>,
    ) -> Result<(), ConsumerError>;
}

// ============================================================================
// TRACING-BACKED SINKS
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMetricsConsumer;

#[async_trait]
impl MetricsConsumer for LoggingMetricsConsumer {
    async fn consume_series(&self, series: Dispatched<Series>) -> Result<(), ConsumerError> {
        tracing::debug!(
            parent: series.ctx.span(),
            series = %series.item.labels,
            "Series"
        );
        Ok(())
    }

    async fn consume_sample(&self, sample: Dispatched<SamplePoint>) -> Result<(), ConsumerError> {
        tracing::trace!(
            parent: sample.ctx.span(),
            series = %sample.labels,
            value = sample.item.value,
            timestamp = %millis_to_iso(sample.item.timestamp_ms),
            "Sample"
        );
        Ok(())
    }

    async fn consume_exemplar(
        &self,
        exemplar: Dispatched<ExemplarPoint>,
    ) -> Result<(), ConsumerError> {
        tracing::trace!(
            parent: exemplar.ctx.span(),
            series = %exemplar.labels,
            labels = %exemplar.item.labels,
            value = exemplar.item.value,
            timestamp = %millis_to_iso(exemplar.item.timestamp_ms),
            "Exemplar"
        );
        Ok(())
    }

    async fn consume_histogram(
        &self,
        histogram: Dispatched<HistogramSnapshot>,
    ) -> Result<(), ConsumerError> {
        tracing::trace!(
            parent: histogram.ctx.span(),
            series = %histogram.labels,
            histogram = %histogram.item,
            timestamp = %millis_to_iso(histogram.item.timestamp_ms),
            "Histogram"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTracesConsumer;

#[async_trait]
impl TracesConsumer for LoggingTracesConsumer {
    async fn consume_trace_link(
        &self,
        exemplar: &Dispatched<ExemplarPoint>,
    ) -> Result<(), ConsumerError> {
        tracing::trace!(
            parent: exemplar.ctx.span(),
            series = %exemplar.labels,
            trace_id = exemplar.item.trace_id().unwrap_or_default(),
            span_id = exemplar.item.labels.get(SPAN_ID_LABEL).unwrap_or_default(),
            "Exemplar trace link"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLogsConsumer;

#[async_trait]
impl LogsConsumer for LoggingLogsConsumer {
    async fn consume_metadata(
        &self,
        ctx: &RequestContext,
        records: Vec<MetadataRecord>,
    ) -> Result<(), ConsumerError> {
        for record in &records {
            tracing::debug!(
                parent: ctx.span(),
                metric = %record.metric_family_name,
                metric_type = record.metric_type,
                unit = %record.unit,
                help = %record.help,
                "Metric metadata"
            );
        }
        Ok(())
    }
}
