//! Request lifecycle reporting
//!
//! The `Reporter` is invoked by the write handler at fixed points of every
//! request: once on receipt, once per translation error, once on completion.
//! The `RequestContext` returned from `on_data_received` is the carrier passed
//! to every later call for the same request and attached to every entity
//! queued for it. Consumer failures that happen after the response was sent
//! come back through `on_downstream_error` with that same context.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::error::IngestError;

/// Correlation carrier for one inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    received_at: DateTime<Utc>,
    protocol_version: Option<String>,
    span: tracing::Span,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            received_at: Utc::now(),
            protocol_version: None,
            span: tracing::Span::none(),
        }
    }

    /// Value of the `X-Prometheus-Remote-Write-Version` header
    pub fn with_protocol_version(mut self, version: Option<String>) -> Self {
        self.protocol_version = version;
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Observability hooks for the request lifecycle
pub trait Reporter: Send + Sync {
    /// Called once per request before decoding. The returned context must be
    /// used for every later call belonging to this request.
    fn on_data_received(&self, ctx: RequestContext) -> RequestContext;

    /// Called once per failed conversion (decode, per-item extraction, admission)
    fn on_translation_error(&self, ctx: &RequestContext, err: &IngestError);

    /// Called once per request on completion. `err` is the first error seen,
    /// or None when everything was accepted.
    fn on_metrics_processed(&self, ctx: &RequestContext, accepted: usize, err: Option<&IngestError>);

    /// Called by the forwarder when a downstream consumer rejects an entity
    /// that was already accepted. `ctx` is the context of the originating
    /// request, which has usually completed by then.
    fn on_downstream_error(&self, ctx: &RequestContext, err: &IngestError);

    /// Unstructured diagnostics, best effort. Never the only signal of a failure.
    fn on_debugf(&self, args: fmt::Arguments<'_>);
}

// ============================================================================
// TRACING REPORTER
// ============================================================================

/// Point-in-time counters kept by `TracingReporter`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub requests: u64,
    pub translation_errors: u64,
    pub accepted_entities: u64,
    pub failed_requests: u64,
    pub downstream_errors: u64,
}

/// Reporter backed by `tracing`: one span per request, structured events
/// inside it, and a handful of counters.
#[derive(Debug, Default)]
pub struct TracingReporter {
    requests: AtomicU64,
    translation_errors: AtomicU64,
    accepted_entities: AtomicU64,
    failed_requests: AtomicU64,
    downstream_errors: AtomicU64,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            requests: self.requests.load(Ordering::Relaxed),
            translation_errors: self.translation_errors.load(Ordering::Relaxed),
            accepted_entities: self.accepted_entities.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            downstream_errors: self.downstream_errors.load(Ordering::Relaxed),
        }
    }
}

impl Reporter for TracingReporter {
    fn on_data_received(&self, ctx: RequestContext) -> RequestContext {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!(
            "remote_write",
            request_id = %ctx.request_id(),
            protocol_version = ctx.protocol_version().unwrap_or("unknown"),
        );
        tracing::debug!(parent: &span, "Remote write request received");
        ctx.with_span(span)
    }

    fn on_translation_error(&self, ctx: &RequestContext, err: &IngestError) {
        self.translation_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(parent: ctx.span(), error = %err, "Failed to translate remote write data");
    }

    fn on_metrics_processed(&self, ctx: &RequestContext, accepted: usize, err: Option<&IngestError>) {
        self.accepted_entities
            .fetch_add(accepted as u64, Ordering::Relaxed);
        let elapsed_ms = (Utc::now() - ctx.received_at()).num_milliseconds();
        match err {
            None => tracing::debug!(parent: ctx.span(), accepted, elapsed_ms, "Remote write processed"),
            Some(e) => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    parent: ctx.span(),
                    accepted,
                    elapsed_ms,
                    error = %e,
                    "Remote write processed with errors"
                );
            }
        }
    }

    fn on_downstream_error(&self, ctx: &RequestContext, err: &IngestError) {
        self.downstream_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(parent: ctx.span(), error = %err, "Downstream consumer rejected entity");
    }

    fn on_debugf(&self, args: fmt::Arguments<'_>) {
        tracing::debug!("{}", args);
    }
}
