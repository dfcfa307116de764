//! Remote-write handler

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::RemoteWriteState;
use super::encoding::{decode_error_response, decode_write_request, read_body};
use crate::core::constants::REMOTE_WRITE_VERSION_HEADER;
use crate::core::reporter::{Reporter, RequestContext};
use crate::domain::error::IngestError;
use crate::domain::remote_write::{Extraction, enqueue_series, extract_write_request};

/// Running totals for one request
#[derive(Default)]
struct Outcome {
    accepted: usize,
    first_error: Option<IngestError>,
}

impl Outcome {
    fn note(&mut self, err: IngestError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    fn translation_error(&mut self, reporter: &dyn Reporter, ctx: &RequestContext, err: IngestError) {
        reporter.on_translation_error(ctx, &err);
        self.note(err);
    }
}

pub async fn write(
    State(state): State<RemoteWriteState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let reporter = state.reporter.as_ref();
    let version = headers
        .get(REMOTE_WRITE_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ctx = reporter.on_data_received(RequestContext::new().with_protocol_version(version));

    let decoded = read_body(&headers, body, state.max_body_bytes)
        .await
        .and_then(|raw| decode_write_request(&raw, state.max_decompressed_bytes));
    let request = match decoded {
        Ok(request) => request,
        Err(e) => {
            let response = decode_error_response(&e);
            let err = IngestError::from(e);
            reporter.on_translation_error(&ctx, &err);
            reporter.on_metrics_processed(&ctx, 0, Some(&err));
            return response;
        }
    };

    let Extraction {
        series,
        metadata,
        errors,
    } = extract_write_request(&request);

    let mut outcome = Outcome::default();
    for err in errors {
        outcome.translation_error(reporter, &ctx, err.into());
    }

    for extracted in series {
        match enqueue_series(&state.queues, &ctx, extracted) {
            Ok(count) => outcome.accepted += count,
            Err(e) => {
                let err = IngestError::from(e);
                let response = rejection_response(&err, state.retry_after_secs);
                outcome.translation_error(reporter, &ctx, err);
                reporter.on_metrics_processed(&ctx, outcome.accepted, outcome.first_error.as_ref());
                return response;
            }
        }
    }

    if !metadata.is_empty() {
        let count = metadata.len();
        match state.logs.consume_metadata(&ctx, metadata).await {
            Ok(()) => outcome.accepted += count,
            Err(e) => {
                tracing::warn!(parent: ctx.span(), error = %e, "Failed to forward metric metadata");
                outcome.note(e.into());
            }
        }
    }

    let depths = state.queues.depths();
    reporter.on_debugf(format_args!(
        "request {} done, queue depths: {}={} {}={} {}={} {}={}",
        ctx.request_id(),
        depths[0].0,
        depths[0].1,
        depths[1].0,
        depths[1].1,
        depths[2].0,
        depths[2].1,
        depths[3].0,
        depths[3].1,
    ));
    reporter.on_metrics_processed(&ctx, outcome.accepted, outcome.first_error.as_ref());

    StatusCode::ACCEPTED.into_response()
}

/// 429 for a full queue, 503 for a closed one; both advertise `Retry-After`
fn rejection_response(err: &IngestError, retry_after_secs: u64) -> Response {
    let status = match err {
        IngestError::AdmissionRejected { .. } => StatusCode::TOO_MANY_REQUESTS,
        IngestError::QueueClosed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %err, status = status.as_u16(), "Rejecting remote write request");

    (
        status,
        [
            (
                HeaderName::from_static("retry-after"),
                retry_after_secs.to_string(),
            ),
            (header::CONTENT_TYPE, "text/plain".to_string()),
        ],
        err.to_string(),
    )
        .into_response()
}
