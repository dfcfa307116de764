//! Remote-write body decoding
//!
//! Bodies are a snappy block (not the framed stream format) wrapping a
//! protobuf `WriteRequest`.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use prost::Message;

use crate::data::prompb::WriteRequest;
use crate::domain::error::DecodeError;

/// Read the raw body, stopping as soon as it grows past `limit`.
///
/// A declared `Content-Length` above the limit fails before anything is read.
pub async fn read_body(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Vec<u8>, DecodeError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(DecodeError::BodyTooLarge { limit });
    }

    let mut buf = Vec::with_capacity(declared.unwrap_or(0));
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DecodeError::Body(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(DecodeError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Decompress and decode a remote-write body.
///
/// The decompressed length is read from the snappy preamble and checked
/// against `max_decompressed` before any allocation.
pub fn decode_write_request(
    body: &[u8],
    max_decompressed: usize,
) -> Result<WriteRequest, DecodeError> {
    let size = snap::raw::decompress_len(body).map_err(|e| DecodeError::Snappy(e.to_string()))?;
    if size > max_decompressed {
        return Err(DecodeError::TooLarge {
            size,
            limit: max_decompressed,
        });
    }

    let raw = snap::raw::Decoder::new()
        .decompress_vec(body)
        .map_err(|e| DecodeError::Snappy(e.to_string()))?;

    WriteRequest::decode(raw.as_slice()).map_err(|e| DecodeError::Protobuf(e.to_string()))
}

/// Plain-text error response: 413 for an oversized body, 400 otherwise
pub fn decode_error_response(err: &DecodeError) -> Response {
    tracing::warn!(error = %err, "Failed to decode remote write request");

    let status = match err {
        DecodeError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        [(header::CONTENT_TYPE, "text/plain")],
        err.to_string(),
    )
        .into_response()
}
