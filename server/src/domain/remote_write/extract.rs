//! Entity extraction from a decoded `WriteRequest`
//!
//! Walks each time series into canonical entities. Per-item failures are
//! collected next to the result instead of aborting the request.

use std::sync::Arc;

use crate::data::prompb::{self, WriteRequest};
use crate::data::types::{ExemplarPoint, HistogramSnapshot, LabelSet, MetadataRecord, SamplePoint};
use crate::domain::error::ExtractionError;

use super::histogram::convert_histogram;

/// One valid series with its points in wire order
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSeries {
    pub labels: Arc<LabelSet>,
    pub samples: Vec<SamplePoint>,
    pub exemplars: Vec<ExemplarPoint>,
    pub histograms: Vec<HistogramSnapshot>,
}

/// Result of extracting a single wire series
#[derive(Debug, Default)]
pub struct SeriesExtraction {
    /// None when the series identity itself was invalid
    pub series: Option<ExtractedSeries>,
    pub errors: Vec<ExtractionError>,
}

/// Result of extracting a whole request
#[derive(Debug, Default)]
pub struct Extraction {
    pub series: Vec<ExtractedSeries>,
    pub metadata: Vec<MetadataRecord>,
    pub errors: Vec<ExtractionError>,
}

/// Extract every series and metadata entry of a request
pub fn extract_write_request(request: &WriteRequest) -> Extraction {
    let mut result = Extraction::default();

    for (index, ts) in request.timeseries.iter().enumerate() {
        let SeriesExtraction { series, errors } = extract_series(index, ts);
        result.errors.extend(errors);
        if let Some(series) = series {
            result.series.push(series);
        }
    }

    let (metadata, errors) = extract_metadata(&request.metadata);
    result.metadata = metadata;
    result.errors.extend(errors);

    result
}

/// Extract a single series. `index` is its position in the request, used
/// only for error messages.
pub fn extract_series(index: usize, ts: &prompb::TimeSeries) -> SeriesExtraction {
    if ts.labels.is_empty() {
        return SeriesExtraction {
            series: None,
            errors: vec![ExtractionError::EmptySeries { index }],
        };
    }
    if ts.labels.iter().any(|l| l.name.is_empty()) {
        return SeriesExtraction {
            series: None,
            errors: vec![ExtractionError::EmptyLabelName { index }],
        };
    }

    let labels = Arc::new(to_label_set(&ts.labels));
    let mut errors = Vec::new();

    let samples = ts
        .samples
        .iter()
        .map(|s| SamplePoint {
            value: s.value,
            timestamp_ms: s.timestamp,
        })
        .collect();

    let mut exemplars = Vec::with_capacity(ts.exemplars.len());
    for (i, e) in ts.exemplars.iter().enumerate() {
        if e.labels.iter().any(|l| l.name.is_empty()) {
            errors.push(ExtractionError::InvalidExemplar {
                series: labels.to_string(),
                exemplar: i,
            });
            continue;
        }
        exemplars.push(ExemplarPoint {
            labels: to_label_set(&e.labels),
            value: e.value,
            timestamp_ms: e.timestamp,
        });
    }

    let mut histograms = Vec::with_capacity(ts.histograms.len());
    for (i, h) in ts.histograms.iter().enumerate() {
        match convert_histogram(h) {
            Ok(snapshot) => histograms.push(snapshot),
            Err(reason) => errors.push(ExtractionError::InvalidHistogram {
                series: labels.to_string(),
                histogram: i,
                reason,
            }),
        }
    }

    SeriesExtraction {
        series: Some(ExtractedSeries {
            labels,
            samples,
            exemplars,
            histograms,
        }),
        errors,
    }
}

/// Convert metric metadata entries, dropping nameless ones
pub fn extract_metadata(
    metadata: &[prompb::MetricMetadata],
) -> (Vec<MetadataRecord>, Vec<ExtractionError>) {
    let mut records = Vec::with_capacity(metadata.len());
    let mut errors = Vec::new();

    for (index, m) in metadata.iter().enumerate() {
        if m.metric_family_name.is_empty() {
            errors.push(ExtractionError::InvalidMetadata { index });
            continue;
        }
        let metric_type = prompb::MetricType::try_from(m.r#type)
            .unwrap_or(prompb::MetricType::Unknown)
            .as_str_name();
        records.push(MetadataRecord {
            metric_family_name: m.metric_family_name.clone(),
            metric_type,
            help: m.help.clone(),
            unit: m.unit.clone(),
        });
    }

    (records, errors)
}

fn to_label_set(labels: &[prompb::Label]) -> LabelSet {
    LabelSet::from_pairs(labels.iter().map(|l| (l.name.as_str(), l.value.as_str())))
}
