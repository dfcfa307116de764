//! Native histogram conversion
//!
//! Resolves the sparse span/delta encoding into absolute bucket counts with
//! explicit boundaries. Bucket `i` of schema `s` covers `(2^((i-1)·2^-s), 2^(i·2^-s)]`
//! on the positive side and the mirrored interval on the negative side.

use crate::data::prompb::{self, histogram};
use crate::data::types::{HistogramBucket, HistogramCount, HistogramSnapshot, ResetHint};

const MIN_SCHEMA: i32 = -4;
const MAX_SCHEMA: i32 = 8;

/// Convert one wire histogram. The error string describes why the encoding
/// cannot be represented.
pub fn convert_histogram(h: &prompb::Histogram) -> Result<HistogramSnapshot, String> {
    if !(MIN_SCHEMA..=MAX_SCHEMA).contains(&h.schema) {
        return Err(format!(
            "schema {} out of range [{}, {}]",
            h.schema, MIN_SCHEMA, MAX_SCHEMA
        ));
    }

    let count = match h.count {
        Some(histogram::Count::CountInt(c)) => HistogramCount::Int(c),
        Some(histogram::Count::CountFloat(c)) => HistogramCount::Float(c),
        None => return Err("missing count".to_string()),
    };

    let has_deltas = !h.positive_deltas.is_empty() || !h.negative_deltas.is_empty();
    let has_counts = !h.positive_counts.is_empty() || !h.negative_counts.is_empty();
    if has_deltas && has_counts {
        return Err("mixes integer deltas and float counts".to_string());
    }
    let is_float = matches!(count, HistogramCount::Float(_));
    if is_float && has_deltas {
        return Err("float histogram carries integer deltas".to_string());
    }
    if !is_float && has_counts {
        return Err("integer histogram carries float counts".to_string());
    }

    let zero_count = match h.zero_count {
        Some(histogram::ZeroCount::ZeroCountInt(c)) => c as f64,
        Some(histogram::ZeroCount::ZeroCountFloat(c)) => c,
        None => 0.0,
    };

    let (positive_counts, negative_counts) = if is_float {
        (
            float_counts(&h.positive_counts, "positive")?,
            float_counts(&h.negative_counts, "negative")?,
        )
    } else {
        (
            delta_counts(&h.positive_deltas, "positive")?,
            delta_counts(&h.negative_deltas, "negative")?,
        )
    };

    let positive_indices = bucket_indices(&h.positive_spans, positive_counts.len(), "positive")?;
    let negative_indices = bucket_indices(&h.negative_spans, negative_counts.len(), "negative")?;

    let positive_buckets = positive_indices
        .iter()
        .zip(&positive_counts)
        .map(|(&idx, &count)| HistogramBucket {
            lower: upper_bound(idx - 1, h.schema),
            upper: upper_bound(idx, h.schema),
            lower_inclusive: false,
            upper_inclusive: true,
            count,
        })
        .collect();

    // Higher index means further from zero; reverse to keep ascending bounds
    let negative_buckets = negative_indices
        .iter()
        .zip(&negative_counts)
        .rev()
        .map(|(&idx, &count)| HistogramBucket {
            lower: -upper_bound(idx, h.schema),
            upper: -upper_bound(idx - 1, h.schema),
            lower_inclusive: true,
            upper_inclusive: false,
            count,
        })
        .collect();

    let reset_hint = match prompb::ResetHint::try_from(h.reset_hint) {
        Ok(prompb::ResetHint::Yes) => ResetHint::Yes,
        Ok(prompb::ResetHint::No) => ResetHint::No,
        Ok(prompb::ResetHint::Gauge) => ResetHint::Gauge,
        Ok(prompb::ResetHint::Unknown) | Err(_) => ResetHint::Unknown,
    };

    Ok(HistogramSnapshot {
        count,
        sum: h.sum,
        schema: h.schema,
        zero_threshold: h.zero_threshold,
        zero_count,
        negative_buckets,
        positive_buckets,
        reset_hint,
        timestamp_ms: h.timestamp,
    })
}

/// Upper bound of bucket `idx`: 2^(idx * 2^-schema)
fn upper_bound(idx: i64, schema: i32) -> f64 {
    (idx as f64 * 2f64.powi(-schema)).exp2()
}

/// Running sum of deltas into absolute counts
fn delta_counts(deltas: &[i64], side: &str) -> Result<Vec<f64>, String> {
    let mut current: i64 = 0;
    let mut counts = Vec::with_capacity(deltas.len());
    for &delta in deltas {
        current = current
            .checked_add(delta)
            .ok_or_else(|| format!("{} bucket count overflows", side))?;
        if current < 0 {
            return Err(format!("negative {} bucket count {}", side, current));
        }
        counts.push(current as f64);
    }
    Ok(counts)
}

fn float_counts(counts: &[f64], side: &str) -> Result<Vec<f64>, String> {
    if let Some(bad) = counts.iter().find(|c| c.is_nan() || **c < 0.0) {
        return Err(format!("invalid {} bucket count {}", side, bad));
    }
    Ok(counts.to_vec())
}

/// Expand spans into absolute bucket indices, checking they cover exactly
/// `expected` buckets.
fn bucket_indices(
    spans: &[prompb::BucketSpan],
    expected: usize,
    side: &str,
) -> Result<Vec<i64>, String> {
    let covered: u64 = spans.iter().map(|s| u64::from(s.length)).sum();
    if covered != expected as u64 {
        return Err(format!(
            "{} spans cover {} buckets but {} counts were sent",
            side, covered, expected
        ));
    }

    let mut indices = Vec::with_capacity(expected);
    let mut next: i64 = 0;
    for (i, span) in spans.iter().enumerate() {
        next = if i == 0 {
            i64::from(span.offset)
        } else {
            next + i64::from(span.offset)
        };
        for _ in 0..span.length {
            indices.push(next);
            next += 1;
        }
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::prompb::BucketSpan;

    fn int_histogram() -> prompb::Histogram {
        prompb::Histogram {
            count: Some(histogram::Count::CountInt(7)),
            sum: 12.5,
            schema: 0,
            zero_threshold: 0.001,
            zero_count: Some(histogram::ZeroCount::ZeroCountInt(1)),
            positive_spans: vec![
                BucketSpan {
                    offset: 0,
                    length: 2,
                },
                BucketSpan {
                    offset: 1,
                    length: 1,
                },
            ],
            // Absolute counts 2, 3, 1
            positive_deltas: vec![2, 1, -2],
            timestamp: 1_700_000_000_000,
            reset_hint: prompb::ResetHint::No as i32,
            ..Default::default()
        }
    }

    #[test]
    fn test_int_histogram_resolves_absolute_counts() {
        let snapshot = convert_histogram(&int_histogram()).unwrap();

        let counts: Vec<f64> = snapshot.positive_buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2.0, 3.0, 1.0]);
        assert_eq!(snapshot.count, HistogramCount::Int(7));
        assert_eq!(snapshot.zero_count, 1.0);
        assert_eq!(snapshot.reset_hint, ResetHint::No);
        assert_eq!(snapshot.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_schema_zero_bucket_bounds() {
        let snapshot = convert_histogram(&int_histogram()).unwrap();

        // Indices 0, 1, 3 with base 2
        let bounds: Vec<(f64, f64)> = snapshot
            .positive_buckets
            .iter()
            .map(|b| (b.lower, b.upper))
            .collect();
        assert_eq!(bounds, vec![(0.5, 1.0), (1.0, 2.0), (4.0, 8.0)]);
    }

    #[test]
    fn test_negative_buckets_are_ascending() {
        let h = prompb::Histogram {
            count: Some(histogram::Count::CountInt(3)),
            negative_spans: vec![BucketSpan {
                offset: 1,
                length: 2,
            }],
            negative_deltas: vec![1, 1],
            ..Default::default()
        };
        let snapshot = convert_histogram(&h).unwrap();

        let bounds: Vec<(f64, f64, f64)> = snapshot
            .negative_buckets
            .iter()
            .map(|b| (b.lower, b.upper, b.count))
            .collect();
        assert_eq!(bounds, vec![(-4.0, -2.0, 2.0), (-2.0, -1.0, 1.0)]);
        assert!(snapshot.negative_buckets[0].lower_inclusive);
    }

    #[test]
    fn test_float_histogram() {
        let h = prompb::Histogram {
            count: Some(histogram::Count::CountFloat(2.5)),
            schema: 1,
            positive_spans: vec![BucketSpan {
                offset: 0,
                length: 1,
            }],
            positive_counts: vec![2.5],
            ..Default::default()
        };
        let snapshot = convert_histogram(&h).unwrap();
        assert_eq!(snapshot.count, HistogramCount::Float(2.5));
        assert_eq!(snapshot.positive_buckets[0].count, 2.5);
        // sqrt(2) base
        assert!((snapshot.positive_buckets[0].lower - 2f64.sqrt().recip()).abs() < 1e-12);
    }

    #[test]
    fn test_display_form() {
        let snapshot = convert_histogram(&int_histogram()).unwrap();
        assert_eq!(
            snapshot.to_string(),
            "{count:7, sum:12.5, [-0.001,0.001]:1, (0.5,1]:2, (1,2]:3, (4,8]:1}"
        );
    }

    #[test]
    fn test_missing_count_rejected() {
        let h = prompb::Histogram {
            count: None,
            ..int_histogram()
        };
        assert_eq!(convert_histogram(&h).unwrap_err(), "missing count");
    }

    #[test]
    fn test_schema_out_of_range_rejected() {
        let h = prompb::Histogram {
            schema: 9,
            ..int_histogram()
        };
        assert!(convert_histogram(&h).unwrap_err().contains("schema 9"));
    }

    #[test]
    fn test_mixed_encoding_rejected() {
        let h = prompb::Histogram {
            positive_counts: vec![1.0],
            ..int_histogram()
        };
        assert!(convert_histogram(&h).unwrap_err().contains("mixes"));
    }

    #[test]
    fn test_span_length_mismatch_rejected() {
        let h = prompb::Histogram {
            positive_deltas: vec![1, 1],
            ..int_histogram()
        };
        assert!(
            convert_histogram(&h)
                .unwrap_err()
                .contains("spans cover 3 buckets but 2 counts")
        );
    }

    #[test]
    fn test_negative_running_count_rejected() {
        let h = prompb::Histogram {
            positive_deltas: vec![1, -2, 1],
            ..int_histogram()
        };
        assert!(convert_histogram(&h).unwrap_err().contains("negative positive bucket count"));
    }
}
