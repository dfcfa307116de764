//! Enqueue extracted series onto the dispatch queues

use std::sync::Arc;

use crate::core::reporter::RequestContext;
use crate::data::queues::{Dispatched, QueueError, QueueSenders, Reservation};
use crate::data::types::{LabelSet, Series};

use super::extract::ExtractedSeries;

/// Enqueue a series and all of its points without waiting.
///
/// Slots are reserved on every queue the series needs before anything is
/// sent, so a rejected series leaves nothing behind. Returns the number of
/// entities enqueued.
pub fn enqueue_series(
    senders: &QueueSenders,
    ctx: &RequestContext,
    series: ExtractedSeries,
) -> Result<usize, QueueError> {
    let ExtractedSeries {
        labels,
        samples,
        exemplars,
        histograms,
    } = series;

    let series_slot = senders.series.try_reserve(1)?;
    let sample_slots = senders.samples.try_reserve(samples.len())?;
    let exemplar_slots = senders.exemplars.try_reserve(exemplars.len())?;
    let histogram_slots = senders.histograms.try_reserve(histograms.len())?;

    let identity = Series {
        labels: Arc::clone(&labels),
    };
    Ok(fill(series_slot, ctx, &labels, [identity])
        + fill(sample_slots, ctx, &labels, samples)
        + fill(exemplar_slots, ctx, &labels, exemplars)
        + fill(histogram_slots, ctx, &labels, histograms))
}

fn fill<T>(
    mut slots: Reservation<'_, T>,
    ctx: &RequestContext,
    labels: &Arc<LabelSet>,
    items: impl IntoIterator<Item = T>,
) -> usize {
    let mut sent = 0;
    for item in items {
        // Reserved counts match the item counts, so this only skips on a bug
        if slots.send(envelope(ctx, labels, item)).is_ok() {
            sent += 1;
        }
    }
    sent
}

fn envelope<T>(ctx: &RequestContext, labels: &Arc<LabelSet>, item: T) -> Dispatched<T> {
    Dispatched {
        ctx: ctx.clone(),
        labels: Arc::clone(labels),
        item,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::queues::{DispatchQueues, QueueCapacities, QueueKind};
    use crate::data::types::SamplePoint;

    fn extracted(samples: usize) -> ExtractedSeries {
        ExtractedSeries {
            labels: Arc::new(LabelSet::from_pairs([("__name__", "up")])),
            samples: (0..samples)
                .map(|i| SamplePoint {
                    value: i as f64,
                    timestamp_ms: i as i64,
                })
                .collect(),
            exemplars: vec![],
            histograms: vec![],
        }
    }

    #[tokio::test]
    async fn test_enqueue_counts_all_entities() {
        let (tx, mut rx) = DispatchQueues::bounded(QueueCapacities::uniform(16)).into_parts();
        let ctx = RequestContext::new();

        let accepted = enqueue_series(&tx, &ctx, extracted(3)).unwrap();

        assert_eq!(accepted, 4);
        let series = rx.series.recv().await.unwrap();
        assert_eq!(series.ctx.request_id(), ctx.request_id());
        assert!(Arc::ptr_eq(&series.labels, &series.item.labels));
        let first = rx.samples.recv().await.unwrap();
        assert_eq!(first.item.timestamp_ms, 0);
    }

    #[tokio::test]
    async fn test_rejected_series_leaves_nothing_queued() {
        let capacities = QueueCapacities {
            samples: 2,
            ..QueueCapacities::uniform(16)
        };
        let (tx, _rx) = DispatchQueues::bounded(capacities).into_parts();

        let result = enqueue_series(&tx, &RequestContext::new(), extracted(5));

        assert_eq!(result, Err(QueueError::Full(QueueKind::Samples)));
        assert_eq!(tx.series.depth(), 0);
        assert_eq!(tx.samples.depth(), 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_kind_rejects_whole_series() {
        let capacities = QueueCapacities {
            samples: 0,
            ..QueueCapacities::uniform(64)
        };
        let (tx, _rx) = DispatchQueues::bounded(capacities).into_parts();

        let result = enqueue_series(&tx, &RequestContext::new(), extracted(1));

        assert_eq!(result, Err(QueueError::Full(QueueKind::Samples)));
        assert_eq!(tx.series.depth(), 0);

        // A series without samples does not touch the disabled queue
        assert_eq!(enqueue_series(&tx, &RequestContext::new(), extracted(0)), Ok(1));
        assert_eq!(tx.series.depth(), 1);
    }
}
