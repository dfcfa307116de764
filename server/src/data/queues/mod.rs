//! Dispatch queues
//!
//! One bounded conduit per entity kind, decoupling request handling from
//! downstream consumers:
//! - Producers (request handlers) call `try_reserve`, which never waits.
//!   A full queue is reported back immediately so the request can be
//!   rejected with a retry advisory instead of holding the connection open.
//!   A reservation holds all the slots it asked for, or none of them.
//! - A single consumer (the forwarder) drains each queue in FIFO order, so
//!   points of one series arrive downstream in the order they were received.
//!
//! A capacity of zero creates a queue that rejects every item as full until
//! it is closed, and as closed afterwards.

mod error;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, PermitIterator, error::TrySendError};

pub use error::QueueError;

use crate::core::constants::{
    DEFAULT_EXEMPLAR_QUEUE_CAPACITY, DEFAULT_HISTOGRAM_QUEUE_CAPACITY,
    DEFAULT_SAMPLE_QUEUE_CAPACITY, DEFAULT_SERIES_QUEUE_CAPACITY,
};
use crate::core::reporter::RequestContext;
use crate::data::types::{ExemplarPoint, HistogramSnapshot, LabelSet, SamplePoint, Series};

// ============================================================================
// QUEUE KIND / CAPACITIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Series,
    Samples,
    Exemplars,
    Histograms,
}

impl QueueKind {
    pub const ALL: [QueueKind; 4] = [
        QueueKind::Series,
        QueueKind::Samples,
        QueueKind::Exemplars,
        QueueKind::Histograms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Series => "series",
            QueueKind::Samples => "samples",
            QueueKind::Exemplars => "exemplars",
            QueueKind::Histograms => "histograms",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind queue capacities (in items)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCapacities {
    pub series: usize,
    pub samples: usize,
    pub exemplars: usize,
    pub histograms: usize,
}

impl Default for QueueCapacities {
    fn default() -> Self {
        Self {
            series: DEFAULT_SERIES_QUEUE_CAPACITY,
            samples: DEFAULT_SAMPLE_QUEUE_CAPACITY,
            exemplars: DEFAULT_EXEMPLAR_QUEUE_CAPACITY,
            histograms: DEFAULT_HISTOGRAM_QUEUE_CAPACITY,
        }
    }
}

impl QueueCapacities {
    /// Same capacity for every kind
    pub fn uniform(capacity: usize) -> Self {
        Self {
            series: capacity,
            samples: capacity,
            exemplars: capacity,
            histograms: capacity,
        }
    }

    pub fn get(&self, kind: QueueKind) -> usize {
        match kind {
            QueueKind::Series => self.series,
            QueueKind::Samples => self.samples,
            QueueKind::Exemplars => self.exemplars,
            QueueKind::Histograms => self.histograms,
        }
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Queued item plus the request it came from
#[derive(Debug, Clone)]
pub struct Dispatched<T> {
    pub ctx: RequestContext,
    /// Labels of the owning series
    pub labels: Arc<LabelSet>,
    pub item: T,
}

// ============================================================================
// PUBLISHER / SUBSCRIBER
// ============================================================================

/// Producer handle - clone and share across request handlers
#[derive(Debug)]
pub struct Publisher<T> {
    kind: QueueKind,
    /// False for zero-capacity queues, whose channel only tracks closing
    admits: bool,
    tx: mpsc::Sender<Dispatched<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            admits: self.admits,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Publisher<T> {
    /// Reserve `n` slots without waiting. On error nothing is held.
    pub fn try_reserve(&self, n: usize) -> Result<Reservation<'_, T>, QueueError> {
        if n == 0 {
            return Ok(Reservation { permits: None });
        }
        if self.tx.is_closed() {
            return Err(QueueError::Closed(self.kind));
        }
        if !self.admits {
            return Err(QueueError::Full(self.kind));
        }
        self.tx
            .try_reserve_many(n)
            .map(|permits| Reservation {
                permits: Some(permits),
            })
            .map_err(|e| match e {
                TrySendError::Full(()) => QueueError::Full(self.kind),
                TrySendError::Closed(()) => QueueError::Closed(self.kind),
            })
    }

    /// Items currently buffered
    pub fn depth(&self) -> usize {
        if self.admits {
            self.tx.max_capacity() - self.tx.capacity()
        } else {
            0
        }
    }
}

/// Slots held on one queue. Unused slots are released on drop.
pub struct Reservation<'a, T> {
    permits: Option<PermitIterator<'a, Dispatched<T>>>,
}

impl<T> Reservation<'_, T> {
    /// Enqueue into a held slot. Returns the item back when every reserved
    /// slot has already been used.
    pub fn send(&mut self, msg: Dispatched<T>) -> Result<(), Dispatched<T>> {
        match self.permits.as_mut().and_then(Iterator::next) {
            Some(permit) => {
                permit.send(msg);
                Ok(())
            }
            None => Err(msg),
        }
    }
}

/// Consumer handle for one queue
#[derive(Debug)]
pub struct Subscriber<T> {
    rx: mpsc::Receiver<Dispatched<T>>,
}

impl<T> Subscriber<T> {
    /// Next item, or None once the queue is closed (or every producer is
    /// gone) and empty
    pub async fn recv(&mut self) -> Option<Dispatched<T>> {
        self.rx.recv().await
    }

    /// Stop accepting new items. Buffered items can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

fn bounded<T>(kind: QueueKind, capacity: usize) -> (Publisher<T>, Subscriber<T>) {
    // mpsc::channel panics on zero capacity
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Publisher {
            kind,
            admits: capacity > 0,
            tx,
        },
        Subscriber { rx },
    )
}

// ============================================================================
// QUEUE SET
// ============================================================================

/// Producer side of all four queues
#[derive(Debug, Clone)]
pub struct QueueSenders {
    pub series: Publisher<Series>,
    pub samples: Publisher<SamplePoint>,
    pub exemplars: Publisher<ExemplarPoint>,
    pub histograms: Publisher<HistogramSnapshot>,
}

impl QueueSenders {
    /// Buffered items per kind, for diagnostics
    pub fn depths(&self) -> [(QueueKind, usize); 4] {
        [
            (QueueKind::Series, self.series.depth()),
            (QueueKind::Samples, self.samples.depth()),
            (QueueKind::Exemplars, self.exemplars.depth()),
            (QueueKind::Histograms, self.histograms.depth()),
        ]
    }
}

/// Consumer side of all four queues
#[derive(Debug)]
pub struct QueueReceivers {
    pub series: Subscriber<Series>,
    pub samples: Subscriber<SamplePoint>,
    pub exemplars: Subscriber<ExemplarPoint>,
    pub histograms: Subscriber<HistogramSnapshot>,
}

impl QueueReceivers {
    /// Close every queue for new items
    pub fn close(&mut self) {
        self.series.close();
        self.samples.close();
        self.exemplars.close();
        self.histograms.close();
    }
}

/// Both ends of a freshly created queue set
#[derive(Debug)]
pub struct DispatchQueues {
    senders: QueueSenders,
    receivers: QueueReceivers,
}

impl DispatchQueues {
    pub fn bounded(capacities: QueueCapacities) -> Self {
        let (series_tx, series_rx) = bounded(QueueKind::Series, capacities.series);
        let (samples_tx, samples_rx) = bounded(QueueKind::Samples, capacities.samples);
        let (exemplars_tx, exemplars_rx) = bounded(QueueKind::Exemplars, capacities.exemplars);
        let (histograms_tx, histograms_rx) =
            bounded(QueueKind::Histograms, capacities.histograms);

        tracing::debug!(
            series = capacities.series,
            samples = capacities.samples,
            exemplars = capacities.exemplars,
            histograms = capacities.histograms,
            "Dispatch queues created"
        );

        Self {
            senders: QueueSenders {
                series: series_tx,
                samples: samples_tx,
                exemplars: exemplars_tx,
                histograms: histograms_tx,
            },
            receivers: QueueReceivers {
                series: series_rx,
                samples: samples_rx,
                exemplars: exemplars_rx,
                histograms: histograms_rx,
            },
        }
    }

    pub fn into_parts(self) -> (QueueSenders, QueueReceivers) {
        (self.senders, self.receivers)
    }
}
