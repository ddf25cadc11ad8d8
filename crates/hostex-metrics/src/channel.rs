//! Bounded many-writer, single-reader queue carrying samples from collectors
//! to the scrape orchestrator.

use hostex_common::error::{HostexError, Result};
use tokio::sync::mpsc;

use crate::types::Sample;

/// A sample tagged with the index of the collector that produced it.
#[derive(Debug)]
pub struct Envelope {
    pub origin: usize,
    pub sample: Sample,
}

pub fn metric_channel(capacity: usize) -> (MetricSender, MetricReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MetricSender { origin: 0, tx }, MetricReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct MetricSender {
    origin: usize,
    tx: mpsc::Sender<Envelope>,
}

impl MetricSender {
    /// Returns a sender whose samples are attributed to `origin`.
    pub fn scoped(&self, origin: usize) -> Self {
        Self {
            origin,
            tx: self.tx.clone(),
        }
    }

    /// Waits for capacity when the channel is full. Fails once the reader has
    /// closed the channel, which happens when the scrape is over.
    pub async fn send(&self, sample: Sample) -> Result<()> {
        self.tx
            .send(Envelope {
                origin: self.origin,
                sample,
            })
            .await
            .map_err(|_| HostexError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct MetricReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl MetricReceiver {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Stops accepting new samples and returns everything already queued.
    pub fn close_and_drain(&mut self) -> Vec<Envelope> {
        self.rx.close();
        let mut remaining = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            remaining.push(envelope);
        }
        remaining
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{MetricDescriptor, MetricKind};

    fn sample(value: f64) -> Sample {
        let descriptor =
            MetricDescriptor::new("test", "", "value", "", MetricKind::Gauge, &[]).unwrap();
        Sample::new(Arc::clone(&descriptor), value, Vec::new()).unwrap()
    }

    #[tokio::test]
    async fn scoped_senders_tag_their_samples() {
        let (tx, mut rx) = metric_channel(4);
        let first = tx.scoped(1);
        let second = tx.scoped(2);
        drop(tx);

        first.send(sample(1.0)).await.unwrap();
        second.send(sample(2.0)).await.unwrap();
        drop(first);
        drop(second);

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!((a.origin, a.sample.value), (1, 1.0));
        assert_eq!((b.origin, b.sample.value), (2, 2.0));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (tx, mut rx) = metric_channel(4);
        tx.send(sample(1.0)).await.unwrap();

        let drained = rx.close_and_drain();
        assert_eq!(drained.len(), 1);
        assert!(tx.is_closed());
        assert!(matches!(
            tx.send(sample(2.0)).await,
            Err(HostexError::ChannelClosed)
        ));
    }
}
