//! Producer/relay task pair shared by the protocol resolvers
//!
//! Each resolve call runs a protocol producer and a relay task joined by a
//! small bounded channel under one cancellation token. A failure in either
//! task cancels the token so the sibling winds down; the caller's sender is
//! dropped only after both tasks have returned.

use crate::error::Result;
use crate::transform::Transform;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Capacity of the channel between producer and relay
pub(crate) const RELAY_CAPACITY: usize = 8;

/// Sends one raw record to the relay task.
///
/// Returns false when the producer should stop: the group was cancelled or
/// the relay task is gone.
pub(crate) async fn emit<R>(
    entries: &mpsc::Sender<R>,
    record: R,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = entries.send(record) => sent.is_ok(),
    }
}

/// Reads raw records, applies the transform and forwards results in order.
async fn relay<R, T>(
    transform: &Transform<R, T>,
    mut entries: mpsc::Receiver<R>,
    discovered: &mpsc::Sender<T>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut relayed = 0usize;

    loop {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            raw = entries.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };

        let item = match transform.apply(raw) {
            Ok(item) => item,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = discovered.send(item) => {
                if sent.is_err() {
                    debug!("Discovery receiver dropped, stopping relay");
                    cancel.cancel();
                    break;
                }
            }
        }

        relayed += 1;
    }

    debug!(relayed, "Relay finished");
    Ok(())
}

/// Runs `producer` and the relay task to completion.
///
/// `producer` must drop its sender for `entries` when it returns so the
/// relay can drain and stop. `discovered` is dropped here, after both tasks
/// have joined, which is the close signal for the caller.
pub(crate) async fn run_pair<R, T, P>(
    producer: P,
    entries: mpsc::Receiver<R>,
    transform: &Transform<R, T>,
    discovered: mpsc::Sender<T>,
    group: CancellationToken,
) -> Result<()>
where
    P: Future<Output = Result<()>>,
{
    let producer = async {
        let result = producer.await;
        if let Err(e) = &result {
            warn!(error = %e, "Discovery producer failed");
            group.cancel();
        }
        result
    };

    let (produced, relayed) =
        tokio::join!(producer, relay(transform, entries, &discovered, &group));

    drop(discovered);

    produced.and(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;

    async fn produce(
        items: Vec<u32>,
        entries: mpsc::Sender<u32>,
        cancel: CancellationToken,
    ) -> Result<()> {
        for item in items {
            if !emit(&entries, item, &cancel).await {
                return Ok(());
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_run_pair_forwards_in_order() {
        let group = CancellationToken::new();
        let (tx, rx) = mpsc::channel(RELAY_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let transform = Transform::new(|n: u32| Ok(n * 10));

        let result = run_pair(
            produce(vec![1, 2, 3], tx, group.clone()),
            rx,
            &transform,
            out_tx,
            group,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(out_rx.recv().await, Some(10));
        assert_eq!(out_rx.recv().await, Some(20));
        assert_eq!(out_rx.recv().await, Some(30));
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_producer_error_cancels_relay() {
        let group = CancellationToken::new();
        let (_tx, rx) = mpsc::channel::<u32>(RELAY_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel::<u32>(16);
        let transform = Transform::identity();

        // The producer keeps its sender alive; only cancellation ends the relay.
        let producer = async { Err(DiscoveryError::transport("test", "socket closed")) };

        let result = run_pair(producer, rx, &transform, out_tx, group.clone()).await;

        assert!(matches!(result, Err(DiscoveryError::Transport { .. })));
        assert!(group.is_cancelled());
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_transform_error_stops_producer() {
        let group = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel::<u32>(16);
        let transform: Transform<u32, u32> = Transform::new(|_| Err("rejected".into()));

        let result = run_pair(
            produce((0..100).collect(), tx, group.clone()),
            rx,
            &transform,
            out_tx,
            group,
        )
        .await;

        assert!(matches!(result, Err(DiscoveryError::Transform(_))));
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_pair() {
        let group = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let (out_tx, out_rx) = mpsc::channel::<u32>(1);
        drop(out_rx);

        let result = run_pair(
            produce((0..100).collect(), tx, group.clone()),
            rx,
            &Transform::identity(),
            out_tx,
            group.clone(),
        )
        .await;

        assert!(result.is_ok());
        assert!(group.is_cancelled());
    }
}
