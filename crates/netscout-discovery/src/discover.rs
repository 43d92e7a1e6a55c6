//! Discovery orchestration: runs one resolver under a timeout

use crate::config::DiscoverySettings;
use crate::error::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timeout applied when the caller does not supply one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of the channel used by [`Discoverer::collect`]
const COLLECT_CAPACITY: usize = 64;

/// A protocol-specific discovery mechanism.
///
/// `resolve` owns `discovered` and drops it exactly once when it returns,
/// on every path. Implementations must observe `cancel` and return promptly
/// once it fires.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Item sent for each discovered service
    type Item: Send + 'static;

    /// Protocol name used in logs
    fn protocol(&self) -> &'static str {
        "custom"
    }

    /// Runs the protocol exchange, streaming results into `discovered`.
    async fn resolve(
        &self,
        cancel: CancellationToken,
        discovered: mpsc::Sender<Self::Item>,
    ) -> Result<()>;
}

/// Runs a discovery operation end-to-end.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Item sent for each discovered service
    type Item: Send + 'static;

    /// Discovers services until completion, cancellation or timeout.
    ///
    /// The caller observes zero or more items, then the channel closing,
    /// then this call's result.
    async fn discover(
        &self,
        cancel: &CancellationToken,
        discovered: mpsc::Sender<Self::Item>,
    ) -> Result<()>;

    /// Runs a discovery and gathers every item into a Vec.
    ///
    /// Items received before a failure are discarded with it.
    async fn collect(&self, cancel: &CancellationToken) -> Result<Vec<Self::Item>> {
        let (tx, mut rx) = mpsc::channel(COLLECT_CAPACITY);

        let drain = async {
            let mut items = Vec::new();
            while let Some(item) = rx.recv().await {
                items.push(item);
            }
            items
        };

        let (result, items) = tokio::join!(self.discover(cancel, tx), drain);
        result.map(|_| items)
    }
}

/// Wraps a single resolver and runs it under a timeout.
///
/// # Example
///
/// ```no_run
/// use netscout_discovery::{Discover, Discoverer, MdnsConfig, MdnsResolver};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> netscout_discovery::Result<()> {
/// let config = MdnsConfig::builder().service("_http._tcp").build()?;
/// let discover = Discover::new(MdnsResolver::new(config)).with_timeout(Duration::from_secs(3));
///
/// let (tx, mut rx) = tokio::sync::mpsc::channel(16);
/// let cancel = CancellationToken::new();
/// let (result, _) = tokio::join!(discover.discover(&cancel, tx), async {
///     while let Some(entry) = rx.recv().await {
///         println!("{}", entry.name);
///     }
/// });
/// result
/// # }
/// ```
#[derive(Debug)]
pub struct Discover<R> {
    resolver: R,
    timeout: Duration,
}

impl<R: Resolver> Discover<R> {
    /// Creates a discover process with the default one second timeout.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a discover process using the configured timeout.
    pub fn from_settings(resolver: R, settings: &DiscoverySettings) -> Self {
        Self::new(resolver).with_timeout(settings.timeout())
    }

    /// Overrides the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the wrapped resolver
    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

#[async_trait]
impl<R: Resolver> Discoverer for Discover<R> {
    type Item = R::Item;

    async fn discover(
        &self,
        cancel: &CancellationToken,
        discovered: mpsc::Sender<Self::Item>,
    ) -> Result<()> {
        let child = cancel.child_token();
        let _guard = child.clone().drop_guard();
        let started = Instant::now();
        let protocol = self.resolver.protocol();
        let timeout_ms = self.timeout.as_millis() as u64;

        info!(protocol, timeout_ms, "Starting discovery");

        let resolve = self.resolver.resolve(child.clone(), discovered);
        tokio::pin!(resolve);

        // The resolver is never dropped mid-flight; on deadline it is asked
        // to stop and awaited so it can close its channel.
        let mut timed_out = false;
        let result = tokio::select! {
            result = &mut resolve => result,
            _ = tokio::time::sleep(self.timeout) => {
                debug!(protocol, "Discovery deadline reached, cancelling resolver");
                timed_out = true;
                child.cancel();
                resolve.await
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => info!(protocol, elapsed_ms, timed_out, "Discovery finished"),
            Err(e) => warn!(
                protocol,
                elapsed_ms,
                timeout_ms,
                timed_out,
                error = %e,
                "Discovery failed"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;

    /// Sends a fixed list, then waits for cancellation.
    struct ListResolver {
        items: Vec<&'static str>,
        wait_for_cancel: bool,
    }

    #[async_trait]
    impl Resolver for ListResolver {
        type Item = &'static str;

        async fn resolve(
            &self,
            cancel: CancellationToken,
            discovered: mpsc::Sender<Self::Item>,
        ) -> Result<()> {
            for item in self.items.iter().copied() {
                if discovered.send(item).await.is_err() {
                    return Ok(());
                }
            }
            if self.wait_for_cancel {
                cancel.cancelled().await;
            }
            Ok(())
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl Resolver for FailingResolver {
        type Item = ();

        async fn resolve(&self, _cancel: CancellationToken, _discovered: mpsc::Sender<()>) -> Result<()> {
            Err(DiscoveryError::transport("test", "cannot bind"))
        }
    }

    #[test]
    fn test_default_timeout() {
        let discover = Discover::new(FailingResolver);
        assert_eq!(discover.timeout(), Duration::from_secs(1));
        assert_eq!(discover.resolver().protocol(), "custom");

        let discover = discover.with_timeout(Duration::from_millis(250));
        assert_eq!(discover.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_settings() {
        let settings = DiscoverySettings { timeout_ms: 1500 };
        let discover = Discover::from_settings(FailingResolver, &settings);
        assert_eq!(discover.timeout(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_collect_returns_items_in_order() {
        let discover = Discover::new(ListResolver {
            items: vec!["a", "b"],
            wait_for_cancel: false,
        });

        let items = discover.collect(&CancellationToken::new()).await.unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_resolver() {
        let discover = Discover::new(ListResolver {
            items: vec!["a"],
            wait_for_cancel: true,
        })
        .with_timeout(Duration::from_millis(300));

        let started = tokio::time::Instant::now();
        let items = discover.collect(&CancellationToken::new()).await.unwrap();

        assert_eq!(items, vec!["a"]);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_resolver_error_is_returned() {
        let discover = Discover::new(FailingResolver);
        let result = discover.collect(&CancellationToken::new()).await;
        assert!(matches!(result, Err(DiscoveryError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_parent_cancellation() {
        let discover = Discover::new(ListResolver {
            items: vec![],
            wait_for_cancel: true,
        })
        .with_timeout(Duration::from_secs(60));

        let parent = CancellationToken::new();
        parent.cancel();

        let items = discover.collect(&parent).await.unwrap();
        assert!(items.is_empty());
    }
}
