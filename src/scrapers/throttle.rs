//! Per-host concurrency throttle.
//!
//! Each host gets its own counting semaphore. A permit is taken right before
//! a request attempt and released when the guard drops, on every path.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::trace;
use url::Url;

/// Guard holding one in-flight slot for a host.
#[derive(Debug)]
pub struct HostPermit {
    host: String,
    _permit: OwnedSemaphorePermit,
}

impl HostPermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Caps simultaneous in-flight requests per host.
#[derive(Debug, Clone)]
pub struct DomainThrottle {
    limit: usize,
    hosts: Arc<RwLock<HashMap<String, Arc<Semaphore>>>>,
}

impl DomainThrottle {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            hosts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Extract host from URL.
    pub fn extract_host(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
    }

    async fn semaphore_for(&self, host: &str) -> Arc<Semaphore> {
        {
            let hosts = self.hosts.read().await;
            if let Some(sem) = hosts.get(host) {
                return sem.clone();
            }
        }
        let mut hosts = self.hosts.write().await;
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
            .clone()
    }

    /// Wait for a slot on the URL's host.
    ///
    /// Returns `None` for URLs without a host; those are not throttled.
    pub async fn acquire(&self, url: &str) -> Option<HostPermit> {
        let host = Self::extract_host(url)?;
        let semaphore = self.semaphore_for(&host).await;
        // semaphores are never closed
        let permit = semaphore.acquire_owned().await.ok()?;
        trace!("Acquired slot for {}", host);
        Some(HostPermit {
            host,
            _permit: permit,
        })
    }

    /// Slots currently free for a host.
    pub async fn available(&self, host: &str) -> usize {
        let hosts = self.hosts.read().await;
        hosts
            .get(host)
            .map(|s| s.available_permits())
            .unwrap_or(self.limit)
    }
}

impl Default for DomainThrottle {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let throttle = DomainThrottle::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for i in 0..12 {
            let throttle = throttle.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = throttle
                    .acquire(&format!("https://same.example/doc/{}", i))
                    .await
                    .unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(throttle.available("same.example").await, 2);
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let throttle = DomainThrottle::new(1);
        let _a = throttle.acquire("https://a.example/").await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(200),
            throttle.acquire("https://b.example/"),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(throttle.available("a.example").await, 0);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let throttle = DomainThrottle::new(1);
        {
            let permit = throttle.acquire("https://a.example/x").await.unwrap();
            assert_eq!(permit.host(), "a.example");
            assert_eq!(throttle.available("a.example").await, 0);
        }
        assert_eq!(throttle.available("a.example").await, 1);
    }

    #[tokio::test]
    async fn test_hostless_urls_are_not_throttled() {
        let throttle = DomainThrottle::new(1);
        assert!(throttle.acquire("not a url").await.is_none());
    }
}
