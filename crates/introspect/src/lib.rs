//! On-demand live schema introspection with a TTL cache.
//!
//! Wraps a caller-supplied [`SchemaProbe`] with:
//! - a per-table cache, expiring after a configurable TTL
//! - an explicit invalidation signal, per table or for the whole cache
//! - a per-probe timeout, mapped to `SchemaUnavailable::Timeout`
//!
//! Results are ephemeral: cached per process lifetime, never persisted.
//! Probe failures are not cached, so a transient fault retries on the
//! next request.

use std::collections::HashMap;
use std::sync::Arc;

use groundsql_config::IntrospectionConfig;
use groundsql_core::error::SchemaUnavailable;
use groundsql_core::introspect::{IntrospectionResult, SchemaProbe};
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

struct CacheEntry {
    result: IntrospectionResult,
    fetched: Instant,
}

/// The live schema introspector.
pub struct SchemaIntrospector {
    probe: Arc<dyn SchemaProbe>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    timeout: Duration,
    enabled: bool,
}

impl SchemaIntrospector {
    pub fn new(probe: Arc<dyn SchemaProbe>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            probe,
            cache: RwLock::new(HashMap::new()),
            ttl,
            timeout,
            enabled: true,
        }
    }

    /// Build an introspector from the configuration section. When the
    /// section disables introspection, every `introspect` call reports
    /// `SchemaUnavailable::Disabled` without touching the probe.
    pub fn from_config(probe: Arc<dyn SchemaProbe>, config: &IntrospectionConfig) -> Self {
        Self {
            probe,
            cache: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(config.ttl_secs),
            timeout: Duration::from_millis(config.timeout_ms),
            enabled: config.enabled,
        }
    }

    /// Fetch live metadata for a table, from cache when fresh.
    ///
    /// A probe exceeding the configured timeout is reported as
    /// `SchemaUnavailable::Timeout`; the caller treats both identically.
    pub async fn introspect(&self, table: &str) -> Result<IntrospectionResult, SchemaUnavailable> {
        if !self.enabled {
            debug!(table, "introspection disabled by configuration");
            return Err(SchemaUnavailable::Disabled);
        }
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(table) {
                if entry.fetched.elapsed() < self.ttl {
                    debug!(table, "introspection cache hit");
                    return Ok(entry.result.clone());
                }
            }
        }

        let result = match tokio::time::timeout(self.timeout, self.probe.probe(table)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(table, error = %e, "schema probe failed");
                return Err(e);
            }
            Err(_) => {
                warn!(table, timeout_ms = self.timeout.as_millis() as u64, "schema probe timed out");
                return Err(SchemaUnavailable::Timeout {
                    table: table.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        debug!(table, columns = result.columns.len(), "introspection fetched");
        self.cache.write().await.insert(
            table.to_string(),
            CacheEntry {
                result: result.clone(),
                fetched: Instant::now(),
            },
        );
        Ok(result)
    }

    /// Drop one table's cache entry; the next request re-probes.
    pub async fn invalidate(&self, table: &str) {
        if self.cache.write().await.remove(table).is_some() {
            debug!(table, "introspection cache invalidated");
        }
    }

    /// Drop every cache entry (schema-change signal).
    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
        debug!("introspection cache cleared");
    }

    /// Number of cached tables, fresh or stale.
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
