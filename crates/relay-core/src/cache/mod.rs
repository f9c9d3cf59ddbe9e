//! Locator-keyed cache of parsed resources.
//!
//! Hits never fetch. Misses fetch through the configured [`Fetcher`], parse,
//! and store the parsed value; failed fetches and failed parses are not
//! cached. Concurrent misses for the same locator are not coalesced: each
//! caller fetches and parses independently and the last insert wins.

mod arc;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::CapabilityError;
use crate::execute::CallContext;
use crate::fetch::Fetcher;

pub use arc::ArcCache;

/// Thread-safe cache of parsed resources with adaptive replacement.
pub struct ResourceCache<V> {
    entries: Mutex<ArcCache<String, V>>,
    fetcher: Arc<dyn Fetcher>,
}

impl<V: Clone> ResourceCache<V> {
    /// Create a cache holding at most `capacity` parsed values (minimum 1).
    pub fn new(capacity: usize, fetcher: Arc<dyn Fetcher>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(ArcCache::new(capacity)),
            fetcher,
        }
    }

    fn entries(&self) -> MutexGuard<'_, ArcCache<String, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value for `locator`, if resident.
    pub fn get(&self, locator: &str) -> Option<V> {
        self.entries().get(&locator.to_string()).cloned()
    }

    /// Return the cached value for `locator`, loading it on a miss.
    ///
    /// The fetch is bounded by `timeout` and by the deadline of `ctx`,
    /// whichever comes first.
    pub fn get_or_load<F>(
        &self,
        locator: &str,
        parse: F,
        ctx: &CallContext,
        timeout: Duration,
    ) -> Result<V, CapabilityError>
    where
        F: FnOnce(&[u8]) -> Result<V, String>,
    {
        if let Some(value) = self.get(locator) {
            return Ok(value);
        }

        tracing::debug!(locator, "resource cache miss");
        ctx.check()?;

        let fetch_ctx = ctx.child_with_timeout(timeout);
        let bytes = match self.fetcher.fetch(locator, &fetch_ctx) {
            Ok(bytes) => bytes,
            Err(_) if ctx.is_done() => return Err(CapabilityError::Cancelled),
            Err(e) => {
                return Err(CapabilityError::Load {
                    locator: locator.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let value = parse(&bytes).map_err(|message| CapabilityError::Parse {
            locator: locator.to_string(),
            message,
        })?;

        self.entries().put(locator.to_string(), value.clone());
        Ok(value)
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.entries().contains(&locator.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
