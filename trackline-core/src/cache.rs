//! Authoritative in-memory map from package to last known courier position.
//!
//! An entry existing is what makes a package "live": the coordinator rejects
//! reports for packages without one. Entries expire a fixed TTL after their
//! last [`PositionCache::set`]. Expiry is enforced by a periodic sweep, never
//! on read, so a read just before the sweep can observe an entry that is
//! already past its deadline.

use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

use crate::types::{Coordinate, PackageId};

/// Default sliding TTL for an entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub package_id: PackageId,
    pub position: Coordinate,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    position: Coordinate,
    expires_at: Instant,
}

/// Concurrent position cache. Shared by reference (`Arc`) between every
/// connection task; no external locking is needed.
#[derive(Debug)]
pub struct PositionCache {
    entries: DashMap<PackageId, Slot>,
    ttl: Duration,
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl PositionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or overwrite and restart the entry's TTL.
    pub fn set(&self, package_id: PackageId, position: Coordinate) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(
            package_id,
            Slot {
                position,
                expires_at,
            },
        );
    }

    /// Overwrite an existing entry and restart its TTL. Returns false, and
    /// inserts nothing, when the package is not tracked.
    pub fn refresh_if_present(
        &self,
        package_id: &str,
        position: Coordinate,
    ) -> bool {
        match self.entries.get_mut(package_id) {
            Some(mut slot) => {
                slot.position = position;
                slot.expires_at = Instant::now() + self.ttl;
                true
            }
            None => false,
        }
    }

    /// Last stored position. Reads never extend the TTL.
    pub fn get(&self, package_id: &str) -> Option<Coordinate> {
        self.entries.get(package_id).map(|slot| slot.position)
    }

    pub fn entry(&self, package_id: &str) -> Option<CacheEntry> {
        self.entries.get(package_id).map(|slot| CacheEntry {
            package_id: slot.key().clone(),
            position: slot.position,
            expires_at: slot.expires_at,
        })
    }

    pub fn has(&self, package_id: &str) -> bool {
        self.entries.contains_key(package_id)
    }

    pub fn invalidate(&self, package_id: &str) -> bool {
        self.entries.remove(package_id).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. An empty prefix
    /// removes nothing.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            return 0;
        }
        let before = self.entries.len();
        self.entries
            .retain(|package_id, _| !package_id.as_str().starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose deadline has passed. Returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until the
    /// returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Delay,
            );
            loop {
                interval.tick().await;
                let evicted = cache.purge_expired();
                if evicted > 0 {
                    debug!(
                        evicted,
                        remaining = cache.len(),
                        "expired tracking entries swept"
                    );
                }
            }
        })
    }
}
