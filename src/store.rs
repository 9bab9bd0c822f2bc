//! Connection Store: correlation table between captured segments and accepted connections.
//!
//! The table is split into shards selected by hashing the connection identity, so that the
//! capture worker inserting one connection never contends with a request looking up another.
//! Each shard is a bounded [`TtlCache`]; entries expire after the configured TTL and the least
//! recently inserted entry of a full shard is replaced.
use crate::tcp::{ConnectionIdentity, TcpIpRecord};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;
use ttl_cache::TtlCache;

pub const DEFAULT_SHARDS: usize = 16;

type Shard = Mutex<TtlCache<ConnectionIdentity, TcpIpRecord>>;

/// Cloneable handle to a shared connection table.
#[derive(Clone)]
pub struct ConnectionStore {
    shards: Arc<Vec<Shard>>,
    ttl: Duration,
}

impl ConnectionStore {
    /// Creates a store holding at most `capacity` live records, each for at most `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_shards(capacity, ttl, DEFAULT_SHARDS)
    }

    pub fn with_shards(capacity: usize, ttl: Duration, shards: usize) -> Self {
        let capacity = capacity.max(1);
        let shard_count = shards.clamp(1, capacity);
        let per_shard = capacity.div_ceil(shard_count);
        debug!(
            "Connection store: {} shards x {} entries, ttl {:?}",
            shard_count, per_shard, ttl
        );

        let shards = (0..shard_count)
            .map(|_| Mutex::new(TtlCache::new(per_shard)))
            .collect();
        Self { shards: Arc::new(shards), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, identity: &ConnectionIdentity) -> MutexGuard<'_, TtlCache<ConnectionIdentity, TcpIpRecord>> {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        // A panic while holding a shard cannot leave a half-written record behind.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `record` under `identity`, replacing any previous record and restarting its TTL.
    pub fn insert(&self, identity: ConnectionIdentity, record: TcpIpRecord) {
        self.shard(&identity).insert(identity, record, self.ttl);
    }

    /// Returns a copy of the live record for `identity`, if any. Never waits for capture.
    pub fn lookup(&self, identity: &ConnectionIdentity) -> Option<TcpIpRecord> {
        self.shard(identity).get(identity).cloned()
    }

    /// Lookup by client address for a known destination port.
    pub fn lookup_addr(&self, ip: IpAddr, port: u16, dst_port: u16) -> Option<TcpIpRecord> {
        self.lookup(&ConnectionIdentity::new(ip, port, dst_port))
    }

    /// Drops expired records from every shard and returns the number of live records left.
    pub fn evict_expired(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).iter().count())
            .sum()
    }

    /// Copies of all live records, shard by shard.
    pub fn records(&self) -> Vec<TcpIpRecord> {
        self.shards
            .iter()
            .flat_map(|shard| {
                let mut guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
                guard.iter().map(|(_, record)| record.clone()).collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.evict_expired()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStore")
            .field("shards", &self.shards.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
