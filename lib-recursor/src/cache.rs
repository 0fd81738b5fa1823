//! The multi-level cache: positive answers, negative answers, and
//! delegations, all keyed by canonical names and expired by deadline.
//!
//! Entries past their deadline are logically absent the moment the
//! clock passes them; the reclaim sweep only gets their memory back.

use dashmap::DashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dns_wire::types::{DomainName, RecordType};

/// Longest any entry is honoured for, whatever TTL the record carried.
pub const TTL_CAP: u32 = 300;

/// How long an NXDOMAIN answer is remembered.  Not derived from the
/// SOA minimum.
pub const NEGATIVE_TTL: u32 = 60;

/// How often the reclaim sweep runs.
pub const RECLAIM_INTERVAL: Duration = Duration::from_secs(300);

type RecordKey = (DomainName, RecordType);

/// The shared cache.  Cloning gives a new handle onto the same
/// underlying maps; all handles may be used concurrently.
///
/// The maps are sharded (`DashMap`), so readers and writers of
/// different keys never contend on one lock, and each entry is read or
/// replaced whole - a `get` cannot observe a partial `put`.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: DashMap<RecordKey, PositiveEntry>,
    delegations: DashMap<DomainName, DelegationEntry>,
    negatives: DashMap<RecordKey, Instant>,
}

#[derive(Debug)]
struct PositiveEntry {
    answer: Vec<String>,
    deadline: Instant,
}

#[derive(Debug)]
struct DelegationEntry {
    nameservers: Vec<Ipv4Addr>,
    deadline: Instant,
}

/// `insertion_time + min(ttl, TTL_CAP)`.  A zero TTL gives a deadline
/// in the past by the time anything reads it.
fn deadline(ttl: u32) -> Instant {
    Instant::now() + Duration::from_secs(u64::from(ttl.min(TTL_CAP)))
}

fn live(deadline: Instant) -> bool {
    Instant::now() < deadline
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer for a question, if a non-expired positive entry
    /// exists.
    pub fn get(&self, name: &DomainName, qtype: RecordType) -> Option<Vec<String>> {
        let entry = self.inner.records.get(&(name.clone(), qtype))?;
        if live(entry.deadline) {
            Some(entry.answer.clone())
        } else {
            None
        }
    }

    /// Store an answer.  Supersedes any negative entry for the same
    /// question.
    pub fn put(&self, name: &DomainName, qtype: RecordType, answer: Vec<String>, ttl: u32) {
        let key = (name.clone(), qtype);
        self.inner.negatives.remove(&key);
        self.inner.records.insert(
            key,
            PositiveEntry {
                answer,
                deadline: deadline(ttl),
            },
        );
    }

    /// Whether a non-expired negative entry exists for a question.
    pub fn is_negative(&self, name: &DomainName, qtype: RecordType) -> bool {
        self.inner
            .negatives
            .get(&(name.clone(), qtype))
            .is_some_and(|entry| live(*entry))
    }

    /// Remember that a question has no answer.  Supersedes any
    /// positive entry for the same question.
    pub fn put_negative(&self, name: &DomainName, qtype: RecordType, ttl: u32) {
        let key = (name.clone(), qtype);
        self.inner.records.remove(&key);
        self.inner.negatives.insert(key, deadline(ttl));
    }

    /// The nameserver addresses delegated for a zone, if a non-expired
    /// entry exists.
    pub fn get_delegation(&self, zone: &DomainName) -> Option<Vec<Ipv4Addr>> {
        let entry = self.inner.delegations.get(zone)?;
        if live(entry.deadline) {
            Some(entry.nameservers.clone())
        } else {
            None
        }
    }

    /// Store the nameserver addresses for a zone.
    pub fn put_delegation(&self, zone: &DomainName, nameservers: Vec<Ipv4Addr>, ttl: u32) {
        self.inner.delegations.insert(
            zone.clone(),
            DelegationEntry {
                nameservers,
                deadline: deadline(ttl),
            },
        );
    }

    /// Drop every entry past its deadline, returning how many were
    /// removed.  Expiry is re-checked entry by entry under the shard
    /// guard, so a fresh entry written for the same key mid-sweep is
    /// never clobbered.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.inner.records.retain(|_, entry| {
            let keep = entry.deadline > now;
            removed += usize::from(!keep);
            keep
        });
        self.inner.delegations.retain(|_, entry| {
            let keep = entry.deadline > now;
            removed += usize::from(!keep);
            keep
        });
        self.inner.negatives.retain(|_, entry_deadline| {
            let keep = *entry_deadline > now;
            removed += usize::from(!keep);
            keep
        });

        removed
    }

    /// Total number of entries across all three maps, expired or not.
    pub fn len(&self) -> usize {
        self.inner.records.len() + self.inner.delegations.len() + self.inner.negatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dns_wire::types::test_util::domain;

    #[test]
    fn cache_put_can_get() {
        let cache = SharedCache::new();
        let answer = vec!["93.184.216.34".to_string()];
        cache.put(&domain("example.com."), RecordType::A, answer.clone(), 60);

        assert_eq!(
            Some(answer),
            cache.get(&domain("example.com."), RecordType::A)
        );
    }

    #[test]
    fn cache_get_distinguishes_types() {
        let cache = SharedCache::new();
        cache.put(
            &domain("example.com."),
            RecordType::A,
            vec!["93.184.216.34".to_string()],
            60,
        );

        assert_eq!(None, cache.get(&domain("example.com."), RecordType::AAAA));
    }

    #[test]
    fn cache_entry_expires_after_ttl() {
        let cache = SharedCache::new();
        cache.put(
            &domain("example.com."),
            RecordType::A,
            vec!["93.184.216.34".to_string()],
            1,
        );

        assert!(cache.get(&domain("example.com."), RecordType::A).is_some());
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(None, cache.get(&domain("example.com."), RecordType::A));
    }

    #[test]
    fn cache_zero_ttl_is_transient() {
        let cache = SharedCache::new();
        cache.put(
            &domain("example.com."),
            RecordType::A,
            vec!["93.184.216.34".to_string()],
            0,
        );

        assert_eq!(None, cache.get(&domain("example.com."), RecordType::A));
    }

    #[test]
    fn negative_supersedes_positive() {
        let cache = SharedCache::new();
        let name = domain("example.com.");
        cache.put(&name, RecordType::A, vec!["93.184.216.34".to_string()], 60);
        cache.put_negative(&name, RecordType::A, 60);

        assert_eq!(None, cache.get(&name, RecordType::A));
        assert!(cache.is_negative(&name, RecordType::A));
    }

    #[test]
    fn positive_supersedes_negative() {
        let cache = SharedCache::new();
        let name = domain("example.com.");
        cache.put_negative(&name, RecordType::A, 60);
        cache.put(&name, RecordType::A, vec!["93.184.216.34".to_string()], 60);

        assert!(!cache.is_negative(&name, RecordType::A));
        assert!(cache.get(&name, RecordType::A).is_some());
    }

    #[test]
    fn negative_entry_is_type_specific() {
        let cache = SharedCache::new();
        cache.put_negative(&domain("example.com."), RecordType::AAAA, 60);

        assert!(!cache.is_negative(&domain("example.com."), RecordType::A));
    }

    #[test]
    fn delegation_roundtrip() {
        let cache = SharedCache::new();
        let nameservers = vec![Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)];
        cache.put_delegation(&domain("com."), nameservers.clone(), 60);

        assert_eq!(Some(nameservers), cache.get_delegation(&domain("com.")));
        assert_eq!(None, cache.get_delegation(&domain("net.")));
    }

    #[test]
    fn remove_expired_keeps_fresh_entries() {
        let cache = SharedCache::new();
        cache.put(
            &domain("stale.example.com."),
            RecordType::A,
            vec!["192.0.2.1".to_string()],
            0,
        );
        cache.put(
            &domain("fresh.example.com."),
            RecordType::A,
            vec!["192.0.2.2".to_string()],
            60,
        );
        cache.put_negative(&domain("gone.example.com."), RecordType::A, 0);
        cache.put_delegation(&domain("com."), vec![Ipv4Addr::new(192, 0, 2, 3)], 60);

        assert_eq!(2, cache.remove_expired());
        assert_eq!(2, cache.len());
        assert!(cache
            .get(&domain("fresh.example.com."), RecordType::A)
            .is_some());
        assert!(cache.get_delegation(&domain("com.")).is_some());
    }

    #[test]
    fn ttl_is_capped() {
        let cache = SharedCache::new();
        cache.put(
            &domain("example.com."),
            RecordType::A,
            vec!["93.184.216.34".to_string()],
            86400,
        );

        // still readable now; the cap only shortens the deadline
        assert!(cache.get(&domain("example.com."), RecordType::A).is_some());
    }
}
