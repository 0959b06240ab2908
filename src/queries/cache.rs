//! Keyed query cache with stale-result protection.
//!
//! Every fetch is started with [`QueryClient::begin`], which hands out a
//! ticket carrying a generation number. A later `begin` for the same key, or
//! an invalidation that matches it, bumps the generation, and the older
//! ticket's result is dropped on [`QueryClient::complete`]. This is how a
//! slow response for an old search term is kept from overwriting a newer one.
//!
//! Entries nobody has touched for `gc_after` are dropped, and the cache never
//! holds more than `max_entries`; the least recently used go first. Both
//! sweeps run when a fetch begins and skip entries that are still loading.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::key::{Invalidation, QueryKey};
use crate::error::DashboardError;

type CachedValue = Arc<dyn Any + Send + Sync>;

/// Idle time after which an entry is collected.
pub const DEFAULT_GC_AFTER_SECS: i64 = 5 * 60;
/// Upper bound on cached keys; each search keystroke is a key of its own.
pub const DEFAULT_MAX_ENTRIES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched.
    Idle,
    Loading,
    Success,
    Error(String),
}

#[derive(Clone)]
struct Entry {
    generation: u64,
    status: QueryStatus,
    data: Option<CachedValue>,
    stale: bool,
    updated_at: Option<DateTime<Utc>>,
    /// Recency tick of the last begin, completion or read.
    used: u64,
    used_at: DateTime<Utc>,
}

impl Entry {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            status: QueryStatus::Idle,
            data: None,
            stale: true,
            updated_at: None,
            used: 0,
            used_at: Utc::now(),
        }
    }

    fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// Proof that a fetch was started; needed to store its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

pub struct QueryClient {
    entries: DashMap<QueryKey, Entry>,
    generation: AtomicU64,
    clock: AtomicU64,
    stale_after: Option<Duration>,
    gc_after: Duration,
    max_entries: usize,
}

impl QueryClient {
    /// Results stay fresh until invalidated.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            stale_after: None,
            gc_after: Duration::seconds(DEFAULT_GC_AFTER_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Override when idle entries are collected and how many keys are kept.
    pub fn with_gc(mut self, gc_after: Duration, max_entries: usize) -> Self {
        self.gc_after = gc_after;
        self.max_entries = max_entries.max(1);
        self
    }

    /// Results also go stale once older than `stale_after`.
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            stale_after: Some(stale_after),
            ..Self::new()
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn touch(&self, entry: &mut Entry) {
        entry.used = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        entry.used_at = Utc::now();
    }

    /// Mark `key` as loading and return the ticket for its result.
    /// Previously cached data stays readable while the fetch runs.
    pub fn begin(&self, key: &QueryKey) -> FetchTicket {
        let generation = self.next_generation();
        {
            let mut entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(generation));
            entry.generation = generation;
            entry.status = QueryStatus::Loading;
            self.touch(&mut entry);
        }
        self.collect_garbage();
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    /// Store a successful result. Returns false when the ticket was superseded.
    pub fn complete<T: Send + Sync + 'static>(&self, ticket: &FetchTicket, value: T) -> bool {
        self.complete_shared(ticket, Arc::new(value))
    }

    fn complete_shared(&self, ticket: &FetchTicket, value: CachedValue) -> bool {
        let Some(mut entry) = self.entries.get_mut(&ticket.key) else {
            return false;
        };
        if entry.generation != ticket.generation {
            log::debug!("Discarding superseded result for {}", ticket.key);
            return false;
        }
        entry.status = QueryStatus::Success;
        entry.data = Some(value);
        entry.stale = false;
        entry.updated_at = Some(Utc::now());
        self.touch(&mut entry);
        true
    }

    /// Record a failed fetch. Prior data is kept. Returns false when the
    /// ticket was superseded.
    pub fn fail(&self, ticket: &FetchTicket, error: &DashboardError) -> bool {
        let Some(mut entry) = self.entries.get_mut(&ticket.key) else {
            return false;
        };
        if entry.generation != ticket.generation {
            return false;
        }
        log::warn!("Query {} failed: {}", ticket.key, error);
        entry.status = QueryStatus::Error(error.to_string());
        true
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.entries
            .get(key)
            .map(|e| e.status.clone())
            .unwrap_or(QueryStatus::Idle)
    }

    /// Cached data for `key`, if any and of type `T`. Stale data is still
    /// returned; use [`QueryClient::is_fresh`] to decide on a refetch.
    pub fn data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let mut entry = self.entries.get_mut(key)?;
        let value = entry.data.clone()?;
        self.touch(&mut entry);
        value.downcast::<T>().ok()
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        if entry.stale || entry.status != QueryStatus::Success {
            return false;
        }
        match (self.stale_after, entry.updated_at) {
            (Some(limit), Some(at)) => Utc::now() - at < limit,
            _ => true,
        }
    }

    /// Mark every matching entry stale and cancel its in-flight fetch.
    /// Returns the keys that were invalidated.
    pub fn invalidate(&self, invalidation: &Invalidation) -> Vec<QueryKey> {
        let mut keys = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if invalidation.matches(entry.key()) {
                let generation = self.next_generation();
                let value = entry.value_mut();
                value.stale = true;
                value.generation = generation;
                if value.status == QueryStatus::Loading {
                    value.status = if value.data.is_some() {
                        QueryStatus::Success
                    } else {
                        QueryStatus::Idle
                    };
                }
                keys.push(entry.key().clone());
            }
        }
        if !keys.is_empty() {
            log::debug!("Invalidated {} cached queries", keys.len());
        }
        keys
    }

    pub fn invalidate_all(&self, invalidations: &[Invalidation]) -> Vec<QueryKey> {
        invalidations
            .iter()
            .flat_map(|inv| self.invalidate(inv))
            .collect()
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop idle entries, then the least recently used ones beyond
    /// `max_entries`. Loading entries are kept so their tickets stay valid.
    /// Returns how many entries were removed.
    pub fn collect_garbage(&self) -> usize {
        let before = self.entries.len();
        let cutoff = Utc::now() - self.gc_after;
        self.entries
            .retain(|_, entry| entry.is_loading() || entry.used_at > cutoff);

        if self.entries.len() > self.max_entries {
            let mut idle: Vec<(u64, QueryKey)> = self
                .entries
                .iter()
                .filter(|e| !e.is_loading())
                .map(|e| (e.used, e.key().clone()))
                .collect();
            idle.sort_by_key(|(used, _)| *used);
            let excess = self.entries.len() - self.max_entries;
            for (_, key) in idle.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            log::debug!("Collected {} idle cached queries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return fresh cached data or run `fetch` and cache its result.
    ///
    /// A result whose ticket was superseded while awaiting is still returned
    /// to this caller but is not cached.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<Arc<T>, DashboardError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DashboardError>>,
    {
        if self.is_fresh(key) {
            if let Some(data) = self.data::<T>(key) {
                return Ok(data);
            }
        }

        let ticket = self.begin(key);
        match fetch().await {
            Ok(value) => {
                let value = Arc::new(value);
                self.complete_shared(&ticket, value.clone());
                Ok(value)
            }
            Err(e) => {
                self.fail(&ticket, &e);
                Err(e)
            }
        }
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LeadFilters;

    fn leads_key(search: &str) -> QueryKey {
        QueryKey::Leads(LeadFilters {
            search: search.to_string(),
            ..LeadFilters::default()
        })
    }

    #[test]
    fn completed_fetch_is_readable() {
        let client = QueryClient::new();
        let key = leads_key("acme");
        assert_eq!(client.status(&key), QueryStatus::Idle);

        let ticket = client.begin(&key);
        assert_eq!(client.status(&key), QueryStatus::Loading);
        assert!(client.complete(&ticket, vec![1u32, 2, 3]));

        assert_eq!(client.status(&key), QueryStatus::Success);
        assert_eq!(*client.data::<Vec<u32>>(&key).unwrap(), vec![1, 2, 3]);
        assert!(client.is_fresh(&key));
        assert!(client.data::<String>(&key).is_none());
    }

    #[test]
    fn newer_begin_supersedes_older_ticket() {
        let client = QueryClient::new();
        let key = leads_key("a");
        let first = client.begin(&key);
        let second = client.begin(&key);

        assert!(client.complete(&second, "new".to_string()));
        assert!(!client.complete(&first, "old".to_string()));
        assert_eq!(client.data::<String>(&key).unwrap().as_str(), "new");
    }

    #[test]
    fn invalidation_rejects_in_flight_result() {
        let client = QueryClient::new();
        let key = leads_key("");
        let ticket = client.begin(&key);

        let invalidated = client.invalidate(&Invalidation::Root("leads"));
        assert_eq!(invalidated, vec![key.clone()]);
        assert!(!client.complete(&ticket, 1u8));
        assert!(client.data::<u8>(&key).is_none());
    }

    #[test]
    fn root_invalidation_leaves_other_roots_fresh() {
        let client = QueryClient::new();
        let list_a = leads_key("a");
        let list_b = leads_key("b");
        let detail = QueryKey::Lead(Some("L1".into()));
        for key in [&list_a, &list_b, &detail] {
            let t = client.begin(key);
            client.complete(&t, 0u8);
        }

        let mut keys = client.invalidate(&Invalidation::Root("leads"));
        keys.sort_by_key(|k| k.to_string());
        assert_eq!(keys.len(), 2);
        assert!(!client.is_fresh(&list_a));
        assert!(!client.is_fresh(&list_b));
        assert!(client.is_fresh(&detail));
        // stale data remains readable until refetched
        assert!(client.data::<u8>(&list_a).is_some());
    }

    #[test]
    fn failure_keeps_previous_data() {
        let client = QueryClient::new();
        let key = QueryKey::DashboardStats;
        let t = client.begin(&key);
        client.complete(&t, 7u32);

        let t = client.begin(&key);
        assert!(client.fail(&t, &DashboardError::Network("offline".into())));
        assert_eq!(
            client.status(&key),
            QueryStatus::Error("Network error: offline".into())
        );
        assert_eq!(*client.data::<u32>(&key).unwrap(), 7);
    }

    #[test]
    fn zero_stale_window_is_never_fresh() {
        let client = QueryClient::with_stale_after(Duration::zero());
        let key = QueryKey::CampaignsForFilter;
        let t = client.begin(&key);
        client.complete(&t, ());
        assert!(!client.is_fresh(&key));
    }

    #[test]
    fn idle_entries_are_collected_on_begin() {
        let client = QueryClient::new().with_gc(Duration::zero(), 100);
        for search in ["a", "ac", "acm"] {
            let t = client.begin(&leads_key(search));
            client.complete(&t, 0u8);
        }
        assert_eq!(client.len(), 1);

        // an in-flight fetch survives the sweep
        let pending = client.begin(&leads_key("acme"));
        let t = client.begin(&QueryKey::DashboardStats);
        assert!(client.complete(&pending, 1u8));
        assert!(client.complete(&t, 2u8));
        assert_eq!(client.len(), 2);
    }

    #[test]
    fn least_recently_used_entries_go_past_the_cap() {
        let client = QueryClient::new().with_gc(Duration::hours(1), 3);
        let typed: Vec<QueryKey> = ["a", "ac", "acm", "acme", "acme "]
            .iter()
            .map(|s| leads_key(s))
            .collect();
        for (i, key) in typed.iter().enumerate() {
            let t = client.begin(key);
            client.complete(&t, i);
            if i == 2 {
                // reading "a" makes it more recent than "ac" and "acm"
                assert!(client.data::<usize>(&typed[0]).is_some());
            }
        }

        assert_eq!(client.len(), 3);
        assert!(client.data::<usize>(&typed[1]).is_none());
        assert!(client.data::<usize>(&typed[2]).is_none());
        assert_eq!(client.data::<usize>(&typed[0]).as_deref(), Some(&0));
        assert_eq!(client.data::<usize>(&typed[4]).as_deref(), Some(&4));
    }

    #[tokio::test]
    async fn fetch_uses_cache_until_invalidated() {
        let client = QueryClient::new();
        let key = QueryKey::Campaign("c1".into());
        let calls = AtomicU64::new(0);

        for _ in 0..2 {
            let v = client
                .fetch(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DashboardError>("campaign".to_string())
                })
                .await
                .unwrap();
            assert_eq!(v.as_str(), "campaign");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        client.invalidate(&Invalidation::Exact(key.clone()));
        client
            .fetch(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, DashboardError>("campaign".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_error_is_recorded() {
        let client = QueryClient::new();
        let key = QueryKey::DashboardStats;
        let err = client
            .fetch::<u8, _, _>(&key, || async { Err(DashboardError::RateLimited) })
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::RateLimited));
        assert!(matches!(client.status(&key), QueryStatus::Error(_)));
    }
}
