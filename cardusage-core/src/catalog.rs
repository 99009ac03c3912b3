//! Card-name lookup with an explicit, clock-driven cache.

use crate::identity::NUMBER_WIDTH;
use crate::{CardKey, CoreError, MainSets};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fetches the full number -> name listing of one set.
#[async_trait]
pub trait SetFetcher: Send + Sync {
    async fn fetch_set(&self, set: &str) -> Result<HashMap<String, String>, CoreError>;
}

#[async_trait]
pub trait CardCatalog: Send + Sync {
    async fn card_name(&self, key: &CardKey) -> Option<String>;
}

struct CachedSet {
    fetched_at: DateTime<Utc>,
    names: Arc<HashMap<String, String>>,
}

pub struct CachedCatalog<F> {
    fetcher: F,
    main_sets: MainSets,
    clock: Arc<dyn Clock>,
    ttl: Option<Duration>,
    sets: Mutex<HashMap<String, CachedSet>>,
}

impl<F: SetFetcher> CachedCatalog<F> {
    /// Entries never expire unless a TTL is set with [`CachedCatalog::with_ttl`].
    pub fn new(fetcher: F, main_sets: MainSets) -> Self {
        Self {
            fetcher,
            main_sets,
            clock: Arc::new(SystemClock),
            ttl: None,
            sets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn cached(&self, set: &str) -> Option<Arc<HashMap<String, String>>> {
        let now = self.clock.now();
        let sets = self.sets.lock();
        let entry = sets.get(set)?;
        match self.ttl {
            Some(ttl) if now - entry.fetched_at >= ttl => None,
            _ => Some(entry.names.clone()),
        }
    }

    async fn set_names(&self, set: &str) -> Arc<HashMap<String, String>> {
        if let Some(names) = self.cached(set) {
            return names;
        }
        let names: HashMap<String, String> = match self.fetcher.fetch_set(set).await {
            Ok(raw) => {
                debug!(set, cards = raw.len(), "catalog set fetched");
                raw.into_iter()
                    .map(|(num, name)| (format!("{:0>w$}", num.trim(), w = NUMBER_WIDTH), name))
                    .collect()
            }
            Err(e) => {
                // Remember the miss so one bad set does not refetch per card.
                warn!(set, error = %e, "catalog set unavailable");
                HashMap::new()
            }
        };
        let names = Arc::new(names);
        self.sets.lock().insert(
            set.to_string(),
            CachedSet {
                fetched_at: self.clock.now(),
                names: names.clone(),
            },
        );
        names
    }
}

#[async_trait]
impl<F: SetFetcher> CardCatalog for CachedCatalog<F> {
    async fn card_name(&self, key: &CardKey) -> Option<String> {
        if !self.main_sets.contains(key.set()) {
            return None;
        }
        self.set_names(key.set()).await.get(key.number()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SetFetcher for CountingFetcher {
        async fn fetch_set(&self, _set: &str) -> Result<HashMap<String, String>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::Source("offline".into()));
            }
            Ok(HashMap::from([("18".to_string(), "Bail Organa".to_string())]))
        }
    }

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn fetcher(fail: bool) -> CountingFetcher {
        CountingFetcher { calls: AtomicUsize::new(0), fail }
    }

    #[tokio::test]
    async fn caches_per_set_and_pads_numbers() {
        let cat = CachedCatalog::new(fetcher(false), MainSets::default());
        let key = CardKey::normalize("SEC", "18").unwrap();
        assert_eq!(cat.card_name(&key).await.as_deref(), Some("Bail Organa"));
        assert_eq!(cat.card_name(&CardKey::normalize("SEC", "19").unwrap()).await, None);
        assert_eq!(cat.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skips_non_main_sets() {
        let cat = CachedCatalog::new(fetcher(false), MainSets::default());
        assert_eq!(cat.card_name(&CardKey::normalize("P25", "18").unwrap()).await, None);
        assert_eq!(cat.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_fetch_is_cached_until_ttl() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock(Mutex::new(start)));
        let cat = CachedCatalog::new(fetcher(true), MainSets::default())
            .with_clock(clock.clone())
            .with_ttl(Duration::minutes(10));
        let key = CardKey::normalize("SOR", "1").unwrap();

        assert_eq!(cat.card_name(&key).await, None);
        assert_eq!(cat.card_name(&key).await, None);
        assert_eq!(cat.fetcher.calls.load(Ordering::SeqCst), 1);

        *clock.0.lock() = start + Duration::minutes(11);
        assert_eq!(cat.card_name(&key).await, None);
        assert_eq!(cat.fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
