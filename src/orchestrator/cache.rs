//! Result caches and input fingerprinting
//!
//! Two distinct eviction policies: a capacity-bounded LRU that drops the
//! oldest insertion, and a TTL store whose entries expire after a fixed age.

use crate::models::ScenarioType;
use crate::pipelines::PipelineInput;
use crate::Result;
use chrono::NaiveDate;
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Capacity-bounded cache; reads never refresh an entry's position
pub struct LruStore<V> {
    entries: LruCache<String, V>,
}

impl<V> LruStore<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.peek(key)
    }

    /// Insert, returning the key evicted to make room
    pub fn insert(&mut self, key: String, value: V) -> Option<String> {
        if self.entries.contains(&key) {
            self.entries.put(key, value);
            return None;
        }

        self.entries.push(key, value).map(|(evicted, _)| evicted)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Time-bounded cache; expired entries are invisible and purged on insert
pub struct TtlStore<V> {
    ttl: Duration,
    entries: HashMap<String, (Instant, V)>,
}

impl<V> TtlStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, key: String, value: V) {
        self.purge_expired();
        self.entries.insert(key, (Instant::now(), value));
    }

    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Serialize)]
struct FingerprintSource<'a> {
    pipeline: &'a str,
    scenario_count: usize,
    account_count: usize,
    transaction_count: usize,
    date_range: Option<(NaiveDate, NaiveDate)>,
    scenarios: Vec<(ScenarioType, Option<f64>, BTreeMap<&'a str, f64>)>,
    context: Option<(f64, f64, f64)>,
    constraints: &'a [String],
}

/// Stable SHA-256 key for a pipeline input. Every numeric parameter takes
/// part, since any of them can move effects, validation or feasibility.
pub fn fingerprint<'a>(pipeline: &'a str, input: &'a PipelineInput) -> Result<String> {
    let all_scenarios: Vec<_> = input
        .scenario
        .iter()
        .chain(input.scenarios.iter())
        .flat_map(|s| std::iter::once(s).chain(s.existing_scenarios.iter()))
        .collect();

    let date_range = input
        .transactions
        .iter()
        .map(|t| t.date)
        .fold(None, |range: Option<(NaiveDate, NaiveDate)>, date| match range {
            Some((first, last)) => Some((first.min(date), last.max(date))),
            None => Some((date, date)),
        });

    let source = FingerprintSource {
        pipeline,
        scenario_count: all_scenarios.len(),
        account_count: input.context.as_ref().map_or(0, |c| c.accounts.len()),
        transaction_count: input.transactions.len(),
        date_range,
        scenarios: all_scenarios
            .iter()
            .map(|&s| (s.scenario_type, s.primary_amount(), s.parameters.numeric()))
            .collect(),
        context: input
            .context
            .as_ref()
            .map(|c| (c.current_balance, c.monthly_income, c.monthly_expenses)),
        constraints: &input.constraints,
    };

    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), &source)?;

    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to stream serialization straight into a digest
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinancialContext, Scenario, TransactionRecord};

    #[test]
    fn test_lru_evicts_oldest_insertion() {
        let mut cache = LruStore::new(3);
        for key in ["a", "b", "c"] {
            assert_eq!(cache.insert(key.to_string(), key.len()), None);
        }

        // Reads do not refresh position
        assert!(cache.get("a").is_some());

        assert_eq!(cache.insert("d".to_string(), 1), Some("a".to_string()));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b") && cache.contains("d"));
    }

    #[test]
    fn test_lru_never_exceeds_capacity() {
        let mut cache = LruStore::new(5);
        for i in 0..50 {
            cache.insert(format!("k{}", i), i);
            assert!(cache.len() <= cache.capacity());
        }
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.get("k49"), Some(&49));
        assert_eq!(cache.get("k44"), None);
    }

    #[test]
    fn test_lru_zero_capacity_holds_one() {
        let mut cache = LruStore::new(0);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get("b"), Some(&2));
    }

    #[test]
    fn test_ttl_expiry() {
        let mut cache = TtlStore::new(Duration::from_millis(20));
        cache.insert("k".to_string(), 1);
        assert_eq!(cache.get("k"), Some(&1));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    fn input(amount: f64) -> PipelineInput {
        PipelineInput::for_scenario(
            Scenario::new("s1", "Invest", ScenarioType::Investment).with_param("monthlyContribution", amount),
            FinancialContext::new(1_000.0, 5_000.0, 3_000.0),
        )
    }

    #[test]
    fn test_fingerprint_is_stable_and_selective() {
        let a = fingerprint("scenario_analysis", &input(300.0)).unwrap();
        assert_eq!(a, fingerprint("scenario_analysis", &input(300.0)).unwrap());
        assert_eq!(a.len(), 64);

        assert_ne!(a, fingerprint("scenario_analysis", &input(400.0)).unwrap());
        assert_ne!(a, fingerprint("scenario_optimization", &input(300.0)).unwrap());

        let with_history = input(300.0).with_transactions(vec![TransactionRecord {
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            amount: -42.0,
            description: "Groceries".to_string(),
        }]);
        assert_ne!(a, fingerprint("scenario_analysis", &with_history).unwrap());
    }

    #[test]
    fn test_fingerprint_tracks_secondary_parameters() {
        let job = |current: f64| {
            PipelineInput::for_scenario(
                Scenario::new("job", "New role", ScenarioType::JobChange)
                    .with_param("newSalary", 7_000)
                    .with_param("currentSalary", current),
                FinancialContext::new(1_000.0, 6_000.0, 3_000.0),
            )
        };
        assert_ne!(
            fingerprint("scenario_analysis", &job(6_000.0)).unwrap(),
            fingerprint("scenario_analysis", &job(3_000.0)).unwrap()
        );

        let home = |rent: f64| {
            Scenario::new("home", "Flat", ScenarioType::HomePurchase)
                .with_param("homePrice", 300_000)
                .with_param("currentRent", rent)
        };
        let with_sibling = |rent: f64| {
            PipelineInput::for_scenario(
                Scenario::new("inv", "Index fund", ScenarioType::Investment)
                    .with_param("monthlyContribution", 300)
                    .with_existing(vec![home(rent)]),
                FinancialContext::new(1_000.0, 6_000.0, 3_000.0),
            )
        };
        assert_ne!(
            fingerprint("scenario_analysis", &with_sibling(1_200.0)).unwrap(),
            fingerprint("scenario_analysis", &with_sibling(1_500.0)).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_ignores_names() {
        let mut renamed = input(300.0);
        if let Some(scenario) = renamed.scenario.as_mut() {
            scenario.name = "Different label".to_string();
        }
        assert_eq!(
            fingerprint("scenario_analysis", &input(300.0)).unwrap(),
            fingerprint("scenario_analysis", &renamed).unwrap()
        );
    }
}
