//! In-memory authoritative ledger with write-through persistence.

use chrono::NaiveDate;
use log::{debug, error, warn};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::storage::{get_json, set_json, KeyValueStore, LEDGER_SNAPSHOT_KEY};

use super::ledger_model::{LedgerRecord, LedgerSnapshot, Transaction};

/// What kind of write produced a ledger change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChangeKind {
    Added { entity: &'static str, id: String },
    Updated { entity: &'static str, id: String },
    Deleted { entity: &'static str, id: String },
    RecurringPosted { count: usize },
    Replaced,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerChange {
    pub revision: u64,
    pub kind: LedgerChangeKind,
}

/// Receives a callback after every committed ledger mutation.
///
/// Called synchronously on the mutating thread, after the snapshot was persisted.
/// Implementations must not call back into the store's mutating methods.
pub trait LedgerObserver: Send + Sync {
    fn on_ledger_changed(&self, change: &LedgerChange);
}

#[derive(Debug, Default)]
struct LedgerState {
    snapshot: LedgerSnapshot,
    revision: u64,
}

pub struct LedgerStore {
    state: RwLock<LedgerState>,
    cache: Arc<dyn KeyValueStore>,
    persisted_revision: Mutex<u64>,
    observers: RwLock<Vec<Arc<dyn LedgerObserver>>>,
}

impl LedgerStore {
    /// Empty ledger backed by `cache`.
    pub fn new(cache: Arc<dyn KeyValueStore>) -> Self {
        Self::with_snapshot(cache, LedgerSnapshot::default())
    }

    fn with_snapshot(cache: Arc<dyn KeyValueStore>, snapshot: LedgerSnapshot) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                snapshot,
                revision: 0,
            }),
            cache,
            persisted_revision: Mutex::new(0),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Load the ledger persisted in `cache`. A corrupt entry is logged and replaced by an
    /// empty ledger on the next write.
    pub fn load(cache: Arc<dyn KeyValueStore>) -> Result<Self> {
        let snapshot = match get_json::<LedgerSnapshot>(cache.as_ref(), LEDGER_SNAPSHOT_KEY) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => LedgerSnapshot::default(),
            Err(Error::Serialization(err)) => {
                warn!("[Ledger] Stored snapshot is unreadable, starting empty: {}", err);
                LedgerSnapshot::default()
            }
            Err(err) => return Err(err),
        };
        debug!(
            "[Ledger] Loaded snapshot: {} transactions, {} wallets",
            snapshot.transactions.len(),
            snapshot.wallets.len()
        );
        Ok(Self::with_snapshot(cache, snapshot))
    }

    pub fn add_observer(&self, observer: Arc<dyn LedgerObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state
            .read()
            .map(|state| state.snapshot.clone())
            .unwrap_or_default()
    }

    /// Monotonic counter bumped by every committed mutation.
    pub fn revision(&self) -> u64 {
        self.state.read().map(|state| state.revision).unwrap_or(0)
    }

    pub fn read<R>(&self, f: impl FnOnce(&LedgerSnapshot) -> R) -> Result<R> {
        let state = self
            .state
            .read()
            .map_err(|_| Error::storage("ledger lock poisoned"))?;
        Ok(f(&state.snapshot))
    }

    pub fn get<T: LedgerRecord>(&self, id: &str) -> Option<T> {
        self.read(|snapshot| {
            T::collection(snapshot)
                .iter()
                .find(|record| record.id() == id)
                .cloned()
        })
        .ok()
        .flatten()
    }

    /// Insert a record. An empty id is replaced by a fresh UUID; the stored record is returned.
    pub fn add<T: LedgerRecord>(&self, mut record: T) -> Result<T> {
        if record.id().trim().is_empty() {
            record.set_id(Uuid::new_v4().to_string());
        }
        let id = record.id().to_string();
        let stored = record.clone();
        self.commit(
            LedgerChangeKind::Added {
                entity: T::ENTITY,
                id: id.clone(),
            },
            move |snapshot| {
                let collection = T::collection_mut(snapshot);
                if collection.iter().any(|existing| existing.id() == id) {
                    return Err(Error::invalid_input(format!(
                        "{} '{}' already exists",
                        T::ENTITY,
                        id
                    )));
                }
                collection.push(record);
                Ok(())
            },
        )?;
        Ok(stored)
    }

    pub fn update<T: LedgerRecord>(&self, record: T) -> Result<()> {
        let id = record.id().to_string();
        self.commit(
            LedgerChangeKind::Updated {
                entity: T::ENTITY,
                id: id.clone(),
            },
            move |snapshot| {
                let slot = T::collection_mut(snapshot)
                    .iter_mut()
                    .find(|existing| existing.id() == id)
                    .ok_or_else(|| Error::not_found(T::ENTITY, id.clone()))?;
                *slot = record;
                Ok(())
            },
        )
    }

    pub fn delete<T: LedgerRecord>(&self, id: &str) -> Result<T> {
        let id = id.to_string();
        self.commit(
            LedgerChangeKind::Deleted {
                entity: T::ENTITY,
                id: id.clone(),
            },
            move |snapshot| {
                let collection = T::collection_mut(snapshot);
                let index = collection
                    .iter()
                    .position(|existing| existing.id() == id)
                    .ok_or_else(|| Error::not_found(T::ENTITY, id.clone()))?;
                Ok(collection.remove(index))
            },
        )
    }

    /// Overwrite the whole ledger, e.g. with a pulled remote snapshot.
    pub fn replace_snapshot(&self, snapshot: LedgerSnapshot) -> Result<()> {
        self.commit(LedgerChangeKind::Replaced, move |current| {
            *current = snapshot;
            Ok(())
        })
    }

    pub fn clear_all(&self) -> Result<()> {
        self.commit(LedgerChangeKind::Cleared, |current| {
            *current = LedgerSnapshot::default();
            Ok(())
        })
    }

    /// Post every active recurring rule due on or before `today` as a transaction and
    /// advance its `next_due`. Rules that fell behind are caught up one occurrence at a time.
    pub fn materialize_due_recurring(&self, today: NaiveDate) -> Result<Vec<Transaction>> {
        let due = self.read(|snapshot| {
            snapshot
                .recurring
                .iter()
                .any(|rule| rule.active && rule.next_due <= today)
        })?;
        if !due {
            return Ok(Vec::new());
        }

        let mut posted = Vec::new();
        let count = self.commit_counted(|snapshot| {
            let mut created = Vec::new();
            for rule in snapshot.recurring.iter_mut().filter(|rule| rule.active) {
                while rule.next_due <= today {
                    created.push(Transaction {
                        id: Uuid::new_v4().to_string(),
                        date: rule.next_due,
                        description: rule.description.clone(),
                        amount: rule.amount,
                        kind: rule.kind,
                        category_id: rule.category_id.clone(),
                        wallet_id: rule.wallet_id.clone(),
                        member_id: None,
                        notes: Some(format!("recurring:{}", rule.id)),
                    });
                    let next = rule.frequency.advance(rule.next_due);
                    if next <= rule.next_due {
                        break;
                    }
                    rule.next_due = next;
                }
            }
            snapshot.transactions.extend(created.iter().cloned());
            posted = created;
            Ok(posted.len())
        })?;
        debug!("[Ledger] Posted {} recurring transactions", count);
        Ok(posted)
    }

    fn commit_counted(
        &self,
        f: impl FnOnce(&mut LedgerSnapshot) -> Result<usize>,
    ) -> Result<usize> {
        let (count, snapshot, revision) = {
            let mut state = self
                .state
                .write()
                .map_err(|_| Error::storage("ledger lock poisoned"))?;
            let count = f(&mut state.snapshot)?;
            state.revision += 1;
            (count, state.snapshot.clone(), state.revision)
        };
        self.persist(&snapshot, revision);
        self.notify(&LedgerChange {
            revision,
            kind: LedgerChangeKind::RecurringPosted { count },
        });
        Ok(count)
    }

    fn commit<R>(
        &self,
        kind: LedgerChangeKind,
        f: impl FnOnce(&mut LedgerSnapshot) -> Result<R>,
    ) -> Result<R> {
        let (result, snapshot, revision) = {
            let mut state = self
                .state
                .write()
                .map_err(|_| Error::storage("ledger lock poisoned"))?;
            let result = f(&mut state.snapshot)?;
            state.revision += 1;
            (result, state.snapshot.clone(), state.revision)
        };
        self.persist(&snapshot, revision);
        self.notify(&LedgerChange { revision, kind });
        Ok(result)
    }

    /// Write-through to the durable cache. Failures are logged; the in-memory ledger keeps serving.
    fn persist(&self, snapshot: &LedgerSnapshot, revision: u64) {
        let Ok(mut persisted) = self.persisted_revision.lock() else {
            error!("[Ledger] Persist lock poisoned, skipping cache write");
            return;
        };
        if revision <= *persisted {
            return;
        }
        match set_json(self.cache.as_ref(), LEDGER_SNAPSHOT_KEY, snapshot) {
            Ok(()) => *persisted = revision,
            Err(err) => error!("[Ledger] Failed to persist snapshot rev {}: {}", revision, err),
        }
    }

    fn notify(&self, change: &LedgerChange) {
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => return,
        };
        for observer in observers {
            observer.on_ledger_changed(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Frequency, Goal, RecurringRule, TransactionKind, Wallet};
    use crate::storage::MemoryKeyValueStore;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver(AtomicUsize);

    impl LedgerObserver for CountingObserver {
        fn on_ledger_changed(&self, _change: &LedgerChange) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::storage("disk full"))
        }
        fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::storage("disk full"))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn wallet(name: &str) -> Wallet {
        Wallet {
            id: String::new(),
            name: name.to_string(),
            opening_balance: dec!(0),
        }
    }

    #[test]
    fn mutations_persist_and_notify() {
        let cache = Arc::new(MemoryKeyValueStore::new());
        let store = LedgerStore::new(cache.clone());
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        store.add_observer(observer.clone());

        let added = store.add(wallet("Checking")).unwrap();
        assert!(!added.id.is_empty());

        let mut renamed = added.clone();
        renamed.name = "Joint checking".to_string();
        store.update(renamed).unwrap();

        assert_eq!(store.revision(), 2);
        assert_eq!(observer.0.load(Ordering::SeqCst), 2);

        let reloaded = LedgerStore::load(cache).unwrap();
        let stored: Wallet = reloaded.get(&added.id).expect("wallet persisted");
        assert_eq!(stored.name, "Joint checking");
    }

    #[test]
    fn update_and_delete_of_unknown_id_fail_without_notifying() {
        let store = LedgerStore::new(Arc::new(MemoryKeyValueStore::new()));
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        store.add_observer(observer.clone());

        let err = store.delete::<Goal>("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "goal", .. }));
        assert_eq!(store.revision(), 0);
        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = LedgerStore::new(Arc::new(MemoryKeyValueStore::new()));
        let first = store.add(wallet("Cash")).unwrap();
        let mut dup = wallet("Cash again");
        dup.id = first.id.clone();
        assert!(matches!(store.add(dup), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn cache_failure_does_not_block_in_memory_ledger() {
        let store = LedgerStore::new(Arc::new(BrokenStore));
        let added = store.add(wallet("Savings")).unwrap();
        assert_eq!(store.get::<Wallet>(&added.id).map(|w| w.name), Some("Savings".to_string()));
    }

    #[test]
    fn corrupt_cache_entry_loads_empty_ledger() {
        let cache = Arc::new(MemoryKeyValueStore::new());
        cache.set(LEDGER_SNAPSHOT_KEY, "{not json").unwrap();
        let store = LedgerStore::load(cache).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn due_recurring_rules_are_posted_and_advanced() {
        let store = LedgerStore::new(Arc::new(MemoryKeyValueStore::new()));
        store
            .add(RecurringRule {
                id: "rent".to_string(),
                description: "Rent".to_string(),
                amount: dec!(1200),
                kind: TransactionKind::Expense,
                category_id: Some("housing".to_string()),
                wallet_id: None,
                frequency: Frequency::Monthly,
                next_due: date(2026, 1, 1),
                active: true,
            })
            .unwrap();

        let posted = store.materialize_due_recurring(date(2026, 3, 15)).unwrap();
        assert_eq!(posted.len(), 3);
        assert_eq!(posted[2].date, date(2026, 3, 1));

        let rule: RecurringRule = store.get("rent").unwrap();
        assert_eq!(rule.next_due, date(2026, 4, 1));
        assert_eq!(store.snapshot().transactions.len(), 3);

        assert!(store
            .materialize_due_recurring(date(2026, 3, 20))
            .unwrap()
            .is_empty());
    }
}
