use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;

use super::*;
use crate::ledger::{
    decode_snapshot, encode_snapshot, LedgerChange, LedgerObserver, LedgerSnapshot, LedgerStore,
    Transaction, TransactionKind,
};
use crate::storage::MemoryKeyValueStore;

/// Feeds ledger changes into a coordinator the way the engine's observer does.
struct CoordinatorObserver {
    coordinator: Arc<Mutex<SyncCoordinator>>,
    decisions: Mutex<Vec<MutationDecision>>,
}

impl LedgerObserver for CoordinatorObserver {
    fn on_ledger_changed(&self, _change: &LedgerChange) {
        let decision = self.coordinator.lock().unwrap().on_local_mutation();
        self.decisions.lock().unwrap().push(decision);
    }
}

fn groceries(amount: rust_decimal::Decimal) -> Transaction {
    Transaction {
        id: "tx-groceries".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        description: "Groceries".to_string(),
        amount,
        kind: TransactionKind::Expense,
        category_id: Some("cat-food".to_string()),
        wallet_id: Some("wallet-main".to_string()),
        member_id: None,
        notes: None,
    }
}

fn setup() -> (
    Arc<LedgerStore>,
    Arc<Mutex<SyncCoordinator>>,
    Arc<CoordinatorObserver>,
) {
    let ledger = Arc::new(LedgerStore::new(Arc::new(MemoryKeyValueStore::new())));
    let coordinator = Arc::new(Mutex::new(SyncCoordinator::default()));
    coordinator.lock().unwrap().link();
    let observer = Arc::new(CoordinatorObserver {
        coordinator: coordinator.clone(),
        decisions: Mutex::new(Vec::new()),
    });
    ledger.add_observer(observer.clone());
    (ledger, coordinator, observer)
}

#[test]
fn applying_pulled_snapshot_does_not_schedule_push() {
    let (ledger, coordinator, observer) = setup();

    let mut remote = LedgerSnapshot::default();
    remote.transactions.push(groceries(dec!(42.10)));

    let ticket = match coordinator.lock().unwrap().try_begin_pull(ledger.revision()) {
        PullDecision::Begin(ticket) => ticket,
        other => panic!("expected pull to begin, got {other:?}"),
    };
    assert_eq!(
        coordinator
            .lock()
            .unwrap()
            .finish_pull(ticket, ledger.revision()),
        PullVerdict::Apply
    );

    coordinator.lock().unwrap().begin_remote_update();
    ledger.replace_snapshot(remote.clone()).unwrap();
    coordinator.lock().unwrap().end_remote_update();

    assert_eq!(ledger.snapshot(), remote);
    assert_eq!(
        *observer.decisions.lock().unwrap(),
        vec![MutationDecision::SkipRemoteOrigin]
    );
    assert_eq!(coordinator.lock().unwrap().push_state(), PushState::Idle);
}

#[test]
fn local_edit_during_fetch_discards_pulled_data() {
    let (ledger, coordinator, _observer) = setup();

    let ticket = match coordinator.lock().unwrap().try_begin_pull(ledger.revision()) {
        PullDecision::Begin(ticket) => ticket,
        other => panic!("expected pull to begin, got {other:?}"),
    };
    ledger.add(groceries(dec!(10))).unwrap();

    let verdict = coordinator
        .lock()
        .unwrap()
        .finish_pull(ticket, ledger.revision());
    assert_eq!(verdict, PullVerdict::Discard);
    assert_eq!(coordinator.lock().unwrap().status(), SyncStatus::Saving);
}

#[test]
fn encoded_snapshot_decodes_to_equal_ledger() {
    let (ledger, _coordinator, _observer) = setup();
    ledger.add(groceries(dec!(87.45))).unwrap();

    let tables: Vec<_> = encode_snapshot(&ledger.snapshot())
        .into_iter()
        .map(|table| table.rows)
        .collect();
    let decoded = decode_snapshot(&tables).unwrap();

    assert_eq!(decoded, ledger.snapshot());
}

#[test]
fn report_reflects_coordinator_state() {
    let (_ledger, coordinator, _observer) = setup();
    let mut coordinator = coordinator.lock().unwrap();
    coordinator.try_begin_push();
    coordinator.push_succeeded(Utc::now());
    coordinator.end_push();

    let report = coordinator.report();
    assert_eq!(report.status, SyncStatus::Synced);
    assert_eq!(report.link, LinkState::Linked);
    assert_eq!(report.retry_count, 0);
    assert!(report.last_error.is_none());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "synced");
    assert_eq!(json["link"], "linked");
}
