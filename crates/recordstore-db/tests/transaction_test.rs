//! Integration tests for transactions, atomic units and cancellation.

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use common::TestHarness;
use recordstore_db::models::{Sample, User, Wallet};
use recordstore_db::{values, CancelToken, Changes, Db, Error, Query, TxState};

const ENDLESS_QUERY: &str =
    "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c";

#[test]
fn committed_writes_are_visible() {
    let h = TestHarness::new();
    h.store
        .transaction(|tx| {
            tx.insert(&mut User::new("10", "User 10", ""))?;
            tx.insert(&mut User::new("11", "User 11", ""))?;
            tx.insert(&mut User::new("12", "User 12", ""))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(h.store.count(&Query::<User>::new()).unwrap(), 3);
}

#[test]
fn pool_readers_see_committed_state_while_transaction_is_open() {
    let h = TestHarness::new();
    h.seed_samples();

    let tx = h.store.begin().unwrap();
    tx.insert(&mut Sample::new("9", "Eko")).unwrap();
    assert_eq!(tx.count(&Query::<Sample>::new()).unwrap(), 5);
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 4);
    assert_matches!(
        h.store.find_one(&Query::<Sample>::by_key("9")),
        Err(Error::NotFound { .. })
    );

    tx.commit().unwrap();
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 5);
}

#[test]
fn error_rolls_back_every_write() {
    let h = TestHarness::new();
    let err = h
        .store
        .transaction(|tx| {
            tx.insert(&mut User::new("13", "User 13", ""))?;
            tx.insert(&mut User::new("13", "Duplicate", ""))?;
            Ok(())
        })
        .unwrap_err();
    assert_matches!(err, Error::ConstraintViolation { .. });
    assert_eq!(h.store.count(&Query::<User>::new()).unwrap(), 0);
}

#[test]
fn panic_rolls_back() {
    let h = TestHarness::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        h.store.transaction(|tx| -> recordstore_db::Result<()> {
            tx.insert(&mut Sample::new("1", "Lingga"))?;
            panic!("boom");
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 0);
}

#[test]
fn manual_commit_then_closed() {
    let h = TestHarness::new();
    let tx = h.store.begin().unwrap();
    tx.insert(&mut Sample::new("1", "Lingga")).unwrap();
    tx.commit().unwrap();
    assert_eq!(tx.state(), TxState::Committed);

    // rollback after commit is a no-op, every other call is refused
    tx.rollback().unwrap();
    assert_eq!(tx.state(), TxState::Committed);
    assert_matches!(tx.commit(), Err(Error::TransactionClosed));
    assert_matches!(
        tx.insert(&mut Sample::new("2", "Budi")),
        Err(Error::TransactionClosed)
    );
    drop(tx);

    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 1);
}

#[test]
fn manual_rollback_discards_writes() {
    let h = TestHarness::new();
    let tx = h.store.begin().unwrap();
    tx.insert(&mut Sample::new("1", "Lingga")).unwrap();
    assert_eq!(tx.count(&Query::<Sample>::new()).unwrap(), 1);
    tx.rollback().unwrap();
    tx.rollback().unwrap();
    assert_eq!(tx.state(), TxState::RolledBack);
    assert_matches!(
        tx.find_all(&Query::<Sample>::new()),
        Err(Error::TransactionClosed)
    );
    drop(tx);

    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 0);
}

#[test]
fn dropped_transaction_rolls_back() {
    let h = TestHarness::new();
    {
        let tx = h.store.begin().unwrap();
        tx.insert(&mut Sample::new("1", "Lingga")).unwrap();
    }
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 0);
}

#[test]
fn failed_atomic_unit_leaves_outer_transaction_usable() {
    let h = TestHarness::new();
    h.store
        .transaction(|tx| {
            tx.insert(&mut Sample::new("1", "Lingga"))?;
            let inner = tx.session(|s| {
                s.atomic(|s| {
                    s.insert(&mut Sample::new("2", "Budi"))?;
                    s.insert(&mut Sample::new("1", "Duplicate"))?;
                    Ok(())
                })
            });
            assert!(inner.is_err());
            tx.insert(&mut Sample::new("3", "Joko"))?;
            Ok(())
        })
        .unwrap();

    let ids: Vec<String> = h
        .store
        .find_all(&Query::<Sample>::new().order_by("id"))
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, ["1", "3"]);
}

#[test]
fn lock_rows_for_update_inside_transaction() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 1000, &[]);

    h.store
        .transaction(|tx| {
            let wallet = tx.find_one(&Query::<Wallet>::by_key("W1").for_update())?;
            tx.update(
                &Query::<Wallet>::by_key(&wallet.id),
                &Changes::new().set("balance", wallet.balance + 500),
            )?;
            Ok(())
        })
        .unwrap();

    let wallet = h.store.find_one(&Query::<Wallet>::by_key("W1")).unwrap();
    assert_eq!(wallet.balance, 1500);

    let err = h
        .store
        .find_one(&Query::<Wallet>::by_key("W1").for_update())
        .unwrap_err();
    assert_matches!(err, Error::Invalid(_));
}

#[test]
fn cancelled_token_refuses_new_operations() {
    let h = TestHarness::new();
    let token = CancelToken::new();
    let store = h.store.with_cancel(token.clone());
    store.insert(&mut Sample::new("1", "Lingga")).unwrap();

    token.cancel();
    assert_matches!(store.find_all(&Query::<Sample>::new()), Err(Error::Cancelled));
    assert!(matches!(store.begin(), Err(Error::Cancelled)));
    // the handle without the token is unaffected
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 1);
}

#[test]
fn cancelling_interrupts_a_running_statement() {
    let h = TestHarness::new();
    let token = CancelToken::new();
    let store = h.store.with_cancel(token.clone());

    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        })
    };
    let err = store
        .raw_one(ENDLESS_QUERY, &values![], |row| row.get::<_, i64>(0))
        .unwrap_err();
    canceller.join().unwrap();
    assert_matches!(err, Error::Cancelled);

    // the connection went back to the pool and still works
    assert!(h.store.pool().state().idle_connections >= 1);
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 0);
}

#[test]
fn deadline_interrupts_a_running_statement() {
    let h = TestHarness::new();
    let store = h
        .store
        .with_cancel(CancelToken::with_timeout(Duration::from_millis(50)));
    let err = store
        .raw_one(ENDLESS_QUERY, &values![], |row| row.get::<_, i64>(0))
        .unwrap_err();
    assert_matches!(err, Error::Cancelled);
}

#[test]
fn cancelled_transaction_is_rolled_back() {
    let h = TestHarness::new();
    let token = CancelToken::new();
    let store = h.store.with_cancel(token.clone());

    let err = store
        .transaction(|tx| {
            tx.insert(&mut Sample::new("1", "Lingga"))?;
            token.cancel();
            tx.insert(&mut Sample::new("2", "Budi"))?;
            Ok(())
        })
        .unwrap_err();
    assert_matches!(err, Error::Cancelled);
    assert_eq!(h.store.count(&Query::<Sample>::new()).unwrap(), 0);
}
