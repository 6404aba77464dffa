//! Integration tests for transactional execution.
//!
//! Tests verify that:
//! - A unit of work commits all of its statements together
//! - A failing unit of work rolls back everything it did
//! - A failing insert batch leaves no rows behind and no ids assigned

use chrono::{DateTime, TimeZone, Utc};
use mini_orm::mapping::FieldType;
use mini_orm::{Database, OrmError, OrmResult, Value, args, impl_record};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: Option<i64>,
    owner: String,
    balance: i64,
    opened_at: DateTime<Utc>,
}

impl_record!(Account {
    id: Option<i64>,
    owner: String,
    balance: i64,
    opened_at: DateTime<Utc>,
});

async fn setup_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("tx.db").display());
    let db = Database::connect_url(&url).await.unwrap();
    db.execute(
        "CREATE TABLE account (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            balance INTEGER NOT NULL CHECK (balance >= 0),
            opened_at TIMESTAMP NOT NULL
        )",
    )
    .await
    .unwrap();
    (db, dir)
}

fn account(owner: &str, balance: i64) -> Account {
    Account {
        id: None,
        owner: owner.to_string(),
        balance,
        opened_at: Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap(),
    }
}

async fn balances(db: &Database) -> Vec<i64> {
    db.read_all::<Account>("ORDER BY id", args![])
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.balance)
        .collect()
}

#[tokio::test]
async fn test_unit_of_work_commits() {
    let (db, _dir) = setup_db().await;

    let mut accounts = vec![account("a", 100), account("b", 0)];
    db.insert(&mut accounts, true).await.unwrap();
    let (from, to) = (accounts[0].id.unwrap(), accounts[1].id.unwrap());

    db.run_in_transaction("transfer", async |tx| -> OrmResult<()> {
        tx.execute(
            "UPDATE account SET balance = balance - ? WHERE id = ?",
            &[Value::Int64(40), Value::Int64(from)],
        )
        .await?;
        tx.execute(
            "UPDATE account SET balance = balance + ? WHERE id = ?",
            &[Value::Int64(40), Value::Int64(to)],
        )
        .await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(balances(&db).await, [60, 40]);
}

#[tokio::test]
async fn test_failing_unit_of_work_rolls_back() {
    let (db, _dir) = setup_db().await;

    let mut accounts = vec![account("a", 100), account("b", 0)];
    db.insert(&mut accounts, true).await.unwrap();
    let (from, to) = (accounts[0].id.unwrap(), accounts[1].id.unwrap());

    // The credit lands first, then the debit violates the CHECK constraint.
    let err = db
        .run_in_transaction("transfer", async |tx| -> OrmResult<()> {
            tx.execute(
                "UPDATE account SET balance = balance + ? WHERE id = ?",
                &[Value::Int64(500), Value::Int64(to)],
            )
            .await?;
            tx.execute(
                "UPDATE account SET balance = balance - ? WHERE id = ?",
                &[Value::Int64(500), Value::Int64(from)],
            )
            .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::Execution { ref operation, .. } if operation == "transfer"));
    assert!(matches!(err.root_cause(), OrmError::Database { .. }));
    assert_eq!(balances(&db).await, [100, 0]);
}

#[tokio::test]
async fn test_unit_of_work_returns_value() {
    let (db, _dir) = setup_db().await;

    let mut accounts = vec![account("a", 5), account("b", 7)];
    db.insert(&mut accounts, true).await.unwrap();

    let rows = db
        .run_in_transaction("sum", async |tx| {
            tx.fetch_all(
                "SELECT SUM(balance) FROM account",
                &[],
                &[FieldType::Int64],
            )
            .await
        })
        .await
        .unwrap();

    assert_eq!(rows, vec![vec![Value::Int64(12)]]);
}

#[tokio::test]
async fn test_failed_batch_insert_leaves_nothing_behind() {
    let (db, _dir) = setup_db().await;

    // The third batch holds a row that violates the CHECK constraint.
    let mut accounts: Vec<Account> = (0..250).map(|i| account(&format!("o{i}"), i)).collect();
    accounts[230].balance = -1;

    let err = db.insert(&mut accounts, true).await.unwrap_err();
    assert!(matches!(err, OrmError::Execution { ref operation, .. } if operation == "insert"));
    assert!(matches!(err.root_cause(), OrmError::Database { .. }));

    assert!(accounts.iter().all(|a| a.id.is_none()));
    assert!(balances(&db).await.is_empty());
}

#[tokio::test]
async fn test_raw_execute_failure_is_wrapped() {
    let (db, _dir) = setup_db().await;

    let err = db.execute("INSERT INTO missing_table VALUES (1)").await.unwrap_err();
    assert!(matches!(err, OrmError::Execution { ref operation, .. } if operation == "execute"));
    assert!(matches!(err.root_cause(), OrmError::Database { .. }));
}
