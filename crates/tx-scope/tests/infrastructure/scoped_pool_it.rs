// crates/tx-scope/tests/infrastructure/scoped_pool_it.rs

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tx_scope::domain::transaction::{IsolationLevel, Transaction, TransactionOptions, TransactionState};
use tx_scope::errors::TxError;
use tx_scope::infrastructure::concurrency::ContextStore;
use tx_scope::infrastructure::postgres::mappers::SqlxErrorExt;
use tx_scope::infrastructure::postgres::transactions::PostgresTransaction;
use tx_scope::infrastructure::postgres::ScopedPool;
use tx_scope::infrastructure::{with_retry, RetryConfig};
use crate::common::{count_accounts, setup_postgres_test_db};

#[derive(Debug, PartialEq)]
enum UseCaseError {
    Boom,
    Tx(TxError),
}

impl From<TxError> for UseCaseError {
    fn from(err: TxError) -> Self {
        Self::Tx(err)
    }
}

async fn insert(db: &ScopedPool, name: &str) -> Result<(), TxError> {
    db.execute(sqlx::query("INSERT INTO accounts (name) VALUES ($1)").bind(name.to_string()))
        .await?;
    Ok(())
}

async fn count_in_scope(db: &ScopedPool) -> Result<i64, TxError> {
    db.fetch_scalar(sqlx::query_scalar("SELECT COUNT(*) FROM accounts")).await
}

#[tokio::test]
async fn test_commit_persists_row() {
    let db = setup_postgres_test_db().await;

    db.scoped
        .run_in_transaction(|| async {
            insert(&db.scoped, "alice").await?;
            Ok::<_, UseCaseError>(())
        })
        .await
        .unwrap();

    assert_eq!(count_accounts(&db.pool).await, 1);
}

#[tokio::test]
async fn test_failure_rolls_back_row() {
    let db = setup_postgres_test_db().await;

    let result = db
        .scoped
        .run_in_transaction(|| async {
            insert(&db.scoped, "alice").await?;
            Err::<(), _>(UseCaseError::Boom)
        })
        .await;

    assert_eq!(result, Err(UseCaseError::Boom));
    assert_eq!(count_accounts(&db.pool).await, 0);
}

#[tokio::test]
async fn test_concurrent_failures_roll_back_independently() {
    let db = setup_postgres_test_db().await;

    let unit_of_work = |name: &'static str| {
        let scoped = db.scoped.clone();
        async move {
            scoped
                .run_in_transaction(|| async {
                    insert(&scoped, name).await?;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err::<(), _>(UseCaseError::Boom)
                })
                .await
        }
    };

    let (a, b) = tokio::join!(unit_of_work("alice"), unit_of_work("bob"));

    assert_eq!(a, Err(UseCaseError::Boom));
    assert_eq!(b, Err(UseCaseError::Boom));
    assert_eq!(count_accounts(&db.pool).await, 0);
}

#[tokio::test]
async fn test_concurrent_units_commit_their_own_rows() {
    let db = setup_postgres_test_db().await;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let scoped = db.scoped.clone();
            tokio::spawn(async move {
                scoped
                    .run_in_transaction(|| async {
                        insert(&scoped, &format!("user-{i}")).await?;
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        if i % 2 == 0 {
                            Ok(())
                        } else {
                            Err(UseCaseError::Boom)
                        }
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.await.unwrap();
    }

    assert_eq!(count_accounts(&db.pool).await, 2);
}

#[tokio::test]
async fn test_isolation_level_is_applied() {
    let db = setup_postgres_test_db().await;

    let level: String = db
        .scoped
        .run_in_transaction_with(TransactionOptions::serializable(), || async {
            db.scoped
                .fetch_scalar(sqlx::query_scalar("SELECT current_setting('transaction_isolation')"))
                .await
        })
        .await
        .unwrap();

    assert_eq!(level, IsolationLevel::Serializable.to_string());
}

#[tokio::test]
async fn test_read_only_rejects_writes() {
    let db = setup_postgres_test_db().await;

    let err = db
        .scoped
        .run_in_transaction_with(TransactionOptions::new().read_only(), || async {
            insert(&db.scoped, "alice").await
        })
        .await
        .unwrap_err();

    // 25006 : read_only_sql_transaction
    assert!(matches!(err, TxError::Database { code: Some(ref code), .. } if code == "25006"));
    assert_eq!(count_accounts(&db.pool).await, 0);
}

#[tokio::test]
async fn test_uncommitted_writes_visible_only_inside_unit_of_work() {
    let db = setup_postgres_test_db().await;

    db.scoped
        .run_in_transaction(|| async {
            insert(&db.scoped, "alice").await?;
            assert_eq!(count_in_scope(&db.scoped).await?, 1);

            // Tâche sans contexte propagé : autocommit sur le pool
            let outside = db.scoped.clone();
            let seen_outside = tokio::spawn(async move { count_in_scope(&outside).await })
                .await
                .unwrap()?;
            assert_eq!(seen_outside, 0);

            // Tâche avec contexte propagé : même transaction
            let inside = db.scoped.clone();
            let seen_inside = ContextStore::spawn_scoped(async move { count_in_scope(&inside).await })
                .await
                .unwrap()?;
            assert_eq!(seen_inside, 1);

            Ok::<_, UseCaseError>(())
        })
        .await
        .unwrap();

    assert_eq!(count_accounts(&db.pool).await, 1);
}

#[tokio::test]
async fn test_nested_unit_of_work_reuses_outer_transaction() {
    let db = setup_postgres_test_db().await;

    let result = db
        .scoped
        .run_in_transaction(|| async {
            insert(&db.scoped, "outer").await?;
            let outer_id = db.scoped.get_transaction().map(|tx| tx.id());

            db.scoped
                .run_in_transaction(|| async {
                    assert_eq!(db.scoped.get_transaction().map(|tx| tx.id()), outer_id);
                    insert(&db.scoped, "inner").await?;
                    Ok::<_, UseCaseError>(())
                })
                .await?;

            // L'unité interne n'a rien committé
            assert_eq!(count_accounts(&db.pool).await, 0);
            Err::<(), _>(UseCaseError::Boom)
        })
        .await;

    assert_eq!(result, Err(UseCaseError::Boom));
    assert_eq!(count_accounts(&db.pool).await, 0);
}

#[tokio::test]
async fn test_with_connection_uses_transaction_connection() {
    let db = setup_postgres_test_db().await;

    let result = db
        .scoped
        .run_in_transaction(|| async {
            db.scoped
                .with_connection(|conn| {
                    Box::pin(async move {
                        sqlx::query("INSERT INTO accounts (name) VALUES ('raw')")
                            .execute(&mut *conn)
                            .await
                            .map_tx_err("Insert")?;
                        Ok(())
                    })
                })
                .await?;
            assert_eq!(count_in_scope(&db.scoped).await?, 1);
            Err::<(), _>(UseCaseError::Boom)
        })
        .await;

    assert_eq!(result, Err(UseCaseError::Boom));
    assert_eq!(count_accounts(&db.pool).await, 0);
}

#[tokio::test]
async fn test_outside_unit_of_work_autocommits() {
    let db = setup_postgres_test_db().await;

    db.scoped.execute_raw("INSERT INTO accounts (name) VALUES ('a'); INSERT INTO accounts (name) VALUES ('b');")
        .await
        .unwrap();

    assert!(db.scoped.get_transaction().is_none());
    assert_eq!(count_accounts(&db.pool).await, 2);

    let names: Vec<(String,)> = db
        .scoped
        .fetch_all_as(sqlx::query_as("SELECT name FROM accounts ORDER BY name"))
        .await
        .unwrap();
    assert_eq!(names, vec![("a".to_string(),), ("b".to_string(),)]);
}

#[tokio::test]
async fn test_begin_from_scope_uses_base_pool() {
    let db = setup_postgres_test_db().await;

    db.scoped
        .run_in_transaction(|| async {
            insert(&db.scoped, "scoped").await?;

            // Transaction indépendante ouverte explicitement : ne voit pas l'écriture en cours
            let side = db.scoped.begin(&TransactionOptions::default()).await?;
            assert_ne!(Some(side.id()), db.scoped.get_transaction().map(|tx| tx.id()));
            side.rollback().await?;

            Ok::<_, UseCaseError>(())
        })
        .await
        .unwrap();

    assert_eq!(count_accounts(&db.pool).await, 1);
}

/// Lecture du compte puis insertion sous SERIALIZABLE : deux unités concurrentes
/// forment une dépendance lecture/écriture, la seconde échoue au COMMIT.
async fn count_then_insert(db: &ScopedPool, name: &str, barrier: Option<Arc<Barrier>>) -> Result<i64, TxError> {
    db.run_in_transaction_with(TransactionOptions::serializable(), || async {
        let seen = count_in_scope(db).await?;
        insert(db, name).await?;
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        Ok::<_, TxError>(seen)
    })
    .await
}

#[tokio::test]
async fn test_serialization_failure_at_commit_is_retryable() {
    let db = setup_postgres_test_db().await;
    let barrier = Arc::new(Barrier::new(2));

    let (a, b) = tokio::join!(
        count_then_insert(&db.scoped, "alice", Some(barrier.clone())),
        count_then_insert(&db.scoped, "bob", Some(barrier.clone())),
    );

    let failures: Vec<TxError> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_retryable(), "unexpected error: {:?}", failures[0]);
    assert_eq!(count_accounts(&db.pool).await, 1);
}

#[tokio::test]
async fn test_with_retry_replays_unit_of_work_after_commit_conflict() {
    let db = setup_postgres_test_db().await;
    let barrier = Arc::new(Barrier::new(2));
    let attempts = Arc::new(AtomicU32::new(0));

    let unit_of_work = |name: &'static str| {
        let scoped = db.scoped.clone();
        let barrier = barrier.clone();
        let attempts = attempts.clone();
        async move {
            with_retry(RetryConfig::default(), || {
                // Seules les deux premières tentatives se synchronisent
                let first_round = attempts.fetch_add(1, Ordering::SeqCst) < 2;
                let barrier = first_round.then(|| barrier.clone());
                let scoped = scoped.clone();
                async move { count_then_insert(&scoped, name, barrier).await }
            })
            .await
        }
    };

    let (a, b) = tokio::join!(unit_of_work("alice"), unit_of_work("bob"));

    assert!(a.is_ok(), "alice: {a:?}");
    assert!(b.is_ok(), "bob: {b:?}");
    assert!(attempts.load(Ordering::SeqCst) >= 3);
    assert_eq!(count_accounts(&db.pool).await, 2);
}

#[tokio::test]
async fn test_dispatch_from_with_connection_callback_fails_instead_of_hanging() {
    let db = setup_postgres_test_db().await;

    // Hors transaction : le callback et l'opération dispatchée ont chacun leur connexion
    let scoped = db.scoped.clone();
    db.scoped
        .with_connection(move |_conn| Box::pin(async move { insert(&scoped, "outside").await }))
        .await
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        db.scoped.run_in_transaction(|| async {
            let tx_id = db.scoped.get_transaction().map(|tx| tx.id());
            let scoped = db.scoped.clone();
            let err = db
                .scoped
                .with_connection(move |_conn| Box::pin(async move { insert(&scoped, "inside").await }))
                .await
                .unwrap_err();
            assert_eq!(Some(err.clone()), tx_id.map(TxError::ConnectionInUse));
            Err::<(), _>(err)
        }),
    )
    .await
    .expect("with_connection must not deadlock");

    assert!(matches!(result, Err(TxError::ConnectionInUse(_))));
    assert_eq!(count_accounts(&db.pool).await, 1);
}

#[tokio::test]
async fn test_abandoned_transaction_refuses_further_operations() {
    let db = setup_postgres_test_db().await;

    let tx = db.scoped.begin(&TransactionOptions::default()).await.unwrap();
    let pg = PostgresTransaction::downcast(tx.as_ref()).unwrap();

    {
        // Une sous-tâche détient la connexion au moment de l'abandon
        let mut guard = pg.lock().await.unwrap();
        let conn = guard.as_mut().unwrap();
        sqlx::query("INSERT INTO accounts (name) VALUES ('ghost')")
            .execute(&mut **conn)
            .await
            .unwrap();

        tx.abandon();
        assert_eq!(tx.state(), TransactionState::RolledBack);
    }

    let err = pg.lock().await.unwrap_err();
    assert!(err.is_already_completed());
    assert!(tx.commit().await.unwrap_err().is_already_completed());

    // Le ROLLBACK planifié par le driver s'exécute au retour de la connexion
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count_accounts(&db.pool).await, 0);
}
