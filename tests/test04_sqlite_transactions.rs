#![cfg(feature = "sqlite")]

mod common;

use common::sqlite_client;
use rds_middleware::prelude::*;

fn user(id: i64, name: &str) -> Row {
    Row::new().with("id", id).with("name", name)
}

#[tokio::test]
async fn committed_scope_is_visible_to_other_connections() -> Result<(), Box<dyn std::error::Error>>
{
    let mut client = sqlite_client("scope_commit").await;
    let inner = client.clone();

    let inserted = client
        .begin_transaction_scope(move |mut tx| async move {
            tx.insert("users", &[user(10, "erin")], None).await?;
            inner
                .begin_transaction_scope(|mut tx| async move {
                    tx.insert("users", &[user(11, "frank")], None).await?;
                    tx.count("users", None).await
                })
                .await
        })
        .await?;

    assert_eq!(inserted, 5);
    assert_eq!(client.count("users", None).await?, 5);
    Ok(())
}

#[tokio::test]
async fn failing_nested_scope_discards_all_writes() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("scope_failure").await;
    let inner = client.clone();

    let err = client
        .begin_transaction_scope(move |mut tx| async move {
            tx.insert("users", &[user(10, "erin")], None).await?;
            inner
                .begin_transaction_scope(|mut tx| async move {
                    // Duplicate primary key.
                    tx.insert("users", &[user(1, "again")], None).await
                })
                .await?;
            Ok::<_, RdsError>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err.root(), RdsError::Sqlite(_)));
    assert!(err.sql().is_some_and(|sql| sql.starts_with("INSERT INTO `users`")));
    assert_eq!(client.count("users", None).await?, 3);
    Ok(())
}

#[tokio::test]
async fn doomed_scope_leaves_no_rows_behind() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("doomed").await;
    let ctx = TransactionContext::new();
    let (client_ref, ctx_ref) = (&client, &ctx);

    let seen = client
        .begin_doomed_transaction_scope_in(
            |mut tx| async move {
                tx.delete("users", None).await?;
                client_ref
                    .begin_transaction_scope_in(
                        |mut tx| async move {
                            tx.insert("users", &[user(20, "gina")], None).await?;
                            tx.count("users", None).await
                        },
                        ctx_ref,
                    )
                    .await
            },
            &ctx,
        )
        .await?;

    assert_eq!(seen, 1);
    assert_eq!(client.count("users", None).await?, 3);
    assert!(
        client
            .get("users", Some(&Where::new().eq("id", 20)), &SelectOptions::new())
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
async fn manual_transaction_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("manual_tx").await;

    let mut tx = client.begin_transaction().await?;
    tx.update("users", &Row::new().with("id", 1).with("name", "changed"), &UpdateOptions::new())
        .await?;
    let inside = tx
        .get("users", Some(&Where::new().eq("id", 1)), &SelectOptions::new())
        .await?
        .expect("row 1");
    assert_eq!(inside.get("name").and_then(SqlValue::as_text), Some("changed"));
    tx.rollback().await?;
    assert!(tx.is_rolled_back());

    let after = client
        .get("users", Some(&Where::new().eq("id", 1)), &SelectOptions::new())
        .await?
        .expect("row 1");
    assert_eq!(after.get("name").and_then(SqlValue::as_text), Some("alice"));
    Ok(())
}

#[tokio::test]
async fn connection_level_transaction_controls() -> Result<(), Box<dyn std::error::Error>> {
    let client = sqlite_client("connection_tx").await;
    let mut conn = client.get_connection().await?;

    conn.begin_transaction().await?;
    conn.delete("users", Some(&Where::new().eq("id", 2))).await?;
    conn.commit().await?;
    assert_eq!(conn.count("users", None).await?, 2);

    conn.begin_transaction().await?;
    conn.delete("users", None).await?;
    conn.rollback().await?;
    assert_eq!(conn.count("users", None).await?, 2);
    conn.release();
    Ok(())
}
