#![cfg(feature = "sqlite")]

mod common;

use common::sqlite_client;
use rds_middleware::prelude::*;

fn text(row: &ResultRow, column: &str) -> Option<String> {
    row.get(column).and_then(SqlValue::as_text).map(str::to_string)
}

#[tokio::test]
async fn select_get_and_count() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("select_get_count").await;

    let all = client
        .select("users", &SelectOptions::new().order(OrderBy::desc("id")))
        .await?;
    assert_eq!(all.len(), 3);
    assert_eq!(text(&all.rows[0], "name").as_deref(), Some("carol"));

    let page = client
        .select(
            "users",
            &SelectOptions::new()
                .columns(["id", "name"])
                .filter(Where::new().op("age", CompareOp::Ge, 25))
                .order(("id", "asc"))
                .limit(1)
                .offset(1),
        )
        .await?;
    assert_eq!(page.len(), 1);
    assert_eq!(page.rows[0].get("id"), Some(&SqlValue::Int(2)));
    assert!(page.rows[0].get("email").is_none());

    // Offset without a limit is ignored.
    let unlimited = client
        .select("users", &SelectOptions::new().offset(2))
        .await?;
    assert_eq!(unlimited.len(), 3);

    let bob = client
        .get("users", Some(&Where::new().eq("name", "bob")), &SelectOptions::new())
        .await?
        .expect("bob exists");
    assert_eq!(bob.get("age").and_then(SqlValue::as_int), Some(25));

    let nobody = client
        .get("users", Some(&Where::new().eq("name", "nobody")), &SelectOptions::new())
        .await?;
    assert!(nobody.is_none());

    let no_email = client
        .get("users", Some(&Where::new().is_null("email")), &SelectOptions::new())
        .await?
        .expect("carol has no email");
    assert_eq!(text(&no_email, "name").as_deref(), Some("carol"));

    assert_eq!(client.count("users", None).await?, 3);
    let filter = Where::new().or(Where::new().eq("name", "alice").op("age", CompareOp::Gt, 40));
    assert_eq!(client.count("users", Some(&filter)).await?, 2);
    Ok(())
}

#[tokio::test]
async fn insert_update_and_delete() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("insert_update_delete").await;

    let inserted = client
        .insert(
            "users",
            &[Row::new()
                .with("name", "dave")
                .with("age", 19)
                .with("created_at", Literal::new("CURRENT_TIMESTAMP"))],
            None,
        )
        .await?;
    assert_eq!(inserted.affected_rows, 1);
    assert_eq!(inserted.insert_id, Some(4));

    let dave = client
        .get("users", Some(&Where::new().eq("id", 4)), &SelectOptions::new())
        .await?
        .expect("dave inserted");
    assert!(dave.get("created_at").is_some_and(|v| !v.is_null()));
    assert_eq!(text(&dave, "created_at").map(|s| s.len()), Some(19));

    let updated = client
        .update("users", &Row::new().with("id", 4).with("age", 20), &UpdateOptions::new())
        .await?;
    assert_eq!(updated.affected_rows, 1);

    let by_filter = client
        .update(
            "users",
            &Row::new().with("email", "none@example.com").with("age", 99),
            &UpdateOptions::new()
                .filter(Where::new().is_null("email"))
                .columns(["email"]),
        )
        .await?;
    assert_eq!(by_filter.affected_rows, 2);
    let carol = client
        .get("users", Some(&Where::new().eq("id", 3)), &SelectOptions::new())
        .await?
        .expect("carol");
    assert_eq!(carol.get("age").and_then(SqlValue::as_int), Some(41));

    let deleted = client
        .delete("users", Some(&Where::new().in_list("id", [1, 4])))
        .await?;
    assert_eq!(deleted.affected_rows, 2);
    assert_eq!(client.count("users", None).await?, 2);
    Ok(())
}

#[tokio::test]
async fn update_rows_leaves_omitted_columns_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("update_rows").await;

    let result = client
        .update_rows(
            "users",
            &[
                UpdateRow::keyed(Row::new().with("id", 1).with("name", "alice2")),
                UpdateRow::keyed(Row::new().with("id", 2).with("email", "bob2@example.com")),
                UpdateRow::explicit(
                    Row::new().with("age", 42),
                    Where::new().eq("name", "carol"),
                ),
            ],
        )
        .await?;
    assert_eq!(result.affected_rows, 3);

    let rows = client
        .select("users", &SelectOptions::new().order("id"))
        .await?;
    let summary = rows
        .rows
        .iter()
        .map(|row| {
            (
                text(row, "name"),
                text(row, "email"),
                row.get("age").and_then(SqlValue::as_int),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            (Some("alice2".into()), Some("alice@example.com".into()), Some(30)),
            (Some("bob".into()), Some("bob2@example.com".into()), Some(25)),
            (Some("carol".into()), None, Some(42)),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn driver_errors_carry_the_sql() {
    let mut client = sqlite_client("driver_errors").await;

    let err = client
        .select("missing_table", &SelectOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.sql(), Some("SELECT * FROM `missing_table`"));
    assert!(matches!(err.root(), RdsError::Sqlite(_)));
    assert!(err.to_string().contains("sql: SELECT * FROM `missing_table`"));
}

#[tokio::test]
async fn quotes_and_backslashes_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("quotes_round_trip").await;
    let names = ["o'brien", "say \"hi\"", r"back\slash", r"mixed '\' end\"];

    let rows = names
        .iter()
        .zip(10..)
        .map(|(name, id)| Row::new().with("id", id).with("name", *name))
        .collect::<Vec<_>>();
    client.insert("users", &rows, None).await?;

    for name in names {
        let row = client
            .get("users", Some(&Where::new().eq("name", name)), &SelectOptions::new())
            .await?
            .expect("inserted name is found");
        assert_eq!(text(&row, "name").as_deref(), Some(name));
    }

    client
        .update(
            "users",
            &Row::new().with("id", 10).with("email", "o'brien@example.com"),
            &UpdateOptions::new(),
        )
        .await?;
    let found = client
        .query(
            "SELECT email FROM users WHERE name = ?",
            &Params::positional(["o'brien"]),
        )
        .await?;
    assert_eq!(
        found.rows[0].get("email"),
        Some(&SqlValue::Text("o'brien@example.com".into()))
    );
    Ok(())
}

#[tokio::test]
async fn quoted_input_cannot_widen_a_filter() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("quoted_filter").await;
    let filter = Where::new().eq("name", "nobody' OR 1=1 --");

    let row = client
        .get("users", Some(&filter), &SelectOptions::new())
        .await?;
    assert!(row.is_none());
    assert_eq!(client.count("users", Some(&filter)).await?, 0);

    let deleted = client.delete("users", Some(&filter)).await?;
    assert_eq!(deleted.affected_rows, 0);
    assert_eq!(client.count("users", None).await?, 3);
    Ok(())
}
