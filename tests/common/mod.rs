#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bb8::ManageConnection;
use rds_middleware::prelude::*;
use tempfile::tempdir;

/// Driver that records every statement instead of talking to a database.
#[derive(Clone, Default)]
pub struct RecordingManager {
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
    refuse_connections: bool,
    response: Option<ResultSet>,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements containing `needle` fail with a driver error (they are still recorded).
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    /// Every statement returns `result` instead of an empty write.
    pub fn responding(result: ResultSet) -> Self {
        Self {
            response: Some(result),
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse_connections: true,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.statements().iter().filter(|s| s.as_str() == sql).count()
    }

    /// Poll until `sql` has been recorded, for statements sent from spawned tasks.
    pub async fn wait_for(&self, sql: &str) -> bool {
        for _ in 0..200 {
            if self.count(sql) > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

pub struct RecordingConnection {
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
    response: Option<ResultSet>,
}

impl ManageConnection for RecordingManager {
    type Connection = RecordingConnection;
    type Error = RdsError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let refuse = self.refuse_connections;
        let conn = RecordingConnection {
            log: Arc::clone(&self.log),
            fail_on: self.fail_on.clone(),
            response: self.response.clone(),
        };
        async move {
            if refuse {
                Err(RdsError::Driver("connection refused".into()))
            } else {
                Ok(conn)
            }
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        _conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

#[async_trait]
impl DriverConnection for RecordingConnection {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError> {
        self.log.lock().unwrap().push(sql.to_string());
        match &self.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => {
                Err(RdsError::Driver(format!("forced failure on {needle}")))
            }
            _ => Ok(self
                .response
                .clone()
                .unwrap_or_else(|| ResultSet::from_write(1, None))),
        }
    }
}

pub async fn recording_client(manager: &RecordingManager) -> Client<RecordingManager> {
    Client::builder(manager.clone())
        .pool_options(
            PoolOptions::new()
                .max_size(4)
                .connection_timeout(Duration::from_millis(300)),
        )
        .build()
        .await
        .expect("recording client")
}

pub fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

/// File-backed `SQLite` client with a `users` table seeded with three rows.
pub async fn sqlite_client(prefix: &str) -> Client<SqliteManager> {
    let client = Client::builder(SqliteManager::new(unique_db_path(prefix)))
        .pool_options(PoolOptions::new().max_size(4))
        .build()
        .await
        .expect("sqlite client");
    let mut conn = client.get_connection().await.expect("connection");
    conn.query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT, age INTEGER, created_at TEXT)",
        &Params::None,
    )
    .await
    .expect("create table");
    let rows = [
        Row::new().with("id", 1).with("name", "alice").with("email", "alice@example.com").with("age", 30),
        Row::new().with("id", 2).with("name", "bob").with("email", "bob@example.com").with("age", 25),
        Row::new().with("id", 3).with("name", "carol").with("email", SqlValue::Null).with("age", 41),
    ];
    conn.insert("users", &rows, None).await.expect("seed rows");
    conn.release();
    client
}
