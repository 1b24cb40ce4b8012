//! Database integration tests with a real SingleStore
//!
//! These tests require a live SingleStore cluster.
//! Set SINGLESTORE_HOST to run; SINGLESTORE_PORT, SINGLESTORE_USER,
//! SINGLESTORE_PASSWORD and SINGLESTORE_DATABASE override the defaults.

use futures::StreamExt;
use mysql_async::prelude::Queryable;
use singlestore_cdc::database::{ChangeSource, SingleStoreConnection};
use singlestore_cdc::engine::{join_sync, start_sync, Message, RecordType, SyncConfig};
use singlestore_cdc::schema::SYNTHETIC_KEY_COLUMN;
use singlestore_cdc::value::{DataType, Value};
use singlestore_cdc::SourceConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Get test configuration from environment or skip
fn get_test_config(table: &str) -> Option<SourceConfig> {
    let host = std::env::var("SINGLESTORE_HOST").ok()?;
    let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());

    let config = serde_json::json!({
        "host": host,
        "port": env("SINGLESTORE_PORT", "3306"),
        "database": env("SINGLESTORE_DATABASE", "db"),
        "table": table,
        "user": env("SINGLESTORE_USER", "root"),
        "password": std::env::var("SINGLESTORE_PASSWORD").ok(),
    });
    Some(SourceConfig::from_json_value(&config).expect("test configuration"))
}

async fn execute(config: &SourceConfig, statements: &[&str]) {
    let opts = mysql_async::OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .pass(config.password.clone())
        .db_name(Some(config.database.clone()));
    let mut conn = mysql_async::Conn::new(opts).await.expect("connect");
    for statement in statements {
        conn.query_drop(*statement).await.expect(statement);
    }
    conn.disconnect().await.expect("disconnect");
}

#[tokio::test]
async fn test_singlestore_connection() {
    let Some(config) = get_test_config("cdc_it_connection") else {
        println!("Skipping: SINGLESTORE_HOST not set");
        return;
    };

    let connection = SingleStoreConnection::new(config);
    let check = connection.check_connection().await;
    assert!(check.is_ok(), "Connection check failed: {:?}", check.err());

    let missing = connection.check_table_existence().await;
    assert!(missing.is_err(), "table should not exist");
}

#[tokio::test]
async fn test_singlestore_schema_and_types() {
    let Some(config) = get_test_config("cdc_it_types") else {
        println!("Skipping: SINGLESTORE_HOST not set");
        return;
    };
    execute(
        &config,
        &[
            "DROP TABLE IF EXISTS cdc_it_types",
            "CREATE TABLE cdc_it_types (id BIGINT PRIMARY KEY, small SMALLINT, amount DECIMAL(12, 3), \
             created DATETIME(6), tags SET('a','b'), body JSON, embedding VECTOR(3))",
        ],
    )
    .await;

    let connection = SingleStoreConnection::new(config);
    let schemas = connection.schema().await.expect("schema");
    let table = schemas
        .table(&connection.config().database, "cdc_it_types")
        .expect("table in schema");

    assert_eq!(table.column("id").unwrap().data_type, DataType::Long);
    assert!(table.column("id").unwrap().primary_key);
    assert_eq!(table.column("small").unwrap().data_type, DataType::Short);
    assert_eq!(table.column("amount").unwrap().data_type, DataType::Decimal);
    assert_eq!(table.column("created").unwrap().data_type, DataType::DateTime);
    assert_eq!(table.column("tags").unwrap().data_type, DataType::String);
    assert_eq!(table.column("body").unwrap().data_type, DataType::Json);

    // The vector type follows the session's projection format
    let expected = connection.vector_format().await.expect("format").data_type();
    assert_eq!(table.column("embedding").unwrap().data_type, expected);
}

#[tokio::test]
async fn test_singlestore_change_stream() {
    let Some(config) = get_test_config("cdc_it_stream") else {
        println!("Skipping: SINGLESTORE_HOST not set");
        return;
    };
    execute(
        &config,
        &[
            "DROP TABLE IF EXISTS cdc_it_stream",
            "CREATE TABLE cdc_it_stream (a INT, b TEXT)",
            "INSERT INTO cdc_it_stream VALUES (1, 'one'), (2, 'two')",
        ],
    )
    .await;

    let connection = SingleStoreConnection::new(config.clone());
    let table = connection.table_ref();
    let source: Arc<dyn ChangeSource> = Arc::new(connection);
    let cancel = CancellationToken::new();
    let (mut messages, handle) = start_sync(
        source,
        table,
        None,
        None,
        SyncConfig::default(),
        cancel.clone(),
    );

    let mut inserts = Vec::new();
    let mut deletes = Vec::new();
    let mut deleted = false;
    let read = tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(msg) = messages.next().await {
            let Message::Record {
                record_type, data, ..
            } = msg
            else {
                continue;
            };
            match record_type {
                RecordType::Upsert => inserts.push(data),
                RecordType::Delete => deletes.push(data),
                RecordType::Update => {}
            }
            if inserts.len() == 2 && !deleted {
                execute(&config, &["DELETE FROM cdc_it_stream WHERE a = 1"]).await;
                deleted = true;
            }
            if !deletes.is_empty() {
                cancel.cancel();
            }
        }
    })
    .await;
    assert!(read.is_ok(), "timed out waiting for changes");

    assert_eq!(inserts[0].get("b"), Some(&Value::String("one".to_string())));
    assert!(inserts[0].contains_key(SYNTHETIC_KEY_COLUMN));
    // Without a primary key, deletes carry only the synthetic key
    assert_eq!(deletes[0].keys().collect::<Vec<_>>(), vec![SYNTHETIC_KEY_COLUMN]);

    let outcome = join_sync(handle).await.expect("sync");
    assert!(outcome.state.offsets().iter().any(Option::is_some));
}
