//! Integration tests through the public API
//!
//! Drives full syncs against an in-memory change source: configuration →
//! change stream → NDJSON messages → persisted state → resumed sync.

use async_trait::async_trait;
use futures::StreamExt;
use mysql_async::Value as Native;
use pretty_assertions::assert_eq;
use serde_json::json;
use singlestore_cdc::config::{configuration_form, SslMode};
use singlestore_cdc::database::{ChangeCursor, ChangeSource, RawChangeRow, TableRef};
use singlestore_cdc::engine::{join_sync, start_sync, Message, ReaderStatus, SyncConfig};
use singlestore_cdc::schema::{map_native_type, Column, NativeType, VectorFormat};
use singlestore_cdc::{DataType, Result, SourceConfig, State, StateManager};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted source
// ============================================================================

/// Serves each opened stream from the next script in line
struct ScriptedSource {
    scripts: Mutex<VecDeque<Vec<RawChangeRow>>>,
    opened_at: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn new(scripts: Vec<Vec<RawChangeRow>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            opened_at: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChangeSource for ScriptedSource {
    async fn resolve_columns(&self, _table: &TableRef) -> Result<Vec<Column>> {
        Ok(vec![
            Column::new("id", DataType::Long).with_primary_key(true),
            Column::new("name", DataType::String),
            Column::new("price", DataType::Decimal).with_decimal(10, 2),
        ])
    }

    async fn partition_count(&self, _database: &str) -> Result<usize> {
        Ok(2)
    }

    async fn open_change_stream(
        &self,
        _table: &TableRef,
        resume_literals: &str,
    ) -> Result<Box<dyn ChangeCursor>> {
        self.opened_at
            .lock()
            .unwrap()
            .push(resume_literals.to_string());
        let rows = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedCursor { rows: rows.into() }))
    }
}

struct ScriptedCursor {
    rows: VecDeque<RawChangeRow>,
}

#[async_trait]
impl ChangeCursor for ScriptedCursor {
    async fn next_row(&mut self) -> Result<Option<RawChangeRow>> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn change(operation: &str, partition: i64, offset: &[u8], id: &str, name: &str) -> RawChangeRow {
    RawChangeRow {
        operation: operation.to_string(),
        partition,
        offset: offset.to_vec(),
        values: [
            ("id".to_string(), Native::Bytes(id.as_bytes().to_vec())),
            ("name".to_string(), Native::Bytes(name.as_bytes().to_vec())),
            ("price".to_string(), Native::Bytes(b"12.50".to_vec())),
        ]
        .into_iter()
        .collect(),
    }
}

async fn run_to_end(
    source: Arc<ScriptedSource>,
    manager: &StateManager,
) -> Vec<serde_json::Value> {
    let (mut messages, handle) = start_sync(
        source,
        TableRef::new("shop", "products"),
        None,
        manager.state().await,
        SyncConfig::new().with_checkpoint_batch_size(2),
        CancellationToken::new(),
    );

    let mut lines = Vec::new();
    while let Some(msg) = messages.next().await {
        if let Message::Checkpoint { state_json } = &msg {
            manager.checkpoint(state_json).await.unwrap();
        }
        lines.push(msg.to_json());
    }

    let outcome = join_sync(handle).await.unwrap();
    assert_eq!(outcome.status, ReaderStatus::Completed);
    lines
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_sync_persists_and_resumes_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let source = Arc::new(ScriptedSource::new(vec![
        vec![
            change("Insert", 0, &[0x00, 0x01], "1", "apple"),
            change("Insert", 1, &[0x00, 0x02], "2", "pear"),
            change("Update", 0, &[0x00, 0x03], "1", "green apple"),
        ],
        vec![change("Delete", 1, &[0x00, 0x04], "2", "pear")],
    ]));

    // First run starts fresh
    let manager = StateManager::from_file(&state_path).unwrap();
    let lines = run_to_end(source.clone(), &manager).await;

    let records: Vec<_> = lines.iter().filter(|l| l["type"] == "RECORD").collect();
    assert_eq!(records.len(), 3);
    assert_eq!(
        *records[0],
        json!({
            "type": "RECORD",
            "schema": "shop",
            "table": "products",
            "record_type": "UPSERT",
            "data": {"id": 1, "name": "apple", "price": "12.50"}
        })
    );
    assert_eq!(records[2]["record_type"], json!("UPDATE"));

    let saved = std::fs::read_to_string(&state_path).unwrap();
    assert_eq!(saved, r#"{"offsets":["0003","0002"]}"#);

    // Second run resumes from the file
    let manager = StateManager::from_file(&state_path).unwrap();
    let lines = run_to_end(source.clone(), &manager).await;

    let delete = lines.iter().find(|l| l["type"] == "RECORD").unwrap();
    assert_eq!(delete["record_type"], json!("DELETE"));
    assert_eq!(delete["data"], json!({"id": 2}));

    assert_eq!(
        *source.opened_at.lock().unwrap(),
        vec!["NULL, NULL".to_string(), "'0003', '0002'".to_string()]
    );
    assert_eq!(
        std::fs::read_to_string(&state_path).unwrap(),
        r#"{"offsets":["0003","0004"]}"#
    );
}

#[tokio::test]
async fn test_checkpoint_lines_carry_state_document() {
    let source = Arc::new(ScriptedSource::new(vec![vec![
        change("Insert", 0, &[0xaa], "1", "a"),
        change("Insert", 0, &[0xbb], "2", "b"),
    ]]));
    let lines = run_to_end(source, &StateManager::in_memory()).await;

    let checkpoints: Vec<_> = lines
        .iter()
        .filter(|l| l["type"] == "CHECKPOINT")
        .map(|l| l["state"].clone())
        .collect();
    assert_eq!(
        checkpoints,
        vec![
            json!({"offsets": ["bb", null]}),
            json!({"offsets": ["bb", null]}),
        ]
    );
}

// ============================================================================
// Configuration, state and type mapping
// ============================================================================

#[test]
fn test_source_config_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.yaml");
    std::fs::write(
        &path,
        "host: db.internal\nport: 3306\ndatabase: shop\ntable: products\nuser: reader\n\
         ssl.mode: verify-full\ndriver.parameters: \"connectTimeout=5000;tcpKeepAlive=60\"\n",
    )
    .unwrap();

    let config = SourceConfig::from_file(&path).unwrap();
    assert_eq!(config.host, "db.internal");
    assert_eq!(config.port, 3306);
    assert_eq!(config.ssl_mode, SslMode::VerifyFull);
    assert_eq!(config.password, None);
}

#[test]
fn test_configuration_form_lists_every_ssl_mode() {
    let form = serde_json::to_value(configuration_form()).unwrap();
    let ssl_mode = form["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "ssl.mode")
        .unwrap();
    assert_eq!(
        ssl_mode["kind"]["options"],
        json!(["disable", "trust", "verify-ca", "verify-full"])
    );
}

#[test]
fn test_state_document_round_trip() {
    let mut state = State::new(3);
    state.set_offset(1, "0a0b");
    let restored = State::from_json(&state.to_json()).unwrap();
    assert_eq!(restored, state);
    assert_eq!(restored.offsets_as_sql(), "NULL, '0a0b', NULL");
}

#[tokio::test]
async fn test_vector_columns_follow_projection_format() {
    let NativeType::Vector = map_native_type("VECTOR") else {
        panic!("VECTOR must defer to the projection format");
    };
    let binary = map_native_type("VECTOR")
        .resolve(|| async { Ok(VectorFormat::from_setting("BINARY")) })
        .await
        .unwrap();
    assert_eq!(binary, DataType::Binary);

    let json = map_native_type("VECTOR")
        .resolve(|| async { Ok(VectorFormat::from_setting("JSON")) })
        .await
        .unwrap();
    assert_eq!(json, DataType::Json);
}
