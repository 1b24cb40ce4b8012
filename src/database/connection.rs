//! SingleStore connection over the MySQL wire protocol

use super::cursor::ObserveCursor;
use super::source::{ChangeCursor, ChangeSource, TableRef};
use crate::config::{SourceConfig, SslMode};
use crate::error::{Error, Result};
use crate::schema::{map_native_type, Column, SchemaList, Table, VectorFormat};
use crate::value::DataType;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Quote an identifier with backticks, doubling internal backticks
pub fn escape_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote a string literal with single quotes, doubling internal quotes
pub fn escape_string(literal: &str) -> String {
    format!("'{}'", literal.replace('\'', "''"))
}

/// A lazily opened metadata session plus per-connection cached settings
///
/// Change streams run on their own dedicated connections.
#[derive(Debug)]
pub struct SingleStoreConnection {
    config: SourceConfig,
    session: Mutex<Option<Conn>>,
    vector_format: VectorFormatCache,
}

impl SingleStoreConnection {
    /// Create without connecting
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            vector_format: VectorFormatCache::default(),
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// The configured table
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.config.database, &self.config.table)
    }

    /// Run a query on the metadata session, opening it on first use
    async fn query<T: FromRow + Send + 'static>(&self, sql: &str) -> Result<Vec<T>> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(connect(&self.config).await?);
        }
        let conn = session
            .as_mut()
            .ok_or_else(|| Error::connection("metadata session unavailable"))?;

        let result = conn.query(sql).await;
        match result {
            Ok(rows) => Ok(rows),
            Err(e) => {
                // Reopen on next use after a transport failure
                if matches!(e, mysql_async::Error::Io(_) | mysql_async::Error::Driver(_)) {
                    session.take();
                }
                Err(Error::from_driver(e))
            }
        }
    }

    /// Verify the server is reachable and credentials are accepted
    pub async fn check_connection(&self) -> Result<()> {
        self.query::<u8>("SELECT 1").await.map(|_| ())
    }

    /// Verify the configured table exists and is readable
    pub async fn check_table_existence(&self) -> Result<()> {
        let sql = format!("SELECT * FROM {} WHERE 1=0", self.table_ref().escaped());
        self.query::<mysql_async::Row>(&sql).await.map(|_| ())
    }

    /// How this session projects `VECTOR` columns, queried once and cached
    pub async fn vector_format(&self) -> Result<VectorFormat> {
        self.vector_format.get(self).await
    }

    /// Discovered schema: one database holding the configured table
    pub async fn schema(&self) -> Result<SchemaList> {
        let table = self.table_ref();
        let columns = self.resolve_columns(&table).await?;
        Ok(SchemaList::single(
            table.database,
            Table {
                name: table.table,
                columns,
            },
        ))
    }
}

#[async_trait]
impl ChangeSource for SingleStoreConnection {
    async fn resolve_columns(&self, table: &TableRef) -> Result<Vec<Column>> {
        let sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, NUMERIC_PRECISION, NUMERIC_SCALE, COLUMN_KEY \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            escape_string(&table.database),
            escape_string(&table.table)
        );
        type ColumnRow = (String, String, String, Option<u32>, Option<u32>, String);
        let rows: Vec<ColumnRow> = self.query(&sql).await?;

        if rows.is_empty() {
            return Err(Error::TableNotFound {
                table: table.escaped(),
            });
        }

        let rows = rows
            .into_iter()
            .map(
                |(name, data_type, column_type, precision, scale, key)| ColumnMetadata {
                    name,
                    data_type,
                    column_type,
                    precision,
                    scale,
                    key,
                },
            )
            .collect();
        columns_from_metadata(rows, &self.vector_format, self).await
    }

    async fn partition_count(&self, database: &str) -> Result<usize> {
        let sql = format!(
            "SELECT num_partitions FROM information_schema.DISTRIBUTED_DATABASES WHERE database_name = {}",
            escape_string(database)
        );
        let count: Option<u64> = self.query(&sql).await?.into_iter().next();
        let count =
            count.ok_or_else(|| Error::schema("Failed to retrieve number of partitions in the database"))?;
        usize::try_from(count).map_err(|_| Error::schema(format!("invalid partition count {count}")))
    }

    async fn open_change_stream(
        &self,
        table: &TableRef,
        resume_literals: &str,
    ) -> Result<Box<dyn ChangeCursor>> {
        let sql = format!("OBSERVE * FROM {} BEGIN AT ({resume_literals})", table.escaped());
        info!(table = %table, "Opening change stream");
        let cursor = ObserveCursor::open(self.config.clone(), sql).await?;
        Ok(Box::new(cursor))
    }
}

#[async_trait]
impl VectorSettingReader for SingleStoreConnection {
    async fn read_vector_setting(&self) -> Result<Option<String>> {
        let rows: Vec<String> = self.query("SELECT @@vector_type_project_format").await?;
        Ok(rows.into_iter().next())
    }
}

// ============================================================================
// Column resolution
// ============================================================================

/// Reads the session's `@@vector_type_project_format`
#[async_trait]
pub(crate) trait VectorSettingReader: Send + Sync {
    async fn read_vector_setting(&self) -> Result<Option<String>>;
}

/// Vector projection format, read at most once per connection
#[derive(Debug, Default)]
pub(crate) struct VectorFormatCache {
    cell: OnceCell<VectorFormat>,
}

impl VectorFormatCache {
    pub(crate) async fn get(&self, reader: &dyn VectorSettingReader) -> Result<VectorFormat> {
        self.cell
            .get_or_try_init(|| async {
                let setting = reader.read_vector_setting().await.map_err(|e| {
                    Error::config(format!("Failed to retrieve vector_type_project_format: {e}"))
                })?;
                let setting = setting.ok_or_else(|| {
                    Error::config("Failed to retrieve vector_type_project_format")
                })?;
                debug!(setting = %setting, "Vector projection format");
                Ok(VectorFormat::from_setting(&setting))
            })
            .await
            .copied()
    }
}

/// One `information_schema.COLUMNS` row
#[derive(Debug, Clone)]
pub(crate) struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    pub column_type: String,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub key: String,
}

/// Map column metadata to typed columns. The vector format is only
/// looked up when a `VECTOR` column is present.
pub(crate) async fn columns_from_metadata(
    rows: Vec<ColumnMetadata>,
    vector_format: &VectorFormatCache,
    reader: &dyn VectorSettingReader,
) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let mut type_name = row.data_type.to_uppercase();
        if row.column_type.to_lowercase().contains("unsigned") {
            type_name.push_str(" UNSIGNED");
        }

        let kind = map_native_type(&type_name)
            .resolve(|| vector_format.get(reader))
            .await?;

        let mut column = Column::new(row.name, kind).with_primary_key(row.key == "PRI");
        if kind == DataType::Decimal {
            column = column.with_decimal(row.precision.unwrap_or(0), row.scale.unwrap_or(0));
        }
        columns.push(column);
    }
    Ok(columns)
}

// ============================================================================
// Connection setup
// ============================================================================

/// Open a new connection, bounded by the configured connect timeout
pub(crate) async fn connect(config: &SourceConfig) -> Result<Conn> {
    let opts = build_opts(config);
    let pending = Conn::new(opts);

    let result = match config.driver_parameters.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
            Error::connection(format!(
                "Timed out connecting to {}:{} after {limit:?}",
                config.host, config.port
            ))
        })?,
        None => pending.await,
    };

    result.map_err(Error::from_driver)
}

/// Translate the configuration into driver options
pub(crate) fn build_opts(config: &SourceConfig) -> Opts {
    let params = &config.driver_parameters;

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .pass(config.password.clone())
        .db_name(Some(config.database.clone()))
        .tcp_keepalive(params.tcp_keep_alive)
        .wait_timeout(params.wait_timeout)
        .stmt_cache_size(params.stmt_cache_size)
        .ssl_opts(ssl_opts(config));

    if params.compression {
        builder = builder.compression(mysql_async::Compression::default());
    }

    Opts::from(builder)
}

fn ssl_opts(config: &SourceConfig) -> Option<SslOpts> {
    let with_cert = |ssl: SslOpts| match &config.ssl_server_cert {
        Some(cert) => ssl.with_root_certs(vec![cert.clone().into_bytes().into()]),
        None => ssl,
    };

    match config.ssl_mode {
        SslMode::Disable => None,
        SslMode::Trust => Some(
            SslOpts::default()
                .with_danger_accept_invalid_certs(true)
                .with_danger_skip_domain_validation(true),
        ),
        SslMode::VerifyCa => {
            Some(with_cert(SslOpts::default()).with_danger_skip_domain_validation(true))
        }
        SslMode::VerifyFull => Some(with_cert(SslOpts::default())),
    }
}
