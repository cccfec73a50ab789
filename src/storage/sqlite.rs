use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::QueryBuilder;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{Predicate, RecordField, RecordStore, ScanFilter, VerificationRecord};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const SELECT_RECORDS: &str = r#"
    SELECT id, "timestamp", product_id, product_category,
           uploaded_label_image_key, uploaded_overview_image_key,
           uploaded_reference_image_key, ai_response
    FROM verification_records
"#;

/// SQLite-backed record store
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory store, used by tests and one-shot tooling.
    ///
    /// Every SQLite connection to `:memory:` opens a separate database, so
    /// the pool is pinned to a single long-lived connection.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn column(field: RecordField) -> &'static str {
    match field {
        RecordField::ProductId => "product_id",
        RecordField::ProductCategory => "product_category",
        RecordField::Timestamp => "\"timestamp\"",
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &ScanFilter) {
    for (index, condition) in filter.conditions.iter().enumerate() {
        query.push(if index == 0 { " WHERE " } else { " AND " });
        query.push(column(condition.field));

        match &condition.predicate {
            Predicate::Equals(op) => {
                query.push(" = ").push_bind(op.value.clone());
            }
            Predicate::AtLeast(op) => {
                query.push(" >= ").push_bind(op.value.clone());
            }
            Predicate::AtMost(op) => {
                query.push(" <= ").push_bind(op.value.clone());
            }
            Predicate::Between(low, high) => {
                query
                    .push(" BETWEEN ")
                    .push_bind(low.value.clone())
                    .push(" AND ")
                    .push_bind(high.value.clone());
            }
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStorage {
    async fn scan(&self, filter: &ScanFilter) -> StorageResult<Vec<VerificationRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_RECORDS);
        push_filter(&mut query, filter);

        let rows: Vec<RecordRow> = query
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await?;
        debug!(rows = rows.len(), filter = %filter.expression(), "Scan returned rows");

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match VerificationRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping undecodable record"),
            }
        }

        Ok(records)
    }

    async fn get_record(&self, id: &str) -> StorageResult<Option<VerificationRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_RECORDS);
        query.push(" WHERE id = ").push_bind(id.to_string());

        let row: Option<RecordRow> = query
            .build_query_as::<RecordRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(VerificationRecord::try_from).transpose()
    }

    async fn put_record(&self, record: &VerificationRecord) -> StorageResult<()> {
        let ai_response =
            serde_json::to_string(&record.ai_response).map_err(|e| StorageError::Query {
                message: format!("Failed to encode AI response for {}: {}", record.id, e),
            })?;

        sqlx::query(
            r#"
            INSERT INTO verification_records (
                id, "timestamp", product_id, product_category,
                uploaded_label_image_key, uploaded_overview_image_key,
                uploaded_reference_image_key, ai_response
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.timestamp)
        .bind(&record.product_id)
        .bind(&record.product_category)
        .bind(&record.uploaded_label_image_key)
        .bind(&record.uploaded_overview_image_key)
        .bind(&record.uploaded_reference_image_key)
        .bind(&ai_response)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    timestamp: String,
    product_id: String,
    product_category: String,
    uploaded_label_image_key: String,
    uploaded_overview_image_key: String,
    uploaded_reference_image_key: Option<String>,
    ai_response: String,
}

impl TryFrom<RecordRow> for VerificationRecord {
    type Error = StorageError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let ai_response =
            serde_json::from_str(&row.ai_response).map_err(|e| StorageError::Corrupt {
                id: row.id.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            id: row.id,
            timestamp: row.timestamp,
            product_id: row.product_id,
            product_category: row.product_category,
            uploaded_label_image_key: row.uploaded_label_image_key,
            uploaded_overview_image_key: row.uploaded_overview_image_key,
            uploaded_reference_image_key: row.uploaded_reference_image_key,
            ai_response,
        })
    }
}
