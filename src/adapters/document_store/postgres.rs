//! PostgreSQL implementation of DocumentStore.
//!
//! All collections share one `documents` table keyed by
//! `(collection, id)` with the fields held in a JSONB column.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Document, DocumentStore, FieldFilter, Fields, SaveResult};

/// PostgreSQL implementation of the DocumentStore port.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from configuration, running migrations if asked to.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to run migrations: {}", e),
                    )
                })?;
        }

        Ok(Self::new(pool))
    }
}

/// Database row representation of a document.
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    fields: Json<Fields>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document::new(row.id, row.fields.0)
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DomainError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, fields
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get document", e))?;

        Ok(row.map(Document::from))
    }

    async fn list(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>, DomainError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, fields
            FROM documents
            WHERE collection = $1 AND fields -> $2 = $3
            ORDER BY created_at, id
            "#,
        )
        .bind(collection)
        .bind(&filter.field)
        .bind(Json(&filter.value))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list documents", e))?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create document", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET
                fields = fields || $3,
                updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&patch))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update document", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(collection, id));
        }

        Ok(())
    }
}
