use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Error;
use crate::store::{Document, DocumentStore};

/// Production document store: one JSONB row per remote document.
///
/// JSONB value ordering gives `query_ordered` numeric ordering for the
/// epoch-millisecond timestamps the codec writes.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        let row: Option<(Value,)> = sqlx::query_as(
            r#"
            SELECT fields
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::remote)?;
        Ok(row.and_then(|(fields,)| match fields {
            Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    async fn add(&self, collection: &str, fields: Document) -> Result<String, Error> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await
        .map_err(Error::remote)?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Document) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET fields = EXCLUDED.fields
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await
        .map_err(Error::remote)?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET fields = fields || $3
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await
        .map_err(Error::remote)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("document {collection}/{id}")));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::remote)?;
        Ok(())
    }

    async fn query_ordered(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
    ) -> Result<Vec<(String, Document)>, Error> {
        let sql = if descending {
            r#"
            SELECT id, fields
            FROM documents
            WHERE collection = $1
            ORDER BY fields -> $2 DESC
            "#
        } else {
            r#"
            SELECT id, fields
            FROM documents
            WHERE collection = $1
            ORDER BY fields -> $2 ASC
            "#
        };
        let rows: Vec<(String, Value)> = sqlx::query_as(sql)
            .bind(collection)
            .bind(order_by)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::remote)?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, fields)| match fields {
                Value::Object(map) => Some((id, map)),
                _ => None,
            })
            .collect())
    }
}
