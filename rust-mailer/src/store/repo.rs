//! SQLite-backed record store shared by the recorder and the web handlers.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

use super::records::{BounceRecord, DeliveryRecord, NewDelivery, RecordFilter};

/// Failures of the record database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

const DELIVERY_COLUMNS: &str = "id, message_id, submitted_at, status, recipient, to_type, \
     sender, reply_to, subject, tag, text_body, html_body, headers, attachments";

const BOUNCE_COLUMNS: &str = "bounce_id, delivery_id, bounce_type, description, details, \
     bounced_at, inactive, can_activate";

/// Delivery and bounce records.
///
/// Cloning yields another handle to the same connection pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the database at `url`, creating it and its tables when missing.
    ///
    /// `sqlite::memory:` gives a private database that lives as long as the pool.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database, so keep exactly one alive.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!().run(&pool).await?;

        info!(database_url = %url, "store_opened");

        Ok(Self { pool })
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// A fresh private database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn insert_delivery(&self, new: NewDelivery) -> Result<DeliveryRecord, StoreError> {
        let record = sqlx::query_as::<_, DeliveryRecord>(&format!(
            r#"
            INSERT INTO deliveries (message_id, submitted_at, status, recipient, to_type,
                sender, reply_to, subject, tag, text_body, html_body, headers, attachments)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(new.message_id)
        .bind(new.submitted_at)
        .bind(new.status)
        .bind(new.to)
        .bind(new.to_type)
        .bind(new.sender)
        .bind(new.reply_to)
        .bind(new.subject)
        .bind(new.tag)
        .bind(new.text_body)
        .bind(new.html_body)
        .bind(new.headers)
        .bind(new.attachments)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Find the delivery of `message_id` to `recipient`.
    ///
    /// Addresses compare case-insensitively. The oldest record wins if the
    /// same batch was recorded twice.
    pub async fn find_delivery(
        &self,
        message_id: &str,
        recipient: &str,
    ) -> Result<Option<DeliveryRecord>, StoreError> {
        let record = sqlx::query_as::<_, DeliveryRecord>(&format!(
            r#"
            SELECT {}
            FROM deliveries
            WHERE message_id = ?1 AND recipient = ?2
            ORDER BY id ASC
            LIMIT 1
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(message_id)
        .bind(recipient.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Insert `bounce` unless a bounce with the same id exists.
    ///
    /// Returns the stored record and whether it was created by this call.
    /// The primary key on `bounce_id` decides between concurrent callers.
    pub async fn get_or_create_bounce(
        &self,
        bounce: BounceRecord,
    ) -> Result<(BounceRecord, bool), StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO bounces (bounce_id, delivery_id, bounce_type, description, details,
                bounced_at, inactive, can_activate)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (bounce_id) DO NOTHING
            "#,
        )
        .bind(bounce.bounce_id)
        .bind(bounce.delivery_id)
        .bind(bounce.bounce_type)
        .bind(&bounce.description)
        .bind(&bounce.details)
        .bind(bounce.bounced_at)
        .bind(bounce.inactive)
        .bind(bounce.can_activate)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let stored = sqlx::query_as::<_, BounceRecord>(&format!(
            "SELECT {} FROM bounces WHERE bounce_id = ?1",
            BOUNCE_COLUMNS
        ))
        .bind(bounce.bounce_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((stored, inserted == 1))
    }

    pub async fn bounces_for(&self, delivery_id: i64) -> Result<Vec<BounceRecord>, StoreError> {
        let bounces = sqlx::query_as::<_, BounceRecord>(&format!(
            "SELECT {} FROM bounces WHERE delivery_id = ?1 ORDER BY bounce_id ASC",
            BOUNCE_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bounces)
    }

    /// Delivery records matching `filter`, newest submission first.
    ///
    /// `q` is a case-insensitive substring of message id, recipient or subject.
    pub async fn search(&self, filter: &RecordFilter) -> Result<Vec<DeliveryRecord>, StoreError> {
        let q = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let records = sqlx::query_as::<_, DeliveryRecord>(&format!(
            r#"
            SELECT {}
            FROM deliveries
            WHERE (?1 IS NULL
                    OR message_id LIKE '%' || ?1 || '%'
                    OR recipient LIKE '%' || ?1 || '%'
                    OR subject LIKE '%' || ?1 || '%')
                AND (?2 IS NULL OR status = ?2)
                AND (?3 IS NULL OR tag = ?3)
                AND (?4 IS NULL OR to_type = ?4)
            ORDER BY submitted_at DESC, id DESC
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(q)
        .bind(filter.status.as_deref())
        .bind(filter.tag.as_deref())
        .bind(filter.to_type.map(|kind| kind.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn delivery_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM deliveries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn bounce_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bounces")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
