//! SQLite-backed contact store
//!
//! Each unit of work wraps one `sqlx` transaction. Timestamps are stored as
//! fixed-width RFC 3339 text (microsecond precision, `Z` suffix) so that
//! ordering by the column matches ordering by time.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::persistence::{establish_sqlite_pool_with_retry, test_sqlite_connection_health};
use common::{ConnectionStats, DatabaseConfig, PersistenceError, PoolStats};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use super::contact_store::{
    check_new_contact, check_reassignment, ContactStore, ContactUnitOfWork, StoreResult,
};
use super::entities::{Contact, LinkPrecedence, NewContact};

const CONTACT_COLUMNS: &str = "id, phone_number, email, linked_id, linked_precedence, \
                               created_at, updated_at, deleted_at";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS Contact (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phone_number TEXT,
        email TEXT,
        linked_id INTEGER REFERENCES Contact (id),
        linked_precedence TEXT NOT NULL
            CHECK (linked_precedence IN ('primary', 'secondary')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT,
        CHECK ((linked_precedence = 'primary') = (linked_id IS NULL))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_contact_email ON Contact (email)",
    "CREATE INDEX IF NOT EXISTS idx_contact_phone_number ON Contact (phone_number)",
    "CREATE INDEX IF NOT EXISTS idx_contact_linked_id ON Contact (linked_id)",
];

/// Contact store over a SQLite pool
#[derive(Clone)]
pub struct SqliteContactStore {
    pool: SqlitePool,
}

impl SqliteContactStore {
    /// Wrap an existing pool and make sure the schema exists
    pub async fn new(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open the pool described by `config`, creating the schema when configured to
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = establish_sqlite_pool_with_retry(config).await?;
        let store = Self { pool };
        if config.run_migrations {
            store.run_migrations().await?;
        }
        Ok(store)
    }

    /// Get access to the underlying database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running contact store migrations");

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::MigrationFailed {
                    details: e.to_string(),
                })?;
        }

        info!("Contact store migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn begin(&self) -> StoreResult<Box<dyn ContactUnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::from_sqlx("begin transaction", e))?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Contact")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::from_sqlx("count contacts", e))?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        test_sqlite_connection_health(&self.pool).await
    }

    fn connection_stats(&self) -> Option<ConnectionStats> {
        Some(self.pool.connection_stats())
    }
}

/// One open SQLite transaction
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl ContactUnitOfWork for SqliteUnitOfWork {
    async fn find_matching(&mut self, email: &str, phone_number: &str) -> StoreResult<Vec<Contact>> {
        let query = format!(
            "SELECT {CONTACT_COLUMNS} FROM Contact \
             WHERE email = ? OR phone_number = ? \
             ORDER BY created_at ASC, id ASC"
        );

        let rows = sqlx::query(&query)
            .bind(email)
            .bind(phone_number)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| PersistenceError::from_sqlx("find_matching", e))?;

        let contacts = rows
            .iter()
            .map(row_to_contact)
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(
            email = %email,
            phone_number = %phone_number,
            matched = contacts.len(),
            "Matched existing contacts"
        );
        Ok(contacts)
    }

    async fn insert(&mut self, contact: &NewContact) -> StoreResult<i64> {
        check_new_contact(contact)?;
        let now = encode_timestamp(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO Contact (
                phone_number, email, linked_id, linked_precedence, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contact.phone_number)
        .bind(&contact.email)
        .bind(contact.linked_id)
        .bind(contact.link_precedence.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| PersistenceError::from_sqlx("insert contact", e))?;

        Ok(result.last_insert_rowid())
    }

    async fn fetch(&mut self, id: i64) -> StoreResult<Contact> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM Contact WHERE id = ?");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| PersistenceError::from_sqlx("fetch contact", e))?
            .ok_or_else(|| PersistenceError::NotFound {
                details: format!("contact {id}"),
            })?;

        row_to_contact(&row)
    }

    async fn reassign_precedence(
        &mut self,
        id: i64,
        precedence: LinkPrecedence,
        linked_id: Option<i64>,
    ) -> StoreResult<()> {
        check_reassignment(id, precedence, linked_id)?;

        let result = sqlx::query(
            "UPDATE Contact SET linked_precedence = ?, linked_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(precedence.as_str())
        .bind(linked_id)
        .bind(encode_timestamp(Utc::now()))
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| PersistenceError::from_sqlx("reassign precedence", e))?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound {
                details: format!("contact {id}"),
            });
        }
        Ok(())
    }

    async fn relink_all(&mut self, old_linked_id: i64, new_linked_id: i64) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE Contact SET linked_id = ?, updated_at = ? WHERE linked_id = ?")
                .bind(new_linked_id)
                .bind(encode_timestamp(Utc::now()))
                .bind(old_linked_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| PersistenceError::from_sqlx("relink contacts", e))?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| PersistenceError::TransactionFailed {
                details: format!("commit failed: {e}"),
            })
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| PersistenceError::TransactionFailed {
                details: format!("rollback failed: {e}"),
            })
    }
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(column: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PersistenceError::DataCorruption {
            location: format!("Contact.{column}"),
            details: format!("{raw:?}: {e}"),
        })
}

fn row_to_contact(row: &SqliteRow) -> StoreResult<Contact> {
    let get_err = |e: sqlx::Error| PersistenceError::DataCorruption {
        location: "Contact".to_string(),
        details: e.to_string(),
    };

    let precedence: String = row.try_get("linked_precedence").map_err(get_err)?;
    let created_at: String = row.try_get("created_at").map_err(get_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(get_err)?;
    let deleted_at: Option<String> = row.try_get("deleted_at").map_err(get_err)?;

    Ok(Contact {
        id: row.try_get("id").map_err(get_err)?,
        phone_number: row.try_get("phone_number").map_err(get_err)?,
        email: row.try_get("email").map_err(get_err)?,
        linked_id: row.try_get("linked_id").map_err(get_err)?,
        link_precedence: precedence
            .parse::<LinkPrecedence>()
            .map_err(|e: common::ValidationError| PersistenceError::DataCorruption {
                location: "Contact.linked_precedence".to_string(),
                details: e.to_string(),
            })?,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
        deleted_at: deleted_at
            .as_deref()
            .map(|raw| decode_timestamp("deleted_at", raw))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::persistence::establish_sqlite_pool;

    async fn memory_store() -> SqliteContactStore {
        let pool = establish_sqlite_pool(&DatabaseConfig::in_memory())
            .await
            .expect("Should open in-memory pool");
        SqliteContactStore::new(pool)
            .await
            .expect("Should create store")
    }

    async fn seed_primary(store: &SqliteContactStore, email: &str, phone: &str) -> i64 {
        let mut uow = store.begin().await.unwrap();
        let id = uow.insert(&NewContact::primary(email, phone)).await.unwrap();
        uow.commit().await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_insert_and_fetch_round_trip() {
        let store = memory_store().await;
        let mut uow = store.begin().await.unwrap();

        let id = uow
            .insert(&NewContact::primary("lorraine@hillvalley.edu", "123456"))
            .await
            .unwrap();
        let contact = uow.fetch(id).await.unwrap();

        assert_eq!(contact.id, id);
        assert_eq!(contact.email.as_deref(), Some("lorraine@hillvalley.edu"));
        assert_eq!(contact.phone_number.as_deref(), Some("123456"));
        assert!(contact.is_primary());
        assert_eq!(contact.linked_id, None);
        assert!(contact.deleted_at.is_none());
        uow.commit().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.health_check().await.is_ok());
        assert_eq!(store.connection_stats().unwrap().max_connections, 1);
    }

    #[tokio::test]
    async fn test_find_matching_is_ordered_by_age() {
        let store = memory_store().await;
        let first = seed_primary(&store, "a@x", "1").await;
        let second = seed_primary(&store, "b@y", "2").await;
        let _unrelated = seed_primary(&store, "c@z", "3").await;

        let mut uow = store.begin().await.unwrap();
        let matches = uow.find_matching("a@x", "2").await.unwrap();
        let ids: Vec<i64> = matches.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first, second]);

        assert!(uow.find_matching("nobody@x", "0").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reassign_and_relink() {
        let store = memory_store().await;
        let elder = seed_primary(&store, "a@x", "1").await;
        let junior = seed_primary(&store, "b@y", "2").await;

        let mut uow = store.begin().await.unwrap();
        let dependent = uow
            .insert(&NewContact::secondary("b@y", "3", junior))
            .await
            .unwrap();

        uow.reassign_precedence(junior, LinkPrecedence::Secondary, Some(elder))
            .await
            .unwrap();
        let relinked = uow.relink_all(junior, elder).await.unwrap();
        assert_eq!(relinked, 1);

        let demoted = uow.fetch(junior).await.unwrap();
        assert!(demoted.is_secondary());
        assert_eq!(demoted.linked_id, Some(elder));
        assert_eq!(uow.fetch(dependent).await.unwrap().linked_id, Some(elder));
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_reassign_missing_contact_is_not_found() {
        let store = memory_store().await;
        let elder = seed_primary(&store, "a@x", "1").await;

        let mut uow = store.begin().await.unwrap();
        let result = uow
            .reassign_precedence(elder + 100, LinkPrecedence::Secondary, Some(elder))
            .await;
        assert!(matches!(result, Err(PersistenceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let store = memory_store().await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert(&NewContact::primary("a@x", "1")).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        uow.insert(&NewContact::primary("b@y", "2")).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_secondary_without_link_is_rejected() {
        let store = memory_store().await;
        let mut uow = store.begin().await.unwrap();

        let mut broken = NewContact::primary("a@x", "1");
        broken.link_precedence = LinkPrecedence::Secondary;
        let result = uow.insert(&broken).await;
        assert!(matches!(
            result,
            Err(PersistenceError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_timestamp_encoding_sorts_chronologically() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(encode_timestamp(earlier) < encode_timestamp(later));

        let decoded = decode_timestamp("created_at", &encode_timestamp(earlier)).unwrap();
        assert_eq!(decoded.timestamp_micros(), earlier.timestamp_micros());
        assert!(decode_timestamp("created_at", "yesterday").is_err());
    }
}
