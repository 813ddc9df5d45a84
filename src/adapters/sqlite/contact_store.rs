//! SQLite implementation of the ContactStore.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{from_millis, to_millis};
use crate::domain::errors::ContactError;
use crate::domain::models::{Contact, KnownContact};
use crate::domain::ports::ContactStore;

#[derive(Clone)]
pub struct SqliteContactStore {
    pool: SqlitePool,
}

impl SqliteContactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn get(&self, id: &str) -> Result<Option<Contact>, ContactError> {
        let row: Option<ContactRow> = sqlx::query_as(
            "SELECT node_id, address, port, last_seen FROM contacts WHERE node_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| KnownContact::try_from(r).map(|k| k.contact))
            .transpose()
    }

    async fn upsert(&self, contact: &Contact) -> Result<(), ContactError> {
        sqlx::query(
            r#"INSERT INTO contacts (node_id, address, port, last_seen)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(node_id) DO UPDATE SET
                   address = excluded.address,
                   port = excluded.port,
                   last_seen = excluded.last_seen"#,
        )
        .bind(&contact.id)
        .bind(&contact.address)
        .bind(i64::from(contact.port))
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<KnownContact>, ContactError> {
        let rows: Vec<ContactRow> = sqlx::query_as(
            r#"SELECT node_id, address, port, last_seen FROM contacts
               ORDER BY last_seen DESC, node_id
               LIMIT ?"#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(KnownContact::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    node_id: String,
    address: String,
    port: i64,
    last_seen: i64,
}

impl TryFrom<ContactRow> for KnownContact {
    type Error = ContactError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let port = u16::try_from(row.port).map_err(|_| {
            ContactError::InvalidRecord(format!("{}: port {} out of range", row.node_id, row.port))
        })?;
        let last_seen = from_millis(row.last_seen).ok_or_else(|| {
            ContactError::InvalidRecord(format!("{}: bad last_seen {}", row.node_id, row.last_seen))
        })?;
        Ok(Self {
            contact: Contact::new(row.node_id, row.address, port),
            last_seen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_store() -> SqliteContactStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteContactStore::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = setup_store().await;
        assert!(store.get("node-a").await.unwrap().is_none());

        store.upsert(&Contact::new("node-a", "10.0.0.1", 4000)).await.unwrap();
        store.upsert(&Contact::new("node-a", "10.0.0.2", 4001)).await.unwrap();

        let contact = store.get("node-a").await.unwrap().unwrap();
        assert_eq!(contact, Contact::new("node-a", "10.0.0.2", 4001));
    }

    #[tokio::test]
    async fn test_recent_orders_by_last_seen() {
        let store = setup_store().await;
        store.upsert(&Contact::new("old", "10.0.0.1", 4000)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.upsert(&Contact::new("new", "10.0.0.2", 4000)).await.unwrap();

        let recent = store.recent(10).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|k| k.contact.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        assert_eq!(store.recent(1).await.unwrap().len(), 1);
    }
}
