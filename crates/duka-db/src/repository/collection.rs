//! # Collection Store
//!
//! Key/value access to one collection of records.
//!
//! ## Storage Layout
//! ```text
//! records
//! ┌──────────────────────────┬──────────┬──────────────────────┬────────────┐
//! │ collection               │ id       │ payload (JSON)       │ updated_at │
//! ├──────────────────────────┼──────────┼──────────────────────┼────────────┤
//! │ products                 │ 7c1f...  │ {"id":"7c1f",...}    │ 2026-...   │
//! │ accounting_transactions  │ 9a04...  │ {"entries":[...]}    │ 2026-...   │
//! └──────────────────────────┴──────────┴──────────────────────┴────────────┘
//! ```
//!
//! Saving upserts by id. Collections marked append-only (the journal)
//! reject a second write of the same id and refuse deletes.

use std::marker::PhantomData;

use chrono::Utc;
use duka_core::deferred::{Layaway, SalesOrder, WorkOrder};
use duka_core::ledger::{Account, AccountingTransaction};
use duka_core::{Customer, Expense, Product, Sale, Settings, Shift};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

// =============================================================================
// Record Trait
// =============================================================================

/// A core type stored under a named collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Collection name, e.g. `"products"`.
    const COLLECTION: &'static str;

    /// When true, ids are written once and never deleted.
    const APPEND_ONLY: bool = false;

    fn record_id(&self) -> &str;
}

macro_rules! record {
    ($ty:ty, $collection:literal) => {
        impl Record for $ty {
            const COLLECTION: &'static str = $collection;

            fn record_id(&self) -> &str {
                &self.id
            }
        }
    };
}

record!(Product, "products");
record!(Customer, "customers");
record!(Account, "accounts");
record!(Sale, "sales");
record!(Expense, "expenses");
record!(Shift, "shifts");
record!(Layaway, "layaways");
record!(WorkOrder, "work_orders");
record!(SalesOrder, "sales_orders");

impl Record for AccountingTransaction {
    const COLLECTION: &'static str = "accounting_transactions";
    const APPEND_ONLY: bool = true;

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Store configuration, kept as a single record.
impl Record for Settings {
    const COLLECTION: &'static str = "settings";

    fn record_id(&self) -> &str {
        SETTINGS_ID
    }
}

/// Id of the one settings record.
pub const SETTINGS_ID: &str = "store";

// =============================================================================
// Row Helpers
// =============================================================================

/// Writes one record on an open connection or transaction.
pub(crate) async fn write_record<R: Record>(conn: &mut SqliteConnection, record: &R) -> DbResult<()> {
    let id = record.record_id();
    let payload = serde_json::to_string(record)?;
    let updated_at = Utc::now().to_rfc3339();

    let sql = if R::APPEND_ONLY {
        "INSERT INTO records (collection, id, payload, updated_at) VALUES (?1, ?2, ?3, ?4)"
    } else {
        "INSERT INTO records (collection, id, payload, updated_at) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (collection, id) DO UPDATE SET \
         payload = excluded.payload, updated_at = excluded.updated_at"
    };

    let result = sqlx::query(sql)
        .bind(R::COLLECTION)
        .bind(id)
        .bind(&payload)
        .bind(&updated_at)
        .execute(&mut *conn)
        .await;

    match result.map_err(DbError::from) {
        Ok(_) => {
            debug!(collection = R::COLLECTION, id, "Record written");
            Ok(())
        }
        Err(DbError::UniqueViolation { .. }) => {
            Err(DbError::duplicate(format!("{} id", R::COLLECTION), id))
        }
        Err(e) => Err(e),
    }
}

fn decode<R: Record>(payload: &str) -> DbResult<R> {
    Ok(serde_json::from_str(payload)?)
}

// =============================================================================
// Collection Store
// =============================================================================

/// Typed access to one collection.
///
/// ## Example
/// ```rust,ignore
/// let store = db.collection::<Product>();
/// store.save(&product).await?;
/// let same = store.get(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CollectionStore<R> {
    pool: SqlitePool,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> CollectionStore<R> {
    pub fn new(pool: SqlitePool) -> Self {
        CollectionStore {
            pool,
            _record: PhantomData,
        }
    }

    /// Every record in the collection, in first-write order.
    pub async fn get_all(&self) -> DbResult<Vec<R>> {
        let payloads: Vec<String> = sqlx::query_scalar(
            "SELECT payload FROM records WHERE collection = ?1 ORDER BY rowid",
        )
        .bind(R::COLLECTION)
        .fetch_all(&self.pool)
        .await?;

        payloads.iter().map(|p| decode::<R>(p)).collect()
    }

    /// Looks up a record, `None` when absent.
    pub async fn find(&self, id: &str) -> DbResult<Option<R>> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM records WHERE collection = ?1 AND id = ?2",
        )
        .bind(R::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        payload.as_deref().map(decode::<R>).transpose()
    }

    /// Looks up a record.
    ///
    /// ## Errors
    /// `DbError::NotFound` when no record has this id.
    pub async fn get(&self, id: &str) -> DbResult<R> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found(R::COLLECTION, id))
    }

    /// Inserts or replaces a record. Append-only collections insert only.
    pub async fn save(&self, record: &R) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        write_record(&mut *conn, record).await
    }

    /// Removes a record.
    ///
    /// ## Errors
    /// - `DbError::AppendOnly` for the journal
    /// - `DbError::NotFound` when no record has this id
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        if R::APPEND_ONLY {
            return Err(DbError::AppendOnly {
                collection: R::COLLECTION.to_string(),
                id: id.to_string(),
            });
        }

        let result = sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
            .bind(R::COLLECTION)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(R::COLLECTION, id));
        }
        debug!(collection = R::COLLECTION, id, "Record deleted");
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?1")
            .bind(R::COLLECTION)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{customer, product};
    use duka_core::ledger::{AccountType, JournalLine, Ledger, ChartOfAccounts, ReferenceType};
    use duka_core::Money;

    #[tokio::test]
    async fn test_save_get_and_upsert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.collection::<Product>();

        let mut rice = product("p-1", "RICE-2KG", 250, 5);
        store.save(&rice).await.unwrap();
        assert_eq!(store.get("p-1").await.unwrap(), rice);

        rice.stock = 3;
        store.save(&rice).await.unwrap();
        assert_eq!(store.get("p-1").await.unwrap().stock, 3);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_all_keeps_first_write_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.collection::<Product>();

        for (id, sku) in [("p-b", "SUGAR"), ("p-a", "SALT"), ("p-c", "TEA")] {
            store.save(&product(id, sku, 100, 1)).await.unwrap();
        }
        // Updating keeps the original position
        store.save(&product("p-b", "SUGAR", 120, 1)).await.unwrap();

        let ids: Vec<String> = store.get_all().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p-b", "p-a", "p-c"]);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.collection::<Customer>();

        assert!(store.find("nobody").await.unwrap().is_none());
        assert!(matches!(
            store.get("nobody").await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("nobody").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.collection::<Customer>()
            .save(&customer("x-1"))
            .await
            .unwrap();

        assert!(db.collection::<Product>().find("x-1").await.unwrap().is_none());
        db.collection::<Customer>().delete("x-1").await.unwrap();
        assert_eq!(db.collection::<Customer>().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_journal_is_append_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.collection::<AccountingTransaction>();

        let ledger = Ledger::new(ChartOfAccounts::standard());
        let tx = ledger
            .prepare(
                "Owner contribution",
                "capital-1",
                ReferenceType::Adjustment,
                vec![
                    JournalLine::debit("1000", Money::from_major(500)),
                    JournalLine::credit("3000", Money::from_major(500)),
                ],
            )
            .unwrap();

        store.save(&tx).await.unwrap();
        let err = store.save(&tx).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == &tx.id));

        assert!(matches!(
            store.delete(&tx.id).await,
            Err(DbError::AppendOnly { .. })
        ));
        assert_eq!(store.get(&tx.id).await.unwrap(), tx);
        assert_eq!(
            ledger.chart().require("3000").unwrap().account_type,
            AccountType::Equity
        );
    }
}
