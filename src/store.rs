//! SQLite-backed Catalog Store.
//!
//! Owns both relations. Writes go through [`upsert_department_with`] and
//! [`insert_product_with`], which take a bare connection so the ingestion
//! pipeline and the migration can run them inside their own transactions.
//! The query composer and the aggregation engine only ever read through
//! [`CatalogStore::pool`].

use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::config::Config;
use crate::db;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    format_ts_iso, price_to_stored, DepartmentDetail, DepartmentId, DepartmentRef, ProductRecord,
};
use crate::schema::{self, ProductsLayout};

/// Shared handle to the catalog database.
///
/// Cloning is cheap; every clone shares the same connection pool.
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> CatalogResult<Self> {
        let pool = db::connect(config).await?;
        schema::install_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn layout(&self) -> CatalogResult<ProductsLayout> {
        schema::products_layout(&self.pool).await
    }

    /// Return the id of the department called `name`, creating it if needed.
    ///
    /// Idempotent: a second call with the same name returns the same id.
    pub async fn upsert_department(&self, name: &str) -> CatalogResult<DepartmentId> {
        let mut conn = self.pool.acquire().await?;
        let (id, _) = upsert_department_with(&mut conn, name).await?;
        Ok(id)
    }

    /// Insert one product under an existing department.
    ///
    /// Fails with [`CatalogError::Integrity`] if the id is already present or
    /// the department does not exist. Products are never upserted.
    pub async fn insert_product(
        &self,
        record: &ProductRecord,
        department_id: DepartmentId,
    ) -> CatalogResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_product_with(&mut conn, record, department_id).await
    }

    pub async fn department_ref(&self, id: DepartmentId) -> CatalogResult<Option<DepartmentRef>> {
        let row = sqlx::query("SELECT id, name FROM departments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| DepartmentRef {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    pub async fn department_id_by_name(&self, name: &str) -> CatalogResult<Option<DepartmentId>> {
        let mut conn = self.pool.acquire().await?;
        department_id_by_name_with(&mut conn, name).await
    }

    /// Department with its product count, or `None` if the id is unknown.
    pub async fn department_detail(
        &self,
        id: DepartmentId,
    ) -> CatalogResult<Option<DepartmentDetail>> {
        let row = sqlx::query(
            r#"
            SELECT d.id, d.name, d.created_at, d.updated_at, COUNT(p.id) AS product_count
            FROM departments d
            LEFT JOIN products p ON p.department_id = d.id
            WHERE d.id = ?
            GROUP BY d.id, d.name, d.created_at, d.updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DepartmentDetail {
            id: r.get("id"),
            name: r.get("name"),
            product_count: r.get("product_count"),
            created_at: format_ts_iso(r.get("created_at")),
            updated_at: format_ts_iso(r.get("updated_at")),
        }))
    }
}

/// Upsert a department on an open connection or transaction.
///
/// Returns the id and whether this call created the row.
pub async fn upsert_department_with(
    conn: &mut SqliteConnection,
    name: &str,
) -> CatalogResult<(DepartmentId, bool)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::validation("department", "is empty"));
    }

    let now = chrono::Utc::now().timestamp();
    let inserted = sqlx::query(
        "INSERT INTO departments (name, created_at, updated_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
    )
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        == 1;

    let id: DepartmentId = sqlx::query_scalar("SELECT id FROM departments WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    if inserted {
        debug!(department = name, id, "created department");
    }
    Ok((id, inserted))
}

/// Look up a department id by its exact, trimmed name.
pub async fn department_id_by_name_with(
    conn: &mut SqliteConnection,
    name: &str,
) -> CatalogResult<Option<DepartmentId>> {
    let id = sqlx::query_scalar("SELECT id FROM departments WHERE name = ?")
        .bind(name.trim())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

/// Insert a product on an open connection or transaction.
pub async fn insert_product_with(
    conn: &mut SqliteConnection,
    record: &ProductRecord,
    department_id: DepartmentId,
) -> CatalogResult<()> {
    let now = chrono::Utc::now().timestamp();
    insert_into(conn, "products", record, department_id, now).await
}

/// Insert into `table`, which must have the normalized products layout.
pub(crate) async fn insert_into(
    conn: &mut SqliteConnection,
    table: &str,
    record: &ProductRecord,
    department_id: DepartmentId,
    created_at: i64,
) -> CatalogResult<()> {
    let cost = price_to_stored("cost", record.cost())?;
    let retail_price = price_to_stored("retail_price", record.retail_price())?;
    let now = chrono::Utc::now().timestamp();

    let sql = format!(
        "INSERT INTO {} (id, cost, category, name, brand, retail_price, sku, distribution_center_id, department_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table
    );
    sqlx::query(&sql)
        .bind(record.id())
        .bind(cost)
        .bind(record.category())
        .bind(record.name())
        .bind(record.brand())
        .bind(retail_price)
        .bind(record.sku())
        .bind(record.distribution_center_id())
        .bind(department_id)
        .bind(created_at)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::RawProduct;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::TempDir;

    pub async fn open_store(tmp: &TempDir) -> CatalogStore {
        let config = Config::with_db_path(tmp.path().join("catalog.sqlite"));
        CatalogStore::open(&config).await.unwrap()
    }

    pub fn record(
        id: &str,
        name: &str,
        category: &str,
        brand: &str,
        cost: &str,
        retail: &str,
        department: &str,
    ) -> ProductRecord {
        ProductRecord::new(RawProduct {
            id: id.to_string(),
            cost: Decimal::from_str(cost).unwrap(),
            retail_price: Decimal::from_str(retail).unwrap(),
            category: category.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            sku: format!("SKU-{}", id),
            distribution_center_id: 1,
            department: department.to_string(),
        })
        .unwrap()
    }

    /// Insert records, creating departments by name as ingestion would.
    pub async fn seed(store: &CatalogStore, records: &[ProductRecord]) {
        for r in records {
            let dept = store.upsert_department(r.department()).await.unwrap();
            store.insert_product(r, dept).await.unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_department_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let first = store.upsert_department("Men").await.unwrap();
        let second = store.upsert_department("Men").await.unwrap();
        let trimmed = store.upsert_department("  Men ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, trimmed);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_upsert_department_rejects_blank_name() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let err = store.upsert_department("   ").await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_insert_product_duplicate_id_is_integrity_error() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let dept = store.upsert_department("Men").await.unwrap();
        let r = record("P1", "Jacket", "Outerwear", "Acme", "10", "20", "Men");

        store.insert_product(&r, dept).await.unwrap();
        let err = store.insert_product(&r, dept).await.unwrap_err();
        assert!(matches!(err, CatalogError::Integrity(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_insert_product_unknown_department_is_integrity_error() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let r = record("P1", "Jacket", "Outerwear", "Acme", "10", "20", "Men");

        let err = store.insert_product(&r, 999).await.unwrap_err();
        assert!(matches!(err, CatalogError::Integrity(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_prices_stored_at_fixed_precision() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        seed(
            &store,
            &[record("P1", "Jacket", "Outerwear", "Acme", "10.12345", "20.5", "Men")],
        )
        .await;

        let (cost, retail): (i64, i64) =
            sqlx::query_as("SELECT cost, retail_price FROM products WHERE id = 'P1'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(cost, 101_235);
        assert_eq!(retail, 205_000);
    }

    #[tokio::test]
    async fn test_department_detail_counts_products() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        seed(
            &store,
            &[
                record("P1", "Jacket", "Outerwear", "Acme", "10", "20", "Men"),
                record("P2", "Shirt", "Tops", "Acme", "5", "9", "Men"),
            ],
        )
        .await;
        let empty = store.upsert_department("Women").await.unwrap();

        let men = store.department_id_by_name("Men").await.unwrap().unwrap();
        let detail = store.department_detail(men).await.unwrap().unwrap();
        assert_eq!(detail.name, "Men");
        assert_eq!(detail.product_count, 2);
        assert!(detail.created_at.ends_with('Z'));

        let detail = store.department_detail(empty).await.unwrap().unwrap();
        assert_eq!(detail.product_count, 0);
        assert!(store.department_detail(12345).await.unwrap().is_none());
    }
}
