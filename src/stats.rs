//! Aggregation Engine: catalog statistics and health checks.
//!
//! Every figure is computed by the store (`COUNT`, `SUM`, `MIN`, `MAX`,
//! grouped top-N) so no caller ever scans the product set. Prices are summed
//! as scaled integers, which keeps totals exact; the average is derived in
//! [`Decimal`] from that sum.
//!
//! Nothing is cached: each call reflects the rows present when it runs.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    price_from_stored, round_2, DepartmentId, DepartmentRef, ProductWithDepartment,
};
use crate::query::{product_from_row, PRODUCT_COLUMNS};
use crate::store::CatalogStore;

/// Retail price summary, rounded to two digits. `None` for an empty scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceStats {
    pub average_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopEntry {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    /// Set for department-scoped statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentRef>,
    pub total_products: i64,
    pub total_categories: i64,
    pub total_brands: i64,
    pub total_departments: i64,
    pub price_stats: PriceStats,
    pub top_categories: Vec<TopEntry>,
    pub top_brands: Vec<TopEntry>,
    pub top_departments: Vec<TopEntry>,
}

/// Post-load health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogHealth {
    pub products: i64,
    pub departments: i64,
    /// Negative cost or non-positive retail price.
    pub invalid_prices: i64,
    /// Products whose department resolves.
    pub linked_products: i64,
    pub orphans: i64,
}

impl CatalogHealth {
    pub fn is_healthy(&self) -> bool {
        self.orphans == 0 && self.invalid_prices == 0 && self.linked_products == self.products
    }
}

/// `getStatistics`: catalog-wide figures with the `top_n` largest groups.
pub async fn get_statistics(store: &CatalogStore, top_n: i64) -> CatalogResult<AggregateStats> {
    aggregate(store, None, top_n).await
}

/// Same figures as [`get_statistics`], restricted to one department.
pub async fn get_department_statistics(
    store: &CatalogStore,
    department_id: DepartmentId,
    top_n: i64,
) -> CatalogResult<AggregateStats> {
    let department = store
        .department_ref(department_id)
        .await?
        .ok_or_else(|| CatalogError::not_found("department", department_id))?;
    aggregate(store, Some(department), top_n).await
}

async fn aggregate(
    store: &CatalogStore,
    department: Option<DepartmentRef>,
    top_n: i64,
) -> CatalogResult<AggregateStats> {
    if top_n < 1 {
        return Err(CatalogError::validation("top_n", "must be at least 1"));
    }
    let scope = department.as_ref().map(|d| d.id);

    // One snapshot for every figure.
    let mut tx = store.pool().begin().await?;

    let (where_sql, and_sql) = match scope {
        Some(_) => ("WHERE department_id = ?", "AND department_id = ?"),
        None => ("", ""),
    };

    let totals_sql = format!(
        r#"
        SELECT
            COUNT(*) AS total_products,
            COUNT(DISTINCT category) AS total_categories,
            COUNT(DISTINCT NULLIF(brand, '')) AS total_brands,
            COUNT(DISTINCT department_id) AS total_departments,
            SUM(retail_price) AS price_sum,
            MIN(retail_price) AS min_price,
            MAX(retail_price) AS max_price
        FROM products
        {}
        "#,
        where_sql
    );
    let mut totals = sqlx::query(&totals_sql);
    if let Some(id) = scope {
        totals = totals.bind(id);
    }
    let row = totals.fetch_one(&mut *tx).await?;

    let total_products: i64 = row.try_get("total_products")?;
    let price_stats = if total_products == 0 {
        PriceStats::default()
    } else {
        let sum: i64 = row.try_get("price_sum")?;
        let min: i64 = row.try_get("min_price")?;
        let max: i64 = row.try_get("max_price")?;
        PriceStats {
            average_price: Some(round_2(
                price_from_stored(sum) / Decimal::from(total_products),
            )),
            min_price: Some(round_2(price_from_stored(min))),
            max_price: Some(round_2(price_from_stored(max))),
        }
    };

    let top_categories = top_groups(
        &mut tx,
        &format!(
            "SELECT category AS name, COUNT(*) AS count FROM products {} GROUP BY category",
            where_sql
        ),
        scope,
        top_n,
    )
    .await?;
    let top_brands = top_groups(
        &mut tx,
        &format!(
            "SELECT brand AS name, COUNT(*) AS count FROM products WHERE brand != '' {} GROUP BY brand",
            and_sql
        ),
        scope,
        top_n,
    )
    .await?;
    let top_departments = top_groups(
        &mut tx,
        &format!(
            "SELECT d.name AS name, COUNT(*) AS count
             FROM products p JOIN departments d ON d.id = p.department_id
             {} GROUP BY d.id, d.name",
            where_sql.replace("department_id", "p.department_id")
        ),
        scope,
        top_n,
    )
    .await?;

    tx.commit().await?;

    Ok(AggregateStats {
        department,
        total_products,
        total_categories: row.try_get("total_categories")?,
        total_brands: row.try_get("total_brands")?,
        total_departments: row.try_get("total_departments")?,
        price_stats,
        top_categories,
        top_brands,
        top_departments,
    })
}

/// Largest groups first, ties by ascending name.
async fn top_groups(
    conn: &mut SqliteConnection,
    grouped_sql: &str,
    scope: Option<DepartmentId>,
    top_n: i64,
) -> CatalogResult<Vec<TopEntry>> {
    let sql = format!(
        "SELECT name, count FROM ({}) ORDER BY count DESC, name ASC LIMIT ?",
        grouped_sql
    );
    let mut query = sqlx::query(&sql);
    if let Some(id) = scope {
        query = query.bind(id);
    }
    let rows = query.bind(top_n).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|r| -> CatalogResult<TopEntry> {
            Ok(TopEntry {
                name: r.try_get("name")?,
                count: r.try_get("count")?,
            })
        })
        .collect()
}

/// `verifyCatalog`: counts that should line up after every load.
pub async fn verify_catalog(store: &CatalogStore) -> CatalogResult<CatalogHealth> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM products) AS products,
            (SELECT COUNT(*) FROM departments) AS departments,
            (SELECT COUNT(*) FROM products WHERE cost < 0 OR retail_price <= 0) AS invalid_prices,
            (SELECT COUNT(*) FROM products p JOIN departments d ON d.id = p.department_id) AS linked_products,
            (SELECT COUNT(*) FROM products p LEFT JOIN departments d ON d.id = p.department_id
             WHERE d.id IS NULL) AS orphans
        "#,
    )
    .fetch_one(store.pool())
    .await?;

    Ok(CatalogHealth {
        products: row.try_get("products")?,
        departments: row.try_get("departments")?,
        invalid_prices: row.try_get("invalid_prices")?,
        linked_products: row.try_get("linked_products")?,
        orphans: row.try_get("orphans")?,
    })
}

/// `topMargins`: products with the largest absolute profit margin.
pub async fn top_margins(
    store: &CatalogStore,
    n: i64,
) -> CatalogResult<Vec<ProductWithDepartment>> {
    if n < 1 {
        return Err(CatalogError::validation("n", "must be at least 1"));
    }
    let sql = format!(
        "SELECT {} FROM products_with_margin ORDER BY profit_margin DESC, id ASC LIMIT ?",
        PRODUCT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(n).fetch_all(store.pool()).await?;
    rows.iter().map(product_from_row).collect()
}
