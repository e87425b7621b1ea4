//! Catalog schema installation.
//!
//! Creates the two relations (`departments`, `products`), their indexes and
//! the non-materialized `products_with_margin` view. Every statement is
//! idempotent, so `catalog init` can run any number of times.
//!
//! Money columns hold integers scaled by 10⁴ (see
//! [`PRICE_SCALE`](crate::models::PRICE_SCALE)); the margin percentage is a
//! ratio, so the scale cancels out in the view.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::CatalogResult;

/// Shape of the live `products` relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductsLayout {
    /// No `products` table yet.
    Missing,
    /// Products carry a raw `department` name column.
    Legacy,
    /// Products reference `departments(id)`.
    Normalized,
}

pub(crate) const DEPARTMENTS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS departments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// Normalized products table. `{table}` is substituted so the migration can
/// build the new relation beside the legacy one before swapping.
pub(crate) const PRODUCTS_DDL_TEMPLATE: &str = r#"
    CREATE TABLE IF NOT EXISTS {table} (
        id TEXT PRIMARY KEY CHECK (length(id) > 0),
        cost INTEGER NOT NULL CHECK (cost >= 0),
        category TEXT NOT NULL CHECK (length(category) > 0),
        name TEXT NOT NULL CHECK (length(name) > 0),
        brand TEXT NOT NULL,
        retail_price INTEGER NOT NULL CHECK (retail_price > 0),
        sku TEXT NOT NULL,
        distribution_center_id INTEGER NOT NULL CHECK (distribution_center_id > 0),
        department_id INTEGER NOT NULL REFERENCES departments(id),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        CHECK (cost <= retail_price)
    )
"#;

pub(crate) fn products_ddl(table: &str) -> String {
    PRODUCTS_DDL_TEMPLATE.replace("{table}", table)
}

const LEGACY_PRODUCTS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        cost REAL NOT NULL,
        category TEXT NOT NULL,
        name TEXT NOT NULL,
        brand TEXT NOT NULL,
        retail_price REAL NOT NULL,
        department TEXT NOT NULL,
        sku TEXT NOT NULL,
        distribution_center_id INTEGER NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const MARGIN_VIEW_DDL: &str = r#"
    CREATE VIEW IF NOT EXISTS products_with_margin AS
    SELECT
        p.id,
        p.cost,
        p.category,
        p.name,
        p.brand,
        p.retail_price,
        p.sku,
        p.distribution_center_id,
        p.department_id,
        d.name AS department_name,
        p.created_at,
        p.updated_at,
        (p.retail_price - p.cost) AS profit_margin,
        ROUND((p.retail_price - p.cost) * 100.0 / p.retail_price, 2) AS profit_margin_percentage
    FROM products p
    JOIN departments d ON d.id = p.department_id
"#;

const PRODUCT_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)",
    "CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand)",
    "CREATE INDEX IF NOT EXISTS idx_products_department_id ON products(department_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_distribution_center ON products(distribution_center_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_sku ON products(sku)",
];

/// Install the normalized catalog schema.
///
/// When the live `products` table still has the legacy layout, only the
/// `departments` relation is created; the product relation, its indexes and
/// the margin view are left to the department migration.
pub async fn install_schema(pool: &SqlitePool) -> CatalogResult<ProductsLayout> {
    sqlx::query(DEPARTMENTS_DDL).execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_departments_name ON departments(name)")
        .execute(pool)
        .await?;

    let layout = products_layout(pool).await?;
    if layout == ProductsLayout::Legacy {
        info!("products table has the legacy layout; run the department migration");
        return Ok(layout);
    }

    sqlx::query(&products_ddl("products")).execute(pool).await?;
    install_product_indexes(pool).await?;
    install_margin_view(pool).await?;

    debug!("catalog schema installed");
    Ok(ProductsLayout::Normalized)
}

/// Create the pre-normalization layout: products carrying a department name.
pub async fn install_legacy_schema(pool: &SqlitePool) -> CatalogResult<()> {
    sqlx::query(LEGACY_PRODUCTS_DDL).execute(pool).await?;
    Ok(())
}

pub(crate) async fn install_product_indexes(pool: &SqlitePool) -> CatalogResult<()> {
    for ddl in PRODUCT_INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

pub(crate) async fn install_margin_view(pool: &SqlitePool) -> CatalogResult<()> {
    sqlx::query(MARGIN_VIEW_DDL).execute(pool).await?;
    Ok(())
}

/// Inspect the columns of the live `products` relation.
pub async fn products_layout(pool: &SqlitePool) -> CatalogResult<ProductsLayout> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('products')")
        .fetch_all(pool)
        .await?;

    let layout = if columns.is_empty() {
        ProductsLayout::Missing
    } else if columns.iter().any(|c| c == "department") {
        ProductsLayout::Legacy
    } else {
        ProductsLayout::Normalized
    };
    Ok(layout)
}

pub(crate) async fn table_exists(pool: &SqlitePool, name: &str) -> CatalogResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}
