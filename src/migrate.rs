//! Department migration: legacy products → normalized products.
//!
//! Legacy databases store the department as a free-text column on every
//! product. The migration moves those names into `departments` and rewrites
//! `products` to reference them by id:
//!
//! 1. copy the live table to [`BACKUP_TABLE`]
//! 2. upsert every distinct department name
//! 3. rewrite each row into a table with the normalized layout, re-validating
//!    it through [`ProductRecord::new`]
//! 4. swap the new table in, which drops the name column and installs the
//!    foreign key
//! 5. recreate indexes and the margin view, then verify
//!
//! Steps 1–4 run in one transaction. Verification runs after commit; a failed
//! verification is reported, never rolled back, and the backup stays.

use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::ingest::{parse_decimal, parse_integer, rejection_reason};
use crate::models::{DepartmentId, ProductRecord, RawProduct};
use crate::schema::{self, ProductsLayout};
use crate::store::{insert_into, upsert_department_with, CatalogStore};

/// Snapshot of the legacy table taken before it is rewritten.
pub const BACKUP_TABLE: &str = "products_legacy_backup";

const STAGING_TABLE: &str = "products_new";

/// Legacy rows are read in pages of this many rows.
const READ_PAGE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Completed,
    AlreadyNormalized,
    VerificationFailed,
}

/// A legacy row that was excluded from the normalized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRejection {
    /// Legacy product id, or `rowid <n>` when the id is missing.
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub products_after: i64,
    /// Products whose `department_id` matches no department.
    pub orphans: i64,
    /// Products whose department name differs from their legacy string.
    pub name_mismatches: i64,
    /// `rows_before == rows_migrated + rows_rejected`.
    pub count_matches: bool,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.orphans == 0 && self.name_mismatches == 0 && self.count_matches
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub status: MigrationStatus,
    pub rows_before: i64,
    pub rows_migrated: i64,
    pub rows_rejected: Vec<MigrationRejection>,
    pub departments_created: u64,
    /// `None` when nothing was migrated.
    pub backup_table: Option<String>,
    pub verification: Option<Verification>,
}

impl MigrationSummary {
    pub fn succeeded(&self) -> bool {
        self.status != MigrationStatus::VerificationFailed
    }
}

/// Migrate a legacy catalog to the normalized layout.
///
/// Returns `Ok` with status [`MigrationStatus::VerificationFailed`] when the
/// rewrite committed but the checks did not pass; the caller decides how to
/// surface that. Fails with [`CatalogError::Migration`] when there is no
/// products table or a backup from an earlier run still exists.
pub async fn migrate_departments(store: &CatalogStore) -> CatalogResult<MigrationSummary> {
    let pool = store.pool();

    match schema::products_layout(pool).await? {
        ProductsLayout::Legacy => {}
        ProductsLayout::Normalized => {
            let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
                .fetch_one(pool)
                .await?;
            info!(rows, "products already normalized; nothing to migrate");
            return Ok(MigrationSummary {
                status: MigrationStatus::AlreadyNormalized,
                rows_before: rows,
                rows_migrated: 0,
                rows_rejected: Vec::new(),
                departments_created: 0,
                backup_table: None,
                verification: None,
            });
        }
        ProductsLayout::Missing => {
            return Err(CatalogError::Migration(
                "no products table to migrate".to_string(),
            ))
        }
    }

    if schema::table_exists(pool, BACKUP_TABLE).await? {
        return Err(CatalogError::Migration(format!(
            "backup table {} already exists; drop or restore it before migrating again",
            BACKUP_TABLE
        )));
    }

    // Creates `departments`; leaves the legacy table untouched.
    schema::install_schema(pool).await?;

    let mut tx = pool.begin().await?;

    sqlx::query(&format!("CREATE TABLE {} AS SELECT * FROM products", BACKUP_TABLE))
        .execute(&mut *tx)
        .await?;
    let rows_before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&mut *tx)
        .await?;
    info!(rows = rows_before, backup = BACKUP_TABLE, "legacy products backed up");

    let (departments, departments_created) = create_departments(&mut tx).await?;
    info!(
        departments = departments.len(),
        created = departments_created,
        "departments resolved"
    );

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", STAGING_TABLE))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&schema::products_ddl(STAGING_TABLE))
        .execute(&mut *tx)
        .await?;

    let (rows_migrated, rows_rejected) = rewrite_products(&mut tx, &departments).await?;

    sqlx::query("DROP VIEW IF EXISTS products_with_margin")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DROP TABLE products").execute(&mut *tx).await?;
    sqlx::query(&format!("ALTER TABLE {} RENAME TO products", STAGING_TABLE))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(
        migrated = rows_migrated,
        rejected = rows_rejected.len(),
        "products table rewritten"
    );

    schema::install_product_indexes(pool).await?;
    schema::install_margin_view(pool).await?;

    let verification = verify(store, rows_before, rows_migrated, rows_rejected.len()).await?;
    let status = if verification.passed() {
        info!(products = verification.products_after, "migration verified");
        MigrationStatus::Completed
    } else {
        warn!(
            orphans = verification.orphans,
            name_mismatches = verification.name_mismatches,
            count_matches = verification.count_matches,
            backup = BACKUP_TABLE,
            "migration verification failed; the backup table is authoritative"
        );
        MigrationStatus::VerificationFailed
    };

    Ok(MigrationSummary {
        status,
        rows_before,
        rows_migrated,
        rows_rejected,
        departments_created,
        backup_table: Some(BACKUP_TABLE.to_string()),
        verification: Some(verification),
    })
}

async fn create_departments(
    conn: &mut SqliteConnection,
) -> CatalogResult<(HashMap<String, DepartmentId>, u64)> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT TRIM(department) FROM products
         WHERE department IS NOT NULL AND TRIM(department) != ''",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut map = HashMap::with_capacity(names.len());
    let mut created = 0;
    for name in names {
        let (id, inserted) = upsert_department_with(conn, &name).await?;
        if inserted {
            created += 1;
        }
        map.insert(name, id);
    }
    Ok((map, created))
}

/// Copy every legacy row into the staging table, keyed by rowid so rows
/// with a NULL id are still visited.
async fn rewrite_products(
    conn: &mut SqliteConnection,
    departments: &HashMap<String, DepartmentId>,
) -> CatalogResult<(i64, Vec<MigrationRejection>)> {
    let mut migrated = 0;
    let mut rejected = Vec::new();
    let mut last_rowid = i64::MIN;
    let now = chrono::Utc::now().timestamp();

    loop {
        let rows = sqlx::query(
            r#"
            SELECT rowid,
                   CAST(id AS TEXT) AS id,
                   CAST(cost AS TEXT) AS cost,
                   category,
                   name,
                   brand,
                   CAST(retail_price AS TEXT) AS retail_price,
                   department,
                   sku,
                   CAST(distribution_center_id AS TEXT) AS distribution_center_id,
                   typeof(created_at) AS created_at_type,
                   CAST(created_at AS TEXT) AS created_at
            FROM products
            WHERE rowid > ?
            ORDER BY rowid
            LIMIT ?
            "#,
        )
        .bind(last_rowid)
        .bind(READ_PAGE)
        .fetch_all(&mut *conn)
        .await?;

        let Some(last) = rows.last() else {
            break;
        };
        last_rowid = last.try_get("rowid")?;

        for row in rows {
            let rowid: i64 = row.try_get("rowid")?;
            let id: Option<String> = row.try_get("id")?;
            let key = match id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => format!("rowid {}", rowid),
            };
            let created_at = legacy_created_at(&row, &key)?.unwrap_or(now);

            let outcome = match legacy_record(&row) {
                Ok(record) => match departments.get(record.department()) {
                    Some(&department_id) => {
                        insert_into(conn, STAGING_TABLE, &record, department_id, created_at)
                            .await
                    }
                    None => Err(CatalogError::validation("department", "is unknown")),
                },
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => migrated += 1,
                Err(err) if err.is_storage() => return Err(err),
                Err(err) => {
                    let reason = rejection_reason(&err);
                    warn!(id = %key, reason = %reason, "legacy row excluded");
                    rejected.push(MigrationRejection { id: key, reason });
                }
            }
        }
        debug!(migrated, rejected = rejected.len(), "legacy page rewritten");
    }

    Ok((migrated, rejected))
}

fn legacy_record(row: &sqlx::sqlite::SqliteRow) -> CatalogResult<ProductRecord> {
    let text = |column: &str| -> CatalogResult<String> {
        Ok(row
            .try_get::<Option<String>, _>(column)?
            .unwrap_or_default()
            .trim()
            .to_string())
    };

    ProductRecord::new(RawProduct {
        id: text("id")?,
        cost: parse_decimal("cost", &text("cost")?)?,
        retail_price: parse_decimal("retail_price", &text("retail_price")?)?,
        category: text("category")?,
        name: text("name")?,
        brand: text("brand")?,
        sku: text("sku")?,
        distribution_center_id: parse_integer(
            "distribution_center_id",
            &text("distribution_center_id")?,
        )?,
        department: text("department")?,
    })
}

/// Legacy `created_at` as unix seconds. The column is declared `TIMESTAMP`,
/// so it may hold `CURRENT_TIMESTAMP` text (`YYYY-MM-DD HH:MM:SS`, UTC) or a
/// number of seconds. `None` for NULL or text that is no known timestamp.
fn legacy_created_at(row: &sqlx::sqlite::SqliteRow, key: &str) -> CatalogResult<Option<i64>> {
    let kind: String = row.try_get("created_at_type")?;
    let Some(raw) = row.try_get::<Option<String>, _>("created_at")? else {
        return Ok(None);
    };
    let raw = raw.trim();

    let parsed = match kind.as_str() {
        "integer" => raw.parse::<i64>().ok(),
        "real" => raw.parse::<f64>().ok().map(|secs| secs as i64),
        _ => parse_timestamp_text(raw),
    };
    if parsed.is_none() {
        warn!(id = %key, created_at = %raw, "unreadable legacy created_at; using now");
    }
    Ok(parsed)
}

fn parse_timestamp_text(raw: &str) -> Option<i64> {
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ts.timestamp());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|ts| ts.and_utc().timestamp())
}

async fn verify(
    store: &CatalogStore,
    rows_before: i64,
    rows_migrated: i64,
    rows_rejected: usize,
) -> CatalogResult<Verification> {
    let pool = store.pool();

    let products_after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products p
         LEFT JOIN departments d ON d.id = p.department_id
         WHERE d.id IS NULL",
    )
    .fetch_one(pool)
    .await?;
    let name_mismatches: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM products p
         JOIN {} b ON TRIM(CAST(b.id AS TEXT)) = p.id
         JOIN departments d ON d.id = p.department_id
         WHERE TRIM(b.department) IS NOT d.name",
        BACKUP_TABLE
    ))
    .fetch_one(pool)
    .await?;

    Ok(Verification {
        products_after,
        orphans,
        name_mismatches,
        count_matches: products_after == rows_migrated
            && rows_before == rows_migrated + rows_rejected as i64,
    })
}
