//! Query Composer: filtered, paginated reads over the catalog.
//!
//! Every call takes an explicit, immutable request ([`ProductFilters`] +
//! [`PageRequest`]); nothing is remembered between calls. Results are
//! ordered by product id so consecutive pages never overlap or skip rows,
//! and the count and the page are read inside one transaction so they
//! describe the same snapshot.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection};

use crate::config::QueryConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    format_ts_iso, price_from_stored, DepartmentDetail, DepartmentId, DepartmentRef,
    DepartmentSummary, ProductMargin, ProductWithDepartment,
};
use crate::store::{department_id_by_name_with, CatalogStore};

/// Product filters, combined with AND. Empty or blank strings are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub brand: Option<String>,
    /// Mutually exclusive with `department_name`.
    pub department_id: Option<DepartmentId>,
    pub department_name: Option<String>,
    /// Case-insensitive substring of the product name. SQLite's `lower()`
    /// folds ASCII letters only, so non-ASCII names match case-sensitively.
    pub search: Option<String>,
}

impl ProductFilters {
    fn category(&self) -> Option<&str> {
        non_blank(&self.category)
    }
    fn brand(&self) -> Option<&str> {
        non_blank(&self.brand)
    }
    fn department_name(&self) -> Option<&str> {
        non_blank(&self.department_name)
    }
    fn search(&self) -> Option<&str> {
        non_blank(&self.search)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Requested page. Missing values fall back to the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Parse raw query-string values. Blank values count as absent.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> CatalogResult<Self> {
        Ok(Self {
            page: parse_param("page", page)?,
            limit: parse_param("limit", limit)?,
        })
    }

    /// Effective `(page, limit)`: page below 1 becomes 1, limit is clamped
    /// to `[1, max_limit]`.
    fn resolve(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        (page, limit)
    }
}

fn parse_param(field: &str, value: Option<&str>) -> CatalogResult<Option<i64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| CatalogError::validation(field, "must be an integer")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// An empty result has `total_pages = 0` and no neighbours.
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if total_count <= 0 {
            0
        } else {
            (total_count + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total_count: total_count.max(0),
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1 && total_pages > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductWithDepartment>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentProductPage {
    pub department: DepartmentRef,
    pub department_name: String,
    pub products: Vec<ProductWithDepartment>,
    pub pagination: Pagination,
}

// ============ Filter compilation ============

enum Bind {
    Text(String),
    Int(i64),
}

/// WHERE clause over the `products_with_margin` view.
struct Predicate {
    clauses: Vec<&'static str>,
    binds: Vec<Bind>,
}

impl Predicate {
    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn bind_to<'q>(
        &'q self,
        mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        for bind in &self.binds {
            query = match bind {
                Bind::Text(v) => query.bind(v.as_str()),
                Bind::Int(v) => query.bind(*v),
            };
        }
        query
    }
}

/// Build the predicate, or `None` when a department name matches nothing
/// and the result is empty without asking for rows.
async fn compile(
    conn: &mut SqliteConnection,
    filters: &ProductFilters,
    scope: Option<DepartmentId>,
) -> CatalogResult<Option<Predicate>> {
    let mut predicate = Predicate {
        clauses: Vec::new(),
        binds: Vec::new(),
    };

    if let Some(id) = scope {
        predicate.clauses.push("department_id = ?");
        predicate.binds.push(Bind::Int(id));
    }

    match (filters.department_id, filters.department_name()) {
        (Some(_), Some(_)) => {
            return Err(CatalogError::validation(
                "department_name",
                "cannot be combined with department_id",
            ))
        }
        (Some(id), None) => {
            predicate.clauses.push("department_id = ?");
            predicate.binds.push(Bind::Int(id));
        }
        (None, Some(name)) => {
            let Some(id) = department_id_by_name_with(conn, name).await? else {
                return Ok(None);
            };
            predicate.clauses.push("department_id = ?");
            predicate.binds.push(Bind::Int(id));
        }
        (None, None) => {}
    }

    if let Some(category) = filters.category() {
        predicate.clauses.push("category = ?");
        predicate.binds.push(Bind::Text(category.to_string()));
    }
    if let Some(brand) = filters.brand() {
        predicate.clauses.push("brand = ?");
        predicate.binds.push(Bind::Text(brand.to_string()));
    }
    if let Some(search) = filters.search() {
        predicate.clauses.push("instr(lower(name), lower(?)) > 0");
        predicate.binds.push(Bind::Text(search.to_string()));
    }

    Ok(Some(predicate))
}

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, brand, category, cost, retail_price, sku, \
     distribution_center_id, department_id, department_name, created_at, updated_at";

pub(crate) fn product_from_row(row: &SqliteRow) -> CatalogResult<ProductWithDepartment> {
    let cost = price_from_stored(row.try_get("cost")?);
    let retail_price = price_from_stored(row.try_get("retail_price")?);
    let margin = ProductMargin::from_prices(cost, retail_price);

    Ok(ProductWithDepartment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        category: row.try_get("category")?,
        cost,
        retail_price,
        sku: row.try_get("sku")?,
        distribution_center_id: row.try_get("distribution_center_id")?,
        department: DepartmentRef {
            id: row.try_get("department_id")?,
            name: row.try_get("department_name")?,
        },
        profit_margin: margin.profit_margin,
        profit_margin_percentage: margin.profit_margin_percentage,
        created_at: format_ts_iso(row.try_get("created_at")?),
        updated_at: format_ts_iso(row.try_get("updated_at")?),
    })
}

async fn fetch_page(
    store: &CatalogStore,
    filters: &ProductFilters,
    scope: Option<DepartmentId>,
    page: i64,
    limit: i64,
) -> CatalogResult<ProductPage> {
    let mut tx = store.pool().begin().await?;

    let Some(predicate) = compile(&mut tx, filters, scope).await? else {
        tx.commit().await?;
        return Ok(ProductPage {
            products: Vec::new(),
            pagination: Pagination::new(page, limit, 0),
        });
    };
    let where_sql = predicate.sql();

    let count_sql = format!("SELECT COUNT(*) FROM products_with_margin {}", where_sql);
    let total_count: i64 = predicate
        .bind_to(sqlx::query(&count_sql))
        .fetch_one(&mut *tx)
        .await?
        .try_get(0)?;

    // Pages past the end, however large, are empty rather than an error.
    let offset = match (page - 1).checked_mul(limit) {
        Some(offset) if offset < total_count => offset,
        _ => {
            tx.commit().await?;
            return Ok(ProductPage {
                products: Vec::new(),
                pagination: Pagination::new(page, limit, total_count),
            });
        }
    };

    let page_sql = format!(
        "SELECT {} FROM products_with_margin {} ORDER BY id ASC LIMIT ? OFFSET ?",
        PRODUCT_COLUMNS, where_sql
    );
    let rows = predicate
        .bind_to(sqlx::query(&page_sql))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;
    tx.commit().await?;

    let products = rows
        .iter()
        .map(product_from_row)
        .collect::<CatalogResult<Vec<_>>>()?;

    Ok(ProductPage {
        products,
        pagination: Pagination::new(page, limit, total_count),
    })
}

// ============ Operations ============

/// `listProducts`: filtered, paginated products across all departments.
pub async fn list_products(
    store: &CatalogStore,
    filters: &ProductFilters,
    request: PageRequest,
    config: &QueryConfig,
) -> CatalogResult<ProductPage> {
    let (page, limit) = request.resolve(config.default_limit, config.max_limit);
    fetch_page(store, filters, None, page, limit).await
}

/// `listDepartmentProducts`: like [`list_products`], scoped to one
/// department. Fails with NotFound for an unknown department, even when
/// the other filters would match nothing.
pub async fn list_department_products(
    store: &CatalogStore,
    department_id: DepartmentId,
    filters: &ProductFilters,
    request: PageRequest,
    config: &QueryConfig,
) -> CatalogResult<DepartmentProductPage> {
    let department = store
        .department_ref(department_id)
        .await?
        .ok_or_else(|| CatalogError::not_found("department", department_id))?;

    let (page, limit) = request.resolve(config.grid_limit, config.max_limit);
    let result = fetch_page(store, filters, Some(department.id), page, limit).await?;

    Ok(DepartmentProductPage {
        department_name: department.name.clone(),
        department,
        products: result.products,
        pagination: result.pagination,
    })
}

/// `getProduct`
pub async fn get_product(store: &CatalogStore, id: &str) -> CatalogResult<ProductWithDepartment> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CatalogError::validation("id", "is empty"));
    }

    let sql = format!("SELECT {} FROM products_with_margin WHERE id = ?", PRODUCT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(store.pool())
        .await?
        .ok_or_else(|| CatalogError::not_found("product", id))?;
    product_from_row(&row)
}

/// `listDepartments`: every department with its product count, by name.
pub async fn list_departments(store: &CatalogStore) -> CatalogResult<Vec<DepartmentSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT d.id, d.name, COUNT(p.id) AS product_count
        FROM departments d
        LEFT JOIN products p ON p.department_id = d.id
        GROUP BY d.id, d.name
        ORDER BY d.name ASC
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    rows.iter()
        .map(|r| -> CatalogResult<DepartmentSummary> {
            Ok(DepartmentSummary {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                product_count: r.try_get("product_count")?,
            })
        })
        .collect()
}

/// `getDepartment`
pub async fn get_department(
    store: &CatalogStore,
    id: DepartmentId,
) -> CatalogResult<DepartmentDetail> {
    store
        .department_detail(id)
        .await?
        .ok_or_else(|| CatalogError::not_found("department", id))
}

/// `listCategories`: distinct categories, ascending.
pub async fn list_categories(store: &CatalogStore) -> CatalogResult<Vec<String>> {
    let categories = sqlx::query_scalar("SELECT DISTINCT category FROM products ORDER BY category")
        .fetch_all(store.pool())
        .await?;
    Ok(categories)
}

/// `listBrands`: distinct non-empty brands, ascending.
pub async fn list_brands(store: &CatalogStore) -> CatalogResult<Vec<String>> {
    let brands =
        sqlx::query_scalar("SELECT DISTINCT brand FROM products WHERE brand != '' ORDER BY brand")
            .fetch_all(store.pool())
            .await?;
    Ok(brands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn config() -> QueryConfig {
        QueryConfig::default()
    }

    async fn seeded(tmp: &TempDir) -> CatalogStore {
        let store = open_store(tmp).await;
        seed(
            &store,
            &[
                record("P01", "Slim Jeans", "Jeans", "Levi's", "20", "50", "Men"),
                record("P02", "Loose Jeans", "Jeans", "Levi's", "18", "45", "Women"),
                record("P03", "Rain Jacket", "Outerwear", "Acme", "30", "90", "Men"),
                record("P04", "Denim JACKET", "Outerwear", "Levi's", "40", "80", "Women"),
                record("P05", "Tee", "Tops", "Acme", "2", "3", "Men"),
                record("P06", "Polo", "Tops", "", "5", "15", "Men"),
                record("P07", "Blouse", "Tops", "Acme", "6", "12", "Women"),
            ],
        )
        .await;
        store
    }

    fn ids(page: &ProductPage) -> Vec<&str> {
        page.products.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_pagination_metadata() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(3, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(5, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn test_empty_result_has_zero_pages() {
        for page in [1, 4] {
            let p = Pagination::new(page, 10, 0);
            assert_eq!(p.total_pages, 0);
            assert!(!p.has_next);
            assert!(!p.has_prev);
        }
    }

    #[test]
    fn test_page_request_resolution() {
        assert_eq!(PageRequest::default().resolve(10, 100), (1, 10));
        assert_eq!(PageRequest::new(0, 0).resolve(10, 100), (1, 1));
        assert_eq!(PageRequest::new(-3, 500).resolve(10, 100), (1, 100));
        assert_eq!(PageRequest::new(7, 25).resolve(10, 100), (7, 25));
    }

    #[test]
    fn test_page_request_parse_rejects_non_integers() {
        let err = PageRequest::parse(Some("2"), Some("ten")).unwrap_err();
        assert_eq!(err.to_string(), "invalid limit: must be an integer");

        let parsed = PageRequest::parse(Some(" "), None).unwrap();
        assert_eq!(parsed, PageRequest::default());
    }

    #[tokio::test]
    async fn test_pages_concatenate_to_filtered_set() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        let filters = ProductFilters {
            brand: Some("Acme".to_string()),
            ..Default::default()
        };

        for limit in 1..=4 {
            let first = list_products(&store, &filters, PageRequest::new(1, limit), &config())
                .await
                .unwrap();
            let mut seen = Vec::new();
            for page in 1..=first.pagination.total_pages {
                let result =
                    list_products(&store, &filters, PageRequest::new(page, limit), &config())
                        .await
                        .unwrap();
                seen.extend(result.products.into_iter().map(|p| p.id));
            }
            assert_eq!(seen, vec!["P03", "P05", "P07"], "limit {limit}");
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(unique.len(), seen.len());
        }
    }

    #[tokio::test]
    async fn test_page_beyond_last_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;

        let result = list_products(
            &store,
            &ProductFilters::default(),
            PageRequest::new(9, 5),
            &config(),
        )
        .await
        .unwrap();
        assert!(result.products.is_empty());
        assert_eq!(result.pagination.total_count, 7);
        assert_eq!(result.pagination.total_pages, 2);
        assert!(!result.pagination.has_next);
        assert!(result.pagination.has_prev);
    }

    #[tokio::test]
    async fn test_huge_page_number_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;

        let result = list_products(
            &store,
            &ProductFilters::default(),
            PageRequest::new(i64::MAX, 10),
            &config(),
        )
        .await
        .unwrap();
        assert!(result.products.is_empty());
        assert_eq!(result.pagination.page, i64::MAX);
        assert_eq!(result.pagination.total_count, 7);
        assert_eq!(result.pagination.total_pages, 1);
        assert!(!result.pagination.has_next);
        assert!(result.pagination.has_prev);

        let params = PageRequest::parse(Some("9223372036854775807"), None).unwrap();
        let result = list_products(&store, &ProductFilters::default(), params, &config())
            .await
            .unwrap();
        assert!(result.products.is_empty());
    }

    #[tokio::test]
    async fn test_no_matching_category_returns_empty_page() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let filters = ProductFilters {
            category: Some("Jeans".to_string()),
            ..Default::default()
        };

        let result = list_products(&store, &filters, PageRequest::new(1, 10), &config())
            .await
            .unwrap();
        assert!(result.products.is_empty());
        assert_eq!(result.pagination.total_pages, 0);
        assert!(!result.pagination.has_next);
        assert!(!result.pagination.has_prev);
    }

    #[tokio::test]
    async fn test_filters_combine_with_and() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;

        let filters = ProductFilters {
            category: Some("Outerwear".to_string()),
            brand: Some("Levi's".to_string()),
            ..Default::default()
        };
        let result = list_products(&store, &filters, PageRequest::default(), &config())
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["P04"]);

        let filters = ProductFilters {
            department_name: Some("Women".to_string()),
            search: Some("jacket".to_string()),
            ..Default::default()
        };
        let result = list_products(&store, &filters, PageRequest::default(), &config())
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["P04"]);
        assert_eq!(result.products[0].department.name, "Women");
    }

    #[tokio::test]
    async fn test_blank_filters_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        let filters = ProductFilters {
            category: Some("  ".to_string()),
            search: Some(String::new()),
            ..Default::default()
        };

        let result = list_products(&store, &filters, PageRequest::default(), &config())
            .await
            .unwrap();
        assert_eq!(result.pagination.total_count, 7);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        let filters = ProductFilters {
            search: Some("JEAN".to_string()),
            ..Default::default()
        };

        let result = list_products(&store, &filters, PageRequest::default(), &config())
            .await
            .unwrap();
        assert_eq!(ids(&result), vec!["P01", "P02"]);
    }

    #[tokio::test]
    async fn test_search_folds_ascii_case_only() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        seed(
            &store,
            &[record("P01", "Été Dress", "Dresses", "Acme", "10", "30", "Women")],
        )
        .await;

        let search = |term: &str| ProductFilters {
            search: Some(term.to_string()),
            ..Default::default()
        };
        let matched = list_products(&store, &search("DRESS"), PageRequest::default(), &config())
            .await
            .unwrap();
        assert_eq!(ids(&matched), vec!["P01"]);

        let accented = list_products(&store, &search("été"), PageRequest::default(), &config())
            .await
            .unwrap();
        assert!(accented.products.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_department_name_matches_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        let filters = ProductFilters {
            department_name: Some("Kids".to_string()),
            ..Default::default()
        };

        let result = list_products(&store, &filters, PageRequest::default(), &config())
            .await
            .unwrap();
        assert!(result.products.is_empty());
        assert_eq!(result.pagination.total_pages, 0);
    }

    #[tokio::test]
    async fn test_department_id_and_name_together_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        let filters = ProductFilters {
            department_id: Some(1),
            department_name: Some("Men".to_string()),
            ..Default::default()
        };

        let err = list_products(&store, &filters, PageRequest::default(), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_scoped_query_uses_grid_default_and_intersects() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        let men = store.department_id_by_name("Men").await.unwrap().unwrap();

        let result = list_department_products(
            &store,
            men,
            &ProductFilters::default(),
            PageRequest::default(),
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(result.department_name, "Men");
        assert_eq!(result.pagination.limit, 12);
        assert_eq!(
            result.products.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["P01", "P03", "P05", "P06"]
        );

        let filters = ProductFilters {
            category: Some("Tops".to_string()),
            brand: Some("Acme".to_string()),
            search: Some("tee".to_string()),
            ..Default::default()
        };
        let result =
            list_department_products(&store, men, &filters, PageRequest::default(), &config())
                .await
                .unwrap();
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].id, "P05");
    }

    #[tokio::test]
    async fn test_scoped_query_unknown_department_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;

        let err = list_department_products(
            &store,
            999,
            &ProductFilters::default(),
            PageRequest::default(),
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_get_product_includes_department_and_margin() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;

        let product = get_product(&store, "P05").await.unwrap();
        assert_eq!(product.department.name, "Men");
        assert_eq!(product.profit_margin, Decimal::ONE);
        assert_eq!(
            product.profit_margin_percentage,
            Some(Decimal::from_str("33.33").unwrap())
        );

        let err = get_product(&store, "nope").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_departments_ordered_by_name() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;
        store.upsert_department("Kids").await.unwrap();

        let departments = list_departments(&store).await.unwrap();
        let summary: Vec<(&str, i64)> = departments
            .iter()
            .map(|d| (d.name.as_str(), d.product_count))
            .collect();
        assert_eq!(summary, vec![("Kids", 0), ("Men", 4), ("Women", 3)]);

        let err = get_department(&store, 999).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_categories_and_brands_distinct_sorted() {
        let tmp = TempDir::new().unwrap();
        let store = seeded(&tmp).await;

        assert_eq!(
            list_categories(&store).await.unwrap(),
            vec!["Jeans", "Outerwear", "Tops"]
        );
        assert_eq!(list_brands(&store).await.unwrap(), vec!["Acme", "Levi's"]);
    }
}
