//! Core data models used throughout the catalog.
//!
//! [`ProductRecord`] is the only way to build a product that can be written
//! to the store: its constructor enforces every row invariant, so an invalid
//! instance never exists. Read-side types ([`ProductWithDepartment`],
//! [`DepartmentSummary`], ...) are what the query and aggregation layers
//! hand back to callers.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{CatalogError, CatalogResult};

/// Surrogate key of a department.
pub type DepartmentId = i64;

/// Fractional digits kept for every stored money value.
pub const PRICE_SCALE: u32 = 4;

/// Round a money value to the stored precision.
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a money value to its stored form: an integer count of 10⁻⁴ units.
pub fn price_to_stored(field: &str, value: Decimal) -> CatalogResult<i64> {
    let mut scaled = round_price(value);
    scaled.rescale(PRICE_SCALE);
    i64::try_from(scaled.mantissa())
        .map_err(|_| CatalogError::validation(field, "is out of range"))
}

/// Convert a stored integer back to a money value at the stored precision.
pub fn price_from_stored(stored: i64) -> Decimal {
    Decimal::new(stored, PRICE_SCALE)
}

/// Round a presented value (percentages, averages) to two digits.
pub fn round_2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unvalidated product fields as read from a source row or a legacy table.
#[derive(Debug, Clone, Default)]
pub struct RawProduct {
    pub id: String,
    pub cost: Decimal,
    pub retail_price: Decimal,
    pub category: String,
    pub name: String,
    pub brand: String,
    pub sku: String,
    pub distribution_center_id: i64,
    pub department: String,
}

/// A product row that satisfies every catalog invariant.
///
/// Prices are rounded to [`PRICE_SCALE`] digits; text fields are trimmed.
/// The department is still carried by name: it is resolved to an id by the
/// store when the record is written.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    id: String,
    cost: Decimal,
    retail_price: Decimal,
    category: String,
    name: String,
    brand: String,
    sku: String,
    distribution_center_id: i64,
    department: String,
}

impl ProductRecord {
    /// Validate raw fields, failing with the first offending field.
    ///
    /// The zero-price check runs before the cost/retail comparison so a row
    /// with `retail_price = 0` is always reported as such.
    pub fn new(raw: RawProduct) -> CatalogResult<Self> {
        let id = raw.id.trim().to_string();
        if id.is_empty() {
            return Err(CatalogError::validation("id", "is empty"));
        }
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::validation("name", "is empty"));
        }

        let cost = round_price(raw.cost);
        let retail_price = round_price(raw.retail_price);
        if cost.is_sign_negative() && !cost.is_zero() {
            return Err(CatalogError::validation("cost", "is negative"));
        }
        if retail_price.is_sign_negative() && !retail_price.is_zero() {
            return Err(CatalogError::validation("retail_price", "is negative"));
        }
        if retail_price.is_zero() {
            return Err(CatalogError::validation("retail_price", "is zero"));
        }
        if cost > retail_price {
            return Err(CatalogError::validation("cost", "exceeds retail_price"));
        }
        // Both must fit the stored integer form.
        price_to_stored("cost", cost)?;
        price_to_stored("retail_price", retail_price)?;

        let category = raw.category.trim().to_string();
        if category.is_empty() {
            return Err(CatalogError::validation("category", "is empty"));
        }
        if raw.distribution_center_id < 1 {
            return Err(CatalogError::validation(
                "distribution_center_id",
                "must be a positive integer",
            ));
        }
        let department = raw.department.trim().to_string();
        if department.is_empty() {
            return Err(CatalogError::validation("department", "is empty"));
        }

        Ok(Self {
            id,
            cost,
            retail_price,
            category,
            name,
            brand: raw.brand.trim().to_string(),
            sku: raw.sku.trim().to_string(),
            distribution_center_id: raw.distribution_center_id,
            department,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn cost(&self) -> Decimal {
        self.cost
    }
    pub fn retail_price(&self) -> Decimal {
        self.retail_price
    }
    pub fn category(&self) -> &str {
        &self.category
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn brand(&self) -> &str {
        &self.brand
    }
    pub fn sku(&self) -> &str {
        &self.sku
    }
    pub fn distribution_center_id(&self) -> i64 {
        self.distribution_center_id
    }
    pub fn department(&self) -> &str {
        &self.department
    }
}

/// Derived profit figures for one product. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductMargin {
    pub profit_margin: Decimal,
    /// `None` when the retail price is zero.
    pub profit_margin_percentage: Option<Decimal>,
}

impl ProductMargin {
    pub fn from_prices(cost: Decimal, retail_price: Decimal) -> Self {
        let profit_margin = retail_price - cost;
        let profit_margin_percentage = if retail_price.is_zero() {
            None
        } else {
            Some(round_2(profit_margin / retail_price * Decimal::ONE_HUNDRED))
        };
        Self {
            profit_margin,
            profit_margin_percentage,
        }
    }
}

/// A department's identity as embedded in product responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentRef {
    pub id: DepartmentId,
    pub name: String,
}

/// Row of `listDepartments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentSummary {
    pub id: DepartmentId,
    pub name: String,
    pub product_count: i64,
}

/// Response of `getDepartment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentDetail {
    pub id: DepartmentId,
    pub name: String,
    pub product_count: i64,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

/// A product joined with its resolved department and margin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductWithDepartment {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub cost: Decimal,
    pub retail_price: Decimal,
    pub sku: String,
    pub distribution_center_id: i64,
    pub department: DepartmentRef,
    pub profit_margin: Decimal,
    pub profit_margin_percentage: Option<Decimal>,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
